// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Function type tags.
//!
//! The tag is the low 16 bits of a function record's first word. Tags this
//! crate does not know decode as [`FunctionType::Unknown`] rather than
//! failing, so a deployment can still serve them through a callback.

use std::fmt;

/// The operator kind of a graph node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FunctionType {
    Affine,
    MaxPooling,
    AveragePooling,
    SumPooling,
    Sigmoid,
    Tanh,
    Relu,
    LeakyRelu,
    Softmax,
    Gelu,
    Add2,
    Sub2,
    Mul2,
    Div2,
    AddScalar,
    MulScalar,
    BinarySigmoid,
    BinaryTanh,
    Reshape,
    Identity,
    /// A tag outside the known table; only a callback can resolve it.
    Unknown(u16),
}

/// Fixed input/output arity of a known function type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Arity {
    pub min_inputs: usize,
    pub max_inputs: usize,
    pub outputs: usize,
}

impl Arity {
    const fn exact(inputs: usize, outputs: usize) -> Self {
        Self {
            min_inputs: inputs,
            max_inputs: inputs,
            outputs,
        }
    }

    /// Returns `true` if `inputs` lies within the accepted range.
    pub fn accepts_inputs(&self, inputs: usize) -> bool {
        (self.min_inputs..=self.max_inputs).contains(&inputs)
    }
}

impl FunctionType {
    /// Every known tag, in code order.
    pub const KNOWN: [FunctionType; 20] = [
        Self::Affine,
        Self::MaxPooling,
        Self::AveragePooling,
        Self::SumPooling,
        Self::Sigmoid,
        Self::Tanh,
        Self::Relu,
        Self::LeakyRelu,
        Self::Softmax,
        Self::Gelu,
        Self::Add2,
        Self::Sub2,
        Self::Mul2,
        Self::Div2,
        Self::AddScalar,
        Self::MulScalar,
        Self::BinarySigmoid,
        Self::BinaryTanh,
        Self::Reshape,
        Self::Identity,
    ];

    /// Decodes an on-disk tag.
    pub fn from_code(code: u16) -> Self {
        Self::KNOWN
            .get(code as usize)
            .copied()
            .unwrap_or(Self::Unknown(code))
    }

    /// Returns the on-disk tag.
    pub fn code(self) -> u16 {
        match self {
            Self::Unknown(code) => code,
            known => Self::KNOWN
                .iter()
                .position(|&t| t == known)
                .map_or(u16::MAX, |p| p as u16),
        }
    }

    /// Returns `true` for tags outside the known table.
    pub fn is_unknown(self) -> bool {
        matches!(self, Self::Unknown(_))
    }

    /// Input/output arity of the built-in contract, `None` for unknown tags.
    pub fn arity(self) -> Option<Arity> {
        let arity = match self {
            Self::Affine => Arity {
                min_inputs: 2,
                max_inputs: 3,
                outputs: 1,
            },
            Self::Add2 | Self::Sub2 | Self::Mul2 | Self::Div2 => Arity::exact(2, 1),
            Self::Unknown(_) => return None,
            _ => Arity::exact(1, 1),
        };
        Some(arity)
    }

    /// Returns a human-readable label.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Affine => "Affine",
            Self::MaxPooling => "MaxPooling",
            Self::AveragePooling => "AveragePooling",
            Self::SumPooling => "SumPooling",
            Self::Sigmoid => "Sigmoid",
            Self::Tanh => "Tanh",
            Self::Relu => "ReLU",
            Self::LeakyRelu => "LeakyReLU",
            Self::Softmax => "Softmax",
            Self::Gelu => "GELU",
            Self::Add2 => "Add2",
            Self::Sub2 => "Sub2",
            Self::Mul2 => "Mul2",
            Self::Div2 => "Div2",
            Self::AddScalar => "AddScalar",
            Self::MulScalar => "MulScalar",
            Self::BinarySigmoid => "BinarySigmoid",
            Self::BinaryTanh => "BinaryTanh",
            Self::Reshape => "Reshape",
            Self::Identity => "Identity",
            Self::Unknown(_) => "Unknown",
        }
    }
}

impl fmt::Display for FunctionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown(code) => write!(f, "Unknown({code})"),
            known => f.write_str(known.as_str()),
        }
    }
}
