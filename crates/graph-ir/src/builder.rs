// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Blob encoder.
//!
//! Produces blobs in the layout [`crate::NetworkLoader`] reads. Output is
//! deterministic: the same sequence of builder calls always yields the same
//! bytes. Every block is padded to a word boundary.

use crate::loader::{ListRef, BLOB_REVISION, HEADER_WORDS, WORD};
use crate::{FunctionParams, FunctionType};
use byteorder::{ByteOrder, LittleEndian};
use tensor_core::ElementType;

#[derive(Debug, Clone)]
enum DataSpec {
    Buffer(usize),
    Constant(Vec<u8>),
}

#[derive(Debug, Clone)]
struct VariableSpec {
    dims: Vec<usize>,
    element: ElementType,
    data: DataSpec,
}

#[derive(Debug, Clone)]
struct FunctionSpec {
    function_type: FunctionType,
    implementation: u16,
    inputs: Vec<usize>,
    outputs: Vec<usize>,
    params: EncodedParams,
}

/// Parameter block with lists kept symbolic until block layout is known.
#[derive(Debug, Clone)]
enum ParamWord {
    Word(i32),
    List(Vec<i32>),
}

#[derive(Debug, Clone, Default)]
struct EncodedParams {
    words: Vec<ParamWord>,
    raw: Vec<u8>,
}

impl EncodedParams {
    fn from_params(function_type: FunctionType, params: &FunctionParams<'_>) -> Self {
        let mut encoded = Self::default();
        let to_i32 = |values: &[usize]| values.iter().map(|&v| v as i32).collect::<Vec<_>>();
        match params {
            FunctionParams::None => {}
            FunctionParams::Affine { base_axis } => {
                encoded.words.push(ParamWord::Word(*base_axis as i32));
            }
            FunctionParams::Pooling(p) => {
                encoded.words.push(ParamWord::List(to_i32(&p.kernel)));
                encoded.words.push(ParamWord::List(to_i32(&p.stride)));
                encoded.words.push(ParamWord::Word(p.ignore_border.into()));
                encoded.words.push(ParamWord::List(to_i32(&p.pad)));
                if function_type == FunctionType::AveragePooling {
                    encoded.words.push(ParamWord::Word(p.including_pad.into()));
                }
            }
            FunctionParams::LeakyRelu { alpha: value } | FunctionParams::Scalar { value } => {
                encoded.words.push(ParamWord::Word(value.to_bits() as i32));
            }
            FunctionParams::Softmax { axis } => {
                encoded.words.push(ParamWord::Word(*axis as i32));
            }
            FunctionParams::Reshape { shape } => {
                encoded.words.push(ParamWord::List(to_i32(shape)));
            }
            FunctionParams::Opaque(bytes) => encoded.raw.extend_from_slice(bytes),
        }
        encoded
    }
}

/// Accumulates the data-area blocks of a blob.
#[derive(Debug, Default)]
struct BlockWriter {
    blocks: Vec<Vec<u8>>,
}

impl BlockWriter {
    fn push(&mut self, mut bytes: Vec<u8>) -> i32 {
        let padded = bytes.len().div_ceil(WORD) * WORD;
        bytes.resize(padded, 0);
        self.blocks.push(bytes);
        (self.blocks.len() - 1) as i32
    }

    fn list(&mut self, values: &[i32]) -> ListRef {
        if values.is_empty() {
            return ListRef { count: 0, block: 0 };
        }
        ListRef {
            count: values.len() as i32,
            block: self.push(words(values)),
        }
    }

    fn index_list(&mut self, values: &[usize]) -> ListRef {
        let values: Vec<i32> = values.iter().map(|&v| v as i32).collect();
        self.list(&values)
    }
}

fn words(values: &[i32]) -> Vec<u8> {
    let mut bytes = vec![0u8; values.len() * WORD];
    LittleEndian::write_i32_into(values, &mut bytes);
    bytes
}

/// Builds graph blobs programmatically.
///
/// # Example
/// ```
/// use graph_ir::{FunctionParams, FunctionType, NetworkBuilder, NetworkLoader};
/// use tensor_core::ElementType;
///
/// let mut b = NetworkBuilder::new();
/// let (bx, by) = (b.buffer(4), b.buffer(4));
/// let x = b.variable(&[4], ElementType::Float32, bx);
/// let y = b.variable(&[4], ElementType::Float32, by);
/// b.function(FunctionType::MulScalar, 0, &[x], &[y], &FunctionParams::Scalar { value: 2.0 });
/// b.input(x);
/// b.output(y);
///
/// let blob = b.build();
/// let network = NetworkLoader::load(&blob).unwrap();
/// assert_eq!(network.num_functions(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct NetworkBuilder {
    revision: u32,
    buffers: Vec<usize>,
    variables: Vec<VariableSpec>,
    functions: Vec<FunctionSpec>,
    inputs: Vec<usize>,
    outputs: Vec<usize>,
}

impl Default for NetworkBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl NetworkBuilder {
    pub fn new() -> Self {
        Self {
            revision: BLOB_REVISION,
            buffers: Vec::new(),
            variables: Vec::new(),
            functions: Vec::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }

    /// Overrides the revision tag written into the header.
    pub fn revision(&mut self, revision: u32) -> &mut Self {
        self.revision = revision;
        self
    }

    /// Declares an arena buffer of `capacity` 4-byte elements and returns
    /// its index.
    pub fn buffer(&mut self, capacity: usize) -> usize {
        self.buffers.push(capacity);
        self.buffers.len() - 1
    }

    /// Declares a variable stored in arena buffer `buffer`.
    pub fn variable(&mut self, dims: &[usize], element: ElementType, buffer: usize) -> usize {
        self.push_variable(dims, element, DataSpec::Buffer(buffer))
    }

    /// Declares a variable whose data is embedded in the blob.
    pub fn constant(&mut self, dims: &[usize], element: ElementType, data: Vec<u8>) -> usize {
        self.push_variable(dims, element, DataSpec::Constant(data))
    }

    /// Declares a `Float32` constant from values.
    pub fn constant_f32(&mut self, dims: &[usize], values: &[f32]) -> usize {
        let mut data = vec![0u8; values.len() * WORD];
        LittleEndian::write_f32_into(values, &mut data);
        self.constant(dims, ElementType::Float32, data)
    }

    fn push_variable(&mut self, dims: &[usize], element: ElementType, data: DataSpec) -> usize {
        self.variables.push(VariableSpec {
            dims: dims.to_vec(),
            element,
            data,
        });
        self.variables.len() - 1
    }

    /// Appends a function to the execution order and returns its index.
    pub fn function(
        &mut self,
        function_type: FunctionType,
        implementation: u16,
        inputs: &[usize],
        outputs: &[usize],
        params: &FunctionParams<'_>,
    ) -> usize {
        self.functions.push(FunctionSpec {
            function_type,
            implementation,
            inputs: inputs.to_vec(),
            outputs: outputs.to_vec(),
            params: EncodedParams::from_params(function_type, params),
        });
        self.functions.len() - 1
    }

    /// Marks a variable as the next graph input.
    pub fn input(&mut self, variable: usize) -> &mut Self {
        self.inputs.push(variable);
        self
    }

    /// Marks a variable as the next graph output.
    pub fn output(&mut self, variable: usize) -> &mut Self {
        self.outputs.push(variable);
        self
    }

    /// Encodes the blob.
    pub fn build(&self) -> Vec<u8> {
        let mut blocks = BlockWriter::default();

        let inputs = blocks.index_list(&self.inputs);
        let outputs = blocks.index_list(&self.outputs);
        let buffers = blocks.index_list(&self.buffers);

        let mut variable_records = Vec::with_capacity(self.variables.len());
        for (id, variable) in self.variables.iter().enumerate() {
            let shape = blocks.index_list(&variable.dims);
            let data_index = match &variable.data {
                DataSpec::Buffer(index) => -(*index as i32) - 1,
                DataSpec::Constant(bytes) => blocks.push(bytes.clone()),
            };
            let element_word =
                (variable.element.code() | (u32::from(variable.element.frac_bits()) << 4)) as i32;
            let record = words(&[id as i32, shape.count, shape.block, element_word, data_index]);
            variable_records.push(blocks.push(record));
        }
        let variables = blocks.list(&variable_records);

        let mut function_records = Vec::with_capacity(self.functions.len());
        for function in &self.functions {
            let ins = blocks.index_list(&function.inputs);
            let outs = blocks.index_list(&function.outputs);
            let head = u32::from(function.function_type.code())
                | (u32::from(function.implementation) << 16);
            let mut record = vec![head as i32, ins.count, ins.block, outs.count, outs.block];
            for word in &function.params.words {
                match word {
                    ParamWord::Word(w) => record.push(*w),
                    ParamWord::List(values) => {
                        let list = blocks.list(values);
                        record.extend([list.count, list.block]);
                    }
                }
            }
            let mut bytes = words(&record);
            bytes.extend_from_slice(&function.params.raw);
            function_records.push(blocks.push(bytes));
        }
        let functions = blocks.list(&function_records);

        let mut offsets = Vec::with_capacity(blocks.blocks.len());
        let mut data = Vec::new();
        for block in &blocks.blocks {
            offsets.push(data.len() as i32);
            data.extend_from_slice(block);
        }

        let header = [
            self.revision as i32,
            buffers.count,
            buffers.block,
            variables.count,
            variables.block,
            functions.count,
            functions.block,
            inputs.count,
            inputs.block,
            outputs.count,
            outputs.block,
            offsets.len() as i32,
            data.len() as i32,
        ];
        debug_assert_eq!(header.len(), HEADER_WORDS);

        let mut blob = words(&header);
        blob.extend(words(&offsets));
        blob.extend(data);
        blob
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FormatError, NetworkLoader, PoolingParams, VariableStorage};

    #[test]
    fn test_build_is_deterministic() {
        let mut b = NetworkBuilder::new();
        let buf = b.buffer(6);
        let x = b.variable(&[2, 3], ElementType::Float32, buf);
        b.input(x).output(x);
        assert_eq!(b.build(), b.build());
    }

    #[test]
    fn test_constant_is_zero_copy() {
        let mut b = NetworkBuilder::new();
        let (bx, by) = (b.buffer(3), b.buffer(3));
        let x = b.variable(&[3], ElementType::Float32, bx);
        let w = b.constant_f32(&[3], &[1.0, 2.0, 3.0]);
        let y = b.variable(&[3], ElementType::Float32, by);
        b.function(FunctionType::Mul2, 0, &[x, w], &[y], &FunctionParams::None);
        b.input(x).output(y);
        let blob = b.build();

        let network = NetworkLoader::load(&blob).unwrap();
        let VariableStorage::Constant(bytes) = network.variable(w).unwrap().storage else {
            panic!("weight should be constant");
        };
        let blob_range = blob.as_ptr_range();
        assert!(blob_range.contains(&bytes.as_ptr()));
        assert_eq!(ElementType::Float32.read(bytes, 2), Some(3.0));
    }

    #[test]
    fn test_params_decode() {
        let mut b = NetworkBuilder::new();
        let (bx, by) = (b.buffer(16), b.buffer(16));
        let x = b.variable(&[1, 4, 4], ElementType::Float32, bx);
        let y = b.variable(&[1, 2, 2], ElementType::Float32, by);
        let pooling = PoolingParams {
            kernel: vec![2, 2],
            stride: vec![],
            ignore_border: true,
            pad: vec![0, 0],
            including_pad: true,
        };
        b.function(
            FunctionType::AveragePooling,
            0,
            &[x],
            &[y],
            &FunctionParams::Pooling(pooling.clone()),
        );
        b.function(
            FunctionType::LeakyRelu,
            3,
            &[y],
            &[y],
            &FunctionParams::LeakyRelu { alpha: 0.25 },
        );
        b.function(
            FunctionType::Reshape,
            0,
            &[y],
            &[y],
            &FunctionParams::Reshape { shape: vec![4] },
        );
        let blob = b.build();
        let network = NetworkLoader::load(&blob).unwrap();
        let functions = network.functions();
        assert_eq!(functions[0].params, FunctionParams::Pooling(pooling));
        assert_eq!(functions[1].params, FunctionParams::LeakyRelu { alpha: 0.25 });
        assert_eq!(functions[1].implementation, 3);
        assert_eq!(
            functions[2].params,
            FunctionParams::Reshape { shape: vec![4] }
        );
    }

    #[test]
    fn test_max_pooling_ignores_including_pad() {
        let mut b = NetworkBuilder::new();
        let (bx, by) = (b.buffer(16), b.buffer(4));
        let x = b.variable(&[4, 4], ElementType::Float32, bx);
        let y = b.variable(&[2, 2], ElementType::Float32, by);
        let params = PoolingParams {
            kernel: vec![2, 2],
            stride: vec![2, 2],
            ignore_border: true,
            pad: vec![0, 0],
            including_pad: true,
        };
        b.function(
            FunctionType::MaxPooling,
            0,
            &[x],
            &[y],
            &FunctionParams::Pooling(params),
        );
        let blob = b.build();
        let network = NetworkLoader::load(&blob).unwrap();
        let FunctionParams::Pooling(decoded) = &network.functions()[0].params else {
            panic!("expected pooling params");
        };
        assert!(!decoded.including_pad);
    }

    #[test]
    fn test_unknown_function_keeps_opaque_params() {
        let mut b = NetworkBuilder::new();
        let buf = b.buffer(2);
        let x = b.variable(&[2], ElementType::Float32, buf);
        b.function(
            FunctionType::Unknown(777),
            9,
            &[x],
            &[x],
            &FunctionParams::Opaque(&[1, 0, 0, 0, 2, 0, 0, 0]),
        );
        let blob = b.build();
        let network = NetworkLoader::load(&blob).unwrap();
        let f = &network.functions()[0];
        assert_eq!(f.function_type, FunctionType::Unknown(777));
        assert_eq!(f.params, FunctionParams::Opaque(&[1, 0, 0, 0, 2, 0, 0, 0]));
    }

    #[test]
    fn test_missing_params_rejected() {
        let mut b = NetworkBuilder::new();
        let buf = b.buffer(2);
        let x = b.variable(&[2], ElementType::Float32, buf);
        b.function(FunctionType::MulScalar, 0, &[x], &[x], &FunctionParams::None);
        let blob = b.build();
        assert!(matches!(
            NetworkLoader::parse(&blob),
            Err(FormatError::MalformedParams { function: 0, .. })
        ));
    }

    #[test]
    fn test_reshape_target_overflow_rejected() {
        let mut b = NetworkBuilder::new();
        let (bx, by) = (b.buffer(4), b.buffer(4));
        let x = b.variable(&[4], ElementType::Float32, bx);
        let y = b.variable(&[4], ElementType::Float32, by);
        let huge = i32::MAX as usize;
        b.function(
            FunctionType::Reshape,
            0,
            &[x],
            &[y],
            &FunctionParams::Reshape {
                shape: vec![huge, huge, huge, 4],
            },
        );
        let blob = b.build();
        assert!(matches!(
            NetworkLoader::parse(&blob),
            Err(FormatError::MalformedParams { function: 0, .. })
        ));
    }

    #[test]
    fn test_fixed_point_element_roundtrip() {
        let mut b = NetworkBuilder::new();
        let buf = b.buffer(2);
        let x = b.variable(&[4], ElementType::Int16 { frac_bits: 8 }, buf);
        b.input(x).output(x);
        let blob = b.build();
        let network = NetworkLoader::load(&blob).unwrap();
        assert_eq!(
            network.variable(x).unwrap().element,
            ElementType::Int16 { frac_bits: 8 }
        );
    }
}
