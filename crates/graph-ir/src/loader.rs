// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Blob parsing.
//!
//! Layout (all words 32-bit little-endian):
//!
//! ```text
//! header      13 words: revision, five {count, block} lists
//!             (buffers, variables, functions, inputs, outputs),
//!             block count N, data area size
//! block table N offsets into the data area, non-decreasing
//! data area   block i spans [offset_i, offset_i+1), the last block
//!             ends at the data area size
//! ```
//!
//! The loader never writes to the blob and never copies constant data:
//! constant variables hold sub-slices of the caller's buffer.

use crate::network::{FunctionDef, Network, Parsed, Validated, VariableDef, VariableStorage};
use crate::{FormatError, FunctionParams, FunctionType};
use byteorder::{ByteOrder, LittleEndian};
use tensor_core::{ElementType, Shape};

/// The only revision tag this loader understands.
pub const BLOB_REVISION: u32 = 0x0021_203F;

pub(crate) const WORD: usize = 4;
pub(crate) const HEADER_WORDS: usize = 13;
pub(crate) const VARIABLE_RECORD_WORDS: usize = 5;
pub(crate) const FUNCTION_RECORD_WORDS: usize = 5;

/// A `{count, block}` reference to a list of words.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ListRef {
    pub count: i32,
    pub block: i32,
}

/// Reads word `word` of `bytes`.
pub(crate) fn read_word(bytes: &[u8], word: usize, context: &'static str) -> Result<i32, FormatError> {
    let offset = word * WORD;
    bytes
        .get(offset..offset + WORD)
        .map(LittleEndian::read_i32)
        .ok_or(FormatError::Truncated {
            context,
            offset,
            needed: WORD,
            available: bytes.len().saturating_sub(offset),
        })
}

fn non_negative(value: i32, context: &'static str) -> Result<usize, FormatError> {
    usize::try_from(value).map_err(|_| FormatError::Negative {
        context,
        value: value.into(),
    })
}

// ── Header ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
struct Header {
    buffers: ListRef,
    variables: ListRef,
    functions: ListRef,
    inputs: ListRef,
    outputs: ListRef,
    num_blocks: usize,
    data_size: usize,
}

impl Header {
    fn read(blob: &[u8]) -> Result<Self, FormatError> {
        if blob.len() < HEADER_WORDS * WORD {
            return Err(FormatError::Truncated {
                context: "header",
                offset: 0,
                needed: HEADER_WORDS * WORD,
                available: blob.len(),
            });
        }
        let word = |i| read_word(blob, i, "header");
        let revision = word(0)? as u32;
        if revision != BLOB_REVISION {
            return Err(FormatError::UnsupportedRevision {
                found: revision,
                expected: BLOB_REVISION,
            });
        }
        let list = |i| -> Result<ListRef, FormatError> {
            Ok(ListRef {
                count: word(i)?,
                block: word(i + 1)?,
            })
        };
        Ok(Self {
            buffers: list(1)?,
            variables: list(3)?,
            functions: list(5)?,
            inputs: list(7)?,
            outputs: list(9)?,
            num_blocks: non_negative(word(11)?, "block count")?,
            data_size: non_negative(word(12)?, "data area size")?,
        })
    }
}

// ── Block access ───────────────────────────────────────────────────

/// Resolves block indices and lists against the data area of a blob.
#[derive(Debug)]
pub(crate) struct BlobReader<'a> {
    data: &'a [u8],
    offsets: Vec<usize>,
}

impl<'a> BlobReader<'a> {
    fn new(blob: &'a [u8], header: &Header) -> Result<Self, FormatError> {
        let table_start = HEADER_WORDS * WORD;
        let available = blob.len() - table_start;
        let table_len = header
            .num_blocks
            .checked_mul(WORD)
            .filter(|&len| len <= available)
            .ok_or(FormatError::Truncated {
                context: "block table",
                offset: table_start,
                needed: header.num_blocks.saturating_mul(WORD),
                available,
            })?;
        let data_start = table_start + table_len;
        let data = blob
            .get(data_start..)
            .and_then(|rest| rest.get(..header.data_size))
            .ok_or(FormatError::Truncated {
                context: "data area",
                offset: data_start,
                needed: header.data_size,
                available: blob.len() - data_start,
            })?;

        let table = &blob[table_start..data_start];
        let mut offsets = Vec::with_capacity(header.num_blocks);
        for block in 0..header.num_blocks {
            let offset = non_negative(read_word(table, block, "block table")?, "block offset")?;
            if offset > data.len() {
                return Err(FormatError::IndexOutOfRange {
                    context: "block offset",
                    index: offset as i64,
                    count: data.len(),
                });
            }
            if offsets.last().is_some_and(|&prev| offset < prev) {
                return Err(FormatError::DecreasingOffset { block, offset });
            }
            offsets.push(offset);
        }

        Ok(Self { data, offsets })
    }

    /// Returns the bytes of block `index`.
    pub(crate) fn block(&self, index: i32, context: &'static str) -> Result<&'a [u8], FormatError> {
        let out_of_range = FormatError::IndexOutOfRange {
            context,
            index: index.into(),
            count: self.offsets.len(),
        };
        let i = usize::try_from(index).map_err(|_| out_of_range.clone())?;
        let start = *self.offsets.get(i).ok_or(out_of_range)?;
        let end = self.offsets.get(i + 1).copied().unwrap_or(self.data.len());
        Ok(&self.data[start..end])
    }

    /// Reads the words of a list. A zero-length list never touches its block.
    pub(crate) fn list(&self, list: ListRef, context: &'static str) -> Result<Vec<i32>, FormatError> {
        let count = non_negative(list.count, context)?;
        if count == 0 {
            return Ok(Vec::new());
        }
        let block = self.block(list.block, context)?;
        let needed = count.saturating_mul(WORD);
        if block.len() < needed {
            return Err(FormatError::Truncated {
                context,
                offset: 0,
                needed,
                available: block.len(),
            });
        }
        Ok((0..count)
            .map(|i| LittleEndian::read_i32(&block[i * WORD..(i + 1) * WORD]))
            .collect())
    }

    /// Reads a list whose entries must all be non-negative.
    pub(crate) fn index_list(
        &self,
        list: ListRef,
        context: &'static str,
    ) -> Result<Vec<usize>, FormatError> {
        self.list(list, context)?
            .into_iter()
            .map(|v| non_negative(v, context))
            .collect()
    }

    /// Number of blocks in the table.
    pub(crate) fn num_blocks(&self) -> usize {
        self.offsets.len()
    }
}

// ── Records ────────────────────────────────────────────────────────

fn parse_variable<'a>(
    reader: &BlobReader<'a>,
    position: usize,
    block: i32,
) -> Result<VariableDef<'a>, FormatError> {
    const CONTEXT: &str = "variable record";
    let record = reader.block(block, CONTEXT)?;
    let id = non_negative(read_word(record, 0, CONTEXT)?, "variable id")?;
    let shape_list = ListRef {
        count: read_word(record, 1, CONTEXT)?,
        block: read_word(record, 2, CONTEXT)?,
    };
    let element_word = read_word(record, 3, CONTEXT)? as u32;
    let data_index = read_word(record, VARIABLE_RECORD_WORDS - 1, CONTEXT)?;

    let shape = Shape::new(reader.index_list(shape_list, "shape dimension")?);
    let code = element_word & 0xF;
    let frac_bits = (element_word >> 4) & 0xF;
    let element = ElementType::from_code(code, frac_bits as u8).ok_or(
        FormatError::UnsupportedElementType {
            variable: position,
            code,
            frac_bits,
        },
    )?;
    let size_bytes = shape
        .checked_num_elements()
        .and_then(|n| n.checked_mul(element.size_bytes()))
        .ok_or(FormatError::ShapeOverflow { variable: position })?;

    let storage = if data_index < 0 {
        VariableStorage::Buffer((-(i64::from(data_index)) - 1) as usize)
    } else {
        let data = reader.block(data_index, "constant data")?;
        if data.len() < size_bytes {
            return Err(FormatError::ConstantTooShort {
                variable: position,
                expected: size_bytes,
                actual: data.len(),
            });
        }
        VariableStorage::Constant(&data[..size_bytes])
    };

    Ok(VariableDef {
        id,
        shape,
        element,
        storage,
    })
}

fn parse_function<'a>(
    reader: &BlobReader<'a>,
    index: usize,
    block: i32,
) -> Result<FunctionDef<'a>, FormatError> {
    const CONTEXT: &str = "function record";
    let record = reader.block(block, CONTEXT)?;
    let head = read_word(record, 0, CONTEXT)? as u32;
    let function_type = FunctionType::from_code((head & 0xFFFF) as u16);
    let implementation = (head >> 16) as u16;
    let inputs = reader.index_list(
        ListRef {
            count: read_word(record, 1, CONTEXT)?,
            block: read_word(record, 2, CONTEXT)?,
        },
        "function input",
    )?;
    let outputs = reader.index_list(
        ListRef {
            count: read_word(record, 3, CONTEXT)?,
            block: read_word(record, 4, CONTEXT)?,
        },
        "function output",
    )?;
    let area = &record[FUNCTION_RECORD_WORDS * WORD..];
    let params = FunctionParams::decode(index, function_type, area, reader)?;

    Ok(FunctionDef {
        index,
        function_type,
        implementation,
        inputs,
        outputs,
        params,
    })
}

// ── NetworkLoader ──────────────────────────────────────────────────

/// Parses graph blobs into [`Network`]s.
///
/// # Example
/// ```no_run
/// use graph_ir::NetworkLoader;
///
/// let blob = std::fs::read("model.nnb").unwrap();
/// let network = NetworkLoader::load(&blob).unwrap();
/// println!("{} functions", network.num_functions());
/// ```
pub struct NetworkLoader;

impl NetworkLoader {
    /// Parses and validates a blob.
    pub fn load(blob: &[u8]) -> Result<Network<'_, Validated>, FormatError> {
        Self::parse(blob)?.validate()
    }

    /// Parses a blob without the cross-table checks of
    /// [`Network::validate`].
    ///
    /// Steps:
    /// 1. Check the header and revision tag.
    /// 2. Resolve the block table against the data area.
    /// 3. Decode buffer declarations, variable and function records.
    /// 4. Read the graph input/output lists.
    pub fn parse(blob: &[u8]) -> Result<Network<'_, Parsed>, FormatError> {
        let header = Header::read(blob)?;
        let reader = BlobReader::new(blob, &header)?;
        tracing::debug!(
            bytes = blob.len(),
            blocks = reader.num_blocks(),
            "parsing graph blob"
        );

        let buffers = reader.index_list(header.buffers, "buffer capacity")?;
        let variables = reader
            .list(header.variables, "variable table")?
            .into_iter()
            .enumerate()
            .map(|(position, block)| parse_variable(&reader, position, block))
            .collect::<Result<Vec<_>, _>>()?;
        let functions = reader
            .list(header.functions, "function table")?
            .into_iter()
            .enumerate()
            .map(|(index, block)| parse_function(&reader, index, block))
            .collect::<Result<Vec<_>, _>>()?;
        let inputs = reader.index_list(header.inputs, "graph input")?;
        let outputs = reader.index_list(header.outputs, "graph output")?;

        Ok(Network::from_parts(
            buffers, variables, functions, inputs, outputs,
        ))
    }
}
