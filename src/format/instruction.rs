// Instruction serialization.
//
// Wire form, one record per instruction:
//
//   Insert: 0x01, varint len, len literal bytes
//   Copy:   0x02, zig-zag varint (offset - cursor), varint len
//
// The copy cursor starts at the window's source base and moves to the end of
// each copy, so sequential copies encode their offsets in a single byte.
// Lengths are never zero.

use super::error::DecodeError;
use super::varint;

pub const TAG_INSERT: u8 = 0x01;
pub const TAG_COPY: u8 = 0x02;

/// One reconstruction step for a target window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction<'a> {
    /// Copy `len` bytes from absolute source offset `offset`.
    Copy { offset: u64, len: u64 },
    /// Emit literal bytes.
    Insert { data: &'a [u8] },
}

impl Instruction<'_> {
    /// Number of target bytes this instruction produces.
    #[inline]
    pub fn target_len(&self) -> u64 {
        match self {
            Self::Copy { len, .. } => *len,
            Self::Insert { data } => data.len() as u64,
        }
    }

    /// Serialized size given the current copy cursor.
    pub fn encoded_len(&self, cursor: u64) -> usize {
        match *self {
            Self::Copy { offset, len } => {
                let delta = offset.wrapping_sub(cursor) as i64;
                1 + varint::sizeof_u64(varint::zigzag_encode(delta)) + varint::sizeof_u64(len)
            }
            Self::Insert { data } => 1 + varint::sizeof_usize(data.len()) + data.len(),
        }
    }
}

// ---------------------------------------------------------------------------
// Serialize
// ---------------------------------------------------------------------------

/// Append the wire form of `instructions` to `out`.
///
/// `base` is the window's source base; every copy offset must be >= `base`.
/// Zero-length instructions are skipped.
pub fn serialize(instructions: &[Instruction<'_>], base: u64, out: &mut Vec<u8>) {
    let mut cursor = base;
    for inst in instructions {
        match *inst {
            Instruction::Copy { offset, len } => {
                if len == 0 {
                    continue;
                }
                debug_assert!(offset >= base, "copy offset {offset} below window base {base}");
                out.push(TAG_COPY);
                varint::push_i64(out, offset.wrapping_sub(cursor) as i64);
                varint::push_u64(out, len);
                cursor = offset + len;
            }
            Instruction::Insert { data } => {
                if data.is_empty() {
                    continue;
                }
                out.push(TAG_INSERT);
                varint::push_u64(out, data.len() as u64);
                out.extend_from_slice(data);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Deserialize
// ---------------------------------------------------------------------------

/// Parse a complete instruction payload.
pub fn deserialize(bytes: &[u8], base: u64) -> Result<Vec<Instruction<'_>>, DecodeError> {
    InstructionIterator::new(bytes, base).collect()
}

/// Lazily parses an instruction payload; literals borrow from the payload.
///
/// The iterator stops after the first error.
pub struct InstructionIterator<'a> {
    data: &'a [u8],
    pos: usize,
    base: u64,
    cursor: u64,
    failed: bool,
    /// Set for a payload still under secondary compression.
    unexpanded: bool,
}

impl<'a> InstructionIterator<'a> {
    pub fn new(data: &'a [u8], base: u64) -> Self {
        Self {
            data,
            pos: 0,
            base,
            cursor: base,
            failed: false,
            unexpanded: false,
        }
    }

    /// An iterator that reports a compressed payload instead of parsing it.
    pub(crate) fn unexpanded() -> Self {
        Self {
            unexpanded: true,
            ..Self::new(&[], 0)
        }
    }

    fn read_varint(&mut self, what: &str) -> Result<u64, DecodeError> {
        let (val, used) = varint::read_u64(&self.data[self.pos..])
            .map_err(|e| DecodeError::malformed(format!("{what} at byte {}: {e}", self.pos)))?;
        self.pos += used;
        Ok(val)
    }

    fn parse_next(&mut self) -> Result<Instruction<'a>, DecodeError> {
        let at = self.pos;
        let tag = self.data[at];
        self.pos += 1;
        match tag {
            TAG_INSERT => {
                let len = self.read_varint("insert length")?;
                if len == 0 {
                    return Err(DecodeError::malformed(format!(
                        "zero-length insert at byte {at}"
                    )));
                }
                let remaining = (self.data.len() - self.pos) as u64;
                if len > remaining {
                    return Err(DecodeError::malformed(format!(
                        "insert at byte {at} wants {len} bytes, {remaining} remain"
                    )));
                }
                let start = self.pos;
                self.pos += len as usize;
                Ok(Instruction::Insert {
                    data: &self.data[start..self.pos],
                })
            }
            TAG_COPY => {
                let raw = self.read_varint("copy offset")?;
                let len = self.read_varint("copy length")?;
                if len == 0 {
                    return Err(DecodeError::malformed(format!(
                        "zero-length copy at byte {at}"
                    )));
                }
                let offset = self
                    .cursor
                    .checked_add_signed(varint::zigzag_decode(raw))
                    .filter(|&off| off >= self.base)
                    .ok_or_else(|| {
                        DecodeError::malformed(format!(
                            "copy at byte {at} references before the start of the source window"
                        ))
                    })?;
                self.cursor = offset.checked_add(len).ok_or_else(|| {
                    DecodeError::malformed(format!("copy at byte {at} overflows the offset space"))
                })?;
                Ok(Instruction::Copy { offset, len })
            }
            other => Err(DecodeError::malformed(format!(
                "unknown instruction tag {other:#04X} at byte {at}"
            ))),
        }
    }
}

impl<'a> Iterator for InstructionIterator<'a> {
    type Item = Result<Instruction<'a>, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.unexpanded && !self.failed {
            self.failed = true;
            return Some(Err(DecodeError::malformed(
                "window payload is still secondary-compressed",
            )));
        }
        if self.failed || self.pos >= self.data.len() {
            return None;
        }
        let result = self.parse_next();
        self.failed = result.is_err();
        Some(result)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
