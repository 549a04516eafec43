// Stream decoding and window application.
//
// The decoder moves through ReadHeader -> ReadWindowHeader -> ReadPayload ->
// ReplayInstructions -> VerifyChecksum and back to ReadWindowHeader, ending
// in Done at the terminator or in Failed after any error. A window header
// carries both checksums, so a reader can stop after ReadPayload to list or
// validate windows without replaying them, or without even decompressing
// them.
//
// Copies are bulk slice copies from the in-memory source, and output is
// reserved to the window's target length up front.

use std::io::Read;
use std::sync::Arc;

use crate::compress::secondary::{self, CompressBackend};

use super::checksum::adler32;
use super::error::{ChecksumScope, DecodeError};
use super::header::{StreamHeader, WindowHeader, max_payload_len};
use super::instruction::{Instruction, InstructionIterator};

// ---------------------------------------------------------------------------
// Decoder phase
// ---------------------------------------------------------------------------

/// Where a `StreamDecoder` is in the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodePhase {
    /// Stream header not read yet.
    ReadHeader,
    /// Expecting a window header or the terminator.
    ReadWindowHeader,
    /// A window header was read; its payload comes next.
    ReadPayload,
    /// Replaying a window's instructions against the source.
    ReplayInstructions,
    /// Checking a reconstructed window against its target checksum.
    VerifyChecksum,
    /// Terminator seen and validated.
    Done,
    /// A previous call failed; the stream cannot be resumed.
    Failed,
}

// ---------------------------------------------------------------------------
// Window record
// ---------------------------------------------------------------------------

/// A window read from the stream with its payload checksum verified.
#[derive(Debug, Clone)]
pub struct WindowRecord {
    /// Zero-based window number.
    pub index: u64,
    pub header: WindowHeader,
    /// Instruction bytes, or the stored payload while `is_compressed()`.
    pub payload: Vec<u8>,
    compressed: bool,
}

impl WindowRecord {
    /// Whether the payload still carries its secondary compression.
    pub fn is_compressed(&self) -> bool {
        self.compressed
    }

    /// Iterate over the window's instructions.
    ///
    /// A record that is still compressed yields a single error; pass it
    /// through `StreamDecoder::expand` first.
    pub fn instructions(&self) -> InstructionIterator<'_> {
        if self.compressed {
            return InstructionIterator::unexpanded();
        }
        InstructionIterator::new(&self.payload, self.header.source_offset)
    }
}

/// Replay `record` against `source`, appending the window to `output`.
///
/// On error `output` is truncated back to its length on entry.
pub fn apply_window(
    record: &WindowRecord,
    source: &[u8],
    verify_checksum: bool,
    output: &mut Vec<u8>,
) -> Result<(), DecodeError> {
    let base = output.len();
    let mut result = replay(record, source, output);
    if result.is_ok() && verify_checksum {
        result = verify_target(record, &output[base..]);
    }
    if result.is_err() {
        output.truncate(base);
    }
    result
}

fn replay(record: &WindowRecord, source: &[u8], output: &mut Vec<u8>) -> Result<(), DecodeError> {
    let wh = &record.header;
    let limit = source.len() as u64;
    let (range_start, range_end) = if wh.has_source() {
        let end = wh.source_offset + wh.source_len;
        if end > limit {
            return Err(DecodeError::OutOfRangeCopy {
                offset: wh.source_offset,
                len: wh.source_len,
                limit,
            });
        }
        (wh.source_offset, end)
    } else {
        (0, 0)
    };

    output.reserve(wh.target_len as usize);
    let mut written: u64 = 0;

    for inst in record.instructions() {
        let inst = inst?;
        let len = inst.target_len();
        if len > wh.target_len - written {
            return Err(DecodeError::malformed(format!(
                "window {} produces more than its declared {} bytes",
                record.index, wh.target_len
            )));
        }
        match inst {
            Instruction::Copy { offset, len } => {
                let end = offset + len;
                if offset < range_start || end > range_end {
                    return Err(DecodeError::OutOfRangeCopy {
                        offset,
                        len,
                        limit: range_end,
                    });
                }
                output.extend_from_slice(&source[offset as usize..end as usize]);
            }
            Instruction::Insert { data } => output.extend_from_slice(data),
        }
        written += len;
    }

    if written != wh.target_len {
        return Err(DecodeError::malformed(format!(
            "window {} produced {written} bytes, expected {}",
            record.index, wh.target_len
        )));
    }
    Ok(())
}

fn verify_target(record: &WindowRecord, window: &[u8]) -> Result<(), DecodeError> {
    let actual = adler32(window);
    if actual != record.header.target_checksum {
        return Err(DecodeError::CorruptDelta {
            window: record.index,
            scope: ChecksumScope::Target,
            expected: record.header.target_checksum,
            actual,
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Stream decoder
// ---------------------------------------------------------------------------

/// Decodes a patch stream one window at a time.
pub struct StreamDecoder<R: Read> {
    reader: R,
    header: Option<StreamHeader>,
    phase: DecodePhase,
    verify_checksum: bool,
    custom_backend: Option<Arc<dyn CompressBackend>>,
    /// Window header read by `read_window_header`, awaiting its payload.
    pending: Option<WindowHeader>,
    windows_read: u64,
    /// Sum of target lengths declared by the windows read so far.
    declared_len: u64,
    source_checked: bool,
}

impl<R: Read> StreamDecoder<R> {
    pub fn new(reader: R, verify_checksum: bool) -> Self {
        Self {
            reader,
            header: None,
            phase: DecodePhase::ReadHeader,
            verify_checksum,
            custom_backend: None,
            pending: None,
            windows_read: 0,
            declared_len: 0,
            source_checked: false,
        }
    }

    /// Use `backend` for payloads whose secondary id is not built in.
    pub fn with_backend(mut self, backend: Arc<dyn CompressBackend>) -> Self {
        self.custom_backend = Some(backend);
        self
    }

    pub fn phase(&self) -> DecodePhase {
        self.phase
    }

    /// The stream header, once read.
    pub fn stream_header(&self) -> Option<&StreamHeader> {
        self.header.as_ref()
    }

    /// Number of window records read so far.
    pub fn windows_read(&self) -> u64 {
        self.windows_read
    }

    /// Give back the reader, positioned after whatever has been consumed.
    pub fn into_inner(self) -> R {
        self.reader
    }

    /// Poison the decoder after a failure outside it, such as a sink that
    /// stopped accepting output.
    pub fn mark_failed(&mut self) {
        self.phase = DecodePhase::Failed;
    }

    fn check_phase(&self) -> Result<(), DecodeError> {
        if self.phase == DecodePhase::Failed {
            return Err(DecodeError::malformed(
                "stream decoder is unusable after an earlier error",
            ));
        }
        Ok(())
    }

    fn track<T>(&mut self, result: Result<T, DecodeError>) -> Result<T, DecodeError> {
        if result.is_err() {
            self.phase = DecodePhase::Failed;
        }
        result
    }

    /// Read and return the stream header.
    pub fn read_header(&mut self) -> Result<&StreamHeader, DecodeError> {
        self.check_phase()?;
        if self.phase == DecodePhase::ReadHeader {
            let result = StreamHeader::decode(&mut self.reader);
            let hdr = self.track(result)?;
            log::debug!(
                "stream header: version {} flags {:?} source hint {} bytes",
                hdr.version,
                hdr.flags(),
                hdr.source_len
            );
            self.header = Some(hdr);
            self.phase = DecodePhase::ReadWindowHeader;
        }
        self.header
            .as_ref()
            .ok_or_else(|| DecodeError::malformed("stream header unavailable"))
    }

    /// Read the next window header, or `None` after the terminator.
    ///
    /// The payload must be consumed with `read_payload` before the next
    /// window header can be read.
    pub fn read_window_header(&mut self) -> Result<Option<WindowHeader>, DecodeError> {
        self.read_header()?;
        match self.phase {
            DecodePhase::Done => return Ok(None),
            DecodePhase::ReadPayload => {
                return Err(DecodeError::malformed(
                    "the previous window's payload has not been read",
                ));
            }
            _ => {}
        }
        let result = self.read_window_header_inner();
        self.track(result)
    }

    fn read_window_header_inner(&mut self) -> Result<Option<WindowHeader>, DecodeError> {
        let Some(wh) = WindowHeader::decode(&mut self.reader)? else {
            self.finish_stream()?;
            return Ok(None);
        };
        self.pending = Some(wh);
        self.phase = DecodePhase::ReadPayload;
        Ok(Some(wh))
    }

    /// Read the payload of the window whose header was just read, verifying
    /// its checksum. Secondary compression is left in place.
    pub fn read_payload(&mut self) -> Result<WindowRecord, DecodeError> {
        self.check_phase()?;
        let Some(wh) = self.pending.take() else {
            return Err(DecodeError::malformed("no window header is pending"));
        };
        let result = self.read_payload_inner(wh);
        self.track(result)
    }

    fn read_payload_inner(&mut self, wh: WindowHeader) -> Result<WindowRecord, DecodeError> {
        let index = self.windows_read;

        // Grows with the bytes actually present, not the declared length.
        let mut payload = Vec::new();
        (&mut self.reader)
            .take(wh.payload_len)
            .read_to_end(&mut payload)?;
        if (payload.len() as u64) < wh.payload_len {
            return Err(DecodeError::malformed(format!(
                "window {index} payload truncated: {} of {} bytes",
                payload.len(),
                wh.payload_len
            )));
        }

        if self.verify_checksum {
            let actual = adler32(&payload);
            if actual != wh.payload_checksum {
                return Err(DecodeError::CorruptDelta {
                    window: index,
                    scope: ChecksumScope::Instructions,
                    expected: wh.payload_checksum,
                    actual,
                });
            }
        }

        self.windows_read += 1;
        self.declared_len += wh.target_len;
        self.phase = DecodePhase::ReadWindowHeader;
        log::debug!(
            "window {index}: {} target bytes, {} payload bytes{}",
            wh.target_len,
            wh.payload_len,
            if wh.is_secondary() { " (secondary)" } else { "" }
        );

        Ok(WindowRecord {
            index,
            compressed: wh.is_secondary(),
            header: wh,
            payload,
        })
    }

    /// Read the next window with its payload as stored, or `None` after the
    /// terminator. Needs no secondary backend.
    pub fn read_window_raw(&mut self) -> Result<Option<WindowRecord>, DecodeError> {
        if self.phase != DecodePhase::ReadPayload && self.read_window_header()?.is_none() {
            return Ok(None);
        }
        self.read_payload().map(Some)
    }

    /// Read the next window with any secondary compression removed, or
    /// `None` after the terminator.
    pub fn read_window(&mut self) -> Result<Option<WindowRecord>, DecodeError> {
        let Some(record) = self.read_window_raw()? else {
            return Ok(None);
        };
        let result = self.expand(record);
        self.track(result).map(Some)
    }

    /// Remove the secondary compression from a record read raw.
    pub fn expand(&self, mut record: WindowRecord) -> Result<WindowRecord, DecodeError> {
        if record.compressed {
            record.payload = self.decompress(&record.payload, record.header.target_len)?;
            record.compressed = false;
        }
        Ok(record)
    }

    fn decompress(&self, payload: &[u8], target_len: u64) -> Result<Vec<u8>, DecodeError> {
        let id = self
            .header
            .as_ref()
            .and_then(|h| h.secondary_id)
            .ok_or_else(|| {
                DecodeError::malformed(
                    "window is secondary-compressed but the stream names no compressor",
                )
            })?;
        let limit = max_payload_len(target_len) as usize;
        match &self.custom_backend {
            Some(backend) if backend.id() == id => backend.decompress(payload, limit),
            _ => secondary::backend_for_id(id)?.decompress(payload, limit),
        }
    }

    fn finish_stream(&mut self) -> Result<(), DecodeError> {
        let mut rest = [0u8; 1];
        if self.reader.read(&mut rest)? != 0 {
            return Err(DecodeError::malformed("trailing bytes after the terminator"));
        }
        if let Some(declared) = self.header.as_ref().and_then(|h| h.target_len)
            && declared != self.declared_len
        {
            return Err(DecodeError::malformed(format!(
                "stream declares {declared} target bytes but its windows hold {}",
                self.declared_len
            )));
        }
        self.phase = DecodePhase::Done;
        Ok(())
    }

    /// Decode the next window into `output`.
    /// Returns `Ok(false)` once the terminator has been read.
    pub fn decode_window(
        &mut self,
        source: &[u8],
        output: &mut Vec<u8>,
    ) -> Result<bool, DecodeError> {
        self.read_header()?;
        if !self.source_checked {
            self.source_checked = true;
            if let Some(hdr) = &self.header
                && hdr.source_len != source.len() as u64
            {
                log::warn!(
                    "patch was made against a {}-byte source, got {} bytes",
                    hdr.source_len,
                    source.len()
                );
            }
        }

        let Some(record) = self.read_window()? else {
            return Ok(false);
        };

        let base = output.len();
        self.phase = DecodePhase::ReplayInstructions;
        let mut result = replay(&record, source, output);
        if result.is_ok() && self.verify_checksum {
            self.phase = DecodePhase::VerifyChecksum;
            result = verify_target(&record, &output[base..]);
        }
        if result.is_err() {
            output.truncate(base);
        }
        self.track(result)?;
        self.phase = DecodePhase::ReadWindowHeader;
        Ok(true)
    }

    /// Decode all remaining windows, appending to `output`.
    pub fn decode_all(&mut self, source: &[u8], output: &mut Vec<u8>) -> Result<(), DecodeError> {
        while self.decode_window(source, output)? {}
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// High-level convenience: decode in memory
// ---------------------------------------------------------------------------

/// Decode a complete patch held in memory.
pub fn decode_memory(delta: &[u8], source: &[u8]) -> Result<Vec<u8>, DecodeError> {
    let mut decoder = StreamDecoder::new(delta, true);
    let mut output = Vec::new();
    decoder.decode_all(source, &mut output)?;
    Ok(output)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
