//! # Frame Codec
//!
//! Self-describing binary framing for one [`ArrayFrame`].
//!
//! ```text
//! ┌───────────────┬───────────────────────┬──────────────────────────────┐
//! │ rank (4 bytes)│ dims (4 * rank bytes) │ payload (product(dims)*width)│
//! │ u32 LE        │ u32 LE each           │ row-major, f32 LE or u8      │
//! └───────────────┴───────────────────────┴──────────────────────────────┘
//! ```
//!
//! The explicit rank field makes the header width self-determined, so a
//! sender/receiver mismatch fails as a [`DecodeError`] instead of a frame
//! with the wrong shape. The element kind is not on the wire; each stream is
//! configured with one, and a mismatch surfaces as `Truncated` or
//! `TrailingBytes` because the byte count no longer adds up.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use contracts::{ArrayFrame, DecodeError, ElementKind, EncodeError};

/// Maximum rank accepted on either side of the wire
pub const MAX_RANK: usize = 4;

/// Bytes taken by the rank field
const RANK_BYTES: usize = 4;

/// Bytes per dimension entry
const DIM_BYTES: usize = 4;

/// Codec bound to one element kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameCodec {
    kind: ElementKind,
}

impl FrameCodec {
    pub fn new(kind: ElementKind) -> Self {
        Self { kind }
    }

    pub fn kind(&self) -> ElementKind {
        self.kind
    }

    /// Check that `frame` can travel on this stream without encoding it
    ///
    /// # Errors
    /// Rank above [`MAX_RANK`] or an element kind other than the codec's.
    pub fn check(&self, frame: &ArrayFrame) -> Result<(), EncodeError> {
        if frame.rank() > MAX_RANK {
            return Err(EncodeError::RankOutOfRange {
                rank: frame.rank(),
                max: MAX_RANK,
            });
        }
        if frame.kind() != self.kind {
            return Err(EncodeError::ElementKindMismatch {
                expected: self.kind.as_str(),
                actual: frame.kind().as_str(),
            });
        }
        Ok(())
    }

    /// Encode one frame into a fresh buffer
    pub fn encode(&self, frame: &ArrayFrame) -> Result<Bytes, EncodeError> {
        let mut buf = BytesMut::with_capacity(encoded_len(frame));
        self.encode_into(frame, &mut buf)?;
        Ok(buf.freeze())
    }

    /// Append one encoded frame to `buf`
    pub fn encode_into(&self, frame: &ArrayFrame, buf: &mut BytesMut) -> Result<(), EncodeError> {
        self.check(frame)?;

        buf.reserve(encoded_len(frame));
        buf.put_u32_le(frame.rank() as u32);
        for &dim in frame.dims() {
            buf.put_u32_le(dim);
        }
        // ArrayFrame already stores F32 elements little-endian
        buf.put_slice(frame.payload());
        Ok(())
    }

    /// Decode one frame
    ///
    /// The payload of the returned frame shares `bytes` (no copy).
    ///
    /// # Errors
    /// - `Truncated`: fewer bytes than the header declares
    /// - `DimensionOverflow`: rank 0 or above [`MAX_RANK`], zero dim, overflowing shape
    /// - `TrailingBytes`: more bytes than the header declares
    pub fn decode(&self, bytes: &Bytes) -> Result<ArrayFrame, DecodeError> {
        let total = bytes.len();
        let mut cursor = &bytes[..];

        if cursor.remaining() < RANK_BYTES {
            return Err(DecodeError::Truncated {
                expected: RANK_BYTES,
                actual: total,
            });
        }
        let rank = cursor.get_u32_le() as usize;
        if rank == 0 || rank > MAX_RANK {
            return Err(DecodeError::dimension_overflow(format!(
                "rank {rank} outside 1..={MAX_RANK}"
            )));
        }

        let header_len = RANK_BYTES + DIM_BYTES * rank;
        if total < header_len {
            return Err(DecodeError::Truncated {
                expected: header_len,
                actual: total,
            });
        }

        let mut dims = Vec::with_capacity(rank);
        let mut elements = 1usize;
        for axis in 0..rank {
            let dim = cursor.get_u32_le();
            if dim == 0 {
                return Err(DecodeError::dimension_overflow(format!(
                    "dimension {axis} is zero"
                )));
            }
            elements = elements.checked_mul(dim as usize).ok_or_else(|| {
                DecodeError::dimension_overflow(format!("element count overflows at axis {axis}"))
            })?;
            dims.push(dim);
        }

        let expected = elements
            .checked_mul(self.kind.width())
            .and_then(|n| n.checked_add(header_len))
            .ok_or_else(|| DecodeError::dimension_overflow("frame length overflows"))?;
        if total < expected {
            return Err(DecodeError::Truncated {
                expected,
                actual: total,
            });
        }
        if total > expected {
            return Err(DecodeError::TrailingBytes {
                expected,
                actual: total,
            });
        }

        let payload = bytes.slice(header_len..);
        ArrayFrame::new(dims, self.kind, payload)
            .map_err(|e| DecodeError::dimension_overflow(e.to_string()))
    }
}

/// Exact encoded size of `frame`
pub fn encoded_len(frame: &ArrayFrame) -> usize {
    RANK_BYTES + DIM_BYTES * frame.rank() + frame.payload().len()
}
