//! ArrayFrame - 数组帧
//!
//! 多维数值数组（相机图像、传感器张量）的不可变表示。

use std::fmt;
use std::str::FromStr;

use bytes::{BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};

use crate::EncodeError;

/// 元素类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementKind {
    /// 32-bit float, little-endian on the wire
    #[default]
    F32,
    /// Unsigned byte (image pixels)
    U8,
}

impl ElementKind {
    /// Width of one element in bytes
    #[inline]
    pub const fn width(self) -> usize {
        match self {
            Self::F32 => 4,
            Self::U8 => 1,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::F32 => "f32",
            Self::U8 => "u8",
        }
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ElementKind {
    type Err = EncodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "f32" | "float32" => Ok(Self::F32),
            "u8" | "uint8" => Ok(Self::U8),
            other => Err(EncodeError::UnsupportedElementKind(other.to_string())),
        }
    }
}

/// 数组帧
///
/// Invariant: `payload.len() == product(dims) * kind.width()`, every dim is non-zero
/// and rank is at least 1. The payload is row-major and shared (`Bytes`), so clones
/// are cheap and a frame is never mutated after construction.
#[derive(Clone, PartialEq, Eq)]
pub struct ArrayFrame {
    dims: Vec<u32>,
    kind: ElementKind,
    payload: Bytes,
}

impl ArrayFrame {
    /// Build a frame from raw row-major bytes
    ///
    /// # Errors
    /// Zero rank, zero dimension, overflowing shape, or payload length mismatch.
    pub fn new(
        dims: impl Into<Vec<u32>>,
        kind: ElementKind,
        payload: impl Into<Bytes>,
    ) -> Result<Self, EncodeError> {
        let dims = dims.into();
        let payload = payload.into();

        if dims.is_empty() {
            return Err(EncodeError::EmptyShape);
        }
        if let Some(axis) = dims.iter().position(|&d| d == 0) {
            return Err(EncodeError::ZeroDimension { axis });
        }

        let expected = element_count(&dims)
            .and_then(|n| n.checked_mul(kind.width()))
            .ok_or_else(|| EncodeError::ShapeOverflow { dims: dims.clone() })?;
        if payload.len() != expected {
            return Err(EncodeError::PayloadLength {
                expected,
                actual: payload.len(),
            });
        }

        Ok(Self {
            dims,
            kind,
            payload,
        })
    }

    /// Build an `F32` frame; values are stored little-endian
    pub fn from_f32(dims: impl Into<Vec<u32>>, values: &[f32]) -> Result<Self, EncodeError> {
        let mut buf = BytesMut::with_capacity(values.len() * ElementKind::F32.width());
        for v in values {
            buf.put_f32_le(*v);
        }
        Self::new(dims, ElementKind::F32, buf.freeze())
    }

    /// Build a `U8` frame
    pub fn from_u8(dims: impl Into<Vec<u32>>, values: impl Into<Bytes>) -> Result<Self, EncodeError> {
        Self::new(dims, ElementKind::U8, values)
    }

    #[inline]
    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    #[inline]
    pub fn dims(&self) -> &[u32] {
        &self.dims
    }

    /// Dimensions as `usize`, convenient for comparisons like `shape() == [2, 3]`
    pub fn shape(&self) -> Vec<usize> {
        self.dims.iter().map(|&d| d as usize).collect()
    }

    #[inline]
    pub fn kind(&self) -> ElementKind {
        self.kind
    }

    #[inline]
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Number of elements (product of dims)
    pub fn element_count(&self) -> usize {
        self.payload.len() / self.kind.width()
    }

    /// Decode the payload as little-endian `f32` values
    ///
    /// Returns `None` for non-`F32` frames.
    pub fn to_f32_vec(&self) -> Option<Vec<f32>> {
        if self.kind != ElementKind::F32 {
            return None;
        }
        Some(
            self.payload
                .chunks_exact(4)
                .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                .collect(),
        )
    }

    /// Borrow the payload of a `U8` frame
    pub fn as_u8(&self) -> Option<&[u8]> {
        (self.kind == ElementKind::U8).then_some(&self.payload[..])
    }
}

impl fmt::Debug for ArrayFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArrayFrame")
            .field("dims", &self.dims)
            .field("kind", &self.kind)
            .field("payload_len", &self.payload.len())
            .finish()
    }
}

/// Product of dims, `None` on overflow
fn element_count(dims: &[u32]) -> Option<usize> {
    dims.iter()
        .try_fold(1usize, |acc, &d| acc.checked_mul(d as usize))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_f32_shape_and_values() {
        let frame = ArrayFrame::from_f32([2, 3], &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        assert_eq!(frame.rank(), 2);
        assert_eq!(frame.shape(), vec![2, 3]);
        assert_eq!(frame.element_count(), 6);
        assert_eq!(frame.payload().len(), 24);
        assert_eq!(
            frame.to_f32_vec().unwrap(),
            vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]
        );
        assert!(frame.as_u8().is_none());
    }

    #[test]
    fn test_payload_length_mismatch() {
        let err = ArrayFrame::from_u8([2, 2], vec![0u8; 3]).unwrap_err();
        assert_eq!(
            err,
            EncodeError::PayloadLength {
                expected: 4,
                actual: 3
            }
        );
    }

    #[test]
    fn test_zero_dimension_rejected() {
        let err = ArrayFrame::from_u8([4, 0, 3], Vec::new()).unwrap_err();
        assert_eq!(err, EncodeError::ZeroDimension { axis: 1 });
    }

    #[test]
    fn test_empty_dims_rejected() {
        let err = ArrayFrame::from_u8(Vec::<u32>::new(), Vec::new()).unwrap_err();
        assert_eq!(err, EncodeError::EmptyShape);
        assert_eq!(err.to_string(), "shape has no dimensions");
    }

    #[test]
    fn test_shape_overflow_rejected() {
        let err = ArrayFrame::from_u8([u32::MAX, u32::MAX, u32::MAX], Vec::new()).unwrap_err();
        assert!(matches!(err, EncodeError::ShapeOverflow { .. }));
    }

    #[test]
    fn test_element_kind_parse() {
        assert_eq!("f32".parse::<ElementKind>().unwrap(), ElementKind::F32);
        assert_eq!("UINT8".parse::<ElementKind>().unwrap(), ElementKind::U8);
        assert!(matches!(
            "f64".parse::<ElementKind>(),
            Err(EncodeError::UnsupportedElementKind(_))
        ));
    }
}
