//! Reader for NumPy `.npy` label volumes.

use std::io::Cursor;
use std::path::Path;

use ndarray::ArrayD;
use ndarray_npy::{ReadNpyExt, ReadableElement};

use super::VolumeReader;
use crate::error::LabelportError;
use crate::volume::{Label, LabelArray};

/// Reader for NumPy `.npy` files holding integer labels.
///
/// Every integer dtype is accepted and widened to [`Label`]. Signed arrays
/// must not contain negative values. Floating point arrays are rejected,
/// since label identities are exact integers.
pub struct NpyReader;

impl NpyReader {
    /// NumPy magic bytes: \x93NUMPY
    const MAGIC: &'static [u8] = &[0x93, b'N', b'U', b'M', b'P', b'Y'];

    /// Decodes `bytes` as an array of `T`, if that is its dtype.
    fn try_read<T>(bytes: &[u8]) -> Option<ArrayD<T>>
    where
        T: ReadableElement,
    {
        ArrayD::<T>::read_npy(Cursor::new(bytes)).ok()
    }

    /// Widens an integer array to labels, rejecting negative values.
    fn widen<T>(array: ArrayD<T>, path: &Path) -> Result<LabelArray, LabelportError>
    where
        T: Copy + TryInto<Label> + std::fmt::Display,
    {
        let mut out = LabelArray::zeros(array.raw_dim());
        for (dst, &src) in out.iter_mut().zip(array.iter()) {
            *dst = src.try_into().map_err(|_| {
                LabelportError::source_read(path, format!("negative label value {}", src))
            })?;
        }
        Ok(out)
    }

    fn decode(bytes: &[u8], path: &Path) -> Result<LabelArray, LabelportError> {
        if let Some(array) = Self::try_read::<u64>(bytes) {
            return Ok(array);
        }
        if let Some(array) = Self::try_read::<u32>(bytes) {
            return Self::widen(array, path);
        }
        if let Some(array) = Self::try_read::<u16>(bytes) {
            return Self::widen(array, path);
        }
        if let Some(array) = Self::try_read::<u8>(bytes) {
            return Self::widen(array, path);
        }
        if let Some(array) = Self::try_read::<i64>(bytes) {
            return Self::widen(array, path);
        }
        if let Some(array) = Self::try_read::<i32>(bytes) {
            return Self::widen(array, path);
        }
        if let Some(array) = Self::try_read::<i16>(bytes) {
            return Self::widen(array, path);
        }
        if let Some(array) = Self::try_read::<i8>(bytes) {
            return Self::widen(array, path);
        }

        Err(LabelportError::source_read(
            path,
            "unsupported dtype or invalid .npy data (expected an integer array)",
        ))
    }
}

impl VolumeReader for NpyReader {
    fn id(&self) -> &'static str {
        "npy"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["npy"]
    }

    fn can_read(&self, magic: &[u8]) -> bool {
        magic.starts_with(Self::MAGIC)
    }

    fn read(&self, path: &Path) -> Result<LabelArray, LabelportError> {
        let bytes = std::fs::read(path)
            .map_err(|e| LabelportError::source_read(path, e.to_string()))?;
        let array = Self::decode(&bytes, path)?;
        log::debug!("NpyReader: {} has shape {:?}", path.display(), array.shape());
        Ok(array)
    }

    fn priority(&self) -> i32 {
        10
    }
}
