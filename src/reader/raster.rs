//! Reader for single-plane raster label images (PNG, TIFF, BMP, ...).

use std::path::Path;

use image::ColorType;
use ndarray::{ArrayD, IxDyn};

use super::VolumeReader;
use crate::error::LabelportError;
use crate::volume::{Label, LabelArray};

/// Reader for standard image formats.
///
/// Each image is one `(y, x)` plane. Label values are taken from the luma
/// channel at the image's native bit depth, so 8-bit label 3 stays 3.
pub struct ImageReader;

impl VolumeReader for ImageReader {
    fn id(&self) -> &'static str {
        "image"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["png", "tif", "tiff", "bmp", "pgm", "pnm"]
    }

    fn can_read(&self, magic: &[u8]) -> bool {
        // PNG
        magic.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A])
            // TIFF, little and big endian
            || magic.starts_with(b"II*\0")
            || magic.starts_with(b"MM\0*")
            // BMP
            || magic.starts_with(b"BM")
    }

    fn probe(&self, path: &Path) -> Result<Vec<usize>, LabelportError> {
        let size =
            imagesize::size(path).map_err(|e| LabelportError::source_read(path, e.to_string()))?;
        Ok(vec![size.height, size.width])
    }

    fn read(&self, path: &Path) -> Result<LabelArray, LabelportError> {
        let img = image::open(path).map_err(|e| LabelportError::source_read(path, e.to_string()))?;
        let (width, height) = (img.width() as usize, img.height() as usize);

        let values: Vec<Label> = match img.color() {
            ColorType::L16 | ColorType::La16 | ColorType::Rgb16 | ColorType::Rgba16 => img
                .to_luma16()
                .into_raw()
                .into_iter()
                .map(Label::from)
                .collect(),
            _ => img
                .to_luma8()
                .into_raw()
                .into_iter()
                .map(Label::from)
                .collect(),
        };

        log::debug!(
            "ImageReader: {} decoded as {}x{} ({:?})",
            path.display(),
            width,
            height,
            img.color()
        );

        ArrayD::from_shape_vec(IxDyn(&[height, width]), values)
            .map_err(|e| LabelportError::source_read(path, e.to_string()))
    }
}
