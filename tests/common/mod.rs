#![allow(dead_code)]

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use image::{ImageBuffer, Luma};
use labelport::volume::{AxisOrder, InMemoryVolume, Label};
use ndarray::{ArrayD, IxDyn};
use ndarray_npy::{ReadNpyExt, WriteNpyExt};

pub fn write_npy(path: &Path, shape: &[usize], values: Vec<Label>) -> PathBuf {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent dir");
    }
    let array = ArrayD::from_shape_vec(IxDyn(shape), values).expect("shape matches values");
    array
        .write_npy(File::create(path).expect("create npy file"))
        .expect("write npy file");
    path.to_path_buf()
}

pub fn write_zeros_npy(path: &Path, shape: &[usize]) -> PathBuf {
    let len = shape.iter().product();
    write_npy(path, shape, vec![0; len])
}

pub fn read_npy(path: &Path) -> ArrayD<Label> {
    ArrayD::<Label>::read_npy(File::open(path).expect("open npy file")).expect("read npy file")
}

/// Writes a 16-bit grayscale PNG whose pixel `(x, y)` is `value(x, y)`.
pub fn write_png(path: &Path, width: u32, height: u32, value: impl Fn(u32, u32) -> u16) -> PathBuf {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent dir");
    }
    let img: ImageBuffer<Luma<u16>, Vec<u16>> =
        ImageBuffer::from_fn(width, height, |x, y| Luma([value(x, y)]));
    img.save(path).expect("write png file");
    path.to_path_buf()
}

pub fn zeros_volume(shape: &[usize], axes: &str) -> InMemoryVolume {
    let axes: AxisOrder = axes.parse().expect("valid axis keys");
    InMemoryVolume::zeros(shape, axes).expect("rank matches axes")
}
