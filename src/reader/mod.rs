//! External label file readers.
//!
//! Decoding is delegated to format crates (`ndarray-npy`, `image`); this
//! module only chooses a reader per file and assembles one or many files
//! into a single addressable source volume.
//!
//! ## Supported Formats
//!
//! - **NumPy arrays**: `.npy` files of any integer dtype
//! - **Raster images**: PNG, TIFF, BMP, PGM (one `(y, x)` plane per file)
//!
//! A list of files (or a directory of them) becomes an ordered stack along
//! `z`: files without a `z` axis each contribute one slice, files that
//! already carry `z` are concatenated along it.

mod npy;
mod raster;

pub use npy::NpyReader;
pub use raster::ImageReader;

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ndarray::{concatenate, ArrayViewD, Axis as NdAxis};
use walkdir::WalkDir;

use crate::error::LabelportError;
use crate::volume::{Axis, AxisOrder, LabelArray, Roi};

/// A format reader for label files.
pub trait VolumeReader: Send + Sync {
    /// Unique identifier for this reader (e.g. "npy", "image").
    fn id(&self) -> &'static str;

    /// File extensions this reader handles (lowercase, without dots).
    fn extensions(&self) -> &'static [&'static str];

    /// Check the leading bytes of a file for a known signature.
    fn can_read(&self, magic: &[u8]) -> bool;

    /// Shape of the array stored at `path`.
    ///
    /// The default decodes the whole file; readers that can inspect a header
    /// should override it.
    fn probe(&self, path: &Path) -> Result<Vec<usize>, LabelportError> {
        Ok(self.read(path)?.shape().to_vec())
    }

    /// Decode the whole file.
    fn read(&self, path: &Path) -> Result<LabelArray, LabelportError>;

    /// Priority when several readers claim a file (higher wins).
    fn priority(&self) -> i32 {
        0
    }
}

/// Registry of available readers.
pub struct ReaderRegistry {
    readers: Vec<Arc<dyn VolumeReader>>,
}

impl ReaderRegistry {
    /// Create a registry with the built-in readers.
    pub fn new() -> Self {
        let mut registry = Self {
            readers: Vec::new(),
        };
        registry.register(Arc::new(ImageReader));
        registry.register(Arc::new(NpyReader));
        registry
    }

    /// Register an additional reader.
    pub fn register(&mut self, reader: Arc<dyn VolumeReader>) {
        self.readers.push(reader);
        self.readers.sort_by(|a, b| b.priority().cmp(&a.priority()));
    }

    /// All supported extensions, sorted and deduplicated.
    pub fn supported_extensions(&self) -> Vec<&'static str> {
        let mut extensions: Vec<&'static str> = self
            .readers
            .iter()
            .flat_map(|r| r.extensions().iter().copied())
            .collect();
        extensions.sort();
        extensions.dedup();
        extensions
    }

    /// True if `path` has an extension some reader handles.
    pub fn is_supported_file(&self, path: &Path) -> bool {
        extension_of(path).is_some_and(|ext| self.supported_extensions().iter().any(|e| *e == ext))
    }

    /// Pick a reader for `path`, by extension first, then by signature.
    pub fn reader_for(&self, path: &Path) -> Result<Arc<dyn VolumeReader>, LabelportError> {
        if let Some(ext) = extension_of(path) {
            if let Some(reader) = self
                .readers
                .iter()
                .find(|r| r.extensions().iter().any(|e| *e == ext))
            {
                return Ok(Arc::clone(reader));
            }
        }

        let mut magic = [0u8; 16];
        let n = File::open(path)
            .and_then(|mut f| f.read(&mut magic))
            .map_err(|e| LabelportError::source_read(path, e.to_string()))?;
        self.readers
            .iter()
            .find(|r| r.can_read(&magic[..n]))
            .map(Arc::clone)
            .ok_or_else(|| {
                LabelportError::source_read(
                    path,
                    format!(
                        "no reader recognizes this file (supported: {})",
                        self.supported_extensions().join(", ")
                    ),
                )
            })
    }

    /// Resolve `paths` against `working_directory` and open them as one
    /// source volume.
    ///
    /// Directories expand into their supported files in name order.
    pub fn open(
        &self,
        paths: &[PathBuf],
        working_directory: Option<&Path>,
    ) -> Result<SourceFiles, LabelportError> {
        let files = self.resolve(paths, working_directory)?;
        let first = files
            .first()
            .ok_or_else(|| LabelportError::source_read("<none>", "no source files given"))?;

        let reader = self.reader_for(first)?;
        let member_shape = reader.probe(first)?;
        let member_axes = AxisOrder::default_for_rank(member_shape.len())
            .map_err(|e| LabelportError::source_read(first, e.to_string()))?;

        for path in &files[1..] {
            let shape = self.reader_for(path)?.probe(path)?;
            if shape != member_shape {
                return Err(LabelportError::source_read(
                    path,
                    format!(
                        "stack member has shape {:?} but {} has shape {:?}",
                        shape,
                        first.display(),
                        member_shape
                    ),
                ));
            }
        }

        let source = SourceFiles::new(self, files, member_shape, member_axes)?;
        log::info!(
            "opened {} file(s) as volume of shape {:?} ({})",
            source.files.len(),
            source.shape(),
            source.axis_order()
        );
        Ok(source)
    }

    fn resolve(
        &self,
        paths: &[PathBuf],
        working_directory: Option<&Path>,
    ) -> Result<Vec<PathBuf>, LabelportError> {
        let mut files = Vec::new();
        for path in paths {
            let path = match working_directory {
                Some(dir) if path.is_relative() => dir.join(path),
                _ => path.clone(),
            };

            if path.is_dir() {
                let mut members: Vec<PathBuf> = Vec::new();
                for entry in WalkDir::new(&path).min_depth(1).max_depth(1).follow_links(true) {
                    let entry =
                        entry.map_err(|e| LabelportError::source_read(&path, e.to_string()))?;
                    if entry.file_type().is_file() && self.is_supported_file(entry.path()) {
                        members.push(entry.into_path());
                    }
                }
                members.sort();
                if members.is_empty() {
                    return Err(LabelportError::source_read(
                        &path,
                        "directory contains no supported files",
                    ));
                }
                files.extend(members);
            } else if path.is_file() {
                files.push(path);
            } else {
                return Err(LabelportError::source_read(&path, "file not found"));
            }
        }
        Ok(files)
    }
}

impl Default for ReaderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
}

/// How the member files are laid out in the assembled volume.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Stacking {
    /// One file is the whole volume.
    Single,
    /// Each file adds one slice along a new leading `z` axis.
    NewAxis,
    /// Files are concatenated along their existing axis at this index.
    Concatenate(usize),
}

/// One file or an ordered virtual stack of files, addressable by region.
///
/// Files are only decoded when a region touching them is requested.
pub struct SourceFiles {
    files: Vec<PathBuf>,
    readers: Vec<Arc<dyn VolumeReader>>,
    member_shape: Vec<usize>,
    stacking: Stacking,
    shape: Vec<usize>,
    axes: AxisOrder,
}

impl SourceFiles {
    fn new(
        registry: &ReaderRegistry,
        files: Vec<PathBuf>,
        member_shape: Vec<usize>,
        member_axes: AxisOrder,
    ) -> Result<Self, LabelportError> {
        let readers = files
            .iter()
            .map(|f| registry.reader_for(f))
            .collect::<Result<Vec<_>, _>>()?;

        let (stacking, shape, axes) = if files.len() == 1 {
            (Stacking::Single, member_shape.clone(), member_axes)
        } else if let Some(z) = member_axes.index_of(Axis::Z) {
            let mut shape = member_shape.clone();
            shape[z] *= files.len();
            (Stacking::Concatenate(z), shape, member_axes)
        } else {
            let mut axes = vec![Axis::Z];
            axes.extend_from_slice(member_axes.axes());
            let mut shape = vec![files.len()];
            shape.extend_from_slice(&member_shape);
            (Stacking::NewAxis, shape, AxisOrder::new(axes)?)
        };

        Ok(Self {
            files,
            readers,
            member_shape,
            stacking,
            shape,
            axes,
        })
    }

    /// Shape of the assembled volume.
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Default axis interpretation of the assembled volume.
    pub fn axis_order(&self) -> &AxisOrder {
        &self.axes
    }

    /// The member files in stack order.
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    /// Base names of the member files in stack order.
    pub fn file_names(&self) -> Vec<String> {
        self.files
            .iter()
            .map(|f| {
                f.file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default()
            })
            .collect()
    }

    fn read_member(&self, index: usize) -> Result<LabelArray, LabelportError> {
        let path = &self.files[index];
        let data = self.readers[index].read(path)?;
        if data.shape() != self.member_shape.as_slice() {
            return Err(LabelportError::source_read(
                path,
                format!(
                    "decoded shape {:?} differs from probed shape {:?}",
                    data.shape(),
                    self.member_shape
                ),
            ));
        }
        Ok(data)
    }

    /// Decode the region `roi` of the assembled volume.
    pub fn read_region(&self, roi: &Roi) -> Result<LabelArray, LabelportError> {
        if !roi.fits_within(&self.shape) {
            return Err(LabelportError::source_read(
                &self.files[0],
                format!(
                    "region {:?}..{:?} lies outside source shape {:?}",
                    roi.start,
                    roi.stop(),
                    self.shape
                ),
            ));
        }

        let (stack_axis, per_file) = match self.stacking {
            Stacking::Single => {
                let data = self.read_member(0)?;
                return Ok(data.slice(roi.slice_info().as_slice()).to_owned());
            }
            Stacking::NewAxis => (0, 1),
            Stacking::Concatenate(z) => (z, self.member_shape[z]),
        };

        let lo = roi.start[stack_axis];
        let hi = lo + roi.shape[stack_axis];
        let mut pieces: Vec<LabelArray> = Vec::new();
        for index in (lo / per_file.max(1))..self.files.len() {
            let file_lo = index * per_file;
            if file_lo >= hi {
                break;
            }
            let mut member = self.read_member(index)?;
            if self.stacking == Stacking::NewAxis {
                member = member.insert_axis(NdAxis(0));
            }

            let mut local = roi.clone();
            local.start[stack_axis] = lo.max(file_lo) - file_lo;
            local.shape[stack_axis] = hi.min(file_lo + per_file) - lo.max(file_lo);
            pieces.push(member.slice(local.slice_info().as_slice()).to_owned());
        }

        log::debug!(
            "read {} stack member(s) for region {:?}..{:?}",
            pieces.len(),
            roi.start,
            roi.stop()
        );

        let views: Vec<ArrayViewD<'_, _>> = pieces.iter().map(|p| p.view()).collect();
        if views.is_empty() {
            return Ok(LabelArray::zeros(roi.shape.as_slice()));
        }
        concatenate(NdAxis(stack_axis), &views)
            .map_err(|e| LabelportError::source_read(&self.files[0], e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{ArrayD, IxDyn};
    use ndarray_npy::WriteNpyExt;

    fn write_npy(path: &Path, shape: &[usize], values: Vec<u16>) {
        let array = ArrayD::from_shape_vec(IxDyn(shape), values).unwrap();
        array.write_npy(File::create(path).unwrap()).unwrap();
    }

    #[test]
    fn test_supported_extensions() {
        let registry = ReaderRegistry::new();
        let extensions = registry.supported_extensions();
        assert!(extensions.contains(&"npy"));
        assert!(extensions.contains(&"png"));
        assert!(registry.is_supported_file(Path::new("slice_001.TIF")));
        assert!(!registry.is_supported_file(Path::new("notes.txt")));
    }

    #[test]
    fn test_open_single_file_uses_rank_default_axes() {
        let dir = tempfile::tempdir().unwrap();
        write_npy(&dir.path().join("vol.npy"), &[2, 3, 4], (0..24).collect());

        let registry = ReaderRegistry::new();
        let source = registry
            .open(&[PathBuf::from("vol.npy")], Some(dir.path()))
            .unwrap();

        assert_eq!(source.shape(), &[2, 3, 4]);
        assert_eq!(source.axis_order().to_string(), "zyx");
        assert_eq!(source.file_names(), vec!["vol.npy".to_string()]);
    }

    #[test]
    fn test_stack_of_planes_adds_z_axis() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..3u16 {
            write_npy(
                &dir.path().join(format!("slice_{:03}.npy", i)),
                &[2, 2],
                vec![i; 4],
            );
        }

        let registry = ReaderRegistry::new();
        let source = registry.open(&[dir.path().to_path_buf()], None).unwrap();
        assert_eq!(source.shape(), &[3, 2, 2]);
        assert_eq!(source.axis_order().to_string(), "zyx");

        let roi = Roi {
            start: vec![1, 0, 0],
            shape: vec![2, 2, 1],
        };
        let data = source.read_region(&roi).unwrap();
        assert_eq!(data.shape(), &[2, 2, 1]);
        assert_eq!(data[[0, 0, 0]], 1);
        assert_eq!(data[[1, 1, 0]], 2);
    }

    #[test]
    fn test_stack_of_volumes_concatenates_along_z() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.npy");
        let b = dir.path().join("b.npy");
        write_npy(&a, &[2, 1, 1], vec![1, 2]);
        write_npy(&b, &[2, 1, 1], vec![3, 4]);

        let source = ReaderRegistry::new().open(&[a, b], None).unwrap();
        assert_eq!(source.shape(), &[4, 1, 1]);

        let roi = Roi {
            start: vec![1, 0, 0],
            shape: vec![2, 1, 1],
        };
        let data = source.read_region(&roi).unwrap();
        assert_eq!(data.iter().copied().collect::<Vec<_>>(), vec![2, 3]);
    }

    #[test]
    fn test_stack_members_must_share_shape() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.npy");
        let b = dir.path().join("b.npy");
        write_npy(&a, &[2, 2], vec![0; 4]);
        write_npy(&b, &[2, 3], vec![0; 6]);

        let err = ReaderRegistry::new().open(&[a, b], None).err().unwrap();
        assert!(matches!(err, LabelportError::SourceRead { .. }));
    }

    #[test]
    fn test_missing_file_is_source_read_error() {
        let err = ReaderRegistry::new()
            .open(&[PathBuf::from("/definitely/not/here.npy")], None)
            .err()
            .unwrap();
        assert!(err.to_string().contains("file not found"));
    }
}
