//! On-disk feature store.
//!
//! A store is one directory:
//!
//! ```text
//! features/
//!   descriptor.json   feature kind and parameters, framing, dtype, layout
//!   <id>.npy          one array per clip
//!   index.json        ids and shapes written by the last batch
//!   skipped.json      clips the last batch could not process
//! ```
//!
//! Arrays are time-major `f32`: `(time_steps, bins)` for whole clips, or
//! `(n_frames, frame_length, bins)` when framing is configured.

use ndarray::{Array2, Array3, ArrayBase, Data, Dimension};
use ndarray_npy::{ReadNpyExt, WriteNpyExt};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use crate::feature::FeatureConfig;
use crate::frame::FramingConfig;
use crate::utils::{atomic_write, atomic_write_json, read_json};

pub const DESCRIPTOR_FILE: &str = "descriptor.json";
pub const INDEX_FILE: &str = "index.json";
pub const SKIPPED_FILE: &str = "skipped.json";

/// Bumped whenever the on-disk layout changes.
pub const FORMAT_VERSION: u32 = 1;

/// Sidecar describing how every array in a store was produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FeatureDescriptor {
    pub format_version: u32,
    /// Version of the crate that wrote the store; informational only.
    pub crate_version: String,
    pub features: FeatureConfig,
    #[serde(deserialize_with = "Option::deserialize")]
    pub framing: Option<FramingConfig>,
    /// Time steps every unframed matrix is clipped or padded to.
    #[serde(deserialize_with = "Option::deserialize")]
    pub max_frames: Option<usize>,
    pub dtype: String,
    pub layout: String,
}

impl FeatureDescriptor {
    pub fn new(
        features: FeatureConfig,
        framing: Option<FramingConfig>,
        max_frames: Option<usize>,
    ) -> Self {
        Self {
            format_version: FORMAT_VERSION,
            crate_version: env!("CARGO_PKG_VERSION").to_string(),
            features,
            framing,
            max_frames,
            dtype: "f32".to_string(),
            layout: "time_major".to_string(),
        }
    }

    /// Number of axes of the stored arrays.
    pub fn ndim(&self) -> usize {
        if self.framing.is_some() { 3 } else { 2 }
    }

    /// Describe the first difference to `other` that changes stored numbers
    /// or shapes. The crate version is not compared.
    pub fn mismatch(&self, other: &FeatureDescriptor) -> Option<String> {
        if self.format_version != other.format_version {
            return Some(format!(
                "format version {} vs {}",
                self.format_version, other.format_version
            ));
        }
        if self.features != other.features {
            return Some(format!(
                "feature parameters differ: {:?} vs {:?}",
                self.features, other.features
            ));
        }
        if self.framing != other.framing {
            return Some(format!(
                "framing differs: {:?} vs {:?}",
                self.framing, other.framing
            ));
        }
        if self.max_frames != other.max_frames {
            return Some(format!(
                "max_frames differs: {:?} vs {:?}",
                self.max_frames, other.max_frames
            ));
        }
        if self.dtype != other.dtype || self.layout != other.layout {
            return Some(format!(
                "array format {}/{} vs {}/{}",
                self.dtype, self.layout, other.dtype, other.layout
            ));
        }
        None
    }
}

/// One stored array, as listed in `index.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub id: String,
    pub file: String,
    pub shape: Vec<usize>,
}

/// A clip that could not be processed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkipRecord {
    pub id: String,
    pub path: PathBuf,
    /// Short error tag, see [`crate::Error::kind`].
    pub kind: String,
    pub error: String,
}

impl SkipRecord {
    pub fn new(id: impl Into<String>, path: impl Into<PathBuf>, err: &crate::Error) -> Self {
        Self {
            id: id.into(),
            path: path.into(),
            kind: err.kind().to_string(),
            error: err.to_string(),
        }
    }
}

/// Handle on a feature directory with a known descriptor.
#[derive(Debug, Clone)]
pub struct FeatureStore {
    dir: PathBuf,
    descriptor: FeatureDescriptor,
}

impl FeatureStore {
    /// Open `dir` for writing with `descriptor`, creating it if needed.
    ///
    /// # Errors
    /// [`crate::Error::IncompatibleFeatures`] if the directory already holds
    /// features produced with different parameters.
    pub fn create<P: AsRef<Path>>(dir: P, descriptor: FeatureDescriptor) -> crate::Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        let desc_path = dir.join(DESCRIPTOR_FILE);
        if desc_path.is_file() {
            let existing: FeatureDescriptor = read_json(&desc_path)?;
            if let Some(reason) = existing.mismatch(&descriptor) {
                return Err(crate::Error::IncompatibleFeatures { path: dir, reason });
            }
            log::debug!("reusing feature store at {}", dir.display());
        } else {
            atomic_write_json(&desc_path, &descriptor)?;
            log::debug!("created feature store at {}", dir.display());
        }
        Ok(Self { dir, descriptor })
    }

    /// Open an existing store, reading its descriptor.
    pub fn open<P: AsRef<Path>>(dir: P) -> crate::Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        let descriptor: FeatureDescriptor = read_json(dir.join(DESCRIPTOR_FILE))?;
        if descriptor.format_version != FORMAT_VERSION {
            return Err(crate::Error::IncompatibleFeatures {
                path: dir,
                reason: format!(
                    "format version {} is not supported (expected {FORMAT_VERSION})",
                    descriptor.format_version
                ),
            });
        }
        Ok(Self { dir, descriptor })
    }

    /// Fail unless the store was produced with `expected` parameters.
    pub fn check_compatible(&self, expected: &FeatureDescriptor) -> crate::Result<()> {
        match self.descriptor.mismatch(expected) {
            Some(reason) => Err(crate::Error::IncompatibleFeatures {
                path: self.dir.clone(),
                reason,
            }),
            None => Ok(()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn descriptor(&self) -> &FeatureDescriptor {
        &self.descriptor
    }

    pub fn file_name(id: &str) -> String {
        format!("{id}.npy")
    }

    fn path_for(&self, id: &str) -> crate::Result<PathBuf> {
        if id.is_empty() || id.contains(['/', '\\']) || id.starts_with('.') {
            return Err(crate::Error::InvalidParameter {
                name: "id",
                value: id.to_string(),
                reason: "must be a plain file stem".to_string(),
            });
        }
        Ok(self.dir.join(Self::file_name(id)))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.path_for(id).is_ok_and(|p| p.is_file())
    }

    /// Atomically write the array for `id`, replacing any previous one.
    pub fn save<S, D>(&self, id: &str, array: &ArrayBase<S, D>) -> crate::Result<()>
    where
        S: Data<Elem = f32>,
        D: Dimension,
    {
        if array.ndim() != self.descriptor.ndim() {
            return Err(crate::Error::InvalidParameter {
                name: "array",
                value: format!("{:?}", array.shape()),
                reason: format!("store holds {}-D arrays", self.descriptor.ndim()),
            });
        }
        let path = self.path_for(id)?;
        atomic_write(&path, |w| {
            array.write_npy(w)?;
            Ok(())
        })
    }

    fn check_bins(&self, id: &str, shape: &[usize]) -> crate::Result<()> {
        let bins = self.descriptor.features.bins();
        if shape.last() != Some(&bins) {
            return Err(crate::Error::IncompatibleFeatures {
                path: self.dir.join(Self::file_name(id)),
                reason: format!("shape {shape:?} does not end in {bins} bins"),
            });
        }
        Ok(())
    }

    /// Load an unframed `(time_steps, bins)` matrix.
    pub fn load2(&self, id: &str) -> crate::Result<Array2<f32>> {
        let file = File::open(self.path_for(id)?)?;
        let array = Array2::<f32>::read_npy(BufReader::new(file))?;
        self.check_bins(id, array.shape())?;
        Ok(array)
    }

    /// Load a framed `(n_frames, frame_length, bins)` array.
    pub fn load3(&self, id: &str) -> crate::Result<Array3<f32>> {
        let file = File::open(self.path_for(id)?)?;
        let array = Array3::<f32>::read_npy(BufReader::new(file))?;
        self.check_bins(id, array.shape())?;
        if let Some(framing) = self.descriptor.framing
            && array.shape()[1] != framing.frame_length
        {
            return Err(crate::Error::IncompatibleFeatures {
                path: self.dir.join(Self::file_name(id)),
                reason: format!(
                    "frame length {} but store uses {}",
                    array.shape()[1],
                    framing.frame_length
                ),
            });
        }
        Ok(array)
    }

    /// Shape of the stored array for `id`, read back from disk.
    pub fn stored_shape(&self, id: &str) -> crate::Result<Vec<usize>> {
        Ok(match self.descriptor.ndim() {
            3 => self.load3(id)?.shape().to_vec(),
            _ => self.load2(id)?.shape().to_vec(),
        })
    }

    pub fn write_index(&self, entries: &[IndexEntry]) -> crate::Result<()> {
        atomic_write_json(self.dir.join(INDEX_FILE), entries)
    }

    pub fn read_index(&self) -> crate::Result<Vec<IndexEntry>> {
        read_json(self.dir.join(INDEX_FILE))
    }

    pub fn write_skipped(&self, skipped: &[SkipRecord]) -> crate::Result<()> {
        atomic_write_json(self.dir.join(SKIPPED_FILE), skipped)
    }

    pub fn read_skipped(&self) -> crate::Result<Vec<SkipRecord>> {
        read_json(self.dir.join(SKIPPED_FILE))
    }
}
