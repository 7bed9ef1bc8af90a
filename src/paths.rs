//! Dataset root discovery.
//!
//! The dataset may live in different places depending on the machine: an
//! explicit environment variable, a repository-local `data/raw` folder, or a
//! mounted cloud drive. [`PathResolver`] probes an ordered list of candidate
//! directories and returns the first one holding the expected layout.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable that points directly at the dataset root.
pub const ENV_VAR: &str = "FSD50K_DIR";

/// Dataset partition as shipped (not the train/val split we generate).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Subset {
    Dev,
    Eval,
}

impl Subset {
    pub fn as_str(&self) -> &'static str {
        match self {
            Subset::Dev => "dev",
            Subset::Eval => "eval",
        }
    }
}

impl std::fmt::Display for Subset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Subset {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s {
            "dev" => Ok(Subset::Dev),
            "eval" => Ok(Subset::Eval),
            other => Err(crate::Error::InvalidParameter {
                name: "subset",
                value: other.to_string(),
                reason: "must be `dev` or `eval`".to_string(),
            }),
        }
    }
}

/// Child entries a directory must contain to count as a dataset root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetLayout {
    pub dev_audio: String,
    pub eval_audio: String,
    pub ground_truth: String,
    pub metadata: String,
}

impl DatasetLayout {
    /// The FSD50K release layout.
    pub fn fsd50k() -> Self {
        Self {
            dev_audio: "FSD50K.dev_audio".to_string(),
            eval_audio: "FSD50K.eval_audio".to_string(),
            ground_truth: "FSD50K.ground_truth".to_string(),
            metadata: "FSD50K.metadata".to_string(),
        }
    }

    fn required(&self) -> [&str; 4] {
        [
            self.dev_audio.as_str(),
            self.eval_audio.as_str(),
            self.ground_truth.as_str(),
            self.metadata.as_str(),
        ]
    }

    /// Whether `dir` contains every required entry.
    pub fn matches(&self, dir: &Path) -> bool {
        dir.is_dir() && self.required().iter().all(|name| dir.join(name).exists())
    }
}

impl Default for DatasetLayout {
    fn default() -> Self {
        Self::fsd50k()
    }
}

/// A directory known to hold the dataset layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetRoot {
    path: PathBuf,
    layout: DatasetLayout,
}

impl DatasetRoot {
    /// Wrap `path` after checking it holds `layout`.
    pub fn new(path: impl Into<PathBuf>, layout: DatasetLayout) -> crate::Result<Self> {
        let path = path.into();
        if !layout.matches(&path) {
            return Err(crate::Error::DatasetNotFound { tried: vec![path] });
        }
        Ok(Self { path, layout })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn audio_dir(&self, subset: Subset) -> PathBuf {
        match subset {
            Subset::Dev => self.path.join(&self.layout.dev_audio),
            Subset::Eval => self.path.join(&self.layout.eval_audio),
        }
    }

    pub fn ground_truth_dir(&self) -> PathBuf {
        self.path.join(&self.layout.ground_truth)
    }

    /// `dev.csv` or `eval.csv` inside the ground-truth directory.
    pub fn ground_truth_csv(&self, subset: Subset) -> PathBuf {
        self.ground_truth_dir().join(format!("{subset}.csv"))
    }

    pub fn vocabulary_csv(&self) -> PathBuf {
        self.ground_truth_dir().join("vocabulary.csv")
    }

    pub fn metadata_dir(&self) -> PathBuf {
        self.path.join(&self.layout.metadata)
    }
}

/// Ordered list of candidate roots, probed first to last.
#[derive(Debug, Clone)]
pub struct PathResolver {
    candidates: Vec<PathBuf>,
    layout: DatasetLayout,
}

impl PathResolver {
    /// Build a resolver over `candidates`; duplicates are dropped, keeping
    /// the first occurrence.
    pub fn new<I, P>(candidates: I, layout: DatasetLayout) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let mut unique: Vec<PathBuf> = Vec::new();
        for c in candidates {
            let c = c.into();
            if !unique.contains(&c) {
                unique.push(c);
            }
        }
        Self {
            candidates: unique,
            layout,
        }
    }

    /// Default FSD50K search order:
    /// 1. `$FSD50K_DIR`
    /// 2. `./data/raw/FSD50K`
    /// 3. `/content/drive/MyDrive/FSD50K`
    /// 4. `/content/drive/MyDrive/Data/FSD50K`
    pub fn fsd50k() -> Self {
        let env = std::env::var(ENV_VAR).ok();
        Self::new(default_candidates(env.as_deref()), DatasetLayout::fsd50k())
    }

    pub fn candidates(&self) -> &[PathBuf] {
        &self.candidates
    }

    /// Return the first candidate holding the layout, if any.
    pub fn find(&self) -> Option<DatasetRoot> {
        for cand in &self.candidates {
            if self.layout.matches(cand) {
                log::debug!("dataset root found at {}", cand.display());
                return Some(DatasetRoot {
                    path: cand.clone(),
                    layout: self.layout.clone(),
                });
            }
            log::trace!("no dataset at {}", cand.display());
        }
        None
    }

    /// Like [`PathResolver::find`] but fails with
    /// [`crate::Error::DatasetNotFound`] listing every candidate tried.
    pub fn resolve(&self) -> crate::Result<DatasetRoot> {
        self.find().ok_or_else(|| crate::Error::DatasetNotFound {
            tried: self.candidates.clone(),
        })
    }
}

/// Candidate roots for a given value of the environment override.
pub fn default_candidates(env_value: Option<&str>) -> Vec<PathBuf> {
    let mut cands = Vec::new();
    if let Some(v) = env_value.filter(|v| !v.is_empty()) {
        cands.push(expand_tilde(v));
    }
    cands.push(PathBuf::from("data").join("raw").join("FSD50K"));
    cands.push(PathBuf::from("/content/drive/MyDrive/FSD50K"));
    cands.push(PathBuf::from("/content/drive/MyDrive/Data/FSD50K"));
    cands
}

pub(crate) fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/")
        && let Some(home) = std::env::var_os("HOME")
    {
        return PathBuf::from(home).join(rest);
    }
    PathBuf::from(path)
}
