//! Seeded train/validation partitioning and split manifests.

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::Path;

use crate::utils::{atomic_write_json, read_json, valid_ratio};

pub const TRAIN_FILE: &str = "train_files.json";
pub const VAL_FILE: &str = "val_files.json";
pub const SPLIT_INFO_FILE: &str = "split.json";

/// Partition tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Partition {
    Train,
    Val,
}

impl std::str::FromStr for Partition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "train" => Ok(Partition::Train),
            "val" => Ok(Partition::Val),
            other => Err(format!("unknown partition `{other}`")),
        }
    }
}

/// The `(seed, ratio)` pair a generated split came from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SplitParams {
    pub seed: u64,
    pub ratio: f64,
}

/// Mapping from identifier to partition.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SplitAssignment {
    params: Option<SplitParams>,
    members: BTreeMap<String, Partition>,
}

impl SplitAssignment {
    /// Build an assignment from explicit lists.
    ///
    /// # Errors
    /// [`crate::Error::InvalidParameter`] if an identifier appears twice.
    pub fn from_lists<S: AsRef<str>>(
        train: &[S],
        val: &[S],
        params: Option<SplitParams>,
    ) -> crate::Result<Self> {
        let mut members = BTreeMap::new();
        let tagged = train
            .iter()
            .map(|id| (id, Partition::Train))
            .chain(val.iter().map(|id| (id, Partition::Val)));
        for (id, part) in tagged {
            if members.insert(id.as_ref().to_string(), part).is_some() {
                return Err(crate::Error::InvalidParameter {
                    name: "identifiers",
                    value: id.as_ref().to_string(),
                    reason: "identifier listed more than once".to_string(),
                });
            }
        }
        Ok(Self { params, members })
    }

    pub fn params(&self) -> Option<SplitParams> {
        self.params
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn partition_of(&self, id: &str) -> Option<Partition> {
        self.members.get(id).copied()
    }

    /// Identifiers of one partition, sorted.
    pub fn ids(&self, partition: Partition) -> Vec<&str> {
        self.members
            .iter()
            .filter(|(_, p)| **p == partition)
            .map(|(id, _)| id.as_str())
            .collect()
    }

    pub fn train(&self) -> Vec<&str> {
        self.ids(Partition::Train)
    }

    pub fn val(&self) -> Vec<&str> {
        self.ids(Partition::Val)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Partition)> {
        self.members.iter().map(|(id, p)| (id.as_str(), *p))
    }
}

/// Number of validation items for `n` identifiers.
///
/// `floor(n * ratio)`, raised to one when there is at least one identifier
/// and `ratio > 0`.
pub fn val_count(n: usize, ratio: f64) -> usize {
    if n == 0 || ratio <= 0.0 {
        return 0;
    }
    (((n as f64) * ratio).floor() as usize).clamp(1, n)
}

/// Partition `identifiers` into train/val with a seeded permutation.
///
/// Identifiers are sorted before shuffling, so the result depends only on
/// the identifier set, `ratio` and `seed`. The first [`val_count`] entries
/// of the shuffled order form the validation set.
///
/// # Errors
/// * [`crate::Error::InvalidParameter`] if `ratio` is outside `[0, 1]` or an
///   identifier is duplicated
///
/// # Example
/// ```
/// use clipprep::split::random_split;
///
/// let ids: Vec<String> = (0..100).map(|i| i.to_string()).collect();
/// let a = random_split(&ids, 0.2, 42).unwrap();
/// assert_eq!(a.val().len(), 20);
/// assert_eq!(a.train().len(), 80);
/// assert_eq!(a, random_split(&ids, 0.2, 42).unwrap());
/// ```
pub fn random_split<S: AsRef<str>>(
    identifiers: &[S],
    ratio: f64,
    seed: u64,
) -> crate::Result<SplitAssignment> {
    valid_ratio(ratio, "ratio")?;

    let mut items: Vec<&str> = identifiers.iter().map(|s| s.as_ref()).collect();
    items.sort_unstable();
    if let Some(dup) = items.windows(2).find(|w| w[0] == w[1]) {
        return Err(crate::Error::InvalidParameter {
            name: "identifiers",
            value: dup[0].to_string(),
            reason: "identifier listed more than once".to_string(),
        });
    }

    let mut rng = StdRng::seed_from_u64(seed);
    items.shuffle(&mut rng);

    let n_val = val_count(items.len(), ratio);
    let (val, train) = items.split_at(n_val);
    log::debug!(
        "split {} identifiers (ratio {ratio}, seed {seed}): {} train / {} val",
        items.len(),
        train.len(),
        val.len()
    );
    SplitAssignment::from_lists(train, val, Some(SplitParams { seed, ratio }))
}

#[derive(Debug, Serialize, Deserialize)]
struct SplitInfo {
    seed: Option<u64>,
    ratio: Option<f64>,
    n_train: usize,
    n_val: usize,
    /// SHA-256 over both lists, see [`lists_digest`].
    digest: String,
}

/// Hex SHA-256 of the train and val lists in file order.
fn lists_digest<S: AsRef<str>>(train: &[S], val: &[S]) -> String {
    let mut hasher = Sha256::new();
    for (tag, ids) in [(Partition::Train, train), (Partition::Val, val)] {
        hasher.update(format!("{tag:?}").as_bytes());
        hasher.update([0u8]);
        for id in ids {
            hasher.update(id.as_ref().as_bytes());
            hasher.update(b"\n");
        }
    }
    hex::encode(hasher.finalize())
}

/// Persist `assignment` into `output_dir`.
///
/// Writes `train_files.json` and `val_files.json` (sorted identifier lists)
/// and then `split.json` (seed, ratio, counts and a digest of both lists).
/// Each file is written to a temporary file and renamed into place. An
/// interrupted rewrite leaves a `split.json` whose digest no longer matches
/// the lists, which [`read_split_files`] reports.
pub fn write_split_files<P: AsRef<Path>>(
    assignment: &SplitAssignment,
    output_dir: P,
) -> crate::Result<()> {
    let dir = output_dir.as_ref();
    let train = assignment.train();
    let val = assignment.val();
    atomic_write_json(dir.join(TRAIN_FILE), &train)?;
    atomic_write_json(dir.join(VAL_FILE), &val)?;
    let info = SplitInfo {
        seed: assignment.params.map(|p| p.seed),
        ratio: assignment.params.map(|p| p.ratio),
        n_train: train.len(),
        n_val: val.len(),
        digest: lists_digest(&train, &val),
    };
    atomic_write_json(dir.join(SPLIT_INFO_FILE), &info)?;
    log::info!(
        "wrote split manifest to {} ({} train / {} val)",
        dir.display(),
        info.n_train,
        info.n_val
    );
    Ok(())
}

/// Load a manifest written by [`write_split_files`].
///
/// `split.json` is optional, so hand-written lists load without params.
///
/// # Errors
/// [`crate::Error::Manifest`] if the lists overlap or disagree with
/// `split.json` (counts or digest).
pub fn read_split_files<P: AsRef<Path>>(output_dir: P) -> crate::Result<SplitAssignment> {
    let dir = output_dir.as_ref();
    let train: Vec<String> = read_json(dir.join(TRAIN_FILE))?;
    let val: Vec<String> = read_json(dir.join(VAL_FILE))?;

    let info_path = dir.join(SPLIT_INFO_FILE);
    let params = if info_path.is_file() {
        let info: SplitInfo = read_json(&info_path)?;
        if info.n_train != train.len() || info.n_val != val.len() {
            return Err(crate::Error::Manifest {
                path: info_path,
                reason: format!(
                    "counts {}/{} do not match lists {}/{}",
                    info.n_train,
                    info.n_val,
                    train.len(),
                    val.len()
                ),
            });
        }
        if info.digest != lists_digest(&train, &val) {
            return Err(crate::Error::Manifest {
                path: info_path,
                reason: "digest does not match the train/val lists".to_string(),
            });
        }
        match (info.seed, info.ratio) {
            (Some(seed), Some(ratio)) => Some(SplitParams { seed, ratio }),
            _ => None,
        }
    } else {
        None
    };

    SplitAssignment::from_lists(&train, &val, params).map_err(|e| crate::Error::Manifest {
        path: dir.to_path_buf(),
        reason: e.to_string(),
    })
}
