//! Dataset contents: audio file enumeration, ground-truth labels and the
//! label vocabulary.
//!
//! Ground truth is read from `{dev,eval}.csv` with a header row:
//!
//! ```text
//! fname,labels,mids,split
//! 64760,"Electric_guitar,Guitar,Music","/m/02sgy,/m/0342h,/m/04rlf",train
//! ```
//!
//! `labels` and `mids` hold comma-separated lists; `mids` and `split` are
//! optional columns. `vocabulary.csv` is headerless `index,label,mid`.

use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use crate::paths::{DatasetRoot, Subset};
use crate::split::{Partition, SplitAssignment};
use crate::utils::{atomic_write_json, read_json};

/// One audio file on disk, identified by its stem.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct AudioFile {
    pub id: String,
    pub path: PathBuf,
}

fn is_wav(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("wav"))
}

/// Audio files of one directory.
///
/// Holds only the directory; every call to [`AudioFiles::iter`] reads it
/// again, so a listing can be restarted and reflects the current contents.
#[derive(Debug, Clone)]
pub struct AudioFiles {
    dir: PathBuf,
}

impl AudioFiles {
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Scan the directory and yield `.wav` files sorted by id.
    ///
    /// When two files share a stem (e.g. `a.wav` and `a.WAV`) the first in
    /// path order is kept and the other is reported with `log::warn!`.
    pub fn iter(&self) -> crate::Result<std::vec::IntoIter<AudioFile>> {
        let mut files: Vec<AudioFile> = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if !path.is_file() || !is_wav(&path) {
                continue;
            }
            let id = crate::io::clip_id(&path);
            if id.is_empty() {
                continue;
            }
            files.push(AudioFile { id, path });
        }
        files.sort();

        let before = files.len();
        files.dedup_by(|later, earlier| {
            let dup = later.id == earlier.id;
            if dup {
                log::warn!(
                    "ignoring {}: id `{}` already taken by {}",
                    later.path.display(),
                    later.id,
                    earlier.path.display()
                );
            }
            dup
        });
        log::debug!(
            "{}: {} audio files ({} duplicates)",
            self.dir.display(),
            files.len(),
            before - files.len()
        );
        Ok(files.into_iter())
    }

    /// Sorted identifiers of the current listing.
    pub fn ids(&self) -> crate::Result<Vec<String>> {
        Ok(self.iter()?.map(|f| f.id).collect())
    }

    pub fn count(&self) -> crate::Result<usize> {
        Ok(self.iter()?.len())
    }
}

/// Audio files of a dataset subset.
pub fn list_audio_files(root: &DatasetRoot, subset: Subset) -> AudioFiles {
    AudioFiles::in_dir(root.audio_dir(subset))
}

/// Labels attached to one clip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelRecord {
    pub id: String,
    pub labels: Vec<String>,
    pub mids: Vec<String>,
    /// Partition suggested by the dataset itself, when the file has a
    /// `split` column.
    pub split_hint: Option<Partition>,
}

/// Parsed ground truth of one subset, ordered by id.
#[derive(Debug, Clone)]
pub struct GroundTruth {
    source: PathBuf,
    records: BTreeMap<String, LabelRecord>,
}

fn malformed(path: &Path, reason: impl Into<String>) -> crate::Error {
    crate::Error::MalformedLabels {
        path: path.to_path_buf(),
        reason: reason.into(),
    }
}

fn split_list(field: &str) -> Vec<String> {
    field
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

impl GroundTruth {
    /// Parse a ground-truth CSV.
    ///
    /// # Errors
    /// [`crate::Error::MalformedLabels`] when `fname` or `labels` columns are
    /// missing, a row has an empty id or label list, a `split` value is not
    /// `train`/`val`, or an id repeats.
    pub fn from_csv(path: &Path) -> crate::Result<Self> {
        let file = std::fs::File::open(path)?;
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(file);
        let headers: Vec<String> = reader.headers()?.iter().map(|h| h.to_string()).collect();
        let column = |name: &str| headers.iter().position(|h| h == name);

        let fname_idx = column("fname").ok_or_else(|| malformed(path, "missing column `fname`"))?;
        let labels_idx =
            column("labels").ok_or_else(|| malformed(path, "missing column `labels`"))?;
        let mids_idx = column("mids");
        let split_idx = column("split");

        let mut records = BTreeMap::new();
        for result in reader.records() {
            let record = result?;
            let line = record.position().map_or(0, |p| p.line());

            let id = record.get(fname_idx).unwrap_or("").to_string();
            if id.is_empty() {
                return Err(malformed(path, format!("line {line}: empty `fname`")));
            }
            let labels = split_list(record.get(labels_idx).unwrap_or(""));
            if labels.is_empty() {
                return Err(malformed(path, format!("line {line}: `{id}` has no labels")));
            }
            let mids = mids_idx
                .and_then(|i| record.get(i))
                .map(split_list)
                .unwrap_or_default();
            let split_hint = match split_idx.and_then(|i| record.get(i)) {
                None | Some("") => None,
                Some(v) => Some(v.parse::<Partition>().map_err(|e| {
                    malformed(path, format!("line {line}: {e}"))
                })?),
            };

            let rec = LabelRecord {
                id: id.clone(),
                labels,
                mids,
                split_hint,
            };
            if records.insert(id.clone(), rec).is_some() {
                return Err(malformed(path, format!("line {line}: duplicate id `{id}`")));
            }
        }

        log::debug!("{}: {} labelled clips", path.display(), records.len());
        Ok(Self {
            source: path.to_path_buf(),
            records,
        })
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&LabelRecord> {
        self.records.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &LabelRecord> {
        self.records.values()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.records.keys().map(String::as_str)
    }

    /// Every listed audio file must have a ground-truth row.
    ///
    /// Rows without a matching file are tolerated and only counted in the log.
    pub fn check_files(&self, files: &[AudioFile]) -> crate::Result<()> {
        let mut seen = 0usize;
        for f in files {
            if !self.records.contains_key(&f.id) {
                return Err(malformed(
                    &self.source,
                    format!("no labels for audio file {}", f.path.display()),
                ));
            }
            seen += 1;
        }
        if seen < self.records.len() {
            log::warn!(
                "{}: {} labelled clips have no audio file",
                self.source.display(),
                self.records.len() - seen
            );
        }
        Ok(())
    }

    /// Every label used by a row must exist in `vocab`.
    pub fn check_vocabulary(&self, vocab: &Vocabulary) -> crate::Result<()> {
        for rec in self.records.values() {
            if let Some(unknown) = rec.labels.iter().find(|l| vocab.index_of(l).is_none()) {
                return Err(malformed(
                    &self.source,
                    format!("`{}` uses label `{unknown}` missing from the vocabulary", rec.id),
                ));
            }
        }
        Ok(())
    }

    /// The partition shipped with the dataset, from the `split` column.
    ///
    /// # Errors
    /// [`crate::Error::MalformedLabels`] if any row has no split value.
    pub fn official_split(&self) -> crate::Result<SplitAssignment> {
        let mut train = Vec::new();
        let mut val = Vec::new();
        for rec in self.records.values() {
            match rec.split_hint {
                Some(Partition::Train) => train.push(rec.id.as_str()),
                Some(Partition::Val) => val.push(rec.id.as_str()),
                None => {
                    return Err(malformed(
                        &self.source,
                        format!("`{}` has no split value", rec.id),
                    ));
                }
            }
        }
        SplitAssignment::from_lists(&train, &val, None)
    }
}

/// Ground truth of `subset` under `root`.
pub fn load_ground_truth(root: &DatasetRoot, subset: Subset) -> crate::Result<GroundTruth> {
    GroundTruth::from_csv(&root.ground_truth_csv(subset))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct VocabEntry {
    index: usize,
    label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    mid: Option<String>,
}

/// Ordered set of labels; a label's class index is its position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vocabulary {
    labels: Vec<String>,
    mids: Vec<Option<String>>,
    index: HashMap<String, usize>,
}

impl Vocabulary {
    fn build(path: &Path, entries: Vec<VocabEntry>) -> crate::Result<Self> {
        let mut labels = Vec::with_capacity(entries.len());
        let mut mids = Vec::with_capacity(entries.len());
        let mut index = HashMap::with_capacity(entries.len());
        for (pos, e) in entries.into_iter().enumerate() {
            if e.index != pos {
                return Err(malformed(
                    path,
                    format!("index {} at position {pos}; indices must be 0..n in order", e.index),
                ));
            }
            if e.label.is_empty() {
                return Err(malformed(path, format!("empty label at index {pos}")));
            }
            if index.insert(e.label.clone(), pos).is_some() {
                return Err(malformed(path, format!("label `{}` listed twice", e.label)));
            }
            labels.push(e.label);
            mids.push(e.mid);
        }
        Ok(Self { labels, mids, index })
    }

    /// Vocabulary over the distinct `labels`, sorted lexicographically.
    pub fn from_labels<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let unique: BTreeSet<String> = labels
            .into_iter()
            .map(|l| l.as_ref().to_string())
            .filter(|l| !l.is_empty())
            .collect();
        let labels: Vec<String> = unique.into_iter().collect();
        let index = labels
            .iter()
            .enumerate()
            .map(|(i, l)| (l.clone(), i))
            .collect();
        Self {
            mids: vec![None; labels.len()],
            labels,
            index,
        }
    }

    /// Read a headerless `index,label[,mid]` CSV.
    pub fn from_csv(path: &Path) -> crate::Result<Self> {
        let file = std::fs::File::open(path)?;
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(file);

        let mut entries = Vec::new();
        for result in reader.records() {
            let record = result?;
            let line = record.position().map_or(0, |p| p.line());
            if record.len() < 2 {
                return Err(malformed(path, format!("line {line}: expected index,label[,mid]")));
            }
            let raw = &record[0];
            let index = raw
                .parse::<usize>()
                .map_err(|_| malformed(path, format!("line {line}: bad index `{raw}`")))?;
            entries.push(VocabEntry {
                index,
                label: record[1].to_string(),
                mid: record.get(2).filter(|m| !m.is_empty()).map(str::to_string),
            });
        }
        Self::build(path, entries)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn index_of(&self, label: &str) -> Option<usize> {
        self.index.get(label).copied()
    }

    pub fn label(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }

    pub fn mid(&self, index: usize) -> Option<&str> {
        self.mids.get(index).and_then(|m| m.as_deref())
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Multi-hot target vector of length [`Vocabulary::len`].
    ///
    /// # Errors
    /// [`crate::Error::InvalidParameter`] for a label outside the vocabulary.
    pub fn multi_hot<S: AsRef<str>>(&self, labels: &[S]) -> crate::Result<Array1<f32>> {
        let mut target = Array1::<f32>::zeros(self.len());
        for l in labels {
            let l = l.as_ref();
            let i = self.index_of(l).ok_or_else(|| crate::Error::InvalidParameter {
                name: "label",
                value: l.to_string(),
                reason: "not in vocabulary".to_string(),
            })?;
            target[i] = 1.0;
        }
        Ok(target)
    }

    fn entries(&self) -> Vec<VocabEntry> {
        self.labels
            .iter()
            .zip(&self.mids)
            .enumerate()
            .map(|(index, (label, mid))| VocabEntry {
                index,
                label: label.clone(),
                mid: mid.clone(),
            })
            .collect()
    }

    /// Write `vocabulary.json` style output: an array of
    /// `{ "index", "label", "mid"? }` objects.
    pub fn write_json<P: AsRef<Path>>(&self, path: P) -> crate::Result<()> {
        atomic_write_json(path, &self.entries())
    }

    pub fn read_json<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let path = path.as_ref();
        let entries: Vec<VocabEntry> = read_json(path)?;
        Self::build(path, entries)
    }
}

/// Vocabulary of the dataset.
///
/// Uses `vocabulary.csv` when present. Otherwise the vocabulary is derived
/// from the dev ground truth and sorted lexicographically, so it does not
/// depend on row order.
pub fn load_vocabulary(root: &DatasetRoot) -> crate::Result<Vocabulary> {
    let csv_path = root.vocabulary_csv();
    if csv_path.is_file() {
        let vocab = Vocabulary::from_csv(&csv_path)?;
        log::debug!("{}: {} labels", csv_path.display(), vocab.len());
        return Ok(vocab);
    }
    log::info!(
        "{} not found, deriving vocabulary from dev ground truth",
        csv_path.display()
    );
    let gt = load_ground_truth(root, Subset::Dev)?;
    Ok(Vocabulary::from_labels(
        gt.iter().flat_map(|r| r.labels.iter()),
    ))
}

/// File counts per subset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetSummary {
    pub root: PathBuf,
    pub dev_files: usize,
    pub eval_files: usize,
}

impl DatasetSummary {
    pub fn collect(root: &DatasetRoot) -> crate::Result<Self> {
        Ok(Self {
            root: root.path().to_path_buf(),
            dev_files: list_audio_files(root, Subset::Dev).count()?,
            eval_files: list_audio_files(root, Subset::Eval).count()?,
        })
    }
}

impl std::fmt::Display for DatasetSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "dataset root: {}", self.root.display())?;
        writeln!(f, "dev audio files: {}", self.dev_files)?;
        write!(f, "eval audio files: {}", self.eval_files)
    }
}
