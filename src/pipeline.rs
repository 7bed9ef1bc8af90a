//! Batch feature extraction.
//!
//! [`run_batch`] takes a file listing through load, extract, frame and save.
//! Clips are independent and, with the `parallel` feature, run on the rayon
//! pool. A clip that cannot be decoded or is too short is logged and
//! recorded in `skipped.json`; anything else (an unwritable store, a bad
//! configuration) aborts the batch.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::config::PipelineConfig;
use crate::feature::FeatureExtractor;
use crate::frame::{fix_frames, frame, stack_frames};
use crate::io::load_mono;
use crate::metadata::AudioFile;
use crate::store::{FeatureStore, INDEX_FILE, IndexEntry, SKIPPED_FILE, SkipRecord};

/// Summary of one batch run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Arrays present in the store after the run, sorted by id. Entries
    /// from earlier runs are kept for clips this run did not process, as
    /// long as their array is still on disk.
    pub index: Vec<IndexEntry>,
    /// Clips that failed, sorted by id. Earlier records are kept for clips
    /// this run did not process.
    pub skipped: Vec<SkipRecord>,
    /// Clips computed in this run.
    pub written: usize,
    /// Clips whose existing output was kept.
    pub reused: usize,
    /// Clips not started because the run was cancelled.
    pub cancelled: usize,
}

impl BatchReport {
    pub fn was_cancelled(&self) -> bool {
        self.cancelled > 0
    }
}

enum Outcome {
    Written(IndexEntry),
    Reused(IndexEntry),
    Skipped(SkipRecord),
    Cancelled,
}

struct Worker<'a> {
    config: &'a PipelineConfig,
    extractor: FeatureExtractor,
    store: &'a FeatureStore,
    cancel: Option<&'a AtomicBool>,
}

impl Worker<'_> {
    fn process(&self, file: &AudioFile) -> crate::Result<Outcome> {
        if self.cancel.is_some_and(|c| c.load(Ordering::Relaxed)) {
            return Ok(Outcome::Cancelled);
        }

        if !self.config.overwrite && self.store.contains(&file.id) {
            match self.store.stored_shape(&file.id) {
                Ok(shape) => {
                    log::debug!("{}: reusing existing features", file.id);
                    return Ok(Outcome::Reused(self.entry(&file.id, shape)));
                }
                Err(e) => log::warn!("{}: existing features unreadable, recomputing: {e}", file.id),
            }
        }

        match self.compute(file) {
            Ok(shape) => Ok(Outcome::Written(self.entry(&file.id, shape))),
            Err(e) if e.is_per_file() => {
                log::warn!("skipping {}: {e}", file.path.display());
                Ok(Outcome::Skipped(SkipRecord::new(&file.id, &file.path, &e)))
            }
            Err(e) => Err(e),
        }
    }

    fn compute(&self, file: &AudioFile) -> crate::Result<Vec<usize>> {
        let features = &self.config.features;
        let clip = load_mono(&file.path, features.sample_rate)?;
        let matrix = self.extractor.compute(&clip.samples)?;

        let shape = match self.config.framing {
            Some(framing) => {
                let frames = frame(
                    &file.id,
                    matrix.view(),
                    framing.frame_length,
                    framing.hop,
                    framing.policy,
                )?;
                if frames.is_empty() {
                    log::debug!(
                        "{}: {} time steps yield no full frame of {}",
                        file.id,
                        matrix.nrows(),
                        framing.frame_length
                    );
                }
                let stacked = stack_frames(&frames, (framing.frame_length, features.bins()))?;
                self.store.save(&file.id, &stacked)?;
                stacked.shape().to_vec()
            }
            None => {
                let fixed = fix_frames(&matrix, self.config.max_frames);
                self.store.save(&file.id, &fixed)?;
                fixed.shape().to_vec()
            }
        };
        log::debug!("{}: wrote {:?}", file.id, shape);
        Ok(shape)
    }

    fn entry(&self, id: &str, shape: Vec<usize>) -> IndexEntry {
        IndexEntry {
            id: id.to_string(),
            file: FeatureStore::file_name(id),
            shape,
        }
    }
}

/// Extract features for `files` into `store`.
///
/// Setting `cancel` stops new clips from starting; clips already written
/// stay valid and are listed in the index. `index.json` and `skipped.json`
/// are written once, after all clips finish, merged with what earlier runs
/// recorded for clips outside this run.
///
/// # Errors
/// * the configuration is invalid or does not match the store descriptor
/// * a clip fails with an error that is not per-file (see
///   [`crate::Error::is_per_file`])
pub fn run_batch(
    files: &[AudioFile],
    config: &PipelineConfig,
    store: &FeatureStore,
    cancel: Option<&AtomicBool>,
) -> crate::Result<BatchReport> {
    config.validate()?;
    store.check_compatible(&config.descriptor())?;

    let worker = Worker {
        config,
        extractor: FeatureExtractor::new(config.features.clone())?,
        store,
        cancel,
    };
    log::info!(
        "extracting {} features for {} clips into {}",
        config.features.kind,
        files.len(),
        store.dir().display()
    );

    let outcomes: Vec<Outcome> = {
        #[cfg(feature = "parallel")]
        {
            use rayon::prelude::*;
            files
                .par_iter()
                .map(|f| worker.process(f))
                .collect::<crate::Result<Vec<_>>>()?
        }
        #[cfg(not(feature = "parallel"))]
        {
            files
                .iter()
                .map(|f| worker.process(f))
                .collect::<crate::Result<Vec<_>>>()?
        }
    };

    let mut report = BatchReport::default();
    for outcome in outcomes {
        match outcome {
            Outcome::Written(e) => {
                report.written += 1;
                report.index.push(e);
            }
            Outcome::Reused(e) => {
                report.reused += 1;
                report.index.push(e);
            }
            Outcome::Skipped(s) => report.skipped.push(s),
            Outcome::Cancelled => report.cancelled += 1,
        }
    }
    carry_over(store, &mut report);
    report.index.sort_by(|a, b| a.id.cmp(&b.id));
    report.skipped.sort_by(|a, b| a.id.cmp(&b.id));

    store.write_index(&report.index)?;
    store.write_skipped(&report.skipped)?;

    log::info!(
        "batch done: {} written, {} reused, {} skipped, {} cancelled",
        report.written,
        report.reused,
        report.skipped.len(),
        report.cancelled
    );
    Ok(report)
}

/// Merge the previous `index.json` and `skipped.json` into `report`.
///
/// Clips with an outcome in this run are taken from `report`. Old index
/// entries survive only while their array exists, and old skip records only
/// while the clip is not indexed.
fn carry_over(store: &FeatureStore, report: &mut BatchReport) {
    let processed: BTreeSet<String> = report
        .index
        .iter()
        .map(|e| e.id.clone())
        .chain(report.skipped.iter().map(|s| s.id.clone()))
        .collect();

    if store.dir().join(INDEX_FILE).is_file() {
        match store.read_index() {
            Ok(old) => report.index.extend(
                old.into_iter()
                    .filter(|e| !processed.contains(&e.id) && store.contains(&e.id)),
            ),
            Err(e) => log::warn!("ignoring unreadable previous index: {e}"),
        }
    }

    let indexed: BTreeSet<&str> = report.index.iter().map(|e| e.id.as_str()).collect();
    if store.dir().join(SKIPPED_FILE).is_file() {
        match store.read_skipped() {
            Ok(old) => {
                let kept: Vec<SkipRecord> = old
                    .into_iter()
                    .filter(|s| !processed.contains(&s.id) && !indexed.contains(s.id.as_str()))
                    .collect();
                report.skipped.extend(kept);
            }
            Err(e) => log::warn!("ignoring unreadable previous skip list: {e}"),
        }
    }
}

/// Files of `files` that have no stored output yet.
pub fn pending(files: &[AudioFile], store: &FeatureStore) -> Vec<PathBuf> {
    files
        .iter()
        .filter(|f| !store.contains(&f.id))
        .map(|f| f.path.clone())
        .collect()
}
