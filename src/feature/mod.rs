//! Spectral feature extraction.
//!
//! [`mel`] and [`mfcc`] hold the free functions; [`FeatureExtractor`] ties
//! them to one explicit [`FeatureConfig`] so every clip of a run is computed
//! with identical parameters and an identical bin count.

pub mod mel;
pub mod mfcc;

use crate::io::AudioClip;
use crate::spectrum::{DbReference, power_to_db};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Which spectral representation to compute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureKind {
    LogMel,
    Mfcc,
}

impl std::fmt::Display for FeatureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FeatureKind::LogMel => f.write_str("log_mel"),
            FeatureKind::Mfcc => f.write_str("mfcc"),
        }
    }
}

/// What to do with waveforms shorter than one analysis window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShortClipPolicy {
    /// Fail with [`crate::Error::TooShort`].
    Reject,
    /// Zero-pad the waveform to `n_fft`, producing exactly one time step.
    PadToWindow,
}

/// Feature extraction parameters.
///
/// Every field changes the numbers produced, so the whole struct is recorded
/// in the feature store descriptor.
///
/// # Example
/// ```
/// use clipprep::feature::{FeatureConfig, FeatureKind};
///
/// let config = FeatureConfig::new(FeatureKind::Mfcc, 32000)
///     .with_n_mels(64)
///     .with_n_mfcc(20);
/// assert_eq!(config.bins(), 20);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FeatureConfig {
    pub kind: FeatureKind,
    /// Sample rate clips must have, in Hz.
    pub sample_rate: u32,
    /// FFT window length in samples.
    pub n_fft: usize,
    /// Stride between windows in samples.
    pub hop_length: usize,
    pub n_mels: usize,
    /// Coefficients kept for [`FeatureKind::Mfcc`]; ignored for log-mel.
    pub n_mfcc: usize,
    /// Lowest filterbank frequency in Hz.
    pub fmin: f32,
    /// Highest filterbank frequency in Hz; `None` means Nyquist.
    #[serde(deserialize_with = "Option::deserialize")]
    pub fmax: Option<f32>,
    pub db_reference: DbReference,
    /// Power floor applied before the logarithm.
    pub amin: f32,
    #[serde(deserialize_with = "Option::deserialize")]
    pub top_db: Option<f32>,
    pub short_clip: ShortClipPolicy,
}

impl FeatureConfig {
    /// Configuration with the conventional analysis defaults
    /// (`n_fft = 1024`, `hop_length = 512`, 64 mels, 20 MFCCs).
    pub fn new(kind: FeatureKind, sample_rate: u32) -> Self {
        Self {
            kind,
            sample_rate,
            n_fft: 1024,
            hop_length: 512,
            n_mels: 64,
            n_mfcc: 20,
            fmin: 0.0,
            fmax: None,
            db_reference: DbReference::Max,
            amin: mel::AMIN,
            top_db: Some(mel::TOP_DB),
            short_clip: ShortClipPolicy::Reject,
        }
    }

    pub fn with_n_fft(mut self, n_fft: usize) -> Self {
        self.n_fft = n_fft;
        self
    }

    pub fn with_hop_length(mut self, hop_length: usize) -> Self {
        self.hop_length = hop_length;
        self
    }

    pub fn with_n_mels(mut self, n_mels: usize) -> Self {
        self.n_mels = n_mels;
        self
    }

    pub fn with_n_mfcc(mut self, n_mfcc: usize) -> Self {
        self.n_mfcc = n_mfcc;
        self
    }

    pub fn with_fmin(mut self, fmin: f32) -> Self {
        self.fmin = fmin;
        self
    }

    pub fn with_fmax(mut self, fmax: Option<f32>) -> Self {
        self.fmax = fmax;
        self
    }

    pub fn with_db_reference(mut self, reference: DbReference) -> Self {
        self.db_reference = reference;
        self
    }

    pub fn with_top_db(mut self, top_db: Option<f32>) -> Self {
        self.top_db = top_db;
        self
    }

    pub fn with_short_clip(mut self, policy: ShortClipPolicy) -> Self {
        self.short_clip = policy;
        self
    }

    /// Number of feature bins every output matrix will have.
    pub fn bins(&self) -> usize {
        match self.kind {
            FeatureKind::LogMel => self.n_mels,
            FeatureKind::Mfcc => self.n_mfcc,
        }
    }

    /// Number of time steps produced for a waveform of `len` samples, or
    /// `None` if the short-clip policy would reject it.
    pub fn time_steps(&self, len: usize) -> Option<usize> {
        if self.hop_length == 0 || len == 0 {
            return None;
        }
        if len < self.n_fft {
            return match self.short_clip {
                ShortClipPolicy::Reject => None,
                ShortClipPolicy::PadToWindow => Some(1),
            };
        }
        Some((len - self.n_fft) / self.hop_length + 1)
    }

    pub fn validate(&self) -> crate::Result<()> {
        let sizes = [
            ("sample_rate", self.sample_rate as usize),
            ("n_fft", self.n_fft),
            ("hop_length", self.hop_length),
            ("n_mels", self.n_mels),
        ];
        for (name, value) in sizes {
            if value == 0 {
                return Err(crate::Error::InvalidSize {
                    name,
                    value,
                    reason: "must be > 0",
                });
            }
        }
        if self.kind == FeatureKind::Mfcc {
            mfcc::check_n_mfcc(self.n_mfcc, self.n_mels)?;
        }
        let nyquist = self.sample_rate as f32 / 2.0;
        let fmax = self.fmax.unwrap_or(nyquist);
        if !(0.0..nyquist).contains(&self.fmin) || fmax <= self.fmin {
            return Err(crate::Error::InvalidParameter {
                name: "fmin",
                value: format!("{} (fmax {fmax})", self.fmin),
                reason: format!("need 0 <= fmin < fmax and fmin < {nyquist}"),
            });
        }
        if self.amin.is_nan() || self.amin <= 0.0 {
            return Err(crate::Error::InvalidParameter {
                name: "amin",
                value: self.amin.to_string(),
                reason: "must be > 0".to_string(),
            });
        }
        Ok(())
    }
}

/// A `(time_steps, bins)` feature matrix for one clip.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    pub id: String,
    pub kind: FeatureKind,
    pub data: Array2<f32>,
    /// Parameters the matrix was computed with.
    pub params: FeatureConfig,
}

impl FeatureMatrix {
    pub fn time_steps(&self) -> usize {
        self.data.nrows()
    }

    pub fn bins(&self) -> usize {
        self.data.ncols()
    }
}

/// Computes features for clips under one fixed configuration.
#[derive(Debug, Clone)]
pub struct FeatureExtractor {
    config: FeatureConfig,
}

impl FeatureExtractor {
    /// Validate `config` and build an extractor.
    pub fn new(config: FeatureConfig) -> crate::Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &FeatureConfig {
        &self.config
    }

    /// Extract features from a clip.
    ///
    /// # Errors
    /// * [`crate::Error::InvalidParameter`] if the clip's sample rate differs
    ///   from the configured one
    /// * [`crate::Error::TooShort`] for clips shorter than `n_fft` under
    ///   [`ShortClipPolicy::Reject`]
    /// * [`crate::Error::EmptyAudio`] / [`crate::Error::NonFiniteAudio`]
    pub fn extract(&self, clip: &AudioClip) -> crate::Result<FeatureMatrix> {
        if clip.sample_rate != self.config.sample_rate {
            return Err(crate::Error::InvalidParameter {
                name: "sample_rate",
                value: clip.sample_rate.to_string(),
                reason: format!(
                    "clip `{}` must be at {} Hz",
                    clip.id, self.config.sample_rate
                ),
            });
        }
        let data = self.compute(&clip.samples)?;
        Ok(FeatureMatrix {
            id: clip.id.clone(),
            kind: self.config.kind,
            data,
            params: self.config.clone(),
        })
    }

    /// Compute the feature matrix of a raw waveform at the configured rate.
    pub fn compute(&self, waveform: &[f32]) -> crate::Result<Array2<f32>> {
        let cfg = &self.config;
        crate::utils::valid_audio(waveform)?;

        let padded;
        let y = if waveform.len() < cfg.n_fft {
            match cfg.short_clip {
                ShortClipPolicy::Reject => {
                    return Err(crate::Error::TooShort {
                        samples: waveform.len(),
                        required: cfg.n_fft,
                    });
                }
                ShortClipPolicy::PadToWindow => {
                    let mut buf = waveform.to_vec();
                    buf.resize(cfg.n_fft, 0.0);
                    padded = buf;
                    &padded[..]
                }
            }
        } else {
            waveform
        };

        let fmax = cfg.fmax.unwrap_or(cfg.sample_rate as f32 / 2.0);
        let mel = mel::melspectrogram_with_range(
            y,
            cfg.sample_rate,
            cfg.n_fft,
            cfg.hop_length,
            cfg.n_mels,
            cfg.fmin,
            fmax,
        )?;
        let log_mel = power_to_db(&mel, cfg.db_reference, cfg.amin, cfg.top_db);

        match cfg.kind {
            FeatureKind::LogMel => Ok(log_mel),
            FeatureKind::Mfcc => mfcc::mfcc_from_log_mel(&log_mel, cfg.n_mfcc),
        }
    }
}
