//! Audio clip preparation for sound-event classification datasets.
//!
//! Clipprep turns a directory tree of labelled audio clips (the FSD50K
//! layout by default) into model-ready inputs: time-major log-mel or MFCC
//! matrices stored as `.npy` files, a label vocabulary, and a seeded
//! train/validation split manifest.
//!
//! # Quick Start
//!
//! ```rust
//! use clipprep::feature::{FeatureConfig, FeatureExtractor, FeatureKind};
//! use clipprep::io::{AudioClip, tone};
//!
//! // One second of a 440 Hz tone at 16 kHz
//! let clip = AudioClip::new("a440", tone(440.0, 16000, 1.0), 16000);
//!
//! let extractor = FeatureExtractor::new(FeatureConfig::new(FeatureKind::LogMel, 16000)).unwrap();
//! let features = extractor.extract(&clip).unwrap();
//! assert_eq!(features.data.shape(), &[30, 64]); // (time_steps, n_mels)
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`paths`] | Dataset root discovery over ordered candidate directories |
//! | [`io`] | Decoding, mono downmix, resampling, WAV writing |
//! | [`spectrum`] | Power spectrogram and dB conversion |
//! | [`feature`] | Mel filterbank, log-mel, MFCC, [`feature::FeatureExtractor`] |
//! | [`frame`] | Fixed-length framing and time-axis clipping/padding |
//! | [`metadata`] | Audio file listing, ground truth, vocabulary |
//! | [`split`] | Seeded train/validation split and manifests |
//! | [`store`] | `.npy` feature store with a JSON descriptor |
//! | [`pipeline`] | Parallel batch extraction with skip records |
//! | [`config`] | Serializable run configuration |
//! | [`fft`] | Cached real FFT plans |
//! | [`window`] | Hann window |
//! | [`utils`] | Atomic file output, input validation |
//!
//! # Error Handling
//!
//! All fallible operations return [`Result<T>`], an alias for
//! `std::result::Result<T, Error>`. [`Error::is_per_file`] separates errors
//! that concern one clip from those that should stop a batch.
//!
//! # Feature Flags
//!
//! | Flag | Description |
//! |------|-------------|
//! | `parallel` (default) | Process clips on the rayon thread pool |

#![deny(unsafe_code)]

pub mod error;
pub use error::{Error, Result};

pub mod config;
pub mod feature;
pub mod fft;
pub mod frame;
pub mod io;
pub mod metadata;
pub mod paths;
pub mod pipeline;
pub mod spectrum;
pub mod split;
pub mod store;
pub mod utils;
pub mod window;
