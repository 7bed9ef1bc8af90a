use std::path::PathBuf;

/// Crate-level error type for clipprep.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid parameter value.
    #[error("invalid parameter `{name}`: got {value}, {reason}")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    /// A required dimension is zero or invalid.
    #[error("invalid size for `{name}`: {value} ({reason})")]
    InvalidSize {
        name: &'static str,
        value: usize,
        reason: &'static str,
    },

    /// Audio data is empty when a non-empty signal was required.
    #[error("audio data is empty")]
    EmptyAudio,

    /// Audio data contains non-finite values (NaN or Inf).
    #[error("audio data contains non-finite values")]
    NonFiniteAudio,

    /// None of the candidate directories holds the dataset layout.
    #[error("dataset not found; tried: {}", display_paths(.tried))]
    DatasetNotFound { tried: Vec<PathBuf> },

    /// The file could be opened but its audio could not be decoded.
    #[error("cannot decode {}: {reason}", .path.display())]
    Decode { path: PathBuf, reason: String },

    /// The container or codec is not one we can read.
    #[error("unsupported audio format in {}: {reason}", .path.display())]
    UnsupportedFormat { path: PathBuf, reason: String },

    /// Ground truth or vocabulary file does not match the expected schema.
    #[error("malformed labels in {}: {reason}", .path.display())]
    MalformedLabels { path: PathBuf, reason: String },

    /// Waveform is shorter than one analysis window.
    #[error("waveform too short: {samples} samples, need at least {required}")]
    TooShort { samples: usize, required: usize },

    /// A split manifest is unreadable or inconsistent.
    #[error("invalid split manifest in {}: {reason}", .path.display())]
    Manifest { path: PathBuf, reason: String },

    /// Stored features were produced with different parameters.
    #[error("incompatible feature store at {}: {reason}", .path.display())]
    IncompatibleFeatures { path: PathBuf, reason: String },

    /// Resampler construction or processing failed.
    #[error("resampling error: {0}")]
    Resample(String),

    /// File I/O errors.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    NpyRead(#[from] ndarray_npy::ReadNpyError),

    #[error(transparent)]
    NpyWrite(#[from] ndarray_npy::WriteNpyError),

    #[error(transparent)]
    Wav(#[from] hound::Error),
}

impl Error {
    /// Whether the error concerns a single clip and a batch may continue past it.
    ///
    /// Structural problems (missing dataset, bad schema, unwritable output)
    /// return `false`.
    pub fn is_per_file(&self) -> bool {
        matches!(
            self,
            Error::Decode { .. }
                | Error::UnsupportedFormat { .. }
                | Error::TooShort { .. }
                | Error::EmptyAudio
                | Error::NonFiniteAudio
                | Error::Resample(_)
        )
    }

    /// Short machine-readable tag used in skip manifests.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::InvalidParameter { .. } => "invalid_parameter",
            Error::InvalidSize { .. } => "invalid_size",
            Error::EmptyAudio => "empty_audio",
            Error::NonFiniteAudio => "non_finite_audio",
            Error::DatasetNotFound { .. } => "dataset_not_found",
            Error::Decode { .. } => "decode",
            Error::UnsupportedFormat { .. } => "unsupported_format",
            Error::MalformedLabels { .. } => "malformed_labels",
            Error::TooShort { .. } => "too_short",
            Error::Manifest { .. } => "manifest",
            Error::IncompatibleFeatures { .. } => "incompatible_features",
            Error::Resample(_) => "resample",
            Error::Io(_) => "io",
            Error::Json(_) => "json",
            Error::Csv(_) => "csv",
            Error::NpyRead(_) => "npy_read",
            Error::NpyWrite(_) => "npy_write",
            Error::Wav(_) => "wav",
        }
    }
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Convenience Result type for clipprep operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn per_file_classification() {
        let decode = Error::Decode {
            path: PathBuf::from("a.wav"),
            reason: "bad header".into(),
        };
        assert!(decode.is_per_file());
        assert!(Error::TooShort { samples: 10, required: 1024 }.is_per_file());

        let missing = Error::DatasetNotFound { tried: vec![] };
        assert!(!missing.is_per_file());
        let labels = Error::MalformedLabels {
            path: PathBuf::from("dev.csv"),
            reason: "missing column".into(),
        };
        assert!(!labels.is_per_file());
    }

    #[test]
    fn dataset_not_found_lists_candidates() {
        let err = Error::DatasetNotFound {
            tried: vec![PathBuf::from("/a"), PathBuf::from("/b")],
        };
        let msg = err.to_string();
        assert!(msg.contains("/a"));
        assert!(msg.contains("/b"));
    }
}
