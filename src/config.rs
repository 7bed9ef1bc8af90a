//! Run configuration.
//!
//! A [`PipelineConfig`] is the single source of every tunable used by a
//! batch run. It is read from JSON with unknown fields rejected, so a typo in
//! a config file fails loudly instead of silently falling back to a default.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::feature::{FeatureConfig, FeatureKind};
use crate::frame::FramingConfig;
use crate::store::FeatureDescriptor;
use crate::utils::{atomic_write_json, read_json, valid_ratio};

/// Sample rate clips are loaded at unless configured otherwise.
pub const DEFAULT_SAMPLE_RATE: u32 = 32000;

/// Train/validation split parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SplitConfig {
    /// Fraction of identifiers assigned to validation, in `[0, 1]`.
    pub ratio: f64,
    pub seed: u64,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            ratio: 0.2,
            seed: 42,
        }
    }
}

/// Everything a batch run needs to know.
///
/// # Example
/// ```
/// use clipprep::config::PipelineConfig;
///
/// let config = PipelineConfig::default();
/// assert_eq!(config.features.sample_rate, 32000);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    pub features: FeatureConfig,
    /// Cut each feature matrix into fixed-length frames before saving.
    #[serde(deserialize_with = "Option::deserialize")]
    pub framing: Option<FramingConfig>,
    /// Clip or zero-pad each matrix to this many time steps. Only used
    /// without framing.
    #[serde(deserialize_with = "Option::deserialize")]
    pub max_frames: Option<usize>,
    pub split: SplitConfig,
    /// Recompute clips whose output already exists.
    pub overwrite: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            features: FeatureConfig::new(FeatureKind::LogMel, DEFAULT_SAMPLE_RATE),
            framing: None,
            max_frames: None,
            split: SplitConfig::default(),
            overwrite: false,
        }
    }
}

impl PipelineConfig {
    pub fn with_features(mut self, features: FeatureConfig) -> Self {
        self.features = features;
        self
    }

    pub fn with_framing(mut self, framing: Option<FramingConfig>) -> Self {
        self.framing = framing;
        self
    }

    pub fn with_max_frames(mut self, max_frames: Option<usize>) -> Self {
        self.max_frames = max_frames;
        self
    }

    pub fn with_split(mut self, split: SplitConfig) -> Self {
        self.split = split;
        self
    }

    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    /// Check every section.
    ///
    /// # Errors
    /// [`crate::Error::InvalidParameter`] or [`crate::Error::InvalidSize`]
    /// naming the first offending field.
    pub fn validate(&self) -> crate::Result<()> {
        self.features.validate()?;
        if let Some(framing) = &self.framing {
            framing.validate()?;
            if self.max_frames.is_some() {
                return Err(crate::Error::InvalidParameter {
                    name: "max_frames",
                    value: format!("{:?}", self.max_frames),
                    reason: "cannot be combined with framing".to_string(),
                });
            }
        }
        if self.max_frames == Some(0) {
            return Err(crate::Error::InvalidSize {
                name: "max_frames",
                value: 0,
                reason: "must be > 0",
            });
        }
        valid_ratio(self.split.ratio, "split.ratio")?;
        Ok(())
    }

    /// Descriptor for a feature store written with this configuration.
    pub fn descriptor(&self) -> FeatureDescriptor {
        FeatureDescriptor::new(self.features.clone(), self.framing, self.max_frames)
    }

    /// Read and validate a JSON config file.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let config: Self = read_json(path)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_file<P: AsRef<Path>>(&self, path: P) -> crate::Result<()> {
        atomic_write_json(path, self)
    }

    /// Log the effective configuration at info level.
    pub fn log_effective(&self) {
        match serde_json::to_string(self) {
            Ok(json) => log::info!("effective config: {json}"),
            Err(e) => log::warn!("cannot serialize config: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::FramePolicy;

    #[test]
    fn test_json_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let config = PipelineConfig::default()
            .with_framing(Some(FramingConfig::new(128, 64, FramePolicy::Drop)))
            .with_overwrite(true);
        config.to_json_file(&path).unwrap();
        assert_eq!(PipelineConfig::from_json_file(&path).unwrap(), config);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let mut value = serde_json::to_value(PipelineConfig::default()).unwrap();
        value["features"]["n_melz"] = serde_json::json!(64);
        std::fs::write(&path, value.to_string()).unwrap();
        assert!(matches!(
            PipelineConfig::from_json_file(&path),
            Err(crate::Error::Json(_))
        ));
    }

    #[test]
    fn test_missing_optional_field_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let full = serde_json::to_value(PipelineConfig::default()).unwrap();
        for field in ["framing", "max_frames"] {
            let mut value = full.clone();
            value.as_object_mut().unwrap().remove(field);
            std::fs::write(&path, value.to_string()).unwrap();
            assert!(
                matches!(
                    PipelineConfig::from_json_file(&path),
                    Err(crate::Error::Json(_))
                ),
                "missing `{field}` accepted"
            );
        }

        let mut value = full;
        value["features"].as_object_mut().unwrap().remove("top_db");
        std::fs::write(&path, value.to_string()).unwrap();
        assert!(PipelineConfig::from_json_file(&path).is_err());
    }

    #[test]
    fn test_validate() {
        let bad_ratio = PipelineConfig::default().with_split(SplitConfig {
            ratio: 1.5,
            seed: 0,
        });
        assert!(bad_ratio.validate().is_err());

        let both = PipelineConfig::default()
            .with_framing(Some(FramingConfig::new(4, 4, FramePolicy::Pad)))
            .with_max_frames(Some(10));
        assert!(both.validate().is_err());

        let zero_hop = PipelineConfig::default()
            .with_framing(Some(FramingConfig::new(4, 0, FramePolicy::Pad)));
        assert!(matches!(
            zero_hop.validate(),
            Err(crate::Error::InvalidSize { name: "hop", .. })
        ));

        let bad_mfcc = PipelineConfig::default()
            .with_features(FeatureConfig::new(FeatureKind::Mfcc, 16000).with_n_mfcc(100));
        assert!(bad_mfcc.validate().is_err());
    }
}
