use crate::fft::RealFftPlan;
use crate::window;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Short-time analysis parameters.
///
/// Frames are taken without centering: frame `t` covers samples
/// `[t * hop_length, t * hop_length + n_fft)`, so a signal of `n` samples
/// yields `floor((n - n_fft) / hop_length) + 1` frames.
#[derive(Debug, Clone, PartialEq)]
pub struct StftConfig {
    pub n_fft: usize,
    pub hop_length: usize,
    pub window: Vec<f32>,
}

impl StftConfig {
    /// Hann-windowed analysis with the given FFT size and hop.
    pub fn new(n_fft: usize, hop_length: usize) -> Self {
        Self {
            n_fft,
            hop_length,
            window: window::hann(n_fft),
        }
    }

    /// Number of analysis frames for a signal of `len` samples.
    pub fn n_frames(&self, len: usize) -> usize {
        if self.hop_length == 0 || len < self.n_fft {
            return 0;
        }
        (len - self.n_fft) / self.hop_length + 1
    }

    fn validate(&self) -> crate::Result<()> {
        if self.n_fft == 0 {
            return Err(crate::Error::InvalidSize {
                name: "n_fft",
                value: 0,
                reason: "must be > 0",
            });
        }
        if self.hop_length == 0 {
            return Err(crate::Error::InvalidSize {
                name: "hop_length",
                value: 0,
                reason: "must be > 0",
            });
        }
        if self.window.len() != self.n_fft {
            return Err(crate::Error::InvalidSize {
                name: "window",
                value: self.window.len(),
                reason: "window length must equal n_fft",
            });
        }
        Ok(())
    }
}

impl Default for StftConfig {
    fn default() -> Self {
        Self::new(1024, 512)
    }
}

/// Compute the power spectrogram `|STFT|^2`.
///
/// # Returns
/// Matrix of shape `(n_frames, n_fft / 2 + 1)`, one row per frame.
///
/// # Errors
/// [`crate::Error::TooShort`] if the signal is shorter than one window,
/// [`crate::Error::EmptyAudio`]/[`crate::Error::NonFiniteAudio`] for invalid
/// input, [`crate::Error::InvalidSize`] for zero sizes.
pub fn power_spectrogram(y: &[f32], config: &StftConfig) -> crate::Result<Array2<f32>> {
    crate::utils::valid_audio(y)?;
    config.validate()?;
    if y.len() < config.n_fft {
        return Err(crate::Error::TooShort {
            samples: y.len(),
            required: config.n_fft,
        });
    }

    let n_frames = config.n_frames(y.len());
    let plan = RealFftPlan::new(config.n_fft);
    let n_freq = plan.n_bins();

    let mut power = Array2::<f32>::zeros((n_frames, n_freq));
    let mut buffer = vec![0.0f32; config.n_fft];
    for t in 0..n_frames {
        let start = t * config.hop_length;
        let frame = &y[start..start + config.n_fft];
        for ((b, &s), &w) in buffer.iter_mut().zip(frame).zip(&config.window) {
            *b = s * w;
        }
        let spectrum = plan.forward(&mut buffer);
        for (f, c) in spectrum.iter().enumerate() {
            power[(t, f)] = c.re * c.re + c.im * c.im;
        }
    }

    Ok(power)
}

/// Reference level for decibel conversion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DbReference {
    /// Relative to the loudest value of the matrix, so output is `<= 0`.
    Max,
    /// Relative to a fixed power level.
    Fixed(f32),
}

/// Convert a power spectrogram to dB.
///
/// `S_db = 10 * log10(max(S, amin)) - 10 * log10(max(ref, amin))`, then
/// values more than `top_db` below the peak are raised to that floor.
///
/// `amin` keeps the logarithm away from zero.
pub fn power_to_db(
    power: &Array2<f32>,
    reference: DbReference,
    amin: f32,
    top_db: Option<f32>,
) -> Array2<f32> {
    let ref_power = match reference {
        DbReference::Max => power.iter().copied().fold(0.0f32, f32::max),
        DbReference::Fixed(v) => v,
    };
    let log_ref = 10.0 * ref_power.max(amin).log10();

    let mut db = power.mapv(|p| 10.0 * p.max(amin).log10() - log_ref);

    if let Some(top) = top_db {
        let max_db = db.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        let threshold = max_db - top;
        db.mapv_inplace(|v| v.max(threshold));
    }

    db
}
