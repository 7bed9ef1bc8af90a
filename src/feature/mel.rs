use crate::spectrum::{DbReference, StftConfig, power_spectrogram, power_to_db};
use ndarray::Array2;

/// Smallest power passed to the logarithm.
pub const AMIN: f32 = 1e-10;

/// Dynamic range kept below the peak, in dB.
pub const TOP_DB: f32 = 80.0;

/// Convert frequency in Hz to the (Slaney) mel scale.
///
/// Linear below 1 kHz, logarithmic above.
///
/// # Example
/// ```
/// use clipprep::feature::mel::hz_to_mel;
///
/// let mel = hz_to_mel(440.0);
/// assert!(mel > 6.0 && mel < 7.0);
/// ```
pub fn hz_to_mel(hz: f32) -> f32 {
    let f_sp = 200.0 / 3.0;
    let min_log_hz = 1000.0;
    let min_log_mel = min_log_hz / f_sp;
    let logstep = (6.4f32).ln() / 27.0;
    if hz < min_log_hz {
        hz / f_sp
    } else {
        min_log_mel + (hz / min_log_hz).ln() / logstep
    }
}

/// Convert frequency from the mel scale to Hz. Inverse of [`hz_to_mel`].
///
/// # Example
/// ```
/// use clipprep::feature::mel::{hz_to_mel, mel_to_hz};
///
/// let mel = hz_to_mel(440.0);
/// assert!((mel_to_hz(mel) - 440.0).abs() < 0.01);
/// ```
pub fn mel_to_hz(mel: f32) -> f32 {
    let f_sp = 200.0 / 3.0;
    let min_log_hz = 1000.0;
    let min_log_mel = min_log_hz / f_sp;
    let logstep = (6.4f32).ln() / 27.0;
    if mel < min_log_mel {
        mel * f_sp
    } else {
        min_log_hz * (logstep * (mel - min_log_mel)).exp()
    }
}

/// `n_mels` frequencies evenly spaced on the mel scale between `fmin` and
/// `fmax` (inclusive).
pub fn mel_frequencies(n_mels: usize, fmin: f32, fmax: f32) -> Vec<f32> {
    if n_mels == 0 {
        return Vec::new();
    }
    let mel_min = hz_to_mel(fmin.max(0.0));
    let mel_max = hz_to_mel(fmax.max(fmin));
    let step = (mel_max - mel_min) / (n_mels as f32 - 1.0).max(1.0);
    (0..n_mels)
        .map(|i| mel_to_hz(mel_min + step * i as f32))
        .collect()
}

/// Create a mel filterbank matrix.
///
/// Triangular filters with Slaney area normalization: each filter is scaled
/// by `2 / (f_upper - f_lower)`.
///
/// # Arguments
/// * `sr` - Sample rate in Hz
/// * `n_fft` - FFT window size
/// * `n_mels` - Number of mel bands
/// * `fmin` - Minimum frequency in Hz
/// * `fmax` - Maximum frequency in Hz (clipped to Nyquist)
///
/// # Returns
/// Matrix of shape `(n_mels, n_fft / 2 + 1)`
///
/// # Example
/// ```
/// use clipprep::feature::mel::mel_filterbank;
///
/// let fb = mel_filterbank(16000, 1024, 64, 0.0, 8000.0);
/// assert_eq!(fb.shape(), &[64, 513]);
/// ```
pub fn mel_filterbank(sr: u32, n_fft: usize, n_mels: usize, fmin: f32, fmax: f32) -> Array2<f32> {
    let n_freq = n_fft / 2 + 1;
    let mut fb = Array2::<f32>::zeros((n_mels, n_freq));
    if n_mels == 0 || n_fft == 0 {
        return fb;
    }

    let fmax = fmax.min(sr as f32 / 2.0).max(fmin);
    let mel_points = mel_frequencies(n_mels + 2, fmin, fmax);
    let fft_freqs: Vec<f32> = (0..n_freq)
        .map(|i| i as f32 * sr as f32 / n_fft as f32)
        .collect();

    for m in 0..n_mels {
        let f_lower = mel_points[m];
        let f_center = mel_points[m + 1];
        let f_upper = mel_points[m + 2];
        let denom_left = (f_center - f_lower).max(1e-8) as f64;
        let denom_right = (f_upper - f_center).max(1e-8) as f64;
        let enorm = 2.0 / (f_upper - f_lower).max(1e-8) as f64;

        for (k, &freq) in fft_freqs.iter().enumerate() {
            let lower = (freq - f_lower) as f64 / denom_left;
            let upper = (f_upper - freq) as f64 / denom_right;
            let w = lower.min(upper).max(0.0);
            fb[(m, k)] = (w * enorm) as f32;
        }
    }

    fb
}

/// Compute a mel power spectrogram.
///
/// # Returns
/// Matrix of shape `(n_frames, n_mels)` with
/// `n_frames = floor((len - n_fft) / hop_length) + 1`.
///
/// # Example
/// ```
/// use clipprep::feature::mel::melspectrogram;
///
/// let signal = vec![0.1f32; 16000];
/// let mel = melspectrogram(&signal, 16000, 1024, 512, 64).unwrap();
/// assert_eq!(mel.shape(), &[30, 64]);
/// ```
pub fn melspectrogram(
    y: &[f32],
    sr: u32,
    n_fft: usize,
    hop_length: usize,
    n_mels: usize,
) -> crate::Result<Array2<f32>> {
    melspectrogram_with_range(y, sr, n_fft, hop_length, n_mels, 0.0, sr as f32 / 2.0)
}

#[allow(clippy::too_many_arguments)]
pub(crate) fn melspectrogram_with_range(
    y: &[f32],
    sr: u32,
    n_fft: usize,
    hop_length: usize,
    n_mels: usize,
    fmin: f32,
    fmax: f32,
) -> crate::Result<Array2<f32>> {
    if n_mels == 0 {
        return Err(crate::Error::InvalidSize {
            name: "n_mels",
            value: 0,
            reason: "must be > 0",
        });
    }
    let power = power_spectrogram(y, &StftConfig::new(n_fft, hop_length))?;
    let fb = mel_filterbank(sr, n_fft, n_mels, fmin, fmax);
    Ok(power.dot(&fb.t()))
}

/// Compute a log-mel spectrogram in dB.
///
/// Power is taken relative to the loudest bin of the clip (so every value
/// is `<= 0`), floored at [`AMIN`] before the logarithm and clipped to
/// [`TOP_DB`] below the peak.
///
/// # Returns
/// Matrix of shape `(n_frames, n_mels)`
///
/// # Example
/// ```
/// use clipprep::feature::mel::log_mel;
/// use clipprep::io::tone;
///
/// let y = tone(440.0, 16000, 1.0);
/// let s = log_mel(&y, 16000, 64, 1024, 512).unwrap();
/// assert_eq!(s.shape(), &[30, 64]);
/// assert!(s.iter().all(|&v| v <= 0.0));
/// ```
pub fn log_mel(
    waveform: &[f32],
    sample_rate: u32,
    n_mels: usize,
    n_fft: usize,
    hop_length: usize,
) -> crate::Result<Array2<f32>> {
    let mel = melspectrogram(waveform, sample_rate, n_fft, hop_length, n_mels)?;
    Ok(power_to_db(&mel, DbReference::Max, AMIN, Some(TOP_DB)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io;
    use approx::assert_relative_eq;

    #[test]
    fn test_mel_roundtrip_scale() {
        for hz in [0.0, 100.0, 999.0, 1000.0, 4000.0, 11025.0] {
            assert_relative_eq!(mel_to_hz(hz_to_mel(hz)), hz, epsilon = 0.05);
        }
    }

    #[test]
    fn test_mel_frequencies_endpoints() {
        let f = mel_frequencies(10, 0.0, 8000.0);
        assert_eq!(f.len(), 10);
        assert_relative_eq!(f[0], 0.0);
        assert_relative_eq!(f[9], 8000.0, epsilon = 0.5);
        assert!(f.windows(2).all(|w| w[1] > w[0]));
    }

    #[test]
    fn test_filterbank_nonnegative_with_energy() {
        let fb = mel_filterbank(16000, 512, 40, 0.0, 8000.0);
        assert!(fb.iter().all(|&v| v >= 0.0));
        for m in 0..40 {
            assert!(fb.row(m).sum() > 0.0, "filter {m} is empty");
        }
    }

    #[test]
    fn test_log_mel_tone_peak_band() {
        let sr = 16000;
        let y = io::tone(1000.0, sr, 0.5);
        let s = log_mel(&y, sr, 64, 1024, 512).unwrap();
        let row = s.row(s.nrows() / 2);
        let peak = row
            .iter()
            .enumerate()
            .fold((0, f32::NEG_INFINITY), |acc, (i, &v)| if v > acc.1 { (i, v) } else { acc })
            .0;
        let centers = mel_frequencies(66, 0.0, 8000.0);
        let center = centers[peak + 1];
        assert!(
            (center - 1000.0).abs() < 200.0,
            "peak band centered at {center} Hz"
        );
    }

    #[test]
    fn test_log_mel_deterministic() {
        let y = io::tone(523.0, 16000, 0.3);
        let a = log_mel(&y, 16000, 64, 1024, 512).unwrap();
        let b = log_mel(&y, 16000, 64, 1024, 512).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_zero_mels_rejected() {
        assert!(melspectrogram(&[0.1; 2048], 16000, 1024, 512, 0).is_err());
    }
}
