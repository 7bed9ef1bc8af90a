use crate::feature::mel::log_mel;
use ndarray::Array2;

/// Orthonormal DCT-II basis of shape `(n_out, n_in)`.
///
/// Row `k` holds `scale_k * cos(pi / n_in * (i + 0.5) * k)` with
/// `scale_0 = sqrt(1 / n_in)` and `scale_k = sqrt(2 / n_in)` otherwise.
pub fn dct_basis(n_out: usize, n_in: usize) -> Array2<f32> {
    let mut basis = Array2::<f32>::zeros((n_out, n_in));
    if n_in == 0 {
        return basis;
    }
    let n = n_in as f64;
    for k in 0..n_out {
        let scale = if k == 0 {
            (1.0 / n).sqrt()
        } else {
            (2.0 / n).sqrt()
        };
        for i in 0..n_in {
            let angle = std::f64::consts::PI / n * (i as f64 + 0.5) * k as f64;
            basis[(k, i)] = (scale * angle.cos()) as f32;
        }
    }
    basis
}

/// Compute the Discrete Cosine Transform (DCT) Type-II with orthonormal
/// scaling, keeping the first `n_out` coefficients.
///
/// # Example
/// ```
/// use clipprep::feature::mfcc::dct_type_ii;
///
/// let dct = dct_type_ii(&[1.0, 1.0, 1.0, 1.0], 4);
/// assert!((dct[0] - 2.0).abs() < 1e-6);
/// assert!(dct[1].abs() < 1e-6);
/// ```
pub fn dct_type_ii(x: &[f32], n_out: usize) -> Vec<f32> {
    if x.is_empty() || n_out == 0 {
        return Vec::new();
    }
    let basis = dct_basis(n_out, x.len());
    basis.dot(&ndarray::ArrayView1::from(x)).to_vec()
}

/// Apply a DCT-II along the bin axis of a time-major log-mel matrix.
///
/// # Returns
/// Matrix of shape `(n_frames, n_mfcc)`
pub fn mfcc_from_log_mel(log_mel: &Array2<f32>, n_mfcc: usize) -> crate::Result<Array2<f32>> {
    let n_mels = log_mel.ncols();
    check_n_mfcc(n_mfcc, n_mels)?;
    let basis = dct_basis(n_mfcc, n_mels);
    Ok(log_mel.dot(&basis.t()))
}

pub(crate) fn check_n_mfcc(n_mfcc: usize, n_mels: usize) -> crate::Result<()> {
    if n_mfcc == 0 || n_mfcc > n_mels {
        return Err(crate::Error::InvalidParameter {
            name: "n_mfcc",
            value: n_mfcc.to_string(),
            reason: format!("must be within 1..={n_mels} (n_mels)"),
        });
    }
    Ok(())
}

/// Compute Mel-Frequency Cepstral Coefficients (MFCCs).
///
/// # Arguments
/// * `waveform` - Input audio signal (mono)
/// * `sample_rate` - Sample rate in Hz
/// * `n_mfcc` - Number of coefficients to keep (`<= n_mels`)
/// * `n_mels` - Number of mel bands in the underlying log-mel
/// * `n_fft` - FFT window size
/// * `hop_length` - Number of samples between frames
///
/// # Returns
/// MFCC matrix of shape `(n_frames, n_mfcc)`
///
/// # Example
/// ```
/// use clipprep::feature::mfcc::mfcc;
///
/// let signal = vec![0.1f32; 16000];
/// let coeffs = mfcc(&signal, 16000, 20, 64, 1024, 512).unwrap();
/// assert_eq!(coeffs.shape(), &[30, 20]);
/// ```
pub fn mfcc(
    waveform: &[f32],
    sample_rate: u32,
    n_mfcc: usize,
    n_mels: usize,
    n_fft: usize,
    hop_length: usize,
) -> crate::Result<Array2<f32>> {
    check_n_mfcc(n_mfcc, n_mels)?;
    let s = log_mel(waveform, sample_rate, n_mels, n_fft, hop_length)?;
    mfcc_from_log_mel(&s, n_mfcc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io;
    use approx::assert_relative_eq;

    #[test]
    fn test_dct_basis_orthonormal() {
        let n = 16;
        let b = dct_basis(n, n);
        let gram = b.dot(&b.t());
        for i in 0..n {
            for j in 0..n {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert_relative_eq!(gram[(i, j)], expected, epsilon = 1e-5);
            }
        }
    }

    #[test]
    fn test_mfcc_first_coeffs_of_log_mel() {
        let y = io::tone(440.0, 16000, 0.5);
        let s = log_mel(&y, 16000, 40, 512, 256).unwrap();
        let c = mfcc(&y, 16000, 13, 40, 512, 256).unwrap();
        assert_eq!(c.nrows(), s.nrows());
        assert_eq!(c.ncols(), 13);

        let full = dct_type_ii(&s.row(3).to_vec(), 40);
        for k in 0..13 {
            assert_relative_eq!(c[(3, k)], full[k], epsilon = 1e-3, max_relative = 1e-4);
        }
    }

    #[test]
    fn test_mfcc_rejects_too_many_coeffs() {
        let y = vec![0.1f32; 4096];
        let err = mfcc(&y, 16000, 65, 64, 1024, 512).unwrap_err();
        assert!(matches!(err, crate::Error::InvalidParameter { name: "n_mfcc", .. }));
    }
}
