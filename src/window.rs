/// Compute a periodic Hann (raised cosine) window.
///
/// The periodic form is the one used for spectral analysis: sample `n` of the
/// underlying `n + 1`-point symmetric window is dropped so that consecutive
/// frames tile smoothly.
///
/// # Arguments
/// * `n` - Window length
///
/// # Returns
/// Hann window of length `n`
pub fn hann(n: usize) -> Vec<f32> {
    if n == 0 {
        return Vec::new();
    }
    if n == 1 {
        return vec![1.0];
    }
    let m = n as f64;
    (0..n)
        .map(|i| (0.5 - 0.5 * (2.0 * std::f64::consts::PI * i as f64 / m).cos()) as f32)
        .collect()
}
