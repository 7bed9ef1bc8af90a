/// Validate a mono audio buffer.
///
/// # Returns
/// `Ok(())` if the signal is non-empty and every sample is finite.
///
/// # Example
/// ```
/// use clipprep::utils::valid_audio;
///
/// let y = vec![0.0, 0.5, -0.5, 0.0];
/// assert!(valid_audio(&y).is_ok());
///
/// let empty: Vec<f32> = vec![];
/// assert!(valid_audio(&empty).is_err());
/// ```
pub fn valid_audio(y: &[f32]) -> crate::Result<()> {
    if y.is_empty() {
        return Err(crate::Error::EmptyAudio);
    }

    if !y.iter().all(|&v| v.is_finite()) {
        return Err(crate::Error::NonFiniteAudio);
    }

    Ok(())
}

/// Ensure a split ratio lies in `[0, 1]`.
pub fn valid_ratio(ratio: f64, name: &'static str) -> crate::Result<()> {
    if !ratio.is_finite() || !(0.0..=1.0).contains(&ratio) {
        return Err(crate::Error::InvalidParameter {
            name,
            value: ratio.to_string(),
            reason: "must be within [0, 1]".to_string(),
        });
    }
    Ok(())
}
