use num_complex::Complex32;
use realfft::{RealFftPlanner, RealToComplex};
use std::sync::Arc;

/// Cached real-to-complex FFT plan.
///
/// One plan is built per spectrogram and reused for every frame.
///
/// # Example
/// ```
/// use clipprep::fft::RealFftPlan;
///
/// let plan = RealFftPlan::new(8);
/// let mut frame = vec![1.0f32; 8];
/// let spectrum = plan.forward(&mut frame);
/// assert_eq!(spectrum.len(), 5);
/// assert!((spectrum[0].re - 8.0).abs() < 1e-5);
/// ```
pub struct RealFftPlan {
    r2c: Arc<dyn RealToComplex<f32>>,
    len: usize,
}

impl RealFftPlan {
    /// Create a plan for real input of length `len`.
    pub fn new(len: usize) -> Self {
        let mut planner = RealFftPlanner::<f32>::new();
        let r2c = planner.plan_fft_forward(len);
        Self { r2c, len }
    }

    /// Input length this plan was built for.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the plan was built for zero-length input.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of non-redundant output bins, `len / 2 + 1`.
    pub fn n_bins(&self) -> usize {
        self.len / 2 + 1
    }

    /// Transform `input` (clobbered as scratch) and return the half spectrum.
    ///
    /// `input.len()` must equal [`RealFftPlan::len`].
    pub fn forward(&self, input: &mut [f32]) -> Vec<Complex32> {
        let mut out = self.r2c.make_output_vec();
        // Length is fixed by construction, so process cannot fail here.
        let _ = self.r2c.process(input, &mut out);
        out
    }
}
