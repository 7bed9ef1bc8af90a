//! Fixed-length framing of feature matrices and waveforms.
//!
//! Framing always runs along axis 0 (time). Frames are materialized as owned
//! copies so they can be persisted or shipped to another thread
//! independently of the source matrix.

use ndarray::{Array, Array1, Array2, Array3, ArrayView, ArrayView1, Axis, Dimension, Slice};
use serde::{Deserialize, Serialize};

/// Handling of the trailing frame when it would extend past the data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FramePolicy {
    /// Emit only frames that fit completely.
    Drop,
    /// Zero-pad the last frame to full length.
    Pad,
}

/// Frame length, hop and last-frame policy, in rows (time steps or samples).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FramingConfig {
    pub frame_length: usize,
    pub hop: usize,
    pub policy: FramePolicy,
}

impl FramingConfig {
    pub fn new(frame_length: usize, hop: usize, policy: FramePolicy) -> Self {
        Self {
            frame_length,
            hop,
            policy,
        }
    }

    pub fn validate(&self) -> crate::Result<()> {
        check_sizes(self.frame_length, self.hop)
    }
}

/// One fixed-length window of a longer sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame<D: Dimension> {
    /// Identifier of the clip the frame was cut from.
    pub source: String,
    /// Index of the first row in the source.
    pub start: usize,
    /// Frame contents; axis 0 has exactly `frame_length` rows.
    pub data: Array<f32, D>,
}

fn check_sizes(frame_length: usize, hop: usize) -> crate::Result<()> {
    if frame_length == 0 {
        return Err(crate::Error::InvalidSize {
            name: "frame_length",
            value: 0,
            reason: "must be > 0",
        });
    }
    if hop == 0 {
        return Err(crate::Error::InvalidSize {
            name: "hop",
            value: 0,
            reason: "must be > 0",
        });
    }
    Ok(())
}

/// Compute frame start offsets for a sequence of `len` rows.
///
/// * [`FramePolicy::Drop`]: `(len - frame_length) / hop + 1` frames, none if
///   `len < frame_length`.
/// * [`FramePolicy::Pad`]: one frame per hop until the data is covered; any
///   non-empty input yields at least one frame and no frame starts past the
///   end of the data.
///
/// # Example
/// ```
/// use clipprep::frame::{FramePolicy, frame_starts};
///
/// assert_eq!(frame_starts(10, 4, 4, FramePolicy::Drop).unwrap(), vec![0, 4]);
/// assert_eq!(frame_starts(10, 4, 4, FramePolicy::Pad).unwrap(), vec![0, 4, 8]);
/// ```
pub fn frame_starts(
    len: usize,
    frame_length: usize,
    hop: usize,
    policy: FramePolicy,
) -> crate::Result<Vec<usize>> {
    check_sizes(frame_length, hop)?;
    let n_frames = match policy {
        FramePolicy::Drop => {
            if len < frame_length {
                0
            } else {
                (len - frame_length) / hop + 1
            }
        }
        FramePolicy::Pad => {
            // Starts at or past `len` would be all padding.
            let covering = len.saturating_sub(frame_length).div_ceil(hop) + 1;
            covering.min(len.div_ceil(hop))
        }
    };
    Ok((0..n_frames).map(|i| i * hop).collect())
}

/// Slice `data` along axis 0 into fixed-length frames.
///
/// # Arguments
/// * `source` - Identifier recorded on every frame
/// * `data` - Sequence to frame; rows are time steps
/// * `frame_length` - Rows per frame
/// * `hop` - Rows between consecutive frame starts
/// * `policy` - Last partial frame handling
///
/// # Example
/// ```
/// use clipprep::frame::{FramePolicy, frame};
/// use ndarray::Array2;
///
/// let m = Array2::<f32>::ones((10, 3));
/// let frames = frame("clip", m.view(), 4, 2, FramePolicy::Drop).unwrap();
/// assert_eq!(frames.len(), 4);
/// assert_eq!(frames[1].start, 2);
/// assert_eq!(frames[1].data.shape(), &[4, 3]);
/// ```
pub fn frame<D: Dimension>(
    source: &str,
    data: ArrayView<'_, f32, D>,
    frame_length: usize,
    hop: usize,
    policy: FramePolicy,
) -> crate::Result<Vec<Frame<D>>> {
    if data.ndim() == 0 {
        return Err(crate::Error::InvalidSize {
            name: "data",
            value: 0,
            reason: "framing needs at least one axis",
        });
    }
    let len = data.len_of(Axis(0));
    let starts = frame_starts(len, frame_length, hop, policy)?;

    let mut frames = Vec::with_capacity(starts.len());
    for start in starts {
        let end = (start + frame_length).min(len);
        let available = data.slice_axis(Axis(0), Slice::from(start..end));
        let owned = if end - start == frame_length {
            available.to_owned()
        } else {
            let mut shape = data.raw_dim();
            shape[0] = frame_length;
            let mut out = Array::<f32, D>::zeros(shape);
            out.slice_axis_mut(Axis(0), Slice::from(0..end - start))
                .assign(&available);
            out
        };
        frames.push(Frame {
            source: source.to_string(),
            start,
            data: owned,
        });
    }
    Ok(frames)
}

/// Frame a mono waveform.
///
/// # Example
/// ```
/// use clipprep::frame::{FramePolicy, frame_signal};
///
/// let y = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
/// let frames = frame_signal("c", &y, 4, 2, FramePolicy::Drop).unwrap();
/// assert_eq!(frames.len(), 2);
/// assert_eq!(frames[1].data.to_vec(), vec![3.0, 4.0, 5.0, 6.0]);
/// ```
pub fn frame_signal(
    source: &str,
    y: &[f32],
    frame_length: usize,
    hop: usize,
    policy: FramePolicy,
) -> crate::Result<Vec<Frame<ndarray::Ix1>>> {
    frame(source, ArrayView1::from(y), frame_length, hop, policy)
}

/// Stack 2-D frames into one `(n_frames, frame_length, bins)` array.
///
/// All frames must share a shape; an empty slice needs the expected
/// `(frame_length, bins)` to shape the result.
pub fn stack_frames(
    frames: &[Frame<ndarray::Ix2>],
    frame_shape: (usize, usize),
) -> crate::Result<Array3<f32>> {
    let mut out = Array3::<f32>::zeros((frames.len(), frame_shape.0, frame_shape.1));
    for (i, f) in frames.iter().enumerate() {
        if f.data.dim() != frame_shape {
            return Err(crate::Error::InvalidParameter {
                name: "frames",
                value: format!("{:?}", f.data.dim()),
                reason: format!("expected every frame to be {frame_shape:?}"),
            });
        }
        out.index_axis_mut(Axis(0), i).assign(&f.data);
    }
    Ok(out)
}

/// Stack 1-D frames into an `(n_frames, frame_length)` array.
pub fn stack_signal_frames(
    frames: &[Frame<ndarray::Ix1>],
    frame_length: usize,
) -> crate::Result<Array2<f32>> {
    let mut out = Array2::<f32>::zeros((frames.len(), frame_length));
    for (i, f) in frames.iter().enumerate() {
        if f.data.len() != frame_length {
            return Err(crate::Error::InvalidSize {
                name: "frame_length",
                value: f.data.len(),
                reason: "frames must share one length",
            });
        }
        out.row_mut(i).assign(&f.data);
    }
    Ok(out)
}

/// Truncate or zero-pad a `(time, bins)` matrix to exactly `max_frames` rows.
///
/// `None` returns the matrix unchanged.
///
/// # Example
/// ```
/// use clipprep::frame::fix_frames;
/// use ndarray::Array2;
///
/// let m = Array2::<f32>::ones((3, 2));
/// let longer = fix_frames(&m, Some(5));
/// assert_eq!(longer.shape(), &[5, 2]);
/// assert_eq!(longer[(4, 0)], 0.0);
/// assert_eq!(fix_frames(&m, Some(2)).shape(), &[2, 2]);
/// ```
pub fn fix_frames(matrix: &Array2<f32>, max_frames: Option<usize>) -> Array2<f32> {
    let Some(max_frames) = max_frames else {
        return matrix.clone();
    };
    let mut out = Array2::<f32>::zeros((max_frames, matrix.ncols()));
    let keep = matrix.nrows().min(max_frames);
    out.slice_axis_mut(Axis(0), Slice::from(0..keep))
        .assign(&matrix.slice_axis(Axis(0), Slice::from(0..keep)));
    out
}

/// Truncate or zero-pad a waveform to `length` samples.
pub fn fix_length(y: &[f32], length: usize) -> Array1<f32> {
    let mut out = Array1::<f32>::zeros(length);
    let keep = y.len().min(length);
    out.slice_mut(ndarray::s![..keep]).assign(&ArrayView1::from(&y[..keep]));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_starts_policies() {
        assert_eq!(frame_starts(3, 4, 2, FramePolicy::Drop).unwrap(), Vec::<usize>::new());
        assert_eq!(frame_starts(3, 4, 2, FramePolicy::Pad).unwrap(), vec![0]);
        assert_eq!(frame_starts(0, 4, 2, FramePolicy::Pad).unwrap(), Vec::<usize>::new());
        assert_eq!(frame_starts(9, 4, 2, FramePolicy::Drop).unwrap(), vec![0, 2, 4]);
        assert_eq!(frame_starts(9, 4, 2, FramePolicy::Pad).unwrap(), vec![0, 2, 4, 6]);
    }

    #[test]
    fn test_frame_zero_sizes() {
        assert!(frame_starts(10, 0, 1, FramePolicy::Drop).is_err());
        assert!(frame_starts(10, 1, 0, FramePolicy::Pad).is_err());
    }

    #[test]
    fn test_exact_multiple_no_padding() {
        let m = Array2::from_shape_fn((12, 2), |(t, b)| (t * 2 + b) as f32 + 1.0);
        for policy in [FramePolicy::Drop, FramePolicy::Pad] {
            let frames = frame("x", m.view(), 4, 4, policy).unwrap();
            assert_eq!(frames.len(), 3);
            for f in &frames {
                assert!(f.data.iter().all(|&v| v > 0.0), "unexpected padding");
            }
        }
    }

    #[test]
    fn test_pad_last_frame() {
        let m = Array2::from_shape_fn((10, 2), |(t, _)| t as f32 + 1.0);
        let frames = frame("x", m.view(), 4, 4, FramePolicy::Pad).unwrap();
        assert_eq!(frames.len(), 3);
        let last = &frames[2];
        assert_eq!(last.start, 8);
        assert_eq!(last.data.shape(), &[4, 2]);
        assert_eq!(last.data[(0, 0)], 9.0);
        assert_eq!(last.data[(1, 0)], 10.0);
        assert_eq!(last.data[(2, 0)], 0.0);
        assert_eq!(last.data[(3, 1)], 0.0);
    }

    #[test]
    fn test_frames_are_independent_copies() {
        let mut m = Array2::<f32>::ones((4, 1));
        let frames = frame("x", m.view(), 2, 2, FramePolicy::Drop).unwrap();
        m.fill(5.0);
        assert!(frames.iter().all(|f| f.data.iter().all(|&v| v == 1.0)));
        assert!(frames.iter().all(|f| f.source == "x"));
    }

    #[test]
    fn test_stack_frames() {
        let m = Array2::from_shape_fn((6, 3), |(t, b)| (t * 3 + b) as f32);
        let frames = frame("x", m.view(), 3, 3, FramePolicy::Drop).unwrap();
        let stacked = stack_frames(&frames, (3, 3)).unwrap();
        assert_eq!(stacked.shape(), &[2, 3, 3]);
        assert_eq!(stacked[(1, 0, 0)], 9.0);

        let empty = stack_frames(&[], (3, 3)).unwrap();
        assert_eq!(empty.shape(), &[0, 3, 3]);
        assert!(stack_frames(&frames, (2, 3)).is_err());
    }

    #[test]
    fn test_signal_framing_and_stack() {
        let y: Vec<f32> = (0..10).map(|i| i as f32).collect();
        let frames = frame_signal("s", &y, 4, 3, FramePolicy::Pad).unwrap();
        let starts: Vec<usize> = frames.iter().map(|f| f.start).collect();
        assert_eq!(starts, vec![0, 3, 6]);
        let stacked = stack_signal_frames(&frames, 4).unwrap();
        assert_eq!(stacked.row(2).to_vec(), vec![6.0, 7.0, 8.0, 9.0]);
    }

    #[test]
    fn test_fix_length() {
        assert_eq!(fix_length(&[1.0, 2.0], 3).to_vec(), vec![1.0, 2.0, 0.0]);
        assert_eq!(fix_length(&[1.0, 2.0, 3.0], 2).to_vec(), vec![1.0, 2.0]);
    }
}
