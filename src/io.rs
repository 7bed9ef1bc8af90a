use hound::{SampleFormat, WavSpec, WavWriter};
use ndarray::{Array1, Array2, ArrayView2, Axis};
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use std::path::{Path, PathBuf};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::{Error, Result};

/// A decoded mono waveform at a known sample rate.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioClip {
    /// Clip identifier (file stem for dataset files).
    pub id: String,
    /// Mono samples in `[-1, 1]`.
    pub samples: Vec<f32>,
    /// Sample rate in Hz.
    pub sample_rate: u32,
}

impl AudioClip {
    pub fn new(id: impl Into<String>, samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            id: id.into(),
            samples,
            sample_rate,
        }
    }

    /// Duration in seconds.
    pub fn duration(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Identifier of an audio file: its file stem.
pub fn clip_id<P: AsRef<Path>>(path: P) -> String {
    path.as_ref()
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Load an audio file as a mono waveform at `target_sr`.
///
/// Multi-channel audio is collapsed by averaging channels, then resampled
/// when the native rate differs from `target_sr`. The returned clip always
/// has `sample_rate == target_sr`.
///
/// # Errors
/// * [`Error::UnsupportedFormat`] when no reader or codec recognises the file
/// * [`Error::Decode`] when the file is unreadable, corrupt, has no audio
///   track, or decodes to zero samples
///
/// # Example
/// ```no_run
/// use clipprep::io::load_mono;
///
/// let clip = load_mono("data/raw/FSD50K/FSD50K.dev_audio/63.wav", 32000).unwrap();
/// assert_eq!(clip.sample_rate, 32000);
/// ```
pub fn load_mono<P: AsRef<Path>>(path: P, target_sr: u32) -> Result<AudioClip> {
    let path = path.as_ref();
    if target_sr == 0 {
        return Err(Error::InvalidParameter {
            name: "target_sr",
            value: "0".to_string(),
            reason: "sample rate must be > 0".to_string(),
        });
    }

    let (mut interleaved, channels, native_sr) = decode_interleaved(path)?;
    let frames = interleaved.len() / channels;
    if frames == 0 {
        return Err(decode_error(path, "no audio frames decoded"));
    }
    interleaved.truncate(frames * channels);
    let interleaved = Array2::from_shape_vec((frames, channels), interleaved)
        .map_err(|e| decode_error(path, &e.to_string()))?;
    let mono = to_mono(interleaved.t());

    let samples = if native_sr != target_sr {
        let resampled = resample(&mono.insert_axis(Axis(0)), native_sr, target_sr)?;
        resampled.row(0).to_vec()
    } else {
        mono.to_vec()
    };

    if samples.iter().any(|v| !v.is_finite()) {
        return Err(decode_error(path, "decoded samples contain non-finite values"));
    }
    let samples: Vec<f32> = samples.into_iter().map(|v| v.clamp(-1.0, 1.0)).collect();

    log::debug!(
        "loaded {} ({} ch @ {} Hz -> {} samples @ {} Hz)",
        path.display(),
        channels,
        native_sr,
        samples.len(),
        target_sr
    );

    Ok(AudioClip::new(clip_id(path), samples, target_sr))
}

/// Decode the first audio track into interleaved f32 samples.
///
/// Returns `(samples, channels, sample_rate)`.
fn decode_interleaved(path: &Path) -> Result<(Vec<f32>, usize, u32)> {
    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let file = std::fs::File::open(path).map_err(|e| decode_error(path, &e.to_string()))?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());
    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| map_symphonia(path, e))?;

    let mut format = probed.format;
    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.sample_rate.is_some())
        .ok_or_else(|| decode_error(path, "no audio track found"))?
        .clone();

    let sample_rate = track.codec_params.sample_rate.unwrap_or(0);
    let mut channels = track
        .codec_params
        .channels
        .map(|c| c.count())
        .unwrap_or(0);

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| map_symphonia(path, e))?;

    let mut samples: Vec<f32> = Vec::new();
    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::ResetRequired) => {
                decoder.reset();
                continue;
            }
            Err(SymphoniaError::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(e) => return Err(map_symphonia(path, e)),
        };

        if packet.track_id() != track.id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(audio) => audio,
            Err(SymphoniaError::DecodeError(msg)) => {
                log::debug!("{}: skipping undecodable packet: {msg}", path.display());
                continue;
            }
            Err(e) => return Err(map_symphonia(path, e)),
        };

        if channels == 0 {
            channels = decoded.spec().channels.count();
        }
        let mut sb = SampleBuffer::<f32>::new(decoded.capacity() as u64, *decoded.spec());
        sb.copy_interleaved_ref(decoded);
        samples.extend_from_slice(sb.samples());
    }

    if channels == 0 || sample_rate == 0 {
        return Err(decode_error(path, "missing channel layout or sample rate"));
    }
    Ok((samples, channels, sample_rate))
}

fn decode_error(path: &Path, reason: &str) -> Error {
    Error::Decode {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}

fn map_symphonia(path: &Path, err: SymphoniaError) -> Error {
    match err {
        SymphoniaError::Unsupported(what) => Error::UnsupportedFormat {
            path: PathBuf::from(path),
            reason: what.to_string(),
        },
        other => decode_error(path, &other.to_string()),
    }
}

/// Resample every channel of `data` (shape `(channels, frames)`).
///
/// Uses windowed-sinc interpolation; the output length is
/// `round(frames * dst_sr / src_sr)`.
pub fn resample(data: &Array2<f32>, src_sr: u32, dst_sr: u32) -> Result<Array2<f32>> {
    if src_sr == dst_sr {
        return Ok(data.clone());
    }
    if src_sr == 0 || dst_sr == 0 {
        return Err(Error::InvalidParameter {
            name: "sample_rate",
            value: format!("{src_sr} -> {dst_sr}"),
            reason: "sample rates must be > 0".to_string(),
        });
    }

    let channels = data.shape().first().copied().unwrap_or(0);
    let frames = data.shape().get(1).copied().unwrap_or(0);
    if channels == 0 || frames == 0 {
        return Ok(Array2::<f32>::zeros((channels, 0)));
    }

    let input: Vec<Vec<f32>> = (0..channels).map(|ch| data.row(ch).to_vec()).collect();
    let resample_ratio = dst_sr as f64 / src_sr as f64;

    let chunk_size = 1024usize;
    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };
    let mut resampler = SincFixedIn::<f32>::new(resample_ratio, 2.0, params, chunk_size, channels)
        .map_err(|e| Error::Resample(e.to_string()))?;

    // The sinc filter delays the signal by half its length; feed trailing
    // silence until the delayed tail has been flushed out.
    let expected = ((frames as f64) * resample_ratio).round() as usize;
    let delay = resampler.output_delay();
    let mut output: Vec<Vec<f32>> = vec![Vec::new(); channels];
    let mut offset = 0usize;
    while output[0].len() < expected + delay {
        let mut chunk: Vec<Vec<f32>> = Vec::with_capacity(channels);
        for ch_data in &input {
            let mut buf = vec![0.0f32; chunk_size];
            if offset < frames {
                let end = (offset + chunk_size).min(frames);
                let slice = &ch_data[offset..end];
                buf[..slice.len()].copy_from_slice(slice);
            }
            chunk.push(buf);
        }

        let chunk_out = resampler
            .process(&chunk, None)
            .map_err(|e| Error::Resample(e.to_string()))?;
        for (out, res) in output.iter_mut().zip(chunk_out) {
            out.extend_from_slice(&res);
        }
        offset += chunk_size;
    }

    let mut out = Array2::<f32>::zeros((channels, expected));
    for (ch, ch_data) in output.iter().enumerate() {
        for i in 0..expected {
            out[(ch, i)] = ch_data[delay + i];
        }
    }
    Ok(out)
}

/// Average `(channels, frames)` audio into one waveform.
///
/// Zero channels give silence of the same length.
pub fn to_mono(data: ArrayView2<'_, f32>) -> Array1<f32> {
    data.mean_axis(Axis(0)).unwrap_or_else(|| Array1::zeros(data.ncols()))
}

/// Save audio data (shape `(channels, frames)`) to a 16-bit PCM WAV file.
///
/// Samples are clipped to `[-1.0, 1.0]` before quantization.
pub fn save_wav<P: AsRef<Path>>(path: P, data: &Array2<f32>, sample_rate: u32) -> Result<()> {
    let channels = data.shape().first().copied().unwrap_or(1) as u16;
    let frames = data.shape().get(1).copied().unwrap_or(0);

    let spec = WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut writer = WavWriter::create(path, spec)?;
    for frame in 0..frames {
        for ch in 0..channels as usize {
            let sample = data[(ch, frame)].clamp(-1.0, 1.0);
            writer.write_sample((sample * i16::MAX as f32) as i16)?;
        }
    }
    writer.finalize()?;
    Ok(())
}

/// Generate a pure tone.
pub fn tone(frequency: f32, sr: u32, duration: f32) -> Vec<f32> {
    let n_samples = (duration * sr as f32) as usize;
    let angular_freq = 2.0 * std::f32::consts::PI * frequency / sr as f32;
    (0..n_samples)
        .map(|i| (angular_freq * i as f32).sin())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn write_fixture(dir: &Path, name: &str, data: &Array2<f32>, sr: u32) -> PathBuf {
        let path = dir.join(name);
        save_wav(&path, data, sr).unwrap();
        path
    }

    #[test]
    fn test_to_mono() {
        let stereo =
            Array2::from_shape_vec((2, 4), vec![1.0, 2.0, 3.0, 4.0, 0.5, 1.0, 1.5, 2.0]).unwrap();
        let mono = to_mono(stereo.view());
        assert_eq!(mono.len(), 4);
        assert_relative_eq!(mono[0], 0.75);
        assert_relative_eq!(mono[1], 1.5);

        let single = Array2::from_shape_vec((1, 3), vec![0.1, -0.2, 0.3]).unwrap();
        assert_eq!(to_mono(single.view()).to_vec(), vec![0.1, -0.2, 0.3]);

        // Interleaved frames viewed as (channels, frames).
        let interleaved = Array2::from_shape_vec((2, 2), vec![1.0, 3.0, -1.0, 1.0]).unwrap();
        assert_eq!(to_mono(interleaved.t()).to_vec(), vec![2.0, 0.0]);

        assert_eq!(to_mono(Array2::<f32>::zeros((0, 5)).view()).len(), 5);
    }

    #[test]
    fn test_load_mono_same_rate() {
        let dir = tempfile::tempdir().unwrap();
        let signal = tone(440.0, 16000, 0.25);
        let data = Array2::from_shape_vec((1, signal.len()), signal.clone()).unwrap();
        let path = write_fixture(dir.path(), "42.wav", &data, 16000);

        let clip = load_mono(&path, 16000).unwrap();
        assert_eq!(clip.id, "42");
        assert_eq!(clip.sample_rate, 16000);
        assert_eq!(clip.len(), signal.len());
        assert_relative_eq!(clip.duration(), 0.25, epsilon = 1e-6);
        for (a, b) in clip.samples.iter().zip(&signal) {
            assert!((a - b).abs() < 1e-3);
        }
    }

    #[test]
    fn test_load_mono_averages_channels() {
        let dir = tempfile::tempdir().unwrap();
        let frames = 800;
        let mut data = Array2::<f32>::zeros((2, frames));
        for i in 0..frames {
            data[(0, i)] = 0.5;
            data[(1, i)] = -0.25;
        }
        let path = write_fixture(dir.path(), "stereo.wav", &data, 8000);

        let clip = load_mono(&path, 8000).unwrap();
        assert_eq!(clip.len(), frames);
        for &v in &clip.samples {
            assert!((v - 0.125).abs() < 1e-3, "expected channel average, got {v}");
        }
    }

    #[test]
    fn test_load_mono_resamples() {
        let dir = tempfile::tempdir().unwrap();
        let signal = tone(220.0, 8000, 0.5);
        let data = Array2::from_shape_vec((1, signal.len()), signal).unwrap();
        let path = write_fixture(dir.path(), "low.wav", &data, 8000);

        let clip = load_mono(&path, 16000).unwrap();
        assert_eq!(clip.sample_rate, 16000);
        assert_eq!(clip.len(), 8000);
        assert!(clip.samples.iter().all(|v| (-1.0..=1.0).contains(v)));
    }

    #[test]
    fn test_load_mono_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.wav");
        std::fs::write(&path, b"this is not a riff header at all").unwrap();

        let err = load_mono(&path, 16000).unwrap_err();
        assert!(
            matches!(err, Error::Decode { .. } | Error::UnsupportedFormat { .. }),
            "unexpected error: {err}"
        );
        assert!(err.is_per_file());
    }

    #[test]
    fn test_load_mono_missing_file() {
        let err = load_mono("/definitely/not/here.wav", 16000).unwrap_err();
        assert!(matches!(err, Error::Decode { .. }));
    }

    #[test]
    fn test_load_mono_empty_wav_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let data = Array2::<f32>::zeros((1, 0));
        let path = write_fixture(dir.path(), "empty.wav", &data, 16000);
        assert!(load_mono(&path, 16000).is_err());
    }

    #[test]
    fn test_resample_length_and_identity() {
        let data = Array2::from_shape_vec((1, 1000), tone(100.0, 8000, 0.125)).unwrap();
        let same = resample(&data, 8000, 8000).unwrap();
        assert_eq!(same, data);

        let up = resample(&data, 8000, 22050).unwrap();
        assert_eq!(up.shape(), &[1, (1000.0f64 * 22050.0 / 8000.0).round() as usize]);

        let down = resample(&data, 8000, 4000).unwrap();
        assert_eq!(down.shape(), &[1, 500]);
    }

    #[test]
    fn test_tone() {
        let signal = tone(440.0, 22050, 0.1);
        assert_eq!(signal.len(), 2205);
        assert!(signal.iter().any(|&x| x.abs() > 0.9));
    }
}
