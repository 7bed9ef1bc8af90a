use clipprep::config::PipelineConfig;
use clipprep::feature::{FeatureConfig, FeatureKind};
use clipprep::io::{load_mono, save_wav, tone};
use clipprep::metadata::AudioFiles;
use clipprep::pipeline::run_batch;
use clipprep::store::FeatureStore;
use ndarray::Array2;
use std::path::Path;

fn write_stereo(path: &Path, sr: u32, seconds: f32) {
    let left = tone(440.0, sr, seconds);
    let right: Vec<f32> = left.iter().map(|v| v * 0.5).collect();
    let n = left.len();
    let mut data = Array2::<f32>::zeros((2, n));
    data.row_mut(0).assign(&ndarray::ArrayView1::from(&left[..]));
    data.row_mut(1).assign(&ndarray::ArrayView1::from(&right[..]));
    save_wav(path, &data, sr).unwrap();
}

#[test]
fn corrupt_file_is_skipped_and_batch_continues() {
    let audio = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    write_stereo(&audio.path().join("a.wav"), 16000, 1.0);
    write_stereo(&audio.path().join("c.wav"), 22050, 1.0);
    std::fs::write(audio.path().join("b.wav"), [0u8, 1, 2, 3, 4, 5, 6, 7]).unwrap();

    let files: Vec<_> = AudioFiles::in_dir(audio.path()).iter().unwrap().collect();
    assert_eq!(files.len(), 3);

    let config = PipelineConfig::default()
        .with_features(FeatureConfig::new(FeatureKind::Mfcc, 16000).with_n_mfcc(13));
    let store = FeatureStore::create(out.path(), config.descriptor()).unwrap();
    let report = run_batch(&files, &config, &store, None).unwrap();

    assert_eq!(report.written, 2);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].id, "b");
    assert!(!report.skipped[0].error.is_empty());

    // c.wav was resampled from 22.05 kHz to one second at 16 kHz.
    for id in ["a", "c"] {
        assert_eq!(store.load2(id).unwrap().shape(), &[30, 13]);
    }
    assert!(!store.contains("b"));

    let reopened = FeatureStore::open(out.path()).unwrap();
    reopened.check_compatible(&config.descriptor()).unwrap();
    assert_eq!(reopened.read_index().unwrap().len(), 2);
    assert_eq!(reopened.read_skipped().unwrap(), report.skipped);
}

#[test]
fn stereo_loads_as_channel_average() {
    let audio = tempfile::tempdir().unwrap();
    let path = audio.path().join("s.wav");
    write_stereo(&path, 16000, 0.25);
    let clip = load_mono(&path, 16000).unwrap();
    let left = tone(440.0, 16000, 0.25);
    assert_eq!(clip.len(), left.len());
    for (m, l) in clip.samples.iter().zip(&left).step_by(97) {
        assert!((m - l * 0.75).abs() < 1e-3, "{m} vs {}", l * 0.75);
    }
}

#[test]
fn changed_parameters_rejected_by_existing_store() {
    let out = tempfile::tempdir().unwrap();
    let config = PipelineConfig::default();
    FeatureStore::create(out.path(), config.descriptor()).unwrap();

    let changed = config.clone().with_features(config.features.clone().with_n_mels(128));
    assert!(matches!(
        FeatureStore::create(out.path(), changed.descriptor()),
        Err(clipprep::Error::IncompatibleFeatures { .. })
    ));
}
