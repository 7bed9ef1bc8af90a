//! Tests against a miniature dataset tree laid out like FSD50K.

use clipprep::io::{save_wav, tone};
use clipprep::metadata::{
    DatasetSummary, list_audio_files, load_ground_truth, load_vocabulary,
};
use clipprep::paths::{DatasetLayout, PathResolver, Subset};
use ndarray::Array2;
use std::fs;
use std::path::Path;

fn write_clip(dir: &Path, name: &str) {
    let y = tone(440.0, 16000, 0.1);
    let data = Array2::from_shape_vec((1, y.len()), y).unwrap();
    save_wav(dir.join(name), &data, 16000).unwrap();
}

fn make_dataset(root: &Path, with_vocab: bool) {
    let dev = root.join("FSD50K.dev_audio");
    let eval = root.join("FSD50K.eval_audio");
    let gt = root.join("FSD50K.ground_truth");
    for d in [&dev, &eval, &gt, &root.join("FSD50K.metadata")] {
        fs::create_dir_all(d).unwrap();
    }
    for name in ["30.wav", "4.wav", "100.WAV"] {
        write_clip(&dev, name);
    }
    write_clip(&eval, "7.wav");
    fs::write(dev.join("readme.txt"), "not audio").unwrap();

    fs::write(
        gt.join("dev.csv"),
        "fname,labels,mids,split\n\
         30,\"Dog,Animal\",\"/m/0bt9lr,/m/0jbk\",train\n\
         4,Music,/m/04rlf,val\n\
         100,\"Bark,Dog,Animal\",\"/m/05tny_,/m/0bt9lr,/m/0jbk\",train\n",
    )
    .unwrap();
    fs::write(gt.join("eval.csv"), "fname,labels,mids\n7,Music,/m/04rlf\n").unwrap();
    if with_vocab {
        fs::write(
            gt.join("vocabulary.csv"),
            "0,Music,/m/04rlf\n1,Dog,/m/0bt9lr\n2,Animal,/m/0jbk\n3,Bark,/m/05tny_\n",
        )
        .unwrap();
    }
}

#[test]
fn resolve_and_list() {
    let tmp = tempfile::tempdir().unwrap();
    let root_dir = tmp.path().join("FSD50K");
    make_dataset(&root_dir, true);

    let resolver = PathResolver::new(
        [tmp.path().join("missing"), root_dir.clone()],
        DatasetLayout::fsd50k(),
    );
    let root = resolver.resolve().unwrap();
    assert_eq!(root.path(), root_dir.as_path());

    let dev = list_audio_files(&root, Subset::Dev);
    assert_eq!(dev.ids().unwrap(), vec!["100", "30", "4"]);
    // Restartable: iterating again gives the same listing.
    let again: Vec<_> = dev.iter().unwrap().map(|f| f.id).collect();
    assert_eq!(again, dev.ids().unwrap());

    let summary = DatasetSummary::collect(&root).unwrap();
    assert_eq!((summary.dev_files, summary.eval_files), (3, 1));
    assert!(summary.to_string().contains("dev audio files: 3"));
}

#[test]
fn ground_truth_matches_files() {
    let tmp = tempfile::tempdir().unwrap();
    make_dataset(tmp.path(), true);
    let root = PathResolver::new([tmp.path()], DatasetLayout::fsd50k())
        .resolve()
        .unwrap();

    let gt = load_ground_truth(&root, Subset::Dev).unwrap();
    assert_eq!(gt.len(), 3);
    let files: Vec<_> = list_audio_files(&root, Subset::Dev).iter().unwrap().collect();
    gt.check_files(&files).unwrap();

    let vocab = load_vocabulary(&root).unwrap();
    assert_eq!(vocab.len(), 4);
    assert_eq!(vocab.index_of("Music"), Some(0));
    gt.check_vocabulary(&vocab).unwrap();

    let target = vocab.multi_hot(&gt.get("100").unwrap().labels).unwrap();
    assert_eq!(target.to_vec(), vec![0.0, 1.0, 1.0, 1.0]);

    let official = gt.official_split().unwrap();
    assert_eq!(official.val(), vec!["4"]);

    let eval_gt = load_ground_truth(&root, Subset::Eval).unwrap();
    assert!(eval_gt.check_files(&files).is_err());
}

#[test]
fn vocabulary_derived_without_csv() {
    let tmp = tempfile::tempdir().unwrap();
    make_dataset(tmp.path(), false);
    let root = PathResolver::new([tmp.path()], DatasetLayout::fsd50k())
        .resolve()
        .unwrap();

    let vocab = load_vocabulary(&root).unwrap();
    assert_eq!(vocab.labels(), &["Animal", "Bark", "Dog", "Music"]);

    let out = tmp.path().join("out").join("vocabulary.json");
    vocab.write_json(&out).unwrap();
    assert_eq!(
        clipprep::metadata::Vocabulary::read_json(&out).unwrap(),
        vocab
    );
}
