mod common;

use std::fs;

use ndarray::Axis;
use tempfile::TempDir;

use guitar_tab::{
    config::PipelineConfig,
    constants::NOT_PLAYED,
    dataset::{load_training_set, AssemblyOptions, CorpusLayout, DatasetBuilder, ErrorPolicy, RecordingMode},
    TabError,
};

use common::{write_jams, write_sine_wav, FlatTransform};

const STEMS: [&str; 3] = ["00_BN1-129-Eb_solo", "00_BN1-147-Gb_comp", "01_Jazz2-187-F#_solo"];
/// 1 + 22050 / 512
const WINDOWS_PER_TAKE: usize = 44;

/// A corpus with three one-second takes recorded with the mono mic.
fn corpus() -> (TempDir, CorpusLayout) {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    for stem in STEMS {
        write_jams(&root.join("annotation").join(format!("{}.jams", stem)), &[(2, 52.0, 0.3, 0.4), (5, 67.0, 0.7, 0.1)]);
        write_sine_wav(&root.join("audio_mono-mic").join(format!("{}_mic.wav", stem)), 146.8, 1.0);
    }
    // Not an annotation; must be ignored.
    fs::write(root.join("annotation").join("README.txt"), "notes").unwrap();

    let layout = CorpusLayout::new(root.to_path_buf(), root.join("annotation"), root.join("output"));
    (dir, layout)
}

fn options(remove_noise: f32) -> AssemblyOptions {
    AssemblyOptions { remove_noise, ..Default::default() }
}

fn played_windows(labels: &ndarray::Array3<f32>) -> usize {
    labels
        .axis_iter(Axis(0))
        .filter(|w| w.rows().into_iter().any(|row| row[NOT_PLAYED] != 1.0))
        .count()
}

#[test]
fn entries_follow_sorted_stems_then_modes() {
    let (_dir, layout) = corpus();
    let builder = DatasetBuilder::new(layout, PipelineConfig::default(), &FlatTransform).unwrap();

    let options = AssemblyOptions { modes: vec![RecordingMode::MonoMic, RecordingMode::HexOriginal], ..options(0.0) };
    let entries = builder.entries(&options).unwrap();
    let names: Vec<(String, RecordingMode)> = entries.iter().map(|e| (e.stem.clone(), e.mode)).collect();
    assert_eq!(
        names,
        vec![
            (STEMS[0].to_string(), RecordingMode::MonoMic),
            (STEMS[0].to_string(), RecordingMode::HexOriginal),
            (STEMS[1].to_string(), RecordingMode::MonoMic),
            (STEMS[1].to_string(), RecordingMode::HexOriginal),
            (STEMS[2].to_string(), RecordingMode::MonoMic),
            (STEMS[2].to_string(), RecordingMode::HexOriginal),
        ]
    );
}

#[test]
fn subset_is_taken_before_filter() {
    let (_dir, layout) = corpus();
    let builder = DatasetBuilder::new(layout, PipelineConfig::default(), &FlatTransform).unwrap();

    let solo = AssemblyOptions { filter: Some("solo".into()), ..options(0.0) };
    assert_eq!(builder.entries(&solo).unwrap().len(), 2);

    let solo_subset = AssemblyOptions { subset: 0.67, ..solo };
    let entries = builder.entries(&solo_subset).unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].stem, STEMS[0]);
}

#[test]
fn assembles_all_takes_in_order() {
    let (_dir, layout) = corpus();
    let builder = DatasetBuilder::new(layout, PipelineConfig::default(), &FlatTransform).unwrap();

    let (set, report) = builder.assemble(&options(0.0)).unwrap();
    assert_eq!(set.data.dim(), (3 * WINDOWS_PER_TAKE, 192, 9));
    assert_eq!(set.labels.dim(), (3 * WINDOWS_PER_TAKE, 6, 21));
    assert_eq!(report.processed.len(), 3);
    assert!(report.skipped.is_empty());
    assert!(report.saved_to.is_none());

    for row in set.labels.rows() {
        assert_eq!(row.sum(), 1.0);
    }
    // Fret 2 on the D string is class 3.
    assert!(set.labels.axis_iter(Axis(0)).any(|w| w[[2, 3]] == 1.0));
}

#[test]
fn noise_removal_keeps_played_windows() {
    let (_dir, layout) = corpus();
    let builder = DatasetBuilder::new(layout, PipelineConfig::default(), &FlatTransform).unwrap();

    let (full, _) = builder.assemble(&options(0.0)).unwrap();
    let (reduced, _) = builder.assemble(&options(0.95)).unwrap();
    assert!(reduced.len() < full.len());
    assert_eq!(played_windows(&reduced.labels), played_windows(&full.labels));

    let (quiet_free, _) = builder.assemble(&options(1.0)).unwrap();
    assert_eq!(quiet_free.len(), played_windows(&full.labels));
}

#[test]
fn missing_audio_is_skipped_by_default() {
    let (dir, layout) = corpus();
    fs::remove_file(dir.path().join("audio_mono-mic").join(format!("{}_mic.wav", STEMS[1]))).unwrap();
    let builder = DatasetBuilder::new(layout, PipelineConfig::default(), &FlatTransform).unwrap();

    let (set, report) = builder.assemble(&options(0.0)).unwrap();
    assert_eq!(set.len(), 2 * WINDOWS_PER_TAKE);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].entry.stem, STEMS[1]);
}

#[test]
fn fail_fast_aborts_on_missing_audio() {
    let (dir, layout) = corpus();
    fs::remove_file(dir.path().join("audio_mono-mic").join(format!("{}_mic.wav", STEMS[1]))).unwrap();
    let builder = DatasetBuilder::new(layout, PipelineConfig::default(), &FlatTransform).unwrap();

    let fail_fast = AssemblyOptions { policy: ErrorPolicy::FailFast, ..options(0.0) };
    assert!(matches!(builder.assemble(&fail_fast), Err(TabError::Io { .. })));

    let parallel = AssemblyOptions { parallel: true, ..fail_fast };
    assert!(builder.assemble(&parallel).is_err());
}

#[test]
fn parallel_matches_sequential() {
    let (_dir, layout) = corpus();
    let builder = DatasetBuilder::new(layout, PipelineConfig::default(), &FlatTransform).unwrap();

    let (sequential, _) = builder.assemble(&options(0.5)).unwrap();
    let (parallel, report) = builder.assemble(&AssemblyOptions { parallel: true, ..options(0.5) }).unwrap();
    assert_eq!(parallel, sequential);
    let order: Vec<&str> = report.processed.iter().map(|(e, _)| e.stem.as_str()).collect();
    assert_eq!(order, STEMS.to_vec());
}

#[test]
fn saved_set_loads_back() {
    let (dir, layout) = corpus();
    let builder = DatasetBuilder::new(layout, PipelineConfig::default(), &FlatTransform).unwrap();

    let options = AssemblyOptions { filter: Some("solo".into()), save: true, ..options(0.95) };
    let (set, report) = builder.assemble(&options).unwrap();

    let (data_path, labels_path) = report.saved_to.unwrap();
    assert!(data_path.ends_with("training_mm_solo_noise95_data.bin"));
    assert!(labels_path.exists());

    let loaded = load_training_set(&dir.path().join("output"), "mm_solo_noise95").unwrap();
    assert_eq!(loaded, set);
}

#[test]
fn tuning_without_model_string_count_is_rejected_up_front() {
    let (_dir, layout) = corpus();
    let config = PipelineConfig { tuning: guitar_tab::Tuning::new(vec![40, 45, 50]).unwrap(), ..Default::default() };
    assert!(matches!(DatasetBuilder::new(layout, config, &FlatTransform), Err(TabError::Config(_))));
}

#[test]
fn unknown_strings_in_annotation_fail_the_take() {
    let (_dir, layout) = corpus();
    let config = PipelineConfig {
        tuning: guitar_tab::Tuning::new(vec![40, 45, 50]).unwrap(),
        strings: 3,
        ..Default::default()
    };
    let builder = DatasetBuilder::new(layout, config, &FlatTransform).unwrap();

    let (set, report) = builder.assemble(&options(0.0)).unwrap();
    assert!(set.is_empty());
    assert_eq!(set.labels.dim(), (0, 3, 21));
    assert_eq!(report.skipped.len(), 3);
}
