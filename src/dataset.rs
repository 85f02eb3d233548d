//! Training-set assembly over a corpus of recordings.
//!
//! The corpus is laid out like GuitarSet: one annotation file per take under
//! `annotation_root`, and one audio directory per recording mode under
//! `audio_root`, where `<stem><mode suffix>.wav` holds the take.

use std::{
    collections::BTreeMap,
    fs,
    io::{BufReader, BufWriter, Write},
    path::{Path, PathBuf},
    str::FromStr,
};

use log::{debug, info, warn};
use ndarray::{concatenate, Array3, ArrayView3, Axis};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::PipelineConfig;
use crate::constants::{DEFAULT_REMOVE_NOISE, NOT_PLAYED};
use crate::error::{Result, TabError};
use crate::preprocessing::annotations::read_annotations;
use crate::preprocessing::cqt::SpectralTransform;
use crate::preprocessing::labels::align_labels;
use crate::preprocessing::load_audio::{load_signal, WavFile};
use crate::preprocessing::spectral_windows::preprocess_audio;

const ANNOTATION_EXTENSIONS: [&str; 3] = ["jams", "mid", "midi"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordingMode {
    MonoMic,
    MonoPickupMix,
    HexDebleeded,
    HexOriginal,
}

impl RecordingMode {
    pub const ALL: [RecordingMode; 4] = [
        RecordingMode::MonoMic,
        RecordingMode::MonoPickupMix,
        RecordingMode::HexDebleeded,
        RecordingMode::HexOriginal,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            RecordingMode::MonoMic => "mm",
            RecordingMode::MonoPickupMix => "mp",
            RecordingMode::HexDebleeded => "pd",
            RecordingMode::HexOriginal => "po",
        }
    }

    pub fn audio_dir(&self) -> &'static str {
        match self {
            RecordingMode::MonoMic => "audio_mono-mic",
            RecordingMode::MonoPickupMix => "audio_mono-pickup_mix",
            RecordingMode::HexDebleeded => "audio_hex-pickup_debleeded",
            RecordingMode::HexOriginal => "audio_hex-pickup_original",
        }
    }

    pub fn file_suffix(&self) -> &'static str {
        match self {
            RecordingMode::MonoMic => "_mic",
            RecordingMode::MonoPickupMix => "_mix",
            RecordingMode::HexDebleeded => "_hex_cln",
            RecordingMode::HexOriginal => "_hex",
        }
    }

    /// Parses a list of mode keys; `all` expands to every mode.
    pub fn parse_list<S: AsRef<str>>(keys: &[S]) -> Result<Vec<RecordingMode>> {
        let mut modes = vec![];
        for key in keys {
            if key.as_ref() == "all" {
                return Ok(Self::ALL.to_vec());
            }
            let mode = key.as_ref().parse()?;
            if !modes.contains(&mode) {
                modes.push(mode);
            }
        }
        Ok(modes)
    }
}

impl FromStr for RecordingMode {
    type Err = TabError;

    fn from_str(key: &str) -> Result<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|mode| mode.key() == key)
            .ok_or_else(|| TabError::Config(format!("unknown recording mode '{}' (expected mm, mp, pd or po)", key)))
    }
}

/// Where a corpus lives on disk.
#[derive(Debug, Clone)]
pub struct CorpusLayout {
    pub audio_root: PathBuf,
    pub annotation_root: PathBuf,
    pub output_root: PathBuf,
}

/// One take in one recording mode, with its files resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct CorpusEntry {
    pub stem: String,
    pub mode: RecordingMode,
    pub audio_path: PathBuf,
    pub annotation_path: PathBuf,
}

impl CorpusLayout {
    pub fn new<P: Into<PathBuf>>(audio_root: P, annotation_root: P, output_root: P) -> Self {
        CorpusLayout {
            audio_root: audio_root.into(),
            annotation_root: annotation_root.into(),
            output_root: output_root.into(),
        }
    }

    /// One annotation file per take under `annotation_root`, sorted by take name.
    ///
    /// A take annotated in several formats is listed once, preferring JAMS over MIDI.
    pub fn annotation_files(&self) -> Result<Vec<PathBuf>> {
        info!("Getting filenames from path {}.", self.annotation_root.display());
        let listing = fs::read_dir(&self.annotation_root).map_err(|e| TabError::io(&self.annotation_root, e))?;

        let mut takes: BTreeMap<String, (usize, PathBuf)> = BTreeMap::new();
        for entry in listing {
            let path = entry.map_err(|e| TabError::io(&self.annotation_root, e))?.path();
            let rank = path
                .extension()
                .and_then(|e| e.to_str())
                .and_then(|e| ANNOTATION_EXTENSIONS.iter().position(|&known| e.eq_ignore_ascii_case(known)));
            let Some(rank) = rank.filter(|_| path.is_file()) else {
                continue;
            };

            let stem = take_stem(&path);
            if let Some((kept, kept_path)) = takes.get(&stem) {
                if *kept <= rank {
                    debug!("Ignoring {}, take already annotated by {}.", path.display(), kept_path.display());
                    continue;
                }
            }
            if let Some((_, replaced)) = takes.insert(stem, (rank, path.clone())) {
                debug!("Ignoring {}, take already annotated by {}.", replaced.display(), path.display());
            }
        }
        Ok(takes.into_values().map(|(_, path)| path).collect())
    }

    pub fn resolve(&self, annotation_path: &Path, mode: RecordingMode) -> CorpusEntry {
        let stem = take_stem(annotation_path);
        let audio_path = self
            .audio_root
            .join(mode.audio_dir())
            .join(format!("{}{}.wav", stem, mode.file_suffix()));

        CorpusEntry { stem, mode, audio_path, annotation_path: annotation_path.to_path_buf() }
    }
}

/// Take name of an annotation file: everything before the first dot.
fn take_stem(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .and_then(|n| n.split('.').next())
        .unwrap_or_default()
        .to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorPolicy {
    /// Log the failing take, leave it out and keep going.
    #[default]
    SkipFile,
    /// Abort the whole run on the first failing take.
    FailFast,
}

#[derive(Debug, Clone)]
pub struct AssemblyOptions {
    pub modes: Vec<RecordingMode>,
    /// Keep only takes whose stem contains this substring (e.g. "solo", "comp").
    pub filter: Option<String>,
    /// Fraction of the sorted takes to use, taken from the front.
    pub subset: f32,
    /// Fraction of all-silent windows to drop from each take.
    pub remove_noise: f32,
    pub policy: ErrorPolicy,
    pub parallel: bool,
    pub save: bool,
}

impl Default for AssemblyOptions {
    fn default() -> Self {
        AssemblyOptions {
            modes: vec![RecordingMode::MonoMic],
            filter: None,
            subset: 1.0,
            remove_noise: DEFAULT_REMOVE_NOISE,
            policy: ErrorPolicy::default(),
            parallel: false,
            save: false,
        }
    }
}

impl AssemblyOptions {
    pub fn validate(&self) -> Result<()> {
        if self.modes.is_empty() {
            return Err(TabError::Config("at least one recording mode is required".into()));
        }
        if !(self.subset > 0.0 && self.subset <= 1.0) {
            return Err(TabError::Config(format!("subset must be in (0, 1], got {}", self.subset)));
        }
        if !(0.0..=1.0).contains(&self.remove_noise) {
            return Err(TabError::Config(format!("remove_noise must be in [0, 1], got {}", self.remove_noise)));
        }
        Ok(())
    }

    /// File name suffix identifying this selection, e.g. `mm-mp_solo_noise95`.
    pub fn suffix(&self) -> String {
        let modes = self.modes.iter().map(|m| m.key()).collect::<Vec<_>>().join("-");
        let filter = self.filter.as_deref().filter(|f| !f.is_empty()).unwrap_or("all");
        format!("{}_{}_noise{}", modes, filter, (self.remove_noise * 100.0).round() as u32)
    }
}

/// Spectral windows paired with their fret targets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingSet {
    /// (windows, bins, width)
    pub data: Array3<f32>,
    /// (windows, strings, classes)
    pub labels: Array3<f32>,
}

impl TrainingSet {
    pub fn empty(config: &PipelineConfig) -> Self {
        TrainingSet {
            data: Array3::zeros((0, config.bins, config.window_width)),
            labels: Array3::zeros((0, config.n_strings(), config.n_classes())),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len_of(Axis(0))
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Concatenates sets in the given order.
    pub fn concat(sets: &[TrainingSet], config: &PipelineConfig) -> Result<Self> {
        if sets.is_empty() {
            return Ok(Self::empty(config));
        }
        let data: Vec<ArrayView3<f32>> = sets.iter().map(|s| s.data.view()).collect();
        let labels: Vec<ArrayView3<f32>> = sets.iter().map(|s| s.labels.view()).collect();
        Ok(TrainingSet { data: concatenate(Axis(0), &data)?, labels: concatenate(Axis(0), &labels)? })
    }

    fn select(&self, keep: &[usize]) -> Self {
        TrainingSet { data: self.data.select(Axis(0), keep), labels: self.labels.select(Axis(0), keep) }
    }
}

fn is_silent(labels: ndarray::ArrayView2<f32>) -> bool {
    labels.rows().into_iter().all(|row| row[NOT_PLAYED] == 1.0)
}

/// Drops `fraction` of the windows whose label is "not played" on every string.
///
/// The dropped windows are spread evenly over the silent ones, so the result is
/// deterministic. Windows with at least one played string are always kept.
pub fn remove_noise(set: &TrainingSet, fraction: f32) -> TrainingSet {
    if fraction <= 0.0 {
        return set.clone();
    }

    let fraction = fraction.min(1.0) as f64;
    let mut keep = vec![];
    let mut silent_seen = 0usize;
    for (w, labels) in set.labels.axis_iter(Axis(0)).enumerate() {
        if !is_silent(labels) {
            keep.push(w);
            continue;
        }
        let before = (silent_seen as f64 * fraction).floor();
        let after = ((silent_seen + 1) as f64 * fraction).floor();
        silent_seen += 1;
        if after == before {
            keep.push(w);
        }
    }

    set.select(&keep)
}

/// Windows and labels for a single take.
pub fn process_entry(
    entry: &CorpusEntry,
    transform: &dyn SpectralTransform,
    config: &PipelineConfig,
) -> Result<TrainingSet> {
    info!("Loading files {} and {}.", entry.audio_path.display(), entry.annotation_path.display());
    let notes = read_annotations(&entry.annotation_path, config.n_strings())?;
    let signal = load_signal(&WavFile::new(&entry.audio_path), config)?;

    let data = preprocess_audio(&signal, transform, config)?;
    let labels = align_labels(data.len_of(Axis(0)), signal.duration(), &notes, config)?;
    Ok(TrainingSet { data, labels })
}

#[derive(Debug, Clone)]
pub struct SkippedEntry {
    pub entry: CorpusEntry,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct AssemblyReport {
    /// Takes that contributed, with the number of windows each kept.
    pub processed: Vec<(CorpusEntry, usize)>,
    pub skipped: Vec<SkippedEntry>,
    pub saved_to: Option<(PathBuf, PathBuf)>,
}

pub struct DatasetBuilder<'a> {
    layout: CorpusLayout,
    config: PipelineConfig,
    transform: &'a dyn SpectralTransform,
}

impl<'a> DatasetBuilder<'a> {
    pub fn new(layout: CorpusLayout, config: PipelineConfig, transform: &'a dyn SpectralTransform) -> Result<Self> {
        config.validate()?;
        Ok(DatasetBuilder { layout, config, transform })
    }

    /// The takes a run with `options` would process, in processing order.
    pub fn entries(&self, options: &AssemblyOptions) -> Result<Vec<CorpusEntry>> {
        options.validate()?;

        let mut files = self.layout.annotation_files()?;
        if options.subset < 1.0 {
            let ubound = (files.len() as f32 * options.subset).round() as usize;
            files.truncate(ubound);
        }

        let entries = files
            .iter()
            .flat_map(|file| options.modes.iter().map(move |&mode| self.layout.resolve(file, mode)))
            .filter(|entry| match options.filter.as_deref() {
                Some(filter) => entry.stem.contains(filter),
                None => true,
            })
            .collect();
        Ok(entries)
    }

    fn run_entry(&self, entry: &CorpusEntry, remove_noise_fraction: f32) -> Result<TrainingSet> {
        let set = process_entry(entry, self.transform, &self.config)?;
        Ok(remove_noise(&set, remove_noise_fraction))
    }

    /// Processes every selected take and concatenates the results in take order.
    pub fn assemble(&self, options: &AssemblyOptions) -> Result<(TrainingSet, AssemblyReport)> {
        let entries = self.entries(options)?;
        info!("Assembling training data from {} takes ({}).", entries.len(), options.suffix());

        let results: Vec<(CorpusEntry, Result<TrainingSet>)> = if options.parallel {
            entries
                .into_par_iter()
                .map(|entry| {
                    let result = self.run_entry(&entry, options.remove_noise);
                    (entry, result)
                })
                .collect()
        } else {
            let mut results = vec![];
            for (idx, entry) in entries.iter().enumerate() {
                info!("Processing file: {} ({}/{})", entry.stem, idx + 1, entries.len());
                let result = self.run_entry(entry, options.remove_noise);
                let failed = result.is_err();
                results.push((entry.clone(), result));
                if failed && options.policy == ErrorPolicy::FailFast {
                    break;
                }
            }
            results
        };

        let mut report = AssemblyReport::default();
        let mut sets = vec![];
        for (entry, result) in results {
            match result {
                Ok(set) => {
                    report.processed.push((entry, set.len()));
                    sets.push(set);
                }
                Err(e) if options.policy == ErrorPolicy::FailFast => return Err(e),
                Err(e) => {
                    warn!("Skipping {} ({}): {}", entry.stem, entry.mode.key(), e);
                    report.skipped.push(SkippedEntry { entry, reason: e.to_string() });
                }
            }
        }

        let set = TrainingSet::concat(&sets, &self.config)?;
        info!("Assembled {} windows from {} takes, skipped {}.", set.len(), report.processed.len(), report.skipped.len());

        if options.save {
            report.saved_to = Some(save_training_set(&set, &self.layout.output_root, &options.suffix())?);
        }
        Ok((set, report))
    }
}

fn corpus_paths(dir: &Path, suffix: &str) -> (PathBuf, PathBuf) {
    (
        dir.join(format!("training_{}_data.bin", suffix)),
        dir.join(format!("training_{}_labels.bin", suffix)),
    )
}

/// Writes data and labels as two bincode files; returns their paths.
pub fn save_training_set(set: &TrainingSet, dir: &Path, suffix: &str) -> Result<(PathBuf, PathBuf)> {
    fs::create_dir_all(dir).map_err(|e| TabError::io(dir, e))?;
    let (data_path, labels_path) = corpus_paths(dir, suffix);

    for (path, array) in [(&data_path, &set.data), (&labels_path, &set.labels)] {
        let file = fs::File::create(path).map_err(|e| TabError::io(path, e))?;
        let mut writer = BufWriter::new(file);
        bincode::serialize_into(&mut writer, array)?;
        writer.flush().map_err(|e| TabError::io(path, e))?;
    }

    info!("Data was saved under {}.", dir.display());
    Ok((data_path, labels_path))
}

pub fn load_training_set(dir: &Path, suffix: &str) -> Result<TrainingSet> {
    let (data_path, labels_path) = corpus_paths(dir, suffix);
    let read = |path: &Path| -> Result<Array3<f32>> {
        let file = fs::File::open(path).map_err(|e| TabError::io(path, e))?;
        Ok(bincode::deserialize_from(BufReader::new(file))?)
    };

    let set = TrainingSet { data: read(&data_path)?, labels: read(&labels_path)? };
    if set.data.len_of(Axis(0)) != set.labels.len_of(Axis(0)) {
        return Err(TabError::Shape {
            expected: format!("{} label rows", set.data.len_of(Axis(0))),
            actual: set.labels.shape().to_vec(),
        });
    }
    Ok(set)
}
