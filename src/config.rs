use std::{fs, path::Path};

use log::LevelFilter;
use serde::{Deserialize, Serialize};

use crate::constants::{
    AUDIO_SAMPLE_RATE, CQT_BINS_PER_OCTAVE, CQT_FMIN_MIDI, CQT_HOP_LENGTH, CQT_N_BINS, N_FRETS, N_STRINGS,
    STANDARD_TUNING, WINDOW_WIDTH,
};
use crate::error::{Result, TabError};
use crate::postprocessing::helpers::librosa::midi_to_hz;

/// Open-string MIDI pitches, lowest string first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tuning(Vec<u8>);

impl Tuning {
    pub fn new(pitches: Vec<u8>) -> Result<Self> {
        if pitches.is_empty() {
            return Err(TabError::Config("tuning needs at least one string".into()));
        }
        Ok(Tuning(pitches))
    }

    pub fn standard() -> Self {
        Tuning(STANDARD_TUNING.to_vec())
    }

    pub fn drop_d() -> Self {
        Tuning(vec![38, 45, 50, 55, 59, 64])
    }

    pub fn half_step_down() -> Self {
        Tuning(STANDARD_TUNING.iter().map(|p| p - 1).collect())
    }

    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "standard" => Ok(Self::standard()),
            "drop_d" => Ok(Self::drop_d()),
            "half_step_down" => Ok(Self::half_step_down()),
            other => Err(TabError::Config(format!("unknown tuning '{}'", other))),
        }
    }

    pub fn n_strings(&self) -> usize {
        self.0.len()
    }

    pub fn open_pitch(&self, string: usize) -> Option<u8> {
        self.0.get(string).copied()
    }

    pub fn pitches(&self) -> &[u8] {
        &self.0
    }
}

impl Default for Tuning {
    fn default() -> Self {
        Self::standard()
    }
}

/// How a window index is mapped onto a time interval when aligning labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowTiming {
    /// `(w ± W//2) / T * duration`, the footprint existing training labels were built with.
    #[default]
    Interpolated,
    /// Frame centre `w * hop / sr`, widened by `W//2` hops on each side.
    HopAligned,
}

/// Which note wins when several land on the same string inside one window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlapPolicy {
    #[default]
    LastWrite,
    LongestDuration,
}

/// Onset bookkeeping used by the fret decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CursorMode {
    /// One last-emitted pitch per string, kept through rests so a one-window dropout
    /// does not start a new note.
    #[default]
    PerString,
    /// Like `PerString`, but a rest on a string clears its pitch, so striking the
    /// same fret again after silence is a new note.
    PerStringRestrike,
    /// A single pitch cursor shared by all strings. Can suppress a new note on one
    /// string when another string last sounded the same pitch; kept to reproduce
    /// older decoder output.
    Shared,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub sample_rate: u32,
    pub normalize: bool,
    pub hop_length: usize,
    pub bins: usize,
    pub bins_per_octave: usize,
    pub fmin_midi: f32,
    pub window_width: usize,
    pub frets: usize,
    /// Strings the model was trained for; the tuning must have exactly this many.
    pub strings: usize,
    pub tuning: Tuning,
    /// 0 = critical .. 4 = debug.
    pub verbosity: u8,
    pub window_timing: WindowTiming,
    pub overlap_policy: OverlapPolicy,
    pub cursor_mode: CursorMode,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            sample_rate: AUDIO_SAMPLE_RATE,
            normalize: true,
            hop_length: CQT_HOP_LENGTH,
            bins: CQT_N_BINS,
            bins_per_octave: CQT_BINS_PER_OCTAVE,
            fmin_midi: CQT_FMIN_MIDI,
            window_width: WINDOW_WIDTH,
            frets: N_FRETS,
            strings: N_STRINGS,
            tuning: Tuning::standard(),
            verbosity: 3,
            window_timing: WindowTiming::default(),
            overlap_policy: OverlapPolicy::default(),
            cursor_mode: CursorMode::default(),
        }
    }
}

impl PipelineConfig {
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: PipelineConfig = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let source = fs::read_to_string(path).map_err(|e| TabError::io(path, e))?;
        Self::from_toml_str(&source)
    }

    pub fn n_strings(&self) -> usize {
        self.tuning.n_strings()
    }

    /// One "not played" class plus frets 0..=frets.
    pub fn n_classes(&self) -> usize {
        self.frets + 2
    }

    pub fn half_width(&self) -> usize {
        self.window_width / 2
    }

    pub fn fmin_hz(&self) -> f32 {
        midi_to_hz(self.fmin_midi)
    }

    /// Centre frequency of the highest transform bin.
    pub fn fmax_hz(&self) -> f32 {
        self.fmin_hz() * 2.0f32.powf((self.bins as f32 - 1.0) / self.bins_per_octave as f32)
    }

    pub fn level_filter(&self) -> LevelFilter {
        verbosity_to_level(self.verbosity)
    }

    /// Rejects configurations the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.window_width == 0 || self.window_width % 2 == 0 {
            return Err(TabError::Config(format!(
                "window width must be odd and positive, got {}",
                self.window_width
            )));
        }
        if self.sample_rate == 0 {
            return Err(TabError::Config("sample rate must be positive".into()));
        }
        if self.hop_length == 0 || self.bins == 0 || self.bins_per_octave == 0 {
            return Err(TabError::Config(
                "hop length, bin count and bins per octave must be positive".into(),
            ));
        }
        if self.tuning.n_strings() == 0 {
            return Err(TabError::Config("tuning needs at least one string".into()));
        }
        if self.tuning.n_strings() != self.strings {
            return Err(TabError::Config(format!(
                "tuning has {} strings but the pipeline is set up for {}",
                self.tuning.n_strings(),
                self.strings
            )));
        }
        if self.frets == 0 {
            return Err(TabError::Config("a guitar needs at least one fret".into()));
        }
        let nyquist = self.sample_rate as f32 / 2.0;
        if self.fmax_hz() >= nyquist {
            return Err(TabError::Config(format!(
                "highest bin at {:.1} Hz exceeds the Nyquist frequency {:.1} Hz",
                self.fmax_hz(),
                nyquist
            )));
        }
        Ok(())
    }
}

pub fn verbosity_to_level(verbosity: u8) -> LevelFilter {
    match verbosity {
        0 => LevelFilter::Off,
        1 => LevelFilter::Error,
        2 => LevelFilter::Warn,
        3 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    }
}
