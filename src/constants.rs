// Audio
pub const AUDIO_SAMPLE_RATE: u32 = 22050;

// Constant-Q transform
pub const CQT_HOP_LENGTH: usize = 512;
pub const CQT_N_BINS: usize = 192;
pub const CQT_BINS_PER_OCTAVE: usize = 24;
/// C1, the lowest bin of the transform.
pub const CQT_FMIN_MIDI: f32 = 24.0;
/// Spectral kernel entries below this fraction of the kernel peak are dropped.
pub const CQT_SPARSITY: f32 = 0.0054;

// Windowing
pub const WINDOW_WIDTH: usize = 9;

// Guitar
pub const N_FRETS: usize = 19;
pub const STANDARD_TUNING: [u8; 6] = [40, 45, 50, 55, 59, 64];
/// Strings the fret model predicts; its output is (windows, N_STRINGS, frets + 2).
pub const N_STRINGS: usize = STANDARD_TUNING.len();
/// Class index meaning "string not played"; fret f is class f + 1.
pub const NOT_PLAYED: usize = 0;

// Inference
pub const MODEL_PATH: &str = "./model/guitar_tab.onnx";
pub const INFERENCE_BATCH_SIZE: usize = 256;

// Dataset
pub const JAMS_NOTE_NAMESPACE: &str = "note_midi";
pub const DEFAULT_REMOVE_NOISE: f32 = 0.95;
pub const DEFAULT_TEMPO_US_PER_BEAT: u32 = 500_000;

// Tab rendering
pub const POSITIONS_PER_LINE: usize = 10;
