pub mod config;
pub mod constants;
pub mod dataset;
pub mod error;
pub mod inference;
pub mod preprocessing {
    pub mod annotations;
    pub mod cqt;
    pub mod labels;
    pub mod load_audio;
    pub mod spectral_windows;
}
pub mod postprocessing {
    pub mod helpers {
        pub mod librosa;
        pub mod numpy;
    }
    pub mod decode;
    pub mod tab;
}

pub use config::{CursorMode, OverlapPolicy, PipelineConfig, Tuning, WindowTiming};
pub use dataset::{AssemblyOptions, CorpusLayout, DatasetBuilder, ErrorPolicy, RecordingMode, TrainingSet};
pub use error::{Result, TabError};
pub use inference::{transcribe, FretModel, OnnxFretModel};
pub use postprocessing::decode::{decode_tab, TabEvent};
pub use preprocessing::cqt::{ConstantQ, SpectralTransform};
pub use preprocessing::load_audio::{AudioSource, InMemory, WavFile};
