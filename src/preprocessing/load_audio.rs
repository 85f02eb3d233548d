use std::path::{Path, PathBuf};

use hound::{SampleFormat, WavReader};
use log::{debug, info};
use ndarray::Array1;
use rubato::{Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction};

use crate::config::PipelineConfig;
use crate::error::{Result, TabError};
use crate::postprocessing::helpers::librosa::normalize;

/// Anything that can hand over mono samples together with their sample rate.
pub trait AudioSource {
    fn read_samples(&self) -> Result<Vec<f32>>;
    fn sample_rate(&self) -> Result<u32>;

    fn describe(&self) -> String {
        "<audio>".to_string()
    }
}

/// A WAV file on disk. Multichannel audio is downmixed by averaging channels.
#[derive(Debug, Clone)]
pub struct WavFile {
    path: PathBuf,
}

impl WavFile {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        WavFile { path: path.as_ref().to_path_buf() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open(&self) -> Result<WavReader<std::io::BufReader<std::fs::File>>> {
        if !self.path.exists() {
            return Err(TabError::io(
                &self.path,
                std::io::Error::new(std::io::ErrorKind::NotFound, "audio file not found"),
            ));
        }
        Ok(WavReader::open(&self.path)?)
    }
}

impl AudioSource for WavFile {
    fn read_samples(&self) -> Result<Vec<f32>> {
        let mut reader = self.open()?;
        let spec = reader.spec();

        let interleaved: Vec<f32> = match (spec.sample_format, spec.bits_per_sample) {
            (SampleFormat::Float, 32) => reader.samples::<f32>().collect::<std::result::Result<_, _>>()?,
            (SampleFormat::Int, bits) if (8..=32).contains(&bits) => {
                let max_sample_value = 2.0_f64.powi(bits as i32 - 1) as f32;
                reader
                    .samples::<i32>()
                    .map(|s| s.map(|s| s as f32 / max_sample_value))
                    .collect::<std::result::Result<_, _>>()?
            }
            (format, bits) => {
                debug!("Unsupported WAV layout {:?} {}-bit in {:?}", format, bits, self.path);
                return Err(hound::Error::Unsupported.into());
            }
        };

        let channels = spec.channels.max(1) as usize;
        if channels == 1 {
            return Ok(interleaved);
        }

        Ok(interleaved
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect())
    }

    fn sample_rate(&self) -> Result<u32> {
        Ok(self.open()?.spec().sample_rate)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Samples that are already in memory, e.g. an uploaded recording.
#[derive(Debug, Clone)]
pub struct InMemory {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl InMemory {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        InMemory { samples, sample_rate }
    }
}

impl AudioSource for InMemory {
    fn read_samples(&self) -> Result<Vec<f32>> {
        Ok(self.samples.clone())
    }

    fn sample_rate(&self) -> Result<u32> {
        Ok(self.sample_rate)
    }
}

/// A mono signal at the pipeline's sample rate.
#[derive(Debug, Clone)]
pub struct AudioSignal {
    pub samples: Array1<f32>,
    pub sample_rate: u32,
}

impl AudioSignal {
    /// Duration in seconds.
    pub fn duration(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

fn resample(samples: Vec<f32>, from_rate: u32, to_rate: u32) -> Result<Vec<f32>> {
    if from_rate == to_rate || samples.is_empty() {
        return Ok(samples);
    }

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    let resample_ratio = to_rate as f64 / from_rate as f64;
    let mut resampler = SincFixedIn::<f64>::new(resample_ratio, 2.0, params, samples.len(), 1)
        .map_err(|e| TabError::Resample(e.to_string()))?;

    let channel_data = vec![samples.iter().map(|&s| s as f64).collect::<Vec<f64>>()];
    let channel_resampled_data = resampler
        .process(&channel_data, None)
        .map_err(|e| TabError::Resample(e.to_string()))?;

    Ok(channel_resampled_data[0].iter().map(|&s| s as f32).collect())
}

/// Reads a source, resamples it to the configured rate and optionally peak-normalizes it.
pub fn load_signal(source: &dyn AudioSource, config: &PipelineConfig) -> Result<AudioSignal> {
    let source_rate = source.sample_rate()?;
    let samples = source.read_samples()?;
    info!("Loading audio {} ({} samples at {} Hz).", source.describe(), samples.len(), source_rate);

    let mut samples = resample(samples, source_rate, config.sample_rate)?;
    if config.normalize {
        normalize(&mut samples);
    }

    Ok(AudioSignal { samples: Array1::from(samples), sample_rate: config.sample_rate })
}
