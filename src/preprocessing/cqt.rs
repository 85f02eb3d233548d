//! Constant-Q magnitude transform.
//!
//! Every bin is a Hann-windowed complex exponential whose length shrinks as its
//! centre frequency rises, so all bins share the same quality factor. The
//! kernels are transformed to the frequency domain once and thresholded into a
//! sparse matrix (Brown & Puckette, 1992); each analysis frame then costs one
//! FFT plus a handful of multiply-adds per bin.

use std::{f32::consts::PI, sync::Arc};

use log::debug;
use ndarray::{Array2, ArrayView1};
use rustfft::{num_complex::Complex, Fft, FftPlanner};

use crate::config::PipelineConfig;
use crate::constants::CQT_SPARSITY;
use crate::error::Result;
use crate::postprocessing::helpers::librosa::frame_count;

/// Turns a mono signal into a (frames, bins) magnitude matrix.
pub trait SpectralTransform: Send + Sync {
    fn transform(&self, samples: ArrayView1<f32>) -> Array2<f32>;
    fn n_bins(&self) -> usize;
    fn hop_length(&self) -> usize;
}

struct SparseKernel {
    entries: Vec<(usize, Complex<f32>)>,
}

pub struct ConstantQ {
    hop_length: usize,
    fft_len: usize,
    kernels: Vec<SparseKernel>,
    fft: Arc<dyn Fft<f32>>,
}

impl ConstantQ {
    pub fn new(config: &PipelineConfig) -> Result<Self> {
        config.validate()?;

        let sr = config.sample_rate as f32;
        let q = 1.0 / (2.0f32.powf(1.0 / config.bins_per_octave as f32) - 1.0);
        let fmin = config.fmin_hz();

        let frequencies: Vec<f32> = (0..config.bins)
            .map(|k| fmin * 2.0f32.powf(k as f32 / config.bins_per_octave as f32))
            .collect();
        let lengths: Vec<usize> = frequencies.iter().map(|f| (q * sr / f).ceil() as usize).collect();
        let fft_len = lengths.iter().copied().max().unwrap_or(1).next_power_of_two();

        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(fft_len);

        let kernels = frequencies
            .iter()
            .zip(lengths.iter())
            .map(|(&freq, &length)| {
                let mut buffer = vec![Complex::new(0.0, 0.0); fft_len];
                let start = fft_len / 2 - length / 2;
                let window_sum: f32 = (0..length).map(|n| hann(n, length)).sum();
                for n in 0..length {
                    let phase = 2.0 * PI * freq * (n as f32 - (length / 2) as f32) / sr;
                    let weight = hann(n, length) / window_sum;
                    buffer[start + n] = Complex::from_polar(weight, phase);
                }
                fft.process(&mut buffer);

                let peak = buffer.iter().fold(0.0f32, |acc, c| acc.max(c.norm()));
                let entries = buffer
                    .iter()
                    .enumerate()
                    .filter(|(_, c)| c.norm() >= peak * CQT_SPARSITY)
                    .map(|(j, c)| (j, c.conj() / fft_len as f32))
                    .collect();
                SparseKernel { entries }
            })
            .collect::<Vec<_>>();

        debug!(
            "Constant-Q kernels ready: {} bins, FFT length {}, {} non-zero entries.",
            kernels.len(),
            fft_len,
            kernels.iter().map(|k| k.entries.len()).sum::<usize>()
        );

        Ok(ConstantQ { hop_length: config.hop_length, fft_len, kernels, fft })
    }
}

fn hann(n: usize, length: usize) -> f32 {
    0.5 - 0.5 * (2.0 * PI * n as f32 / length as f32).cos()
}

impl SpectralTransform for ConstantQ {
    fn transform(&self, samples: ArrayView1<f32>) -> Array2<f32> {
        let n_frames = frame_count(samples.len(), self.hop_length);
        let half = self.fft_len / 2;
        let mut output = Array2::zeros((n_frames, self.kernels.len()));
        let mut buffer = vec![Complex::new(0.0, 0.0); self.fft_len];

        for t in 0..n_frames {
            // Frame t is centred on sample t * hop; the signal is implicitly zero outside its bounds.
            let centre = (t * self.hop_length) as isize;
            for (i, slot) in buffer.iter_mut().enumerate() {
                let idx = centre - half as isize + i as isize;
                let value = if idx >= 0 && (idx as usize) < samples.len() { samples[idx as usize] } else { 0.0 };
                *slot = Complex::new(value, 0.0);
            }
            self.fft.process(&mut buffer);

            for (k, kernel) in self.kernels.iter().enumerate() {
                let coefficient: Complex<f32> = kernel.entries.iter().map(|&(j, w)| buffer[j] * w).sum();
                output[[t, k]] = coefficient.norm();
            }
        }

        output
    }

    fn n_bins(&self) -> usize {
        self.kernels.len()
    }

    fn hop_length(&self) -> usize {
        self.hop_length
    }
}
