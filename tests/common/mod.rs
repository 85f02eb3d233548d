#![allow(dead_code)]

use std::{f32::consts::PI, fs, path::Path};

use hound::{SampleFormat, WavSpec, WavWriter};
use ndarray::{Array2, ArrayView1};
use serde_json::json;

use guitar_tab::preprocessing::cqt::SpectralTransform;

pub const SR: u32 = 22050;

pub fn write_sine_wav(path: &Path, freq: f32, seconds: f32) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    let spec = WavSpec { channels: 1, sample_rate: SR, bits_per_sample: 16, sample_format: SampleFormat::Int };
    let mut writer = WavWriter::create(path, spec).unwrap();
    let n = (seconds * SR as f32) as usize;
    for i in 0..n {
        let value = 0.5 * (2.0 * PI * freq * i as f32 / SR as f32).sin();
        writer.write_sample((value * i16::MAX as f32) as i16).unwrap();
    }
    writer.finalize().unwrap();
}

/// Writes a JAMS file with six `note_midi` annotations; `notes` are (string, pitch, onset, duration).
pub fn write_jams(path: &Path, notes: &[(usize, f64, f64, f64)]) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    let mut annotations = vec![json!({
        "namespace": "pitch_contour",
        "data": [{"time": 0.0, "duration": 0.0, "value": {"frequency": 110.0, "index": 0, "voiced": true}}]
    })];
    for string in 0..6 {
        let data: Vec<_> = notes
            .iter()
            .filter(|n| n.0 == string)
            .map(|&(_, pitch, time, duration)| json!({"time": time, "duration": duration, "value": pitch, "confidence": null}))
            .collect();
        annotations.push(json!({"namespace": "note_midi", "data": data}));
    }
    let document = json!({"file_metadata": {"title": "test"}, "annotations": annotations});
    fs::write(path, serde_json::to_string_pretty(&document).unwrap()).unwrap();
}

/// Constant frames with the pipeline's default geometry.
pub struct FlatTransform;

impl SpectralTransform for FlatTransform {
    fn transform(&self, samples: ArrayView1<f32>) -> Array2<f32> {
        Array2::ones((1 + samples.len() / 512, 192))
    }

    fn n_bins(&self) -> usize {
        192
    }

    fn hop_length(&self) -> usize {
        512
    }
}
