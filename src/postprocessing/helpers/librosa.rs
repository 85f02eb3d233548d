/* PORTED LIBROSA FUNCTIONS */

/// Converts a MIDI pitch to the corresponding frequency in Hz.
///
/// # Arguments
///
/// * `midi` - A MIDI pitch.
///
/// # Returns
///
/// * The corresponding frequency in Hz.
pub fn midi_to_hz(midi: f32) -> f32 {
    440.0 * 2.0f32.powf((midi - 69.0) / 12.0)
}

/// Converts a transform frame index to the time of its centre in seconds.
///
/// # Arguments
///
/// * `frame` - Frame index of a centred transform.
/// * `hop_length` - Samples between consecutive frames.
/// * `sample_rate` - Sample rate of the analysed signal.
pub fn frames_to_time(frame: usize, hop_length: usize, sample_rate: u32) -> f64 {
    (frame * hop_length) as f64 / sample_rate as f64
}

/// Number of frames a centred transform produces for a signal of `n_samples`.
pub fn frame_count(n_samples: usize, hop_length: usize) -> usize {
    1 + n_samples / hop_length
}

/// Scales a signal so its largest absolute sample is 1. Silent signals are left untouched.
pub fn normalize(samples: &mut [f32]) {
    let peak = samples.iter().fold(0.0f32, |acc, s| acc.max(s.abs()));
    if peak > 0.0 && peak.is_finite() {
        samples.iter_mut().for_each(|s| *s /= peak);
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn test_midi_hz_conversions() {
        assert_relative_eq!(midi_to_hz(69.0), 440.0, epsilon = 1e-3);
        assert_relative_eq!(midi_to_hz(24.0), 32.703, epsilon = 1e-3);
        assert_relative_eq!(midi_to_hz(40.0), 82.4069, epsilon = 1e-3);
    }

    #[test]
    fn test_frame_timing() {
        assert_relative_eq!(frames_to_time(43, 512, 22050), 0.99846, epsilon = 1e-4);
        assert_eq!(frame_count(22050, 512), 44);
        assert_eq!(frame_count(0, 512), 1);
    }

    #[test]
    fn test_normalize_peak() {
        let mut samples = vec![0.1, -0.5, 0.25];
        normalize(&mut samples);
        assert_eq!(samples, vec![0.2, -1.0, 0.5]);

        let mut silence = vec![0.0; 4];
        normalize(&mut silence);
        assert_eq!(silence, vec![0.0; 4]);
    }
}
