use log::{debug, info, warn};
use ndarray::Array3;

use crate::config::{OverlapPolicy, PipelineConfig, WindowTiming};
use crate::constants::NOT_PLAYED;
use crate::error::{Result, TabError};
use crate::postprocessing::helpers::librosa::frames_to_time;
use crate::preprocessing::annotations::NoteEvent;

/// Time interval, in seconds, covered by window `w` out of `n_windows`.
pub fn window_bounds(w: usize, n_windows: usize, duration: f64, config: &PipelineConfig) -> (f64, f64) {
    let half_width = config.half_width() as f64;
    match config.window_timing {
        WindowTiming::Interpolated => {
            let lbound = (w as f64 - half_width) / n_windows as f64 * duration;
            let rbound = (w as f64 + half_width) / n_windows as f64 * duration;
            (lbound, rbound)
        }
        WindowTiming::HopAligned => {
            let centre = frames_to_time(w, config.hop_length, config.sample_rate);
            let reach = half_width * config.hop_length as f64 / config.sample_rate as f64;
            (centre - reach, centre + reach)
        }
    }
}

/// Fret class of `pitch` on `string`, or `None` when the note cannot be fretted there.
pub fn fret_class(pitch: f32, string: usize, config: &PipelineConfig) -> Option<usize> {
    let open = config.tuning.open_pitch(string)? as i64;
    let class = pitch.round() as i64 - open + 1;
    if class >= 1 && class < config.n_classes() as i64 {
        Some(class as usize)
    } else {
        None
    }
}

/// Builds one-hot fret targets of shape (n_windows, strings, classes).
///
/// A window gets the notes whose onset falls inside its interval (bounds
/// included). Strings without a note are marked as not played.
pub fn align_labels(
    n_windows: usize,
    duration: f64,
    notes: &[NoteEvent],
    config: &PipelineConfig,
) -> Result<Array3<f32>> {
    let n_strings = config.n_strings();
    if let Some(note) = notes.iter().find(|n| n.string >= n_strings) {
        return Err(TabError::Config(format!(
            "note on string {} but the tuning has {} strings",
            note.string, n_strings
        )));
    }

    let mut sorted: Vec<&NoteEvent> = notes.iter().collect();
    sorted.sort_by(|a, b| a.onset.total_cmp(&b.onset));

    let mut labels = Array3::zeros((n_windows, n_strings, config.n_classes()));
    let mut skipped = 0usize;

    for w in 0..n_windows {
        let (lbound, rbound) = window_bounds(w, n_windows, duration, config);
        let first = sorted.partition_point(|n| n.onset < lbound);

        // (class, duration) chosen per string
        let mut chosen: Vec<Option<(usize, f64)>> = vec![None; n_strings];
        for note in sorted[first..].iter().take_while(|n| n.onset <= rbound) {
            let Some(class) = fret_class(note.pitch, note.string, config) else {
                skipped += 1;
                continue;
            };

            let slot = &mut chosen[note.string];
            let replace = match (config.overlap_policy, *slot) {
                (_, None) | (OverlapPolicy::LastWrite, _) => true,
                (OverlapPolicy::LongestDuration, Some((_, kept))) => note.duration > kept,
            };
            if replace {
                *slot = Some((class, note.duration));
            }
        }

        debug!("Window {} [{:.3}, {:.3}]: {:?}", w, lbound, rbound, chosen);

        for (string, choice) in chosen.iter().enumerate() {
            let class = choice.map(|(class, _)| class).unwrap_or(NOT_PLAYED);
            labels[[w, string, class]] = 1.0;
        }
    }

    if skipped > 0 {
        warn!("Skipped {} note hits outside the fretboard ({} frets).", skipped, config.frets);
    }
    info!("Aligned {} notes onto {} windows.", notes.len(), n_windows);
    Ok(labels)
}

#[cfg(test)]
mod tests {
    use ndarray::Axis;

    use super::*;

    fn note(string: usize, pitch: f32, onset: f64, duration: f64) -> NoteEvent {
        NoteEvent { string, pitch, onset, duration }
    }

    fn active_class(labels: &Array3<f32>, w: usize, string: usize) -> usize {
        labels
            .index_axis(Axis(0), w)
            .row(string)
            .iter()
            .position(|&v| v == 1.0)
            .unwrap()
    }

    #[test]
    fn test_every_row_is_one_hot() {
        let config = PipelineConfig::default();
        let notes = vec![
            note(0, 40.0, 0.1, 0.5),
            note(1, 47.0, 0.3, 0.5),
            note(1, 49.0, 0.32, 0.5),
            note(5, 64.4, 2.0, 1.0),
            note(2, 20.0, 1.0, 1.0),
        ];
        let labels = align_labels(50, 3.0, &notes, &config).unwrap();
        assert_eq!(labels.dim(), (50, 6, 21));
        for window in labels.axis_iter(Axis(0)) {
            for row in window.rows() {
                assert_eq!(row.sum(), 1.0);
                assert!(row.iter().all(|&v| v == 0.0 || v == 1.0));
            }
        }
    }

    #[test]
    fn test_note_covers_windows_around_onset() {
        let config = PipelineConfig::default();
        // window w spans [(w - 4) / 10, (w + 4) / 10] seconds
        let labels = align_labels(100, 10.0, &[note(1, 46.0, 1.05, 0.2)], &config).unwrap();
        assert_eq!(active_class(&labels, 6, 1), 0);
        assert_eq!(active_class(&labels, 7, 1), 2);
        assert_eq!(active_class(&labels, 14, 1), 2);
        assert_eq!(active_class(&labels, 15, 1), 0);
        assert_eq!(active_class(&labels, 10, 0), 0);
    }

    #[test]
    fn test_open_string_is_class_one() {
        let config = PipelineConfig::default();
        let labels = align_labels(20, 2.0, &[note(0, 39.6, 1.0, 0.5)], &config).unwrap();
        assert_eq!(active_class(&labels, 10, 0), 1);
    }

    #[test]
    fn test_overlap_last_write_wins() {
        let config = PipelineConfig::default();
        let notes = vec![note(1, 47.0, 1.0, 2.0), note(1, 49.0, 1.02, 0.1)];
        let labels = align_labels(100, 10.0, &notes, &config).unwrap();
        assert_eq!(active_class(&labels, 10, 1), 5);
    }

    #[test]
    fn test_overlap_longest_duration_wins() {
        let config = PipelineConfig { overlap_policy: OverlapPolicy::LongestDuration, ..Default::default() };
        let notes = vec![note(1, 47.0, 1.0, 2.0), note(1, 49.0, 1.02, 0.1)];
        let labels = align_labels(100, 10.0, &notes, &config).unwrap();
        assert_eq!(active_class(&labels, 10, 1), 3);
    }

    #[test]
    fn test_unfrettable_notes_are_skipped() {
        let config = PipelineConfig::default();
        let notes = vec![note(0, 30.0, 1.0, 1.0), note(0, 40.0 + 25.0, 1.0, 1.0)];
        let labels = align_labels(20, 2.0, &notes, &config).unwrap();
        assert_eq!(active_class(&labels, 10, 0), 0);
    }

    #[test]
    fn test_hop_aligned_timing() {
        let config = PipelineConfig { window_timing: WindowTiming::HopAligned, ..Default::default() };
        let onset = frames_to_time(10, 512, 22050);
        let labels = align_labels(40, 1.0, &[note(2, 52.0, onset, 0.1)], &config).unwrap();
        assert_eq!(active_class(&labels, 10, 2), 3);
        assert_eq!(active_class(&labels, 20, 2), 0);
    }

    #[test]
    fn test_unknown_string_rejected() {
        let config = PipelineConfig::default();
        assert!(align_labels(10, 1.0, &[note(6, 60.0, 0.5, 0.1)], &config).is_err());
    }
}
