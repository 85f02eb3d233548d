use log::{debug, info};
use ndarray::{Array2, ArrayView2, ArrayView3};
use serde::Serialize;

use crate::config::{CursorMode, PipelineConfig, Tuning};
use crate::constants::NOT_PLAYED;
use crate::error::{Result, TabError};

use super::helpers::numpy::arg_max_axis2;

/// One decoded note: where in the tab it goes, on which string, at which fret.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TabEvent {
    /// Advances only when a frame brings at least one new note.
    #[serde(rename = "pos")]
    pub position: usize,
    pub string: usize,
    pub fret: i32,
}

impl TabEvent {
    pub fn new(position: usize, string: usize, fret: i32) -> Self {
        TabEvent { position, string, fret }
    }
}

/// Fails unless `predictions` is shaped (windows, strings, classes).
pub fn check_shape(predictions: ArrayView3<f32>, n_strings: usize, n_classes: usize) -> Result<()> {
    let (_, strings, classes) = predictions.dim();
    if strings != n_strings || classes != n_classes {
        return Err(TabError::Shape {
            expected: format!("(*, {}, {})", n_strings, n_classes),
            actual: predictions.shape().to_vec(),
        });
    }
    Ok(())
}

/// Collapses per-class scores to the winning class of every (window, string).
pub fn argmax_classes(predictions: ArrayView3<f32>) -> Array2<usize> {
    arg_max_axis2(predictions)
}

fn pitch_of(tuning: &Tuning, string: usize, class: usize) -> i32 {
    tuning.open_pitch(string).map(i32::from).unwrap_or(0) + class as i32 - 1
}

/// Turns per-window classes into new-note events, merging sustained notes.
pub fn decode_classes(classes: ArrayView2<usize>, tuning: &Tuning, mode: CursorMode) -> Vec<TabEvent> {
    let mut events = vec![];
    let mut position = 0;
    let mut last_pitch: Vec<Option<i32>> = vec![None; classes.ncols()];
    let mut shared_pitch: Option<i32> = None;

    for (frame, row) in classes.outer_iter().enumerate() {
        let mut advance = false;

        for (string, &class) in row.iter().enumerate() {
            if class == NOT_PLAYED {
                if mode == CursorMode::PerStringRestrike {
                    last_pitch[string] = None;
                }
                continue;
            }

            let pitch = pitch_of(tuning, string, class);
            let cursor = match mode {
                CursorMode::PerString | CursorMode::PerStringRestrike => &mut last_pitch[string],
                CursorMode::Shared => &mut shared_pitch,
            };
            if *cursor == Some(pitch) {
                continue;
            }

            debug!("Frame {}: new note {} on string {} (fret {}).", frame, pitch, string, class - 1);
            events.push(TabEvent::new(position, string, class as i32 - 1));
            *cursor = Some(pitch);
            advance = true;
        }

        if advance {
            position += 1;
        }
    }

    events
}

/// Decodes model output of shape (windows, strings, classes) into tab events.
pub fn decode_tab(predictions: ArrayView3<f32>, config: &PipelineConfig) -> Result<Vec<TabEvent>> {
    check_shape(predictions, config.n_strings(), config.n_classes())?;

    let classes = argmax_classes(predictions);
    let events = decode_classes(classes.view(), &config.tuning, config.cursor_mode);
    info!("Decoded {} tab events from {} windows.", events.len(), classes.nrows());
    Ok(events)
}

/// Emits an event for every played string in every window, without merging sustained notes.
pub fn decode_tab_naive(predictions: ArrayView3<f32>, config: &PipelineConfig) -> Result<Vec<TabEvent>> {
    check_shape(predictions, config.n_strings(), config.n_classes())?;

    let classes = argmax_classes(predictions);
    let mut events = vec![];
    let mut position = 0;
    for row in classes.outer_iter() {
        let before = events.len();
        events.extend(
            row.iter()
                .enumerate()
                .filter(|(_, &class)| class != NOT_PLAYED)
                .map(|(string, &class)| TabEvent::new(position, string, class as i32 - 1)),
        );
        if events.len() > before {
            position += 1;
        }
    }
    Ok(events)
}

/// Packs events into an (n, 3) array of `[position, string, fret]` rows.
pub fn events_to_array(events: &[TabEvent]) -> Array2<i64> {
    let mut array = Array2::zeros((events.len(), 3));
    for (mut row, event) in array.outer_iter_mut().zip(events) {
        row[0] = event.position as i64;
        row[1] = event.string as i64;
        row[2] = event.fret as i64;
    }
    array
}
