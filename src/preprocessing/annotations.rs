use std::{collections::BTreeMap, fs, path::Path};

use log::{debug, info};
use midly::{MetaMessage, MidiMessage, Smf, Timing, TrackEventKind};
use serde::Deserialize;

use crate::constants::{DEFAULT_TEMPO_US_PER_BEAT, JAMS_NOTE_NAMESPACE};
use crate::error::{Result, TabError};

/// A note struck on one string.
#[derive(Debug, Clone, PartialEq)]
pub struct NoteEvent {
    pub string: usize,
    pub pitch: f32,
    /// Onset in seconds.
    pub onset: f64,
    /// Duration in seconds.
    pub duration: f64,
}

#[derive(Debug, Deserialize)]
struct Jams {
    annotations: Vec<JamsAnnotation>,
}

#[derive(Debug, Deserialize)]
struct JamsAnnotation {
    namespace: String,
    /// Observation layout depends on the namespace, so it is decoded lazily.
    #[serde(default)]
    data: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct JamsObservation {
    time: f64,
    #[serde(default)]
    duration: f64,
    value: f64,
}

fn sort_by_onset(events: &mut [NoteEvent]) {
    events.sort_by(|a, b| a.onset.total_cmp(&b.onset));
}

/// Parses JAMS JSON text. The i-th `note_midi` annotation holds the notes of string i.
pub fn parse_jams(source: &str) -> Result<Vec<NoteEvent>> {
    let jams: Jams = serde_json::from_str(source)?;

    let mut events = vec![];
    let note_annotations = jams.annotations.into_iter().filter(|a| a.namespace == JAMS_NOTE_NAMESPACE);
    for (string, annotation) in note_annotations.enumerate() {
        for value in annotation.data {
            let observation: JamsObservation = serde_json::from_value(value)?;
            events.push(NoteEvent {
                string,
                pitch: observation.value as f32,
                onset: observation.time,
                duration: observation.duration,
            });
        }
    }

    sort_by_onset(&mut events);
    Ok(events)
}

pub fn read_jams<P: AsRef<Path>>(path: P, n_strings: usize) -> Result<Vec<NoteEvent>> {
    let path = path.as_ref();
    let source = fs::read_to_string(path).map_err(|e| TabError::io(path, e))?;
    let events = parse_jams(&source).map_err(|e| match e {
        TabError::Json(err) => TabError::annotation(path, err.to_string()),
        other => other,
    })?;

    if let Some(event) = events.iter().find(|e| e.string >= n_strings) {
        return Err(TabError::annotation(
            path,
            format!("found notes for string {} but the tuning has {} strings", event.string, n_strings),
        ));
    }

    info!("Read {} notes from {}.", events.len(), path.display());
    Ok(events)
}

/// Parses a Standard MIDI File where MIDI channel n carries the notes of string n.
pub fn parse_midi(data: &[u8], n_strings: usize) -> Result<Vec<NoteEvent>> {
    let smf = Smf::parse(data)?;

    // Merge all tracks on an absolute tick axis.
    let mut timeline: Vec<(u64, TrackEventKind)> = vec![];
    for track in smf.tracks.iter() {
        let mut tick = 0u64;
        for event in track.iter() {
            tick += event.delta.as_int() as u64;
            timeline.push((tick, event.kind));
        }
    }
    timeline.sort_by_key(|(tick, _)| *tick);

    let mut seconds_per_tick = match smf.header.timing {
        Timing::Metrical(ticks_per_beat) => {
            DEFAULT_TEMPO_US_PER_BEAT as f64 / 1e6 / ticks_per_beat.as_int().max(1) as f64
        }
        Timing::Timecode(fps, subframes) => 1.0 / (fps.as_f32() as f64 * subframes.max(1) as f64),
    };
    let ticks_per_beat = match smf.header.timing {
        Timing::Metrical(ticks_per_beat) => Some(ticks_per_beat.as_int().max(1) as f64),
        Timing::Timecode(..) => None,
    };

    let mut open_notes: BTreeMap<(u8, u8), f64> = BTreeMap::new();
    let mut events = vec![];
    let mut last_tick = 0u64;
    let mut now = 0.0f64;

    for (tick, kind) in timeline {
        now += (tick - last_tick) as f64 * seconds_per_tick;
        last_tick = tick;

        match kind {
            TrackEventKind::Meta(MetaMessage::Tempo(us_per_beat)) => {
                if let Some(ticks_per_beat) = ticks_per_beat {
                    seconds_per_tick = us_per_beat.as_int() as f64 / 1e6 / ticks_per_beat;
                }
            }
            TrackEventKind::Midi { channel, message } => {
                let string = channel.as_int();
                let (key, starts) = match message {
                    MidiMessage::NoteOn { key, vel } => (key.as_int(), vel.as_int() > 0),
                    MidiMessage::NoteOff { key, .. } => (key.as_int(), false),
                    _ => continue,
                };

                if string as usize >= n_strings {
                    return Err(TabError::annotation(
                        "<midi>",
                        format!("note on channel {} but the tuning has {} strings", string, n_strings),
                    ));
                }

                if let Some(onset) = open_notes.remove(&(string, key)) {
                    events.push(NoteEvent { string: string as usize, pitch: key as f32, onset, duration: now - onset });
                }
                if starts {
                    open_notes.insert((string, key), now);
                }
            }
            _ => {}
        }
    }

    for ((string, key), onset) in open_notes {
        debug!("Closing note {} on string {} at end of file.", key, string);
        events.push(NoteEvent { string: string as usize, pitch: key as f32, onset, duration: now - onset });
    }

    sort_by_onset(&mut events);
    Ok(events)
}

pub fn read_midi<P: AsRef<Path>>(path: P, n_strings: usize) -> Result<Vec<NoteEvent>> {
    let path = path.as_ref();
    let data = fs::read(path).map_err(|e| TabError::io(path, e))?;
    let events = parse_midi(&data, n_strings).map_err(|e| match e {
        TabError::Annotation { reason, .. } => TabError::annotation(path, reason),
        other => other,
    })?;

    info!("Read {} notes from {}.", events.len(), path.display());
    Ok(events)
}

/// Reads note events, choosing the parser from the file extension.
pub fn read_annotations<P: AsRef<Path>>(path: P, n_strings: usize) -> Result<Vec<NoteEvent>> {
    let path = path.as_ref();
    match path.extension().and_then(|e| e.to_str()).map(|e| e.to_ascii_lowercase()).as_deref() {
        Some("jams") => read_jams(path, n_strings),
        Some("mid") | Some("midi") => read_midi(path, n_strings),
        _ => Err(TabError::annotation(path, "unsupported annotation format")),
    }
}
