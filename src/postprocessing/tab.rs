use std::collections::BTreeMap;

use crate::config::Tuning;
use crate::error::Result;

use super::decode::TabEvent;

const NOTE_NAMES: [&str; 12] = ["C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B"];
const MARGIN: [&str; 3] = ["T", "A", "B"];

/// Staff labels, lowest string first. The top string is lower-cased when it
/// shares its name with the bottom one (`E ... e`).
pub fn string_names(tuning: &Tuning) -> Vec<String> {
    let mut names: Vec<String> =
        tuning.pitches().iter().map(|&p| NOTE_NAMES[p as usize % 12].to_string()).collect();
    if names.len() > 1 && names.first() == names.last() {
        if let Some(top) = names.last_mut() {
            *top = top.to_lowercase();
        }
    }
    names
}

/// Renders events as plain-text tablature, `positions_per_line` positions per staff.
pub fn render_ascii(events: &[TabEvent], tuning: &Tuning, positions_per_line: usize) -> String {
    let names = string_names(tuning);
    let name_width = names.iter().map(|n| n.len()).max().unwrap_or(1);

    let mut by_position: BTreeMap<usize, Vec<&TabEvent>> = BTreeMap::new();
    for event in events {
        by_position.entry(event.position).or_default().push(event);
    }
    let positions: Vec<(usize, Vec<&TabEvent>)> = by_position.into_iter().collect();

    let mut staves = vec![];
    for block in positions.chunks(positions_per_line.max(1)) {
        let mut lines: Vec<String> = names
            .iter()
            .enumerate()
            .rev()
            .map(|(i, name)| {
                let margin = MARGIN.get(names.len() - 1 - i).copied().unwrap_or(" ");
                format!("{} {:>width$}|", margin, name, width = name_width)
            })
            .collect();

        for (_, notes) in block {
            let cell = notes.iter().map(|e| e.fret.to_string().len()).max().unwrap_or(1);
            for (row, line) in lines.iter_mut().enumerate() {
                let string = names.len() - 1 - row;
                let fret = notes.iter().find(|e| e.string == string).map(|e| e.fret.to_string());
                match fret {
                    Some(fret) => line.push_str(&format!("-{:-<cell$}-", fret, cell = cell)),
                    None => line.push_str(&"-".repeat(cell + 2)),
                }
            }
        }

        for line in lines.iter_mut() {
            line.push('|');
        }
        staves.push(lines.join("\n"));
    }

    staves.join("\n\n")
}

/// Serializes events as `[{"pos": .., "string": .., "fret": ..}, ..]`.
pub fn to_json(events: &[TabEvent]) -> Result<String> {
    Ok(serde_json::to_string(events)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_string_names() {
        assert_eq!(string_names(&Tuning::standard()), vec!["E", "A", "D", "G", "B", "e"]);
        assert_eq!(string_names(&Tuning::drop_d())[0], "D");
    }

    #[test]
    fn test_render_single_staff() {
        let events = vec![TabEvent::new(0, 1, 3), TabEvent::new(0, 2, 2), TabEvent::new(1, 5, 12)];
        let rendered = render_ascii(&events, &Tuning::standard(), 10);
        let expected = [
            "T e|----12-|",
            "A B|-------|",
            "B G|-------|",
            "  D|-2-----|",
            "  A|-3-----|",
            "  E|-------|",
        ]
        .join("\n");
        assert_eq!(rendered, expected);
    }

    #[test]
    fn test_render_wraps_positions() {
        let events: Vec<TabEvent> = (0..5).map(|p| TabEvent::new(p, 0, 0)).collect();
        let rendered = render_ascii(&events, &Tuning::standard(), 2);
        assert_eq!(rendered.split("\n\n").count(), 3);
    }

    #[test]
    fn test_json_rows() {
        let json = to_json(&[TabEvent::new(4, 2, 7)]).unwrap();
        assert_eq!(json, r#"[{"pos":4,"string":2,"fret":7}]"#);
    }
}
