//! Integration tests for tefdecode library usage.
//!
//! These tests verify that the library can be used as a dependency
//! from external projects.

use tefdecode::{
    parse_tef_data, tuning_to_pitch, DecodedEvent, Diagnostic, Document, ExpandOptions,
    FormatVersion, ParsedDocument, TefError, TrackRole, DEFAULT_TICKS_PER_QUARTER,
};

/// Test that all major types are accessible from the library.
#[test]
fn test_types_accessible() {
    // If any re-export is missing, this test will fail to compile.
    fn _assert_types() {
        let _: fn(&[u8]) -> Result<ParsedDocument, TefError> = parse_tef_data;
        let _: fn(u8) -> i16 = tuning_to_pitch;
        let _: u32 = DEFAULT_TICKS_PER_QUARTER;
    }
}

/// 3.xx file with a 4-string bass track, notes on string 1 at the start of each measure
fn bass_file(measure_count: u16, reading_list: Option<&[(u16, u16)]>) -> Vec<u8> {
    let mut data = vec![0u8; 0x100];
    data[0..4].copy_from_slice(&[0x10, 0x00, 0x02, 0x03]);
    data[0x0C..0x10].copy_from_slice(&0x100u32.to_le_bytes());
    data[0x20..0x22].copy_from_slice(&measure_count.to_le_bytes());
    data[0x22] = 4;
    data[0x23] = 4;
    data[0x24..0x26].copy_from_slice(&100u16.to_le_bytes());
    data[0x26] = 1;
    data[0x40..0x48].copy_from_slice(b"Bass run");

    // track record
    let mut track = vec![0u8; 64];
    track[..4].copy_from_slice(b"bass");
    track[32] = 4;
    track[33] = 2;
    track[36..40].copy_from_slice(&[53, 58, 63, 68]);
    data.extend(track);

    // component section: 4 strings, 128 values per position, 16 positions per measure
    let components = data.len() as u32;
    data[0x04..0x08].copy_from_slice(&components.to_le_bytes());
    data[0x08..0x0C].copy_from_slice(&u32::from(measure_count).to_le_bytes());
    for measure in 0..u32::from(measure_count) {
        let location = measure * 128 * 16 + 1;
        data.extend(location.to_le_bytes());
        // note, fret = measure
        data.extend([0x20 | (measure as u8 + 1), 0, 0, 0, 0, 0, 0, 0]);
    }

    if let Some(ranges) = reading_list {
        let offset = data.len() as u32;
        data[0x18..0x1C].copy_from_slice(&offset.to_le_bytes());
        data.extend((ranges.len() as u16).to_le_bytes());
        for (start, end) in ranges {
            data.extend(start.to_le_bytes());
            data.extend(end.to_le_bytes());
        }
    }
    data
}

fn parse(data: &[u8]) -> Document {
    let parsed = parse_tef_data(data).expect("Failed to parse TEF data");
    assert!(parsed.diagnostics.is_empty(), "{:?}", parsed.diagnostics);
    parsed.document
}

#[test]
fn test_parse_document() {
    let document = parse(&bass_file(4, None));
    assert_eq!(document.version, FormatVersion::V3);
    assert_eq!(document.info.title, "Bass run");
    assert_eq!(document.tempo(), 100);
    assert_eq!(document.tracks.len(), 1);
    let bass = &document.tracks[0];
    assert_eq!(bass.role, TrackRole::Bass);
    assert_eq!(bass.tunings, vec![43, 38, 33, 28]);

    let pitches: Vec<i16> = document
        .events(0)
        .expect("bass events")
        .events
        .iter()
        .filter_map(DecodedEvent::note)
        .map(|n| n.pitch)
        .collect();
    assert_eq!(pitches, vec![43, 44, 45, 46]);
}

#[test]
fn test_timeline_follows_reading_list() {
    let document = parse(&bass_file(4, Some(&[(1, 2), (1, 4)])));
    let expansion = document
        .timeline(0, &ExpandOptions::default())
        .expect("track 0 exists");
    assert!(expansion.warnings.is_empty());
    let timeline = expansion.timeline;
    assert_eq!(timeline.measure_span(), 6);
    let frets: Vec<u8> = timeline
        .events
        .iter()
        .filter_map(|e| e.event.note())
        .map(|n| n.fret)
        .collect();
    assert_eq!(frets, vec![0, 1, 0, 1, 2, 3]);
    assert!(timeline.events.windows(2).all(|w| w[0].tick < w[1].tick));
}

#[test]
fn test_stale_reading_list_is_reported() {
    let document = parse(&bass_file(2, Some(&[(1, 2), (3, 5)])));
    let expansion = document
        .timeline(0, &ExpandOptions::default())
        .expect("track 0 exists");
    assert_eq!(expansion.timeline.len(), 2);
    assert_eq!(expansion.warnings.len(), 1);
    let warning = expansion.warnings.iter().next().expect("one warning");
    assert!(matches!(warning, Diagnostic::ExpansionWarning { entry_index: 1, .. }));
}

/// Test error handling for invalid data.
#[test]
fn test_parse_error() {
    let invalid_data = vec![0u8; 10];
    let result = parse_tef_data(&invalid_data);
    assert!(
        matches!(result, Err(TefError::UnsupportedFormat { .. })),
        "Should be an UnsupportedFormat error"
    );

    let mut truncated = bass_file(4, None);
    truncated.truncate(0x100 + 64 + 20);
    assert!(matches!(
        parse_tef_data(&truncated),
        Err(TefError::TruncatedComponentSection { .. })
    ));
}
