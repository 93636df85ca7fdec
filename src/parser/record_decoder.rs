//! Component record decoding.
//!
//! V2 record, 6 bytes:
//! - 0..3: location (u24)
//! - 3: marker, `I` initial, `F` fret, `L` legato, `S` special
//! - 4: fret + 1
//! - 5: low nibble articulation, high nibble effect flags
//!
//! V3 record, 12 bytes:
//! - 0..4: location (u32)
//! - 4: type, bits 5-7 kind, bits 0-4 fret + 1 (or marker code)
//! - 5: articulation
//! - 6: effect flags
//! - 7: module (owning track)
//! - 8: voice discriminator
//! - 9..12: reserved

use crate::error::{Diagnostic, Diagnostics, UnrecognizedReason};
use crate::parser::events::{
    Articulation, ArticulationMarker, DecodedEvent, EffectFlags, GridLocation, Note, RawRecord,
    Rest, StructuralMarker, Unrecognized, Voice,
};
use crate::parser::location::{LocationDecoder, V2Locations, V3Locations};
use crate::parser::primitive_parser::{parse_u24, parse_u32};
use crate::parser::tef_types::{Track, V2_RECORD_SIZE, V3_RECORD_SIZE};
use crate::parser::tuning::note_pitch;

pub const V2_MARKER_INITIAL: u8 = b'I';
pub const V2_MARKER_FRET: u8 = b'F';
pub const V2_MARKER_LEGATO: u8 = b'L';
pub const V2_MARKER_SPECIAL: u8 = b'S';
pub const V2_MARKER_CONTINUE: u8 = b'C';
pub const V2_MARKER_SECTION: u8 = b'@';

pub const V3_KIND_NOTE: u8 = 1;
pub const V3_KIND_CHORD_MEMBER: u8 = 2;
pub const V3_KIND_ARTICULATION: u8 = 3;
pub const V3_KIND_REST: u8 = 4;
pub const V3_KIND_STRUCTURAL: u8 = 5;

const V3_FRET_MASK: u8 = 0x1F;

pub trait RecordDecoder {
    fn record_size(&self) -> usize;

    /// Project one record into an event, collecting what went wrong on the way
    fn decode(&self, record: &RawRecord, diagnostics: &mut Diagnostics) -> DecodedEvent;
}

/// What the type or marker byte says the record is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RecordKind {
    Note,
    ChordMember,
    Articulation,
    Rest,
    Structural,
}

/// Fields shared by both layouts once the raw bytes are split
struct RecordFields {
    track: usize,
    location: u32,
    kind: RecordKind,
    /// `fret + 1` for note kinds, payload otherwise
    fret_field: u8,
    articulation: Articulation,
    effects: EffectFlags,
    voice: Voice,
}

fn unrecognized(
    record: &RawRecord,
    track: Option<usize>,
    location: Option<GridLocation>,
    reason: UnrecognizedReason,
    diagnostics: &mut Diagnostics,
) -> DecodedEvent {
    diagnostics.push(Diagnostic::UnrecognizedRecord {
        offset: record.offset,
        reason,
    });
    DecodedEvent::Unrecognized(Unrecognized {
        record: record.clone(),
        track,
        location,
        reason,
    })
}

/// Shared tail of both decoders: place the record, check bounds, build the event
fn build_event(
    record: &RawRecord,
    fields: RecordFields,
    tracks: &[Track],
    locations: &dyn LocationDecoder,
    diagnostics: &mut Diagnostics,
) -> DecodedEvent {
    let RecordFields {
        track,
        location,
        kind,
        fret_field,
        articulation,
        effects,
        voice,
    } = fields;
    let Some(owner) = tracks.get(track) else {
        let module = u8::try_from(track).unwrap_or(u8::MAX);
        return unrecognized(
            record,
            None,
            None,
            UnrecognizedReason::UnknownModule(module),
            diagnostics,
        );
    };

    let grid = match locations.decode(location, track) {
        Ok(grid) => grid,
        Err(err) => {
            diagnostics.push(Diagnostic::LocationOutOfRange {
                offset: record.offset,
                location: err.location,
                measure_count: err.measure_count,
            });
            return DecodedEvent::Unrecognized(Unrecognized {
                record: record.clone(),
                track: Some(track),
                location: None,
                reason: UnrecognizedReason::LocationOutOfRange,
            });
        }
    };
    let GridLocation {
        measure, position, ..
    } = grid;

    match kind {
        RecordKind::Rest => DecodedEvent::Rest(Rest {
            track,
            measure,
            position,
            voice,
            offset: record.offset,
        }),
        RecordKind::Structural => DecodedEvent::StructuralMarker(StructuralMarker {
            track,
            measure,
            position,
            code: fret_field,
            voice,
            offset: record.offset,
        }),
        RecordKind::Articulation | RecordKind::Note | RecordKind::ChordMember => {
            let Some(string) = locations.string_index(&grid, track) else {
                return unrecognized(
                    record,
                    Some(track),
                    Some(grid),
                    UnrecognizedReason::StringOutOfRange(grid.string_component),
                    diagnostics,
                );
            };
            if kind == RecordKind::Articulation {
                return DecodedEvent::ArticulationMarker(ArticulationMarker {
                    track,
                    measure,
                    position,
                    string,
                    articulation,
                    effects,
                    voice,
                    offset: record.offset,
                });
            }
            let Some(fret) = fret_field.checked_sub(1) else {
                return unrecognized(
                    record,
                    Some(track),
                    Some(grid),
                    UnrecognizedReason::InvalidFret,
                    diagnostics,
                );
            };
            let note = Note {
                track,
                measure,
                position,
                string,
                fret,
                pitch: note_pitch(owner, string, fret),
                articulation,
                effects,
                voice,
                offset: record.offset,
            };
            if kind == RecordKind::ChordMember {
                DecodedEvent::ChordMember(note)
            } else {
                DecodedEvent::Note(note)
            }
        }
    }
}

/// Decoder for one V2 component block; the block determines the owning track
pub struct V2Records<'a> {
    tracks: &'a [Track],
    locations: &'a V2Locations,
    track: usize,
}

impl<'a> V2Records<'a> {
    pub const fn new(tracks: &'a [Track], locations: &'a V2Locations, track: usize) -> Self {
        Self {
            tracks,
            locations,
            track,
        }
    }
}

impl RecordDecoder for V2Records<'_> {
    fn record_size(&self) -> usize {
        V2_RECORD_SIZE
    }

    fn decode(&self, record: &RawRecord, diagnostics: &mut Diagnostics) -> DecodedEvent {
        let Ok((rest, location)) = parse_u24(&record.bytes) else {
            return unrecognized(
                record,
                Some(self.track),
                None,
                UnrecognizedReason::UnknownType(0),
                diagnostics,
            );
        };
        let (marker, fret_field, effect) = match rest {
            [marker, fret_field, effect, ..] => (*marker, *fret_field, *effect),
            _ => (0, 0, 0),
        };
        let mut articulation = Articulation::from_byte(effect & 0x0F);
        let kind = match (marker, fret_field) {
            (V2_MARKER_INITIAL, 0) => RecordKind::Rest,
            (V2_MARKER_INITIAL, _) => RecordKind::Note,
            (V2_MARKER_FRET | V2_MARKER_CONTINUE, _) => RecordKind::ChordMember,
            (V2_MARKER_LEGATO, f) => {
                if articulation == Articulation::Normal {
                    articulation = Articulation::HammerOn;
                }
                if f == 0 {
                    RecordKind::Articulation
                } else {
                    RecordKind::Note
                }
            }
            (V2_MARKER_SPECIAL | V2_MARKER_SECTION, _) => RecordKind::Structural,
            (other, _) => {
                return unrecognized(
                    record,
                    Some(self.track),
                    None,
                    UnrecognizedReason::UnknownType(other),
                    diagnostics,
                );
            }
        };
        let fields = RecordFields {
            track: self.track,
            location,
            kind,
            fret_field,
            articulation,
            effects: EffectFlags::from_byte(effect >> 4),
            voice: Voice::from_raw(0),
        };
        build_event(record, fields, self.tracks, self.locations, diagnostics)
    }
}

/// Decoder for the V3 component section; the module byte determines the owning track
pub struct V3Records<'a> {
    tracks: &'a [Track],
    locations: &'a V3Locations,
}

impl<'a> V3Records<'a> {
    pub const fn new(tracks: &'a [Track], locations: &'a V3Locations) -> Self {
        Self { tracks, locations }
    }
}

impl RecordDecoder for V3Records<'_> {
    fn record_size(&self) -> usize {
        V3_RECORD_SIZE
    }

    fn decode(&self, record: &RawRecord, diagnostics: &mut Diagnostics) -> DecodedEvent {
        let Ok((rest, location)) = parse_u32(&record.bytes) else {
            return unrecognized(
                record,
                None,
                None,
                UnrecognizedReason::UnknownType(0),
                diagnostics,
            );
        };
        let (type_byte, articulation, effects, module, voice) = match rest {
            [t, a, e, m, v, ..] => (*t, *a, *e, *m, *v),
            _ => (0, 0, 0, 0, 0),
        };
        let kind = match type_byte >> 5 {
            V3_KIND_NOTE => RecordKind::Note,
            V3_KIND_CHORD_MEMBER => RecordKind::ChordMember,
            V3_KIND_ARTICULATION => RecordKind::Articulation,
            V3_KIND_REST => RecordKind::Rest,
            V3_KIND_STRUCTURAL => RecordKind::Structural,
            _ => {
                let track = usize::from(module);
                let track = (track < self.tracks.len()).then_some(track);
                return unrecognized(
                    record,
                    track,
                    None,
                    UnrecognizedReason::UnknownType(type_byte),
                    diagnostics,
                );
            }
        };
        let fields = RecordFields {
            track: usize::from(module),
            location,
            kind,
            fret_field: type_byte & V3_FRET_MASK,
            articulation: Articulation::from_byte(articulation),
            effects: EffectFlags::from_byte(effects),
            voice: Voice::from_raw(voice),
        };
        build_event(record, fields, self.tracks, self.locations, diagnostics)
    }
}
