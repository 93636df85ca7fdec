//! Typed events decoded from component records

use crate::error::UnrecognizedReason;

/// Fixed-size record as stored in the component section
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    /// File offset of the first byte
    pub offset: usize,
    pub bytes: Vec<u8>,
}

impl RawRecord {
    pub fn new(offset: usize, bytes: &[u8]) -> Self {
        RawRecord {
            offset,
            bytes: bytes.to_vec(),
        }
    }

    /// All-0xFF record terminating a component section
    pub fn is_sentinel(&self) -> bool {
        self.bytes.iter().all(|&b| b == 0xFF)
    }
}

/// Result of location decoding, before the string is tied to a track
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GridLocation {
    /// 1-indexed
    pub measure: u32,
    /// Grid units from the start of the measure, version specific resolution
    pub position: u32,
    /// 0-based string component as packed in the location
    pub string_component: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Articulation {
    Normal,
    HammerOn,
    PullOff,
    Slide,
    Choke,
    Brush,
    NaturalHarmonic,
    ArtificialHarmonic,
    PalmMute,
    Tap,
    Vibrato,
    Tremolo,
    Bend,
    BendRelease,
    Roll,
    DeadNote,
    Unknown(u8),
}

impl Articulation {
    pub const fn from_byte(byte: u8) -> Articulation {
        match byte {
            0 => Articulation::Normal,
            1 => Articulation::HammerOn,
            2 => Articulation::PullOff,
            3 => Articulation::Slide,
            4 => Articulation::Choke,
            5 => Articulation::Brush,
            6 => Articulation::NaturalHarmonic,
            7 => Articulation::ArtificialHarmonic,
            8 => Articulation::PalmMute,
            9 => Articulation::Tap,
            10 => Articulation::Vibrato,
            11 => Articulation::Tremolo,
            12 => Articulation::Bend,
            13 => Articulation::BendRelease,
            14 => Articulation::Roll,
            15 => Articulation::DeadNote,
            _ => Articulation::Unknown(byte),
        }
    }

    pub const fn is_legato(&self) -> bool {
        matches!(
            self,
            Articulation::HammerOn | Articulation::PullOff | Articulation::Slide
        )
    }

    /// Short tablature symbol
    pub const fn symbol(&self) -> &'static str {
        match self {
            Articulation::Normal => "",
            Articulation::HammerOn => "h",
            Articulation::PullOff => "p",
            Articulation::Slide => "/",
            Articulation::Choke => "ch",
            Articulation::Brush => "br",
            Articulation::NaturalHarmonic => "<>",
            Articulation::ArtificialHarmonic => "ah",
            Articulation::PalmMute => "pm",
            Articulation::Tap => "t",
            Articulation::Vibrato => "~",
            Articulation::Tremolo => "tr",
            Articulation::Bend => "b",
            Articulation::BendRelease => "b/r",
            Articulation::Roll => "r",
            Articulation::DeadNote => "x",
            Articulation::Unknown(_) => "?",
        }
    }
}

/// Additive effects, independent of the articulation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct EffectFlags {
    pub let_ring: bool,
    pub slap: bool,
    pub ghost_note: bool,
    pub staccato: bool,
    pub fade_in: bool,
}

impl EffectFlags {
    /// bit0 let-ring, bit1 slap, bit2 ghost-note, bit3 staccato, bit4 fade-in
    pub const fn from_byte(byte: u8) -> Self {
        EffectFlags {
            let_ring: (byte & 0x01) != 0,
            slap: (byte & 0x02) != 0,
            ghost_note: (byte & 0x04) != 0,
            staccato: (byte & 0x08) != 0,
            fade_in: (byte & 0x10) != 0,
        }
    }

    pub const fn is_empty(&self) -> bool {
        !(self.let_ring || self.slap || self.ghost_note || self.staccato || self.fade_in)
    }
}

/// Best-effort reading of the voice discriminator.
///
/// Observed files use 0 for the accompaniment part and multiples of 6 for
/// melody voices; anything else is left uninterpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VoiceKind {
    Primary,
    Melody(u8),
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Voice {
    pub raw: u8,
    pub kind: VoiceKind,
}

impl Voice {
    pub const fn from_raw(raw: u8) -> Self {
        let kind = match raw {
            0 => VoiceKind::Primary,
            r if r % 6 == 0 => VoiceKind::Melody(r / 6),
            _ => VoiceKind::Unknown,
        };
        Voice { raw, kind }
    }
}

/// A fretted note (also used for chord members)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Note {
    pub track: usize,
    pub measure: u32,
    pub position: u32,
    /// 1-indexed within the owning track
    pub string: u8,
    pub fret: u8,
    pub pitch: i16,
    pub articulation: Articulation,
    pub effects: EffectFlags,
    pub voice: Voice,
    pub offset: usize,
}

/// An articulation attached to a string position without a fretted note
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticulationMarker {
    pub track: usize,
    pub measure: u32,
    pub position: u32,
    pub string: u8,
    pub articulation: Articulation,
    pub effects: EffectFlags,
    pub voice: Voice,
    pub offset: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rest {
    pub track: usize,
    pub measure: u32,
    pub position: u32,
    pub voice: Voice,
    pub offset: usize,
}

/// Section or other structural marker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructuralMarker {
    pub track: usize,
    pub measure: u32,
    pub position: u32,
    pub code: u8,
    pub voice: Voice,
    pub offset: usize,
}

/// Record kept for auditing, never placed on a timeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unrecognized {
    pub record: RawRecord,
    pub track: Option<usize>,
    pub location: Option<GridLocation>,
    pub reason: UnrecognizedReason,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedEvent {
    Note(Note),
    ChordMember(Note),
    ArticulationMarker(ArticulationMarker),
    Rest(Rest),
    StructuralMarker(StructuralMarker),
    Unrecognized(Unrecognized),
}

impl DecodedEvent {
    /// Owning track, if it could be resolved
    pub const fn track(&self) -> Option<usize> {
        match self {
            DecodedEvent::Note(n) | DecodedEvent::ChordMember(n) => Some(n.track),
            DecodedEvent::ArticulationMarker(m) => Some(m.track),
            DecodedEvent::Rest(r) => Some(r.track),
            DecodedEvent::StructuralMarker(s) => Some(s.track),
            DecodedEvent::Unrecognized(u) => u.track,
        }
    }

    /// (measure, position) for events that can be placed in time
    pub const fn placement(&self) -> Option<(u32, u32)> {
        match self {
            DecodedEvent::Note(n) | DecodedEvent::ChordMember(n) => Some((n.measure, n.position)),
            DecodedEvent::ArticulationMarker(m) => Some((m.measure, m.position)),
            DecodedEvent::Rest(r) => Some((r.measure, r.position)),
            DecodedEvent::StructuralMarker(s) => Some((s.measure, s.position)),
            DecodedEvent::Unrecognized(_) => None,
        }
    }

    pub const fn measure(&self) -> Option<u32> {
        match self.placement() {
            Some((measure, _)) => Some(measure),
            None => None,
        }
    }

    pub const fn voice(&self) -> Option<Voice> {
        match self {
            DecodedEvent::Note(n) | DecodedEvent::ChordMember(n) => Some(n.voice),
            DecodedEvent::ArticulationMarker(m) => Some(m.voice),
            DecodedEvent::Rest(r) => Some(r.voice),
            DecodedEvent::StructuralMarker(s) => Some(s.voice),
            DecodedEvent::Unrecognized(_) => None,
        }
    }

    /// Fretted note payload of notes and chord members
    pub const fn note(&self) -> Option<&Note> {
        match self {
            DecodedEvent::Note(n) | DecodedEvent::ChordMember(n) => Some(n),
            _ => None,
        }
    }

    pub const fn is_unrecognized(&self) -> bool {
        matches!(self, DecodedEvent::Unrecognized(_))
    }
}
