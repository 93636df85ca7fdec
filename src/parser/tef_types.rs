//! TEF file format data structures and layout constants
//!
//! All multi-byte integers are little-endian.

use crate::parser::tuning::{pitch_name, tuning_to_pitch};

/// Format identifier at offset 0 shared by both layouts
pub const FORMAT_ID: u16 = 0x0010;

pub const FORMAT_ID_OFFSET: usize = 0x00;
pub const VERSION_MINOR_OFFSET: usize = 0x02;
pub const VERSION_MAJOR_OFFSET: usize = 0x03;

/// Both layouts use a 256-byte fixed header
pub const HEADER_SIZE: usize = 0x100;

/// Info strings (title, composer, comments) are 64-byte NUL-terminated fields
pub const INFO_FIELD_SIZE: usize = 0x40;

/// Track names are 32-byte NUL-terminated fields
pub const TRACK_NAME_SIZE: usize = 0x20;

/// Tuning slots available in a track record
pub const MAX_STRINGS: usize = 12;

// V2 header
pub const V2_TITLE_OFFSET: usize = 0x04;
pub const V2_COMPOSER_OFFSET: usize = 0x44;
pub const V2_COMMENTS_OFFSET: usize = 0x84;
pub const V2_MEASURE_COUNT_OFFSET: usize = 0xC4;
pub const V2_TIME_NUMERATOR_OFFSET: usize = 0xC6;
pub const V2_TIME_DENOMINATOR_OFFSET: usize = 0xC7;
pub const V2_TEMPO_OFFSET: usize = 0xC8;
pub const V2_STRING_COUNT_OFFSET: usize = 0xCA;
pub const V2_TRACK_COUNT_OFFSET: usize = 0xCB;
pub const V2_COMPONENT_COUNT_OFFSET: usize = 0xCC;
pub const V2_READING_LIST_OFFSET: usize = 0xD0;
/// End of the last V2 header field, reserved up to `HEADER_SIZE`
pub const V2_HEADER_FIELDS_END: usize = 0xD4;

/// V2 track records start right after the header
pub const V2_TRACKS_OFFSET: usize = HEADER_SIZE;
/// [name 32][string_count 1][role 1][component_count 2][tuning 12]
pub const V2_TRACK_RECORD_SIZE: usize = 48;
pub const V2_RECORD_SIZE: usize = 6;

// V3 header
pub const V3_COMPONENT_MARKER_OFFSET: usize = 0x04;
pub const V3_COMPONENT_COUNT_OFFSET: usize = 0x08;
pub const V3_TRACKS_POINTER_OFFSET: usize = 0x0C;
pub const V3_CHORDS_POINTER_OFFSET: usize = 0x10;
pub const V3_TEXT_EVENTS_POINTER_OFFSET: usize = 0x14;
pub const V3_READING_LIST_POINTER_OFFSET: usize = 0x18;
pub const V3_COPYRIGHT_POINTER_OFFSET: usize = 0x1C;
pub const V3_MEASURE_COUNT_OFFSET: usize = 0x20;
pub const V3_TIME_NUMERATOR_OFFSET: usize = 0x22;
pub const V3_TIME_DENOMINATOR_OFFSET: usize = 0x23;
pub const V3_TEMPO_OFFSET: usize = 0x24;
pub const V3_TRACK_COUNT_OFFSET: usize = 0x26;
/// 0x27..0x40 reserved
pub const V3_RESERVED_OFFSET: usize = 0x27;
pub const V3_TITLE_OFFSET: usize = 0x40;
pub const V3_COMPOSER_OFFSET: usize = 0x80;
pub const V3_COMMENTS_OFFSET: usize = 0xC0;

/// [name 32][string_count 1][role 1][capo 1][reserved 1][tuning 12][reserved 16]
pub const V3_TRACK_RECORD_SIZE: usize = 64;
pub const V3_RECORD_SIZE: usize = 12;

/// Grid units per whole note in V2 locations (`ts_size = 256 * num / den`)
pub const V2_UNITS_PER_WHOLE: u32 = 256;
/// Grid units per whole note in V3 locations (sixteenth-note grid)
pub const V3_UNITS_PER_WHOLE: u32 = 16;

/// On-disk layout family
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FormatVersion {
    /// Files written before 3.00: 6-byte records, closed-form locations
    V2,
    /// Files written by 3.00 and later: 12-byte records, measure-scan locations
    V3,
}

impl FormatVersion {
    /// Detect the layout from the leading signature
    pub const fn detect(format_id: u16, major: u8) -> Option<FormatVersion> {
        if format_id != FORMAT_ID {
            return None;
        }
        match major {
            1 | 2 => Some(FormatVersion::V2),
            3..=9 => Some(FormatVersion::V3),
            _ => None,
        }
    }

    pub const fn record_size(&self) -> usize {
        match self {
            FormatVersion::V2 => V2_RECORD_SIZE,
            FormatVersion::V3 => V3_RECORD_SIZE,
        }
    }

    pub const fn track_record_size(&self) -> usize {
        match self {
            FormatVersion::V2 => V2_TRACK_RECORD_SIZE,
            FormatVersion::V3 => V3_TRACK_RECORD_SIZE,
        }
    }

    /// Internal grid resolution of positions within a measure
    pub const fn units_per_whole(&self) -> u32 {
        match self {
            FormatVersion::V2 => V2_UNITS_PER_WHOLE,
            FormatVersion::V3 => V3_UNITS_PER_WHOLE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeSignature {
    pub numerator: u8,
    pub denominator: u8,
}

impl Default for TimeSignature {
    fn default() -> Self {
        TimeSignature {
            numerator: 4,
            denominator: 4,
        }
    }
}

impl std::fmt::Display for TimeSignature {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}/{}", self.numerator, self.denominator)
    }
}

/// Fixed header fields of either layout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TefHeader {
    pub format_id: u16,
    pub version_major: u8,
    pub version_minor: u8,
    pub version: FormatVersion,
    pub measure_count: u16,
    pub time_signature: TimeSignature,
    pub tempo: u16,
    pub track_count: u8,
    /// Total string count declared by the header (V2 only)
    pub declared_string_count: Option<u8>,
    pub component_count: u32,
    pub sections: SectionPointers,
}

impl TefHeader {
    /// e.g. "3.05"
    pub fn version_string(&self) -> String {
        format!("{}.{:02}", self.version_major, self.version_minor)
    }
}

/// File offsets of the variable sections, `None` when absent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SectionPointers {
    /// V3 component marker; V2 components follow the track records
    pub components: Option<u32>,
    pub tracks: Option<u32>,
    pub chords: Option<u32>,
    pub text_events: Option<u32>,
    pub reading_list: Option<u32>,
    pub copyright: Option<u32>,
}

impl SectionPointers {
    /// Zero pointers mean the section is absent
    pub const fn pointer(value: u32) -> Option<u32> {
        if value == 0 {
            None
        } else {
            Some(value)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SongInfo {
    pub title: String,
    pub composer: String,
    pub comments: String,
    pub copyright: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackRole {
    Lead,
    Rhythm,
    Bass,
    Drum,
}

impl TrackRole {
    pub const fn from_byte(byte: u8) -> Option<TrackRole> {
        match byte {
            0 => Some(TrackRole::Lead),
            1 => Some(TrackRole::Rhythm),
            2 => Some(TrackRole::Bass),
            3 => Some(TrackRole::Drum),
            _ => None,
        }
    }

    /// Best guess from the instrument name when the role byte is not usable
    pub fn infer_from_name(name: &str) -> TrackRole {
        let name = name.to_lowercase();
        if name.contains("banjo") || name.contains("mandolin") {
            TrackRole::Lead
        } else if name.contains("bass") {
            TrackRole::Bass
        } else if name.contains("drum") || name.contains("percussion") {
            TrackRole::Drum
        } else {
            TrackRole::Rhythm
        }
    }
}

impl std::fmt::Display for TrackRole {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let s = match self {
            TrackRole::Lead => "lead",
            TrackRole::Rhythm => "rhythm",
            TrackRole::Bass => "bass",
            TrackRole::Drum => "drum",
        };
        write!(f, "{s}")
    }
}

/// Instrument definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    /// Position in the track list, also the module discriminator of V3 records
    pub index: usize,
    pub name: String,
    pub role: TrackRole,
    pub string_count: u8,
    /// Open-string pitches, string 1 first
    pub tunings: Vec<i16>,
    /// Raw tuning bytes as stored
    pub tuning_bytes: Vec<u8>,
    pub capo: u8,
    /// Records declared for this track (V2 component blocks)
    pub component_count: Option<u16>,
    /// File offset of the track record
    pub offset: usize,
}

impl Track {
    pub fn new(index: usize, name: String, role: TrackRole, tuning_bytes: &[u8]) -> Self {
        Track {
            index,
            name,
            role,
            string_count: tuning_bytes.len() as u8,
            tunings: tuning_bytes.iter().map(|&b| tuning_to_pitch(b)).collect(),
            tuning_bytes: tuning_bytes.to_vec(),
            capo: 0,
            component_count: None,
            offset: 0,
        }
    }

    pub fn tuning_names(&self) -> Vec<String> {
        self.tunings.iter().map(|&p| pitch_name(p)).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextEvent {
    pub measure: u16,
    pub position: u8,
    pub text: String,
}

/// One playback range, 1-indexed and inclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadingListEntry {
    pub start_measure: u32,
    pub end_measure: u32,
}

impl ReadingListEntry {
    pub const fn new(start_measure: u32, end_measure: u32) -> Self {
        ReadingListEntry {
            start_measure,
            end_measure,
        }
    }

    /// Measures covered by the entry, zero when inverted
    pub const fn measure_span(&self) -> u32 {
        if self.end_measure < self.start_measure {
            0
        } else {
            (self.end_measure - self.start_measure).saturating_add(1)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReadingList {
    pub entries: Vec<ReadingListEntry>,
}

impl ReadingList {
    pub fn new(ranges: &[(u32, u32)]) -> Self {
        ReadingList {
            entries: ranges
                .iter()
                .map(|&(start, end)| ReadingListEntry::new(start, end))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_version_detect() {
        assert_eq!(FormatVersion::detect(0x0010, 2), Some(FormatVersion::V2));
        assert_eq!(FormatVersion::detect(0x0010, 1), Some(FormatVersion::V2));
        assert_eq!(FormatVersion::detect(0x0010, 3), Some(FormatVersion::V3));
        assert_eq!(FormatVersion::detect(0x0010, 0), None);
        assert_eq!(FormatVersion::detect(0x0010, 0xFF), None);
        assert_eq!(FormatVersion::detect(0x4b50, 3), None);
    }

    #[test]
    fn test_format_version_capabilities() {
        assert_eq!(FormatVersion::V2.record_size(), 6);
        assert_eq!(FormatVersion::V3.record_size(), 12);
        assert_eq!(FormatVersion::V2.units_per_whole(), 256);
        assert_eq!(FormatVersion::V3.units_per_whole(), 16);
        assert!(FormatVersion::V2 < FormatVersion::V3);
    }

    #[test]
    fn test_header_fields_are_contiguous() {
        // V2 fields are read in sequence, the table must not leave holes
        assert_eq!(V2_TITLE_OFFSET + INFO_FIELD_SIZE, V2_COMPOSER_OFFSET);
        assert_eq!(V2_COMPOSER_OFFSET + INFO_FIELD_SIZE, V2_COMMENTS_OFFSET);
        assert_eq!(V2_COMMENTS_OFFSET + INFO_FIELD_SIZE, V2_MEASURE_COUNT_OFFSET);
        assert_eq!(V2_READING_LIST_OFFSET + 4, V2_HEADER_FIELDS_END);
        assert_eq!(V3_COMMENTS_OFFSET + INFO_FIELD_SIZE, HEADER_SIZE);
        assert_eq!(TRACK_NAME_SIZE + 4 + MAX_STRINGS, V2_TRACK_RECORD_SIZE);
    }

    #[test]
    fn test_role_from_byte_and_name() {
        assert_eq!(TrackRole::from_byte(2), Some(TrackRole::Bass));
        assert_eq!(TrackRole::from_byte(9), None);
        assert_eq!(TrackRole::infer_from_name("Banjo open G"), TrackRole::Lead);
        assert_eq!(TrackRole::infer_from_name("Mandolin GDAE"), TrackRole::Lead);
        assert_eq!(TrackRole::infer_from_name("bass"), TrackRole::Bass);
        assert_eq!(TrackRole::infer_from_name("Drums"), TrackRole::Drum);
        assert_eq!(TrackRole::infer_from_name("guitar"), TrackRole::Rhythm);
    }

    #[test]
    fn test_track_tunings() {
        let track = Track::new(
            0,
            "Banjo open G".to_string(),
            TrackRole::Lead,
            &[34, 37, 41, 46, 29],
        );
        assert_eq!(track.string_count, 5);
        assert_eq!(track.tunings, vec![62, 59, 55, 50, 67]);
        assert_eq!(track.tuning_names(), vec!["D4", "B3", "G3", "D3", "G4"]);
    }

    #[test]
    fn test_version_string() {
        let header = TefHeader {
            format_id: FORMAT_ID,
            version_major: 3,
            version_minor: 5,
            version: FormatVersion::V3,
            measure_count: 0,
            time_signature: TimeSignature::default(),
            tempo: 120,
            track_count: 0,
            declared_string_count: None,
            component_count: 0,
            sections: SectionPointers::default(),
        };
        assert_eq!(header.version_string(), "3.05");
    }

    #[test]
    fn test_reading_list_entry_span() {
        let list = ReadingList::new(&[(1, 8), (18, 18)]);
        assert_eq!(list.entries[0].measure_span(), 8);
        assert_eq!(list.entries[1].measure_span(), 1);

        let inverted = ReadingList::new(&[(9, 4)]);
        assert_eq!(inverted.entries[0].measure_span(), 0);
        assert_eq!(ReadingListEntry::new(0, u32::MAX).measure_span(), u32::MAX);
    }
}
