//! Error and diagnostic types for the tefdecode library

use std::io;

/// Fatal error: the file (or the requested operation) cannot be handled at all.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TefError {
    /// Leading signature matches neither known layout
    #[error("unsupported format: format id 0x{format_id:04x}, major version {major}")]
    UnsupportedFormat { format_id: u16, major: u8 },

    /// Not enough bytes for the fixed header or the track definitions
    #[error("truncated header: need {needed} bytes, have {available}")]
    TruncatedHeader { needed: usize, available: usize },

    /// Declared component section runs past the end of the file
    #[error("truncated component section at 0x{offset:x}: need {needed} bytes, have {available}")]
    TruncatedComponentSection {
        offset: usize,
        needed: usize,
        available: usize,
    },

    /// Optional section pointer leads outside the file
    #[error("truncated {section} section at 0x{offset:x}")]
    TruncatedSection { section: &'static str, offset: usize },

    /// Header fields that make decoding impossible
    #[error("invalid header: {0}")]
    InvalidHeader(String),

    /// Track definition that cannot own any string
    #[error("invalid track {index}: {string_count} strings")]
    InvalidTrack { index: usize, string_count: u8 },

    /// Requested track index does not exist in the document
    #[error("unknown track {0}")]
    UnknownTrack(usize),

    /// I/O error
    #[error("I/O error: {0}")]
    IoError(String),
}

impl From<io::Error> for TefError {
    fn from(error: io::Error) -> Self {
        Self::IoError(error.to_string())
    }
}

/// Why a single record could not be decoded into a typed event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnrecognizedReason {
    /// Type or marker byte outside the known enumerations
    UnknownType(u8),
    /// Module byte does not name a parsed track
    UnknownModule(u8),
    /// Fret field decodes below zero
    InvalidFret,
    /// String slot outside the owning track
    StringOutOfRange(u32),
    /// Location could not be placed in any measure
    LocationOutOfRange,
}

impl std::fmt::Display for UnrecognizedReason {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::UnknownType(b) => write!(f, "unknown type byte 0x{b:02x}"),
            Self::UnknownModule(b) => write!(f, "unknown module {b}"),
            Self::InvalidFret => write!(f, "invalid fret"),
            Self::StringOutOfRange(slot) => write!(f, "string slot {slot} outside track"),
            Self::LocationOutOfRange => write!(f, "location out of range"),
        }
    }
}

/// What is wrong with a reading-list entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpansionIssue {
    /// `end_measure` is past the last known measure
    PastLastMeasure { last_measure: u32 },
    /// `start_measure` is zero
    ZeroStart,
    /// `start_measure > end_measure`
    Inverted,
}

impl std::fmt::Display for ExpansionIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::PastLastMeasure { last_measure } => {
                write!(f, "past last measure {last_measure}")
            }
            Self::ZeroStart => write!(f, "measures are 1-indexed"),
            Self::Inverted => write!(f, "start after end"),
        }
    }
}

/// Non-fatal problem collected while decoding or expanding.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Diagnostic {
    #[error("record at 0x{offset:x}: location {location} outside {measure_count} measures")]
    LocationOutOfRange {
        offset: usize,
        location: u32,
        measure_count: u32,
    },

    #[error("record at 0x{offset:x} unrecognized: {reason}")]
    UnrecognizedRecord {
        offset: usize,
        reason: UnrecognizedReason,
    },

    #[error("reading list entry {entry_index} ({start_measure}-{end_measure}) skipped: {issue}")]
    ExpansionWarning {
        entry_index: usize,
        start_measure: u32,
        end_measure: u32,
        issue: ExpansionIssue,
    },
}

/// Accumulates diagnostics next to a best-effort result.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        log::warn!("{diagnostic}");
        self.entries.push(diagnostic);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Diagnostic> {
        self.entries.iter()
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.entries
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a Diagnostic;
    type IntoIter = std::slice::Iter<'a, Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
