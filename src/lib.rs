//! tefdecode - TEF tablature decoder
//!
//! This library provides:
//! - Parsing of TEF files in both on-disk layouts (2.xx and 3.xx)
//! - Typed note, articulation, rest and marker events per track
//! - Reading-list expansion into playback timelines
//!
//! # Example
//!
//! ```no_run
//! use tefdecode::{parse_tef_file, ExpandOptions};
//!
//! let parsed = parse_tef_file("tune.tef").unwrap();
//! for warning in &parsed.diagnostics {
//!     eprintln!("{warning}");
//! }
//! let expansion = parsed.document.timeline(0, &ExpandOptions::default()).unwrap();
//! for timed in &expansion.timeline.events {
//!     println!("{} {:?}", timed.tick, timed.event);
//! }
//! ```

pub mod error;
pub mod parser;
pub mod playback;

// Re-export main types for convenience
pub use error::{Diagnostic, Diagnostics, ExpansionIssue, TefError, UnrecognizedReason};
pub use parser::events::{
    Articulation, ArticulationMarker, DecodedEvent, EffectFlags, Note, RawRecord, Rest,
    StructuralMarker, Unrecognized, Voice, VoiceKind,
};
pub use parser::tef_parser::{describe_event, parse_tef_data, parse_tef_file, Document, ParsedDocument};
pub use parser::tef_types::{
    FormatVersion, ReadingList, ReadingListEntry, SongInfo, TefHeader, TextEvent, TimeSignature,
    Track, TrackRole,
};
pub use parser::tuning::{note_pitch, pitch_name, tuning_to_pitch};
pub use playback::assembler::TrackEvents;
pub use playback::reading_list::{
    ExpandOptions, Expansion, TimedEvent, Timeline, DEFAULT_TICKS_PER_QUARTER,
};
