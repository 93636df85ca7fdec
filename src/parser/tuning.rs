//! Pitch resolution from string tunings.
//!
//! Pitches are MIDI note numbers. A tuning byte counts semitones down from C7.

use crate::parser::tef_types::Track;

/// Pitch encoded by a tuning byte of value 0
pub const TUNING_REFERENCE_PITCH: i16 = 96;

pub const SHARP_NOTES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Absolute pitch of an open string
pub fn tuning_to_pitch(byte: u8) -> i16 {
    TUNING_REFERENCE_PITCH - i16::from(byte)
}

/// Absolute pitch of `fret` on the 1-indexed `string_index` of `track`.
///
/// The caller guarantees `1 <= string_index <= track.string_count`.
pub fn note_pitch(track: &Track, string_index: u8, fret: u8) -> i16 {
    track.tunings[usize::from(string_index) - 1] + i16::from(fret)
}

/// Scientific pitch name, `62 -> "D4"`
pub fn pitch_name(pitch: i16) -> String {
    let note = SHARP_NOTES[pitch.rem_euclid(12) as usize];
    let octave = pitch.div_euclid(12) - 1;
    format!("{note}{octave}")
}
