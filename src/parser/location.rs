//! Packed location decoding.
//!
//! A record stores one integer that packs measure, position within the
//! measure and string. The packing differs between layouts and has to match
//! the writer bit for bit.

use crate::parser::tef_types::{TimeSignature, Track, V2_UNITS_PER_WHOLE, V3_UNITS_PER_WHOLE};
use crate::parser::events::GridLocation;

/// Location that cannot be placed inside the known measures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocationOutOfRange {
    pub location: u32,
    pub measure_count: u32,
}

pub trait LocationDecoder {
    /// Unpack `location` of a record owned by `track`
    fn decode(&self, location: u32, track: usize) -> Result<GridLocation, LocationOutOfRange>;

    /// 1-indexed string of `track` named by a decoded location, if it belongs to that track
    fn string_index(&self, location: &GridLocation, track: usize) -> Option<u8>;
}

/// Closed-form decoding of 2.xx locations.
///
/// `location = (measure * string_count + string) * ts_size + position`
#[derive(Debug, Clone)]
pub struct V2Locations {
    ts_size: u32,
    measure_count: u32,
    string_counts: Vec<u32>,
}

impl V2Locations {
    pub fn new(time_signature: TimeSignature, measure_count: u32, tracks: &[Track]) -> Self {
        let ts_size = (V2_UNITS_PER_WHOLE * u32::from(time_signature.numerator))
            / u32::from(time_signature.denominator);
        log::debug!("V2 locations: ts_size={ts_size} measure_count={measure_count}");
        V2Locations {
            ts_size,
            measure_count,
            string_counts: tracks.iter().map(|t| u32::from(t.string_count)).collect(),
        }
    }

    pub const fn ts_size(&self) -> u32 {
        self.ts_size
    }
}

impl LocationDecoder for V2Locations {
    fn decode(&self, location: u32, track: usize) -> Result<GridLocation, LocationOutOfRange> {
        let out_of_range = LocationOutOfRange {
            location,
            measure_count: self.measure_count,
        };
        let string_count = match self.string_counts.get(track) {
            Some(&count) if count > 0 && self.ts_size > 0 => count,
            _ => return Err(out_of_range),
        };
        let position = location % self.ts_size;
        let string_component = (location / self.ts_size) % string_count;
        let measure = location / (self.ts_size * string_count);
        if measure >= self.measure_count {
            return Err(out_of_range);
        }
        Ok(GridLocation {
            measure: measure + 1,
            position,
            string_component,
        })
    }

    fn string_index(&self, location: &GridLocation, track: usize) -> Option<u8> {
        let string_count = *self.string_counts.get(track)?;
        if location.string_component < string_count {
            u8::try_from(location.string_component + 1).ok()
        } else {
            None
        }
    }
}

/// Measure-scan decoding of 3.xx locations.
///
/// Every position of a measure reserves `32 * total_strings` values, every
/// string slot 8 of them. The string slot counts across all tracks.
#[derive(Debug, Clone)]
pub struct V3Locations {
    time_signature: TimeSignature,
    measure_count: u32,
    value_per_position: u64,
    /// (first global slot, string count) per track
    string_slots: Vec<(u32, u32)>,
}

impl V3Locations {
    pub const VALUE_PER_STRING: u64 = 8;
    pub const VALUE_PER_POSITION_PER_STRING: u64 = 32;

    pub fn new(time_signature: TimeSignature, measure_count: u32, tracks: &[Track]) -> Self {
        let mut string_slots = Vec::with_capacity(tracks.len());
        let mut total_strings = 0;
        for track in tracks {
            let count = u32::from(track.string_count);
            string_slots.push((total_strings, count));
            total_strings += count;
        }
        let value_per_position = Self::VALUE_PER_POSITION_PER_STRING * u64::from(total_strings);
        log::debug!(
            "V3 locations: total_strings={total_strings} value_per_position={value_per_position} measure_count={measure_count}"
        );
        V3Locations {
            time_signature,
            measure_count,
            value_per_position,
            string_slots,
        }
    }

    pub const fn value_per_position(&self) -> u64 {
        self.value_per_position
    }

    /// Grid positions per measure on the sixteenth-note grid
    pub fn positions_in_measure(&self) -> u64 {
        (u64::from(V3_UNITS_PER_WHOLE) * u64::from(self.time_signature.numerator))
            / u64::from(self.time_signature.denominator)
    }

    pub fn value_per_measure(&self) -> u64 {
        self.value_per_position * self.positions_in_measure()
    }
}

impl LocationDecoder for V3Locations {
    fn decode(&self, location: u32, _track: usize) -> Result<GridLocation, LocationOutOfRange> {
        let out_of_range = LocationOutOfRange {
            location,
            measure_count: self.measure_count,
        };
        if self.value_per_position == 0 {
            return Err(out_of_range);
        }
        let value_per_measure = self.value_per_measure();
        let mut remaining = u64::from(location);
        for measure in 1..=self.measure_count {
            if remaining <= value_per_measure {
                let position = remaining / self.value_per_position;
                let string_component =
                    (remaining % self.value_per_position) / Self::VALUE_PER_STRING;
                return Ok(GridLocation {
                    measure,
                    position: u32::try_from(position).map_err(|_| out_of_range)?,
                    string_component: u32::try_from(string_component)
                        .map_err(|_| out_of_range)?,
                });
            }
            remaining -= value_per_measure;
        }
        Err(out_of_range)
    }

    fn string_index(&self, location: &GridLocation, track: usize) -> Option<u8> {
        let &(first_slot, count) = self.string_slots.get(track)?;
        let slot = location.string_component;
        if slot >= first_slot && slot < first_slot + count {
            u8::try_from(slot - first_slot + 1).ok()
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::tef_types::TrackRole;

    fn banjo_and_bass() -> Vec<Track> {
        vec![
            Track::new(0, "Banjo open G".to_string(), TrackRole::Lead, &[34, 37, 41, 46, 29]),
            Track::new(1, "bass".to_string(), TrackRole::Bass, &[53, 58, 63, 68]),
        ]
    }

    fn four_four() -> TimeSignature {
        TimeSignature {
            numerator: 4,
            denominator: 4,
        }
    }

    #[test]
    fn test_v2_location_zero() {
        let tracks = banjo_and_bass();
        let decoder = V2Locations::new(four_four(), 8, &tracks);
        assert_eq!(decoder.ts_size(), 256);
        let location = decoder.decode(0, 0).unwrap();
        assert_eq!(
            location,
            GridLocation {
                measure: 1,
                position: 0,
                string_component: 0
            }
        );
        assert_eq!(decoder.string_index(&location, 0), Some(1));
    }

    #[test]
    fn test_v2_location_closed_form() {
        let tracks = banjo_and_bass();
        let decoder = V2Locations::new(four_four(), 8, &tracks);
        // measure 3 (0-based 2), string 4 (0-based 3), position 96 on the 5-string banjo
        let location = (2 * 5 + 3) * 256 + 96;
        let decoded = decoder.decode(location, 0).unwrap();
        assert_eq!(decoded.measure, 3);
        assert_eq!(decoded.position, 96);
        assert_eq!(decoder.string_index(&decoded, 0), Some(4));

        // the same integer reads differently on the 4-string bass
        let decoded = decoder.decode(location, 1).unwrap();
        assert_eq!(decoded.measure, 4);
        assert_eq!(decoded.string_component, 1);
    }

    #[test]
    fn test_v2_three_four_ts_size() {
        let tracks = banjo_and_bass();
        let three_four = TimeSignature {
            numerator: 3,
            denominator: 4,
        };
        let decoder = V2Locations::new(three_four, 8, &tracks);
        assert_eq!(decoder.ts_size(), 192);
        let decoded = decoder.decode(192 * 5 + 10, 0).unwrap();
        assert_eq!(decoded.measure, 2);
        assert_eq!(decoded.position, 10);
        assert_eq!(decoded.string_component, 0);
    }

    #[test]
    fn test_v2_location_out_of_range() {
        let tracks = banjo_and_bass();
        let decoder = V2Locations::new(four_four(), 2, &tracks);
        let last_valid = 2 * 5 * 256 - 1;
        assert!(decoder.decode(last_valid, 0).is_ok());
        assert_eq!(
            decoder.decode(last_valid + 1, 0),
            Err(LocationOutOfRange {
                location: last_valid + 1,
                measure_count: 2
            })
        );
        // unknown track
        assert!(decoder.decode(0, 5).is_err());
    }

    #[test]
    fn test_v3_worked_example() {
        let tracks = banjo_and_bass();
        let decoder = V3Locations::new(four_four(), 8, &tracks);
        assert_eq!(decoder.value_per_position(), 288);
        assert_eq!(decoder.positions_in_measure(), 16);
        assert_eq!(decoder.value_per_measure(), 288 * 16);
        let location = decoder.decode(288, 0).unwrap();
        assert_eq!(location.measure, 1);
        assert_eq!(location.position, 1);
        assert_eq!(location.string_component, 0);
    }

    #[test]
    fn test_v3_measure_boundary_is_inclusive() {
        let tracks = banjo_and_bass();
        let decoder = V3Locations::new(four_four(), 8, &tracks);
        let value_for_measure = 288 * 16;
        let at_boundary = decoder.decode(value_for_measure, 0).unwrap();
        assert_eq!(at_boundary.measure, 1);
        assert_eq!(at_boundary.position, 16);

        let past_boundary = decoder.decode(value_for_measure + 1, 0).unwrap();
        assert_eq!(past_boundary.measure, 2);
        assert_eq!(past_boundary.position, 0);
        assert_eq!(past_boundary.string_component, 0);
    }

    #[test]
    fn test_v3_string_slots_span_tracks() {
        let tracks = banjo_and_bass();
        let decoder = V3Locations::new(four_four(), 8, &tracks);
        // position 3, global slot 6 = bass string 2
        let location = decoder.decode(3 * 288 + 6 * 8 + 1, 1).unwrap();
        assert_eq!(location.position, 3);
        assert_eq!(location.string_component, 6);
        assert_eq!(decoder.string_index(&location, 1), Some(2));
        assert_eq!(decoder.string_index(&location, 0), None);

        // slots past the last track belong to nobody
        let location = decoder.decode(9 * 8 + 1, 1).unwrap();
        assert_eq!(location.string_component, 9);
        assert_eq!(decoder.string_index(&location, 0), None);
        assert_eq!(decoder.string_index(&location, 1), None);
    }

    #[test]
    fn test_v3_scan_is_bounded() {
        let tracks = banjo_and_bass();
        let decoder = V3Locations::new(four_four(), 2, &tracks);
        let two_measures = 2 * 288 * 16;
        assert_eq!(decoder.decode(two_measures, 0).unwrap().measure, 2);
        assert!(decoder.decode(two_measures + 1, 0).is_err());
        assert!(decoder.decode(u32::MAX, 0).is_err());
    }

    #[test]
    fn test_v3_six_eight() {
        let tracks = banjo_and_bass();
        let six_eight = TimeSignature {
            numerator: 6,
            denominator: 8,
        };
        let decoder = V3Locations::new(six_eight, 4, &tracks);
        assert_eq!(decoder.positions_in_measure(), 12);
        let location = decoder.decode(288 * 12 + 5 * 288 + 1, 0).unwrap();
        assert_eq!(location.measure, 2);
        assert_eq!(location.position, 5);
    }
}
