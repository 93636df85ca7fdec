//! Reading-list expansion.
//!
//! A reading list replays stored measure ranges in order. Expanding it turns
//! the source-order events of a track into a linear timeline where repeated
//! measures appear once per replay.

use crate::error::{Diagnostic, Diagnostics, ExpansionIssue};
use crate::parser::events::DecodedEvent;
use crate::parser::tef_types::{FormatVersion, ReadingList, ReadingListEntry, TimeSignature};
use serde::{Deserialize, Serialize};

/// Output resolution used when nothing else is asked for
pub const DEFAULT_TICKS_PER_QUARTER: u32 = 960;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpandOptions {
    /// Output ticks per quarter note
    pub ticks_per_quarter: u32,
    /// Follow the stored reading list; `false` plays measures in stored order
    pub use_reading_list: bool,
}

impl Default for ExpandOptions {
    fn default() -> Self {
        Self {
            ticks_per_quarter: DEFAULT_TICKS_PER_QUARTER,
            use_reading_list: true,
        }
    }
}

/// Conversion from grid positions to output ticks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimingGrid {
    ticks_per_quarter: u32,
    units_per_whole: u32,
    time_signature: TimeSignature,
}

impl TimingGrid {
    pub const fn new(
        version: FormatVersion,
        time_signature: TimeSignature,
        ticks_per_quarter: u32,
    ) -> Self {
        Self {
            ticks_per_quarter,
            units_per_whole: version.units_per_whole(),
            time_signature,
        }
    }

    fn ticks_per_whole(&self) -> u64 {
        u64::from(self.ticks_per_quarter) * 4
    }

    /// Tick span of one measure
    pub fn measure_ticks(&self) -> u64 {
        self.ticks_per_whole() * u64::from(self.time_signature.numerator)
            / u64::from(self.time_signature.denominator)
    }

    /// Ticks from the start of the measure to `position`
    pub fn position_ticks(&self, position: u32) -> u64 {
        u64::from(position) * self.ticks_per_whole() / u64::from(self.units_per_whole)
    }
}

/// Event placed at an absolute tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimedEvent<'a> {
    pub tick: u64,
    pub event: &'a DecodedEvent,
}

/// Flattened playback order of one track
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timeline<'a> {
    pub track: usize,
    pub ticks_per_quarter: u32,
    /// Non-decreasing in `tick`
    pub events: Vec<TimedEvent<'a>>,
    /// Cumulative span of every expanded measure
    pub length_ticks: u64,
    pub measure_ticks: u64,
}

impl Timeline<'_> {
    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Number of measures played, repeats included
    pub const fn measure_span(&self) -> u64 {
        if self.measure_ticks == 0 {
            0
        } else {
            self.length_ticks / self.measure_ticks
        }
    }
}

/// Timeline plus the reading-list entries that had to be skipped
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expansion<'a> {
    pub timeline: Timeline<'a>,
    pub warnings: Diagnostics,
}

pub struct ReadingListExpander<'a> {
    grid: TimingGrid,
    /// Last measure a reading-list entry may reference
    measure_count: u32,
    reading_list: Option<&'a ReadingList>,
}

impl<'a> ReadingListExpander<'a> {
    pub const fn new(
        grid: TimingGrid,
        measure_count: u32,
        reading_list: Option<&'a ReadingList>,
    ) -> Self {
        Self {
            grid,
            measure_count,
            reading_list,
        }
    }

    fn check_entry(&self, entry: &ReadingListEntry) -> Option<ExpansionIssue> {
        if entry.start_measure == 0 {
            Some(ExpansionIssue::ZeroStart)
        } else if entry.start_measure > entry.end_measure {
            Some(ExpansionIssue::Inverted)
        } else if entry.end_measure > self.measure_count {
            Some(ExpansionIssue::PastLastMeasure {
                last_measure: self.measure_count,
            })
        } else {
            None
        }
    }

    /// Expand the events of `track` into a fresh timeline.
    ///
    /// Events that cannot be placed are ignored. Each call starts from tick zero.
    pub fn expand<'e>(
        &self,
        track: usize,
        events: impl IntoIterator<Item = &'e DecodedEvent>,
    ) -> Expansion<'e> {
        let mut placed: Vec<(u32, u32, &'e DecodedEvent)> = events
            .into_iter()
            .filter_map(|e| e.placement().map(|(measure, position)| (measure, position, e)))
            .collect();
        // stable: simultaneous events keep source order
        placed.sort_by_key(|&(measure, position, _)| (measure, position));

        let identity;
        let entries: &[ReadingListEntry] = match self.reading_list {
            Some(list) => &list.entries,
            None => {
                identity = [ReadingListEntry::new(1, self.measure_count)];
                if self.measure_count == 0 {
                    &[]
                } else {
                    &identity
                }
            }
        };

        let measure_ticks = self.grid.measure_ticks();
        let mut warnings = Diagnostics::new();
        let mut timed = Vec::with_capacity(placed.len());
        let mut offset = 0u64;
        for (entry_index, entry) in entries.iter().enumerate() {
            if let Some(issue) = self.check_entry(entry) {
                warnings.push(Diagnostic::ExpansionWarning {
                    entry_index,
                    start_measure: entry.start_measure,
                    end_measure: entry.end_measure,
                    issue,
                });
                continue;
            }
            let start = placed.partition_point(|&(m, _, _)| m < entry.start_measure);
            let end = placed.partition_point(|&(m, _, _)| m <= entry.end_measure);
            for &(measure, position, event) in &placed[start..end] {
                let tick = offset
                    + u64::from(measure - entry.start_measure) * measure_ticks
                    + self.grid.position_ticks(position);
                timed.push(TimedEvent { tick, event });
            }
            log::debug!(
                "Reading list entry {entry_index} ({}-{}) at tick {offset}: {} events",
                entry.start_measure,
                entry.end_measure,
                end - start
            );
            offset += u64::from(entry.measure_span()) * measure_ticks;
        }

        Expansion {
            timeline: Timeline {
                track,
                ticks_per_quarter: self.grid.ticks_per_quarter,
                events: timed,
                length_ticks: offset,
                measure_ticks,
            },
            warnings,
        }
    }
}
