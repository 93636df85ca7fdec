use crate::parser::events::DecodedEvent;
use crate::parser::tef_types::Track;

/// Source-order event stream of one track, before expansion
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TrackEvents {
    pub track: usize,
    pub events: Vec<DecodedEvent>,
}

impl TrackEvents {
    pub const fn new(track: usize) -> Self {
        Self {
            track,
            events: Vec::new(),
        }
    }

    /// Events that can be placed on a timeline, in source order
    pub fn placed(&self) -> impl Iterator<Item = &DecodedEvent> {
        self.events.iter().filter(|e| !e.is_unrecognized())
    }

    /// Placed events of one voice (raw discriminator), or all of them
    pub fn select(&self, voice: Option<u8>) -> Vec<&DecodedEvent> {
        self.placed()
            .filter(|e| match voice {
                None => true,
                Some(raw) => e.voice().is_some_and(|v| v.raw == raw),
            })
            .collect()
    }

    /// Distinct raw voice discriminators, ascending
    pub fn voices(&self) -> Vec<u8> {
        let mut voices: Vec<u8> = self.placed().filter_map(|e| e.voice()).map(|v| v.raw).collect();
        voices.sort_unstable();
        voices.dedup();
        voices
    }

    pub fn note_count(&self) -> usize {
        self.events.iter().filter(|e| e.note().is_some()).count()
    }

    pub fn unrecognized_count(&self) -> usize {
        self.events.iter().filter(|e| e.is_unrecognized()).count()
    }
}

/// Result of grouping decoded events by owning track
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Assembly {
    /// One stream per track, in track order
    pub modules: Vec<TrackEvents>,
    /// Unrecognized events whose track could not be resolved
    pub unassigned: Vec<DecodedEvent>,
}

/// Group `events` by owning track, keeping source order inside each group
pub fn assemble(tracks: &[Track], events: Vec<DecodedEvent>) -> Assembly {
    let mut modules: Vec<TrackEvents> = tracks.iter().map(|t| TrackEvents::new(t.index)).collect();
    let mut unassigned = Vec::new();
    for event in events {
        match event.track().and_then(|track| modules.get_mut(track)) {
            Some(module) => module.events.push(event),
            None => unassigned.push(event),
        }
    }
    for module in &modules {
        log::debug!(
            "Track {} assembled with {} events ({} unrecognized)",
            module.track,
            module.events.len(),
            module.unrecognized_count()
        );
    }
    if !unassigned.is_empty() {
        log::debug!("{} events without owning track", unassigned.len());
    }
    Assembly {
        modules,
        unassigned,
    }
}
