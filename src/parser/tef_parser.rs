//! Top-level TEF decoding: header, tracks, component records, optional sections

use crate::error::{Diagnostics, TefError};
use crate::parser::events::{DecodedEvent, RawRecord};
use crate::parser::header_parser::{
    parse_chords, parse_copyright, parse_header, parse_reading_list, parse_text_event_section,
    parse_tracks,
};
use crate::parser::location::{V2Locations, V3Locations};
use crate::parser::record_decoder::{RecordDecoder, V2Records, V3Records};
use crate::parser::tef_types::{
    FormatVersion, ReadingList, SongInfo, TefHeader, TextEvent, TimeSignature, Track,
};
use crate::parser::tuning::pitch_name;
use crate::playback::assembler::{assemble, TrackEvents};
use crate::playback::reading_list::{ExpandOptions, Expansion, ReadingListExpander, TimingGrid};
use std::fmt;
use std::io::Read;
use std::path::Path;

/// Decoded TEF file, immutable once parsed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub version: FormatVersion,
    pub header: TefHeader,
    pub info: SongInfo,
    pub tracks: Vec<Track>,
    pub chords: Vec<String>,
    pub text_events: Vec<TextEvent>,
    pub reading_list: Option<ReadingList>,
    /// Source-order events per track, in track order
    pub modules: Vec<TrackEvents>,
    /// Unrecognized records whose track could not be resolved
    pub unassigned: Vec<DecodedEvent>,
}

/// Best-effort document plus everything that went wrong along the way
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedDocument {
    pub document: Document,
    pub diagnostics: Diagnostics,
}

impl Document {
    pub fn measure_count(&self) -> u32 {
        u32::from(self.header.measure_count)
    }

    pub const fn time_signature(&self) -> TimeSignature {
        self.header.time_signature
    }

    pub const fn tempo(&self) -> u16 {
        self.header.tempo
    }

    pub fn total_strings(&self) -> u32 {
        self.tracks.iter().map(|t| u32::from(t.string_count)).sum()
    }

    pub fn track(&self, index: usize) -> Option<&Track> {
        self.tracks.get(index)
    }

    /// Source-order events of a track
    pub fn events(&self, track: usize) -> Option<&TrackEvents> {
        self.modules.get(track)
    }

    /// All decoded events, unassigned ones last
    pub fn all_events(&self) -> impl Iterator<Item = &DecodedEvent> {
        self.modules
            .iter()
            .flat_map(|m| m.events.iter())
            .chain(self.unassigned.iter())
    }

    pub fn timing_grid(&self, ticks_per_quarter: u32) -> TimingGrid {
        TimingGrid::new(self.version, self.time_signature(), ticks_per_quarter)
    }

    fn expander(&self, options: &ExpandOptions) -> ReadingListExpander<'_> {
        let reading_list = if options.use_reading_list {
            self.reading_list.as_ref()
        } else {
            None
        };
        ReadingListExpander::new(
            self.timing_grid(options.ticks_per_quarter),
            self.measure_count(),
            reading_list,
        )
    }

    /// Expand one track into a playback timeline
    pub fn timeline(&self, track: usize, options: &ExpandOptions) -> Result<Expansion<'_>, TefError> {
        self.voice_timeline(track, None, options)
    }

    /// Expand one voice (raw discriminator) of a track, or all voices when `None`
    pub fn voice_timeline(
        &self,
        track: usize,
        voice: Option<u8>,
        options: &ExpandOptions,
    ) -> Result<Expansion<'_>, TefError> {
        let module = self.events(track).ok_or(TefError::UnknownTrack(track))?;
        let expansion = self
            .expander(options)
            .expand(track, module.select(voice));
        log::debug!(
            "Track {track} expanded to {} events over {} ticks with {} warnings",
            expansion.timeline.len(),
            expansion.timeline.length_ticks,
            expansion.warnings.len()
        );
        Ok(expansion)
    }

    /// Human readable structure dump
    pub fn summary(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(
            f,
            "TEF {} ({:?})",
            self.header.version_string(),
            self.version
        )?;
        writeln!(f, "Title: {}", self.info.title)?;
        if !self.info.composer.is_empty() {
            writeln!(f, "Composer: {}", self.info.composer)?;
        }
        if !self.info.comments.is_empty() {
            writeln!(f, "Comments: {}", self.info.comments)?;
        }
        if let Some(copyright) = &self.info.copyright {
            writeln!(f, "Copyright: {copyright}")?;
        }
        writeln!(
            f,
            "Time signature: {}, tempo: {}, measures: {}",
            self.time_signature(),
            self.tempo(),
            self.measure_count()
        )?;
        writeln!(f, "Tracks:")?;
        for track in &self.tracks {
            writeln!(
                f,
                "  {} {} ({}, {} strings) {}",
                track.index,
                track.name,
                track.role,
                track.string_count,
                track.tuning_names().join(" ")
            )?;
        }
        if !self.text_events.is_empty() {
            writeln!(f, "Sections:")?;
            for event in &self.text_events {
                writeln!(f, "  measure {}: {}", event.measure, event.text)?;
            }
        }
        if !self.chords.is_empty() {
            writeln!(f, "Chords: {}", self.chords.join(", "))?;
        }
        if let Some(list) = &self.reading_list {
            let ranges: Vec<String> = list
                .entries
                .iter()
                .map(|e| format!("{}-{}", e.start_measure, e.end_measure))
                .collect();
            writeln!(f, "Reading list: {}", ranges.join(", "))?;
        }
        let notes = self.all_events().filter(|e| e.note().is_some()).count();
        let unrecognized = self.all_events().filter(|e| e.is_unrecognized()).count();
        let others = self.all_events().count() - notes - unrecognized;
        write!(
            f,
            "Events: {notes} notes, {others} other, {unrecognized} unrecognized"
        )
    }
}

/// Fixed-size records of one component block, stopping at the sentinel
fn read_records(
    data: &[u8],
    start: usize,
    record_count: usize,
    record_size: usize,
) -> Result<Vec<RawRecord>, TefError> {
    let block = data.get(start..).unwrap_or_default();
    let mut records = Vec::with_capacity(record_count.min(block.len() / record_size));
    let mut chunks = block.chunks_exact(record_size);
    for i in 0..record_count {
        let Some(bytes) = chunks.next() else {
            let needed = record_count * record_size;
            let available = block.len();
            log::error!(
                "Component section at 0x{start:x} ends at record {i}, needs {needed} bytes, has {available}"
            );
            return Err(TefError::TruncatedComponentSection {
                offset: start,
                needed,
                available,
            });
        };
        let record = RawRecord::new(start + i * record_size, bytes);
        if record.is_sentinel() {
            log::debug!("Sentinel record at 0x{:x}", record.offset);
            break;
        }
        records.push(record);
    }
    Ok(records)
}

fn decode_block(
    decoder: &dyn RecordDecoder,
    data: &[u8],
    start: usize,
    record_count: usize,
    diagnostics: &mut Diagnostics,
) -> Result<Vec<DecodedEvent>, TefError> {
    let records = read_records(data, start, record_count, decoder.record_size())?;
    log::debug!(
        "Decoding {} records at 0x{start:x} ({record_count} declared)",
        records.len()
    );
    Ok(records
        .iter()
        .map(|record| decoder.decode(record, diagnostics))
        .collect())
}

/// Every V3 record lives in one section, the module byte names the track
fn decode_v3_components(
    data: &[u8],
    header: &TefHeader,
    tracks: &[Track],
    diagnostics: &mut Diagnostics,
) -> Result<Vec<DecodedEvent>, TefError> {
    let record_count = header.component_count as usize;
    let Some(start) = header.sections.components else {
        if record_count > 0 {
            return Err(TefError::InvalidHeader(
                "component count without component section".to_string(),
            ));
        }
        return Ok(Vec::new());
    };
    let locations = V3Locations::new(
        header.time_signature,
        u32::from(header.measure_count),
        tracks,
    );
    let decoder = V3Records::new(tracks, &locations);
    decode_block(&decoder, data, start as usize, record_count, diagnostics)
}

/// V2 records come in one block per track, in track order
fn decode_v2_components(
    data: &[u8],
    header: &TefHeader,
    tracks: &[Track],
    diagnostics: &mut Diagnostics,
) -> Result<Vec<DecodedEvent>, TefError> {
    let locations = V2Locations::new(
        header.time_signature,
        u32::from(header.measure_count),
        tracks,
    );
    let declared: u32 = tracks
        .iter()
        .map(|t| u32::from(t.component_count.unwrap_or(0)))
        .sum();
    if declared != header.component_count {
        log::warn!(
            "Header declares {} components, tracks declare {declared}",
            header.component_count
        );
    }
    let mut offset = header.sections.components.unwrap_or_default() as usize;
    let mut events = Vec::with_capacity(declared as usize);
    for track in tracks {
        let record_count = usize::from(track.component_count.unwrap_or(0));
        let decoder = V2Records::new(tracks, &locations, track.index);
        events.extend(decode_block(&decoder, data, offset, record_count, diagnostics)?);
        offset += record_count * decoder.record_size();
    }
    Ok(events)
}

/// Parse TEF data, collecting per-record problems as diagnostics
pub fn parse_tef_data(data: &[u8]) -> Result<ParsedDocument, TefError> {
    let mut diagnostics = Diagnostics::new();
    let (header, mut info) = parse_header(data)?;
    let tracks = parse_tracks(data, &header)?;
    let version = header.version;

    let events = match version {
        FormatVersion::V2 => decode_v2_components(data, &header, &tracks, &mut diagnostics)?,
        FormatVersion::V3 => decode_v3_components(data, &header, &tracks, &mut diagnostics)?,
    };

    let sections = header.sections;
    let chords = match sections.chords {
        Some(offset) => parse_chords(data, offset)?,
        None => Vec::new(),
    };
    let text_events = match sections.text_events {
        Some(offset) => parse_text_event_section(data, offset)?,
        None => Vec::new(),
    };
    let reading_list = sections
        .reading_list
        .map(|offset| parse_reading_list(data, offset))
        .transpose()?;
    info.copyright = sections
        .copyright
        .map(|offset| parse_copyright(data, offset))
        .transpose()?;

    let assembly = assemble(&tracks, events);
    let document = Document {
        version,
        header,
        info,
        tracks,
        chords,
        text_events,
        reading_list,
        modules: assembly.modules,
        unassigned: assembly.unassigned,
    };
    log::debug!(
        "Parsed {:?} document {:?} with {} diagnostics",
        document.version,
        document.info.title,
        diagnostics.len()
    );
    Ok(ParsedDocument {
        document,
        diagnostics,
    })
}

/// Read a whole file and parse it
pub fn parse_tef_file(path: impl AsRef<Path>) -> Result<ParsedDocument, TefError> {
    let path = path.as_ref();
    log::debug!("Reading {}", path.display());
    let mut file_data: Vec<u8> = vec![];
    {
        let mut file = std::fs::File::open(path)?;
        file.read_to_end(&mut file_data)?;
    }
    parse_tef_data(&file_data)
}

/// One line per decoded event, for inspection output
pub fn describe_event(event: &DecodedEvent) -> String {
    match event {
        DecodedEvent::Note(n) | DecodedEvent::ChordMember(n) => {
            let kind = if matches!(event, DecodedEvent::ChordMember(_)) {
                "chord"
            } else {
                "note"
            };
            format!(
                "{kind} m{} p{} s{} f{} {}{}",
                n.measure,
                n.position,
                n.string,
                n.fret,
                pitch_name(n.pitch),
                n.articulation.symbol()
            )
        }
        DecodedEvent::ArticulationMarker(m) => format!(
            "articulation m{} p{} s{} {:?}",
            m.measure, m.position, m.string, m.articulation
        ),
        DecodedEvent::Rest(r) => format!("rest m{} p{}", r.measure, r.position),
        DecodedEvent::StructuralMarker(s) => {
            format!("marker m{} p{} code {}", s.measure, s.position, s.code)
        }
        DecodedEvent::Unrecognized(u) => format!(
            "unrecognized at 0x{:x}: {}",
            u.record.offset, u.reason
        ),
    }
}
