//! Fixed header, track definitions and the optional pointer sections

use crate::error::TefError;
use crate::parser::primitive_parser::{
    parse_fixed_string, parse_short_sized_string, parse_u16, parse_u32, parse_u8, skip,
};
use crate::parser::tef_types::{
    FormatVersion, ReadingList, ReadingListEntry, SectionPointers, SongInfo, TefHeader, TextEvent,
    TimeSignature, Track, TrackRole, HEADER_SIZE, INFO_FIELD_SIZE, MAX_STRINGS, TRACK_NAME_SIZE,
    V2_HEADER_FIELDS_END, V2_TRACKS_OFFSET, V2_TRACK_RECORD_SIZE, V3_RESERVED_OFFSET,
    V3_TITLE_OFFSET, V3_TRACK_RECORD_SIZE, VERSION_MAJOR_OFFSET,
};
use nom::bytes::complete::take;
use nom::multi::count;
use nom::IResult;
use nom::Parser;

/// Signature bytes needed to detect the layout
const SIGNATURE_SIZE: usize = VERSION_MAJOR_OFFSET + 1;

/// Read the leading signature and pick the layout.
///
/// Returns `(format_id, major, minor, version)`.
pub fn detect_version(data: &[u8]) -> Result<(u16, u8, u8, FormatVersion), TefError> {
    let (_rest, (format_id, minor, major)) = (parse_u16, parse_u8, parse_u8)
        .parse(data)
        .map_err(|_err| TefError::TruncatedHeader {
            needed: SIGNATURE_SIZE,
            available: data.len(),
        })?;
    let version = FormatVersion::detect(format_id, major).ok_or_else(|| {
        log::error!("Unsupported format id=0x{format_id:04x} major={major}");
        TefError::UnsupportedFormat { format_id, major }
    })?;
    log::debug!("Detected {version:?} from format id=0x{format_id:04x} version={major}.{minor:02}");
    Ok((format_id, major, minor, version))
}

fn check_time_signature(time_signature: TimeSignature) -> Result<TimeSignature, TefError> {
    if time_signature.numerator == 0 || time_signature.denominator == 0 {
        log::error!("Invalid time signature {time_signature}");
        return Err(TefError::InvalidHeader(format!(
            "time signature {time_signature}"
        )));
    }
    Ok(time_signature)
}

/// [title 64][composer 64][comments 64][measures 2][num 1][den 1][tempo 2]
/// [strings 1][tracks 1][components 4][reading list 4][reserved]
fn parse_v2_header_fields(i: &[u8]) -> IResult<&[u8], (SongInfo, TefHeaderFields)> {
    let (i, (title, composer, comments)) = (
        parse_fixed_string(INFO_FIELD_SIZE),
        parse_fixed_string(INFO_FIELD_SIZE),
        parse_fixed_string(INFO_FIELD_SIZE),
    )
        .parse(i)?;
    let (i, (measure_count, numerator, denominator, tempo, string_count, track_count)) =
        (parse_u16, parse_u8, parse_u8, parse_u16, parse_u8, parse_u8).parse(i)?;
    let (i, (component_count, reading_list)) = (parse_u32, parse_u32).parse(i)?;
    let (i, ()) = skip(HEADER_SIZE - V2_HEADER_FIELDS_END)(i)?;

    let info = SongInfo {
        title,
        composer,
        comments,
        copyright: None,
    };
    let track_offset = V2_TRACKS_OFFSET as u32;
    let fields = TefHeaderFields {
        measure_count,
        time_signature: TimeSignature {
            numerator,
            denominator,
        },
        tempo,
        track_count,
        declared_string_count: Some(string_count),
        component_count,
        sections: SectionPointers {
            components: Some(track_offset + u32::from(track_count) * V2_TRACK_RECORD_SIZE as u32),
            tracks: Some(track_offset),
            reading_list: SectionPointers::pointer(reading_list),
            ..SectionPointers::default()
        },
    };
    Ok((i, (info, fields)))
}

/// [marker 4][count 4][tracks 4][chords 4][text 4][reading list 4][copyright 4]
/// [measures 2][num 1][den 1][tempo 2][tracks 1][reserved][title 64][composer 64][comments 64]
fn parse_v3_header_fields(i: &[u8]) -> IResult<&[u8], (SongInfo, TefHeaderFields)> {
    let (i, (marker, component_count, tracks, chords, text_events, reading_list, copyright)) = (
        parse_u32, parse_u32, parse_u32, parse_u32, parse_u32, parse_u32, parse_u32,
    )
        .parse(i)?;
    let (i, (measure_count, numerator, denominator, tempo, track_count)) =
        (parse_u16, parse_u8, parse_u8, parse_u16, parse_u8).parse(i)?;
    let (i, ()) = skip(V3_TITLE_OFFSET - V3_RESERVED_OFFSET)(i)?;
    let (i, (title, composer, comments)) = (
        parse_fixed_string(INFO_FIELD_SIZE),
        parse_fixed_string(INFO_FIELD_SIZE),
        parse_fixed_string(INFO_FIELD_SIZE),
    )
        .parse(i)?;

    let info = SongInfo {
        title,
        composer,
        comments,
        copyright: None,
    };
    let fields = TefHeaderFields {
        measure_count,
        time_signature: TimeSignature {
            numerator,
            denominator,
        },
        tempo,
        track_count,
        declared_string_count: None,
        component_count,
        sections: SectionPointers {
            components: SectionPointers::pointer(marker),
            tracks: SectionPointers::pointer(tracks),
            chords: SectionPointers::pointer(chords),
            text_events: SectionPointers::pointer(text_events),
            reading_list: SectionPointers::pointer(reading_list),
            copyright: SectionPointers::pointer(copyright),
        },
    };
    Ok((i, (info, fields)))
}

/// Header fields shared by both layouts, before the signature is attached
struct TefHeaderFields {
    measure_count: u16,
    time_signature: TimeSignature,
    tempo: u16,
    track_count: u8,
    declared_string_count: Option<u8>,
    component_count: u32,
    sections: SectionPointers,
}

/// Parse the 256-byte fixed header of either layout
pub fn parse_header(data: &[u8]) -> Result<(TefHeader, SongInfo), TefError> {
    let (format_id, version_major, version_minor, version) = detect_version(data)?;
    if data.len() < HEADER_SIZE {
        log::error!("Header needs {HEADER_SIZE} bytes, got {}", data.len());
        return Err(TefError::TruncatedHeader {
            needed: HEADER_SIZE,
            available: data.len(),
        });
    }
    let fields = &data[SIGNATURE_SIZE..HEADER_SIZE];
    let parsed = match version {
        FormatVersion::V2 => parse_v2_header_fields(fields),
        FormatVersion::V3 => parse_v3_header_fields(fields),
    };
    let (_rest, (info, fields)) = parsed.map_err(|_err| TefError::TruncatedHeader {
        needed: HEADER_SIZE,
        available: data.len(),
    })?;
    let time_signature = check_time_signature(fields.time_signature)?;
    let header = TefHeader {
        format_id,
        version_major,
        version_minor,
        version,
        measure_count: fields.measure_count,
        time_signature,
        tempo: fields.tempo,
        track_count: fields.track_count,
        declared_string_count: fields.declared_string_count,
        component_count: fields.component_count,
        sections: fields.sections,
    };
    log::debug!("Header: {header:?}");
    log::debug!("Title: {:?}", info.title);
    Ok((header, info))
}

/// Track record fields before validation
struct RawTrack {
    name: String,
    string_count: u8,
    role: u8,
    capo: u8,
    component_count: Option<u16>,
    tuning: Vec<u8>,
}

/// [name 32][strings 1][role 1][components 2][tuning 12]
fn parse_v2_track(i: &[u8]) -> IResult<&[u8], RawTrack> {
    let (i, (name, string_count, role, component_count, tuning)) = (
        parse_fixed_string(TRACK_NAME_SIZE),
        parse_u8,
        parse_u8,
        parse_u16,
        take(MAX_STRINGS),
    )
        .parse(i)?;
    Ok((
        i,
        RawTrack {
            name,
            string_count,
            role,
            capo: 0,
            component_count: Some(component_count),
            tuning: tuning.to_vec(),
        },
    ))
}

/// [name 32][strings 1][role 1][capo 1][reserved 1][tuning 12][reserved 16]
fn parse_v3_track(i: &[u8]) -> IResult<&[u8], RawTrack> {
    let (i, (name, string_count, role, capo, (), tuning, ())) = (
        parse_fixed_string(TRACK_NAME_SIZE),
        parse_u8,
        parse_u8,
        parse_u8,
        skip(1),
        take(MAX_STRINGS),
        skip(V3_TRACK_RECORD_SIZE - TRACK_NAME_SIZE - 4 - MAX_STRINGS),
    )
        .parse(i)?;
    Ok((
        i,
        RawTrack {
            name,
            string_count,
            role,
            capo,
            component_count: None,
            tuning: tuning.to_vec(),
        },
    ))
}

fn make_track(index: usize, offset: usize, raw: RawTrack) -> Result<Track, TefError> {
    let string_count = usize::from(raw.string_count);
    if string_count == 0 || string_count > MAX_STRINGS {
        log::error!("Track {index} {:?} has {string_count} strings", raw.name);
        return Err(TefError::InvalidTrack {
            index,
            string_count: raw.string_count,
        });
    }
    let role = TrackRole::from_byte(raw.role).unwrap_or_else(|| {
        let inferred = TrackRole::infer_from_name(&raw.name);
        log::debug!("Track {index} role byte {} inferred as {inferred}", raw.role);
        inferred
    });
    let mut track = Track::new(index, raw.name, role, &raw.tuning[..string_count]);
    track.capo = raw.capo;
    track.component_count = raw.component_count;
    track.offset = offset;
    log::debug!(
        "Track {index}: {:?} {role} strings={} tuning={:?}",
        track.name,
        track.string_count,
        track.tuning_names()
    );
    Ok(track)
}

/// Parse the track definitions that every decoding stage depends on
pub fn parse_tracks(data: &[u8], header: &TefHeader) -> Result<Vec<Track>, TefError> {
    let track_count = usize::from(header.track_count);
    if track_count == 0 {
        log::warn!("File declares no tracks");
        return Ok(Vec::new());
    }
    let start = header
        .sections
        .tracks
        .ok_or_else(|| TefError::InvalidHeader("missing track section".to_string()))?
        as usize;
    let record_size = header.version.track_record_size();
    let needed = start + track_count * record_size;
    if data.len() < needed {
        log::error!("Track section needs {needed} bytes, got {}", data.len());
        return Err(TefError::TruncatedHeader {
            needed,
            available: data.len(),
        });
    }
    let section = &data[start..needed];
    let parsed = match header.version {
        FormatVersion::V2 => count(parse_v2_track, track_count).parse(section),
        FormatVersion::V3 => count(parse_v3_track, track_count).parse(section),
    };
    let (_rest, raw_tracks) = parsed.map_err(|_err| TefError::TruncatedHeader {
        needed,
        available: data.len(),
    })?;
    let tracks = raw_tracks
        .into_iter()
        .enumerate()
        .map(|(index, raw)| make_track(index, start + index * record_size, raw))
        .collect::<Result<Vec<_>, _>>()?;

    if let Some(declared) = header.declared_string_count {
        let total: usize = tracks.iter().map(|t| usize::from(t.string_count)).sum();
        if total != usize::from(declared) {
            log::warn!("Header declares {declared} strings, tracks hold {total}");
        }
    }
    Ok(tracks)
}

/// Slice `data` from a section pointer, failing when it points outside the file
fn section_data<'a>(
    data: &'a [u8],
    section: &'static str,
    offset: u32,
) -> Result<&'a [u8], TefError> {
    let offset = offset as usize;
    data.get(offset..)
        .filter(|rest| !rest.is_empty())
        .ok_or(TefError::TruncatedSection { section, offset })
}

fn parse_section<'a, O>(
    data: &'a [u8],
    section: &'static str,
    offset: u32,
    mut parser: impl FnMut(&'a [u8]) -> IResult<&'a [u8], O>,
) -> Result<O, TefError> {
    let input = section_data(data, section, offset)?;
    let (_rest, value) = parser(input).map_err(|_err| {
        log::error!("Failed to parse {section} section at 0x{offset:x}");
        TefError::TruncatedSection {
            section,
            offset: offset as usize,
        }
    })?;
    Ok(value)
}

fn parse_chord_names(i: &[u8]) -> IResult<&[u8], Vec<String>> {
    let (i, chord_count) = parse_u16(i)?;
    count(parse_short_sized_string, usize::from(chord_count)).parse(i)
}

fn parse_text_event(i: &[u8]) -> IResult<&[u8], TextEvent> {
    let (i, (measure, position, text)) =
        (parse_u16, parse_u8, parse_short_sized_string).parse(i)?;
    Ok((
        i,
        TextEvent {
            measure,
            position,
            text,
        },
    ))
}

fn parse_text_events(i: &[u8]) -> IResult<&[u8], Vec<TextEvent>> {
    let (i, event_count) = parse_u16(i)?;
    count(parse_text_event, usize::from(event_count)).parse(i)
}

fn parse_reading_list_entry(i: &[u8]) -> IResult<&[u8], ReadingListEntry> {
    let (i, (start, end)) = (parse_u16, parse_u16).parse(i)?;
    Ok((i, ReadingListEntry::new(u32::from(start), u32::from(end))))
}

fn parse_reading_list_entries(i: &[u8]) -> IResult<&[u8], ReadingList> {
    let (i, entry_count) = parse_u16(i)?;
    let (i, entries) = count(parse_reading_list_entry, usize::from(entry_count)).parse(i)?;
    Ok((i, ReadingList { entries }))
}

pub fn parse_chords(data: &[u8], offset: u32) -> Result<Vec<String>, TefError> {
    let chords = parse_section(data, "chords", offset, parse_chord_names)?;
    log::debug!("Chords: {chords:?}");
    Ok(chords)
}

pub fn parse_text_event_section(data: &[u8], offset: u32) -> Result<Vec<TextEvent>, TefError> {
    let events = parse_section(data, "text events", offset, parse_text_events)?;
    log::debug!("Text events: {}", events.len());
    Ok(events)
}

pub fn parse_reading_list(data: &[u8], offset: u32) -> Result<ReadingList, TefError> {
    let list = parse_section(data, "reading list", offset, parse_reading_list_entries)?;
    log::debug!("Reading list: {} entries", list.entries.len());
    Ok(list)
}

pub fn parse_copyright(data: &[u8], offset: u32) -> Result<String, TefError> {
    parse_section(data, "copyright", offset, parse_short_sized_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::tef_types::{
        V2_READING_LIST_OFFSET, V2_TIME_DENOMINATOR_OFFSET, V2_TIME_NUMERATOR_OFFSET,
        V2_TRACK_COUNT_OFFSET, V3_MEASURE_COUNT_OFFSET, V3_TEMPO_OFFSET,
        V3_TIME_DENOMINATOR_OFFSET, V3_TIME_NUMERATOR_OFFSET, V3_TRACKS_POINTER_OFFSET,
        V3_TRACK_COUNT_OFFSET,
    };

    fn v3_header_bytes() -> Vec<u8> {
        let mut data = vec![0u8; HEADER_SIZE];
        data[0..2].copy_from_slice(&0x0010u16.to_le_bytes());
        data[2] = 5;
        data[3] = 3;
        data[V3_TRACKS_POINTER_OFFSET..V3_TRACKS_POINTER_OFFSET + 4]
            .copy_from_slice(&(HEADER_SIZE as u32).to_le_bytes());
        data[V3_MEASURE_COUNT_OFFSET..V3_MEASURE_COUNT_OFFSET + 2]
            .copy_from_slice(&12u16.to_le_bytes());
        data[V3_TIME_NUMERATOR_OFFSET] = 3;
        data[V3_TIME_DENOMINATOR_OFFSET] = 4;
        data[V3_TEMPO_OFFSET..V3_TEMPO_OFFSET + 2].copy_from_slice(&90u16.to_le_bytes());
        data[V3_TRACK_COUNT_OFFSET] = 1;
        data[V3_TITLE_OFFSET..V3_TITLE_OFFSET + 9].copy_from_slice(b"Cripple C");
        data
    }

    fn v3_track_bytes(name: &str, role: u8, tuning: &[u8]) -> Vec<u8> {
        let mut record = vec![0u8; V3_TRACK_RECORD_SIZE];
        record[..name.len()].copy_from_slice(name.as_bytes());
        record[TRACK_NAME_SIZE] = tuning.len() as u8;
        record[TRACK_NAME_SIZE + 1] = role;
        record[TRACK_NAME_SIZE + 2] = 2;
        record[TRACK_NAME_SIZE + 4..TRACK_NAME_SIZE + 4 + tuning.len()].copy_from_slice(tuning);
        record
    }

    #[test]
    fn test_detect_version() {
        assert_eq!(
            detect_version(&[0x10, 0x00, 0x05, 0x03]),
            Ok((0x0010, 3, 5, FormatVersion::V3))
        );
        assert_eq!(
            detect_version(&[0x10, 0x00, 0x40, 0x02]),
            Ok((0x0010, 2, 0x40, FormatVersion::V2))
        );
        assert_eq!(
            detect_version(b"PK\x03\x04"),
            Err(TefError::UnsupportedFormat {
                format_id: 0x4b50,
                major: 4
            })
        );
        assert_eq!(
            detect_version(&[0x10]),
            Err(TefError::TruncatedHeader {
                needed: 4,
                available: 1
            })
        );
    }

    #[test]
    fn test_parse_v3_header() {
        let data = v3_header_bytes();
        let (header, info) = parse_header(&data).unwrap();
        assert_eq!(header.version, FormatVersion::V3);
        assert_eq!(header.version_string(), "3.05");
        assert_eq!(header.measure_count, 12);
        assert_eq!(header.time_signature.to_string(), "3/4");
        assert_eq!(header.tempo, 90);
        assert_eq!(header.track_count, 1);
        assert_eq!(header.sections.tracks, Some(0x100));
        assert_eq!(header.sections.reading_list, None);
        assert_eq!(info.title, "Cripple C");
        assert_eq!(info.composer, "");
    }

    #[test]
    fn test_header_too_short() {
        let data = v3_header_bytes();
        assert_eq!(
            parse_header(&data[..0x80]),
            Err(TefError::TruncatedHeader {
                needed: HEADER_SIZE,
                available: 0x80
            })
        );
    }

    #[test]
    fn test_zero_time_signature_rejected() {
        let mut data = v3_header_bytes();
        data[V3_TIME_DENOMINATOR_OFFSET] = 0;
        assert!(matches!(parse_header(&data), Err(TefError::InvalidHeader(_))));
    }

    #[test]
    fn test_parse_v3_tracks() {
        let mut data = v3_header_bytes();
        data[V3_TRACK_COUNT_OFFSET] = 2;
        data.extend(v3_track_bytes("Banjo open G", 0xFF, &[34, 37, 41, 46, 29]));
        data.extend(v3_track_bytes("bass", 2, &[53, 58, 63, 68]));
        let (header, _info) = parse_header(&data).unwrap();
        let tracks = parse_tracks(&data, &header).unwrap();
        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks[0].name, "Banjo open G");
        assert_eq!(tracks[0].role, TrackRole::Lead);
        assert_eq!(tracks[0].tunings, vec![62, 59, 55, 50, 67]);
        assert_eq!(tracks[0].capo, 2);
        assert_eq!(tracks[0].offset, 0x100);
        assert_eq!(tracks[1].role, TrackRole::Bass);
        assert_eq!(tracks[1].string_count, 4);
        assert_eq!(tracks[1].offset, 0x140);
    }

    #[test]
    fn test_truncated_track_section() {
        let mut data = v3_header_bytes();
        data.extend(&v3_track_bytes("Banjo", 0, &[34, 37, 41, 46, 29])[..20]);
        let (header, _info) = parse_header(&data).unwrap();
        assert_eq!(
            parse_tracks(&data, &header),
            Err(TefError::TruncatedHeader {
                needed: 0x140,
                available: 0x114
            })
        );
    }

    #[test]
    fn test_track_without_strings_rejected() {
        let mut data = v3_header_bytes();
        data.extend(v3_track_bytes("empty", 0, &[]));
        let (header, _info) = parse_header(&data).unwrap();
        assert_eq!(
            parse_tracks(&data, &header),
            Err(TefError::InvalidTrack {
                index: 0,
                string_count: 0
            })
        );
    }

    #[test]
    fn test_v2_header_pointers() {
        let mut data = vec![0u8; HEADER_SIZE];
        data[0..4].copy_from_slice(&[0x10, 0x00, 0x40, 0x02]);
        data[V2_TIME_NUMERATOR_OFFSET] = 4;
        data[V2_TIME_DENOMINATOR_OFFSET] = 4;
        data[V2_TRACK_COUNT_OFFSET] = 3;
        data[V2_READING_LIST_OFFSET..V2_READING_LIST_OFFSET + 4].copy_from_slice(&0x400u32.to_le_bytes());
        let (header, _info) = parse_header(&data).unwrap();
        assert_eq!(header.version, FormatVersion::V2);
        assert_eq!(header.sections.tracks, Some(0x100));
        assert_eq!(header.sections.components, Some(0x100 + 3 * 48));
        assert_eq!(header.sections.reading_list, Some(0x400));
    }

    #[test]
    fn test_parse_optional_sections() {
        let mut data = vec![0u8; 4];
        // chords
        data.extend(2u16.to_le_bytes());
        data.extend(1u16.to_le_bytes());
        data.extend(b"G");
        data.extend(3u16.to_le_bytes());
        data.extend(b"D7\0");
        let chords_offset = 4;
        assert_eq!(
            parse_chords(&data, chords_offset).unwrap(),
            vec!["G".to_string(), "D7".to_string()]
        );

        let text_offset = data.len() as u32;
        data.extend(1u16.to_le_bytes());
        data.extend(9u16.to_le_bytes());
        data.push(0);
        data.extend(8u16.to_le_bytes());
        data.extend(b"(B Part)");
        let events = parse_text_event_section(&data, text_offset).unwrap();
        assert_eq!(
            events,
            vec![TextEvent {
                measure: 9,
                position: 0,
                text: "(B Part)".to_string()
            }]
        );

        let list_offset = data.len() as u32;
        data.extend(2u16.to_le_bytes());
        for value in [1u16, 8, 1, 7] {
            data.extend(value.to_le_bytes());
        }
        assert_eq!(
            parse_reading_list(&data, list_offset).unwrap(),
            ReadingList::new(&[(1, 8), (1, 7)])
        );
    }

    #[test]
    fn test_section_pointer_outside_file() {
        let data = vec![0u8; 16];
        assert_eq!(
            parse_reading_list(&data, 0x200),
            Err(TefError::TruncatedSection {
                section: "reading list",
                offset: 0x200
            })
        );
        // count promises more entries than present
        let mut data = vec![0u8; 4];
        data.extend(5u16.to_le_bytes());
        data.extend(1u16.to_le_bytes());
        assert_eq!(
            parse_chords(&data, 4),
            Err(TefError::TruncatedSection {
                section: "chords",
                offset: 4
            })
        );
    }
}
