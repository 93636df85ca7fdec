use encoding_rs::WINDOWS_1252;
use nom::{bytes, number, IResult};

/// Parse unsigned byte
pub fn parse_u8(i: &[u8]) -> IResult<&[u8], u8> {
    number::complete::le_u8(i)
}

/// Parse unsigned short
pub fn parse_u16(i: &[u8]) -> IResult<&[u8], u16> {
    number::complete::le_u16(i)
}

/// Parse unsigned 24 bits
pub fn parse_u24(i: &[u8]) -> IResult<&[u8], u32> {
    number::complete::le_u24(i)
}

/// Parse unsigned 32
pub fn parse_u32(i: &[u8]) -> IResult<&[u8], u32> {
    number::complete::le_u32(i)
}

/// Skip `n` bytes.
pub fn skip(n: usize) -> impl FnMut(&[u8]) -> IResult<&[u8], ()> {
    move |i: &[u8]| {
        log::debug!("skip: {n}");
        let (rest, _) = bytes::complete::take(n)(i)?;
        Ok((rest, ()))
    }
}

/// Materialize properly encoded String
fn make_string(i: &[u8]) -> String {
    let (cow, encoding_used, had_errors) = WINDOWS_1252.decode(i);
    if had_errors {
        log::debug!("Error parsing string with {encoding_used:?}");
        String::from_utf8_lossy(i).into_owned()
    } else {
        cow.into_owned()
    }
}

/// Fixed-width field holding a NUL-terminated string.
/// Consumes `field_size` bytes whatever the string length.
pub fn parse_fixed_string(field_size: usize) -> impl FnMut(&[u8]) -> IResult<&[u8], String> {
    move |i: &[u8]| {
        let (rest, field) = bytes::complete::take(field_size)(i)?;
        let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
        let string = make_string(&field[..end]);
        log::debug!("Fixed string field size={field_size} value={string:?}");
        Ok((rest, string))
    }
}

/// Size of string encoded as u16.
/// [u16 string_len][string_len bytes]
pub fn parse_short_sized_string(i: &[u8]) -> IResult<&[u8], String> {
    let (i, len) = parse_u16(i)?;
    let (rest, raw) = bytes::complete::take(len)(i)?;
    // some writers include the terminator in the length
    let raw = raw.strip_suffix(&[0u8]).unwrap_or(raw);
    Ok((rest, make_string(raw)))
}
