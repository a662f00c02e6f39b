//! Modified UTF-7 for mailbox names as defined in RFC 3501 section 5.1.3.
//!
//! Printable US-ASCII except `&` represents itself. `&` is written `&-`.
//! Everything else is UTF-16BE, encoded with the base64 alphabet that uses `,`
//! instead of `/`, without padding, and enclosed in `&` and `-`.

use base64::{
    Engine as _, alphabet,
    engine::{GeneralPurpose, general_purpose},
};
use thiserror::Error;

const MODIFIED_BASE64: GeneralPurpose =
    GeneralPurpose::new(&alphabet::IMAP_MUTF7, general_purpose::NO_PAD);

#[derive(Error, Debug, PartialEq)]
pub enum InvalidUtf7 {
    #[error("unterminated shift sequence in {name:?}")]
    Unterminated { name: String },
    #[error("invalid base64 in shift sequence {sequence:?}")]
    Base64 { sequence: String },
    #[error("shift sequence {sequence:?} is not valid UTF-16")]
    Utf16 { sequence: String },
}

fn is_direct(c: char) -> bool {
    (' '..='~').contains(&c) && c != '&'
}

pub fn encode(name: &str) -> String {
    let mut encoded = String::with_capacity(name.len());
    let mut pending = String::new();

    for c in name.chars() {
        if is_direct(c) || c == '&' {
            if !pending.is_empty() {
                flush_shifted(&mut encoded, &pending);
                pending.clear();
            }
            if c == '&' {
                encoded.push_str("&-");
            } else {
                encoded.push(c);
            }
        } else {
            pending.push(c);
        }
    }
    if !pending.is_empty() {
        flush_shifted(&mut encoded, &pending);
    }

    encoded
}

fn flush_shifted(out: &mut String, run: &str) {
    let utf16: Vec<u8> = run.encode_utf16().flat_map(u16::to_be_bytes).collect();
    out.push('&');
    out.push_str(&MODIFIED_BASE64.encode(utf16));
    out.push('-');
}

pub fn decode(wire_name: &str) -> Result<String, InvalidUtf7> {
    let mut decoded = String::with_capacity(wire_name.len());
    let mut rest = wire_name;

    while let Some(shift) = rest.find('&') {
        decoded.push_str(&rest[..shift]);
        let after_shift = &rest[shift + 1..];
        let Some(end) = after_shift.find('-') else {
            return Err(InvalidUtf7::Unterminated {
                name: wire_name.to_string(),
            });
        };
        let sequence = &after_shift[..end];
        if sequence.is_empty() {
            decoded.push('&');
        } else {
            decoded.push_str(&decode_shifted(sequence)?);
        }
        rest = &after_shift[end + 1..];
    }
    decoded.push_str(rest);

    Ok(decoded)
}

fn decode_shifted(sequence: &str) -> Result<String, InvalidUtf7> {
    let bytes = MODIFIED_BASE64
        .decode(sequence)
        .map_err(|_| InvalidUtf7::Base64 {
            sequence: sequence.to_string(),
        })?;
    if bytes.len() % 2 != 0 {
        return Err(InvalidUtf7::Utf16 {
            sequence: sequence.to_string(),
        });
    }
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect();

    String::from_utf16(&units).map_err(|_| InvalidUtf7::Utf16 {
        sequence: sequence.to_string(),
    })
}
