use std::{io, ops::Range};

use bytes::{BufMut as _, Bytes, BytesMut};
use imap_proto::Request;
use nom::{
    IResult,
    character::complete::{char, digit1},
    combinator::{all_consuming, map_res, opt},
    sequence::{delimited, pair},
};
use tokio_util::codec::{Decoder, Encoder};

/// One response frame: the line text with literal payloads cut out (the
/// `{n}` markers stay in `text`) and the literals in transmission order.
#[derive(Clone, PartialEq)]
pub struct ResponseData {
    text: String,
    literals: Vec<Bytes>,
}

impl ResponseData {
    pub fn new(text: String, literals: Vec<Bytes>) -> Self {
        Self { text, literals }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn literals(&self) -> &[Bytes] {
        &self.literals
    }

    /// Strips the `* ` of an untagged response.
    pub(super) fn into_untagged(self) -> Self {
        match self.text.strip_prefix("* ") {
            Some(untagged) => Self {
                text: untagged.to_string(),
                literals: self.literals,
            },
            None => self,
        }
    }

    fn from_frame(frame: &Bytes, literals: &[Range<usize>]) -> Self {
        let mut text = Vec::with_capacity(frame.len());
        let mut segment_start = 0;
        for literal in literals {
            // the CRLF right before a literal belongs to neither side
            text.extend_from_slice(&frame[segment_start..literal.start - 2]);
            segment_start = literal.end;
        }
        text.extend_from_slice(&frame[segment_start..frame.len() - 2]);

        Self {
            text: String::from_utf8_lossy(&text).into_owned(),
            literals: literals
                .iter()
                .map(|literal| frame.slice(literal.clone()))
                .collect(),
        }
    }
}

impl std::fmt::Debug for ResponseData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseData")
            .field("text", &self.text)
            .field(
                "literal_sizes",
                &self.literals.iter().map(Bytes::len).collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// Upper bound for one response including its literals.
pub const MAX_FRAME_SIZE: usize = 64 * 1024 * 1024;

#[derive(Debug, Default)]
pub struct ImapCodec {}

fn oversized(announced: impl std::fmt::Display) -> io::Error {
    io::Error::new(
        io::ErrorKind::InvalidData,
        format!("response of {announced} bytes exceeds the {MAX_FRAME_SIZE} byte limit"),
    )
}

fn find_crlf(input: &[u8]) -> Option<usize> {
    input.windows(2).position(|window| window == b"\r\n")
}

fn literal_marker(input: &str) -> IResult<&str, u32> {
    all_consuming(delimited(
        char('{'),
        map_res(digit1, str::parse::<u32>),
        pair(opt(char('+')), char('}')),
    ))(input)
}

/// Length announced by a trailing `{n}` or `{n+}`, if the line ends with one.
/// A marker too large for `u32` is reported as an error.
fn literal_length(line: &[u8]) -> io::Result<Option<u32>> {
    let Some(open) = line.iter().rposition(|byte| *byte == b'{') else {
        return Ok(None);
    };
    let Ok(marker) = std::str::from_utf8(&line[open..]) else {
        return Ok(None);
    };
    match literal_marker(marker) {
        Ok((_, length)) => Ok(Some(length)),
        Err(_) if is_numeric_marker(marker) => Err(oversized(&marker[1..marker.len() - 1])),
        Err(_) => Ok(None),
    }
}

fn is_numeric_marker(marker: &str) -> bool {
    let Some(inner) = marker
        .strip_prefix('{')
        .and_then(|inner| inner.strip_suffix('}'))
    else {
        return false;
    };
    let digits = inner.strip_suffix('+').unwrap_or(inner);
    !digits.is_empty() && digits.bytes().all(|byte| byte.is_ascii_digit())
}

impl Decoder for ImapCodec {
    type Item = ResponseData;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let mut cursor = 0;
        let mut literals = Vec::new();

        loop {
            let Some(offset) = find_crlf(&src[cursor..]) else {
                if src.len() > MAX_FRAME_SIZE {
                    return Err(oversized(src.len()));
                }
                return Ok(None);
            };
            let line_end = cursor + offset;

            if let Some(length) = literal_length(&src[cursor..line_end])? {
                let start = line_end + 2;
                let end = usize::try_from(length)
                    .ok()
                    .and_then(|length| start.checked_add(length))
                    .filter(|end| *end <= MAX_FRAME_SIZE)
                    .ok_or_else(|| oversized(length))?;
                if src.len() < end {
                    src.reserve(end - src.len());
                    return Ok(None);
                }
                literals.push(start..end);
                cursor = end;
            } else {
                let frame = src.split_to(line_end + 2).freeze();
                return Ok(Some(ResponseData::from_frame(&frame, &literals)));
            }
        }
    }
}

impl<'a> Encoder<&Request<'a>> for ImapCodec {
    type Error = io::Error;

    fn encode(&mut self, request: &Request<'a>, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let Request(tag, command) = request;
        dst.reserve(tag.len() + command.len() + 3);
        if !tag.is_empty() {
            dst.put_slice(tag);
            dst.put_u8(b' ');
        }
        dst.put_slice(command);
        dst.put_slice(b"\r\n");

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::borrow::Cow;

    use assertables::*;
    use rstest::*;

    use super::*;

    #[fixture]
    fn codec() -> ImapCodec {
        ImapCodec::default()
    }

    #[rstest]
    fn test_decodes_single_line(mut codec: ImapCodec) {
        let mut buffer = BytesMut::from(&b"* 3 EXISTS\r\n* 1 RECENT\r\n"[..]);

        let first = assert_some!(assert_ok!(codec.decode(&mut buffer)));
        assert_eq!("* 3 EXISTS", first.text());
        assert_is_empty!(first.literals());

        let second = assert_some!(assert_ok!(codec.decode(&mut buffer)));
        assert_eq!("* 1 RECENT", second.text());
        assert_is_empty!(buffer);
    }

    #[rstest]
    fn test_waits_for_complete_line(mut codec: ImapCodec) {
        let mut buffer = BytesMut::from(&b"* OK still typ"[..]);
        assert_none!(assert_ok!(codec.decode(&mut buffer)));
        buffer.extend_from_slice(b"ing\r\n");
        let data = assert_some!(assert_ok!(codec.decode(&mut buffer)));
        assert_eq!("* OK still typing", data.text());
    }

    #[rstest]
    fn test_decodes_literal_spanning_lines(mut codec: ImapCodec) {
        let mut buffer = BytesMut::from(
            &b"* 12 FETCH (UID 5 FLAGS (\\Seen) BODY[] {14}\r\nSubject: a\r\n\r\n)\r\nA0001 OK done\r\n"[..],
        );

        let fetch = assert_some!(assert_ok!(codec.decode(&mut buffer)));
        assert_eq!(
            r"* 12 FETCH (UID 5 FLAGS (\Seen) BODY[] {14})",
            fetch.text()
        );
        assert_eq!(1, fetch.literals().len());
        assert_eq!(b"Subject: a\r\n\r\n".as_slice(), fetch.literals()[0].as_ref());

        let done = assert_some!(assert_ok!(codec.decode(&mut buffer)));
        assert_eq!("A0001 OK done", done.text());
    }

    #[rstest]
    fn test_waits_for_complete_literal(mut codec: ImapCodec) {
        let mut buffer = BytesMut::from(&b"* LIST () \"/\" {5}\r\nIN"[..]);
        assert_none!(assert_ok!(codec.decode(&mut buffer)));
        buffer.extend_from_slice(b"BOX\r\n");
        let data = assert_some!(assert_ok!(codec.decode(&mut buffer)));
        assert_eq!("* LIST () \"/\" {5}", data.text());
        assert_eq!(b"INBOX".as_slice(), data.literals()[0].as_ref());
    }

    #[rstest]
    fn test_decodes_non_synchronizing_literal_and_multiple_literals(mut codec: ImapCodec) {
        let mut buffer =
            BytesMut::from(&b"* 1 FETCH (BODY[1] {3+}\r\nabc BODY[2] {2}\r\nde)\r\n"[..]);
        let data = assert_some!(assert_ok!(codec.decode(&mut buffer)));
        assert_eq!("* 1 FETCH (BODY[1] {3+} BODY[2] {2})", data.text());
        assert_eq!(
            vec![Bytes::from_static(b"abc"), Bytes::from_static(b"de")],
            data.literals()
        );
    }

    #[rstest]
    #[case(b"* OK [ALERT] {brace} in text".as_slice())]
    #[case(b"* OK {12x}".as_slice())]
    fn test_braces_without_length_are_plain_text(mut codec: ImapCodec, #[case] line: &[u8]) {
        let mut buffer = BytesMut::from(line);
        buffer.extend_from_slice(b"\r\n");
        let data = assert_some!(assert_ok!(codec.decode(&mut buffer)));
        assert_is_empty!(data.literals());
    }

    #[rstest]
    #[case(b"* 1 FETCH (BODY[] {18446744073709551615}\r\nabc)\r\n".as_slice())]
    #[case(b"* 1 FETCH (BODY[] {9223372036854775000}\r\nabc)\r\n".as_slice())]
    #[case(b"* 1 FETCH (BODY[] {4294967295}\r\nabc)\r\n".as_slice())]
    fn test_rejects_oversized_literal(mut codec: ImapCodec, #[case] input: &[u8]) {
        let mut buffer = BytesMut::from(input);
        let error = assert_err!(codec.decode(&mut buffer));
        assert_eq!(io::ErrorKind::InvalidData, error.kind());
        assert_le!(buffer.capacity(), MAX_FRAME_SIZE);
    }

    #[rstest]
    fn test_rejects_endless_line(mut codec: ImapCodec) {
        let mut buffer = BytesMut::from(vec![b'a'; MAX_FRAME_SIZE + 1].as_slice());
        assert_err!(codec.decode(&mut buffer));
    }

    #[rstest]
    fn test_into_untagged_strips_star() {
        let data = ResponseData::new("* SEARCH 1 2".to_string(), Vec::new());
        assert_eq!("SEARCH 1 2", data.into_untagged().text());
    }

    #[rstest]
    fn test_encodes_tagged_request(mut codec: ImapCodec) {
        let mut buffer = BytesMut::new();
        let request = Request(Cow::Borrowed(b"0000"), Cow::Borrowed(b"NOOP"));
        assert_ok!(codec.encode(&request, &mut buffer));
        assert_eq!(b"0000 NOOP\r\n".as_slice(), buffer.as_ref());
    }
}
