use bytes::Bytes;
use derive_getters::Getters;
use log::{debug, trace, warn};
use nom::{
    IResult,
    bytes::complete::{tag, tag_no_case, take_while},
    character::complete::{char, digit1, space1},
    combinator::{map, map_res, opt, recognize},
    sequence::{delimited, preceded, terminated, tuple},
};
use thiserror::Error;

use crate::imap::{Flag, Uid, connection::ResponseData};

/// Layout of the FETCH response line a server is expected to send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// Fixed layout including `X-GM-THRID` and `X-GM-MSGID`.
    Gmail,
    /// Any other server. Field order varies, so several layouts are tried.
    Generic,
}

#[derive(Error, Debug, PartialEq)]
#[error("unrecognized FETCH response format: {line}")]
pub struct UnrecognizedFetchFormat {
    line: String,
}

impl UnrecognizedFetchFormat {
    pub fn line(&self) -> &str {
        &self.line
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Getters)]
pub struct ParsedMessageMeta {
    #[getter(skip)]
    uid: Uid,
    flags: Vec<String>,
    gmail_thread_id: Option<String>,
    gmail_message_id: Option<String>,
    #[getter(skip)]
    flags_missing: bool,
}

impl ParsedMessageMeta {
    pub fn uid(&self) -> Uid {
        self.uid
    }

    /// True if the line only matched the UID-only fallback layout. `flags`
    /// is empty then, regardless of what the server has stored.
    pub fn is_partial(&self) -> bool {
        self.flags_missing
    }

    pub fn has_flag(&self, flag: Flag) -> bool {
        self.flags
            .iter()
            .any(|raw| raw.parse::<Flag>().is_ok_and(|parsed| parsed == flag))
    }
}

/// One message from a `UID FETCH` response: the control line and the raw
/// RFC 2822 payload delivered as a literal.
#[derive(Debug, Clone)]
pub struct RawFetchRecord {
    header: String,
    body: Option<Bytes>,
}

impl RawFetchRecord {
    /// Returns `None` if `data` is not a FETCH response.
    pub fn from_response(data: &ResponseData) -> Option<Self> {
        let (rest, seq) = fetch_keyword(data.text()).ok()?;

        Some(Self {
            header: format!("{seq} {rest}"),
            body: data.literals().first().cloned(),
        })
    }

    /// The control line with the `FETCH` keyword removed, e.g. `12 (UID 5 FLAGS (\Seen) BODY[] {342}`.
    pub fn header(&self) -> &str {
        &self.header
    }

    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    pub fn into_body(self) -> Option<Bytes> {
        self.body
    }
}

type Attempt = fn(&str) -> IResult<&str, ParsedMessageMeta>;

const GMAIL_ATTEMPTS: &[(&str, Attempt)] = &[("gmail", gmail)];
const GENERIC_ATTEMPTS: &[(&str, Attempt)] = &[
    ("uid-flags", uid_then_flags),
    ("flags-uid", flags_then_uid),
    ("uid-only", uid_only),
];

impl Dialect {
    fn attempts(self) -> &'static [(&'static str, Attempt)] {
        match self {
            Dialect::Gmail => GMAIL_ATTEMPTS,
            Dialect::Generic => GENERIC_ATTEMPTS,
        }
    }

    /// Data items requested by `UID FETCH`. `BODY.PEEK` leaves `\Seen` untouched.
    pub fn fetch_items(self) -> &'static str {
        match self {
            Dialect::Gmail => "(X-GM-THRID X-GM-MSGID UID FLAGS BODY.PEEK[])",
            Dialect::Generic => "(UID FLAGS BODY.PEEK[])",
        }
    }
}

/// Extracts UID, flags and Gmail ids from a FETCH control line. The first
/// layout of `dialect` that matches wins; trailing data items are ignored.
///
/// # Errors
///
/// Fails with [`UnrecognizedFetchFormat`] if no layout matches.
pub fn parse(
    header: &str,
    dialect: Dialect,
) -> Result<ParsedMessageMeta, UnrecognizedFetchFormat> {
    for (name, attempt) in dialect.attempts() {
        if let Ok((_, meta)) = attempt(header) {
            match *name {
                "uid-only" => warn!("no FLAGS found in {header:?}, continuing without flags"),
                "flags-uid" => debug!("FETCH response lists FLAGS before UID"),
                _ => trace!("FETCH response matched {name} layout"),
            }
            return Ok(meta);
        }
    }

    Err(UnrecognizedFetchFormat {
        line: header.to_string(),
    })
}

fn fetch_keyword(input: &str) -> IResult<&str, &str> {
    terminated(digit1, tuple((space1, tag_no_case("FETCH"), space1)))(input)
}

fn sequence_open(input: &str) -> IResult<&str, &str> {
    delimited(
        opt(tag("* ")),
        digit1,
        tuple((space1, opt(tuple((tag_no_case("FETCH"), space1))), char('('))),
    )(input)
}

fn uid(input: &str) -> IResult<&str, Uid> {
    preceded(
        tuple((tag_no_case("UID"), space1)),
        map_res(digit1, str::parse::<Uid>),
    )(input)
}

fn flags(input: &str) -> IResult<&str, Vec<String>> {
    preceded(
        tuple((tag_no_case("FLAGS"), space1)),
        map(
            delimited(char('('), take_while(|c| c != ')'), char(')')),
            |raw: &str| raw.split_whitespace().map(ToString::to_string).collect(),
        ),
    )(input)
}

fn gmail_id<'a>(name: &'static str) -> impl FnMut(&'a str) -> IResult<&'a str, &'a str> {
    preceded(tuple((tag_no_case(name), space1)), recognize(digit1))
}

fn gmail(input: &str) -> IResult<&str, ParsedMessageMeta> {
    map(
        preceded(
            sequence_open,
            tuple((
                terminated(gmail_id("X-GM-THRID"), space1),
                terminated(gmail_id("X-GM-MSGID"), space1),
                terminated(uid, space1),
                flags,
            )),
        ),
        |(thread_id, message_id, uid, flags)| ParsedMessageMeta {
            uid,
            flags,
            gmail_thread_id: Some(thread_id.to_string()),
            gmail_message_id: Some(message_id.to_string()),
            flags_missing: false,
        },
    )(input)
}

fn uid_then_flags(input: &str) -> IResult<&str, ParsedMessageMeta> {
    map(
        preceded(sequence_open, tuple((terminated(uid, space1), flags))),
        |(uid, flags)| generic_meta(uid, flags),
    )(input)
}

fn flags_then_uid(input: &str) -> IResult<&str, ParsedMessageMeta> {
    map(
        preceded(sequence_open, tuple((terminated(flags, space1), uid))),
        |(flags, uid)| generic_meta(uid, flags),
    )(input)
}

fn uid_only(input: &str) -> IResult<&str, ParsedMessageMeta> {
    map(preceded(sequence_open, uid), |uid| ParsedMessageMeta {
        flags_missing: true,
        ..generic_meta(uid, Vec::new())
    })(input)
}

fn generic_meta(uid: Uid, flags: Vec<String>) -> ParsedMessageMeta {
    ParsedMessageMeta {
        uid,
        flags,
        gmail_thread_id: None,
        gmail_message_id: None,
        flags_missing: false,
    }
}
