use derive_getters::Getters;
use log::{trace, warn};
use nom::{
    IResult,
    branch::alt,
    bytes::complete::{escaped_transform, is_not, tag_no_case, take_while},
    character::complete::{char, digit1, one_of, space1},
    combinator::{all_consuming, map, map_res, opt, rest},
    sequence::{delimited, pair, preceded, tuple},
};

use crate::imap::{connection::ResponseData, utf7};

const ZIMBRA_SYSTEM_FOLDERS: [&str; 3] = ["Contacts", "Emailed Contacts", "Chats"];
const GMAIL_UMBRELLA: &str = "[Gmail]";

/// A mailbox as reported by `LIST`.
#[derive(Debug, Clone, PartialEq, Eq, Getters)]
pub struct Folder {
    /// Decoded from modified UTF-7. Falls back to the wire name if that is malformed.
    name: String,
    wire_name: String,
    delimiter: Option<String>,
    attributes: Vec<String>,
}

impl Folder {
    /// `false` for hierarchy placeholders that cannot be selected.
    pub fn selectable(&self) -> bool {
        !self.attributes.iter().any(|attribute| {
            attribute.eq_ignore_ascii_case(r"\Noselect")
                || attribute.eq_ignore_ascii_case(r"\NonExistent")
        })
    }
}

/// Server-specific folders to hide from listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FolderFilter {
    pub gmail: bool,
    pub zimbra: bool,
}

impl FolderFilter {
    fn keeps(self, folder: &Folder) -> bool {
        if !folder.selectable() {
            return false;
        }
        if self.gmail && folder.name == GMAIL_UMBRELLA {
            return false;
        }
        !(self.zimbra && ZIMBRA_SYSTEM_FOLDERS.contains(&folder.name.as_str()))
    }
}

enum Name {
    Text(String),
    Literal,
}

fn quoted(input: &str) -> IResult<&str, String> {
    delimited(
        char('"'),
        map(
            opt(escaped_transform(is_not("\\\""), '\\', one_of("\\\""))),
            Option::unwrap_or_default,
        ),
        char('"'),
    )(input)
}

fn attributes(input: &str) -> IResult<&str, Vec<String>> {
    map(
        delimited(char('('), take_while(|c| c != ')'), char(')')),
        |raw: &str| raw.split_whitespace().map(ToString::to_string).collect(),
    )(input)
}

fn delimiter(input: &str) -> IResult<&str, Option<String>> {
    alt((map(tag_no_case("NIL"), |_| None), map(quoted, Some)))(input)
}

fn literal_marker(input: &str) -> IResult<&str, usize> {
    all_consuming(delimited(
        char('{'),
        map_res(digit1, str::parse::<usize>),
        pair(opt(char('+')), char('}')),
    ))(input)
}

fn name(input: &str) -> IResult<&str, Name> {
    alt((
        map(all_consuming(quoted), Name::Text),
        map(literal_marker, |_| Name::Literal),
        map(rest, |atom: &str| Name::Text(atom.trim_end().to_string())),
    ))(input)
}

fn list_line(input: &str) -> IResult<&str, (Vec<String>, Option<String>, Name)> {
    preceded(
        pair(alt((tag_no_case("LIST"), tag_no_case("XLIST"))), space1),
        tuple((
            attributes,
            preceded(space1, delimiter),
            preceded(space1, name),
        )),
    )(input)
}

fn parse_folder(data: &ResponseData) -> Option<Folder> {
    let (_, (attributes, delimiter, name)) = list_line(data.text()).ok()?;
    let wire_name = match name {
        Name::Text(name) => name,
        Name::Literal => String::from_utf8_lossy(data.literals().first()?).into_owned(),
    };
    let name = utf7::decode(&wire_name).unwrap_or_else(|e| {
        warn!("keeping undecodable folder name {wire_name:?}: {e}");
        wire_name.clone()
    });

    Some(Folder {
        name,
        wire_name,
        delimiter,
        attributes,
    })
}

/// Reads the `LIST` lines of `data` in server order. Other untagged data is skipped.
pub fn parse_folders(data: &[ResponseData]) -> Vec<Folder> {
    data.iter()
        .filter(|data| {
            let text = data.text();
            text.get(..4).is_some_and(|word| word.eq_ignore_ascii_case("LIST"))
                || text.get(..5).is_some_and(|word| word.eq_ignore_ascii_case("XLIST"))
        })
        .filter_map(|data| {
            let folder = parse_folder(data);
            if folder.is_none() {
                warn!("skipping unparsable LIST response {:?}", data.text());
            }
            folder
        })
        .collect()
}

/// Drops unselectable folders and, depending on `options`, Gmail's
/// `[Gmail]` umbrella and Zimbra's system folders. Order is preserved.
pub fn filter(folders: Vec<Folder>, options: FolderFilter) -> Vec<Folder> {
    folders
        .into_iter()
        .filter(|folder| {
            let keep = options.keeps(folder);
            if !keep {
                trace!("hiding folder {:?}", folder.name);
            }
            keep
        })
        .collect()
}
