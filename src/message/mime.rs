use derive_getters::Getters;
use log::{debug, trace};
use mailparse::{DispositionType, MailAddr, ParsedMail, SingleInfo};

use super::Address;

#[derive(Debug, Clone, PartialEq, Eq, Getters)]
pub struct Attachment {
    filename: Option<String>,
    content_type: String,
    content: Vec<u8>,
}

impl Attachment {
    pub fn size(&self) -> usize {
        self.content.len()
    }
}

#[derive(Default)]
pub(super) struct Parts {
    pub plain: Vec<String>,
    pub html: Vec<String>,
    pub attachments: Vec<Attachment>,
}

impl Parts {
    pub fn collect(mail: &ParsedMail) -> Self {
        let mut parts = Self::default();
        parts.walk(mail);
        parts
    }

    fn walk(&mut self, part: &ParsedMail) {
        if !part.subparts.is_empty() {
            for subpart in &part.subparts {
                self.walk(subpart);
            }
            return;
        }

        let content_type = part.ctype.mimetype.to_ascii_lowercase();
        let disposition = part.get_content_disposition();
        let is_attachment = disposition.disposition == DispositionType::Attachment
            || (disposition.disposition == DispositionType::Inline
                && !content_type.starts_with("text/"));

        if is_attachment {
            match part.get_body_raw() {
                Ok(content) => self.attachments.push(Attachment {
                    filename: disposition
                        .params
                        .get("filename")
                        .or_else(|| part.ctype.params.get("name"))
                        .cloned(),
                    content_type,
                    content,
                }),
                Err(e) => debug!("dropping undecodable attachment: {e}"),
            }
            return;
        }

        let body = match part.get_body() {
            Ok(body) => body,
            Err(e) => {
                debug!("dropping undecodable {content_type} part: {e}");
                return;
            }
        };
        match content_type.as_str() {
            "text/html" => self.html.push(body),
            "text/plain" => self.plain.push(body),
            other => trace!("ignoring {other} part"),
        }
    }
}

fn address(info: &SingleInfo) -> Address {
    Address {
        name: info.display_name.clone(),
        email: info.addr.clone(),
    }
}

/// Every mailbox of an address header. Group members are flattened. An
/// unparsable header is kept as one address without display name.
pub(super) fn addresses(value: Option<&str>) -> Vec<Address> {
    let Some(value) = value.map(str::trim).filter(|value| !value.is_empty()) else {
        return Vec::new();
    };

    match mailparse::addrparse(value) {
        Ok(list) => list
            .iter()
            .flat_map(|addr| match addr {
                MailAddr::Single(info) => vec![address(info)],
                MailAddr::Group(group) => group.addrs.iter().map(address).collect(),
            })
            .collect(),
        Err(e) => {
            debug!("cannot parse address header {value:?}: {e}");
            vec![Address::new(None, value)]
        }
    }
}
