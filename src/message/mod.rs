//! Decoded message content built from the raw RFC 2822 payload of a FETCH.

mod mime;

use std::fmt::Display;

use derive_getters::Getters;
use mailparse::{MailHeaderMap as _, MailParseError};

use crate::imap::ParsedMessageMeta;

pub use mime::Attachment;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Address {
    name: Option<String>,
    email: String,
}

impl Address {
    pub fn new(name: Option<String>, email: impl Into<String>) -> Self {
        Self {
            name,
            email: email.into(),
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn email(&self) -> &str {
        &self.email
    }
}

impl Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{name} <{}>", self.email),
            None => write!(f, "{}", self.email),
        }
    }
}

#[derive(Debug, Clone, Getters)]
pub struct EmailObject {
    meta: ParsedMessageMeta,
    message_id: Option<String>,
    subject: Option<String>,
    /// The `Date` header as sent.
    date: Option<String>,
    #[getter(skip)]
    timestamp: Option<i64>,
    from: Vec<Address>,
    to: Vec<Address>,
    cc: Vec<Address>,
    headers: Vec<(String, String)>,
    plain: Vec<String>,
    html: Vec<String>,
    attachments: Vec<Attachment>,
}

impl EmailObject {
    /// Decodes `raw` and attaches the metadata parsed from the FETCH line.
    ///
    /// # Errors
    ///
    /// Fails if the payload is not a parsable RFC 2822 message.
    pub fn parse(meta: ParsedMessageMeta, raw: &[u8]) -> Result<Self, MailParseError> {
        let parsed = mailparse::parse_mail(raw)?;
        let headers = &parsed.headers;

        let date = headers.get_first_value("Date");
        let timestamp = date
            .as_deref()
            .and_then(|date| mailparse::dateparse(date).ok());
        let parts = mime::Parts::collect(&parsed);

        Ok(Self {
            meta,
            message_id: headers.get_first_value("Message-ID"),
            subject: headers.get_first_value("Subject"),
            date,
            timestamp,
            from: mime::addresses(headers.get_first_value("From").as_deref()),
            to: mime::addresses(headers.get_first_value("To").as_deref()),
            cc: mime::addresses(headers.get_first_value("Cc").as_deref()),
            headers: headers
                .iter()
                .map(|header| (header.get_key(), header.get_value()))
                .collect(),
            plain: parts.plain,
            html: parts.html,
            attachments: parts.attachments,
        })
    }

    /// Seconds since the epoch, if the `Date` header could be parsed.
    pub fn timestamp(&self) -> Option<i64> {
        self.timestamp
    }
}

#[cfg(test)]
mod tests {
    use assertables::*;
    use rstest::*;

    use super::*;
    use crate::imap::{Dialect, fetch};

    const MULTIPART: &[u8] = b"Message-ID: <1234@example.org>\r\n\
From: Alice Example <alice@example.org>\r\n\
To: bob@example.org, \"Carol C.\" <carol@example.org>\r\n\
Subject: =?UTF-8?Q?Gr=C3=BC=C3=9Fe?=\r\n\
Date: Tue, 1 Jul 2003 10:52:37 +0200\r\n\
MIME-Version: 1.0\r\n\
Content-Type: multipart/mixed; boundary=\"outer\"\r\n\
\r\n\
--outer\r\n\
Content-Type: multipart/alternative; boundary=\"inner\"\r\n\
\r\n\
--inner\r\n\
Content-Type: text/plain; charset=utf-8\r\n\
\r\n\
Hello Bob\r\n\
--inner\r\n\
Content-Type: text/html; charset=utf-8\r\n\
\r\n\
<p>Hello Bob</p>\r\n\
--inner--\r\n\
--outer\r\n\
Content-Type: application/pdf; name=\"report.pdf\"\r\n\
Content-Disposition: attachment; filename=\"report.pdf\"\r\n\
Content-Transfer-Encoding: base64\r\n\
\r\n\
JVBERi0xLjQ=\r\n\
--outer--\r\n";

    #[fixture]
    fn meta() -> ParsedMessageMeta {
        assert_ok!(fetch::parse(r"1 (UID 42 FLAGS (\Seen))", Dialect::Generic))
    }

    #[rstest]
    fn test_headers_and_addresses(meta: ParsedMessageMeta) {
        let email = assert_ok!(EmailObject::parse(meta, MULTIPART));
        assert_eq!(&Some("<1234@example.org>".to_string()), email.message_id());
        assert_eq!(&Some("Grüße".to_string()), email.subject());
        assert_eq!(Some(1_057_049_557), email.timestamp());
        assert_eq!(
            &vec![Address::new(Some("Alice Example".to_string()), "alice@example.org")],
            email.from()
        );
        assert_eq!(2, email.to().len());
        assert_eq!("Carol C. <carol@example.org>", email.to()[1].to_string());
        assert_is_empty!(email.cc());
        assert_eq!(42, u32::from(email.meta().uid()));
    }

    #[rstest]
    fn test_body_parts_and_attachments(meta: ParsedMessageMeta) {
        let email = assert_ok!(EmailObject::parse(meta, MULTIPART));
        assert_eq!(1, email.plain().len());
        assert_contains!(email.plain()[0], "Hello Bob");
        assert_eq!(1, email.html().len());
        assert_contains!(email.html()[0], "<p>Hello Bob</p>");

        let attachment = assert_some!(email.attachments().first());
        assert_eq!(&Some("report.pdf".to_string()), attachment.filename());
        assert_eq!("application/pdf", attachment.content_type());
        assert_eq!(b"%PDF-1.4".as_slice(), attachment.content().as_slice());
        assert_eq!(8, attachment.size());
    }

    #[rstest]
    fn test_single_part_message_without_date(meta: ParsedMessageMeta) {
        let email = assert_ok!(EmailObject::parse(
            meta,
            b"Subject: plain\r\n\r\njust text\r\n"
        ));
        assert_none!(email.timestamp());
        assert_eq!(1, email.plain().len());
        assert_is_empty!(email.attachments());
        assert_eq!(
            &vec![("Subject".to_string(), "plain".to_string())],
            email.headers()
        );
    }
}
