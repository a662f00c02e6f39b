use imap_proto::{
    MailboxDatum::Exists,
    Response::{Data, Done, MailboxData},
    ResponseCode::{ReadOnly, ReadWrite, UidNext, UidValidity},
    Status,
};
use log::trace;

use crate::imap::{Uid, connection::CommandResponse};

/// State of the selected folder as reported by `SELECT` or `EXAMINE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mailbox {
    exists: u32,
    uid_validity: Option<u32>,
    uid_next: Option<Uid>,
    read_only: bool,
}

impl Mailbox {
    pub fn exists(&self) -> u32 {
        self.exists
    }

    pub fn uid_validity(&self) -> Option<u32> {
        self.uid_validity
    }

    pub fn uid_next(&self) -> Option<Uid> {
        self.uid_next
    }

    pub fn read_only(&self) -> bool {
        self.read_only
    }

    /// Collects what the server announced. Missing data stays unset, except
    /// that `read_only` falls back to the requested access mode.
    pub(crate) fn from_response(response: &CommandResponse, requested_read_only: bool) -> Self {
        let mut mailbox = Self {
            exists: 0,
            uid_validity: None,
            uid_next: None,
            read_only: requested_read_only,
        };

        for data in response.data() {
            let raw = format!("* {}\r\n", data.text());
            match imap_proto::parser::parse_response(raw.as_bytes()) {
                Ok((_, MailboxData(Exists(exists)))) => mailbox.exists = exists,
                Ok((
                    _,
                    Data {
                        status: Status::Ok,
                        code: Some(UidValidity(validity)),
                        ..
                    },
                )) => mailbox.uid_validity = Some(validity),
                Ok((
                    _,
                    Data {
                        status: Status::Ok,
                        code: Some(UidNext(next)),
                        ..
                    },
                )) => mailbox.uid_next = Uid::try_from(next).ok(),
                _ => trace!("ignoring select data {:?}", data.text()),
            }
        }

        if let Some(information) = response.information() {
            let raw = format!("0000 OK {information}\r\n");
            match imap_proto::parser::parse_response(raw.as_bytes()) {
                Ok((_, Done { code: Some(ReadOnly), .. })) => mailbox.read_only = true,
                Ok((_, Done { code: Some(ReadWrite), .. })) => mailbox.read_only = false,
                _ => trace!("select completion carries no access mode"),
            }
        }

        mailbox
    }
}
