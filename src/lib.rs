//! Client-side access to IMAP mailboxes: folder listing and selection,
//! UID search, FETCH parsing across server dialects, and simple mutations.

pub mod config;
pub mod imap;
pub mod logging;
pub mod message;

pub use imap::{Error, MailboxSession, SearchCriteria, SessionOptions, Uid};
pub use message::EmailObject;
