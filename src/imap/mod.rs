pub mod connection;
mod error;
pub mod fetch;
mod flag;
pub mod folders;
mod mailbox;
pub mod query;
mod session;
mod uid;
pub mod utf7;

pub use error::Error;
pub use fetch::{Dialect, ParsedMessageMeta, RawFetchRecord, UnrecognizedFetchFormat};
pub use flag::{Flag, UnknownFlagError};
pub use folders::{Folder, FolderFilter};
pub use mailbox::Mailbox;
pub use query::{QueryError, SearchCriteria};
pub use session::{MailboxSession, SessionOptions};
pub use uid::{InvalidUid, Uid};
