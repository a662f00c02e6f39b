use thiserror::Error;

use crate::imap::{
    Uid,
    connection::{ConnectionError, Status, TransportError},
    fetch::UnrecognizedFetchFormat,
    query::QueryError,
};

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    ConnectionError(#[from] ConnectionError),
    #[error("login as {user} rejected: {information}")]
    LoginError { user: String, information: String },
    #[error("no folder selected")]
    NoFolderSelected,
    #[error("folder {folder:?} not found: {information}")]
    FolderNotFound { folder: String, information: String },
    #[error("cannot parse FETCH response")]
    UnrecognizedFetchFormat(#[from] UnrecognizedFetchFormat),
    #[error("fetching message {uid} failed after retry")]
    FetchFailed {
        uid: Uid,
        #[source]
        source: TransportError,
    },
    #[error("invalid search criteria")]
    Query(#[from] QueryError),
    #[error("session is logged out")]
    LoggedOut,
    #[error("message {uid} does not exist in the selected folder")]
    MessageNotFound { uid: Uid },
    #[error("FETCH response for message {uid} carries no body")]
    MissingBody { uid: Uid },
    #[error("{command} failed with {status:?}: {information}")]
    CommandFailed {
        command: String,
        status: Status,
        information: String,
    },
    #[error("unexpected response to {command}: {line:?}")]
    UnexpectedResponse { command: String, line: String },
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("cannot decode message {uid}")]
    Mime {
        uid: Uid,
        #[source]
        source: mailparse::MailParseError,
    },
}
