use std::str::FromStr;

use thiserror::Error;

use super::ResponseData;

/// Completion status of a tagged response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    No,
    Bad,
}

impl FromStr for Status {
    type Err = TransportError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_uppercase().as_str() {
            "OK" => Ok(Status::Ok),
            "NO" => Ok(Status::No),
            "BAD" => Ok(Status::Bad),
            _ => Err(TransportError::Protocol(format!(
                "unknown completion status {value:?}"
            ))),
        }
    }
}

/// Everything the server answered to one command: the untagged data in
/// arrival order and the tagged completion.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandResponse {
    status: Status,
    information: Option<String>,
    data: Vec<ResponseData>,
}

impl CommandResponse {
    pub fn new(status: Status, information: Option<String>, data: Vec<ResponseData>) -> Self {
        Self {
            status,
            information,
            data,
        }
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn is_ok(&self) -> bool {
        self.status == Status::Ok
    }

    /// Text after the status word, including a response code like `[READ-ONLY]`.
    pub fn information(&self) -> Option<&str> {
        self.information.as_deref()
    }

    pub fn data(&self) -> &[ResponseData] {
        &self.data
    }

    /// Parses the part of a tagged line after the tag, e.g. `OK [READ-ONLY] done`.
    pub(super) fn from_completion(
        completion: &str,
        data: Vec<ResponseData>,
    ) -> Result<Self, TransportError> {
        let (status, information) = match completion.split_once(' ') {
            Some((status, information)) => (status, Some(information.trim().to_string())),
            None => (completion, None),
        };

        Ok(Self::new(status.parse()?, information, data))
    }
}

#[derive(Error, Debug)]
pub enum TransportError {
    /// The session cannot be used anymore. Further commands fail the same way.
    #[error("session aborted: {0}")]
    Aborted(String),
    #[error("protocol violation: {0}")]
    Protocol(String),
}

/// Sends one command and collects the complete response. Implementations
/// allocate tags; `command` is everything after the tag.
#[expect(async_fn_in_trait)]
pub trait SendCommand {
    async fn send(&mut self, command: &str) -> Result<CommandResponse, TransportError>;
}
