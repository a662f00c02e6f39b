use std::collections::VecDeque;

use bytes::Bytes;

use super::{CommandResponse, ResponseData, SendCommand, Status, TransportError};

/// Answers commands from a script in order and records what was sent.
#[derive(Debug)]
pub struct MockConnection {
    script: VecDeque<Result<CommandResponse, TransportError>>,
    sent: Vec<String>,
}

impl MockConnection {
    pub fn new(script: impl IntoIterator<Item = Result<CommandResponse, TransportError>>) -> Self {
        Self {
            script: script.into_iter().collect(),
            sent: Vec::new(),
        }
    }

    pub fn sent(&self) -> &[String] {
        &self.sent
    }

    pub fn is_exhausted(&self) -> bool {
        self.script.is_empty()
    }
}

impl SendCommand for MockConnection {
    async fn send(&mut self, command: &str) -> Result<CommandResponse, TransportError> {
        self.sent.push(command.to_string());
        self.script
            .pop_front()
            .unwrap_or_else(|| panic!("no scripted response left for {command:?}"))
    }
}

pub fn data(text: &str) -> ResponseData {
    ResponseData::new(text.to_string(), Vec::new())
}

pub fn ok(data: Vec<ResponseData>) -> Result<CommandResponse, TransportError> {
    Ok(CommandResponse::new(
        Status::Ok,
        Some("completed".to_string()),
        data,
    ))
}

pub fn ok_with(information: &str, data: Vec<ResponseData>) -> Result<CommandResponse, TransportError> {
    Ok(CommandResponse::new(
        Status::Ok,
        Some(information.to_string()),
        data,
    ))
}

pub fn no(information: &str) -> Result<CommandResponse, TransportError> {
    Ok(CommandResponse::new(
        Status::No,
        Some(information.to_string()),
        Vec::new(),
    ))
}

pub fn bad(information: &str) -> Result<CommandResponse, TransportError> {
    Ok(CommandResponse::new(
        Status::Bad,
        Some(information.to_string()),
        Vec::new(),
    ))
}

pub fn aborted() -> Result<CommandResponse, TransportError> {
    Err(TransportError::Aborted("connection reset by peer".to_string()))
}

/// A completed `UID FETCH` answering with `header` and `body` as literal.
pub fn fetched(header: &str, body: &'static [u8]) -> Result<CommandResponse, TransportError> {
    ok(vec![ResponseData::new(
        header.to_string(),
        vec![Bytes::from_static(body)],
    )])
}
