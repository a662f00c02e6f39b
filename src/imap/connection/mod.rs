mod codec;
#[expect(clippy::module_inception)]
mod connection;
#[cfg(test)]
pub mod mock_connection;
mod send_command;
mod tag_generator;

pub use codec::ResponseData;
pub use connection::{AsyncStream, Connection, ConnectionError};
pub use send_command::{CommandResponse, SendCommand, Status, TransportError};
