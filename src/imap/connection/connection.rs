use std::{borrow::Cow, io};

use futures::{SinkExt as _, StreamExt as _};
use imap_proto::{Request, Response, ResponseCode};
use log::{debug, trace, warn};
use thiserror::Error;
use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::TcpStream,
};
use tokio_native_tls::{TlsConnector, native_tls};
use tokio_util::codec::Framed;

use super::{
    CommandResponse, SendCommand, TransportError, codec::ImapCodec, codec::ResponseData,
    tag_generator::TagGenerator,
};

pub trait AsyncStream: AsyncRead + AsyncWrite + Unpin + Send {}
impl<T: AsyncRead + AsyncWrite + Unpin + Send> AsyncStream for T {}

pub type ImapStream = Framed<Box<dyn AsyncStream>, ImapCodec>;

#[derive(Error, Debug)]
pub enum ConnectionError {
    #[error("cannot connect to {host}:{port}")]
    Connect {
        host: String,
        port: u16,
        #[source]
        source: io::Error,
    },
    #[error("tls handshake with {host} failed")]
    Tls {
        host: String,
        #[source]
        source: native_tls::Error,
    },
    #[error("server closed the connection before greeting")]
    NoGreeting,
    #[error("server refused the connection: {0}")]
    Refused(String),
    #[error("cannot read greeting")]
    Io(#[from] io::Error),
}

pub struct Connection {
    stream: ImapStream,
    tag_generator: TagGenerator,
    closed: bool,
}

impl Connection {
    /// Opens a TCP connection, optionally wrapped in TLS, and waits for the
    /// server greeting.
    ///
    /// # Errors
    ///
    /// Fails if the server is unreachable, the handshake fails or the
    /// greeting is a `BYE`.
    pub async fn connect(host: &str, port: u16, tls: bool) -> Result<Self, ConnectionError> {
        debug!("connecting to {host}:{port}, tls: {tls}");
        let tcp = TcpStream::connect((host, port))
            .await
            .map_err(|source| ConnectionError::Connect {
                host: host.to_string(),
                port,
                source,
            })?;

        let stream: Box<dyn AsyncStream> = if tls {
            let tls_error = |source| ConnectionError::Tls {
                host: host.to_string(),
                source,
            };
            let connector = TlsConnector::from(native_tls::TlsConnector::new().map_err(tls_error)?);
            Box::new(connector.connect(host, tcp).await.map_err(tls_error)?)
        } else {
            Box::new(tcp)
        };

        Self::from_stream(stream).await
    }

    /// Takes over an established byte stream whose next frame is the greeting.
    ///
    /// # Errors
    ///
    /// Fails if the stream ends before the greeting or the greeting is a `BYE`.
    pub async fn from_stream(stream: Box<dyn AsyncStream>) -> Result<Self, ConnectionError> {
        let mut stream = Framed::new(stream, ImapCodec::default());

        let greeting = stream.next().await.ok_or(ConnectionError::NoGreeting)??;
        trace!("greeting = {greeting:?}");
        check_greeting(&greeting)?;
        log_capabilities(&greeting);

        Ok(Self {
            stream,
            tag_generator: TagGenerator::default(),
            closed: false,
        })
    }

    fn abort(&mut self, reason: String) -> TransportError {
        warn!("connection aborted: {reason}");
        self.closed = true;
        TransportError::Aborted(reason)
    }

    async fn receive(&mut self) -> Result<ResponseData, TransportError> {
        match self.stream.next().await {
            Some(Ok(frame)) => Ok(frame),
            Some(Err(e)) => Err(self.abort(e.to_string())),
            None => Err(self.abort("connection closed by server".to_string())),
        }
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("tag_generator", &self.tag_generator)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

fn check_greeting(greeting: &ResponseData) -> Result<(), ConnectionError> {
    let text = greeting.text();
    let status = text
        .strip_prefix("* ")
        .and_then(|rest| rest.split_whitespace().next())
        .map(str::to_ascii_uppercase);

    match status.as_deref() {
        Some("OK" | "PREAUTH") => Ok(()),
        _ => Err(ConnectionError::Refused(text.to_string())),
    }
}

fn log_capabilities(greeting: &ResponseData) {
    let raw = format!("{}\r\n", greeting.text());
    match imap_proto::parser::parse_response(raw.as_bytes()) {
        Ok((
            _,
            Response::Data {
                code: Some(ResponseCode::Capabilities(capabilities)),
                ..
            },
        )) => debug!("server capabilities: {capabilities:?}"),
        Ok(_) => trace!("greeting carries no capabilities"),
        Err(e) => debug!("cannot parse greeting: {e:?}"),
    }
}

fn is_bye(untagged: &str) -> bool {
    untagged
        .split_whitespace()
        .next()
        .is_some_and(|word| word.eq_ignore_ascii_case("BYE"))
}

impl SendCommand for Connection {
    async fn send(&mut self, command: &str) -> Result<CommandResponse, TransportError> {
        if self.closed {
            return Err(TransportError::Aborted(
                "connection is already closed".to_string(),
            ));
        }

        let tag = self.tag_generator.next().unwrap_or_default();
        trace!("{tag}: sending");
        let request = Request(
            Cow::Borrowed(tag.as_bytes()),
            Cow::Borrowed(command.as_bytes()),
        );
        if let Err(e) = self.stream.send(&request).await {
            return Err(self.abort(e.to_string()));
        }

        let logout = command.eq_ignore_ascii_case("LOGOUT");
        let mut data = Vec::new();
        loop {
            let frame = self.receive().await?;
            trace!("{tag}: received {frame:?}");

            if let Some(untagged) = frame.text().strip_prefix("* ") {
                if is_bye(untagged) && !logout {
                    return Err(self.abort(untagged.to_string()));
                }
                data.push(frame.into_untagged());
            } else if let Some(completion) = frame
                .text()
                .strip_prefix(tag.as_str())
                .and_then(|rest| rest.strip_prefix(' '))
            {
                let response = CommandResponse::from_completion(completion, data)
                    .map_err(|e| self.abort(format!("{tag}: {e}")))?;
                if logout {
                    self.closed = true;
                }
                return Ok(response);
            } else {
                // out of step with the server, later completions cannot be matched
                return Err(self.abort(format!(
                    "{tag}: unexpected response {:?}",
                    frame.text()
                )));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use assertables::*;
    use rstest::*;
    use tokio::io::{AsyncReadExt as _, AsyncWriteExt as _, DuplexStream, duplex};

    use super::*;
    use crate::imap::connection::Status;

    async fn connected(greeting: &[u8]) -> (Connection, DuplexStream) {
        let (client, mut server) = duplex(4096);
        server.write_all(greeting).await.unwrap();
        let connection = assert_ok!(Connection::from_stream(Box::new(client)).await);
        (connection, server)
    }

    async fn read_command(server: &mut DuplexStream) -> String {
        let mut buffer = vec![0; 512];
        let read = server.read(&mut buffer).await.unwrap();
        String::from_utf8_lossy(&buffer[..read]).into_owned()
    }

    #[rstest]
    #[tokio::test]
    async fn test_refuses_bye_greeting() {
        let (client, mut server) = duplex(4096);
        server.write_all(b"* BYE too busy\r\n").await.unwrap();
        assert_matches!(
            Connection::from_stream(Box::new(client)).await,
            Err(ConnectionError::Refused(_))
        );
    }

    #[rstest]
    #[tokio::test]
    async fn test_collects_untagged_data_until_tagged_completion() {
        let (mut connection, mut server) =
            connected(b"* OK [CAPABILITY IMAP4rev1] ready\r\n").await;
        server
            .write_all(b"* SEARCH 3 7\r\n0000 OK SEARCH completed\r\n")
            .await
            .unwrap();

        let response = assert_ok!(connection.send("UID SEARCH ALL").await);
        assert_eq!("0000 UID SEARCH ALL\r\n", read_command(&mut server).await);
        assert_eq!(Status::Ok, response.status());
        assert_eq!(1, response.data().len());
        assert_eq!("SEARCH 3 7", response.data()[0].text());
    }

    #[rstest]
    #[tokio::test]
    async fn test_second_command_uses_next_tag() {
        let (mut connection, mut server) = connected(b"* OK ready\r\n").await;
        server
            .write_all(b"0000 OK done\r\n0001 NO nope\r\n")
            .await
            .unwrap();

        assert_ok!(connection.send("NOOP").await);
        let response = assert_ok!(connection.send("NOOP").await);
        assert_eq!(Status::No, response.status());
        assert_eq!(Some("nope"), response.information());
    }

    #[rstest]
    #[tokio::test]
    async fn test_unsolicited_bye_aborts_session() {
        let (mut connection, mut server) = connected(b"* OK ready\r\n").await;
        server
            .write_all(b"* BYE idle timeout\r\n")
            .await
            .unwrap();

        assert_matches!(
            connection.send("NOOP").await,
            Err(TransportError::Aborted(_))
        );
        assert_matches!(
            connection.send("NOOP").await,
            Err(TransportError::Aborted(_))
        );
    }

    #[rstest]
    #[tokio::test]
    async fn test_eof_mid_command_aborts_session() {
        let (mut connection, mut server) = connected(b"* OK ready\r\n").await;
        server.write_all(b"* 1 FETCH (UID 4").await.unwrap();
        drop(server);

        assert_matches!(
            connection.send("UID FETCH 4 (UID)").await,
            Err(TransportError::Aborted(_))
        );
    }

    #[rstest]
    #[case(b"+ go ahead\r\n0000 OK first\r\n".as_slice())]
    #[case(b"0000 MAYBE first\r\n".as_slice())]
    #[tokio::test]
    async fn test_out_of_step_server_aborts_session(#[case] reply: &[u8]) {
        let (mut connection, mut server) = connected(b"* OK ready\r\n").await;
        server.write_all(reply).await.unwrap();
        server.write_all(b"0001 OK second\r\n").await.unwrap();

        assert_matches!(
            connection.send("NOOP").await,
            Err(TransportError::Aborted(_))
        );
        let Err(TransportError::Aborted(reason)) = connection.send("NOOP").await else {
            panic!("closed connection must refuse further commands");
        };
        assert_contains!(reason, "already closed");
    }

    #[rstest]
    #[tokio::test]
    async fn test_bye_during_logout_is_expected() {
        let (mut connection, mut server) = connected(b"* OK ready\r\n").await;
        server
            .write_all(b"* BYE logging out\r\n0000 OK LOGOUT completed\r\n")
            .await
            .unwrap();

        let response = assert_ok!(connection.send("LOGOUT").await);
        assert!(response.is_ok());
        assert_matches!(
            connection.send("NOOP").await,
            Err(TransportError::Aborted(_))
        );
    }
}
