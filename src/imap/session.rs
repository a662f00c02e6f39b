//! A logged-in IMAP session over one connection.
//!
//! Commands are strictly sequential: every operation takes `&mut self` and
//! completes its round trip before returning. Hosts sharing a session
//! between tasks wrap it in a `tokio::sync::Mutex`; more throughput needs
//! more sessions, not concurrent commands on one.

use futures::{Stream, stream};
use imap_proto::{MailboxDatum, Response};
use log::{debug, info, trace, warn};

use crate::{
    imap::{
        Error, Flag, Uid,
        connection::{CommandResponse, Connection, SendCommand, Status, TransportError},
        fetch::{self, Dialect, RawFetchRecord},
        folders::{self, Folder, FolderFilter},
        mailbox::Mailbox,
        query::{QueryError, SearchCriteria, quote},
        utf7,
    },
    message::EmailObject,
};

/// Everything needed to open a session.
#[derive(Clone)]
pub struct SessionOptions {
    host: String,
    port: Option<u16>,
    user: String,
    password: String,
    tls: bool,
    gmail: bool,
    zimbra: bool,
}

impl std::fmt::Debug for SessionOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionOptions")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"********")
            .field("tls", &self.tls)
            .field("gmail", &self.gmail)
            .field("zimbra", &self.zimbra)
            .finish()
    }
}

impl SessionOptions {
    pub fn new(host: impl Into<String>, user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: None,
            user: user.into(),
            password: password.into(),
            tls: true,
            gmail: false,
            zimbra: false,
        }
    }

    #[must_use]
    pub fn port(mut self, port: Option<u16>) -> Self {
        self.port = port;
        self
    }

    #[must_use]
    pub fn tls(mut self, tls: bool) -> Self {
        self.tls = tls;
        self
    }

    /// Parse FETCH responses with Gmail's extensions and hide `[Gmail]`.
    #[must_use]
    pub fn gmail(mut self, gmail: bool) -> Self {
        self.gmail = gmail;
        self
    }

    /// Hide Zimbra's contact and chat folders.
    #[must_use]
    pub fn zimbra(mut self, zimbra: bool) -> Self {
        self.zimbra = zimbra;
        self
    }

    /// 993 with TLS and 143 without, unless set explicitly.
    pub fn effective_port(&self) -> u16 {
        self.port.unwrap_or(if self.tls { 993 } else { 143 })
    }

    fn dialect(&self) -> Dialect {
        if self.gmail {
            Dialect::Gmail
        } else {
            Dialect::Generic
        }
    }

    fn folder_filter(&self) -> FolderFilter {
        FolderFilter {
            gmail: self.gmail,
            zimbra: self.zimbra,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum State {
    Connected,
    Selected { folder: String, read_only: bool },
    LoggedOut,
}

#[derive(Debug)]
pub struct MailboxSession<T: SendCommand> {
    connection: T,
    state: State,
    dialect: Dialect,
    filter: FolderFilter,
    username: String,
}

impl MailboxSession<Connection> {
    /// Connects to the server of `options` and logs in.
    ///
    /// # Errors
    ///
    /// Fails if the server cannot be reached or rejects the credentials.
    pub async fn connect(options: &SessionOptions) -> Result<Self, Error> {
        let connection =
            Connection::connect(&options.host, options.effective_port(), options.tls).await?;
        info!("connected to {}:{}", options.host, options.effective_port());
        Self::login(connection, options).await
    }
}

fn mailbox_argument(name: &str) -> Result<String, QueryError> {
    quote(&utf7::encode(name)).ok_or_else(|| QueryError::InvalidQueryValue {
        key: "folder".to_string(),
        value: name.to_string(),
    })
}

fn is_search(text: &str) -> bool {
    text.split_whitespace()
        .next()
        .is_some_and(|word| word.eq_ignore_ascii_case("SEARCH"))
}

fn command_failed(command: &str, response: &CommandResponse) -> Error {
    Error::CommandFailed {
        command: command.to_string(),
        status: response.status(),
        information: response.information().unwrap_or_default().to_string(),
    }
}

fn fetch_failed(uid: Uid) -> impl FnOnce(Error) -> Error {
    move |error| match error {
        Error::Transport(source) => Error::FetchFailed { uid, source },
        error => error,
    }
}

impl<T: SendCommand> MailboxSession<T> {
    /// Authenticates on an established connection with `LOGIN`.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::LoginError`] if the server answers `NO` or the
    /// credentials cannot be sent as quoted strings.
    pub async fn login(mut connection: T, options: &SessionOptions) -> Result<Self, Error> {
        let login_error = |information: &str| Error::LoginError {
            user: options.user.clone(),
            information: information.to_string(),
        };
        let (Some(user), Some(password)) = (quote(&options.user), quote(&options.password)) else {
            return Err(login_error("credentials contain characters LOGIN cannot carry"));
        };

        debug!("LOGIN {user} <password>");
        let response = connection
            .send(&format!("LOGIN {user} {password}"))
            .await?;
        match response.status() {
            Status::Ok => {
                info!("logged in as {}", options.user);
                Ok(Self {
                    connection,
                    state: State::Connected,
                    dialect: options.dialect(),
                    filter: options.folder_filter(),
                    username: options.user.clone(),
                })
            }
            Status::No => Err(login_error(response.information().unwrap_or_default())),
            Status::Bad => Err(command_failed("LOGIN", &response)),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn selected_folder(&self) -> Option<&str> {
        match &self.state {
            State::Selected { folder, .. } => Some(folder),
            _ => None,
        }
    }

    pub fn is_logged_out(&self) -> bool {
        self.state == State::LoggedOut
    }

    fn ensure_open(&self) -> Result<(), Error> {
        if self.is_logged_out() {
            Err(Error::LoggedOut)
        } else {
            Ok(())
        }
    }

    fn ensure_selected(&self) -> Result<(String, bool), Error> {
        self.ensure_open()?;
        match &self.state {
            State::Selected { folder, read_only } => Ok((folder.clone(), *read_only)),
            _ => Err(Error::NoFolderSelected),
        }
    }

    async fn send(&mut self, command: &str) -> Result<CommandResponse, Error> {
        self.ensure_open()?;
        debug!("{command}");
        Ok(self.connection.send(command).await?)
    }

    /// Like `send`, but anything other than `OK` is an error.
    async fn execute(&mut self, command: &str) -> Result<CommandResponse, Error> {
        let response = self.send(command).await?;
        if response.is_ok() {
            Ok(response)
        } else {
            Err(command_failed(command, &response))
        }
    }

    /// Selects `name` with `EXAMINE` if `read_only`, else `SELECT`. On any
    /// failure no folder is selected afterwards.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::FolderNotFound`] if the server answers `NO`.
    pub async fn select_folder(&mut self, name: &str, read_only: bool) -> Result<Mailbox, Error> {
        self.ensure_open()?;
        let verb = if read_only { "EXAMINE" } else { "SELECT" };
        let command = format!("{verb} {}", mailbox_argument(name)?);

        let result = self.send(&command).await;
        self.state = State::Connected;
        let response = result?;
        match response.status() {
            Status::Ok => {}
            Status::No => {
                return Err(Error::FolderNotFound {
                    folder: name.to_string(),
                    information: response.information().unwrap_or_default().to_string(),
                });
            }
            Status::Bad => return Err(command_failed(&command, &response)),
        }

        let mailbox = Mailbox::from_response(&response, read_only);
        info!(
            "selected {name} ({} messages, read-only: {})",
            mailbox.exists(),
            mailbox.read_only()
        );
        self.state = State::Selected {
            folder: name.to_string(),
            read_only,
        };

        Ok(mailbox)
    }

    /// UIDs matching `criteria` in the selected folder, in server order.
    /// `criteria.folder` is ignored here.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::Query`] before sending anything if the criteria
    /// are invalid, and with [`Error::NoFolderSelected`] without a selection.
    pub async fn query_uids(&mut self, criteria: &SearchCriteria) -> Result<Vec<Uid>, Error> {
        let query = criteria.build()?;
        self.ensure_selected()?;
        let command = format!("UID SEARCH {query}");
        let response = self.execute(&command).await?;

        let mut uids = Vec::new();
        for data in response.data() {
            let text = data.text();
            let unexpected = || Error::UnexpectedResponse {
                command: command.clone(),
                line: text.to_string(),
            };
            let raw = format!("* {text}\r\n");
            match imap_proto::parser::parse_response(raw.as_bytes()) {
                Ok((_, Response::MailboxData(MailboxDatum::Search(found)))) => {
                    for uid in found {
                        uids.push(Uid::try_from(uid).map_err(|_| unexpected())?);
                    }
                }
                _ if is_search(text) => return Err(unexpected()),
                _ => trace!("ignoring search data {text:?}"),
            }
        }
        debug!("{} messages match {query}", uids.len());

        Ok(uids)
    }

    /// Fetches and decodes one message without setting `\Seen`. Selects
    /// `folder` read-only first if given.
    ///
    /// If the session aborts during the FETCH, the folder is selected again
    /// and the FETCH retried exactly once.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::FetchFailed`] if the retry aborts as well.
    pub async fn fetch_by_uid(&mut self, uid: Uid, folder: Option<&str>) -> Result<EmailObject, Error> {
        if let Some(folder) = folder {
            self.select_folder(folder, true).await?;
        }
        let (folder, read_only) = self.ensure_selected()?;
        let command = format!("UID FETCH {uid} {}", self.dialect.fetch_items());

        let response = match self.send(&command).await {
            Ok(response) => response,
            Err(Error::Transport(TransportError::Aborted(reason))) => {
                warn!("FETCH of {uid} aborted ({reason}), selecting {folder} again and retrying once");
                self.select_folder(&folder, read_only)
                    .await
                    .map_err(fetch_failed(uid))?;
                self.send(&command).await.map_err(fetch_failed(uid))?
            }
            Err(e) => return Err(e),
        };
        if !response.is_ok() {
            return Err(command_failed(&command, &response));
        }

        self.decode_fetch(uid, &response)
    }

    fn decode_fetch(&self, uid: Uid, response: &CommandResponse) -> Result<EmailObject, Error> {
        let records: Vec<RawFetchRecord> = response
            .data()
            .iter()
            .filter_map(RawFetchRecord::from_response)
            .collect();
        if records.is_empty() {
            return Err(Error::MessageNotFound { uid });
        }
        // unsolicited FETCH responses carry flag updates, not bodies
        let record = records
            .into_iter()
            .find(|record| record.body().is_some())
            .ok_or(Error::MissingBody { uid })?;

        let meta = fetch::parse(record.header(), self.dialect)?;
        if meta.uid() != uid {
            warn!("requested message {uid}, server answered with {}", meta.uid());
        }
        let body = record.into_body().ok_or(Error::MissingBody { uid })?;

        EmailObject::parse(meta, &body).map_err(|source| Error::Mime { uid, source })
    }

    fn fetch_each(
        &mut self,
        uids: Vec<Uid>,
    ) -> impl Stream<Item = (Uid, Result<EmailObject, Error>)> {
        stream::unfold((self, uids.into_iter()), |(session, mut uids)| async move {
            let uid = uids.next()?;
            let email = session.fetch_by_uid(uid, None).await;
            Some(((uid, email), (session, uids)))
        })
    }

    /// Lazily fetches every message matching `criteria`, selecting
    /// `criteria.folder` read-only first if present.
    ///
    /// The UIDs are searched once up front. Each message is fetched only
    /// when the stream is polled, so the stream cannot be restarted and
    /// observes changes made to the mailbox meanwhile. Failures are per
    /// message and do not end the stream.
    ///
    /// # Errors
    ///
    /// Fails if the selection or the search fails.
    pub async fn fetch_list(
        &mut self,
        criteria: &SearchCriteria,
    ) -> Result<impl Stream<Item = (Uid, Result<EmailObject, Error>)>, Error> {
        self.messages(criteria, true).await
    }

    /// Like [`fetch_list`](Self::fetch_list), selecting `criteria.folder`
    /// with the given access mode.
    ///
    /// # Errors
    ///
    /// Fails if the selection or the search fails.
    pub async fn messages(
        &mut self,
        criteria: &SearchCriteria,
        read_only: bool,
    ) -> Result<impl Stream<Item = (Uid, Result<EmailObject, Error>)>, Error> {
        if let Some(folder) = criteria.selected_folder() {
            self.select_folder(folder, read_only).await?;
        }
        let uids = self.query_uids(criteria).await?;

        Ok(self.fetch_each(uids))
    }

    /// Adds `\Seen` to `uid`. Setting it again is harmless.
    ///
    /// # Errors
    ///
    /// Fails if no folder is selected or the server refuses, e.g. because
    /// the folder was selected read-only.
    pub async fn mark_seen(&mut self, uid: Uid) -> Result<(), Error> {
        self.ensure_selected()?;
        self.execute(&format!("UID STORE {uid} +FLAGS ({})", Flag::Seen))
            .await?;
        Ok(())
    }

    /// Flags `uid` as `\Deleted` and expunges.
    ///
    /// `EXPUNGE` acts on the whole selected folder: every message flagged
    /// `\Deleted` by anyone is removed, not only `uid`.
    ///
    /// # Errors
    ///
    /// Fails if no folder is selected or the server refuses either command.
    pub async fn delete(&mut self, uid: Uid) -> Result<(), Error> {
        self.ensure_selected()?;
        self.execute(&format!("UID STORE {uid} +FLAGS ({})", Flag::Deleted))
            .await?;
        self.execute("EXPUNGE").await?;
        info!("deleted message {uid}");
        Ok(())
    }

    /// Copies `uid` to `destination`. Returns whether the server acknowledged it.
    ///
    /// # Errors
    ///
    /// Fails if no folder is selected or the session aborts.
    pub async fn copy(&mut self, uid: Uid, destination: &str) -> Result<bool, Error> {
        self.ensure_selected()?;
        let command = format!("UID COPY {uid} {}", mailbox_argument(destination)?);
        let response = self.send(&command).await?;
        if !response.is_ok() {
            warn!(
                "copying {uid} to {destination} refused: {}",
                response.information().unwrap_or_default()
            );
        }
        Ok(response.is_ok())
    }

    /// Copies `uid` to `destination`, then deletes it here. Returns `false`
    /// if the copy was refused, in which case nothing is deleted.
    ///
    /// Not atomic. If the session breaks between copy and delete, the
    /// message exists in both folders.
    ///
    /// # Errors
    ///
    /// Same as [`copy`](Self::copy) and [`delete`](Self::delete).
    pub async fn move_message(&mut self, uid: Uid, destination: &str) -> Result<bool, Error> {
        if !self.copy(uid, destination).await? {
            return Ok(false);
        }
        self.delete(uid).await?;
        Ok(true)
    }

    /// Selectable folders in server order, without the vendor folders
    /// hidden by the session options.
    ///
    /// # Errors
    ///
    /// Fails if `LIST` fails.
    pub async fn folders(&mut self) -> Result<Vec<Folder>, Error> {
        let response = self.execute(r#"LIST "" "*""#).await?;
        Ok(folders::filter(
            folders::parse_folders(response.data()),
            self.filter,
        ))
    }

    /// Closes the selected folder and logs out. Calling it again does nothing.
    ///
    /// # Errors
    ///
    /// Fails if `LOGOUT` fails for another reason than a dropped connection.
    /// The session counts as logged out in any case.
    pub async fn logout(&mut self) -> Result<(), Error> {
        if self.is_logged_out() {
            return Ok(());
        }
        if self.selected_folder().is_some() {
            if let Err(e) = self.execute("CLOSE").await {
                warn!("closing folder before logout failed: {e}");
            }
            self.state = State::Connected;
        }

        let result = self.send("LOGOUT").await;
        self.state = State::LoggedOut;
        match result {
            Ok(_) | Err(Error::Transport(TransportError::Aborted(_))) => {
                info!("logged out {}", self.username);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}
