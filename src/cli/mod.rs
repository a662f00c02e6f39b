mod print;

use anyhow::{Result, bail};
use clap::Subcommand;
use futures::StreamExt as _;
use imapbox::{
    MailboxSession, SearchCriteria, Uid,
    imap::connection::SendCommand,
};
use log::warn;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List selectable folders
    Folders,
    /// Print UIDs of messages matching key=value criteria
    Search {
        #[arg(short, long, default_value = "INBOX")]
        folder: String,
        #[arg(value_parser = parse_pair)]
        criteria: Vec<(String, String)>,
    },
    /// Print one message
    Fetch {
        #[arg(short, long, default_value = "INBOX")]
        folder: String,
        uid: Uid,
    },
    /// Print a summary line for every message matching key=value criteria
    Messages {
        #[arg(short, long, default_value = "INBOX")]
        folder: String,
        /// Select with SELECT instead of EXAMINE
        #[arg(long)]
        read_write: bool,
        #[arg(value_parser = parse_pair)]
        criteria: Vec<(String, String)>,
    },
    MarkSeen {
        #[arg(short, long, default_value = "INBOX")]
        folder: String,
        uid: Uid,
    },
    /// Delete a message. Expunges every message flagged \Deleted in the folder
    Delete {
        #[arg(short, long, default_value = "INBOX")]
        folder: String,
        uid: Uid,
    },
    Copy {
        #[arg(short, long, default_value = "INBOX")]
        folder: String,
        uid: Uid,
        destination: String,
    },
    /// Copy, then delete. A message can end up in both folders if interrupted
    Move {
        #[arg(short, long, default_value = "INBOX")]
        folder: String,
        uid: Uid,
        destination: String,
    },
}

fn parse_pair(pair: &str) -> Result<(String, String), String> {
    pair.split_once('=')
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .ok_or_else(|| format!("expected key=value, got {pair:?}"))
}

pub async fn run<T: SendCommand>(command: Command, session: &mut MailboxSession<T>) -> Result<()> {
    match command {
        Command::Folders => {
            for folder in session.folders().await? {
                println!("{}", folder.name());
            }
        }
        Command::Search { folder, criteria } => {
            let criteria = SearchCriteria::from_pairs(criteria)?;
            session.select_folder(&folder, true).await?;
            for uid in session.query_uids(&criteria).await? {
                println!("{uid}");
            }
        }
        Command::Fetch { folder, uid } => {
            let email = session.fetch_by_uid(uid, Some(&folder)).await?;
            print::email(&email);
        }
        Command::Messages {
            folder,
            read_write,
            criteria,
        } => {
            let criteria = SearchCriteria::from_pairs(criteria)?.folder(folder);
            let messages = session.messages(&criteria, !read_write).await?;
            let mut messages = std::pin::pin!(messages);
            while let Some((uid, email)) = messages.next().await {
                match email {
                    Ok(email) => print::summary(&email),
                    Err(e) => warn!("skipping message {uid}: {e}"),
                }
            }
        }
        Command::MarkSeen { folder, uid } => {
            session.select_folder(&folder, false).await?;
            session.mark_seen(uid).await?;
        }
        Command::Delete { folder, uid } => {
            session.select_folder(&folder, false).await?;
            session.delete(uid).await?;
        }
        Command::Copy {
            folder,
            uid,
            destination,
        } => {
            session.select_folder(&folder, true).await?;
            if !session.copy(uid, &destination).await? {
                bail!("server refused to copy {uid} to {destination}");
            }
        }
        Command::Move {
            folder,
            uid,
            destination,
        } => {
            session.select_folder(&folder, false).await?;
            if !session.move_message(uid, &destination).await? {
                bail!("server refused to copy {uid} to {destination}, nothing deleted");
            }
        }
    }

    Ok(())
}
