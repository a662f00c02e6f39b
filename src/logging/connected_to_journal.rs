// Adapted from systemd-journal-logger (MIT), see
// https://github.com/swsnr/systemd-journal-logger.rs/blob/v2.2.1/src/lib.rs#L76

use std::{fmt::Display, os::fd::AsFd as _};

/// Whether stderr is the stream systemd announced in `$JOURNAL_STREAM`
/// (see `systemd.exec(5)`).
pub fn connected_to_journal() -> bool {
    let Some(journal_stream) = std::env::var_os("JOURNAL_STREAM") else {
        return false;
    };
    rustix::fs::fstat(std::io::stderr().as_fd()).is_ok_and(|stat| {
        is_same_stream(&journal_stream.to_string_lossy(), stat.st_dev, stat.st_ino)
    })
}

/// `journal_stream` has the form `<device>:<inode>`.
fn is_same_stream(journal_stream: &str, device: impl Display, inode: impl Display) -> bool {
    journal_stream
        .split_once(':')
        .is_some_and(|(dev, ino)| dev == device.to_string() && ino == inode.to_string())
}
