//! Finding the game log and the player behind it.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use crate::error::GameLogError;
use crate::matcher::{LOGIN_MARKER, parse_login_handle};

/// File name the game client logs to.
pub const GAME_LOG_NAME: &str = "Game.log";

/// Looks for the game log in `dir`, then in its parent.
///
/// The client executable lives one level below the log.
pub fn find_game_log(dir: &Path) -> Option<PathBuf> {
    std::iter::once(dir)
        .chain(dir.parent())
        .map(|d| d.join(GAME_LOG_NAME))
        .find(|p| p.is_file())
}

/// Scans an existing log for the login line and returns the player handle.
///
/// `Ok(None)` means the player has not logged in yet.
pub fn find_player_handle(path: &Path) -> Result<Option<String>, GameLogError> {
    let file = File::open(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => GameLogError::NotFound(path.to_path_buf()),
        _ => GameLogError::Io(e),
    })?;
    let mut reader = BufReader::new(file);
    let mut buf = Vec::new();

    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            return Ok(None);
        }
        let line = String::from_utf8_lossy(&buf);
        if !line.contains(LOGIN_MARKER) {
            continue;
        }
        match parse_login_handle(&line) {
            Ok(handle) => return Ok(Some(handle.to_string())),
            Err(e) => tracing::debug!(error = %e, "login line without handle"),
        }
    }
}
