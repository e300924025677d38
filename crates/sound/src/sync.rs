use std::path::Path;

use tracing::{debug, info};

use crate::board::list_sounds;
use crate::error::SoundError;

/// Copies bundled `.wav` files into the user's sound directory, leaving
/// files already there untouched. Returns how many were copied.
pub fn sync_bundled_sounds(source: &Path, target: &Path) -> Result<usize, SoundError> {
    if !source.is_dir() {
        debug!(source = %source.display(), "no bundled sounds");
        return Ok(0);
    }
    std::fs::create_dir_all(target)?;

    let mut copied = 0;
    for path in list_sounds(source)? {
        let Some(name) = path.file_name() else {
            continue;
        };
        let dest = target.join(name);
        if dest.exists() {
            continue;
        }
        std::fs::copy(&path, &dest)?;
        copied += 1;
    }
    if copied > 0 {
        info!(copied, target = %target.display(), "installed bundled kill sounds");
    }
    Ok(copied)
}
