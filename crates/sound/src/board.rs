//! Random kill sound selection.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use killtrack_game_log::SoundCue;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::SoundError;
use crate::player::{PlayRequest, Player};

/// Playback volume.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Volume {
    /// 0.0 to 1.0.
    pub level: f32,
    pub muted: bool,
}

impl Default for Volume {
    fn default() -> Self {
        Self {
            level: 0.5,
            muted: false,
        }
    }
}

impl Volume {
    /// Level actually applied to the output.
    pub fn effective(&self) -> f32 {
        if self.muted {
            0.0
        } else {
            self.level.clamp(0.0, 1.0)
        }
    }
}

pub(crate) fn is_wav(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("wav"))
}

/// All `.wav` files under `dir`, recursively, sorted.
pub fn list_sounds(dir: &Path) -> Result<Vec<PathBuf>, SoundError> {
    let mut found = Vec::new();
    let mut pending = vec![dir.to_path_buf()];
    while let Some(current) = pending.pop() {
        for entry in std::fs::read_dir(&current)? {
            let path = entry?.path();
            if path.is_dir() {
                pending.push(path);
            } else if is_wav(&path) {
                found.push(path);
            }
        }
    }
    found.sort();
    Ok(found)
}

/// Plays a random sound from a directory on each kill.
pub struct SoundBoard {
    dir: PathBuf,
    volume: Mutex<Volume>,
    player: Player,
}

impl SoundBoard {
    pub fn new(dir: impl Into<PathBuf>, volume: Volume) -> Self {
        Self {
            dir: dir.into(),
            volume: Mutex::new(volume),
            player: Player::spawn(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn volume(&self) -> Volume {
        *self.volume.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_volume(&self, volume: Volume) {
        *self.volume.lock().unwrap_or_else(PoisonError::into_inner) = volume;
    }

    /// Picks one sound at random.
    pub fn pick(&self) -> Result<PathBuf, SoundError> {
        pick_sound(&self.dir)
    }

    /// What a kill should play now, if anything. The directory is only
    /// read on the playback thread.
    fn next_request(&self) -> Option<PlayRequest> {
        let volume = self.volume();
        if volume.muted {
            debug!("kill sound muted");
            return None;
        }
        Some(PlayRequest {
            dir: self.dir.clone(),
            volume: volume.effective(),
        })
    }
}

/// A random `.wav` under `dir`.
pub(crate) fn pick_sound(dir: &Path) -> Result<PathBuf, SoundError> {
    let sounds = list_sounds(dir)?;
    sounds
        .choose(&mut rand::thread_rng())
        .cloned()
        .ok_or_else(|| SoundError::NoSounds(dir.to_path_buf()))
}

impl SoundCue for SoundBoard {
    fn play_random_sound(&self) {
        if let Some(req) = self.next_request() {
            self.player.play(req);
        }
    }
}
