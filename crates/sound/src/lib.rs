//! Kill sounds.
//!
//! A [`SoundBoard`] picks a random `.wav` from a directory for each kill and
//! plays it on a background thread. Real output needs the `playback`
//! feature.

mod board;
mod error;
mod player;
mod sync;

pub use board::{SoundBoard, Volume, list_sounds};
pub use error::SoundError;
pub use sync::sync_bundled_sounds;
