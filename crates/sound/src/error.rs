use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum SoundError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("no .wav files in {}", .0.display())]
    NoSounds(PathBuf),
}
