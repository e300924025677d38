//! Background playback thread.

use std::path::PathBuf;
use std::sync::mpsc::{self, Sender};
use std::thread;

use tracing::warn;

use crate::board::pick_sound;

/// Play a random sound from `dir`.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct PlayRequest {
    pub dir: PathBuf,
    pub volume: f32,
}

fn choose(req: &PlayRequest) -> Option<PathBuf> {
    match pick_sound(&req.dir) {
        Ok(path) => Some(path),
        Err(e) => {
            warn!(error = %e, "no kill sound to play");
            None
        }
    }
}

/// Hands files to a dedicated audio thread so callers never wait on the
/// output device.
#[derive(Debug, Clone)]
pub(crate) struct Player {
    tx: Sender<PlayRequest>,
}

impl Player {
    pub fn spawn() -> Self {
        let (tx, rx) = mpsc::channel::<PlayRequest>();
        let spawned = thread::Builder::new()
            .name("killtrack-sound".into())
            .spawn(move || playback_loop(rx));
        if let Err(e) = spawned {
            warn!(error = %e, "failed to start sound thread; kill sounds disabled");
        }
        Self { tx }
    }

    pub fn play(&self, req: PlayRequest) {
        if self.tx.send(req).is_err() {
            warn!("sound thread not running");
        }
    }
}

#[cfg(feature = "playback")]
fn playback_loop(rx: mpsc::Receiver<PlayRequest>) {
    use std::fs::File;
    use std::io::BufReader;

    use rodio::{Decoder, OutputStream, Sink};
    use tracing::debug;

    let mut output = OutputStream::try_default().ok();
    if output.is_none() {
        warn!("audio output unavailable; kill sounds disabled until a device appears");
    }
    let mut active: Vec<Sink> = Vec::new();

    while let Ok(req) = rx.recv() {
        active.retain(|sink| !sink.empty());

        if output.is_none() {
            output = OutputStream::try_default().ok();
        }
        let Some((_, handle)) = output.as_ref() else {
            continue;
        };
        let Some(path) = choose(&req) else {
            continue;
        };

        let file = match File::open(&path) {
            Ok(file) => file,
            Err(err) => {
                debug!(?err, path = %path.display(), "failed opening sound file");
                continue;
            }
        };
        let decoder = match Decoder::new(BufReader::new(file)) {
            Ok(decoder) => decoder,
            Err(err) => {
                debug!(?err, path = %path.display(), "failed decoding sound file");
                continue;
            }
        };

        match Sink::try_new(handle) {
            Ok(sink) => {
                sink.set_volume(req.volume.clamp(0.0, 1.0));
                sink.append(decoder);
                active.push(sink);
            }
            Err(err) => {
                warn!(?err, "failed to create audio sink");
                output = None;
            }
        }
    }
}

#[cfg(not(feature = "playback"))]
fn playback_loop(rx: mpsc::Receiver<PlayRequest>) {
    while let Ok(req) = rx.recv() {
        let Some(path) = choose(&req) else {
            continue;
        };
        tracing::info!(
            path = %path.display(),
            volume = req.volume,
            "kill sound (built without audio output)"
        );
    }
}
