//! External audio playback.
//!
//! The audio track is handed to an `ffplay` child process; the player only
//! needs start and stop. The handle is uniquely owned: stopping kills and
//! reaps the child, and dropping the player stops it.

use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};

use anyhow::{Context, Result};

/// Controller for the audio subprocess.
pub struct AudioPlayer {
    audio_path: PathBuf,
    child:      Option<Child>,
}

impl AudioPlayer {
    /// Constructs a player for the given audio file. No process is spawned
    /// until [`start`] is called.
    ///
    /// [`start`]: #method.start
    pub fn new<P: AsRef<Path>>(audio_path: P) -> Self {
        Self { audio_path: audio_path.as_ref().to_path_buf(), child: None }
    }

    /// Starts playback from the beginning, replacing any earlier run.
    pub fn start(&mut self) -> Result<()> {
        self.stop();
        let child = Command::new("ffplay")
            .args(["-nodisp", "-loglevel", "quiet", "-autoexit"])
            .arg(&self.audio_path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .context("cannot spawn ffplay (is it installed?)")?;
        self.child = Some(child);
        Ok(())
    }

    /// Stops playback if a process is running.
    pub fn stop(&mut self) {
        if let Some(mut child) = self.child.take() {
            if let Err(err) = child.kill() {
                tracing::warn!(%err, "could not stop the audio process");
            }
            let _ = child.wait();
        }
    }
}

impl Drop for AudioPlayer {
    fn drop(&mut self) {
        self.stop();
    }
}
