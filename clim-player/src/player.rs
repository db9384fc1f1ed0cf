//! Frame-paced playback.
//!
//! The player keeps a FIFO buffer of decoded frames and tops it up a
//! cluster at a time while rendering, so cluster decoding cost is spread
//! across the playback instead of stalling single frames.

use std::collections::VecDeque;
use std::io::Write;
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clim_core::decoder::ClimDecoder;
use clim_core::frame::Frame;

use crate::audio::AudioPlayer;
use crate::render;

/// Plays one CLIM file to a terminal-like output.
pub struct ClimPlayer {
    decoder:          ClimDecoder,
    audio:            AudioPlayer,
    frame_buffer:     VecDeque<Frame>,
    frame_time:       Duration,
    buffer_threshold: usize,
}

impl ClimPlayer {
    /// Opens `clim_path` and prepares playback, extracting the audio track
    /// into `audio_folder`.
    pub fn new(clim_path: &Path, audio_folder: &Path) -> Result<Self> {
        let decoder = ClimDecoder::new(clim_path, audio_folder)
            .with_context(|| format!("cannot open {}", clim_path.display()))?;
        let info = decoder.info();
        let frame_ms = u64::from(info.milliseconds_between_frames).max(1);
        // refill once fewer than two seconds of frames remain buffered
        let buffer_threshold = (2000 / frame_ms).max(1) as usize;
        let audio = AudioPlayer::new(decoder.audio_sidecar_path());
        tracing::info!(
            width = info.width,
            height = info.height,
            frames = decoder.total_frames(),
            fps = info.fps(),
            "starting playback"
        );
        Ok(Self {
            decoder,
            audio,
            frame_buffer: VecDeque::new(),
            frame_time: Duration::from_millis(frame_ms),
            buffer_threshold,
        })
    }

    /// Pulls the next cluster into the frame buffer. Returns `false` once
    /// the file is exhausted.
    fn fetch_next_frames(&mut self) -> Result<bool> {
        match self.decoder.next_cluster_frames().context("decoding failed")? {
            Some(frames) => {
                self.frame_buffer.extend(frames);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn play_once(&mut self, out: &mut dyn Write) -> Result<()> {
        let mut all_read = false;
        while !all_read && self.frame_buffer.len() <= 2 * self.buffer_threshold {
            all_read = !self.fetch_next_frames()?;
        }

        if let Err(err) = self.audio.start() {
            tracing::warn!(%err, "audio unavailable, playing video only");
        }

        let mut next_frame_due = Instant::now();
        while let Some(frame) = self.frame_buffer.pop_front() {
            out.write_all(render::CURSOR_HOME.as_bytes())?;
            out.write_all(render::render_frame(&frame).as_bytes())?;
            out.flush()?;

            // pace against the target instant, not the render duration
            next_frame_due += self.frame_time;
            let now = Instant::now();
            if next_frame_due > now {
                thread::sleep(next_frame_due - now);
            }

            if !all_read && self.frame_buffer.len() <= self.buffer_threshold {
                all_read = !self.fetch_next_frames()?;
            }
        }
        self.audio.stop();
        Ok(())
    }

    /// Plays the file to `out`, optionally restarting from the first frame
    /// each time the end is reached.
    pub fn play(&mut self, out: &mut dyn Write, loop_playback: bool) -> Result<()> {
        self.play_once(out)?;
        while loop_playback {
            self.decoder.seek_to_frame(0).context("rewind failed")?;
            self.play_once(out)?;
        }
        Ok(())
    }
}
