//! Audio cue playback.
//!
//! Cues are played by an external player process (`aplay` by default). The
//! request never waits for playback: the child is reaped on a detached
//! thread. Repeats are limited by a cooldown gate shared by every caller.

use anyhow::{Context, Result};
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

pub const DEFAULT_PLAYER: &str = "aplay";
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(3);

/// Starts playback of an audio file.
pub trait AudioPlayer: Send + Sync {
    /// Issue a play request. Must return without waiting for playback.
    fn play(&self, path: &Path) -> Result<()>;
}

/// Plays files by spawning an external player with the file as its only argument.
#[derive(Clone, Debug)]
pub struct CommandPlayer {
    program: String,
}

impl CommandPlayer {
    pub fn new<S: Into<String>>(program: S) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

impl Default for CommandPlayer {
    fn default() -> Self {
        Self::new(DEFAULT_PLAYER)
    }
}

impl AudioPlayer for CommandPlayer {
    fn play(&self, path: &Path) -> Result<()> {
        let child = Command::new(&self.program)
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .with_context(|| format!("failed to launch {} for {}", self.program, path.display()))?;

        let program = self.program.clone();
        let reaper = std::thread::Builder::new()
            .name("audio-reaper".to_string())
            .spawn(move || reap(&program, child));
        // The player is already running; a missing reaper only leaves a zombie.
        if let Err(e) = reaper {
            log::warn!("failed to spawn audio reaper thread: {}", e);
        }
        Ok(())
    }
}

fn reap(program: &str, mut child: Child) {
    match child.wait() {
        Ok(status) if !status.success() => {
            log::debug!("{} exited with {}", program, status);
        }
        Ok(_) => {}
        Err(e) => log::debug!("failed to wait for {}: {}", program, e),
    }
}

/// Admits at most one event per cooldown window.
///
/// The check and the timestamp update happen under one lock, so concurrent
/// callers cannot both pass within the same window.
pub struct CooldownGate {
    cooldown: Duration,
    last_fire: Mutex<Option<Instant>>,
}

impl CooldownGate {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last_fire: Mutex::new(None),
        }
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// Returns true and records `now` when at least `cooldown` has elapsed
    /// since the last admitted event (or none has been admitted yet).
    pub fn try_acquire(&self, now: Instant) -> bool {
        let mut last_fire = self
            .last_fire
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let due = match *last_fire {
            None => true,
            Some(prev) => now.saturating_duration_since(prev) >= self.cooldown,
        };
        if due {
            *last_fire = Some(now);
        }
        due
    }

    pub fn last_fire(&self) -> Option<Instant> {
        *self
            .last_fire
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Rate-limited cue playback.
pub struct AudioNotifier {
    player: Box<dyn AudioPlayer>,
    gate: CooldownGate,
}

impl AudioNotifier {
    pub fn new<P: AudioPlayer + 'static>(player: P, cooldown: Duration) -> Self {
        Self {
            player: Box::new(player),
            gate: CooldownGate::new(cooldown),
        }
    }

    /// Request playback without consulting the cooldown. Launch failures are
    /// logged and swallowed.
    pub fn notify(&self, path: &Path) {
        if let Err(e) = self.player.play(path) {
            log::warn!("audio cue not played: {:#}", e);
        }
    }

    /// Play `path` if the cooldown has elapsed. Returns whether a play
    /// request was issued.
    ///
    /// The cooldown restarts when the request is issued, even if the player
    /// fails to launch.
    pub fn notify_if_due(&self, path: &Path, now: Instant) -> bool {
        if !self.gate.try_acquire(now) {
            return false;
        }
        log::debug!("playing cue {}", path.display());
        self.notify(path);
        true
    }

    pub fn gate(&self) -> &CooldownGate {
        &self.gate
    }
}
