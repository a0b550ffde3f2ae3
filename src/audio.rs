use std::path::PathBuf;
use std::process::{Child, Command, Stdio};

use serde::{Deserialize, Serialize};

use crate::category::SPIN_MUSIC;
use crate::error::{Error, Result};

/// Plays the spin music and the category cues
pub trait CuePlayer {
    /// Start playing `file`, replacing whatever is playing now
    fn play(&mut self, file: &str) -> Result<()>;

    /// Stop playback, if any
    fn stop(&mut self);
}

impl<P: CuePlayer + ?Sized> CuePlayer for Box<P> {
    fn play(&mut self, file: &str) -> Result<()> {
        (**self).play(file)
    }

    fn stop(&mut self) {
        (**self).stop()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub enabled: bool,
    /// Player command line; the file path is appended as the last argument
    pub player: Vec<String>,
    /// Track played while the wheel spins
    pub music: String,
    /// Directory holding the music and cue files
    pub cue_dir: PathBuf,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            player: vec!["mpg123".to_string(), "-q".to_string()],
            music: SPIN_MUSIC.to_string(),
            cue_dir: PathBuf::from("."),
        }
    }
}

/// Runs an external player process per file
pub struct ProcessCuePlayer {
    program: String,
    args: Vec<String>,
    cue_dir: PathBuf,
    child: Option<Child>,
}

impl ProcessCuePlayer {
    pub fn new(config: &AudioConfig) -> Result<Self> {
        let (program, args) = config
            .player
            .split_first()
            .ok_or_else(|| Error::Hardware("audio player command is empty".to_string()))?;
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
            cue_dir: config.cue_dir.clone(),
            child: None,
        })
    }

    pub fn is_playing(&mut self) -> bool {
        match self.child.as_mut().map(|child| child.try_wait()) {
            Some(Ok(None)) => true,
            _ => false,
        }
    }
}

impl CuePlayer for ProcessCuePlayer {
    fn play(&mut self, file: &str) -> Result<()> {
        self.stop();

        let path = self.cue_dir.join(file);
        let child = Command::new(&self.program)
            .args(&self.args)
            .arg(&path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .spawn()
            .map_err(|e| Error::Hardware(format!("failed to start {}: {}", self.program, e)))?;

        tracing::debug!(file = %path.display(), pid = child.id(), "playing");
        self.child = Some(child);
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(mut child) = self.child.take() {
            if let Err(e) = child.kill() {
                tracing::debug!("player already exited: {}", e);
            }
            let _ = child.wait();
        }
    }
}

impl Drop for ProcessCuePlayer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Logs cues instead of playing them (`--no-audio`)
#[derive(Debug, Default)]
pub struct SilentCuePlayer;

impl CuePlayer for SilentCuePlayer {
    fn play(&mut self, file: &str) -> Result<()> {
        tracing::info!(file, "cue (audio disabled)");
        Ok(())
    }

    fn stop(&mut self) {}
}
