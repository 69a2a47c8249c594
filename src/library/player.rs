// src/library/player.rs
use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use thiserror::Error;
use tracing::{info, warn};

#[cfg(target_os = "windows")]
const WINDOWS_VLC_PATHS: [&str; 2] = [
    r"C:\Program Files\VideoLAN\VLC\vlc.exe",
    r"C:\Program Files (x86)\VideoLAN\VLC\vlc.exe",
];

#[derive(Debug, Error)]
pub enum PlayerError {
    #[error("media file {} does not exist", .0.display())]
    MissingFile(PathBuf),
    #[error("player `{}` not found; install VLC or set player_cmd", .0.to_string_lossy())]
    NotFound(OsString),
    #[error("failed to start player: {0}")]
    Spawn(#[source] std::io::Error),
}

pub trait MediaPlayer: Send + Sync {
    /// Start playback and return immediately; the child is not awaited.
    fn launch(&self, media: &Path) -> Result<(), PlayerError>;
}

/// Launches a configured command, or VLC found in the usual places.
#[derive(Clone, Debug)]
pub struct ExternalPlayer {
    command: OsString,
}

impl ExternalPlayer {
    pub fn new(configured: Option<&str>) -> Self {
        let command = configured
            .map(|c| c.trim())
            .filter(|c| !c.is_empty())
            .map(OsString::from)
            .unwrap_or_else(discover_vlc);
        Self { command }
    }

    pub fn command(&self) -> &OsString {
        &self.command
    }
}

#[cfg(target_os = "windows")]
fn discover_vlc() -> OsString {
    WINDOWS_VLC_PATHS
        .iter()
        .map(Path::new)
        .find(|p| p.exists())
        .map(|p| p.as_os_str().to_owned())
        .unwrap_or_else(|| OsString::from("vlc.exe"))
}

#[cfg(not(target_os = "windows"))]
fn discover_vlc() -> OsString {
    OsString::from("vlc")
}

impl MediaPlayer for ExternalPlayer {
    fn launch(&self, media: &Path) -> Result<(), PlayerError> {
        if !media.is_file() {
            return Err(PlayerError::MissingFile(media.to_path_buf()));
        }

        match Command::new(&self.command)
            .arg(media)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
        {
            Ok(child) => {
                info!(
                    "Launched {:?} (pid {}) for {}",
                    self.command,
                    child.id(),
                    media.display()
                );
                Ok(())
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {
                warn!("Player {:?} not found", self.command);
                Err(PlayerError::NotFound(self.command.clone()))
            }
            Err(err) => {
                warn!("Failed to run player {:?}: {err}", self.command);
                Err(PlayerError::Spawn(err))
            }
        }
    }
}
