use std::path::PathBuf;

use thiserror::Error;

/// Exit code for rejected command-line options. Matches clap's own parse errors.
pub const EXIT_USAGE: i32 = 2;
/// Exit code for failures detected after probing but before transcoding.
pub const EXIT_CONFIG: i32 = 1;
/// Exit code when the engine binary could not be located or started.
pub const EXIT_NOT_FOUND: i32 = 127;

#[derive(Error, Debug)]
pub enum Error {
    #[error("{message}")]
    Usage { message: String },
    #[error(
        "Target size of {target_size_mb} MB is too small: {duration_secs:.2} s at {audio_kbps} kbps of audio leaves {video_kbps:.2} kbps for video"
    )]
    TargetTooSmall {
        target_size_mb: f64,
        duration_secs: f64,
        audio_kbps: u32,
        video_kbps: f64,
    },
    #[error("'{program}' not found in system PATH. Searched paths: {searched_paths:?}")]
    ExecutableNotFound {
        program: &'static str,
        searched_paths: Vec<PathBuf>,
    },
    #[error("Failed to spawn '{}': {source}", .program.display())]
    ProcessSpawnFailed {
        program: PathBuf,
        source: std::io::Error,
    },
    #[error("'{}' exited with code {code}", .program.display())]
    EngineFailed { program: PathBuf, code: i32 },
    #[error("Could not read the duration of '{}': {reason}", .input.display())]
    Probe { input: PathBuf, reason: String },
}

impl Error {
    pub(crate) fn usage(message: impl Into<String>) -> Self {
        Error::Usage {
            message: message.into(),
        }
    }

    /// The process exit code this error maps to.
    ///
    /// Engine failures forward the child's own code unchanged.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Usage { .. } => EXIT_USAGE,
            Error::TargetTooSmall { .. } | Error::Probe { .. } => EXIT_CONFIG,
            Error::ExecutableNotFound { .. } | Error::ProcessSpawnFailed { .. } => EXIT_NOT_FOUND,
            Error::EngineFailed { code, .. } => *code,
        }
    }
}
