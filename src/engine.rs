use std::env;
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::error::Error;
use crate::probe::{parse_duration, probe_args};

#[cfg(windows)]
const FFMPEG_NAME: &str = "ffmpeg.exe";
#[cfg(not(windows))]
const FFMPEG_NAME: &str = "ffmpeg";
#[cfg(windows)]
const FFPROBE_NAME: &str = "ffprobe.exe";
#[cfg(not(windows))]
const FFPROBE_NAME: &str = "ffprobe";

/// The external programs a run talks to.
///
/// Both calls block the run until the child exits. A child that exits
/// non-zero is reported as [`Error::EngineFailed`] with its exit code.
#[async_trait]
pub trait Engine {
    /// Returns the duration of `input` in seconds.
    async fn probe_duration(&self, input: &Path) -> Result<f64, Error>;

    /// Runs one transcode pass with the given arguments.
    async fn transcode(&self, args: &[OsString]) -> Result<(), Error>;
}

/// Searches the given PATH string for `name`.
fn find_executable_in_path(name: &'static str, path_env: &OsStr) -> Result<PathBuf, Error> {
    let paths = env::split_paths(path_env).collect::<Vec<_>>();
    for path in &paths {
        let executable_path = path.join(name);
        if executable_path.is_file() {
            return Ok(executable_path);
        }
    }

    Err(Error::ExecutableNotFound {
        program: name,
        searched_paths: paths,
    })
}

/// Maps a child's exit status to the code this process should exit with.
///
/// Children killed by a signal report `128 + signal`, as shells do.
pub fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    1
}

fn check_status(program: &Path, status: ExitStatus) -> Result<(), Error> {
    if status.success() {
        Ok(())
    } else {
        Err(Error::EngineFailed {
            program: program.to_path_buf(),
            code: exit_code(status),
        })
    }
}

/// Renders a command line for logging. Non-UTF-8 bytes are shown lossily.
fn command_line(program: &Path, args: &[OsString]) -> String {
    let mut line = program.display().to_string();
    for arg in args {
        line.push(' ');
        line.push_str(&arg.to_string_lossy());
    }
    line
}

/// The ffmpeg/ffprobe pair installed on this machine.
///
/// `ffprobe` is only needed in target size mode, so it is looked up on first
/// use rather than when the engine is created.
#[derive(Debug, Clone)]
pub struct Ffmpeg {
    ffmpeg_path: PathBuf,
    ffprobe_path: Option<PathBuf>,
    search_path: OsString,
}

impl Ffmpeg {
    /// Discovers `ffmpeg` in the system PATH.
    pub fn new() -> Result<Self, Error> {
        Self::with_overrides(None, None)
    }

    /// Uses the given executables, falling back to PATH discovery for any
    /// that is `None`.
    pub fn with_overrides(
        ffmpeg_path: Option<PathBuf>,
        ffprobe_path: Option<PathBuf>,
    ) -> Result<Self, Error> {
        let path_var = env::var_os("PATH").unwrap_or_default();
        Self::with_search_path(ffmpeg_path, ffprobe_path, path_var)
    }

    /// Like [`Ffmpeg::with_overrides`], searching `search_path` (a PATH-style
    /// list) instead of the environment.
    pub fn with_search_path(
        ffmpeg_path: Option<PathBuf>,
        ffprobe_path: Option<PathBuf>,
        search_path: impl Into<OsString>,
    ) -> Result<Self, Error> {
        let search_path = search_path.into();
        let ffmpeg_path = match ffmpeg_path {
            Some(p) => p,
            None => find_executable_in_path(FFMPEG_NAME, &search_path)?,
        };
        Ok(Self {
            ffmpeg_path,
            ffprobe_path,
            search_path,
        })
    }

    pub fn ffmpeg_path(&self) -> &Path {
        &self.ffmpeg_path
    }

    /// The ffprobe executable, located now if it was not given explicitly.
    pub fn ffprobe_path(&self) -> Result<PathBuf, Error> {
        match &self.ffprobe_path {
            Some(p) => Ok(p.clone()),
            None => find_executable_in_path(FFPROBE_NAME, &self.search_path),
        }
    }
}

#[async_trait]
impl Engine for Ffmpeg {
    async fn probe_duration(&self, input: &Path) -> Result<f64, Error> {
        let ffprobe_path = self.ffprobe_path()?;
        let args = probe_args(input);
        debug!("Running: {}", command_line(&ffprobe_path, &args));

        // stderr is inherited so ffprobe's own complaints reach the user.
        let output = Command::new(&ffprobe_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .output()
            .await
            .map_err(|e| Error::ProcessSpawnFailed {
                program: ffprobe_path.clone(),
                source: e,
            })?;

        check_status(&ffprobe_path, output.status)?;
        parse_duration(input, &output.stdout)
    }

    async fn transcode(&self, args: &[OsString]) -> Result<(), Error> {
        debug!("Running: {}", command_line(&self.ffmpeg_path, args));

        let status = Command::new(&self.ffmpeg_path)
            .args(args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await
            .map_err(|e| Error::ProcessSpawnFailed {
                program: self.ffmpeg_path.clone(),
                source: e,
            })?;

        check_status(&self.ffmpeg_path, status)
    }
}
