use std::ffi::OsString;
use std::path::Path;

use serde::Deserialize;

use crate::error::Error;

/// The part of `ffprobe -print_format json -show_format` output we read.
#[derive(Debug, Deserialize)]
pub struct ProbeReport {
    pub format: FormatReport,
}

/// Container-level information reported by ffprobe.
#[derive(Debug, Deserialize)]
pub struct FormatReport {
    /// Duration in seconds, printed by ffprobe as a decimal string.
    pub duration: Option<String>,
}

/// Arguments that make ffprobe print the container format as JSON.
pub fn probe_args(input: &Path) -> Vec<OsString> {
    vec![
        "-v".into(),
        "quiet".into(),
        "-print_format".into(),
        "json".into(),
        "-show_format".into(),
        input.as_os_str().to_os_string(),
    ]
}

/// Extracts the duration in seconds from raw ffprobe JSON output.
pub fn parse_duration(input: &Path, stdout: &[u8]) -> Result<f64, Error> {
    let fail = |reason: String| Error::Probe {
        input: input.to_path_buf(),
        reason,
    };

    let report: ProbeReport = serde_json::from_slice(stdout)
        .map_err(|e| fail(format!("unexpected ffprobe output: {e}")))?;
    let raw = report
        .format
        .duration
        .ok_or_else(|| fail("ffprobe reported no duration".to_string()))?;
    let seconds = raw
        .trim()
        .parse::<f64>()
        .map_err(|e| fail(format!("invalid duration '{raw}': {e}")))?;

    if !(seconds.is_finite() && seconds > 0.0) {
        return Err(fail(format!("duration must be positive, got {raw}")));
    }
    Ok(seconds)
}
