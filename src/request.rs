use std::fmt;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::Error;

pub const DEFAULT_FRAMES_PER_SECOND: u32 = 30;
pub const MAX_CONSTANT_RATE_FACTOR: i32 = 51;

static RESOLUTION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<width>\d+)x(?P<height>\d+)$").expect("BUG: Failed to compile resolution regex")
});

/// An explicit output frame size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl FromStr for Resolution {
    type Err = Error;

    /// Parses the `WIDTHxHEIGHT` form, e.g. `1280x720`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid =
            || Error::usage(format!("'{s}' is not a valid resolution in the WIDTHxHEIGHT format"));
        let caps = RESOLUTION_RE.captures(s).ok_or_else(invalid)?;
        let width = caps["width"].parse::<u32>().map_err(|_| invalid())?;
        let height = caps["height"].parse::<u32>().map_err(|_| invalid())?;
        Ok(Resolution { width, height })
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// How the video is resized. Only one variant can ever be active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scale {
    /// Keep the source frame size.
    Original,
    /// Resize to an explicit width and height.
    Both(Resolution),
    /// Fix the width; the height follows the source aspect ratio.
    Width(u32),
    /// Fix the height; the width follows the source aspect ratio.
    Height(u32),
}

impl Scale {
    /// The ffmpeg `scale` filter for this variant, if any.
    ///
    /// The unconstrained dimension is `-2`, which keeps the aspect ratio
    /// and rounds to an even number of pixels as yuv420p requires.
    pub fn filter(&self) -> Option<String> {
        match self {
            Scale::Original => None,
            Scale::Both(r) => Some(format!("scale={}:{}", r.width, r.height)),
            Scale::Width(w) => Some(format!("scale={w}:-2")),
            Scale::Height(h) => Some(format!("scale=-2:{h}")),
        }
    }
}

/// Video rate control. Exactly one mode is chosen per request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RateControl {
    /// Constant quality, 0 (lossless) to 51 (worst).
    ConstantRateFactor(u8),
    /// Aim for an output file of this many megabytes, encoded in two passes.
    TargetSize { megabytes: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioSettings {
    pub bitrate_kbps: u32,
    pub mono: bool,
}

/// A validated transcode request. Built once through [`RequestBuilder`].
#[derive(Debug, Clone, PartialEq)]
pub struct EncodingRequest {
    input: PathBuf,
    output: PathBuf,
    overwrite: bool,
    frames_per_second: u32,
    scale: Scale,
    rate_control: RateControl,
    audio: AudioSettings,
}

impl EncodingRequest {
    pub fn input(&self) -> &Path {
        &self.input
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    pub fn overwrite(&self) -> bool {
        self.overwrite
    }

    pub fn frames_per_second(&self) -> u32 {
        self.frames_per_second
    }

    pub fn scale(&self) -> Scale {
        self.scale
    }

    pub fn rate_control(&self) -> RateControl {
        self.rate_control
    }

    pub fn audio(&self) -> AudioSettings {
        self.audio
    }
}

/// Collects raw user options and validates them into an [`EncodingRequest`].
///
/// Setters may be called in any order; calling the same setter twice keeps the
/// last value. Conflicting options are only reported by [`RequestBuilder::build`].
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    input: Option<PathBuf>,
    output: Option<PathBuf>,
    overwrite: bool,
    frames_per_second: u32,
    scale: Option<Resolution>,
    scale_width: Option<u32>,
    scale_height: Option<u32>,
    constant_rate_factor: Option<i32>,
    target_size: Option<f64>,
    audio_bitrate: Option<u32>,
    mono: bool,
}

impl Default for RequestBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestBuilder {
    pub fn new() -> Self {
        RequestBuilder {
            input: None,
            output: None,
            overwrite: false,
            frames_per_second: DEFAULT_FRAMES_PER_SECOND,
            scale: None,
            scale_width: None,
            scale_height: None,
            constant_rate_factor: None,
            target_size: None,
            audio_bitrate: None,
            mono: false,
        }
    }

    pub fn input(mut self, path: impl Into<PathBuf>) -> Self {
        self.input = Some(path.into());
        self
    }

    pub fn output(mut self, path: impl Into<PathBuf>) -> Self {
        self.output = Some(path.into());
        self
    }

    /// Allows replacing an existing output file.
    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    pub fn frames_per_second(mut self, fps: u32) -> Self {
        self.frames_per_second = fps;
        self
    }

    pub fn scale(mut self, resolution: Resolution) -> Self {
        self.scale = Some(resolution);
        self
    }

    pub fn scale_width(mut self, width: u32) -> Self {
        self.scale_width = Some(width);
        self
    }

    pub fn scale_height(mut self, height: u32) -> Self {
        self.scale_height = Some(height);
        self
    }

    /// Kept signed so out-of-range input reaches validation instead of the parser.
    pub fn constant_rate_factor(mut self, crf: i32) -> Self {
        self.constant_rate_factor = Some(crf);
        self
    }

    /// Desired output size in megabytes.
    pub fn target_size(mut self, megabytes: f64) -> Self {
        self.target_size = Some(megabytes);
        self
    }

    /// Audio bitrate in kbps.
    pub fn audio_bitrate(mut self, kbps: u32) -> Self {
        self.audio_bitrate = Some(kbps);
        self
    }

    /// Downmix the audio to a single channel.
    pub fn mono(mut self, mono: bool) -> Self {
        self.mono = mono;
        self
    }

    /// Validates the collected options. Never spawns a process.
    pub fn build(self) -> Result<EncodingRequest, Error> {
        let input = self
            .input
            .ok_or_else(|| Error::usage("the input file (-i/--in) is required"))?;
        let output = self
            .output
            .ok_or_else(|| Error::usage("the output file (-o/--out) is required"))?;

        if self.frames_per_second == 0 {
            return Err(Error::usage("frames per second must be greater than 0"));
        }

        let scale = match (self.scale, self.scale_width, self.scale_height) {
            (None, None, None) => Scale::Original,
            (Some(r), None, None) => Scale::Both(r),
            (None, Some(w), None) => Scale::Width(w),
            (None, None, Some(h)) => Scale::Height(h),
            _ => {
                return Err(Error::usage(
                    "only one of -s/--scale, -sw/--scale-width and -sh/--scale-height may be given",
                ));
            }
        };
        let has_zero_dimension = match scale {
            Scale::Original => false,
            Scale::Both(r) => r.width == 0 || r.height == 0,
            Scale::Width(v) | Scale::Height(v) => v == 0,
        };
        if has_zero_dimension {
            return Err(Error::usage("scale dimensions must be greater than 0"));
        }

        let rate_control = match (self.constant_rate_factor, self.target_size) {
            (Some(crf), None) => {
                let crf = u8::try_from(crf)
                    .ok()
                    .filter(|v| i32::from(*v) <= MAX_CONSTANT_RATE_FACTOR)
                    .ok_or_else(|| {
                        Error::usage(format!(
                            "constant rate factor must be between 0 and {MAX_CONSTANT_RATE_FACTOR}, got {crf}"
                        ))
                    })?;
                RateControl::ConstantRateFactor(crf)
            }
            (None, Some(megabytes)) => {
                if !(megabytes.is_finite() && megabytes > 0.0) {
                    return Err(Error::usage(format!(
                        "target size must be a positive number of megabytes, got {megabytes}"
                    )));
                }
                RateControl::TargetSize { megabytes }
            }
            (Some(_), Some(_)) => {
                return Err(Error::usage(
                    "-crf/--constant-rate-factor and -t/--target-size are mutually exclusive",
                ));
            }
            (None, None) => {
                return Err(Error::usage(
                    "one of -crf/--constant-rate-factor or -t/--target-size is required",
                ));
            }
        };

        let bitrate_kbps = self
            .audio_bitrate
            .ok_or_else(|| Error::usage("the audio bitrate (-ab/--audio-bitrate) is required"))?;
        if bitrate_kbps == 0 {
            return Err(Error::usage("audio bitrate must be greater than 0"));
        }

        if !input.is_file() {
            return Err(Error::usage(format!(
                "input file '{}' does not exist or is not a file",
                input.display()
            )));
        }
        if let Err(e) = File::open(&input) {
            return Err(Error::usage(format!(
                "input file '{}' cannot be read: {e}",
                input.display()
            )));
        }
        if is_same_file(&input, &output) {
            return Err(Error::usage("input file and output file can't be the same"));
        }
        if output.exists() && !self.overwrite {
            return Err(Error::usage(format!(
                "output file '{}' exists; use -f/--force to overwrite it",
                output.display()
            )));
        }

        Ok(EncodingRequest {
            input,
            output,
            overwrite: self.overwrite,
            frames_per_second: self.frames_per_second,
            scale,
            rate_control,
            audio: AudioSettings {
                bitrate_kbps,
                mono: self.mono,
            },
        })
    }
}

fn is_same_file(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
