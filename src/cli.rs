use std::ffi::OsString;
use std::path::PathBuf;

use clap::Parser;

use crate::engine::Ffmpeg;
use crate::error::Error;
use crate::request::{DEFAULT_FRAMES_PER_SECOND, RequestBuilder, Resolution};

/// Single-dash long options accepted for compatibility, and their clap spelling.
const SINGLE_DASH_ALIASES: &[(&str, &str)] = &[
    ("-fps", "--frames-per-second"),
    ("-sw", "--scale-width"),
    ("-sh", "--scale-height"),
    ("-crf", "--constant-rate-factor"),
    ("-ab", "--audio-bitrate"),
];

/// Quick and dirty H.264/AAC transcoding with ffmpeg.
#[derive(Parser, Debug)]
#[command(name = "toh264", author, version, about)]
pub struct Cli {
    /// Overwrite output file if it exists
    #[arg(short = 'f', long = "force", help_heading = "General behaviour")]
    pub force: bool,

    /// Log the ffmpeg command lines and other details
    #[arg(short = 'v', long = "verbose", help_heading = "General behaviour")]
    pub verbose: bool,

    /// Input file
    #[arg(short = 'i', long = "in", value_name = "PATH", help_heading = "Files")]
    pub input: PathBuf,

    /// Output file
    #[arg(short = 'o', long = "out", value_name = "PATH", help_heading = "Files")]
    pub output: PathBuf,

    /// Frames per second [alias: -fps]
    #[arg(
        long = "frames-per-second",
        value_name = "FPS",
        default_value_t = DEFAULT_FRAMES_PER_SECOND,
        help_heading = "Video"
    )]
    pub frames_per_second: u32,

    /// Resolution
    #[arg(short = 's', long = "scale", value_name = "WIDTHxHEIGHT", help_heading = "Video")]
    pub scale: Option<Resolution>,

    /// Resolution width, keeping the aspect ratio [alias: -sw]
    #[arg(long = "scale-width", value_name = "WIDTH", help_heading = "Video")]
    pub scale_width: Option<u32>,

    /// Resolution height, keeping the aspect ratio [alias: -sh]
    #[arg(long = "scale-height", value_name = "HEIGHT", help_heading = "Video")]
    pub scale_height: Option<u32>,

    /// CRF value between 0 and 51 [alias: -crf]
    #[arg(
        long = "constant-rate-factor",
        value_name = "CRF",
        allow_negative_numbers = true,
        help_heading = "Video"
    )]
    pub constant_rate_factor: Option<i32>,

    /// Desired file size in MB, encoded in two passes
    #[arg(
        short = 't',
        long = "target-size",
        value_name = "SIZE",
        allow_negative_numbers = true,
        help_heading = "Video"
    )]
    pub target_size: Option<f64>,

    /// Audio bitrate in kbps [alias: -ab]
    #[arg(long = "audio-bitrate", value_name = "BITRATE", help_heading = "Audio")]
    pub audio_bitrate: u32,

    /// Downmix audio to mono
    #[arg(short = 'm', long = "mono", help_heading = "Audio")]
    pub mono: bool,

    /// ffmpeg executable to use instead of the one found in PATH
    #[arg(long, env = "TOH264_FFMPEG", value_name = "PATH", help_heading = "Engine")]
    pub ffmpeg: Option<PathBuf>,

    /// ffprobe executable to use instead of the one found in PATH
    #[arg(long, env = "TOH264_FFPROBE", value_name = "PATH", help_heading = "Engine")]
    pub ffprobe: Option<PathBuf>,
}

impl Cli {
    /// Parses `args` after rewriting the single-dash aliases. Exits on error.
    pub fn parse_normalized<I, T>(args: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString>,
    {
        Self::parse_from(normalize_args(args))
    }

    /// Like [`Cli::parse_normalized`], but returns clap's error instead of exiting.
    pub fn try_parse_normalized<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString>,
    {
        Self::try_parse_from(normalize_args(args))
    }

    /// Copies the parsed options into a [`RequestBuilder`]. Nothing is validated yet.
    pub fn request_builder(&self) -> RequestBuilder {
        let mut builder = RequestBuilder::new()
            .input(&self.input)
            .output(&self.output)
            .overwrite(self.force)
            .frames_per_second(self.frames_per_second)
            .audio_bitrate(self.audio_bitrate)
            .mono(self.mono);

        if let Some(r) = self.scale {
            builder = builder.scale(r);
        }
        if let Some(w) = self.scale_width {
            builder = builder.scale_width(w);
        }
        if let Some(h) = self.scale_height {
            builder = builder.scale_height(h);
        }
        if let Some(crf) = self.constant_rate_factor {
            builder = builder.constant_rate_factor(crf);
        }
        if let Some(size) = self.target_size {
            builder = builder.target_size(size);
        }
        builder
    }

    /// Validates the options, locates ffmpeg and runs the transcode.
    pub async fn execute(&self) -> Result<(), Error> {
        let request = self.request_builder().build()?;
        let engine = Ffmpeg::with_overrides(self.ffmpeg.clone(), self.ffprobe.clone())?;
        crate::run(&engine, &request).await
    }
}

/// Rewrites `-fps 30` style options to their `--frames-per-second 30` form.
/// `-fps=30` and `-fps30` are accepted as well.
///
/// The first item is the program name and is never rewritten, nor is anything
/// after a bare `--`.
pub fn normalize_args<I, T>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    let mut out = Vec::new();
    let mut options_ended = false;

    for (i, arg) in args.into_iter().enumerate() {
        let arg: OsString = arg.into();
        if i == 0 || options_ended {
            out.push(arg);
            continue;
        }
        if arg == "--" {
            options_ended = true;
            out.push(arg);
            continue;
        }
        out.push(rewrite_alias(arg));
    }
    out
}

fn rewrite_alias(arg: OsString) -> OsString {
    let Some(s) = arg.to_str() else {
        return arg;
    };
    for (alias, long) in SINGLE_DASH_ALIASES {
        if s == *alias {
            return OsString::from(*long);
        }
        let Some(rest) = s.strip_prefix(alias) else {
            continue;
        };
        if let Some(value) = rest.strip_prefix('=') {
            return OsString::from(format!("{long}={value}"));
        }
        // Attached values (`-fps30`, `-crf-1`) are only taken when numeric.
        if is_attached_number(rest) {
            return OsString::from(format!("{long}={rest}"));
        }
    }
    arg
}

fn is_attached_number(rest: &str) -> bool {
    let digits = rest.strip_prefix('-').unwrap_or(rest);
    digits.chars().any(|c| c.is_ascii_digit())
        && digits.chars().all(|c| c.is_ascii_digit() || c == '.')
}
