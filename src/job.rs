use std::ffi::OsString;

use tracing::info;

use crate::error::Error;
use crate::request::{EncodingRequest, RateControl};

/// Where the analysis pass of a two-pass encode writes its discarded output.
#[cfg(windows)]
pub const NULL_DEVICE: &str = "NUL";
#[cfg(not(windows))]
pub const NULL_DEVICE: &str = "/dev/null";

const KILOBITS_PER_MEGABYTE: f64 = 8.0 * 1024.0;

/// Computes the video bitrate, in kbps, that makes the whole file land on
/// `target_size_mb` once `audio_kbps` of audio is muxed in.
///
/// Fails when less than 1 kbps would be left for the video stream.
pub fn target_video_bitrate(
    target_size_mb: f64,
    duration_secs: f64,
    audio_kbps: u32,
) -> Result<u32, Error> {
    let total_kbps = target_size_mb * KILOBITS_PER_MEGABYTE / duration_secs;
    let video_kbps = total_kbps - f64::from(audio_kbps);

    info!("Video duration: {:.3} s", duration_secs);
    info!("Target size: {} MB", target_size_mb);
    info!("Target bitrate: {:.2} kbps", total_kbps);
    info!("Audio bitrate: {} kbps", audio_kbps);
    info!("Video bitrate: {:.2} kbps", video_kbps);

    let rounded = video_kbps.round();
    if !rounded.is_finite() || rounded < 1.0 {
        return Err(Error::TargetTooSmall {
            target_size_mb,
            duration_secs,
            audio_kbps,
            video_kbps,
        });
    }
    Ok(rounded.min(f64::from(u32::MAX)) as u32)
}

/// The ffmpeg invocations for one request, in the order they must run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranscodeJob {
    /// Constant rate factor encode.
    OnePass { args: Vec<OsString> },
    /// Bitrate-targeted encode: an analysis pass, then the real one.
    TwoPass { first: Vec<OsString>, second: Vec<OsString> },
}

/// Video bitrate mode as it is written to the command line.
#[derive(Debug, Clone, Copy)]
enum VideoRate {
    Crf(u8),
    Kbps(u32),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Pass {
    Only,
    First,
    Second,
}

impl TranscodeJob {
    /// Builds the single-pass job for a constant rate factor request.
    pub fn constant_rate_factor(request: &EncodingRequest, crf: u8) -> Self {
        TranscodeJob::OnePass {
            args: build_args(request, VideoRate::Crf(crf), Pass::Only),
        }
    }

    /// Builds the two-pass job for a given video bitrate in kbps.
    pub fn two_pass(request: &EncodingRequest, video_kbps: u32) -> Self {
        let rate = VideoRate::Kbps(video_kbps);
        TranscodeJob::TwoPass {
            first: build_args(request, rate, Pass::First),
            second: build_args(request, rate, Pass::Second),
        }
    }

    /// Picks the job shape for `request`. `duration_secs` is only read in
    /// target-size mode, where it is required.
    pub fn for_request(request: &EncodingRequest, duration_secs: Option<f64>) -> Result<Self, Error> {
        match request.rate_control() {
            RateControl::ConstantRateFactor(crf) => {
                info!("Transcoding in constant rate factor mode");
                Ok(Self::constant_rate_factor(request, crf))
            }
            RateControl::TargetSize { megabytes } => {
                info!("Transcoding in two-pass mode");
                let duration_secs = duration_secs.ok_or_else(|| Error::Probe {
                    input: request.input().to_path_buf(),
                    reason: "no duration available for target size mode".to_string(),
                })?;
                let video_kbps =
                    target_video_bitrate(megabytes, duration_secs, request.audio().bitrate_kbps)?;
                Ok(Self::two_pass(request, video_kbps))
            }
        }
    }

    /// The argument lists of each ffmpeg run, in order.
    pub fn passes(&self) -> Vec<&[OsString]> {
        match self {
            TranscodeJob::OnePass { args } => vec![args.as_slice()],
            TranscodeJob::TwoPass { first, second } => vec![first.as_slice(), second.as_slice()],
        }
    }
}

/// Joins the frame rate and scale filters into one `-filter:v` chain.
fn video_filter(request: &EncodingRequest) -> String {
    let mut filters = vec![format!("fps={}", request.frames_per_second())];
    if let Some(scale) = request.scale().filter() {
        filters.push(scale);
    }
    filters.join(",")
}

fn build_args(request: &EncodingRequest, rate: VideoRate, pass: Pass) -> Vec<OsString> {
    let mut args: Vec<OsString> = Vec::new();

    args.extend(["-loglevel".into(), "warning".into(), "-stats".into()]);

    // The analysis pass writes to the null device, which always exists.
    if pass == Pass::First {
        args.push("-y".into());
    }

    // Paths go through untouched; they need not be valid UTF-8.
    args.extend(["-i".into(), request.input().as_os_str().to_os_string()]);

    if pass != Pass::First && request.overwrite() {
        args.push("-y".into());
    }

    args.extend(["-filter:v".into(), video_filter(request).into()]);

    args.extend(["-c:v".into(), "libx264".into()]);
    match rate {
        VideoRate::Crf(crf) => args.extend(["-crf".into(), crf.to_string().into()]),
        VideoRate::Kbps(kbps) => args.extend(["-b:v".into(), format!("{kbps}k").into()]),
    }
    args.extend(["-pix_fmt".into(), "yuv420p".into()]);

    match pass {
        Pass::First => args.extend(["-pass".into(), "1".into()]),
        Pass::Second => args.extend(["-pass".into(), "2".into()]),
        Pass::Only => {}
    }

    if pass != Pass::First {
        let audio = request.audio();
        args.extend([
            "-c:a".into(),
            "aac".into(),
            "-b:a".into(),
            format!("{}k", audio.bitrate_kbps).into(),
        ]);
        if audio.mono {
            args.extend(["-ac".into(), "1".into()]);
        }
    }

    args.extend([
        "-profile:v".into(),
        "high".into(),
        "-preset".into(),
        "veryslow".into(),
    ]);

    match pass {
        Pass::First => {
            args.extend(["-an".into(), "-f".into(), "null".into(), NULL_DEVICE.into()]);
        }
        Pass::Only | Pass::Second => {
            args.extend(["-movflags".into(), "+faststart".into()]);
            args.push(request.output().as_os_str().to_os_string());
        }
    }

    args
}
