//! Quick H.264/AAC transcoding on top of `ffmpeg`.
//!
//! A run validates the user's options into an [`EncodingRequest`], probes the
//! source duration when a target file size was asked for, and then runs one
//! (constant rate factor) or two (target size) `ffmpeg` passes.

use tracing::info;

pub mod cli;
mod engine;
mod error;
pub mod job;
mod probe;
mod request;

#[doc(hidden)]
pub mod testing {
    mod mock_engine;
    pub use mock_engine::{Call, MockEngine};
}

pub use engine::{Engine, Ffmpeg, exit_code};
pub use error::{EXIT_CONFIG, EXIT_NOT_FOUND, EXIT_USAGE, Error};
pub use job::TranscodeJob;
pub use probe::{FormatReport, ProbeReport};
pub use request::{
    AudioSettings, DEFAULT_FRAMES_PER_SECOND, EncodingRequest, RateControl, RequestBuilder,
    Resolution, Scale,
};

/// Runs the transcode described by `request` on `engine`.
///
/// The source is probed only in target size mode. The first pass that exits
/// non-zero ends the run with [`Error::EngineFailed`] carrying its code.
pub async fn run<E>(engine: &E, request: &EncodingRequest) -> Result<(), Error>
where
    E: Engine + ?Sized,
{
    let duration = match request.rate_control() {
        RateControl::TargetSize { .. } => Some(engine.probe_duration(request.input()).await?),
        RateControl::ConstantRateFactor(_) => None,
    };

    let job = TranscodeJob::for_request(request, duration)?;
    let passes = job.passes();
    let total = passes.len();
    for (i, args) in passes.into_iter().enumerate() {
        if total > 1 {
            info!("Running pass {} of {}", i + 1, total);
        }
        engine.transcode(args).await?;
    }

    info!("Wrote {}", request.output().display());
    Ok(())
}
