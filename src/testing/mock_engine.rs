use std::collections::VecDeque;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::engine::Engine;
use crate::error::Error;

/// A call the mock received, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Probe(PathBuf),
    Transcode(Vec<OsString>),
}

/// An [`Engine`] that never spawns anything and records every call.
///
/// Probing panics unless a duration or a probe failure was configured, so a
/// test notices an unexpected probe.
#[derive(Debug, Default)]
pub struct MockEngine {
    duration: Option<f64>,
    probe_exit_code: Option<i32>,
    transcode_exit_codes: Mutex<VecDeque<i32>>,
    calls: Mutex<Vec<Call>>,
}

impl MockEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Duration returned by a successful probe.
    pub fn with_duration(mut self, seconds: f64) -> Self {
        self.duration = Some(seconds);
        self
    }

    /// Makes the probe exit with `code`.
    pub fn probe_fails(mut self, code: i32) -> Self {
        self.probe_exit_code = Some(code);
        self
    }

    /// Exit codes of successive transcode passes. Passes beyond the list succeed.
    pub fn transcode_exit_codes<I>(self, codes: I) -> Self
    where
        I: IntoIterator<Item = i32>,
    {
        if let Ok(mut queue) = self.transcode_exit_codes.lock() {
            queue.extend(codes);
        } else {
            panic!("failed to lock the mutex");
        }
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Arguments of every transcode pass that was started.
    pub fn transcode_calls(&self) -> Vec<Vec<OsString>> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Transcode(args) => Some(args),
                Call::Probe(_) => None,
            })
            .collect()
    }

    fn record(&self, call: Call) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }
}

#[async_trait]
impl Engine for MockEngine {
    async fn probe_duration(&self, input: &Path) -> Result<f64, Error> {
        self.record(Call::Probe(input.to_path_buf()));

        if let Some(code) = self.probe_exit_code {
            return Err(Error::EngineFailed {
                program: PathBuf::from("ffprobe"),
                code,
            });
        }
        let duration = self.duration.unwrap_or_else(|| {
            panic!("No mock duration configured for probe of {:?}", input)
        });
        Ok(duration)
    }

    async fn transcode(&self, args: &[OsString]) -> Result<(), Error> {
        self.record(Call::Transcode(args.to_vec()));

        let code = self
            .transcode_exit_codes
            .lock()
            .ok()
            .and_then(|mut queue| queue.pop_front())
            .unwrap_or(0);
        if code == 0 {
            Ok(())
        } else {
            Err(Error::EngineFailed {
                program: PathBuf::from("ffmpeg"),
                code,
            })
        }
    }
}
