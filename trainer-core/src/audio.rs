//! # Audio Capture Module
//!
//! Owns the platform audio input and turns it into a stream of pitch
//! readings using CPAL (Cross-Platform Audio Library).
//!
//! ## Features
//! - Input device enumeration with opaque string ids
//! - Capture session with deterministic start/stop and idempotent teardown
//! - Fixed-size analysis windows assembled inside the stream callback
//! - A dedicated analysis thread running the frequency estimator
//!
//! The CPAL stream lives on the analysis thread; the session handle owned
//! by the caller only carries channels and the join handle, so it can sit
//! inside single-threaded UI state. Stream construction errors are
//! reported synchronously from `start`, and the session never retries on
//! its own.

use anyhow::{anyhow, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::SupportedStreamConfigRange;
use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use std::thread::JoinHandle;

use crate::pitch::{EstimatorConfig, FrequencyEstimator};
use crate::tuning;
use crate::PitchReading;

/// Preferred capture rate; the nearest supported rate is used when a
/// device cannot provide it.
pub const TARGET_SAMPLE_RATE: u32 = 44100;

/// Readings the consumer has not drained yet before frames are dropped.
const READINGS_CHANNEL_CAPACITY: usize = 64;

/// An available audio input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputDevice {
    /// Opaque identifier passed back to select this device.
    pub id: String,
    /// Human-readable name for the device picker.
    pub label: String,
}

/// Which input to capture from.
///
/// The system default is its own variant: some platforms reject their
/// reserved default id when it is used as an exact-match constraint, so
/// it must never travel as one.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum InputSelection {
    #[default]
    SystemDefault,
    Device(String),
}

/// Externally visible session state.
///
/// `Failed` is distinct from `Stopped`: after a failed start or device
/// switch the previous resources are already released, and the error
/// stays visible until the user retries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Stopped,
    Listening { device_label: String },
    Failed { message: String },
}

/// Enumerates the available audio inputs.
pub fn list_input_devices() -> Result<Vec<InputDevice>> {
    let host = cpal::default_host();
    let mut devices = Vec::new();
    for device in host.input_devices()? {
        match device.name() {
            Ok(name) => devices.push(InputDevice {
                id: name.clone(),
                label: name,
            }),
            Err(e) => eprintln!("[AUDIO] Skipping unnamed input device: {}", e),
        }
    }
    Ok(devices)
}

/// Resolves a selection to a concrete device.
fn resolve_device(selection: &InputSelection) -> Result<cpal::Device> {
    let host = cpal::default_host();
    match selection {
        InputSelection::SystemDefault => host
            .default_input_device()
            .ok_or_else(|| anyhow!("No input device available")),
        InputSelection::Device(id) => {
            for device in host.input_devices()? {
                if device.name().map(|name| name == *id).unwrap_or(false) {
                    return Ok(device);
                }
            }
            Err(anyhow!("Input device '{}' not found", id))
        }
    }
}

/// Picks the mono f32 configuration whose supported rate range lies
/// closest to the target rate.
fn find_supported_config(
    configs: Vec<SupportedStreamConfigRange>,
    target_rate: u32,
) -> Option<SupportedStreamConfigRange> {
    configs
        .into_iter()
        .filter(|c| c.channels() == 1 && c.sample_format() == cpal::SampleFormat::F32)
        .min_by_key(|c| {
            let below = (c.min_sample_rate().0 as i64 - target_rate as i64).abs();
            let above = (c.max_sample_rate().0 as i64 - target_rate as i64).abs();
            below.min(above)
        })
}

/// Clamps the target rate into a configuration's supported range.
fn nearest_rate(config: &SupportedStreamConfigRange, target_rate: u32) -> u32 {
    target_rate.clamp(config.min_sample_rate().0, config.max_sample_rate().0)
}

struct AnalysisWorker {
    shutdown_tx: Sender<()>,
    handle: Option<JoinHandle<()>>,
}

/// A capture session: at most one exclusive hardware input at a time.
///
/// `start` on a running session releases the previous stream first, so
/// switching devices never holds two exclusive handles. `stop` is
/// idempotent and also runs on drop, making teardown from any path safe.
pub struct CaptureSession {
    config: EstimatorConfig,
    state: SessionState,
    worker: Option<AnalysisWorker>,
    readings_rx: Option<Receiver<PitchReading>>,
}

impl CaptureSession {
    pub fn new() -> CaptureSession {
        CaptureSession::with_config(EstimatorConfig::for_sample_rate(TARGET_SAMPLE_RATE))
    }

    pub fn with_config(config: EstimatorConfig) -> CaptureSession {
        CaptureSession {
            config,
            state: SessionState::Stopped,
            worker: None,
            readings_rx: None,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn is_listening(&self) -> bool {
        matches!(self.state, SessionState::Listening { .. })
    }

    /// Begins capturing from the selected input.
    ///
    /// Any previous stream is released first. On failure the session is
    /// left in `Failed` with no resources held and the error is returned;
    /// the caller decides whether to retry.
    pub fn start(&mut self, selection: &InputSelection) -> Result<()> {
        self.stop();

        let (shutdown_tx, shutdown_rx) = bounded(1);
        let (ready_tx, ready_rx) = bounded(1);
        let (readings_tx, readings_rx) = bounded(READINGS_CHANNEL_CAPACITY);

        let selection = selection.clone();
        let template = self.config.clone();
        let handle = std::thread::spawn(move || {
            run_capture_thread(selection, template, ready_tx, shutdown_rx, readings_tx);
        });

        match ready_rx.recv() {
            Ok(Ok((device_label, sample_rate))) => {
                eprintln!(
                    "[SESSION] Listening on '{}' at {} Hz",
                    device_label, sample_rate
                );
                self.worker = Some(AnalysisWorker {
                    shutdown_tx,
                    handle: Some(handle),
                });
                self.readings_rx = Some(readings_rx);
                self.state = SessionState::Listening { device_label };
                Ok(())
            }
            Ok(Err(message)) => {
                let _ = handle.join();
                eprintln!("[SESSION] Failed to start capture: {}", message);
                self.state = SessionState::Failed {
                    message: message.clone(),
                };
                Err(anyhow!(message))
            }
            Err(_) => {
                let _ = handle.join();
                let message = "audio thread exited before the stream opened".to_string();
                eprintln!("[SESSION] {}", message);
                self.state = SessionState::Failed {
                    message: message.clone(),
                };
                Err(anyhow!(message))
            }
        }
    }

    /// Releases the stream and the analysis thread.
    ///
    /// Safe to call repeatedly, before any start, and from teardown. A
    /// `Failed` state stays visible; only a live session transitions to
    /// `Stopped`.
    pub fn stop(&mut self) {
        if let Some(mut worker) = self.worker.take() {
            let _ = worker.shutdown_tx.send(());
            if let Some(handle) = worker.handle.take() {
                if handle.join().is_err() {
                    eprintln!("[SESSION] Analysis thread panicked during shutdown");
                }
            }
            eprintln!("[SESSION] Capture stopped");
        }
        self.readings_rx = None;
        if self.is_listening() {
            self.state = SessionState::Stopped;
        }
    }

    /// Drains all readings produced since the last call.
    ///
    /// Non-blocking; meant to run once per display-refresh tick.
    pub fn drain_readings(&mut self) -> Vec<PitchReading> {
        let mut readings = Vec::new();
        if let Some(rx) = &self.readings_rx {
            while let Ok(reading) = rx.try_recv() {
                readings.push(reading);
            }
        }
        readings
    }
}

impl Default for CaptureSession {
    fn default() -> CaptureSession {
        CaptureSession::new()
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        self.stop();
    }
}

type ReadySignal = std::result::Result<(String, u32), String>;

/// Body of the analysis thread.
///
/// Builds the stream here so it lives and dies with the thread, reports
/// the outcome through the ready channel, then analyzes windows until the
/// channel closes or shutdown is signalled.
fn run_capture_thread(
    selection: InputSelection,
    template: EstimatorConfig,
    ready_tx: Sender<ReadySignal>,
    shutdown_rx: Receiver<()>,
    readings_tx: Sender<PitchReading>,
) {
    let (raw_tx, raw_rx) = unbounded::<Vec<f32>>();
    let window_size = template.window_size;

    let setup = (|| -> Result<(cpal::Stream, String, u32)> {
        let device = resolve_device(&selection)?;
        let label = device
            .name()
            .unwrap_or_else(|_| "unknown input".to_string());

        let configs = device.supported_input_configs()?.collect::<Vec<_>>();
        let supported = find_supported_config(configs, TARGET_SAMPLE_RATE)
            .ok_or_else(|| anyhow!("No suitable mono f32 input format on '{}'", label))?;
        let rate = nearest_rate(&supported, TARGET_SAMPLE_RATE);
        let config: cpal::StreamConfig = supported
            .with_sample_rate(cpal::SampleRate(rate))
            .into();

        // Accumulate callback buffers into fixed analysis windows; a full
        // analysis channel drops the window rather than blocking the
        // audio callback.
        let mut pending = Vec::with_capacity(window_size * 2);
        let frame_tx = raw_tx.clone();
        let err_fn = |err| eprintln!("[AUDIO] Stream error: {}", err);
        let stream = device.build_input_stream(
            &config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                pending.extend_from_slice(data);
                while pending.len() >= window_size {
                    let window = pending[..window_size].to_vec();
                    let _ = frame_tx.try_send(window);
                    pending.drain(..window_size);
                }
            },
            err_fn,
            None,
        )?;
        stream.play()?;

        Ok((stream, label, rate))
    })();

    let (stream, label, sample_rate) = match setup {
        Ok(parts) => parts,
        Err(e) => {
            let _ = ready_tx.send(Err(e.to_string()));
            return;
        }
    };
    let _ = ready_tx.send(Ok((label, sample_rate)));

    let estimator = FrequencyEstimator::new(EstimatorConfig {
        sample_rate,
        ..template
    });

    loop {
        crossbeam_channel::select! {
            recv(raw_rx) -> message => match message {
                Ok(window) => {
                    let frequency = estimator.estimate(&window);
                    let note = frequency.map(tuning::frequency_to_note);
                    // A full readings channel means the consumer lags;
                    // fresh windows keep coming, so this one is dropped.
                    let _ = readings_tx.try_send(PitchReading { frequency, note });
                }
                Err(_) => break,
            },
            recv(shutdown_rx) -> _ => break,
        }
    }

    if let Err(e) = stream.pause() {
        eprintln!("[AUDIO] Error pausing stream: {}", e);
    }
    drop(stream);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_is_idempotent_before_any_start() {
        let mut session = CaptureSession::new();
        assert_eq!(*session.state(), SessionState::Stopped);

        session.stop();
        session.stop();
        assert_eq!(*session.state(), SessionState::Stopped);
        assert!(!session.is_listening());
    }

    #[test]
    fn draining_a_stopped_session_yields_nothing() {
        let mut session = CaptureSession::new();
        assert!(session.drain_readings().is_empty());

        session.stop();
        assert!(session.drain_readings().is_empty());
    }

    #[test]
    fn default_selection_is_the_system_default() {
        assert_eq!(InputSelection::default(), InputSelection::SystemDefault);
        // The default is its own variant, never a device id.
        assert_ne!(
            InputSelection::default(),
            InputSelection::Device("default".to_string())
        );
    }

    #[test]
    fn session_can_be_dropped_without_starting() {
        let session = CaptureSession::new();
        drop(session);
    }
}
