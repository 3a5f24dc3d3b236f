use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, StreamTrait};
use ringbuf::traits::{Consumer, Split};
use ringbuf::HeapRb;

use crate::audio_api::{DeviceSelection, RouteDevices, RoutingWarning};
use crate::error::{DeviceError, StreamWriteError};
use crate::shared::{CHANNELS, SAMPLE_RATE};

pub mod clip;
pub mod device;
mod engine;
mod playback;
mod router;

pub use device::AudioDevice;
pub use playback::{PlaybackQueue, PlaybackSlot};
pub use router::{AudioRouter, OpenRoute, RouteBackend, RouterState};

use device::{device_name, DeviceRegistry, Direction};
use engine::{Engine, OutputStats, OutputTap, TapKind};

// Each output ring holds this many callback buffers before writes get skipped.
const RING_BLOCKS: usize = 4;
// How long closing a route waits for in-flight callbacks.
const CALLBACK_DRAIN_TIMEOUT: Duration = Duration::from_millis(500);

pub type CpalRouter = AudioRouter<CpalBackend>;

// ── Callback gate ─────────────────────────────────────────────────

// Lets the control path close a route only once no callback is running.
struct CallbackGate {
    open: AtomicBool,
    in_flight: AtomicUsize,
}

struct GateGuard<'a>(&'a CallbackGate);

impl Drop for GateGuard<'_> {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

impl CallbackGate {
    fn new() -> Self {
        Self {
            open: AtomicBool::new(true),
            in_flight: AtomicUsize::new(0),
        }
    }

    // None once the gate is closed; the callback should output silence and return.
    fn enter(&self) -> Option<GateGuard<'_>> {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        if self.open.load(Ordering::SeqCst) {
            Some(GateGuard(self))
        } else {
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            None
        }
    }

    // Closes the gate and waits for running callbacks to leave.
    fn close_and_wait(&self, timeout: Duration) -> bool {
        self.open.store(false, Ordering::SeqCst);
        let deadline = Instant::now() + timeout;
        while self.in_flight.load(Ordering::SeqCst) > 0 {
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        true
    }
}

// ── CPAL backend ──────────────────────────────────────────────────

pub struct CpalBackend {
    registry: DeviceRegistry,
    stats: Arc<OutputStats>,
}

impl CpalBackend {
    pub fn new() -> Self {
        Self {
            registry: DeviceRegistry::new(),
            stats: Arc::new(OutputStats::default()),
        }
    }

    pub fn registry(&self) -> &DeviceRegistry {
        &self.registry
    }

    fn resolve(
        &self,
        requested: Option<&str>,
        direction: Direction,
        role: &'static str,
        warnings: &mut Vec<RoutingWarning>,
    ) -> Result<cpal::Device, DeviceError> {
        if let Some(name) = requested {
            match self.registry.find(name, direction) {
                Ok(device) => return Ok(device),
                Err(DeviceError::NotFound { .. }) => {}
                Err(e) => return Err(e),
            }
        }
        let device = self.registry.default_device(direction)?;
        if let Some(name) = requested {
            warnings.push(RoutingWarning::FellBackToDefault {
                role,
                requested: name.to_string(),
                fallback: device_name(&device),
            });
        }
        Ok(device)
    }

    // Selected cable if it can play, else "CABLE Input", else the default output.
    fn resolve_virtual_cable(
        &self,
        requested: Option<&str>,
        warnings: &mut Vec<RoutingWarning>,
    ) -> Result<cpal::Device, DeviceError> {
        if let Some(name) = requested {
            match self.registry.find(name, Direction::Output) {
                Ok(device) => return Ok(device),
                Err(DeviceError::NotFound { .. }) => {
                    tracing::info!(device = name, "selected cable has no playback side, looking for CABLE Input");
                }
                Err(e) => return Err(e),
            }
        }

        let devices = self.registry.enumerate()?;
        let cable_name = device::select_virtual_cable_output(&devices)
            .and_then(|index| devices.iter().find(|d| d.index == index))
            .map(|d| d.name.clone());
        if let Some(name) = cable_name {
            // re-resolve by identity, the snapshot index is already stale
            match self.registry.find(&name, Direction::Output) {
                Ok(device) => return Ok(device),
                Err(DeviceError::NotFound { .. }) => {}
                Err(e) => return Err(e),
            }
        }

        let fallback = self.registry.default_device(Direction::Output)?;
        warnings.push(RoutingWarning::VirtualCableMissing {
            fallback: device_name(&fallback),
        });
        Ok(fallback)
    }
}

impl Default for CpalBackend {
    fn default() -> Self {
        Self::new()
    }
}

pub struct CpalRoute {
    devices: RouteDevices,
    capture: cpal::Stream,
    virtual_cable: cpal::Stream,
    speaker: cpal::Stream,
    gate: Arc<CallbackGate>,
}

impl OpenRoute for CpalRoute {
    fn devices(&self) -> &RouteDevices {
        &self.devices
    }

    fn close(self) {
        let CpalRoute {
            devices,
            capture,
            virtual_cable,
            speaker,
            gate,
        } = self;

        if !gate.close_and_wait(CALLBACK_DRAIN_TIMEOUT) {
            tracing::warn!("audio callback still running after close timeout");
        }
        for (role, stream) in [
            ("capture", capture),
            ("virtual cable", virtual_cable),
            ("speaker", speaker),
        ] {
            if let Err(e) = stream.pause() {
                tracing::debug!(stream = role, "pause failed during close: {e}");
            }
            drop(stream); // joins the backend's callback thread
        }
        tracing::debug!(capture = %devices.capture, "audio route closed");
    }
}

impl RouteBackend for CpalBackend {
    type Route = CpalRoute;

    fn open(
        &mut self,
        selection: &DeviceSelection,
        slot: PlaybackSlot,
    ) -> Result<(CpalRoute, Vec<RoutingWarning>), DeviceError> {
        let mut warnings = Vec::new();
        let capture_dev = self.resolve(
            selection.capture.as_deref(),
            Direction::Input,
            "capture",
            &mut warnings,
        )?;
        let cable_dev = self.resolve_virtual_cable(selection.virtual_cable.as_deref(), &mut warnings)?;
        let speaker_dev = self.resolve(
            selection.speaker.as_deref(),
            Direction::Output,
            "speaker",
            &mut warnings,
        )?;

        let config = stream_config(selection.buffer_size);
        let block = selection.buffer_size.max(1) as usize;
        let (cable_prod, cable_cons) = HeapRb::<i16>::new(block * RING_BLOCKS).split();
        let (speaker_prod, speaker_cons) = HeapRb::<i16>::new(block * RING_BLOCKS).split();
        let gate = Arc::new(CallbackGate::new());

        // Outputs first so the capture callback never feeds a ring nobody drains.
        // Any `?` below drops the streams built so far; no partial route survives.
        let virtual_cable = build_output_stream(
            &cable_dev,
            &config,
            "virtual cable",
            cable_cons,
            Arc::clone(&gate),
        )?;
        let speaker = build_output_stream(
            &speaker_dev,
            &config,
            "speaker",
            speaker_cons,
            Arc::clone(&gate),
        )?;

        let engine = Engine::new(
            slot,
            block,
            vec![
                OutputTap::new(cable_prod, Arc::clone(&self.stats), TapKind::VirtualCable),
                OutputTap::new(speaker_prod, Arc::clone(&self.stats), TapKind::Speaker),
            ],
        );
        let capture = build_capture_stream(&capture_dev, &config, engine, Arc::clone(&gate))?;

        let devices = RouteDevices {
            capture: device_name(&capture_dev),
            virtual_cable: device_name(&cable_dev),
            speaker: device_name(&speaker_dev),
        };
        play(&virtual_cable, "virtual cable", &devices.virtual_cable)?;
        play(&speaker, "speaker", &devices.speaker)?;
        play(&capture, "capture", &devices.capture)?;

        let route = CpalRoute {
            devices,
            capture,
            virtual_cable,
            speaker,
            gate,
        };
        Ok((route, warnings))
    }

    fn take_write_errors(&self) -> Vec<StreamWriteError> {
        [
            ("virtual cable", &self.stats.virtual_cable_skipped),
            ("speaker", &self.stats.speaker_skipped),
        ]
        .into_iter()
        .filter_map(|(output, counter)| {
            let skipped = counter.swap(0, Ordering::Relaxed);
            (skipped > 0).then_some(StreamWriteError { output, skipped })
        })
        .collect()
    }
}

// ── Streams ───────────────────────────────────────────────────────

// Mono i16 at the pipeline rate with a fixed buffer; devices that can't do
// this fail to open rather than being converted.
fn stream_config(buffer_size: u32) -> cpal::StreamConfig {
    cpal::StreamConfig {
        channels: CHANNELS,
        sample_rate: SAMPLE_RATE,
        buffer_size: cpal::BufferSize::Fixed(buffer_size),
    }
}

fn build_capture_stream(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mut engine: Engine,
    gate: Arc<CallbackGate>,
) -> Result<cpal::Stream, DeviceError> {
    device
        .build_input_stream(
            config,
            move |data: &[i16], _: &cpal::InputCallbackInfo| {
                let Some(_guard) = gate.enter() else {
                    return;
                };
                engine.process(data);
            },
            |err| tracing::error!("capture stream error: {err}"),
            None,
        )
        .map_err(|e| DeviceError::Open {
            role: "capture",
            name: device_name(device),
            reason: e.to_string(),
        })
}

fn build_output_stream(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    role: &'static str,
    mut consumer: ringbuf::HeapCons<i16>,
    gate: Arc<CallbackGate>,
) -> Result<cpal::Stream, DeviceError> {
    device
        .build_output_stream(
            config,
            move |data: &mut [i16], _: &cpal::OutputCallbackInfo| {
                let filled = match gate.enter() {
                    Some(_guard) => consumer.pop_slice(data),
                    None => 0,
                };
                data[filled..].fill(0); // underrun plays silence
            },
            move |err| tracing::error!(stream = role, "output stream error: {err}"),
            None,
        )
        .map_err(|e| DeviceError::Open {
            role,
            name: device_name(device),
            reason: e.to_string(),
        })
}

fn play(stream: &cpal::Stream, role: &'static str, name: &str) -> Result<(), DeviceError> {
    stream.play().map_err(|e| DeviceError::Open {
        role,
        name: name.to_string(),
        reason: e.to_string(),
    })
}
