// Capture stream plus the two outputs. The router holds all three streams or
// none of them: a backend opens the whole route or fails as a unit, and
// closing blocks until the callbacks have retired.

use crate::audio_api::{DeviceSelection, RouteDevices, RoutingWarning};
use crate::error::{DeviceError, StreamWriteError};

use super::playback::{PlaybackQueue, PlaybackSlot};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouterState {
    Uninitialized,
    Routing,
    Reconfiguring,
    // only an explicit reconfigure leaves this
    Stopped,
}

pub trait OpenRoute {
    fn devices(&self) -> &RouteDevices;

    // capture first, then the outputs; must not return while a callback runs
    fn close(self);
}

pub trait RouteBackend {
    type Route: OpenRoute;

    // either every stream opens or none stays open
    fn open(
        &mut self,
        selection: &DeviceSelection,
        slot: PlaybackSlot,
    ) -> Result<(Self::Route, Vec<RoutingWarning>), DeviceError>;

    fn take_write_errors(&self) -> Vec<StreamWriteError>;
}

pub struct AudioRouter<B: RouteBackend> {
    backend: B,
    queue: PlaybackQueue,
    state: RouterState,
    route: Option<B::Route>,
}

impl<B: RouteBackend> AudioRouter<B> {
    pub fn new(backend: B, queue: PlaybackQueue) -> Self {
        Self {
            backend,
            queue,
            state: RouterState::Uninitialized,
            route: None,
        }
    }

    pub fn state(&self) -> RouterState {
        self.state
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn devices(&self) -> Option<&RouteDevices> {
        self.route.as_ref().map(OpenRoute::devices)
    }

    // a failure leaves the router Uninitialized; devices replaced by
    // defaults come back as warnings
    pub fn start(
        &mut self,
        selection: &DeviceSelection,
    ) -> Result<Vec<RoutingWarning>, DeviceError> {
        if self.state != RouterState::Uninitialized {
            return Err(DeviceError::InvalidState {
                state: self.state,
                operation: "start",
            });
        }

        let (route, warnings) = self.backend.open(selection, self.queue.slot())?;
        log_route(route.devices(), &warnings);
        self.route = Some(route);
        self.state = RouterState::Routing;
        Ok(warnings)
    }

    // a failed reopen leaves the router Stopped with nothing restored; the
    // active clip is cut off either way
    pub fn reconfigure(
        &mut self,
        selection: &DeviceSelection,
    ) -> Result<Vec<RoutingWarning>, DeviceError> {
        self.state = RouterState::Reconfiguring;
        self.close_route();

        match self.backend.open(selection, self.queue.slot()) {
            Ok((route, warnings)) => {
                log_route(route.devices(), &warnings);
                self.route = Some(route);
                self.state = RouterState::Routing;
                Ok(warnings)
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to reopen audio route, routing stopped");
                self.state = RouterState::Stopped;
                Err(e)
            }
        }
    }

    pub fn stop(&mut self) {
        self.close_route();
        if self.state != RouterState::Stopped {
            tracing::info!("audio routing stopped");
        }
        self.state = RouterState::Stopped;
    }

    pub fn report_write_errors(&self) -> Vec<StreamWriteError> {
        let errors = self.backend.take_write_errors();
        for err in &errors {
            tracing::warn!(output = err.output, skipped = err.skipped, "{err}");
        }
        errors
    }

    fn close_route(&mut self) {
        if let Some(route) = self.route.take() {
            route.close();
            // the cursor went down with the callback
            self.queue.mark_idle();
        }
    }
}

impl<B: RouteBackend> Drop for AudioRouter<B> {
    fn drop(&mut self) {
        self.close_route();
    }
}

fn log_route(devices: &RouteDevices, warnings: &[RoutingWarning]) {
    for warning in warnings {
        tracing::warn!("{warning}");
    }
    tracing::info!(
        capture = %devices.capture,
        virtual_cable = %devices.virtual_cable,
        speaker = %devices.speaker,
        "audio routing started"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::clip::Clip;
    use crate::shared::ClipId;
    use std::sync::{Arc, Mutex};

    type Log = Arc<Mutex<Vec<String>>>;

    struct FakeRoute {
        devices: RouteDevices,
        log: Log,
        _slot: PlaybackSlot,
    }

    impl OpenRoute for FakeRoute {
        fn devices(&self) -> &RouteDevices {
            &self.devices
        }

        fn close(self) {
            let mut log = self.log.lock().unwrap();
            log.push(format!("close capture {}", self.devices.capture));
            log.push(format!("close virtual cable {}", self.devices.virtual_cable));
            log.push(format!("close speaker {}", self.devices.speaker));
        }
    }

    #[derive(Default)]
    struct FakeBackend {
        fail: bool,
        log: Log,
    }

    impl RouteBackend for FakeBackend {
        type Route = FakeRoute;

        fn open(
            &mut self,
            selection: &DeviceSelection,
            slot: PlaybackSlot,
        ) -> Result<(FakeRoute, Vec<RoutingWarning>), DeviceError> {
            if self.fail {
                return Err(DeviceError::Open {
                    role: "capture",
                    name: "mic".to_string(),
                    reason: "busy".to_string(),
                });
            }
            let capture = selection.capture.clone().unwrap_or_else(|| "mic".to_string());
            self.log.lock().unwrap().push(format!("open {capture}"));

            let mut warnings = Vec::new();
            let virtual_cable = match &selection.virtual_cable {
                Some(name) => name.clone(),
                None => {
                    warnings.push(RoutingWarning::VirtualCableMissing {
                        fallback: "speakers".to_string(),
                    });
                    "speakers".to_string()
                }
            };
            let route = FakeRoute {
                devices: RouteDevices {
                    capture,
                    virtual_cable,
                    speaker: "speakers".to_string(),
                },
                log: Arc::clone(&self.log),
                _slot: slot,
            };
            Ok((route, warnings))
        }

        fn take_write_errors(&self) -> Vec<StreamWriteError> {
            vec![]
        }
    }

    fn router() -> (AudioRouter<FakeBackend>, Log) {
        let backend = FakeBackend::default();
        let log = Arc::clone(&backend.log);
        (AudioRouter::new(backend, PlaybackQueue::new()), log)
    }

    fn cable() -> DeviceSelection {
        DeviceSelection::default().with_virtual_cable("CABLE Input")
    }

    #[test]
    fn test_start_enters_routing() {
        let (mut router, _) = router();
        assert_eq!(router.state(), RouterState::Uninitialized);

        let warnings = router.start(&cable()).unwrap();
        assert!(warnings.is_empty());
        assert_eq!(router.state(), RouterState::Routing);
        assert_eq!(router.devices().unwrap().virtual_cable, "CABLE Input");
    }

    #[test]
    fn test_missing_cable_is_a_warning_not_an_error() {
        let (mut router, _) = router();
        let warnings = router.start(&DeviceSelection::default()).unwrap();
        assert_eq!(
            warnings,
            vec![RoutingWarning::VirtualCableMissing {
                fallback: "speakers".to_string()
            }]
        );
        assert_eq!(router.state(), RouterState::Routing);
    }

    #[test]
    fn test_failed_start_stays_uninitialized() {
        let (mut router, _) = router();
        router.backend.fail = true;
        assert!(router.start(&cable()).is_err());
        assert_eq!(router.state(), RouterState::Uninitialized);
        assert!(router.devices().is_none());
    }

    #[test]
    fn test_stop_is_idempotent() {
        let (mut router, log) = router();
        router.start(&cable()).unwrap();

        router.stop();
        assert_eq!(router.state(), RouterState::Stopped);
        let closes = log.lock().unwrap().len();

        router.stop();
        assert_eq!(router.state(), RouterState::Stopped);
        assert_eq!(log.lock().unwrap().len(), closes);
    }

    #[test]
    fn test_stop_before_start() {
        let (mut router, _) = router();
        router.stop();
        router.stop();
        assert_eq!(router.state(), RouterState::Stopped);
        assert!(matches!(
            router.start(&cable()),
            Err(DeviceError::InvalidState { .. })
        ));
    }

    #[test]
    fn test_reconfigure_closes_capture_before_outputs() {
        let (mut router, log) = router();
        router.start(&cable()).unwrap();

        let next = DeviceSelection {
            capture: Some("usb mic".to_string()),
            ..cable()
        };
        router.reconfigure(&next).unwrap();

        let log = log.lock().unwrap();
        assert_eq!(
            *log,
            vec![
                "open mic",
                "close capture mic",
                "close virtual cable CABLE Input",
                "close speaker speakers",
                "open usb mic",
            ]
        );
        assert_eq!(router.state(), RouterState::Routing);
    }

    #[test]
    fn test_failed_reconfigure_with_active_clip_ends_stopped() {
        let (mut router, _) = router();
        router.start(&cable()).unwrap();
        router
            .queue
            .set_active(Clip::from_samples(ClipId::new("boing"), vec![1; 4096]));

        router.backend.fail = true;
        assert!(router.reconfigure(&cable()).is_err());
        assert_eq!(router.state(), RouterState::Stopped);
        assert!(router.devices().is_none());
        assert!(!router.queue.is_active());

        // explicit retry
        router.backend.fail = false;
        router.reconfigure(&cable()).unwrap();
        assert_eq!(router.state(), RouterState::Routing);
    }
}
