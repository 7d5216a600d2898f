use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "value", rename_all = "camelCase")]
pub enum ScanState {
    Idle,
    PermissionCheck,
    PermissionRequest,
    CameraActive,
    ResultReturned(String),
}

/// One-shot decode flag. The first caller of `try_latch` wins; every later
/// frame of the session is dropped.
#[derive(Debug, Default)]
pub struct DecodeLatch {
    latched: AtomicBool,
}

impl DecodeLatch {
    pub fn try_latch(&self) -> bool {
        self.latched
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn is_latched(&self) -> bool {
        self.latched.load(Ordering::Acquire)
    }
}

/// Camera capture session:
/// idle -> permission-check -> (denied) permission-request -> camera-active
/// -> first decode -> result-returned -> idle.
#[derive(Debug)]
pub struct ScanSession {
    state: ScanState,
    latch: DecodeLatch,
}

impl Default for ScanSession {
    fn default() -> Self {
        Self {
            state: ScanState::Idle,
            latch: DecodeLatch::default(),
        }
    }
}

impl ScanSession {
    pub fn state(&self) -> &ScanState {
        &self.state
    }

    pub fn begin(&mut self) -> &ScanState {
        if self.state != ScanState::Idle {
            log::warn!("scan requested while session is {:?}, restarting", self.state);
        }
        self.latch = DecodeLatch::default();
        self.state = ScanState::PermissionCheck;
        &self.state
    }

    /// Outcome of the permission check; a missing grant moves on to asking.
    pub fn permission_status(&mut self, granted: bool) -> &ScanState {
        if self.state == ScanState::PermissionCheck {
            self.state = if granted {
                ScanState::CameraActive
            } else {
                ScanState::PermissionRequest
            };
        }
        &self.state
    }

    /// Answer to the permission request.
    pub fn permission_result(&mut self, granted: bool) -> &ScanState {
        if self.state == ScanState::PermissionRequest {
            self.state = if granted {
                ScanState::CameraActive
            } else {
                ScanState::Idle
            };
        }
        &self.state
    }

    /// Feeds one analysed frame (the raw values of every barcode found in it).
    /// Absent and empty values are not decodes. Returns the accepted payload
    /// and closes the session; frames after the first accepted value, or
    /// outside an active camera, return `None`.
    pub fn offer_frame(&mut self, raw_values: &[Option<String>]) -> Option<String> {
        if self.latch.is_latched() {
            log::debug!("dropping frame, session already has a result");
            return None;
        }
        if self.state != ScanState::CameraActive {
            return None;
        }
        let value = raw_values
            .iter()
            .flatten()
            .find(|value| !value.is_empty())?;
        if !self.latch.try_latch() {
            return None;
        }
        self.state = ScanState::ResultReturned(value.clone());
        self.finish()
    }

    fn finish(&mut self) -> Option<String> {
        match std::mem::replace(&mut self.state, ScanState::Idle) {
            ScanState::ResultReturned(value) => Some(value),
            _ => None,
        }
    }

    pub fn camera_failed(&mut self, reason: &str) {
        log::error!("camera binding failed: {}", reason);
        self.state = ScanState::Idle;
    }

    pub fn cancel(&mut self) {
        self.state = ScanState::Idle;
    }
}
