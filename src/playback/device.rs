use crate::error::PlaybackError;

/// Tracks the device identifier assigned by the remote session.
///
/// The id is recorded on `ready` and kept across `not_ready` for
/// diagnostics; only [`DeviceRegistry::clear`] forgets it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceRegistry {
    device_id: Option<String>,
    ready: bool,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_ready(&mut self, device_id: &str) {
        if let Some(known) = &self.device_id {
            if known != device_id {
                log::warn!("device changed from {known} to {device_id} without reconnecting");
            }
        }
        log::debug!("device {device_id} ready");
        self.device_id = Some(device_id.to_string());
        self.ready = true;
    }

    pub fn on_not_ready(&mut self, device_id: &str) {
        log::debug!("device {device_id} went offline");
        self.ready = false;
    }

    pub fn clear(&mut self) {
        self.device_id = None;
        self.ready = false;
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Last known device id, ready or not.
    pub fn device_id(&self) -> Option<&str> {
        self.device_id.as_deref()
    }

    /// The device to address commands to, or the failure to report.
    pub fn require(&self) -> Result<&str, PlaybackError> {
        match (&self.device_id, self.ready) {
            (Some(id), true) => Ok(id),
            _ => Err(PlaybackError::device_unavailable()),
        }
    }
}
