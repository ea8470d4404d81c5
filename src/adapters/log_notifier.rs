//! Notifier that writes alerts to the log instead of an external channel.

use async_trait::async_trait;
use tracing::warn;

use crate::domain::Payload;

use super::telegram::format_alert;
use super::{Capability, CapabilityError};

/// Notification capability for dry runs and local setups
#[derive(Debug, Default)]
pub struct LogNotifier;

impl LogNotifier {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Capability for LogNotifier {
    fn name(&self) -> &str {
        "log"
    }

    async fn invoke(&self, input: Payload) -> Result<Payload, CapabilityError> {
        warn!(alert = %format_alert(&input), "Notification");
        Ok(input)
    }
}
