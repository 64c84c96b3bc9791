//! Response emitter: verdict → `BASE:LETTER` on the PLC response topic.
//!
//! Every verdict is published as-is: no batching, and repeated identical
//! verdicts (two RUNNING reports in a row) are each published.

use std::sync::Arc;

use plcbridge_middleware::Transport;
use plcbridge_types::{BridgeError, PlcResponse, PlcStatus};
use tracing::info;

pub struct ResponseEmitter {
    transport: Arc<dyn Transport>,
    topic: String,
}

impl ResponseEmitter {
    pub fn new(transport: Arc<dyn Transport>, topic: impl Into<String>) -> Self {
        Self {
            transport,
            topic: topic.into(),
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Publish the response for `command` (raw or base form). Never retained.
    pub fn emit(&self, command: &str, status: PlcStatus) -> Result<PlcResponse, BridgeError> {
        let response = PlcResponse::new(command, status);
        let payload = response.to_string();
        self.transport
            .publish(&self.topic, payload.clone().into_bytes(), false)?;
        info!(topic = %self.topic, response = %payload, "PLC response published");
        Ok(response)
    }
}
