//! [`BridgeService`] – drives a [`Bridge`] from its two inbound streams.
//!
//! Runs until the shutdown channel flips to `true`:
//!
//! * a **command loop** feeding PLC commands to [`Bridge::handle_command`],
//! * a **state loop** feeding robot reports to [`Bridge::handle_state`],
//! * a **sweeper** calling [`Bridge::sweep_stale`] every
//!   `sweep_interval`, spawned only when an order TTL is configured.
//!
//! Each stream is consumed by a single task, so reports for one order are
//! settled in arrival order.

use std::sync::Arc;

use plcbridge_middleware::TopicSubscriber;
use plcbridge_types::BridgeError;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::bridge::Bridge;

pub struct BridgeService {
    bridge: Arc<Bridge>,
}

impl BridgeService {
    pub fn new(bridge: Arc<Bridge>) -> Self {
        Self { bridge }
    }

    pub fn bridge(&self) -> Arc<Bridge> {
        Arc::clone(&self.bridge)
    }

    /// Subscribe both streams and run until `shutdown` reports `true` or is
    /// dropped.
    ///
    /// # Errors
    ///
    /// Fails only when a subscription is rejected by the transport.
    pub async fn run(self, shutdown: watch::Receiver<bool>) -> Result<(), BridgeError> {
        let settings = self.bridge.settings().clone();
        let transport = self.bridge.transport();

        let commands = transport.subscribe(&settings.command_topic)?;
        let states = transport.subscribe(&settings.state_filter())?;
        info!(
            command_topic = %settings.command_topic,
            state_filter = %settings.state_filter(),
            order_topic = %settings.order_topic(),
            response_topic = %settings.response_topic,
            "bridge subscribed"
        );

        let mut tasks: Vec<JoinHandle<()>> = vec![
            tokio::spawn(command_loop(
                Arc::clone(&self.bridge),
                commands,
                shutdown.clone(),
            )),
            tokio::spawn(state_loop(Arc::clone(&self.bridge), states, shutdown.clone())),
        ];
        if settings.order_ttl.is_some() {
            tasks.push(tokio::spawn(sweep_loop(
                Arc::clone(&self.bridge),
                shutdown.clone(),
            )));
        }

        for task in tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "bridge task ended abnormally");
            }
        }

        let tracker = self.bridge.tracker();
        let (active, canceled) = (tracker.active_len(), tracker.canceled_len());
        if active + canceled > 0 {
            warn!(active, canceled, "bridge stopped with orders still in flight");
        } else {
            info!("bridge stopped");
        }
        Ok(())
    }
}

/// Resolves once the stop flag is set or its sender is gone.
async fn stopped(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}

async fn command_loop(
    bridge: Arc<Bridge>,
    mut commands: TopicSubscriber,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = stopped(&mut shutdown) => break,
            message = commands.recv() => {
                let Some(message) = message else {
                    debug!("command stream closed");
                    break;
                };
                bridge.handle_command(&message.payload);
            }
        }
    }
}

async fn state_loop(
    bridge: Arc<Bridge>,
    mut states: TopicSubscriber,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = stopped(&mut shutdown) => break,
            message = states.recv() => {
                let Some(message) = message else {
                    debug!("state stream closed");
                    break;
                };
                bridge.handle_state(&message.topic, &message.payload);
            }
        }
    }
}

async fn sweep_loop(bridge: Arc<Bridge>, mut shutdown: watch::Receiver<bool>) {
    let mut ticker = tokio::time::interval(bridge.settings().sweep_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately.
    ticker.tick().await;
    loop {
        tokio::select! {
            _ = stopped(&mut shutdown) => break,
            _ = ticker.tick() => {
                bridge.sweep_stale();
            }
        }
    }
}
