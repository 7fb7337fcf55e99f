//! Monitor Service
//!
//! Runs a [`HeartRateMonitor`] on a single tokio task. Platform callbacks and
//! control commands are both funnelled into that task and handled strictly
//! one at a time, so the monitor itself needs no locking.

use crate::domain::sink::EventSink;
use crate::infrastructure::bluetooth::adapter::{RadioAdapter, RadioEvent};
use crate::infrastructure::bluetooth::monitor::HeartRateMonitor;
use anyhow::Result;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Control surface of a running monitor.
pub enum MonitorCommand {
    Start,
    Stop,
    ReplaceSink(Box<dyn EventSink>),
    Shutdown,
}

/// Handle to a monitor running on its own task.
pub struct MonitorHandle<A: RadioAdapter> {
    command_sender: mpsc::UnboundedSender<MonitorCommand>,
    task: JoinHandle<HeartRateMonitor<A>>,
}

impl<A: RadioAdapter> MonitorHandle<A> {
    pub fn start(&self) -> Result<()> {
        self.send(MonitorCommand::Start)
    }

    pub fn stop(&self) -> Result<()> {
        self.send(MonitorCommand::Stop)
    }

    pub fn replace_sink(&self, sink: Box<dyn EventSink>) -> Result<()> {
        self.send(MonitorCommand::ReplaceSink(sink))
    }

    /// Stop the monitor and hand it back once its task has finished.
    pub async fn shutdown(self) -> Result<HeartRateMonitor<A>> {
        // The task may already have ended because the radio went away
        let _ = self.command_sender.send(MonitorCommand::Shutdown);
        let monitor = self.task.await?;
        Ok(monitor)
    }

    fn send(&self, command: MonitorCommand) -> Result<()> {
        self.command_sender
            .send(command)
            .map_err(|_| anyhow::anyhow!("Monitor task is no longer running"))
    }
}

/// Spawn `monitor` on the current tokio runtime, fed by `radio_events`.
pub fn spawn<A>(
    monitor: HeartRateMonitor<A>,
    radio_events: mpsc::UnboundedReceiver<RadioEvent>,
) -> MonitorHandle<A>
where
    A: RadioAdapter + Send + 'static,
{
    let (command_sender, command_receiver) = mpsc::unbounded_channel();
    let task = tokio::spawn(run(monitor, command_receiver, radio_events));
    MonitorHandle {
        command_sender,
        task,
    }
}

async fn run<A: RadioAdapter>(
    mut monitor: HeartRateMonitor<A>,
    mut commands: mpsc::UnboundedReceiver<MonitorCommand>,
    mut radio_events: mpsc::UnboundedReceiver<RadioEvent>,
) -> HeartRateMonitor<A> {
    info!("Monitor service running");

    loop {
        tokio::select! {
            // Control commands take priority over queued radio events
            biased;

            command = commands.recv() => match command {
                Some(MonitorCommand::Start) => monitor.start(),
                Some(MonitorCommand::Stop) => monitor.stop(),
                Some(MonitorCommand::ReplaceSink(sink)) => {
                    debug!("Replacing event sink");
                    monitor.replace_sink(sink);
                }
                Some(MonitorCommand::Shutdown) | None => break,
            },
            event = radio_events.recv() => match event {
                Some(event) => monitor.handle(event),
                None => {
                    info!("Radio event stream closed");
                    break;
                }
            },
        }
    }

    monitor.stop();
    info!("Monitor service stopped");
    monitor
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{AdapterState, ConnectionPhase, PeripheralHandle};
    use crate::domain::sink::recording::{Recorded, RecordingSink};
    use crate::infrastructure::bluetooth::adapter::recording::{RadioCommand, RecordingRadio};
    use crate::infrastructure::bluetooth::uuids::ServiceId;
    use std::time::Duration;

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_events_are_processed_in_order() {
        let (radio_tx, radio_rx) = mpsc::unbounded_channel();
        let sink = RecordingSink::new();
        let monitor = HeartRateMonitor::new(RecordingRadio::new(), Box::new(sink.clone()));
        let handle = spawn(monitor, radio_rx);

        handle.start().unwrap();
        radio_tx
            .send(RadioEvent::PowerStateChanged {
                state: AdapterState::PoweredOn,
            })
            .unwrap();
        radio_tx
            .send(RadioEvent::PeripheralDiscovered {
                peripheral: PeripheralHandle::new("strap", None),
                rssi: None,
            })
            .unwrap();
        settle().await;

        let mut monitor = handle.shutdown().await.unwrap();
        assert_eq!(
            monitor.adapter_mut().take(),
            vec![
                RadioCommand::ScanStart(ServiceId::ALL.to_vec()),
                RadioCommand::ScanStop,
                RadioCommand::Connect("strap".into()),
                // Shutdown stops the monitor, cancelling the pending connection
                RadioCommand::Disconnect("strap".into()),
            ]
        );
        assert_eq!(
            sink.phases(),
            vec![
                ConnectionPhase::Scanning,
                ConnectionPhase::Connecting,
                ConnectionPhase::Idle
            ]
        );
    }

    #[tokio::test]
    async fn test_replace_sink_takes_effect() {
        let (radio_tx, radio_rx) = mpsc::unbounded_channel();
        let first = RecordingSink::new();
        let second = RecordingSink::new();
        let monitor = HeartRateMonitor::new(RecordingRadio::new(), Box::new(first.clone()));
        let handle = spawn(monitor, radio_rx);

        handle.replace_sink(Box::new(second.clone())).unwrap();
        handle.start().unwrap();
        radio_tx
            .send(RadioEvent::PowerStateChanged {
                state: AdapterState::Unauthorized,
            })
            .unwrap();
        settle().await;
        handle.shutdown().await.unwrap();

        assert!(first.events().is_empty());
        assert!(second
            .values()
            .iter()
            .any(|e| matches!(e, Recorded::Error(err) if err.is_fatal())));
    }

    #[tokio::test]
    async fn test_closed_radio_stream_ends_task() {
        let (radio_tx, radio_rx) = mpsc::unbounded_channel::<RadioEvent>();
        let monitor = HeartRateMonitor::new(RecordingRadio::new(), Box::new(RecordingSink::new()));
        let handle = spawn(monitor, radio_rx);
        drop(radio_tx);

        let monitor = tokio::time::timeout(Duration::from_secs(1), handle.shutdown())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(monitor.phase(), ConnectionPhase::Idle);
    }
}
