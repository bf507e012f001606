//! Periodic heartbeat emitter
//!
//! Runs as its own task and writes straight to the response sink, so a saturated worker
//! pool or a full job queue cannot delay it.

use super::sink::ResponseSink;
use keytag_common::protocol::SystemMessage;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Start emitting a heartbeat every `period`, first one `period` from now
pub fn spawn_heartbeat(
    sink: ResponseSink,
    period: Duration,
    stop: CancellationToken,
) -> JoinHandle<u64> {
    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut sent = 0u64;

        loop {
            tokio::select! {
                _ = stop.cancelled() => break,
                _ = ticker.tick() => {
                    if sink.send(SystemMessage::Heartbeat).await.is_err() {
                        warn!("Response writer gone, stopping heartbeat");
                        break;
                    }
                    sent += 1;
                    debug!(count = sent, "Heartbeat sent");
                }
            }
        }

        sent
    })
}
