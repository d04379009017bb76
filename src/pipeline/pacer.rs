use std::time::Duration;

use tracing::{debug, info};

use super::Pipeline;

/// Post one pacing token per `interval` until cancelled. Blocks while the
/// pipeline is paused.
pub fn run_pacer(pipeline: &Pipeline, interval: Duration) -> u64 {
    info!(interval_ms = millis(interval), "pacer started");
    let mut ticks = 0u64;
    while pipeline.sleep_interval(interval) {
        pipeline.post_pacing_token();
        ticks += 1;
        if !pipeline.wait_while_paused() {
            break;
        }
    }
    debug!(ticks, "pacer stopped");
    ticks
}

fn millis(interval: Duration) -> u64 {
    u64::try_from(interval.as_millis()).unwrap_or(u64::MAX)
}
