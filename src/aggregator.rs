//! Live model owner. Everything event dispatch mutates lives here, and the
//! ingest thread is the only one that touches it.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::EventError;
use crate::pipeline::Pipeline;
use crate::probe::ProbeSet;
use crate::router::{self, TextDump};
use crate::system::cpu::CpuTable;
use crate::system::filter::FilterSet;
use crate::system::perf_counter::CounterRegistry;
use crate::system::process::ProcessTable;
use crate::system::snapshot::{Snapshot, SnapshotBuilder};
use crate::trace::Event;

/// Refresh boundaries measured in trace time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WindowClock {
    refresh_ns: u64,
    last_update: Option<u64>,
    latest: Option<u64>,
}

impl WindowClock {
    pub fn new(refresh: Duration) -> Self {
        WindowClock {
            refresh_ns: u64::try_from(refresh.as_nanos()).unwrap_or(u64::MAX).max(1),
            last_update: None,
            latest: None,
        }
    }

    pub fn refresh_ns(&self) -> u64 {
        self.refresh_ns
    }

    /// Feed an event timestamp. Returns the window that just closed, if any.
    /// The first timestamp seen opens the first window.
    pub fn advance(&mut self, timestamp: u64) -> Option<(u64, u64)> {
        self.latest = Some(timestamp);
        let last = *self.last_update.get_or_insert(timestamp);
        if timestamp.saturating_sub(last) >= self.refresh_ns {
            self.last_update = Some(timestamp);
            Some((last, timestamp))
        } else {
            None
        }
    }

    fn close_at(&mut self, timestamp: u64) {
        self.last_update = Some(timestamp);
        self.latest = Some(timestamp);
    }

    /// The window still open, if any event landed in it after it opened.
    pub fn pending(&self) -> Option<(u64, u64)> {
        match (self.last_update, self.latest) {
            (Some(start), Some(end)) if end > start => Some((start, end)),
            _ => None,
        }
    }
}

pub(crate) enum Output {
    /// Model only; no snapshots and no text.
    Detached,
    Snapshots(Arc<Pipeline>),
    Text(TextDump<Box<dyn Write + Send>>),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IngestStats {
    pub events: u64,
    pub rejected: u64,
    pub snapshots: u64,
    pub dropped_snapshots: u64,
}

pub struct Aggregator {
    pub(crate) processes: ProcessTable,
    pub(crate) cpus: CpuTable,
    pub(crate) counters: CounterRegistry,
    pub(crate) filter: FilterSet,
    pub(crate) probes: ProbeSet,
    pub(crate) window: WindowClock,
    pub(crate) output: Output,
    stats: IngestStats,
}

impl Aggregator {
    pub fn new(filter: FilterSet, probes: ProbeSet, refresh: Duration) -> Self {
        Aggregator {
            processes: ProcessTable::new(),
            cpus: CpuTable::new(),
            counters: CounterRegistry::new(),
            filter,
            probes,
            window: WindowClock::new(refresh),
            output: Output::Detached,
            stats: IngestStats::default(),
        }
    }

    /// Publish a snapshot into `pipeline` at every window boundary.
    #[must_use]
    pub fn with_pipeline(mut self, pipeline: Arc<Pipeline>) -> Self {
        self.output = Output::Snapshots(pipeline);
        self
    }

    /// Print every accepted event to `out` instead of building snapshots.
    #[must_use]
    pub fn with_text_output(mut self, out: Box<dyn Write + Send>) -> Self {
        self.output = Output::Text(TextDump::new(out));
        self
    }

    pub fn is_text_mode(&self) -> bool {
        matches!(self.output, Output::Text(_))
    }

    pub fn processes(&self) -> &ProcessTable {
        &self.processes
    }

    pub fn cpus(&self) -> &CpuTable {
        &self.cpus
    }

    pub fn counters(&self) -> &CounterRegistry {
        &self.counters
    }

    pub fn filter(&self) -> &FilterSet {
        &self.filter
    }

    pub fn probes(&self) -> &ProbeSet {
        &self.probes
    }

    pub fn stats(&self) -> IngestStats {
        self.stats
    }

    /// Run every handler for `event`. The first handler error ends the
    /// event and is returned; the model keeps whatever earlier handlers did.
    pub fn dispatch(&mut self, event: &Event) -> Result<(), EventError> {
        self.stats.events += 1;
        let result = router::dispatch(self, event);
        if result.is_err() {
            self.stats.rejected += 1;
        }
        result
    }

    /// Dispatch every event until the source ends or `stop` says so.
    /// Rejected events are logged and skipped.
    pub fn ingest<I>(&mut self, events: I, stop: impl Fn() -> bool) -> IngestStats
    where
        I: IntoIterator<Item = Event>,
    {
        for event in events {
            if stop() {
                debug!("ingest stopped");
                break;
            }
            if let Err(err) = self.dispatch(&event) {
                debug!(error = %err, timestamp = event.timestamp, "event rejected");
            }
        }
        info!(
            events = self.stats.events,
            rejected = self.stats.rejected,
            snapshots = self.stats.snapshots,
            "trace source drained"
        );
        self.stats
    }

    /// Flush what the end of the stream left behind: the open window in
    /// interactive mode, a dangling syscall line in text mode.
    pub fn finish(&mut self) {
        if let Output::Text(dump) = &mut self.output {
            if let Err(err) = dump.finish() {
                warn!(error = %err, "text output failed");
            }
            return;
        }
        if let Some((start, end)) = self.window.pending() {
            self.window.close_at(end);
            self.publish(start, end);
        }
    }

    /// Freeze the current model as the window `[start, end)`.
    pub fn snapshot(&self, start: u64, end: u64) -> Option<Snapshot> {
        SnapshotBuilder {
            processes: &self.processes,
            cpus: &self.cpus,
            counters: &self.counters,
            probe_hits: self.probes.hits(),
            filter: &self.filter,
        }
        .build(start, end)
    }

    /// Build and append one snapshot. Blocks while the previous one is
    /// still waiting to be rendered.
    pub(crate) fn publish(&mut self, start: u64, end: u64) {
        let Output::Snapshots(pipeline) = &self.output else {
            return;
        };
        let pipeline = Arc::clone(pipeline);
        let Some(permit) = pipeline.acquire_build_permit() else {
            return;
        };

        let _span = tracing::debug_span!("aggregator.build_snapshot", start, end).entered();
        match self.snapshot(start, end) {
            Some(snapshot) => {
                let index = permit.append(snapshot);
                self.stats.snapshots += 1;
                debug!(index, processes = self.processes.len(), "snapshot appended");
            }
            None => {
                self.stats.dropped_snapshots += 1;
                warn!(start, end, "snapshot allocation failed, window skipped");
            }
        }
    }
}
