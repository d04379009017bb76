use color_eyre::Result;
use tracing::{debug, info, warn};

use super::Pipeline;
use crate::system::snapshot::Snapshot;

/// Consumer of snapshots, one at a time and in append order.
pub trait DisplaySink {
    /// Called once, after the first snapshot exists.
    fn init(&mut self) -> Result<()>;

    /// Show `snapshot`. The snapshot is only borrowed for the call.
    fn render(&mut self, index: u64, snapshot: &Snapshot) -> Result<()>;

    fn shutdown(&mut self) -> Result<()>;
}

/// Render frames until the pipeline is cancelled. A sink error cancels the
/// pipeline and is returned after the sink is shut down. Returns the number
/// of frames rendered.
pub fn run_renderer<S: DisplaySink + ?Sized>(pipeline: &Pipeline, sink: &mut S) -> Result<u64> {
    if !pipeline.wait_bootstrap() {
        debug!("renderer cancelled before the first snapshot");
        return Ok(0);
    }
    sink.init()?;
    info!("display initialised");

    let mut rendered = 0u64;
    let mut outcome = Ok(());
    while let Some(frame) = pipeline.next_frame() {
        let _span = tracing::debug_span!("renderer.render", index = frame.index()).entered();
        if let Err(err) = sink.render(frame.index(), &frame) {
            warn!(error = %err, "display sink failed, stopping");
            outcome = Err(err);
            drop(frame);
            pipeline.cancel();
            break;
        }
        rendered += 1;
    }

    sink.shutdown()?;
    outcome.map(|()| rendered)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Arc;
    use std::thread;

    use color_eyre::eyre::eyre;

    use super::*;
    use crate::system::cpu::CpuTable;
    use crate::system::filter::FilterSet;
    use crate::system::perf_counter::CounterRegistry;
    use crate::system::process::ProcessTable;
    use crate::system::snapshot::SnapshotBuilder;

    #[derive(Default)]
    struct FailingSink {
        inits: u32,
        shutdowns: u32,
    }

    impl DisplaySink for FailingSink {
        fn init(&mut self) -> Result<()> {
            self.inits += 1;
            Ok(())
        }

        fn render(&mut self, _index: u64, _snapshot: &Snapshot) -> Result<()> {
            Err(eyre!("terminal gone"))
        }

        fn shutdown(&mut self) -> Result<()> {
            self.shutdowns += 1;
            Ok(())
        }
    }

    #[test]
    fn cancelled_before_bootstrap_never_initialises() {
        let pipeline = Pipeline::new();
        pipeline.cancel();
        let mut sink = FailingSink::default();
        assert_eq!(run_renderer(&pipeline, &mut sink).unwrap(), 0);
        assert_eq!(sink.inits, 0);
        assert_eq!(sink.shutdowns, 0);
    }

    #[test]
    fn sink_error_cancels_pipeline() {
        let pipeline = Arc::new(Pipeline::new());
        let snapshot = SnapshotBuilder {
            processes: &ProcessTable::new(),
            cpus: &CpuTable::new(),
            counters: &CounterRegistry::new(),
            probe_hits: &BTreeMap::new(),
            filter: &FilterSet::Disabled,
        }
        .build(0, 1)
        .unwrap();
        pipeline.try_acquire_build_permit().unwrap().append(snapshot);
        pipeline.post_pacing_token();

        let worker = {
            let pipeline = Arc::clone(&pipeline);
            thread::spawn(move || {
                let mut sink = FailingSink::default();
                let result = run_renderer(&pipeline, &mut sink);
                (result.is_err(), sink.inits, sink.shutdowns)
            })
        };
        assert_eq!(worker.join().unwrap(), (true, 1, 1));
        assert!(pipeline.is_cancelled());
        assert_eq!(pipeline.stats().build_permits, 1);
    }
}
