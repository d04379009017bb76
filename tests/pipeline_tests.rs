use std::collections::BTreeMap;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use color_eyre::Result;
use tracetop::aggregator::Aggregator;
use tracetop::pipeline::{DisplaySink, Pipeline, run_pacer, run_renderer};
use tracetop::probe::ProbeSet;
use tracetop::system::cpu::CpuTable;
use tracetop::system::filter::FilterSet;
use tracetop::system::perf_counter::CounterRegistry;
use tracetop::system::process::ProcessTable;
use tracetop::system::snapshot::{Snapshot, SnapshotBuilder};
use tracetop::trace::Event;

const SEC: u64 = 1_000_000_000;

#[derive(Default)]
struct RecordingSink {
    frames: Vec<(u64, u64, u64)>,
    inits: u32,
    shutdowns: u32,
}

impl DisplaySink for RecordingSink {
    fn init(&mut self) -> Result<()> {
        self.inits += 1;
        Ok(())
    }

    fn render(&mut self, index: u64, snapshot: &Snapshot) -> Result<()> {
        self.frames
            .push((index, snapshot.window_start, snapshot.window_end));
        Ok(())
    }

    fn shutdown(&mut self) -> Result<()> {
        self.shutdowns += 1;
        Ok(())
    }
}

fn empty_snapshot(start: u64, end: u64) -> Snapshot {
    SnapshotBuilder {
        processes: &ProcessTable::new(),
        cpus: &CpuTable::new(),
        counters: &CounterRegistry::new(),
        probe_hits: &BTreeMap::new(),
        filter: &FilterSet::Disabled,
    }
    .build(start, end)
    .unwrap()
}

fn wait_for(deadline: Duration, mut done: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < deadline {
        if done() {
            return true;
        }
        thread::sleep(Duration::from_millis(1));
    }
    done()
}

fn ticking_trace(seconds: u64) -> Vec<Event> {
    (0..seconds * 10)
        .map(|i| {
            Event::new("sched_wakeup", i * SEC / 10)
                .on_cpu(0)
                .with_ctx_int("pid", 1)
                .with_ctx_int("tid", 1)
                .with_ctx_int("ppid", 0)
                .with_ctx_str("procname", "init")
        })
        .collect()
}

#[test]
fn frames_render_in_append_order() {
    let pipeline = Arc::new(Pipeline::new());
    let mut agg = Aggregator::new(FilterSet::Disabled, ProbeSet::default(), Duration::from_secs(1))
        .with_pipeline(Arc::clone(&pipeline));

    let producer = thread::spawn(move || {
        agg.ingest(ticking_trace(6), || false);
        agg.finish();
        agg.stats()
    });
    let pacer = {
        let pipeline = Arc::clone(&pipeline);
        thread::spawn(move || run_pacer(&pipeline, Duration::from_millis(2)))
    };
    let renderer = {
        let pipeline = Arc::clone(&pipeline);
        thread::spawn(move || {
            let mut sink = RecordingSink::default();
            run_renderer(&pipeline, &mut sink).unwrap();
            sink
        })
    };

    let stats = producer.join().unwrap();
    assert!(wait_for(Duration::from_secs(10), || {
        pipeline.stats().rendered == stats.snapshots
    }));
    pipeline.cancel();
    pacer.join().unwrap();
    let sink = renderer.join().unwrap();

    // five full windows plus the tail flushed at end of stream
    assert_eq!(stats.snapshots, 6);
    let indices: Vec<u64> = sink.frames.iter().map(|f| f.0).collect();
    assert_eq!(indices, (0..6).collect::<Vec<_>>());
    for pair in sink.frames.windows(2) {
        assert_eq!(pair[0].2, pair[1].1, "windows are contiguous");
    }
    assert_eq!((sink.inits, sink.shutdowns), (1, 1));
    assert_eq!(pipeline.stats().permit_holders(), 1);
    assert_eq!(pipeline.stats().build_permits, 1);
}

#[test]
fn producer_stalls_after_one_unconsumed_snapshot() {
    let pipeline = Arc::new(Pipeline::new());
    let producer = {
        let pipeline = Arc::clone(&pipeline);
        thread::spawn(move || {
            let mut appended = 0;
            for i in 0..3 {
                let Some(permit) = pipeline.acquire_build_permit() else {
                    break;
                };
                permit.append(empty_snapshot(i, i + 1));
                appended += 1;
            }
            appended
        })
    };

    assert!(wait_for(Duration::from_secs(5), || pipeline.stats().appended == 1));
    thread::sleep(Duration::from_millis(50));
    let stats = pipeline.stats();
    assert_eq!(stats.appended, 1);
    assert_eq!(stats.queued, 1);
    assert_eq!(stats.build_permits, 0);
    assert_eq!(stats.permit_holders(), 1);

    pipeline.cancel();
    assert_eq!(producer.join().unwrap(), 1);
    let stats = pipeline.stats();
    assert_eq!(stats.queued, 0);
    assert_eq!(stats.build_permits, 1);
    assert_eq!(stats.permit_holders(), 1);
}

#[test]
fn cancel_stops_every_role_within_one_interval() {
    let interval = Duration::from_secs(2);
    let pipeline = Arc::new(Pipeline::new());
    pipeline.pause();

    // producer parked on the permit behind an unrendered snapshot
    let producer = {
        let pipeline = Arc::clone(&pipeline);
        thread::spawn(move || {
            for i in 0..2 {
                match pipeline.acquire_build_permit() {
                    Some(permit) => {
                        permit.append(empty_snapshot(i, i + 1));
                    }
                    None => return,
                }
            }
        })
    };
    let pacer = {
        let pipeline = Arc::clone(&pipeline);
        thread::spawn(move || run_pacer(&pipeline, interval))
    };
    let renderer = {
        let pipeline = Arc::clone(&pipeline);
        thread::spawn(move || {
            let mut sink = RecordingSink::default();
            run_renderer(&pipeline, &mut sink).unwrap();
            sink
        })
    };

    assert!(wait_for(Duration::from_secs(5), || pipeline.stats().appended == 1));
    thread::sleep(Duration::from_millis(20));

    let start = Instant::now();
    pipeline.cancel();
    producer.join().unwrap();
    pacer.join().unwrap();
    let sink = renderer.join().unwrap();
    assert!(start.elapsed() < interval);

    assert!(sink.frames.is_empty());
    assert_eq!(sink.shutdowns, 1);
    let stats = pipeline.stats();
    assert_eq!(stats.build_permits, 1);
    assert_eq!(stats.permit_holders(), 1);
    assert!(!stats.in_flight);
}

#[test]
fn pause_keeps_queued_snapshot() {
    let pipeline = Pipeline::new();
    pipeline
        .try_acquire_build_permit()
        .unwrap()
        .append(empty_snapshot(0, 1));
    pipeline.pause();
    pipeline.post_pacing_token();
    assert_eq!(pipeline.stats().queued, 1);

    pipeline.resume();
    let frame = pipeline.next_frame().unwrap();
    assert_eq!(frame.index(), 0);
}
