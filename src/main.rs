use std::io::{self, BufWriter};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use clap::Parser;
use color_eyre::Result;
use color_eyre::eyre::{WrapErr, eyre};
use tokio::sync::oneshot;
use tracing::{debug, info};

use tracetop::action::Action;
use tracetop::aggregator::Aggregator;
use tracetop::app::{App, ResolvedKeybinds};
use tracetop::config::{Config, load_config, load_config_from_path};
use tracetop::event::{Event, EventHandler};
use tracetop::logging::{LogOptions, init_logging};
use tracetop::pipeline::{Pipeline, run_pacer, run_renderer};
use tracetop::probe::{ProbeSet, parse_probe};
use tracetop::system::filter::FilterSet;
use tracetop::trace::JsonLinesSource;
use tracetop::ui::TerminalSink;

#[derive(Parser)]
#[command(
    name = "tracetop",
    about = "Top-like process and CPU view replayed from a kernel trace"
)]
struct Cli {
    /// JSON-lines trace file, `-` for stdin
    #[arg(value_name = "TRACE", default_value = "-")]
    trace: PathBuf,

    /// Only show these pids/tids (comma separated)
    #[arg(short = 'p', long = "pid", value_delimiter = ',', conflicts_with = "hostname")]
    pid: Vec<u32>,

    /// Only show processes from these hostnames (comma separated)
    #[arg(short = 'n', long = "hostname", value_delimiter = ',')]
    hostname: Vec<String>,

    /// Print events as text instead of starting the display
    #[arg(short = 't', long)]
    textdump: bool,

    /// Follow the children of filtered pids (implies --textdump)
    #[arg(short = 'f', long)]
    child: bool,

    /// Probe specs to count hits for: symbol, symbol+offset or address
    #[arg(short = 'k', long, value_delimiter = ',')]
    kprobes: Vec<String>,

    /// Refresh interval in milliseconds of trace time
    #[arg(long)]
    refresh_rate: Option<u64>,

    /// Path to config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write logs to this file
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Log filter, e.g. `info` or `tracetop=debug`
    #[arg(long)]
    log_level: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long, default_value_t = false)]
    log_json: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    let config = load_config_for_cli(&cli);

    init_logging(LogOptions {
        file: cli.log_file.as_deref(),
        level: &config.general.log_level,
        json: cli.log_json,
        allow_stderr: config.general.text_only,
    })?;

    let aggregator = build_aggregator(&config)?;
    let source = JsonLinesSource::open(&cli.trace)
        .wrap_err_with(|| format!("cannot open trace {}", cli.trace.display()))?;
    info!(trace = %cli.trace.display(), text_only = config.general.text_only, "starting");

    if config.general.text_only {
        run_text(aggregator, source).await
    } else {
        run_interactive(&config, aggregator, source).await
    }
}

fn load_config_for_cli(cli: &Cli) -> Config {
    let mut config = match &cli.config {
        Some(path) => load_config_from_path(path),
        None => load_config(),
    };

    if let Some(rate) = cli.refresh_rate {
        config.general.refresh_rate_ms = rate;
    }
    if let Some(ref level) = cli.log_level {
        config.general.log_level = level.clone();
    }
    if cli.textdump || cli.child {
        config.general.text_only = true;
    }
    if cli.child {
        config.filter.follow_children = true;
    }
    if !cli.pid.is_empty() {
        config.filter.pids = cli.pid.clone();
        config.filter.hostnames.clear();
    }
    if !cli.hostname.is_empty() {
        config.filter.hostnames = cli.hostname.clone();
        config.filter.pids.clear();
    }
    config.probes.kprobes.extend(cli.kprobes.iter().cloned());

    config
}

fn build_aggregator(config: &Config) -> Result<Aggregator> {
    let filter_cfg = &config.filter;
    if !filter_cfg.pids.is_empty() && !filter_cfg.hostnames.is_empty() {
        return Err(eyre!("filtering by pid and by hostname are mutually exclusive"));
    }
    let filter = if filter_cfg.pids.is_empty() {
        FilterSet::hostnames(filter_cfg.hostnames.iter().cloned())
    } else {
        FilterSet::ids(filter_cfg.pids.iter().copied(), filter_cfg.follow_children)
    };

    let probes = config
        .probes
        .kprobes
        .iter()
        .map(|spec| parse_probe(spec).wrap_err_with(|| format!("invalid probe `{spec}`")))
        .collect::<Result<Vec<_>>>()?;

    let refresh = Duration::from_millis(config.general.refresh_rate_ms);
    Ok(Aggregator::new(filter, ProbeSet::new(probes), refresh))
}

fn spawn_named<T, F>(name: &str, f: F) -> Result<JoinHandle<T>>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    thread::Builder::new()
        .name(name.to_string())
        .spawn(f)
        .wrap_err_with(|| format!("failed to spawn {name} thread"))
}

async fn run_text<S>(aggregator: Aggregator, source: JsonLinesSource<S>) -> Result<()>
where
    S: io::BufRead + Send + 'static,
{
    let stop = Arc::new(AtomicBool::new(false));
    let (done_tx, done_rx) = oneshot::channel();

    let mut aggregator = aggregator.with_text_output(Box::new(BufWriter::new(io::stdout())));
    let flag = Arc::clone(&stop);
    // Not joined on interrupt: the producer may be parked in a read.
    spawn_named("producer", move || {
        let stats = aggregator.ingest(source.events(), || flag.load(Ordering::Relaxed));
        aggregator.finish();
        let _ = done_tx.send(stats);
    })?;

    tokio::select! {
        stats = done_rx => {
            let stats = stats.map_err(|_| eyre!("producer thread exited early"))?;
            info!(events = stats.events, rejected = stats.rejected, "text dump complete");
        }
        result = tokio::signal::ctrl_c() => {
            result?;
            stop.store(true, Ordering::Relaxed);
            info!("interrupted");
        }
    }
    Ok(())
}

async fn run_interactive<S>(
    config: &Config,
    aggregator: Aggregator,
    source: JsonLinesSource<S>,
) -> Result<()>
where
    S: io::BufRead + Send + 'static,
{
    let pipeline = Arc::new(Pipeline::new());
    let refresh = Duration::from_millis(config.general.refresh_rate_ms);

    let producer = {
        let pipeline = Arc::clone(&pipeline);
        let mut aggregator = aggregator.with_pipeline(Arc::clone(&pipeline));
        spawn_named("producer", move || {
            let stats = aggregator.ingest(source.events(), || pipeline.is_cancelled());
            aggregator.finish();
            stats
        })?
    };

    let pacer = {
        let pipeline = Arc::clone(&pipeline);
        spawn_named("pacer", move || run_pacer(&pipeline, refresh))?
    };

    let app = App::new(config);
    let keybinds = app.keybinds.clone();
    let (renderer_tx, renderer_rx) = oneshot::channel();
    let renderer = {
        let pipeline = Arc::clone(&pipeline);
        spawn_named("renderer", move || {
            let mut sink = TerminalSink::new(app);
            let outcome = run_renderer(&pipeline, &mut sink);
            let _ = renderer_tx.send(());
            outcome
        })?
    };

    let controlled = control(&pipeline, &keybinds, renderer_rx).await;
    pipeline.cancel();

    let ticks = pacer
        .join()
        .map_err(|_| eyre!("pacer thread panicked"))?;
    let rendered = renderer
        .join()
        .map_err(|_| eyre!("renderer thread panicked"))??;
    if producer.is_finished() {
        let stats = producer
            .join()
            .map_err(|_| eyre!("producer thread panicked"))?;
        info!(
            events = stats.events,
            rejected = stats.rejected,
            snapshots = stats.snapshots,
            "producer stopped"
        );
    } else {
        debug!("producer still blocked on the trace source, not waiting for it");
    }
    info!(ticks, rendered, "shut down");
    controlled
}

/// Drive pause/quit from the keyboard until quit, Ctrl-C, or the renderer
/// stopping on its own.
async fn control(
    pipeline: &Pipeline,
    keybinds: &ResolvedKeybinds,
    mut renderer_done: oneshot::Receiver<()>,
) -> Result<()> {
    let mut events = EventHandler::new();

    loop {
        tokio::select! {
            event = events.next() => match event {
                Some(Event::Key(key)) => match keybinds.map_key(key) {
                    Action::Quit => break,
                    Action::TogglePause => {
                        let paused = pipeline.toggle_pause();
                        info!(paused, "pause toggled");
                    }
                    Action::None => {}
                },
                None => break,
            },
            result = tokio::signal::ctrl_c() => {
                result?;
                break;
            }
            _ = &mut renderer_done => break,
        }
    }
    Ok(())
}
