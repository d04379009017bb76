use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap};

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::action::Action;
use crate::config::{Config, KeybindsConfig, parse_key};
use crate::format::percent_of;
use crate::system::snapshot::Snapshot;
use crate::ui::theme::{ColorSupport, Theme, detect_color_support};

#[derive(Debug, Clone)]
pub struct ResolvedKeybinds {
    pub quit: KeyCode,
    pub pause: KeyCode,
}

impl ResolvedKeybinds {
    pub fn from_config(kb: &KeybindsConfig) -> Self {
        Self {
            quit: parse_key(&kb.quit).unwrap_or(KeyCode::Char('q')),
            pause: parse_key(&kb.pause).unwrap_or(KeyCode::Char('p')),
        }
    }

    pub fn map_key(&self, key: KeyEvent) -> Action {
        // Ctrl+C always quits
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            return Action::Quit;
        }
        if key.code == self.quit {
            return Action::Quit;
        }
        if key.code == self.pause {
            return Action::TogglePause;
        }
        Action::None
    }

    /// (key_label, description) pairs for the status bar.
    pub fn hints(&self) -> Vec<(String, &'static str)> {
        vec![
            (key_label(self.quit), "Quit"),
            (key_label(self.pause), "Pause"),
        ]
    }
}

fn key_label(code: KeyCode) -> String {
    match code {
        KeyCode::Char(' ') => "Space".to_string(),
        KeyCode::Char(c) => c.to_string(),
        KeyCode::Enter => "Enter".to_string(),
        KeyCode::Esc => "Esc".to_string(),
        KeyCode::Tab => "Tab".to_string(),
        KeyCode::F(n) => format!("F{n}"),
        _ => "?".to_string(),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProcessRow {
    pub tid: u32,
    pub pid: u32,
    pub ppid: u32,
    pub comm: String,
    pub hostname: Option<String>,
    pub cpu_percent: f64,
    /// Window deltas, one per entry of `App::counter_names`.
    pub counters: Vec<u64>,
    pub read_bytes: u64,
    pub write_bytes: u64,
    pub open_files: usize,
    pub is_thread: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CpuRow {
    pub id: u64,
    pub task: Option<(u32, String)>,
}

#[derive(Debug, Default)]
struct Sample {
    cpu_ns: u64,
    counters: BTreeMap<String, u64>,
}

/// Render-side state, rebuilt from each snapshot the display receives.
pub struct App {
    pub theme: Theme,
    pub keybinds: ResolvedKeybinds,
    pub frame_index: Option<u64>,
    pub window: (u64, u64),
    pub rows: Vec<ProcessRow>,
    pub counter_names: Vec<String>,
    /// Counter the rows are ordered by; `None` orders by %CPU.
    pub sort_by: Option<String>,
    pub cpus: Vec<CpuRow>,
    pub probe_hits: Vec<(String, u64)>,
    pub displayed: usize,
    pub total: usize,
    show_threads: bool,
    max_rows: usize,
    previous: HashMap<u32, Sample>,
}

impl App {
    pub fn new(config: &Config) -> Self {
        Self::with_color_support(config, detect_color_support())
    }

    pub fn with_color_support(config: &Config, support: ColorSupport) -> Self {
        App {
            theme: Theme::from_config(&config.display.theme, support),
            keybinds: ResolvedKeybinds::from_config(&config.keybinds),
            frame_index: None,
            window: (0, 0),
            rows: Vec::new(),
            counter_names: Vec::new(),
            sort_by: None,
            cpus: Vec::new(),
            probe_hits: Vec::new(),
            displayed: 0,
            total: 0,
            show_threads: config.display.show_threads,
            max_rows: config.display.max_rows,
            previous: HashMap::new(),
        }
    }

    /// Rebuild the rows from `snapshot`. %CPU and counter columns are deltas
    /// against the previous snapshot passed here.
    pub fn update(&mut self, index: u64, snapshot: &Snapshot) {
        let window_ns = snapshot.duration_ns();
        self.frame_index = Some(index);
        self.window = (snapshot.window_start, snapshot.window_end);
        self.counter_names = snapshot.counters.visible().map(|c| c.name.clone()).collect();
        self.displayed = snapshot.displayed_count();
        self.total = snapshot.processes.len();

        let mut rows = Vec::with_capacity(self.displayed);
        for p in snapshot.displayed() {
            if !self.show_threads && p.is_thread() {
                continue;
            }
            let before = self.previous.get(&p.tid);
            let cpu_delta = p
                .cpu_ns
                .saturating_sub(before.map_or(0, |s| s.cpu_ns));
            let counters = self
                .counter_names
                .iter()
                .map(|name| {
                    let prev = before
                        .and_then(|s| s.counters.get(name))
                        .copied()
                        .unwrap_or(0);
                    p.counter(name).saturating_sub(prev)
                })
                .collect();
            rows.push(ProcessRow {
                tid: p.tid,
                pid: p.pid,
                ppid: p.ppid,
                comm: p.comm.clone(),
                hostname: p.hostname.clone(),
                cpu_percent: percent_of(cpu_delta, window_ns),
                counters,
                read_bytes: p.read_bytes,
                write_bytes: p.write_bytes,
                open_files: p.files.len(),
                is_thread: p.is_thread(),
            });
        }

        let sort_column = snapshot
            .counters
            .sort_key()
            .and_then(|key| self.counter_names.iter().position(|n| n == key));
        self.sort_by = sort_column.map(|col| self.counter_names[col].clone());
        match sort_column {
            Some(col) => rows.sort_by_key(|r| (Reverse(r.counters[col]), r.tid)),
            None => rows.sort_by(|a, b| {
                b.cpu_percent
                    .total_cmp(&a.cpu_percent)
                    .then(a.tid.cmp(&b.tid))
            }),
        }
        if self.max_rows > 0 {
            rows.truncate(self.max_rows);
        }
        self.rows = rows;

        self.cpus = snapshot
            .cpus
            .iter()
            .map(|cpu| CpuRow {
                id: cpu.id,
                task: cpu.current.map(|tid| {
                    let comm = snapshot
                        .processes
                        .find(tid)
                        .map(|p| p.comm.clone())
                        .unwrap_or_default();
                    (tid, comm)
                }),
            })
            .collect();
        self.probe_hits = snapshot
            .probe_hits
            .iter()
            .map(|(name, hits)| (name.clone(), *hits))
            .collect();

        self.previous = snapshot
            .processes
            .iter()
            .map(|p| {
                let counters = p.perf.values().map(|c| (c.name.clone(), c.count)).collect();
                (
                    p.tid,
                    Sample {
                        cpu_ns: p.cpu_ns,
                        counters,
                    },
                )
            })
            .collect();
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use crossterm::event::KeyEventKind;

    use super::*;
    use crate::system::cpu::CpuTable;
    use crate::system::filter::FilterSet;
    use crate::system::perf_counter::{CounterRegistry, observe};
    use crate::system::process::ProcessTable;
    use crate::system::snapshot::SnapshotBuilder;

    fn key(code: KeyCode, modifiers: KeyModifiers) -> KeyEvent {
        KeyEvent {
            code,
            modifiers,
            kind: KeyEventKind::Press,
            state: crossterm::event::KeyEventState::NONE,
        }
    }

    fn build(
        processes: &ProcessTable,
        counters: &CounterRegistry,
        filter: &FilterSet,
        start: u64,
        end: u64,
    ) -> Snapshot {
        SnapshotBuilder {
            processes,
            cpus: &CpuTable::new(),
            counters,
            probe_hits: &BTreeMap::new(),
            filter,
        }
        .build(start, end)
        .unwrap()
    }

    fn new_app(config: &Config) -> App {
        App::with_color_support(config, ColorSupport::Truecolor)
    }

    #[test]
    fn default_keybinds() {
        let kb = ResolvedKeybinds::from_config(&KeybindsConfig::default());
        assert_eq!(kb.map_key(key(KeyCode::Char('q'), KeyModifiers::NONE)), Action::Quit);
        assert_eq!(
            kb.map_key(key(KeyCode::Char('p'), KeyModifiers::NONE)),
            Action::TogglePause
        );
        assert_eq!(
            kb.map_key(key(KeyCode::Char('c'), KeyModifiers::CONTROL)),
            Action::Quit
        );
        assert_eq!(kb.map_key(key(KeyCode::Char('c'), KeyModifiers::NONE)), Action::None);
    }

    #[test]
    fn custom_keybind_remap_works() {
        let kb = ResolvedKeybinds::from_config(&KeybindsConfig {
            quit: "x".into(),
            pause: "space".into(),
        });
        assert_eq!(kb.map_key(key(KeyCode::Char('x'), KeyModifiers::NONE)), Action::Quit);
        assert_eq!(kb.map_key(key(KeyCode::Char('q'), KeyModifiers::NONE)), Action::None);
        assert_eq!(
            kb.map_key(key(KeyCode::Char(' '), KeyModifiers::NONE)),
            Action::TogglePause
        );
        assert_eq!(kb.hints()[1].0, "Space");
    }

    #[test]
    fn cpu_percent_is_a_window_delta() {
        let mut processes = ProcessTable::new();
        processes.create(1, "init", 0, None);
        processes.find_mut(1).unwrap().cpu_ns = 250;
        let counters = CounterRegistry::new();
        let filter = FilterSet::Disabled;
        let mut app = new_app(&Config::default());

        app.update(0, &build(&processes, &counters, &filter, 0, 1_000));
        assert_eq!(app.rows[0].cpu_percent, 25.0);

        processes.find_mut(1).unwrap().cpu_ns = 350;
        app.update(1, &build(&processes, &counters, &filter, 1_000, 2_000));
        assert_eq!(app.rows[0].cpu_percent, 10.0);
        assert_eq!(app.frame_index, Some(1));
        assert_eq!(app.window, (1_000, 2_000));
    }

    #[test]
    fn rows_sort_by_flagged_counter() {
        let mut processes = ProcessTable::new();
        processes.create(1, "a", 0, None);
        processes.create(2, "b", 0, None);
        let mut counters = CounterRegistry::new();
        let mut cpus = CpuTable::new();
        let cpu = cpus.get_or_create(0);
        observe(&mut counters, cpu, processes.find_mut(1).unwrap(), "perf_cycles", 10);
        observe(&mut counters, cpu, processes.find_mut(2).unwrap(), "perf_cycles", 100);

        let mut app = new_app(&Config::default());
        app.update(0, &build(&processes, &counters, &FilterSet::Disabled, 0, 10));
        assert_eq!(app.counter_names, vec!["perf_cycles".to_string()]);
        assert_eq!(app.sort_by.as_deref(), Some("perf_cycles"));
        let order: Vec<u32> = app.rows.iter().map(|r| r.tid).collect();
        assert_eq!(order, vec![2, 1]);
        assert_eq!(app.rows[0].counters, vec![90]);
    }

    #[test]
    fn threads_and_row_limit() {
        let mut processes = ProcessTable::new();
        processes.create(1, "init", 0, None);
        processes.create(2, "init", 0, None);
        processes.create(3, "sh", 0, None);
        processes.find_mut(2).unwrap().pid = 1;
        processes.link_parent(1, 2, 0);

        let mut config = Config::default();
        config.display.show_threads = false;
        let mut app = new_app(&config);
        app.update(0, &build(&processes, &CounterRegistry::new(), &FilterSet::Disabled, 0, 1));
        let tids: Vec<u32> = app.rows.iter().map(|r| r.tid).collect();
        assert_eq!(tids, vec![1, 3]);

        config.display.show_threads = true;
        config.display.max_rows = 2;
        let mut app = new_app(&config);
        app.update(0, &build(&processes, &CounterRegistry::new(), &FilterSet::Disabled, 0, 1));
        assert_eq!(app.rows.len(), 2);
        assert_eq!(app.total, 3);
    }

    #[test]
    fn filtered_processes_are_not_listed() {
        let mut processes = ProcessTable::new();
        processes.create(1, "init", 0, None);
        processes.create(7, "sshd", 0, None);
        let mut app = new_app(&Config::default());
        let filter = FilterSet::ids([7], false);
        app.update(0, &build(&processes, &CounterRegistry::new(), &filter, 0, 1));
        assert_eq!(app.rows.len(), 1);
        assert_eq!(app.rows[0].comm, "sshd");
        assert_eq!(app.displayed, 1);
        assert_eq!(app.total, 2);
    }
}
