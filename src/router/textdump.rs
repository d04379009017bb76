use std::fmt::Write as _;
use std::io::{self, Write};

use tracing::warn;

use crate::aggregator::{Aggregator, Output};
use crate::error::EventError;
use crate::format::format_clock;
use crate::trace::Event;

/// One text line for `event`, without the line terminator:
/// `HH:MM:SS.nnnnnnnnn (host) (cpu N) [procname (pid)] name (f = v, ...) `
pub fn format_event(event: &Event) -> String {
    let placeholder = || "-".to_string();
    let ctx = event.context();
    let hostname = ctx.opt_str("hostname").ok().flatten().unwrap_or_else(placeholder);
    let procname = ctx.opt_str("procname").ok().flatten().unwrap_or_else(placeholder);
    let pid = ctx
        .opt_int("pid")
        .ok()
        .flatten()
        .map_or_else(placeholder, |p| p.to_string());
    let cpu = event.cpu_id.map_or_else(placeholder, |c| c.to_string());

    let mut line = format!(
        "{} ({hostname}) (cpu {cpu}) [{procname} ({pid})] {} (",
        format_clock(event.timestamp),
        event.name
    );
    for (i, (name, value)) in event.payload().iter().enumerate() {
        if i != 0 {
            line.push_str(", ");
        }
        let _ = write!(line, "{name} = {value}");
    }
    line.push_str(") ");
    line
}

/// Line-oriented event printer. A `sys_*` line is left open so the matching
/// `exit_syscall` can append its return value.
pub struct TextDump<W> {
    out: W,
    line_open: bool,
    failed: bool,
}

impl<W: Write> TextDump<W> {
    pub fn new(out: W) -> Self {
        TextDump {
            out,
            line_open: false,
            failed: false,
        }
    }

    pub fn write_event(&mut self, event: &Event) -> io::Result<()> {
        if event.name == "exit_syscall" && self.line_open {
            let ret = event.opt_int("ret").ok().flatten().unwrap_or_default();
            writeln!(self.out, "= {ret}")?;
            self.line_open = false;
            return Ok(());
        }
        if self.line_open {
            // the exit for the previous syscall was lost
            writeln!(self.out)?;
        }
        write!(self.out, "{}", format_event(event))?;
        if event.name.starts_with("sys_") {
            self.line_open = true;
        } else {
            writeln!(self.out)?;
            self.line_open = false;
        }
        Ok(())
    }

    pub fn finish(&mut self) -> io::Result<()> {
        if self.line_open {
            writeln!(self.out)?;
            self.line_open = false;
        }
        self.out.flush()
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

pub(super) fn print_event(agg: &mut Aggregator, event: &Event) -> Result<(), EventError> {
    if agg.filter.is_enabled() {
        let ctx = event.context();
        let pid = ctx.id("pid")?;
        let tid = ctx.opt_id("tid")?.unwrap_or(pid);
        let hostname = ctx.opt_str("hostname")?;
        if !agg.filter.accepts(tid, pid, hostname.as_deref()) {
            return Ok(());
        }
    }
    let Output::Text(dump) = &mut agg.output else {
        return Ok(());
    };
    if let Err(err) = dump.write_event(event)
        && !dump.failed
    {
        dump.failed = true;
        warn!(error = %err, "text output failed");
    }
    Ok(())
}
