use std::fs::{self, File};
use std::path::Path;
use std::sync::Mutex;

use color_eyre::eyre::{Result, eyre};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::MakeWriter;

/// Where diagnostics go. The terminal belongs to the display in interactive
/// mode, so stderr is only used when the caller allows it.
#[derive(Debug, Clone, Copy)]
pub struct LogOptions<'a> {
    pub file: Option<&'a Path>,
    pub level: &'a str,
    pub json: bool,
    pub allow_stderr: bool,
}

/// Install the global subscriber. Returns `false` when logging stays off.
pub fn init_logging(options: LogOptions<'_>) -> Result<bool> {
    let filter = EnvFilter::try_new(options.level)
        .map_err(|e| eyre!("invalid log level `{}`: {e}", options.level))?;

    if let Some(path) = options.file {
        ensure_parent_dir(path)?;
        let file = File::create(path)?;
        install(Mutex::new(file), filter, options.json, false)?;
        return Ok(true);
    }
    if options.allow_stderr {
        install(std::io::stderr, filter, options.json, true)?;
        return Ok(true);
    }
    Ok(false)
}

fn install<W>(writer: W, filter: EnvFilter, json: bool, ansi: bool) -> Result<()>
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(ansi)
        .with_writer(writer);
    let installed = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|e| eyre!("failed to set tracing subscriber: {e}"))
}

fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parent_dirs_are_created() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("nested").join("tracetop.log");
        ensure_parent_dir(&path).unwrap();
        assert!(path.parent().unwrap().is_dir());
    }

    #[test]
    fn logging_off_without_a_sink() {
        let options = LogOptions {
            file: None,
            level: "info",
            json: false,
            allow_stderr: false,
        };
        assert!(!init_logging(options).unwrap());
    }
}
