use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use super::event::{Event, FieldValue};
use crate::error::SourceError;

#[derive(Debug, Deserialize)]
struct RawEvent {
    name: String,
    timestamp: u64,
    #[serde(default)]
    cpu_id: Option<u64>,
    #[serde(default)]
    context: serde_json::Map<String, Value>,
    #[serde(default)]
    fields: serde_json::Map<String, Value>,
}

/// File-backed event source: one JSON object per line. `context` holds the
/// emitting thread's fields, `fields` the payload.
///
/// ```text
/// {"name":"sched_switch","timestamp":1000,"cpu_id":0,"context":{"tid":1},"fields":{"prev_tid":1,"next_tid":2}}
/// ```
pub struct JsonLinesSource<R> {
    reader: R,
    line: usize,
    buf: String,
    done: bool,
}

impl JsonLinesSource<Box<dyn BufRead + Send>> {
    /// Open a trace file, or stdin when `path` is `-`.
    pub fn open(path: &Path) -> Result<Self, SourceError> {
        let reader: Box<dyn BufRead + Send> = if path.as_os_str() == "-" {
            Box::new(BufReader::new(io::stdin()))
        } else {
            Box::new(BufReader::new(File::open(path)?))
        };
        Ok(Self::new(reader))
    }
}

impl<R: BufRead> JsonLinesSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line: 0,
            buf: String::new(),
            done: false,
        }
    }

    /// Infallible view of the stream: undecodable records are logged and
    /// skipped, an I/O error ends the stream.
    pub fn events(self) -> impl Iterator<Item = Event> {
        self.scan((), |_, record| match record {
            Ok(event) => Some(Some(event)),
            Err(SourceError::Io(err)) => {
                warn!(error = %err, "trace read failed, ending stream");
                None
            }
            Err(err) => {
                warn!(error = %err, "skipping trace record");
                Some(None)
            }
        })
        .flatten()
    }
}

impl<R: BufRead> Iterator for JsonLinesSource<R> {
    type Item = Result<Event, SourceError>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            self.buf.clear();
            match self.reader.read_line(&mut self.buf) {
                Ok(0) => self.done = true,
                Ok(_) => {
                    self.line += 1;
                    let text = self.buf.trim();
                    if text.is_empty() {
                        continue;
                    }
                    return Some(parse_line(self.line, text));
                }
                Err(err) => {
                    self.done = true;
                    return Some(Err(SourceError::Io(err)));
                }
            }
        }
        None
    }
}

fn parse_line(line: usize, text: &str) -> Result<Event, SourceError> {
    let raw: RawEvent =
        serde_json::from_str(text).map_err(|source| SourceError::Json { line, source })?;

    let mut event = Event::new(raw.name, raw.timestamp);
    event.cpu_id = raw.cpu_id;
    event.context = convert_map(line, raw.context)?;
    event.fields = convert_map(line, raw.fields)?;
    Ok(event)
}

fn convert_map(
    line: usize,
    raw: serde_json::Map<String, Value>,
) -> Result<BTreeMap<String, FieldValue>, SourceError> {
    raw.into_iter()
        .map(|(key, value)| match convert_value(&value) {
            Some(field) => Ok((key, field)),
            None => Err(SourceError::InvalidRecord {
                line,
                reason: format!("unsupported value for field {key}: {value}"),
            }),
        })
        .collect()
}

fn convert_value(value: &Value) -> Option<FieldValue> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .map(FieldValue::Unsigned)
            .or_else(|| n.as_i64().map(FieldValue::Signed)),
        Value::String(s) => Some(FieldValue::Str(s.clone())),
        Value::Array(items) => items
            .iter()
            .map(|item| item.as_u64().and_then(|b| u8::try_from(b).ok()))
            .collect::<Option<Vec<u8>>>()
            .map(FieldValue::Bytes),
        _ => None,
    }
}
