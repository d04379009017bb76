use std::collections::BTreeMap;
use std::fmt;
use std::ops::Bound;

use crate::error::EventError;

/// A single typed field value carried by a trace event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Unsigned(u64),
    Signed(i64),
    Str(String),
    Bytes(Vec<u8>),
}

impl FieldValue {
    fn as_i128(&self) -> Option<i128> {
        match self {
            FieldValue::Unsigned(v) => Some(i128::from(*v)),
            FieldValue::Signed(v) => Some(i128::from(*v)),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Unsigned(v) => write!(f, "{v}"),
            FieldValue::Signed(v) => write!(f, "{v}"),
            FieldValue::Str(s) => write!(f, "{s}"),
            FieldValue::Bytes(bytes) => {
                // char arrays are NUL padded
                let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
                write!(f, "{}", String::from_utf8_lossy(&bytes[..end]))
            }
        }
    }
}

/// One scope of an event's fields, with typed accessors that report the
/// owning event in their errors.
#[derive(Clone, Copy, Debug)]
pub struct Fields<'a> {
    event: &'a str,
    map: &'a BTreeMap<String, FieldValue>,
}

impl<'a> Fields<'a> {
    pub fn get(&self, name: &str) -> Option<&'a FieldValue> {
        let map: &'a BTreeMap<String, FieldValue> = self.map;
        map.get(name)
    }

    pub fn iter(self) -> impl Iterator<Item = (&'a str, &'a FieldValue)> {
        self.map.iter().map(|(name, value)| (name.as_str(), value))
    }

    fn missing(&self, field: &str) -> EventError {
        EventError::MissingField {
            event: self.event.to_string(),
            field: field.to_string(),
        }
    }

    fn wrong_kind(&self, field: &str, expected: &'static str) -> EventError {
        EventError::WrongKind {
            event: self.event.to_string(),
            field: field.to_string(),
            expected,
        }
    }

    fn out_of_range(&self, field: &str, value: i128) -> EventError {
        EventError::OutOfRange {
            event: self.event.to_string(),
            field: field.to_string(),
            value,
        }
    }

    /// Integer field, signed or unsigned, as an i64.
    pub fn int(&self, name: &str) -> Result<i64, EventError> {
        self.opt_int(name)?.ok_or_else(|| self.missing(name))
    }

    pub fn opt_int(&self, name: &str) -> Result<Option<i64>, EventError> {
        let Some(value) = self.get(name) else {
            return Ok(None);
        };
        let wide = value
            .as_i128()
            .ok_or_else(|| self.wrong_kind(name, "an integer"))?;
        i64::try_from(wide)
            .map(Some)
            .map_err(|_| self.out_of_range(name, wide))
    }

    pub fn uint(&self, name: &str) -> Result<u64, EventError> {
        let value = self.get(name).ok_or_else(|| self.missing(name))?;
        let wide = value
            .as_i128()
            .ok_or_else(|| self.wrong_kind(name, "an integer"))?;
        u64::try_from(wide).map_err(|_| self.out_of_range(name, wide))
    }

    /// Thread/process id field; ids are non-negative and fit in 32 bits.
    pub fn id(&self, name: &str) -> Result<u32, EventError> {
        self.opt_id(name)?.ok_or_else(|| self.missing(name))
    }

    pub fn opt_id(&self, name: &str) -> Result<Option<u32>, EventError> {
        let Some(value) = self.opt_int(name)? else {
            return Ok(None);
        };
        u32::try_from(value)
            .map(Some)
            .map_err(|_| self.out_of_range(name, i128::from(value)))
    }

    /// String field; NUL-padded char arrays are accepted too.
    pub fn str(&self, name: &str) -> Result<String, EventError> {
        self.opt_str(name)?.ok_or_else(|| self.missing(name))
    }

    pub fn opt_str(&self, name: &str) -> Result<Option<String>, EventError> {
        match self.get(name) {
            None => Ok(None),
            Some(FieldValue::Str(s)) => Ok(Some(s.clone())),
            Some(bytes @ FieldValue::Bytes(_)) => Ok(Some(bytes.to_string())),
            Some(_) => Err(self.wrong_kind(name, "a string")),
        }
    }
}

/// One timestamped, named record from the trace.
///
/// `context` describes the thread that emitted the event (`pid`, `tid`,
/// `procname`, `hostname`, `perf_*`, ...). `fields` is the event payload,
/// which may name other threads with the same field names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub name: String,
    pub timestamp: u64,
    pub cpu_id: Option<u64>,
    pub context: BTreeMap<String, FieldValue>,
    pub fields: BTreeMap<String, FieldValue>,
}

impl Event {
    pub fn new(name: impl Into<String>, timestamp: u64) -> Self {
        Self {
            name: name.into(),
            timestamp,
            cpu_id: None,
            context: BTreeMap::new(),
            fields: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn on_cpu(mut self, cpu: u64) -> Self {
        self.cpu_id = Some(cpu);
        self
    }

    #[must_use]
    pub fn with(mut self, field: impl Into<String>, value: FieldValue) -> Self {
        self.fields.insert(field.into(), value);
        self
    }

    #[must_use]
    pub fn with_int(self, field: impl Into<String>, value: i64) -> Self {
        self.with(field, FieldValue::Signed(value))
    }

    #[must_use]
    pub fn with_uint(self, field: impl Into<String>, value: u64) -> Self {
        self.with(field, FieldValue::Unsigned(value))
    }

    #[must_use]
    pub fn with_str(self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.with(field, FieldValue::Str(value.into()))
    }

    #[must_use]
    pub fn with_ctx(mut self, field: impl Into<String>, value: FieldValue) -> Self {
        self.context.insert(field.into(), value);
        self
    }

    #[must_use]
    pub fn with_ctx_int(self, field: impl Into<String>, value: i64) -> Self {
        self.with_ctx(field, FieldValue::Signed(value))
    }

    #[must_use]
    pub fn with_ctx_uint(self, field: impl Into<String>, value: u64) -> Self {
        self.with_ctx(field, FieldValue::Unsigned(value))
    }

    #[must_use]
    pub fn with_ctx_str(self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.with_ctx(field, FieldValue::Str(value.into()))
    }

    /// Fields of the emitting thread.
    pub fn context(&self) -> Fields<'_> {
        Fields {
            event: &self.name,
            map: &self.context,
        }
    }

    pub fn payload(&self) -> Fields<'_> {
        Fields {
            event: &self.name,
            map: &self.fields,
        }
    }

    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    pub fn cpu(&self) -> Result<u64, EventError> {
        self.cpu_id.ok_or_else(|| EventError::MissingCpu {
            event: self.name.clone(),
        })
    }

    pub fn int(&self, name: &str) -> Result<i64, EventError> {
        self.payload().int(name)
    }

    pub fn opt_int(&self, name: &str) -> Result<Option<i64>, EventError> {
        self.payload().opt_int(name)
    }

    pub fn uint(&self, name: &str) -> Result<u64, EventError> {
        self.payload().uint(name)
    }

    pub fn id(&self, name: &str) -> Result<u32, EventError> {
        self.payload().id(name)
    }

    pub fn opt_id(&self, name: &str) -> Result<Option<u32>, EventError> {
        self.payload().opt_id(name)
    }

    pub fn str(&self, name: &str) -> Result<String, EventError> {
        self.payload().str(name)
    }

    pub fn opt_str(&self, name: &str) -> Result<Option<String>, EventError> {
        self.payload().opt_str(name)
    }

    /// Integer `perf_*` context fields, in name order.
    pub fn perf_samples(&self) -> impl Iterator<Item = (&str, u64)> {
        self.context
            .range::<str, _>((Bound::Included("perf_"), Bound::Unbounded))
            .take_while(|(name, _)| name.starts_with("perf_"))
            .filter_map(|(name, value)| match value {
                FieldValue::Unsigned(v) => Some((name.as_str(), *v)),
                FieldValue::Signed(v) => u64::try_from(*v).ok().map(|v| (name.as_str(), v)),
                _ => None,
            })
    }
}
