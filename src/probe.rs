use std::collections::BTreeMap;

use crate::error::ProbeError;

/// Where a dynamic probe is placed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProbeTarget {
    Symbol { symbol: String, offset: u64 },
    Address(u64),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Probe {
    pub target: ProbeTarget,
    /// Name of the trace event emitted on each hit.
    pub event_name: String,
}

fn parse_number(raw: &str) -> Option<u64> {
    match raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => raw.parse().ok(),
    }
}

/// Parse `symbol+offset`, `symbol` or a bare address.
pub fn parse_probe(spec: &str) -> Result<Probe, ProbeError> {
    let spec = spec.trim();
    if spec.is_empty() {
        return Err(ProbeError::Empty);
    }

    if let Some((symbol, offset)) = spec.split_once('+') {
        if symbol.is_empty() {
            return Err(ProbeError::Invalid(spec.to_string()));
        }
        let offset = parse_number(offset).ok_or_else(|| ProbeError::InvalidOffset(offset.into()))?;
        return Ok(Probe {
            event_name: format!("probe_{symbol}"),
            target: ProbeTarget::Symbol {
                symbol: symbol.to_string(),
                offset,
            },
        });
    }

    let first = spec.chars().next().unwrap_or_default();
    if first.is_ascii_alphabetic() || first == '_' {
        if spec.chars().any(char::is_whitespace) {
            return Err(ProbeError::Invalid(spec.to_string()));
        }
        return Ok(Probe {
            event_name: format!("probe_{spec}"),
            target: ProbeTarget::Symbol {
                symbol: spec.to_string(),
                offset: 0,
            },
        });
    }

    let address = parse_number(spec).ok_or_else(|| ProbeError::Invalid(spec.to_string()))?;
    Ok(Probe {
        event_name: format!("probe_{spec}"),
        target: ProbeTarget::Address(address),
    })
}

/// Configured probes and their hit counts, keyed by event name.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProbeSet {
    probes: BTreeMap<String, Probe>,
    hits: BTreeMap<String, u64>,
}

impl ProbeSet {
    pub fn new(probes: impl IntoIterator<Item = Probe>) -> Self {
        let mut set = ProbeSet::default();
        for probe in probes {
            set.hits.insert(probe.event_name.clone(), 0);
            set.probes.insert(probe.event_name.clone(), probe);
        }
        set
    }

    pub fn is_empty(&self) -> bool {
        self.probes.is_empty()
    }

    pub fn get(&self, event_name: &str) -> Option<&Probe> {
        self.probes.get(event_name)
    }

    /// Count a hit if `event_name` belongs to a probe.
    pub fn record_hit(&mut self, event_name: &str) -> bool {
        match self.hits.get_mut(event_name) {
            Some(count) => {
                *count += 1;
                true
            }
            None => false,
        }
    }

    pub fn hits(&self) -> &BTreeMap<String, u64> {
        &self.hits
    }
}
