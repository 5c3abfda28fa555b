use crate::domain::model::{Record, RuleEntry};
use crate::utils::error::{Result, SyncError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PortField {
    Port,
    ForwardToAddress,
    ForwardToPort,
    Protocol,
    Description,
}

impl PortField {
    const ALL: [PortField; 5] = [
        PortField::Description,
        PortField::ForwardToPort,
        PortField::ForwardToAddress,
        PortField::Protocol,
        PortField::Port,
    ];

    fn name(self) -> &'static str {
        match self {
            PortField::Port => "port",
            PortField::ForwardToAddress => "forward_to_address",
            PortField::ForwardToPort => "forward_to_port",
            PortField::Protocol => "protocol",
            PortField::Description => "description",
        }
    }

    /// Key used for this field inside a router rule entry.
    fn remote_key(self) -> &'static str {
        match self {
            PortField::Port => "original-port",
            PortField::ForwardToAddress => "forward-to-address",
            PortField::ForwardToPort => "forward-to-port",
            PortField::Protocol => "protocol",
            PortField::Description => "description",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// Input keys accepted for each field. Order matters only for error messages.
const RECORD_KEYS: &[(&str, PortField)] = &[
    ("port", PortField::Port),
    ("original_port", PortField::Port),
    ("forward_to_ip", PortField::ForwardToAddress),
    ("forward_to_address", PortField::ForwardToAddress),
    ("forward_to_port", PortField::ForwardToPort),
    ("protocol", PortField::Protocol),
    ("description", PortField::Description),
];

/// A desired forwarding rule. Ports are opaque strings; no numeric validation.
///
/// Identity is structural: two records are the same rule iff all five fields
/// are equal as strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PortRecord {
    pub port: String,
    pub forward_to_address: String,
    pub forward_to_port: String,
    pub protocol: String,
    pub description: String,
}

impl PortRecord {
    pub fn new(
        port: impl Into<String>,
        forward_to_address: impl Into<String>,
        forward_to_port: impl Into<String>,
        protocol: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            port: port.into(),
            forward_to_address: forward_to_address.into(),
            forward_to_port: forward_to_port.into(),
            protocol: protocol.into(),
            description: description.into(),
        }
    }

    fn field(&self, field: PortField) -> &str {
        match field {
            PortField::Port => &self.port,
            PortField::ForwardToAddress => &self.forward_to_address,
            PortField::ForwardToPort => &self.forward_to_port,
            PortField::Protocol => &self.protocol,
            PortField::Description => &self.description,
        }
    }

    fn field_mut(&mut self, field: PortField) -> &mut String {
        match field {
            PortField::Port => &mut self.port,
            PortField::ForwardToAddress => &mut self.forward_to_address,
            PortField::ForwardToPort => &mut self.forward_to_port,
            PortField::Protocol => &mut self.protocol,
            PortField::Description => &mut self.description,
        }
    }

    /// Bind a parsed record through the key table. Missing keys stay empty;
    /// two aliases carrying different values for one field is an error.
    pub fn from_record(record: &Record) -> Result<Self> {
        let mut port = PortRecord::default();
        let mut bound_by: [Option<&str>; 5] = [None; 5];

        for &(key, field) in RECORD_KEYS {
            let Some(value) = record.get(key) else {
                continue;
            };

            if let Some(previous_key) = bound_by[field.index()] {
                if port.field(field) != value {
                    return Err(SyncError::RecordConstructionError {
                        line: record.line,
                        reason: format!(
                            "'{}={}' conflicts with '{}={}' for field {}",
                            key,
                            value,
                            previous_key,
                            port.field(field),
                            field.name()
                        ),
                    });
                }
                continue;
            }

            *port.field_mut(field) = value.to_string();
            bound_by[field.index()] = Some(key);
        }

        Ok(port)
    }

    /// Build a record from a normalized router entry. Missing keys stay empty.
    pub fn from_rule_fields(fields: &BTreeMap<String, String>) -> Self {
        let mut port = PortRecord::default();
        for field in PortField::ALL {
            if let Some(value) = fields.get(field.remote_key()) {
                *port.field_mut(field) = value.clone();
            }
        }
        port
    }

    /// Exact string comparison of the five identity fields. A missing remote
    /// key never matches, not even an empty local value.
    pub fn matches_fields(&self, fields: &BTreeMap<String, String>) -> bool {
        PortField::ALL.iter().all(|&field| {
            fields.get(field.remote_key()).map(String::as_str) == Some(self.field(field))
        })
    }

    pub fn matches_entry(&self, entry: &RuleEntry) -> bool {
        entry
            .normalize()
            .map(|fields| self.matches_fields(&fields))
            .unwrap_or(false)
    }

    pub fn to_rule_entry(&self) -> RuleEntry {
        let fields = PortField::ALL
            .iter()
            .map(|&field| (field.remote_key().to_string(), self.field(field).to_string()))
            .collect();
        RuleEntry::StringEntry(fields)
    }
}

impl fmt::Display for PortRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} -> {}:{} ({})",
            self.protocol, self.port, self.forward_to_address, self.forward_to_port, self.description
        )
    }
}

/// Result of turning a batch of parsed records into port records.
#[derive(Debug, Default)]
pub struct PortBatch {
    pub records: Vec<PortRecord>,
    /// Per-line construction errors; they never abort the rest of the batch.
    pub failures: Vec<SyncError>,
    pub skipped_lines: Vec<usize>,
}

impl PortBatch {
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }
}

pub fn load_port_records(records: &[Record]) -> PortBatch {
    let mut batch = PortBatch::default();

    for record in records {
        if !RECORD_KEYS.iter().any(|(key, _)| record.data.contains_key(*key)) {
            tracing::warn!("⚠️ Line {}: no port fields found, skipping", record.line);
            batch.skipped_lines.push(record.line);
            continue;
        }

        match PortRecord::from_record(record) {
            Ok(port) => batch.records.push(port),
            Err(e) => {
                tracing::error!("❌ {}", e);
                batch.failures.push(e);
            }
        }
    }

    batch
}
