use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// A single data point with integer fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Measurement {
    pub measurement: String,
    pub tags: BTreeMap<String, String>,
    pub fields: BTreeMap<String, u64>,
    pub time: DateTime<Utc>,
}

impl Measurement {
    pub fn new(measurement: impl Into<String>, time: DateTime<Utc>) -> Self {
        Self {
            measurement: measurement.into(),
            tags: BTreeMap::new(),
            fields: BTreeMap::new(),
            time,
        }
    }

    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    pub fn field(mut self, key: impl Into<String>, value: u64) -> Self {
        self.fields.insert(key.into(), value);
        self
    }

    /// Encodes the measurement in the InfluxDB line protocol with second
    /// precision.
    ///
    /// Tags with empty values are left out, since the line protocol does not
    /// support them.
    pub fn to_line_protocol(&self) -> String {
        let mut line = escape(&self.measurement, &[',', ' ']);

        for (key, value) in &self.tags {
            if value.is_empty() {
                continue;
            }

            line.push(',');
            line.push_str(&escape(key, &[',', '=', ' ']));
            line.push('=');
            line.push_str(&escape(value, &[',', '=', ' ']));
        }

        let fields = self
            .fields
            .iter()
            .map(|(key, value)| format!("{}={value}i", escape(key, &[',', '=', ' '])))
            .collect::<Vec<_>>();

        line.push(' ');
        line.push_str(&fields.join(","));
        line.push(' ');
        line.push_str(&self.time.timestamp().to_string());
        line
    }
}

fn escape(value: &str, special: &[char]) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if c == '\\' || special.contains(&c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
