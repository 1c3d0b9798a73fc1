use serde::Serialize;
use std::collections::BTreeMap;

/// Receives human-readable diagnostics from the shuffle passes.
pub trait ShuffleTrace {
    fn record(&mut self, key: &str, entry: String);
}

/// Discards everything.
impl ShuffleTrace for () {
    fn record(&mut self, _key: &str, _entry: String) {}
}

/// Spoiler-log style report: every key maps to the entries recorded under it,
/// in recording order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Report {
    entries: BTreeMap<String, Vec<String>>,
}

impl Report {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&[String]> {
        self.entries.get(key).map(Vec::as_slice)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.entries)
    }

    /// Plain-text rendering, one key per line.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        for (key, values) in &self.entries {
            out.push_str(&format!("{}: {}\n", key, values.join(" ")));
        }
        out
    }
}

impl ShuffleTrace for Report {
    fn record(&mut self, key: &str, entry: String) {
        self.entries.entry(key.to_string()).or_default().push(entry);
    }
}
