//! Search result bundle shaping (C9).

use serde_json::{json, Value};

/// Whether a [`BundleEntry`] satisfied the search parameters directly
/// (`match`) or was pulled in by `_include`/`_revinclude` (`include`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchMode {
    Match,
    Include,
}

impl SearchMode {
    fn as_str(self) -> &'static str {
        match self {
            SearchMode::Match => "match",
            SearchMode::Include => "include",
        }
    }
}

/// One resource in a searchset bundle.
#[derive(Debug)]
pub struct BundleEntry {
    pub resource_type: String,
    pub id: String,
    pub content: Value,
    pub mode: SearchMode,
}

/// A `searchset` result: the matched resources plus anything pulled in via
/// `_include`/`_revinclude`, and the total match count before pagination.
#[derive(Debug)]
pub struct Bundle {
    pub total: usize,
    pub entries: Vec<BundleEntry>,
}

impl Bundle {
    pub fn new(total: usize, entries: Vec<BundleEntry>) -> Self {
        Self { total, entries }
    }

    /// Renders the bundle as a FHIR `Bundle` resource of type `searchset`.
    pub fn to_json(&self, base_url: &str) -> Value {
        let base = base_url.trim_end_matches('/');
        let entries: Vec<Value> = self
            .entries
            .iter()
            .map(|entry| {
                json!({
                    "fullUrl": format!("{base}/{}/{}", entry.resource_type, entry.id),
                    "resource": entry.content,
                    "search": { "mode": entry.mode.as_str() },
                })
            })
            .collect();

        json!({
            "resourceType": "Bundle",
            "type": "searchset",
            "total": self.total,
            "entry": entries,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn to_json_reports_mode_and_full_url() {
        let bundle = Bundle::new(
            1,
            vec![BundleEntry {
                resource_type: "Patient".to_string(),
                id: "p1".to_string(),
                content: serde_json::json!({"resourceType": "Patient", "id": "p1"}),
                mode: SearchMode::Match,
            }],
        );
        let json = bundle.to_json("http://localhost:8080/fhir/r4/");
        assert_eq!(json["total"], 1);
        assert_eq!(json["entry"][0]["fullUrl"], "http://localhost:8080/fhir/r4/Patient/p1");
        assert_eq!(json["entry"][0]["search"]["mode"], "match");
    }
}
