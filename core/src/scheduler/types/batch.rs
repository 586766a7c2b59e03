use serde::{Deserialize, Serialize};

/// An ordered group of opaque item identifiers processed by one execution unit.
///
/// Batches are immutable once built: the scheduler hands a copy of the items to
/// exactly one unit and never looks inside them.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Batch(Vec<String>);

impl Batch {
    pub fn new(items: Vec<String>) -> Self {
        Self(items)
    }

    pub fn items(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_items(self) -> Vec<String> {
        self.0
    }
}

impl From<Vec<String>> for Batch {
    fn from(items: Vec<String>) -> Self {
        Self(items)
    }
}

impl<'a> From<Vec<&'a str>> for Batch {
    fn from(items: Vec<&'a str>) -> Self {
        Self(items.into_iter().map(str::to_string).collect())
    }
}

impl<'a> FromIterator<&'a str> for Batch {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        Self(iter.into_iter().map(str::to_string).collect())
    }
}

impl FromIterator<String> for Batch {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Outcome of processing a single item inside an execution unit.
///
/// `outcome` is whatever the per-item routine produced; the scheduler never
/// inspects it. `error` is set when the routine failed for this item only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemOutcome {
    pub item_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<serde_json::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ItemOutcome {
    pub fn ok(item_id: impl Into<String>, outcome: serde_json::Value) -> Self {
        Self {
            item_id: item_id.into(),
            outcome: Some(outcome),
            error: None,
        }
    }

    pub fn failed(item_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            item_id: item_id.into(),
            outcome: None,
            error: Some(error.into()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}
