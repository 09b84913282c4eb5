//! Label selectors used by MachineSet and MachineDeployment to discover
//! their children (spec.md 9, "Owner-reference graphs": children are
//! discovered by label-selector queries, not by following pointers).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelSelector {
    #[serde(default, rename = "matchLabels")]
    pub match_labels: BTreeMap<String, String>,
}

impl LabelSelector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.match_labels.is_empty()
    }

    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        self.match_labels
            .iter()
            .all(|(k, v)| labels.get(k) == Some(v))
    }
}

impl From<BTreeMap<String, String>> for LabelSelector {
    fn from(match_labels: BTreeMap<String, String>) -> Self {
        Self { match_labels }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_selector_matches_nothing_meaningfully() {
        let sel = LabelSelector::new();
        assert!(sel.is_empty());
    }

    #[test]
    fn selector_requires_all_match_labels_present() {
        let mut ml = BTreeMap::new();
        ml.insert("app".to_string(), "web".to_string());
        let sel = LabelSelector::from(ml);

        let mut labels = BTreeMap::new();
        labels.insert("app".to_string(), "web".to_string());
        labels.insert("tier".to_string(), "frontend".to_string());
        assert!(sel.matches(&labels));

        labels.insert("app".to_string(), "other".to_string());
        assert!(!sel.matches(&labels));
    }
}
