//! Label ↔ class-index mapping shared by training and inference.
//!
//! Indices are assigned in sorted label order, so the same label set always
//! produces the same mapping. Persisted as `{"index_to_label": [...]}`; the
//! reverse lookup is rebuilt on load.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::CoreError;

/// Bidirectional mapping between label strings and class indices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "MappingFile", into = "MappingFile")]
pub struct LabelMapping {
    index_to_label: Vec<String>,
    label_to_index: HashMap<String, usize>,
}

#[derive(Serialize, Deserialize)]
struct MappingFile {
    index_to_label: Vec<String>,
}

impl LabelMapping {
    /// Build a mapping from every distinct label in `labels`.
    pub fn from_labels<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let distinct: BTreeSet<String> = labels
            .into_iter()
            .map(|s| s.as_ref().to_string())
            .collect();
        let index_to_label: Vec<String> = distinct.into_iter().collect();
        let label_to_index = index_to_label
            .iter()
            .enumerate()
            .map(|(i, l)| (l.clone(), i))
            .collect();
        Self {
            index_to_label,
            label_to_index,
        }
    }

    /// Rebuild a mapping from an explicit index → label list.
    pub fn from_index_list(index_to_label: Vec<String>) -> Result<Self, CoreError> {
        let mut label_to_index = HashMap::with_capacity(index_to_label.len());
        for (i, label) in index_to_label.iter().enumerate() {
            if label_to_index.insert(label.clone(), i).is_some() {
                return Err(CoreError::DuplicateLabel(label.clone()));
            }
        }
        Ok(Self {
            index_to_label,
            label_to_index,
        })
    }

    pub fn index_of(&self, label: &str) -> Option<usize> {
        self.label_to_index.get(label).copied()
    }

    pub fn label_of(&self, index: usize) -> Option<&str> {
        self.index_to_label.get(index).map(String::as_str)
    }

    pub fn contains(&self, label: &str) -> bool {
        self.label_to_index.contains_key(label)
    }

    /// Labels in index order.
    pub fn labels(&self) -> &[String] {
        &self.index_to_label
    }

    /// Number of classes.
    pub fn len(&self) -> usize {
        self.index_to_label.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index_to_label.is_empty()
    }
}

impl TryFrom<MappingFile> for LabelMapping {
    type Error = CoreError;

    fn try_from(file: MappingFile) -> Result<Self, Self::Error> {
        Self::from_index_list(file.index_to_label)
    }
}

impl From<LabelMapping> for MappingFile {
    fn from(mapping: LabelMapping) -> Self {
        MappingFile {
            index_to_label: mapping.index_to_label,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indices_follow_sorted_order() {
        let m = LabelMapping::from_labels(["tech", "business", "sport", "business"]);
        assert_eq!(m.len(), 3);
        assert_eq!(m.labels(), &["business", "sport", "tech"]);
        assert_eq!(m.index_of("business"), Some(0));
        assert_eq!(m.index_of("tech"), Some(2));
        assert_eq!(m.label_of(1), Some("sport"));
    }

    #[test]
    fn unknown_lookups_are_none() {
        let m = LabelMapping::from_labels(["a", "b"]);
        assert_eq!(m.index_of("c"), None);
        assert_eq!(m.label_of(2), None);
        assert!(!m.contains("c"));
    }

    #[test]
    fn insertion_order_does_not_matter() {
        let a = LabelMapping::from_labels(["x", "y", "z"]);
        let b = LabelMapping::from_labels(["z", "x", "y"]);
        assert_eq!(a, b);
    }

    #[test]
    fn json_shape() {
        let m = LabelMapping::from_labels(["politics", "entertainment"]);
        let json = serde_json::to_value(&m).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"index_to_label": ["entertainment", "politics"]})
        );

        let back: LabelMapping = serde_json::from_value(json).unwrap();
        assert_eq!(back.index_of("politics"), Some(1));
        assert_eq!(back, m);
    }

    #[test]
    fn duplicate_labels_rejected_on_load() {
        let json = r#"{"index_to_label": ["a", "b", "a"]}"#;
        let err = serde_json::from_str::<LabelMapping>(json).unwrap_err();
        assert!(err.to_string().contains("duplicate label"), "got: {err}");
    }

    #[test]
    fn empty_mapping() {
        let m = LabelMapping::from_labels(Vec::<String>::new());
        assert!(m.is_empty());
    }
}
