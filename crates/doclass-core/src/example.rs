//! Labeled training examples: one embedded document and the label it was filed under.

use serde::{Deserialize, Serialize};

use crate::CoreError;

/// A single embedded document with its ground-truth label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledExample {
    /// Path of the document the embedding was computed from.
    pub source: String,
    pub label: String,
    pub embedding: Vec<f32>,
}

impl LabeledExample {
    pub fn new(source: impl Into<String>, label: impl Into<String>, embedding: Vec<f32>) -> Self {
        Self {
            source: source.into(),
            label: label.into(),
            embedding,
        }
    }
}

/// Shared embedding dimension of a set of examples.
///
/// Returns `Ok(None)` for an empty slice and an error naming the first
/// example whose length differs from the first one.
pub fn embedding_dim(examples: &[LabeledExample]) -> Result<Option<usize>, CoreError> {
    let Some(first) = examples.first() else {
        return Ok(None);
    };
    let expected = first.embedding.len();
    for ex in &examples[1..] {
        if ex.embedding.len() != expected {
            return Err(CoreError::DimensionMismatch {
                path: ex.source.clone(),
                expected,
                actual: ex.embedding.len(),
            });
        }
    }
    Ok(Some(expected))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dim_of_empty_is_none() {
        assert_eq!(embedding_dim(&[]).unwrap(), None);
    }

    #[test]
    fn dim_of_consistent_examples() {
        let examples = vec![
            LabeledExample::new("a.txt", "business", vec![0.1, 0.2, 0.3]),
            LabeledExample::new("b.txt", "sport", vec![0.4, 0.5, 0.6]),
        ];
        assert_eq!(embedding_dim(&examples).unwrap(), Some(3));
    }

    #[test]
    fn dim_mismatch_names_the_offender() {
        let examples = vec![
            LabeledExample::new("a.txt", "business", vec![0.1, 0.2, 0.3]),
            LabeledExample::new("b.txt", "sport", vec![0.4, 0.5]),
        ];
        let err = embedding_dim(&examples).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("b.txt"), "got: {msg}");
        assert!(msg.contains("expected 3"), "got: {msg}");
    }
}
