//! Static label catalogs mapping model output indices to human-readable labels.

use std::collections::HashSet;

use serde::Serialize;

use crate::classifier::ClassifierError;

/// A single class the model can predict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassLabel {
    /// Identifier reported to callers
    pub id: i64,
    /// Short label
    pub name: String,
    /// Longer human-readable meaning
    pub description: String,
}

impl ClassLabel {
    pub fn new(id: i64, name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            description: description.into(),
        }
    }
}

/// Ordered labels, indexed by the model's output position.
#[derive(Debug, Clone)]
pub struct LabelCatalog {
    name: String,
    labels: Vec<ClassLabel>,
}

impl LabelCatalog {
    /// Builds a catalog, rejecting empty catalogs and duplicate ids.
    pub fn new(name: impl Into<String>, labels: Vec<ClassLabel>) -> Result<Self, ClassifierError> {
        let name = name.into();
        if labels.is_empty() {
            return Err(ClassifierError::BuildError(format!(
                "Label catalog '{}' must contain at least one class",
                name
            )));
        }
        let mut seen = HashSet::new();
        for label in &labels {
            if !seen.insert(label.id) {
                return Err(ClassifierError::BuildError(format!(
                    "Duplicate class id {} in catalog '{}'",
                    label.id, name
                )));
            }
        }
        Ok(Self { name, labels })
    }

    /// Alzheimer's stages in the order the MRI network was trained on.
    pub fn alzheimer_stages() -> Self {
        Self {
            name: "alzheimer".to_string(),
            labels: vec![
                ClassLabel::new(0, "Mild Impairment", "Mild cognitive decline, may affect daily activities."),
                ClassLabel::new(1, "Moderate Impairment", "More noticeable cognitive impairment, requiring assistance."),
                ClassLabel::new(2, "No Impairment", "No visible signs of Alzheimer's disease."),
                ClassLabel::new(3, "Very Mild Impairment", "Early stage with very slight memory issues or confusion."),
            ],
        }
    }

    /// EEG seizure severity levels. Output index `i` is reported as level `i + 1`.
    pub fn eeg_severity() -> Self {
        Self {
            name: "eeg".to_string(),
            labels: vec![
                ClassLabel::new(1, "Healthy", "Healthy brain activity"),
                ClassLabel::new(2, "Mild", "Mild epileptic activity"),
                ClassLabel::new(3, "Moderate", "Moderate epileptic activity"),
                ClassLabel::new(4, "Severe", "Severe epileptic activity"),
                ClassLabel::new(5, "Seizure", "Seizure state"),
            ],
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn labels(&self) -> &[ClassLabel] {
        &self.labels
    }

    /// Maps a model output index to its label.
    pub fn lookup(&self, index: usize) -> Result<&ClassLabel, ClassifierError> {
        self.labels.get(index).ok_or(ClassifierError::UnknownClass {
            index,
            num_classes: self.labels.len(),
        })
    }
}
