use std::fs;
use std::path::Path;

use log::debug;
use ndarray::{Array1, Array2, ArrayD};
use serde::{Deserialize, Serialize};

use super::error::ClassifierError;
use super::preprocess::{InferenceInput, InputContract, Preprocessor};
use super::utils::{column_statistics, standardize};

/// Per-feature statistics recorded at training time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureStatistics {
    pub mean: Vec<f32>,
    pub std: Vec<f32>,
}

impl FeatureStatistics {
    /// Reads statistics from a JSON file shaped `{"mean": [...], "std": [...]}`.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ClassifierError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|e| {
            ClassifierError::BuildError(format!("Failed to read feature statistics {:?}: {}", path, e))
        })?;
        let stats: FeatureStatistics = serde_json::from_str(&raw).map_err(|e| {
            ClassifierError::BuildError(format!("Invalid feature statistics {:?}: {}", path, e))
        })?;
        if stats.mean.is_empty() || stats.mean.len() != stats.std.len() {
            return Err(ClassifierError::BuildError(format!(
                "Feature statistics {:?} must have equally sized, non-empty mean and std",
                path
            )));
        }
        Ok(stats)
    }
}

/// How feature columns are standardized before inference.
#[derive(Debug, Clone, PartialEq)]
pub enum ScalingStrategy {
    /// Statistics computed from the rows of the incoming request.
    /// Predictions for a row then depend on the other rows sent with it.
    BatchStatistics,
    /// Fixed statistics recorded when the model was trained.
    Fixed(FeatureStatistics),
}

impl Default for ScalingStrategy {
    fn default() -> Self {
        Self::BatchStatistics
    }
}

/// Parses CSV uploads into a standardized `[rows, 1, features]` tensor.
#[derive(Debug, Clone)]
pub struct TabularPreprocessor {
    label_column: String,
    feature_count: Option<usize>,
    scaling: ScalingStrategy,
}

impl Default for TabularPreprocessor {
    fn default() -> Self {
        Self {
            label_column: "y".to_string(),
            feature_count: None,
            scaling: ScalingStrategy::default(),
        }
    }
}

impl TabularPreprocessor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_label_column(mut self, column: impl Into<String>) -> Self {
        self.label_column = column.into();
        self
    }

    /// Pins the number of feature columns the model was trained on.
    pub fn with_feature_count(mut self, count: usize) -> Self {
        self.feature_count = Some(count);
        self
    }

    pub fn with_scaling(mut self, scaling: ScalingStrategy) -> Self {
        if let ScalingStrategy::Fixed(stats) = &scaling {
            self.feature_count = Some(stats.mean.len());
        }
        self.scaling = scaling;
        self
    }

    pub fn scaling(&self) -> &ScalingStrategy {
        &self.scaling
    }

    /// Reads the upload into a row-major feature matrix, keeping only numeric columns.
    fn read_features(&self, input: &InferenceInput) -> Result<Array2<f32>, ClassifierError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(false)
            .trim(csv::Trim::All)
            .from_reader(input.bytes.as_ref());

        let headers = reader
            .headers()
            .map_err(|e| ClassifierError::MalformedInput(format!("Failed to read CSV header: {}", e)))?
            .clone();

        let mut columns: Vec<Option<Vec<f32>>> = headers
            .iter()
            .map(|name| if name == self.label_column { None } else { Some(Vec::new()) })
            .collect();

        let mut rows = 0usize;
        for (line, record) in reader.records().enumerate() {
            let record = record.map_err(|e| {
                ClassifierError::MalformedInput(format!("Invalid CSV row {}: {}", line + 1, e))
            })?;
            for (column, cell) in columns.iter_mut().zip(record.iter()) {
                let numeric = cell.parse::<f32>().ok().filter(|v| v.is_finite());
                let still_numeric = match (column.as_mut(), numeric) {
                    (Some(values), Some(v)) => {
                        values.push(v);
                        true
                    }
                    (Some(_), None) => false,
                    (None, _) => true,
                };
                if !still_numeric {
                    *column = None;
                }
            }
            rows += 1;
        }

        if rows == 0 {
            return Err(ClassifierError::MalformedInput("CSV contains no data rows".into()));
        }

        let kept: Vec<Vec<f32>> = columns.into_iter().flatten().collect();
        if kept.is_empty() {
            return Err(ClassifierError::MalformedInput(
                "CSV contains no numeric feature columns".into(),
            ));
        }
        debug!("Parsed {} rows with {} numeric feature columns", rows, kept.len());

        let mut features = Array2::<f32>::zeros((rows, kept.len()));
        for (j, values) in kept.iter().enumerate() {
            for (i, &v) in values.iter().enumerate() {
                features[[i, j]] = v;
            }
        }
        Ok(features)
    }
}

impl Preprocessor for TabularPreprocessor {
    fn validate(&self, input: &InferenceInput) -> Result<(), ClassifierError> {
        if let Some(ext) = input.extension() {
            if ext != "csv" {
                return Err(ClassifierError::ValidationError(format!(
                    "Invalid file type '.{}'. Please upload a CSV file.",
                    ext
                )));
            }
        }
        if input.bytes.is_empty() {
            return Err(ClassifierError::MalformedInput("Uploaded CSV is empty".into()));
        }
        Ok(())
    }

    fn preprocess(&self, input: &InferenceInput) -> Result<ArrayD<f32>, ClassifierError> {
        self.validate(input)?;
        let mut features = self.read_features(input)?;
        let (rows, cols) = features.dim();

        if let Some(expected) = self.feature_count {
            if cols != expected {
                return Err(ClassifierError::MalformedInput(format!(
                    "Expected {} numeric feature columns, found {}",
                    expected, cols
                )));
            }
        }

        match &self.scaling {
            ScalingStrategy::BatchStatistics => {
                let (mean, std) = column_statistics(&features);
                standardize(&mut features, &mean, &std);
            }
            ScalingStrategy::Fixed(stats) => {
                let mean = Array1::from(stats.mean.clone());
                let std = Array1::from(stats.std.clone());
                standardize(&mut features, &mean, &std);
            }
        }

        features
            .into_shape_with_order((rows, 1, cols))
            .map(|t| t.into_dyn())
            .map_err(|e| ClassifierError::MalformedInput(format!("Failed to reshape features: {}", e)))
    }

    fn input_contract(&self) -> InputContract {
        InputContract::new(vec![None, Some(1), self.feature_count])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn csv_input(body: &str) -> InferenceInput {
        InferenceInput::new(body.as_bytes().to_vec()).with_file_name("epileptic.csv")
    }

    #[test]
    fn test_one_row_per_input_row_in_order() {
        let body = "id,X1,X2,y\nrec-a,1,10,1\nrec-b,2,20,2\nrec-c,3,30,5\n";
        let tensor = TabularPreprocessor::new().preprocess(&csv_input(body)).unwrap();
        assert_eq!(tensor.shape(), &[3, 1, 2]);
        // Standardized values keep the input ordering.
        assert!(tensor[[0, 0, 0]] < tensor[[1, 0, 0]]);
        assert!(tensor[[1, 0, 0]] < tensor[[2, 0, 0]]);
        assert!(tensor[[1, 0, 1]].abs() < 1e-6);
    }

    #[test]
    fn test_label_and_text_columns_are_dropped() {
        let body = "name,a,y\nfoo,1.5,3\nbar,2.5,4\n";
        let tensor = TabularPreprocessor::new().preprocess(&csv_input(body)).unwrap();
        assert_eq!(tensor.shape(), &[2, 1, 1]);
    }

    #[test]
    fn test_custom_label_column() {
        let body = "a,target,y\n1,0,2\n3,1,4\n";
        let preprocessor = TabularPreprocessor::new().with_label_column("target");
        let tensor = preprocessor.preprocess(&csv_input(body)).unwrap();
        // `y` is an ordinary feature once another label column is named.
        assert_eq!(tensor.shape(), &[2, 1, 2]);
    }

    #[test]
    fn test_column_with_blank_cell_is_not_numeric() {
        let body = "a,b\n1,\n2,3\n";
        let tensor = TabularPreprocessor::new().preprocess(&csv_input(body)).unwrap();
        assert_eq!(tensor.shape(), &[2, 1, 1]);
    }

    #[test]
    fn test_no_numeric_columns() {
        let body = "name,y\nfoo,1\n";
        assert!(matches!(
            TabularPreprocessor::new().preprocess(&csv_input(body)),
            Err(ClassifierError::MalformedInput(_))
        ));
    }

    #[test]
    fn test_header_only() {
        assert!(matches!(
            TabularPreprocessor::new().preprocess(&csv_input("a,b,y\n")),
            Err(ClassifierError::MalformedInput(_))
        ));
    }

    #[test]
    fn test_rejects_non_csv_extension() {
        let input = InferenceInput::new(b"a\n1\n".to_vec()).with_file_name("data.xlsx");
        assert!(matches!(
            TabularPreprocessor::new().validate(&input),
            Err(ClassifierError::ValidationError(_))
        ));
    }

    #[test]
    fn test_fixed_statistics_ignore_batch_composition() {
        let stats = FeatureStatistics { mean: vec![10.0, 0.0], std: vec![2.0, 1.0] };
        assert_eq!(TabularPreprocessor::new().scaling(), &ScalingStrategy::BatchStatistics);
        let preprocessor = TabularPreprocessor::new().with_scaling(ScalingStrategy::Fixed(stats.clone()));
        assert_eq!(preprocessor.scaling(), &ScalingStrategy::Fixed(stats));

        let alone = preprocessor.preprocess(&csv_input("a,b\n12,1\n")).unwrap();
        let batched = preprocessor.preprocess(&csv_input("a,b\n12,1\n100,-4\n")).unwrap();
        assert_eq!(alone[[0, 0, 0]], 1.0);
        assert_eq!(alone[[0, 0, 0]], batched[[0, 0, 0]]);
        assert_eq!(alone[[0, 0, 1]], batched[[0, 0, 1]]);

        assert!(matches!(
            preprocessor.preprocess(&csv_input("a\n1\n")),
            Err(ClassifierError::MalformedInput(_))
        ));
    }

    #[test]
    fn test_statistics_file_round_trip() {
        let dir = std::env::temp_dir().join("neuropath-stats-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("stats.json");
        std::fs::write(&path, r#"{"mean": [0.5, 1.5], "std": [1.0, 2.0]}"#).unwrap();
        let stats = FeatureStatistics::from_json_file(&path).unwrap();
        assert_eq!(stats.std, vec![1.0, 2.0]);

        std::fs::write(&path, r#"{"mean": [0.5], "std": []}"#).unwrap();
        assert!(FeatureStatistics::from_json_file(&path).is_err());
    }

    #[test]
    fn test_contract_tracks_feature_count() {
        let preprocessor = TabularPreprocessor::new().with_feature_count(178);
        assert_eq!(preprocessor.input_contract().to_string(), "[?, 1, 178]");
    }
}
