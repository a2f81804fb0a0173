pub mod builder;
pub mod classifier;
pub mod error;
pub mod fallback;
pub mod model;
pub mod preprocess;
pub mod tabular;
mod utils;
pub mod vision;

pub use builder::ClassifierBuilder;
pub use classifier::{Classifier, ClassifierInfo, PredictionResult, RequestStage};
pub use error::ClassifierError;
pub use fallback::FallbackModel;
pub use model::{InferenceModel, LoadOptions, ModelHandle, ModelStatus, OnnxModel, Prediction};
pub use preprocess::{InferenceInput, InputContract, Preprocessor};
pub use tabular::{FeatureStatistics, ScalingStrategy, TabularPreprocessor};
pub use vision::ImagePreprocessor;
