use ort::session::builder::{GraphOptimizationLevel, SessionBuilder};
use ort::session::Session;
use ort::Result as OrtResult;
use std::sync::OnceLock;

static INIT: OnceLock<Result<(), String>> = OnceLock::new();

/// How concurrent requests reach a model's compute call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionPolicy {
    /// Sessions are reentrant; requests run their forward passes in parallel
    #[default]
    Concurrent,
    /// A mutex around the compute call admits one forward pass at a time
    Serialized,
}

#[derive(Debug)]
pub struct RuntimeConfig {
    pub inter_threads: usize,
    pub intra_threads: usize,
    pub optimization_level: GraphOptimizationLevel,
    pub execution_policy: ExecutionPolicy,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            inter_threads: 0, // Let ONNX Runtime decide
            intra_threads: 0, // Let ONNX Runtime decide
            optimization_level: GraphOptimizationLevel::Level3,
            execution_policy: ExecutionPolicy::Concurrent,
        }
    }
}

impl Clone for RuntimeConfig {
    fn clone(&self) -> Self {
        Self {
            inter_threads: self.inter_threads,
            intra_threads: self.intra_threads,
            optimization_level: copy_level(&self.optimization_level),
            execution_policy: self.execution_policy,
        }
    }
}

// GraphOptimizationLevel is neither Clone nor Copy.
fn copy_level(level: &GraphOptimizationLevel) -> GraphOptimizationLevel {
    match level {
        GraphOptimizationLevel::Level1 => GraphOptimizationLevel::Level1,
        GraphOptimizationLevel::Level2 => GraphOptimizationLevel::Level2,
        GraphOptimizationLevel::Level3 => GraphOptimizationLevel::Level3,
        GraphOptimizationLevel::Disable => GraphOptimizationLevel::Disable,
    }
}

/// Parses `disable`, `1`, `2` or `3` (also `level1`..`level3`).
pub fn parse_optimization_level(raw: &str) -> Option<GraphOptimizationLevel> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "disable" | "none" | "0" => Some(GraphOptimizationLevel::Disable),
        "1" | "level1" => Some(GraphOptimizationLevel::Level1),
        "2" | "level2" => Some(GraphOptimizationLevel::Level2),
        "3" | "level3" | "all" => Some(GraphOptimizationLevel::Level3),
        _ => None,
    }
}

fn init_onnx_environment() -> OrtResult<()> {
    ort::init()
        .with_name("neuropath")
        .commit()?;
    Ok(())
}

/// Initializes the process-wide ONNX Runtime environment exactly once.
pub fn ensure_initialized() -> Result<(), String> {
    INIT.get_or_init(|| init_onnx_environment().map_err(|e| e.to_string()))
        .clone()
}

pub fn create_session_builder(config: &RuntimeConfig) -> OrtResult<SessionBuilder> {
    if let Err(msg) = ensure_initialized() {
        log::warn!("ONNX Runtime environment failed to initialize: {}", msg);
    }
    let mut builder = Session::builder()?;

    // Configure threading
    if config.inter_threads > 0 {
        builder = builder.with_inter_threads(config.inter_threads)?;
    }
    if config.intra_threads > 0 {
        builder = builder.with_intra_threads(config.intra_threads)?;
    }

    builder = builder.with_optimization_level(copy_level(&config.optimization_level))?;

    Ok(builder)
}
