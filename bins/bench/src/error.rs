use stride_api::StoreError;
use stride_engine::EngineError;

#[derive(Debug, thiserror::Error)]
pub enum BenchError {
    #[error("config ({context}): {detail}")]
    Config { context: &'static str, detail: String },

    #[error("store: {0}")]
    Store(#[from] StoreError),

    #[error("{0}")]
    Engine(#[from] EngineError),

    #[error("record {0} not found")]
    NotFound(String),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{failed} worker(s) failed")]
    WorkersFailed { failed: usize },

    #[error("task: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl BenchError {
    pub fn config(context: &'static str, detail: impl Into<String>) -> Self {
        BenchError::Config { context, detail: detail.into() }
    }
}
