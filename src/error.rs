use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SimError {
    #[error("Input error: {0}")]
    Input(String),
    #[error("Mesher error: {0}")]
    Mesher(String),
    #[error("Solver error: {0}")]
    Solver(String),
    #[error("Post Processor error: {0}")]
    PostProcessor(String),
    #[error("job {0} not found")]
    NotFound(String),
}
