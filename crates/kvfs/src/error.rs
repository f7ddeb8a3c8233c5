// Error types for key-value store operations
use bridgefs::BackendFailure;

#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("remote fault: {code}")]
    Remote { code: String },
}

impl StoreError {
    /// Shape a store error into the closed failure union the adapter
    /// translates. Remote faults keep their code inside an RPC wrapper;
    /// transport errors carry no recognizable code and normalize to an
    /// I/O error downstream.
    pub fn into_failure(self) -> BackendFailure {
        match self {
            StoreError::Remote { code } => BackendFailure::rpc(BackendFailure::Code(code)),
            StoreError::Transport(message) => {
                BackendFailure::Code(format!("transport: {}", message))
            }
        }
    }
}
