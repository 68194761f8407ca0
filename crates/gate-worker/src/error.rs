#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("worker i/o failed: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
    #[error("invalid control message: {message}")]
    Protocol { message: String },
    #[error("failed to locate the gate executable: {source}")]
    CurrentExe {
        #[source]
        source: std::io::Error,
    },
}
