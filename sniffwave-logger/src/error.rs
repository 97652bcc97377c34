use std::io;
use std::process::ExitStatus;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SniffwaveError {
    #[error("failed to start '{program}', make sure it is in PATH: {source}")]
    Spawn { program: String, source: io::Error },
    #[error("'{program}' was started without a stdout pipe")]
    MissingStdout { program: String },
    #[error("failed to read output of '{program}': {source}")]
    Read { program: String, source: io::Error },
    #[error("failed to wait for '{program}': {source}")]
    Wait { program: String, source: io::Error },
    #[error("'{program}' exited unexpectedly ({status})")]
    UnexpectedExit { program: String, status: ExitStatus },
}

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("worker '{0}' was started without a queue")]
    QueueNotSet(String),
    #[error("worker '{name}' failed: {message}")]
    Consumer { name: String, message: String },
}
