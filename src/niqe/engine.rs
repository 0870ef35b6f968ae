use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Failures of an external quality-engine session.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("could not start engine `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("engine I/O failed: {0}")]
    Io(#[from] io::Error),

    #[error("engine command `{command}` failed: {message}")]
    Command { command: String, message: String },

    #[error("engine exited before answering `{command}`")]
    Disconnected { command: String },

    #[error("engine exited with {0}")]
    ExitStatus(std::process::ExitStatus),
}

/// Parameters of one no-reference model fit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitRequest {
    /// Square block edge in pixels.
    pub block_size: u32,
    pub sharpness_threshold: f64,
}

/// Something that can start quality-engine sessions.
pub trait QualityEngine {
    type Session: EngineSession;

    fn open(&self) -> Result<Self::Session, EngineError>;
}

/// One live engine session. Calls run in order: collection, fit, save.
pub trait EngineSession {
    /// Register the image files the model is fitted on.
    fn build_collection(&mut self, paths: &[PathBuf]) -> Result<(), EngineError>;

    fn fit(&mut self, request: &FitRequest) -> Result<(), EngineError>;

    /// Persist the fitted model; the file format belongs to the engine.
    fn save_model(&mut self, path: &Path) -> Result<(), EngineError>;

    /// Shut the engine down.
    fn close(self) -> Result<(), EngineError>;
}
