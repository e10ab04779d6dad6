use std::fmt;
use thiserror::Error;

/// Which coil of the open/close pair a write addressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coil {
    Open,
    Close,
}

impl fmt::Display for Coil {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Coil::Open => "open",
            Coil::Close => "close",
        })
    }
}

/// Step of a command sequence during which a write failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// De-energizing a coil (first step of OPEN/CLOSE, both steps of STOP).
    Release,
    /// Energizing the coil for the requested direction.
    Engage,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Phase::Release => "release",
            Phase::Engage => "engage",
        })
    }
}

/// Classified cause of a failed coil write.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WriteFault {
    #[error("timeout")]
    Timeout,
    #[error("interlock refused the write")]
    Interlock,
    #[error("device rejected the write: {0}")]
    Device(String),
    #[error("transport: {0}")]
    Transport(String),
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CoverError {
    #[error("invalid position request: {0} (expected 0..=100)")]
    InvalidPositionRequest(i32),
    #[error("position unknown; open or close fully to establish a reference")]
    UnknownPosition,
    #[error("command failed: {coil} coil, {phase} phase: {fault}")]
    CommandFailed {
        coil: Coil,
        phase: Phase,
        fault: WriteFault,
    },
    #[error("configuration error: {0}")]
    Configuration(String),
}

#[derive(Debug, Error, Clone)]
pub enum BuildError {
    #[error("missing cover id")]
    MissingId,
    #[error("missing travel configuration")]
    MissingTravel,
    #[error("missing coil pair")]
    MissingCoils,
    #[error("missing coil writer")]
    MissingWriter,
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
