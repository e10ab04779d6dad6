use thiserror::Error;

#[derive(Debug, Error)]
pub enum HwError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("modbus timeout")]
    Timeout,
    #[error("modbus exception code {0:#04x}")]
    Exception(u8),
    #[error("modbus protocol error: {0}")]
    Protocol(String),
    #[error("interlock: unit {unit} coils {open} and {close} would both be energized")]
    Interlock { unit: u8, open: u16, close: u16 },
    #[error("injected failure on coil {0}")]
    Injected(u16),
}

pub type Result<T> = std::result::Result<T, HwError>;
