use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq)]
pub enum Error {
    #[error("Invalid component id or address ({0:#06x})")]
    InvalidComponentId(u16),

    #[error("Write to protected memory ({0:#06x})")]
    ProtectedMemory(u16),

    #[error("Invalid instruction ({0})")]
    InvalidInstruction(String),

    #[error("Invalid microcode: {0}")]
    InvalidMicroCode(String),

    #[error("No microcode for opcode {0:#04x}")]
    NoMicroCode(u8),

    #[error("{0}")]
    General(String),
}

pub type Result<T> = std::result::Result<T, Error>;
