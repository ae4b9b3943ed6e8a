mod controller;
mod microcode;
pub mod opcodes;
mod runner;
mod table;

pub use controller::Controller;
pub use microcode::{
    Action, AddressingMode, ConditionOp, MicroCode, MicroCodeStep, MicroCodeTable, MAX_STEPS,
};
pub use runner::MicroCodeRunner;
pub use table::{default_table, nmi_microcode};
