mod address_register;
mod alu;
mod channel;
mod memory;
mod register;

pub use address_register::AddressRegister;
pub use alu::{Alu, Operation};
pub use channel::{IOChannel, InputFn, OutputFn, ResetFn, StatusFn};
pub use memory::{Memory, MemoryBank};
pub use register::Register;
