use std::fmt;

use crate::bus::ProcessorFlags;
use crate::error::{Error, Result};

pub const MAX_STEPS: usize = 24;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AddressingMode {
    Implied,
    /// One byte following the opcode is loaded into the subject.
    ImmediateByte,
    /// Two bytes following the opcode are loaded into the subject, LSB first.
    ImmediateWord,
    /// The word following the opcode is the address of the byte loaded into the subject.
    IndirectByte,
    /// The word following the opcode is the address of the word loaded into the subject.
    IndirectWord,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConditionOp {
    None,
    And,
    Nand,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    XData,
    XAddr,
    Io,
    Other,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MicroCodeStep {
    pub action: Action,
    pub src: u8,
    pub target: u8,
    pub op: u8,
}

impl MicroCodeStep {
    pub const fn xdata(src: u8, target: u8, op: u8) -> Self {
        Self {
            action: Action::XData,
            src,
            target,
            op,
        }
    }

    pub const fn xaddr(src: u8, target: u8, op: u8) -> Self {
        Self {
            action: Action::XAddr,
            src,
            target,
            op,
        }
    }

    pub const fn io(register: u8, channel: u8, op: u8) -> Self {
        Self {
            action: Action::Io,
            src: register,
            target: channel,
            op,
        }
    }

    pub const fn other(op: u8) -> Self {
        Self {
            action: Action::Other,
            src: 0,
            target: 0,
            op,
        }
    }
}

impl fmt::Display for MicroCodeStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let action = match self.action {
            Action::XData => "XDATA",
            Action::XAddr => "XADDR",
            Action::Io => "IO",
            Action::Other => "OTHER",
        };
        write!(
            f,
            "{} {:x} -> {:x} [{:02x}]",
            action, self.src, self.target, self.op
        )
    }
}

/// The definition of a single instruction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MicroCode {
    pub opcode: u8,
    /// Mnemonic. `$xx` and `$xxxx` are replaced by the constant operand when displayed.
    pub instruction: &'static str,
    pub mode: AddressingMode,
    /// Register receiving the operand of the non-implied addressing modes.
    pub subject: u8,
    pub condition: ProcessorFlags,
    pub condition_op: ConditionOp,
    pub steps: Vec<MicroCodeStep>,
}

impl MicroCode {
    pub fn implied(opcode: u8, instruction: &'static str, steps: Vec<MicroCodeStep>) -> Self {
        Self::with_mode(opcode, instruction, AddressingMode::Implied, 0, steps)
    }

    pub fn with_mode(
        opcode: u8,
        instruction: &'static str,
        mode: AddressingMode,
        subject: u8,
        steps: Vec<MicroCodeStep>,
    ) -> Self {
        Self {
            opcode,
            instruction,
            mode,
            subject,
            condition: ProcessorFlags::empty(),
            condition_op: ConditionOp::None,
            steps,
        }
    }

    /// Only run the remaining steps if `op` applied to `condition` holds.
    pub fn when(mut self, condition: ProcessorFlags, op: ConditionOp) -> Self {
        self.condition = condition;
        self.condition_op = op;
        self
    }
}

/// Microcode for all 256 opcodes. Opcodes without an entry cannot be executed.
#[derive(Clone, Debug)]
pub struct MicroCodeTable {
    entries: Vec<Option<MicroCode>>,
}

impl Default for MicroCodeTable {
    fn default() -> Self {
        super::table::default_table()
    }
}

impl MicroCodeTable {
    pub fn empty() -> Self {
        Self {
            entries: vec![None; 256],
        }
    }

    pub fn from_entries(entries: impl IntoIterator<Item = MicroCode>) -> Result<Self> {
        let mut table = Self::empty();
        for mc in entries {
            table.insert(mc)?;
        }
        Ok(table)
    }

    /// Adds or replaces the entry for the opcode of `mc`.
    pub fn insert(&mut self, mc: MicroCode) -> Result<()> {
        if mc.steps.len() > MAX_STEPS {
            return Err(Error::InvalidMicroCode(format!(
                "{} has {} steps",
                mc.instruction,
                mc.steps.len()
            )));
        }
        let opcode = mc.opcode as usize;
        self.entries[opcode] = Some(mc);
        Ok(())
    }

    /// Stores `mc` at `slot` without checking its opcode field.
    pub fn insert_at(&mut self, slot: u8, mc: MicroCode) {
        self.entries[slot as usize] = Some(mc);
    }

    pub fn get(&self, opcode: u8) -> Option<&MicroCode> {
        self.entries[opcode as usize].as_ref()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MicroCode> {
        self.entries.iter().flatten()
    }

    pub fn instruction_with_opcode(&self, opcode: u8) -> &'static str {
        match self.get(opcode) {
            Some(mc) if mc.opcode == opcode => mc.instruction,
            _ => "NOP",
        }
    }

    pub fn opcode_for_instruction(&self, instruction: &str) -> Result<u8> {
        self.iter()
            .find(|mc| mc.instruction == instruction)
            .map(|mc| mc.opcode)
            .ok_or_else(|| Error::InvalidInstruction(instruction.to_string()))
    }
}
