use tracing::{trace, warn};

use crate::bus::{OpFlags, SystemBus, OP_MASK};
use crate::error::{Error, Result};
use crate::registers::{DEREF_CONTROLLER, MEM, MEMADDR, PC, TX};

use super::microcode::{Action, AddressingMode, ConditionOp, MicroCode, MicroCodeStep};

/// Executes one instruction. Steps fetching the operand are put in front of the steps of the
/// microcode; if the condition of the microcode does not hold only the operand is fetched.
///
/// Operand bytes are the bytes read from memory at PC, whether the addressing mode fetches them
/// or the microcode spells the fetch out.
#[derive(Clone, Debug)]
pub struct MicroCodeRunner {
    opcode: u8,
    instruction: &'static str,
    mode: AddressingMode,
    steps: Vec<MicroCodeStep>,
    valid: bool,
    constant: u16,
    /// Values of the step counter passed to `grab_constant` at which operand bytes, LSB first,
    /// are on the data bus.
    operand: Vec<usize>,
    complete: bool,
}

impl MicroCodeRunner {
    pub fn new(mc: &MicroCode, bus: &SystemBus) -> Self {
        let valid = match mc.condition_op {
            ConditionOp::None => true,
            ConditionOp::And => bus.is_set(mc.condition),
            ConditionOp::Nand => !bus.is_set(mc.condition),
        };

        let mut runner = Self {
            opcode: mc.opcode,
            instruction: mc.instruction,
            mode: mc.mode,
            steps: Vec::with_capacity(mc.steps.len() + 8),
            valid,
            constant: 0,
            operand: vec![],
            complete: false,
        };
        runner.fetch_operand(mc.subject);
        if valid {
            runner.steps.extend_from_slice(&mc.steps);
        } else {
            runner.complete = true;
        }
        runner.operand = operand_steps(&runner.steps);
        runner
    }

    fn fetch_byte(&mut self, target: u8, op: u8) {
        self.steps.push(MicroCodeStep::xaddr(PC, MEMADDR, OpFlags::INC.bits()));
        self.steps.push(MicroCodeStep::xdata(MEM, target, op));
    }

    fn fetch_word(&mut self, target: u8) {
        self.fetch_byte(target, 0);
        self.fetch_byte(target, OpFlags::MSB.bits());
    }

    fn fetch_operand(&mut self, subject: u8) {
        let valid = self.valid;
        match self.mode {
            AddressingMode::Implied => {}
            AddressingMode::ImmediateByte => {
                self.fetch_byte(if valid { subject } else { TX }, 0);
            }
            AddressingMode::ImmediateWord => {
                // PC moves while the operand is fetched and the memory address register cannot
                // be loaded a byte at a time; those go through TX.
                let target = if valid && subject != PC && subject != MEMADDR {
                    subject
                } else {
                    TX
                };
                self.fetch_word(target);
                if valid && target != subject {
                    self.steps.push(MicroCodeStep::xaddr(TX, subject, 0));
                }
            }
            AddressingMode::IndirectByte => {
                self.fetch_word(TX);
                if valid {
                    self.steps.push(MicroCodeStep::xaddr(TX, MEMADDR, 0));
                    self.steps.push(MicroCodeStep::xdata(MEM, subject, 0));
                }
            }
            AddressingMode::IndirectWord => {
                self.fetch_word(TX);
                if valid {
                    self.steps.push(MicroCodeStep::xaddr(TX, MEMADDR, OpFlags::INC.bits()));
                    self.steps.push(MicroCodeStep::xdata(MEM, subject, 0));
                    self.steps.push(MicroCodeStep::xaddr(TX, MEMADDR, 0));
                    self.steps.push(MicroCodeStep::xdata(MEM, subject, OpFlags::MSB.bits()));
                }
            }
        }
    }

    pub fn opcode(&self) -> u8 {
        self.opcode
    }

    pub fn mode(&self) -> AddressingMode {
        self.mode
    }

    pub fn valid(&self) -> bool {
        self.valid
    }

    pub fn steps(&self) -> &[MicroCodeStep] {
        &self.steps
    }

    pub fn constant(&self) -> u16 {
        self.constant
    }

    /// True once the operand has been fetched.
    pub fn complete(&self) -> bool {
        self.complete
    }

    pub fn has_step(&self, step: usize) -> bool {
        step < self.steps.len()
    }

    /// Picks the operand bytes off the data bus while they pass by. `step` is one past the
    /// step that put the current value on the bus. Returns whether the instruction is complete.
    pub fn grab_constant(&mut self, step: usize, bus: &SystemBus) -> bool {
        match self.operand.iter().position(|s| *s == step) {
            Some(0) => self.constant = bus.read_data_bus() as u16,
            Some(_) => self.constant |= (bus.read_data_bus() as u16) << 8,
            None => {}
        }
        if self.operand.last().map_or(step == 1, |last| *last == step) {
            self.complete = true;
        }
        self.complete
    }

    pub fn execute_next_step(&self, step: usize, bus: &mut SystemBus, scratch: u8) -> Result<()> {
        let s = self.steps.get(step).ok_or_else(|| {
            Error::InvalidMicroCode(format!("{} has no step {}", self.instruction, step))
        })?;
        let deref = |id: u8| if id == DEREF_CONTROLLER { scratch } else { id };
        let src = deref(s.src);
        let target = deref(s.target);
        let op = s.op & OP_MASK;

        trace!("{:02x} step {:2}: {}", self.opcode, step, s);
        match s.action {
            Action::XData => bus.xdata_transfer(src, target, op),
            Action::XAddr => bus.xaddr_transfer(src, target, op),
            Action::Io => bus.io_transfer(src, target, op),
            Action::Other if op == OpFlags::HALT.bits() => bus.stop(),
            Action::Other => {
                warn!(
                    "Unhandled operation {:02x} for instruction {:02x} step {}",
                    s.op, self.opcode, step
                );
                return Err(Error::InvalidMicroCode(format!(
                    "operation {:#04x} in {}",
                    s.op, self.instruction
                )));
            }
        }
        Ok(())
    }

    /// The mnemonic with the constant operand filled in.
    pub fn instruction(&self) -> String {
        if self.instruction.contains("$xxxx") {
            self.instruction
                .replace("$xxxx", &format!("${:04x}", self.constant))
        } else if self.instruction.contains("$xx") {
            self.instruction
                .replace("$xx", &format!("${:02x}", self.constant))
        } else {
            self.instruction.to_string()
        }
    }
}

fn operand_steps(steps: &[MicroCodeStep]) -> Vec<usize> {
    let fetch = MicroCodeStep::xaddr(PC, MEMADDR, OpFlags::INC.bits());
    steps
        .windows(2)
        .enumerate()
        .filter(|(_, pair)| pair[0] == fetch && pair[1].action == Action::XData && pair[1].src == MEM)
        .map(|(ix, _)| ix + 2)
        .take(2)
        .collect()
}
