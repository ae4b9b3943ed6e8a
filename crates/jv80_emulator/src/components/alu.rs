use std::convert::TryFrom;

use tracing::warn;

use crate::bus::{ProcessorFlags, SystemBus, OP_MASK};
use crate::component::{Component, ConnectedComponent, Connection, Event, EventSource};
use crate::error::{Error, Result};
use crate::registers::{LHS, RHS};

use super::register::Register;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Operation {
    Add = 0x0,
    Adc = 0x1,
    Sub = 0x2,
    Sbb = 0x3,
    And = 0x4,
    Or = 0x5,
    Xor = 0x6,
    Inc = 0x7,
    Dec = 0x8,
    Not = 0x9,
    Shl = 0xA,
    Shr = 0xB,
    Cmp = 0xC,
    Clr = 0xE,
}

impl TryFrom<u8> for Operation {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        Ok(match value & OP_MASK {
            0x0 => Operation::Add,
            0x1 => Operation::Adc,
            0x2 => Operation::Sub,
            0x3 => Operation::Sbb,
            0x4 => Operation::And,
            0x5 => Operation::Or,
            0x6 => Operation::Xor,
            0x7 => Operation::Inc,
            0x8 => Operation::Dec,
            0x9 => Operation::Not,
            0xA => Operation::Shl,
            0xB => Operation::Shr,
            0xC => Operation::Cmp,
            0xE => Operation::Clr,
            op => {
                return Err(Error::InvalidMicroCode(format!(
                    "unknown ALU operation {:#03x}",
                    op
                )))
            }
        })
    }
}

impl Operation {
    pub fn bits(self) -> u8 {
        self as u8
    }

    /// Computes the 9 bit result. Bit 8 is the carry, or the borrow for subtractions.
    fn apply(self, lhs: u8, rhs: u8, carry: bool) -> u16 {
        let (lhs, rhs, carry) = (lhs as i32, rhs as i32, carry as i32);
        let result = match self {
            Operation::Add => lhs + rhs,
            Operation::Adc => lhs + rhs + carry,
            Operation::Sub | Operation::Cmp => lhs - rhs,
            Operation::Sbb => lhs - rhs - carry,
            Operation::And => lhs & rhs,
            Operation::Or => lhs | rhs,
            Operation::Xor => lhs ^ rhs,
            Operation::Inc => rhs + 1,
            Operation::Dec => rhs - 1,
            Operation::Not => !rhs & 0xFF,
            Operation::Shl => (rhs << 1) | carry,
            Operation::Shr => (rhs >> 1) | (carry << 7) | ((rhs & 0x01) << 8),
            Operation::Clr => 0,
        };
        (result & 0x01FF) as u16
    }

    fn overflow(self, lhs: u8, rhs: u8, result: u8) -> Option<bool> {
        let s1 = lhs & 0x80 != 0;
        let s2 = rhs & 0x80 != 0;
        let sr = result & 0x80 != 0;
        match self {
            Operation::Add | Operation::Adc => Some(!(s1 ^ s2) & (sr ^ s1)),
            Operation::Sub | Operation::Sbb | Operation::Cmp => Some((s1 ^ s2) & (sr ^ s1)),
            _ => None,
        }
    }
}

/// The arithmetic unit. Loading a byte into the right hand side register runs the operation
/// selected by the op flags against the left hand side register and stores the result in the
/// right hand side. Address transfers move the processor flags.
#[derive(Debug)]
pub struct Alu {
    lhs: Register,
    rhs: Register,
}

impl Default for Alu {
    fn default() -> Self {
        Self::new()
    }
}

impl Alu {
    pub fn new() -> Self {
        Self::with_ids(RHS, LHS)
    }

    pub fn with_ids(id: u8, lhs_id: u8) -> Self {
        Self {
            lhs: Register::named(lhs_id, "LHS"),
            rhs: Register::with_alias(id, lhs_id, "RHS"),
        }
    }

    pub fn lhs(&self) -> &Register {
        &self.lhs
    }

    pub fn lhs_mut(&mut self) -> &mut Register {
        &mut self.lhs
    }

    pub fn get_value(&self) -> u8 {
        self.rhs.get_value()
    }

    pub fn set_value(&mut self, value: u8) {
        self.rhs.set_value(value);
    }

    fn execute(&mut self, bus: &mut SystemBus) -> Result<()> {
        let operation = Operation::try_from(bus.op()).map_err(|err| {
            warn!("ALU: {}", err);
            err
        })?;

        let lhs = self.lhs.get_value();
        let rhs = self.rhs.get_value();
        let result = operation.apply(lhs, rhs, bus.is_set(ProcessorFlags::CARRY));
        let value = (result & 0x00FF) as u8;

        bus.clear_flags();
        bus.set_flag(ProcessorFlags::ZERO, value == 0);
        bus.set_flag(ProcessorFlags::CARRY, result & 0x0100 != 0);
        if let Some(overflow) = operation.overflow(lhs, rhs, value) {
            bus.set_flag(ProcessorFlags::OVERFLOW, overflow);
        }

        if operation != Operation::Cmp {
            self.rhs.set_value(value);
        }
        Ok(())
    }
}

impl Component for Alu {
    fn on_rising_clock_edge(&mut self, bus: &mut SystemBus) -> Result<()> {
        self.lhs.on_rising_clock_edge(bus)?;
        if !bus.xaddr() && bus.get_id() == self.rhs.id() {
            bus.put_on_addr_bus(0x00);
            bus.put_on_data_bus(bus.flags().bits());
            return Ok(());
        }
        self.rhs.on_rising_clock_edge(bus)
    }

    fn on_high_clock(&mut self, bus: &mut SystemBus) -> Result<()> {
        self.lhs.on_high_clock(bus)?;
        if bus.put_id() == self.rhs.id() && !bus.xaddr() {
            bus.set_flags(bus.read_data_bus());
            return Ok(());
        }
        self.rhs.on_high_clock(bus)?;
        if bus.put_id() == self.rhs.id() && !bus.xdata() {
            self.execute(bus)?;
        }
        Ok(())
    }

    fn reset(&mut self) -> Result<()> {
        self.lhs.reset()?;
        self.rhs.reset()
    }

    fn status(&self) -> String {
        format!(
            "{:1x}. LHS {:02x}  {:1x}. RHS {:02x}",
            self.lhs.id(),
            self.lhs.get_value(),
            self.rhs.id(),
            self.rhs.get_value()
        )
    }
}

impl ConnectedComponent for Alu {
    fn connection(&self) -> &Connection {
        self.rhs.connection()
    }

    fn connection_mut(&mut self) -> &mut Connection {
        self.rhs.connection_mut()
    }

    fn value(&self) -> u16 {
        self.rhs.get_value() as u16
    }

    fn drain_events(&mut self, _source: EventSource, sink: &mut Vec<Event>) {
        let lhs = EventSource::Component(self.lhs.id());
        let rhs = EventSource::Component(self.rhs.id());
        self.lhs.drain_events(lhs, sink);
        self.rhs.drain_events(rhs, sink);
    }
}
