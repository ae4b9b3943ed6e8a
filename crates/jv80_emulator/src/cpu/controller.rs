use std::sync::Arc;

use tracing::{debug, warn};

use crate::bus::{OpFlags, RunMode, SystemBus};
use crate::component::{Component, ComponentEvents, ConnectedComponent, Connection, Event, EventSource};
use crate::components::Register;
use crate::error::{Error, Result};
use crate::registers::{CONTROLLER, IR, MEM, MEMADDR, PC};

use super::microcode::{MicroCode, MicroCodeTable};
use super::opcodes::RTI;
use super::runner::MicroCodeRunner;
use super::table::nmi_microcode;

/// Fetches opcodes into the instruction register and drives the bus through their microcode.
///
/// Under its alias the controller also holds a scratch byte (data transfers) and the interrupt
/// vector (address transfers).
#[derive(Debug)]
pub struct Controller {
    ir: Register,
    table: Arc<MicroCodeTable>,
    nmi: MicroCode,
    runner: Option<MicroCodeRunner>,
    step: usize,
    scratch: u8,
    interrupt_vector: u16,
    servicing_nmi: bool,
    interrupted: bool,
    broke: bool,
}

impl Default for Controller {
    fn default() -> Self {
        Self::new(Arc::new(MicroCodeTable::default()))
    }
}

impl Controller {
    pub fn new(table: Arc<MicroCodeTable>) -> Self {
        Self {
            ir: Register::with_alias(IR, CONTROLLER, "IR"),
            table,
            nmi: nmi_microcode(),
            runner: None,
            step: 0,
            scratch: 0,
            interrupt_vector: 0xFFFF,
            servicing_nmi: false,
            interrupted: false,
            broke: false,
        }
    }

    pub fn table(&self) -> &MicroCodeTable {
        &self.table
    }

    pub fn get_value(&self) -> u8 {
        self.ir.get_value()
    }

    pub fn set_value(&mut self, value: u8) {
        self.ir.set_value(value);
    }

    pub fn step(&self) -> usize {
        self.step
    }

    pub fn scratch(&self) -> u8 {
        self.scratch
    }

    pub fn interrupt_vector(&self) -> u16 {
        self.interrupt_vector
    }

    pub fn servicing_nmi(&self) -> bool {
        self.servicing_nmi
    }

    pub fn runner(&self) -> Option<&MicroCodeRunner> {
        self.runner.as_ref()
    }

    /// The instruction being executed, `----` between instructions.
    pub fn instruction(&self) -> String {
        match &self.runner {
            Some(runner) => runner.instruction(),
            None => "----".to_string(),
        }
    }

    pub fn constant(&self) -> u16 {
        self.runner.as_ref().map_or(0, MicroCodeRunner::constant)
    }

    pub fn instruction_with_opcode(&self, opcode: u8) -> &'static str {
        self.table.instruction_with_opcode(opcode)
    }

    pub fn opcode_for_instruction(&self, instruction: &str) -> Result<u8> {
        self.table.opcode_for_instruction(instruction)
    }

    fn send(&mut self, events: ComponentEvents) {
        self.ir.connection_mut().send(events);
    }

    fn start_instruction(&mut self, bus: &mut SystemBus) -> Result<()> {
        if std::mem::take(&mut self.interrupted) {
            bus.clear_nmi();
            if self.interrupt_vector != 0xFFFF && !self.servicing_nmi {
                debug!("Servicing NMI, vector {:04x}", self.interrupt_vector);
                self.runner = Some(MicroCodeRunner::new(&self.nmi, bus));
                self.servicing_nmi = true;
                return Ok(());
            }
            // Nowhere to go. The request is dropped and the cleared IR runs as a NOP.
        }

        let opcode = self.ir.get_value();
        let mc = self.table.get(opcode).ok_or_else(|| {
            warn!("No microcode for opcode {:02x}", opcode);
            Error::NoMicroCode(opcode)
        })?;
        if mc.opcode != opcode {
            warn!(
                "Microcode mismatch for opcode {:02x}: entry has opcode {:02x}",
                opcode, mc.opcode
            );
            return Err(Error::InvalidMicroCode(format!(
                "entry for opcode {:#04x} has opcode {:#04x}",
                opcode, mc.opcode
            )));
        }
        self.runner = Some(MicroCodeRunner::new(mc, bus));
        Ok(())
    }

    fn finish_instruction(&mut self, bus: &mut SystemBus) {
        if let Some(runner) = &self.runner {
            debug!(
                "{:02x} {:<15} {:04x}",
                runner.opcode(),
                runner.instruction(),
                runner.constant()
            );
        }
        self.send(ComponentEvents::AFTER_INSTRUCTION);
        if self.ir.get_value() == RTI {
            self.servicing_nmi = false;
        }
        self.runner = None;
        self.broke = false;
        self.ir.set_value(0);
        if !bus.nmi() {
            // Skip the fetch. Step 2 picks up the interrupt.
            self.interrupted = true;
            self.step = 1;
            bus.release();
        } else {
            self.step = 0;
            bus.xaddr_transfer(PC, MEMADDR, OpFlags::INC.bits());
        }
    }
}

impl Component for Controller {
    fn on_rising_clock_edge(&mut self, bus: &mut SystemBus) -> Result<()> {
        if bus.get_id() != CONTROLLER {
            return self.ir.on_rising_clock_edge(bus);
        }
        if !bus.xdata() {
            bus.put_on_data_bus(self.scratch);
        } else if !bus.xaddr() {
            bus.put_on_data_bus((self.interrupt_vector & 0x00FF) as u8);
            bus.put_on_addr_bus((self.interrupt_vector >> 8) as u8);
        }
        Ok(())
    }

    fn on_high_clock(&mut self, bus: &mut SystemBus) -> Result<()> {
        if bus.put_id() == CONTROLLER {
            if !bus.xdata() {
                self.scratch = bus.read_data_bus();
            } else if !bus.xaddr() {
                self.interrupt_vector =
                    ((bus.read_addr_bus() as u16) << 8) | bus.read_data_bus() as u16;
            }
        } else {
            self.ir.on_high_clock(bus)?;
        }

        if self.step >= 2 {
            let step = self.step - 2;
            if let Some(runner) = self.runner.as_mut() {
                if runner.grab_constant(step, bus) {
                    self.send(ComponentEvents::VALUE_CHANGED);
                }
            }
        }
        Ok(())
    }

    fn on_low_clock(&mut self, bus: &mut SystemBus) -> Result<()> {
        if bus.run_mode() == RunMode::BreakAtInstruction
            && !self.broke
            && self.runner.as_ref().map_or(false, MicroCodeRunner::complete)
        {
            self.broke = true;
            bus.suspend();
            bus.release();
            return Ok(());
        }

        match self.step {
            0 => bus.xaddr_transfer(PC, MEMADDR, OpFlags::INC.bits()),
            1 => bus.xdata_transfer(MEM, IR, 0),
            step => {
                if step == 2 {
                    self.start_instruction(bus)?;
                }
                let next = self
                    .runner
                    .as_ref()
                    .filter(|runner| runner.has_step(step - 2));
                match next {
                    Some(runner) => {
                        runner.execute_next_step(step - 2, bus, self.scratch)?;
                        if bus.is_halted() {
                            self.send(ComponentEvents::AFTER_INSTRUCTION);
                        }
                    }
                    None => self.finish_instruction(bus),
                }
            }
        }

        self.step += 1;
        self.send(ComponentEvents::STEP_CHANGED);
        if bus.run_mode() == RunMode::BreakAtClock {
            bus.suspend();
        }
        Ok(())
    }

    fn reset(&mut self) -> Result<()> {
        self.step = 0;
        self.runner = None;
        self.scratch = 0;
        self.interrupt_vector = 0xFFFF;
        self.servicing_nmi = false;
        self.interrupted = false;
        self.broke = false;
        self.ir.reset()
    }

    fn status(&self) -> String {
        format!(
            "{:1x}. IR {:02x} {:04x} {:<15.15} Step {}",
            IR,
            self.ir.get_value(),
            self.constant(),
            self.instruction(),
            self.step
        )
    }
}

impl ConnectedComponent for Controller {
    fn connection(&self) -> &Connection {
        self.ir.connection()
    }

    fn connection_mut(&mut self) -> &mut Connection {
        self.ir.connection_mut()
    }

    fn value(&self) -> u16 {
        self.ir.get_value() as u16
    }

    fn drain_events(&mut self, source: EventSource, sink: &mut Vec<Event>) {
        self.ir.drain_events(source, sink);
    }
}
