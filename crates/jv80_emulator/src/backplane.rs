use tracing::info;

use crate::bus::{Address, RunMode};
use crate::clock::{Clock, ClockListener};
use crate::component::Event;
use crate::components::{AddressRegister, Alu, Memory, Register};
use crate::container::{ComponentContainer, Part};
use crate::cpu::opcodes::*;
use crate::cpu::Controller;
use crate::error::{Error, Result};
use crate::registers::{BP, DI, GP_A, GP_B, GP_C, GP_D, PC, SI, SP, TX};

pub const ROM_START: Address = 0x0000;
pub const ROM_SIZE: usize = 0xC000;
pub const RAM_START: Address = 0xC000;
pub const RAM_SIZE: usize = 0x4000;

/// Computes the 24th Fibonacci number into DI.
pub const FIBONACCI: [u8; 18] = [
    CLR_A,
    CLR_B,
    MOV_C_CONST,
    0x01,
    CLR_D,
    MOV_SI_CONST,
    0x17,
    0x00,
    // 0x0008
    ADD_AB_CD,
    SWP_A_C,
    SWP_B_D,
    DEC_SI,
    JNZ,
    0x08,
    0x00,
    MOV_DI_CD,
    HLT,
    NOP,
];

/// A machine: components on a bus plus the clock driving them.
#[derive(Debug)]
pub struct BackPlane {
    container: ComponentContainer,
    clock: Clock,
    max_cycles: Option<u64>,
}

impl Default for BackPlane {
    fn default() -> Self {
        Self::new()
    }
}

impl BackPlane {
    /// The JV-80 with the sample program in ROM.
    pub fn new() -> Self {
        let mut backplane = Self::empty();
        backplane.default_setup();
        backplane
    }

    /// A backplane without any components.
    pub fn empty() -> Self {
        Self::with_container(ComponentContainer::new())
    }

    pub fn with_container(container: ComponentContainer) -> Self {
        Self {
            container,
            clock: Clock::default(),
            max_cycles: None,
        }
    }

    /// Installs the general purpose registers, ALU, controller, address registers and memory.
    pub fn default_setup(&mut self) {
        install_cpu(&mut self.container, Controller::default());
        let mut memory = Memory::new();
        memory.add(ROM_START, ROM_SIZE, false, Some(&FIBONACCI));
        memory.add(RAM_START, RAM_SIZE, true, None);
        self.container.insert(memory);
    }

    pub fn container(&self) -> &ComponentContainer {
        &self.container
    }

    pub fn container_mut(&mut self) -> &mut ComponentContainer {
        &mut self.container
    }

    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    pub fn clock_mut(&mut self) -> &mut Clock {
        &mut self.clock
    }

    pub fn set_clock_listener(&mut self, listener: ClockListener) {
        self.clock.set_listener(listener);
    }

    pub fn set_clock_speed(&mut self, khz: f64) -> bool {
        self.clock.set_speed(khz)
    }

    pub fn set_run_mode(&mut self, run_mode: RunMode) {
        self.container.bus_mut().set_run_mode(run_mode);
    }

    pub fn run_mode(&self) -> RunMode {
        self.container.bus().run_mode()
    }

    /// Caps the number of cycles of each [`BackPlane::run`].
    pub fn set_max_cycles(&mut self, max_cycles: Option<u64>) {
        self.max_cycles = max_cycles;
    }

    /// Copies `image` into memory at `address`, adding a bank if the range is not mapped yet,
    /// then resets the machine.
    pub fn load_image(&mut self, memory_id: u8, image: &[u8], address: Address, writable: bool) -> Result<()> {
        if !matches!(self.container.component(memory_id), Some(Part::Memory(_))) {
            return Err(Error::InvalidComponentId(memory_id as u16));
        }
        let memory = self
            .container
            .memory_mut()
            .ok_or(Error::InvalidComponentId(memory_id as u16))?;

        if !memory.add(address, image.len(), writable, Some(image)) {
            return Err(Error::ProtectedMemory(address));
        }
        info!(
            "Loaded {} bytes at {:04x}-{:04x}",
            image.len(),
            address,
            address as usize + image.len().max(1) - 1
        );
        self.reset()
    }

    pub fn reset(&mut self) -> Result<()> {
        self.container.reset()
    }

    /// Runs until the machine halts or suspends, an error occurs, or the clock is stopped.
    /// Starts from `start` if given, otherwise where the program counter is. Returns the number
    /// of cycles.
    pub fn run(&mut self, start: Option<Address>) -> Result<u64> {
        if let Some(address) = start {
            if let Some(pc) = self.container.address_register_mut(PC) {
                pc.set_value(address);
            }
        }
        self.container.bus_mut().clear_suspend();
        self.clock.start(&mut self.container, self.max_cycles)
    }

    pub fn stop(&self) {
        self.clock.stop();
    }

    /// Asserts the non-maskable interrupt line.
    pub fn nmi(&mut self) {
        self.container.bus_mut().set_nmi();
    }

    pub fn drain_events(&mut self) -> Vec<Event> {
        self.container.drain_events()
    }

    pub fn status(&self) -> String {
        self.container.status()
    }
}

pub(crate) fn install_cpu(container: &mut ComponentContainer, controller: Controller) {
    for id in [GP_A, GP_B, GP_C, GP_D] {
        container.insert(Register::new(id));
    }
    container.insert(Alu::new());
    container.insert(controller);
    for id in [PC, SP, SI, DI, TX, BP] {
        container.insert(AddressRegister::new(id));
    }
}
