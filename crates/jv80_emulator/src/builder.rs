use std::sync::Arc;

use tracing::warn;

use crate::backplane::{install_cpu, BackPlane};
use crate::bus::{Address, RunMode};
use crate::components::{IOChannel, Memory};
use crate::container::ComponentContainer;
use crate::cpu::{Controller, MicroCodeTable};
use crate::error::{Error, Result};

struct Bank {
    start: Address,
    size: usize,
    writable: bool,
}

struct Image {
    address: Address,
    bytes: Vec<u8>,
    writable: bool,
}

/// Wires up a JV-80 with a custom memory map, I/O channels and instruction set.
#[derive(Default)]
pub struct BackPlaneBuilder {
    banks: Vec<Bank>,
    images: Vec<Image>,
    channels: Vec<IOChannel>,
    table: Option<MicroCodeTable>,
    khz: Option<f64>,
    run_mode: RunMode,
    max_cycles: Option<u64>,
}

impl BackPlaneBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an empty bank of `size` bytes at `start`.
    pub fn map_memory(&mut self, start: Address, size: usize, writable: bool) -> &mut Self {
        self.banks.push(Bank {
            start,
            size,
            writable,
        });
        self
    }

    /// Copies `bytes` to `address` after the banks are mapped. Unmapped ranges get a bank of
    /// their own.
    pub fn load_image(&mut self, address: Address, bytes: &[u8], writable: bool) -> &mut Self {
        self.images.push(Image {
            address,
            bytes: bytes.to_vec(),
            writable,
        });
        self
    }

    pub fn map_channel(&mut self, channel: IOChannel) -> &mut Self {
        self.channels.push(channel);
        self
    }

    /// Replaces the default instruction set.
    pub fn microcode(&mut self, table: MicroCodeTable) -> &mut Self {
        self.table = Some(table);
        self
    }

    pub fn clock_speed(&mut self, khz: f64) -> &mut Self {
        self.khz = Some(khz);
        self
    }

    pub fn run_mode(&mut self, run_mode: RunMode) -> &mut Self {
        self.run_mode = run_mode;
        self
    }

    pub fn max_cycles(&mut self, max_cycles: u64) -> &mut Self {
        self.max_cycles = Some(max_cycles);
        self
    }

    /// Consumes the builder and returns a backplane with all the builder values.
    ///
    /// # Panics
    ///
    /// If two channels share an id.
    pub fn build(self) -> Result<BackPlane> {
        let mut memory = Memory::new();
        for bank in &self.banks {
            if !memory.add(bank.start, bank.size, bank.writable, None) {
                warn!("Bank at {:04x} overlaps the memory map", bank.start);
                return Err(Error::General(format!(
                    "bank {:04x}+{:04x} overlaps another bank",
                    bank.start, bank.size
                )));
            }
        }
        for image in &self.images {
            if !memory.add(image.address, image.bytes.len(), image.writable, Some(&image.bytes)) {
                return Err(Error::ProtectedMemory(image.address));
            }
        }

        let table = self.table.unwrap_or_default();
        let mut container = ComponentContainer::new();
        install_cpu(&mut container, Controller::new(Arc::new(table)));
        container.insert(memory);
        for channel in self.channels {
            container.insert_io(channel);
        }

        let mut backplane = BackPlane::with_container(container);
        if let Some(khz) = self.khz {
            if !backplane.set_clock_speed(khz) {
                return Err(Error::General(format!("clock speed {} kHz out of range", khz)));
            }
        }
        backplane.set_run_mode(self.run_mode);
        backplane.set_max_cycles(self.max_cycles);
        backplane.reset()?;
        Ok(backplane)
    }
}

#[cfg(test)]
mod test {
    use std::sync::Mutex;

    use super::*;
    use crate::cpu::opcodes::*;
    use crate::cpu::MicroCode;
    use crate::registers::{GP_A, GP_B};

    #[test]
    fn builds_memory_map() {
        let mut builder = BackPlaneBuilder::new();
        builder
            .map_memory(0x0000, 0x1000, false)
            .map_memory(0x8000, 0x0800, true)
            .load_image(0x0000, &[MOV_A_CONST, 0x42, HLT], false);
        let backplane = builder.build().unwrap();

        let memory = backplane.container().memory().unwrap();
        assert_eq!(2, memory.banks().len());
        assert_eq!("ROM 0000-0fff", memory.banks()[0].name());
        assert_eq!("RAM 8000-87ff", memory.banks()[1].name());
        assert_eq!(Ok(0x42), memory.peek(0x0001));
        assert!(backplane.container().controller().is_some());
    }

    #[test]
    fn image_outside_banks_gets_its_own_bank() {
        let mut builder = BackPlaneBuilder::new();
        builder.load_image(0x4000, &[0x01, 0x02], true);
        let backplane = builder.build().unwrap();

        let memory = backplane.container().memory().unwrap();
        assert_eq!("RAM 4000-4001", memory.banks()[0].name());
        assert!(memory.in_ram(0x4001));
        assert!(!memory.is_mapped(0x4002));
    }

    #[test]
    fn runs_loaded_program() {
        let mut builder = BackPlaneBuilder::new();
        builder
            .map_memory(0x0000, 0x0100, false)
            .load_image(0x0000, &[MOV_A_CONST, 0x42, MOV_B_A, HLT], false);
        let mut backplane = builder.build().unwrap();

        assert_eq!(Ok(10), backplane.run(Some(0x0000)));
        assert_eq!(0x42, backplane.container().register(GP_B).unwrap().get_value());
    }

    #[test]
    fn rejects_overlapping_banks() {
        let mut builder = BackPlaneBuilder::new();
        builder
            .map_memory(0x0000, 0x1000, true)
            .map_memory(0x0800, 0x1000, true);
        assert!(matches!(builder.build(), Err(Error::General(_))));
    }

    #[test]
    fn rejects_image_straddling_banks() {
        let mut builder = BackPlaneBuilder::new();
        builder
            .map_memory(0x0000, 0x0010, false)
            .load_image(0x000F, &[0x01, 0x02], false);
        assert_eq!(Err(Error::ProtectedMemory(0x000F)), builder.build().map(|_| ()));
    }

    #[test]
    fn rejects_clock_speed() {
        let mut builder = BackPlaneBuilder::new();
        builder.clock_speed(2000.0);
        assert!(matches!(builder.build(), Err(Error::General(_))));

        let mut builder = BackPlaneBuilder::new();
        builder.clock_speed(250.0);
        assert_eq!(250.0, builder.build().unwrap().clock().speed());
    }

    #[test]
    fn applies_run_settings() {
        let mut builder = BackPlaneBuilder::new();
        builder
            .map_memory(0x0000, 0x0100, false)
            .run_mode(RunMode::BreakAtClock)
            .max_cycles(3);
        let mut backplane = builder.build().unwrap();
        assert_eq!(RunMode::BreakAtClock, backplane.run_mode());
        assert_eq!(Ok(1), backplane.run(Some(0x0000)));

        backplane.set_run_mode(RunMode::Continuous);
        assert_eq!(Ok(3), backplane.run(None));
    }

    #[test]
    fn wires_channels() {
        let written = Arc::new(Mutex::new(vec![]));
        let sink = written.clone();

        let mut builder = BackPlaneBuilder::new();
        builder
            .map_memory(0x0000, 0x0100, false)
            .load_image(0x0000, &[IN_A, 0x00, OUT_A, 0x01, HLT], false)
            .map_channel(IOChannel::input(0x0, "KBD", || 0x33))
            .map_channel(IOChannel::output(0x1, "TTY", move |value| {
                sink.lock().unwrap().push(value)
            }));
        let mut backplane = builder.build().unwrap();
        backplane.run(Some(0x0000)).unwrap();

        assert_eq!(0x33, backplane.container().register(GP_A).unwrap().get_value());
        assert_eq!(vec![0x33], *written.lock().unwrap());
    }

    #[test]
    fn custom_microcode() {
        let mut table = MicroCodeTable::empty();
        table.insert(MicroCode::implied(NOP, "NOP", vec![])).unwrap();

        let mut builder = BackPlaneBuilder::new();
        builder
            .map_memory(0x0000, 0x0100, false)
            .load_image(0x0000, &[NOP, HLT], false)
            .microcode(table);
        let mut backplane = builder.build().unwrap();

        assert_eq!(Err(Error::NoMicroCode(HLT)), backplane.run(Some(0x0000)));
    }
}
