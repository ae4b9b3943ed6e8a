use tracing::{info, warn};

use crate::bus::{Address, OpFlags, SystemBus};
use crate::component::{Component, ComponentEvents, ConnectedComponent, Connection};
use crate::error::{Error, Result};
use crate::registers::{MEM, MEMADDR};

use super::address_register::AddressRegister;

/// A contiguous range of the address space.
#[derive(Clone, Debug)]
pub struct MemoryBank {
    start: Address,
    writable: bool,
    image: Vec<u8>,
}

impl MemoryBank {
    /// Returns `None` if the range does not fit in the 64KiB address space.
    pub fn new(start: Address, size: usize, writable: bool, contents: Option<&[u8]>) -> Option<Self> {
        if size == 0 || start as usize + size > 0x10000 {
            return None;
        }
        let mut image = vec![0; size];
        if let Some(contents) = contents {
            let len = contents.len().min(size);
            image[..len].copy_from_slice(&contents[..len]);
        }
        Some(Self {
            start,
            writable,
            image,
        })
    }

    pub fn start(&self) -> Address {
        self.start
    }

    pub fn size(&self) -> usize {
        self.image.len()
    }

    /// One past the last address.
    pub fn end(&self) -> usize {
        self.start as usize + self.image.len()
    }

    pub fn writable(&self) -> bool {
        self.writable
    }

    pub fn mapped(&self, address: usize) -> bool {
        (self.start as usize..self.end()).contains(&address)
    }

    pub fn fits(&self, address: usize, size: usize) -> bool {
        self.mapped(address) && address + size <= self.end()
    }

    pub fn overlaps(&self, address: usize, size: usize) -> bool {
        address < self.end() && (self.start as usize) < address + size
    }

    pub fn name(&self) -> String {
        format!(
            "{} {:04x}-{:04x}",
            if self.writable { "RAM" } else { "ROM" },
            self.start,
            self.end() - 1
        )
    }

    pub fn erase(&mut self) {
        self.image.iter_mut().for_each(|b| *b = 0);
    }

    pub fn peek(&self, address: Address) -> Option<u8> {
        let offset = (address as usize).checked_sub(self.start as usize)?;
        self.image.get(offset).copied()
    }

    fn poke(&mut self, address: Address, value: u8) -> bool {
        let offset = address as usize - self.start as usize;
        match self.image.get_mut(offset) {
            Some(byte) => {
                *byte = value;
                true
            }
            None => false,
        }
    }

    fn copy(&mut self, address: Address, contents: &[u8]) {
        let offset = address as usize - self.start as usize;
        let len = contents.len().min(self.image.len() - offset);
        self.image[offset..offset + len].copy_from_slice(&contents[..len]);
    }
}

/// Banked memory behind its own address register. `MEMADDR` addresses the register, `MEM` the
/// byte it points at.
#[derive(Debug)]
pub struct Memory {
    address: AddressRegister,
    banks: Vec<MemoryBank>,
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

impl Memory {
    pub fn new() -> Self {
        Self {
            address: AddressRegister::with_alias(MEMADDR, MEM, "M").address_bus_only(),
            banks: vec![],
        }
    }

    pub fn with_banks(ram_start: Address, ram_size: usize, rom_start: Address, rom_size: usize) -> Self {
        let mut memory = Self::new();
        memory.add(ram_start, ram_size, true, None);
        memory.add(rom_start, rom_size, false, None);
        memory
    }

    pub fn get_value(&self) -> Address {
        self.address.get_value()
    }

    pub fn set_value(&mut self, address: Address) {
        self.address.set_value(address);
    }

    pub fn banks(&self) -> &[MemoryBank] {
        &self.banks
    }

    pub fn bank(&self, address: Address) -> Option<&MemoryBank> {
        self.banks.iter().find(|bank| bank.mapped(address as usize))
    }

    fn bank_mut(&mut self, address: Address) -> Option<&mut MemoryBank> {
        self.banks
            .iter_mut()
            .find(|bank| bank.mapped(address as usize))
    }

    /// First mapped address, `0xFFFF` without banks.
    pub fn start(&self) -> Address {
        self.banks.first().map_or(0xFFFF, |bank| bank.start())
    }

    /// Copies `contents` into the bank holding the whole block if there is one, otherwise
    /// creates a new bank. Returns false if the block straddles or overlaps existing banks.
    pub fn add(&mut self, start: Address, size: usize, writable: bool, contents: Option<&[u8]>) -> bool {
        if size == 0 {
            return true;
        }

        let existing = self
            .banks
            .iter()
            .position(|bank| bank.fits(start as usize, size));
        if let Some(index) = existing {
            if let Some(contents) = contents {
                self.banks[index].copy(start, &contents[..contents.len().min(size)]);
            }
        } else if self
            .banks
            .iter()
            .any(|bank| bank.overlaps(start as usize, size))
        {
            warn!(
                "Memory block {:04x}+{:04x} overlaps an existing bank",
                start, size
            );
            return false;
        } else {
            let bank = match MemoryBank::new(start, size, writable, contents) {
                Some(bank) => bank,
                None => {
                    warn!("Memory block {:04x}+{:04x} does not fit", start, size);
                    return false;
                }
            };
            info!("Adding memory bank {}", bank.name());
            let pos = self
                .banks
                .iter()
                .position(|b| b.start() > start)
                .unwrap_or(self.banks.len());
            self.banks.insert(pos, bank);
            self.address.connection_mut().send(ComponentEvents::CONFIG_CHANGED);
        }

        if contents.is_some() {
            self.address.connection_mut().send(ComponentEvents::IMAGE_LOADED);
        }
        true
    }

    /// Removes the bank starting at `start`.
    pub fn remove(&mut self, start: Address) -> bool {
        match self.banks.iter().position(|bank| bank.start() == start) {
            Some(pos) => {
                self.banks.remove(pos);
                self.address.connection_mut().send(ComponentEvents::CONFIG_CHANGED);
                true
            }
            None => false,
        }
    }

    /// Drops all banks and installs a single one.
    pub fn initialize(&mut self, start: Address, size: usize, contents: Option<&[u8]>, writable: bool) -> bool {
        self.banks.clear();
        self.add(start, size, writable, contents)
    }

    pub fn erase(&mut self) {
        self.banks.iter_mut().for_each(MemoryBank::erase);
        self.address.connection_mut().send(ComponentEvents::CONTENTS_CHANGED);
    }

    pub fn is_mapped(&self, address: Address) -> bool {
        self.bank(address).is_some()
    }

    pub fn in_ram(&self, address: Address) -> bool {
        self.bank(address).map_or(false, MemoryBank::writable)
    }

    pub fn in_rom(&self, address: Address) -> bool {
        self.bank(address).map_or(false, |bank| !bank.writable())
    }

    pub fn read(&self, address: Address) -> Result<u8> {
        self.peek(address)
    }

    pub fn peek(&self, address: Address) -> Result<u8> {
        self.bank(address)
            .and_then(|bank| bank.peek(address))
            .ok_or_else(|| {
                warn!("Reading unmapped memory at {:#06x}", address);
                Error::InvalidComponentId(address)
            })
    }

    /// Writes a byte, honouring write protection.
    pub fn write(&mut self, address: Address, value: u8) -> Result<()> {
        let writable = match self.bank(address) {
            None => {
                warn!("Writing {:#04x} to unmapped memory at {:#06x}", value, address);
                return Err(Error::InvalidComponentId(address));
            }
            Some(bank) => {
                if !bank.writable() {
                    warn!("Writing {:#04x} to {} at {:#06x}", value, bank.name(), address);
                }
                bank.writable()
            }
        };
        if !writable {
            return Err(Error::ProtectedMemory(address));
        }
        self.poke(address, value)
    }

    /// Writes a byte, ignoring write protection. Used to load images.
    pub fn poke(&mut self, address: Address, value: u8) -> Result<()> {
        let poked = self
            .bank_mut(address)
            .map_or(false, |bank| bank.poke(address, value));
        if !poked {
            return Err(Error::InvalidComponentId(address));
        }
        self.address.connection_mut().send(ComponentEvents::CONTENTS_CHANGED);
        Ok(())
    }
}

impl Component for Memory {
    fn on_rising_clock_edge(&mut self, bus: &mut SystemBus) -> Result<()> {
        let selected = !bus.xdata()
            || !bus.xaddr()
            || (!bus.io() && bus.op_flags().contains(OpFlags::IO_OUT));
        if selected && bus.get_id() == MEM {
            let value = self.read(self.address.get_value())?;
            bus.put_on_addr_bus(0x00);
            bus.put_on_data_bus(value);
            return Ok(());
        }
        self.address.on_rising_clock_edge(bus)
    }

    fn on_high_clock(&mut self, bus: &mut SystemBus) -> Result<()> {
        let store = ((!bus.xdata() || !bus.xaddr()) && bus.put_id() == MEM)
            || (!bus.io() && bus.op_flags().contains(OpFlags::IO_IN) && bus.get_id() == MEM);
        if store {
            return self.write(self.address.get_value(), bus.read_data_bus());
        }
        self.address.on_high_clock(bus)
    }

    fn reset(&mut self) -> Result<()> {
        self.address.reset()
    }

    fn status(&self) -> String {
        let address = self.address.get_value();
        let contents = self.peek(address).unwrap_or(0xFF);
        format!(
            "{:1x}. M  {:04x}   CONTENTS {:1x}. [{:02x}]",
            MEMADDR, address, MEM, contents
        )
    }
}

impl ConnectedComponent for Memory {
    fn connection(&self) -> &Connection {
        self.address.connection()
    }

    fn connection_mut(&mut self) -> &mut Connection {
        self.address.connection_mut()
    }

    fn value(&self) -> u16 {
        self.address.get_value()
    }
}
