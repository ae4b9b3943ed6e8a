use crate::bus::{OpFlags, ProcessorFlags, SystemBus};
use crate::component::{Component, ComponentEvents, ConnectedComponent, Connection};
use crate::error::Result;
use crate::registers;

/// A 16 bit register. It drives both bus bytes when addressed as the source of an address
/// transfer. Data transfers move one half, selected by the MSB op flag.
#[derive(Debug)]
pub struct AddressRegister {
    connection: Connection,
    value: u16,
    uses_data_bus: bool,
}

impl AddressRegister {
    pub fn new(id: u8) -> Self {
        Self::named(id, registers::name(id))
    }

    pub fn named(id: u8, name: impl Into<String>) -> Self {
        Self {
            connection: Connection::new(id, name),
            value: 0,
            uses_data_bus: true,
        }
    }

    pub fn with_alias(id: u8, alias: u8, name: impl Into<String>) -> Self {
        Self {
            connection: Connection::with_alias(id, alias, name),
            value: 0,
            uses_data_bus: true,
        }
    }

    /// Restricts the register to address transfers.
    pub fn address_bus_only(mut self) -> Self {
        self.uses_data_bus = false;
        self
    }

    pub fn uses_data_bus(&self) -> bool {
        self.uses_data_bus
    }

    pub fn get_value(&self) -> u16 {
        self.value
    }

    pub fn set_value(&mut self, value: u16) {
        self.value = value;
        self.connection.send(ComponentEvents::VALUE_CHANGED);
    }

    fn drive_address(&mut self, bus: &mut SystemBus) {
        let op = bus.op_flags();
        let mut carry = false;

        // Decrement happens before the value goes out, increment after.
        if op.contains(OpFlags::DEC) {
            carry = self.value == 0x0000;
            self.set_value(self.value.wrapping_sub(1));
        }
        bus.put_on_data_bus((self.value & 0x00FF) as u8);
        bus.put_on_addr_bus((self.value >> 8) as u8);
        if op.contains(OpFlags::INC) {
            carry = self.value == 0xFFFF;
            self.set_value(self.value.wrapping_add(1));
        }

        if op.contains(OpFlags::FLAGS) && op.intersects(OpFlags::INC | OpFlags::DEC) {
            bus.set_flag(ProcessorFlags::ZERO, self.value == 0);
            bus.set_flag(ProcessorFlags::CARRY, carry);
        }
    }
}

impl Component for AddressRegister {
    fn on_rising_clock_edge(&mut self, bus: &mut SystemBus) -> Result<()> {
        if bus.get_id() != self.connection.id() {
            return Ok(());
        }
        if !bus.xaddr() {
            self.drive_address(bus);
        } else if !bus.xdata() && self.uses_data_bus {
            let byte = if bus.op_flags().contains(OpFlags::MSB) {
                self.value >> 8
            } else {
                self.value & 0x00FF
            };
            bus.put_on_data_bus(byte as u8);
        }
        Ok(())
    }

    fn on_high_clock(&mut self, bus: &mut SystemBus) -> Result<()> {
        if bus.put_id() != self.connection.id() {
            return Ok(());
        }
        if !bus.xaddr() {
            self.set_value(((bus.read_addr_bus() as u16) << 8) | bus.read_data_bus() as u16);
        } else if !bus.xdata() && self.uses_data_bus {
            let byte = bus.read_data_bus() as u16;
            if bus.op_flags().contains(OpFlags::MSB) {
                self.set_value((self.value & 0x00FF) | (byte << 8));
            } else {
                self.set_value((self.value & 0xFF00) | byte);
            }
        }
        Ok(())
    }

    fn reset(&mut self) -> Result<()> {
        self.set_value(0);
        Ok(())
    }

    fn status(&self) -> String {
        format!("{:1x}. {:<3} {:04x}", self.id(), self.name(), self.value)
    }
}

impl ConnectedComponent for AddressRegister {
    fn connection(&self) -> &Connection {
        &self.connection
    }

    fn connection_mut(&mut self) -> &mut Connection {
        &mut self.connection
    }

    fn value(&self) -> u16 {
        self.value
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const REGID: u8 = 0xA;

    fn cycle(register: &mut AddressRegister, bus: &mut SystemBus) {
        register.on_rising_clock_edge(bus).unwrap();
        register.on_high_clock(bus).unwrap();
        register.on_falling_clock_edge(bus).unwrap();
        register.on_low_clock(bus).unwrap();
    }

    #[test]
    fn latches_lsb_then_msb() {
        let mut bus = SystemBus::new();
        let mut register = AddressRegister::new(REGID);
        register.set_value(0x5555);

        bus.initialize(false, true, true, 0x1, REGID, 0, 0x37, 0);
        cycle(&mut register, &mut bus);
        assert_eq!(0x5537, register.get_value());

        bus.initialize(false, true, true, 0x1, REGID, OpFlags::MSB.bits(), 0x42, 0);
        cycle(&mut register, &mut bus);
        assert_eq!(0x4237, register.get_value());
    }

    #[test]
    fn drives_selected_half_on_data_transfer() {
        let mut bus = SystemBus::new();
        let mut register = AddressRegister::new(REGID);
        register.set_value(0x1234);

        bus.initialize(false, true, true, REGID, 0x1, 0, 0, 0);
        cycle(&mut register, &mut bus);
        assert_eq!(0x34, bus.read_data_bus());

        bus.initialize(false, true, true, REGID, 0x1, OpFlags::MSB.bits(), 0, 0);
        cycle(&mut register, &mut bus);
        assert_eq!(0x12, bus.read_data_bus());
    }

    #[test]
    fn address_transfer_both_ways() {
        let mut bus = SystemBus::new();
        let mut register = AddressRegister::new(REGID);

        bus.initialize(true, false, true, 0x8, REGID, 0, 0x34, 0x12);
        cycle(&mut register, &mut bus);
        assert_eq!(0x1234, register.get_value());

        bus.initialize(true, false, true, REGID, 0xF, 0, 0, 0);
        cycle(&mut register, &mut bus);
        assert_eq!(0x34, bus.read_data_bus());
        assert_eq!(0x12, bus.read_addr_bus());
    }

    #[test]
    fn increments_after_driving() {
        let mut bus = SystemBus::new();
        let mut register = AddressRegister::new(REGID);
        register.set_value(0x2000);

        bus.initialize(true, false, true, REGID, 0xF, OpFlags::INC.bits(), 0, 0);
        cycle(&mut register, &mut bus);
        assert_eq!(0x00, bus.read_data_bus());
        assert_eq!(0x20, bus.read_addr_bus());
        assert_eq!(0x2001, register.get_value());
        assert_eq!("---", bus.flags_string());
    }

    #[test]
    fn decrements_before_driving() {
        let mut bus = SystemBus::new();
        let mut register = AddressRegister::new(REGID);
        register.set_value(0x2001);

        bus.initialize(true, false, true, REGID, 0xF, OpFlags::DEC.bits(), 0, 0);
        cycle(&mut register, &mut bus);
        assert_eq!(0x00, bus.read_data_bus());
        assert_eq!(0x20, bus.read_addr_bus());
        assert_eq!(0x2000, register.get_value());
    }

    #[test]
    fn increment_wrapping_to_zero_sets_zero_and_carry() {
        let mut bus = SystemBus::new();
        let mut register = AddressRegister::new(REGID);
        register.set_value(0xFFFF);

        let op = (OpFlags::INC | OpFlags::FLAGS).bits();
        bus.initialize(true, false, true, REGID, 0xC, op, 0, 0);
        cycle(&mut register, &mut bus);
        assert_eq!(0x0000, register.get_value());
        assert!(bus.is_set(ProcessorFlags::ZERO));
        assert!(bus.is_set(ProcessorFlags::CARRY));
    }

    #[test]
    fn decrement_to_zero_sets_zero_only() {
        let mut bus = SystemBus::new();
        let mut register = AddressRegister::new(REGID);
        register.set_value(0x0001);

        let op = (OpFlags::DEC | OpFlags::FLAGS).bits();
        bus.initialize(true, false, true, REGID, 0xC, op, 0, 0);
        cycle(&mut register, &mut bus);
        assert_eq!(0x0000, register.get_value());
        assert!(bus.is_set(ProcessorFlags::ZERO));
        assert!(!bus.is_set(ProcessorFlags::CARRY));
    }

    #[test]
    fn decrement_below_zero_sets_carry() {
        let mut bus = SystemBus::new();
        let mut register = AddressRegister::new(REGID);

        let op = (OpFlags::DEC | OpFlags::FLAGS).bits();
        bus.initialize(true, false, true, REGID, 0xC, op, 0, 0);
        cycle(&mut register, &mut bus);
        assert_eq!(0xFFFF, register.get_value());
        assert!(!bus.is_set(ProcessorFlags::ZERO));
        assert!(bus.is_set(ProcessorFlags::CARRY));
    }

    #[test]
    fn ignores_other_ids() {
        let mut bus = SystemBus::new();
        let mut register = AddressRegister::new(REGID);
        register.set_value(0x1234);
        register.connection_mut().take();

        let step = (OpFlags::INC | OpFlags::FLAGS).bits();
        bus.initialize(false, true, true, 0x1, 0x2, OpFlags::MSB.bits(), 0x42, 0x37);
        cycle(&mut register, &mut bus);
        bus.initialize(true, false, true, 0x1, 0x2, step, 0x42, 0x37);
        cycle(&mut register, &mut bus);
        bus.initialize(true, true, false, 0x1, 0x2, OpFlags::IO_IN.bits(), 0x42, 0x37);
        cycle(&mut register, &mut bus);

        assert_eq!(0x1234, register.get_value());
        assert_eq!(0x42, bus.read_data_bus());
        assert_eq!(0x37, bus.read_addr_bus());
        assert_eq!("---", bus.flags_string());
        assert!(register.connection().pending().is_empty());
    }

    #[test]
    fn address_bus_only_ignores_data_transfers() {
        let mut bus = SystemBus::new();
        let mut register = AddressRegister::new(REGID).address_bus_only();
        register.set_value(0x1234);

        bus.initialize(false, true, true, 0x1, REGID, 0, 0x99, 0);
        cycle(&mut register, &mut bus);
        assert_eq!(0x1234, register.get_value());

        bus.initialize(false, true, true, REGID, 0x1, 0, 0x99, 0);
        cycle(&mut register, &mut bus);
        assert_eq!(0x99, bus.read_data_bus());
    }
}
