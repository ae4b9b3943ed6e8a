use crate::bus::{OpFlags, SystemBus};
use crate::component::{Component, ComponentEvents, ConnectedComponent, Connection};
use crate::error::Result;
use crate::registers;

/// An 8 bit register.
#[derive(Debug)]
pub struct Register {
    connection: Connection,
    value: u8,
}

impl Register {
    pub fn new(id: u8) -> Self {
        Self::named(id, registers::name(id))
    }

    pub fn named(id: u8, name: impl Into<String>) -> Self {
        Self {
            connection: Connection::new(id, name),
            value: 0,
        }
    }

    pub fn with_alias(id: u8, alias: u8, name: impl Into<String>) -> Self {
        Self {
            connection: Connection::with_alias(id, alias, name),
            value: 0,
        }
    }

    pub fn get_value(&self) -> u8 {
        self.value
    }

    pub fn set_value(&mut self, value: u8) {
        self.value = value;
        self.connection.send(ComponentEvents::VALUE_CHANGED);
    }
}

impl Component for Register {
    fn on_rising_clock_edge(&mut self, bus: &mut SystemBus) -> Result<()> {
        let id = self.connection.id();
        if bus.get_id() != id {
            return Ok(());
        }
        if !bus.xdata() || (!bus.io() && bus.op_flags().contains(OpFlags::IO_OUT)) {
            bus.put_on_data_bus(self.value);
        }
        Ok(())
    }

    fn on_high_clock(&mut self, bus: &mut SystemBus) -> Result<()> {
        let id = self.connection.id();
        if (!bus.xdata() || !bus.xaddr()) && bus.put_id() == id {
            self.set_value(bus.read_data_bus());
        } else if !bus.io() && bus.get_id() == id && bus.op_flags().contains(OpFlags::IO_IN) {
            self.set_value(bus.read_data_bus());
        }
        Ok(())
    }

    fn reset(&mut self) -> Result<()> {
        self.set_value(0);
        Ok(())
    }

    fn status(&self) -> String {
        format!("{:1x}. {:<3} {:02x}", self.id(), self.name(), self.value)
    }
}

impl ConnectedComponent for Register {
    fn connection(&self) -> &Connection {
        &self.connection
    }

    fn connection_mut(&mut self) -> &mut Connection {
        &mut self.connection
    }

    fn value(&self) -> u16 {
        self.value as u16
    }
}
