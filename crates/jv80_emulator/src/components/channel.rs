use std::fmt;

use tracing::trace;

use crate::bus::{OpFlags, SystemBus};
use crate::component::{Component, ComponentEvents, ConnectedComponent, Connection};
use crate::error::Result;

pub type InputFn = Box<dyn FnMut() -> u8 + Send>;
pub type OutputFn = Box<dyn FnMut(u8) + Send>;
pub type ResetFn = Box<dyn FnMut() -> Result<()> + Send>;
pub type StatusFn = Box<dyn Fn() -> String + Send>;

/// Connects the bus to a device outside the machine. Channels live in their own id space.
pub struct IOChannel {
    connection: Connection,
    input: Option<InputFn>,
    output: Option<OutputFn>,
    on_reset: Option<ResetFn>,
    on_status: Option<StatusFn>,
}

impl IOChannel {
    pub fn new(id: u8, name: impl Into<String>) -> Self {
        Self {
            connection: Connection::new(id, name),
            input: None,
            output: None,
            on_reset: None,
            on_status: None,
        }
    }

    pub fn input(id: u8, name: impl Into<String>, input: impl FnMut() -> u8 + Send + 'static) -> Self {
        Self::new(id, name).with_input(input)
    }

    pub fn output(id: u8, name: impl Into<String>, output: impl FnMut(u8) + Send + 'static) -> Self {
        Self::new(id, name).with_output(output)
    }

    pub fn with_input(mut self, input: impl FnMut() -> u8 + Send + 'static) -> Self {
        self.input = Some(Box::new(input));
        self
    }

    pub fn with_output(mut self, output: impl FnMut(u8) + Send + 'static) -> Self {
        self.output = Some(Box::new(output));
        self
    }

    pub fn with_reset(mut self, on_reset: impl FnMut() -> Result<()> + Send + 'static) -> Self {
        self.on_reset = Some(Box::new(on_reset));
        self
    }

    pub fn with_status(mut self, on_status: impl Fn() -> String + Send + 'static) -> Self {
        self.on_status = Some(Box::new(on_status));
        self
    }

    /// Reads from the device. Without an input callback this is 0.
    pub fn get_value(&mut self) -> u8 {
        let value = self.input.as_mut().map_or(0, |input| input());
        if value != 0 {
            self.connection.send(ComponentEvents::INPUT_READ);
        }
        value
    }

    pub fn set_value(&mut self, value: u8) {
        if let Some(output) = self.output.as_mut() {
            output(value);
        }
        self.connection.send(ComponentEvents::OUTPUT_WRITTEN);
    }
}

impl fmt::Debug for IOChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IOChannel")
            .field("connection", &self.connection)
            .field("input", &self.input.is_some())
            .field("output", &self.output.is_some())
            .finish()
    }
}

impl Component for IOChannel {
    fn on_rising_clock_edge(&mut self, bus: &mut SystemBus) -> Result<()> {
        if !bus.io() && bus.put_id() == self.id() && bus.op_flags().contains(OpFlags::IO_IN) {
            let value = self.get_value();
            trace!("IN  {:02x} from channel {:1x}", value, self.id());
            bus.put_on_data_bus(value);
        }
        Ok(())
    }

    fn on_high_clock(&mut self, bus: &mut SystemBus) -> Result<()> {
        if !bus.io() && bus.put_id() == self.id() && bus.op_flags().contains(OpFlags::IO_OUT) {
            let value = bus.read_data_bus();
            trace!("OUT {:02x} to channel {:1x}", value, self.id());
            self.set_value(value);
        }
        Ok(())
    }

    fn reset(&mut self) -> Result<()> {
        match self.on_reset.as_mut() {
            Some(on_reset) => on_reset(),
            None => Ok(()),
        }
    }

    fn status(&self) -> String {
        match self.on_status.as_ref() {
            Some(on_status) => on_status(),
            None => format!("{:1x}. {}", self.id(), self.name()),
        }
    }
}

impl ConnectedComponent for IOChannel {
    fn connection(&self) -> &Connection {
        &self.connection
    }

    fn connection_mut(&mut self) -> &mut Connection {
        &mut self.connection
    }
}
