use bitflags::bitflags;

use crate::bus::SystemBus;
use crate::error::Result;

bitflags! {
    pub struct ComponentEvents : u8 {
        const VALUE_CHANGED = 1 << 0;
        const STEP_CHANGED = 1 << 1;
        const AFTER_INSTRUCTION = 1 << 2;
        const INPUT_READ = 1 << 3;
        const OUTPUT_WRITTEN = 1 << 4;
        const IMAGE_LOADED = 1 << 5;
        const CONTENTS_CHANGED = 1 << 6;
        const CONFIG_CHANGED = 1 << 7;
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventSource {
    Bus,
    Component(u8),
    Channel(u8),
}

/// Everything that happened to one sender since the queue was last drained.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Event {
    pub source: EventSource,
    pub name: String,
    pub events: ComponentEvents,
}

/// A unit that reacts to the four phases of a clock cycle. Every phase defaults to doing nothing.
pub trait Component {
    fn on_rising_clock_edge(&mut self, _bus: &mut SystemBus) -> Result<()> {
        Ok(())
    }

    fn on_high_clock(&mut self, _bus: &mut SystemBus) -> Result<()> {
        Ok(())
    }

    fn on_falling_clock_edge(&mut self, _bus: &mut SystemBus) -> Result<()> {
        Ok(())
    }

    fn on_low_clock(&mut self, _bus: &mut SystemBus) -> Result<()> {
        Ok(())
    }

    fn reset(&mut self) -> Result<()> {
        Ok(())
    }

    fn status(&self) -> String {
        String::new()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    RisingEdge,
    High,
    FallingEdge,
    Low,
}

impl Phase {
    /// The phases of one clock cycle, in order.
    pub const CYCLE: [Phase; 4] = [
        Phase::RisingEdge,
        Phase::High,
        Phase::FallingEdge,
        Phase::Low,
    ];

    pub fn dispatch<C: Component + ?Sized>(self, component: &mut C, bus: &mut SystemBus) -> Result<()> {
        match self {
            Phase::RisingEdge => component.on_rising_clock_edge(bus),
            Phase::High => component.on_high_clock(bus),
            Phase::FallingEdge => component.on_falling_clock_edge(bus),
            Phase::Low => component.on_low_clock(bus),
        }
    }
}

/// Identity of a component on the bus plus its pending events.
#[derive(Clone, Debug)]
pub struct Connection {
    id: u8,
    alias: u8,
    name: String,
    pending: ComponentEvents,
}

impl Connection {
    pub fn new(id: u8, name: impl Into<String>) -> Self {
        Self::with_alias(id, id, name)
    }

    pub fn with_alias(id: u8, alias: u8, name: impl Into<String>) -> Self {
        Self {
            id,
            alias,
            name: name.into(),
            pending: ComponentEvents::empty(),
        }
    }

    pub fn id(&self) -> u8 {
        self.id
    }

    pub fn alias(&self) -> u8 {
        self.alias
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn send(&mut self, events: ComponentEvents) {
        self.pending.insert(events);
    }

    pub fn pending(&self) -> ComponentEvents {
        self.pending
    }

    pub fn take(&mut self) -> ComponentEvents {
        std::mem::replace(&mut self.pending, ComponentEvents::empty())
    }
}

/// A component that has an address on the bus.
pub trait ConnectedComponent: Component {
    fn connection(&self) -> &Connection;

    fn connection_mut(&mut self) -> &mut Connection;

    fn id(&self) -> u8 {
        self.connection().id()
    }

    fn alias(&self) -> u8 {
        self.connection().alias()
    }

    fn name(&self) -> &str {
        self.connection().name()
    }

    fn value(&self) -> u16 {
        0
    }

    /// Moves the pending events of this component, and of anything it owns, into `sink`.
    fn drain_events(&mut self, source: EventSource, sink: &mut Vec<Event>) {
        let events = self.connection_mut().take();
        if !events.is_empty() {
            sink.push(Event {
                source,
                name: self.name().to_string(),
                events,
            });
        }
    }
}
