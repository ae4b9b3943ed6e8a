use tracing::{trace, warn};

use crate::bus::SystemBus;
use crate::clock::Clocked;
use crate::component::{Component, ComponentEvents, ConnectedComponent, Connection, Event, EventSource, Phase};
use crate::components::{AddressRegister, Alu, IOChannel, Memory, Register};
use crate::cpu::Controller;
use crate::error::Result;
use crate::registers::{CONTROLLER, MEMADDR, RHS};

pub const SLOTS: usize = 16;

/// Every kind of component that can sit on the bus.
#[derive(Debug)]
pub enum Part {
    Register(Register),
    AddressRegister(AddressRegister),
    Alu(Alu),
    Memory(Memory),
    Controller(Controller),
}

macro_rules! dispatch {
    ($self:expr, $part:ident => $body:expr) => {
        match $self {
            Part::Register($part) => $body,
            Part::AddressRegister($part) => $body,
            Part::Alu($part) => $body,
            Part::Memory($part) => $body,
            Part::Controller($part) => $body,
        }
    };
}

impl Component for Part {
    fn on_rising_clock_edge(&mut self, bus: &mut SystemBus) -> Result<()> {
        dispatch!(self, part => part.on_rising_clock_edge(bus))
    }

    fn on_high_clock(&mut self, bus: &mut SystemBus) -> Result<()> {
        dispatch!(self, part => part.on_high_clock(bus))
    }

    fn on_falling_clock_edge(&mut self, bus: &mut SystemBus) -> Result<()> {
        dispatch!(self, part => part.on_falling_clock_edge(bus))
    }

    fn on_low_clock(&mut self, bus: &mut SystemBus) -> Result<()> {
        dispatch!(self, part => part.on_low_clock(bus))
    }

    fn reset(&mut self) -> Result<()> {
        dispatch!(self, part => part.reset())
    }

    fn status(&self) -> String {
        dispatch!(self, part => part.status())
    }
}

impl ConnectedComponent for Part {
    fn connection(&self) -> &Connection {
        dispatch!(self, part => part.connection())
    }

    fn connection_mut(&mut self) -> &mut Connection {
        dispatch!(self, part => part.connection_mut())
    }

    fn value(&self) -> u16 {
        dispatch!(self, part => part.value())
    }

    fn drain_events(&mut self, source: EventSource, sink: &mut Vec<Event>) {
        dispatch!(self, part => part.drain_events(source, sink))
    }
}

macro_rules! part_from {
    ($($kind:ident),*) => {
        $(
            impl From<$kind> for Part {
                fn from(component: $kind) -> Self {
                    Part::$kind(component)
                }
            }
        )*
    };
}

part_from!(Register, AddressRegister, Alu, Memory, Controller);

/// Owns the bus and everything connected to it. Components and I/O channels each have their own
/// 16 slot id space and are driven in the order they were inserted.
#[derive(Debug, Default)]
pub struct ComponentContainer {
    bus: SystemBus,
    parts: Vec<Part>,
    slots: [Option<usize>; SLOTS],
    channels: Vec<IOChannel>,
    channel_slots: [Option<usize>; SLOTS],
}

fn claim(slots: &mut [Option<usize>; SLOTS], id: u8, index: usize, kind: &str) {
    let slot = match slots.get_mut(id as usize) {
        Some(slot) => slot,
        None => panic!("{} id {:#x} is out of range", kind, id),
    };
    if slot.is_some() {
        panic!("{} id {:#x} is already taken", kind, id);
    }
    *slot = Some(index);
}

impl ComponentContainer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bus(&self) -> &SystemBus {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut SystemBus {
        &mut self.bus
    }

    /// Connects a component under its id and alias.
    ///
    /// # Panics
    ///
    /// If the id or alias is taken or does not fit in 4 bits.
    pub fn insert(&mut self, component: impl Into<Part>) -> &mut Self {
        let part = component.into();
        let index = self.parts.len();
        claim(&mut self.slots, part.id(), index, "Component");
        if part.alias() != part.id() {
            claim(&mut self.slots, part.alias(), index, "Component");
        }
        self.parts.push(part);
        self
    }

    /// Connects an I/O channel.
    ///
    /// # Panics
    ///
    /// If the channel id is taken or does not fit in 4 bits.
    pub fn insert_io(&mut self, channel: IOChannel) -> &mut Self {
        claim(&mut self.channel_slots, channel.id(), self.channels.len(), "Channel");
        self.channels.push(channel);
        self
    }

    pub fn component(&self, id: u8) -> Option<&Part> {
        let index = (*self.slots.get(id as usize)?)?;
        self.parts.get(index)
    }

    pub fn component_mut(&mut self, id: u8) -> Option<&mut Part> {
        let index = (*self.slots.get(id as usize)?)?;
        self.parts.get_mut(index)
    }

    pub fn components(&self) -> impl Iterator<Item = &Part> {
        self.parts.iter()
    }

    pub fn channel(&self, id: u8) -> Option<&IOChannel> {
        let index = (*self.channel_slots.get(id as usize)?)?;
        self.channels.get(index)
    }

    pub fn channel_mut(&mut self, id: u8) -> Option<&mut IOChannel> {
        let index = (*self.channel_slots.get(id as usize)?)?;
        self.channels.get_mut(index)
    }

    pub fn register(&self, id: u8) -> Option<&Register> {
        match self.component(id)? {
            Part::Register(register) => Some(register),
            _ => None,
        }
    }

    pub fn register_mut(&mut self, id: u8) -> Option<&mut Register> {
        match self.component_mut(id)? {
            Part::Register(register) => Some(register),
            _ => None,
        }
    }

    pub fn address_register(&self, id: u8) -> Option<&AddressRegister> {
        match self.component(id)? {
            Part::AddressRegister(register) => Some(register),
            _ => None,
        }
    }

    pub fn address_register_mut(&mut self, id: u8) -> Option<&mut AddressRegister> {
        match self.component_mut(id)? {
            Part::AddressRegister(register) => Some(register),
            _ => None,
        }
    }

    pub fn alu(&self) -> Option<&Alu> {
        match self.component(RHS)? {
            Part::Alu(alu) => Some(alu),
            _ => None,
        }
    }

    pub fn alu_mut(&mut self) -> Option<&mut Alu> {
        match self.component_mut(RHS)? {
            Part::Alu(alu) => Some(alu),
            _ => None,
        }
    }

    pub fn memory(&self) -> Option<&Memory> {
        match self.component(MEMADDR)? {
            Part::Memory(memory) => Some(memory),
            _ => None,
        }
    }

    pub fn memory_mut(&mut self) -> Option<&mut Memory> {
        match self.component_mut(MEMADDR)? {
            Part::Memory(memory) => Some(memory),
            _ => None,
        }
    }

    pub fn controller(&self) -> Option<&Controller> {
        match self.component(CONTROLLER)? {
            Part::Controller(controller) => Some(controller),
            _ => None,
        }
    }

    pub fn controller_mut(&mut self) -> Option<&mut Controller> {
        match self.component_mut(CONTROLLER)? {
            Part::Controller(controller) => Some(controller),
            _ => None,
        }
    }

    /// Calls `f` for every component in insertion order, stopping at the first error.
    pub fn for_all_components<F>(&mut self, mut f: F) -> Result<()>
    where
        F: FnMut(&mut Part, &mut SystemBus) -> Result<()>,
    {
        let bus = &mut self.bus;
        self.parts.iter_mut().try_for_each(|part| f(part, bus))
    }

    /// Calls `f` for every I/O channel in insertion order, stopping at the first error.
    pub fn for_all_channels<F>(&mut self, mut f: F) -> Result<()>
    where
        F: FnMut(&mut IOChannel, &mut SystemBus) -> Result<()>,
    {
        let bus = &mut self.bus;
        self.channels.iter_mut().try_for_each(|channel| f(channel, bus))
    }

    pub fn phase(&mut self, phase: Phase) -> Result<()> {
        self.for_all_components(|part, bus| phase.dispatch(part, bus))?;
        self.for_all_channels(|channel, bus| phase.dispatch(channel, bus))
    }

    /// One full clock cycle.
    pub fn cycle(&mut self) -> Result<()> {
        for phase in Phase::CYCLE {
            self.phase(phase)?;
        }
        trace!("{}", self.bus.status());
        Ok(())
    }

    pub fn running(&self) -> bool {
        self.bus.halt() && self.bus.sus()
    }

    /// Clocks the machine without pacing until it halts or suspends, or `limit` cycles have run.
    /// Returns the number of cycles.
    pub fn run(&mut self, limit: Option<u64>) -> Result<u64> {
        self.bus.clear_suspend();
        let mut cycles = 0;
        while self.running() && limit.map_or(true, |limit| cycles < limit) {
            if let Err(err) = self.cycle() {
                warn!("Cycle {} failed: {}", cycles, err);
                return Err(err);
            }
            cycles += 1;
        }
        Ok(cycles)
    }

    pub fn reset(&mut self) -> Result<()> {
        self.bus.reset();
        self.parts.iter_mut().try_for_each(|part| part.reset())?;
        self.channels.iter_mut().try_for_each(|channel| channel.reset())
    }

    /// Collects and clears everything that happened since the last call.
    pub fn drain_events(&mut self) -> Vec<Event> {
        let mut events = vec![];
        if self.bus.take_changed() {
            events.push(Event {
                source: EventSource::Bus,
                name: "BUS".to_string(),
                events: ComponentEvents::VALUE_CHANGED,
            });
        }
        for part in self.parts.iter_mut() {
            let source = EventSource::Component(part.id());
            part.drain_events(source, &mut events);
        }
        for channel in self.channels.iter_mut() {
            let source = EventSource::Channel(channel.id());
            channel.drain_events(source, &mut events);
        }
        events
    }

    pub fn status(&self) -> String {
        let mut lines = vec![self.bus.status()];
        lines.extend(self.parts.iter().map(Part::status));
        lines.extend(
            self.channels
                .iter()
                .map(IOChannel::status)
                .filter(|status| !status.is_empty()),
        );
        lines.join("\n")
    }
}

impl Clocked for ComponentContainer {
    fn on_rising_clock_edge(&mut self) -> Result<()> {
        self.phase(Phase::RisingEdge)
    }

    fn on_high_clock(&mut self) -> Result<()> {
        self.phase(Phase::High)
    }

    fn on_falling_clock_edge(&mut self) -> Result<()> {
        self.phase(Phase::FallingEdge)
    }

    fn on_low_clock(&mut self) -> Result<()> {
        self.phase(Phase::Low)
    }

    fn running(&self) -> bool {
        ComponentContainer::running(self)
    }
}
