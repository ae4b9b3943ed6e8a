pub mod backplane;
pub mod builder;
pub mod bus;
pub mod clock;
pub mod component;
pub mod components;
pub mod container;
pub mod cpu;
pub mod error;
pub mod registers;

pub use backplane::BackPlane;
pub use builder::BackPlaneBuilder;
pub use bus::{Address, OpFlags, ProcessorFlags, RunMode, SystemBus};
pub use clock::{Clock, ClockEvent, ClockListener, ClockStop, Clocked};
pub use component::{Component, ComponentEvents, ConnectedComponent, Event, EventSource};
pub use container::ComponentContainer;
pub use error::{Error, Result};
