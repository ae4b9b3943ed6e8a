use bitflags::bitflags;

pub type Address = u16;

bitflags! {
    pub struct ProcessorFlags : u8 {
        const ZERO = 0x01;
        const CARRY = 0x02;
        const OVERFLOW = 0x04;
    }
}

bitflags! {
    /// Modifier bits for the current transfer. Several names share a bit; which one applies
    /// depends on the kind of transfer that is asserted.
    pub struct OpFlags : u8 {
        const INC = 0x01;
        const IO_IN = 0x01;
        const DEC = 0x02;
        const FLAGS = 0x04;
        const MSB = 0x08;
        const HALT = 0x08;
        const IO_OUT = 0x08;
        const DONE = 0x10;
    }
}

/// Bits of the op flags that are put on the bus. Everything above is microcode bookkeeping.
pub const OP_MASK: u8 = 0x0F;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RunMode {
    #[default]
    Continuous,
    BreakAtInstruction,
    BreakAtClock,
}

/// The shared data and address bytes plus control lines. The `xdata`, `xaddr`, `io`, `halt`,
/// `sus` and `nmi` lines are active low.
#[derive(Debug)]
pub struct SystemBus {
    data_bus: u8,
    addr_bus: u8,
    get: u8,
    put: u8,
    op: u8,
    xdata: bool,
    xaddr: bool,
    io: bool,
    halt: bool,
    sus: bool,
    nmi: bool,
    rst: bool,
    flags: ProcessorFlags,
    run_mode: RunMode,
    changed: bool,
}

impl Default for SystemBus {
    fn default() -> Self {
        Self {
            data_bus: 0,
            addr_bus: 0,
            get: 0,
            put: 0,
            op: 0,
            xdata: true,
            xaddr: true,
            io: true,
            halt: true,
            sus: true,
            nmi: true,
            rst: false,
            flags: ProcessorFlags::empty(),
            run_mode: RunMode::Continuous,
            changed: false,
        }
    }
}

impl SystemBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Back to the idle pattern. The run mode survives a reset.
    pub fn reset(&mut self) {
        let run_mode = self.run_mode;
        *self = Self::default();
        self.run_mode = run_mode;
        self.changed = true;
    }

    pub fn read_data_bus(&self) -> u8 {
        self.data_bus
    }

    pub fn put_on_data_bus(&mut self, value: u8) {
        self.data_bus = value;
        self.changed = true;
    }

    pub fn read_addr_bus(&self) -> u8 {
        self.addr_bus
    }

    pub fn put_on_addr_bus(&mut self, value: u8) {
        self.addr_bus = value;
        self.changed = true;
    }

    pub fn xdata(&self) -> bool {
        self.xdata
    }

    pub fn xaddr(&self) -> bool {
        self.xaddr
    }

    pub fn io(&self) -> bool {
        self.io
    }

    pub fn halt(&self) -> bool {
        self.halt
    }

    pub fn sus(&self) -> bool {
        self.sus
    }

    pub fn nmi(&self) -> bool {
        self.nmi
    }

    pub fn rst(&self) -> bool {
        self.rst
    }

    pub fn is_halted(&self) -> bool {
        !self.halt
    }

    pub fn is_suspended(&self) -> bool {
        !self.sus
    }

    pub fn clear_suspend(&mut self) {
        self.sus = true;
        self.changed = true;
    }

    pub fn set_nmi(&mut self) {
        self.nmi = false;
        self.changed = true;
    }

    pub fn clear_nmi(&mut self) {
        self.nmi = true;
        self.changed = true;
    }

    pub fn get_id(&self) -> u8 {
        self.get
    }

    pub fn put_id(&self) -> u8 {
        self.put
    }

    pub fn op(&self) -> u8 {
        self.op
    }

    pub fn op_flags(&self) -> OpFlags {
        OpFlags::from_bits_truncate(self.op)
    }

    /// Sets every line and field in one go. Used to drive a single component without a
    /// controller.
    #[allow(clippy::too_many_arguments)]
    pub fn initialize(
        &mut self,
        xdata: bool,
        xaddr: bool,
        io: bool,
        get: u8,
        put: u8,
        op: u8,
        data_bus: u8,
        addr_bus: u8,
    ) {
        self.xdata = xdata;
        self.xaddr = xaddr;
        self.io = io;
        self.get = get;
        self.put = put;
        self.op = op;
        self.data_bus = data_bus;
        self.addr_bus = addr_bus;
        self.changed = true;
    }

    fn transfer(&mut self, xdata: bool, xaddr: bool, io: bool, from: u8, to: u8, op: u8) {
        self.xdata = xdata;
        self.xaddr = xaddr;
        self.io = io;
        self.get = from;
        self.put = to;
        self.op = op;
        self.changed = true;
    }

    pub fn xdata_transfer(&mut self, from: u8, to: u8, op: u8) {
        self.transfer(false, true, true, from, to, op);
    }

    pub fn xaddr_transfer(&mut self, from: u8, to: u8, op: u8) {
        self.transfer(true, false, true, from, to, op);
    }

    pub fn io_transfer(&mut self, register: u8, channel: u8, op: u8) {
        self.transfer(true, true, false, register, channel, op);
    }

    /// Deasserts all transfer lines so the next cycle does not repeat the previous transfer.
    pub fn release(&mut self) {
        self.transfer(true, true, true, 0, 0, 0);
    }

    pub fn stop(&mut self) {
        self.halt = false;
        self.changed = true;
    }

    pub fn suspend(&mut self) {
        self.sus = false;
        self.changed = true;
    }

    pub fn flags(&self) -> ProcessorFlags {
        self.flags
    }

    pub fn set_flags(&mut self, flags: u8) {
        self.flags = ProcessorFlags::from_bits_truncate(flags);
    }

    pub fn set_flag(&mut self, flag: ProcessorFlags, value: bool) {
        self.flags.set(flag, value);
    }

    pub fn clear_flag(&mut self, flag: ProcessorFlags) {
        self.flags.remove(flag);
    }

    pub fn clear_flags(&mut self) {
        self.flags = ProcessorFlags::empty();
    }

    pub fn is_set(&self, flag: ProcessorFlags) -> bool {
        self.flags.contains(flag)
    }

    pub fn flags_string(&self) -> String {
        macro_rules! do_flag {
            ($name:ident, $char:literal) => {{
                if self.flags.contains(ProcessorFlags::$name) {
                    $char
                } else {
                    '-'
                }
            }};
        }

        [do_flag!(CARRY, 'C'), do_flag!(ZERO, 'Z'), do_flag!(OVERFLOW, 'V')]
            .iter()
            .collect()
    }

    pub fn run_mode(&self) -> RunMode {
        self.run_mode
    }

    pub fn set_run_mode(&mut self, run_mode: RunMode) {
        self.run_mode = run_mode;
    }

    /// Returns whether anything changed since the last call and clears the marker.
    pub(crate) fn take_changed(&mut self) -> bool {
        std::mem::take(&mut self.changed)
    }

    pub fn status(&self) -> String {
        let action = if !self.xdata {
            'D'
        } else if !self.xaddr {
            'A'
        } else {
            '_'
        };
        format!(
            "DATA {:02x} ADDR {:02x} GET {:01x} PUT {:01x} OP {:01x} ACT {} FLAGS {}",
            self.data_bus,
            self.addr_bus,
            self.get,
            self.put,
            self.op,
            action,
            self.flags_string()
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn reset_restores_idle_pattern() {
        let mut bus = SystemBus::new();
        bus.initialize(false, false, false, 3, 4, 0x0F, 0x42, 0x37);
        bus.stop();
        bus.suspend();
        bus.set_nmi();
        bus.set_flags(0x07);
        bus.set_run_mode(RunMode::BreakAtClock);

        bus.reset();

        assert!(bus.xdata());
        assert!(bus.xaddr());
        assert!(bus.io());
        assert!(bus.halt());
        assert!(bus.sus());
        assert!(bus.nmi());
        assert!(!bus.rst());
        assert_eq!(0, bus.get_id());
        assert_eq!(0, bus.put_id());
        assert_eq!(0, bus.op());
        assert_eq!(0, bus.read_data_bus());
        assert_eq!(0, bus.read_addr_bus());
        assert_eq!(ProcessorFlags::empty(), bus.flags());
        assert_eq!(RunMode::BreakAtClock, bus.run_mode());
    }

    #[test]
    fn starts_continuous() {
        assert_eq!(RunMode::Continuous, RunMode::default());
        assert_eq!(RunMode::Continuous, SystemBus::new().run_mode());
    }

    #[test]
    fn transfers_assert_exactly_one_line() {
        let mut bus = SystemBus::new();

        bus.xdata_transfer(1, 2, 0x08);
        assert!(!bus.xdata() && bus.xaddr() && bus.io());
        assert_eq!((1, 2, 0x08), (bus.get_id(), bus.put_id(), bus.op()));

        bus.xaddr_transfer(8, 15, 0x01);
        assert!(bus.xdata() && !bus.xaddr() && bus.io());

        bus.io_transfer(0, 5, 0x08);
        assert!(bus.xdata() && bus.xaddr() && !bus.io());
        assert!(bus.op_flags().contains(OpFlags::IO_OUT));

        bus.release();
        assert!(bus.xdata() && bus.xaddr() && bus.io());
    }

    #[test]
    fn flags() {
        let mut bus = SystemBus::new();
        assert_eq!("---", bus.flags_string());

        bus.set_flag(ProcessorFlags::CARRY, true);
        bus.set_flag(ProcessorFlags::OVERFLOW, true);
        assert!(bus.is_set(ProcessorFlags::CARRY));
        assert!(!bus.is_set(ProcessorFlags::ZERO));
        assert_eq!("C-V", bus.flags_string());

        bus.clear_flag(ProcessorFlags::CARRY);
        assert_eq!("--V", bus.flags_string());

        bus.set_flags(0xFF);
        assert_eq!("CZV", bus.flags_string());

        bus.clear_flags();
        assert_eq!(0, bus.flags().bits());
    }

    #[test]
    fn status_line() {
        let mut bus = SystemBus::new();
        bus.initialize(false, true, true, 0x1, 0x3, 0x0, 0x42, 0x00);
        bus.set_flag(ProcessorFlags::ZERO, true);
        assert_eq!(
            "DATA 42 ADDR 00 GET 1 PUT 3 OP 0 ACT D FLAGS -Z-",
            bus.status()
        );
    }

    #[test]
    fn changes_are_collected_once() {
        let mut bus = SystemBus::new();
        assert!(!bus.take_changed());
        bus.put_on_data_bus(0x12);
        assert!(bus.take_changed());
        assert!(!bus.take_changed());
    }
}
