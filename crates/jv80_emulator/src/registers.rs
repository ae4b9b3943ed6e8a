//! Well known component ids on the bus.

pub const GP_A: u8 = 0x0;
pub const GP_B: u8 = 0x1;
pub const GP_C: u8 = 0x2;
pub const GP_D: u8 = 0x3;
pub const LHS: u8 = 0x4;
pub const RHS: u8 = 0x5;
pub const IR: u8 = 0x6;
pub const MEM: u8 = 0x7;
pub const PC: u8 = 0x8;
pub const SP: u8 = 0x9;
pub const SI: u8 = 0xA;
pub const DI: u8 = 0xB;
pub const TX: u8 = 0xC;
pub const BP: u8 = 0xD;
pub const CONTROLLER: u8 = 0xE;
pub const MEMADDR: u8 = 0xF;

/// Placeholder in a microcode step, replaced by the controller's scratch byte when the step runs.
pub const DEREF_CONTROLLER: u8 = 0x10;

pub fn name(id: u8) -> &'static str {
    match id {
        GP_A => "A",
        GP_B => "B",
        GP_C => "C",
        GP_D => "D",
        LHS => "LHS",
        RHS => "RHS",
        IR => "IR",
        MEM => "MEM",
        PC => "PC",
        SP => "SP",
        SI => "SI",
        DI => "DI",
        TX => "TX",
        BP => "BP",
        CONTROLLER => "CTRL",
        MEMADDR => "M",
        _ => "?",
    }
}
