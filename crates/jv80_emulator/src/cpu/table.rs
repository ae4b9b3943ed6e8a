//! The JV-80 instruction set.

use crate::bus::{OpFlags, ProcessorFlags};
use crate::components::Operation;
use crate::registers::*;

use super::microcode::{
    AddressingMode::{self, *},
    ConditionOp, MicroCode, MicroCodeStep, MicroCodeTable,
};
use super::opcodes::*;

const NONE: u8 = 0;
const INC: u8 = OpFlags::INC.bits();
const DEC: u8 = OpFlags::DEC.bits();
const FLAGS: u8 = OpFlags::FLAGS.bits();
const MSB: u8 = OpFlags::MSB.bits();

fn xdata(src: u8, target: u8, op: u8) -> MicroCodeStep {
    MicroCodeStep::xdata(src, target, op)
}

fn xaddr(src: u8, target: u8, op: u8) -> MicroCodeStep {
    MicroCodeStep::xaddr(src, target, op)
}

fn with(opcode: u8, instruction: &'static str, mode: AddressingMode, subject: u8, steps: Vec<MicroCodeStep>) -> MicroCode {
    MicroCode::with_mode(opcode, instruction, mode, subject, steps)
}

fn implied(opcode: u8, instruction: &'static str, steps: Vec<MicroCodeStep>) -> MicroCode {
    MicroCode::implied(opcode, instruction, steps)
}

fn push_byte(reg: u8) -> Vec<MicroCodeStep> {
    vec![xaddr(SP, MEMADDR, INC), xdata(reg, MEM, NONE)]
}

fn pop_byte(reg: u8) -> Vec<MicroCodeStep> {
    vec![xaddr(SP, MEMADDR, DEC), xdata(MEM, reg, NONE)]
}

fn push_word(reg: u8) -> Vec<MicroCodeStep> {
    vec![
        xaddr(SP, MEMADDR, INC),
        xdata(reg, MEM, NONE),
        xaddr(SP, MEMADDR, INC),
        xdata(reg, MEM, MSB),
    ]
}

fn pop_word(reg: u8) -> Vec<MicroCodeStep> {
    vec![
        xaddr(SP, MEMADDR, DEC),
        xdata(MEM, reg, MSB),
        xaddr(SP, MEMADDR, DEC),
        xdata(MEM, reg, NONE),
    ]
}

/// `*CD` as the memory address. The memory address register cannot be loaded a byte at a time.
fn address_cd() -> Vec<MicroCodeStep> {
    vec![
        xdata(GP_C, TX, NONE),
        xdata(GP_D, TX, MSB),
        xaddr(TX, MEMADDR, NONE),
    ]
}

fn alu(op: Operation, lhs: u8, rhs: u8) -> Vec<MicroCodeStep> {
    vec![
        xdata(lhs, LHS, NONE),
        xdata(rhs, RHS, op.bits()),
        xdata(RHS, lhs, NONE),
    ]
}

fn unary(op: Operation, reg: u8) -> Vec<MicroCodeStep> {
    vec![xdata(reg, RHS, op.bits()), xdata(RHS, reg, NONE)]
}

fn wide(op: Operation, with_carry: Operation) -> Vec<MicroCodeStep> {
    let mut steps = alu(op, GP_A, GP_C);
    steps.extend(alu(with_carry, GP_B, GP_D));
    steps
}

fn swap(reg1: u8, reg2: u8) -> Vec<MicroCodeStep> {
    vec![
        xdata(reg1, TX, NONE),
        xdata(reg2, reg1, NONE),
        xdata(TX, reg2, NONE),
    ]
}

fn jump(opcode: u8, instruction: &'static str, mode: AddressingMode, flag: ProcessorFlags, op: ConditionOp) -> MicroCode {
    with(opcode, instruction, mode, PC, vec![]).when(flag, op)
}

/// Built in microcode run when a non-maskable interrupt is serviced.
pub fn nmi_microcode() -> MicroCode {
    let mut steps = vec![xaddr(SP, MEMADDR, INC), xaddr(RHS, MEM, NONE)];
    steps.extend(push_word(PC));
    steps.push(xaddr(CONTROLLER, PC, NONE));
    implied(NMIVEC, "__nmi", steps)
}

pub fn default_table() -> MicroCodeTable {
    let mut table = MicroCodeTable::empty();
    let mut add = |mc: MicroCode| table.insert_at(mc.opcode, mc);

    add(implied(NOP, "NOP", vec![]));

    for (reg, name) in [(GP_A, 'A'), (GP_B, 'B'), (GP_C, 'C'), (GP_D, 'D')] {
        let base = MOV_A_CONST + (reg * 5);
        add(with(base, const_mnemonic(name), ImmediateByte, reg, vec![]));
        add(with(base + 1, addr_mnemonic(name), IndirectByte, reg, vec![]));
        let others = [GP_A, GP_B, GP_C, GP_D].into_iter().filter(|r| *r != reg);
        for (ix, src) in others.enumerate() {
            add(implied(
                base + 2 + ix as u8,
                move_mnemonic(name, src),
                vec![xdata(src, reg, NONE)],
            ));
        }
    }

    add(with(MOV_SP_CONST, "MOV SP,#$xxxx", ImmediateWord, SP, vec![]));
    add(with(MOV_SP_ADDR, "MOV SP,*$xxxx", IndirectWord, SP, vec![]));
    add(implied(MOV_SP_SI, "MOV SP,SI", vec![xaddr(SI, SP, NONE)]));
    add(with(MOV_SI_CONST, "MOV SI,#$xxxx", ImmediateWord, SI, vec![]));
    add(with(MOV_SI_ADDR, "MOV SI,*$xxxx", IndirectWord, SI, vec![]));
    add(implied(
        MOV_SI_CD,
        "MOV SI,CD",
        vec![xdata(GP_C, SI, NONE), xdata(GP_D, SI, MSB)],
    ));
    add(with(MOV_DI_CONST, "MOV DI,#$xxxx", ImmediateWord, DI, vec![]));
    add(with(MOV_DI_ADDR, "MOV DI,*$xxxx", IndirectWord, DI, vec![]));
    add(implied(
        MOV_DI_CD,
        "MOV DI,CD",
        vec![xdata(GP_C, DI, NONE), xdata(GP_D, DI, MSB)],
    ));

    // Indexed loads step the index register.
    let indexed: [(u8, &'static str, u8, u8); 8] = [
        (MOV_A__SI, "MOV A,*SI", GP_A, SI),
        (MOV_B__SI, "MOV B,*SI", GP_B, SI),
        (MOV_C__SI, "MOV C,*SI", GP_C, SI),
        (MOV_D__SI, "MOV D,*SI", GP_D, SI),
        (MOV_A__DI, "MOV A,*DI", GP_A, DI),
        (MOV_B__DI, "MOV B,*DI", GP_B, DI),
        (MOV_C__DI, "MOV C,*DI", GP_C, DI),
        (MOV_D__DI, "MOV D,*DI", GP_D, DI),
    ];
    for (opcode, instruction, reg, index) in indexed {
        add(implied(
            opcode,
            instruction,
            vec![xaddr(index, MEMADDR, INC), xdata(MEM, reg, NONE)],
        ));
    }
    add(implied(MOV_DI_SI, "MOV DI,SI", vec![xaddr(SI, DI, NONE)]));

    let always = ProcessorFlags::empty();
    add(jump(JMP, "JMP #$xxxx", ImmediateWord, always, ConditionOp::None));
    add(jump(JNZ, "JNZ #$xxxx", ImmediateWord, ProcessorFlags::ZERO, ConditionOp::Nand));
    add(jump(JC, "JC #$xxxx", ImmediateWord, ProcessorFlags::CARRY, ConditionOp::And));
    add(jump(JV, "JV #$xxxx", ImmediateWord, ProcessorFlags::OVERFLOW, ConditionOp::And));
    add(jump(JZ, "JZ #$xxxx", ImmediateWord, ProcessorFlags::ZERO, ConditionOp::And));
    add(jump(JMP_ABS, "JMP *$xxxx", IndirectWord, always, ConditionOp::None));
    add(jump(JNZ_ABS, "JNZ *$xxxx", IndirectWord, ProcessorFlags::ZERO, ConditionOp::Nand));
    add(jump(JC_ABS, "JC *$xxxx", IndirectWord, ProcessorFlags::CARRY, ConditionOp::And));
    add(jump(JV_ABS, "JV *$xxxx", IndirectWord, ProcessorFlags::OVERFLOW, ConditionOp::And));
    add(jump(JZ_ABS, "JZ *$xxxx", IndirectWord, ProcessorFlags::ZERO, ConditionOp::And));

    // TX holds the subroutine address, PC the return address.
    let mut call = push_word(PC);
    call.push(xaddr(TX, PC, NONE));
    add(with(CALL, "CALL #$xxxx", ImmediateWord, TX, call));

    // The return address has to be pushed before the target is read from memory, so the
    // indirect fetch is spelled out. The runner still picks up the operand.
    let mut call_abs = vec![
        xaddr(PC, MEMADDR, INC),
        xdata(MEM, TX, NONE),
        xaddr(PC, MEMADDR, INC),
        xdata(MEM, TX, MSB),
    ];
    call_abs.extend(push_word(PC));
    call_abs.extend([
        xaddr(TX, MEMADDR, INC),
        xdata(MEM, PC, NONE),
        xaddr(TX, MEMADDR, NONE),
        xdata(MEM, PC, MSB),
    ]);
    add(implied(CALL_ABS, "CALL *$xxxx", call_abs));
    add(implied(RET, "RET", pop_word(PC)));

    add(implied(PUSH_A, "PUSH A", push_byte(GP_A)));
    add(implied(PUSH_B, "PUSH B", push_byte(GP_B)));
    add(implied(PUSH_C, "PUSH C", push_byte(GP_C)));
    add(implied(PUSH_D, "PUSH D", push_byte(GP_D)));
    add(implied(PUSH_SI, "PUSH SI", push_word(SI)));
    add(implied(PUSH_DI, "PUSH DI", push_word(DI)));
    add(implied(POP_A, "POP A", pop_byte(GP_A)));
    add(implied(POP_B, "POP B", pop_byte(GP_B)));
    add(implied(POP_C, "POP C", pop_byte(GP_C)));
    add(implied(POP_D, "POP D", pop_byte(GP_D)));
    add(implied(POP_SI, "POP SI", pop_word(SI)));
    add(implied(POP_DI, "POP DI", pop_word(DI)));

    let stores: [(u8, &'static str, u8, &'static str, u8); 4] = [
        (MOV_ADDR_A, "MOV *$xxxx,A", MOV__DI_A, "MOV *DI,A", GP_A),
        (MOV_ADDR_B, "MOV *$xxxx,B", MOV__DI_B, "MOV *DI,B", GP_B),
        (MOV_ADDR_C, "MOV *$xxxx,C", MOV__DI_C, "MOV *DI,C", GP_C),
        (MOV_ADDR_D, "MOV *$xxxx,D", MOV__DI_D, "MOV *DI,D", GP_D),
    ];
    for (to_addr, to_addr_name, to_di, to_di_name, reg) in stores {
        add(with(to_addr, to_addr_name, ImmediateWord, MEMADDR, vec![xdata(reg, MEM, NONE)]));
        add(implied(
            to_di,
            to_di_name,
            vec![xaddr(DI, MEMADDR, INC), xdata(reg, MEM, NONE)],
        ));
    }

    let word_store = |lsb: u8, msb: u8| {
        vec![
            xaddr(TX, MEMADDR, INC),
            xdata(lsb, MEM, NONE),
            xaddr(TX, MEMADDR, NONE),
            xdata(msb, MEM, MSB),
        ]
    };
    add(with(MOV_ADDR_SI, "MOV *$xxxx,SI", ImmediateWord, TX, word_store(SI, SI)));
    add(with(MOV_ADDR_DI, "MOV *$xxxx,DI", ImmediateWord, TX, word_store(DI, DI)));
    add(with(MOV_ADDR_CD, "MOV *$xxxx,CD", ImmediateWord, TX, word_store(GP_C, GP_D)));
    for (opcode, instruction, index) in [(MOV__SI_CD, "MOV *SI,CD", SI), (MOV__DI_CD, "MOV *DI,CD", DI)] {
        add(implied(
            opcode,
            instruction,
            vec![
                xaddr(index, MEMADDR, INC),
                xdata(GP_C, MEM, NONE),
                xaddr(index, MEMADDR, INC),
                xdata(GP_D, MEM, NONE),
            ],
        ));
    }

    use Operation::*;
    let binary: [(u8, &'static str, Operation, u8, u8); 42] = [
        (ADD_A_B, "ADD A,B", Add, GP_A, GP_B),
        (ADC_A_B, "ADC A,B", Adc, GP_A, GP_B),
        (SUB_A_B, "SUB A,B", Sub, GP_A, GP_B),
        (SBB_A_B, "SBB A,B", Sbb, GP_A, GP_B),
        (AND_A_B, "AND A,B", And, GP_A, GP_B),
        (OR_A_B, "OR A,B", Or, GP_A, GP_B),
        (XOR_A_B, "XOR A,B", Xor, GP_A, GP_B),
        (ADD_A_C, "ADD A,C", Add, GP_A, GP_C),
        (ADC_A_C, "ADC A,C", Adc, GP_A, GP_C),
        (SUB_A_C, "SUB A,C", Sub, GP_A, GP_C),
        (SBB_A_C, "SBB A,C", Sbb, GP_A, GP_C),
        (AND_A_C, "AND A,C", And, GP_A, GP_C),
        (OR_A_C, "OR A,C", Or, GP_A, GP_C),
        (XOR_A_C, "XOR A,C", Xor, GP_A, GP_C),
        (ADD_A_D, "ADD A,D", Add, GP_A, GP_D),
        (ADC_A_D, "ADC A,D", Adc, GP_A, GP_D),
        (SUB_A_D, "SUB A,D", Sub, GP_A, GP_D),
        (SBB_A_D, "SBB A,D", Sbb, GP_A, GP_D),
        (AND_A_D, "AND A,D", And, GP_A, GP_D),
        (OR_A_D, "OR A,D", Or, GP_A, GP_D),
        (XOR_A_D, "XOR A,D", Xor, GP_A, GP_D),
        (ADD_B_C, "ADD B,C", Add, GP_B, GP_C),
        (ADC_B_C, "ADC B,C", Adc, GP_B, GP_C),
        (SUB_B_C, "SUB B,C", Sub, GP_B, GP_C),
        (SBB_B_C, "SBB B,C", Sbb, GP_B, GP_C),
        (AND_B_C, "AND B,C", And, GP_B, GP_C),
        (OR_B_C, "OR B,C", Or, GP_B, GP_C),
        (XOR_B_C, "XOR B,C", Xor, GP_B, GP_C),
        (ADD_B_D, "ADD B,D", Add, GP_B, GP_D),
        (ADC_B_D, "ADC B,D", Adc, GP_B, GP_D),
        (SUB_B_D, "SUB B,D", Sub, GP_B, GP_D),
        (SBB_B_D, "SBB B,D", Sbb, GP_B, GP_D),
        (AND_B_D, "AND B,D", And, GP_B, GP_D),
        (OR_B_D, "OR B,D", Or, GP_B, GP_D),
        (XOR_B_D, "XOR B,D", Xor, GP_B, GP_D),
        (ADD_C_D, "ADD C,D", Add, GP_C, GP_D),
        (ADC_C_D, "ADC C,D", Adc, GP_C, GP_D),
        (SUB_C_D, "SUB C,D", Sub, GP_C, GP_D),
        (SBB_C_D, "SBB C,D", Sbb, GP_C, GP_D),
        (AND_C_D, "AND C,D", And, GP_C, GP_D),
        (OR_C_D, "OR C,D", Or, GP_C, GP_D),
        (XOR_C_D, "XOR C,D", Xor, GP_C, GP_D),
    ];
    for (opcode, instruction, op, lhs, rhs) in binary {
        add(implied(opcode, instruction, alu(op, lhs, rhs)));
    }

    let unaries: [(u8, &'static str, Operation, u8); 24] = [
        (NOT_A, "NOT A", Not, GP_A),
        (SHL_A, "SHL A", Shl, GP_A),
        (SHR_A, "SHR A", Shr, GP_A),
        (NOT_B, "NOT B", Not, GP_B),
        (SHL_B, "SHL B", Shl, GP_B),
        (SHR_B, "SHR B", Shr, GP_B),
        (NOT_C, "NOT C", Not, GP_C),
        (SHL_C, "SHL C", Shl, GP_C),
        (SHR_C, "SHR C", Shr, GP_C),
        (NOT_D, "NOT D", Not, GP_D),
        (SHL_D, "SHL D", Shl, GP_D),
        (SHR_D, "SHR D", Shr, GP_D),
        (CLR_A, "CLR A", Clr, GP_A),
        (CLR_B, "CLR B", Clr, GP_B),
        (CLR_C, "CLR C", Clr, GP_C),
        (CLR_D, "CLR D", Clr, GP_D),
        (INC_A, "INC A", Inc, GP_A),
        (INC_B, "INC B", Inc, GP_B),
        (INC_C, "INC C", Inc, GP_C),
        (INC_D, "INC D", Inc, GP_D),
        (DEC_A, "DEC A", Dec, GP_A),
        (DEC_B, "DEC B", Dec, GP_B),
        (DEC_C, "DEC C", Dec, GP_C),
        (DEC_D, "DEC D", Dec, GP_D),
    ];
    for (opcode, instruction, op, reg) in unaries {
        add(implied(opcode, instruction, unary(op, reg)));
    }

    let swaps: [(u8, &'static str, u8, u8); 6] = [
        (SWP_A_B, "SWP A,B", GP_A, GP_B),
        (SWP_A_C, "SWP A,C", GP_A, GP_C),
        (SWP_A_D, "SWP A,D", GP_A, GP_D),
        (SWP_B_C, "SWP B,C", GP_B, GP_C),
        (SWP_B_D, "SWP B,D", GP_B, GP_D),
        (SWP_C_D, "SWP C,D", GP_C, GP_D),
    ];
    for (opcode, instruction, reg1, reg2) in swaps {
        add(implied(opcode, instruction, swap(reg1, reg2)));
    }

    add(implied(ADD_AB_CD, "ADD AB,CD", wide(Add, Adc)));
    add(implied(ADC_AB_CD, "ADC AB,CD", wide(Adc, Adc)));
    add(implied(SUB_AB_CD, "SUB AB,CD", wide(Sub, Sbb)));
    add(implied(SBB_AB_CD, "SBB AB,CD", wide(Sbb, Sbb)));

    let compares: [(u8, &'static str, u8, u8); 6] = [
        (CMP_A_B, "CMP A,B", GP_A, GP_B),
        (CMP_A_C, "CMP A,C", GP_A, GP_C),
        (CMP_A_D, "CMP A,D", GP_A, GP_D),
        (CMP_B_C, "CMP B,C", GP_B, GP_C),
        (CMP_B_D, "CMP B,D", GP_B, GP_D),
        (CMP_C_D, "CMP C,D", GP_C, GP_D),
    ];
    for (opcode, instruction, lhs, rhs) in compares {
        add(implied(
            opcode,
            instruction,
            vec![xdata(lhs, LHS, NONE), xdata(rhs, RHS, Cmp.bits())],
        ));
    }

    let steps: [(u8, &'static str, u8, u8); 4] = [
        (INC_SI, "INC SI", SI, INC),
        (INC_DI, "INC DI", DI, INC),
        (DEC_SI, "DEC SI", SI, DEC),
        (DEC_DI, "DEC DI", DI, DEC),
    ];
    for (opcode, instruction, reg, op) in steps {
        add(implied(opcode, instruction, vec![xaddr(reg, TX, op | FLAGS)]));
    }

    let io: [(u8, &'static str, u8, &'static str, u8); 4] = [
        (OUT_A, "OUT #$xx,A", IN_A, "IN A,#$xx", GP_A),
        (OUT_B, "OUT #$xx,B", IN_B, "IN B,#$xx", GP_B),
        (OUT_C, "OUT #$xx,C", IN_C, "IN C,#$xx", GP_C),
        (OUT_D, "OUT #$xx,D", IN_D, "IN D,#$xx", GP_D),
    ];
    for (out, out_name, input, input_name, reg) in io {
        let io_out = OpFlags::IO_OUT.bits();
        let io_in = OpFlags::IO_IN.bits();
        add(with(
            out,
            out_name,
            ImmediateByte,
            CONTROLLER,
            vec![MicroCodeStep::io(reg, DEREF_CONTROLLER, io_out)],
        ));
        add(with(
            input,
            input_name,
            ImmediateByte,
            CONTROLLER,
            vec![MicroCodeStep::io(reg, DEREF_CONTROLLER, io_in)],
        ));
    }

    add(implied(
        PUSH_FLAGS,
        "PUSHFL",
        vec![xaddr(SP, MEMADDR, INC), xaddr(RHS, MEM, NONE)],
    ));
    add(implied(
        POP_FLAGS,
        "POPFL",
        vec![xaddr(SP, MEMADDR, DEC), xaddr(MEM, RHS, NONE)],
    ));
    add(implied(
        CLR_FLAGS,
        "CLRFL",
        vec![
            xdata(TX, LHS, NONE),
            xdata(TX, RHS, Xor.bits()),
            xdata(RHS, TX, NONE),
            xaddr(TX, RHS, NONE),
        ],
    ));

    for (opcode, instruction, reg) in [(MOV__CD_A, "MOV *CD,A", GP_A), (MOV__CD_B, "MOV *CD,B", GP_B)] {
        let mut steps = address_cd();
        steps.push(xdata(reg, MEM, NONE));
        add(implied(opcode, instruction, steps));
    }
    for (opcode, instruction, reg) in [(MOV_A__CD, "MOV A,*CD", GP_A), (MOV_B__CD, "MOV B,*CD", GP_B)] {
        let mut steps = address_cd();
        steps.push(xdata(MEM, reg, NONE));
        add(implied(opcode, instruction, steps));
    }

    let immediates: [(u8, &'static str, Operation, u8); 12] = [
        (CMP_A_CONST, "CMP A,#$xx", Cmp, GP_A),
        (CMP_B_CONST, "CMP B,#$xx", Cmp, GP_B),
        (CMP_C_CONST, "CMP C,#$xx", Cmp, GP_C),
        (CMP_D_CONST, "CMP D,#$xx", Cmp, GP_D),
        (AND_A_CONST, "AND A,#$xx", And, GP_A),
        (AND_B_CONST, "AND B,#$xx", And, GP_B),
        (AND_C_CONST, "AND C,#$xx", And, GP_C),
        (AND_D_CONST, "AND D,#$xx", And, GP_D),
        (OR_A_CONST, "OR A,#$xx", Or, GP_A),
        (OR_B_CONST, "OR B,#$xx", Or, GP_B),
        (OR_C_CONST, "OR C,#$xx", Or, GP_C),
        (OR_D_CONST, "OR D,#$xx", Or, GP_D),
    ];
    // The operand goes from memory straight into the ALU. Memory ignores the MSB bit of the
    // operation, a 16 bit source would not.
    for (opcode, instruction, op, reg) in immediates {
        let mut steps = vec![
            xdata(reg, LHS, NONE),
            xaddr(PC, MEMADDR, INC),
            xdata(MEM, RHS, op.bits()),
        ];
        if op != Cmp {
            steps.push(xdata(RHS, reg, NONE));
        }
        add(implied(opcode, instruction, steps));
    }

    for (opcode, instruction, index) in [(MOV__SI_CONST, "MOV *SI,#$xx", SI), (MOV__DI_CONST, "MOV *DI,#$xx", DI)] {
        add(with(
            opcode,
            instruction,
            ImmediateByte,
            TX,
            vec![xaddr(index, MEMADDR, NONE), xdata(TX, MEM, NONE)],
        ));
    }
    // TX is needed for the address, so the constant waits in the controller.
    let mut steps = address_cd();
    steps.push(xdata(CONTROLLER, MEM, NONE));
    add(with(MOV__CD_CONST, "MOV *CD,#$xx", ImmediateByte, CONTROLLER, steps));
    add(with(
        MOV_CD_CONST,
        "MOV CD,#$xxxx",
        ImmediateWord,
        TX,
        vec![xdata(TX, GP_C, NONE), xdata(TX, GP_D, MSB)],
    ));

    let mut rti = pop_word(PC);
    rti.extend([xaddr(SP, MEMADDR, DEC), xaddr(MEM, RHS, NONE)]);
    add(implied(RTI, "RTI", rti));
    add(with(
        NMIVEC,
        "NMIVEC #$xxxx",
        ImmediateWord,
        TX,
        vec![xaddr(TX, CONTROLLER, NONE)],
    ));
    add(implied(
        HLT,
        "HLT",
        vec![MicroCodeStep::other(OpFlags::HALT.bits())],
    ));

    table
}

fn reg_name(reg: u8) -> char {
    match reg {
        GP_A => 'A',
        GP_B => 'B',
        GP_C => 'C',
        _ => 'D',
    }
}

fn const_mnemonic(reg: char) -> &'static str {
    match reg {
        'A' => "MOV A,#$xx",
        'B' => "MOV B,#$xx",
        'C' => "MOV C,#$xx",
        _ => "MOV D,#$xx",
    }
}

fn addr_mnemonic(reg: char) -> &'static str {
    match reg {
        'A' => "MOV A,*$xxxx",
        'B' => "MOV B,*$xxxx",
        'C' => "MOV C,*$xxxx",
        _ => "MOV D,*$xxxx",
    }
}

fn move_mnemonic(target: char, src: u8) -> &'static str {
    match (target, reg_name(src)) {
        ('A', 'B') => "MOV A,B",
        ('A', 'C') => "MOV A,C",
        ('A', _) => "MOV A,D",
        ('B', 'A') => "MOV B,A",
        ('B', 'C') => "MOV B,C",
        ('B', _) => "MOV B,D",
        ('C', 'A') => "MOV C,A",
        ('C', 'B') => "MOV C,B",
        ('C', _) => "MOV C,D",
        (_, 'A') => "MOV D,A",
        (_, 'B') => "MOV D,B",
        _ => "MOV D,C",
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::backplane::install_cpu;
    use crate::components::Memory;
    use crate::container::ComponentContainer;
    use crate::cpu::Controller;

    /// `program` in ROM at 0x0000, RAM at 0x2000 holding `ram`.
    fn machine(program: &[u8], ram: &[(u16, u8)]) -> ComponentContainer {
        let mut container = ComponentContainer::new();
        install_cpu(&mut container, Controller::default());
        let mut memory = Memory::new();
        memory.add(0x0000, 0x2000, false, Some(program));
        memory.add(0x2000, 0x2000, true, None);
        for (address, value) in ram {
            memory.poke(*address, *value).unwrap();
        }
        container.insert(memory);
        container
    }

    fn run(program: &[u8], ram: &[(u16, u8)]) -> ComponentContainer {
        let mut container = machine(program, ram);
        container.run(None).unwrap();
        assert!(container.bus().is_halted());
        container
    }

    fn regs(container: &ComponentContainer) -> [u8; 4] {
        [GP_A, GP_B, GP_C, GP_D].map(|id| container.register(id).unwrap().get_value())
    }

    fn addr(container: &ComponentContainer, id: u8) -> u16 {
        container.address_register(id).unwrap().get_value()
    }

    fn peek(container: &ComponentContainer, address: u16, len: u16) -> Vec<u8> {
        let memory = container.memory().unwrap();
        (address..address + len)
            .map(|address| memory.peek(address).unwrap())
            .collect()
    }

    fn flags(container: &ComponentContainer) -> String {
        container.bus().flags_string()
    }

    #[test]
    fn indexed_loads_step_the_index_register() {
        let container = run(
            &[
                MOV_SI_CONST,
                0x00,
                0x20,
                MOV_DI_CONST,
                0x10,
                0x20,
                MOV_A__SI,
                MOV_B__SI,
                MOV_C__DI,
                MOV_D__DI,
                HLT,
            ],
            &[(0x2000, 0x11), (0x2001, 0x22), (0x2010, 0x33), (0x2011, 0x44)],
        );
        assert_eq!([0x11, 0x22, 0x33, 0x44], regs(&container));
        assert_eq!(0x2002, addr(&container, SI));
        assert_eq!(0x2012, addr(&container, DI));
    }

    #[test]
    fn indexed_word_stores() {
        let container = run(
            &[
                MOV_C_CONST,
                0x34,
                MOV_D_CONST,
                0x12,
                MOV_SI_CONST,
                0x00,
                0x20,
                MOV_DI_CONST,
                0x10,
                0x20,
                MOV__SI_CD,
                MOV__DI_CD,
                HLT,
            ],
            &[],
        );
        assert_eq!(vec![0x34, 0x12], peek(&container, 0x2000, 2));
        assert_eq!(vec![0x34, 0x12], peek(&container, 0x2010, 2));
        assert_eq!(0x2002, addr(&container, SI));
        assert_eq!(0x2012, addr(&container, DI));
    }

    #[test]
    fn word_stores_to_address() {
        let container = run(
            &[
                MOV_SI_CONST,
                0x34,
                0x12,
                MOV_DI_CONST,
                0x78,
                0x56,
                MOV_CD_CONST,
                0xBC,
                0x9A,
                MOV_ADDR_SI,
                0x00,
                0x20,
                MOV_ADDR_DI,
                0x02,
                0x20,
                MOV_ADDR_CD,
                0x04,
                0x20,
                HLT,
            ],
            &[],
        );
        assert_eq!(0xBC, regs(&container)[2]);
        assert_eq!(0x9A, regs(&container)[3]);
        assert_eq!(
            vec![0x34, 0x12, 0x78, 0x56, 0xBC, 0x9A],
            peek(&container, 0x2000, 6)
        );
    }

    #[test]
    fn call_through_address() {
        let mut program = vec![MOV_SP_CONST, 0x00, 0x21, CALL_ABS, 0x00, 0x20, HLT];
        program.resize(0x10, NOP);
        program.extend([MOV_A_CONST, 0x42, RET]);

        let container = run(&program, &[(0x2000, 0x10), (0x2001, 0x00)]);
        assert_eq!(0x42, regs(&container)[0]);
        assert_eq!(0x0007, addr(&container, PC));
        assert_eq!(0x2100, addr(&container, SP));
        assert_eq!(vec![0x06, 0x00], peek(&container, 0x2100, 2));
    }

    #[test]
    fn push_and_pop_index_registers() {
        let container = run(
            &[
                MOV_SP_CONST,
                0x00,
                0x20,
                MOV_SI_CONST,
                0x34,
                0x12,
                MOV_DI_CONST,
                0x78,
                0x56,
                PUSH_SI,
                PUSH_DI,
                POP_SI,
                POP_DI,
                HLT,
            ],
            &[],
        );
        assert_eq!(0x5678, addr(&container, SI));
        assert_eq!(0x1234, addr(&container, DI));
        assert_eq!(0x2000, addr(&container, SP));
        assert_eq!(vec![0x34, 0x12, 0x78, 0x56], peek(&container, 0x2000, 4));
    }

    #[test]
    fn flags_survive_the_stack() {
        let container = run(
            &[MOV_SP_CONST, 0x00, 0x20, CMP_A_B, PUSH_FLAGS, CLR_FLAGS, POP_FLAGS, HLT],
            &[],
        );
        assert_eq!("-Z-", flags(&container));
        assert_eq!(vec![ProcessorFlags::ZERO.bits()], peek(&container, 0x2000, 1));
        assert_eq!(0x2000, addr(&container, SP));
    }

    #[test]
    fn clear_flags() {
        assert_eq!("-Z-", flags(&run(&[CMP_A_B, HLT], &[])));
        assert_eq!("---", flags(&run(&[CMP_A_B, CLR_FLAGS, HLT], &[])));
    }

    #[test]
    fn wide_add_and_subtract() {
        let container = run(&[MOV_A_CONST, 0xFF, MOV_C_CONST, 0x01, ADD_AB_CD, HLT], &[]);
        assert_eq!([0x00, 0x01, 0x01, 0x00], regs(&container));

        let container = run(
            &[MOV_B_CONST, 0x12, MOV_C_CONST, 0x01, MOV_D_CONST, 0x02, SUB_AB_CD, HLT],
            &[],
        );
        assert_eq!([0xFF, 0x0F, 0x01, 0x02], regs(&container));
        assert_eq!("---", flags(&container));
    }

    #[test]
    fn wide_arithmetic_with_carry() {
        // 0 - 1 leaves the carry set.
        let program = |op: u8| {
            vec![
                MOV_B_CONST,
                0x01,
                CMP_A_B,
                MOV_A_CONST,
                0x10,
                MOV_B_CONST,
                0x20,
                MOV_C_CONST,
                0x01,
                MOV_D_CONST,
                0x02,
                op,
                HLT,
            ]
        };
        assert_eq!([0x12, 0x22, 0x01, 0x02], regs(&run(&program(ADC_AB_CD), &[])));
        assert_eq!([0x0E, 0x1E, 0x01, 0x02], regs(&run(&program(SBB_AB_CD), &[])));
    }

    #[test]
    fn jump_through_address() {
        let mut program = vec![JMP_ABS, 0x00, 0x20, HLT];
        program.resize(0x10, NOP);
        program.extend([MOV_A_CONST, 0x42, HLT]);

        let container = run(&program, &[(0x2000, 0x10), (0x2001, 0x00)]);
        assert_eq!(0x42, regs(&container)[0]);
        assert_eq!(0x0013, addr(&container, PC));
    }

    #[test]
    fn conditional_jumps_through_address() {
        let mut program = vec![
            CMP_A_B,
            JNZ_ABS,
            0x00,
            0x20,
            JC_ABS,
            0x00,
            0x20,
            JV_ABS,
            0x00,
            0x20,
            JZ_ABS,
            0x00,
            0x20,
            MOV_B_CONST,
            0x01,
            HLT,
        ];
        program.resize(0x10, NOP);
        program.extend([MOV_A_CONST, 0x42, HLT]);

        let container = run(&program, &[(0x2000, 0x10), (0x2001, 0x00)]);
        assert_eq!(0x42, regs(&container)[0]);
        assert_eq!(0x00, regs(&container)[1]);
    }

    /// `prefix` followed by a jump to 0x0010 if the machine reaches it, 0x0020 marks a wrong turn.
    fn branches(prefix: &[u8]) -> ComponentContainer {
        let mut program = prefix.to_vec();
        program.resize(0x10, NOP);
        program.extend([MOV_C_CONST, 0x42, HLT]);
        program.resize(0x20, NOP);
        program.extend([MOV_D_CONST, 0xEE, HLT]);
        run(&program, &[])
    }

    #[test]
    fn overflow_jump() {
        // 0x80 - 0x01 overflows without a borrow.
        let container = branches(&[
            MOV_A_CONST,
            0x80,
            MOV_B_CONST,
            0x01,
            CMP_A_B,
            JC,
            0x20,
            0x00,
            JZ,
            0x20,
            0x00,
            JV,
            0x10,
            0x00,
            HLT,
        ]);
        assert_eq!(0x42, regs(&container)[2]);
        assert_eq!(0x00, regs(&container)[3]);
    }

    #[test]
    fn carry_jump() {
        let container = branches(&[
            MOV_B_CONST,
            0x01,
            CMP_A_B,
            JV,
            0x20,
            0x00,
            JZ,
            0x20,
            0x00,
            JC,
            0x10,
            0x00,
            HLT,
        ]);
        assert_eq!(0x42, regs(&container)[2]);
        assert_eq!(0x00, regs(&container)[3]);
    }

    #[test]
    fn zero_jump() {
        let container = branches(&[CMP_A_B, JC, 0x20, 0x00, JZ, 0x10, 0x00, HLT]);
        assert_eq!(0x42, regs(&container)[2]);
    }

    #[test]
    fn logic_immediates() {
        let container = run(
            &[
                MOV_A_CONST,
                0xF0,
                AND_A_CONST,
                0x3C,
                MOV_B_CONST,
                0x0F,
                OR_B_CONST,
                0xA0,
                MOV_C_CONST,
                0x55,
                AND_C_CONST,
                0x0F,
                MOV_D_CONST,
                0x01,
                OR_D_CONST,
                0x80,
                HLT,
            ],
            &[],
        );
        assert_eq!([0x30, 0xAF, 0x05, 0x81], regs(&container));

        let container = run(&[MOV_A_CONST, 0xF0, AND_A_CONST, 0x0F, HLT], &[]);
        assert_eq!(0x00, regs(&container)[0]);
        assert_eq!("-Z-", flags(&container));
    }

    #[test]
    fn compare_immediate_against_equal_value() {
        let mut container = machine(&[MOV_A_CONST, 0x05, CMP_A_CONST, 0x05, HLT], &[]);
        assert_eq!(Ok(12), container.run(None));
        assert_eq!(0x05, regs(&container)[0]);
        assert_eq!("-Z-", flags(&container));
    }

    #[test]
    fn compare_immediates_leave_registers() {
        let container = run(&[MOV_B_CONST, 0x10, CMP_B_CONST, 0x20, HLT], &[]);
        assert_eq!(0x10, regs(&container)[1]);
        assert_eq!("C--", flags(&container));

        let container = run(&[MOV_C_CONST, 0x30, CMP_C_CONST, 0x20, HLT], &[]);
        assert_eq!(0x30, regs(&container)[2]);
        assert_eq!("---", flags(&container));

        let container = run(&[MOV_D_CONST, 0xAA, CMP_D_CONST, 0xAA, HLT], &[]);
        assert_eq!(0xAA, regs(&container)[3]);
        assert_eq!("-Z-", flags(&container));
    }

    #[test]
    fn swaps() {
        let container = run(
            &[
                MOV_A_CONST,
                0x01,
                MOV_B_CONST,
                0x02,
                MOV_C_CONST,
                0x03,
                MOV_D_CONST,
                0x04,
                SWP_A_B,
                SWP_A_D,
                SWP_B_C,
                SWP_C_D,
                SWP_A_C,
                SWP_B_D,
                HLT,
            ],
            &[],
        );
        assert_eq!([0x02, 0x01, 0x04, 0x03], regs(&container));
    }
}
