//! Instruction encoding
//!
//! Constructors for the 32-bit encodings, used by the round-trip
//! fixtures and the execution tests. Only produces valid encodings
//! when the arguments are in range; immediates are masked to their
//! field widths, so out-of-range values alias rather than spill into
//! neighbouring fields.

use crate::instr::opcodes::*;
use crate::utils::field_range;

/// Make an I-type instruction
pub fn itype(imm: u32, rs1: u8, funct3: u32, rd: u8, opcode: u32) -> u32 {
    (imm & 0xfff) << 20 | u32::from(rs1) << 15 | funct3 << 12 | u32::from(rd) << 7 | opcode
}

/// Make an R- or S-type instruction. The two formats carry the same
/// field sizes; the meaning of a and b is:
///
/// R-type: a = funct7, b = rd
/// S-type: a = imm[11:5], b = imm[4:0]
pub fn rstype(a: u32, rs2: u8, rs1: u8, funct3: u32, b: u32, opcode: u32) -> u32 {
    a << 25 | u32::from(rs2) << 20 | u32::from(rs1) << 15 | funct3 << 12 | b << 7 | opcode
}

/// Make a U- or J-type instruction (for J-type, build the immediate
/// field with [`jtype_imm_field`] first)
pub fn ujtype(imm: u32, rd: u8, opcode: u32) -> u32 {
    imm << 12 | u32::from(rd) << 7 | opcode
}

/// Shuffle a byte offset into the 20-bit field of the J-type format
pub fn jtype_imm_field(imm: i32) -> u32 {
    let imm = imm as u32;
    let imm20 = field_range(imm, 21, 20);
    let imm19_12 = field_range(imm, 20, 12);
    let imm11 = field_range(imm, 12, 11);
    let imm10_1 = field_range(imm, 11, 1);
    (imm20 << 19) | (imm10_1 << 9) | (imm11 << 8) | imm19_12
}

/// Returns (a, b) for [`rstype`] carrying a branch offset
pub fn btype_imm_fields(imm: i32) -> (u32, u32) {
    let imm = imm as u32;
    let imm12 = field_range(imm, 13, 12);
    let imm11 = field_range(imm, 12, 11);
    let imm10_5 = field_range(imm, 11, 5);
    let imm4_1 = field_range(imm, 5, 1);
    let a = (imm12 << 6) | imm10_5;
    let b = (imm4_1 << 1) | imm11;
    (a, b)
}

/// The shift-by-immediate instructions use the I-type format with the
/// shift amount in the low bits of the immediate and the variant
/// selector above it
pub fn shifts_imm_field(shamt: u8, upper: u32) -> u32 {
    (upper << 5) | (u32::from(shamt) & 0x3f)
}

macro_rules! utype_constructor {
    ($name:ident, $opcode:expr) => {
        /// The immediate is the value of the upper 20 bits, not the
        /// shifted result
        pub fn $name(rd: u8, imm: i32) -> u32 {
            ujtype(imm as u32 & 0xfffff, rd, $opcode)
        }
    };
}

macro_rules! itype_constructor {
    ($name:ident, $funct3:expr, $opcode:expr) => {
        pub fn $name(rd: u8, rs1: u8, imm: i32) -> u32 {
            itype(imm as u32, rs1, $funct3, rd, $opcode)
        }
    };
}

macro_rules! shift_constructor {
    ($name:ident, $upper:expr, $funct3:expr, $opcode:expr) => {
        pub fn $name(rd: u8, rs1: u8, shamt: u8) -> u32 {
            itype(shifts_imm_field(shamt, $upper), rs1, $funct3, rd, $opcode)
        }
    };
}

macro_rules! wshift_constructor {
    ($name:ident, $upper:expr, $funct3:expr) => {
        pub fn $name(rd: u8, rs1: u8, shamt: u8) -> u32 {
            itype(
                ($upper << 5) | (u32::from(shamt) & 0x1f),
                rs1,
                $funct3,
                rd,
                OP_IMM_32,
            )
        }
    };
}

macro_rules! rtype_constructor {
    ($name:ident, $funct7:expr, $funct3:expr, $opcode:expr) => {
        pub fn $name(rd: u8, rs1: u8, rs2: u8) -> u32 {
            rstype($funct7, rs2, rs1, $funct3, u32::from(rd), $opcode)
        }
    };
}

macro_rules! stype_constructor {
    ($name:ident, $funct3:expr) => {
        /// Argument order follows assembly: the stored register first
        pub fn $name(rs2: u8, rs1: u8, imm: i32) -> u32 {
            let imm = imm as u32;
            let imm11_5 = field_range(imm, 12, 5);
            let imm4_0 = field_range(imm, 5, 0);
            rstype(imm11_5, rs2, rs1, $funct3, imm4_0, OP_STORE)
        }
    };
}

macro_rules! btype_constructor {
    ($name:ident, $funct3:expr) => {
        pub fn $name(rs1: u8, rs2: u8, imm: i32) -> u32 {
            let (a, b) = btype_imm_fields(imm);
            rstype(a, rs2, rs1, $funct3, b, OP_BRANCH)
        }
    };
}

// === RV32I / RV64I base ===

utype_constructor!(lui, OP_LUI);
utype_constructor!(auipc, OP_AUIPC);

pub fn jal(rd: u8, imm: i32) -> u32 {
    ujtype(jtype_imm_field(imm), rd, OP_JAL)
}

itype_constructor!(jalr, 0b000, OP_JALR);

btype_constructor!(beq, FUNCT3_BEQ);
btype_constructor!(bne, FUNCT3_BNE);
btype_constructor!(blt, FUNCT3_BLT);
btype_constructor!(bge, FUNCT3_BGE);
btype_constructor!(bltu, FUNCT3_BLTU);
btype_constructor!(bgeu, FUNCT3_BGEU);

itype_constructor!(lb, FUNCT3_B, OP_LOAD);
itype_constructor!(lh, FUNCT3_H, OP_LOAD);
itype_constructor!(lw, FUNCT3_W, OP_LOAD);
itype_constructor!(lbu, FUNCT3_BU, OP_LOAD);
itype_constructor!(lhu, FUNCT3_HU, OP_LOAD);
itype_constructor!(lwu, FUNCT3_WU, OP_LOAD);
itype_constructor!(ld, FUNCT3_D, OP_LOAD);

stype_constructor!(sb, FUNCT3_B);
stype_constructor!(sh, FUNCT3_H);
stype_constructor!(sw, FUNCT3_W);
stype_constructor!(sd, FUNCT3_D);

itype_constructor!(addi, FUNCT3_ADDI, OP_IMM);
itype_constructor!(slti, FUNCT3_SLTI, OP_IMM);
itype_constructor!(sltiu, FUNCT3_SLTIU, OP_IMM);
itype_constructor!(xori, FUNCT3_XORI, OP_IMM);
itype_constructor!(ori, FUNCT3_ORI, OP_IMM);
itype_constructor!(andi, FUNCT3_ANDI, OP_IMM);

shift_constructor!(slli, 0b0000000, FUNCT3_SLLI, OP_IMM);
shift_constructor!(srli, 0b0000000, FUNCT3_SRLI_SRAI, OP_IMM);
shift_constructor!(srai, 0b0100000, FUNCT3_SRLI_SRAI, OP_IMM);

rtype_constructor!(add, FUNCT7_BASE, FUNCT3_ADD_SUB, OP);
rtype_constructor!(sub, FUNCT7_SUB_SRA, FUNCT3_ADD_SUB, OP);
rtype_constructor!(sll, FUNCT7_BASE, FUNCT3_SLL, OP);
rtype_constructor!(slt, FUNCT7_BASE, FUNCT3_SLT, OP);
rtype_constructor!(sltu, FUNCT7_BASE, FUNCT3_SLTU, OP);
rtype_constructor!(xor, FUNCT7_BASE, FUNCT3_XOR, OP);
rtype_constructor!(srl, FUNCT7_BASE, FUNCT3_SRL_SRA, OP);
rtype_constructor!(sra, FUNCT7_SUB_SRA, FUNCT3_SRL_SRA, OP);
rtype_constructor!(or, FUNCT7_BASE, FUNCT3_OR, OP);
rtype_constructor!(and, FUNCT7_BASE, FUNCT3_AND, OP);

// RV64I word variants
itype_constructor!(addiw, FUNCT3_ADDI, OP_IMM_32);
wshift_constructor!(slliw, 0b0000000, FUNCT3_SLLI);
wshift_constructor!(srliw, 0b0000000, FUNCT3_SRLI_SRAI);
wshift_constructor!(sraiw, 0b0100000, FUNCT3_SRLI_SRAI);
rtype_constructor!(addw, FUNCT7_BASE, FUNCT3_ADD_SUB, OP_32);
rtype_constructor!(subw, FUNCT7_SUB_SRA, FUNCT3_ADD_SUB, OP_32);
rtype_constructor!(sllw, FUNCT7_BASE, FUNCT3_SLL, OP_32);
rtype_constructor!(srlw, FUNCT7_BASE, FUNCT3_SRL_SRA, OP_32);
rtype_constructor!(sraw, FUNCT7_SUB_SRA, FUNCT3_SRL_SRA, OP_32);

// === Fences and environment ===

pub fn fence(pred: u8, succ: u8) -> u32 {
    itype(u32::from(pred & 0xf) << 4 | u32::from(succ & 0xf), 0, FUNCT3_FENCE, 0, OP_MISC_MEM)
}

pub fn fence_i() -> u32 {
    itype(0, 0, FUNCT3_FENCE_I, 0, OP_MISC_MEM)
}

pub fn ecall() -> u32 {
    itype(FUNCT12_ECALL, 0, FUNCT3_PRIV, 0, OP_SYSTEM)
}

pub fn ebreak() -> u32 {
    itype(FUNCT12_EBREAK, 0, FUNCT3_PRIV, 0, OP_SYSTEM)
}

// === Zicsr ===

pub fn csrrw(rd: u8, csr: u16, rs1: u8) -> u32 {
    itype(u32::from(csr), rs1, FUNCT3_CSRRW, rd, OP_SYSTEM)
}

pub fn csrrs(rd: u8, csr: u16, rs1: u8) -> u32 {
    itype(u32::from(csr), rs1, FUNCT3_CSRRS, rd, OP_SYSTEM)
}

pub fn csrrc(rd: u8, csr: u16, rs1: u8) -> u32 {
    itype(u32::from(csr), rs1, FUNCT3_CSRRC, rd, OP_SYSTEM)
}

pub fn csrrwi(rd: u8, csr: u16, zimm: u8) -> u32 {
    itype(u32::from(csr), zimm, FUNCT3_CSRRWI, rd, OP_SYSTEM)
}

pub fn csrrsi(rd: u8, csr: u16, zimm: u8) -> u32 {
    itype(u32::from(csr), zimm, FUNCT3_CSRRSI, rd, OP_SYSTEM)
}

pub fn csrrci(rd: u8, csr: u16, zimm: u8) -> u32 {
    itype(u32::from(csr), zimm, FUNCT3_CSRRCI, rd, OP_SYSTEM)
}

// === M extension ===

rtype_constructor!(mul, FUNCT7_MULDIV, FUNCT3_MUL, OP);
rtype_constructor!(mulh, FUNCT7_MULDIV, FUNCT3_MULH, OP);
rtype_constructor!(mulhsu, FUNCT7_MULDIV, FUNCT3_MULHSU, OP);
rtype_constructor!(mulhu, FUNCT7_MULDIV, FUNCT3_MULHU, OP);
rtype_constructor!(div, FUNCT7_MULDIV, FUNCT3_DIV, OP);
rtype_constructor!(divu, FUNCT7_MULDIV, FUNCT3_DIVU, OP);
rtype_constructor!(rem, FUNCT7_MULDIV, FUNCT3_REM, OP);
rtype_constructor!(remu, FUNCT7_MULDIV, FUNCT3_REMU, OP);
rtype_constructor!(mulw, FUNCT7_MULDIV, FUNCT3_MUL, OP_32);
rtype_constructor!(divw, FUNCT7_MULDIV, FUNCT3_DIV, OP_32);
rtype_constructor!(divuw, FUNCT7_MULDIV, FUNCT3_DIVU, OP_32);
rtype_constructor!(remw, FUNCT7_MULDIV, FUNCT3_REM, OP_32);
rtype_constructor!(remuw, FUNCT7_MULDIV, FUNCT3_REMU, OP_32);

// === A extension ===

fn amo_word(funct5: u32, aq: bool, rl: bool, rs2: u8, rs1: u8, funct3: u32, rd: u8) -> u32 {
    let funct7 = funct5 << 2 | u32::from(aq) << 1 | u32::from(rl);
    rstype(funct7, rs2, rs1, funct3, u32::from(rd), OP_AMO)
}

pub fn lr_w(rd: u8, rs1: u8, aq: bool, rl: bool) -> u32 {
    amo_word(FUNCT5_LR, aq, rl, 0, rs1, FUNCT3_W, rd)
}

pub fn sc_w(rd: u8, rs2: u8, rs1: u8, aq: bool, rl: bool) -> u32 {
    amo_word(FUNCT5_SC, aq, rl, rs2, rs1, FUNCT3_W, rd)
}

pub fn amoswap_w(rd: u8, rs2: u8, rs1: u8, aq: bool, rl: bool) -> u32 {
    amo_word(FUNCT5_AMOSWAP, aq, rl, rs2, rs1, FUNCT3_W, rd)
}

pub fn amoadd_w(rd: u8, rs2: u8, rs1: u8, aq: bool, rl: bool) -> u32 {
    amo_word(FUNCT5_AMOADD, aq, rl, rs2, rs1, FUNCT3_W, rd)
}

pub fn amoadd_d(rd: u8, rs2: u8, rs1: u8, aq: bool, rl: bool) -> u32 {
    amo_word(FUNCT5_AMOADD, aq, rl, rs2, rs1, FUNCT3_D, rd)
}
