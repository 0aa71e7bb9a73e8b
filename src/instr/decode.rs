//! Instruction decoding
//!
//! A 32-bit word (or a 16-bit half in compressed mode) is classified
//! into one [`Instr`] variant or rejected as illegal. Dispatch reads
//! the opcode, then funct3, then funct7 or funct12 where the class
//! needs it. Variants that fix bits to specific values validate them
//! here, so execution never sees a malformed instruction:
//!
//! * JALR requires funct3 = 000
//! * FENCE and FENCE.I require their unused register fields zero
//! * ECALL and EBREAK are exact 32-bit words
//! * shift immediates must have a legal upper pattern and a shift
//!   amount that fits the machine word
//! * the embedded base rejects register indices above x15
//!
//! Variants of extensions the configuration disables are illegal, as
//! are all words reserved by the encoding. Decoding is total: any
//! 32-bit value produces either a variant or [`DecodeError`].

use thiserror::Error;

use super::opcodes::*;
use super::{
    AmoOp, AmoWidth, BranchCond, CsrOp, Instr, IntImmOp, IntOp, LoadWidth, MulDivOp, MulDivWOp,
    ShiftOp, StoreWidth, WordOp,
};
use crate::bit_field;
use crate::isa::{Base, IsaConfig};
use crate::utils::sign_extend;
use crate::xlen::Xlen;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    #[error("illegal instruction 0x{0:08x}")]
    Illegal(u32),
    #[error("illegal compressed instruction 0x{0:04x}")]
    IllegalCompressed(u16),
}

fn opcode(word: u32) -> u32 {
    word & 0x7f
}

fn rd(word: u32) -> u8 {
    bit_field!(word, 12, 7) as u8
}

fn funct3(word: u32) -> u32 {
    bit_field!(word, 15, 12)
}

fn rs1(word: u32) -> u8 {
    bit_field!(word, 20, 15) as u8
}

fn rs2(word: u32) -> u8 {
    bit_field!(word, 25, 20) as u8
}

fn funct7(word: u32) -> u32 {
    bit_field!(word, 32, 25)
}

// Immediate assembly. Each format gathers its scattered bits and
// sign-extends from its top meaningful bit.

fn imm_i(word: u32) -> i32 {
    sign_extend(bit_field!(word, 32, 20), 11)
}

fn imm_s(word: u32) -> i32 {
    sign_extend(bit_field!(word, 32, 25, 5) | bit_field!(word, 12, 7), 11)
}

fn imm_b(word: u32) -> i32 {
    sign_extend(
        bit_field!(word, 32, 31, 12)
            | bit_field!(word, 8, 7, 11)
            | bit_field!(word, 31, 25, 5)
            | bit_field!(word, 12, 8, 1),
        12,
    )
}

fn imm_u(word: u32) -> i32 {
    bit_field!(word, 32, 12, 12) as i32
}

fn imm_j(word: u32) -> i32 {
    sign_extend(
        bit_field!(word, 32, 31, 20)
            | bit_field!(word, 20, 12, 12)
            | bit_field!(word, 21, 20, 11)
            | bit_field!(word, 31, 21, 1),
        20,
    )
}

/// The embedded base carries only x0-x15; any variant naming a higher
/// register does not exist there.
fn fits_base_e(instr: &Instr) -> bool {
    let ok = |r: u8| r < 16;
    match *instr {
        Instr::Lui { rd, .. } | Instr::Auipc { rd, .. } | Instr::Jal { rd, .. } => ok(rd),
        Instr::Jalr { rd, rs1, .. } => ok(rd) && ok(rs1),
        Instr::Branch { rs1, rs2, .. } | Instr::Store { rs1, rs2, .. } => ok(rs1) && ok(rs2),
        Instr::Load { rd, rs1, .. }
        | Instr::OpImm { rd, rs1, .. }
        | Instr::ShiftImm { rd, rs1, .. }
        | Instr::Addiw { rd, rs1, .. }
        | Instr::ShiftImmW { rd, rs1, .. }
        | Instr::Csr { rd, rs1, .. }
        | Instr::LoadReserved { rd, rs1, .. } => ok(rd) && ok(rs1),
        Instr::Op { rd, rs1, rs2, .. }
        | Instr::MulDiv { rd, rs1, rs2, .. }
        | Instr::OpW { rd, rs1, rs2, .. }
        | Instr::MulDivW { rd, rs1, rs2, .. }
        | Instr::StoreConditional { rd, rs1, rs2, .. }
        | Instr::Amo { rd, rs1, rs2, .. } => ok(rd) && ok(rs1) && ok(rs2),
        Instr::CsrImm { rd, .. } => ok(rd),
        Instr::Fence { .. } | Instr::FenceI | Instr::Ecall | Instr::Ebreak => true,
    }
}

/// Decode one 32-bit instruction word
pub fn decode<X: Xlen>(word: u32, config: &IsaConfig) -> Result<Instr, DecodeError> {
    let illegal = Err(DecodeError::Illegal(word));
    if word & 0b11 != 0b11 {
        // Not a 32-bit encoding
        return illegal;
    }
    let rv64 = X::BITS == 64;

    let instr = match opcode(word) {
        OP_LUI => Instr::Lui { rd: rd(word), imm: imm_u(word) },
        OP_AUIPC => Instr::Auipc { rd: rd(word), imm: imm_u(word) },
        OP_JAL => Instr::Jal { rd: rd(word), imm: imm_j(word) },
        OP_JALR => {
            if funct3(word) != 0 {
                return illegal;
            }
            Instr::Jalr { rd: rd(word), rs1: rs1(word), imm: imm_i(word) }
        }
        OP_BRANCH => {
            let cond = match funct3(word) {
                FUNCT3_BEQ => BranchCond::Beq,
                FUNCT3_BNE => BranchCond::Bne,
                FUNCT3_BLT => BranchCond::Blt,
                FUNCT3_BGE => BranchCond::Bge,
                FUNCT3_BLTU => BranchCond::Bltu,
                FUNCT3_BGEU => BranchCond::Bgeu,
                _ => return illegal,
            };
            Instr::Branch { cond, rs1: rs1(word), rs2: rs2(word), imm: imm_b(word) }
        }
        OP_LOAD => {
            let width = match funct3(word) {
                FUNCT3_B => LoadWidth::Lb,
                FUNCT3_H => LoadWidth::Lh,
                FUNCT3_W => LoadWidth::Lw,
                FUNCT3_BU => LoadWidth::Lbu,
                FUNCT3_HU => LoadWidth::Lhu,
                FUNCT3_WU if rv64 => LoadWidth::Lwu,
                FUNCT3_D if rv64 => LoadWidth::Ld,
                _ => return illegal,
            };
            Instr::Load { width, rd: rd(word), rs1: rs1(word), imm: imm_i(word) }
        }
        OP_STORE => {
            let width = match funct3(word) {
                FUNCT3_B => StoreWidth::Sb,
                FUNCT3_H => StoreWidth::Sh,
                FUNCT3_W => StoreWidth::Sw,
                FUNCT3_D if rv64 => StoreWidth::Sd,
                _ => return illegal,
            };
            Instr::Store { width, rs1: rs1(word), rs2: rs2(word), imm: imm_s(word) }
        }
        OP_IMM => decode_op_imm::<X>(word)?,
        OP_IMM_32 if rv64 => decode_op_imm_32(word)?,
        OP => decode_op(word, config)?,
        OP_32 if rv64 => decode_op_32(word, config)?,
        OP_MISC_MEM => decode_misc_mem(word, config)?,
        OP_SYSTEM => decode_system(word, config)?,
        OP_AMO if config.ext_a => decode_amo::<X>(word)?,
        _ => return illegal,
    };

    if config.base == Base::E && !fits_base_e(&instr) {
        return illegal;
    }
    Ok(instr)
}

fn decode_op_imm<X: Xlen>(word: u32) -> Result<Instr, DecodeError> {
    let (rd, rs1) = (rd(word), rs1(word));
    let instr = match funct3(word) {
        FUNCT3_ADDI => Instr::OpImm { op: IntImmOp::Addi, rd, rs1, imm: imm_i(word) },
        FUNCT3_SLTI => Instr::OpImm { op: IntImmOp::Slti, rd, rs1, imm: imm_i(word) },
        FUNCT3_SLTIU => Instr::OpImm { op: IntImmOp::Sltiu, rd, rs1, imm: imm_i(word) },
        FUNCT3_XORI => Instr::OpImm { op: IntImmOp::Xori, rd, rs1, imm: imm_i(word) },
        FUNCT3_ORI => Instr::OpImm { op: IntImmOp::Ori, rd, rs1, imm: imm_i(word) },
        FUNCT3_ANDI => Instr::OpImm { op: IntImmOp::Andi, rd, rs1, imm: imm_i(word) },
        shift => {
            // The low log2(XLEN) bits of the immediate are the shift
            // amount; the remaining upper bits select the variant and
            // must carry no other value.
            let imm12 = bit_field!(word, 32, 20);
            let shamt = (u64::from(imm12) & X::SHAMT_MASK) as u8;
            let upper = imm12 & !(X::SHAMT_MASK as u32);
            let op = match (shift, upper) {
                (FUNCT3_SLLI, 0) => ShiftOp::Sll,
                (FUNCT3_SRLI_SRAI, 0) => ShiftOp::Srl,
                (FUNCT3_SRLI_SRAI, 0b0100_0000_0000) => ShiftOp::Sra,
                _ => return Err(DecodeError::Illegal(word)),
            };
            Instr::ShiftImm { op, rd, rs1, shamt }
        }
    };
    Ok(instr)
}

fn decode_op_imm_32(word: u32) -> Result<Instr, DecodeError> {
    let (rd, rs1) = (rd(word), rs1(word));
    let instr = match funct3(word) {
        FUNCT3_ADDI => Instr::Addiw { rd, rs1, imm: imm_i(word) },
        shift => {
            // Word-sized shifts always take a five-bit shift amount
            let shamt = rs2(word);
            let op = match (shift, funct7(word)) {
                (FUNCT3_SLLI, FUNCT7_BASE) => ShiftOp::Sll,
                (FUNCT3_SRLI_SRAI, FUNCT7_BASE) => ShiftOp::Srl,
                (FUNCT3_SRLI_SRAI, FUNCT7_SUB_SRA) => ShiftOp::Sra,
                _ => return Err(DecodeError::Illegal(word)),
            };
            Instr::ShiftImmW { op, rd, rs1, shamt }
        }
    };
    Ok(instr)
}

fn decode_op(word: u32, config: &IsaConfig) -> Result<Instr, DecodeError> {
    let (rd, rs1, rs2) = (rd(word), rs1(word), rs2(word));
    if funct7(word) == FUNCT7_MULDIV {
        if !config.ext_m {
            return Err(DecodeError::Illegal(word));
        }
        let op = match funct3(word) {
            FUNCT3_MUL => MulDivOp::Mul,
            FUNCT3_MULH => MulDivOp::Mulh,
            FUNCT3_MULHSU => MulDivOp::Mulhsu,
            FUNCT3_MULHU => MulDivOp::Mulhu,
            FUNCT3_DIV => MulDivOp::Div,
            FUNCT3_DIVU => MulDivOp::Divu,
            FUNCT3_REM => MulDivOp::Rem,
            FUNCT3_REMU => MulDivOp::Remu,
            _ => unreachable!("funct3 is three bits"),
        };
        return Ok(Instr::MulDiv { op, rd, rs1, rs2 });
    }
    let op = match (funct3(word), funct7(word)) {
        (FUNCT3_ADD_SUB, FUNCT7_BASE) => IntOp::Add,
        (FUNCT3_ADD_SUB, FUNCT7_SUB_SRA) => IntOp::Sub,
        (FUNCT3_SLL, FUNCT7_BASE) => IntOp::Sll,
        (FUNCT3_SLT, FUNCT7_BASE) => IntOp::Slt,
        (FUNCT3_SLTU, FUNCT7_BASE) => IntOp::Sltu,
        (FUNCT3_XOR, FUNCT7_BASE) => IntOp::Xor,
        (FUNCT3_SRL_SRA, FUNCT7_BASE) => IntOp::Srl,
        (FUNCT3_SRL_SRA, FUNCT7_SUB_SRA) => IntOp::Sra,
        (FUNCT3_OR, FUNCT7_BASE) => IntOp::Or,
        (FUNCT3_AND, FUNCT7_BASE) => IntOp::And,
        _ => return Err(DecodeError::Illegal(word)),
    };
    Ok(Instr::Op { op, rd, rs1, rs2 })
}

fn decode_op_32(word: u32, config: &IsaConfig) -> Result<Instr, DecodeError> {
    let (rd, rs1, rs2) = (rd(word), rs1(word), rs2(word));
    if funct7(word) == FUNCT7_MULDIV {
        if !config.ext_m {
            return Err(DecodeError::Illegal(word));
        }
        let op = match funct3(word) {
            FUNCT3_MUL => MulDivWOp::Mulw,
            FUNCT3_DIV => MulDivWOp::Divw,
            FUNCT3_DIVU => MulDivWOp::Divuw,
            FUNCT3_REM => MulDivWOp::Remw,
            FUNCT3_REMU => MulDivWOp::Remuw,
            _ => return Err(DecodeError::Illegal(word)),
        };
        return Ok(Instr::MulDivW { op, rd, rs1, rs2 });
    }
    let op = match (funct3(word), funct7(word)) {
        (FUNCT3_ADD_SUB, FUNCT7_BASE) => WordOp::Addw,
        (FUNCT3_ADD_SUB, FUNCT7_SUB_SRA) => WordOp::Subw,
        (FUNCT3_SLL, FUNCT7_BASE) => WordOp::Sllw,
        (FUNCT3_SRL_SRA, FUNCT7_BASE) => WordOp::Srlw,
        (FUNCT3_SRL_SRA, FUNCT7_SUB_SRA) => WordOp::Sraw,
        _ => return Err(DecodeError::Illegal(word)),
    };
    Ok(Instr::OpW { op, rd, rs1, rs2 })
}

fn decode_misc_mem(word: u32, config: &IsaConfig) -> Result<Instr, DecodeError> {
    // Both fences keep rd and rs1 reserved as zero
    if rd(word) != 0 || rs1(word) != 0 {
        return Err(DecodeError::Illegal(word));
    }
    match funct3(word) {
        FUNCT3_FENCE => Ok(Instr::Fence {
            fm: bit_field!(word, 32, 28) as u8,
            pred: bit_field!(word, 28, 24) as u8,
            succ: bit_field!(word, 24, 20) as u8,
        }),
        FUNCT3_FENCE_I if config.zifencei => {
            if bit_field!(word, 32, 20) != 0 {
                return Err(DecodeError::Illegal(word));
            }
            Ok(Instr::FenceI)
        }
        _ => Err(DecodeError::Illegal(word)),
    }
}

fn decode_system(word: u32, config: &IsaConfig) -> Result<Instr, DecodeError> {
    let csr = bit_field!(word, 32, 20) as u16;
    let instr = match funct3(word) {
        FUNCT3_PRIV => {
            // The environment instructions are exact words: rd, rs1
            // and the remaining funct12 values are all fixed.
            if rd(word) != 0 || rs1(word) != 0 {
                return Err(DecodeError::Illegal(word));
            }
            match bit_field!(word, 32, 20) {
                FUNCT12_ECALL => Instr::Ecall,
                FUNCT12_EBREAK => Instr::Ebreak,
                _ => return Err(DecodeError::Illegal(word)),
            }
        }
        FUNCT3_CSRRW if config.zicsr => Instr::Csr { op: CsrOp::Rw, rd: rd(word), rs1: rs1(word), csr },
        FUNCT3_CSRRS if config.zicsr => Instr::Csr { op: CsrOp::Rs, rd: rd(word), rs1: rs1(word), csr },
        FUNCT3_CSRRC if config.zicsr => Instr::Csr { op: CsrOp::Rc, rd: rd(word), rs1: rs1(word), csr },
        FUNCT3_CSRRWI if config.zicsr => Instr::CsrImm { op: CsrOp::Rw, rd: rd(word), zimm: rs1(word), csr },
        FUNCT3_CSRRSI if config.zicsr => Instr::CsrImm { op: CsrOp::Rs, rd: rd(word), zimm: rs1(word), csr },
        FUNCT3_CSRRCI if config.zicsr => Instr::CsrImm { op: CsrOp::Rc, rd: rd(word), zimm: rs1(word), csr },
        _ => return Err(DecodeError::Illegal(word)),
    };
    Ok(instr)
}

fn decode_amo<X: Xlen>(word: u32) -> Result<Instr, DecodeError> {
    let width = match funct3(word) {
        FUNCT3_W => AmoWidth::W,
        FUNCT3_D if X::BITS == 64 => AmoWidth::D,
        _ => return Err(DecodeError::Illegal(word)),
    };
    let (rd, rs1, rs2) = (rd(word), rs1(word), rs2(word));
    let aq = bit_field!(word, 27, 26) != 0;
    let rl = bit_field!(word, 26, 25) != 0;
    let instr = match bit_field!(word, 32, 27) {
        FUNCT5_LR => {
            if rs2 != 0 {
                return Err(DecodeError::Illegal(word));
            }
            Instr::LoadReserved { width, rd, rs1, aq, rl }
        }
        FUNCT5_SC => Instr::StoreConditional { width, rd, rs1, rs2, aq, rl },
        FUNCT5_AMOSWAP => Instr::Amo { op: AmoOp::Swap, width, rd, rs1, rs2, aq, rl },
        FUNCT5_AMOADD => Instr::Amo { op: AmoOp::Add, width, rd, rs1, rs2, aq, rl },
        FUNCT5_AMOXOR => Instr::Amo { op: AmoOp::Xor, width, rd, rs1, rs2, aq, rl },
        FUNCT5_AMOAND => Instr::Amo { op: AmoOp::And, width, rd, rs1, rs2, aq, rl },
        FUNCT5_AMOOR => Instr::Amo { op: AmoOp::Or, width, rd, rs1, rs2, aq, rl },
        FUNCT5_AMOMIN => Instr::Amo { op: AmoOp::Min, width, rd, rs1, rs2, aq, rl },
        FUNCT5_AMOMAX => Instr::Amo { op: AmoOp::Max, width, rd, rs1, rs2, aq, rl },
        FUNCT5_AMOMINU => Instr::Amo { op: AmoOp::Minu, width, rd, rs1, rs2, aq, rl },
        FUNCT5_AMOMAXU => Instr::Amo { op: AmoOp::Maxu, width, rd, rs1, rs2, aq, rl },
        _ => return Err(DecodeError::Illegal(word)),
    };
    Ok(instr)
}

// --- Compressed (16-bit) instructions ---
//
// Each legal compressed instruction expands to its 32-bit base
// equivalent; semantics are defined only through that expansion. The
// quadrant is the low two bits, funct3 the top three.

/// x8-x15, the register range reachable by three-bit fields
fn creg(bits: u32) -> u8 {
    8 + (bits & 0b111) as u8
}

/// Decode one 16-bit compressed instruction into its expansion
pub fn decode_compressed<X: Xlen>(half: u16, config: &IsaConfig) -> Result<Instr, DecodeError> {
    let illegal = Err(DecodeError::IllegalCompressed(half));
    if !config.ext_c || half & 0b11 == 0b11 || half == 0 {
        // Disabled extension, a 32-bit encoding, or the defined
        // illegal all-zero instruction
        return illegal;
    }
    let h = u32::from(half);
    let rv64 = X::BITS == 64;
    let funct3 = bit_field!(h, 16, 13);

    let instr = match (half & 0b11, funct3) {
        (0b00, 0b000) => {
            // c.addi4spn -> addi rd', x2, nzuimm
            let nzuimm = bit_field!(h, 13, 11, 4)
                | bit_field!(h, 11, 7, 6)
                | bit_field!(h, 7, 6, 2)
                | bit_field!(h, 6, 5, 3);
            if nzuimm == 0 {
                return illegal;
            }
            Instr::OpImm { op: IntImmOp::Addi, rd: creg(h >> 2), rs1: 2, imm: nzuimm as i32 }
        }
        (0b00, 0b010) => {
            // c.lw -> lw rd', offset(rs1')
            let imm = (bit_field!(h, 13, 10, 3) | bit_field!(h, 7, 6, 2) | bit_field!(h, 6, 5, 6)) as i32;
            Instr::Load { width: LoadWidth::Lw, rd: creg(h >> 2), rs1: creg(h >> 7), imm }
        }
        (0b00, 0b011) if rv64 => {
            // c.ld -> ld rd', offset(rs1')
            let imm = (bit_field!(h, 13, 10, 3) | bit_field!(h, 7, 5, 6)) as i32;
            Instr::Load { width: LoadWidth::Ld, rd: creg(h >> 2), rs1: creg(h >> 7), imm }
        }
        (0b00, 0b110) => {
            // c.sw -> sw rs2', offset(rs1')
            let imm = (bit_field!(h, 13, 10, 3) | bit_field!(h, 7, 6, 2) | bit_field!(h, 6, 5, 6)) as i32;
            Instr::Store { width: StoreWidth::Sw, rs1: creg(h >> 7), rs2: creg(h >> 2), imm }
        }
        (0b00, 0b111) if rv64 => {
            // c.sd -> sd rs2', offset(rs1')
            let imm = (bit_field!(h, 13, 10, 3) | bit_field!(h, 7, 5, 6)) as i32;
            Instr::Store { width: StoreWidth::Sd, rs1: creg(h >> 7), rs2: creg(h >> 2), imm }
        }
        (0b01, 0b000) => {
            // c.addi (c.nop when rd = x0) -> addi rd, rd, imm
            let rd = bit_field!(h, 12, 7) as u8;
            Instr::OpImm { op: IntImmOp::Addi, rd, rs1: rd, imm: ci_imm(h) }
        }
        (0b01, 0b001) => {
            if rv64 {
                // c.addiw -> addiw rd, rd, imm; rd = x0 is reserved
                let rd = bit_field!(h, 12, 7) as u8;
                if rd == 0 {
                    return illegal;
                }
                Instr::Addiw { rd, rs1: rd, imm: ci_imm(h) }
            } else {
                // c.jal -> jal x1, offset
                Instr::Jal { rd: 1, imm: cj_offset(h) }
            }
        }
        (0b01, 0b010) => {
            // c.li -> addi rd, x0, imm
            let rd = bit_field!(h, 12, 7) as u8;
            Instr::OpImm { op: IntImmOp::Addi, rd, rs1: 0, imm: ci_imm(h) }
        }
        (0b01, 0b011) => {
            let rd = bit_field!(h, 12, 7) as u8;
            if rd == 2 {
                // c.addi16sp -> addi x2, x2, nzimm
                let nzimm = sign_extend(
                    bit_field!(h, 13, 12, 9)
                        | bit_field!(h, 7, 6, 4)
                        | bit_field!(h, 6, 5, 6)
                        | bit_field!(h, 5, 3, 7)
                        | bit_field!(h, 3, 2, 5),
                    9,
                );
                if nzimm == 0 {
                    return illegal;
                }
                Instr::OpImm { op: IntImmOp::Addi, rd: 2, rs1: 2, imm: nzimm }
            } else {
                // c.lui -> lui rd, nzimm
                let nzimm = sign_extend(bit_field!(h, 13, 12, 17) | bit_field!(h, 7, 2, 12), 17);
                if nzimm == 0 {
                    return illegal;
                }
                Instr::Lui { rd, imm: nzimm }
            }
        }
        (0b01, 0b100) => decode_c_alu::<X>(half, h)?,
        (0b01, 0b101) => Instr::Jal { rd: 0, imm: cj_offset(h) },
        (0b01, 0b110) => {
            // c.beqz -> beq rs1', x0, offset
            Instr::Branch { cond: BranchCond::Beq, rs1: creg(h >> 7), rs2: 0, imm: cb_offset(h) }
        }
        (0b01, 0b111) => {
            // c.bnez -> bne rs1', x0, offset
            Instr::Branch { cond: BranchCond::Bne, rs1: creg(h >> 7), rs2: 0, imm: cb_offset(h) }
        }
        (0b10, 0b000) => {
            // c.slli -> slli rd, rd, shamt
            let rd = bit_field!(h, 12, 7) as u8;
            let shamt = ci_shamt::<X>(half, h)?;
            Instr::ShiftImm { op: ShiftOp::Sll, rd, rs1: rd, shamt }
        }
        (0b10, 0b010) => {
            // c.lwsp -> lw rd, offset(x2); rd = x0 is reserved
            let rd = bit_field!(h, 12, 7) as u8;
            if rd == 0 {
                return illegal;
            }
            let imm = (bit_field!(h, 13, 12, 5) | bit_field!(h, 7, 4, 2) | bit_field!(h, 4, 2, 6)) as i32;
            Instr::Load { width: LoadWidth::Lw, rd, rs1: 2, imm }
        }
        (0b10, 0b011) if rv64 => {
            // c.ldsp -> ld rd, offset(x2); rd = x0 is reserved
            let rd = bit_field!(h, 12, 7) as u8;
            if rd == 0 {
                return illegal;
            }
            let imm = (bit_field!(h, 13, 12, 5) | bit_field!(h, 7, 5, 3) | bit_field!(h, 5, 2, 6)) as i32;
            Instr::Load { width: LoadWidth::Ld, rd, rs1: 2, imm }
        }
        (0b10, 0b100) => {
            let r = bit_field!(h, 12, 7) as u8;
            let rs2 = bit_field!(h, 7, 2) as u8;
            match (bit_field!(h, 13, 12), r, rs2) {
                // c.jr with rs1 = x0 is reserved
                (0, 0, 0) => return illegal,
                // c.jr -> jalr x0, 0(rs1)
                (0, _, 0) => Instr::Jalr { rd: 0, rs1: r, imm: 0 },
                // c.mv -> add rd, x0, rs2
                (0, _, _) => Instr::Op { op: IntOp::Add, rd: r, rs1: 0, rs2 },
                (_, 0, 0) => Instr::Ebreak,
                // c.jalr -> jalr x1, 0(rs1)
                (_, _, 0) => Instr::Jalr { rd: 1, rs1: r, imm: 0 },
                // c.add -> add rd, rd, rs2
                (_, _, _) => Instr::Op { op: IntOp::Add, rd: r, rs1: r, rs2 },
            }
        }
        (0b10, 0b110) => {
            // c.swsp -> sw rs2, offset(x2)
            let imm = (bit_field!(h, 13, 9, 2) | bit_field!(h, 9, 7, 6)) as i32;
            Instr::Store { width: StoreWidth::Sw, rs1: 2, rs2: bit_field!(h, 7, 2) as u8, imm }
        }
        (0b10, 0b111) if rv64 => {
            // c.sdsp -> sd rs2, offset(x2)
            let imm = (bit_field!(h, 13, 10, 3) | bit_field!(h, 10, 7, 6)) as i32;
            Instr::Store { width: StoreWidth::Sd, rs1: 2, rs2: bit_field!(h, 7, 2) as u8, imm }
        }
        _ => return illegal,
    };

    if config.base == Base::E && !fits_base_e(&instr) {
        return illegal;
    }
    Ok(instr)
}

/// CI-format sign-extended immediate: bits [12|6:2]
fn ci_imm(h: u32) -> i32 {
    sign_extend(bit_field!(h, 13, 12, 5) | bit_field!(h, 7, 2), 5)
}

/// CI-format shift amount: bits [12|6:2]. Bit 5 set is reserved on
/// RV32.
fn ci_shamt<X: Xlen>(half: u16, h: u32) -> Result<u8, DecodeError> {
    let shamt = bit_field!(h, 13, 12, 5) | bit_field!(h, 7, 2);
    if X::BITS == 32 && shamt >= 32 {
        return Err(DecodeError::IllegalCompressed(half));
    }
    Ok(shamt as u8)
}

/// CJ-format jump target: bits [12|11|10:9|8|7|6|5:3|2] assemble
/// offset[11|4|9:8|10|6|7|3:1|5]
fn cj_offset(h: u32) -> i32 {
    sign_extend(
        bit_field!(h, 13, 12, 11)
            | bit_field!(h, 12, 11, 4)
            | bit_field!(h, 11, 9, 8)
            | bit_field!(h, 9, 8, 10)
            | bit_field!(h, 8, 7, 6)
            | bit_field!(h, 7, 6, 7)
            | bit_field!(h, 6, 3, 1)
            | bit_field!(h, 3, 2, 5),
        11,
    )
}

/// CB-format branch target: bits [12|11:10|6:5|4:3|2] assemble
/// offset[8|4:3|7:6|2:1|5]
fn cb_offset(h: u32) -> i32 {
    sign_extend(
        bit_field!(h, 13, 12, 8)
            | bit_field!(h, 12, 10, 3)
            | bit_field!(h, 7, 5, 6)
            | bit_field!(h, 5, 3, 1)
            | bit_field!(h, 3, 2, 5),
        8,
    )
}

/// Quadrant 1, funct3 100: the compressed ALU block
fn decode_c_alu<X: Xlen>(half: u16, h: u32) -> Result<Instr, DecodeError> {
    let rd = creg(h >> 7);
    let instr = match bit_field!(h, 12, 10) {
        0b00 => Instr::ShiftImm { op: ShiftOp::Srl, rd, rs1: rd, shamt: ci_shamt::<X>(half, h)? },
        0b01 => Instr::ShiftImm { op: ShiftOp::Sra, rd, rs1: rd, shamt: ci_shamt::<X>(half, h)? },
        0b10 => Instr::OpImm { op: IntImmOp::Andi, rd, rs1: rd, imm: ci_imm(h) },
        _ => {
            let rs2 = creg(h >> 2);
            match (bit_field!(h, 13, 12), bit_field!(h, 7, 5)) {
                (0, 0b00) => Instr::Op { op: IntOp::Sub, rd, rs1: rd, rs2 },
                (0, 0b01) => Instr::Op { op: IntOp::Xor, rd, rs1: rd, rs2 },
                (0, 0b10) => Instr::Op { op: IntOp::Or, rd, rs1: rd, rs2 },
                (0, 0b11) => Instr::Op { op: IntOp::And, rd, rs1: rd, rs2 },
                (_, 0b00) if X::BITS == 64 => Instr::OpW { op: WordOp::Subw, rd, rs1: rd, rs2 },
                (_, 0b01) if X::BITS == 64 => Instr::OpW { op: WordOp::Addw, rd, rs1: rd, rs2 },
                _ => return Err(DecodeError::IllegalCompressed(half)),
            }
        }
    };
    Ok(instr)
}
