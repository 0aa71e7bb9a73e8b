//! Per-instruction semantics
//!
//! Each decoded variant is a state transformation over the register
//! file and memory, with pc advancement owned here. Arithmetic wraps;
//! shift amounts use the low log2(XLEN) bits of their source; division
//! implements the divide-by-zero and signed-overflow results required
//! by the unprivileged ISA. Writes that name x0 fall through the
//! register file's hardwired zero.
//!
//! Jumps and taken branches validate the target against IALIGN before
//! moving pc, so a misaligned-target fault leaves the hart at the
//! faulting instruction with its link register unwritten.

use super::Hart;
use crate::hart::memory::Wordsize;
use crate::instr::{
    AmoOp, AmoWidth, BranchCond, CsrOp, Instr, IntImmOp, IntOp, LoadWidth, MulDivOp, MulDivWOp,
    ShiftOp, StoreWidth, WordOp,
};
use crate::trap::Exception;
use crate::utils::sign_extend64;
use crate::xlen::Xlen;

impl<X: Xlen> Hart<'_, X> {
    fn x(&self, n: u8) -> u64 {
        self.registers.read(n)
    }

    fn set_x(&mut self, n: u8, value: u64) {
        self.registers.write(n, X::truncate(value));
    }

    /// Move pc to the next sequential instruction
    fn advance(&mut self, ilen: u64) {
        self.pc = X::truncate(self.pc.wrapping_add(ilen));
    }

    /// Set pc to target, checking IALIGN first. On a misaligned
    /// target pc is left unmodified.
    fn jump_to(&mut self, target: u64) -> Result<(), Exception> {
        let target = X::truncate(target);
        if target % self.config.ialign() != 0 {
            return Err(Exception::InstructionAddressMisaligned { target });
        }
        self.pc = target;
        Ok(())
    }

    /// Effective address of a load or store
    fn effective_address(&self, rs1: u8, imm: i32) -> u64 {
        X::truncate(self.x(rs1).wrapping_add(imm as i64 as u64))
    }

    pub(crate) fn execute(&mut self, instr: Instr, word: u32, ilen: u64) -> Result<(), Exception> {
        match instr {
            Instr::Lui { rd, imm } => {
                self.set_x(rd, imm as i64 as u64);
                self.advance(ilen);
            }
            Instr::Auipc { rd, imm } => {
                let value = self.pc.wrapping_add(imm as i64 as u64);
                self.set_x(rd, value);
                self.advance(ilen);
            }
            Instr::Jal { rd, imm } => {
                let return_address = self.pc.wrapping_add(ilen);
                let target = self.pc.wrapping_add(imm as i64 as u64);
                self.jump_to(target)?;
                self.set_x(rd, return_address);
            }
            Instr::Jalr { rd, rs1, imm } => {
                let return_address = self.pc.wrapping_add(ilen);
                let target = self.x(rs1).wrapping_add(imm as i64 as u64) & !1;
                self.jump_to(target)?;
                self.set_x(rd, return_address);
            }
            Instr::Branch { cond, rs1, rs2, imm } => {
                let (src1, src2) = (self.x(rs1), self.x(rs2));
                let taken = match cond {
                    BranchCond::Beq => src1 == src2,
                    BranchCond::Bne => src1 != src2,
                    BranchCond::Blt => X::signed(src1) < X::signed(src2),
                    BranchCond::Bge => X::signed(src1) >= X::signed(src2),
                    BranchCond::Bltu => src1 < src2,
                    BranchCond::Bgeu => src1 >= src2,
                };
                if taken {
                    let target = self.pc.wrapping_add(imm as i64 as u64);
                    self.jump_to(target)?;
                } else {
                    self.advance(ilen);
                }
            }
            Instr::Load { width, rd, rs1, imm } => {
                self.load(width, rd, rs1, imm)?;
                self.advance(ilen);
            }
            Instr::Store { width, rs1, rs2, imm } => {
                self.store(width, rs1, rs2, imm)?;
                self.advance(ilen);
            }
            Instr::OpImm { op, rd, rs1, imm } => {
                let src = self.x(rs1);
                let imm = X::truncate(imm as i64 as u64);
                let value = match op {
                    IntImmOp::Addi => src.wrapping_add(imm),
                    IntImmOp::Slti => u64::from(X::signed(src) < X::signed(imm)),
                    IntImmOp::Sltiu => u64::from(src < imm),
                    IntImmOp::Xori => src ^ imm,
                    IntImmOp::Ori => src | imm,
                    IntImmOp::Andi => src & imm,
                };
                self.set_x(rd, value);
                self.advance(ilen);
            }
            Instr::ShiftImm { op, rd, rs1, shamt } => {
                let value = self.shift(op, self.x(rs1), u32::from(shamt));
                self.set_x(rd, value);
                self.advance(ilen);
            }
            Instr::Op { op, rd, rs1, rs2 } => {
                let (src1, src2) = (self.x(rs1), self.x(rs2));
                let shamt = (src2 & X::SHAMT_MASK) as u32;
                let value = match op {
                    IntOp::Add => src1.wrapping_add(src2),
                    IntOp::Sub => src1.wrapping_sub(src2),
                    IntOp::Sll => self.shift(ShiftOp::Sll, src1, shamt),
                    IntOp::Slt => u64::from(X::signed(src1) < X::signed(src2)),
                    IntOp::Sltu => u64::from(src1 < src2),
                    IntOp::Xor => src1 ^ src2,
                    IntOp::Srl => self.shift(ShiftOp::Srl, src1, shamt),
                    IntOp::Sra => self.shift(ShiftOp::Sra, src1, shamt),
                    IntOp::Or => src1 | src2,
                    IntOp::And => src1 & src2,
                };
                self.set_x(rd, value);
                self.advance(ilen);
            }
            Instr::MulDiv { op, rd, rs1, rs2 } => {
                let value = muldiv::<X>(op, self.x(rs1), self.x(rs2));
                self.set_x(rd, value);
                self.advance(ilen);
            }
            Instr::Addiw { rd, rs1, imm } => {
                let value = (self.x(rs1) as u32).wrapping_add(imm as u32);
                self.set_x(rd, value as i32 as i64 as u64);
                self.advance(ilen);
            }
            Instr::ShiftImmW { op, rd, rs1, shamt } => {
                let value = shift_word(op, self.x(rs1) as u32, u32::from(shamt));
                self.set_x(rd, value as i32 as i64 as u64);
                self.advance(ilen);
            }
            Instr::OpW { op, rd, rs1, rs2 } => {
                let (src1, src2) = (self.x(rs1) as u32, self.x(rs2) as u32);
                let value = match op {
                    WordOp::Addw => src1.wrapping_add(src2),
                    WordOp::Subw => src1.wrapping_sub(src2),
                    WordOp::Sllw => shift_word(ShiftOp::Sll, src1, src2 & 0x1f),
                    WordOp::Srlw => shift_word(ShiftOp::Srl, src1, src2 & 0x1f),
                    WordOp::Sraw => shift_word(ShiftOp::Sra, src1, src2 & 0x1f),
                };
                self.set_x(rd, value as i32 as i64 as u64);
                self.advance(ilen);
            }
            Instr::MulDivW { op, rd, rs1, rs2 } => {
                let value = muldiv_word(op, self.x(rs1) as u32, self.x(rs2) as u32);
                self.set_x(rd, value as i32 as i64 as u64);
                self.advance(ilen);
            }
            // Memory-ordering directives are no-ops for a single hart
            // with sequential semantics
            Instr::Fence { .. } | Instr::FenceI => self.advance(ilen),
            Instr::Ecall => return Err(Exception::EnvironmentCall),
            Instr::Ebreak => return Err(Exception::Breakpoint),
            Instr::Csr { op, rd, rs1, csr } => {
                let src = self.x(rs1);
                self.csr_op(op, rd, src, rs1 != 0, csr, word)?;
                self.advance(ilen);
            }
            Instr::CsrImm { op, rd, zimm, csr } => {
                self.csr_op(op, rd, u64::from(zimm), zimm != 0, csr, word)?;
                self.advance(ilen);
            }
            Instr::LoadReserved { width, rd, rs1, .. } => {
                let addr = X::truncate(self.x(rs1));
                let value = self.amo_read(width, addr)?;
                self.set_x(rd, value);
                self.reservation = Some(addr);
                self.advance(ilen);
            }
            Instr::StoreConditional { width, rd, rs1, rs2, .. } => {
                let addr = X::truncate(self.x(rs1));
                if self.reservation == Some(addr) {
                    self.amo_write(width, addr, self.x(rs2))?;
                    self.set_x(rd, 0);
                } else {
                    self.set_x(rd, 1);
                }
                self.reservation = None;
                self.advance(ilen);
            }
            Instr::Amo { op, width, rd, rs1, rs2, .. } => {
                // Single-hart execution reduces to a plain
                // read-modify-write
                let addr = X::truncate(self.x(rs1));
                let old = self.amo_read(width, addr)?;
                let src = self.x(rs2);
                let new = match width {
                    AmoWidth::W => u64::from(amo_op_word(op, old as u32, src as u32)),
                    AmoWidth::D => amo_op_doubleword(op, old, src),
                };
                self.amo_write(width, addr, new)?;
                self.set_x(rd, old);
                self.advance(ilen);
            }
        }
        Ok(())
    }

    /// Shift on the full machine word. The shift amount has already
    /// been masked to log2(XLEN) bits.
    fn shift(&self, op: ShiftOp, value: u64, shamt: u32) -> u64 {
        match op {
            ShiftOp::Sll => value << shamt,
            ShiftOp::Srl => value >> shamt,
            ShiftOp::Sra => (X::signed(value) >> shamt) as u64,
        }
    }

    fn load(&mut self, width: LoadWidth, rd: u8, rs1: u8, imm: i32) -> Result<(), Exception> {
        let addr = self.effective_address(rs1, imm);
        let size = match width {
            LoadWidth::Lb | LoadWidth::Lbu => Wordsize::Byte,
            LoadWidth::Lh | LoadWidth::Lhu => Wordsize::Halfword,
            LoadWidth::Lw | LoadWidth::Lwu => Wordsize::Word,
            LoadWidth::Ld => Wordsize::Doubleword,
        };
        if self.config.enforce_alignment && addr % size.width() != 0 {
            return Err(Exception::LoadAddressMisaligned { addr });
        }
        let raw = self
            .memory
            .read(addr, size)
            .map_err(|_| Exception::LoadAccessFault { addr })?;
        let value = match width {
            LoadWidth::Lb => sign_extend64(raw, 7) as u64,
            LoadWidth::Lh => sign_extend64(raw, 15) as u64,
            LoadWidth::Lw => sign_extend64(raw, 31) as u64,
            LoadWidth::Lbu | LoadWidth::Lhu | LoadWidth::Lwu | LoadWidth::Ld => raw,
        };
        self.set_x(rd, value);
        Ok(())
    }

    fn store(&mut self, width: StoreWidth, rs1: u8, rs2: u8, imm: i32) -> Result<(), Exception> {
        let addr = self.effective_address(rs1, imm);
        let size = match width {
            StoreWidth::Sb => Wordsize::Byte,
            StoreWidth::Sh => Wordsize::Halfword,
            StoreWidth::Sw => Wordsize::Word,
            StoreWidth::Sd => Wordsize::Doubleword,
        };
        if self.config.enforce_alignment && addr % size.width() != 0 {
            return Err(Exception::StoreAddressMisaligned { addr });
        }
        self.memory
            .write(addr, self.x(rs2), size)
            .map_err(|_| Exception::StoreAccessFault { addr })?;
        self.reservation = None;
        Ok(())
    }

    /// Exchange, set or clear on the CSR bank. Set and clear skip the
    /// write when the source operand names x0 or a zero immediate.
    /// Undefined CSR numbers and writes to read-only counters make
    /// the instruction illegal.
    fn csr_op(
        &mut self,
        op: CsrOp,
        rd: u8,
        src: u64,
        write_side_effect: bool,
        csr: u16,
        word: u32,
    ) -> Result<(), Exception> {
        let illegal = Exception::IllegalInstruction { word };
        let old = self.csrs.read(csr).ok_or(illegal)?;
        let new = match op {
            CsrOp::Rw => Some(src),
            CsrOp::Rs => write_side_effect.then(|| old | src),
            CsrOp::Rc => write_side_effect.then(|| old & !src),
        };
        if let Some(value) = new {
            self.csrs.write(csr, X::truncate(value)).map_err(|_| illegal)?;
        }
        self.set_x(rd, old);
        Ok(())
    }

    fn amo_read(&mut self, width: AmoWidth, addr: u64) -> Result<u64, Exception> {
        let size = match width {
            AmoWidth::W => Wordsize::Word,
            AmoWidth::D => Wordsize::Doubleword,
        };
        if self.config.enforce_alignment && addr % size.width() != 0 {
            return Err(Exception::LoadAddressMisaligned { addr });
        }
        let raw = self
            .memory
            .read(addr, size)
            .map_err(|_| Exception::LoadAccessFault { addr })?;
        Ok(match width {
            AmoWidth::W => sign_extend64(raw, 31) as u64,
            AmoWidth::D => raw,
        })
    }

    fn amo_write(&mut self, width: AmoWidth, addr: u64, value: u64) -> Result<(), Exception> {
        let size = match width {
            AmoWidth::W => Wordsize::Word,
            AmoWidth::D => Wordsize::Doubleword,
        };
        if self.config.enforce_alignment && addr % size.width() != 0 {
            return Err(Exception::StoreAddressMisaligned { addr });
        }
        self.memory
            .write(addr, value, size)
            .map_err(|_| Exception::StoreAccessFault { addr })
    }
}

/// Multiply and divide on the machine word. High products use a
/// 128-bit intermediate; division implements the two architectural
/// special cases.
fn muldiv<X: Xlen>(op: MulDivOp, a: u64, b: u64) -> u64 {
    match op {
        MulDivOp::Mul => a.wrapping_mul(b),
        MulDivOp::Mulh => {
            ((i128::from(X::signed(a)) * i128::from(X::signed(b))) >> X::BITS) as u64
        }
        MulDivOp::Mulhsu => ((i128::from(X::signed(a)) * i128::from(b)) >> X::BITS) as u64,
        MulDivOp::Mulhu => ((u128::from(a) * u128::from(b)) >> X::BITS) as u64,
        MulDivOp::Div => {
            if b == 0 {
                X::UMAX
            } else if a == X::XMIN && X::signed(b) == -1 {
                X::XMIN
            } else {
                (X::signed(a) / X::signed(b)) as u64
            }
        }
        MulDivOp::Divu => {
            if b == 0 {
                X::UMAX
            } else {
                a / b
            }
        }
        MulDivOp::Rem => {
            if b == 0 {
                a
            } else if a == X::XMIN && X::signed(b) == -1 {
                0
            } else {
                (X::signed(a) % X::signed(b)) as u64
            }
        }
        MulDivOp::Remu => {
            if b == 0 {
                a
            } else {
                a % b
            }
        }
    }
}

/// The RV64 32-bit multiply and divide variants; results are
/// sign-extended by the caller
fn muldiv_word(op: MulDivWOp, a: u32, b: u32) -> u32 {
    match op {
        MulDivWOp::Mulw => a.wrapping_mul(b),
        MulDivWOp::Divw => {
            if b == 0 {
                u32::MAX
            } else if a as i32 == i32::MIN && b as i32 == -1 {
                a
            } else {
                (a as i32 / b as i32) as u32
            }
        }
        MulDivWOp::Divuw => {
            if b == 0 {
                u32::MAX
            } else {
                a / b
            }
        }
        MulDivWOp::Remw => {
            if b == 0 {
                a
            } else if a as i32 == i32::MIN && b as i32 == -1 {
                0
            } else {
                (a as i32 % b as i32) as u32
            }
        }
        MulDivWOp::Remuw => {
            if b == 0 {
                a
            } else {
                a % b
            }
        }
    }
}

fn shift_word(op: ShiftOp, value: u32, shamt: u32) -> u32 {
    match op {
        ShiftOp::Sll => value << shamt,
        ShiftOp::Srl => value >> shamt,
        ShiftOp::Sra => ((value as i32) >> shamt) as u32,
    }
}

fn amo_op_word(op: AmoOp, old: u32, src: u32) -> u32 {
    match op {
        AmoOp::Swap => src,
        AmoOp::Add => old.wrapping_add(src),
        AmoOp::Xor => old ^ src,
        AmoOp::And => old & src,
        AmoOp::Or => old | src,
        AmoOp::Min => (old as i32).min(src as i32) as u32,
        AmoOp::Max => (old as i32).max(src as i32) as u32,
        AmoOp::Minu => old.min(src),
        AmoOp::Maxu => old.max(src),
    }
}

fn amo_op_doubleword(op: AmoOp, old: u64, src: u64) -> u64 {
    match op {
        AmoOp::Swap => src,
        AmoOp::Add => old.wrapping_add(src),
        AmoOp::Xor => old ^ src,
        AmoOp::And => old & src,
        AmoOp::Or => old | src,
        AmoOp::Min => (old as i64).min(src as i64) as u64,
        AmoOp::Max => (old as i64).max(src as i64) as u64,
        AmoOp::Minu => old.min(src),
        AmoOp::Maxu => old.max(src),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode::*;
    use crate::hart::memory::Memory;
    use crate::isa::IsaConfig;
    use crate::xlen::{Rv32, Rv64};

    /// Place one instruction at address 0 and execute it
    fn exec32(mem: &mut Memory, word: u32) -> Hart<'_, Rv32> {
        mem.write(0, word.into(), Wordsize::Word).unwrap();
        let mut hart: Hart<Rv32> = Hart::new(mem, IsaConfig::default());
        hart.execute_next().unwrap();
        hart
    }

    fn exec64(mem: &mut Memory, word: u32) -> Hart<'_, Rv64> {
        mem.write(0, word.into(), Wordsize::Word).unwrap();
        let mut hart: Hart<Rv64> = Hart::new(mem, IsaConfig::default());
        hart.execute_next().unwrap();
        hart
    }

    /// Run a single R-type operation with the given source values and
    /// return the destination register
    fn binop32(word: u32, src1: u64, src2: u64) -> u64 {
        let mut mem = Memory::new(64);
        mem.write(0, word.into(), Wordsize::Word).unwrap();
        let mut hart: Hart<Rv32> = Hart::new(&mut mem, IsaConfig::default());
        hart.registers_mut().write(2, src1);
        hart.registers_mut().write(3, src2);
        hart.execute_next().unwrap();
        hart.registers().read(1)
    }

    fn binop64(word: u32, src1: u64, src2: u64) -> u64 {
        let mut mem = Memory::new(64);
        mem.write(0, word.into(), Wordsize::Word).unwrap();
        let mut hart: Hart<Rv64> = Hart::new(&mut mem, IsaConfig::default());
        hart.registers_mut().write(2, src1);
        hart.registers_mut().write(3, src2);
        hart.execute_next().unwrap();
        hart.registers().read(1)
    }

    #[test]
    fn check_lui() {
        let mut mem = Memory::new(64);
        let hart = exec32(&mut mem, lui(2, 53));
        assert_eq!(hart.registers().read(2), 53 << 12);
        assert_eq!(hart.pc(), 4);
    }

    #[test]
    fn check_lui_sign_extends_on_rv64() {
        let mut mem = Memory::new(64);
        let hart = exec64(&mut mem, lui(2, -1));
        assert_eq!(hart.registers().read(2), 0xffff_ffff_ffff_f000);
    }

    #[test]
    fn check_auipc() {
        let mut mem = Memory::new(64);
        mem.write(8, auipc(4, 53).into(), Wordsize::Word).unwrap();
        let mut hart: Hart<Rv32> = Hart::new(&mut mem, IsaConfig::default());
        hart.set_pc(8);
        hart.execute_next().unwrap();
        assert_eq!(hart.registers().read(4), 8 + (53 << 12));
        assert_eq!(hart.pc(), 12);
    }

    #[test]
    fn check_jal() {
        let mut mem = Memory::new(64);
        mem.write(8, jal(4, -4).into(), Wordsize::Word).unwrap();
        let mut hart: Hart<Rv32> = Hart::new(&mut mem, IsaConfig::default());
        hart.set_pc(8);
        hart.execute_next().unwrap();
        assert_eq!(hart.registers().read(4), 12);
        assert_eq!(hart.pc(), 4);
    }

    #[test]
    fn check_jal_with_rd_x0_changes_only_pc() {
        // After jal x0, +8 at pc = 0x100: pc = 0x108, registers
        // untouched
        let mut mem = Memory::new(0x200);
        mem.write(0x100, jal(0, 8).into(), Wordsize::Word).unwrap();
        let mut hart: Hart<Rv32> = Hart::new(&mut mem, IsaConfig::default());
        hart.set_pc(0x100);
        hart.execute_next().unwrap();
        assert_eq!(hart.pc(), 0x108);
        for n in 0..32 {
            assert_eq!(hart.registers().read(n), 0);
        }
    }

    #[test]
    fn check_jalr_link_precedes_target_when_rd_is_rs1() {
        // jalr x1, x1, 4 at pc = 0x100 with x1 = 0x200: the target
        // uses the old x1, the link observes pc + 4
        let mut mem = Memory::new(0x300);
        mem.write(0x100, jalr(1, 1, 4).into(), Wordsize::Word).unwrap();
        let mut hart: Hart<Rv32> = Hart::new(&mut mem, IsaConfig::default());
        hart.set_pc(0x100);
        hart.registers_mut().write(1, 0x200);
        hart.execute_next().unwrap();
        assert_eq!(hart.registers().read(1), 0x104);
        assert_eq!(hart.pc(), 0x204);
    }

    #[test]
    fn check_jalr_clears_low_bit() {
        let mut mem = Memory::new(64);
        mem.write(0, jalr(4, 6, 1).into(), Wordsize::Word).unwrap();
        let mut hart: Hart<Rv32> = Hart::new(&mut mem, IsaConfig::default());
        hart.registers_mut().write(6, 16);
        hart.execute_next().unwrap();
        assert_eq!(hart.pc(), 16);
    }

    #[test]
    fn check_misaligned_jump_faults_without_moving_pc() {
        let mut mem = Memory::new(64);
        let mut config = IsaConfig::default();
        config.ext_c = false; // IALIGN = 32
        mem.write(0, jal(1, 6).into(), Wordsize::Word).unwrap();
        let mut hart: Hart<Rv32> = Hart::new(&mut mem, config);
        assert_eq!(
            hart.execute_next(),
            Err(Exception::InstructionAddressMisaligned { target: 6 })
        );
        assert_eq!(hart.pc(), 0);
        // The link register was not written either
        assert_eq!(hart.registers().read(1), 0);
    }

    #[test]
    fn check_two_byte_jump_target_legal_with_compressed() {
        let mut mem = Memory::new(64);
        mem.write(0, jal(1, 6).into(), Wordsize::Word).unwrap();
        let mut hart: Hart<Rv32> = Hart::new(&mut mem, IsaConfig::default());
        hart.execute_next().unwrap();
        assert_eq!(hart.pc(), 6);
    }

    #[test]
    fn check_branches_taken_and_not_taken() {
        // (word, src1, src2, taken)
        let cases = [
            (beq(2, 3, 16), 2, 2, true),
            (beq(2, 3, 16), 1, 2, false),
            (bne(2, 3, 16), 1, 2, true),
            (bne(2, 3, 16), 2, 2, false),
            (blt(2, 3, 16), 0xffff_ffff, 10, true),
            (blt(2, 3, 16), 10, 0xffff_ffff, false),
            (bge(2, 3, 16), 10, 0xffff_ffff, true),
            (bge(2, 3, 16), 0xffff_ffff, 10, false),
            (bltu(2, 3, 16), 1, 10, true),
            (bltu(2, 3, 16), 10, 1, false),
            (bgeu(2, 3, 16), 10, 1, true),
            (bgeu(2, 3, 16), 1, 10, false),
        ];
        for (word, src1, src2, taken) in cases {
            let mut mem = Memory::new(64);
            mem.write(0, word.into(), Wordsize::Word).unwrap();
            let mut hart: Hart<Rv32> = Hart::new(&mut mem, IsaConfig::default());
            hart.registers_mut().write(2, src1);
            hart.registers_mut().write(3, src2);
            hart.execute_next().unwrap();
            let expected = if taken { 16 } else { 4 };
            assert_eq!(hart.pc(), expected, "word {word:08x} src1={src1} src2={src2}");
        }
    }

    #[test]
    fn check_loads_extend_correctly() {
        let mut mem = Memory::new(64);
        mem.write(20, 0xff, Wordsize::Byte).unwrap();
        mem.write(30, 0xff92, Wordsize::Halfword).unwrap();
        mem.write(40, 0x1234_ff92, Wordsize::Word).unwrap();
        let cases = [
            (lb(1, 2, 16), 4u64, 0xffff_ffff),
            (lbu(1, 2, 16), 4, 0x0000_00ff),
            (lh(1, 2, 26), 4, 0xffff_ff92),
            (lhu(1, 2, 26), 4, 0x0000_ff92),
            (lw(1, 2, 36), 4, 0x1234_ff92),
        ];
        for (word, base, expected) in cases {
            mem.write(0, word.into(), Wordsize::Word).unwrap();
            let mut hart: Hart<Rv32> = Hart::new(&mut mem, IsaConfig::default());
            hart.registers_mut().write(2, base);
            hart.execute_next().unwrap();
            assert_eq!(hart.registers().read(1), expected, "word {word:08x}");
            assert_eq!(hart.pc(), 4);
        }
    }

    #[test]
    fn check_rv64_loads() {
        let mut mem = Memory::new(64);
        mem.write(16, 0xfedc_ba98_7654_3210, Wordsize::Doubleword).unwrap();
        mem.write(0, ld(1, 0, 16).into(), Wordsize::Word).unwrap();
        let mut hart: Hart<Rv64> = Hart::new(&mut mem, IsaConfig::default());
        hart.execute_next().unwrap();
        assert_eq!(hart.registers().read(1), 0xfedc_ba98_7654_3210);

        // lw sign-extends on RV64, lwu does not
        mem.write(0, lw(1, 0, 20).into(), Wordsize::Word).unwrap();
        let mut hart: Hart<Rv64> = Hart::new(&mut mem, IsaConfig::default());
        hart.execute_next().unwrap();
        assert_eq!(hart.registers().read(1), 0xffff_ffff_fedc_ba98);
        mem.write(0, lwu(1, 0, 20).into(), Wordsize::Word).unwrap();
        let mut hart: Hart<Rv64> = Hart::new(&mut mem, IsaConfig::default());
        hart.execute_next().unwrap();
        assert_eq!(hart.registers().read(1), 0xfedc_ba98);
    }

    #[test]
    fn check_stores_write_only_their_bytes() {
        let mut mem = Memory::new(64);
        mem.write(0, sb(1, 2, 16).into(), Wordsize::Word).unwrap();
        mem.write(20, 0xffff_ffff, Wordsize::Word).unwrap();
        let mut hart: Hart<Rv32> = Hart::new(&mut mem, IsaConfig::default());
        hart.registers_mut().write(1, 0xfe);
        hart.registers_mut().write(2, 4);
        hart.execute_next().unwrap();
        drop(hart);
        // Only the addressed byte changed; neighbours kept their value
        assert_eq!(mem.read(20, Wordsize::Word).unwrap(), 0xffff_fffe);

        let mut mem = Memory::new(64);
        mem.write(0, sw(1, 2, -15).into(), Wordsize::Word).unwrap();
        let mut hart: Hart<Rv32> = Hart::new(&mut mem, IsaConfig::default());
        hart.registers_mut().write(1, 0xabcd_ef12);
        hart.registers_mut().write(2, 20);
        hart.execute_next().unwrap();
        drop(hart);
        assert_eq!(mem.read(5, Wordsize::Word).unwrap(), 0xabcd_ef12);
    }

    #[test]
    fn check_load_store_faults() {
        let mut mem = Memory::new(16);
        mem.write(0, lw(1, 0, 14).into(), Wordsize::Word).unwrap();
        let mut hart: Hart<Rv32> = Hart::new(&mut mem, IsaConfig::default());
        assert_eq!(hart.execute_next(), Err(Exception::LoadAccessFault { addr: 14 }));

        let mut mem = Memory::new(16);
        mem.write(0, sw(1, 0, 14).into(), Wordsize::Word).unwrap();
        let mut hart: Hart<Rv32> = Hart::new(&mut mem, IsaConfig::default());
        assert_eq!(hart.execute_next(), Err(Exception::StoreAccessFault { addr: 14 }));
    }

    #[test]
    fn check_alignment_enforcement_is_optional() {
        let mut config = IsaConfig::default();
        config.enforce_alignment = true;
        let mut mem = Memory::new(32);
        mem.write(0, lw(1, 0, 13).into(), Wordsize::Word).unwrap();
        let mut hart: Hart<Rv32> = Hart::new(&mut mem, config);
        assert_eq!(hart.execute_next(), Err(Exception::LoadAddressMisaligned { addr: 13 }));
        // Without enforcement the same access succeeds
        let mut hart: Hart<Rv32> = Hart::new(&mut mem, IsaConfig::default());
        hart.execute_next().unwrap();
    }

    #[test]
    fn check_addi() {
        let mut mem = Memory::new(64);
        mem.write(0, addi(1, 2, -23).into(), Wordsize::Word).unwrap();
        let mut hart: Hart<Rv32> = Hart::new(&mut mem, IsaConfig::default());
        hart.registers_mut().write(2, 22);
        hart.execute_next().unwrap();
        assert_eq!(hart.registers().read(1), 0xffff_ffff);
    }

    #[test]
    fn check_slti_and_sltiu() {
        let mut mem = Memory::new(64);
        mem.write(0, slti(1, 2, -5).into(), Wordsize::Word).unwrap();
        let mut hart: Hart<Rv32> = Hart::new(&mut mem, IsaConfig::default());
        hart.registers_mut().write(2, (-24i32) as u32 as u64);
        hart.execute_next().unwrap();
        assert_eq!(hart.registers().read(1), 1);

        // sltiu compares the sign-extended immediate as unsigned
        let mut mem = Memory::new(64);
        mem.write(0, sltiu(1, 2, -1).into(), Wordsize::Word).unwrap();
        let mut hart: Hart<Rv32> = Hart::new(&mut mem, IsaConfig::default());
        hart.registers_mut().write(2, 124);
        hart.execute_next().unwrap();
        assert_eq!(hart.registers().read(1), 1);
    }

    #[test]
    fn check_logic_immediates_sign_extend() {
        let mut mem = Memory::new(64);
        mem.write(0, andi(1, 2, 0xff0u32 as i32 - 0x1000).into(), Wordsize::Word).unwrap();
        let mut hart: Hart<Rv32> = Hart::new(&mut mem, IsaConfig::default());
        hart.registers_mut().write(2, 0x00ff_ff00);
        hart.execute_next().unwrap();
        assert_eq!(hart.registers().read(1), 0x00ff_ff00);
    }

    #[test]
    fn check_shift_immediates() {
        assert_eq!(binop32(slli(1, 2, 2), 0b1101, 0), 0b110100);
        assert_eq!(binop32(srli(1, 2, 4), 0xf000_0f00, 0), 0x0f00_00f0);
        assert_eq!(binop32(srai(1, 2, 4), 0xf000_0f00, 0), 0xff00_00f0);
        assert_eq!(binop64(srai(1, 2, 4), 0xf000_0f00, 0), 0x0f00_00f0);
    }

    #[test]
    fn check_register_ops() {
        assert_eq!(binop32(add(1, 2, 3), 0xffff_fffe, 5), 3);
        assert_eq!(binop32(sub(1, 2, 3), 20, 22), 0xffff_fffe);
        assert_eq!(binop32(slt(1, 2, 3), (-24i32) as u32 as u64, 5), 1);
        assert_eq!(binop32(sltu(1, 2, 3), 22, 124), 1);
        assert_eq!(binop32(and(1, 2, 3), 0x00ff_ff00, 0x0f0f_f0f0), 0x000f_f000);
        assert_eq!(binop32(or(1, 2, 3), 0x00ff_ff00, 0x0f0f_f0f0), 0x0fff_fff0);
        assert_eq!(binop32(xor(1, 2, 3), 0x00ff_ff00, 0x0f0f_f0f0), 0x0ff0_0ff0);
        assert_eq!(binop32(sll(1, 2, 3), 0b1101, 2), 0b110100);
        assert_eq!(binop32(srl(1, 2, 3), 0xf000_0f00, 4), 0x0f00_00f0);
        assert_eq!(binop32(sra(1, 2, 3), 0xf000_0f00, 4), 0xff00_00f0);
    }

    #[test]
    fn check_shift_amount_masking() {
        // At XLEN=32, a shift amount of 32 wraps to zero
        assert_eq!(binop32(sll(1, 2, 3), 1, 32), 1);
        assert_eq!(binop32(srl(1, 2, 3), 0x8000_0000, 32), 0x8000_0000);
        // At XLEN=64 the mask is six bits, so 64 wraps and 32 does not
        assert_eq!(binop64(sll(1, 2, 3), 1, 64), 1);
        assert_eq!(binop64(sll(1, 2, 3), 1, 32), 0x1_0000_0000);
    }

    #[test]
    fn check_writes_to_x0_are_discarded() {
        let mut mem = Memory::new(64);
        mem.write(0, addi(0, 0, 123).into(), Wordsize::Word).unwrap();
        let mut hart: Hart<Rv32> = Hart::new(&mut mem, IsaConfig::default());
        hart.execute_next().unwrap();
        assert_eq!(hart.registers().read(0), 0);
    }

    #[test]
    fn check_mul_and_high_products() {
        assert_eq!(binop32(mul(1, 2, 3), 7, 6), 42);
        // Low product of large operands wraps
        assert_eq!(binop32(mul(1, 2, 3), 0x8000_0000, 2), 0);
        // (-1) * (-1): high signed product is 0
        assert_eq!(binop32(mulh(1, 2, 3), 0xffff_ffff, 0xffff_ffff), 0);
        // (-1) * 2^31 as signed * unsigned
        assert_eq!(binop32(mulhsu(1, 2, 3), 0xffff_ffff, 0x8000_0000), 0xffff_ffff);
        // Unsigned high product of 2^31 * 2^31 = 2^62 -> high word 2^30
        assert_eq!(binop32(mulhu(1, 2, 3), 0x8000_0000, 0x8000_0000), 0x4000_0000);
        // 64-bit high product
        assert_eq!(binop64(mulh(1, 2, 3), u64::MAX, u64::MAX), 0);
        assert_eq!(binop64(mulhu(1, 2, 3), 1 << 63, 2), 1);
    }

    #[test]
    fn check_division_by_zero() {
        assert_eq!(binop32(div(1, 2, 3), 7, 0), 0xffff_ffff);
        assert_eq!(binop32(divu(1, 2, 3), 7, 0), 0xffff_ffff);
        assert_eq!(binop32(rem(1, 2, 3), 7, 0), 7);
        assert_eq!(binop32(remu(1, 2, 3), 7, 0), 7);
        assert_eq!(binop64(div(1, 2, 3), 7, 0), u64::MAX);
        assert_eq!(binop64(remu(1, 2, 3), 7, 0), 7);
    }

    #[test]
    fn check_division_signed_overflow() {
        assert_eq!(binop32(div(1, 2, 3), 0x8000_0000, 0xffff_ffff), 0x8000_0000);
        assert_eq!(binop32(rem(1, 2, 3), 0x8000_0000, 0xffff_ffff), 0);
        assert_eq!(binop64(div(1, 2, 3), 1 << 63, u64::MAX), 1 << 63);
        assert_eq!(binop64(rem(1, 2, 3), 1 << 63, u64::MAX), 0);
    }

    #[test]
    fn check_ordinary_division() {
        assert_eq!(binop32(div(1, 2, 3), (-7i32) as u32 as u64, 2), (-3i32) as u32 as u64);
        assert_eq!(binop32(rem(1, 2, 3), (-7i32) as u32 as u64, 2), (-1i32) as u32 as u64);
        assert_eq!(binop32(divu(1, 2, 3), 7, 2), 3);
        assert_eq!(binop32(remu(1, 2, 3), 7, 2), 1);
    }

    #[test]
    fn check_word_ops_sign_extend() {
        // addw wraps in 32 bits and sign-extends the result
        assert_eq!(binop64(addw(1, 2, 3), 0x7fff_ffff, 1), 0xffff_ffff_8000_0000);
        assert_eq!(binop64(subw(1, 2, 3), 0, 1), u64::MAX);
        // sllw ignores the upper half of the source value
        assert_eq!(binop64(sllw(1, 2, 3), 0x1_0000_0001, 4), 0x10);
        assert_eq!(binop64(sraw(1, 2, 3), 0x8000_0000, 4), 0xffff_ffff_f800_0000);
        assert_eq!(binop64(srlw(1, 2, 3), 0x8000_0000, 4), 0x0800_0000);
        // addiw
        let mut mem = Memory::new(64);
        mem.write(0, addiw(1, 2, 1).into(), Wordsize::Word).unwrap();
        let mut hart: Hart<Rv64> = Hart::new(&mut mem, IsaConfig::default());
        hart.registers_mut().write(2, 0xffff_ffff);
        hart.execute_next().unwrap();
        assert_eq!(hart.registers().read(1), 0);
    }

    #[test]
    fn check_word_division() {
        assert_eq!(binop64(divw(1, 2, 3), 7, 0), u64::MAX);
        assert_eq!(binop64(remw(1, 2, 3), 7, 0), 7);
        assert_eq!(binop64(divw(1, 2, 3), 0x8000_0000, 0xffff_ffff), 0xffff_ffff_8000_0000);
        assert_eq!(binop64(mulw(1, 2, 3), 0x8000_0000, 2), 0);
    }

    #[test]
    fn check_fence_advances_pc() {
        let mut mem = Memory::new(64);
        let hart = exec32(&mut mem, fence(0b1111, 0b1111));
        assert_eq!(hart.pc(), 4);
        let mut mem = Memory::new(64);
        let hart = exec32(&mut mem, fence_i());
        assert_eq!(hart.pc(), 4);
    }

    #[test]
    fn check_environment_instructions_do_not_advance_pc() {
        let mut mem = Memory::new(64);
        mem.write(0, ecall().into(), Wordsize::Word).unwrap();
        let mut hart: Hart<Rv32> = Hart::new(&mut mem, IsaConfig::default());
        assert_eq!(hart.execute_next(), Err(Exception::EnvironmentCall));
        assert_eq!(hart.pc(), 0);

        let mut mem = Memory::new(64);
        mem.write(0, ebreak().into(), Wordsize::Word).unwrap();
        let mut hart: Hart<Rv32> = Hart::new(&mut mem, IsaConfig::default());
        assert_eq!(hart.execute_next(), Err(Exception::Breakpoint));
        assert_eq!(hart.pc(), 0);
    }

    #[test]
    fn check_csr_exchange_set_clear() {
        use crate::hart::csr::CSR_SSCRATCH;
        let mut mem = Memory::new(64);
        mem.write(0, csrrw(1, CSR_SSCRATCH, 2).into(), Wordsize::Word).unwrap();
        mem.write(4, csrrs(3, CSR_SSCRATCH, 4).into(), Wordsize::Word).unwrap();
        mem.write(8, csrrc(5, CSR_SSCRATCH, 6).into(), Wordsize::Word).unwrap();
        mem.write(12, csrrsi(7, CSR_SSCRATCH, 0).into(), Wordsize::Word).unwrap();
        let mut hart: Hart<Rv32> = Hart::new(&mut mem, IsaConfig::default());
        hart.registers_mut().write(2, 0b1100);
        hart.registers_mut().write(4, 0b0011);
        hart.registers_mut().write(6, 0b1000);
        hart.execute_next().unwrap();
        assert_eq!(hart.registers().read(1), 0);
        hart.execute_next().unwrap();
        assert_eq!(hart.registers().read(3), 0b1100);
        hart.execute_next().unwrap();
        assert_eq!(hart.registers().read(5), 0b1111);
        // A set with a zero immediate reads without writing
        hart.execute_next().unwrap();
        assert_eq!(hart.registers().read(7), 0b0111);
    }

    #[test]
    fn check_undefined_csr_is_illegal() {
        let word = csrrw(1, 0x7c0, 2);
        let mut mem = Memory::new(64);
        mem.write(0, word.into(), Wordsize::Word).unwrap();
        let mut hart: Hart<Rv32> = Hart::new(&mut mem, IsaConfig::default());
        assert_eq!(hart.execute_next(), Err(Exception::IllegalInstruction { word }));
    }

    #[test]
    fn check_lr_sc_reservation() {
        let mut mem = Memory::new(64);
        mem.write(32, 7, Wordsize::Word).unwrap();
        mem.write(0, lr_w(1, 2, false, false).into(), Wordsize::Word).unwrap();
        mem.write(4, sc_w(3, 4, 2, false, false).into(), Wordsize::Word).unwrap();
        mem.write(8, sc_w(5, 4, 2, false, false).into(), Wordsize::Word).unwrap();
        let mut hart: Hart<Rv32> = Hart::new(&mut mem, IsaConfig::default());
        hart.registers_mut().write(2, 32);
        hart.registers_mut().write(4, 99);
        hart.execute_next().unwrap();
        assert_eq!(hart.registers().read(1), 7);
        // First sc succeeds on the matching reservation
        hart.execute_next().unwrap();
        assert_eq!(hart.registers().read(3), 0);
        // Second sc fails: the reservation was consumed
        hart.execute_next().unwrap();
        assert_eq!(hart.registers().read(5), 1);
        assert_eq!(hart.memory().read(32, Wordsize::Word).unwrap(), 99);
    }

    #[test]
    fn check_store_invalidates_reservation() {
        let mut mem = Memory::new(64);
        mem.write(0, lr_w(1, 2, false, false).into(), Wordsize::Word).unwrap();
        mem.write(4, sw(4, 2, 0).into(), Wordsize::Word).unwrap();
        mem.write(8, sc_w(5, 4, 2, false, false).into(), Wordsize::Word).unwrap();
        let mut hart: Hart<Rv32> = Hart::new(&mut mem, IsaConfig::default());
        hart.registers_mut().write(2, 32);
        hart.execute_next().unwrap();
        hart.execute_next().unwrap();
        hart.execute_next().unwrap();
        assert_eq!(hart.registers().read(5), 1);
    }

    #[test]
    fn check_amo_read_modify_write() {
        let mut mem = Memory::new(64);
        mem.write(32, 10, Wordsize::Word).unwrap();
        mem.write(0, amoadd_w(1, 3, 2, false, false).into(), Wordsize::Word).unwrap();
        let mut hart: Hart<Rv32> = Hart::new(&mut mem, IsaConfig::default());
        hart.registers_mut().write(2, 32);
        hart.registers_mut().write(3, 5);
        hart.execute_next().unwrap();
        // rd observes the old value, memory the sum
        assert_eq!(hart.registers().read(1), 10);
        assert_eq!(hart.memory().read(32, Wordsize::Word).unwrap(), 15);
    }

    #[test]
    fn check_amo_sign_extends_word_on_rv64() {
        let mut mem = Memory::new(64);
        mem.write(32, 0x8000_0000, Wordsize::Word).unwrap();
        mem.write(0, amoswap_w(1, 3, 2, false, false).into(), Wordsize::Word).unwrap();
        let mut hart: Hart<Rv64> = Hart::new(&mut mem, IsaConfig::default());
        hart.registers_mut().write(2, 32);
        hart.registers_mut().write(3, 1);
        hart.execute_next().unwrap();
        assert_eq!(hart.registers().read(1), 0xffff_ffff_8000_0000);
        assert_eq!(hart.memory().read(32, Wordsize::Word).unwrap(), 1);
    }
}
