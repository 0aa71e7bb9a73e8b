//! RISC-V hardware thread
//!
//! The execution context emulated by this crate: a register file, a
//! program counter, a CSR bank and an exclusive borrow of a memory
//! region. A [`Hart`] runs a flat user-mode image with sequential
//! semantics; every fetch, decode and execute step completes before
//! the next begins, and side effects become visible at step
//! boundaries.
//!
//! The loop per step:
//!
//! 1. fetch the half-word at pc (instruction access fault if it is
//!    outside memory)
//! 2. if its low two bits are 11, fetch the next half-word and
//!    concatenate into a 32-bit word; otherwise the half-word is a
//!    compressed instruction
//! 3. decode; an unclassifiable word sets the cause and ends the run
//! 4. execute; environment calls and breakpoints dispatch to the host
//!    service, every other fault is fatal in this user-mode core
//!
//! pc advancement is owned by the executing instruction, except after
//! a host dispatch where the loop steps past the environment
//! instruction itself.

use std::marker::PhantomData;

use crate::hart::csr::CsrFile;
use crate::hart::memory::{Memory, Wordsize};
use crate::hart::registers::Registers;
use crate::host::{HostAction, HostService};
use crate::instr::decode::{decode, decode_compressed};
use crate::isa::IsaConfig;
use crate::trap::{AccessKind, Exception, Exit};
use crate::xlen::Xlen;

pub mod csr;
mod exec;
pub mod memory;
pub mod registers;

/// Privilege tag of the hart. This core interprets user-mode programs
/// only; the tag is informational.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum PrivilegeLevel {
    #[default]
    User,
    Supervisor,
    Machine,
}

pub struct Hart<'m, X: Xlen> {
    pc: u64,
    registers: Registers,
    csrs: CsrFile,
    memory: &'m mut Memory,
    config: IsaConfig,
    privilege: PrivilegeLevel,
    /// Cause slot: the last fault this hart observed
    cause: Option<Exception>,
    /// LR/SC reservation, cleared by any store
    reservation: Option<u64>,
    /// Byte length of the last fetched instruction
    ilen: u64,
    _xlen: PhantomData<X>,
}

impl<'m, X: Xlen> Hart<'m, X> {
    /// A hart over a loaded memory image, starting at pc = 0
    pub fn new(memory: &'m mut Memory, config: IsaConfig) -> Self {
        Self {
            pc: 0,
            registers: Registers::new(),
            csrs: CsrFile::new(),
            memory,
            config,
            privilege: PrivilegeLevel::User,
            cause: None,
            reservation: None,
            ilen: 4,
            _xlen: PhantomData,
        }
    }

    pub fn pc(&self) -> u64 {
        self.pc
    }

    pub fn set_pc(&mut self, pc: u64) {
        self.pc = X::truncate(pc);
    }

    pub fn registers(&self) -> &Registers {
        &self.registers
    }

    pub fn registers_mut(&mut self) -> &mut Registers {
        &mut self.registers
    }

    pub fn memory(&self) -> &Memory {
        self.memory
    }

    pub fn config(&self) -> &IsaConfig {
        &self.config
    }

    pub fn privilege(&self) -> PrivilegeLevel {
        self.privilege
    }

    /// The last fault this hart observed, if any
    pub fn cause(&self) -> Option<Exception> {
        self.cause
    }

    /// Fetch, decode and execute the instruction at pc. Faults,
    /// including environment calls, are returned undispatched.
    pub(crate) fn execute_next(&mut self) -> Result<(), Exception> {
        let half = self
            .memory
            .read(self.pc, Wordsize::Halfword)
            .map_err(|_| Exception::InstructionAccessFault { addr: self.pc })?;
        let (word, ilen, instr) = if half & 0b11 == 0b11 {
            let upper_addr = self.pc.wrapping_add(2);
            let upper = self
                .memory
                .read(upper_addr, Wordsize::Halfword)
                .map_err(|_| Exception::InstructionAccessFault { addr: upper_addr })?;
            let word = (upper as u32) << 16 | half as u32;
            let instr = decode::<X>(word, &self.config)
                .map_err(|_| Exception::IllegalInstruction { word })?;
            (word, 4, instr)
        } else {
            let word = half as u32;
            let instr = decode_compressed::<X>(half as u16, &self.config)
                .map_err(|_| Exception::IllegalInstruction { word })?;
            (word, 2, instr)
        };
        self.ilen = ilen;
        log::trace!("pc=0x{:x}: {}", self.pc, instr);
        self.execute(instr, word, ilen)?;
        self.csrs.retire();
        Ok(())
    }

    /// One step of the hart loop: execute the instruction at pc and
    /// dispatch environment faults to the host service. Returns the
    /// exit report once the hart has terminated.
    pub fn step(&mut self, host: &mut dyn HostService) -> Option<Exit> {
        let pc = self.pc;
        let ex = match self.execute_next() {
            Ok(()) => return None,
            Err(ex) => ex,
        };
        self.cause = Some(ex);
        if self.config.zicsr {
            self.csrs.record_trap(ex.cause(), pc, ex.trap_value());
        }
        match ex {
            Exception::EnvironmentCall => {
                match host.syscall(&mut self.registers, self.memory, pc) {
                    HostAction::Continue => {
                        self.step_past_environment_instr(pc);
                        None
                    }
                    HostAction::Exit(status) => Some(Exit::Halted { status }),
                }
            }
            Exception::Breakpoint => {
                match host.breakpoint(&mut self.registers, self.memory, pc) {
                    HostAction::Continue => {
                        self.step_past_environment_instr(pc);
                        None
                    }
                    HostAction::Exit(status) => Some(Exit::Halted { status }),
                }
            }
            ex => {
                log::warn!("fatal fault at pc=0x{pc:x}: {ex}");
                Some(classify(pc, ex))
            }
        }
    }

    /// Run until the host requests an exit or a fault terminates the
    /// hart
    pub fn run(&mut self, host: &mut dyn HostService) -> Exit {
        loop {
            if let Some(exit) = self.step(host) {
                return exit;
            }
        }
    }

    /// After a host Continue, move pc past the ECALL or EBREAK (which
    /// did not advance it). Compressed EBREAK steps by two bytes.
    fn step_past_environment_instr(&mut self, pc: u64) {
        self.pc = X::truncate(pc.wrapping_add(self.ilen));
    }
}

/// Map a fatal fault onto the exit taxonomy
fn classify(pc: u64, ex: Exception) -> Exit {
    match ex {
        Exception::IllegalInstruction { word } => Exit::IllegalInstruction { pc, word },
        Exception::InstructionAccessFault { addr } | Exception::InstructionPageFault { addr } => {
            Exit::AccessFault { kind: AccessKind::Instruction, pc, addr }
        }
        Exception::LoadAccessFault { addr } | Exception::LoadPageFault { addr } => {
            Exit::AccessFault { kind: AccessKind::Load, pc, addr }
        }
        Exception::StoreAccessFault { addr } | Exception::StoreAmoPageFault { addr } => {
            Exit::AccessFault { kind: AccessKind::Store, pc, addr }
        }
        Exception::InstructionAddressMisaligned { target } => {
            Exit::Misaligned { kind: AccessKind::Instruction, pc, addr: target }
        }
        Exception::LoadAddressMisaligned { addr } => {
            Exit::Misaligned { kind: AccessKind::Load, pc, addr }
        }
        Exception::StoreAddressMisaligned { addr } => {
            Exit::Misaligned { kind: AccessKind::Store, pc, addr }
        }
        Exception::EnvironmentCall | Exception::Breakpoint => {
            unreachable!("environment faults are dispatched to the host service")
        }
    }
}
