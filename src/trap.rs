//! Fault taxonomy and the hart exit protocol
//!
//! Exception cause numbering follows the RISC-V privileged
//! specification; the page-fault variants exist for cause-code
//! completeness but are never raised by this core (there is no paging
//! collaborator).

use thiserror::Error;

/// A fault raised while fetching, decoding or executing one
/// instruction. Environment calls and breakpoints travel through the
/// same channel so that the hart loop is the single place that decides
/// between dispatching to the host service and terminating.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum Exception {
    #[error("instruction address misaligned (target 0x{target:x})")]
    InstructionAddressMisaligned { target: u64 },
    #[error("instruction access fault at 0x{addr:x}")]
    InstructionAccessFault { addr: u64 },
    #[error("illegal instruction 0x{word:08x}")]
    IllegalInstruction { word: u32 },
    #[error("breakpoint")]
    Breakpoint,
    #[error("load address misaligned at 0x{addr:x}")]
    LoadAddressMisaligned { addr: u64 },
    #[error("load access fault at 0x{addr:x}")]
    LoadAccessFault { addr: u64 },
    #[error("store address misaligned at 0x{addr:x}")]
    StoreAddressMisaligned { addr: u64 },
    #[error("store access fault at 0x{addr:x}")]
    StoreAccessFault { addr: u64 },
    #[error("environment call")]
    EnvironmentCall,
    #[error("instruction page fault at 0x{addr:x}")]
    InstructionPageFault { addr: u64 },
    #[error("load page fault at 0x{addr:x}")]
    LoadPageFault { addr: u64 },
    #[error("store page fault at 0x{addr:x}")]
    StoreAmoPageFault { addr: u64 },
}

impl Exception {
    /// The architectural exception code, as written to the cause CSR
    pub fn cause(&self) -> u64 {
        match self {
            Self::InstructionAddressMisaligned { .. } => 0,
            Self::InstructionAccessFault { .. } => 1,
            Self::IllegalInstruction { .. } => 2,
            Self::Breakpoint => 3,
            Self::LoadAddressMisaligned { .. } => 4,
            Self::LoadAccessFault { .. } => 5,
            Self::StoreAddressMisaligned { .. } => 6,
            Self::StoreAccessFault { .. } => 7,
            Self::EnvironmentCall => 8,
            Self::InstructionPageFault { .. } => 12,
            Self::LoadPageFault { .. } => 13,
            Self::StoreAmoPageFault { .. } => 15,
        }
    }

    /// The faulting address carried by the exception, if it has one.
    /// Written to the trap-value CSR.
    pub fn trap_value(&self) -> u64 {
        match self {
            Self::InstructionAddressMisaligned { target } => *target,
            Self::InstructionAccessFault { addr }
            | Self::LoadAddressMisaligned { addr }
            | Self::LoadAccessFault { addr }
            | Self::StoreAddressMisaligned { addr }
            | Self::StoreAccessFault { addr }
            | Self::InstructionPageFault { addr }
            | Self::LoadPageFault { addr }
            | Self::StoreAmoPageFault { addr } => *addr,
            Self::IllegalInstruction { word } => u64::from(*word),
            Self::Breakpoint | Self::EnvironmentCall => 0,
        }
    }
}

/// Which kind of access a fault classified under
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessKind {
    Instruction,
    Load,
    Store,
}

impl std::fmt::Display for AccessKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Instruction => write!(f, "instruction"),
            Self::Load => write!(f, "load"),
            Self::Store => write!(f, "store"),
        }
    }
}

/// How a hart run ended. `Display` produces the one-line diagnostic
/// the runner prints on termination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
    /// The host service requested termination
    Halted { status: u64 },
    /// Decoding failed; pc and the raw word are kept for diagnostics
    IllegalInstruction { pc: u64, word: u32 },
    /// A fetch, load or store left the memory range
    AccessFault { kind: AccessKind, pc: u64, addr: u64 },
    /// A misaligned jump target or (when enforced) data access
    Misaligned { kind: AccessKind, pc: u64, addr: u64 },
}

impl Exit {
    /// True when the hart stopped because the host asked it to
    pub fn is_halt(&self) -> bool {
        matches!(self, Self::Halted { .. })
    }
}

impl std::fmt::Display for Exit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Halted { status } => write!(f, "halted with status {status}"),
            Self::IllegalInstruction { pc, word } => {
                write!(f, "illegal instruction at 0x{pc:x}: 0x{word:08x}")
            }
            Self::AccessFault { kind, pc, addr } => {
                write!(f, "{kind} access fault at 0x{pc:x} (address 0x{addr:x})")
            }
            Self::Misaligned { kind, pc, addr } => {
                write!(f, "{kind} address misaligned at 0x{pc:x} (address 0x{addr:x})")
            }
        }
    }
}
