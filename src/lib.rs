//! Interpreter core for the unprivileged RV32/RV64 integer ISA
//!
//! The crate emulates a single hart running a flat, user-mode memory
//! image to completion or fault:
//!
//! * [`instr`]: the decoder and the tagged decoded representation,
//!   covering the integer base (I or the embedded E), and the M, A, C,
//!   Zicsr and Zifencei extensions as enabled by [`isa::IsaConfig`]
//! * [`hart`]: the register file, memory, CSR bank and the
//!   fetch/decode/execute loop with its fault taxonomy
//! * [`host`]: the service that gives meaning to ECALL and EBREAK
//! * [`encode`]: instruction constructors for tests and tooling
//! * [`elf_utils`]: loading an ELF image into hart memory

#![forbid(unsafe_code)]

pub mod encode;
pub mod elf_utils;
pub mod hart;
pub mod host;
pub mod instr;
pub mod isa;
pub mod trap;
pub mod utils;
pub mod xlen;
