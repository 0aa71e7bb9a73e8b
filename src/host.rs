//! Host service interface
//!
//! Environment calls and breakpoints are not given semantics by the
//! core; the hart loop hands them to a [`HostService`] together with a
//! read/write view of the architectural state. The service may change
//! registers and memory, then either lets the hart continue (the loop
//! advances pc past the instruction) or requests an exit. The service
//! never moves pc itself.

use queues::{IsQueue, Queue};

use crate::hart::memory::Memory;
use crate::hart::registers::{abi, Registers};
use crate::xlen::Xlen;

/// What the hart loop should do after a host dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostAction {
    /// Resume execution after the environment instruction
    Continue,
    /// Terminate the hart with a status code
    Exit(u64),
}

pub trait HostService {
    /// Handle an ECALL raised at pc
    fn syscall(&mut self, regs: &mut Registers, mem: &mut Memory, pc: u64) -> HostAction;

    /// Handle an EBREAK raised at pc
    fn breakpoint(&mut self, regs: &mut Registers, mem: &mut Memory, pc: u64) -> HostAction;
}

/// The console environment used by the test programs:
///
/// * a0 = 1: print a1 as a signed decimal
/// * a0 = 11: print a1 as a character
/// * a0 = 10: exit, appending `\n[exit]\n` to the transcript
///
/// Anything else is a fatal diagnostic. Output is buffered in a
/// character queue; the runner drains it with [`ConsoleHost::flush_output`].
pub struct ConsoleHost<X: Xlen> {
    output: Queue<char>,
    _xlen: std::marker::PhantomData<X>,
}

impl<X: Xlen> Default for ConsoleHost<X> {
    fn default() -> Self {
        Self::new()
    }
}

impl<X: Xlen> ConsoleHost<X> {
    pub fn new() -> Self {
        Self { output: Queue::new(), _xlen: std::marker::PhantomData }
    }

    fn push_str(&mut self, s: &str) {
        for ch in s.chars() {
            self.output.add(ch).expect("unbounded queue insert should work");
        }
    }

    /// Drain and return the buffered output
    pub fn flush_output(&mut self) -> String {
        let mut out = String::new();
        while let Ok(ch) = self.output.remove() {
            out.push(ch);
        }
        out
    }
}

impl<X: Xlen> HostService for ConsoleHost<X> {
    fn syscall(&mut self, regs: &mut Registers, _mem: &mut Memory, pc: u64) -> HostAction {
        match regs.read(abi::A0) {
            1 => {
                let value = X::signed(regs.read(abi::A1));
                self.push_str(&value.to_string());
                HostAction::Continue
            }
            11 => {
                let ch = regs.read(abi::A1) as u8 as char;
                self.push_str(&ch.to_string());
                HostAction::Continue
            }
            10 => {
                self.push_str("\n[exit]\n");
                HostAction::Exit(0)
            }
            n => {
                log::error!("invalid environment call number {n} at pc=0x{pc:x}");
                HostAction::Exit(1)
            }
        }
    }

    fn breakpoint(&mut self, _regs: &mut Registers, _mem: &mut Memory, pc: u64) -> HostAction {
        log::warn!("breakpoint at pc=0x{pc:x}");
        HostAction::Continue
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xlen::Rv32;

    #[test]
    fn check_print_decimal() {
        let mut host = ConsoleHost::<Rv32>::new();
        let mut regs = Registers::new();
        let mut mem = Memory::new(16);
        regs.write(abi::A0, 1);
        regs.write(abi::A1, 5040);
        assert_eq!(host.syscall(&mut regs, &mut mem, 0), HostAction::Continue);
        regs.write(abi::A1, 0xffff_ffff);
        assert_eq!(host.syscall(&mut regs, &mut mem, 4), HostAction::Continue);
        assert_eq!(host.flush_output(), "5040-1");
    }

    #[test]
    fn check_print_character_and_exit() {
        let mut host = ConsoleHost::<Rv32>::new();
        let mut regs = Registers::new();
        let mut mem = Memory::new(16);
        regs.write(abi::A0, 11);
        regs.write(abi::A1, u64::from(b'x'));
        assert_eq!(host.syscall(&mut regs, &mut mem, 0), HostAction::Continue);
        regs.write(abi::A0, 10);
        assert_eq!(host.syscall(&mut regs, &mut mem, 4), HostAction::Exit(0));
        assert_eq!(host.flush_output(), "x\n[exit]\n");
    }

    #[test]
    fn check_unknown_call_number_is_fatal() {
        let mut host = ConsoleHost::<Rv32>::new();
        let mut regs = Registers::new();
        let mut mem = Memory::new(16);
        regs.write(abi::A0, 93);
        assert_eq!(host.syscall(&mut regs, &mut mem, 0), HostAction::Exit(1));
    }
}
