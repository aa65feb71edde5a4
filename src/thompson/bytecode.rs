//! A Thompson NFA represented in a bytecode format.
//!
//! This module contains the definition of [`Instruction`], the bytecode
//! executed by [`crate::thompson::pike_vm::PikeVM`], and of [`Program`], a
//! validated sequence of instructions. Programs are produced by an external
//! compiler and may come from an untrusted source, so every jump target and
//! lookbehind index is checked when the program is built.
//!
//! Layout conventions expected from the compiler:
//! - the main expression starts at pc 0 and ends with [`Instruction::Accept`];
//! - each lookbehind sub-program follows, one after the other, each ending
//!   with [`Instruction::WriteLookbehind`];
//! - registers 0 and 1 receive the bounds of the overall match.
use std::fmt;

use thiserror::Error;

/// Zero-width predicates on the current input position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssertionKind {
    StartOfInput,
    EndOfInput,
    StartOfLine,
    EndOfLine,
    Boundary,
    NonBoundary,
}

/// Bytecode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Instruction {
    /// Consume one code unit in the inclusive range `min..=max`.
    ConsumeRange(u16, u16),
    Assertion(AssertionKind),
    /// Continue at the next instruction, and spawn a lower priority thread
    /// at the target.
    Fork(usize),
    Jmp(usize),
    Accept,
    SetRegisterToPos(usize),
    ClearRegister(usize),
    BeginLoop,
    /// Kills the thread if nothing was consumed since the last `BeginLoop`.
    EndLoop,
    WriteLookbehind(usize),
    /// Continue only if the lookbehind at this index did (or did not, when
    /// the flag is false) match at the current position.
    ReadLookbehind(usize, bool),
}

use Instruction::*;

impl Instruction {
    /// Matches any code unit.
    pub const CONSUME_ANY: Instruction = ConsumeRange(0, u16::MAX);

    pub fn consume(unit: u16) -> Self {
        ConsumeRange(unit, unit)
    }

    /// Returns the register written by this instruction, if any.
    pub fn register(&self) -> Option<usize> {
        match self {
            SetRegisterToPos(r) | ClearRegister(r) => Some(*r),
            _ => None,
        }
    }
}

/// Error raised when building a [`Program`] from raw instructions, or
/// when a program is paired with too few registers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProgramError {
    #[error("program is empty")]
    Empty,
    #[error("instruction {pc} jumps to {target}, which is out of bounds")]
    JumpOutOfBounds { pc: usize, target: usize },
    #[error("instruction {pc} uses lookbehind {index}, but the program only has {table_len}")]
    LookbehindOutOfBounds {
        pc: usize,
        index: usize,
        table_len: usize,
    },
    #[error("instruction {pc} writes register {register}, but only {register_count} are available")]
    RegisterOutOfBounds {
        pc: usize,
        register: usize,
        register_count: usize,
    },
    #[error("at least 2 registers per match are required, got {0}")]
    TooFewRegisters(usize),
    #[error("instruction {pc} consumes an empty range {min:#x}..={max:#x}")]
    InvalidRange { pc: usize, min: u16, max: u16 },
    #[error("last instruction {pc} continues past the end of the program")]
    FallsOffEnd { pc: usize },
}

/// An immutable, validated bytecode program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Program {
    instructions: Box<[Instruction]>,
    lookbehind_pcs: Box<[usize]>,
}

impl Program {
    /// Validates the instructions and locates the lookbehind sub-programs.
    pub fn new(instructions: impl Into<Box<[Instruction]>>) -> Result<Self, ProgramError> {
        let instructions = instructions.into();
        if instructions.is_empty() {
            return Err(ProgramError::Empty);
        }
        let lookbehind_pcs = Self::find_lookbehinds(&instructions);
        let len = instructions.len();
        for (pc, instruction) in instructions.iter().enumerate() {
            match *instruction {
                Fork(target) | Jmp(target) if target >= len => {
                    return Err(ProgramError::JumpOutOfBounds { pc, target });
                }
                WriteLookbehind(index) | ReadLookbehind(index, _)
                    if index >= lookbehind_pcs.len() =>
                {
                    return Err(ProgramError::LookbehindOutOfBounds {
                        pc,
                        index,
                        table_len: lookbehind_pcs.len(),
                    });
                }
                ConsumeRange(min, max) if min > max => {
                    return Err(ProgramError::InvalidRange { pc, min, max });
                }
                _ => (),
            }
        }
        // Every other instruction may continue at pc + 1.
        let last = len - 1;
        if !matches!(instructions[last], Jmp(_) | Accept | WriteLookbehind(_)) {
            return Err(ProgramError::FallsOffEnd { pc: last });
        }
        Ok(Self {
            instructions,
            lookbehind_pcs,
        })
    }

    /// Lookbehind sub-programs are laid out one after the other, after the
    /// main expression. Each one therefore starts right after an `Accept` or
    /// a `WriteLookbehind`, except after the last instruction.
    fn find_lookbehinds(instructions: &[Instruction]) -> Box<[usize]> {
        instructions[..instructions.len() - 1]
            .iter()
            .enumerate()
            .filter(|(_, inst)| matches!(inst, Accept | WriteLookbehind(_)))
            .map(|(pc, _)| pc + 1)
            .collect()
    }

    /// Checks that every register index fits in `register_count`.
    pub fn check_registers(&self, register_count: usize) -> Result<(), ProgramError> {
        if register_count < 2 {
            return Err(ProgramError::TooFewRegisters(register_count));
        }
        for (pc, instruction) in self.instructions.iter().enumerate() {
            if let Some(register) = instruction.register() {
                if register >= register_count {
                    return Err(ProgramError::RegisterOutOfBounds {
                        pc,
                        register,
                        register_count,
                    });
                }
            }
        }
        Ok(())
    }

    /// Smallest register count accepted by [`Program::check_registers`].
    pub fn min_register_count(&self) -> usize {
        self.instructions
            .iter()
            .filter_map(Instruction::register)
            .map(|r| r + 1)
            .max()
            .unwrap_or(0)
            .max(2)
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// Entry pc of every lookbehind, in bytecode order.
    pub fn lookbehind_pcs(&self) -> &[usize] {
        &self.lookbehind_pcs
    }

    pub fn lookbehind_count(&self) -> usize {
        self.lookbehind_pcs.len()
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }
}

impl fmt::Display for AssertionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AssertionKind::StartOfInput => "START_OF_INPUT",
            AssertionKind::EndOfInput => "END_OF_INPUT",
            AssertionKind::StartOfLine => "START_OF_LINE",
            AssertionKind::EndOfLine => "END_OF_LINE",
            AssertionKind::Boundary => "BOUNDARY",
            AssertionKind::NonBoundary => "NON_BOUNDARY",
        };
        f.write_str(name)
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConsumeRange(min, max) if min == max => write!(f, "CONSUME {min:#06x}"),
            ConsumeRange(min, max) => write!(f, "CONSUME_RANGE [{min:#06x}, {max:#06x}]"),
            Assertion(kind) => write!(f, "ASSERTION {kind}"),
            Fork(target) => write!(f, "FORK {target:02}"),
            Jmp(target) => write!(f, "JMP {target:02}"),
            Accept => write!(f, "ACCEPT"),
            SetRegisterToPos(r) => write!(f, "SET_REGISTER_TO_CP {r}"),
            ClearRegister(r) => write!(f, "CLEAR_REGISTER {r}"),
            BeginLoop => write!(f, "BEGIN_LOOP"),
            EndLoop => write!(f, "END_LOOP"),
            WriteLookbehind(i) => write!(f, "WRITE_LOOKBEHIND_TABLE {i}"),
            ReadLookbehind(i, true) => write!(f, "READ_LOOKBEHIND_TABLE {i}"),
            ReadLookbehind(i, false) => write!(f, "READ_NEGATIVE_LOOKBEHIND_TABLE {i}"),
        }
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (pc, instruction) in self.instructions.iter().enumerate() {
            writeln!(f, "{pc:02}: {instruction}")?;
        }
        Ok(())
    }
}
