//! A non-backtracking regular expression engine.
//!
//! The engine runs a bytecode program, produced by an external compiler, over
//! Latin-1 or UTF-16 code units, and reports every non-overlapping match with
//! its capture group bounds. Matching takes time linear in the size of the
//! program times the length of the input.

pub mod regex;
pub mod thompson;
pub mod util;

pub use regex::{Builder, Config, Regex};
pub use thompson::bytecode::{AssertionKind, Instruction, Program, ProgramError};
pub use thompson::pike_vm::{ExecError, ExecStats, Host, Interrupt, NoInterrupts, PikeVM};
pub use util::{Captures, CodeUnit, Input, Match, Span, Subject};
