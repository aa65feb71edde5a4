//! Types and API for Regex matching
//!
//! This module defines the [`Regex`] struct, which wraps a validated
//! [`Program`] and picks, for every call, the [`PikeVM`] instance matching the
//! code unit width of the subject.

use tracing::debug;

use crate::thompson::bytecode::{Program, ProgramError};
use crate::thompson::pike_vm::{ExecError, ExecStats, Host, NoInterrupts, PikeVM};
use crate::util::{Captures, Input, Match, Span, Subject};

/// Number of code units consumed between two interrupt checks, by default.
pub const DEFAULT_INTERRUPT_CHECK_INTERVAL: usize = 64;

/// A compiled regular expression, ready for matching.
#[derive(Debug, Clone)]
pub struct Regex {
    program: Program,
    register_count: usize,
    config: Config,
}

impl Regex {
    /// Builds a regex from a program with the default configuration, and as
    /// many registers as the program writes.
    pub fn new(program: Program) -> Result<Self, ProgramError> {
        Builder::new(program).build()
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    pub fn register_count(&self) -> usize {
        self.register_count
    }

    /// Number of capture groups, including the implicit group 0.
    pub fn capture_count(&self) -> usize {
        self.register_count / 2
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Finds all matches from `input.start` on, and writes their concatenated
    /// registers to `output`, which receives at most
    /// `output.len() / register_count` matches. Returns the number of matches
    /// written.
    pub fn exec<'s, H: Host + ?Sized>(
        &self,
        input: impl Into<Input<'s>>,
        host: &mut H,
        output: &mut [Option<usize>],
    ) -> Result<usize, ExecError> {
        let mut imp = self.engine(input.into());
        let count = imp.find_matches(host, output)?;
        debug!(matches = count, stats = ?imp.stats(), "exec done");
        Ok(count)
    }

    /// Returns true whenever the program matches somewhere in the input.
    pub fn is_match<'s>(&self, input: impl Into<Input<'s>>) -> Result<bool, ExecError> {
        Ok(self.find(input)?.is_some())
    }

    /// Returns the bounds of the first match, or None.
    pub fn find<'s>(&self, input: impl Into<Input<'s>>) -> Result<Option<Match>, ExecError> {
        let mut imp = self.engine(input.into());
        Ok(imp.next_match(&mut NoInterrupts)?.and_then(registers_to_match))
    }

    /// Returns an iterator over all non-overlapping matches in the input.
    pub fn find_all<'r, 's>(&'r self, input: impl Into<Input<'s>>) -> AllMatch<'r, 's> {
        AllMatch {
            imp: self.engine(input.into()),
        }
    }

    /// Returns the first match with all its capture group bounds, or None.
    pub fn find_captures<'s>(
        &self,
        input: impl Into<Input<'s>>,
    ) -> Result<Option<Captures>, ExecError> {
        let mut imp = self.engine(input.into());
        Ok(imp.next_match(&mut NoInterrupts)?.map(Captures::from_registers))
    }

    /// Returns an iterator over all non-overlapping matches in the input,
    /// with their capture group bounds.
    pub fn find_all_captures<'r, 's>(&'r self, input: impl Into<Input<'s>>) -> AllCaptures<'r, 's> {
        AllCaptures {
            imp: self.engine(input.into()),
        }
    }

    fn engine<'r, 's>(&'r self, input: Input<'s>) -> EngineWithState<'r, 's> {
        let Input { subject, start } = input;
        match subject {
            Subject::OneByte(units) => EngineWithState::OneByte(PikeVM::with_checked_registers(
                &self.program,
                self.register_count,
                units,
                start,
                self.config.clone(),
            )),
            Subject::TwoByte(units) => EngineWithState::TwoByte(PikeVM::with_checked_registers(
                &self.program,
                self.register_count,
                units,
                start,
                self.config.clone(),
            )),
        }
    }
}

fn registers_to_match(registers: &[Option<usize>]) -> Option<Match> {
    Span::from_registers(registers[0], registers[1]).map(Match::new)
}

#[derive(Debug, Clone)]
pub struct Config {
    /// The host is polled each time the input index reaches a multiple of
    /// this value. Zero disables polling.
    pub interrupt_check_interval: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            interrupt_check_interval: DEFAULT_INTERRUPT_CHECK_INTERVAL,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Builder {
    program: Program,
    register_count: Option<usize>,
    config: Config,
}

impl Builder {
    pub fn new(program: Program) -> Self {
        Self {
            program,
            register_count: None,
            config: Config::default(),
        }
    }

    /// Registers per match. Defaults to the smallest count covering every
    /// register the program writes.
    pub fn register_count(mut self, value: usize) -> Self {
        self.register_count = Some(value);
        self
    }

    pub fn interrupt_check_interval(mut self, value: usize) -> Self {
        self.config.interrupt_check_interval = value;
        self
    }

    pub fn build(self) -> Result<Regex, ProgramError> {
        let register_count = self
            .register_count
            .unwrap_or_else(|| self.program.min_register_count());
        self.program.check_registers(register_count)?;
        debug!(
            instructions = self.program.len(),
            lookbehinds = self.program.lookbehind_count(),
            register_count,
            "built regex"
        );
        Ok(Regex {
            program: self.program,
            register_count,
            config: self.config,
        })
    }
}

/// Iterator over all match in a regex.
pub struct AllMatch<'r, 's> {
    imp: EngineWithState<'r, 's>,
}

impl AllMatch<'_, '_> {
    pub fn stats(&self) -> ExecStats {
        self.imp.stats()
    }
}

impl Iterator for AllMatch<'_, '_> {
    type Item = Result<Match, ExecError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.imp.next_match(&mut NoInterrupts) {
            Ok(registers) => registers.and_then(registers_to_match).map(Ok),
            Err(err) => Some(Err(err)),
        }
    }
}

/// Iterator over all match and their capture groups.
pub struct AllCaptures<'r, 's> {
    imp: EngineWithState<'r, 's>,
}

impl Iterator for AllCaptures<'_, '_> {
    type Item = Result<Captures, ExecError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.imp.next_match(&mut NoInterrupts) {
            Ok(registers) => registers.map(|r| Ok(Captures::from_registers(r))),
            Err(err) => Some(Err(err)),
        }
    }
}

/// A [`PikeVM`] instantiated for the code unit width of the subject.
pub(crate) enum EngineWithState<'r, 's> {
    OneByte(PikeVM<'r, 's, u8>),
    TwoByte(PikeVM<'r, 's, u16>),
}

impl EngineWithState<'_, '_> {
    fn next_match<H: Host + ?Sized>(
        &mut self,
        host: &mut H,
    ) -> Result<Option<&[Option<usize>]>, ExecError> {
        match self {
            EngineWithState::OneByte(vm) => vm.next_match(host),
            EngineWithState::TwoByte(vm) => vm.next_match(host),
        }
    }

    fn find_matches<H: Host + ?Sized>(
        &mut self,
        host: &mut H,
        output: &mut [Option<usize>],
    ) -> Result<usize, ExecError> {
        match self {
            EngineWithState::OneByte(vm) => vm.find_matches(host, output),
            EngineWithState::TwoByte(vm) => vm.find_matches(host, output),
        }
    }

    fn stats(&self) -> ExecStats {
        match self {
            EngineWithState::OneByte(vm) => vm.stats(),
            EngineWithState::TwoByte(vm) => vm.stats(),
        }
    }
}
