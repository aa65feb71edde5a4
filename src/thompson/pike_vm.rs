//! An interpreter for [`crate::thompson::bytecode`].
//!
//! The interpreter executes a bytecode program breadth-first, without
//! backtracking: all threads share a common input index, and the input is
//! fed to them one code unit at a time. Running time is therefore linear in
//! the size of the program times the length of the input.
//!
//! To follow the semantics of a backtracking engine we must be careful about
//! when to stop once a thread executes `Accept`. Consider `abc|..|[a-c]{10,}`
//! on `"abcccccccccccccc"`: the thread for `..` accepts after two code units,
//! while the thread for `abc` (which has a higher priority) is still blocked
//! waiting for the third one. We may discard every thread of lower priority
//! than the accepting one, but threads of higher priority must be run to
//! completion, and their match (if any) replaces the current one.
//!
//! Threads are therefore kept in priority order: `active` holds the threads
//! that can run without further input, from low to high priority, and is
//! used as a stack; `blocked` holds the threads waiting on a `ConsumeRange`,
//! from high to low priority.

use thiserror::Error;
use tracing::{debug, trace, warn};

use crate::{
    regex::Config,
    thompson::{
        bytecode::{AssertionKind, Instruction::*, Program, ProgramError},
        registers::{RegisterArena, Registers},
    },
    util::CodeUnit,
};

/// Result of servicing the interrupts of the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt {
    /// Nothing happened, or the interrupts were handled and matching may go on.
    Continue,
    /// The host wants the engine to yield.
    Yield,
    /// The input changed its code unit width while interrupts were handled.
    RepresentationChanged,
    /// The host ran out of stack while handling interrupts.
    StackOverflow,
    /// Servicing the interrupts raised an exception on the host side.
    Exception,
}

impl Interrupt {
    fn into_result(self) -> Result<(), ExecError> {
        match self {
            Interrupt::Continue => Ok(()),
            Interrupt::Yield | Interrupt::RepresentationChanged => Err(ExecError::Retry),
            Interrupt::StackOverflow => Err(ExecError::StackOverflow),
            Interrupt::Exception => Err(ExecError::Exception),
        }
    }
}

/// The host runtime, polled periodically during long scans.
pub trait Host {
    fn handle_interrupts(&mut self) -> Interrupt;
}

impl<F: FnMut() -> Interrupt> Host for F {
    fn handle_interrupts(&mut self) -> Interrupt {
        self()
    }
}

/// A host that never interrupts.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoInterrupts;

impl Host for NoInterrupts {
    fn handle_interrupts(&mut self) -> Interrupt {
        Interrupt::Continue
    }
}

/// Reasons for a call to abort before completion.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecError {
    #[error("stack overflow while handling interrupts")]
    StackOverflow,
    #[error("exception raised while handling interrupts")]
    Exception,
    /// Transient, the caller should run the call again.
    #[error("matching was interrupted and must be retried")]
    Retry,
    #[error("accepting thread reported invalid match bounds {begin:?}..{end:?}")]
    MalformedMatch {
        begin: Option<usize>,
        end: Option<usize>,
    },
}

impl ExecError {
    pub fn is_retry(&self) -> bool {
        matches!(self, ExecError::Retry)
    }
}

/// Whether a thread consumed a code unit since it last entered a quantifier
/// iteration. Iterations matching the empty string are not allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConsumedCharacter {
    DidConsume,
    DidNotConsume,
}

/// A thread currently alive in the bytecode. Not to be confused with an
/// OS thread.
#[derive(Debug)]
struct Thread {
    pc: usize,
    registers: Registers,
    consumed_since_last_quantifier: ConsumedCharacter,
}

/// Input index at which a pc was last executed, for both values of
/// `consumed_since_last_quantifier`.
#[derive(Debug, Clone, Copy, Default)]
struct LastInputIndex {
    having_consumed: Option<usize>,
    not_having_consumed: Option<usize>,
}

impl LastInputIndex {
    fn get_mut(&mut self, consumed: ConsumedCharacter) -> &mut Option<usize> {
        match consumed {
            ConsumedCharacter::DidConsume => &mut self.having_consumed,
            ConsumedCharacter::DidNotConsume => &mut self.not_having_consumed,
        }
    }
}

/// Counters collected while matching.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ExecStats {
    /// Instructions executed, over all scans.
    pub steps: u64,
    /// Largest number of instructions executed at a single input position
    /// of a single scan. Never exceeds twice the program length.
    pub max_steps_per_position: usize,
    /// Number of scans started, i.e. calls to `find_next_match`.
    pub scans: usize,
}

/// A so-called PikeVM.
///
/// Borrows the program and the input for its whole lifetime, and finds the
/// non-overlapping matches of the program in the input one after the other.
pub struct PikeVM<'p, 's, C: CodeUnit> {
    program: &'p Program,
    input: &'s [C],
    input_index: usize,
    config: Config,
    register_count: usize,
    /// `pc_last_input_index[pc]` is used to discard a thread reaching a
    /// `(pc, consumed)` pair already run at the current input index. Since
    /// threads with higher priority run first, the discarded one can only
    /// produce worse matches.
    pc_last_input_index: Box<[LastInputIndex]>,
    active: Vec<Thread>,
    blocked: Vec<Thread>,
    arena: RegisterArena,
    /// Registers of the accepting thread with the highest priority in the
    /// current scan.
    best_match: Option<Registers>,
    /// `lookbehind_table[i]` is set when lookbehind `i` completed a match at
    /// the current input index.
    lookbehind_table: Box<[bool]>,
    done: bool,
    stats: ExecStats,
    steps_at_position: usize,
}

impl<'p, 's, C: CodeUnit> PikeVM<'p, 's, C> {
    /// Prepares a search of `program` in `input`, starting at code unit
    /// `start`. Fails if the program writes registers past `register_count`.
    pub fn new(
        program: &'p Program,
        register_count: usize,
        input: &'s [C],
        start: usize,
        config: Config,
    ) -> Result<Self, ProgramError> {
        program.check_registers(register_count)?;
        Ok(Self::with_checked_registers(
            program,
            register_count,
            input,
            start,
            config,
        ))
    }

    /// Same as [`PikeVM::new`], for a register count already validated with
    /// [`Program::check_registers`].
    pub(crate) fn with_checked_registers(
        program: &'p Program,
        register_count: usize,
        input: &'s [C],
        start: usize,
        config: Config,
    ) -> Self {
        Self {
            program,
            input,
            input_index: start.min(input.len()),
            config,
            register_count,
            pc_last_input_index: vec![LastInputIndex::default(); program.len()]
                .into_boxed_slice(),
            active: Vec::new(),
            blocked: Vec::new(),
            arena: RegisterArena::new(register_count),
            best_match: None,
            lookbehind_table: vec![false; program.lookbehind_count()].into_boxed_slice(),
            done: start > input.len(),
            stats: ExecStats::default(),
            steps_at_position: 0,
        }
    }

    pub fn register_count(&self) -> usize {
        self.register_count
    }

    /// Index at which the next scan will start.
    pub fn input_index(&self) -> usize {
        self.input_index
    }

    pub fn stats(&self) -> ExecStats {
        self.stats
    }

    /// Finds matches and writes their concatenated registers to `output`,
    /// until all remaining matches have been found or there is no space
    /// left for one more. Returns the number of matches written. Nothing is
    /// written past the registers of the last match.
    pub fn find_matches<H: Host + ?Sized>(
        &mut self,
        host: &mut H,
        output: &mut [Option<usize>],
    ) -> Result<usize, ExecError> {
        let mut count = 0;
        for slot in output.chunks_exact_mut(self.register_count) {
            match self.next_match(host)? {
                Some(registers) => slot.copy_from_slice(registers),
                None => break,
            }
            count += 1;
        }
        debug!(
            matches = count,
            steps = self.stats.steps,
            scans = self.stats.scans,
            "find_matches done"
        );
        Ok(count)
    }

    /// Finds the next match and returns its registers, then moves the input
    /// index past it. An empty match advances the index by one code unit, so
    /// that it is not reported forever.
    pub fn next_match<H: Host + ?Sized>(
        &mut self,
        host: &mut H,
    ) -> Result<Option<&[Option<usize>]>, ExecError> {
        if self.done {
            return Ok(None);
        }
        if let Err(err) = self.find_next_match(host) {
            warn!(input_index = self.input_index, %err, "aborting search");
            self.release_threads();
            self.done = true;
            return Err(err);
        }

        let (begin, end) = match &self.best_match {
            Some(registers) => (registers[0], registers[1]),
            None => {
                self.done = true;
                return Ok(None);
            }
        };
        let (begin, end) = match (begin, end) {
            (Some(begin), Some(end)) if begin <= end && end <= self.input.len() => (begin, end),
            _ => {
                self.release_threads();
                self.done = true;
                return Err(ExecError::MalformedMatch { begin, end });
            }
        };

        if end > begin {
            self.input_index = end;
        } else if end == self.input.len() {
            // Empty match with the input exhausted.
            self.input_index = end;
            self.done = true;
        } else {
            self.input_index = end + 1;
        }
        Ok(self.best_match.as_deref())
    }

    /// Runs one scan from the current input index, leaving the registers of
    /// the best match (if any) in `best_match`.
    fn find_next_match<H: Host + ?Sized>(&mut self, host: &mut H) -> Result<(), ExecError> {
        self.pc_last_input_index.fill(LastInputIndex::default());
        self.lookbehind_table.fill(false);
        // Clean up left-overs from the previous scan.
        self.release_threads();
        self.stats.scans += 1;
        self.steps_at_position = 0;
        trace!(input_index = self.input_index, "starting scan");

        // Lookbehind threads must run before the threads reading their
        // result. The main expression at pc 0 gets the lowest priority, and
        // lookbehinds run from last to first.
        let program = self.program;
        let main = self.new_thread(0);
        self.active.push(main);
        for &pc in program.lookbehind_pcs() {
            let thread = self.new_thread(pc);
            self.active.push(thread);
        }
        self.run_active_threads();

        // Stop once the input is exhausted, or once there is a match and no
        // thread of higher priority is left. Lower priority threads were
        // killed on accept, so the latter means that `blocked` is empty.
        while self.input_index != self.input.len()
            && !(self.best_match.is_some() && self.blocked.is_empty())
        {
            debug_assert!(self.active.is_empty());
            let input_char = self.input[self.input_index];
            self.input_index += 1;
            self.steps_at_position = 0;
            self.lookbehind_table.fill(false);

            let interval = self.config.interrupt_check_interval;
            if interval != 0 && self.input_index % interval == 0 {
                host.handle_interrupts().into_result()?;
            }

            self.flush_blocked_threads(input_char);
            self.run_active_threads();
        }
        Ok(())
    }

    /// Run each active thread until it can't continue without further input.
    /// `active` is empty afterwards.
    fn run_active_threads(&mut self) {
        while let Some(thread) = self.active.pop() {
            self.run_active_thread(thread);
        }
    }

    /// Run a thread until it blocks on a `ConsumeRange`, dies, accepts, or
    /// reaches a pc already processed at this input index.
    fn run_active_thread(&mut self, mut thread: Thread) {
        let program = self.program;
        let bytecode = program.instructions();
        loop {
            assert!(
                thread.pc < bytecode.len(),
                "pc {} out of bounds of a program of length {}",
                thread.pc,
                bytecode.len()
            );
            if !self.mark_pc_processed(thread.pc, thread.consumed_since_last_quantifier) {
                self.destroy_thread(thread);
                return;
            }
            self.count_step();

            match bytecode[thread.pc] {
                ConsumeRange(..) => {
                    self.blocked.push(thread);
                    return;
                }
                Assertion(kind) => {
                    if !satisfies_assertion(kind, self.input, self.input_index) {
                        self.destroy_thread(thread);
                        return;
                    }
                    thread.pc += 1;
                }
                Fork(target) => {
                    let registers = self.arena.duplicate(&thread.registers);
                    self.active.push(Thread {
                        pc: target,
                        registers,
                        consumed_since_last_quantifier: thread.consumed_since_last_quantifier,
                    });
                    thread.pc += 1;
                }
                Jmp(target) => {
                    thread.pc = target;
                }
                Accept => {
                    trace!(input_index = self.input_index, "accept");
                    if let Some(previous) = self.best_match.replace(thread.registers) {
                        self.arena.free(previous);
                    }
                    for discarded in self.active.drain(..) {
                        self.arena.free(discarded.registers);
                    }
                    return;
                }
                SetRegisterToPos(r) => {
                    write_register(&mut thread.registers, r, Some(self.input_index));
                    thread.pc += 1;
                }
                ClearRegister(r) => {
                    write_register(&mut thread.registers, r, None);
                    thread.pc += 1;
                }
                BeginLoop => {
                    thread.consumed_since_last_quantifier = ConsumedCharacter::DidNotConsume;
                    thread.pc += 1;
                }
                EndLoop => {
                    if thread.consumed_since_last_quantifier == ConsumedCharacter::DidNotConsume {
                        self.destroy_thread(thread);
                        return;
                    }
                    thread.pc += 1;
                }
                WriteLookbehind(index) => {
                    // The lookbehind matched at this position. Its thread is
                    // only a signal, not a match.
                    *self.lookbehind_slot(index) = true;
                    self.destroy_thread(thread);
                    return;
                }
                ReadLookbehind(index, positive) => {
                    if *self.lookbehind_slot(index) != positive {
                        self.destroy_thread(thread);
                        return;
                    }
                    thread.pc += 1;
                }
            }
        }
    }

    /// Feeds `input_char` to every blocked thread. `input_index` must already
    /// point after `input_char`. Blocked threads go from high to low
    /// priority, and popping them restores the low to high order of `active`.
    fn flush_blocked_threads(&mut self, input_char: C) {
        let unit = input_char.to_u16();
        let program = self.program;
        let bytecode = program.instructions();
        while let Some(mut thread) = self.blocked.pop() {
            match bytecode[thread.pc] {
                ConsumeRange(min, max) if min <= unit && unit <= max => {
                    thread.pc += 1;
                    thread.consumed_since_last_quantifier = ConsumedCharacter::DidConsume;
                    self.active.push(thread);
                }
                _ => self.destroy_thread(thread),
            }
        }
    }

    fn new_thread(&mut self, pc: usize) -> Thread {
        Thread {
            pc,
            registers: self.arena.allocate(None),
            consumed_since_last_quantifier: ConsumedCharacter::DidConsume,
        }
    }

    fn destroy_thread(&mut self, thread: Thread) {
        self.arena.free(thread.registers);
    }

    /// Frees every thread, and the best match.
    fn release_threads(&mut self) {
        for thread in self.active.drain(..).chain(self.blocked.drain(..)) {
            self.arena.free(thread.registers);
        }
        if let Some(registers) = self.best_match.take() {
            self.arena.free(registers);
        }
    }

    /// Marks `(pc, consumed)` as processed at the current input index.
    /// Returns false if it already was.
    fn mark_pc_processed(&mut self, pc: usize, consumed: ConsumedCharacter) -> bool {
        let last = self.pc_last_input_index[pc].get_mut(consumed);
        if *last == Some(self.input_index) {
            return false;
        }
        debug_assert!(last.is_none_or(|last| last < self.input_index));
        *last = Some(self.input_index);
        true
    }

    fn lookbehind_slot(&mut self, index: usize) -> &mut bool {
        let len = self.lookbehind_table.len();
        assert!(index < len, "lookbehind {index} out of bounds of a table of length {len}");
        &mut self.lookbehind_table[index]
    }

    fn count_step(&mut self) {
        self.stats.steps += 1;
        self.steps_at_position += 1;
        self.stats.max_steps_per_position =
            self.stats.max_steps_per_position.max(self.steps_at_position);
    }
}

fn write_register(registers: &mut [Option<usize>], index: usize, value: Option<usize>) {
    let len = registers.len();
    assert!(index < len, "register {index} out of bounds of {len} registers");
    registers[index] = value;
}

fn satisfies_assertion<C: CodeUnit>(kind: AssertionKind, input: &[C], position: usize) -> bool {
    debug_assert!(position <= input.len());
    match kind {
        AssertionKind::StartOfInput => position == 0,
        AssertionKind::EndOfInput => position == input.len(),
        AssertionKind::StartOfLine => position == 0 || input[position - 1].is_line_terminator(),
        AssertionKind::EndOfLine => {
            position == input.len() || input[position].is_line_terminator()
        }
        AssertionKind::Boundary => {
            if input.is_empty() {
                false
            } else if position == 0 {
                input[0].is_word()
            } else if position == input.len() {
                input[position - 1].is_word()
            } else {
                input[position - 1].is_word() != input[position].is_word()
            }
        }
        AssertionKind::NonBoundary => {
            !satisfies_assertion(AssertionKind::Boundary, input, position)
        }
    }
}
