//! A compiler from [`regex_syntax::hir::Hir`] to the engine's bytecode, used
//! to run the engine against `regex` on real patterns.
//!
//! Only what the engine can express is supported: patterns with other look
//! arounds, or with empty classes, are refused.

use gregex_nfa::{
    AssertionKind,
    Instruction::{self, *},
    Program,
};
use regex_syntax::hir::{Capture, Class, Hir, HirKind, Literal, Look, Repetition};

#[derive(Debug, Default)]
pub struct Compiler {
    instructions: Vec<Instruction>,
}

impl Compiler {
    /// Compiles an unanchored search for `hir`, and returns the program with
    /// its register count.
    pub fn compile(hir: &Hir) -> Option<(Program, usize)> {
        let mut compiler = Compiler::default();
        // Lazy `.*?` prefix: the match may start anywhere, as early as
        // possible.
        compiler.push(Fork(2));
        compiler.push(Jmp(4));
        compiler.push(Instruction::CONSUME_ANY);
        compiler.push(Jmp(0));
        compiler.push(SetRegisterToPos(0));
        compiler.compile_internal(hir)?;
        compiler.push(SetRegisterToPos(1));
        compiler.push(Accept);

        let register_count = 2 * (hir.properties().explicit_captures_len() + 1);
        let program = Program::new(compiler.instructions).ok()?;
        Some((program, register_count))
    }

    fn current_pc(&self) -> usize {
        self.instructions.len()
    }

    fn push(&mut self, instruction: Instruction) {
        self.instructions.push(instruction);
    }

    /// Pushes the split of an optional section, and returns the pc to patch
    /// with the end of the section. Greedy splits prefer entering it.
    fn push_split(&mut self, greedy: bool) -> usize {
        let pc = self.current_pc();
        if greedy {
            self.push(Fork(0));
            pc
        } else {
            self.push(Fork(pc + 2));
            self.push(Jmp(0));
            pc + 1
        }
    }

    fn patch(&mut self, pc: usize, target: usize) {
        match &mut self.instructions[pc] {
            Fork(t) | Jmp(t) => *t = target,
            other => panic!("cannot patch {other} at {pc}"),
        }
    }

    /// Alternatives separated by forks, the first one being preferred.
    fn push_alternatives<T>(
        &mut self,
        alternatives: &[T],
        mut compile: impl FnMut(&mut Self, &T) -> Option<()>,
    ) -> Option<()> {
        let length = alternatives.len();
        let mut jmps = Vec::with_capacity(length);
        for (i, alternative) in alternatives.iter().enumerate() {
            if i + 1 < length {
                let fork_pc = self.current_pc();
                self.push(Fork(0));
                compile(self, alternative)?;
                jmps.push(self.current_pc());
                // Patched just below
                self.push(Jmp(0));
                self.patch(fork_pc, self.current_pc());
            } else {
                compile(self, alternative)?;
            }
        }
        let end = self.current_pc();
        for pc in jmps {
            self.patch(pc, end);
        }
        Some(())
    }

    fn compile_internal(&mut self, hir: &Hir) -> Option<()> {
        match hir.kind() {
            HirKind::Empty => (),
            HirKind::Literal(Literal(bytes)) => {
                let string = std::str::from_utf8(bytes).ok()?;
                for unit in string.encode_utf16() {
                    self.push(Instruction::consume(unit));
                }
            }
            HirKind::Class(class) => {
                let ranges: Vec<(u16, u16)> = match class {
                    Class::Unicode(class) => class
                        .iter()
                        .filter(|r| (r.start() as u32) <= 0xffff)
                        .map(|r| (r.start() as u16, (r.end() as u32).min(0xffff) as u16))
                        .collect(),
                    Class::Bytes(class) => class
                        .iter()
                        .map(|r| (r.start() as u16, r.end() as u16))
                        .collect(),
                };
                if ranges.is_empty() {
                    return None;
                }
                self.push_alternatives(&ranges, |compiler, &(min, max)| {
                    compiler.push(ConsumeRange(min, max));
                    Some(())
                })?;
            }
            HirKind::Look(look) => {
                let kind = match look {
                    Look::Start => AssertionKind::StartOfInput,
                    Look::End => AssertionKind::EndOfInput,
                    Look::StartLF => AssertionKind::StartOfLine,
                    Look::EndLF => AssertionKind::EndOfLine,
                    Look::WordAscii | Look::WordUnicode => AssertionKind::Boundary,
                    Look::WordAsciiNegate | Look::WordUnicodeNegate => AssertionKind::NonBoundary,
                    _ => return None,
                };
                self.push(Assertion(kind));
            }
            HirKind::Repetition(Repetition {
                min,
                max,
                greedy,
                sub,
            }) => {
                for _ in 0..*min {
                    self.compile_internal(sub)?;
                }
                match max {
                    Some(max) => {
                        let mut splits = Vec::with_capacity((max - min) as usize);
                        for _ in *min..*max {
                            splits.push(self.push_split(*greedy));
                            self.compile_internal(sub)?;
                        }
                        let end_pc = self.current_pc();
                        for pc in splits {
                            self.patch(pc, end_pc);
                        }
                    }
                    None => {
                        // Iterations matching the empty string are refused.
                        let guard = sub.properties().minimum_len() == Some(0);
                        let loop_pc = self.current_pc();
                        let exit = self.push_split(*greedy);
                        if guard {
                            self.push(BeginLoop);
                        }
                        self.compile_internal(sub)?;
                        if guard {
                            self.push(EndLoop);
                        }
                        self.push(Jmp(loop_pc));
                        let end_pc = self.current_pc();
                        self.patch(exit, end_pc);
                    }
                }
            }
            HirKind::Capture(Capture { index, sub, .. }) => {
                let index = *index as usize;
                self.push(SetRegisterToPos(index * 2));
                self.compile_internal(sub)?;
                self.push(SetRegisterToPos(index * 2 + 1));
            }
            HirKind::Concat(hirs) => {
                for hir in hirs {
                    self.compile_internal(hir)?;
                }
            }
            HirKind::Alternation(hirs) => {
                self.push_alternatives(hirs, |compiler, hir| compiler.compile_internal(hir))?;
            }
        }
        Some(())
    }
}
