/*!
This modules contains the utils types shared by the interpreter and the
[`crate::Regex`] API: code units, subjects, spans and match results.
*/

use std::ops::Range;

/// A fixed-width code unit of the subject. The interpreter is generic over
/// this trait, and is instantiated once for Latin-1 (`u8`) and once for
/// UTF-16 (`u16`) subjects.
pub trait CodeUnit: Copy + Eq + std::fmt::Debug {
    fn to_u16(self) -> u16;

    /// `[A-Za-z0-9_]`, as used by `\b`.
    fn is_word(self) -> bool {
        matches!(self.to_u16(), 0x30..=0x39 | 0x41..=0x5a | 0x5f | 0x61..=0x7a)
    }

    fn is_line_terminator(self) -> bool {
        matches!(self.to_u16(), 0x0a | 0x0d | 0x2028 | 0x2029)
    }
}

impl CodeUnit for u8 {
    #[inline]
    fn to_u16(self) -> u16 {
        self as u16
    }
}

impl CodeUnit for u16 {
    #[inline]
    fn to_u16(self) -> u16 {
        self
    }
}

/// The text matched against. Its width is picked by the caller and stays
/// fixed for the duration of a call.
#[derive(Copy, Clone, Debug)]
pub enum Subject<'s> {
    OneByte(&'s [u8]),
    TwoByte(&'s [u16]),
}

impl Subject<'_> {
    pub fn len(&self) -> usize {
        match self {
            Subject::OneByte(units) => units.len(),
            Subject::TwoByte(units) => units.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<'s> From<&'s [u8]> for Subject<'s> {
    fn from(units: &'s [u8]) -> Self {
        Subject::OneByte(units)
    }
}

impl<'s, const N: usize> From<&'s [u8; N]> for Subject<'s> {
    fn from(units: &'s [u8; N]) -> Self {
        Subject::OneByte(units)
    }
}

impl<'s> From<&'s [u16]> for Subject<'s> {
    fn from(units: &'s [u16]) -> Self {
        Subject::TwoByte(units)
    }
}

impl<'s> From<&'s Vec<u16>> for Subject<'s> {
    fn from(units: &'s Vec<u16>) -> Self {
        Subject::TwoByte(units)
    }
}

/// Defines the input parameter to all matching methods on a [`crate::Regex`].
/// Only the subject is mandatory, matching starts at code unit 0 by default.
#[derive(Copy, Clone, Debug)]
pub struct Input<'s> {
    /// The code units against which the program is run
    pub subject: Subject<'s>,
    /// Code unit index where the first scan starts.
    /// Default: 0
    pub start: usize,
}

impl<'s> Input<'s> {
    pub fn new(subject: impl Into<Subject<'s>>) -> Self {
        Self {
            subject: subject.into(),
            start: 0,
        }
    }

    pub fn start(mut self, value: usize) -> Self {
        self.start = value;
        self
    }

    pub fn valid(&self) -> bool {
        self.start <= self.subject.len()
    }
}

impl<'s> From<Subject<'s>> for Input<'s> {
    fn from(subject: Subject<'s>) -> Self {
        Self::new(subject)
    }
}

impl<'s> From<&'s [u8]> for Input<'s> {
    fn from(subject: &'s [u8]) -> Self {
        Self::new(subject)
    }
}

impl<'s, const N: usize> From<&'s [u8; N]> for Input<'s> {
    fn from(subject: &'s [u8; N]) -> Self {
        Self::new(subject)
    }
}

impl<'s> From<&'s [u16]> for Input<'s> {
    fn from(subject: &'s [u16]) -> Self {
        Self::new(subject)
    }
}

impl<'s> From<&'s Vec<u16>> for Input<'s> {
    fn from(subject: &'s Vec<u16>) -> Self {
        Self::new(subject)
    }
}

/// A span of code units. Similar to [`std::ops::Range`], but implements Copy.
#[derive(Copy, Debug, Clone, PartialEq, Eq)]
pub struct Span {
    pub from: usize,
    pub to: usize,
}

impl Span {
    pub fn empty(&self) -> bool {
        self.from == self.to
    }

    /// Builds the span stored in a pair of registers, if both are defined.
    pub fn from_registers(from: Option<usize>, to: Option<usize>) -> Option<Span> {
        match (from, to) {
            (Some(from), Some(to)) if from <= to => Some(Span { from, to }),
            _ => None,
        }
    }
}

impl From<Range<usize>> for Span {
    fn from(value: Range<usize>) -> Self {
        Self {
            from: value.start,
            to: value.end,
        }
    }
}

impl From<Span> for Range<usize> {
    fn from(val: Span) -> Self {
        val.from..val.to
    }
}

/// Successful match. Contains only the bounds of the overall match, in code
/// units.
#[derive(Copy, Debug, Clone, PartialEq, Eq)]
pub struct Match {
    pub span: Span,
}

impl Match {
    pub fn new(span: impl Into<Span>) -> Self {
        Self { span: span.into() }
    }

    pub fn start(&self) -> usize {
        self.span.from
    }

    pub fn end(&self) -> usize {
        self.span.to
    }

    pub fn range(&self) -> Range<usize> {
        self.span.into()
    }

    pub fn is_empty(&self) -> bool {
        self.span.empty()
    }
}

/// Successful capturing match. Contains the bounds (if any) of all capture
/// groups, including the implicit capture group 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Captures {
    spans: Box<[Option<Span>]>,
}

impl Captures {
    /// Pairs up a register array: registers `2i` and `2i + 1` hold the
    /// bounds of group `i`.
    pub fn from_registers(registers: &[Option<usize>]) -> Self {
        let spans = registers
            .chunks_exact(2)
            .map(|pair| Span::from_registers(pair[0], pair[1]))
            .collect();
        Self { spans }
    }

    pub fn get(&self, group_index: usize) -> Option<Match> {
        let span = (*self.spans.get(group_index)?)?;
        Some(Match { span })
    }

    /// The overall match. Always set for captures produced by the engine.
    pub fn group0(&self) -> Option<Match> {
        self.get(0)
    }

    pub fn group_len(&self) -> usize {
        self.spans.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = Option<Match>> + '_ {
        self.spans.iter().map(|span| span.map(|span| Match { span }))
    }
}
