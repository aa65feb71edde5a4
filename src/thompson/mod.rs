//! Thompson NFA bytecode and the engine executing it.

pub mod bytecode;
pub mod pike_vm;
pub mod registers;
