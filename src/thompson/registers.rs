//! Allocation of per-thread capture registers.
//!
//! Every thread owns a register array of the same length, so freed arrays
//! are kept on a free list and handed out again instead of hitting the
//! allocator in the hot loop.

/// A register array, one slot per register. `None` is the undefined value.
pub type Registers = Box<[Option<usize>]>;

#[derive(Debug)]
pub struct RegisterArena {
    register_count: usize,
    free: Vec<Registers>,
    allocations: usize,
}

impl RegisterArena {
    pub fn new(register_count: usize) -> Self {
        Self {
            register_count,
            free: Vec::new(),
            allocations: 0,
        }
    }

    /// Returns an array with every register set to `fill`.
    pub fn allocate(&mut self, fill: Option<usize>) -> Registers {
        let mut registers = self.allocate_uninitialized();
        registers.fill(fill);
        registers
    }

    /// Returns an array whose content is unspecified (it may hold the
    /// registers of a dead thread). Callers overwrite it entirely.
    pub fn allocate_uninitialized(&mut self) -> Registers {
        match self.free.pop() {
            Some(registers) => registers,
            None => {
                self.allocations += 1;
                vec![None; self.register_count].into_boxed_slice()
            }
        }
    }

    /// Allocates a copy of `registers`.
    pub fn duplicate(&mut self, registers: &[Option<usize>]) -> Registers {
        let mut copy = self.allocate_uninitialized();
        copy.copy_from_slice(registers);
        copy
    }

    pub fn free(&mut self, registers: Registers) {
        debug_assert_eq!(registers.len(), self.register_count);
        self.free.push(registers);
    }

    /// Number of arrays ready for reuse.
    pub fn available(&self) -> usize {
        self.free.len()
    }

    /// Number of arrays created so far, reused ones excluded.
    pub fn allocations(&self) -> usize {
        self.allocations
    }
}
