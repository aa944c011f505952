//! The interface to the external IR lifter.

use crate::error::*;
use crate::il::SuperBlock;

/// The result of one lift request.
pub struct Lift<'a> {
    ir: &'a SuperBlock,
    real_end: u64,
}

impl<'a> Lift<'a> {
    /// Create a new `Lift` over a super-block in the lifter's scratch
    /// storage.
    pub fn new(ir: &'a SuperBlock, real_end: u64) -> Lift<'a> {
        Lift { ir, real_end }
    }

    /// The lifted super-block.
    ///
    /// This borrows the lifter's scratch storage; clone it into owned
    /// storage before the next lift call.
    pub fn ir(&self) -> &'a SuperBlock {
        self.ir
    }

    /// The virtual address one byte past the last instruction the lifter
    /// actually consumed.
    pub fn real_end(&self) -> u64 {
        self.real_end
    }
}

/// This trait is used by the translator to lift machine code into IR
/// super-blocks.
///
/// Anything that implements this trait can drive the translation core; the
/// production lifter wraps a native library, and tests use scripted
/// implementations.
pub trait Lifter {
    /// Translate up to `max_instructions` instructions from `bytes`,
    /// lifted as though located at virtual address `address`.
    ///
    /// A lifter may cover fewer instructions than requested (it splits
    /// non-strict blocks at call instructions) or more (it does not know
    /// the block's declared end); the translation core reconciles both
    /// cases.
    ///
    /// The returned super-block lives in the lifter's scratch storage and
    /// is only valid until the next call to `lift`; the borrow on the
    /// receiver enforces this, and callers clone the block into owned
    /// storage.
    fn lift(&mut self, bytes: &[u8], address: u64, max_instructions: usize) -> Result<Lift<'_>>;
}
