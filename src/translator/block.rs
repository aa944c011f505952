//! A translated basic block.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::il::SuperBlock;
use crate::translator::Terminator;

/// One disassembler-declared basic block, lifted to IR and classified.
///
/// Blocks are owned by their enclosing [`Function`](crate::translator::Function)
/// and are read-only once the function is sealed.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Block {
    address: u64,
    ir: SuperBlock,
    terminator: Terminator,
}

impl Block {
    pub(crate) fn new(address: u64, ir: SuperBlock, terminator: Terminator) -> Block {
        Block {
            address,
            ir,
            terminator,
        }
    }

    /// The address of the first instruction in this block.
    pub fn address(&self) -> u64 {
        self.address
    }

    /// The address one past the last instruction covered by this block's
    /// IR.
    pub fn end(&self) -> u64 {
        self.ir
            .last_mark()
            .map_or(self.address, |(address, length)| address + length)
    }

    /// The IR super-block backing this block.
    pub fn super_block(&self) -> &SuperBlock {
        &self.ir
    }

    /// The classified exit behaviour of this block.
    pub fn terminator(&self) -> &Terminator {
        &self.terminator
    }

    pub(crate) fn terminator_mut(&mut self) -> &mut Terminator {
        &mut self.terminator
    }

    /// Returns `true` if `address` falls inside this block.
    pub fn contains_address(&self, address: u64) -> bool {
        self.address <= address && address < self.end()
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "block 0x{:x}:", self.address)?;
        writeln!(f, "{}", self.ir)?;
        write!(f, "terminator: {}", self.terminator)
    }
}
