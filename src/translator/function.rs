//! A translated function.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::translator::Block;

/// A function assembled from translated basic blocks.
///
/// A `Function` is mutated only while the translator assembles it; after
/// [`Translator`](crate::translator::Translator) runs tail-jump detection
/// it is sealed and handed out read-only. Cross-reference sets are kept by
/// the translator as append-only side tables, so a sealed function never
/// changes.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Function {
    address: u64,
    blocks: BTreeMap<u64, Block>,
    finalized: bool,
}

impl Function {
    pub(crate) fn new(address: u64) -> Function {
        Function {
            address,
            blocks: BTreeMap::new(),
            finalized: false,
        }
    }

    /// The entry address of this function.
    pub fn address(&self) -> u64 {
        self.address
    }

    /// The blocks of this function, keyed by block address.
    pub fn blocks(&self) -> &BTreeMap<u64, Block> {
        &self.blocks
    }

    /// Get the block at the given address, or `None` if this function has
    /// no block there.
    pub fn block(&self, address: u64) -> Option<&Block> {
        self.blocks.get(&address)
    }

    /// Returns `true` if `address` falls inside one of this function's
    /// blocks.
    pub fn contains_address(&self, address: u64) -> bool {
        self.blocks
            .values()
            .any(|block| block.contains_address(address))
    }

    /// Returns `true` once this function is sealed.
    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    pub(crate) fn add_block(&mut self, block: Block) {
        self.blocks.insert(block.address(), block);
    }

    pub(crate) fn blocks_mut(&mut self) -> &mut BTreeMap<u64, Block> {
        &mut self.blocks
    }

    pub(crate) fn finalize(&mut self) {
        self.finalized = true;
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "function 0x{:x}:", self.address)?;
        for block in self.blocks.values() {
            writeln!(f, "{}", block)?;
        }
        Ok(())
    }
}
