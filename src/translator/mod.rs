//! Translation of disassembler-declared basic blocks into IR-backed
//! functions.
//!
//! The [`Translator`] drives an external [`Lifter`] over the blocks the
//! dump declares for each function, reconciles the lifter's block
//! boundaries with the disassembler's (the lifter may stop early at a call
//! split, or run past the declared end), classifies every block's
//! [`Terminator`], and assembles the results into sealed [`Function`]
//! objects behind a thread-safe lookup surface.

mod block;
mod function;
mod lifter;
mod options;
mod terminator;
#[cfg(test)]
mod test;

pub use self::block::Block;
pub use self::function::Function;
pub use self::lifter::{Lift, Lifter};
pub use self::options::{Options, OptionsBuilder};
pub use self::terminator::Terminator;

use log::{trace, warn};
use std::collections::{BTreeMap, BTreeSet};
use std::ops::{Deref, DerefMut};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::dump::{BlockDescriptor, DumpIndex};
use crate::error::*;
use crate::il::SuperBlock;
use crate::image::Image;

struct State {
    lifter: Box<dyn Lifter + Send>,
    functions: BTreeMap<u64, Arc<Function>>,
    seen_blocks: BTreeSet<u64>,
    block_index: BTreeMap<u64, u64>,
    xrefs: BTreeMap<u64, BTreeSet<u64>>,
    vfunc_xrefs: BTreeMap<u64, BTreeSet<u64>>,
    is_finalized: bool,
}

/// Bulk mutable access to the translated functions, held under the
/// translator's lock.
///
/// Obtained through [`Translator::functions_mutable`]; dereferences to the
/// map from entry address to function.
pub struct FunctionsMut<'a> {
    guard: MutexGuard<'a, State>,
}

impl<'a> Deref for FunctionsMut<'a> {
    type Target = BTreeMap<u64, Arc<Function>>;

    fn deref(&self) -> &Self::Target {
        &self.guard.functions
    }
}

impl<'a> DerefMut for FunctionsMut<'a> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.guard.functions
    }
}

/// Owns the translated functions of one binary and translates further
/// functions on demand.
///
/// All public operations are serialised under a single internal lock, so a
/// `Translator` can be shared across threads. Functions are handed out as
/// `Arc<Function>`, sealed: the only state that grows after a function is
/// sealed are its cross-reference sets, which the translator keeps as
/// append-only side tables.
pub struct Translator {
    image: Image,
    dump: DumpIndex,
    state: Mutex<State>,
}

impl Translator {
    /// Create a new `Translator` over an already-loaded image and dump
    /// index.
    ///
    /// With `parse_on_demand` off, every function of the dump's function
    /// table is translated before this returns, in ascending address
    /// order; a function that fails to translate is logged and skipped.
    pub fn new(
        image: Image,
        dump: DumpIndex,
        lifter: Box<dyn Lifter + Send>,
        options: Options,
    ) -> Translator {
        let translator = Translator {
            image,
            dump,
            state: Mutex::new(State {
                lifter,
                functions: BTreeMap::new(),
                seen_blocks: BTreeSet::new(),
                block_index: BTreeMap::new(),
                xrefs: BTreeMap::new(),
                vfunc_xrefs: BTreeMap::new(),
                is_finalized: false,
            }),
        };

        if !options.parse_on_demand() {
            translator.parse_known_functions();
        }

        translator
    }

    /// Create a new `Translator` for the binary at `filename`.
    ///
    /// This requires the exported dump files `<filename>.dmp` and
    /// `<filename>.dmp.no-return` in the same directory as the input file.
    pub fn from_file<P: AsRef<Path>>(
        filename: P,
        lifter: Box<dyn Lifter + Send>,
        options: Options,
    ) -> Result<Translator> {
        let filename = filename.as_ref();

        let image = Image::from_file(filename, options.file_format())?;

        let mut dump_filename = filename.as_os_str().to_owned();
        dump_filename.push(".dmp");
        let dump = DumpIndex::from_file(&dump_filename)?;

        Ok(Translator::new(image, dump, lifter, options))
    }

    /// The dump index this translator draws block boundaries from.
    pub fn dump(&self) -> &DumpIndex {
        &self.dump
    }

    /// The mapped image this translator reads machine code from.
    pub fn image(&self) -> &Image {
        &self.image
    }

    /// Returns the `Function` at address `address`, translating it first
    /// if it is not yet present.
    ///
    /// Fails with `UnknownFunction` if the dump does not know a function
    /// at `address`, or with the translation error if lifting one of its
    /// blocks fails.
    pub fn get(&self, address: u64) -> Result<Arc<Function>> {
        let mut state = self.lock();
        self.maybe_translate(&mut state, address)?
            .ok_or_else(|| ErrorKind::UnknownFunction(address).into())
    }

    /// Returns the `Function` at address `address`. The function has to be
    /// translated beforehand and is not translated on the fly.
    pub fn cget(&self, address: u64) -> Result<Arc<Function>> {
        let state = self.lock();
        state
            .functions
            .get(&address)
            .cloned()
            .ok_or_else(|| ErrorKind::UnknownFunction(address).into())
    }

    /// Returns the `Function` at address `address`, translating it first
    /// if needed, or `None` if the dump does not know a function there.
    pub fn maybe_get(&self, address: u64) -> Result<Option<Arc<Function>>> {
        let mut state = self.lock();
        self.maybe_translate(&mut state, address)
    }

    /// Returns the already-translated `Function` one of whose blocks
    /// contains `address`.
    pub fn containing(&self, address: u64) -> Result<Arc<Function>> {
        let state = self.lock();
        state
            .functions
            .values()
            .find(|function| function.contains_address(address))
            .cloned()
            .ok_or_else(|| ErrorKind::UnknownFunction(address).into())
    }

    /// Record that the instruction at `xref_address` references the
    /// function at `function_address`.
    ///
    /// Cross-references are discovered across the whole analysis, so this
    /// is accepted even after [`finalize`](Translator::finalize).
    pub fn add_xref(&self, function_address: u64, xref_address: u64) -> Result<()> {
        let mut state = self.lock();
        if !state.functions.contains_key(&function_address) {
            bail!(ErrorKind::UnknownFunction(function_address));
        }
        state
            .xrefs
            .entry(function_address)
            .or_insert_with(BTreeSet::new)
            .insert(xref_address);
        Ok(())
    }

    /// Record that the virtual-call site at `xref_address` references the
    /// function at `function_address`.
    pub fn add_vfunc_xref(&self, function_address: u64, xref_address: u64) -> Result<()> {
        let mut state = self.lock();
        if !state.functions.contains_key(&function_address) {
            bail!(ErrorKind::UnknownFunction(function_address));
        }
        state
            .vfunc_xrefs
            .entry(function_address)
            .or_insert_with(BTreeSet::new)
            .insert(xref_address);
        Ok(())
    }

    /// The addresses referencing the function at `function_address`.
    pub fn xrefs(&self, function_address: u64) -> Result<BTreeSet<u64>> {
        let state = self.lock();
        if !state.functions.contains_key(&function_address) {
            bail!(ErrorKind::UnknownFunction(function_address));
        }
        Ok(state
            .xrefs
            .get(&function_address)
            .cloned()
            .unwrap_or_default())
    }

    /// The virtual-call sites referencing the function at
    /// `function_address`.
    pub fn vfunc_xrefs(&self, function_address: u64) -> Result<BTreeSet<u64>> {
        let state = self.lock();
        if !state.functions.contains_key(&function_address) {
            bail!(ErrorKind::UnknownFunction(function_address));
        }
        Ok(state
            .vfunc_xrefs
            .get(&function_address)
            .cloned()
            .unwrap_or_default())
    }

    /// Bulk mutable access to the translated functions for neighbouring
    /// passes.
    ///
    /// Fails with `AlreadyFinalized` once
    /// [`finalize`](Translator::finalize) was called.
    pub fn functions_mutable(&self) -> Result<FunctionsMut> {
        let guard = self.lock();
        if guard.is_finalized {
            bail!(ErrorKind::AlreadyFinalized);
        }
        Ok(FunctionsMut { guard })
    }

    /// Seal this translator against bulk mutation.
    ///
    /// Single-entry lookups, on-demand translation, and cross-reference
    /// additions remain available. Finalization is permanent and
    /// idempotent.
    pub fn finalize(&self) {
        self.lock().is_finalized = true;
    }

    /// Returns `true` once [`finalize`](Translator::finalize) was called.
    pub fn is_finalized(&self) -> bool {
        self.lock().is_finalized
    }

    fn lock(&self) -> MutexGuard<State> {
        self.state.lock().unwrap()
    }

    fn parse_known_functions(&self) {
        let mut state = self.lock();

        for (address, descriptors) in self.dump.functions() {
            if state.functions.contains_key(address) {
                continue;
            }
            if let Err(e) = self.translate_function(&mut state, *address, descriptors) {
                warn!("abandoning function at 0x{:x}: {}", address, e);
            }
        }
    }

    fn maybe_translate(&self, state: &mut State, address: u64) -> Result<Option<Arc<Function>>> {
        if let Some(function) = state.functions.get(&address) {
            return Ok(Some(function.clone()));
        }

        let descriptors = match self.dump.functions().get(&address) {
            Some(descriptors) => descriptors,
            None => return Ok(None),
        };

        self.translate_function(state, address, descriptors)
            .map(Some)
    }

    fn translate_function(
        &self,
        state: &mut State,
        address: u64,
        descriptors: &[BlockDescriptor],
    ) -> Result<Arc<Function>> {
        trace!("translating function at 0x{:x}", address);

        let mut function = Function::new(address);

        for descriptor in descriptors {
            if let Err(e) = self.process_block(state, &mut function, descriptor) {
                // The partial function is dropped; keep the block index
                // consistent with the surviving functions.
                for block_address in function.blocks().keys() {
                    state.block_index.remove(block_address);
                }
                return Err(e);
            }
        }

        detect_tail_jumps(&mut function);
        function.finalize();

        let function = Arc::new(function);
        state.functions.insert(address, function.clone());
        Ok(function)
    }

    fn process_block(
        &self,
        state: &mut State,
        function: &mut Function,
        descriptor: &BlockDescriptor,
    ) -> Result<()> {
        if descriptor.is_empty() {
            return Ok(());
        }
        if state.seen_blocks.contains(&descriptor.start()) {
            return Ok(());
        }

        trace!(
            "lifting block at 0x{:x}, {} instructions",
            descriptor.start(),
            descriptor.instruction_count()
        );

        let bytes = self.image.bytes_at(descriptor.start())?;
        let (mut ir, real_end) = {
            let lift =
                state
                    .lifter
                    .lift(bytes, descriptor.start(), descriptor.instruction_count())?;
            // The lifter's output is scratch storage, only valid until the
            // next lift call; clone it into owned storage first.
            (lift.ir().clone(), lift.real_end())
        };

        state.seen_blocks.insert(descriptor.start());

        let head_instructions = ir.instruction_count();
        if head_instructions == 0 {
            bail!(ErrorKind::TranslationError(descriptor.start()));
        }

        if head_instructions < descriptor.instruction_count() {
            // The block was non-strict and the lifter split it at a call
            // instruction. Translate the remainder starting at the split
            // point, then finalize the lifted prefix; the two chained
            // blocks cover the original descriptor.
            let split = BlockDescriptor::new(
                real_end,
                descriptor.end(),
                descriptor.instruction_count() - head_instructions,
            );
            self.process_block(state, function, &split)?;
        } else if head_instructions > descriptor.instruction_count() {
            // One of the block's instructions is a control-flow target and
            // the lifter ran past the declared end; cut the superfluous
            // tail. The truncated block classifies as a fall-through into
            // the cut-off instruction.
            ir.truncate_after_instructions(descriptor.instruction_count());
        }

        self.finalize_block(state, function, descriptor.start(), ir);
        Ok(())
    }

    fn finalize_block(
        &self,
        state: &mut State,
        function: &mut Function,
        address: u64,
        ir: SuperBlock,
    ) {
        // Calls and jumps into a known non-returning callee are promoted.
        let terminator = match Terminator::from_super_block(&ir, address) {
            Terminator::Call {
                target,
                fall_through,
            } if self.dump.non_returning().contains(&target) => Terminator::NoReturn {
                target,
                fall_through,
            },
            Terminator::Jump { target, .. } if self.dump.non_returning().contains(&target) => {
                Terminator::NoReturn {
                    target,
                    fall_through: 0,
                }
            }
            terminator => terminator,
        };

        trace!("block 0x{:x} terminates as {}", address, terminator);

        state.block_index.insert(address, function.address());
        function.add_block(Block::new(address, ir, terminator));
    }
}

/// Mark every unconditional jump that leaves `function` as a tail jump.
///
/// This runs once all blocks are assembled, since it needs the function's
/// complete address set, and before the function is sealed and handed out.
fn detect_tail_jumps(function: &mut Function) {
    let addresses: BTreeSet<u64> = function.blocks().keys().cloned().collect();

    for block in function.blocks_mut().values_mut() {
        if let Terminator::Jump { target, is_tail } = block.terminator_mut() {
            *is_tail = !addresses.contains(target);
        }
    }
}
