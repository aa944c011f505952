//! Peregrine: a binary translation core for static analysis.
//!
//! Peregrine lifts the basic blocks of an ELF64 or PE64 executable into an
//! intermediate representation and assembles them into function objects
//! whose control-flow terminators carry semantic classifications (call,
//! return, conditional jump, tail jump, non-returning call, ...). A quick
//! synopsis of Peregrine's modules:
//!
//! * **dump** - Parsed disassembler dumps: the function table with its block
//! boundaries, and the set of non-returning entry points.
//! * **il** - The owned IR super-block model produced by lifters.
//! * **image** - Virtual-address-indexed read-only views of executable
//! images.
//! * **translator** - Block translation, terminator classification, and the
//! thread-safe function store.
//!
//! Block boundaries come from a dump file exported by an external
//! disassembler, sitting next to the binary as `<binary>.dmp` and
//! `<binary>.dmp.no-return`. The IR itself comes from an external lifter
//! implementing [`translator::Lifter`].
//!
//! ```
//! # use peregrine::error::*;
//! use peregrine::image::FileFormat;
//! use peregrine::translator::{Lifter, OptionsBuilder, Translator};
//!
//! # fn example(lifter: Box<dyn Lifter + Send>) -> Result<()> {
//! let options = OptionsBuilder::new()
//!     .file_format(FileFormat::Elf64)
//!     .build();
//! let translator = Translator::from_file("test_binaries/simple-0", lifter, options)?;
//!
//! let function = translator.get(0x1000)?;
//! for block in function.blocks().values() {
//!     println!("0x{:x}: {}", block.address(), block.terminator());
//! }
//! # Ok(())
//! # }
//! ```

#[macro_use]
extern crate error_chain;

pub mod dump;
pub mod il;
pub mod image;
pub mod translator;

/// Peregrine error types.
pub mod error {
    error_chain! {
        types {
            Error, ErrorKind, ResultExt, Result;
        }

        foreign_links {
            Io(::std::io::Error);
            Goblin(::goblin::error::Error);
            Json(::serde_json::Error);
            ParseIntError(::std::num::ParseIntError);
        }

        errors {
            AlreadyFinalized {
                description("Translator is already finalized")
                display("Translator is already finalized")
            }
            FormatUnsupported {
                description("The file format is not supported")
                display("The file format is not supported")
            }
            ImageError(address: u64) {
                description("Attempt to read unmapped image memory")
                display("No loaded segment maps address 0x{:x}", address)
            }
            LifterError(message: String) {
                description("The IR lifter failed")
                display("Lifter error: {}", message)
            }
            Sort {
                description("Sort error, invalid bitness between expressions")
                display("Sort error, invalid bitness between expressions")
            }
            TranslationError(address: u64) {
                description("Failed to translate a basic block")
                display("Failed to translate block at address 0x{:x}", address)
            }
            UnknownFunction(address: u64) {
                description("No function at the given address")
                display("Cannot find function for address 0x{:x}", address)
            }
        }
    }
}

pub use crate::error::*;
