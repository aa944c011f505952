//! Parsed disassembler dumps.
//!
//! A disassembler exports two files next to the binary it analysed:
//!
//! * `<binary>.dmp` - a JSON function table mapping each function entry
//!   address to its ordered basic-block descriptors.
//! * `<binary>.dmp.no-return` - a line-oriented list of entry addresses of
//!   functions known never to return (`abort`, `exit`, ...), one hex
//!   address per line. Blank lines and lines starting with `#` are
//!   skipped.
//!
//! The block order inside a function is the dump's natural order and is
//! preserved verbatim; the translation core relies on it.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use crate::error::*;

/// The boundaries of one disassembler-declared basic block.
///
/// `end` is exclusive; `start == end` denotes an empty block, which the
/// translation core skips. The instruction count comes from the
/// disassembler, not from the byte length.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct BlockDescriptor {
    start: u64,
    end: u64,
    #[serde(rename = "instructions")]
    instruction_count: usize,
}

impl BlockDescriptor {
    /// Create a new `BlockDescriptor`.
    pub fn new(start: u64, end: u64, instruction_count: usize) -> BlockDescriptor {
        BlockDescriptor {
            start,
            end,
            instruction_count,
        }
    }

    /// The address of the first instruction of this block.
    pub fn start(&self) -> u64 {
        self.start
    }

    /// The address one past the last byte of this block.
    pub fn end(&self) -> u64 {
        self.end
    }

    /// The number of instructions in this block.
    pub fn instruction_count(&self) -> usize {
        self.instruction_count
    }

    /// Returns `true` if this descriptor covers no bytes.
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

#[derive(Debug, Deserialize)]
struct DumpFunction {
    entry: u64,
    blocks: Vec<BlockDescriptor>,
}

#[derive(Debug, Deserialize)]
struct Dump {
    functions: Vec<DumpFunction>,
}

/// The parsed auxiliary data of one binary: the function table and the
/// non-returning set. Immutable once constructed.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct DumpIndex {
    functions: BTreeMap<u64, Vec<BlockDescriptor>>,
    non_returning: BTreeSet<u64>,
}

impl DumpIndex {
    /// Create a `DumpIndex` directly from parsed tables.
    pub fn new(
        functions: BTreeMap<u64, Vec<BlockDescriptor>>,
        non_returning: BTreeSet<u64>,
    ) -> DumpIndex {
        DumpIndex {
            functions,
            non_returning,
        }
    }

    /// Load `<dump>` and `<dump>.no-return`.
    ///
    /// Both files are required; a missing or malformed file is fatal to the
    /// caller.
    pub fn from_file<P: AsRef<Path>>(filename: P) -> Result<DumpIndex> {
        let filename = filename.as_ref();

        let mut no_return_filename = filename.as_os_str().to_owned();
        no_return_filename.push(".no-return");

        let dump = File::open(filename)?;
        let no_return = BufReader::new(File::open(&no_return_filename)?);

        DumpIndex::from_readers(dump, no_return)
    }

    /// Parse a `DumpIndex` from readers over the two dump files.
    pub fn from_readers<R: Read, S: BufRead>(dump: R, no_return: S) -> Result<DumpIndex> {
        let dump: Dump = serde_json::from_reader(dump)?;

        let mut functions = BTreeMap::new();
        for function in dump.functions {
            functions.insert(function.entry, function.blocks);
        }

        let mut non_returning = BTreeSet::new();
        for line in no_return.lines() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let digits = line
                .strip_prefix("0x")
                .or_else(|| line.strip_prefix("0X"))
                .unwrap_or(line);
            non_returning.insert(u64::from_str_radix(digits, 16)?);
        }

        Ok(DumpIndex::new(functions, non_returning))
    }

    /// The function table: entry address to ordered block descriptors.
    pub fn functions(&self) -> &BTreeMap<u64, Vec<BlockDescriptor>> {
        &self.functions
    }

    /// Entry addresses of callees that do not return.
    pub fn non_returning(&self) -> &BTreeSet<u64> {
        &self.non_returning
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const DUMP: &str = r#"
        {
            "functions": [
                { "entry": 4096,
                  "blocks": [
                      { "start": 4096, "end": 4112, "instructions": 4 },
                      { "start": 4112, "end": 4121, "instructions": 3 }
                  ] },
                { "entry": 16384, "blocks": [] }
            ]
        }"#;

    const NO_RETURN: &str = "# process-terminating callees\n0x4000\nDEAD\n\n";

    #[test]
    fn parses_function_table_in_dump_order() {
        let index = DumpIndex::from_readers(DUMP.as_bytes(), NO_RETURN.as_bytes()).unwrap();

        assert_eq!(index.functions().len(), 2);
        let blocks = &index.functions()[&0x1000];
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0], BlockDescriptor::new(0x1000, 0x1010, 4));
        assert_eq!(blocks[1], BlockDescriptor::new(0x1010, 0x1019, 3));
        assert!(index.functions()[&0x4000].is_empty());
    }

    #[test]
    fn parses_non_returning_lines() {
        let index = DumpIndex::from_readers(DUMP.as_bytes(), NO_RETURN.as_bytes()).unwrap();
        assert_eq!(index.non_returning().len(), 2);
        assert!(index.non_returning().contains(&0x4000));
        assert!(index.non_returning().contains(&0xdead));
    }

    #[test]
    fn malformed_non_returning_line_fails() {
        assert!(DumpIndex::from_readers(DUMP.as_bytes(), "xyzzy\n".as_bytes()).is_err());
    }

    #[test]
    fn malformed_dump_fails() {
        assert!(DumpIndex::from_readers("{".as_bytes(), "".as_bytes()).is_err());
    }

    #[test]
    fn from_file_reads_sibling_no_return_file() {
        let directory = tempfile::tempdir().unwrap();
        let dump_path = directory.path().join("target.dmp");

        let mut dump = std::fs::File::create(&dump_path).unwrap();
        dump.write_all(DUMP.as_bytes()).unwrap();

        let mut no_return =
            std::fs::File::create(directory.path().join("target.dmp.no-return")).unwrap();
        no_return.write_all(NO_RETURN.as_bytes()).unwrap();

        let index = DumpIndex::from_file(&dump_path).unwrap();
        assert_eq!(index.functions().len(), 2);
        assert!(index.non_returning().contains(&0x4000));
    }

    #[test]
    fn from_file_requires_the_no_return_file() {
        let directory = tempfile::tempdir().unwrap();
        let dump_path = directory.path().join("target.dmp");

        let mut dump = std::fs::File::create(&dump_path).unwrap();
        dump.write_all(DUMP.as_bytes()).unwrap();

        assert!(DumpIndex::from_file(&dump_path).is_err());
    }
}
