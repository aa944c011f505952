//! Configuration recognized by the translator at construction.

use crate::image::FileFormat;

/// Various options that can be passed to the translator. Options will
/// change the behavior of the translator.
#[derive(Clone, Copy, Debug)]
pub struct Options {
    file_format: FileFormat,
    parse_on_demand: bool,
}

impl Options {
    /// Create a new set of Options with the default settings.
    pub fn new() -> Options {
        Options::default()
    }

    /// The file format the mapped image backend is selected by.
    pub fn file_format(&self) -> FileFormat {
        self.file_format
    }

    /// Set the file format of the binary to translate.
    pub fn set_file_format(&mut self, file_format: FileFormat) {
        self.file_format = file_format;
    }

    /// Whether functions are translated when first queried.
    ///
    /// When this is off, every function the dump knows about is translated
    /// eagerly at construction, in ascending address order.
    pub fn parse_on_demand(&self) -> bool {
        self.parse_on_demand
    }

    /// Set the value of the, "Parse on demand," option.
    pub fn set_parse_on_demand(&mut self, parse_on_demand: bool) {
        self.parse_on_demand = parse_on_demand;
    }
}

impl Default for Options {
    fn default() -> Options {
        Options {
            file_format: FileFormat::Elf64,
            parse_on_demand: true,
        }
    }
}

/// Create your options with the builder pattern.
///
/// For more details on the options, see [`Options`].
pub struct OptionsBuilder {
    options: Options,
}

impl OptionsBuilder {
    /// Create a new builder for translator options.
    pub fn new() -> OptionsBuilder {
        OptionsBuilder {
            options: Options::default(),
        }
    }

    /// Set the file format of the binary to translate. By default this is
    /// ELF64.
    pub fn file_format(mut self, file_format: FileFormat) -> OptionsBuilder {
        self.options.file_format = file_format;
        self
    }

    /// Set the, "Parse on demand," option. By default this is true.
    pub fn parse_on_demand(mut self, parse_on_demand: bool) -> OptionsBuilder {
        self.options.parse_on_demand = parse_on_demand;
        self
    }

    pub fn build(self) -> Options {
        self.options
    }
}

impl Default for OptionsBuilder {
    fn default() -> OptionsBuilder {
        OptionsBuilder::new()
    }
}
