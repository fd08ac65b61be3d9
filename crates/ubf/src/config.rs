use rust_decimal::Decimal;

use crate::ExternalConverter;

/// Settings threaded through a single compilation
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct Config {
    /// The deviation written next to every mass-spectrometry intensity
    pub deviation: Decimal,
    /// The program that turns the compiled text into a full FTBL file
    pub converter: String,
    pub converter_args: Vec<String>,
    /// Treat a network without a `// Reactions` line as an error instead of an empty network
    pub strict_section: bool,
    /// Comment lines written before the first reaction
    pub banner: Option<String>,
}

impl Config {
    pub const DEFAULT_CONVERTER: &'static str = "txt2ftbl";

    pub fn external_converter(&self) -> ExternalConverter {
        ExternalConverter::new(&self.converter).with_args(self.converter_args.iter().cloned())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            deviation: Decimal::new(1, 2),
            converter: Self::DEFAULT_CONVERTER.to_owned(),
            converter_args: Vec::new(),
            strict_section: false,
            banner: None,
        }
    }
}
