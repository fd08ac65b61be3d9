//! Compiles University of Barcelona Format (UBF) reaction networks and mass-spectrometry measurements into the
//! intermediate text and FTBL tables consumed by the isotope-labelling flux tool chain

pub mod atoms;
pub mod balance;
mod config;
mod emit;
pub mod errors;
pub mod ftbl;
pub mod mass_spec;
pub mod parsers;
pub mod scanner;

// External Crate Imports
use derive_more::Display;
use log::{debug, info, warn};

// Public Re-exports
pub use atoms::AtomLabel;
pub use config::Config;
pub use emit::{Network, render_network};
pub use errors::{Error, Result};
pub use ftbl::{Converter, ExternalConverter, splice_mass_spec};
pub use mass_spec::{Isotopologue, MassSpecFragment, MassSpecSection};
pub use parsers::{parse_reaction, parse_records};
pub use scanner::{RawLine, ReactionLines};

/// A single reaction, with every participant paired with the atom label of its carbons
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct ReactionSpec {
    full_name: Option<String>,
    short_name: String,
    separator: SeparatorKind,
    left: Side,
    right: Side,
}

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Display)]
pub enum SeparatorKind {
    #[display("->")]
    Irreversible,
    #[display("<->")]
    Reversible,
}

/// The ordered participants on one side of a reaction
#[derive(Clone, Eq, PartialEq, Debug, Default)]
pub struct Side(Vec<Participant>);

#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct Participant {
    metabolite: String,
    label: AtomLabel,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Display)]
pub enum SideKind {
    #[display("left")]
    Left,
    #[display("right")]
    Right,
}

// ---------------------------------------------------------------------------------------------------------------------

impl ReactionSpec {
    pub fn new(
        full_name: Option<String>,
        short_name: impl Into<String>,
        separator: SeparatorKind,
        left: Side,
        right: Side,
    ) -> Self {
        let full_name = full_name.filter(|name| !name.is_empty());
        Self {
            full_name,
            short_name: short_name.into(),
            separator,
            left,
            right,
        }
    }

    pub fn full_name(&self) -> Option<&str> {
        self.full_name.as_deref()
    }

    pub fn short_name(&self) -> &str {
        &self.short_name
    }

    pub const fn separator(&self) -> SeparatorKind {
        self.separator
    }

    pub const fn left(&self) -> &Side {
        &self.left
    }

    pub const fn right(&self) -> &Side {
        &self.right
    }

    /// True when both sides carry the same number of labelled carbons
    pub fn is_balanced(&self) -> bool {
        self.left.carbon_count() == self.right.carbon_count()
    }
}

impl Side {
    pub fn iter(&self) -> std::slice::Iter<'_, Participant> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn carbon_count(&self) -> usize {
        self.0.iter().map(|p| p.label.len()).sum()
    }

    pub(crate) fn push(&mut self, participant: Participant) {
        self.0.push(participant);
    }
}

impl FromIterator<Participant> for Side {
    fn from_iter<T: IntoIterator<Item = Participant>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl From<Vec<Participant>> for Side {
    fn from(participants: Vec<Participant>) -> Self {
        Self(participants)
    }
}

impl<'s> IntoIterator for &'s Side {
    type Item = &'s Participant;
    type IntoIter = std::slice::Iter<'s, Participant>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl Participant {
    pub fn new(metabolite: impl Into<String>, label: AtomLabel) -> Self {
        Self {
            metabolite: metabolite.into(),
            label,
        }
    }

    pub fn metabolite(&self) -> &str {
        &self.metabolite
    }

    pub const fn label(&self) -> &AtomLabel {
        &self.label
    }
}

// Pipeline ============================================================================================================

/// Compiles every reaction found after the `// Reactions` marker of a UBF network
///
/// # Errors
///
/// The first malformed reaction aborts the whole network. A missing section marker is only an error when
/// [`Config::strict_section`] is set; otherwise the network is simply empty.
pub fn compile_network(network: &str, config: &Config) -> Result<Vec<ReactionSpec>> {
    let mut lines = ReactionLines::new(network.lines());
    let reactions = lines
        .by_ref()
        .map(|line| -> Result<ReactionSpec> {
            let reaction = parse_reaction(line)?;
            debug!("line {}: compiled reaction {}", line.number, reaction.short_name());
            Ok(reaction)
        })
        .collect::<Result<Vec<_>>>()?;

    if !lines.found_marker() {
        if config.strict_section {
            return Err(Error::SectionNotFound);
        }
        warn!("no `// Reactions` line was found, so the network contains no reactions");
    }

    info!("compiled {} reactions", reactions.len());
    Ok(reactions)
}

/// Runs the whole UBF to FTBL translation: compiles the network, hands the intermediate text to `converter`, then
/// splices in any mass-spectrometry measurements
///
/// # Errors
///
/// Fails on the first malformed reaction or measurement, if the converter fails, or if the converted FTBL has no
/// `MASS_SPECTROMETRY` section to receive the measurements.
pub fn compile(
    network: &str,
    mass_spec: Option<&str>,
    converter: &impl Converter,
    config: &Config,
) -> Result<String> {
    let reactions = compile_network(network, config)?;
    // NOTE: Measurements are compiled before running the converter, so that bad input never reaches it
    let mass_spec = mass_spec
        .map(|ms| MassSpecSection::parse(ms, config.deviation))
        .transpose()?;

    let txt = render_network(&reactions, config.banner.as_deref());
    let ftbl = converter.convert(&txt)?;

    match mass_spec {
        Some(section) => splice_mass_spec(&ftbl, &section),
        None => Ok(ftbl),
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;

    use super::*;

    const NETWORK: &str = indoc! {"
        Glycolysis model
        // Reactions
        // upper glycolysis
        Hexokinase, HK: Glc -> G6P  123456 -> 123456

        Aldolase, ALD: F6P <-> DHAP + GAP  123456 <-> 321 + 456
        out: Pyr ->   123 ->
    "};

    #[test]
    fn test_compile_network() {
        let reactions = compile_network(NETWORK, &Config::default()).unwrap();
        let names: Vec<_> = reactions.iter().map(ReactionSpec::short_name).collect();
        assert_eq!(names, ["HK", "ALD", "out"]);
        assert!(reactions.iter().all(ReactionSpec::is_balanced));
        assert_eq!(reactions[0].full_name(), Some("Hexokinase"));
        assert_eq!(reactions[1].separator(), SeparatorKind::Reversible);
        assert_eq!(reactions[2].right().iter().next().unwrap().metabolite(), "Pyr_sink");
    }

    #[test]
    fn test_missing_section() {
        let network = "HK: Glc -> G6P  123456 -> 123456";
        assert_eq!(compile_network(network, &Config::default()), Ok(Vec::new()));

        let strict = Config {
            strict_section: true,
            ..Config::default()
        };
        assert_eq!(compile_network(network, &strict), Err(Error::SectionNotFound));
    }

    #[test]
    fn test_bad_reaction_aborts_network() {
        let network = indoc! {"
            // reactions
            HK: Glc -> G6P  123456 -> 123456
            PGI: G6P -> F6P  123456 <-> 123456
            ALD: F6P <-> DHAP + GAP  123456 <-> 321 + 456
        "};
        let Err(Error::Reaction(error)) = compile_network(network, &Config::default()) else {
            panic!("expected the mismatched arrows on line 3 to fail");
        };
        assert_eq!(error.line(), Some(3));
    }

    #[test]
    fn test_compile() {
        let network = indoc! {"
            // reactions
            HK: Glc -> G6P  123456 -> 123456
        "};
        let ms = "G6P C1-C2: 0.7 0.2 0.1";
        let converter = |txt: &str| -> Result<String> {
            assert!(txt.contains("HK:\tGlc (abcdef) -> G6P (abcdef)"));
            Ok("FLUXES\nMASS_SPECTROMETRY\n\tMETA_NAME\tFRAGMENT\tWEIGHT\tVALUE\tDEVIATION\nOPTIONS".to_owned())
        };
        let ftbl = compile(network, Some(ms), &converter, &Config::default()).unwrap();
        assert_eq!(
            ftbl,
            "FLUXES\nMASS_SPECTROMETRY\n\tMETA_NAME\tFRAGMENT\tWEIGHT\tVALUE\tDEVIATION\n\
            \tG6P\t1~2\t0\t0.7\t0.01\n\t\t\t1\t0.2\t0.01\n\t\t\t2\t0.1\t0.01\nOPTIONS"
        );
    }

    #[test]
    fn test_compile_glycolysis() {
        const NETWORK: &str = include_str!("../data/glycolysis.ubf");
        const MASS_SPEC: &str = include_str!("../data/glycolysis.ms");

        // Wraps the compiled reactions in a minimal FTBL, the way the converter would
        let converter = |txt: &str| -> Result<String> {
            Ok(format!(
                "NETWORK\n{txt}MASS_SPECTROMETRY\n\tMETA_NAME\tFRAGMENT\tWEIGHT\tVALUE\tDEVIATION\n\t\t\t\t\t\n"
            ))
        };
        let config = Config {
            banner: Some("produced by a test".to_owned()),
            ..Config::default()
        };
        let ftbl = compile(NETWORK, Some(MASS_SPEC), &converter, &config).unwrap();

        let (network, measurements) = ftbl.split_once("MASS_SPECTROMETRY\n").unwrap();
        assert_eq!(
            network,
            "NETWORK\n# produced by a test\n\n# Hexokinase\nHK:\tGlc (abcdef) -> G6P (abcdef)\n\
            PGI:\tG6P (abcdef) <-> F6P (abcdef)\n# Aldolase\nALD:\tF6P (abcdef) <-> DHAP (cba) + GAP (def)\n\
            TPI:\tDHAP (abc) <-> GAP (cba)\nPDH:\tPyr (abc) -> AcCoA (bc) + _c1_sink (a)\n\
            PC:\tPyr (abc) + _c1_in (d) -> OAA (abcd)\nout:\tPyr (abc) -> Pyr_sink (abc)\n"
        );

        let rows: Vec<_> = measurements.lines().skip(1).collect();
        assert_eq!(rows.len(), 12);
        assert_eq!(rows[0], "\tG6P\t1~2\t0\t0.7\t0.01");
        assert_eq!(rows[3], "\tAla\t2~3\t0\t0.5\t0.01");
        assert_eq!(rows[6], "\tGlu\t1~5\t0\t0.2\t0.01");
        assert_eq!(rows[11], "\t\t\t5\t0.1\t0.01");

        // The compiled reactions can be read back from the intermediate text
        let reactions = compile_network(NETWORK, &config).unwrap();
        let txt = render_network(&reactions, config.banner.as_deref());
        assert_eq!(parse_records(&txt), Ok(reactions));
    }
}
