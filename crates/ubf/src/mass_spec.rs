//! Mass-spectrometry measurements, written as a fragment descriptor and its isotopologue intensities
//!
//! Each fragment is either written on one line (`glc C1-C3: 100 10 5`) or across two (`glc C1-C3` followed by
//! `100 10 5`). The range of carbons covered by a fragment is optional, and defaults to the first `n - 1` carbons
//! when `n` intensities are given.

use std::{
    fmt::{self, Display, Formatter},
    ops::Range,
    sync::LazyLock,
};

use log::{debug, info};
use miette::Diagnostic;
use nom::Offset;
use nom_miette::{LabeledError, LabeledErrorKind};
use regex::Regex;
use rust_decimal::Decimal;
use thiserror::Error;

use crate::ftbl::{MASS_SPECTROMETRY, MASS_SPECTROMETRY_COLUMNS};

pub type MassSpecError = LabeledError<MassSpecErrorKind>;

#[derive(Clone, Eq, PartialEq, Debug)]
pub struct MassSpecSection {
    fragments: Vec<MassSpecFragment>,
}

#[derive(Clone, Eq, PartialEq, Debug)]
pub struct MassSpecFragment {
    metabolite: String,
    start: u32,
    end: u32,
    base_intensity: String,
    deviation: Decimal,
    series: Vec<Isotopologue>,
}

/// A heavier isotopologue of a fragment, `offset` mass units above its base peak
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct Isotopologue {
    offset: usize,
    intensity: String,
    deviation: Decimal,
}

#[derive(Clone, Eq, PartialEq, Debug, Diagnostic, Error)]
pub enum MassSpecErrorKind {
    #[diagnostic(help("write each fragment as `metabolite C1-C3: intensities`"))]
    #[error("expected a ':' between the fragment and its intensities")]
    ExpectedColon,

    #[error("found more than one ':' in a measurement")]
    ExtraColon,

    #[error("expected the name of the measured metabolite")]
    ExpectedMetabolite,

    #[error("expected at least one intensity")]
    MissingIntensities,

    #[error("{0:?} is not a valid intensity")]
    InvalidIntensity(String),

    #[diagnostic(help("fragments are written as `C<first carbon>-C<last carbon>`, like `C1-C3`"))]
    #[error("the carbon range {start}-{end} is invalid")]
    InvalidRange { start: String, end: String },

    #[diagnostic(help(
        "write the fragment's carbon range, like `C1-C1`, or add its heavier isotopologues"
    ))]
    #[error("a fragment with a single intensity needs an explicit carbon range")]
    MissingRange,

    #[diagnostic(help("only the word `fragment` may follow the carbon range"))]
    #[error("found unexpected text after the fragment's carbon range")]
    UnexpectedDescriptorText,
}

impl LabeledErrorKind for MassSpecErrorKind {
    fn label(&self) -> Option<&'static str> {
        Some(match self {
            Self::ExpectedColon => "expected ':'",
            Self::ExtraColon => "extra ':'",
            Self::ExpectedMetabolite => "expected a metabolite",
            Self::MissingIntensities => "expected intensities",
            Self::InvalidIntensity(_) => "not a number",
            Self::InvalidRange { .. } => "invalid range",
            Self::MissingRange => "expected a carbon range",
            Self::UnexpectedDescriptorText => "unexpected text",
        })
    }
}

static FRAGMENT_RANGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"_?(?:fragment )?[Cc](\d+)-[Cc](\d+)(?: fragment)?\s*").unwrap()
});

/// Part of a numbered input line
#[derive(Copy, Clone, Debug)]
struct Field<'s> {
    number: usize,
    line: &'s str,
    text: &'s str,
}

impl<'s> Field<'s> {
    const fn line(number: usize, line: &'s str) -> Self {
        Self {
            number,
            line,
            text: line,
        }
    }

    /// Narrows this field to `text`, which must be a sub-slice of it
    const fn with_text(self, text: &'s str) -> Self {
        Self { text, ..self }
    }

    /// Builds an error pointing at `span` of this field, reported against its whole line
    fn error(&self, span: Range<usize>, kind: MassSpecErrorKind) -> MassSpecError {
        let shift = self.line.offset(self.text);
        let span = shift + span.start..shift + span.end;
        LabeledError::new(self.line, span, kind).at_line(self.number)
    }
}

impl MassSpecSection {
    /// Compiles every fragment in `text`, writing `deviation` next to each of its intensities
    ///
    /// # Errors
    ///
    /// Fails on the first fragment whose descriptor or intensities are malformed.
    pub fn parse(text: &str, deviation: Decimal) -> Result<Self, MassSpecError> {
        let lines: Vec<_> = text
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(index, line)| Field::line(index + 1, line))
            .collect();

        // NOTE: An even number of lines is still read one fragment per line when every line has a ':'
        let one_per_line = lines.len() % 2 == 1 || lines.iter().all(|line| line.text.contains(':'));

        let fragments = if one_per_line {
            lines
                .into_iter()
                .map(|line| {
                    let (descriptor, intensities) = split_measurement(line)?;
                    MassSpecFragment::parse(descriptor, intensities, deviation)
                })
                .collect::<Result<Vec<_>, _>>()?
        } else {
            lines
                .chunks_exact(2)
                .map(|pair| {
                    let descriptor = pair[0].text.trim_end();
                    let descriptor = pair[0].with_text(descriptor.strip_suffix(':').unwrap_or(descriptor));
                    MassSpecFragment::parse(descriptor, pair[1], deviation)
                })
                .collect::<Result<Vec<_>, _>>()?
        };

        info!("compiled {} mass-spectrometry fragments", fragments.len());
        Ok(Self { fragments })
    }

    pub fn fragments(&self) -> &[MassSpecFragment] {
        &self.fragments
    }

    /// The measurement rows of the section, without its header
    pub fn rows(&self) -> impl Iterator<Item = String> + '_ {
        self.fragments.iter().flat_map(MassSpecFragment::rows)
    }
}

fn split_measurement(line: Field) -> Result<(Field, Field), MassSpecError> {
    let Some((descriptor, intensities)) = line.text.split_once(':') else {
        let end = line.text.len();
        return Err(line.error(end..end, MassSpecErrorKind::ExpectedColon));
    };
    if let Some(extra) = intensities.find(':') {
        let offset = descriptor.len() + 1 + extra;
        return Err(line.error(offset..offset + 1, MassSpecErrorKind::ExtraColon));
    }
    Ok((line.with_text(descriptor), line.with_text(intensities)))
}

impl MassSpecFragment {
    fn parse(descriptor: Field, intensities: Field, deviation: Decimal) -> Result<Self, MassSpecError> {
        let values: Vec<_> = intensities.text.split_whitespace().collect();
        let Some((&base_intensity, series)) = values.split_first() else {
            let end = intensities.text.len();
            return Err(intensities.error(end..end, MassSpecErrorKind::MissingIntensities));
        };
        for &value in &values {
            if !value.parse::<f64>().is_ok_and(f64::is_finite) {
                let start = intensities.text.offset(value);
                let kind = MassSpecErrorKind::InvalidIntensity(value.to_owned());
                return Err(intensities.error(start..start + value.len(), kind));
            }
        }

        let (metabolite, start, end) = descriptor_range(descriptor, values.len())?;

        let series = series
            .iter()
            .enumerate()
            .map(|(index, intensity)| Isotopologue {
                offset: index + 1,
                intensity: (*intensity).to_owned(),
                deviation,
            })
            .collect();

        debug!("compiled the {metabolite} fragment C{start}-C{end}");
        Ok(Self {
            metabolite: metabolite.to_owned(),
            start,
            end,
            base_intensity: base_intensity.to_owned(),
            deviation,
            series,
        })
    }

    pub fn metabolite(&self) -> &str {
        &self.metabolite
    }

    /// The first and last carbons of the metabolite found in this fragment
    pub const fn range(&self) -> (u32, u32) {
        (self.start, self.end)
    }

    pub fn base_intensity(&self) -> &str {
        &self.base_intensity
    }

    pub fn series(&self) -> &[Isotopologue] {
        &self.series
    }

    /// A row for the base peak, then one continuation row per isotopologue
    pub fn rows(&self) -> impl Iterator<Item = String> + '_ {
        let base = format!(
            "\t{}\t{}~{}\t0\t{}\t{}",
            self.metabolite, self.start, self.end, self.base_intensity, self.deviation
        );
        let series = self.series.iter().map(|isotopologue| {
            format!(
                "\t\t\t{}\t{}\t{}",
                isotopologue.offset, isotopologue.intensity, isotopologue.deviation
            )
        });
        std::iter::once(base).chain(series)
    }
}

impl Isotopologue {
    pub const fn offset(&self) -> usize {
        self.offset
    }

    pub fn intensity(&self) -> &str {
        &self.intensity
    }

    pub const fn deviation(&self) -> Decimal {
        self.deviation
    }
}

// NOTE: Without an explicit range, a fragment holds as many carbons as it has heavier isotopologues
fn descriptor_range(descriptor: Field, intensities: usize) -> Result<(&str, u32, u32), MassSpecError> {
    let trimmed = descriptor.text.trim_end();
    let range = FRAGMENT_RANGE
        .captures(trimmed)
        .and_then(|captures| Some((captures.get(0)?, captures.get(1)?, captures.get(2)?)));

    let (metabolite, start, end) = match range {
        Some((whole, start, end)) => {
            if whole.end() != trimmed.len() {
                let span = whole.end()..trimmed.len();
                return Err(descriptor.error(span, MassSpecErrorKind::UnexpectedDescriptorText));
            }
            let invalid = || {
                let kind = MassSpecErrorKind::InvalidRange {
                    start: start.as_str().to_owned(),
                    end: end.as_str().to_owned(),
                };
                descriptor.error(whole.range(), kind)
            };
            let first: u32 = start.as_str().parse().map_err(|_| invalid())?;
            let last: u32 = end.as_str().parse().map_err(|_| invalid())?;
            if first == 0 || first > last {
                return Err(invalid());
            }
            (&trimmed[..whole.start()], first, last)
        }
        None if intensities < 2 => {
            let span = 0..descriptor.text.len();
            return Err(descriptor.error(span, MassSpecErrorKind::MissingRange));
        }
        None => {
            let carbons = u32::try_from(intensities - 1).unwrap_or(u32::MAX);
            (trimmed, 1, carbons)
        }
    };

    let metabolite = metabolite.trim();
    if metabolite.is_empty() {
        let span = 0..descriptor.text.len();
        return Err(descriptor.error(span, MassSpecErrorKind::ExpectedMetabolite));
    }
    Ok((metabolite, start, end))
}

impl Display for MassSpecSection {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        writeln!(f, "{MASS_SPECTROMETRY}")?;
        write!(f, "{MASS_SPECTROMETRY_COLUMNS}")?;
        for row in self.rows() {
            write!(f, "\n{row}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use insta::assert_debug_snapshot;

    use super::*;

    fn parse(text: &str) -> Result<MassSpecSection, MassSpecError> {
        MassSpecSection::parse(text, Decimal::new(1, 2))
    }

    fn rows(text: &str) -> Vec<String> {
        parse(text).unwrap().rows().collect()
    }

    fn error_kind(text: &str) -> MassSpecErrorKind {
        parse(text).unwrap_err().kind().cloned().unwrap()
    }

    #[test]
    fn test_one_line_fragment() {
        assert_eq!(
            rows("glc C1-C3: 100 10 5"),
            [
                "\tglc\t1~3\t0\t100\t0.01",
                "\t\t\t1\t10\t0.01",
                "\t\t\t2\t5\t0.01",
            ]
        );
    }

    #[test]
    fn test_descriptors() {
        macro_rules! assert_descriptor {
            ($input:literal, $metabolite:literal, $range:expr) => {
                let section = parse($input).unwrap();
                let fragment = &section.fragments()[0];
                assert_eq!(fragment.metabolite(), $metabolite);
                assert_eq!(fragment.range(), $range);
            };
        }
        assert_descriptor!("glc C1-C3: 100 10 5", "glc", (1, 3));
        assert_descriptor!("Ala_C2-C3: 0.5 0.3 0.2", "Ala", (2, 3));
        assert_descriptor!("Ala fragment C2-C3: 0.5 0.3 0.2", "Ala", (2, 3));
        assert_descriptor!("Ala c1-c2 fragment : 0.5 0.3 0.2", "Ala", (1, 2));
        assert_descriptor!("Ser C1-C12: 1 2", "Ser", (1, 12));
        // Default Ranges
        assert_descriptor!("Glu: 0.2 0.3 0.1 0.1 0.2 0.1", "Glu", (1, 5));
        assert_descriptor!("AcCoA: 10 20 30", "AcCoA", (1, 2));
        assert_descriptor!("Ala C1-C1: 1", "Ala", (1, 1));
    }

    #[test]
    fn test_layouts() {
        let one_per_line = indoc! {"
            glc C1-C3: 100 10 5

            Ala C2-C3: 0.5 0.3 0.2
        "};
        let two_per_fragment = indoc! {"
            glc C1-C3
            100 10 5
            Ala C2-C3:
            0.5 0.3 0.2
        "};
        assert_eq!(parse(one_per_line), parse(two_per_fragment));
        assert_eq!(parse(one_per_line).unwrap().fragments().len(), 2);

        // An odd number of lines is always read one fragment per line
        assert_eq!(
            error_kind("glc C1-C3\n100 10 5\nAla C2-C3: 1 2"),
            MassSpecErrorKind::ExpectedColon
        );
    }

    #[test]
    fn test_section() {
        let section = parse("glc C1-C2: 0.7 0.2 0.1\nAla C1-C1: 0.9 0.1").unwrap();
        assert_eq!(
            section.to_string(),
            "MASS_SPECTROMETRY\n\tMETA_NAME\tFRAGMENT\tWEIGHT\tVALUE\tDEVIATION\n\
            \tglc\t1~2\t0\t0.7\t0.01\n\t\t\t1\t0.2\t0.01\n\t\t\t2\t0.1\t0.01\n\
            \tAla\t1~1\t0\t0.9\t0.01\n\t\t\t1\t0.1\t0.01"
        );
        assert_eq!(parse("").unwrap().rows().count(), 0);
    }

    #[test]
    fn test_deviation() {
        let section = MassSpecSection::parse("glc C1-C2: 0.7 0.3", Decimal::new(25, 3)).unwrap();
        assert_eq!(
            section.rows().collect::<Vec<_>>(),
            ["\tglc\t1~2\t0\t0.7\t0.025", "\t\t\t1\t0.3\t0.025"]
        );
    }

    #[test]
    fn test_fragment() {
        let section = parse("Ala C2-C3: 0.5 0.3 0.2").unwrap();
        assert_debug_snapshot!(section.fragments()[0], @r#"
        MassSpecFragment {
            metabolite: "Ala",
            start: 2,
            end: 3,
            base_intensity: "0.5",
            deviation: 0.01,
            series: [
                Isotopologue {
                    offset: 1,
                    intensity: "0.3",
                    deviation: 0.01,
                },
                Isotopologue {
                    offset: 2,
                    intensity: "0.2",
                    deviation: 0.01,
                },
            ],
        }
        "#);
    }

    #[test]
    fn test_errors() {
        assert_eq!(error_kind("glc C1-C3 100 10 5"), MassSpecErrorKind::ExpectedColon);
        assert_eq!(error_kind("glc: C1-C3: 100"), MassSpecErrorKind::ExtraColon);
        assert_eq!(error_kind("glc C1-C3:"), MassSpecErrorKind::MissingIntensities);
        assert_eq!(
            error_kind("glc C1-C3: 100 1O 5"),
            MassSpecErrorKind::InvalidIntensity("1O".to_owned())
        );
        assert_eq!(
            error_kind("glc C3-C1: 100 10 5"),
            MassSpecErrorKind::InvalidRange {
                start: "3".to_owned(),
                end: "1".to_owned()
            }
        );
        assert_eq!(error_kind("C1-C3: 100 10 5"), MassSpecErrorKind::ExpectedMetabolite);
        assert_eq!(error_kind("Ala: 1"), MassSpecErrorKind::MissingRange);
        assert_eq!(
            error_kind("Ala C1-C0: 1"),
            MassSpecErrorKind::InvalidRange {
                start: "1".to_owned(),
                end: "0".to_owned()
            }
        );
        assert_eq!(
            error_kind("glc C1-C3: 100 NaN 5"),
            MassSpecErrorKind::InvalidIntensity("NaN".to_owned())
        );
        assert_eq!(
            error_kind("glc C1-C3: 100 10 inf"),
            MassSpecErrorKind::InvalidIntensity("inf".to_owned())
        );
        assert_eq!(
            error_kind("glc C1-C3 labelled: 100 10 5"),
            MassSpecErrorKind::UnexpectedDescriptorText
        );
    }

    #[test]
    fn test_error_locations() {
        let error = parse("glc C1-C3: 100 10 5\nAla C2-C3: 0.5 x").unwrap_err();
        assert_eq!(error.line(), Some(2));
        assert_eq!(error.source_line(), "Ala C2-C3: 0.5 x");
        assert_eq!(error.spans()[0].offset(), 15);
        assert_eq!(error.spans()[0].len(), 1);

        let error = parse("glc C1-C3\n100 10 5\nAla C2-C3 ?\n1 2").unwrap_err();
        assert_eq!(error.line(), Some(3));
        assert_eq!(error.kind(), Some(&MassSpecErrorKind::UnexpectedDescriptorText));
        assert_eq!(error.spans()[0].offset(), 10);
    }
}
