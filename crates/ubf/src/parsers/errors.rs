use std::str::FromStr;

use miette::Diagnostic;
use nom::{IResult, error::ErrorKind};
use nom_miette::{FromExternalError, LabeledError, LabeledErrorKind, LabeledParseError};
use thiserror::Error;

use crate::{SeparatorKind, SideKind, atoms::LabelError};

pub type ReactionError = LabeledError<ReactionErrorKind>;
pub type ParseResult<'a, O> = IResult<&'a str, O, LabeledParseError<'a, ReactionErrorKind>>;

#[derive(Clone, Eq, PartialEq, Debug, Diagnostic, Error)]
pub enum ReactionErrorKind {
    #[diagnostic(help(
        "reactions are written as `[full name,] short name: equation  atom mapping`"
    ))]
    #[error("expected a ':' between the reaction's name and its equations")]
    ExpectedColon,

    #[diagnostic(help("only a single ':' may follow the reaction's name"))]
    #[error("found more than one ':' in a reaction")]
    ExtraColon,

    #[error("expected a short name before the ':'")]
    ExpectedShortName,

    #[diagnostic(help(
        "compiled reactions starting with '#' are read as comments, so rename the reaction"
    ))]
    #[error("a short name can't start with '#'")]
    CommentedShortName,

    #[diagnostic(help(
        "metabolite names may only contain letters, digits, '_' and punctuation not used as a separator"
    ))]
    #[error("found a character that can't appear in a reaction equation")]
    UnexpectedCharacter,

    #[diagnostic(help(
        "the metabolite equation and the atom mapping each need exactly one arrow, like \
        `A -> B  12 -> 12`"
    ))]
    #[error("expected exactly 2 arrows, but found {count}")]
    SeparatorCount { count: usize },

    #[diagnostic(help(
        "a reversible reaction uses `<->` in both equations, an irreversible one uses `->` in both"
    ))]
    #[error("the metabolite equation uses {first:?}, but the atom mapping uses {second:?}")]
    SeparatorMismatch { first: String, second: String },

    #[diagnostic(help("try `->` for an irreversible reaction or `<->` for a reversible one"))]
    #[error("{0:?} is not a recognised arrow")]
    UnknownSeparator(String),

    #[diagnostic(help("carbon positions are single digits from 1 to 9"))]
    #[error("carbon position {index} has no atom label")]
    AlphabetOverflow { index: u32 },

    #[diagnostic(help(
        "every metabolite needs its own group of carbon positions, unless all groups are the same \
        length, in which case the last metabolite is repeated"
    ))]
    #[error("the {side} side has {names} metabolite(s) but {labels} atom label group(s)")]
    Alignment {
        side: SideKind,
        names: usize,
        labels: usize,
    },

    #[error("expected at least one metabolite on either side of the reaction")]
    MissingMetabolites,

    #[diagnostic(help(
        "carbons that appear on only one side must be labelled with positions absent from the other"
    ))]
    #[error("could not balance {left} carbon(s) on the left with {right} on the right")]
    Unbalanced { left: usize, right: usize },

    #[error("expected a compiled reaction record, like `HK:\tGlc (abcdef) -> G6P (abcdef)`")]
    ExpectedRecord,

    #[error("expected a metabolite followed by its atom label in parentheses, like `Glc (abc)`")]
    ExpectedTerm,

    #[error("expected an atom label of lowercase letters")]
    ExpectedAtomLabel,

    #[error("expected `->` or `<->`")]
    ExpectedSeparator,

    #[diagnostic(help(
        "this is an internal error that you shouldn't ever see! If you have gotten this error, \
        then please report it as a bug!"
    ))]
    #[error("internal `nom` error: {0:?}")]
    NomError(ErrorKind),

    #[diagnostic(help(
        "check the unparsed region for errors, or remove it from the rest of the reaction"
    ))]
    #[error("could not interpret the full input as a valid reaction")]
    Incomplete,
}

impl LabeledErrorKind for ReactionErrorKind {
    fn label(&self) -> Option<&'static str> {
        Some(match self {
            Self::ExpectedColon => "expected ':'",
            Self::ExtraColon => "extra ':'",
            Self::ExpectedShortName => "expected a name",
            Self::CommentedShortName => "starts a comment",
            Self::UnexpectedCharacter => "unexpected character",
            Self::SeparatorCount { .. } => "arrow",
            Self::SeparatorMismatch { .. } => "mismatched arrow",
            Self::UnknownSeparator(_) => "unknown arrow",
            Self::AlphabetOverflow { .. } => "no letter for this position",
            Self::Alignment { .. } => "unaligned equation",
            Self::MissingMetabolites => "no metabolites",
            Self::Unbalanced { .. } => "unbalanced atom mapping",
            Self::ExpectedTerm => "expected a term",
            Self::ExpectedAtomLabel => "expected an atom label",
            Self::ExpectedSeparator => "expected an arrow",
            Self::Incomplete => "input was valid up until this point",
            Self::NomError(_) => "the region that triggered this bug!",
            Self::ExpectedRecord => return None,
        })
    }
}

impl From<ErrorKind> for ReactionErrorKind {
    fn from(value: ErrorKind) -> Self {
        match value {
            ErrorKind::Eof => Self::Incomplete,
            kind => Self::NomError(kind),
        }
    }
}

impl From<LabelError> for ReactionErrorKind {
    fn from(value: LabelError) -> Self {
        match value {
            LabelError::AlphabetOverflow { index, .. } => Self::AlphabetOverflow { index },
            LabelError::NotADigit { .. } => Self::UnexpectedCharacter,
        }
    }
}

impl<'a> FromExternalError<'a, ReactionErrorKind> for ReactionErrorKind {
    const FATAL: bool = true;

    fn from_external_error(input: &'a str, e: ReactionErrorKind) -> LabeledParseError<'a, Self> {
        LabeledParseError::new(input, e)
    }
}

impl FromStr for SeparatorKind {
    type Err = ReactionErrorKind;

    /// Accepts `<->`, `->` and their variants drawn with more dashes or with `=` (`<==>`, `-->`, `==`)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let unknown = || ReactionErrorKind::UnknownSeparator(s.to_owned());
        let (reversible, shaft) = match (s.strip_prefix('<'), s.strip_suffix('>')) {
            (Some(_), Some(_)) if s.len() > 2 => (true, &s[1..s.len() - 1]),
            (None, Some(shaft)) => (false, shaft),
            (None, None) if s.chars().all(|c| c == '=') => (true, s),
            _ => return Err(unknown()),
        };

        if shaft.is_empty() || !shaft.chars().all(|c| c == '-' || c == '=') {
            return Err(unknown());
        }

        Ok(if reversible {
            Self::Reversible
        } else {
            Self::Irreversible
        })
    }
}
