//! Labelled `miette` diagnostics for `nom` parsers that run over single lines of a larger file

use std::fmt;

use ahash::HashMap;
use miette::{Diagnostic, LabeledSpan, SourceSpan};
use nom::{
    Err, Finish, IResult, Parser,
    combinator::{all_consuming, complete},
    error::{ErrorKind, ParseError},
};
use thiserror::Error;

// Final Errors ========================================================================================================

/// A parse error that owns the line it was raised on, so that it can be rendered by `miette` long after the
/// original input has been dropped
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct LabeledError<E: LabeledErrorKind> {
    source_line: String,
    line: Option<usize>,
    labels: Vec<LabeledSpan>,
    error: ErrorTree<E>,
}

#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum ErrorTree<E: LabeledErrorKind> {
    #[error("{kind}")]
    Node {
        kind: E,
        cause: Option<Box<LabeledError<E>>>,
    },
    #[error("attempted {} parse branches unsuccessfully", .0.len())]
    Branch(Vec<LabeledError<E>>),
}

pub trait LabeledErrorKind: Diagnostic + Clone + Eq {
    fn label(&self) -> Option<&'static str> {
        None
    }
}

impl<E: LabeledErrorKind> LabeledError<E> {
    /// Builds an error for a problem that was found *after* tokenizing, pointing at `span` of `source_line`
    pub fn new(source_line: &str, span: impl Into<SourceSpan>, kind: E) -> Self {
        let label = kind.label().map(str::to_owned);
        let labels = [LabeledSpan::new_with_span(label, span)];
        Self::new_with_labels(source_line, labels, kind)
    }

    pub fn new_with_labels(
        source_line: &str,
        labels: impl IntoIterator<Item = LabeledSpan>,
        kind: E,
    ) -> Self {
        Self {
            source_line: padded(source_line),
            line: None,
            labels: labels.into_iter().collect(),
            error: ErrorTree::Node { kind, cause: None },
        }
    }

    /// Attaches the (1-based) number of the line this error was raised on
    #[must_use]
    pub fn at_line(mut self, line: usize) -> Self {
        self.line = Some(line);
        self
    }

    pub const fn line(&self) -> Option<usize> {
        self.line
    }

    pub fn source_line(&self) -> &str {
        self.source_line
            .strip_suffix(' ')
            .unwrap_or(&self.source_line)
    }

    /// The kind of a leaf error, or `None` if this error collects several failed alternatives
    pub fn kind(&self) -> Option<&E> {
        match &self.error {
            ErrorTree::Node { kind, .. } => Some(kind),
            ErrorTree::Branch(_) => None,
        }
    }

    pub fn error_tree(&self) -> &ErrorTree<E> {
        &self.error
    }

    pub fn spans(&self) -> &[LabeledSpan] {
        &self.labels
    }

    // NOTE: Parent errors without their own labels borrow those of their children, so that the outermost error always
    // points at *something* in the line
    fn bubble_labels(&mut self) {
        if !self.labels.is_empty() {
            return;
        }
        match &mut self.error {
            ErrorTree::Node {
                cause: Some(child), ..
            } => {
                child.bubble_labels();
                self.labels = child.labels.drain(..).collect();
            }
            ErrorTree::Branch(alternatives) => {
                let labels = alternatives.iter_mut().flat_map(|child| {
                    child.bubble_labels();
                    child.labels.drain(..)
                });
                self.labels = merge_labels(labels);
            }
            ErrorTree::Node { cause: None, .. } => (),
        }
    }
}

impl<E: LabeledErrorKind> fmt::Display for LabeledError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(line) = self.line {
            write!(f, "line {line}: ")?;
        }
        write!(f, "{}", self.error)
    }
}

impl<E: LabeledErrorKind> std::error::Error for LabeledError<E> {}

impl<E: LabeledErrorKind> Diagnostic for LabeledError<E> {
    fn source_code(&self) -> Option<&dyn miette::SourceCode> {
        Some(&self.source_line)
    }

    fn help<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        self.kind().and_then(|kind| kind.help())
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        Some(Box::new(self.labels.iter().cloned()))
    }

    fn related<'a>(&'a self) -> Option<Box<dyn Iterator<Item = &'a dyn Diagnostic> + 'a>> {
        if let ErrorTree::Branch(related) = &self.error {
            Some(Box::new(related.iter().map(|e| e as &dyn Diagnostic)))
        } else {
            None
        }
    }

    fn diagnostic_source(&self) -> Option<&dyn Diagnostic> {
        if let ErrorTree::Node { cause, .. } = &self.error {
            cause.as_deref().map(|e| e as &dyn Diagnostic)
        } else {
            None
        }
    }
}

// NOTE: Labels sharing a span are joined with "or" instead of being drawn on top of each other
fn merge_labels(labels: impl Iterator<Item = LabeledSpan>) -> Vec<LabeledSpan> {
    let mut span_map: HashMap<SourceSpan, Vec<String>> = HashMap::default();
    let mut order = Vec::new();
    for labeled_span in labels {
        let span = *labeled_span.inner();
        let label = labeled_span.label().map(str::to_owned);
        let entry = span_map.entry(span).or_insert_with(|| {
            order.push(span);
            Vec::new()
        });
        entry.extend(label);
    }
    order
        .into_iter()
        .map(|span| {
            let labels = span_map.remove(&span).unwrap_or_default();
            let label = (!labels.is_empty()).then(|| labels.join(" or "));
            LabeledSpan::new_with_span(label, span)
        })
        .collect()
}

// NOTE: The additional space is added so that labels can point just past the end of a line
fn padded(source_line: &str) -> String {
    format!("{source_line} ")
}

// Parse Errors ========================================================================================================

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct LabeledParseError<'a, E> {
    input: &'a str,
    length: usize,
    kind: E,
    alternatives: Vec<LabeledParseError<'a, E>>,
    cause: Option<Box<LabeledParseError<'a, E>>>,
}

pub trait FromExternalError<'a, X>: Sized {
    const FATAL: bool = false;

    fn from_external_error(input: &'a str, error: X) -> LabeledParseError<'a, Self>;
}

impl<'a, E: LabeledErrorKind> LabeledParseError<'a, E> {
    pub fn new(input: &'a str, kind: E) -> Self {
        Self::new_with_cause(input, kind, None)
    }

    pub fn new_with_cause(input: &'a str, kind: E, cause: Option<Self>) -> Self {
        Self {
            input,
            length: 0,
            kind,
            alternatives: Vec::new(),
            cause: cause.map(Box::new),
        }
    }

    fn into_final_error(self, source_line: &str) -> LabeledError<E> {
        let span = self.span_within(source_line);
        let Self {
            kind,
            alternatives,
            cause,
            input,
            length,
        } = self;

        if alternatives.is_empty() {
            let cause = cause.map(|e| Box::new(e.into_final_error(source_line)));
            let labels = kind
                .label()
                .map(|l| LabeledSpan::new_with_span(Some(l.to_owned()), span))
                .into_iter()
                .collect();
            LabeledError {
                source_line: padded(source_line),
                line: None,
                labels,
                error: ErrorTree::Node { kind, cause },
            }
        } else {
            let first = Self {
                input,
                length,
                kind,
                alternatives: Vec::new(),
                cause,
            };
            let branches = std::iter::once(first)
                .chain(alternatives)
                .map(|e| e.into_final_error(source_line))
                .collect();
            LabeledError {
                source_line: padded(source_line),
                line: None,
                labels: Vec::new(),
                error: ErrorTree::Branch(branches),
            }
        }
    }

    // NOTE: `input` is always a suffix of some sub-slice of `source_line`, so its offset can be recovered from the
    // difference between the two pointers
    fn span_within(&self, source_line: &str) -> SourceSpan {
        let base_addr = source_line.as_ptr() as usize;
        let substr_addr = self.input.as_ptr() as usize;
        let start = substr_addr.saturating_sub(base_addr).min(source_line.len());
        SourceSpan::from(start..start + self.length)
    }
}

impl<'a, E: LabeledErrorKind + From<ErrorKind>> ParseError<&'a str> for LabeledParseError<'a, E> {
    fn from_error_kind(input: &'a str, kind: ErrorKind) -> Self {
        Self::new(input, kind.into())
    }

    fn append(_input: &str, _kind: ErrorKind, other: Self) -> Self {
        other
    }

    fn or(self, other: Self) -> Self {
        let mut alternatives = self.alternatives;
        alternatives.push(other);
        Self {
            alternatives,
            ..self
        }
    }
}

// Combinators =========================================================================================================

/// Runs `parser` over a whole line, converting any failure into a [`LabeledError`]
pub fn final_parser<'a, O, P, E>(parser: P) -> impl FnMut(&'a str) -> Result<O, LabeledError<E>>
where
    E: LabeledErrorKind + From<ErrorKind>,
    P: Parser<&'a str, O, LabeledParseError<'a, E>>,
{
    let mut parser = all_consuming(complete(parser));
    move |input| finish(&mut parser, input, input)
}

/// Like [`final_parser`], but for parsers run over a sub-slice of `source_line`. The spans of any errors are then
/// reported relative to the start of the full line
pub fn final_parser_within<'a, O, P, E>(
    source_line: &'a str,
    parser: P,
) -> impl FnMut(&'a str) -> Result<O, LabeledError<E>>
where
    E: LabeledErrorKind + From<ErrorKind>,
    P: Parser<&'a str, O, LabeledParseError<'a, E>>,
{
    let mut parser = all_consuming(complete(parser));
    move |input| finish(&mut parser, source_line, input)
}

fn finish<'a, O, P, E>(
    parser: &mut P,
    source_line: &str,
    input: &'a str,
) -> Result<O, LabeledError<E>>
where
    E: LabeledErrorKind,
    P: Parser<&'a str, O, LabeledParseError<'a, E>>,
{
    parser.parse(input).finish().map(|(_, o)| o).map_err(|e| {
        let mut error = e.into_final_error(source_line);
        error.bubble_labels();
        error
    })
}

pub fn map_res<'a, O1, O2, E, X, F, G>(
    mut parser: F,
    mut f: G,
) -> impl FnMut(&'a str) -> IResult<&'a str, O2, LabeledParseError<'a, E>>
where
    E: LabeledErrorKind + FromExternalError<'a, X>,
    F: Parser<&'a str, O1, LabeledParseError<'a, E>>,
    G: FnMut(O1) -> Result<O2, X>,
{
    move |input| {
        let (rest, o1) = parser.parse(input)?;
        match f(o1) {
            Ok(o2) => Ok((rest, o2)),
            Err(x) => {
                let e = LabeledParseError {
                    length: input.len() - rest.len(),
                    ..E::from_external_error(input, x)
                };
                Err(if E::FATAL {
                    Err::Failure(e)
                } else {
                    Err::Error(e)
                })
            }
        }
    }
}

/// Wraps any error from `parser` in a new error of `kind`, keeping the original as its cause
pub fn wrap_err<'a, O, P, E>(
    mut parser: P,
    kind: E,
) -> impl FnMut(&'a str) -> IResult<&'a str, O, LabeledParseError<'a, E>>
where
    E: LabeledErrorKind,
    P: Parser<&'a str, O, LabeledParseError<'a, E>>,
{
    move |i| {
        parser
            .parse(i)
            .map_err(|e| e.map(|e| LabeledParseError::new_with_cause(i, kind.clone(), Some(e))))
    }
}

/// Replaces any error from `parser` with a new error of `kind`
pub fn expect<'a, O, P, E>(
    mut parser: P,
    kind: E,
) -> impl FnMut(&'a str) -> IResult<&'a str, O, LabeledParseError<'a, E>>
where
    E: LabeledErrorKind,
    P: Parser<&'a str, O, LabeledParseError<'a, E>>,
{
    move |i| {
        parser
            .parse(i)
            .map_err(|e| e.map(|_| LabeledParseError::new(i, kind.clone())))
    }
}

#[cfg(test)]
mod tests {
    use nom::{
        branch::alt,
        character::complete::{alpha1, char, digit1},
        sequence::preceded,
    };

    use super::*;

    #[derive(Clone, Eq, PartialEq, Debug, Diagnostic, Error)]
    enum TestErrorKind {
        #[error("expected a digit")]
        ExpectedDigit,

        #[diagnostic(help("letters are spelled out in full"))]
        #[error("expected a letter")]
        ExpectedLetter,

        #[error("expected a value")]
        ExpectedValue,

        #[error("value {0} is too large")]
        TooLarge(u32),

        #[error("internal `nom` error: {0:?}")]
        NomError(ErrorKind),
    }

    impl LabeledErrorKind for TestErrorKind {
        fn label(&self) -> Option<&'static str> {
            Some(match self {
                Self::ExpectedDigit => "digit",
                Self::ExpectedLetter => "letter",
                Self::TooLarge(_) => "too large",
                _ => return None,
            })
        }
    }

    impl From<ErrorKind> for TestErrorKind {
        fn from(value: ErrorKind) -> Self {
            Self::NomError(value)
        }
    }

    impl<'a> FromExternalError<'a, u32> for TestErrorKind {
        const FATAL: bool = true;

        fn from_external_error(input: &'a str, n: u32) -> LabeledParseError<'a, Self> {
            LabeledParseError::new(input, Self::TooLarge(n))
        }
    }

    type ParseResult<'a, O> = IResult<&'a str, O, LabeledParseError<'a, TestErrorKind>>;

    fn digits(i: &str) -> ParseResult<&str> {
        expect(digit1, TestErrorKind::ExpectedDigit)(i)
    }

    fn letters(i: &str) -> ParseResult<&str> {
        expect(alpha1, TestErrorKind::ExpectedLetter)(i)
    }

    fn small(i: &str) -> ParseResult<u32> {
        map_res(digits, |d: &str| {
            let n: u32 = d.parse().unwrap_or(u32::MAX);
            if n < 10 { Ok(n) } else { Err(n) }
        })(i)
    }

    #[test]
    fn test_spans_are_relative_to_the_full_line() {
        let line = "id: 12x";
        let mut parser = final_parser_within(line, preceded(char(' '), digits));
        let error = parser(&line[3..]).unwrap_err();
        // The digits parse, but `x` is left over
        assert_eq!(error.spans().len(), 0);
        assert_eq!(error.source_line(), line);

        let line = "id: x";
        let mut parser = final_parser_within(line, preceded(char(' '), digits));
        let error = parser(&line[3..]).unwrap_err();
        assert_eq!(error.kind(), Some(&TestErrorKind::ExpectedDigit));
        assert_eq!(error.spans().len(), 1);
        assert_eq!(error.spans()[0].offset(), 4);
        assert_eq!(error.spans()[0].label(), Some("digit"));
    }

    #[test]
    fn test_line_numbers() {
        let error = final_parser(digits)("abc").unwrap_err();
        assert_eq!(error.line(), None);
        assert_eq!(error.to_string(), "expected a digit");

        let error = error.at_line(42);
        assert_eq!(error.line(), Some(42));
        assert_eq!(error.to_string(), "line 42: expected a digit");
    }

    #[test]
    fn test_wrapped_errors_bubble_labels() {
        let mut parser = final_parser(wrap_err(digits, TestErrorKind::ExpectedValue));
        let error = parser("abc").unwrap_err();
        assert_eq!(error.kind(), Some(&TestErrorKind::ExpectedValue));
        assert_eq!(error.spans()[0].label(), Some("digit"));
        let cause = error.diagnostic_source().unwrap();
        assert_eq!(cause.to_string(), "expected a digit");
    }

    #[test]
    fn test_alternatives_are_merged() {
        let mut parser = final_parser(alt((digits, letters)));
        let error = parser("+").unwrap_err();
        assert_eq!(error.kind(), None);
        assert_eq!(
            error.to_string(),
            "attempted 2 parse branches unsuccessfully"
        );
        assert_eq!(error.spans().len(), 1);
        assert_eq!(error.spans()[0].label(), Some("digit or letter"));
        assert_eq!(error.related().unwrap().count(), 2);
    }

    #[test]
    fn test_map_res() {
        assert_eq!(small("7"), Ok(("", 7)));
        let Err(Err::Failure(error)) = small("42") else {
            panic!("expected a fatal error");
        };
        assert_eq!(error.kind, TestErrorKind::TooLarge(42));
        assert_eq!(error.length, 2);
    }

    #[test]
    fn test_structural_errors() {
        let error = LabeledError::new("a b c", 2..3, TestErrorKind::ExpectedLetter).at_line(7);
        assert_eq!(error.to_string(), "line 7: expected a letter");
        assert_eq!(error.spans()[0].offset(), 2);
        assert_eq!(error.spans()[0].len(), 1);
        assert_eq!(
            error.help().map(|h| h.to_string()),
            Some("letters are spelled out in full".to_owned())
        );
    }
}
