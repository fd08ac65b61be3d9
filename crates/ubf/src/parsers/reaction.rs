use std::ops::Range;

use itertools::Itertools;
use log::warn;
use miette::LabeledSpan;
use nom::Offset;
use nom_miette::{LabeledError, LabeledErrorKind};

use crate::{
    AtomLabel, RawLine, ReactionSpec, SeparatorKind,
    atoms::LabelError,
    balance::{Equation, balance},
};

use super::{
    errors::{ReactionError, ReactionErrorKind},
    lexer::{Token, TokenKind, tokenize},
};

// Public API ==========================================================================================================

/// Compiles a single line of a network's reaction section
///
/// Lines are written as `[full name ,] short name : left -> right  left labels -> right labels`, where the
/// metabolites of the right side and the atom labels of the left side share the text between the two arrows. Atom
/// labels are runs of carbon positions, so `123` labels carbons `a`, `b` and `c`.
///
/// # Errors
///
/// Any malformed line, or one that can't be balanced, returns a [`ReactionError`] carrying `line.number`.
pub fn parse_reaction(line: RawLine) -> Result<ReactionSpec, ReactionError> {
    reaction(line.text).map_err(|e| e.at_line(line.number))
}

// Private Sub-Parsers =================================================================================================

fn reaction(line: &str) -> Result<ReactionSpec, ReactionError> {
    let ((full_name, short_name), equations) = split_names(line)?;

    let tokens = tokenize(line, equations)?;
    let (separator, [p1, p2, p3]) = split_equations(line, &tokens)?;

    let left_names = merged_names(line, p1);
    let (right_names, left_groups) = interleaved(p2);
    let right_groups: Vec<_> = p3
        .iter()
        .filter(|token| match token.kind {
            TokenKind::Number => true,
            TokenKind::Identifier => {
                warn!("ignoring {:?} among the right-hand atom labels of {short_name:?}", token.text);
                false
            }
            _ => false,
        })
        .collect();

    let equation = Equation {
        left_names,
        left_labels: atom_labels(line, &left_groups)?,
        right_names,
        right_labels: atom_labels(line, &right_groups)?,
    };
    let (left, right) = balance(equation).map_err(|kind| {
        let span = tokens.first().map_or(0, |t| t.offset)..tokens.last().map_or(0, Token::end);
        LabeledError::new(line, span, kind)
    })?;

    Ok(ReactionSpec::new(
        full_name.map(str::to_owned),
        short_name,
        separator,
        left,
        right,
    ))
}

type Names<'s> = (Option<&'s str>, &'s str);

/// Splits `[full name ,] short name : equations` into its names and equations
fn split_names(line: &str) -> Result<(Names<'_>, &str), ReactionError> {
    let Some((names, equations)) = line.split_once(':') else {
        let end = line.len();
        return Err(LabeledError::new(line, end..end, ReactionErrorKind::ExpectedColon));
    };

    if let Some(extra) = equations.find(':') {
        let offset = names.len() + 1 + extra;
        return Err(LabeledError::new(line, offset..offset + 1, ReactionErrorKind::ExtraColon));
    }

    let (full_name, short_name) = match names.split_once(',') {
        Some((full_name, short_name)) => (Some(full_name.trim()), short_name.trim()),
        None => (None, names.trim()),
    };
    if short_name.is_empty() {
        let colon = names.len();
        return Err(LabeledError::new(line, colon..colon, ReactionErrorKind::ExpectedShortName));
    }
    // NOTE: Compiled records starting with `#` would be read back as comments
    if short_name.starts_with('#') {
        let start = line.offset(short_name);
        return Err(LabeledError::new(line, start..start + 1, ReactionErrorKind::CommentedShortName));
    }

    Ok(((full_name, short_name), equations))
}

type Parts<'t, 's> = (SeparatorKind, [&'t [Token<'s>]; 3]);

/// Checks that the metabolite equation and the atom mapping use the same arrow, then splits the tokens around them
fn split_equations<'t, 's>(line: &str, tokens: &'t [Token<'s>]) -> Result<Parts<'t, 's>, ReactionError> {
    let arrows: Vec<_> = tokens
        .iter()
        .positions(|token| token.kind == TokenKind::Separator)
        .collect();

    let &[first, second] = arrows.as_slice() else {
        let kind = ReactionErrorKind::SeparatorCount {
            count: arrows.len(),
        };
        let labels: Vec<_> = if arrows.is_empty() {
            vec![label(&kind, 0..line.len())]
        } else {
            arrows.iter().map(|&i| label(&kind, tokens[i].span())).collect()
        };
        return Err(LabeledError::new_with_labels(line, labels, kind));
    };

    let (first_arrow, second_arrow) = (tokens[first], tokens[second]);
    if first_arrow.text != second_arrow.text {
        let kind = ReactionErrorKind::SeparatorMismatch {
            first: first_arrow.text.to_owned(),
            second: second_arrow.text.to_owned(),
        };
        let labels = [
            label(&kind, first_arrow.span()),
            label(&kind, second_arrow.span()),
        ];
        return Err(LabeledError::new_with_labels(line, labels, kind));
    }

    let separator = first_arrow
        .text
        .parse::<SeparatorKind>()
        .map_err(|kind| LabeledError::new(line, first_arrow.span(), kind))?;

    let parts = [
        &tokens[..first],
        &tokens[first + 1..second],
        &tokens[second + 1..],
    ];
    Ok((separator, parts))
}

// NOTE: Names can start with digits on the left side (like `3PG`), which the lexer splits into a number and an
// identifier, so tokens that touch are glued back together
fn merged_names(line: &str, tokens: &[Token]) -> Vec<String> {
    let mut spans: Vec<Range<usize>> = Vec::new();
    let names = tokens
        .iter()
        .filter(|token| matches!(token.kind, TokenKind::Identifier | TokenKind::Number));
    for token in names {
        match spans.last_mut() {
            Some(span) if span.end == token.offset => span.end = token.end(),
            _ => spans.push(token.span()),
        }
    }
    spans.into_iter().map(|span| line[span].to_owned()).collect()
}

/// Separates the right-hand metabolites from the left-hand atom labels that share the middle of a reaction
fn interleaved<'t, 's>(tokens: &'t [Token<'s>]) -> (Vec<String>, Vec<&'t Token<'s>>) {
    let mut names = Vec::new();
    let mut labels = Vec::new();
    for token in tokens {
        match token.kind {
            TokenKind::Identifier => names.push(token.text.to_owned()),
            TokenKind::Number => labels.push(token),
            _ => (),
        }
    }
    (names, labels)
}

fn atom_labels(line: &str, groups: &[&Token]) -> Result<Vec<AtomLabel>, ReactionError> {
    groups
        .iter()
        .map(|token| {
            AtomLabel::from_digits(token.text).map_err(|e| {
                let (LabelError::NotADigit { position, .. }
                | LabelError::AlphabetOverflow { position, .. }) = e;
                let offset = token.offset + position;
                LabeledError::new(line, offset..offset + 1, ReactionErrorKind::from(e))
            })
        })
        .collect()
}

fn label(kind: &ReactionErrorKind, span: Range<usize>) -> LabeledSpan {
    LabeledSpan::new_with_span(kind.label().map(str::to_owned), span)
}
