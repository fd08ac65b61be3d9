use nom::{
    bytes::complete::{take_till1, take_while1},
    character::complete::{char, digit1, space0, space1},
    combinator::{map, opt},
    multi::separated_list1,
    sequence::{delimited, pair, preceded, terminated, tuple},
};
use nom_miette::{LabeledError, expect, final_parser, map_res, wrap_err};

use crate::{AtomLabel, Participant, ReactionSpec, SeparatorKind, Side};

use super::{
    errors::{ParseResult, ReactionError, ReactionErrorKind},
    lexer::separator,
};

// Public API ==========================================================================================================

/// Reads compiled reaction records back in
///
/// A `#` comment directly above a record is taken as that reaction's full name, unless a blank line separates them.
///
/// # Errors
///
/// Returns the first line that isn't a comment, blank, or a well-formed record.
pub fn parse_records(text: &str) -> Result<Vec<ReactionSpec>, ReactionError> {
    let mut full_name = None;
    let mut reactions = Vec::new();
    for (index, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            full_name = None;
        } else if let Some(comment) = line.strip_prefix('#') {
            full_name = Some(comment.trim().to_owned());
        } else if !line.contains(':') {
            let error = LabeledError::new(line, 0..line.len(), ReactionErrorKind::ExpectedRecord);
            return Err(error.at_line(index + 1));
        } else {
            let (short_name, left, separator, right) =
                final_parser(record)(line).map_err(|e| e.at_line(index + 1))?;
            reactions.push(ReactionSpec::new(
                full_name.take(),
                short_name,
                separator,
                left,
                right,
            ));
        }
    }
    Ok(reactions)
}

// Private Sub-Parsers =================================================================================================

/// Record = Short Name , ":" , { space } , Side , { space } , Arrow , { space } , Side ;
fn record(i: &str) -> ParseResult<(&str, Side, SeparatorKind, Side)> {
    let short_name = map(take_till1(|c: char| c == ':'), str::trim);
    tuple((
        terminated(short_name, char(':')),
        preceded(space0, side),
        delimited(space1, arrow, space1),
        side,
    ))(i)
}

/// Side = Term , { { space } , "+" , { space } , Term } ;
fn side(i: &str) -> ParseResult<Side> {
    let plus = delimited(space0, char('+'), space0);
    map(separated_list1(plus, term), Side::from)(i)
}

/// Term = Metabolite , { space } , "(" , Atom Label , [ "#" , digit , { digit } ] , ")" ;
fn term(i: &str) -> ParseResult<Participant> {
    let metabolite = take_till1(|c: char| c.is_whitespace() || c == '(' || c == '+');
    let occurrence = opt(pair(char('#'), digit1));
    let label = delimited(char('('), terminated(atom_label, occurrence), char(')'));
    let parser = pair(terminated(metabolite, space0), label);
    wrap_err(
        map(parser, |(metabolite, label)| Participant::new(metabolite, label)),
        ReactionErrorKind::ExpectedTerm,
    )(i)
}

/// Atom Label = lowercase , { lowercase } ;
fn atom_label(i: &str) -> ParseResult<AtomLabel> {
    let letters = expect(
        take_while1(|c: char| c != ')' && c != '#'),
        ReactionErrorKind::ExpectedAtomLabel,
    );
    map_res(letters, |letters| {
        AtomLabel::from_letters(letters).ok_or(ReactionErrorKind::ExpectedAtomLabel)
    })(i)
}

/// Arrow = "->" | "<->" ;
fn arrow(i: &str) -> ParseResult<SeparatorKind> {
    let parser = expect(separator, ReactionErrorKind::ExpectedSeparator);
    map_res(parser, str::parse::<SeparatorKind>)(i)
}
