use std::ops::Range;

use nom::{
    Offset,
    branch::alt,
    bytes::complete::{is_a, take_while},
    character::complete::{char, digit1, multispace0, satisfy},
    combinator::{consumed, eof, map, opt, recognize, value},
    multi::many_till,
    sequence::{pair, preceded, tuple},
};
use nom_miette::{expect, final_parser_within};

use super::errors::{ParseResult, ReactionError, ReactionErrorKind};

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum TokenKind {
    Identifier,
    Number,
    Separator,
    Plus,
    Comma,
}

/// A lexeme of a reaction's equations, along with its byte offset in the full reaction line
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct Token<'s> {
    pub kind: TokenKind,
    pub text: &'s str,
    pub offset: usize,
}

impl Token<'_> {
    pub fn span(&self) -> Range<usize> {
        self.offset..self.end()
    }

    pub fn end(&self) -> usize {
        self.offset + self.text.len()
    }
}

// Public API ==========================================================================================================

/// Splits the `equations` of `line` into tokens, skipping whitespace. `equations` must be a sub-slice of `line`
pub fn tokenize<'s>(line: &'s str, equations: &'s str) -> Result<Vec<Token<'s>>, ReactionError> {
    let end = preceded(multispace0, eof);
    let tokens = many_till(preceded(multispace0, token(line)), end);
    final_parser_within(line, map(tokens, |(tokens, _)| tokens))(equations)
}

// Private Sub-Parsers =================================================================================================

/// Token = Separator | Number | Identifier | "+" | "," ;
fn token<'s>(line: &'s str) -> impl FnMut(&'s str) -> ParseResult<'s, Token<'s>> {
    let kind = alt((
        value(TokenKind::Separator, separator),
        value(TokenKind::Number, digit1),
        value(TokenKind::Identifier, identifier),
        value(TokenKind::Plus, char('+')),
        value(TokenKind::Comma, char(',')),
    ));
    let parser = consumed(expect(kind, ReactionErrorKind::UnexpectedCharacter));
    map(parser, move |(text, kind)| Token {
        kind,
        text,
        offset: line.offset(text),
    })
}

/// Separator = [ "<" ] , { "-" | "=" }- , [ ">" ] ;
pub(super) fn separator(i: &str) -> ParseResult<&str> {
    recognize(tuple((opt(char('<')), is_a("-="), opt(char('>')))))(i)
}

/// Identifier = ( letter | "_" ) , { name char } ;
fn identifier(i: &str) -> ParseResult<&str> {
    let first = satisfy(|c| c.is_alphabetic() || c == '_');
    recognize(pair(first, take_while(is_name_char)))(i)
}

// NOTE: Anything other than whitespace or the punctuation of the notation itself is fair game, so names like `G6P`,
// `Glc.ext` and `acetyl_CoA` are all single identifiers
fn is_name_char(c: char) -> bool {
    !c.is_whitespace() && !"+,:<>=-()#".contains(c)
}

#[cfg(test)]
mod tests {
    use super::*;
    use TokenKind::*;

    fn kinds(equations: &str) -> Vec<(TokenKind, &str)> {
        tokenize(equations, equations)
            .unwrap()
            .into_iter()
            .map(|t| (t.kind, t.text))
            .collect()
    }

    #[test]
    fn test_separator() {
        macro_rules! assert_separator {
            ($input:literal, $output:literal, $rest:literal) => {
                assert_eq!(separator($input), Ok(($rest, $output)));
            };
        }
        macro_rules! assert_error {
            ($input:literal) => {
                assert!(separator($input).is_err());
            };
        }
        // Valid Separators
        assert_separator!("->", "->", "");
        assert_separator!("<->", "<->", "");
        assert_separator!("<=> B", "<=>", " B");
        assert_separator!("-->", "-->", "");
        assert_separator!("=", "=", "");
        assert_separator!("<-", "<-", "");
        assert_separator!("->>", "->", ">");
        // Invalid Separators
        assert_error!(">");
        assert_error!("<");
        assert_error!("<>");
        assert_error!("+");
        assert_error!("");
    }

    #[test]
    fn test_identifier() {
        macro_rules! assert_identifier {
            ($input:literal, $output:literal, $rest:literal) => {
                assert_eq!(identifier($input), Ok(($rest, $output)));
            };
        }
        // Valid Identifiers
        assert_identifier!("Glc", "Glc", "");
        assert_identifier!("G6P + F6P", "G6P", " + F6P");
        assert_identifier!("_c2_in", "_c2_in", "");
        assert_identifier!("Glc.ext->", "Glc.ext", "->");
        assert_identifier!("CO2,", "CO2", ",");
        assert_identifier!("Ácido", "Ácido", "");
        // Invalid Identifiers
        assert!(identifier("3PG").is_err());
        assert!(identifier("-Glc").is_err());
        assert!(identifier(" Glc").is_err());
    }

    #[test]
    fn test_tokenize() {
        assert_eq!(
            kinds(" Glc -> G6P  123456 -> 123456"),
            [
                (Identifier, "Glc"),
                (Separator, "->"),
                (Identifier, "G6P"),
                (Number, "123456"),
                (Separator, "->"),
                (Number, "123456"),
            ]
        );
        assert_eq!(
            kinds("F6P<->DHAP+GAP 123456<->321,456"),
            [
                (Identifier, "F6P"),
                (Separator, "<->"),
                (Identifier, "DHAP"),
                (Plus, "+"),
                (Identifier, "GAP"),
                (Number, "123456"),
                (Separator, "<->"),
                (Number, "321"),
                (Comma, ","),
                (Number, "456"),
            ]
        );
        assert_eq!(
            kinds("3PG -> PEP  123 -> 123"),
            [
                (Number, "3"),
                (Identifier, "PG"),
                (Separator, "->"),
                (Identifier, "PEP"),
                (Number, "123"),
                (Separator, "->"),
                (Number, "123"),
            ]
        );
        assert!(kinds("  \t ").is_empty());
    }

    #[test]
    fn test_offsets_are_relative_to_the_line() {
        let line = "HK: Glc -> G6P";
        let tokens = tokenize(line, &line[3..]).unwrap();
        let spans: Vec<_> = tokens.iter().map(Token::span).collect();
        assert_eq!(spans, [4..7, 8..10, 11..14]);
        assert_eq!(&line[tokens[2].span()], "G6P");
    }

    #[test]
    fn test_unexpected_character() {
        let line = "HK: Glc (ext) -> G6P";
        let error = tokenize(line, &line[3..]).unwrap_err();
        assert_eq!(error.kind(), Some(&ReactionErrorKind::UnexpectedCharacter));
        assert_eq!(error.spans()[0].offset(), 8);
        assert_eq!(error.spans()[0].label(), Some("unexpected character"));
    }
}
