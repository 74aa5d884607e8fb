//! This module implements the tokenizer.
//!
//! Tokens are recognized by a fixed, ordered list of rules applied at the
//! current read position; the first rule that matches a non-empty prefix
//! wins. pom's ordered choice (`|`) is exactly that, so each rule is a pom
//! parser over `&[char]` and the whole tokenizer is one alternation.
//!
//! Developer notes:
//!
//! * Rule order is load-bearing. `def ` must be tried before the identifier
//!   rule or it lexes as a bare identifier. Likewise the assignment-line
//!   rule must come before the identifier rule, otherwise the left-hand name
//!   is taken as an identifier and the right-hand text of the line is lost.
//!
//! * An assignment line is captured as ONE token whose text is the whole
//!   line, right-hand side untokenized. The parser later re-lexes that text
//!   (see `parse::Parser::parse_assignment`).

use pom::parser::{end, is_a, none_of, one_of, sym, tag, Parser};

use crate::lang::error::{Error, Result};
use crate::lang::token::{Token, TokenKind};

fn ident_char(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn space<'a>() -> Parser<'a, char, ()> {
    one_of(" \t\r\n").repeat(0..).discard()
}

/// Wrap a rule so it yields a token carrying the raw matched text
fn lexeme<'a>(rule: Parser<'a, char, ()>, kind: TokenKind) -> Parser<'a, char, Token> {
    rule.collect()
        .map(move |matched| Token::new(kind, matched.iter().collect()))
}

fn def_rule<'a>() -> Parser<'a, char, ()> {
    // The trailing space is part of the keyword; `define` stays an identifier
    tag("def ").discard()
}

fn end_rule<'a>() -> Parser<'a, char, ()> {
    // Word boundary: `ending` must not lex as `end`
    (tag("end") - !is_a(|c: char| c.is_ascii_alphanumeric() || c == '_')).discard()
}

fn assignment_line_rule<'a>() -> Parser<'a, char, ()> {
    (is_a(ident_char).repeat(1..)
        - one_of(" \t").opt()
        - sym('=')
        - one_of(" \t").opt()
        - none_of("\n").repeat(1..)
        - sym('\n'))
    .discard()
}

fn identifier_rule<'a>() -> Parser<'a, char, ()> {
    is_a(ident_char).repeat(1..).discard()
}

fn integer_rule<'a>() -> Parser<'a, char, ()> {
    is_a(|c: char| c.is_ascii_digit()).repeat(1..).discard()
}

fn string_rule<'a>() -> Parser<'a, char, ()> {
    (one_of("'\"") - none_of("'\"").repeat(1..) - one_of("'\"")).discard()
}

fn token<'a>() -> Parser<'a, char, Token> {
    // NB: ordered choice -- see the module notes before reordering
    lexeme(def_rule(), TokenKind::Def)
        | lexeme(end_rule(), TokenKind::End)
        | lexeme(assignment_line_rule(), TokenKind::AssignmentLine)
        | lexeme(identifier_rule(), TokenKind::Identifier)
        | lexeme(integer_rule(), TokenKind::Integer)
        | lexeme(string_rule(), TokenKind::Str)
        | lexeme(sym('(').discard(), TokenKind::OpenParen)
        | lexeme(sym(')').discard(), TokenKind::CloseParen)
        | lexeme(sym(',').discard(), TokenKind::Comma)
        | lexeme(sym('+').discard(), TokenKind::Add)
        | lexeme(sym('-').discard(), TokenKind::Subtract)
        | lexeme(sym('*').discard(), TokenKind::Multiply)
        | lexeme(sym('/').discard(), TokenKind::Divide)
}

/// Dig the failure offset out of a (possibly nested) pom error
fn error_offset(err: &pom::Error) -> usize {
    match err {
        pom::Error::Incomplete => usize::MAX,
        pom::Error::Mismatch { position, .. } | pom::Error::Conversion { position, .. } => {
            *position
        }
        pom::Error::Expect { inner, .. } => error_offset(inner),
        pom::Error::Custom {
            position, inner, ..
        } => inner.as_deref().map(error_offset).unwrap_or(*position),
    }
}

/// Tokenize `source` in full.
///
/// Consumes whitespace between tokens. Fails with the unmatched remainder
/// of the input when no rule applies.
pub fn lex(source: &str) -> Result<Vec<Token>> {
    let chars: Vec<char> = source.chars().collect();
    let tokens = space() * (token() - space()).repeat(0..) - end();

    tokens.parse(&chars).map_err(|err| {
        let at = error_offset(&err).min(chars.len());
        Error::Lex(chars[at..].iter().collect())
    })
}

#[cfg(test)]
fn kinds(source: &str) -> Vec<TokenKind> {
    lex(source)
        .expect("Failed to lex")
        .into_iter()
        .map(|tok| tok.kind)
        .collect()
}

#[test]
fn test_whole_program() {
    let source = "def main()\n  x = 2 + 3\n  x\nend";
    let tokens = lex(source).expect("Failed to lex");

    let expected = vec![
        (TokenKind::Def, "def "),
        (TokenKind::Identifier, "main"),
        (TokenKind::OpenParen, "("),
        (TokenKind::CloseParen, ")"),
        (TokenKind::AssignmentLine, "x = 2 + 3\n"),
        (TokenKind::Identifier, "x"),
        (TokenKind::End, "end"),
    ];

    assert_eq!(tokens.len(), expected.len());
    for (tok, (kind, text)) in tokens.iter().zip(expected) {
        assert_eq!(tok.kind, kind);
        assert_eq!(tok.text, text);
    }
}

#[test]
fn test_rule_order() {
    // `def` only wins with its trailing space
    assert_eq!(kinds("deficit"), vec![TokenKind::Identifier]);
    assert_eq!(
        kinds("def deficit"),
        vec![TokenKind::Def, TokenKind::Identifier]
    );

    // `end` needs a word boundary
    assert_eq!(kinds("ending"), vec![TokenKind::Identifier]);
    assert_eq!(kinds("end"), vec![TokenKind::End]);

    // An assignment line wins over lexing its name as an identifier, even
    // when the name starts with a keyword
    assert_eq!(kinds("define = 3\n"), vec![TokenKind::AssignmentLine]);
    assert_eq!(kinds("x = foo(1)\n"), vec![TokenKind::AssignmentLine]);
}

#[test]
fn test_literals() {
    let data = vec![
        ("42", TokenKind::Integer, "42"),
        ("'hello'", TokenKind::Str, "'hello'"),
        ("\"hello world\"", TokenKind::Str, "\"hello world\""),
        ("snake_case", TokenKind::Identifier, "snake_case"),
    ];

    for (source, kind, text) in data {
        let tokens = lex(source).expect("Failed to lex");
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].kind, kind);
        assert_eq!(tokens[0].text, text);
    }
}

#[test]
fn test_punctuation_and_operators() {
    assert_eq!(
        kinds("add(2, 3) + 1 - 2 * 3 / 4"),
        vec![
            TokenKind::Identifier,
            TokenKind::OpenParen,
            TokenKind::Integer,
            TokenKind::Comma,
            TokenKind::Integer,
            TokenKind::CloseParen,
            TokenKind::Add,
            TokenKind::Integer,
            TokenKind::Subtract,
            TokenKind::Integer,
            TokenKind::Multiply,
            TokenKind::Integer,
            TokenKind::Divide,
            TokenKind::Integer,
        ]
    );
}

#[test]
fn test_empty_input() {
    assert!(lex("").expect("Failed to lex").is_empty());
    assert!(lex("  \n\t ").expect("Failed to lex").is_empty());
}

#[test]
fn test_unmatched_remainder() {
    match lex("x @ y") {
        Err(Error::Lex(rest)) => assert_eq!(rest, "@ y"),
        other => panic!("Expected lex error, got {:?}", other),
    }

    // An assignment needs its terminating line break; without one the bare
    // `=` has no rule
    match lex("x = 1") {
        Err(Error::Lex(rest)) => assert_eq!(rest, "= 1"),
        other => panic!("Expected lex error, got {:?}", other),
    }
}

#[test]
fn test_round_trip() {
    let source =
        "def add(a, b)\n  a + b\nend\ndef main()\n  x = add(2, 3)\n  print('sum', x)\nend";
    let tokens = lex(source).expect("Failed to lex");

    let strip = |s: &str| s.chars().filter(|c| !c.is_whitespace()).collect::<String>();
    let joined = tokens
        .iter()
        .map(|tok| tok.text.as_str())
        .collect::<String>();

    assert_eq!(strip(source), strip(&joined));
}
