use std::collections::VecDeque;
use std::fmt;

use crate::lang::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Def,
    End,
    AssignmentLine,
    Identifier,
    Integer,
    Str,
    OpenParen,
    CloseParen,
    Comma,
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TokenKind::Def => "'def'",
            TokenKind::End => "'end'",
            TokenKind::AssignmentLine => "assignment line",
            TokenKind::Identifier => "identifier",
            TokenKind::Integer => "integer",
            TokenKind::Str => "string",
            TokenKind::OpenParen => "'('",
            TokenKind::CloseParen => "')'",
            TokenKind::Comma => "','",
            TokenKind::Add => "'+'",
            TokenKind::Subtract => "'-'",
            TokenKind::Multiply => "'*'",
            TokenKind::Divide => "'/'",
        };

        write!(f, "{}", name)
    }
}

/// A classified lexical unit together with the raw source text it matched.
///
/// `text` is verbatim: concatenating the `text` of every token reproduces
/// the source modulo whitespace.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
}

impl Token {
    pub fn new(kind: TokenKind, text: String) -> Self {
        Token { kind, text }
    }
}

/// Queue of tokens consumed front-to-back by the parser.
pub struct TokenStream {
    tokens: VecDeque<Token>,
}

impl TokenStream {
    pub fn new(tokens: Vec<Token>) -> Self {
        TokenStream {
            tokens: tokens.into(),
        }
    }

    pub fn peek(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(offset)
    }

    pub fn next_is(&self, kind: TokenKind) -> bool {
        self.nth_is(0, kind)
    }

    pub fn nth_is(&self, offset: usize, kind: TokenKind) -> bool {
        self.peek(offset).map_or(false, |tok| tok.kind == kind)
    }

    /// Pop the next token, requiring it to be of the expected kind
    pub fn consume(&mut self, expected: TokenKind) -> Result<Token> {
        match self.tokens.pop_front() {
            Some(tok) if tok.kind == expected => Ok(tok),
            Some(tok) => Err(Error::UnexpectedToken {
                expected,
                found: tok.kind,
            }),
            None => Err(Error::UnexpectedEnd(format!("expected {}", expected))),
        }
    }

    pub fn advance(&mut self) -> Option<Token> {
        self.tokens.pop_front()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }
}

#[test]
fn test_consume() {
    let mut stream = TokenStream::new(vec![
        Token::new(TokenKind::Def, "def ".to_string()),
        Token::new(TokenKind::Identifier, "main".to_string()),
    ]);

    assert!(stream.next_is(TokenKind::Def));
    assert!(stream.nth_is(1, TokenKind::Identifier));

    let tok = stream.consume(TokenKind::Def).expect("Failed to consume");
    assert_eq!(tok.text, "def ");

    match stream.consume(TokenKind::OpenParen) {
        Err(Error::UnexpectedToken { expected, found }) => {
            assert_eq!(expected, TokenKind::OpenParen);
            assert_eq!(found, TokenKind::Identifier);
        }
        other => panic!("Expected mismatch error, got {:?}", other),
    }
}

#[test]
fn test_consume_past_end() {
    let mut stream = TokenStream::new(Vec::new());

    assert!(stream.is_empty());
    assert!(!stream.next_is(TokenKind::End));

    match stream.consume(TokenKind::End) {
        Err(Error::UnexpectedEnd(_)) => (),
        other => panic!("Expected end-of-input error, got {:?}", other),
    }
}
