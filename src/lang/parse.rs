//! This module implements the recursive descent parser.
//!
//! The grammar has no statement forms at the top level other than function
//! definitions; everything inside a body goes through one shared
//! expression-sequence parser, parameterized only by what terminates the
//! sequence (the `end` keyword for bodies, `,`/`)` for call arguments,
//! stream exhaustion for re-lexed assignment lines).
//!
//! Developer notes:
//!
//! * Dispatch order inside `parse_expr_item` matters: an identifier
//!   immediately followed by `(` is a call, so that case must be tried
//!   before the bare-identifier (variable reference) case.
//!
//! * Assignment lines arrive from the lexer as a single opaque token
//!   carrying the whole line. The right-hand text is re-lexed here with a
//!   fresh lexer invocation and parsed to completion by a fresh sub-parser,
//!   so nested constructs (eg a call on the right-hand side) go through the
//!   ordinary expression machinery.
//!
//! * Call arguments and assignment right-hand sides are always wrapped as
//!   `Expression::Sequence`, even when they hold a single item; the
//!   evaluator dispatches on sequence content uniformly.

use log::warn;

use crate::lang::ast::*;
use crate::lang::error::{Error, Result};
use crate::lang::lex::lex;
use crate::lang::token::{Token, TokenKind, TokenStream};

/// What stops an expression sequence
#[derive(Clone, Copy)]
enum Terminator {
    /// Stop before the `end` keyword (function bodies)
    KeywordEnd,
    /// Stop before `,` or `)` (call arguments)
    Argument,
    /// Stop when the stream runs out (re-lexed assignment lines)
    Exhausted,
}

/// Parse a full token stream into the program's function definitions.
///
/// Parsing stops at the first token that does not begin a definition;
/// anything left over is ignored.
pub fn parse(tokens: Vec<Token>) -> Result<Vec<Definition>> {
    let mut parser = Parser::new(tokens);
    let program = parser.parse_program()?;

    if !parser.stream.is_empty() {
        warn!(
            "ignoring {} tokens after the last function definition",
            parser.stream.len()
        );
    }

    Ok(program)
}

struct Parser {
    stream: TokenStream,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Parser {
            stream: TokenStream::new(tokens),
        }
    }

    fn parse_program(&mut self) -> Result<Vec<Definition>> {
        let mut definitions = Vec::new();
        while self.stream.next_is(TokenKind::Def) {
            definitions.push(self.parse_definition()?);
        }

        Ok(definitions)
    }

    fn parse_definition(&mut self) -> Result<Definition> {
        self.stream.consume(TokenKind::Def)?;
        let name = Identifier(self.stream.consume(TokenKind::Identifier)?.text);
        let params = self.parse_parameters()?;
        let body = self.parse_expr_sequence(Terminator::KeywordEnd)?;
        self.stream.consume(TokenKind::End)?;

        Ok(Definition { name, params, body })
    }

    fn parse_parameters(&mut self) -> Result<Vec<Identifier>> {
        self.stream.consume(TokenKind::OpenParen)?;

        let mut params = Vec::new();
        if self.stream.next_is(TokenKind::Identifier) {
            params.push(Identifier(self.stream.consume(TokenKind::Identifier)?.text));
            while self.stream.next_is(TokenKind::Comma) {
                self.stream.consume(TokenKind::Comma)?;
                params.push(Identifier(self.stream.consume(TokenKind::Identifier)?.text));
            }
        }

        self.stream.consume(TokenKind::CloseParen)?;

        Ok(params)
    }

    /// Parse one or more expression items until the terminator is next.
    ///
    /// An immediate terminator is an error: a sequence is never empty.
    fn parse_expr_sequence(&mut self, until: Terminator) -> Result<Vec<Expression>> {
        let mut items = Vec::new();
        loop {
            items.push(self.parse_expr_item()?);
            if self.at_terminator(until) {
                break;
            }
        }

        Ok(items)
    }

    fn at_terminator(&self, until: Terminator) -> bool {
        match until {
            Terminator::KeywordEnd => self.stream.next_is(TokenKind::End),
            Terminator::Argument => {
                self.stream.next_is(TokenKind::Comma) || self.stream.next_is(TokenKind::CloseParen)
            }
            Terminator::Exhausted => self.stream.is_empty(),
        }
    }

    fn parse_expr_item(&mut self) -> Result<Expression> {
        if self.stream.next_is(TokenKind::Integer) {
            return self.parse_integer();
        }
        if self.stream.next_is(TokenKind::Str) {
            return self.parse_string();
        }
        if let Some(op) = self.peek_operator() {
            self.stream.advance();
            return Ok(Expression::Operator(op));
        }
        // NB: an identifier followed by `(` is a call; check before the
        // bare-identifier case below
        if self.stream.next_is(TokenKind::Identifier) && self.stream.nth_is(1, TokenKind::OpenParen)
        {
            return self.parse_call();
        }
        if self.stream.next_is(TokenKind::AssignmentLine) {
            return self.parse_assignment();
        }
        if self.stream.next_is(TokenKind::Identifier) {
            let tok = self.stream.consume(TokenKind::Identifier)?;
            return Ok(Expression::Variable(Identifier(tok.text)));
        }

        match self.stream.peek(0) {
            Some(tok) => Err(Error::UnparsableToken(tok.kind)),
            None => Err(Error::UnexpectedEnd("expected an expression".to_string())),
        }
    }

    fn peek_operator(&self) -> Option<Operator> {
        let op = match self.stream.peek(0)?.kind {
            TokenKind::Add => Operator::Add,
            TokenKind::Subtract => Operator::Subtract,
            TokenKind::Multiply => Operator::Multiply,
            TokenKind::Divide => Operator::Divide,
            _ => return None,
        };

        Some(op)
    }

    fn parse_integer(&mut self) -> Result<Expression> {
        let tok = self.stream.consume(TokenKind::Integer)?;
        let value = tok
            .text
            .parse::<i64>()
            .map_err(|_| Error::IntegerOverflow(tok.text.clone()))?;

        Ok(Expression::Integer(value))
    }

    fn parse_string(&mut self) -> Result<Expression> {
        let tok = self.stream.consume(TokenKind::Str)?;
        // The lexer guarantees a one-char delimiter on each side
        let inner = tok.text[1..tok.text.len() - 1].to_string();

        Ok(Expression::Str(inner))
    }

    fn parse_call(&mut self) -> Result<Expression> {
        let name = Identifier(self.stream.consume(TokenKind::Identifier)?.text);
        self.stream.consume(TokenKind::OpenParen)?;

        let mut args = Vec::new();
        while !self.stream.next_is(TokenKind::CloseParen) {
            args.push(self.parse_argument()?);
            while self.stream.next_is(TokenKind::Comma) {
                self.stream.consume(TokenKind::Comma)?;
                args.push(self.parse_argument()?);
            }
        }

        self.stream.consume(TokenKind::CloseParen)?;

        Ok(Expression::Call(Call { name, args }))
    }

    fn parse_argument(&mut self) -> Result<Expression> {
        let items = self.parse_expr_sequence(Terminator::Argument)?;

        Ok(Expression::Sequence(items))
    }

    /// Two-phase lexing: the assignment token holds the raw line, so the
    /// right-hand side is lexed again and parsed by a sub-parser that must
    /// consume every re-lexed token.
    fn parse_assignment(&mut self) -> Result<Expression> {
        let tok = self.stream.consume(TokenKind::AssignmentLine)?;
        let (name, rhs) = tok
            .text
            .split_once('=')
            .expect("assignment line always contains '='");

        let rhs_tokens = lex(rhs.trim())?;
        let mut sub = Parser::new(rhs_tokens);
        let items = sub.parse_expr_sequence(Terminator::Exhausted)?;

        Ok(Expression::Assignment(Assignment {
            name: Identifier(name.trim().to_string()),
            expr: Box::new(Expression::Sequence(items)),
        }))
    }
}

#[cfg(test)]
fn parse_source(source: &str) -> Result<Vec<Definition>> {
    parse(lex(source)?)
}

#[cfg(test)]
fn ident(name: &str) -> Identifier {
    Identifier(name.to_string())
}

#[test]
fn test_definition_shape() {
    let program = parse_source("def add(a, b)\n  a + b\nend").expect("Failed to parse");

    assert_eq!(
        program,
        vec![Definition {
            name: ident("add"),
            params: vec![ident("a"), ident("b")],
            body: vec![
                Expression::Variable(ident("a")),
                Expression::Operator(Operator::Add),
                Expression::Variable(ident("b")),
            ],
        }]
    );
}

#[test]
fn test_assignment_and_reference() {
    let program = parse_source("def main()\n  x = 2 + 3\n  x\nend").expect("Failed to parse");

    assert_eq!(
        program,
        vec![Definition {
            name: ident("main"),
            params: vec![],
            body: vec![
                Expression::Assignment(Assignment {
                    name: ident("x"),
                    expr: Box::new(Expression::Sequence(vec![
                        Expression::Integer(2),
                        Expression::Operator(Operator::Add),
                        Expression::Integer(3),
                    ])),
                }),
                Expression::Variable(ident("x")),
            ],
        }]
    );
}

#[test]
fn test_call_arguments_are_sequences() {
    let program = parse_source("def main()\n  add(2, 3)\nend").expect("Failed to parse");

    assert_eq!(
        program[0].body,
        vec![Expression::Call(Call {
            name: ident("add"),
            args: vec![
                Expression::Sequence(vec![Expression::Integer(2)]),
                Expression::Sequence(vec![Expression::Integer(3)]),
            ],
        })]
    );
}

#[test]
fn test_call_inside_assignment() {
    // The call on the right-hand side only exists because the captured line
    // text is re-lexed
    let program = parse_source("def main()\n  x = add(1, 2)\n  x\nend").expect("Failed to parse");

    assert_eq!(
        program[0].body[0],
        Expression::Assignment(Assignment {
            name: ident("x"),
            expr: Box::new(Expression::Sequence(vec![Expression::Call(Call {
                name: ident("add"),
                args: vec![
                    Expression::Sequence(vec![Expression::Integer(1)]),
                    Expression::Sequence(vec![Expression::Integer(2)]),
                ],
            })])),
        })
    );
}

#[test]
fn test_zero_argument_call_and_string() {
    let program = parse_source("def main()\n  greet()\n  'hi'\nend").expect("Failed to parse");

    assert_eq!(
        program[0].body,
        vec![
            Expression::Call(Call {
                name: ident("greet"),
                args: vec![],
            }),
            Expression::Str("hi".to_string()),
        ]
    );
}

#[test]
fn test_multiple_definitions() {
    let program =
        parse_source("def one()\n  1\nend\ndef two()\n  2\nend").expect("Failed to parse");

    assert_eq!(program.len(), 2);
    assert_eq!(program[0].name, ident("one"));
    assert_eq!(program[1].name, ident("two"));
}

#[test]
fn test_multi_item_argument() {
    // A single argument may itself be an arithmetic run
    let program = parse_source("def main()\n  print(1 + 2)\nend").expect("Failed to parse");

    assert_eq!(
        program[0].body,
        vec![Expression::Call(Call {
            name: ident("print"),
            args: vec![Expression::Sequence(vec![
                Expression::Integer(1),
                Expression::Operator(Operator::Add),
                Expression::Integer(2),
            ])],
        })]
    );
}

#[test]
fn test_parse_errors() {
    match parse_source("def main(") {
        Err(Error::UnexpectedEnd(_)) => (),
        other => panic!("Expected end-of-input error, got {:?}", other),
    }

    match parse_source("def main)\nend") {
        Err(Error::UnexpectedToken { expected, found }) => {
            assert_eq!(expected, TokenKind::OpenParen);
            assert_eq!(found, TokenKind::CloseParen);
        }
        other => panic!("Expected token mismatch, got {:?}", other),
    }

    // An empty body hits the dispatch failure on `end`
    match parse_source("def main()\nend") {
        Err(Error::UnparsableToken(TokenKind::End)) => (),
        other => panic!("Expected dispatch failure, got {:?}", other),
    }

    match parse_source("def main()\n  1\n") {
        Err(Error::UnexpectedEnd(_)) => (),
        other => panic!("Expected end-of-input error, got {:?}", other),
    }
}

#[test]
fn test_integer_overflow() {
    match parse_source("def main()\n  99999999999999999999\nend") {
        Err(Error::IntegerOverflow(text)) => assert_eq!(text, "99999999999999999999"),
        other => panic!("Expected overflow error, got {:?}", other),
    }
}

#[test]
fn test_trailing_tokens_ignored() {
    // Top-level parsing stops at the first non-`def` token
    let program = parse_source("def main()\n  1\nend\n42").expect("Failed to parse");
    assert_eq!(program.len(), 1);
}
