//! Splits a line of input into tokens.
//!
//! The lexical grammar is tiny: `=>` and the single character operators are tokens on their
//! own, everything else between whitespace and operators is a word. Words cover identifiers,
//! numeric literals and keywords alike; telling them apart is the parser's job.

use std::collections::VecDeque;
use std::fmt;

use pom::parser::{end, is_a, one_of, tag, Parser};

use crate::lang::error::{Error, Result};

/// Characters that always form a token of their own
const OPERATOR_CHARS: &str = "-+*/%=()^<>";

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Token(pub String);

impl Token {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn space<'a>() -> Parser<'a, char, ()> {
    is_a(|c: char| c.is_whitespace()).repeat(0..).discard()
}

fn arrow<'a>() -> Parser<'a, char, Token> {
    tag("=>").map(|s| Token(s.to_string()))
}

fn operator<'a>() -> Parser<'a, char, Token> {
    one_of(OPERATOR_CHARS).map(|c: char| Token(c.to_string()))
}

fn word<'a>() -> Parser<'a, char, Token> {
    is_a(|c: char| !c.is_whitespace() && !OPERATOR_CHARS.contains(c))
        .repeat(1..)
        .map(|chars| Token(chars.into_iter().collect()))
}

/// Parse a single token
///
/// Consumes trailing whitespace
fn token<'a>() -> Parser<'a, char, Token> {
    // NB: `=>` must be tried before `=`
    (arrow() | operator() | word()) - space()
}

/// Tokenize `input` in source order
pub fn tokenize(input: &str) -> Result<Vec<Token>> {
    let input: Vec<char> = input.chars().collect();
    let line = space() * token().repeat(0..) - end();

    line.parse(&input)
        .map_err(|e| Error::malformed(format!("failed to tokenize: {}", e)))
}

/// Tokens waiting to be parsed, consumed from the front
///
/// The parser sometimes reads one token too far (eg. to find out an expression has ended),
/// so the last token taken can be handed back with `unread()`.
#[derive(Debug, Default)]
pub struct TokenStream {
    tokens: VecDeque<Token>,
}

impl TokenStream {
    pub fn pop(&mut self) -> Option<Token> {
        self.tokens.pop_front()
    }

    pub fn peek(&self) -> Option<&Token> {
        self.tokens.front()
    }

    pub fn unread(&mut self, token: Token) {
        self.tokens.push_front(token);
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn remaining(&self) -> String {
        self.tokens
            .iter()
            .map(Token::as_str)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl From<Vec<Token>> for TokenStream {
    fn from(tokens: Vec<Token>) -> Self {
        TokenStream {
            tokens: tokens.into(),
        }
    }
}

#[cfg(test)]
fn words(input: &str) -> Vec<String> {
    tokenize(input)
        .expect("Failed to tokenize")
        .into_iter()
        .map(|t| t.0)
        .collect()
}

#[test]
fn test_tokenize_empty() {
    assert!(tokenize("").expect("Failed to tokenize").is_empty());
    assert!(tokenize("   \t ").expect("Failed to tokenize").is_empty());
}

#[test]
fn test_tokenize_operators() {
    let data = vec![
        ("1 + 2", vec!["1", "+", "2"]),
        ("1+2", vec!["1", "+", "2"]),
        ("(x-1)*y", vec!["(", "x", "-", "1", ")", "*", "y"]),
        ("a%b^c/d", vec!["a", "%", "b", "^", "c", "/", "d"]),
        ("x = -3", vec!["x", "=", "-", "3"]),
        ("1<2>3", vec!["1", "<", "2", ">", "3"]),
    ];

    for (input, expected) in data {
        assert_eq!(words(input), expected);
    }
}

#[test]
fn test_tokenize_arrow() {
    assert_eq!(
        words("fn add a b => a + b"),
        vec!["fn", "add", "a", "b", "=>", "a", "+", "b"]
    );
    assert_eq!(words("a=>a"), vec!["a", "=>", "a"]);
    assert_eq!(words("x == 1"), vec!["x", "=", "=", "1"]);
    assert_eq!(words("x = > 1"), vec!["x", "=", ">", "1"]);
}

#[test]
fn test_tokenize_words() {
    assert_eq!(words("  foo_bar   3.25 "), vec!["foo_bar", "3.25"]);
    assert_eq!(words("not x is 1e3"), vec!["not", "x", "is", "1e3"]);
    assert_eq!(words("begin x end"), vec!["begin", "x", "end"]);
}

#[test]
fn test_token_stream() {
    let mut stream = TokenStream::from(tokenize("1 + 2").expect("Failed to tokenize"));
    let first = stream.pop().expect("Missing token");
    assert_eq!(first.as_str(), "1");
    stream.unread(first);
    assert_eq!(stream.peek().map(Token::as_str), Some("1"));
    assert_eq!(stream.remaining(), "1 + 2");
    stream.pop();
    stream.pop();
    stream.pop();
    assert!(stream.is_empty());
    assert!(stream.pop().is_none());
}
