use rustyline::validate::{ValidationContext, ValidationResult, Validator};
use rustyline::{Completer, Helper, Highlighter, Hinter, Result};

/// Helper that extends editor
///
/// Currently only implements `Validator` trait to trigger multiline editing when a `\` is seen at
/// the end of a line.
#[derive(Completer, Helper, Highlighter, Hinter)]
pub struct ReplHelper {}

impl ReplHelper {
    pub fn new() -> Self {
        ReplHelper {}
    }
}

impl Validator for ReplHelper {
    fn validate(&self, ctx: &mut ValidationContext) -> Result<ValidationResult> {
        if ctx.input().ends_with('\\') {
            Ok(ValidationResult::Incomplete)
        } else {
            Ok(ValidationResult::Valid(None))
        }
    }
}

/// Remove `#` comments from every line of a script
pub fn strip_comments(input: &str) -> String {
    input
        .lines()
        .map(|line| match line.find('#') {
            Some(pos) => &line[..pos],
            None => line,
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Join lines continued with a trailing `\`
///
/// The interpreter only ever sees single lines, so continuations become a space.
pub fn fixup_input(input: &str) -> String {
    input.replace("\\\n", " ")
}

/// Commands understood by the REPL itself rather than the interpreter
#[derive(Debug, PartialEq)]
pub enum Command<'a> {
    Quit,
    Line(&'a str),
}

impl<'a> From<&'a str> for Command<'a> {
    fn from(line: &'a str) -> Self {
        match line.trim() {
            "quit" => Command::Quit,
            _ => Command::Line(line),
        }
    }
}

#[test]
fn test_strip_comments() {
    let data = vec![
        ("x = 1", "x = 1"),
        ("x = 1 # set x", "x = 1 "),
        ("# whole line", ""),
        ("a\n#b\nc # d", "a\n\nc "),
    ];

    for (input, expected) in data {
        assert_eq!(strip_comments(input), expected);
    }
}

#[test]
fn test_fixup_input() {
    assert_eq!(fixup_input("fn f a \\\n=> a"), "fn f a  => a");
    assert_eq!(fixup_input("a \\ \nb"), "a \\ \nb");
    assert_eq!(fixup_input("meline"), "meline");
}

#[test]
fn test_command() {
    assert_eq!(Command::from("quit"), Command::Quit);
    assert_eq!(Command::from("  quit "), Command::Quit);
    assert_eq!(Command::from("quit + 1"), Command::Line("quit + 1"));
    assert_eq!(Command::from("1 + 2"), Command::Line("1 + 2"));
}
