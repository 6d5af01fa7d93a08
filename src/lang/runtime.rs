use std::rc::Rc;

use log::{debug, info, warn};

use crate::lang::ast::{Identifier, Operator};
use crate::lang::error::{Error, Result};
use crate::lang::functions::{parse_parameters, Definition, Function, Functions, RESERVED};
use crate::lang::parse::{parse, parse_partial};
use crate::lang::tokenize::{tokenize, Token, TokenStream};
use crate::lang::value::Value;
use crate::lang::variables::Variables;

/// Interpreter state that lives across lines
///
/// Global variables and functions defined by one line are visible to every later line.
pub struct Interpreter {
    variables: Variables<Value>,
    functions: Functions,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    pub fn new() -> Self {
        Self {
            variables: Variables::new(),
            functions: Functions::new(),
        }
    }

    /// Evaluate one line of input
    ///
    /// Returns `None` for lines that produce no value: empty lines and function definitions.
    pub fn evaluate_line(&mut self, line: &str) -> Result<Option<Value>> {
        let tokens = tokenize(line)?;
        debug!("tokens: {:?}", tokens);

        if tokens.is_empty() {
            return Ok(None);
        }

        if let Some(definition) = Definition::from_tokens(&tokens) {
            self.define_function(definition?)?;
            return Ok(None);
        }

        // Leftover tokens only fail the line after the expression ran, so its
        // assignments stick
        let parsed = parse_partial(TokenStream::from(tokens), &self.functions)?;
        let val = parsed.node.evaluate(&mut self.variables)?;
        parsed.check_consumed()?;

        Ok(Some(val))
    }

    fn define_function(&mut self, definition: Definition) -> Result<()> {
        let name = definition.name.as_str();
        if self.variables.is_global(name)
            || Operator::from_symbol(name).is_some()
            || RESERVED.contains(name)
        {
            return Err(Error::InvalidFunctionName(name.to_string()));
        }
        let name = Identifier::new(name)?;

        let parameters = parse_parameters(&definition.parameters)?;
        let func = Rc::new(Function::new(name.clone(), parameters));

        // Register before parsing the body so the body may call the function
        let previous = self.functions.register(func.clone());
        match self.parse_body(&func, definition.body) {
            Ok(()) => {
                self.functions.commit(func);
                info!(
                    "defined function '{}' ({} functions defined)",
                    name,
                    self.functions.len()
                );
                Ok(())
            }
            Err(e) => {
                warn!("rolling back definition of '{}': {}", name, e);
                self.functions.rollback(&name, previous);
                Err(e)
            }
        }
    }

    fn parse_body(&self, func: &Function, body: Option<Vec<Token>>) -> Result<()> {
        let body = body.ok_or_else(|| {
            Error::malformed(format!("expected '=>' in definition of '{}'", func.name()))
        })?;
        if body.is_empty() {
            return Err(Error::malformed(format!(
                "function '{}' has an empty body",
                func.name()
            )));
        }

        let node = parse(TokenStream::from(body), &self.functions)?;
        func.set_body(node)
    }
}

#[cfg(test)]
fn number(n: f64) -> Result<Option<Value>> {
    Ok(Some(Value::Number(n)))
}

#[test]
fn test_empty_line() {
    let mut interp = Interpreter::new();
    assert_eq!(interp.evaluate_line(""), Ok(None));
    assert_eq!(interp.evaluate_line("   "), Ok(None));
}

#[test]
fn test_globals_persist() {
    let mut interp = Interpreter::new();
    assert_eq!(interp.evaluate_line("x = 5"), number(5.0));
    assert_eq!(interp.evaluate_line("x + 1"), number(6.0));
    assert_eq!(interp.evaluate_line("x = x * x"), number(25.0));
    assert_eq!(interp.evaluate_line("x"), number(25.0));
}

#[test]
fn test_separate_interpreters() {
    let mut a = Interpreter::new();
    let mut b = Interpreter::new();
    assert_eq!(a.evaluate_line("x = 1"), number(1.0));
    assert_eq!(
        b.evaluate_line("x"),
        Err(Error::UnboundVariable("x".to_string()))
    );
}

#[test]
fn test_define_and_call() {
    let mut interp = Interpreter::new();
    assert_eq!(interp.evaluate_line("a b => a + b add fn"), Ok(None));
    assert_eq!(interp.evaluate_line("add 3 4"), number(7.0));

    assert_eq!(interp.evaluate_line("fn avg a b => (a + b) / 2"), Ok(None));
    assert_eq!(interp.evaluate_line("avg 4 add 2 4"), number(5.0));
    assert_eq!(interp.evaluate_line("add 1 2 * avg 2 4"), number(7.0));

    assert_eq!(interp.evaluate_line("fn answer => 42"), Ok(None));
    assert_eq!(interp.evaluate_line("answer + 1"), number(43.0));
}

#[test]
fn test_recursion() {
    let mut interp = Interpreter::new();
    assert_eq!(
        interp.evaluate_line("fn fact n => if n < 2 1 n * fact (n - 1)"),
        Ok(None)
    );
    assert_eq!(interp.evaluate_line("fact 5"), number(120.0));
    assert_eq!(interp.evaluate_line("fact 1"), number(1.0));

    assert_eq!(
        interp.evaluate_line("fn fib n => if n < 2 n (fib (n - 1)) + fib (n - 2)"),
        Ok(None)
    );
    assert_eq!(interp.evaluate_line("fib 10"), number(55.0));
}

#[test]
fn test_recursion_limit() {
    let mut interp = Interpreter::new();
    assert_eq!(interp.evaluate_line("fn forever n => forever n"), Ok(None));
    assert!(matches!(
        interp.evaluate_line("forever 1"),
        Err(Error::MalformedInput(_))
    ));

    // The call scopes are gone again
    assert_eq!(interp.evaluate_line("n = 2"), number(2.0));
    assert_eq!(interp.evaluate_line("fn forever => 0"), Ok(None));
    assert_eq!(interp.evaluate_line("forever"), number(0.0));
}

#[test]
fn test_dynamic_scope() {
    let mut interp = Interpreter::new();
    assert_eq!(interp.evaluate_line("fn get_y => y"), Ok(None));
    assert_eq!(interp.evaluate_line("fn with_y y => get_y"), Ok(None));
    // `get_y` sees the `y` of its caller
    assert_eq!(interp.evaluate_line("with_y 7"), number(7.0));
    assert_eq!(
        interp.evaluate_line("get_y"),
        Err(Error::UnboundVariable("y".to_string()))
    );
    assert_eq!(interp.evaluate_line("y = 3"), number(3.0));
    assert_eq!(interp.evaluate_line("get_y"), number(3.0));
}

#[test]
fn test_call_scope() {
    let mut interp = Interpreter::new();
    assert_eq!(interp.evaluate_line("x = 1"), number(1.0));
    assert_eq!(interp.evaluate_line("fn shadow x => x = x + 10"), Ok(None));
    assert_eq!(interp.evaluate_line("shadow 5"), number(15.0));
    // Assignment in the body only touched the call scope
    assert_eq!(interp.evaluate_line("x"), number(1.0));

    // Arguments are evaluated in the caller's scope
    assert_eq!(interp.evaluate_line("shadow (z = 2)"), number(12.0));
    assert_eq!(interp.evaluate_line("z"), number(2.0));
}

#[test]
fn test_invalid_function_name() {
    let mut interp = Interpreter::new();
    assert_eq!(interp.evaluate_line("x = 1"), number(1.0));

    let tests = vec!["fn x => 1", "fn if => 1", "fn not => 1", "fn begin => 1", "fn fn => 1"];
    for input in tests {
        assert!(
            matches!(
                interp.evaluate_line(input),
                Err(Error::InvalidFunctionName(_))
            ),
            "{}",
            input
        );
    }

    assert_eq!(
        interp.evaluate_line("1 => 1 + fn"),
        Err(Error::InvalidFunctionName("+".to_string()))
    );
    assert_eq!(
        interp.evaluate_line("fn 2x => 1"),
        Err(Error::InvalidIdentifier("2x".to_string()))
    );
    assert_eq!(
        interp.evaluate_line("fn f 1 => 1"),
        Err(Error::InvalidIdentifier("1".to_string()))
    );
}

#[test]
fn test_definition_rollback() {
    let mut interp = Interpreter::new();

    assert!(matches!(
        interp.evaluate_line("fn bad a => a +"),
        Ok(None)
    ));
    assert!(interp.evaluate_line("bad 1").is_err());

    assert_eq!(interp.evaluate_line("fn f a => begin end"), Err(Error::EmptySequence));
    assert_eq!(
        interp.evaluate_line("f"),
        Err(Error::UnboundVariable("f".to_string()))
    );

    assert!(matches!(
        interp.evaluate_line("fn g a a"),
        Err(Error::MalformedInput(_))
    ));
    assert!(matches!(
        interp.evaluate_line("fn g a => a a"),
        Err(Error::MalformedInput(_))
    ));
    assert!(matches!(
        interp.evaluate_line("fn g a =>"),
        Err(Error::MalformedInput(_))
    ));
    assert_eq!(
        interp.evaluate_line("g"),
        Err(Error::UnboundVariable("g".to_string()))
    );

    // A failed redefinition brings back the old function
    assert_eq!(interp.evaluate_line("fn h a => a * 2"), Ok(None));
    assert!(interp.evaluate_line("fn h a => a (").is_err());
    assert_eq!(interp.evaluate_line("h 4"), number(8.0));
}

#[test]
fn test_redefinition() {
    let mut interp = Interpreter::new();
    assert_eq!(interp.evaluate_line("fn f a => a + 1"), Ok(None));
    assert_eq!(interp.evaluate_line("fn g a => f a"), Ok(None));
    assert_eq!(interp.evaluate_line("fn f a => a + 100"), Ok(None));
    assert_eq!(interp.evaluate_line("f 1"), number(101.0));
    // `g` was parsed against the old `f`
    assert_eq!(interp.evaluate_line("g 1"), number(2.0));
}

#[test]
fn test_malformed_lines() {
    let mut interp = Interpreter::new();
    let tests = vec!["1 1", "1 + 2 3", "x = 1 2", "1 + (fn f => 1)", ")", "end"];

    for input in tests {
        assert!(
            matches!(interp.evaluate_line(input), Err(Error::MalformedInput(_))),
            "{}",
            input
        );
    }

    // The expression in front of the leftover tokens still ran
    assert_eq!(interp.evaluate_line("x"), number(1.0));

    assert!(matches!(
        interp.evaluate_line("y = 5 3 + 4"),
        Err(Error::MalformedInput(_))
    ));
    assert_eq!(interp.evaluate_line("y"), number(5.0));

    // A parse error stops the line before anything runs
    assert!(matches!(
        interp.evaluate_line("z = 1 + (2"),
        Err(Error::MalformedInput(_))
    ));
    assert_eq!(
        interp.evaluate_line("z"),
        Err(Error::UnboundVariable("z".to_string()))
    );
}

#[test]
fn test_deep_nesting() {
    let mut interp = Interpreter::new();

    let negations = format!("{}1", "- ".repeat(200_000));
    assert!(matches!(
        interp.evaluate_line(&negations),
        Err(Error::MalformedInput(_))
    ));

    let groups = format!("{}1{}", "(".repeat(100_000), ")".repeat(100_000));
    assert!(matches!(
        interp.evaluate_line(&groups),
        Err(Error::MalformedInput(_))
    ));

    // Each call nests the body again, long before the call depth limit is reached
    let body = format!("{}f n{}", "(".repeat(60), ")".repeat(60));
    assert_eq!(interp.evaluate_line(&format!("fn f n => {}", body)), Ok(None));
    assert!(matches!(
        interp.evaluate_line("f 1"),
        Err(Error::MalformedInput(_))
    ));

    // The interpreter is still usable
    assert_eq!(interp.evaluate_line("n = 1"), number(1.0));
    assert_eq!(interp.evaluate_line("- - 3"), number(3.0));
}

#[test]
fn test_sequence_lines() {
    let mut interp = Interpreter::new();
    assert_eq!(interp.evaluate_line("begin end"), Err(Error::EmptySequence));
    assert_eq!(interp.evaluate_line("begin"), Err(Error::EmptySequence));
    assert_eq!(
        interp.evaluate_line("begin a = 1 b = 2 a + b"),
        number(3.0)
    );
    assert_eq!(interp.evaluate_line("a + b"), number(3.0));
}

#[test]
fn test_division_by_zero() {
    let mut interp = Interpreter::new();
    assert_eq!(interp.evaluate_line("x = 0"), number(0.0));
    assert!(matches!(
        interp.evaluate_line("10 / x"),
        Err(Error::MalformedInput(_))
    ));
    assert!(matches!(
        interp.evaluate_line("10 % x"),
        Err(Error::MalformedInput(_))
    ));
}
