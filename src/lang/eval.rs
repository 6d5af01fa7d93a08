use log::debug;

use crate::lang::ast::*;
use crate::lang::error::{Error, Result};
use crate::lang::value::Value;
use crate::lang::variables::Variables;

/// Deepest allowed nesting of function calls
///
/// Calls are evaluated by plain recursion, so unbounded recursion in the language would
/// otherwise blow the native stack.
pub const MAX_CALL_DEPTH: usize = 200;

/// Deepest allowed nesting of node evaluations, counted across function calls
///
/// A single parsed tree is already bounded, but a recursive function stacks its body's
/// nesting once per call.
pub const MAX_EVAL_DEPTH: usize = 1000;

fn operand<'a>(op: Operator, node: &'a Option<Box<Node>>) -> Result<&'a Node> {
    node.as_deref()
        .ok_or_else(|| Error::malformed(format!("missing operand for '{}'", op)))
}

impl Node {
    pub fn evaluate(&self, variables: &mut Variables<Value>) -> Result<Value> {
        self.evaluate_at(variables, 0)
    }

    fn evaluate_at(&self, variables: &mut Variables<Value>, depth: usize) -> Result<Value> {
        if depth > MAX_EVAL_DEPTH {
            return Err(Error::malformed(format!(
                "evaluation nested deeper than {} levels",
                MAX_EVAL_DEPTH
            )));
        }

        let depth = depth + 1;
        match self {
            Node::Operator(node) => node.evaluate(variables, depth),
            Node::Symbol(name) => resolve(name, variables),
            Node::Application(app) => app.evaluate(variables, depth),
            Node::If(clause) => {
                if clause.condition.evaluate_at(variables, depth)?.as_boolean() {
                    clause.true_branch.evaluate_at(variables, depth)
                } else {
                    clause.false_branch.evaluate_at(variables, depth)
                }
            }
            Node::Sequence(nodes) => {
                let mut last = None;
                for node in nodes {
                    last = Some(node.evaluate_at(variables, depth)?);
                }

                last.ok_or(Error::EmptySequence)
            }
        }
    }
}

/// Variable lookup, falling back to a numeric literal
fn resolve(name: &str, variables: &Variables<Value>) -> Result<Value> {
    if let Some(val) = variables.get(name) {
        return Ok(*val);
    }

    name.parse::<f64>()
        .map(Value::Number)
        .map_err(|_| Error::UnboundVariable(name.to_string()))
}

impl OperatorNode {
    fn evaluate(&self, variables: &mut Variables<Value>, depth: usize) -> Result<Value> {
        let op = self.op;

        if op.is_prefix() {
            if let Some(left) = &self.left {
                return Err(Error::malformed(format!(
                    "unexpected '{}' before '{}'",
                    left, op
                )));
            }
        }

        match op {
            Operator::Identity => operand(op, &self.right)?.evaluate_at(variables, depth),
            Operator::Not => {
                let val = operand(op, &self.right)?.evaluate_at(variables, depth)?;
                Ok(Value::Boolean(!val.as_boolean()))
            }
            Operator::Negate => {
                let val = operand(op, &self.right)?.evaluate_at(variables, depth)?;
                Ok(Value::Number(-val.as_number()))
            }
            Operator::Assign => {
                let target = operand(op, &self.left)?;
                let val = operand(op, &self.right)?.evaluate_at(variables, depth)?;

                match target {
                    Node::Symbol(name) => {
                        let ident = Identifier::new(name)?;
                        debug!("{} = {}", ident, val);
                        variables.insert(ident, val);
                        Ok(val)
                    }
                    node => Err(Error::malformed(format!("cannot assign to '{}'", node))),
                }
            }
            _ => {
                let lhs = operand(op, &self.left)?.evaluate_at(variables, depth)?;
                let rhs = operand(op, &self.right)?.evaluate_at(variables, depth)?;
                lhs.binop(op, rhs)
            }
        }
    }
}

impl Application {
    /// Call the function
    ///
    /// Arguments are evaluated in the caller's scope, then the body runs in a new scope
    /// stacked on top of the caller's.
    fn evaluate(&self, variables: &mut Variables<Value>, depth: usize) -> Result<Value> {
        let func = self
            .function
            .upgrade()
            .ok_or_else(|| Error::malformed(format!("function '{}' no longer exists", self.name)))?;
        let body = func
            .body()
            .ok_or_else(|| Error::malformed(format!("function '{}' has no body", self.name)))?;

        if variables.depth() >= MAX_CALL_DEPTH {
            return Err(Error::malformed(format!(
                "maximum call depth ({}) exceeded in '{}'",
                MAX_CALL_DEPTH, self.name
            )));
        }

        let mut args = Vec::with_capacity(self.arguments.len());
        for (param, arg) in &self.arguments {
            args.push((param.clone(), arg.evaluate_at(variables, depth)?));
        }

        variables.push_scope();
        for (param, val) in args {
            variables.insert(param, val);
        }
        let res = body.evaluate_at(variables, depth);
        variables.pop_scope();

        res
    }
}

#[cfg(test)]
fn eval_str(input: &str, variables: &mut Variables<Value>) -> Result<Value> {
    use crate::lang::functions::Functions;
    use crate::lang::parse::parse;
    use crate::lang::tokenize::tokenize;

    let functions = Functions::new();
    parse(tokenize(input)?.into(), &functions)?.evaluate(variables)
}

#[test]
fn test_arith_expr() {
    let tests = vec![
        ("3 + 4 * 2", 11.0),
        ("2 ^ 3 ^ 2", 512.0),
        ("10 - 3 - 2", 5.0),
        ("(3 + 4) * 2", 14.0),
        ("-3 * -3", 9.0),
        ("7 % 4 / 2", 1.5),
        ("1.5 + 1e1", 11.5),
        ("-(2 + 3)", -5.0),
    ];

    for (input, expected) in tests {
        let mut variables = Variables::new();
        assert_eq!(
            eval_str(input, &mut variables),
            Ok(Value::Number(expected)),
            "{}",
            input
        );
    }
}

#[test]
fn test_logic_expr() {
    let tests = vec![
        ("1 < 2", true),
        ("2 < 1", false),
        ("3 > 2", true),
        ("1 + 1 is 2", true),
        ("not 1 is 2", true),
        ("not 0", true),
        ("not 5", false),
        ("(1 < 2) is (2 > 1)", true),
        ("(1 < 2) is 1", true),
    ];

    for (input, expected) in tests {
        let mut variables = Variables::new();
        assert_eq!(
            eval_str(input, &mut variables),
            Ok(Value::Boolean(expected)),
            "{}",
            input
        );
    }
}

#[test]
fn test_booleans_in_arith() {
    let mut variables = Variables::new();
    assert_eq!(
        eval_str("(1 < 2) + 1", &mut variables),
        Ok(Value::Number(2.0))
    );
    assert_eq!(
        eval_str("(2 < 1) * 5", &mut variables),
        Ok(Value::Number(0.0))
    );
    assert_eq!(eval_str("-(1 < 2)", &mut variables), Ok(Value::Number(-1.0)));
}

#[test]
fn test_assign() {
    let mut variables = Variables::new();
    assert_eq!(eval_str("x = 5", &mut variables), Ok(Value::Number(5.0)));
    assert_eq!(eval_str("x + 1", &mut variables), Ok(Value::Number(6.0)));
    assert_eq!(
        eval_str("a = b = x * 2", &mut variables),
        Ok(Value::Number(10.0))
    );
    assert_eq!(variables.get("a"), Some(&Value::Number(10.0)));
    assert_eq!(variables.get("b"), Some(&Value::Number(10.0)));
    assert_eq!(eval_str("x = x + 1", &mut variables), Ok(Value::Number(6.0)));

    assert_eq!(
        eval_str("5 = 3", &mut variables),
        Err(Error::InvalidIdentifier("5".to_string()))
    );
    assert!(matches!(
        eval_str("(x) = 3", &mut variables),
        Err(Error::MalformedInput(_))
    ));
    assert!(matches!(
        eval_str("= 3", &mut variables),
        Err(Error::MalformedInput(_))
    ));
}

#[test]
fn test_unbound() {
    let mut variables = Variables::new();
    assert_eq!(
        eval_str("y", &mut variables),
        Err(Error::UnboundVariable("y".to_string()))
    );
    assert_eq!(
        eval_str("1 + y2", &mut variables),
        Err(Error::UnboundVariable("y2".to_string()))
    );
}

#[test]
fn test_clause_eval() {
    let mut variables = Variables::new();
    assert_eq!(
        eval_str("if 1 < 2 10 20", &mut variables),
        Ok(Value::Number(10.0))
    );
    assert_eq!(
        eval_str("if 2 < 1 10 20", &mut variables),
        Ok(Value::Number(20.0))
    );
    // Only the taken branch runs
    assert_eq!(
        eval_str("if 0 (x = 1) (y = 2)", &mut variables),
        Ok(Value::Number(2.0))
    );
    assert_eq!(variables.get("x"), None);

    assert_eq!(
        eval_str("begin x = 1 y = x + 1 y * 10 end", &mut variables),
        Ok(Value::Number(20.0))
    );
    assert_eq!(variables.get("y"), Some(&Value::Number(2.0)));
}

#[test]
fn test_eval_errors() {
    let mut variables = Variables::new();
    let tests = vec!["1 / 0", "1 % (2 - 2)", "1 +", "()", "1 not 2", "0 ^ -1"];

    for input in tests {
        assert!(
            matches!(
                eval_str(input, &mut variables),
                Err(Error::MalformedInput(_))
            ),
            "{}",
            input
        );
    }
}

#[test]
fn test_failed_line_keeps_assignments() {
    let mut variables = Variables::new();
    assert!(eval_str("begin x = 1 x / 0", &mut variables).is_err());
    assert_eq!(variables.get("x"), Some(&Value::Number(1.0)));
}
