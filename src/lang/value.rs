use std::fmt;

use crate::lang::ast::Operator;
use crate::lang::error::{Error, Result};

/// Runtime value
///
/// Values are loosely typed: a boolean used as a number is 1 or 0 and a number used as a
/// condition is true when it is non-zero. Arithmetic always yields a number, comparisons
/// always yield a boolean.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Number(f64),
    Boolean(bool),
}

impl Value {
    pub fn as_number(&self) -> f64 {
        match self {
            Value::Number(n) => *n,
            Value::Boolean(true) => 1.0,
            Value::Boolean(false) => 0.0,
        }
    }

    pub fn as_boolean(&self) -> bool {
        match self {
            Value::Number(n) => *n != 0.0,
            Value::Boolean(b) => *b,
        }
    }

    /// Apply a binary operator
    pub fn binop(self, op: Operator, rhs: Value) -> Result<Value> {
        let lhs_val = self.as_number();
        let rhs_val = rhs.as_number();

        let res = match op {
            Operator::Plus => Value::Number(lhs_val + rhs_val),
            Operator::Minus => Value::Number(lhs_val - rhs_val),
            Operator::Multiply => Value::Number(lhs_val * rhs_val),
            Operator::Divide => {
                if rhs_val == 0.0 {
                    return Err(Error::malformed("division by zero"));
                }

                Value::Number(lhs_val / rhs_val)
            }
            Operator::Modulo => {
                if rhs_val == 0.0 {
                    return Err(Error::malformed("modulo by zero"));
                }

                Value::Number(floored_rem(lhs_val, rhs_val))
            }
            Operator::Power => Value::Number(power(lhs_val, rhs_val)?),
            Operator::Is => Value::Boolean(lhs_val == rhs_val),
            Operator::LessThan => Value::Boolean(lhs_val < rhs_val),
            Operator::GreaterThan => Value::Boolean(lhs_val > rhs_val),
            op => {
                return Err(Error::malformed(format!(
                    "'{}' is not a binary operator",
                    op
                )))
            }
        };

        Ok(res)
    }
}

/// Remainder taking the sign of the divisor, eg. `-7 % 3 == 2`
fn floored_rem(lhs: f64, rhs: f64) -> f64 {
    let rem = lhs % rhs;
    if rem != 0.0 && (rem < 0.0) != (rhs < 0.0) {
        rem + rhs
    } else {
        rem
    }
}

fn power(base: f64, exp: f64) -> Result<f64> {
    if base == 0.0 && exp < 0.0 {
        return Err(Error::malformed("0 cannot be raised to a negative power"));
    }
    if base < 0.0 && exp.is_finite() && exp.fract() != 0.0 {
        return Err(Error::malformed(format!(
            "{} ^ {} is not a real number",
            base, exp
        )));
    }

    let res = base.powf(exp);
    if res.is_infinite() && base.is_finite() && exp.is_finite() {
        return Err(Error::malformed(format!("{} ^ {} overflows", base, exp)));
    }

    Ok(res)
}

/// Magnitudes at or above this are printed in exponent form
const EXP_ABOVE: f64 = 1e16;
/// Non-zero magnitudes below this are printed in exponent form
const EXP_BELOW: f64 = 1e-4;

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) if n.is_finite() && *n != 0.0 => {
                let abs = n.abs();
                if abs >= EXP_ABOVE || abs < EXP_BELOW {
                    write!(f, "{:e}", n)
                } else {
                    write!(f, "{}", n)
                }
            }
            Value::Number(n) => write!(f, "{}", n),
            Value::Boolean(b) => {
                write!(f, "{}", if *b { "true" } else { "false" })
            }
        }
    }
}

#[test]
fn test_coercion() {
    assert_eq!(Value::Boolean(true).as_number(), 1.0);
    assert_eq!(Value::Boolean(false).as_number(), 0.0);
    assert!(Value::Number(-0.5).as_boolean());
    assert!(!Value::Number(0.0).as_boolean());
    assert_eq!(
        Value::Boolean(true).binop(Operator::Plus, Value::Number(1.0)),
        Ok(Value::Number(2.0))
    );
    assert_eq!(
        Value::Boolean(true).binop(Operator::Is, Value::Number(1.0)),
        Ok(Value::Boolean(true))
    );
}

#[test]
fn test_arith() {
    let tests = vec![
        (7.0, Operator::Modulo, 3.0, 1.0),
        (-7.0, Operator::Modulo, 3.0, 2.0),
        (7.0, Operator::Modulo, -3.0, -2.0),
        (7.0, Operator::Divide, 2.0, 3.5),
        (2.0, Operator::Power, 10.0, 1024.0),
        (4.0, Operator::Power, 0.5, 2.0),
        (-2.0, Operator::Power, 3.0, -8.0),
    ];

    for (lhs, op, rhs, expected) in tests {
        assert_eq!(
            Value::Number(lhs).binop(op, Value::Number(rhs)),
            Ok(Value::Number(expected))
        );
    }
}

#[test]
fn test_arith_errors() {
    let tests = vec![
        (1.0, Operator::Divide, 0.0),
        (1.0, Operator::Modulo, 0.0),
        (0.0, Operator::Power, -1.0),
        (-8.0, Operator::Power, 0.5),
        (10.0, Operator::Power, 400.0),
    ];

    for (lhs, op, rhs) in tests {
        assert!(matches!(
            Value::Number(lhs).binop(op, Value::Number(rhs)),
            Err(Error::MalformedInput(_))
        ));
    }
}

#[test]
fn test_display() {
    assert_eq!(Value::Number(11.0).to_string(), "11");
    assert_eq!(Value::Number(0.5).to_string(), "0.5");
    assert_eq!(Value::Number(-3.0).to_string(), "-3");
    assert_eq!(Value::Boolean(false).to_string(), "false");
    assert_eq!(Value::Number(0.0).to_string(), "0");
    assert_eq!(Value::Number(1e15).to_string(), "1000000000000000");
    assert_eq!(Value::Number(1e300).to_string(), "1e300");
    assert_eq!(Value::Number(-2.5e20).to_string(), "-2.5e20");
    assert_eq!(Value::Number(0.00001).to_string(), "1e-5");
    assert_eq!(Value::Number(0.001).to_string(), "0.001");
}
