use std::borrow::Borrow;
use std::fmt;
use std::rc::Weak;

use crate::lang::error::{Error, Result};
use crate::lang::functions::Function;

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Associativity {
    Left,
    Right,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Operator {
    /// Root of every parsed expression. Evaluates to its right operand
    Identity,
    /// `=`
    Assign,
    /// `not`
    Not,
    /// `is`
    Is,
    /// `<`
    LessThan,
    /// `>`
    GreaterThan,
    /// `+`
    Plus,
    /// `-`
    Minus,
    /// `/`
    Divide,
    /// `*`
    Multiply,
    /// `%`
    Modulo,
    /// `^`
    Power,
    /// Unary `-`
    Negate,
}

impl Operator {
    /// Look up the operator spelled `s`
    ///
    /// `-` always comes back as `Minus`; the parser decides whether it is really a negation.
    pub fn from_symbol(s: &str) -> Option<Self> {
        Some(match s {
            "=" => Operator::Assign,
            "not" => Operator::Not,
            "is" => Operator::Is,
            "<" => Operator::LessThan,
            ">" => Operator::GreaterThan,
            "+" => Operator::Plus,
            "-" => Operator::Minus,
            "/" => Operator::Divide,
            "*" => Operator::Multiply,
            "%" => Operator::Modulo,
            "^" => Operator::Power,
            _ => return None,
        })
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Operator::Identity => "identity",
            Operator::Assign => "=",
            Operator::Not => "not",
            Operator::Is => "is",
            Operator::LessThan => "<",
            Operator::GreaterThan => ">",
            Operator::Plus => "+",
            Operator::Minus | Operator::Negate => "-",
            Operator::Divide => "/",
            Operator::Multiply => "*",
            Operator::Modulo => "%",
            Operator::Power => "^",
        }
    }

    pub fn precedence(self) -> u8 {
        match self {
            Operator::Identity => 0,
            Operator::Assign => 1,
            Operator::Not | Operator::Is | Operator::LessThan | Operator::GreaterThan => 2,
            Operator::Plus | Operator::Minus => 3,
            Operator::Divide | Operator::Multiply | Operator::Modulo => 4,
            Operator::Power => 5,
            Operator::Negate => 6,
        }
    }

    pub fn associativity(self) -> Associativity {
        match self {
            Operator::Plus
            | Operator::Minus
            | Operator::Divide
            | Operator::Multiply
            | Operator::Modulo => Associativity::Left,
            _ => Associativity::Right,
        }
    }

    /// Operators that only take a right operand
    pub fn is_prefix(self) -> bool {
        matches!(self, Operator::Identity | Operator::Not | Operator::Negate)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// A name that passed validation: `[A-Za-z_][A-Za-z0-9_]*`
#[derive(Debug, PartialEq, Hash, PartialOrd, Ord, Eq, Clone)]
pub struct Identifier(String);

impl Identifier {
    pub fn new(name: &str) -> Result<Self> {
        let mut chars = name.chars();
        let valid = match chars.next() {
            Some(c) if c.is_ascii_alphabetic() || c == '_' => {
                chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
            }
            _ => false,
        };

        if valid {
            Ok(Identifier(name.to_string()))
        } else {
            Err(Error::InvalidIdentifier(name.to_string()))
        }
    }
}

impl Borrow<str> for Identifier {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug)]
pub struct OperatorNode {
    pub op: Operator,
    pub left: Option<Box<Node>>,
    pub right: Option<Box<Node>>,
}

#[derive(Debug)]
pub struct Application {
    pub name: Identifier,
    /// Weak so recursive functions do not keep themselves alive. The registry owns functions
    pub function: Weak<Function>,
    /// (parameter, argument) in declaration order
    pub arguments: Vec<(Identifier, Node)>,
}

#[derive(Debug)]
pub struct IfClause {
    pub condition: Box<Node>,
    pub true_branch: Box<Node>,
    pub false_branch: Box<Node>,
}

#[derive(Debug)]
pub enum Node {
    Operator(OperatorNode),
    /// Variable reference or numeric literal; only evaluation can tell which
    Symbol(String),
    Application(Application),
    If(IfClause),
    Sequence(Vec<Node>),
}

fn fmt_operand(f: &mut fmt::Formatter<'_>, operand: &Option<Box<Node>>) -> fmt::Result {
    match operand {
        Some(node) => write!(f, "{}", node),
        None => write!(f, "_"),
    }
}

/// Prefix form, eg. `(+ 1 (* 2 3))`. Missing operands print as `_`
impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Operator(node) => match node.op {
                Operator::Identity => fmt_operand(f, &node.right),
                op if op.is_prefix() && node.left.is_none() => {
                    write!(f, "({} ", op)?;
                    fmt_operand(f, &node.right)?;
                    write!(f, ")")
                }
                op => {
                    write!(f, "({} ", op)?;
                    fmt_operand(f, &node.left)?;
                    write!(f, " ")?;
                    fmt_operand(f, &node.right)?;
                    write!(f, ")")
                }
            },
            Node::Symbol(name) => write!(f, "{}", name),
            Node::Application(app) => {
                write!(f, "({}", app.name)?;
                for (_, arg) in &app.arguments {
                    write!(f, " {}", arg)?;
                }
                write!(f, ")")
            }
            Node::If(clause) => write!(
                f,
                "(if {} {} {})",
                clause.condition, clause.true_branch, clause.false_branch
            ),
            Node::Sequence(nodes) => {
                write!(f, "(begin")?;
                for node in nodes {
                    write!(f, " {}", node)?;
                }
                write!(f, ")")
            }
        }
    }
}

#[test]
fn test_identifier() {
    let valid = vec!["x", "_", "_tmp", "abc123", "A_b_C"];
    for name in valid {
        assert_eq!(Identifier::new(name).map(|i| i.to_string()), Ok(name.to_string()));
    }

    let invalid = vec!["", "1x", "3", "a-b", "a.b", "=>", "é"];
    for name in invalid {
        assert_eq!(
            Identifier::new(name),
            Err(Error::InvalidIdentifier(name.to_string()))
        );
    }
}

#[test]
fn test_operator_table() {
    assert!(Operator::Identity.precedence() < Operator::Assign.precedence());
    assert!(Operator::Plus.precedence() < Operator::Multiply.precedence());
    assert!(Operator::Power.precedence() < Operator::Negate.precedence());
    assert_eq!(Operator::Power.associativity(), Associativity::Right);
    assert_eq!(Operator::Minus.associativity(), Associativity::Left);
    assert_eq!(Operator::from_symbol("is"), Some(Operator::Is));
    assert_eq!(Operator::from_symbol("=>"), None);
    assert_eq!(Operator::from_symbol("if"), None);
}
