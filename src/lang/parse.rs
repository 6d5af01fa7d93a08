//! Expression parser.
//!
//! Expressions are parsed with precedence climbing. The tree under construction only ever
//! grows along its right spine, so the spine is kept as a stack of pending operator nodes:
//! the top of the stack is the node whose right operand is being parsed, and every node
//! below it is waiting for the node above it to become its right operand. Backtracking to
//! an earlier insertion point means popping (and folding) the stack.
//!
//! Developer notes:
//!
//! * The bottom of the stack is always an `identity` node. It has the lowest precedence of
//!   all operators, so every operator finds an insertion point before the stack runs out.
//!
//! * Every parse tracks how deep its tree is nested. Parsing, printing, evaluating and
//!   dropping a tree all recurse, so a tree nested deeper than `MAX_NESTING` is rejected
//!   up front.
//!
//! * There are no statement separators. An expression ends when a value is followed by
//!   something other than an operator. That token is handed back to the stream so the
//!   caller (an `if`, a `begin`, a function argument list, or the top level) can use it.

use log::debug;

use crate::lang::ast::*;
use crate::lang::error::{Error, Result};
use crate::lang::functions::{Function, Functions, ARROW, FN_KEYWORD};
use crate::lang::tokenize::TokenStream;

use std::rc::Rc;

const OPEN_PAREN: &str = "(";
const CLOSE_PAREN: &str = ")";
const IF_KEYWORD: &str = "if";
const BEGIN_KEYWORD: &str = "begin";
const END_KEYWORD: &str = "end";

/// Deepest allowed nesting of a parsed expression
pub const MAX_NESTING: usize = 256;

fn too_deep() -> Error {
    Error::malformed(format!(
        "expression nested deeper than {} levels",
        MAX_NESTING
    ))
}

/// Operator node that has not been folded into the tree yet
struct Pending {
    op: Operator,
    left: Option<Box<Node>>,
    right: Option<Box<Node>>,
}

impl Pending {
    fn new(op: Operator) -> Self {
        Pending {
            op,
            left: None,
            right: None,
        }
    }

    /// Whether `op` may become this node's right operand
    fn admits(&self, op: Operator) -> bool {
        self.op.precedence() < op.precedence()
            || (self.op.precedence() == op.precedence()
                && self.op.associativity() == Associativity::Right)
    }

    fn into_node(self) -> Node {
        Node::Operator(OperatorNode {
            op: self.op,
            left: self.left,
            right: self.right,
        })
    }
}

struct TreeBuilder {
    cursor: Pending,
    ancestors: Vec<Pending>,
}

impl TreeBuilder {
    fn new() -> Self {
        TreeBuilder {
            cursor: Pending::new(Operator::Identity),
            ancestors: Vec::new(),
        }
    }

    /// Nesting of the cursor's right operand below the root of this tree
    fn height(&self) -> usize {
        self.ancestors.len() + 1
    }

    fn has_operand(&self) -> bool {
        self.cursor.right.is_some()
    }

    fn set_operand(&mut self, node: Node) {
        self.cursor.right = Some(Box::new(node));
    }

    /// Make the cursor's parent the new cursor, with the old cursor as its right operand
    fn ascend(&mut self) -> bool {
        match self.ancestors.pop() {
            Some(parent) => {
                let child = std::mem::replace(&mut self.cursor, parent);
                self.cursor.right = Some(Box::new(child.into_node()));
                true
            }
            None => false,
        }
    }

    /// Insert `op` at the right spot on the spine and make it the cursor
    ///
    /// The new node steals the right operand of the node it is attached under.
    fn place(&mut self, op: Operator) {
        while !self.cursor.admits(op) {
            if !self.ascend() {
                break;
            }
        }

        let mut node = Pending::new(op);
        node.left = self.cursor.right.take();
        let parent = std::mem::replace(&mut self.cursor, node);
        self.ancestors.push(parent);
    }

    /// Fold the whole spine and return the `identity` root
    fn finish(mut self) -> Node {
        while self.ascend() {}
        self.cursor.into_node()
    }
}

/// Parse one expression off the front of `tokens`
///
/// Stops at the end of the stream, at a token that cannot continue the expression (left in
/// the stream), or at an unmatched `)` (also left in the stream).
pub fn parse_expression(tokens: &mut TokenStream, functions: &Functions) -> Result<Node> {
    expand(tokens, functions, false, 0)
}

/// Parse one expression whose root sits `depth` levels below the top of the line
fn expand(
    tokens: &mut TokenStream,
    functions: &Functions,
    in_group: bool,
    depth: usize,
) -> Result<Node> {
    if depth > MAX_NESTING {
        return Err(too_deep());
    }

    let mut tree = TreeBuilder::new();

    while let Some(token) = tokens.pop() {
        let word = token.as_str();

        if word == FN_KEYWORD {
            return Err(Error::malformed("function definition within expression"));
        }

        if let Some(op) = Operator::from_symbol(word) {
            let op = if op == Operator::Minus && !tree.has_operand() {
                Operator::Negate
            } else {
                op
            };
            tree.place(op);
            if depth + tree.height() > MAX_NESTING {
                return Err(too_deep());
            }
            continue;
        }

        if word == CLOSE_PAREN {
            if !in_group {
                tokens.unread(token);
            }
            return Ok(tree.finish());
        }

        if tree.has_operand() || word == END_KEYWORD {
            tokens.unread(token);
            break;
        }

        let inner = depth + tree.height() + 1;
        let operand = match word {
            IF_KEYWORD => parse_if(tokens, functions, inner)?,
            BEGIN_KEYWORD => parse_sequence(tokens, functions, inner)?,
            OPEN_PAREN => expand(tokens, functions, true, inner)?,
            ARROW => return Err(Error::malformed(format!("unexpected '{}'", ARROW))),
            _ => match functions.get(word) {
                Some(func) => parse_application(func, tokens, functions, inner)?,
                None => Node::Symbol(token.0),
            },
        };
        tree.set_operand(operand);
    }

    if in_group {
        return Err(Error::malformed("unbalanced parentheses: missing ')'"));
    }

    Ok(tree.finish())
}

/// `if <condition> <true branch> <false branch>`
fn parse_if(tokens: &mut TokenStream, functions: &Functions, depth: usize) -> Result<Node> {
    let condition = expand(tokens, functions, false, depth)?;
    let true_branch = expand(tokens, functions, false, depth)?;
    let false_branch = expand(tokens, functions, false, depth)?;

    Ok(Node::If(IfClause {
        condition: Box::new(condition),
        true_branch: Box::new(true_branch),
        false_branch: Box::new(false_branch),
    }))
}

/// `begin <expr> <expr> ... [end]`
///
/// The sequence runs to the end of the input unless closed by `end`.
fn parse_sequence(tokens: &mut TokenStream, functions: &Functions, depth: usize) -> Result<Node> {
    let mut nodes = Vec::new();

    loop {
        match tokens.peek().map(|t| t.as_str()) {
            None => break,
            Some(END_KEYWORD) => {
                tokens.pop();
                break;
            }
            Some(CLOSE_PAREN) => break,
            Some(_) => nodes.push(expand(tokens, functions, false, depth)?),
        }
    }

    if nodes.is_empty() {
        return Err(Error::EmptySequence);
    }

    Ok(Node::Sequence(nodes))
}

/// Parse one argument expression per declared parameter
fn parse_application(
    func: &Rc<Function>,
    tokens: &mut TokenStream,
    functions: &Functions,
    depth: usize,
) -> Result<Node> {
    let mut arguments = Vec::with_capacity(func.parameters().len());
    for param in func.parameters() {
        let arg = expand(tokens, functions, false, depth)?;
        arguments.push((param.clone(), arg));
    }

    Ok(Node::Application(Application {
        name: func.name().clone(),
        function: Rc::downgrade(func),
        arguments,
    }))
}

/// An expression parsed off the front of a line
pub struct Parsed {
    pub node: Node,
    /// Tokens following the expression
    pub rest: TokenStream,
}

impl Parsed {
    /// Fail if the expression did not take up the whole line
    pub fn check_consumed(&self) -> Result<()> {
        if self.rest.is_empty() {
            Ok(())
        } else {
            Err(Error::malformed(format!(
                "unexpected '{}' after complete expression",
                self.rest.remaining()
            )))
        }
    }
}

/// Parse one expression and hand back whatever follows it
pub fn parse_partial(tokens: TokenStream, functions: &Functions) -> Result<Parsed> {
    let mut rest = tokens;
    let node = parse_expression(&mut rest, functions)?;

    debug!("parsed: {}", node);
    Ok(Parsed { node, rest })
}

/// Parse `tokens` as exactly one expression
pub fn parse(tokens: TokenStream, functions: &Functions) -> Result<Node> {
    let parsed = parse_partial(tokens, functions)?;
    parsed.check_consumed()?;

    Ok(parsed.node)
}

#[cfg(test)]
fn parse_str(input: &str, functions: &Functions) -> Result<String> {
    use crate::lang::tokenize::tokenize;

    let tokens = tokenize(input)?;
    parse(tokens.into(), functions).map(|n| n.to_string())
}

#[test]
fn test_precedence() {
    let functions = Functions::new();
    let tests = vec![
        ("1", "1"),
        ("3 + 4 * 2", "(+ 3 (* 4 2))"),
        ("3 * 4 + 2", "(+ (* 3 4) 2)"),
        ("1 + 2 < 3 * 4", "(< (+ 1 2) (* 3 4))"),
        ("x = y = 1 + 2", "(= x (= y (+ 1 2)))"),
        ("a % b / c", "(/ (% a b) c)"),
        ("x = 1 is 2", "(= x (is 1 2))"),
    ];

    for (input, expected) in tests {
        assert_eq!(parse_str(input, &functions), Ok(expected.to_string()));
    }
}

#[test]
fn test_associativity() {
    let functions = Functions::new();
    let tests = vec![
        ("10 - 3 - 2", "(- (- 10 3) 2)"),
        ("2 ^ 3 ^ 2", "(^ 2 (^ 3 2))"),
        ("1 < 2 < 3", "(< 1 (< 2 3))"),
        ("8 / 4 * 2", "(* (/ 8 4) 2)"),
    ];

    for (input, expected) in tests {
        assert_eq!(parse_str(input, &functions), Ok(expected.to_string()));
    }
}

#[test]
fn test_unary() {
    let functions = Functions::new();
    let tests = vec![
        ("-1", "(- 1)"),
        ("2 * -3", "(* 2 (- 3))"),
        ("1 - -1", "(- 1 (- 1))"),
        ("- - x", "(- (- x))"),
        ("-2 ^ 2", "(^ (- 2) 2)"),
        ("not 1 is 2", "(not (is 1 2))"),
        ("x = not 0", "(= x (not 0))"),
    ];

    for (input, expected) in tests {
        assert_eq!(parse_str(input, &functions), Ok(expected.to_string()));
    }
}

#[test]
fn test_parens() {
    let functions = Functions::new();
    let tests = vec![
        ("(1 + 2) * 3", "(* (+ 1 2) 3)"),
        ("((1))", "1"),
        ("2 ^ (1 - 3) ^ 2", "(^ 2 (^ (- 1 3) 2))"),
        ("-(x)", "(- x)"),
    ];

    for (input, expected) in tests {
        assert_eq!(parse_str(input, &functions), Ok(expected.to_string()));
    }

    assert!(matches!(
        parse_str("(1 + 2", &functions),
        Err(Error::MalformedInput(_))
    ));
    assert!(matches!(
        parse_str("1 + 2)", &functions),
        Err(Error::MalformedInput(_))
    ));
}

#[test]
fn test_clauses() {
    let functions = Functions::new();
    let tests = vec![
        ("if 1 < 2 10 20", "(if (< 1 2) 10 20)"),
        ("if x -1 1", "(if (- x 1) 1 _)"),
        ("if x (-1) 1", "(if x (- 1) 1)"),
        ("begin x = 1 y = 2 x + y", "(begin (= x 1) (= y 2) (+ x y))"),
        ("begin 1 end", "(begin 1)"),
        ("begin 1 end + 2", "(+ (begin 1) 2)"),
        ("(begin 1 2) * 3", "(* (begin 1 2) 3)"),
        ("if 1 begin 2 3 end 4", "(if 1 (begin 2 3) 4)"),
    ];

    for (input, expected) in tests {
        assert_eq!(parse_str(input, &functions), Ok(expected.to_string()));
    }
}

#[test]
fn test_parse_errors() {
    let functions = Functions::new();

    assert_eq!(parse_str("begin end", &functions), Err(Error::EmptySequence));
    assert_eq!(parse_str("begin", &functions), Err(Error::EmptySequence));
    assert!(matches!(
        parse_str("1 1", &functions),
        Err(Error::MalformedInput(_))
    ));
    assert!(matches!(
        parse_str("1 + fn", &functions),
        Err(Error::MalformedInput(_))
    ));
    assert!(matches!(
        parse_str("x => 1", &functions),
        Err(Error::MalformedInput(_))
    ));
    assert!(matches!(
        parse_str("end", &functions),
        Err(Error::MalformedInput(_))
    ));
}

#[test]
fn test_application() {
    let ident = |s: &str| Identifier::new(s).expect("Invalid identifier");
    let mut functions = Functions::new();
    functions.register(Rc::new(Function::new(
        ident("add"),
        vec![ident("a"), ident("b")],
    )));
    functions.register(Rc::new(Function::new(ident("pi"), vec![])));

    let tests = vec![
        ("add 3 4", "(add 3 4)"),
        ("add 1 + 2 3", "(add (+ 1 2) 3)"),
        ("add (add 1 2) 3 * 2", "(add (add 1 2) (* 3 2))"),
        ("1 + add 2 3", "(+ 1 (add 2 3))"),
        ("pi * 2", "(* (pi) 2)"),
    ];

    for (input, expected) in tests {
        assert_eq!(parse_str(input, &functions), Ok(expected.to_string()));
    }
}

#[test]
fn test_nesting_limit() {
    let functions = Functions::new();

    let negations = format!("{}1", "- ".repeat(200_000));
    assert!(matches!(
        parse_str(&negations, &functions),
        Err(Error::MalformedInput(_))
    ));

    let groups = format!("{}1{}", "(".repeat(100_000), ")".repeat(100_000));
    assert!(matches!(
        parse_str(&groups, &functions),
        Err(Error::MalformedInput(_))
    ));

    let branches = format!("{}1 2 3", "if 1 ".repeat(100_000));
    assert!(matches!(
        parse_str(&branches, &functions),
        Err(Error::MalformedInput(_))
    ));

    // Moderate nesting is fine
    let shallow = format!("{}1{}", "(".repeat(50), ")".repeat(50));
    assert_eq!(parse_str(&shallow, &functions), Ok("1".to_string()));
    let negations = format!("{}1", "- ".repeat(100));
    assert!(parse_str(&negations, &functions).is_ok());
}
