use std::cell::OnceCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use lazy_static::lazy_static;

use crate::lang::ast::{Identifier, Node};
use crate::lang::error::{Error, Result};
use crate::lang::tokenize::Token;

pub const FN_KEYWORD: &str = "fn";
pub const ARROW: &str = "=>";

lazy_static! {
    /// Words that can never name a function
    pub static ref RESERVED: HashSet<&'static str> =
        vec![FN_KEYWORD, "if", "not", "is", "end", "begin", ARROW]
            .into_iter()
            .collect();
}

/// User defined function
///
/// The body is filled in after the function is registered so that the body can call the
/// function itself.
#[derive(Debug)]
pub struct Function {
    name: Identifier,
    parameters: Vec<Identifier>,
    body: OnceCell<Node>,
}

impl Function {
    pub fn new(name: Identifier, parameters: Vec<Identifier>) -> Self {
        Function {
            name,
            parameters,
            body: OnceCell::new(),
        }
    }

    pub fn name(&self) -> &Identifier {
        &self.name
    }

    pub fn parameters(&self) -> &[Identifier] {
        &self.parameters
    }

    pub fn body(&self) -> Option<&Node> {
        self.body.get()
    }

    pub fn set_body(&self, body: Node) -> Result<()> {
        self.body
            .set(body)
            .map_err(|_| Error::malformed(format!("function '{}' already has a body", self.name)))
    }
}

/// Function registry
#[derive(Default)]
pub struct Functions {
    by_name: HashMap<Identifier, Rc<Function>>,
    /// Every defined function something can still reach: the current definitions plus
    /// replaced ones that applications still point at. Applications only hold weak
    /// references, so this keeps their targets alive
    defined: Vec<Rc<Function>>,
}

impl Functions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Rc<Function>> {
        self.by_name.get(name)
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    /// Make `func` visible under its name, returning what it replaced
    pub fn register(&mut self, func: Rc<Function>) -> Option<Rc<Function>> {
        self.by_name.insert(func.name().clone(), func)
    }

    /// Keep a fully defined function alive for the lifetime of the registry
    ///
    /// Replaced definitions that no application refers to any more are released.
    pub fn commit(&mut self, func: Rc<Function>) {
        let by_name = &self.by_name;
        self.defined.retain(|f| {
            Rc::weak_count(f) > 0 || by_name.get(f.name()).map_or(false, |g| Rc::ptr_eq(f, g))
        });
        self.defined.push(func);
    }

    /// Undo `register()`
    pub fn rollback(&mut self, name: &Identifier, previous: Option<Rc<Function>>) {
        match previous {
            Some(prev) => {
                self.by_name.insert(name.clone(), prev);
            }
            None => {
                self.by_name.remove(name);
            }
        }
    }
}

/// Raw pieces of a function definition, split out of a line but not yet validated
#[derive(Debug, PartialEq)]
pub struct Definition {
    pub name: Token,
    /// Everything between the name and `=>`, or up to the end if there is no `=>`
    pub parameters: Vec<Token>,
    /// `None` if the definition is missing its `=>`
    pub body: Option<Vec<Token>>,
}

impl Definition {
    /// Recognize a function definition
    ///
    /// Two spellings are accepted:
    ///
    /// * `fn name a b => body`
    /// * `a b => body name fn`
    ///
    /// Returns `None` if `tokens` is not a definition at all.
    pub fn from_tokens(tokens: &[Token]) -> Option<Result<Self>> {
        let is_fn = |t: &Token| t.as_str() == FN_KEYWORD;

        match tokens {
            [first, rest @ ..] if is_fn(first) => Some(Self::leading(rest)),
            [rest @ .., last] if is_fn(last) => Some(Self::trailing(rest)),
            _ => None,
        }
    }

    fn leading(tokens: &[Token]) -> Result<Self> {
        let (name, rest) = tokens
            .split_first()
            .ok_or_else(|| Error::malformed("function definition is missing a name"))?;

        let (parameters, body) = split_arrow(rest);
        Ok(Definition {
            name: name.clone(),
            parameters,
            body,
        })
    }

    fn trailing(tokens: &[Token]) -> Result<Self> {
        let (name, rest) = tokens
            .split_last()
            .ok_or_else(|| Error::malformed("function definition is missing a name"))?;

        let (parameters, body) = split_arrow(rest);
        Ok(Definition {
            name: name.clone(),
            parameters,
            body,
        })
    }
}

fn split_arrow(tokens: &[Token]) -> (Vec<Token>, Option<Vec<Token>>) {
    match tokens.iter().position(|t| t.as_str() == ARROW) {
        Some(pos) => (tokens[..pos].to_vec(), Some(tokens[pos + 1..].to_vec())),
        None => (tokens.to_vec(), None),
    }
}

/// Validate parameter names in declaration order
pub fn parse_parameters(tokens: &[Token]) -> Result<Vec<Identifier>> {
    tokens.iter().map(|t| Identifier::new(t.as_str())).collect()
}

#[cfg(test)]
fn toks(words: &[&str]) -> Vec<Token> {
    words.iter().map(|w| Token(w.to_string())).collect()
}

#[test]
fn test_definition_leading() {
    let def = Definition::from_tokens(&toks(&["fn", "add", "a", "b", "=>", "a", "+", "b"]))
        .expect("Not a definition")
        .expect("Malformed definition");
    assert_eq!(def.name.as_str(), "add");
    assert_eq!(def.parameters, toks(&["a", "b"]));
    assert_eq!(def.body, Some(toks(&["a", "+", "b"])));
}

#[test]
fn test_definition_trailing() {
    let def = Definition::from_tokens(&toks(&["a", "b", "=>", "a", "+", "b", "add", "fn"]))
        .expect("Not a definition")
        .expect("Malformed definition");
    assert_eq!(def.name.as_str(), "add");
    assert_eq!(def.parameters, toks(&["a", "b"]));
    assert_eq!(def.body, Some(toks(&["a", "+", "b"])));
}

#[test]
fn test_definition_edge_cases() {
    assert!(Definition::from_tokens(&toks(&["1", "+", "2"])).is_none());
    assert!(Definition::from_tokens(&[]).is_none());
    assert!(matches!(
        Definition::from_tokens(&toks(&["fn"])),
        Some(Err(Error::MalformedInput(_)))
    ));

    let def = Definition::from_tokens(&toks(&["fn", "f", "x", "x"]))
        .expect("Not a definition")
        .expect("Malformed definition");
    assert_eq!(def.body, None);

    let def = Definition::from_tokens(&toks(&["fn", "answer", "=>", "42"]))
        .expect("Not a definition")
        .expect("Malformed definition");
    assert!(def.parameters.is_empty());
}

#[test]
fn test_parameters() {
    assert_eq!(
        parse_parameters(&toks(&["a", "b_2"])).map(|p| p.len()),
        Ok(2)
    );
    assert_eq!(
        parse_parameters(&toks(&["a", "2b"])),
        Err(Error::InvalidIdentifier("2b".to_string()))
    );
}

#[test]
fn test_registry_rollback() {
    let ident = |s: &str| Identifier::new(s).expect("Invalid identifier");
    let mut functions = Functions::new();

    let first = Rc::new(Function::new(ident("f"), vec![ident("x")]));
    assert!(functions.register(first.clone()).is_none());
    functions.commit(first);

    let second = Rc::new(Function::new(ident("f"), vec![]));
    let previous = functions.register(second);
    assert_eq!(functions.get("f").map(|f| f.parameters().len()), Some(0));

    functions.rollback(&ident("f"), previous);
    assert_eq!(functions.get("f").map(|f| f.parameters().len()), Some(1));

    let third = Rc::new(Function::new(ident("g"), vec![]));
    let previous = functions.register(third);
    functions.rollback(&ident("g"), previous);
    assert!(functions.get("g").is_none());
    assert_eq!(functions.len(), 1);
}

#[test]
fn test_commit_releases_replaced() {
    let ident = |s: &str| Identifier::new(s).expect("Invalid identifier");
    let mut functions = Functions::new();

    let first = Rc::new(Function::new(ident("f"), vec![]));
    functions.register(first.clone());
    functions.commit(first.clone());
    assert_eq!(Rc::strong_count(&first), 3);

    // Still referenced through a weak pointer, so it survives the redefinition
    let caller = Rc::downgrade(&first);
    let second = Rc::new(Function::new(ident("f"), vec![]));
    functions.register(second.clone());
    functions.commit(second.clone());
    assert_eq!(Rc::strong_count(&first), 2);

    drop(caller);
    let third = Rc::new(Function::new(ident("f"), vec![]));
    functions.register(third.clone());
    functions.commit(third);
    assert_eq!(Rc::strong_count(&first), 1);
    // `second` is unreferenced too
    assert_eq!(Rc::strong_count(&second), 1);
    assert_eq!(functions.len(), 1);
}
