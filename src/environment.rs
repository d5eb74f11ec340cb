use crate::error::RuntimeError;
use crate::token::Token;
use crate::value::Value;
use rustc_hash::FxHashMap;
use std::cell::RefCell;
use std::rc::Rc;

/// One frame of variable bindings, linked to the frame it was created in.
/// Cloning an `Environment` shares the frame; closures and the interpreter's
/// current-scope pointer all alias the same bindings.
#[derive(Clone, Debug, Default)]
pub struct Environment {
    data: Rc<RefCell<EnvironmentImpl>>,
}

#[derive(Debug, Default)]
struct EnvironmentImpl {
    values: FxHashMap<String, Value>,
    parent: Option<Environment>,
}

impl Environment {
    pub fn new() -> Environment {
        Environment::default()
    }
    pub fn new_child(&self) -> Environment {
        Environment {
            data: Rc::new(RefCell::new(EnvironmentImpl {
                values: FxHashMap::default(),
                parent: Some(self.clone()),
            })),
        }
    }
    pub fn parent(&self) -> Option<Environment> {
        self.data.borrow().parent.clone()
    }
    /// Binds `name` in this frame, replacing any previous binding here.
    pub fn define(&self, name: &str, value: Value) {
        self.data.borrow_mut().values.insert(name.to_string(), value);
    }
    pub fn get(&self, token: &Token) -> Result<Value, RuntimeError> {
        let data = self.data.borrow();
        match data.values.get(&token.lexeme) {
            Some(value) => Ok(value.clone()),
            None => match &data.parent {
                Some(parent) => parent.get(token),
                None => Err(undefined(token)),
            },
        }
    }
    pub fn assign(&self, token: &Token, value: Value) -> Result<Value, RuntimeError> {
        if self.data.borrow().values.contains_key(&token.lexeme) {
            self.define(&token.lexeme, value.clone());
            return Ok(value);
        }
        match self.parent() {
            Some(parent) if parent.has(token) => parent.assign(token, value),
            _ => Err(undefined(token)),
        }
    }
    pub fn has(&self, token: &Token) -> bool {
        let data = self.data.borrow();
        data.values.contains_key(&token.lexeme)
            || data.parent.as_ref().map_or(false, |parent| parent.has(token))
    }
    /// Reads `name` from the frame exactly `distance` links up the chain.
    pub fn get_at(&self, distance: usize, name: &str) -> Option<Value> {
        self.ancestor(distance)?
            .data
            .borrow()
            .values
            .get(name)
            .cloned()
    }
    pub fn assign_at(
        &self,
        distance: usize,
        token: &Token,
        value: Value,
    ) -> Result<Value, RuntimeError> {
        let frame = self.ancestor(distance).ok_or_else(|| undefined(token))?;
        frame.define(&token.lexeme, value.clone());
        Ok(value)
    }
    fn ancestor(&self, distance: usize) -> Option<Environment> {
        let mut environment = self.clone();
        for _ in 0..distance {
            environment = environment.parent()?;
        }
        Some(environment)
    }
    pub fn equals(&self, other: &Environment) -> bool {
        Rc::ptr_eq(&self.data, &other.data)
    }
}

fn undefined(token: &Token) -> RuntimeError {
    RuntimeError::new(token, format!("Undefined variable '{}'.", token.lexeme))
}

#[cfg(test)]
mod environment_tests {
    use crate::environment::Environment;
    use crate::token::{Token, TokenType};
    use crate::value::Value;

    fn name(lexeme: &str) -> Token {
        Token::new(TokenType::Identifier, lexeme, None, 1, 1)
    }

    fn number(value: Option<Value>) -> f64 {
        match value {
            Some(Value::Number(x)) => x,
            other => panic!("expected a number, got {:?}", other),
        }
    }

    #[test]
    fn get_walks_the_parent_chain() {
        let globals = Environment::new();
        globals.define("a", Value::Number(1.0));
        let child = globals.new_child().new_child();
        assert_eq!(number(child.get(&name("a")).ok()), 1.0);
        assert!(child.has(&name("a")));
        assert!(!child.has(&name("b")));
        let err = child.get(&name("b")).unwrap_err();
        assert_eq!(err.message, "Undefined variable 'b'.");
    }

    #[test]
    fn assign_updates_the_declaring_frame() {
        let globals = Environment::new();
        globals.define("a", Value::Number(1.0));
        let child = globals.new_child();
        child.assign(&name("a"), Value::Number(2.0)).unwrap();
        assert_eq!(number(globals.get(&name("a")).ok()), 2.0);
        assert!(child.assign(&name("nope"), Value::Nil).is_err());
    }

    #[test]
    fn shadowing_frames_are_independent() {
        let globals = Environment::new();
        globals.define("a", Value::Number(1.0));
        let child = globals.new_child();
        child.define("a", Value::Number(2.0));
        assert_eq!(number(child.get_at(0, "a")), 2.0);
        assert_eq!(number(child.get_at(1, "a")), 1.0);
        child.assign_at(1, &name("a"), Value::Number(3.0)).unwrap();
        assert_eq!(number(globals.get_at(0, "a")), 3.0);
        assert_eq!(number(child.get_at(0, "a")), 2.0);
    }

    #[test]
    fn resolved_access_past_the_root_fails() {
        let globals = Environment::new();
        assert!(globals.get_at(1, "a").is_none());
        assert!(globals.assign_at(2, &name("a"), Value::Nil).is_err());
    }

    #[test]
    fn clones_share_the_frame() {
        let env = Environment::new();
        let alias = env.clone();
        alias.define("x", Value::Boolean(true));
        assert!(env.has(&name("x")));
        assert!(env.equals(&alias));
        assert!(!env.equals(&env.new_child()));
        assert!(env.new_child().parent().unwrap().equals(&env));
    }
}
