use crate::callable::Callable;
use crate::class::Class;
use crate::error::RuntimeError;
use crate::token::Token;
use crate::value::Value;
use rustc_hash::FxHashMap;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

#[derive(Clone)]
pub struct Instance {
    data: Rc<RefCell<InstanceImpl>>,
}

struct InstanceImpl {
    class: Class,
    fields: FxHashMap<String, Value>,
}

impl Instance {
    pub fn new(class: Class) -> Instance {
        Instance {
            data: Rc::new(RefCell::new(InstanceImpl {
                class,
                fields: FxHashMap::default(),
            })),
        }
    }
    pub fn class(&self) -> Class {
        self.data.borrow().class.clone()
    }
    /// Fields shadow methods of the same name.
    pub fn get(&self, name: &Token) -> Result<Value, RuntimeError> {
        if let Some(value) = self.data.borrow().fields.get(&name.lexeme) {
            return Ok(value.clone());
        }
        match self.class().find_method(&name.lexeme) {
            Some(method) => Ok(Value::Callable(Callable::Function(method.bind(self)))),
            None => Err(RuntimeError::new(
                name,
                format!("Undefined property '{}'.", name.lexeme),
            )),
        }
    }
    pub fn set(&self, name: &Token, value: Value) {
        self.data
            .borrow_mut()
            .fields
            .insert(name.lexeme.clone(), value);
    }
    pub fn equals(&self, other: &Instance) -> bool {
        Rc::ptr_eq(&self.data, &other.data)
    }
}

impl fmt::Display for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{} instance>", self.data.borrow().class.name())
    }
}

// Fields may refer back to the instance itself.
impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}

#[cfg(test)]
mod instance_tests {
    use crate::class::Class;
    use crate::instance::Instance;
    use crate::token::{Token, TokenType};
    use crate::value::Value;
    use rustc_hash::FxHashMap;

    fn name(lexeme: &str) -> Token {
        Token::new(TokenType::Identifier, lexeme, None, 1, 1)
    }

    #[test]
    fn fields_are_created_on_first_write() {
        let class = Class::new("Point", None, FxHashMap::default());
        let point = Instance::new(class);
        assert_eq!(point.to_string(), "<Point instance>");

        let err = point.get(&name("x")).unwrap_err();
        assert_eq!(err.message, "Undefined property 'x'.");

        point.set(&name("x"), Value::Number(1.0));
        point.set(&name("x"), Value::Number(2.0));
        assert!(point.get(&name("x")).unwrap().equals(&Value::Number(2.0)));
    }

    #[test]
    fn instances_compare_by_identity() {
        let class = Class::new("A", None, FxHashMap::default());
        let a = Instance::new(class.clone());
        let b = Instance::new(class);
        assert!(a.equals(&a.clone()));
        assert!(!a.equals(&b));
        assert!(a.class().equals(&b.class()));
    }
}
