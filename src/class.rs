use crate::callable::LoxFunction;
use crate::error::RuntimeError;
use crate::instance::Instance;
use crate::interpreter::Interpreter;
use crate::value::Value;
use rustc_hash::FxHashMap;
use std::fmt;
use std::io::Write;
use std::rc::Rc;

/// A class value. Immutable once built, so a class can never become its own
/// ancestor.
#[derive(Clone, Debug)]
pub struct Class {
    data: Rc<ClassImpl>,
}

#[derive(Debug)]
struct ClassImpl {
    name: String,
    superclass: Option<Class>,
    methods: FxHashMap<String, LoxFunction>,
}

impl Class {
    pub fn new(
        name: &str,
        superclass: Option<Class>,
        methods: FxHashMap<String, LoxFunction>,
    ) -> Class {
        Class {
            data: Rc::new(ClassImpl {
                name: name.to_string(),
                superclass,
                methods,
            }),
        }
    }
    pub fn name(&self) -> &str {
        &self.data.name
    }
    /// Looks in this class first, then up the superclass chain.
    pub fn find_method(&self, name: &str) -> Option<LoxFunction> {
        match self.data.methods.get(name) {
            Some(method) => Some(method.clone()),
            None => self
                .data
                .superclass
                .as_ref()
                .and_then(|superclass| superclass.find_method(name)),
        }
    }
    pub fn arity(&self) -> usize {
        self.find_method("init").map_or(0, |init| init.arity())
    }
    pub fn call<W: Write>(
        &self,
        interpreter: &mut Interpreter<W>,
        arguments: Vec<Value>,
    ) -> Result<Value, RuntimeError> {
        let instance = Instance::new(self.clone());
        if let Some(initializer) = self.find_method("init") {
            initializer.bind(&instance).call(interpreter, arguments)?;
        }
        Ok(Value::from(instance))
    }
    pub fn equals(&self, other: &Class) -> bool {
        Rc::ptr_eq(&self.data, &other.data)
    }
}

impl fmt::Display for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}
