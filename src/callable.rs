use crate::ast::FunctionDecl;
use crate::class::Class;
use crate::environment::Environment;
use crate::error::RuntimeError;
use crate::instance::Instance;
use crate::interpreter::{Completion, Interpreter};
use crate::value::Value;
use log::trace;
use std::fmt;
use std::io::Write;
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Anything that can appear on the left of a call expression.
#[derive(Clone, Debug)]
pub enum Callable {
    Native(Rc<NativeFunction>),
    Function(LoxFunction),
    Class(Class),
}

impl Callable {
    pub fn arity(&self) -> usize {
        match self {
            Callable::Native(f) => f.arity,
            Callable::Function(f) => f.arity(),
            Callable::Class(c) => c.arity(),
        }
    }
    /// Invokes the callable. The caller has already checked the argument
    /// count against `arity`.
    pub fn call<W: Write>(
        &self,
        interpreter: &mut Interpreter<W>,
        arguments: Vec<Value>,
    ) -> Result<Value, RuntimeError> {
        match self {
            Callable::Native(f) => Ok((f.call)(&arguments)),
            Callable::Function(f) => f.call(interpreter, arguments),
            Callable::Class(c) => c.call(interpreter, arguments),
        }
    }
    pub fn equals(&self, other: &Callable) -> bool {
        match (self, other) {
            (Callable::Native(l), Callable::Native(r)) => Rc::ptr_eq(l, r),
            (Callable::Function(l), Callable::Function(r)) => l.equals(r),
            (Callable::Class(l), Callable::Class(r)) => l.equals(r),
            _ => false,
        }
    }
}

impl fmt::Display for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Callable::Native(x) => write!(f, "{}", x),
            Callable::Function(x) => write!(f, "{}", x),
            Callable::Class(x) => write!(f, "{}", x),
        }
    }
}

/// A user-defined function or method together with the environment it closes
/// over.
#[derive(Clone)]
pub struct LoxFunction {
    data: Rc<LoxFunctionImpl>,
}

struct LoxFunctionImpl {
    declaration: Rc<FunctionDecl>,
    closure: Environment,
    is_initializer: bool,
}

impl fmt::Display for LoxFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<fn {}>", self.name())
    }
}

// Closures reach back into the environments that hold them, so a derived
// Debug would never terminate.
impl fmt::Debug for LoxFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}

impl LoxFunction {
    pub fn new(
        declaration: Rc<FunctionDecl>,
        closure: Environment,
        is_initializer: bool,
    ) -> LoxFunction {
        LoxFunction {
            data: Rc::new(LoxFunctionImpl {
                declaration,
                closure,
                is_initializer,
            }),
        }
    }
    pub fn name(&self) -> &str {
        &self.data.declaration.name.lexeme
    }
    pub fn arity(&self) -> usize {
        self.data.declaration.params.len()
    }
    /// Returns a copy of this method whose closure binds `this` to `instance`.
    pub fn bind(&self, instance: &Instance) -> LoxFunction {
        let environment = self.data.closure.new_child();
        environment.define("this", Value::from(instance.clone()));
        LoxFunction::new(
            self.data.declaration.clone(),
            environment,
            self.data.is_initializer,
        )
    }
    pub fn call<W: Write>(
        &self,
        interpreter: &mut Interpreter<W>,
        arguments: Vec<Value>,
    ) -> Result<Value, RuntimeError> {
        trace!("call {}", self);
        let environment = self.data.closure.new_child();
        for (param, argument) in self.data.declaration.params.iter().zip(arguments) {
            environment.define(&param.lexeme, argument);
        }
        let completion = interpreter.execute_block(&self.data.declaration.body, environment)?;
        if self.data.is_initializer {
            return Ok(self.data.closure.get_at(0, "this").unwrap_or(Value::Nil));
        }
        match completion {
            Completion::Return(value) => Ok(value),
            Completion::Normal => Ok(Value::Nil),
        }
    }
    pub fn equals(&self, other: &LoxFunction) -> bool {
        Rc::ptr_eq(&self.data, &other.data)
    }
}

/// A function implemented by the host.
pub struct NativeFunction {
    pub name: &'static str,
    pub arity: usize,
    pub call: fn(&[Value]) -> Value,
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<native fn {}>", self.name)
    }
}

impl fmt::Display for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<native fn>")
    }
}

fn since_epoch() -> std::time::Duration {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
}

/// The functions every program starts with.
pub fn natives() -> Vec<NativeFunction> {
    vec![
        NativeFunction {
            name: "clock",
            arity: 0,
            call: |_| Value::Number(since_epoch().as_secs_f64()),
        },
        NativeFunction {
            name: "now",
            arity: 0,
            call: |_| Value::Number(since_epoch().as_millis() as f64),
        },
    ]
}

#[cfg(test)]
mod callable_tests {
    use super::*;

    #[test]
    fn natives_take_no_arguments() {
        let natives = natives();
        let names: Vec<&str> = natives.iter().map(|f| f.name).collect();
        assert_eq!(names, vec!["clock", "now"]);
        for native in natives {
            assert_eq!(native.arity, 0);
            assert_eq!(native.to_string(), "<native fn>");
            match (native.call)(&[]) {
                Value::Number(x) => assert!(x > 0.0),
                other => panic!("expected a number, got {}", other),
            }
        }
    }

    #[test]
    fn natives_compare_by_identity() {
        let mut natives = natives().into_iter().map(Rc::new);
        let clock = Callable::Native(natives.next().unwrap());
        let now = Callable::Native(natives.next().unwrap());
        assert!(clock.equals(&clock.clone()));
        assert!(!clock.equals(&now));
    }
}
