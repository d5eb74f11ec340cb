use crate::callable::Callable;
use crate::instance::Instance;
use std::fmt;
use std::fmt::Formatter;

#[derive(Debug, Clone)]
pub enum Value {
    Nil,
    Boolean(bool),
    Number(f64),
    String(String),
    Callable(Callable),
    Instance(Instance),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),
            Value::Boolean(x) => write!(f, "{}", x),
            Value::Number(x) => write!(f, "{}", format_number(*x)),
            Value::String(x) => write!(f, "{}", x),
            Value::Callable(x) => write!(f, "{}", x),
            Value::Instance(x) => write!(f, "{}", x),
        }
    }
}

impl Value {
    /// Only `nil` and `false` are falsey.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Nil => false,
            Value::Boolean(x) => *x,
            _ => true,
        }
    }

    /// Equality never coerces across kinds. Callables and instances compare
    /// by identity.
    pub fn equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Boolean(l), Value::Boolean(r)) => l == r,
            (Value::Number(l), Value::Number(r)) => l == r,
            (Value::String(l), Value::String(r)) => l == r,
            (Value::Callable(l), Value::Callable(r)) => l.equals(r),
            (Value::Instance(l), Value::Instance(r)) => l.equals(r),
            _ => false,
        }
    }
}

impl From<Callable> for Value {
    fn from(callable: Callable) -> Value {
        Value::Callable(callable)
    }
}

impl From<Instance> for Value {
    fn from(instance: Instance) -> Value {
        Value::Instance(instance)
    }
}

pub fn format_number(x: f64) -> String {
    if x.is_nan() {
        String::from("NaN")
    } else if x.is_infinite() {
        if x.is_sign_negative() {
            String::from("-Infinity")
        } else {
            String::from("Infinity")
        }
    } else if x == 0.0 {
        String::from("0")
    } else if x.abs() >= 1e21 || x.abs() < 1e-6 {
        // Exponent form, with an explicit sign on positive exponents.
        let formatted = format!("{:e}", x);
        match formatted.find('e') {
            Some(idx) if !formatted[idx + 1..].starts_with('-') => {
                format!("{}e+{}", &formatted[..idx], &formatted[idx + 1..])
            }
            _ => formatted,
        }
    } else {
        format!("{}", x)
    }
}
