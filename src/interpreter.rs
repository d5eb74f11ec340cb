use crate::ast::{ExprId, Expression, LiteralValue, Statement, Visitor};
use crate::callable::{natives, Callable, LoxFunction};
use crate::class::Class;
use crate::environment::Environment;
use crate::error::RuntimeError;
use crate::resolver::Locals;
use crate::token::{Token, TokenType};
use crate::value::Value;
use log::{debug, trace};
use rustc_hash::FxHashMap;
use std::io::Write;
use std::rc::Rc;

/// How a statement finished. Only a function call consumes `Return`; every
/// other statement hands it straight back to its caller.
#[derive(Debug)]
pub enum Completion {
    Normal,
    Return(Value),
}

/// Nested calls deeper than this fail with `Stack overflow.` instead of
/// exhausting the host stack.
pub const MAX_CALL_DEPTH: usize = 64;

type EvalResult = Result<Value, RuntimeError>;
type ExecResult = Result<Completion, RuntimeError>;

/// Evaluates resolved syntax trees. `print` writes to `stdout`.
pub struct Interpreter<W: Write> {
    globals: Environment,
    environment: Environment,
    locals: Locals,
    depth: usize,
    stdout: W,
}

impl<W: Write> Visitor<Expression, EvalResult> for Interpreter<W> {
    fn visit(&mut self, expr: &Expression) -> EvalResult {
        match expr {
            Expression::Literal(x) => Ok(match x {
                LiteralValue::Nil => Value::Nil,
                LiteralValue::Boolean(x) => Value::Boolean(*x),
                LiteralValue::Number(x) => Value::Number(*x),
                LiteralValue::String(x) => Value::String(x.clone()),
            }),
            Expression::Grouping(x) => self.evaluate(x),
            Expression::Unary { operator, right } => {
                let right = self.evaluate(right)?;
                match operator.tokentype {
                    TokenType::Minus => match right {
                        Value::Number(r) => Ok(Value::Number(-r)),
                        _ => Err(RuntimeError::new(operator, "Operand must be a number.")),
                    },
                    TokenType::Bang => Ok(Value::Boolean(!right.is_truthy())),
                    _ => Err(unknown_operator(operator)),
                }
            }
            Expression::Binary {
                left,
                operator,
                right,
            } => {
                if operator.is(TokenType::Comma) {
                    self.evaluate(left)?;
                    return self.evaluate(right);
                }
                let left = self.evaluate(left)?;
                let right = self.evaluate(right)?;
                binary(operator, left, right)
            }
            Expression::Ternary {
                condition,
                left,
                right,
                ..
            } => {
                if self.evaluate(condition)?.is_truthy() {
                    self.evaluate(left)
                } else {
                    self.evaluate(right)
                }
            }
            Expression::Logical {
                left,
                operator,
                right,
            } => {
                let left = self.evaluate(left)?;
                let short_circuit = match operator.tokentype {
                    TokenType::Or => left.is_truthy(),
                    _ => !left.is_truthy(),
                };
                if short_circuit {
                    Ok(left)
                } else {
                    self.evaluate(right)
                }
            }
            Expression::Variable { id, name } => self.look_up_variable(name, *id),
            Expression::Assign { id, name, value } => {
                let value = self.evaluate(value)?;
                match self.locals.get(id) {
                    Some(distance) => self.environment.assign_at(*distance, name, value),
                    None => self.globals.assign(name, value),
                }
            }
            Expression::Call {
                callee,
                paren,
                arguments,
            } => {
                let callee = self.evaluate(callee)?;
                let mut evaluated = Vec::with_capacity(arguments.len());
                for argument in arguments {
                    evaluated.push(self.evaluate(argument)?);
                }
                match callee {
                    Value::Callable(function) => {
                        if function.arity() != evaluated.len() {
                            return Err(RuntimeError::new(
                                paren,
                                format!(
                                    "Expected {} arguments but got {}.",
                                    function.arity(),
                                    evaluated.len()
                                ),
                            ));
                        }
                        if self.depth == MAX_CALL_DEPTH {
                            return Err(RuntimeError::new(paren, "Stack overflow."));
                        }
                        self.depth += 1;
                        let result = function.call(self, evaluated);
                        self.depth -= 1;
                        result
                    }
                    _ => Err(RuntimeError::new(
                        paren,
                        "Can only call functions and classes.",
                    )),
                }
            }
            Expression::Get { object, name } => match self.evaluate(object)? {
                Value::Instance(instance) => instance.get(name),
                _ => Err(RuntimeError::new(name, "Only instances have properties.")),
            },
            Expression::Set {
                object,
                name,
                value,
            } => match self.evaluate(object)? {
                Value::Instance(instance) => {
                    let value = self.evaluate(value)?;
                    instance.set(name, value.clone());
                    Ok(value)
                }
                _ => Err(RuntimeError::new(name, "Only instances have fields.")),
            },
            Expression::This { id, keyword } => self.look_up_variable(keyword, *id),
            Expression::Super {
                id,
                keyword,
                method,
            } => {
                let distance = *self.locals.get(id).ok_or_else(|| undefined(keyword))?;
                let superclass = match self.environment.get_at(distance, "super") {
                    Some(Value::Callable(Callable::Class(superclass))) => superclass,
                    _ => return Err(undefined(keyword)),
                };
                // `this` lives in the environment just inside the one binding `super`.
                let object = match distance
                    .checked_sub(1)
                    .and_then(|d| self.environment.get_at(d, "this"))
                {
                    Some(Value::Instance(object)) => object,
                    _ => return Err(RuntimeError::new(keyword, "Undefined variable 'this'.")),
                };
                match superclass.find_method(&method.lexeme) {
                    Some(found) => Ok(Value::from(Callable::Function(found.bind(&object)))),
                    None => Err(RuntimeError::new(
                        method,
                        format!("Undefined property '{}'.", method.lexeme),
                    )),
                }
            }
        }
    }
}

impl<W: Write> Visitor<Statement, ExecResult> for Interpreter<W> {
    fn visit(&mut self, stmt: &Statement) -> ExecResult {
        match stmt {
            Statement::Expression(expr) => {
                self.evaluate(expr)?;
            }
            Statement::Print { keyword, value } => {
                let value = self.evaluate(value)?;
                writeln!(self.stdout, "{}", value)
                    .map_err(|_| RuntimeError::new(keyword, "Unable to write output."))?;
            }
            Statement::Var { name, initializer } => {
                let value = match initializer {
                    Some(initializer) => self.evaluate(initializer)?,
                    None => Value::Nil,
                };
                self.environment.define(&name.lexeme, value);
            }
            Statement::Block(stmts) => {
                let environment = self.environment.new_child();
                return self.execute_block(stmts, environment);
            }
            Statement::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.evaluate(condition)?.is_truthy() {
                    return self.execute(then_branch);
                } else if let Some(else_branch) = else_branch {
                    return self.execute(else_branch);
                }
            }
            Statement::While { condition, body } => {
                while self.evaluate(condition)?.is_truthy() {
                    if let Completion::Return(value) = self.execute(body)? {
                        return Ok(Completion::Return(value));
                    }
                }
            }
            Statement::Function(decl) => {
                let function = LoxFunction::new(decl.clone(), self.environment.clone(), false);
                self.environment.define(
                    &decl.name.lexeme,
                    Value::from(Callable::Function(function)),
                );
            }
            Statement::Return { value, .. } => {
                let value = match value {
                    Some(value) => self.evaluate(value)?,
                    None => Value::Nil,
                };
                return Ok(Completion::Return(value));
            }
            Statement::Class {
                name,
                superclass,
                methods,
            } => {
                self.environment.define(&name.lexeme, Value::Nil);

                let superclass = match superclass {
                    None => None,
                    Some(expr) => match self.evaluate(expr)? {
                        Value::Callable(Callable::Class(superclass)) => Some(superclass),
                        _ => {
                            let token = match expr {
                                Expression::Variable { name, .. } => name,
                                _ => name,
                            };
                            return Err(RuntimeError::new(token, "Superclass must be a class."));
                        }
                    },
                };

                let enclosing = superclass.as_ref().map(|superclass| {
                    let environment = self.environment.new_child();
                    environment.define("super", Value::from(Callable::Class(superclass.clone())));
                    std::mem::replace(&mut self.environment, environment)
                });

                let methods: FxHashMap<String, LoxFunction> = methods
                    .iter()
                    .map(|method| {
                        let function = LoxFunction::new(
                            method.clone(),
                            self.environment.clone(),
                            method.name.lexeme == "init",
                        );
                        (method.name.lexeme.clone(), function)
                    })
                    .collect();
                let class = Class::new(&name.lexeme, superclass, methods);

                if let Some(enclosing) = enclosing {
                    self.environment = enclosing;
                }
                self.environment
                    .assign(name, Value::from(Callable::Class(class)))?;
            }
        }
        Ok(Completion::Normal)
    }
}

impl<W: Write> Interpreter<W> {
    pub fn new(stdout: W) -> Interpreter<W> {
        let globals = Environment::new();
        for native in natives() {
            globals.define(native.name, Value::from(Callable::Native(Rc::new(native))));
        }
        Interpreter {
            environment: globals.clone(),
            globals,
            locals: Locals::default(),
            depth: 0,
            stdout,
        }
    }
    /// Records how far up the environment chain the reference `id` is bound.
    pub fn resolve(&mut self, id: ExprId, depth: usize) {
        self.locals.insert(id, depth);
    }
    /// Runs top-level statements in order, stopping at the first runtime
    /// error.
    pub fn interpret(&mut self, statements: &[Statement]) -> Result<(), RuntimeError> {
        debug!("interpreting {} statements", statements.len());
        for stmt in statements {
            self.execute(stmt)?;
        }
        Ok(())
    }
    /// Runs `statements` with `environment` as the current scope, restoring
    /// the previous scope however the block exits.
    pub fn execute_block(
        &mut self,
        statements: &[Statement],
        environment: Environment,
    ) -> ExecResult {
        trace!("enter block of {} statements", statements.len());
        let previous = std::mem::replace(&mut self.environment, environment);
        let result = self.execute_all(statements);
        self.environment = previous;
        result
    }
    pub fn into_output(self) -> W {
        self.stdout
    }
    fn execute_all(&mut self, statements: &[Statement]) -> ExecResult {
        for stmt in statements {
            if let Completion::Return(value) = self.execute(stmt)? {
                return Ok(Completion::Return(value));
            }
        }
        Ok(Completion::Normal)
    }
    fn evaluate(&mut self, expr: &Expression) -> EvalResult {
        expr.accept(self)
    }
    fn execute(&mut self, stmt: &Statement) -> ExecResult {
        stmt.accept(self)
    }
    fn look_up_variable(&self, name: &Token, id: ExprId) -> EvalResult {
        match self.locals.get(&id) {
            Some(distance) => self
                .environment
                .get_at(*distance, &name.lexeme)
                .ok_or_else(|| undefined(name)),
            None => self.globals.get(name),
        }
    }
}

fn binary(operator: &Token, left: Value, right: Value) -> EvalResult {
    match operator.tokentype {
        TokenType::EqualEqual => Ok(Value::Boolean(left.equals(&right))),
        TokenType::BangEqual => Ok(Value::Boolean(!left.equals(&right))),
        TokenType::Plus => match (left, right) {
            (Value::Number(l), Value::Number(r)) => Ok(Value::Number(l + r)),
            (Value::String(l), Value::String(r)) => Ok(Value::String(l + &r)),
            _ => Err(RuntimeError::new(
                operator,
                "Operands must be two numbers or two strings.",
            )),
        },
        _ => {
            let (l, r) = match (left, right) {
                (Value::Number(l), Value::Number(r)) => (l, r),
                _ => return Err(RuntimeError::new(operator, "Operands must be numbers.")),
            };
            match operator.tokentype {
                TokenType::Minus => Ok(Value::Number(l - r)),
                TokenType::Slash => Ok(Value::Number(l / r)),
                TokenType::Star => Ok(Value::Number(l * r)),
                TokenType::Greater => Ok(Value::Boolean(l > r)),
                TokenType::GreaterEqual => Ok(Value::Boolean(l >= r)),
                TokenType::Less => Ok(Value::Boolean(l < r)),
                TokenType::LessEqual => Ok(Value::Boolean(l <= r)),
                _ => Err(unknown_operator(operator)),
            }
        }
    }
}

fn undefined(name: &Token) -> RuntimeError {
    RuntimeError::new(name, format!("Undefined variable '{}'.", name.lexeme))
}

fn unknown_operator(operator: &Token) -> RuntimeError {
    RuntimeError::new(
        operator,
        format!("Unknown operator '{}'.", operator.lexeme),
    )
}

#[cfg(test)]
mod interpreter_tests {
    use crate::error::{Diagnostics, RuntimeError};
    use crate::interpreter::Interpreter;
    use crate::parser;
    use crate::resolver;
    use crate::scanner;
    use pretty_assertions::assert_eq;

    fn execute(source: &str) -> (String, Option<RuntimeError>) {
        let mut diagnostics = Diagnostics::new();
        let tokens = scanner::scan_tokens(source, &mut diagnostics);
        let statements = parser::parse(&tokens, false, &mut diagnostics);
        let locals = resolver::resolve(&statements, &mut diagnostics);
        assert!(!diagnostics.had_error(), "{:?}", diagnostics.errors());

        let mut interpreter = Interpreter::new(Vec::new());
        for (id, depth) in locals {
            interpreter.resolve(id, depth);
        }
        let result = interpreter.interpret(&statements);
        let output = String::from_utf8(interpreter.into_output()).unwrap();
        (output, result.err())
    }

    fn run(source: &str) -> String {
        let (output, err) = execute(source);
        assert!(err.is_none(), "unexpected runtime error: {:?}", err);
        output
    }

    fn run_err(source: &str) -> String {
        let (_, err) = execute(source);
        err.expect("expected a runtime error").message
    }

    #[test]
    fn arithmetic_and_printing() {
        assert_eq!(run("print 1 + 2 * 3;"), "7\n");
        assert_eq!(run("print 7 / 2;"), "3.5\n");
        assert_eq!(run("print -(1 - 3);"), "2\n");
        assert_eq!(run("print 1 / 0;"), "Infinity\n");
        assert_eq!(run("print \"a\" + \"b\";"), "ab\n");
        assert_eq!(run("print nil; print !nil; print 1 == 1;"), "nil\ntrue\ntrue\n");
        assert_eq!(run("print 1 == \"1\";"), "false\n");
    }

    #[test]
    fn shadowing() {
        assert_eq!(
            run("var a = 1; { var a = 2; print a; } print a;"),
            "2\n1\n"
        );
    }

    #[test]
    fn closures_capture_variables() {
        let source = "
            fun makeCounter() {
              var i = 0;
              fun count() { i = i + 1; return i; }
              return count;
            }
            var counter = makeCounter();
            print counter();
            print counter();
        ";
        assert_eq!(run(source), "1\n2\n");
    }

    #[test]
    fn closures_bind_lexically() {
        let source = "
            var a = \"global\";
            {
              fun show() { print a; }
              show();
              var a = \"block\";
              show();
            }
        ";
        assert_eq!(run(source), "global\nglobal\n");
    }

    #[test]
    fn ternary_comma_and_short_circuit() {
        assert_eq!(run("print 1 < 2 ? \"yes\" : \"no\";"), "yes\n");
        assert_eq!(run("print false ? 1 : nil ? 2 : 3;"), "3\n");
        assert_eq!(run("print false and (1/0 > 0);"), "false\n");
        assert_eq!(run("print nil or \"right\";"), "right\n");
        assert_eq!(run("print \"left\" or undefined;"), "left\n");
        assert_eq!(run("print (1, 2);"), "2\n");
        assert_eq!(run("var a = 1; (a = 2), (a = a + 1); print a;"), "3\n");
    }

    #[test]
    fn loops_and_returns() {
        assert_eq!(
            run("for (var i = 0; i < 3; i = i + 1) print i;"),
            "0\n1\n2\n"
        );
        let source = "
            fun first(n) {
              var i = 0;
              while (true) {
                if (i == n) { return i; }
                i = i + 1;
              }
            }
            print first(4);
            fun nothing() {}
            print nothing();
        ";
        assert_eq!(run(source), "4\nnil\n");
    }

    #[test]
    fn classes_and_inheritance() {
        let source = "
            class A { f() { return \"A\"; } }
            class B < A { f() { return super.f() + \"B\"; } }
            print B().f();
            print B;
            print B();
            print B().f;
            print clock;
        ";
        assert_eq!(
            run(source),
            "AB\nB\n<B instance>\n<fn f>\n<native fn>\n"
        );
    }

    #[test]
    fn initializers_return_the_instance() {
        let source = "
            class P {
              init(x) { this.x = x; return; }
              get() { return this.x; }
            }
            var p = P(3);
            print p.get();
            print p.init(4) == p;
            print p.x;
        ";
        assert_eq!(run(source), "3\ntrue\n4\n");
    }

    #[test]
    fn fields_shadow_methods() {
        let source = "
            class A { m() { return \"method\"; } }
            var a = A();
            a.m = \"field\";
            print a.m;
        ";
        assert_eq!(run(source), "field\n");
    }

    #[test]
    fn bound_methods_remember_this() {
        let source = "
            class Counter {
              init() { this.n = 0; }
              inc() { this.n = this.n + 1; return this.n; }
            }
            var c = Counter();
            var inc = c.inc;
            inc();
            print inc();
        ";
        assert_eq!(run(source), "2\n");
    }

    #[test]
    fn runtime_errors() {
        assert_eq!(run_err("print -\"a\";"), "Operand must be a number.");
        assert_eq!(run_err("print 1 < \"a\";"), "Operands must be numbers.");
        assert_eq!(
            run_err("print 1 + \"a\";"),
            "Operands must be two numbers or two strings."
        );
        assert_eq!(run_err("print x;"), "Undefined variable 'x'.");
        assert_eq!(run_err("x = 1;"), "Undefined variable 'x'.");
        assert_eq!(run_err("\"f\"();"), "Can only call functions and classes.");
        assert_eq!(run_err("fun f(a) {} f();"), "Expected 1 arguments but got 0.");
        assert_eq!(
            run_err("class A { init(a, b) {} } A(1);"),
            "Expected 2 arguments but got 1."
        );
        assert_eq!(run_err("var a = 1; class B < a {}"), "Superclass must be a class.");
        assert_eq!(run_err("print 1.x;"), "Only instances have properties.");
        assert_eq!(run_err("var a = 1; a.x = 2;"), "Only instances have fields.");
        assert_eq!(run_err("class A {} print A().x;"), "Undefined property 'x'.");
    }

    #[test]
    fn runtime_error_stops_execution() {
        let (output, err) = execute("print 1; print x; print 2;");
        assert_eq!(output, "1\n");
        assert_eq!(err.unwrap().token.line, 1);
    }

    #[test]
    fn arity_mismatch_does_not_run_the_body() {
        let (output, err) = execute("fun f(a) { print \"ran\"; } f(1, 2);");
        assert_eq!(output, "");
        assert!(err.is_some());
    }

    #[test]
    fn runaway_recursion_is_a_runtime_error() {
        let (output, err) = execute("fun f(n) { return f(n + 1); } print \"start\"; f(0); print \"after\";");
        assert_eq!(output, "start\n");
        let err = err.unwrap();
        assert_eq!(err.message, "Stack overflow.");
        assert_eq!(err.token.lexeme, ")");
    }

    #[test]
    fn recursion_below_the_call_limit_succeeds() {
        let source = format!(
            "fun down(n) {{ if (n == 0) return 0; return 1 + down(n - 1); }} print down({});",
            super::MAX_CALL_DEPTH - 1
        );
        assert_eq!(run(&source), format!("{}\n", super::MAX_CALL_DEPTH - 1));
    }
}
