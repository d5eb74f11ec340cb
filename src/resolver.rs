use crate::ast::{ExprId, Expression, FunctionDecl, Statement, Visitor};
use crate::error::Diagnostics;
use crate::token::Token;
use log::debug;
use rustc_hash::FxHashMap;

/// How many environments to walk up from the current one to find the
/// declaration of a variable reference. References with no entry are global.
pub type Locals = FxHashMap<ExprId, usize>;

#[derive(Clone, Copy, Debug, PartialEq)]
enum FunctionType {
    None,
    Function,
    Initializer,
    Method,
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum ClassType {
    None,
    Class,
    Subclass,
}

/// Resolves every local variable reference in `statements`. Static errors go
/// to `diagnostics`; resolution carries on after each one.
pub fn resolve(statements: &[Statement], diagnostics: &mut Diagnostics) -> Locals {
    let mut resolver = Resolver::new(diagnostics);
    resolver.resolve(statements);
    debug!("resolved {} local references", resolver.locals.len());
    resolver.locals
}

pub struct Resolver<'d> {
    // false while a variable's initializer is being resolved.
    scopes: Vec<FxHashMap<String, bool>>,
    current_function: FunctionType,
    current_class: ClassType,
    locals: Locals,
    diagnostics: &'d mut Diagnostics,
}

impl<'d> Visitor<Expression, ()> for Resolver<'d> {
    fn visit(&mut self, expr: &Expression) {
        match expr {
            Expression::Binary { left, right, .. } | Expression::Logical { left, right, .. } => {
                self.resolve_expr(left);
                self.resolve_expr(right);
            }
            Expression::Ternary {
                condition,
                left,
                right,
                ..
            } => {
                self.resolve_expr(condition);
                self.resolve_expr(left);
                self.resolve_expr(right);
            }
            Expression::Grouping(expr) => self.resolve_expr(expr),
            Expression::Literal(_) => (),
            Expression::Unary { right, .. } => self.resolve_expr(right),
            Expression::Variable { id, name } => {
                let in_initializer = self
                    .scopes
                    .last()
                    .and_then(|scope| scope.get(&name.lexeme))
                    .map_or(false, |defined| !defined);
                if in_initializer {
                    self.error(name, "Can't read local variable in its own initializer.");
                }
                self.resolve_local(*id, name);
            }
            Expression::Assign { id, name, value } => {
                self.resolve_expr(value);
                self.resolve_local(*id, name);
            }
            Expression::Call {
                callee, arguments, ..
            } => {
                self.resolve_expr(callee);
                for argument in arguments {
                    self.resolve_expr(argument);
                }
            }
            Expression::Get { object, .. } => self.resolve_expr(object),
            Expression::Set { object, value, .. } => {
                self.resolve_expr(value);
                self.resolve_expr(object);
            }
            Expression::This { id, keyword } => match self.current_class {
                ClassType::None => self.error(keyword, "Can't use 'this' outside of a class."),
                ClassType::Class | ClassType::Subclass => self.resolve_local(*id, keyword),
            },
            Expression::Super { id, keyword, .. } => {
                match self.current_class {
                    ClassType::None => {
                        self.error(keyword, "Can't use 'super' outside of a class.")
                    }
                    ClassType::Class => self.error(
                        keyword,
                        "Can't use 'super' in a class with no superclass.",
                    ),
                    ClassType::Subclass => (),
                }
                self.resolve_local(*id, keyword);
            }
        }
    }
}

impl<'d> Visitor<Statement, ()> for Resolver<'d> {
    fn visit(&mut self, stmt: &Statement) {
        match stmt {
            Statement::Expression(expr) => self.resolve_expr(expr),
            Statement::Print { value, .. } => self.resolve_expr(value),
            Statement::Var { name, initializer } => {
                self.declare(name);
                if let Some(initializer) = initializer {
                    self.resolve_expr(initializer);
                }
                self.define(name);
            }
            Statement::Block(stmts) => {
                self.begin_scope();
                self.resolve(stmts);
                self.end_scope();
            }
            Statement::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.resolve_expr(condition);
                self.resolve_stmt(then_branch);
                if let Some(else_branch) = else_branch {
                    self.resolve_stmt(else_branch);
                }
            }
            Statement::While { condition, body } => {
                self.resolve_expr(condition);
                self.resolve_stmt(body);
            }
            Statement::Function(decl) => {
                self.declare(&decl.name);
                self.define(&decl.name);
                self.resolve_function(decl, FunctionType::Function);
            }
            Statement::Return { keyword, value } => {
                if self.current_function == FunctionType::None {
                    self.error(keyword, "Can't return from top-level code.");
                }
                if let Some(value) = value {
                    if self.current_function == FunctionType::Initializer {
                        self.error(keyword, "Can't return a value from an initializer.");
                    }
                    self.resolve_expr(value);
                }
            }
            Statement::Class {
                name,
                superclass,
                methods,
            } => {
                let enclosing_class = self.current_class;
                self.current_class = ClassType::Class;
                self.declare(name);
                self.define(name);

                if let Some(superclass) = superclass {
                    if let Expression::Variable {
                        name: superclass_name,
                        ..
                    } = superclass
                    {
                        if superclass_name.lexeme == name.lexeme {
                            self.error(superclass_name, "A class can't inherit from itself.");
                        }
                    }
                    self.current_class = ClassType::Subclass;
                    self.resolve_expr(superclass);
                    self.begin_scope();
                    self.bind_implicit("super");
                }

                self.begin_scope();
                self.bind_implicit("this");
                for method in methods {
                    let function_type = if method.name.lexeme == "init" {
                        FunctionType::Initializer
                    } else {
                        FunctionType::Method
                    };
                    self.resolve_function(method, function_type);
                }
                self.end_scope();

                if superclass.is_some() {
                    self.end_scope();
                }
                self.current_class = enclosing_class;
            }
        }
    }
}

impl<'d> Resolver<'d> {
    pub fn new(diagnostics: &'d mut Diagnostics) -> Resolver<'d> {
        Resolver {
            scopes: Vec::new(),
            current_function: FunctionType::None,
            current_class: ClassType::None,
            locals: Locals::default(),
            diagnostics,
        }
    }
    pub fn resolve(&mut self, statements: &[Statement]) {
        for stmt in statements {
            self.resolve_stmt(stmt);
        }
    }
    fn resolve_expr(&mut self, expr: &Expression) {
        expr.accept(self)
    }
    fn resolve_stmt(&mut self, stmt: &Statement) {
        stmt.accept(self)
    }
    fn begin_scope(&mut self) {
        self.scopes.push(FxHashMap::default());
    }
    fn end_scope(&mut self) {
        self.scopes.pop();
    }
    fn declare(&mut self, name: &Token) {
        let already_declared = match self.scopes.last_mut() {
            None => return,
            Some(scope) => scope.insert(name.lexeme.clone(), false).is_some(),
        };
        if already_declared {
            self.error(name, "Already a variable with this name in this scope.");
        }
    }
    fn define(&mut self, name: &Token) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.lexeme.clone(), true);
        }
    }
    fn bind_implicit(&mut self, name: &str) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string(), true);
        }
    }
    fn resolve_local(&mut self, id: ExprId, name: &Token) {
        let depth = self
            .scopes
            .iter()
            .rev()
            .position(|scope| scope.contains_key(&name.lexeme));
        if let Some(depth) = depth {
            self.locals.insert(id, depth);
        }
    }
    /// Parameters and body share one scope, matching the single environment a
    /// call creates.
    fn resolve_function(&mut self, decl: &FunctionDecl, function_type: FunctionType) {
        let enclosing_function = self.current_function;
        self.current_function = function_type;
        self.begin_scope();
        for param in &decl.params {
            self.declare(param);
            self.define(param);
        }
        self.resolve(&decl.body);
        self.end_scope();
        self.current_function = enclosing_function;
    }
    fn error(&mut self, token: &Token, message: &str) {
        self.diagnostics.resolve_error(token, message);
    }
}
