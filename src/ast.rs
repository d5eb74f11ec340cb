use crate::token::Token;
use crate::value::format_number;
use std::fmt;
use std::fmt::Formatter;
use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Identity of a variable-referencing expression. The resolver keys its
/// distance table on this, so two textually identical references in different
/// places never share an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExprId(usize);

impl ExprId {
    pub fn fresh() -> ExprId {
        static NEXT: AtomicUsize = AtomicUsize::new(0);
        ExprId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LiteralValue {
    Nil,
    Boolean(bool),
    Number(f64),
    String(String),
}

impl fmt::Display for LiteralValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            LiteralValue::Nil => write!(f, "nil"),
            LiteralValue::Boolean(x) => write!(f, "{}", x),
            LiteralValue::Number(x) => write!(f, "{}", format_number(*x)),
            LiteralValue::String(x) => write!(f, "{}", x),
        }
    }
}

#[derive(Debug)]
pub enum Expression {
    Binary {
        left: Box<Expression>,
        operator: Token,
        right: Box<Expression>,
    },
    Ternary {
        condition: Box<Expression>,
        left_operator: Token,
        right_operator: Token,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    Grouping(Box<Expression>),
    Literal(LiteralValue),
    Logical {
        left: Box<Expression>,
        operator: Token,
        right: Box<Expression>,
    },
    Unary {
        operator: Token,
        right: Box<Expression>,
    },
    Variable {
        id: ExprId,
        name: Token,
    },
    Assign {
        id: ExprId,
        name: Token,
        value: Box<Expression>,
    },
    Call {
        callee: Box<Expression>,
        paren: Token,
        arguments: Vec<Expression>,
    },
    Get {
        object: Box<Expression>,
        name: Token,
    },
    Set {
        object: Box<Expression>,
        name: Token,
        value: Box<Expression>,
    },
    This {
        id: ExprId,
        keyword: Token,
    },
    Super {
        id: ExprId,
        keyword: Token,
        method: Token,
    },
}

pub trait Visitor<T, Output> {
    fn visit(&mut self, n: &T) -> Output;
}

impl Expression {
    pub fn accept<T>(&self, v: &mut dyn Visitor<Expression, T>) -> T {
        v.visit(self)
    }

    pub fn variable(name: Token) -> Expression {
        Expression::Variable {
            id: ExprId::fresh(),
            name,
        }
    }
}

/// A function or method declaration. Shared between the syntax tree and
/// every function value created from it.
#[derive(Debug)]
pub struct FunctionDecl {
    pub name: Token,
    pub params: Vec<Token>,
    pub body: Vec<Statement>,
}

#[derive(Debug)]
pub enum Statement {
    Expression(Expression),
    Print {
        keyword: Token,
        value: Expression,
    },
    Var {
        name: Token,
        initializer: Option<Expression>,
    },
    Block(Vec<Statement>),
    If {
        condition: Expression,
        then_branch: Box<Statement>,
        else_branch: Option<Box<Statement>>,
    },
    While {
        condition: Expression,
        body: Box<Statement>,
    },
    Function(Rc<FunctionDecl>),
    Return {
        keyword: Token,
        value: Option<Expression>,
    },
    Class {
        name: Token,
        superclass: Option<Expression>,
        methods: Vec<Rc<FunctionDecl>>,
    },
}

impl Statement {
    pub fn accept<T>(&self, v: &mut dyn Visitor<Statement, T>) -> T {
        v.visit(self)
    }
}

/// Renders syntax trees as parenthesized prefix expressions, for debugging.
pub struct AstPrinter {}

impl AstPrinter {
    pub fn print(&mut self, statements: &[Statement]) -> String {
        statements
            .iter()
            .map(|stmt| self.stmt(stmt))
            .collect::<Vec<_>>()
            .join("\n")
    }
    fn expr(&mut self, expr: &Expression) -> String {
        expr.accept(self)
    }
    fn stmt(&mut self, stmt: &Statement) -> String {
        stmt.accept(self)
    }
    fn parenthesize(&mut self, name: &str, args: Vec<&Expression>) -> String {
        let mut x = String::from("(");
        x.push_str(name);
        for arg in args {
            x.push(' ');
            x.push_str(self.expr(arg).as_str());
        }
        x.push(')');
        x
    }
    fn function(&mut self, keyword: &str, decl: &FunctionDecl) -> String {
        let params: Vec<&str> = decl.params.iter().map(|p| p.lexeme.as_str()).collect();
        let mut x = format!("({} {}({})", keyword, decl.name.lexeme, params.join(" "));
        for stmt in &decl.body {
            x.push(' ');
            x.push_str(self.stmt(stmt).as_str());
        }
        x.push(')');
        x
    }
}

impl Visitor<Expression, String> for AstPrinter {
    fn visit(&mut self, n: &Expression) -> String {
        match n {
            Expression::Binary {
                left,
                operator,
                right,
            } => self.parenthesize(&operator.lexeme, vec![left.as_ref(), right.as_ref()]),
            Expression::Ternary {
                condition,
                left,
                right,
                ..
            } => self.parenthesize(
                "?:",
                vec![condition.as_ref(), left.as_ref(), right.as_ref()],
            ),
            Expression::Grouping(x) => self.parenthesize("group", vec![x.as_ref()]),
            Expression::Literal(x) => x.to_string(),
            Expression::Logical {
                left,
                operator,
                right,
            } => self.parenthesize(&operator.lexeme, vec![left.as_ref(), right.as_ref()]),
            Expression::Unary { operator, right } => {
                self.parenthesize(&operator.lexeme, vec![right.as_ref()])
            }
            Expression::Variable { name, .. } => name.lexeme.clone(),
            Expression::Assign { name, value, .. } => {
                format!("(assign {} {})", name.lexeme, self.expr(value))
            }
            Expression::Call {
                callee, arguments, ..
            } => {
                let mut args = vec![callee.as_ref()];
                args.extend(arguments.iter());
                self.parenthesize("call", args)
            }
            Expression::Get { object, name } => {
                format!("(get {} {})", self.expr(object), name.lexeme)
            }
            Expression::Set {
                object,
                name,
                value,
            } => format!(
                "(set {} {} {})",
                self.expr(object),
                name.lexeme,
                self.expr(value)
            ),
            Expression::This { .. } => String::from("this"),
            Expression::Super { method, .. } => format!("(super {})", method.lexeme),
        }
    }
}

impl Visitor<Statement, String> for AstPrinter {
    fn visit(&mut self, n: &Statement) -> String {
        match n {
            Statement::Expression(x) => self.parenthesize(";", vec![x]),
            Statement::Print { value, .. } => self.parenthesize("print", vec![value]),
            Statement::Var { name, initializer } => match initializer {
                None => format!("(var {})", name.lexeme),
                Some(x) => format!("(var {} = {})", name.lexeme, self.expr(x)),
            },
            Statement::Block(stmts) => {
                let mut x = String::from("(block");
                for stmt in stmts {
                    x.push(' ');
                    x.push_str(self.stmt(stmt).as_str());
                }
                x.push(')');
                x
            }
            Statement::If {
                condition,
                then_branch,
                else_branch,
            } => match else_branch {
                None => format!(
                    "(if {} {})",
                    self.expr(condition),
                    self.stmt(then_branch)
                ),
                Some(else_branch) => format!(
                    "(if-else {} {} {})",
                    self.expr(condition),
                    self.stmt(then_branch),
                    self.stmt(else_branch)
                ),
            },
            Statement::While { condition, body } => {
                format!("(while {} {})", self.expr(condition), self.stmt(body))
            }
            Statement::Function(decl) => self.function("fun", decl),
            Statement::Return { value, .. } => match value {
                None => String::from("(return)"),
                Some(x) => self.parenthesize("return", vec![x]),
            },
            Statement::Class {
                name,
                superclass,
                methods,
            } => {
                let mut x = format!("(class {}", name.lexeme);
                if let Some(superclass) = superclass {
                    x.push_str(" < ");
                    x.push_str(self.expr(superclass).as_str());
                }
                for method in methods {
                    x.push(' ');
                    x.push_str(self.function("method", method).as_str());
                }
                x.push(')');
                x
            }
        }
    }
}

#[cfg(test)]
mod ast_tests {
    use crate::ast::{AstPrinter, ExprId, Expression, LiteralValue};
    use crate::token::{Token, TokenType};
    use pretty_assertions::assert_eq;

    #[test]
    fn basic_ast_test() {
        let expression = Expression::Binary {
            left: Box::new(Expression::Unary {
                operator: Token::new(TokenType::Minus, "-", None, 1, 1),
                right: Box::new(Expression::Literal(LiteralValue::Number(123.0))),
            }),
            operator: Token::new(TokenType::Star, "*", None, 1, 6),
            right: Box::new(Expression::Grouping(Box::new(Expression::Literal(
                LiteralValue::Number(45.67),
            )))),
        };
        let mut visitor = AstPrinter {};
        let printed: String = expression.accept(&mut visitor);
        assert_eq!(printed, "(* (- 123) (group 45.67))");
    }

    #[test]
    fn expression_ids_are_unique() {
        let a = ExprId::fresh();
        let b = ExprId::fresh();
        assert_ne!(a, b);
    }
}
