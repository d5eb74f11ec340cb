use crate::ast::{ExprId, Expression, FunctionDecl, LiteralValue, Statement};
use crate::error::{Diagnostics, ParseError};
use crate::token::{Literal, Token, TokenType};
use log::debug;
use std::rc::Rc;

const MAX_ARITY: usize = 255;

type ParseResult<T> = Result<T, ParseError>;

/// Parses a whole token stream, reporting every syntax error it can recover
/// from. `repl` makes statement terminators optional.
pub fn parse(tokens: &[Token], repl: bool, diagnostics: &mut Diagnostics) -> Vec<Statement> {
    let statements = Parser::new(tokens, repl, diagnostics).parse();
    debug!("parsed {} statements", statements.len());
    statements
}

pub struct Parser<'a, 'd> {
    tokens: &'a [Token],
    current: usize,
    // Set while parsing call arguments, where ',' separates arguments.
    finishing_call: bool,
    repl: bool,
    diagnostics: &'d mut Diagnostics,
}

impl<'a, 'd> Parser<'a, 'd> {
    pub fn new(tokens: &'a [Token], repl: bool, diagnostics: &'d mut Diagnostics) -> Self {
        Parser {
            tokens,
            current: 0,
            finishing_call: false,
            repl,
            diagnostics,
        }
    }
    pub fn parse(&mut self) -> Vec<Statement> {
        let mut statements = Vec::new();
        if self.tokens.is_empty() {
            return statements;
        }
        while !self.is_at_end() {
            if let Some(stmt) = self.declaration() {
                statements.push(stmt);
            }
        }
        statements
    }
    fn declaration(&mut self) -> Option<Statement> {
        let result = match self.peek().tokentype {
            TokenType::Class => {
                self.advance();
                self.class_declaration()
            }
            TokenType::Fun => {
                self.advance();
                self.function("function").map(Statement::Function)
            }
            TokenType::Var => {
                self.advance();
                self.var_declaration()
            }
            _ => self.statement(),
        };
        match result {
            Ok(stmt) => Some(stmt),
            Err(_) => {
                self.synchronize();
                None
            }
        }
    }
    fn class_declaration(&mut self) -> ParseResult<Statement> {
        let name = self.consume(TokenType::Identifier, "Expect class name.")?.clone();
        let superclass = if self.matches(&[TokenType::Less]) {
            let superclass = self.consume(TokenType::Identifier, "Expect superclass name.")?;
            Some(Expression::variable(superclass.clone()))
        } else {
            None
        };
        self.consume(TokenType::LeftBrace, "Expect '{' before class body.")?;
        let mut methods = Vec::new();
        while !self.check(TokenType::RightBrace) && !self.is_at_end() {
            methods.push(self.function("method")?);
        }
        self.consume(TokenType::RightBrace, "Expect '}' after class body.")?;
        Ok(Statement::Class {
            name,
            superclass,
            methods,
        })
    }
    fn function(&mut self, kind: &str) -> ParseResult<Rc<FunctionDecl>> {
        let name = self
            .consume(TokenType::Identifier, &format!("Expect {} name.", kind))?
            .clone();
        self.consume(
            TokenType::LeftParen,
            &format!("Expect '(' after {} name.", kind),
        )?;
        let mut params = Vec::new();
        if !self.check(TokenType::RightParen) {
            loop {
                if params.len() >= MAX_ARITY {
                    let token = self.peek();
                    self.error(token, "Can't have more than 255 parameters.");
                }
                params.push(
                    self.consume(TokenType::Identifier, "Expect parameter name.")?
                        .clone(),
                );
                if !self.matches(&[TokenType::Comma]) {
                    break;
                }
            }
        }
        self.consume(TokenType::RightParen, "Expect ')' after parameters.")?;
        self.consume(
            TokenType::LeftBrace,
            &format!("Expect '{{' before {} body.", kind),
        )?;
        let body = self.block()?;
        Ok(Rc::new(FunctionDecl { name, params, body }))
    }
    fn var_declaration(&mut self) -> ParseResult<Statement> {
        let name = self
            .consume(TokenType::Identifier, "Expect variable name.")?
            .clone();
        let initializer = if self.matches(&[TokenType::Equal]) {
            Some(self.expression()?)
        } else {
            None
        };
        self.terminate("Expect ';' after variable declaration.")?;
        Ok(Statement::Var { name, initializer })
    }
    fn statement(&mut self) -> ParseResult<Statement> {
        match self.peek().tokentype {
            TokenType::If => {
                self.advance();
                self.if_statement()
            }
            TokenType::Print => {
                self.advance();
                self.print_statement()
            }
            TokenType::Return => {
                self.advance();
                self.return_statement()
            }
            TokenType::While => {
                self.advance();
                self.while_statement()
            }
            TokenType::For => {
                self.advance();
                self.for_statement()
            }
            TokenType::LeftBrace => {
                self.advance();
                Ok(Statement::Block(self.block()?))
            }
            _ => self.expression_statement(),
        }
    }
    fn if_statement(&mut self) -> ParseResult<Statement> {
        self.consume(TokenType::LeftParen, "Expect '(' after 'if'.")?;
        let condition = self.expression()?;
        self.consume(TokenType::RightParen, "Expect ')' after if condition.")?;
        let then_branch = Box::new(self.statement()?);
        let else_branch = if self.matches(&[TokenType::Else]) {
            Some(Box::new(self.statement()?))
        } else {
            None
        };
        Ok(Statement::If {
            condition,
            then_branch,
            else_branch,
        })
    }
    fn while_statement(&mut self) -> ParseResult<Statement> {
        self.consume(TokenType::LeftParen, "Expect '(' after 'while'.")?;
        let condition = self.expression()?;
        self.consume(TokenType::RightParen, "Expect ')' after condition.")?;
        let body = Box::new(self.statement()?);
        Ok(Statement::While { condition, body })
    }
    /// `for` has no node of its own; it becomes a `while` inside blocks.
    fn for_statement(&mut self) -> ParseResult<Statement> {
        self.consume(TokenType::LeftParen, "Expect '(' after 'for'.")?;
        let initializer = match self.peek().tokentype {
            TokenType::Semicolon => {
                self.advance();
                None
            }
            TokenType::Var => {
                self.advance();
                Some(self.var_declaration()?)
            }
            _ => Some(self.expression_statement()?),
        };
        let condition = if self.check(TokenType::Semicolon) {
            Expression::Literal(LiteralValue::Boolean(true))
        } else {
            self.expression()?
        };
        self.consume(TokenType::Semicolon, "Expect ';' after loop condition.")?;
        let increment = if self.check(TokenType::RightParen) {
            None
        } else {
            Some(self.expression()?)
        };
        self.consume(TokenType::RightParen, "Expect ')' after for clauses.")?;

        let mut body = self.statement()?;
        if let Some(increment) = increment {
            body = Statement::Block(vec![body, Statement::Expression(increment)]);
        }
        body = Statement::While {
            condition,
            body: Box::new(body),
        };
        match initializer {
            None => Ok(body),
            Some(initializer) => Ok(Statement::Block(vec![initializer, body])),
        }
    }
    fn block(&mut self) -> ParseResult<Vec<Statement>> {
        let mut statements = Vec::new();
        while !self.check(TokenType::RightBrace) && !self.is_at_end() {
            if let Some(stmt) = self.declaration() {
                statements.push(stmt);
            }
        }
        self.consume(TokenType::RightBrace, "Expect '}' after block.")?;
        Ok(statements)
    }
    fn print_statement(&mut self) -> ParseResult<Statement> {
        let keyword = self.previous().clone();
        let value = self.expression()?;
        self.terminate("Expect ';' after value.")?;
        Ok(Statement::Print { keyword, value })
    }
    fn return_statement(&mut self) -> ParseResult<Statement> {
        let keyword = self.previous().clone();
        let value = if self.check(TokenType::Semicolon) {
            None
        } else {
            Some(self.expression()?)
        };
        self.consume(TokenType::Semicolon, "Expect ';' after return value.")?;
        Ok(Statement::Return { keyword, value })
    }
    fn expression_statement(&mut self) -> ParseResult<Statement> {
        let expr = self.expression()?;
        self.terminate("Expect ';' after expression.")?;
        Ok(Statement::Expression(expr))
    }
    /// At the prompt a trailing ';' may be left off.
    fn terminate(&mut self, message: &str) -> ParseResult<()> {
        if self.repl {
            self.matches(&[TokenType::Semicolon]);
            return Ok(());
        }
        self.consume(TokenType::Semicolon, message)?;
        Ok(())
    }
    fn expression(&mut self) -> ParseResult<Expression> {
        self.assignment()
    }
    fn assignment(&mut self) -> ParseResult<Expression> {
        let expr = self.or()?;
        if !self.matches(&[TokenType::Equal]) {
            return Ok(expr);
        }
        let equals = self.previous();
        let value = Box::new(self.assignment()?);
        Ok(match expr {
            Expression::Variable { name, .. } => Expression::Assign {
                id: ExprId::fresh(),
                name,
                value,
            },
            Expression::Get { object, name } => Expression::Set {
                object,
                name,
                value,
            },
            expr => {
                self.error(equals, "Invalid assignment target.");
                expr
            }
        })
    }
    fn or(&mut self) -> ParseResult<Expression> {
        let mut expr = self.and()?;
        while self.matches(&[TokenType::Or]) {
            let operator = self.previous().clone();
            let right = self.and()?;
            expr = Expression::Logical {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }
        Ok(expr)
    }
    fn and(&mut self) -> ParseResult<Expression> {
        let mut expr = self.comma()?;
        while self.matches(&[TokenType::And]) {
            let operator = self.previous().clone();
            let right = self.comma()?;
            expr = Expression::Logical {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }
        Ok(expr)
    }
    fn comma(&mut self) -> ParseResult<Expression> {
        if self.finishing_call {
            return self.ternary();
        }
        self.binary(&[TokenType::Comma], Self::ternary)
    }
    fn ternary(&mut self) -> ParseResult<Expression> {
        let mut expr = self.equality()?;
        while self.matches(&[TokenType::Question]) {
            let left_operator = self.previous().clone();
            let left = self.equality()?;
            let right_operator = self
                .consume(TokenType::Colon, "Expect ':' after ternary.")?
                .clone();
            let right = self.equality()?;
            expr = Expression::Ternary {
                condition: Box::new(expr),
                left_operator,
                right_operator,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(expr)
    }
    fn equality(&mut self) -> ParseResult<Expression> {
        self.binary(
            &[TokenType::BangEqual, TokenType::EqualEqual],
            Self::comparison,
        )
    }
    fn comparison(&mut self) -> ParseResult<Expression> {
        self.binary(
            &[
                TokenType::Greater,
                TokenType::GreaterEqual,
                TokenType::Less,
                TokenType::LessEqual,
            ],
            Self::term,
        )
    }
    fn term(&mut self) -> ParseResult<Expression> {
        self.binary(&[TokenType::Minus, TokenType::Plus], Self::factor)
    }
    fn factor(&mut self) -> ParseResult<Expression> {
        self.binary(&[TokenType::Slash, TokenType::Star], Self::unary)
    }
    /// One left-associative binary precedence level.
    fn binary(
        &mut self,
        operators: &[TokenType],
        operand: fn(&mut Self) -> ParseResult<Expression>,
    ) -> ParseResult<Expression> {
        let mut expr = operand(self)?;
        while self.matches(operators) {
            let operator = self.previous().clone();
            let right = operand(self)?;
            expr = Expression::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }
        Ok(expr)
    }
    fn unary(&mut self) -> ParseResult<Expression> {
        match self.peek().tokentype {
            TokenType::Bang | TokenType::Minus => {
                self.advance();
                let operator = self.previous().clone();
                let right = self.unary()?;
                Ok(Expression::Unary {
                    operator,
                    right: Box::new(right),
                })
            }
            _ => self.call(),
        }
    }
    fn call(&mut self) -> ParseResult<Expression> {
        let mut expr = self.primary()?;
        loop {
            match self.peek().tokentype {
                TokenType::LeftParen => {
                    self.advance();
                    expr = self.finish_call(expr)?;
                }
                TokenType::Dot => {
                    self.advance();
                    let name = self
                        .consume(TokenType::Identifier, "Expect property name after '.'.")?
                        .clone();
                    expr = Expression::Get {
                        object: Box::new(expr),
                        name,
                    };
                }
                _ => break,
            }
        }
        Ok(expr)
    }
    fn finish_call(&mut self, callee: Expression) -> ParseResult<Expression> {
        let mut arguments = Vec::new();
        if !self.check(TokenType::RightParen) {
            let finishing_call = std::mem::replace(&mut self.finishing_call, true);
            let result = self.arguments(&mut arguments);
            self.finishing_call = finishing_call;
            result?;
        }
        let paren = self
            .consume(TokenType::RightParen, "Expect ')' after arguments.")?
            .clone();
        Ok(Expression::Call {
            callee: Box::new(callee),
            paren,
            arguments,
        })
    }
    fn arguments(&mut self, arguments: &mut Vec<Expression>) -> ParseResult<()> {
        loop {
            if arguments.len() >= MAX_ARITY {
                let token = self.peek();
                self.error(token, "Can't have more than 255 arguments.");
            }
            arguments.push(self.expression()?);
            if !self.matches(&[TokenType::Comma]) {
                return Ok(());
            }
        }
    }
    fn primary(&mut self) -> ParseResult<Expression> {
        let token = self.peek();
        let expr = match token.tokentype {
            TokenType::False => Expression::Literal(LiteralValue::Boolean(false)),
            TokenType::True => Expression::Literal(LiteralValue::Boolean(true)),
            TokenType::Nil => Expression::Literal(LiteralValue::Nil),
            TokenType::Number | TokenType::String => {
                Expression::Literal(match &token.literal {
                    Some(Literal::Number(x)) => LiteralValue::Number(*x),
                    Some(Literal::String(x)) => LiteralValue::String(x.clone()),
                    None => LiteralValue::Nil,
                })
            }
            TokenType::Super => {
                self.advance();
                self.consume(TokenType::Dot, "Expect '.' after 'super'.")?;
                let method = self
                    .consume(TokenType::Identifier, "Expect superclass method name.")?
                    .clone();
                return Ok(Expression::Super {
                    id: ExprId::fresh(),
                    keyword: token.clone(),
                    method,
                });
            }
            TokenType::This => Expression::This {
                id: ExprId::fresh(),
                keyword: token.clone(),
            },
            TokenType::Identifier => Expression::variable(token.clone()),
            TokenType::LeftParen => {
                self.advance();
                // Parentheses restore the comma operator inside an argument.
                let finishing_call = std::mem::replace(&mut self.finishing_call, false);
                let expr = self.expression();
                self.finishing_call = finishing_call;
                let expr = expr?;
                self.consume(TokenType::RightParen, "Expect ')' after expression.")?;
                return Ok(Expression::Grouping(Box::new(expr)));
            }
            _ => return Err(self.error(token, "Expect expression.")),
        };
        self.advance();
        Ok(expr)
    }
    /// Discards tokens until the start of the next statement.
    fn synchronize(&mut self) {
        self.advance();
        while !self.is_at_end() {
            if self.previous().is(TokenType::Semicolon) {
                return;
            }
            match self.peek().tokentype {
                TokenType::Class
                | TokenType::Fun
                | TokenType::Var
                | TokenType::For
                | TokenType::If
                | TokenType::While
                | TokenType::Print
                | TokenType::Return => return,
                _ => (),
            }
            self.advance();
        }
    }
    fn consume(&mut self, tokentype: TokenType, message: &str) -> ParseResult<&'a Token> {
        if self.check(tokentype) {
            return Ok(self.advance());
        }
        let token = self.peek();
        Err(self.error(token, message))
    }
    fn matches(&mut self, tokentypes: &[TokenType]) -> bool {
        if tokentypes.iter().any(|t| self.check(*t)) {
            self.advance();
            return true;
        }
        false
    }
    fn check(&self, tokentype: TokenType) -> bool {
        !self.is_at_end() && self.peek().is(tokentype)
    }
    fn advance(&mut self) -> &'a Token {
        if !self.is_at_end() {
            self.current += 1;
        }
        self.previous()
    }
    fn is_at_end(&self) -> bool {
        self.peek().is(TokenType::EOF)
    }
    fn peek(&self) -> &'a Token {
        let tokens: &'a [Token] = self.tokens;
        &tokens[self.current.min(tokens.len() - 1)]
    }
    fn previous(&self) -> &'a Token {
        let tokens: &'a [Token] = self.tokens;
        &tokens[self.current.saturating_sub(1).min(tokens.len() - 1)]
    }
    /// Reports a syntax error. The caller decides whether to unwind.
    fn error(&mut self, token: &Token, message: &str) -> ParseError {
        self.diagnostics.parse_error(token, message);
        ParseError {
            token: token.clone(),
            message: message.to_string(),
        }
    }
}

#[cfg(test)]
mod parser_tests {
    use crate::ast::AstPrinter;
    use crate::error::Diagnostics;
    use crate::parser;
    use crate::scanner;
    use pretty_assertions::assert_eq;

    fn parse_with(source: &str, repl: bool) -> (String, Vec<String>) {
        let mut diagnostics = Diagnostics::new();
        let tokens = scanner::scan_tokens(source, &mut diagnostics);
        let statements = parser::parse(&tokens, repl, &mut diagnostics);
        let printed = AstPrinter {}.print(&statements);
        let errors = diagnostics
            .errors()
            .iter()
            .map(|e| e.message().to_string())
            .collect();
        (printed, errors)
    }

    fn parse(source: &str) -> String {
        let (printed, errors) = parse_with(source, false);
        assert!(errors.is_empty(), "unexpected errors: {:?}", errors);
        printed
    }

    fn errors(source: &str) -> Vec<String> {
        parse_with(source, false).1
    }

    #[test]
    fn precedence() {
        assert_eq!(parse("1 + 2 * 3 - -4;"), "(; (- (+ 1 (* 2 3)) (- 4)))");
        assert_eq!(parse("!(1 < 2) == false;"), "(; (== (! (group (< 1 2))) false))");
        assert_eq!(parse("a or b and c;"), "(; (or a (and b c)))");
    }

    #[test]
    fn ternary_and_comma() {
        assert_eq!(parse("a ? b : c;"), "(; (?: a b c))");
        assert_eq!(parse("a, b, c;"), "(; (, (, a b) c))");
        assert_eq!(parse("x = 1 < 2 ? \"yes\" : \"no\";"), "(; (assign x (?: (< 1 2) yes no)))");
    }

    #[test]
    fn call_arguments_are_not_comma_expressions() {
        assert_eq!(parse("f(a, b);"), "(; (call f a b))");
        assert_eq!(parse("f(g(a, b), c);"), "(; (call f (call g a b) c))");
        assert_eq!(parse("f((a, b));"), "(; (call f (group (, a b))))");
        assert_eq!(parse("f();"), "(; (call f))");
    }

    #[test]
    fn properties() {
        assert_eq!(parse("a.b.c = 1;"), "(; (set (get a b) c 1))");
        assert_eq!(parse("this.x;"), "(; (get this x))");
    }

    #[test]
    fn for_loops_become_while_loops() {
        assert_eq!(
            parse("for (var i = 0; i < 3; i = i + 1) print i;"),
            "(block (var i = 0) (while (< i 3) (block (print i) (; (assign i (+ i 1))))))"
        );
        assert_eq!(parse("for (;;) {}"), "(while true (block))");
    }

    #[test]
    fn declarations() {
        assert_eq!(
            parse("fun add(a, b) { return a + b; }"),
            "(fun add(a b) (return (+ a b)))"
        );
        assert_eq!(
            parse("class B < A { init(x) { this.x = x; } f() { return super.f(); } }"),
            "(class B < A (method init(x) (; (set this x x))) (method f() (return (call (super f)))))"
        );
        assert_eq!(parse("var a; var b = nil;"), "(var a)\n(var b = nil)");
        assert_eq!(
            parse("if (a) print 1; else { print 2; }"),
            "(if-else a (print 1) (block (print 2)))"
        );
    }

    #[test]
    fn recovers_to_report_several_errors() {
        assert_eq!(
            errors("print 1\nvar x = 2;\nprint 3\nvar y = 4;"),
            vec!["Expect ';' after value.", "Expect ';' after value."]
        );
        assert_eq!(
            errors("var = 1; fun (a) {}"),
            vec!["Expect variable name.", "Expect function name."]
        );
    }

    #[test]
    fn reports_without_unwinding() {
        let (printed, errors) = parse_with("1 = 2; print 3;", false);
        assert_eq!(errors, vec!["Invalid assignment target."]);
        assert_eq!(printed, "(; 1)\n(print 3)");
    }

    #[test]
    fn specific_messages() {
        assert_eq!(errors("a ? b;"), vec!["Expect ':' after ternary."]);
        assert_eq!(errors("(1;"), vec!["Expect ')' after expression."]);
        assert_eq!(errors("super;"), vec!["Expect '.' after 'super'."]);
        assert_eq!(errors("{ print 1;"), vec!["Expect '}' after block."]);
        assert_eq!(errors("class { }"), vec!["Expect class name."]);
        assert_eq!(errors(";"), vec!["Expect expression."]);
    }

    #[test]
    fn too_many_parameters() {
        let params: Vec<String> = (0..256).map(|i| format!("p{}", i)).collect();
        let source = format!("fun f({}) {{}}", params.join(", "));
        assert_eq!(errors(&source), vec!["Can't have more than 255 parameters."]);

        let args: Vec<String> = (0..256).map(|i| i.to_string()).collect();
        let source = format!("f({});", args.join(", "));
        assert_eq!(errors(&source), vec!["Can't have more than 255 arguments."]);
    }

    #[test]
    fn prompt_lines_may_omit_semicolons() {
        let (printed, errors) = parse_with("print 1 + 2", true);
        assert!(errors.is_empty());
        assert_eq!(printed, "(print (+ 1 2))");
        let (printed, errors) = parse_with("var x = 3", true);
        assert!(errors.is_empty());
        assert_eq!(printed, "(var x = 3)");
    }
}
