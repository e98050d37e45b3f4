mod expr;
mod stmt;

use std::rc::Rc;

use cursor::Line;
use errors::{LoxError, LoxErrors, Result};
use scanner::{Scanner, Token, TokenData};

pub use expr::{Expr, LiteralValue};
pub use stmt::{FunctionDecl, Stmt};

use TokenData::*;

/// Calls and declarations accept at most this many arguments / parameters.
pub const MAX_ARGUMENTS: usize = 255;

/// Scans and parses `source`. Lexical errors come first in the returned errors, followed
/// by syntax errors, each group in source order.
pub fn parse(source: &str) -> std::result::Result<Vec<Stmt>, LoxErrors> {
    let (tokens, mut errors) = Scanner::new(source).scan_all();

    match Parser::new(tokens).parse() {
        Ok(stmts) if errors.is_empty() => Ok(stmts),
        Ok(_) => Err(errors),
        Err(parse_errors) => {
            errors.extend(parse_errors);
            Err(errors)
        }
    }
}

#[derive(Debug)]
pub struct ParserError {
    error: ParserErrorType,
    token: Token,
}

impl From<ParserError> for LoxError {
    fn from(error: ParserError) -> Self {
        LoxError::new(error.token.line(), error.token.location(), error.error.to_string())
    }
}

impl ParserError {
    fn new(error: ParserErrorType, token: Token) -> Self {
        Self { error, token }
    }
}

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq)]
pub enum ParserErrorType {
    #[error("Expect expression.")]
    ExpectedExpression,
    #[error("Expect ';' after {0}.")]
    ExpectedSemicolon(&'static str),
    #[error("Expect '(' after {0}.")]
    MissingLeftParen(&'static str),
    #[error("Expect ')' after {0}.")]
    MissingRightParen(&'static str),
    #[error("Expect '{{' before function body.")]
    ExpectedLeftBrace,
    #[error("Expect '}}' after block.")]
    ExpectedRightBrace,
    #[error("Expect {0} name.")]
    ExpectedIdentifier(&'static str),
    #[error("Invalid assignment target.")]
    InvalidAssignmentTarget,
    #[error("Can't have more than {} arguments.", MAX_ARGUMENTS)]
    TooManyArguments,
    #[error("Can't have more than {} parameters.", MAX_ARGUMENTS)]
    TooManyParameters,
    #[error("Can't return from top-level code.")]
    TopLevelReturn,
}

use ParserErrorType::*;

#[derive(Debug)]
pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
    errors: LoxErrors,
    function_depth: usize,
}

impl Parser {
    pub fn new(mut tokens: Vec<Token>) -> Self {
        if tokens.last().map_or(true, |t| t.data != Eof) {
            let line = tokens.last().map_or(Line(1), Token::line);
            tokens.push(Token::new(Eof, "", line));
        }

        Self { tokens, current: 0, errors: LoxErrors::default(), function_depth: 0 }
    }

    /// Parses the whole program. A syntax error does not stop parsing: the parser skips
    /// to the next statement boundary and continues, so all independent errors are
    /// reported together.
    pub fn parse(mut self) -> std::result::Result<Vec<Stmt>, LoxErrors> {
        let mut stmts = Vec::new();
        while !self.is_at_end() {
            match self.declaration() {
                Ok(stmt) => stmts.push(stmt),
                Err(e) => {
                    log::debug!("Syntax error, synchronizing: {e}");
                    self.errors.push(e);
                    self.synchronize();
                }
            }
        }

        if self.errors.is_empty() {
            Ok(stmts)
        } else {
            Err(self.errors)
        }
    }

    fn declaration(&mut self) -> Result<Stmt> {
        if self.consume(Var).is_some() {
            self.var_declaration()
        } else if self.consume(Fun).is_some() {
            self.function()
        } else {
            self.statement()
        }
    }

    fn var_declaration(&mut self) -> Result<Stmt> {
        let name = self.consume_or_error(Identifier, ExpectedIdentifier("variable"))?;

        let initializer = match self.consume(Equal) {
            Some(_) => Some(self.expression()?),
            None => None,
        };

        self.consume_or_error(Semicolon, ExpectedSemicolon("variable declaration"))?;

        Ok(Stmt::Var { name, initializer })
    }

    fn function(&mut self) -> Result<Stmt> {
        let name = self.consume_or_error(Identifier, ExpectedIdentifier("function"))?;
        self.consume_or_error(LeftParen, MissingLeftParen("function name"))?;

        let mut params = Vec::new();
        if !self.check(&RightParen) {
            loop {
                if params.len() >= MAX_ARGUMENTS {
                    self.report(TooManyParameters);
                }
                params.push(self.consume_or_error(Identifier, ExpectedIdentifier("parameter"))?);

                if self.consume(Comma).is_none() {
                    break;
                }
            }
        }
        self.consume_or_error(RightParen, MissingRightParen("parameters"))?;
        self.consume_or_error(LeftBrace, ExpectedLeftBrace)?;

        self.function_depth += 1;
        let body = self.block();
        self.function_depth -= 1;

        Ok(Stmt::Function(Rc::new(FunctionDecl { name, params, body: body? })))
    }

    fn statement(&mut self) -> Result<Stmt> {
        if self.consume(Print).is_some() {
            return self.print_statement();
        }

        if self.consume(LeftBrace).is_some() {
            return Ok(Stmt::Block(self.block()?));
        }

        if self.consume(If).is_some() {
            return self.if_statement();
        }

        if self.consume(While).is_some() {
            return self.while_statement();
        }

        if self.consume(For).is_some() {
            return self.for_statement();
        }

        if let Some(keyword) = self.consume(Return) {
            return self.return_statement(keyword);
        }

        self.expression_statement()
    }

    /// `for` has no node of its own: it becomes an initializer and a `while` loop whose
    /// body runs the increment after the original body.
    fn for_statement(&mut self) -> Result<Stmt> {
        self.consume_or_error(LeftParen, MissingLeftParen("'for'"))?;

        let initializer = if self.consume(Semicolon).is_some() {
            None
        } else if self.consume(Var).is_some() {
            Some(self.var_declaration()?)
        } else {
            Some(self.expression_statement()?)
        };

        let condition = if self.check(&Semicolon) {
            Expr::Literal(LiteralValue::Boolean(true))
        } else {
            self.expression()?
        };
        self.consume_or_error(Semicolon, ExpectedSemicolon("loop condition"))?;

        let increment = if self.check(&RightParen) { None } else { Some(self.expression()?) };
        self.consume_or_error(RightParen, MissingRightParen("for clauses"))?;

        let mut body = self.statement()?;

        if let Some(increment) = increment {
            body = Stmt::Block(vec![body, Stmt::Expression(increment)]);
        }

        let while_stmt = Stmt::While { condition, body: Box::new(body) };

        Ok(match initializer {
            Some(initializer) => Stmt::Block(vec![initializer, while_stmt]),
            None => while_stmt,
        })
    }

    fn while_statement(&mut self) -> Result<Stmt> {
        self.consume_or_error(LeftParen, MissingLeftParen("'while'"))?;
        let condition = self.expression()?;
        self.consume_or_error(RightParen, MissingRightParen("condition"))?;

        let body = Box::new(self.statement()?);

        Ok(Stmt::While { condition, body })
    }

    fn if_statement(&mut self) -> Result<Stmt> {
        self.consume_or_error(LeftParen, MissingLeftParen("'if'"))?;
        let condition = self.expression()?;
        self.consume_or_error(RightParen, MissingRightParen("if condition"))?;

        let then_branch = Box::new(self.statement()?);

        // A trailing `else` always belongs to the innermost `if`
        let else_branch = match self.consume(Else) {
            Some(_) => Some(Box::new(self.statement()?)),
            None => None,
        };

        Ok(Stmt::If { condition, then_branch, else_branch })
    }

    fn return_statement(&mut self, keyword: Token) -> Result<Stmt> {
        if self.function_depth == 0 {
            self.errors.push(ParserError::new(TopLevelReturn, keyword.clone()).into());
        }

        let value = if self.check(&Semicolon) { None } else { Some(self.expression()?) };
        self.consume_or_error(Semicolon, ExpectedSemicolon("return value"))?;

        Ok(Stmt::Return { keyword, value })
    }

    /// Statements up to the closing brace. The opening brace must already be consumed.
    fn block(&mut self) -> Result<Vec<Stmt>> {
        let mut stmts = Vec::new();

        while !self.check(&RightBrace) && !self.is_at_end() {
            stmts.push(self.declaration()?);
        }

        self.consume_or_error(RightBrace, ExpectedRightBrace)?;
        Ok(stmts)
    }

    fn print_statement(&mut self) -> Result<Stmt> {
        let value = self.expression()?;

        self.consume_or_error(Semicolon, ExpectedSemicolon("value"))?;

        Ok(Stmt::Print(value))
    }

    fn expression_statement(&mut self) -> Result<Stmt> {
        let value = self.expression()?;

        self.consume_or_error(Semicolon, ExpectedSemicolon("expression"))?;

        Ok(Stmt::Expression(value))
    }

    fn expression(&mut self) -> Result<Expr> {
        self.assignment()
    }

    fn assignment(&mut self) -> Result<Expr> {
        let expr = self.or()?;

        let Some(equals) = self.consume(Equal) else {
            return Ok(expr);
        };

        let value = Box::new(self.assignment()?);

        match expr {
            Expr::Variable(name) => Ok(Expr::Assign { name, value }),
            expr => {
                // Reported, but the parser is not confused, so no need to synchronize
                self.errors.push(ParserError::new(InvalidAssignmentTarget, equals).into());
                Ok(expr)
            }
        }
    }

    fn or(&mut self) -> Result<Expr> {
        let mut expr = self.and()?;

        while let Some(operator) = self.consume(Or) {
            let right = Box::new(self.and()?);
            expr = Expr::Logical { left: Box::new(expr), operator, right };
        }

        Ok(expr)
    }

    fn and(&mut self) -> Result<Expr> {
        let mut expr = self.equality()?;

        while let Some(operator) = self.consume(And) {
            let right = Box::new(self.equality()?);
            expr = Expr::Logical { left: Box::new(expr), operator, right };
        }

        Ok(expr)
    }

    fn equality(&mut self) -> Result<Expr> {
        let mut expr = self.comparison()?;

        while let Some(operator) = self.consume_any(&[BangEqual, EqualEqual]) {
            let right = Box::new(self.comparison()?);
            expr = Expr::Binary { left: Box::new(expr), operator, right }
        }
        Ok(expr)
    }

    fn comparison(&mut self) -> Result<Expr> {
        let mut expr = self.term()?;

        while let Some(operator) = self.consume_any(&[Greater, GreaterEqual, Less, LessEqual]) {
            let right = Box::new(self.term()?);
            expr = Expr::Binary { left: Box::new(expr), operator, right }
        }
        Ok(expr)
    }

    fn term(&mut self) -> Result<Expr> {
        let mut expr = self.factor()?;

        while let Some(operator) = self.consume_any(&[Plus, Minus]) {
            let right = Box::new(self.factor()?);
            expr = Expr::Binary { left: Box::new(expr), operator, right }
        }
        Ok(expr)
    }

    fn factor(&mut self) -> Result<Expr> {
        let mut expr = self.unary()?;

        while let Some(operator) = self.consume_any(&[Star, Slash]) {
            let right = Box::new(self.unary()?);
            expr = Expr::Binary { left: Box::new(expr), operator, right }
        }
        Ok(expr)
    }

    fn unary(&mut self) -> Result<Expr> {
        if let Some(operator) = self.consume_any(&[Bang, Minus]) {
            let right = Box::new(self.unary()?);
            return Ok(Expr::Unary { operator, right });
        }
        self.call()
    }

    fn call(&mut self) -> Result<Expr> {
        let mut expr = self.primary()?;

        while self.consume(LeftParen).is_some() {
            expr = self.finish_call(expr)?;
        }

        Ok(expr)
    }

    fn finish_call(&mut self, callee: Expr) -> Result<Expr> {
        let mut arguments = Vec::new();

        if !self.check(&RightParen) {
            loop {
                if arguments.len() >= MAX_ARGUMENTS {
                    self.report(TooManyArguments);
                }
                arguments.push(self.expression()?);

                if self.consume(Comma).is_none() {
                    break;
                }
            }
        }

        let paren = self.consume_or_error(RightParen, MissingRightParen("arguments"))?;

        Ok(Expr::Call { callee: Box::new(callee), paren, arguments })
    }

    fn primary(&mut self) -> Result<Expr> {
        let token = self.peek().clone();

        let expr = match &token.data {
            False => Expr::Literal(LiteralValue::Boolean(false)),
            True => Expr::Literal(LiteralValue::Boolean(true)),
            Nil => Expr::Literal(LiteralValue::Nil),
            Number(n) => Expr::Literal(LiteralValue::Number(*n)),
            Str(s) => Expr::Literal(LiteralValue::Str(s.clone())),
            Identifier => Expr::Variable(token.clone()),
            LeftParen => {
                self.advance();
                let expr = self.expression()?;
                self.consume_or_error(RightParen, MissingRightParen("expression"))?;
                return Ok(Expr::Grouping(Box::new(expr)));
            }
            _ => return Err(ParserError::new(ExpectedExpression, token.clone()).into()),
        };

        self.advance();
        Ok(expr)
    }

    /// Discards tokens until the start of what is probably the next statement.
    fn synchronize(&mut self) {
        if self.advance().data == Semicolon {
            return;
        }

        while !self.is_at_end() {
            if let Class | Fun | Var | For | If | While | Print | Return = self.peek().data {
                return;
            }

            if self.advance().data == Semicolon {
                return;
            }
        }
    }
}

// Helpers
impl Parser {
    fn report(&mut self, error_type: ParserErrorType) {
        let token = self.peek().clone();
        self.errors.push(ParserError::new(error_type, token).into());
    }

    fn check(&self, data: &TokenData) -> bool {
        debug_assert!(!matches!(data, Number(_) | Str(_)));
        &self.peek().data == data
    }

    fn consume(&mut self, data: TokenData) -> Option<Token> {
        if self.check(&data) {
            Some(self.advance())
        } else {
            None
        }
    }

    fn consume_any(&mut self, candidates: &[TokenData]) -> Option<Token> {
        if candidates.iter().any(|data| self.check(data)) {
            Some(self.advance())
        } else {
            None
        }
    }

    fn consume_or_error(&mut self, data: TokenData, error_type: ParserErrorType) -> Result<Token> {
        match self.consume(data) {
            Some(token) => Ok(token),
            None => Err(ParserError::new(error_type, self.peek().clone()).into()),
        }
    }

    fn peek(&self) -> &Token {
        // `new` guarantees a trailing Eof and `advance` never moves past it
        &self.tokens[self.current]
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if !self.is_at_end() {
            self.current += 1;
        }
        token
    }

    fn is_at_end(&self) -> bool {
        self.peek().data == Eof
    }
}

#[cfg(test)]
mod tests {
    use errors::ErrorLocation;
    use itertools::Itertools;
    use pretty_assertions::assert_eq;

    use super::*;

    fn parse_expr(source: &str) -> String {
        match parse(&format!("{source};")).unwrap().as_slice() {
            [Stmt::Expression(expr)] => expr.to_string(),
            other => panic!("Expected a single expression statement, got {other:?}"),
        }
    }

    fn parse_errors(source: &str) -> Vec<String> {
        parse(source).unwrap_err().iter().map(|e| e.to_string()).collect_vec()
    }

    #[test]
    fn precedence() {
        assert_eq!(parse_expr("1 + 2 * 3"), "(+ 1 (* 2 3))");
        assert_eq!(parse_expr("(1 + 2) * 3"), "(* (group (+ 1 2)) 3)");
        assert_eq!(parse_expr("1 - 2 - 3"), "(- (- 1 2) 3)");
        assert_eq!(parse_expr("1 < 2 == true"), "(== (< 1 2) true)");
        assert_eq!(parse_expr("-1 - -2 / 4"), "(- (- 1) (/ (- 2) 4))");
        assert_eq!(parse_expr("!!true"), "(! (! true))");
        assert_eq!(parse_expr("a or b and c"), "(or a (and b c))");
        assert_eq!(parse_expr("a = b = c or d"), "(= a (= b (or c d)))");
        assert_eq!(parse_expr("\"a\" + nil"), "(+ \"a\" nil)");
    }

    #[test]
    fn calls() {
        assert_eq!(parse_expr("f()"), "(call f)");
        assert_eq!(parse_expr("f(1)(2, 3)"), "(call (call f 1) 2 3)");
        assert_eq!(parse_expr("-f(x + 1)"), "(- (call f (+ x 1)))");
    }

    #[test]
    fn for_is_desugared_to_while() {
        let stmts = parse("for (var i = 0; i < 3; i = i + 1) print i;").unwrap();

        let [Stmt::Block(block)] = stmts.as_slice() else { panic!("{stmts:?}") };
        let [Stmt::Var { name, .. }, Stmt::While { condition, body }] = block.as_slice() else {
            panic!("{block:?}")
        };
        assert_eq!(name.lexeme(), "i");
        assert_eq!(condition.to_string(), "(< i 3)");

        let Stmt::Block(body) = body.as_ref() else { panic!("{body:?}") };
        let [Stmt::Print(value), Stmt::Expression(increment)] = body.as_slice() else {
            panic!("{body:?}")
        };
        assert_eq!(value.to_string(), "i");
        assert_eq!(increment.to_string(), "(= i (+ i 1))");

        let stmts = parse("for (;;) print 1;").unwrap();
        let [Stmt::While { condition, body }] = stmts.as_slice() else { panic!("{stmts:?}") };
        assert_eq!(condition, &Expr::Literal(LiteralValue::Boolean(true)));
        assert!(matches!(body.as_ref(), Stmt::Print(_)));
    }

    #[test]
    fn dangling_else_binds_to_nearest_if() {
        let stmts = parse("if (a) if (b) print 1; else print 2;").unwrap();

        let [Stmt::If { then_branch, else_branch: None, .. }] = stmts.as_slice() else {
            panic!("{stmts:?}")
        };
        assert!(matches!(then_branch.as_ref(), Stmt::If { else_branch: Some(_), .. }));
    }

    #[test]
    fn function_declaration() {
        let stmts = parse("fun add(a, b) { return a + b; }").unwrap();

        let [Stmt::Function(decl)] = stmts.as_slice() else { panic!("{stmts:?}") };
        assert_eq!(decl.name.lexeme(), "add");
        assert_eq!(decl.params.iter().map(Token::lexeme).collect_vec(), vec!["a", "b"]);
        let [Stmt::Return { value: Some(value), .. }] = decl.body.as_slice() else {
            panic!("{:?}", decl.body)
        };
        assert_eq!(value.to_string(), "(+ a b)");
    }

    #[test]
    fn print_without_semicolon() {
        assert_eq!(parse_errors("print 1"), vec!["[line 1] Error at end: Expect ';' after value."]);
    }

    #[test]
    fn missing_expression() {
        let errors = parse("print ;").unwrap_err();
        assert_eq!(
            errors,
            LoxErrors(vec![LoxError::new(
                Line(1),
                ErrorLocation::Lexeme(";".to_string()),
                ExpectedExpression.to_string()
            )])
        );
    }

    #[test]
    fn synchronize_after_error() {
        assert_eq!(
            parse_errors("var a = 1 var b = 2;\nvar c = 3"),
            vec![
                "[line 1] Error at 'var': Expect ';' after variable declaration.",
                "[line 2] Error at end: Expect ';' after variable declaration.",
            ]
        );
    }

    #[test]
    fn independent_errors_are_all_reported() {
        assert_eq!(
            parse_errors("print 1 +;\nvar = 2;\nprint 3;"),
            vec![
                "[line 1] Error at ';': Expect expression.",
                "[line 2] Error at '=': Expect variable name.",
            ]
        );
    }

    #[test]
    fn lexical_errors_come_first() {
        assert_eq!(
            parse_errors("print @;"),
            vec!["[line 1] Error: Unexpected character.", "[line 1] Error at ';': Expect expression."]
        );
    }

    #[test]
    fn invalid_assignment_target() {
        assert_eq!(
            parse_errors("1 + 2 = 3;\nprint 4;"),
            vec!["[line 1] Error at '=': Invalid assignment target."]
        );
    }

    #[test]
    fn top_level_return() {
        assert_eq!(
            parse_errors("return 1;"),
            vec!["[line 1] Error at 'return': Can't return from top-level code."]
        );
        assert!(parse("fun f() { { return; } }").is_ok());
    }

    #[test]
    fn too_many_arguments() {
        let arguments = (0..=MAX_ARGUMENTS).join(", ");
        assert_eq!(
            parse_errors(&format!("f({arguments});")),
            vec!["[line 1] Error at '255': Can't have more than 255 arguments."]
        );

        let params = (0..=MAX_ARGUMENTS).map(|i| format!("p{i}")).join(", ");
        assert_eq!(
            parse_errors(&format!("fun f({params}) {{}}")),
            vec!["[line 1] Error at 'p255': Can't have more than 255 parameters."]
        );
    }

    #[test]
    fn unclosed_block() {
        assert_eq!(parse_errors("{ print 1;"), vec!["[line 1] Error at end: Expect '}' after block."]);
    }
}
