use std::{cell::RefCell, io::Write, rc::Rc};

use parser::{Expr, Stmt};
use scanner::token::TokenData;

mod callable;
pub use callable::{Callable, Function, LoxFunction, NativeFn, NativeFunction};

mod environment;
pub use environment::Environment;

mod error;
pub use error::{InterpretError, Result, RuntimeError, RuntimeErrorKind};

mod value;
pub use value::Value;

#[derive(Debug, PartialEq)]
pub(crate) enum Flow {
    Normal,
    Return(Value),
}

/// Executes programs, writing the output of `print` to `output`.
///
/// Global definitions survive across calls to [`Interpreter::run_source`], so one
/// interpreter can serve a whole REPL session.
pub struct Interpreter<W> {
    globals: Rc<RefCell<Environment>>,
    environment: Rc<RefCell<Environment>>,
    output: W,
}

impl<W: Write> Interpreter<W> {
    pub fn new(output: W) -> Self {
        let globals = Rc::new(RefCell::new(Environment::default()));
        let mut interpreter = Self { environment: globals.clone(), globals, output };

        for native in callable::natives() {
            interpreter.define_native(native);
        }

        interpreter
    }

    pub fn define_native(&mut self, native: NativeFunction) {
        log::debug!("Defining native function '{}'", native.name);
        let name = native.name;
        self.globals.borrow_mut().define(name, Function::Native(Rc::new(native)).into());
    }

    /// Scans, parses and runs `source`. Nothing is executed if there are lexical or
    /// syntax errors. A runtime error stops the program, but output printed before it
    /// stays written.
    pub fn run_source(&mut self, source: &str) -> Result<()> {
        let stmts = parser::parse(source)?;
        log::debug!("Parsed {} top-level statements", stmts.len());
        self.interpret(&stmts)
    }

    pub fn interpret(&mut self, stmts: &[Stmt]) -> Result<()> {
        self.execute_all(stmts)?;
        Ok(())
    }

    fn execute(&mut self, stmt: &Stmt) -> Result<Flow> {
        use Stmt::*;
        log::trace!("Executing {:?}", stmt);
        match stmt {
            Print(expr) => {
                let value = self.evaluate(expr)?;
                writeln!(self.output, "{}", value)?;
                Ok(Flow::Normal)
            }
            Expression(expr) => {
                self.evaluate(expr)?;
                Ok(Flow::Normal)
            }
            Var { name, initializer } => {
                let value = match initializer {
                    Some(init) => self.evaluate(init)?,
                    None => Value::Nil,
                };
                self.environment.borrow_mut().define(name.lexeme(), value);
                Ok(Flow::Normal)
            }
            Block(stmts) => {
                let environment = Environment::new_enclosed(self.environment.clone());
                self.execute_block(stmts, environment)
            }
            If { condition, then_branch, else_branch } => {
                if self.evaluate(condition)?.is_truthy() {
                    self.execute(then_branch)
                } else if let Some(else_branch) = else_branch {
                    self.execute(else_branch)
                } else {
                    Ok(Flow::Normal)
                }
            }
            While { condition, body } => {
                while self.evaluate(condition)?.is_truthy() {
                    if let flow @ Flow::Return(_) = self.execute(body)? {
                        return Ok(flow);
                    }
                }
                Ok(Flow::Normal)
            }
            Function(declaration) => {
                let function = LoxFunction::new(declaration.clone(), self.environment.clone());
                self.environment
                    .borrow_mut()
                    .define(declaration.name.lexeme(), callable::Function::Lox(Rc::new(function)).into());
                Ok(Flow::Normal)
            }
            Return { value, .. } => {
                let value = match value {
                    Some(value) => self.evaluate(value)?,
                    None => Value::Nil,
                };
                Ok(Flow::Return(value))
            }
        }
    }

    /// Runs `stmts` with `environment` as the active scope. The previously active scope
    /// is restored on every way out: normal completion, `return` and errors.
    pub(crate) fn execute_block(
        &mut self,
        stmts: &[Stmt],
        environment: Rc<RefCell<Environment>>,
    ) -> Result<Flow> {
        log::trace!("Entering scope with {} statements", stmts.len());
        let previous = std::mem::replace(&mut self.environment, environment);

        let result = self.execute_all(stmts);
        self.environment = previous;
        result
    }

    fn execute_all(&mut self, stmts: &[Stmt]) -> Result<Flow> {
        for stmt in stmts {
            if let flow @ Flow::Return(_) = self.execute(stmt)? {
                return Ok(flow);
            }
        }
        Ok(Flow::Normal)
    }

    fn evaluate(&mut self, expr: &Expr) -> Result<Value> {
        use Expr::*;
        match expr {
            Literal(value) => Ok(value.into()),

            Grouping(expr) => self.evaluate(expr),

            Unary { operator, right } => {
                let right = self.evaluate(right)?;
                match (&operator.data, right) {
                    (TokenData::Minus, Value::Number(n)) => Ok((-n).into()),
                    (TokenData::Minus, _) => {
                        Err(RuntimeError::new(RuntimeErrorKind::OperandMustBeNumber, operator).into())
                    }
                    (TokenData::Bang, v) => Ok((!v.is_truthy()).into()),
                    _ => unreachable!("Unary operator must be '-' or '!'"),
                }
            }

            Variable(name) => {
                let value = self.environment.borrow().get(name)?;
                Ok(value)
            }

            Assign { name, value } => {
                let value = self.evaluate(value)?;
                self.environment.borrow_mut().assign(name, value.clone())?;
                Ok(value)
            }

            Logical { left, operator, right } => {
                let left = self.evaluate(left)?;
                let short_circuits = match operator.data {
                    TokenData::Or => left.is_truthy(),
                    _ => !left.is_truthy(),
                };

                if short_circuits {
                    Ok(left)
                } else {
                    self.evaluate(right)
                }
            }

            Binary { left, operator, right } => {
                let left = self.evaluate(left)?;
                let right = self.evaluate(right)?;
                match (&left, &right, &operator.data) {
                    (Value::Number(l), Value::Number(r), TokenData::Minus) => Ok((l - r).into()),
                    (Value::Number(l), Value::Number(r), TokenData::Slash) => Ok((l / r).into()),
                    (Value::Number(l), Value::Number(r), TokenData::Star) => Ok((l * r).into()),
                    (Value::Number(l), Value::Number(r), TokenData::Plus) => Ok((l + r).into()),
                    (Value::Str(l), Value::Str(r), TokenData::Plus) => Ok(format!("{l}{r}").into()),

                    (Value::Number(l), Value::Number(r), TokenData::Greater) => Ok((l > r).into()),
                    (Value::Number(l), Value::Number(r), TokenData::GreaterEqual) => {
                        Ok((l >= r).into())
                    }
                    (Value::Number(l), Value::Number(r), TokenData::Less) => Ok((l < r).into()),
                    (Value::Number(l), Value::Number(r), TokenData::LessEqual) => {
                        Ok((l <= r).into())
                    }

                    (_, _, TokenData::EqualEqual) => Ok(left.eq_in_lox(&right).into()),
                    (_, _, TokenData::BangEqual) => Ok((!left.eq_in_lox(&right)).into()),

                    (_, _, TokenData::Plus) => Err(RuntimeError::new(
                        RuntimeErrorKind::OperandsMustBeNumbersOrStrings,
                        operator,
                    )
                    .into()),
                    (
                        _,
                        _,
                        TokenData::Minus
                        | TokenData::Slash
                        | TokenData::Star
                        | TokenData::Greater
                        | TokenData::GreaterEqual
                        | TokenData::Less
                        | TokenData::LessEqual,
                    ) => Err(RuntimeError::new(RuntimeErrorKind::OperandsMustBeNumbers, operator).into()),

                    _ => unreachable!("Not a binary operator: {}", operator),
                }
            }

            Call { callee, paren, arguments } => {
                let callee = self.evaluate(callee)?;

                let arguments =
                    arguments.iter().map(|argument| self.evaluate(argument)).collect::<Result<Vec<_>>>()?;

                let Value::Function(function) = callee else {
                    return Err(RuntimeError::new(RuntimeErrorKind::NotCallable, paren).into());
                };

                if arguments.len() != function.arity() {
                    return Err(RuntimeError::new(
                        RuntimeErrorKind::ArityMismatch { expected: function.arity(), got: arguments.len() },
                        paren,
                    )
                    .into());
                }

                log::debug!("Calling {} with {} arguments", function, arguments.len());
                function.call(self, arguments, paren)
            }
        }
    }
}
