use std::{
    cell::RefCell,
    fmt::{self, Debug, Display, Formatter},
    io::Write,
    rc::Rc,
    time::{SystemTime, UNIX_EPOCH},
};

use parser::FunctionDecl;
use scanner::Token;

use crate::{
    environment::Environment,
    error::{Result, RuntimeError, RuntimeErrorKind},
    value::Value,
    Flow, Interpreter,
};

pub trait Callable {
    fn arity(&self) -> usize;

    /// Invokes the callable. The caller has already checked that `arguments` matches
    /// `arity()`; `call_site` locates errors raised inside the call.
    fn call<W: Write>(
        &self,
        interpreter: &mut Interpreter<W>,
        arguments: Vec<Value>,
        call_site: &Token,
    ) -> Result<Value>;
}

/// A function value. Cloning shares the underlying function, and two values are equal
/// only if they refer to the same function object.
#[derive(Clone)]
pub enum Function {
    Native(Rc<NativeFunction>),
    Lox(Rc<LoxFunction>),
}

impl Callable for Function {
    fn arity(&self) -> usize {
        match self {
            Function::Native(native) => native.arity(),
            Function::Lox(function) => function.arity(),
        }
    }

    fn call<W: Write>(
        &self,
        interpreter: &mut Interpreter<W>,
        arguments: Vec<Value>,
        call_site: &Token,
    ) -> Result<Value> {
        match self {
            Function::Native(native) => native.call(interpreter, arguments, call_site),
            Function::Lox(function) => function.call(interpreter, arguments, call_site),
        }
    }
}

impl PartialEq for Function {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Function::Native(a), Function::Native(b)) => Rc::ptr_eq(a, b),
            (Function::Lox(a), Function::Lox(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl Display for Function {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Function::Native(_) => write!(f, "<native fn>"),
            Function::Lox(function) => write!(f, "<fn {}>", function.declaration.name.lexeme()),
        }
    }
}

// The closure may (indirectly) contain this very function, so never print it
impl Debug for Function {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Function::Native(native) => write!(f, "Native({})", native.name),
            Function::Lox(function) => write!(f, "Lox({})", function.declaration.name.lexeme()),
        }
    }
}

pub type NativeFn = fn(&[Value]) -> std::result::Result<Value, RuntimeErrorKind>;

pub struct NativeFunction {
    pub name: &'static str,
    pub arity: usize,
    pub function: NativeFn,
}

impl Callable for NativeFunction {
    fn arity(&self) -> usize {
        self.arity
    }

    fn call<W: Write>(
        &self,
        _interpreter: &mut Interpreter<W>,
        arguments: Vec<Value>,
        call_site: &Token,
    ) -> Result<Value> {
        Ok((self.function)(&arguments).map_err(|kind| RuntimeError::new(kind, call_site))?)
    }
}

/// Builtins defined in the global scope of every interpreter.
pub fn natives() -> Vec<NativeFunction> {
    vec![NativeFunction { name: "clock", arity: 0, function: clock }]
}

/// Seconds since the Unix epoch.
fn clock(_arguments: &[Value]) -> std::result::Result<Value, RuntimeErrorKind> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs_f64().into())
        .map_err(|e| RuntimeErrorKind::Native(format!("Clock error: {e}")))
}

/// A function declared in source, together with the scope it was declared in.
pub struct LoxFunction {
    declaration: Rc<FunctionDecl>,
    closure: Rc<RefCell<Environment>>,
}

impl LoxFunction {
    pub fn new(declaration: Rc<FunctionDecl>, closure: Rc<RefCell<Environment>>) -> Self {
        Self { declaration, closure }
    }
}

impl Callable for LoxFunction {
    fn arity(&self) -> usize {
        self.declaration.params.len()
    }

    fn call<W: Write>(
        &self,
        interpreter: &mut Interpreter<W>,
        arguments: Vec<Value>,
        _call_site: &Token,
    ) -> Result<Value> {
        // Every call gets its own scope, parented to the closure and not to the caller
        let environment = Environment::new_enclosed(self.closure.clone());
        {
            let mut environment = environment.borrow_mut();
            for (param, argument) in self.declaration.params.iter().zip(arguments) {
                environment.define(param.lexeme(), argument);
            }
        }

        match interpreter.execute_block(&self.declaration.body, environment)? {
            Flow::Return(value) => Ok(value),
            Flow::Normal => Ok(Value::Nil),
        }
    }
}
