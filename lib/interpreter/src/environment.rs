use std::{cell::RefCell, collections::HashMap, rc::Rc};

use scanner::Token;

use crate::{
    error::{RuntimeError, RuntimeErrorKind},
    value::Value,
};

/// One scope of the scope chain. Scopes are shared: a closure keeps the scope it was
/// declared in alive for as long as the closure itself is reachable.
#[derive(Debug, Default)]
pub struct Environment {
    values: HashMap<String, Value>,
    enclosing: Option<Rc<RefCell<Environment>>>,
}

impl Environment {
    pub fn new_enclosed(enclosing: Rc<RefCell<Environment>>) -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Self { values: HashMap::new(), enclosing: Some(enclosing) }))
    }

    pub fn define(&mut self, name: &str, value: Value) {
        self.values.insert(name.to_string(), value);
    }

    pub fn get(&self, token: &Token) -> Result<Value, RuntimeError> {
        match (self.values.get(token.lexeme()), &self.enclosing) {
            (Some(value), _) => Ok(value.clone()),
            (None, Some(enclosing)) => enclosing.borrow().get(token),
            (None, None) => Err(undefined(token)),
        }
    }

    /// Overwrites the innermost existing binding of `token`. Never creates one.
    pub fn assign(&mut self, token: &Token, value: Value) -> Result<(), RuntimeError> {
        if let Some(slot) = self.values.get_mut(token.lexeme()) {
            *slot = value;
            return Ok(());
        }

        match &self.enclosing {
            Some(enclosing) => enclosing.borrow_mut().assign(token, value),
            None => Err(undefined(token)),
        }
    }
}

fn undefined(token: &Token) -> RuntimeError {
    RuntimeError::new(RuntimeErrorKind::UndefinedVariable(token.lexeme().to_string()), token)
}

#[cfg(test)]
mod tests {
    use cursor::Line;
    use pretty_assertions::assert_eq;
    use scanner::TokenData;

    use super::*;

    fn ident(name: &str) -> Token {
        Token::new(TokenData::Identifier, name, Line(7))
    }

    #[test]
    fn define_and_get() {
        let mut env = Environment::default();
        env.define("a", 1.0.into());
        assert_eq!(env.get(&ident("a")), Ok(1.0.into()));

        // Redefinition in the same scope is allowed
        env.define("a", "one".into());
        assert_eq!(env.get(&ident("a")), Ok("one".into()));
    }

    #[test]
    fn undefined_variable() {
        let env = Environment::default();
        let error = env.get(&ident("missing")).unwrap_err();
        assert_eq!(error.kind, RuntimeErrorKind::UndefinedVariable("missing".to_string()));
        assert_eq!(error.line, Line(7));
        assert_eq!(error.to_string(), "Undefined variable 'missing'.\n[line 7]");
    }

    #[test]
    fn shadowing() {
        let globals = Rc::new(RefCell::new(Environment::default()));
        globals.borrow_mut().define("x", 1.0.into());
        globals.borrow_mut().define("y", 2.0.into());

        let inner = Environment::new_enclosed(globals.clone());
        inner.borrow_mut().define("x", 10.0.into());

        assert_eq!(inner.borrow().get(&ident("x")), Ok(10.0.into()));
        assert_eq!(inner.borrow().get(&ident("y")), Ok(2.0.into()));
        assert_eq!(globals.borrow().get(&ident("x")), Ok(1.0.into()));
    }

    #[test]
    fn assign_updates_innermost_binding() {
        let globals = Rc::new(RefCell::new(Environment::default()));
        globals.borrow_mut().define("x", 1.0.into());

        let inner = Environment::new_enclosed(globals.clone());
        inner.borrow_mut().assign(&ident("x"), 2.0.into()).unwrap();
        assert_eq!(globals.borrow().get(&ident("x")), Ok(2.0.into()));

        inner.borrow_mut().define("x", 3.0.into());
        inner.borrow_mut().assign(&ident("x"), 4.0.into()).unwrap();
        assert_eq!(inner.borrow().get(&ident("x")), Ok(4.0.into()));
        assert_eq!(globals.borrow().get(&ident("x")), Ok(2.0.into()));
    }

    #[test]
    fn assign_never_creates_globals() {
        let globals = Rc::new(RefCell::new(Environment::default()));
        let inner = Environment::new_enclosed(globals.clone());

        let error = inner.borrow_mut().assign(&ident("z"), Value::Nil).unwrap_err();
        assert_eq!(error.kind, RuntimeErrorKind::UndefinedVariable("z".to_string()));
        assert!(globals.borrow().get(&ident("z")).is_err());
    }
}
