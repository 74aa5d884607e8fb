use std::fmt;

use crate::lang::error::{Error, Result};

/// A runtime value.
///
/// Integers stay integers under `+`/`-`/`*`; division always produces a
/// float, so both numeric variants exist side by side.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Integer(i64),
    Float(f64),
    Str(String),
    /// Result of expressions run purely for effect (eg an assignment, or a
    /// host call that produces nothing)
    Unit,
}

impl Value {
    pub fn type_str(&self) -> &'static str {
        match self {
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Unit => "unit",
        }
    }

    pub fn as_float(&self) -> Result<f64> {
        match self {
            Value::Integer(i) => Ok(*i as f64),
            Value::Float(f) => Ok(*f),
            v => Err(Error::Type(format!(
                "expected a number, got '{}'",
                v.type_str()
            ))),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Str(s) => write!(f, "{}", s),
            Value::Unit => write!(f, "()"),
        }
    }
}

#[test]
fn test_as_float() {
    assert_eq!(Value::Integer(3).as_float().expect("Failed to convert"), 3.0);
    assert_eq!(
        Value::Float(3.5).as_float().expect("Failed to convert"),
        3.5
    );
    assert!(Value::Str("3".to_string()).as_float().is_err());
    assert!(Value::Unit.as_float().is_err());
}

#[test]
fn test_display() {
    assert_eq!(format!("{}", Value::Integer(42)), "42");
    assert_eq!(format!("{}", Value::Float(3.5)), "3.5");
    assert_eq!(format!("{}", Value::Str("hi".to_string())), "hi");
    assert_eq!(format!("{}", Value::Unit), "()");
}
