use serde::{Deserialize, Serialize};

/// Runtime value in Lingo.
///
/// Lingo has no boolean type: comparisons yield `Integer(1)` or `Integer(0)`
/// and conditions test for non-zero.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum Value {
    /// The value of an unset variable.
    #[default]
    Void,

    /// 64-bit signed integer.
    Integer(i64),

    /// 64-bit floating-point number.
    Float(f64),

    /// String value.
    String(String),

    /// Symbol literal: `#name`.
    Symbol(String),

    /// Linear list: `[1, 2, 3]`.
    List(Vec<Value>),

    /// Property list: `[#a: 1, #b: 2]`.
    PropList(Vec<(Value, Value)>),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Void => "void",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Symbol(_) => "symbol",
            Value::List(_) => "list",
            Value::PropList(_) => "propList",
        }
    }

    pub fn from_bool(b: bool) -> Value {
        Value::Integer(if b { 1 } else { 0 })
    }

    /// Lingo truthiness: non-zero numbers are true, everything else is
    /// false except non-empty lists.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Void => false,
            Value::Integer(n) => *n != 0,
            Value::Float(n) => *n != 0.0,
            Value::String(_) | Value::Symbol(_) => false,
            Value::List(items) => !items.is_empty(),
            Value::PropList(items) => !items.is_empty(),
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(*n),
            Value::Float(n) => Some(*n as i64),
            Value::Void => Some(0),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Integer(n) => Some(*n as f64),
            Value::Float(n) => Some(*n),
            Value::Void => Some(0.0),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Equality the way `=` compares: numbers by value, strings ignoring case.
    pub fn lingo_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Integer(_) | Value::Float(_), Value::Integer(_) | Value::Float(_)) => {
                self.as_float() == other.as_float()
            }
            (Value::String(a), Value::String(b)) => a.eq_ignore_ascii_case(b),
            (Value::Symbol(a), Value::Symbol(b)) => a.eq_ignore_ascii_case(b),
            _ => self == other,
        }
    }
}

impl std::fmt::Display for Value {
    /// Format a value the way `put` prints it.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Void => write!(f, "<Void>"),
            Value::Integer(n) => write!(f, "{}", n),
            Value::Float(n) => write!(f, "{:.4}", n),
            Value::String(s) => write!(f, "{}", s),
            Value::Symbol(s) => write!(f, "#{}", s),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Value::PropList(items) => {
                if items.is_empty() {
                    return write!(f, "[:]");
                }
                write!(f, "[")?;
                for (i, (key, value)) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", key, value)?;
                }
                write!(f, "]")
            }
        }
    }
}
