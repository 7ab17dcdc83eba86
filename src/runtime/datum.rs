//! Untyped cell values and their conversion into accessor types.
use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum Datum {
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Text(String),
    List(Vec<Datum>),
}

impl Datum {
    /// `None` for nulls, objects, and arrays containing either.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Null | Value::Object(_) => None,
            Value::Bool(b) => Some(Datum::Bool(*b)),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Some(Datum::Int(i))
                } else if let Some(u) = n.as_u64() {
                    Some(Datum::UInt(u))
                } else {
                    n.as_f64().map(Datum::Float)
                }
            }
            Value::String(s) => Some(Datum::Text(s.clone())),
            Value::Array(xs) => xs
                .iter()
                .map(Datum::from_json)
                .collect::<Option<Vec<_>>>()
                .map(Datum::List),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Datum::Bool(_) => "bool",
            Datum::Int(_) => "int",
            Datum::UInt(_) => "uint",
            Datum::Float(_) => "float",
            Datum::Text(_) => "text",
            Datum::List(_) => "list",
        }
    }
}

impl From<bool> for Datum {
    fn from(v: bool) -> Self {
        Datum::Bool(v)
    }
}

impl From<i32> for Datum {
    fn from(v: i32) -> Self {
        Datum::Int(v.into())
    }
}

impl From<i64> for Datum {
    fn from(v: i64) -> Self {
        Datum::Int(v)
    }
}

impl From<u64> for Datum {
    fn from(v: u64) -> Self {
        Datum::UInt(v)
    }
}

impl From<f32> for Datum {
    fn from(v: f32) -> Self {
        Datum::Float(v.into())
    }
}

impl From<f64> for Datum {
    fn from(v: f64) -> Self {
        Datum::Float(v)
    }
}

impl From<&str> for Datum {
    fn from(v: &str) -> Self {
        Datum::Text(v.to_string())
    }
}

impl<T: Into<Datum>> From<Vec<T>> for Datum {
    fn from(v: Vec<T>) -> Self {
        Datum::List(v.into_iter().map(Into::into).collect())
    }
}

/// Typed view of a [`Datum`]. Integer conversions are range-checked.
pub trait FromDatum: Sized {
    const TYPE_NAME: &'static str;
    fn from_datum(datum: &Datum) -> Option<Self>;
}

macro_rules! int_from_datum {
    ($($t:ty),*) => {$(
        impl FromDatum for $t {
            const TYPE_NAME: &'static str = stringify!($t);
            fn from_datum(datum: &Datum) -> Option<Self> {
                match datum {
                    Datum::Int(v) => <$t>::try_from(*v).ok(),
                    Datum::UInt(v) => <$t>::try_from(*v).ok(),
                    Datum::Bool(b) => Some(<$t>::from(*b)),
                    _ => None,
                }
            }
        }
    )*};
}

int_from_datum!(i8, u8, i16, u16, i32, u32, i64, u64);

impl FromDatum for f32 {
    const TYPE_NAME: &'static str = "f32";
    fn from_datum(datum: &Datum) -> Option<Self> {
        match datum {
            Datum::Float(v) => Some(*v as f32),
            Datum::Int(v) => Some(*v as f32),
            Datum::UInt(v) => Some(*v as f32),
            _ => None,
        }
    }
}

impl FromDatum for f64 {
    const TYPE_NAME: &'static str = "f64";
    fn from_datum(datum: &Datum) -> Option<Self> {
        match datum {
            Datum::Float(v) => Some(*v),
            Datum::Int(v) => Some(*v as f64),
            Datum::UInt(v) => Some(*v as f64),
            _ => None,
        }
    }
}

impl FromDatum for bool {
    const TYPE_NAME: &'static str = "bool";
    fn from_datum(datum: &Datum) -> Option<Self> {
        match datum {
            Datum::Bool(b) => Some(*b),
            Datum::Int(0) | Datum::UInt(0) => Some(false),
            Datum::Int(1) | Datum::UInt(1) => Some(true),
            _ => None,
        }
    }
}

impl FromDatum for String {
    const TYPE_NAME: &'static str = "string";
    fn from_datum(datum: &Datum) -> Option<Self> {
        match datum {
            Datum::Text(s) => Some(s.clone()),
            _ => None,
        }
    }
}

impl<T: FromDatum> FromDatum for Vec<T> {
    const TYPE_NAME: &'static str = "vector";
    fn from_datum(datum: &Datum) -> Option<Self> {
        match datum {
            Datum::List(xs) => xs.iter().map(T::from_datum).collect(),
            _ => None,
        }
    }
}
