//! Name → accessor binding for selection and weight expressions.
use std::fmt;

use indexmap::IndexMap;

/// Per-row result of a bound accessor.
#[derive(Debug, Clone, PartialEq)]
pub enum NumericValue {
    Scalar(f64),
    Vector(Vec<f64>),
}

pub trait AsF64: Copy {
    fn as_f64(self) -> f64;
}

macro_rules! as_f64 {
    ($($t:ty),*) => {$(
        impl AsF64 for $t {
            fn as_f64(self) -> f64 {
                self as f64
            }
        }
    )*};
}

as_f64!(i8, u8, i16, u16, i32, u32, i64, u64, f32, f64);

impl AsF64 for bool {
    fn as_f64(self) -> f64 {
        if self { 1.0 } else { 0.0 }
    }
}

impl NumericValue {
    pub fn scalar<T: AsF64>(value: T) -> Self {
        NumericValue::Scalar(value.as_f64())
    }

    pub fn vector<T: AsF64>(values: &[T]) -> Self {
        NumericValue::Vector(values.iter().map(|v| v.as_f64()).collect())
    }

    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            NumericValue::Scalar(v) => Some(*v),
            NumericValue::Vector(_) => None,
        }
    }

    pub fn as_vector(&self) -> Option<&[f64]> {
        match self {
            NumericValue::Scalar(_) => None,
            NumericValue::Vector(v) => Some(v),
        }
    }
}

/// Accessor bound to a variable name; `B` is usually `dyn Baby`.
pub struct NamedAccessor<B: ?Sized> {
    name: String,
    func: fn(&B) -> NumericValue,
    resolved: bool,
}

impl<B: ?Sized> Clone for NamedAccessor<B> {
    fn clone(&self) -> Self {
        Self { name: self.name.clone(), func: self.func, resolved: self.resolved }
    }
}

impl<B: ?Sized> fmt::Debug for NamedAccessor<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NamedAccessor")
            .field("name", &self.name)
            .field("resolved", &self.resolved)
            .finish()
    }
}

impl<B: ?Sized> NamedAccessor<B> {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// `false` when the name was unknown and this evaluates to zero.
    pub fn is_resolved(&self) -> bool {
        self.resolved
    }

    pub fn eval(&self, baby: &B) -> NumericValue {
        (self.func)(baby)
    }
}

fn zero<B: ?Sized>(_: &B) -> NumericValue {
    NumericValue::Scalar(0.0)
}

/// Value of a variable whose type in `format` has no numeric view.
pub fn not_numeric(variable: &str, format: &str) -> NumericValue {
    tracing::warn!(variable, format, "variable is not numeric in this format, substituting zero");
    NumericValue::Scalar(0.0)
}

pub struct FunctionTable<B: ?Sized> {
    entries: IndexMap<&'static str, fn(&B) -> NumericValue>,
}

impl<B: ?Sized> Default for FunctionTable<B> {
    fn default() -> Self {
        Self { entries: IndexMap::new() }
    }
}

impl<B: ?Sized> FunctionTable<B> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: &'static str, func: fn(&B) -> NumericValue) {
        self.entries.insert(name, func);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Unknown names bind to a constant zero; the miss is logged, not fatal.
    pub fn get_function(&self, name: &str) -> NamedAccessor<B> {
        match self.entries.get(name) {
            Some(func) => NamedAccessor { name: name.to_string(), func: *func, resolved: true },
            None => {
                tracing::warn!(name, "no accessor for variable, substituting zero");
                NamedAccessor { name: name.to_string(), func: zero::<B>, resolved: false }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Row {
        pt: f32,
        jets: Vec<i32>,
    }

    fn table() -> FunctionTable<Row> {
        let mut t = FunctionTable::<Row>::new();
        t.insert("pt", |r| NumericValue::scalar(r.pt));
        t.insert("jets", |r| NumericValue::vector(&r.jets));
        t
    }

    #[test]
    fn bound_names_evaluate() {
        let row = Row { pt: 2.5, jets: vec![1, 2] };
        let t = table();
        assert_eq!(t.get_function("pt").eval(&row).as_scalar(), Some(2.5));
        assert_eq!(t.get_function("jets").eval(&row).as_vector(), Some(&[1.0, 2.0][..]));
        assert_eq!(t.names().collect::<Vec<_>>(), ["pt", "jets"]);
    }

    #[test]
    fn unknown_name_is_zero() {
        let row = Row { pt: 2.5, jets: Vec::new() };
        let f = table().get_function("met");
        assert!(!f.is_resolved());
        assert_eq!(f.name(), "met");
        assert_eq!(f.eval(&row), NumericValue::Scalar(0.0));
    }

    #[test]
    fn non_numeric_format_is_zero() {
        assert_eq!(not_numeric("run", "b"), NumericValue::Scalar(0.0));
    }

    #[test]
    fn bools_become_zero_or_one() {
        assert_eq!(NumericValue::vector(&[true, false]), NumericValue::Vector(vec![1.0, 0.0]));
    }
}
