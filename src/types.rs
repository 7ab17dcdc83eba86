//! Mapping from schema type strings (C++/ROOT spellings) to Rust types.
use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;

static VECTOR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:std::)?vector\s*<\s*(.+?)\s*>$").expect("static regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scalar {
    Bool,
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    F32,
    F64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BranchType {
    Scalar(Scalar),
    Text,
    Vector(Box<BranchType>),
}

/// What an accessor of this type looks like through the numeric binder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericKind {
    Scalar,
    Vector,
}

impl Scalar {
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.split_whitespace().collect::<Vec<_>>().join(" ");
        Some(match s.as_str() {
            "bool" | "Bool_t" => Scalar::Bool,
            "char" | "signed char" | "Char_t" => Scalar::I8,
            "unsigned char" | "UChar_t" => Scalar::U8,
            "short" | "short int" | "Short_t" => Scalar::I16,
            "unsigned short" | "unsigned short int" | "UShort_t" => Scalar::U16,
            "int" | "Int_t" => Scalar::I32,
            "unsigned" | "unsigned int" | "UInt_t" => Scalar::U32,
            "long" | "long int" | "long long" | "Long_t" | "Long64_t" => Scalar::I64,
            "unsigned long" | "unsigned long long" | "ULong_t" | "ULong64_t" | "size_t" => {
                Scalar::U64
            }
            "float" | "Float_t" => Scalar::F32,
            "double" | "Double_t" => Scalar::F64,
            _ => return None,
        })
    }

    pub fn rust_name(self) -> &'static str {
        match self {
            Scalar::Bool => "bool",
            Scalar::I8 => "i8",
            Scalar::U8 => "u8",
            Scalar::I16 => "i16",
            Scalar::U16 => "u16",
            Scalar::I32 => "i32",
            Scalar::U32 => "u32",
            Scalar::I64 => "i64",
            Scalar::U64 => "u64",
            Scalar::F32 => "f32",
            Scalar::F64 => "f64",
        }
    }
}

impl BranchType {
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if let Some(caps) = VECTOR_RE.captures(s) {
            return BranchType::parse(&caps[1]).map(|inner| BranchType::Vector(Box::new(inner)));
        }
        match s {
            "string" | "std::string" | "TString" => Some(BranchType::Text),
            _ => Scalar::parse(s).map(BranchType::Scalar),
        }
    }

    /// Owned type held in the row cache.
    pub fn storage_type(&self) -> String {
        match self {
            BranchType::Scalar(s) => s.rust_name().to_string(),
            BranchType::Text => "String".to_string(),
            BranchType::Vector(inner) => format!("Vec<{}>", inner.storage_type()),
        }
    }

    /// Type returned by the generated accessor.
    pub fn return_type(&self) -> String {
        match self {
            BranchType::Scalar(s) => s.rust_name().to_string(),
            BranchType::Text => "&str".to_string(),
            BranchType::Vector(inner) => format!("&[{}]", inner.storage_type()),
        }
    }

    /// Expression turning `cached` (a `&StorageType`) into the return type.
    pub fn borrow_expr(&self, cached: &str) -> String {
        match self {
            BranchType::Scalar(_) => format!("*{cached}"),
            BranchType::Text => format!("{cached}.as_str()"),
            BranchType::Vector(_) => format!("{cached}.as_slice()"),
        }
    }

    pub fn numeric_kind(&self) -> Option<NumericKind> {
        match self {
            BranchType::Scalar(_) => Some(NumericKind::Scalar),
            BranchType::Vector(inner) if matches!(**inner, BranchType::Scalar(_)) => {
                Some(NumericKind::Vector)
            }
            _ => None,
        }
    }
}

impl fmt::Display for BranchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.storage_type())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_and_cpp_spellings() {
        assert_eq!(BranchType::parse("float"), Some(BranchType::Scalar(Scalar::F32)));
        assert_eq!(BranchType::parse("Float_t"), Some(BranchType::Scalar(Scalar::F32)));
        assert_eq!(BranchType::parse("unsigned  int"), Some(BranchType::Scalar(Scalar::U32)));
        assert_eq!(BranchType::parse("Long64_t"), Some(BranchType::Scalar(Scalar::I64)));
        assert_eq!(BranchType::parse("TString"), Some(BranchType::Text));
        assert_eq!(BranchType::parse("TLorentzVector"), None);
    }

    #[test]
    fn nested_vectors() {
        let ty = BranchType::parse("vector<vector<int> >").unwrap();
        assert_eq!(ty.storage_type(), "Vec<Vec<i32>>");
        assert_eq!(ty.return_type(), "&[Vec<i32>]");
        assert_eq!(ty.numeric_kind(), None);

        let ty = BranchType::parse("std::vector<bool>").unwrap();
        assert_eq!(ty.return_type(), "&[bool]");
        assert_eq!(ty.numeric_kind(), Some(NumericKind::Vector));
        assert_eq!(ty.borrow_expr("c"), "c.as_slice()");
    }

    #[test]
    fn scalar_accessor_copies() {
        let ty = BranchType::parse("double").unwrap();
        assert_eq!(ty.return_type(), "f64");
        assert_eq!(ty.borrow_expr("c"), "*c");
        assert_eq!(BranchType::Text.return_type(), "&str");
        assert_eq!(BranchType::Text.numeric_kind(), None);
    }
}
