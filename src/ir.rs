// Strongly-typed plan for codegen. No schema strings are interpreted past this point.

use crate::types::{BranchType, NumericKind};

#[derive(Debug, Clone)]
pub struct Plan {
    pub formats: Vec<FormatPlan>,
    pub common: Vec<Accessor>,        // implemented once in the base trait
    pub virtuals: Vec<VirtualMethod>, // declared in the base trait, one per (variable, type)
    pub functions: Vec<FunctionBinding>,
}

/// A concrete, row-cached read of one branch.
#[derive(Debug, Clone)]
pub struct Accessor {
    pub method: String,   // Rust identifier (may be raw, e.g. `r#type`)
    pub variable: String, // branch name in the store
    pub ty: BranchType,
    pub schema_type: String,
}

#[derive(Debug, Clone)]
pub struct VirtualMethod {
    pub method: String,
    pub variable: String,
    pub ty: BranchType,
    pub schema_type: String,
    pub formats: Vec<String>, // formats that implement it
}

#[derive(Debug, Clone)]
pub struct FormatPlan {
    pub name: String,       // schema file name
    pub tree: String,
    pub type_name: String,  // e.g. BabyFull
    pub module: String,     // e.g. baby_full
    pub variant: String,    // e.g. Full
    pub implemented: Vec<Accessor>,
    pub stubs: Vec<Stub>,
}

/// Inherited accessor with no branch in this format: a fatal call.
#[derive(Debug, Clone)]
pub struct Stub {
    pub method: String,
    pub variable: String,
    pub ty: BranchType,
}

#[derive(Debug, Clone)]
pub enum FunctionBinding {
    /// One accessor name valid for every format.
    Direct {
        variable: String,
        method: String,
        kind: NumericKind,
    },
    /// Type differs by format: dispatch on the reader's format name.
    PerFormat {
        variable: String,
        arms: Vec<FormatArm>,
    },
}

#[derive(Debug, Clone)]
pub struct FormatArm {
    pub format: String,
    pub type_name: String,
    pub method: String,
    pub kind: Option<NumericKind>, // `None`: declared, but with no numeric view
}

impl Plan {
    pub fn format(&self, name: &str) -> Option<&FormatPlan> {
        self.formats.iter().find(|f| f.name == name)
    }
}

impl FormatPlan {
    pub fn implements(&self, method: &str) -> bool {
        self.implemented.iter().any(|a| a.method == method)
    }

    pub fn stubs(&self, method: &str) -> bool {
        self.stubs.iter().any(|s| s.method == method)
    }
}

impl FunctionBinding {
    pub fn variable(&self) -> &str {
        match self {
            FunctionBinding::Direct { variable, .. } => variable,
            FunctionBinding::PerFormat { variable, .. } => variable,
        }
    }
}
