//! Unified variable catalog and the type-consistency classifier.
//!
//! One `Variable` per distinct name across every schema file. Each variable
//! carries one entry per known format; an empty string marks "absent".
//! All classification is a pure function of that map.
use std::borrow::Borrow;
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;

use indexmap::{IndexMap, IndexSet};
use serde::Serialize;

use crate::error::{Result, SchemaError};
use crate::schema::SimpleVariable;

// ————————————————————————————————————————————————————————————————————————————
// POLICY
// ————————————————————————————————————————————————————————————————————————————

/// Knobs that change how variables are routed into the generated artifacts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Policy {
    /// Implement variables with one type in every format directly in the base
    /// trait. Off by default: every variable goes through a virtual accessor.
    pub implement_common_in_base: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Classification {
    /// Same type everywhere; implemented once in the base.
    UniversalSingleType,
    /// One type; virtual in the base, overridden where present, stubbed elsewhere.
    PartialSingleType,
    /// Type depends on the format; one disambiguated accessor per distinct type.
    MultipleTypes,
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Classification::UniversalSingleType => write!(f, "universal"),
            Classification::PartialSingleType => write!(f, "partial"),
            Classification::MultipleTypes => write!(f, "multiple"),
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// One schema file: a "baby type".
#[derive(Debug, Clone, Serialize)]
pub struct Format {
    pub name: String,
    pub tree: String,
    #[serde(skip)]
    pub source: PathBuf,
}

#[derive(Debug, Clone)]
pub struct Variable {
    name: String,
    type_map: IndexMap<String, String>,
}

#[derive(Debug, Clone, Default)]
pub struct Catalog {
    formats: Vec<Format>,
    variables: BTreeSet<Variable>,
}

// ————————————————————————————————————————————————————————————————————————————
// VARIABLE
// ————————————————————————————————————————————————————————————————————————————

impl Variable {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), type_map: IndexMap::new() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn type_map(&self) -> &IndexMap<String, String> {
        &self.type_map
    }

    /// Returns the previous non-empty type for `format`, if any.
    pub fn set_entry(&mut self, format: &str, ty: &str) -> Option<String> {
        self.type_map
            .insert(format.to_string(), ty.to_string())
            .filter(|prev| !prev.is_empty())
    }

    /// Declared type in `format`; `None` when absent.
    pub fn entry(&self, format: &str) -> Option<&str> {
        self.type_map
            .get(format)
            .map(String::as_str)
            .filter(|ty| !ty.is_empty())
    }

    pub fn is_present_in(&self, format: &str) -> bool {
        self.entry(format).is_some()
    }

    /// Rebuild the map in `formats` order with an explicit empty entry for
    /// every format that never declared this variable.
    fn fill_absent(&mut self, formats: &[&str]) {
        let mut ordered = IndexMap::with_capacity(formats.len());
        for format in formats {
            let ty = self.type_map.swap_remove(*format).unwrap_or_default();
            ordered.insert(format.to_string(), ty);
        }
        self.type_map = ordered;
    }

    /// Distinct non-empty types, in first-appearance format order.
    pub fn single_types(&self) -> IndexSet<&str> {
        self.type_map
            .values()
            .filter(|ty| !ty.is_empty())
            .map(String::as_str)
            .collect()
    }

    pub fn is_universal_single_type(&self) -> bool {
        self.single_types().len() == 1 && self.type_map.values().all(|ty| !ty.is_empty())
    }

    pub fn has_multiple_types(&self) -> bool {
        self.single_types().len() >= 2
    }

    pub fn is_partial_single_type(&self) -> bool {
        self.single_types().len() == 1
    }

    pub fn classification(&self, policy: &Policy) -> Classification {
        if self.has_multiple_types() {
            Classification::MultipleTypes
        } else if policy.implement_common_in_base && self.is_universal_single_type() {
            Classification::UniversalSingleType
        } else {
            Classification::PartialSingleType
        }
    }

    /// Disambiguation index of `format`'s type: its position among the
    /// distinct types, counted in format order. Formats with the same type
    /// share an index.
    pub fn var_index(&self, format: &str) -> Result<usize> {
        let this_type = self.entry(format).ok_or_else(|| {
            SchemaError::Consistency(format!(
                "variable `{}` has no type in format `{format}`",
                self.name
            ))
        })?;
        let mut seen = IndexSet::new();
        for ty in self.type_map.values().filter(|ty| !ty.is_empty()) {
            if ty == this_type {
                return Ok(seen.len());
            }
            seen.insert(ty.as_str());
        }
        Err(SchemaError::Consistency(format!(
            "bad type index for `{}` in format `{format}`",
            self.name
        )))
    }

    pub fn accessor_name(&self, format: &str) -> Result<String> {
        Ok(match self.var_index(format)? {
            0 => self.name.clone(),
            index => format!("{}_{index}", self.name),
        })
    }

    /// Formats whose declared type is exactly `ty`.
    pub fn formats_with_type<'a>(&'a self, ty: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.type_map
            .iter()
            .filter(move |(_, t)| t.as_str() == ty)
            .map(|(format, _)| format.as_str())
    }
}

impl PartialEq for Variable {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Variable {}

impl PartialOrd for Variable {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Variable {
    fn cmp(&self, other: &Self) -> Ordering {
        self.name.cmp(&other.name)
    }
}

impl Borrow<str> for Variable {
    fn borrow(&self) -> &str {
        &self.name
    }
}

// ————————————————————————————————————————————————————————————————————————————
// CATALOG
// ————————————————————————————————————————————————————————————————————————————

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_format(&mut self, format: Format) -> Result<()> {
        if self.format(&format.name).is_some() {
            return Err(SchemaError::DuplicateFormat(format.name));
        }
        self.formats.push(format);
        Ok(())
    }

    /// Merge one declaration into the catalog. Returns the type it replaced
    /// when the same format declared the variable before.
    pub fn declare(&mut self, format: &str, decl: &SimpleVariable) -> Option<String> {
        let mut var = self
            .variables
            .take(decl.name.as_str())
            .unwrap_or_else(|| Variable::new(decl.name.as_str()));
        let prev = var.set_entry(format, &decl.ty);
        self.variables.insert(var);
        prev
    }

    /// Give every variable an explicit entry for every format.
    pub fn finish(&mut self) {
        let names = self.formats.iter().map(|f| f.name.as_str()).collect::<Vec<_>>();
        self.variables = std::mem::take(&mut self.variables)
            .into_iter()
            .map(|mut var| {
                var.fill_absent(&names);
                var
            })
            .collect();
    }

    pub fn formats(&self) -> &[Format] {
        &self.formats
    }

    pub fn format(&self, name: &str) -> Option<&Format> {
        self.formats.iter().find(|f| f.name == name)
    }

    pub fn variables(&self) -> impl Iterator<Item = &Variable> {
        self.variables.iter()
    }

    pub fn variable(&self, name: &str) -> Option<&Variable> {
        self.variables.get(name)
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    pub fn describe(&self, policy: &Policy) -> Result<CatalogDescription> {
        let mut variables = Vec::with_capacity(self.variables.len());
        for var in &self.variables {
            let mut types = IndexMap::new();
            let mut accessors = IndexMap::new();
            for format in &self.formats {
                let ty = var.entry(&format.name).map(str::to_string);
                let accessor = match ty {
                    Some(_) => Some(var.accessor_name(&format.name)?),
                    None => None,
                };
                types.insert(format.name.clone(), ty);
                accessors.insert(format.name.clone(), accessor);
            }
            variables.push(VariableDescription {
                name: var.name().to_string(),
                classification: var.classification(policy),
                types,
                accessors,
            });
        }
        Ok(CatalogDescription { formats: self.formats.clone(), variables })
    }
}

// ————————————————————————————————————————————————————————————————————————————
// DESCRIPTION
// ————————————————————————————————————————————————————————————————————————————

/// Serialisable view of the classification; `null` marks an absent variable.
#[derive(Debug, Clone, Serialize)]
pub struct CatalogDescription {
    pub formats: Vec<Format>,
    pub variables: Vec<VariableDescription>,
}

#[derive(Debug, Clone, Serialize)]
pub struct VariableDescription {
    pub name: String,
    pub classification: Classification,
    pub types: IndexMap<String, Option<String>>,
    pub accessors: IndexMap<String, Option<String>>,
}

// ------------------------------- Tests ------------------------------------ //
