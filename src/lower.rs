use indexmap::IndexMap;

use crate::catalog::{Catalog, Classification, Policy, Variable};
use crate::error::{Result, SchemaError};
use crate::ir::{Accessor, FormatArm, FormatPlan, FunctionBinding, Plan, Stub, VirtualMethod};
use crate::types::BranchType;

// Methods the generated `Baby` trait defines for its own plumbing.
const RESERVED_METHODS: &[&str] = &["common_cache"];

const KEYWORDS: &[&str] = &[
    "as", "async", "await", "break", "const", "continue", "dyn", "else", "enum", "extern",
    "false", "fn", "for", "gen", "if", "impl", "in", "let", "loop", "match", "mod", "move", "mut",
    "pub", "ref", "return", "static", "struct", "trait", "true", "type", "unsafe", "use", "where",
    "while", "abstract", "become", "box", "do", "final", "macro", "override", "priv", "try",
    "typeof", "unsized", "virtual", "yield",
];

/// Rust identifier for a schema name; keywords become raw identifiers.
pub fn rust_ident(name: &str) -> Result<String> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };
    if !valid || matches!(name, "_" | "self" | "Self" | "super" | "crate") {
        return Err(SchemaError::InvalidName(name.to_string()));
    }
    if KEYWORDS.contains(&name) {
        Ok(format!("r#{name}"))
    } else {
        Ok(name.to_string())
    }
}

fn sanitized_words(format: &str) -> Vec<String> {
    format
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_ascii_lowercase)
        .collect()
}

/// `full_v2` → `FullV2`
pub fn variant_name(format: &str) -> String {
    let mut out = String::new();
    for word in sanitized_words(format) {
        let mut chars = word.chars();
        if let Some(first) = chars.next() {
            out.push(first.to_ascii_uppercase());
            out.extend(chars);
        }
    }
    if out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert(0, 'F');
    }
    out
}

/// `full_v2` → `baby_full_v2`
pub fn module_name(format: &str) -> String {
    format!("baby_{}", sanitized_words(format).join("_"))
}

fn branch_type(var: &Variable, format: &str, ty: &str) -> Result<BranchType> {
    BranchType::parse(ty).ok_or_else(|| SchemaError::UnsupportedType {
        variable: var.name().to_string(),
        format: format.to_string(),
        ty: ty.to_string(),
    })
}

// ————————————————————————————————————————————————————————————————————————————
// LOWERING
// ————————————————————————————————————————————————————————————————————————————

struct Lowering<'a> {
    catalog: &'a Catalog,
    plan: Plan,
    // method → variable that claimed it
    methods: IndexMap<String, String>,
}

pub fn lower(catalog: &Catalog, policy: &Policy) -> Result<Plan> {
    let mut formats = Vec::with_capacity(catalog.formats().len());
    let mut seen_modules = IndexMap::new();
    for format in catalog.formats() {
        let variant = variant_name(&format.name);
        // `BabyFormat` is the registry enum
        if variant.is_empty() || variant == "Format" {
            return Err(SchemaError::InvalidName(format.name.clone()));
        }
        let module = module_name(&format.name);
        if let Some(prev) = seen_modules.insert(module.clone(), format.name.clone()) {
            return Err(SchemaError::DuplicateFormat(format!(
                "{prev} and {} both map to module `{module}`",
                format.name
            )));
        }
        formats.push(FormatPlan {
            name: format.name.clone(),
            tree: format.tree.clone(),
            type_name: format!("Baby{variant}"),
            module,
            variant,
            implemented: Vec::new(),
            stubs: Vec::new(),
        });
    }

    let mut lowering = Lowering {
        catalog,
        plan: Plan {
            formats,
            common: Vec::new(),
            virtuals: Vec::new(),
            functions: Vec::new(),
        },
        methods: IndexMap::new(),
    };

    for var in catalog.variables() {
        let classification = var.classification(policy);
        tracing::debug!(variable = var.name(), %classification, "classified");
        match classification {
            Classification::UniversalSingleType => lowering.lower_common(var)?,
            Classification::PartialSingleType => lowering.lower_partial(var)?,
            Classification::MultipleTypes => lowering.lower_multiple(var)?,
        }
    }
    Ok(lowering.plan)
}

impl Lowering<'_> {
    fn claim(&mut self, method: &str, variable: &str) -> Result<()> {
        if RESERVED_METHODS.contains(&method) {
            return Err(SchemaError::InvalidName(variable.to_string()));
        }
        if let Some(first) = self.methods.insert(method.to_string(), variable.to_string()) {
            return Err(SchemaError::AccessorCollision {
                method: method.to_string(),
                first,
                second: variable.to_string(),
            });
        }
        Ok(())
    }

    fn first_type<'v>(&self, var: &'v Variable) -> Result<(&'v str, &'v str)> {
        var.type_map()
            .iter()
            .find(|(_, ty)| !ty.is_empty())
            .map(|(format, ty)| (format.as_str(), ty.as_str()))
            .ok_or_else(|| SchemaError::Consistency(format!("`{}` has no type", var.name())))
    }

    fn lower_common(&mut self, var: &Variable) -> Result<()> {
        let method = rust_ident(var.name())?;
        self.claim(&method, var.name())?;
        let (format, schema_type) = self.first_type(var)?;
        let ty = branch_type(var, format, schema_type)?;
        if let Some(kind) = ty.numeric_kind() {
            self.plan.functions.push(FunctionBinding::Direct {
                variable: var.name().to_string(),
                method: method.clone(),
                kind,
            });
        }
        self.plan.common.push(Accessor {
            method,
            variable: var.name().to_string(),
            ty,
            schema_type: schema_type.to_string(),
        });
        Ok(())
    }

    fn lower_partial(&mut self, var: &Variable) -> Result<()> {
        let method = rust_ident(var.name())?;
        self.claim(&method, var.name())?;
        let (format, schema_type) = self.first_type(var)?;
        let ty = branch_type(var, format, schema_type)?;
        self.lower_virtual(var, method.clone(), ty.clone(), schema_type);
        if let Some(kind) = ty.numeric_kind() {
            self.plan.functions.push(FunctionBinding::Direct {
                variable: var.name().to_string(),
                method,
                kind,
            });
        }
        Ok(())
    }

    fn lower_multiple(&mut self, var: &Variable) -> Result<()> {
        let mut arms = Vec::new();
        for schema_type in var.single_types() {
            let first_format = var.formats_with_type(schema_type).next().ok_or_else(|| {
                SchemaError::Consistency(format!("`{}` lost type `{schema_type}`", var.name()))
            })?;
            let method = rust_ident(&var.accessor_name(first_format)?)?;
            self.claim(&method, var.name())?;
            let ty = branch_type(var, first_format, schema_type)?;
            for format in var.formats_with_type(schema_type) {
                let plan = self.format_plan(format)?;
                arms.push(FormatArm {
                    format: format.to_string(),
                    type_name: plan.type_name.clone(),
                    method: method.clone(),
                    kind: ty.numeric_kind(),
                });
            }
            self.lower_virtual(var, method, ty, schema_type);
        }
        if arms.iter().any(|arm| arm.kind.is_some()) {
            // keep arms in catalog format order
            let order = self.catalog.formats().iter().map(|f| f.name.as_str()).collect::<Vec<_>>();
            arms.sort_by_key(|arm| order.iter().position(|f| *f == arm.format));
            self.plan.functions.push(FunctionBinding::PerFormat {
                variable: var.name().to_string(),
                arms,
            });
        }
        Ok(())
    }

    /// Declare `method` in the base and route every format to an override
    /// (declared type matches) or a stub.
    fn lower_virtual(&mut self, var: &Variable, method: String, ty: BranchType, schema_type: &str) {
        let mut implementing = Vec::new();
        for plan in &mut self.plan.formats {
            if var.entry(&plan.name) == Some(schema_type) {
                implementing.push(plan.name.clone());
                plan.implemented.push(Accessor {
                    method: method.clone(),
                    variable: var.name().to_string(),
                    ty: ty.clone(),
                    schema_type: schema_type.to_string(),
                });
            } else {
                plan.stubs.push(Stub {
                    method: method.clone(),
                    variable: var.name().to_string(),
                    ty: ty.clone(),
                });
            }
        }
        self.plan.virtuals.push(VirtualMethod {
            method,
            variable: var.name().to_string(),
            ty,
            schema_type: schema_type.to_string(),
            formats: implementing,
        });
    }

    fn format_plan(&self, name: &str) -> Result<&FormatPlan> {
        self.plan
            .format(name)
            .ok_or_else(|| SchemaError::Consistency(format!("unknown format `{name}`")))
    }
}

// ------------------------------- Tests ------------------------------------ //

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{build_catalog, parse_schema_source};
    use crate::types::NumericKind;
    use std::path::Path;

    fn catalog(files: &[(&str, &str)]) -> Catalog {
        let parsed = files
            .iter()
            .map(|(name, src)| parse_schema_source(Path::new(name), src).unwrap())
            .collect();
        build_catalog(parsed).unwrap()
    }

    #[test]
    fn partial_variables_are_overridden_or_stubbed() {
        let c = catalog(&[
            ("a", "tree:\npt: float\nid: int\n"),
            ("b", "tree:\npt: float\niso: float\n"),
        ]);
        let plan = lower(&c, &Policy::default()).unwrap();
        assert!(plan.common.is_empty());
        let methods = plan.virtuals.iter().map(|v| v.method.as_str()).collect::<Vec<_>>();
        assert_eq!(methods, ["id", "iso", "pt"]);

        let a = plan.format("a").unwrap();
        let b = plan.format("b").unwrap();
        assert!(a.implements("pt") && b.implements("pt"));
        assert!(!a.stubs("pt") && !b.stubs("pt"));
        assert!(a.implements("id") && b.stubs("id"));
        assert!(b.implements("iso") && a.stubs("iso"));
    }

    #[test]
    fn multiple_types_get_suffixed_accessors() {
        let c = catalog(&[("a", "tree:\nx: int\n"), ("b", "tree:\nx: float\n")]);
        let plan = lower(&c, &Policy::default()).unwrap();
        let methods = plan.virtuals.iter().map(|v| v.method.as_str()).collect::<Vec<_>>();
        assert_eq!(methods, ["x", "x_1"]);
        let a = plan.format("a").unwrap();
        let b = plan.format("b").unwrap();
        assert!(a.implements("x") && a.stubs("x_1"));
        assert!(b.implements("x_1") && b.stubs("x"));
        // both read the same branch
        assert_eq!(b.implemented[0].variable, "x");

        match &plan.functions[0] {
            FunctionBinding::PerFormat { arms, .. } => {
                assert_eq!(arms.len(), 2);
                assert_eq!(arms[0].type_name, "BabyA");
                assert_eq!(arms[1].method, "x_1");
            }
            other => panic!("expected per-format binding, got {other:?}"),
        }
    }

    #[test]
    fn common_policy_moves_universal_variables_to_base() {
        let c = catalog(&[
            ("a", "tree:\npt: float\nid: int\n"),
            ("b", "tree:\npt: float\n"),
        ]);
        let plan = lower(&c, &Policy { implement_common_in_base: true }).unwrap();
        assert_eq!(plan.common.len(), 1);
        assert_eq!(plan.common[0].method, "pt");
        assert!(!plan.format("a").unwrap().implements("pt"));
        assert_eq!(plan.virtuals.len(), 1);
    }

    #[test]
    fn suffix_collision_is_an_error() {
        let c = catalog(&[
            ("a", "tree:\nx: int\nx_1: int\n"),
            ("b", "tree:\nx: float\n"),
        ]);
        let err = lower(&c, &Policy::default()).unwrap_err();
        assert!(matches!(err, SchemaError::AccessorCollision { .. }), "{err}");
    }

    #[test]
    fn unsupported_type_names_variable_and_format() {
        let c = catalog(&[("a", "tree:\np4: TLorentzVector\n")]);
        match lower(&c, &Policy::default()) {
            Err(SchemaError::UnsupportedType { variable, format, .. }) => {
                assert_eq!(variable, "p4");
                assert_eq!(format, "a");
            }
            other => panic!("expected unsupported type, got {other:?}"),
        }
    }

    #[test]
    fn non_numeric_arm_is_kept_for_its_format() {
        let c = catalog(&[("a", "tree:\nrun: int\n"), ("b", "tree:\nrun: string\n"), ("c", "tree:\npt: float\n")]);
        let plan = lower(&c, &Policy::default()).unwrap();
        match plan.functions.iter().find(|f| f.variable() == "run").unwrap() {
            FunctionBinding::PerFormat { arms, .. } => {
                let formats = arms.iter().map(|a| (a.format.as_str(), a.kind)).collect::<Vec<_>>();
                assert_eq!(formats, [("a", Some(NumericKind::Scalar)), ("b", None)]);
            }
            other => panic!("expected per-format binding, got {other:?}"),
        }

        // no numeric view anywhere: left unbound
        let c = catalog(&[("a", "tree:\nname: string\n"), ("b", "tree:\nname: vector<string>\n")]);
        assert!(lower(&c, &Policy::default()).unwrap().functions.is_empty());
    }

    #[test]
    fn non_numeric_types_are_not_bound() {
        let c = catalog(&[("a", "tree:\nname: string\npt: float\n")]);
        let plan = lower(&c, &Policy::default()).unwrap();
        let bound = plan.functions.iter().map(|f| f.variable()).collect::<Vec<_>>();
        assert_eq!(bound, ["pt"]);
    }

    #[test]
    fn format_named_like_the_registry_enum_is_rejected() {
        let c = catalog(&[("a", "tree:\npt: float\n"), ("format", "tree:\npt: float\n")]);
        match lower(&c, &Policy::default()) {
            Err(SchemaError::InvalidName(name)) => assert_eq!(name, "format"),
            other => panic!("expected invalid name, got {other:?}"),
        }
    }

    #[test]
    fn identifiers() {
        assert_eq!(rust_ident("type").unwrap(), "r#type");
        assert_eq!(rust_ident("pt_1").unwrap(), "pt_1");
        assert!(rust_ident("self").is_err());
        assert!(rust_ident("jets.pt").is_err());
        assert_eq!(variant_name("full_v2"), "FullV2");
        assert_eq!(variant_name("2017"), "F2017");
        assert_eq!(module_name("Full-V2"), "baby_full_v2");
    }
}
