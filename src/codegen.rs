//! Rust source emission for a lowered [`Plan`].
//!
//! Output layout (multi-file):
//! - `baby.rs`: the `Baby` trait, one method per virtual accessor, plus the
//!   shared cache for accessors implemented in the base;
//! - `baby_<format>.rs`: one reader struct per format;
//! - `mod.rs`: module registry, `BabyFormat`, the `open` factory and the
//!   name → accessor table.
//!
//! The base never names a derived type: `mod.rs` is the only place that sees
//! every format.
use std::path::PathBuf;

use crate::ir::{Accessor, FormatPlan, FunctionBinding, Plan, Stub, VirtualMethod};
use crate::types::NumericKind;

pub const DEFAULT_RUNTIME_PATH: &str = "babygen::runtime";

#[derive(Debug, Clone)]
pub struct CodegenOptions {
    /// Path the generated code uses to reach the runtime module.
    pub runtime_path: String,
    /// Emit one file with inline modules (for `include!`).
    pub single_file: bool,
}

impl Default for CodegenOptions {
    fn default() -> Self {
        Self { runtime_path: DEFAULT_RUNTIME_PATH.to_string(), single_file: false }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedFile {
    pub path: PathBuf,
    pub contents: String,
}

pub struct Codegen {
    options: CodegenOptions,
    files: Vec<GeneratedFile>,
}

// ————————————————————————————————————————————————————————————————————————————
// SOURCE BUFFER
// ————————————————————————————————————————————————————————————————————————————

#[derive(Default)]
struct Source {
    out: String,
    indent: usize,
}

impl Source {
    fn line(&mut self, text: impl AsRef<str>) {
        let text = text.as_ref();
        if !text.is_empty() {
            for _ in 0..self.indent {
                self.out.push_str("    ");
            }
            self.out.push_str(text);
        }
        self.out.push('\n');
    }

    fn blank(&mut self) {
        self.out.push('\n');
    }

    fn open(&mut self, text: impl AsRef<str>) {
        self.line(text);
        self.indent += 1;
    }

    fn close(&mut self, text: impl AsRef<str>) {
        self.indent = self.indent.saturating_sub(1);
        self.line(text);
    }

    fn doc(&mut self, text: impl AsRef<str>) {
        match text.as_ref() {
            "" => self.line("///"),
            text => self.line(format!("/// {text}")),
        }
    }
}

fn accessor_doc(variable: &str, schema_type: &str, formats: &[String]) -> String {
    if formats.is_empty() {
        format!("`{variable}`: {schema_type}")
    } else {
        format!("`{variable}`: {schema_type} ({})", formats.join(", "))
    }
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl Codegen {
    pub fn new(options: CodegenOptions) -> Self {
        Self { options, files: Vec::new() }
    }

    pub fn emit(&mut self, plan: &Plan) {
        let header = self.header(plan);
        let mut base = Source::default();
        self.emit_base(&mut base, plan);
        let derived = plan
            .formats
            .iter()
            .map(|format| {
                let mut src = Source::default();
                self.emit_format(&mut src, plan, format);
                (format.module.clone(), src.out)
            })
            .collect::<Vec<_>>();
        let mut registry = Source::default();
        self.emit_registry(&mut registry, plan);

        if self.options.single_file {
            let mut out = Source::default();
            out.line(&header);
            out.blank();
            for line in registry.out.lines() {
                out.line(line);
            }
            out.blank();
            inline_module(&mut out, "baby", &base.out);
            for (module, contents) in &derived {
                out.blank();
                inline_module(&mut out, module, contents);
            }
            self.files.push(GeneratedFile { path: PathBuf::from("babies.rs"), contents: out.out });
            return;
        }

        self.files.push(GeneratedFile {
            path: PathBuf::from("baby.rs"),
            contents: format!("{header}\n\n{}", base.out),
        });
        for (module, contents) in derived {
            self.files.push(GeneratedFile {
                path: PathBuf::from(format!("{module}.rs")),
                contents: format!("{header}\n\n{contents}"),
            });
        }
        self.files.push(GeneratedFile {
            path: PathBuf::from("mod.rs"),
            contents: format!("{header}\n\n{}", registry.out),
        });
    }

    pub fn into_files(self) -> Vec<GeneratedFile> {
        self.files
    }

    /// Every file concatenated; mostly useful in single-file mode.
    pub fn into_string(self) -> String {
        self.files.into_iter().map(|f| f.contents).collect::<Vec<_>>().join("\n")
    }

    fn header(&self, plan: &Plan) -> String {
        let formats = plan.formats.iter().map(|f| f.name.as_str()).collect::<Vec<_>>();
        format!(
            "// @generated by babygen from schema formats: {}. Do not edit.",
            formats.join(", ")
        )
    }

    fn runtime_use(&self, src: &mut Source) {
        src.line(format!("use {} as rt;", self.options.runtime_path));
    }

    // -------------------------------- Base -------------------------------- //

    fn emit_base(&self, src: &mut Source, plan: &Plan) {
        self.runtime_use(src);
        src.blank();
        src.doc("Accessors shared by every ntuple format.");
        src.doc("");
        src.doc("Calling an accessor on a format that lacks the variable is fatal.");
        src.open("pub trait Baby: rt::Ntuple {");
        if !plan.common.is_empty() {
            src.line("#[doc(hidden)]");
            src.line("fn common_cache(&self) -> &CommonCache;");
            for accessor in &plan.common {
                src.blank();
                emit_common_accessor(src, accessor);
            }
        }
        for method in &plan.virtuals {
            src.blank();
            emit_virtual(src, method);
        }
        src.close("}");

        if !plan.common.is_empty() {
            src.blank();
            src.doc("Row caches for accessors implemented in the base.");
            src.line("#[derive(Debug, Default)]");
            src.open("pub struct CommonCache {");
            for accessor in &plan.common {
                src.line(format!(
                    "{}: rt::RowCache<{}>,",
                    accessor.method,
                    accessor.ty.storage_type()
                ));
            }
            src.close("}");
            src.blank();
            src.open("impl CommonCache {");
            src.open("pub fn clear(&mut self) {");
            src.line("*self = Self::default();");
            src.close("}");
            src.close("}");
        }
    }

    // ------------------------------ Derived ------------------------------- //

    fn emit_format(&self, src: &mut Source, plan: &Plan, format: &FormatPlan) {
        let has_common = !plan.common.is_empty();
        let ty = &format.type_name;

        self.runtime_use(src);
        src.line("use super::baby::Baby;");
        if has_common {
            src.line("use super::baby::CommonCache;");
        }
        src.blank();

        src.doc(format!("Reader for format `{}` (tree `{}`).", format.name, format.tree));
        src.open(format!("pub struct {ty} {{"));
        src.line("entry: rt::Entry,");
        src.line("cache: Cache,");
        if has_common {
            src.line("common: CommonCache,");
        }
        src.close("}");
        src.blank();

        src.line("#[derive(Debug, Default)]");
        src.open("struct Cache {");
        for accessor in &format.implemented {
            src.line(format!("{}: rt::RowCache<{}>,", accessor.method, accessor.ty.storage_type()));
        }
        src.close("}");
        src.blank();

        src.open(format!("impl {ty} {{"));
        src.line(format!("pub const FORMAT: &'static str = {:?};", format.name));
        src.line(format!("pub const TREE: &'static str = {:?};", format.tree));
        src.blank();
        src.open("pub fn new(store: Box<dyn rt::ColumnarStore>) -> Self {");
        src.open("Self {");
        src.line("entry: rt::Entry::new(Self::FORMAT, store),");
        src.line("cache: Cache::default(),");
        if has_common {
            src.line("common: CommonCache::default(),");
        }
        src.close("}");
        src.close("}");
        src.blank();
        src.doc("Reader over NDJSON files, backed by the in-memory store.");
        src.line("pub fn open<I, P>(files: I) -> rt::Result<Self>");
        src.line("where");
        src.line("    I: IntoIterator<Item = P>,");
        src.line("    P: Into<std::path::PathBuf>,");
        src.open("{");
        src.line("let mut baby = Self::new(Box::new(rt::MemoryStore::new(Self::TREE)));");
        src.open("for file in files {");
        src.line("baby.entry.add_file(file)?;");
        src.close("}");
        src.line("Ok(baby)");
        src.close("}");
        src.close("}");
        src.blank();

        src.open(format!("impl rt::Ntuple for {ty} {{"));
        src.open("fn entry(&self) -> &rt::Entry {");
        src.line("&self.entry");
        src.close("}");
        src.blank();
        src.open("fn entry_mut(&mut self) -> &mut rt::Entry {");
        src.line("&mut self.entry");
        src.close("}");
        src.blank();
        src.open("fn clear_cache(&mut self) {");
        src.line("self.cache = Cache::default();");
        if has_common {
            src.line("self.common.clear();");
        }
        src.close("}");
        src.close("}");
        src.blank();

        src.open(format!("impl Baby for {ty} {{"));
        let mut first = true;
        if has_common {
            src.open("fn common_cache(&self) -> &CommonCache {");
            src.line("&self.common");
            src.close("}");
            first = false;
        }
        // keep the base declaration order
        for method in &plan.virtuals {
            if !first {
                src.blank();
            }
            first = false;
            if let Some(accessor) = format.implemented.iter().find(|a| a.method == method.method) {
                emit_override(src, accessor);
            } else if let Some(stub) = format.stubs.iter().find(|s| s.method == method.method) {
                emit_stub(src, stub);
            }
        }
        src.close("}");
    }

    // ------------------------------ Registry ------------------------------ //

    fn emit_registry(&self, src: &mut Source, plan: &Plan) {
        if !self.options.single_file {
            src.line("pub mod baby;");
            for format in &plan.formats {
                src.line(format!("pub mod {};", format.module));
            }
            src.blank();
        }
        src.line("pub use baby::Baby;");
        for format in &plan.formats {
            src.line(format!("pub use {}::{};", format.module, format.type_name));
        }
        src.blank();
        self.runtime_use(src);
        src.blank();

        src.line("#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]");
        src.open("pub enum BabyFormat {");
        for format in &plan.formats {
            src.line(format!("{},", format.variant));
        }
        src.close("}");
        src.blank();

        src.open("impl BabyFormat {");
        let all = plan
            .formats
            .iter()
            .map(|f| format!("BabyFormat::{}", f.variant))
            .collect::<Vec<_>>();
        src.line(format!(
            "pub const ALL: [BabyFormat; {}] = [{}];",
            plan.formats.len(),
            all.join(", ")
        ));
        src.blank();
        src.open("pub fn name(self) -> &'static str {");
        src.open("match self {");
        for format in &plan.formats {
            src.line(format!("BabyFormat::{} => {}::FORMAT,", format.variant, format.type_name));
        }
        src.close("}");
        src.close("}");
        src.blank();
        src.open("pub fn tree(self) -> &'static str {");
        src.open("match self {");
        for format in &plan.formats {
            src.line(format!("BabyFormat::{} => {}::TREE,", format.variant, format.type_name));
        }
        src.close("}");
        src.close("}");
        src.blank();
        src.open("pub fn from_name(name: &str) -> Option<Self> {");
        src.open("match name {");
        for format in &plan.formats {
            src.line(format!("{}::FORMAT => Some(BabyFormat::{}),", format.type_name, format.variant));
        }
        src.line("_ => None,");
        src.close("}");
        src.close("}");
        src.blank();
        src.doc("Empty reader of this format over `store`.");
        src.open("pub fn new_baby(self, store: Box<dyn rt::ColumnarStore>) -> Box<dyn Baby> {");
        src.open("let baby: Box<dyn Baby> = match self {");
        for format in &plan.formats {
            src.line(format!(
                "BabyFormat::{} => Box::new({}::new(store)),",
                format.variant, format.type_name
            ));
        }
        src.close("};");
        src.line("baby");
        src.close("}");
        src.close("}");
        src.blank();

        src.doc("Reader of `format` over NDJSON files.");
        src.line("pub fn open<I, P>(format: BabyFormat, files: I) -> rt::Result<Box<dyn Baby>>");
        src.line("where");
        src.line("    I: IntoIterator<Item = P>,");
        src.line("    P: Into<std::path::PathBuf>,");
        src.open("{");
        src.open("let baby: Box<dyn Baby> = match format {");
        for format in &plan.formats {
            src.line(format!(
                "BabyFormat::{} => Box::new({}::open(files)?),",
                format.variant, format.type_name
            ));
        }
        src.close("};");
        src.line("Ok(baby)");
        src.close("}");
        src.blank();

        src.doc("Numeric accessors by variable name.");
        src.open("pub fn function_table() -> rt::FunctionTable<dyn Baby> {");
        src.line("let mut table = rt::FunctionTable::<dyn Baby>::new();");
        for binding in &plan.functions {
            emit_binding(src, binding);
        }
        src.line("table");
        src.close("}");
        src.blank();
        src.line("static FUNCTIONS: rt::Lazy<rt::FunctionTable<dyn Baby>> = rt::Lazy::new(function_table);");
        src.blank();
        src.doc("Bind `name` to its accessor; unknown names evaluate to zero.");
        src.open("pub fn get_function(name: &str) -> rt::NamedAccessor<dyn Baby> {");
        src.line("FUNCTIONS.get_function(name)");
        src.close("}");
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn inline_module(out: &mut Source, name: &str, contents: &str) {
    out.open(format!("pub mod {name} {{"));
    for line in contents.lines() {
        out.line(line);
    }
    out.close("}");
}

fn emit_common_accessor(src: &mut Source, accessor: &Accessor) {
    src.doc(accessor_doc(&accessor.variable, &accessor.schema_type, &[]));
    src.open(format!("fn {}(&self) -> {} {{", accessor.method, accessor.ty.return_type()));
    let cached = format!(
        "Baby::common_cache(self).{}.get_or_read(rt::Ntuple::entry(self), {:?})",
        accessor.method, accessor.variable
    );
    src.line(accessor.ty.borrow_expr(&cached));
    src.close("}");
}

fn emit_virtual(src: &mut Source, method: &VirtualMethod) {
    src.doc(accessor_doc(&method.variable, &method.schema_type, &method.formats));
    src.line(format!("fn {}(&self) -> {};", method.method, method.ty.return_type()));
}

fn emit_override(src: &mut Source, accessor: &Accessor) {
    src.open(format!("fn {}(&self) -> {} {{", accessor.method, accessor.ty.return_type()));
    let cached = format!(
        "self.cache.{}.get_or_read(&self.entry, {:?})",
        accessor.method, accessor.variable
    );
    src.line(accessor.ty.borrow_expr(&cached));
    src.close("}");
}

fn emit_stub(src: &mut Source, stub: &Stub) {
    src.open(format!("fn {}(&self) -> {} {{", stub.method, stub.ty.return_type()));
    src.line(format!("rt::unavailable({:?}, Self::FORMAT)", stub.variable));
    src.close("}");
}

fn numeric_call(kind: NumericKind, method: &str) -> String {
    match kind {
        NumericKind::Scalar => format!("rt::NumericValue::scalar(Baby::{method}(b))"),
        NumericKind::Vector => format!("rt::NumericValue::vector(Baby::{method}(b))"),
    }
}

fn emit_binding(src: &mut Source, binding: &FunctionBinding) {
    match binding {
        FunctionBinding::Direct { variable, method, kind } => {
            src.line(format!("table.insert({variable:?}, |b| {});", numeric_call(*kind, method)));
        }
        FunctionBinding::PerFormat { variable, arms } => {
            src.open(format!("table.insert({variable:?}, |b| match rt::Ntuple::format(b) {{"));
            for arm in arms {
                let value = match arm.kind {
                    Some(kind) => numeric_call(kind, &arm.method),
                    None => format!("rt::not_numeric({variable:?}, {}::FORMAT)", arm.type_name),
                };
                src.line(format!("{}::FORMAT => {value},", arm.type_name));
            }
            src.line(format!("other => rt::unavailable({variable:?}, other),"));
            src.close("});");
        }
    }
}

// ------------------------------- Tests ------------------------------------ //
