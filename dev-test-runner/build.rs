use std::path::PathBuf;

use babygen::{CodegenOptions, Policy};

fn generate(policy: Policy, out_dir: PathBuf) {
    let paths = ["full", "skim"].map(|name| PathBuf::from("schemas").join(name));
    let options = CodegenOptions { single_file: true, ..CodegenOptions::default() };
    let files = babygen::generate(&paths, &policy, options)
        .unwrap_or_else(|err| panic!("failed to generate accessors: {err}"));
    babygen::write_files(&files, &out_dir)
        .unwrap_or_else(|err| panic!("failed to write {}: {err}", out_dir.display()));
}

fn main() {
    println!("cargo:rerun-if-changed=schemas");
    let out_dir = PathBuf::from(std::env::var("OUT_DIR").expect("OUT_DIR is set by cargo"));
    generate(Policy::default(), out_dir.clone());
    generate(Policy { implement_common_in_base: true }, out_dir.join("common"));
}
