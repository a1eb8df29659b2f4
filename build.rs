// build.rs

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::Path;

const FALLBACK_LANG: &str = "en";

/// Picks the message language: a `lang_*` feature wins, then `JOBLINE_LANG`, then English.
fn select_language() -> String {
    let mut requested: Vec<String> = env::vars()
        .filter_map(|(key, _)| {
            key.strip_prefix("CARGO_FEATURE_LANG_")
                .map(str::to_lowercase)
        })
        .collect();
    requested.sort();

    match requested.as_slice() {
        [] => env::var("JOBLINE_LANG").unwrap_or_else(|_| FALLBACK_LANG.to_string()),
        [only] => only.clone(),
        [first, ..] => {
            println!(
                "cargo:warning=Several language features enabled ({:?}); using '{}'.",
                requested, first
            );
            first.clone()
        }
    }
}

fn load_catalog(lang: &str) -> Option<BTreeMap<String, String>> {
    let path = format!("locales/{}.toml", lang);
    let content = fs::read_to_string(&path).ok()?;
    match toml::from_str(&content) {
        Ok(catalog) => Some(catalog),
        Err(e) => panic!("Failed to parse {}: {}", path, e),
    }
}

fn main() {
    let lang = select_language();
    println!("cargo:rustc-env=JOBLINE_LANG_EFFECTIVE={}", lang);
    println!("cargo:rerun-if-env-changed=JOBLINE_LANG");
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=locales/");

    // English is always loaded so a partial translation still compiles.
    let mut messages = load_catalog(FALLBACK_LANG)
        .unwrap_or_else(|| panic!("Missing fallback catalog locales/{}.toml", FALLBACK_LANG));

    if lang != FALLBACK_LANG {
        match load_catalog(&lang) {
            Some(specific) => messages.extend(specific),
            None => println!(
                "cargo:warning=Language file 'locales/{}.toml' not found. Falling back to '{}'.",
                lang, FALLBACK_LANG
            ),
        }
    }

    // Each key becomes a macro arm expanding to a string literal, so `t!` output
    // can be used as a `format!` template.
    let mut macro_code = String::from("#[macro_export]\nmacro_rules! t {\n");
    for (key, value) in &messages {
        let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
        macro_code.push_str(&format!("    (\"{}\") => {{ \"{}\" }};\n", key, escaped));
    }
    macro_code.push_str(
        "    ($key:expr) => {{ compile_error!(concat!(\"Missing translation key: \", $key)) }};\n",
    );
    macro_code.push('}');

    let out_dir = env::var("OUT_DIR").unwrap_or_else(|e| panic!("OUT_DIR is not set: {}", e));
    let dest_path = Path::new(&out_dir).join("translations.rs");
    fs::write(&dest_path, macro_code)
        .unwrap_or_else(|e| panic!("Failed to write {}: {}", dest_path.display(), e));
}
