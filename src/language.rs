//! Language capability tables
//!
//! The core never branches on a concrete source language. Everything the
//! type parser and the registry need to know about a language lives in a
//! [`Language`] value: primitive names, generic delimiters, keywords and
//! the built-in type hierarchy used when no record declaration is known.
//!
//! Tables are plain data so that configuration files can add or override
//! them (see [`crate::config`]).

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Capability table of one source language.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Language {
    /// Language identifier (`cpp`, `java`, ...)
    pub name: String,
    /// File extensions handled by this language, without the dot
    pub file_extensions: Vec<String>,
    /// Separator of qualified names
    pub namespace_delimiter: String,
    /// Primitive type names; multi-word primitives are joined from these
    pub primitive_types: Vec<String>,
    /// Generic argument delimiters, e.g. `<` and `>`
    pub generics: Option<(char, char)>,
    /// Keywords stripped before parsing (`public`, `private`, ...)
    pub access_modifiers: Vec<String>,
    /// Storage class keywords (`static`, `extern`, ...)
    pub storage_keywords: Vec<String>,
    /// Qualifier keywords (`const`, `volatile`, `final`, ...)
    pub qualifier_keywords: Vec<String>,
    /// Elaborated type specifiers (`struct`, `class`, ...)
    pub elaborated_type_specifiers: Vec<String>,
    /// Names that denote "infer this type" (`auto`, `var`)
    pub unknown_type_names: Vec<String>,
    /// Void-like names
    pub incomplete_type_names: Vec<String>,
    /// Built-in type name -> direct supertypes
    pub builtin_hierarchy: BTreeMap<String, Vec<String>>,
    pub supports_default_arguments: bool,
    pub supports_function_pointers: bool,
}

impl Default for Language {
    fn default() -> Self {
        Self {
            name: String::new(),
            file_extensions: Vec::new(),
            namespace_delimiter: ".".to_string(),
            primitive_types: Vec::new(),
            generics: None,
            access_modifiers: Vec::new(),
            storage_keywords: Vec::new(),
            qualifier_keywords: Vec::new(),
            elaborated_type_specifiers: Vec::new(),
            unknown_type_names: Vec::new(),
            incomplete_type_names: Vec::new(),
            builtin_hierarchy: BTreeMap::new(),
            supports_default_arguments: false,
            supports_function_pointers: false,
        }
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn hierarchy(entries: &[(&str, &[&str])]) -> BTreeMap<String, Vec<String>> {
    entries
        .iter()
        .map(|(name, supers)| (name.to_string(), strings(supers)))
        .collect()
}

const C_PRIMITIVES: &[&str] = &[
    "char", "short", "int", "long", "float", "double", "_Bool", "bool", "wchar_t",
];

impl Language {
    pub fn c() -> Self {
        Self {
            name: "c".to_string(),
            file_extensions: strings(&["c", "h"]),
            namespace_delimiter: "::".to_string(),
            primitive_types: strings(C_PRIMITIVES),
            storage_keywords: strings(&["static", "extern", "register", "auto"]),
            qualifier_keywords: strings(&["const", "volatile", "restrict", "_Atomic"]),
            elaborated_type_specifiers: strings(&["struct", "union", "enum"]),
            incomplete_type_names: strings(&["void"]),
            supports_function_pointers: true,
            ..Self::default()
        }
    }

    pub fn cpp() -> Self {
        let mut primitives = strings(C_PRIMITIVES);
        primitives.extend(strings(&["char8_t", "char16_t", "char32_t"]));

        Self {
            name: "cpp".to_string(),
            file_extensions: strings(&["cpp", "cc", "cxx", "hpp", "hh", "hxx"]),
            namespace_delimiter: "::".to_string(),
            primitive_types: primitives,
            generics: Some(('<', '>')),
            access_modifiers: strings(&["public", "private", "protected"]),
            storage_keywords: strings(&["static", "extern", "register", "mutable", "thread_local"]),
            qualifier_keywords: strings(&["const", "volatile", "restrict", "__restrict", "constexpr"]),
            elaborated_type_specifiers: strings(&["class", "struct", "union", "enum", "typename"]),
            unknown_type_names: strings(&["auto", "decltype(auto)"]),
            incomplete_type_names: strings(&["void"]),
            builtin_hierarchy: hierarchy(&[
                ("std::exception", &[]),
                ("std::logic_error", &["std::exception"]),
                ("std::runtime_error", &["std::exception"]),
                ("std::bad_alloc", &["std::exception"]),
                ("std::bad_cast", &["std::exception"]),
                ("std::invalid_argument", &["std::logic_error"]),
                ("std::out_of_range", &["std::logic_error"]),
                ("std::length_error", &["std::logic_error"]),
                ("std::overflow_error", &["std::runtime_error"]),
                ("std::range_error", &["std::runtime_error"]),
                ("std::ios_base", &[]),
                ("std::ios", &["std::ios_base"]),
                ("std::istream", &["std::ios"]),
                ("std::ostream", &["std::ios"]),
                ("std::iostream", &["std::istream", "std::ostream"]),
                ("std::ifstream", &["std::istream"]),
                ("std::ofstream", &["std::ostream"]),
                ("std::fstream", &["std::iostream"]),
                ("std::stringstream", &["std::iostream"]),
            ]),
            supports_default_arguments: true,
            supports_function_pointers: true,
            ..Self::default()
        }
    }

    pub fn java() -> Self {
        Self {
            name: "java".to_string(),
            file_extensions: strings(&["java"]),
            namespace_delimiter: ".".to_string(),
            primitive_types: strings(&[
                "byte", "short", "int", "long", "float", "double", "boolean", "char",
            ]),
            generics: Some(('<', '>')),
            access_modifiers: strings(&["public", "private", "protected"]),
            storage_keywords: strings(&["static"]),
            qualifier_keywords: strings(&["final", "volatile", "transient"]),
            unknown_type_names: strings(&["var"]),
            incomplete_type_names: strings(&["void"]),
            builtin_hierarchy: hierarchy(&[
                ("java.lang.Object", &[]),
                ("java.lang.CharSequence", &[]),
                ("java.lang.Comparable", &[]),
                ("java.lang.String", &["java.lang.Object", "java.lang.CharSequence", "java.lang.Comparable"]),
                ("java.lang.Number", &["java.lang.Object"]),
                ("java.lang.Integer", &["java.lang.Number", "java.lang.Comparable"]),
                ("java.lang.Long", &["java.lang.Number", "java.lang.Comparable"]),
                ("java.lang.Short", &["java.lang.Number", "java.lang.Comparable"]),
                ("java.lang.Byte", &["java.lang.Number", "java.lang.Comparable"]),
                ("java.lang.Float", &["java.lang.Number", "java.lang.Comparable"]),
                ("java.lang.Double", &["java.lang.Number", "java.lang.Comparable"]),
                ("java.lang.Boolean", &["java.lang.Object", "java.lang.Comparable"]),
                ("java.lang.Character", &["java.lang.Object", "java.lang.Comparable"]),
                ("java.lang.Throwable", &["java.lang.Object"]),
                ("java.lang.Exception", &["java.lang.Throwable"]),
                ("java.lang.Error", &["java.lang.Throwable"]),
                ("java.lang.RuntimeException", &["java.lang.Exception"]),
                ("java.lang.IllegalArgumentException", &["java.lang.RuntimeException"]),
                ("java.lang.IllegalStateException", &["java.lang.RuntimeException"]),
                ("java.lang.NullPointerException", &["java.lang.RuntimeException"]),
                ("java.io.IOException", &["java.lang.Exception"]),
                ("java.util.Collection", &["java.lang.Object"]),
                ("java.util.List", &["java.util.Collection"]),
                ("java.util.Set", &["java.util.Collection"]),
                ("java.util.AbstractList", &["java.util.List"]),
                ("java.util.ArrayList", &["java.util.AbstractList"]),
                ("java.util.LinkedList", &["java.util.AbstractList"]),
                ("java.util.HashSet", &["java.util.Set"]),
            ]),
            ..Self::default()
        }
    }

    pub fn python() -> Self {
        Self {
            name: "python".to_string(),
            file_extensions: strings(&["py", "pyi"]),
            namespace_delimiter: ".".to_string(),
            primitive_types: strings(&["int", "float", "complex", "bool", "str", "bytes"]),
            generics: Some(('[', ']')),
            incomplete_type_names: strings(&["None"]),
            unknown_type_names: strings(&["Any"]),
            builtin_hierarchy: hierarchy(&[
                ("object", &[]),
                ("int", &["object"]),
                ("bool", &["int"]),
                ("float", &["object"]),
                ("str", &["object"]),
                ("BaseException", &["object"]),
                ("Exception", &["BaseException"]),
                ("LookupError", &["Exception"]),
                ("KeyError", &["LookupError"]),
                ("IndexError", &["LookupError"]),
                ("ValueError", &["Exception"]),
                ("TypeError", &["Exception"]),
            ]),
            supports_default_arguments: true,
            ..Self::default()
        }
    }

    pub fn is_primitive(&self, name: &str) -> bool {
        self.primitive_types.iter().any(|p| p == name)
    }

    pub fn is_access_modifier(&self, word: &str) -> bool {
        self.access_modifiers.iter().any(|m| m == word)
    }

    pub fn is_storage_keyword(&self, word: &str) -> bool {
        self.storage_keywords.iter().any(|k| k == word)
    }

    pub fn is_qualifier_keyword(&self, word: &str) -> bool {
        self.qualifier_keywords.iter().any(|k| k == word)
    }

    pub fn is_elaborated_type_specifier(&self, word: &str) -> bool {
        self.elaborated_type_specifiers.iter().any(|k| k == word)
    }

    pub fn is_unknown_type_name(&self, name: &str) -> bool {
        self.unknown_type_names.iter().any(|k| k == name)
    }

    pub fn is_incomplete_type_name(&self, name: &str) -> bool {
        self.incomplete_type_names.iter().any(|k| k == name)
    }

    /// Direct supertypes of a built-in type, `None` if the table does not know it
    pub fn builtin_supertypes(&self, name: &str) -> Option<&[String]> {
        self.builtin_hierarchy.get(name).map(Vec::as_slice)
    }

    /// Check if this language handles a file
    pub fn can_handle(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| self.file_extensions.iter().any(|e| e == ext))
            .unwrap_or(false)
    }
}

/// Registry of known languages
#[derive(Debug, Clone, Default)]
pub struct LanguageRegistry {
    languages: Vec<Language>,
}

impl LanguageRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a language, replacing any language with the same name
    pub fn register(&mut self, language: Language) {
        if let Some(existing) = self.languages.iter_mut().find(|l| l.name == language.name) {
            *existing = language;
        } else {
            self.languages.push(language);
        }
    }

    pub fn find(&self, name: &str) -> Option<&Language> {
        let name = name.to_lowercase();
        let name = match name.as_str() {
            "c++" | "cxx" => "cpp",
            "py" => "python",
            other => other,
        };
        self.languages.iter().find(|l| l.name == name)
    }

    /// Like [`find`](Self::find), but an unknown language is an error
    pub fn get(&self, name: &str) -> Result<&Language> {
        self.find(name)
            .ok_or_else(|| Error::UnknownLanguage(name.to_string()))
    }

    /// Find the language for a file
    pub fn find_for_path(&self, path: &Path) -> Option<&Language> {
        self.languages.iter().find(|l| l.can_handle(path))
    }

    pub fn languages(&self) -> &[Language] {
        &self.languages
    }
}

/// Registry with the built-in tables
pub fn default_registry() -> LanguageRegistry {
    let mut registry = LanguageRegistry::new();
    registry.register(Language::c());
    registry.register(Language::cpp());
    registry.register(Language::java());
    registry.register(Language::python());
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_registry_lookup() {
        let registry = default_registry();

        assert_eq!(registry.find("C++").unwrap().name, "cpp");
        assert_eq!(registry.find("java").unwrap().namespace_delimiter, ".");
        assert!(registry.find("cobol").is_none());
        assert!(matches!(registry.get("cobol"), Err(Error::UnknownLanguage(_))));
    }

    #[test]
    fn test_find_for_path() {
        let registry = default_registry();

        let lang = registry.find_for_path(&PathBuf::from("src/main.cpp")).unwrap();
        assert_eq!(lang.name, "cpp");
        assert_eq!(registry.find_for_path(&PathBuf::from("a.h")).unwrap().name, "c");
        assert!(registry.find_for_path(&PathBuf::from("README.md")).is_none());
    }

    #[test]
    fn test_register_overrides_by_name() {
        let mut registry = default_registry();
        let mut java = Language::java();
        java.unknown_type_names.push("val".to_string());
        registry.register(java);

        assert_eq!(registry.languages().len(), 4);
        assert!(registry.find("java").unwrap().is_unknown_type_name("val"));
    }

    #[test]
    fn test_builtin_hierarchy() {
        let cpp = Language::cpp();
        assert_eq!(
            cpp.builtin_supertypes("std::out_of_range").unwrap(),
            &["std::logic_error".to_string()]
        );
        assert!(cpp.builtin_supertypes("int").is_none());
    }

    #[test]
    fn test_language_from_toml() {
        let text = r#"
            name = "kotlin"
            file_extensions = ["kt"]
            primitive_types = ["Int", "Long"]
            generics = ["<", ">"]
            [builtin_hierarchy]
            "kotlin.Int" = ["kotlin.Number"]
        "#;
        let lang: Language = toml::from_str(text).unwrap();
        assert_eq!(lang.generics, Some(('<', '>')));
        assert_eq!(lang.namespace_delimiter, ".");
        assert!(lang.is_primitive("Int"));
        assert_eq!(lang.builtin_supertypes("kotlin.Int").unwrap().len(), 1);
    }
}
