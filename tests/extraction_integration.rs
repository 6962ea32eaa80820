//! Integration tests for the extraction pipeline.
//!
//! These tests run every built-in plugin over testdata fixtures and check the
//! element invariants that hold regardless of language.

use std::collections::HashSet;
use std::fs;
use std::sync::Arc;

use treescope::elements::{ElementCategory, Visibility};
use treescope::extract::{extract, extract_all, DEFAULT_MAX_DOC_LINES};
use treescope::plugin::{LanguagePlugin, ParsedSource, PluginRegistry};
use treescope::source::SourceUnit;

fn fixture(name: &str) -> String {
    let path = format!("{}/testdata/fixtures/{}", env!("CARGO_MANIFEST_DIR"), name);
    fs::read_to_string(&path).unwrap_or_else(|e| panic!("cannot read {}: {}", path, e))
}

fn parse(registry: &PluginRegistry, name: &str) -> (Arc<LanguagePlugin>, ParsedSource) {
    let content = fixture(name);
    let plugin = registry
        .resolve(name, Some(content.as_bytes()))
        .expect("fixture language should resolve");
    let unit = Arc::new(SourceUnit::new(name, content, plugin.id()));
    let parsed = plugin.parse(unit).expect("fixture should parse");
    (plugin, parsed)
}

// =============================================================================
// Python
// =============================================================================

#[test]
fn test_python_fixture_inventory() {
    let registry = PluginRegistry::default();
    let (plugin, parsed) = parse(&registry, "sample.py");

    let functions = extract(&parsed, &plugin, ElementCategory::Function, DEFAULT_MAX_DOC_LINES);
    let names: Vec<String> = functions.elements.iter().map(|f| f.qualified_name()).collect();
    assert_eq!(names, vec!["Shape.area", "Square.__init__", "Square.area", "classify"]);

    let classify = &functions.elements[3];
    assert_eq!(classify.complexity, Some(3), "one for plus one if");
    assert_eq!(classify.return_type.as_deref(), Some("str"));
    assert_eq!(classify.visibility, Visibility::Public);

    let classes = extract(&parsed, &plugin, ElementCategory::Class, DEFAULT_MAX_DOC_LINES);
    let class_names: Vec<&str> = classes.elements.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(class_names, vec!["Shape", "Square"]);
    assert_eq!(classes.elements[0].doc.as_deref(), Some("Base shape."));
    assert!(classes.elements.iter().all(|c| c.complexity.is_none()));

    let imports = extract(&parsed, &plugin, ElementCategory::Import, DEFAULT_MAX_DOC_LINES);
    let import_names: Vec<&str> = imports.elements.iter().map(|i| i.name.as_str()).collect();
    assert_eq!(import_names, vec!["os", "typing"]);

    let variables = extract(&parsed, &plugin, ElementCategory::Variable, DEFAULT_MAX_DOC_LINES);
    assert_eq!(variables.elements.len(), 1);
    assert_eq!(variables.elements[0].name, "LIMIT");
}

// =============================================================================
// Rust
// =============================================================================

#[test]
fn test_rust_fixture_inventory() {
    let registry = PluginRegistry::default();
    let (plugin, parsed) = parse(&registry, "sample.rs");
    assert_eq!(plugin.id(), "rust");

    let functions = extract(&parsed, &plugin, ElementCategory::Function, DEFAULT_MAX_DOC_LINES);
    let names: Vec<&str> = functions.elements.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["new", "get", "helper"]);
    assert_eq!(functions.elements[1].doc.as_deref(), Some("Look up a key."));
    assert_eq!(functions.elements[1].complexity, Some(2));

    let classes = extract(&parsed, &plugin, ElementCategory::Class, DEFAULT_MAX_DOC_LINES);
    assert_eq!(classes.elements.len(), 1);
    assert_eq!(classes.elements[0].name, "Store");
    assert_eq!(classes.elements[0].doc.as_deref(), Some("A key-value store."));
}

// =============================================================================
// Header resolution
// =============================================================================

#[test]
fn test_header_sniffing_picks_language() {
    let registry = PluginRegistry::default();
    let (cpp, _) = parse(&registry, "shapes.h");
    assert_eq!(cpp.id(), "cpp");
    let (c, _) = parse(&registry, "legacy.h");
    assert_eq!(c.id(), "c");
}

#[test]
fn test_cpp_header_elements() {
    let registry = PluginRegistry::default();
    let (plugin, parsed) = parse(&registry, "shapes.h");
    let classes = extract(&parsed, &plugin, ElementCategory::Class, DEFAULT_MAX_DOC_LINES);
    let names: Vec<&str> = classes.elements.iter().map(|c| c.name.as_str()).collect();
    assert!(names.contains(&"geo"), "Expected namespace, got {:?}", names);
    assert!(names.contains(&"Box"), "Expected class, got {:?}", names);
}

// =============================================================================
// Invariants over every fixture
// =============================================================================

const FIXTURES: &[&str] = &["sample.py", "sample.rs", "shapes.h", "legacy.h", "run_tool"];

#[test]
fn test_span_invariant_holds_for_all_fixtures() {
    let registry = PluginRegistry::default();
    for name in FIXTURES {
        let (plugin, parsed) = parse(&registry, name);
        let all = extract_all(&parsed, &plugin, &ElementCategory::ALL, DEFAULT_MAX_DOC_LINES);
        if name.ends_with(".py") || name.ends_with(".rs") {
            assert!(all.errors.is_empty(), "{}: unexpected errors {:?}", name, all.errors);
        }
        for element in &all.elements {
            assert!(
                element.span_is_consistent(),
                "{}: span of {} {:?} disagrees with its text",
                name,
                element.category,
                element.name
            );
            match element.category {
                ElementCategory::Function => assert!(element.complexity.unwrap_or(0) >= 1),
                _ => assert!(element.complexity.is_none()),
            }
        }
    }
}

#[test]
fn test_no_node_claimed_twice() {
    let registry = PluginRegistry::default();
    for name in FIXTURES {
        let (plugin, parsed) = parse(&registry, name);
        for category in ElementCategory::ALL {
            let out = extract(&parsed, &plugin, category, DEFAULT_MAX_DOC_LINES);
            let unique: HashSet<usize> = out.claimed.iter().copied().collect();
            assert_eq!(unique.len(), out.claimed.len(), "{} {}: node claimed twice", name, category);
        }
    }
}

#[test]
fn test_extraction_is_idempotent() {
    let registry = PluginRegistry::default();
    for name in FIXTURES {
        let (plugin, parsed) = parse(&registry, name);
        let first = extract_all(&parsed, &plugin, &ElementCategory::ALL, DEFAULT_MAX_DOC_LINES);
        let second = extract_all(&parsed, &plugin, &ElementCategory::ALL, DEFAULT_MAX_DOC_LINES);
        assert_eq!(first.elements, second.elements, "{}: extraction changed between runs", name);
    }
}

#[test]
fn test_shebang_file_without_extension() {
    let registry = PluginRegistry::default();
    let (plugin, parsed) = parse(&registry, "run_tool");
    assert_eq!(plugin.id(), "python");
    let functions = extract(&parsed, &plugin, ElementCategory::Function, DEFAULT_MAX_DOC_LINES);
    assert_eq!(functions.elements.len(), 1);
    assert_eq!(functions.elements[0].name, "main");
}
