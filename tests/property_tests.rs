//! Property tests over generated sources and filter expressions.

use std::collections::HashSet;
use std::sync::Arc;

use proptest::prelude::*;
use treescope::elements::{CodeElement, ElementCategory};
use treescope::extract::{extract, extract_all, DEFAULT_MAX_DOC_LINES};
use treescope::plugin::PluginRegistry;
use treescope::query::FilterChain;
use treescope::source::SourceUnit;

/// A generated function: its name and how many `if`s its body holds.
#[derive(Debug, Clone)]
struct GenFn {
    name: String,
    branches: u32,
}

fn gen_fns() -> impl Strategy<Value = Vec<GenFn>> {
    prop::collection::vec(("[a-z]{1,8}", 0u32..4), 1..6).prop_map(|raw| {
        raw.into_iter()
            .enumerate()
            .map(|(i, (stem, branches))| GenFn {
                name: format!("f{}_{}", i, stem),
                branches,
            })
            .collect()
    })
}

fn python_source(fns: &[GenFn], in_class: bool) -> String {
    let indent = if in_class { "    " } else { "" };
    let mut out = String::new();
    if in_class {
        out.push_str("class Holder:\n");
    }
    for f in fns {
        out.push_str(&format!("{}def {}(self, x):\n", indent, f.name));
        for _ in 0..f.branches {
            out.push_str(&format!("{}    if x:\n{}        x = x - 1\n", indent, indent));
        }
        out.push_str(&format!("{}    return x\n\n", indent));
    }
    out
}

fn rust_source(fns: &[GenFn]) -> String {
    let mut out = String::from("use std::fmt;\n\n");
    for f in fns {
        out.push_str(&format!("fn {}(x: i32) -> i32 {{\n    let mut y = x;\n", f.name));
        for _ in 0..f.branches {
            out.push_str("    if y > 0 {\n        y -= 1;\n    }\n");
        }
        out.push_str("    y\n}\n\n");
    }
    out
}

fn elements_of(path: &str, source: &str) -> (Vec<CodeElement>, Vec<Vec<usize>>) {
    let registry = PluginRegistry::default();
    let plugin = registry.resolve(path, None).unwrap();
    let unit = Arc::new(SourceUnit::new(path, source, plugin.id()));
    let parsed = plugin.parse(unit).unwrap();
    let claimed = ElementCategory::ALL
        .iter()
        .map(|c| extract(&parsed, &plugin, *c, DEFAULT_MAX_DOC_LINES).claimed)
        .collect();
    let all = extract_all(&parsed, &plugin, &ElementCategory::ALL, DEFAULT_MAX_DOC_LINES);
    (all.elements, claimed)
}

fn functions(elements: &[CodeElement]) -> Vec<&CodeElement> {
    elements
        .iter()
        .filter(|e| e.category == ElementCategory::Function)
        .collect()
}

const TERMS: &[&str] = &[
    "kind=function",
    "kind=method",
    "name=~f0_*",
    "name!=f1_a",
    "params>=1",
    "params<2",
    "public=true",
    "static=false",
];

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn test_python_functions_are_found_with_complexity(fns in gen_fns(), in_class in any::<bool>()) {
        let source = python_source(&fns, in_class);
        let (elements, claimed) = elements_of("gen.py", &source);

        let found = functions(&elements);
        prop_assert_eq!(found.len(), fns.len());
        for (element, generated) in found.iter().zip(&fns) {
            prop_assert_eq!(&element.name, &generated.name);
            prop_assert_eq!(element.complexity, Some(1 + generated.branches));
            if in_class {
                prop_assert_eq!(element.parent.as_deref(), Some("Holder"));
            }
        }
        for element in &elements {
            prop_assert!(element.span_is_consistent());
        }
        for ids in claimed {
            let unique: HashSet<usize> = ids.iter().copied().collect();
            prop_assert_eq!(unique.len(), ids.len());
        }
    }

    #[test]
    fn test_rust_extraction_is_stable(fns in gen_fns()) {
        let source = rust_source(&fns);
        let (first, _) = elements_of("gen.rs", &source);
        let (second, _) = elements_of("gen.rs", &source);
        prop_assert_eq!(&first, &second);

        let found = functions(&first);
        prop_assert_eq!(found.len(), fns.len());
        for (element, generated) in found.iter().zip(&fns) {
            prop_assert_eq!(element.complexity, Some(1 + generated.branches));
        }
        prop_assert!(first.iter().any(|e| e.category == ElementCategory::Import));
    }

    #[test]
    fn test_chained_filters_intersect(
        fns in gen_fns(),
        left in prop::sample::select(TERMS),
        right in prop::sample::select(TERMS),
    ) {
        let (elements, _) = elements_of("gen.py", &python_source(&fns, true));

        let everything = FilterChain::all();
        prop_assert!(elements.iter().all(|e| everything.matches_element(e)));

        let a = FilterChain::parse(left).unwrap();
        let b = FilterChain::parse(right).unwrap();
        let chained = a.clone().and(b.clone());
        let joined = FilterChain::parse(&format!("{},{}", left, right)).unwrap();
        for element in &elements {
            let expected = a.matches_element(element) && b.matches_element(element);
            prop_assert_eq!(chained.matches_element(element), expected);
            prop_assert_eq!(joined.matches_element(element), expected);
        }
    }
}
