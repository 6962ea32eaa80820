//! Integration tests for named and raw queries through the engine.

use std::sync::Arc;

use treescope::engine::{AnalysisEngine, AnalyzeRequest};
use treescope::error::ErrorKind;
use treescope::plugin::PluginRegistry;
use treescope::query::{QueryOptions, QueryRef};

fn engine() -> AnalysisEngine {
    AnalysisEngine::with_registry(Arc::new(PluginRegistry::default()))
}

#[test]
fn test_classes_query_returns_classes_in_source_order() {
    let source = "class First:\n    pass\n\n\ndef between():\n    pass\n\n\nclass Second:\n    pass\n";
    let result = engine()
        .analyze(&AnalyzeRequest::new("two.py", source).query(QueryRef::named("classes")))
        .unwrap();

    let names: Vec<&str> = result
        .query_results
        .iter()
        .filter_map(|r| r.name.as_deref())
        .collect();
    assert_eq!(names, vec!["First", "Second"]);
    assert!(result.query_results[0].span.start_line < result.query_results[1].span.start_line);
}

#[test]
fn test_functions_query_for_each_language() {
    let cases: &[(&str, &str, &str)] = &[
        ("a.py", "def alpha():\n    pass\n", "alpha"),
        ("a.rs", "fn alpha() {}\n", "alpha"),
        ("a.go", "package main\n\nfunc alpha() {}\n", "alpha"),
        ("a.js", "function alpha() {}\n", "alpha"),
        ("a.ts", "function alpha(): void {}\n", "alpha"),
        ("a.c", "int alpha(void) { return 0; }\n", "alpha"),
        ("a.java", "class A { void alpha() {} }\n", "alpha"),
        ("a.rb", "def alpha\nend\n", "alpha"),
        ("a.sh", "alpha() {\n  echo hi\n}\n", "alpha"),
    ];
    let engine = engine();
    for (file, source, expected) in cases {
        let result = engine
            .analyze(&AnalyzeRequest::new(*file, *source).query(QueryRef::named("functions")))
            .unwrap_or_else(|e| panic!("{}: {}", file, e));
        let names: Vec<&str> = result
            .query_results
            .iter()
            .filter_map(|r| r.name.as_deref())
            .collect();
        assert!(names.contains(expected), "{}: expected {} in {:?}", file, expected, names);
    }
}

#[test]
fn test_raw_query_with_owner_filter() {
    let source = r#"
class Service:
    def start(self):
        log("start")

    def stop(self):
        log("stop")


def main():
    log("main")
"#;
    let request = AnalyzeRequest::new("svc.py", source)
        .query(QueryRef::raw("(call function: (identifier) @name) @call"))
        .filter("kind=method");
    let result = engine().analyze(&request).unwrap();
    let owners: Vec<&str> = result
        .query_results
        .iter()
        .filter_map(|r| r.element.as_ref().map(|e| e.name.as_str()))
        .collect();
    assert_eq!(owners, vec!["start", "stop"]);
}

#[test]
fn test_query_limit_and_capture_options() {
    let source = "def a():\n    pass\n\ndef b():\n    pass\n\ndef c():\n    pass\n";
    let mut request = AnalyzeRequest::new("abc.py", source).query(QueryRef::named("functions"));
    request.query_options = QueryOptions {
        capture: Some("name".to_string()),
        limit: Some(2),
        ..QueryOptions::default()
    };
    let result = engine().analyze(&request).unwrap();
    let texts: Vec<&str> = result.query_results.iter().map(|r| r.text.as_str()).collect();
    assert_eq!(texts, vec!["a", "b"]);
}

#[test]
fn test_query_errors_are_classified() {
    let engine = engine();
    let base = AnalyzeRequest::new("x.py", "x = 1\n");

    let err = engine
        .analyze(&base.clone().query(QueryRef::named("nope")))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnsupportedQuery);
    assert_eq!(err.identifier(), Some("nope"));

    let err = engine
        .analyze(&base.clone().query(QueryRef::raw("((identifier) @id")))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::QuerySyntax);

    let err = engine
        .analyze(&base.query(QueryRef::raw("(not_a_python_node) @n")))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CaptureProcessing);
}

#[test]
fn test_query_results_are_cached() {
    let engine = engine();
    let request = AnalyzeRequest::new("q.py", "def f():\n    pass\n").query(QueryRef::named("functions"));
    let first = engine.analyze(&request).unwrap();
    let second = engine.analyze(&request).unwrap();
    assert_eq!(first.query_results, second.query_results);
    assert_eq!(engine.stats().parses, 1);
}
