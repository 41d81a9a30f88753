//! Per-file extraction over real C++ snippets.

use std::path::Path;

use cxxgraph_analysis::call_graph::{CallGraph, MetafunctionKind, Provenance};
use cxxgraph_analysis::extraction::{FrontendCapabilities, SourceExtractor};
use cxxgraph_core::config::AnalysisConfig;

fn extract(source: &str) -> CallGraph {
    let mut extractor = SourceExtractor::new(AnalysisConfig::default()).unwrap();
    extractor.analyze_source(Path::new("snippet.cpp"), source).unwrap()
}

#[test]
fn test_enable_if_marks_sfinae() {
    let graph = extract(
        r#"
#include <type_traits>

template <typename T, typename = std::enable_if_t<std::is_integral<T>::value>>
T twice(T value) {
    return value * 2;
}
"#,
    );
    let twice = graph.get_function("twice").unwrap();
    assert!(twice.is_template);
    assert!(twice.has_sfinae);
    assert!(twice.sfinae_techniques.iter().any(|t| t == "enable_if"));
    assert_eq!(twice.template_params.first().map(String::as_str), Some("T"));
}

#[test]
fn test_non_template_is_never_sfinae() {
    let graph = extract("int plain(int x) { return x; }");
    let plain = graph.get_function("plain").unwrap();
    assert!(!plain.has_sfinae);
    assert!(plain.sfinae_techniques.is_empty());
}

#[test]
fn test_same_file_calls_are_qualified() {
    let graph = extract(
        r#"
namespace geo {
double square(double x) { return x * x; }

class Circle {
public:
    double area() const { return 3.14 * square(radius_); }
private:
    double radius_;
};
}
"#,
    );
    let area = graph.get_function("geo::Circle::area").unwrap();
    assert!(area.is_member);
    assert!(area.is_const);
    assert_eq!(area.class_name.as_deref(), Some("geo::Circle"));
    assert_eq!(area.access_specifier.as_deref(), Some("public"));
    assert!(area.calls.iter().any(|c| c == "geo::square"));

    let square = graph.get_function("geo::square").unwrap();
    assert_eq!(square.namespace, "geo");
    assert_eq!(square.called_by, vec!["geo::Circle::area".to_string()]);
    assert!(graph.dangling_callees().is_empty());
}

#[test]
fn test_unknown_callees_become_missing() {
    let graph = extract(
        r#"
int calculate() {
    return add(1, 2);
}
"#,
    );
    let calculate = graph.get_function("calculate").unwrap();
    assert_eq!(calculate.calls, vec!["add".to_string()]);
    assert!(graph.is_missing("add"));

    let site = &calculate.call_sites[0];
    assert_eq!(site.provenance, Provenance::Structural);
    assert_eq!(site.arg_count, Some(2));
    assert_eq!(site.arg_types.as_slice(), ["int".to_string(), "int".to_string()]);
}

#[test]
fn test_template_parameter_construction_is_not_a_call() {
    let graph = extract(
        r#"
template <typename T>
struct Box {
    T get() const { return T(); }
    T copy(T other) const { return T(other); }
};

template <typename U>
U make(U seed) {
    prepare();
    return U(seed);
}
"#,
    );
    let get = graph.get_function("Box::get").unwrap();
    assert!(get.calls.is_empty(), "{:?}", get.calls);
    let copy = graph.get_function("Box::copy").unwrap();
    assert!(copy.calls.is_empty(), "{:?}", copy.calls);
    let make = graph.get_function("make").unwrap();
    assert_eq!(make.calls, vec!["prepare".to_string()]);
    assert!(!graph.is_missing("T"));
    assert!(!graph.is_missing("U"));
}

#[test]
fn test_direct_initialized_local_is_not_a_call() {
    let graph = extract(
        r#"
void user() {
    a::b::Widget w(3);
    helper();
}
"#,
    );
    let user = graph.get_function("user").unwrap();
    assert!(!user.calls.iter().any(|c| c == "w"), "{:?}", user.calls);
    assert!(user.calls.iter().any(|c| c == "helper"));
    assert!(!graph.is_missing("w"));
}

#[test]
fn test_virtual_and_override_flags() {
    let graph = extract(
        r#"
struct Base {
    virtual void run() {}
    void helper() {}
};

struct Derived : Base {
    void run() override {}
};
"#,
    );
    assert!(graph.get_function("Base::run").unwrap().is_virtual);
    assert!(!graph.get_function("Base::helper").unwrap().is_virtual);
    assert!(graph.get_function("Derived::run").unwrap().is_virtual);
}

#[test]
fn test_special_members() {
    let graph = extract(
        r#"
class Vec {
public:
    Vec() {}
    ~Vec() {}
    Vec& operator+=(const Vec& other) { return *this; }
    static Vec zero() { return Vec(); }
};
"#,
    );
    assert!(graph.get_function("Vec::Vec").unwrap().is_constructor);
    assert!(graph.get_function("Vec::~Vec").unwrap().is_destructor);
    assert!(graph.get_function("Vec::operator+=").unwrap().is_operator);
    let zero = graph.get_function("Vec::zero").unwrap();
    assert!(zero.is_static);
    assert!(!zero.is_constructor);
}

#[test]
fn test_out_of_line_method_definition() {
    let graph = extract(
        r#"
namespace app {
class Worker {
public:
    void start();
};

void Worker::start() {}
}
"#,
    );
    let start = graph.get_function("app::Worker::start").unwrap();
    assert!(start.is_definition);
    assert_eq!(start.namespace, "app");
}

#[test]
fn test_variadic_template_with_fold() {
    let graph = extract(
        r#"
template <typename... Args>
auto sum(Args... args) {
    return (args + ...);
}
"#,
    );
    let sum = graph.get_function("sum").unwrap();
    assert!(sum.has_variadic_templates);
    assert_eq!(sum.variadic_template_param.as_deref(), Some("Args"));
    assert!(sum.has_fold_expression);
}

#[test]
fn test_value_trait_and_partial_specialization() {
    let graph = extract(
        r#"
template <typename T, typename U>
struct is_same {
    static constexpr bool value = false;
};

template <typename T>
struct is_same<T, T> {
    static constexpr bool value = true;
};
"#,
    );
    let primary = graph.get_function("is_same").unwrap();
    assert!(primary.is_metafunction);
    assert_eq!(primary.metafunction_kind, Some(MetafunctionKind::ValueTrait));
    assert!(!primary.partial_specialization);

    let partial = graph.get_function("is_same<T, T>").unwrap();
    assert!(partial.partial_specialization);
    assert_eq!(partial.primary_template.as_deref(), Some("is_same"));
    assert!(primary.specializations.iter().any(|s| s == "is_same<T, T>"));
}

#[test]
fn test_textual_strategy_fills_capability_gaps() {
    let mut extractor = SourceExtractor::new(AnalysisConfig::default())
        .unwrap()
        .with_capabilities(FrontendCapabilities::textual_only());
    let graph = extractor
        .analyze_source(
            Path::new("snippet.cpp"),
            r#"
void drive(Engine& engine) {
    engine.ignite();
}
"#,
        )
        .unwrap();
    let drive = graph.get_function("drive").unwrap();
    assert!(drive.calls.iter().any(|c| c == "ignite"));
    let site = drive.call_sites.iter().find(|s| s.target == "ignite").unwrap();
    assert_eq!(site.provenance, Provenance::Heuristic);
}

#[test]
fn test_unreadable_file_yields_empty_graph() {
    let mut extractor = SourceExtractor::new(AnalysisConfig::default()).unwrap();
    let graph = extractor.analyze(Path::new("/nonexistent/cxxgraph/missing.cpp"), &[], &[]);
    assert!(graph.is_empty());
    assert!(graph.missing_functions().is_empty());
}

#[test]
fn test_oversized_file_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("big.cpp");
    std::fs::write(&path, "void f() {}\n".repeat(64)).unwrap();
    let config = AnalysisConfig {
        max_file_size: Some(16),
        ..Default::default()
    };
    let mut extractor = SourceExtractor::new(config).unwrap();
    let err = extractor.try_analyze(&path, &[], &[]).unwrap_err();
    assert!(matches!(err, cxxgraph_core::errors::ParseError::FileTooLarge { .. }));
}
