use angle_name::Namespaces;
use angle_xml::Forest;
use angle_xpath::{parse, Atomic, CompileOptions, Context, Environment, Evaluator, Sequence};

fn eval(doc_text: &str, query: &str) -> (Forest, Sequence) {
    let mut forest = Forest::new();
    let doc = forest.parse(doc_text).unwrap();
    let expr = parse(query, &Namespaces::default(), &CompileOptions::default()).unwrap();
    let mut env = Environment::new();
    let mut evaluator = Evaluator::new(&forest, &mut env);
    let result = evaluator.evaluate(&expr, &Context::new(doc)).unwrap();
    (forest, result)
}

fn eval_atomic(doc_text: &str, query: &str) -> Atomic {
    let (_, result) = eval(doc_text, query);
    result.one().unwrap().to_atomic().unwrap()
}

#[test]
fn scenario_sum() {
    assert_eq!(
        eval_atomic("<r><n>1</n><n>2</n><n>3</n></r>", "sum(/r/n)").string_value(),
        "6"
    );
    assert_eq!(
        eval_atomic("<r><n>1</n><n>2</n><n>3</n></r>", "sum(/r/n) = 6"),
        Atomic::Boolean(true)
    );
}

#[test]
fn scenario_count_descendants() {
    assert_eq!(
        eval_atomic("<a><b><c/></b><b><c/><c/></b></a>", "count(//c)"),
        Atomic::Integer(3)
    );
}

#[test]
fn scenario_some_satisfies() {
    assert_eq!(
        eval_atomic("<r/>", "some $x in (1, 2, 3) satisfies $x mod 2 = 0"),
        Atomic::Boolean(true)
    );
}

#[test]
fn invariant_descendants_document_order_once_each() {
    let (forest, result) = eval("<a><b><c/></b><b><c/><c/></b></a>", "//*");
    let mut nodes = result.nodes().unwrap();
    let original = nodes.clone();
    forest.sort_document_order(&mut nodes);
    assert_eq!(nodes, original);
    assert_eq!(nodes.len(), 6);
}

#[test]
fn invariant_parent_integrity() {
    let (forest, result) = eval("<a><b><c/></b></a>", "//* | //@* | /a/b/c/ancestor::*");
    for item in result.iter() {
        let node = item.to_node().unwrap();
        let top = forest.top(node);
        assert!(forest.is_document(top));
    }
}

#[test]
fn invariant_union_idempotent() {
    let (_, single) = eval("<r><a/><b/></r>", "/r/*");
    let (_, doubled) = eval("<r><a/><b/></r>", "/r/* | /r/*");
    assert_eq!(single.len(), doubled.len());
}

#[test]
fn invariant_except_intersect_symmetry() {
    // (A intersect B) union (A except B) = A
    let (_, a) = eval("<r><a/><b/><c/></r>", "/r/*");
    let (_, recombined) = eval(
        "<r><a/><b/><c/></r>",
        "(/r/* intersect /r/b) union (/r/* except /r/b)",
    );
    assert_eq!(a, recombined);
    // (A except B) intersect B is empty
    let (_, empty) = eval("<r><a/><b/><c/></r>", "(/r/* except /r/b) intersect /r/b");
    assert!(empty.is_empty());
}

#[test]
fn invariant_predicate_indexing() {
    let doc = "<r><n>1</n><n>2</n><n>3</n></r>";
    let (forest, first) = eval(doc, "/r/n[1]");
    assert_eq!(first.string_join(&forest, ","), "1");
    let (forest, last) = eval(doc, "/r/n[last()]");
    assert_eq!(last.string_join(&forest, ","), "3");
    let (forest, by_count) = eval(doc, "/r/n[position() = count(/r/n)]");
    assert_eq!(by_count.string_join(&forest, ","), "3");
    let (_, none) = eval(doc, "/r/n[7]");
    assert!(none.is_empty());
}

#[test]
fn invariant_cast_stability() {
    assert_eq!(
        eval_atomic("<r/>", "(3 cast as xs:integer) = 3"),
        Atomic::Boolean(true)
    );
    assert_eq!(
        eval_atomic("<r/>", "'nope' castable as xs:integer"),
        Atomic::Boolean(false)
    );
    let mut forest = Forest::new();
    let doc = forest.parse("<r/>").unwrap();
    let expr = parse(
        "'nope' cast as xs:integer",
        &Namespaces::default(),
        &CompileOptions::default(),
    )
    .unwrap();
    let mut env = Environment::new();
    let mut evaluator = Evaluator::new(&forest, &mut env);
    assert!(evaluator
        .evaluate(&expr, &Context::new(doc))
        .is_err());
}

#[test]
fn scenario_nested_quantifier() {
    assert_eq!(
        eval_atomic(
            "<r/>",
            "some $x in (1, 2), $y in (10, 20) satisfies $x + $y = 22"
        ),
        Atomic::Boolean(true)
    );
    assert_eq!(
        eval_atomic(
            "<r/>",
            "every $x in (1, 2), $y in (10, 20) satisfies $x + $y < 23"
        ),
        Atomic::Boolean(true)
    );
}

#[test]
fn scenario_string_functions() {
    assert_eq!(
        eval_atomic("<r><n>hello</n></r>", "upper-case(/r/n)"),
        Atomic::from("HELLO")
    );
    assert_eq!(
        eval_atomic("<r/>", "string-join(tokenize('a b  c'), '-')"),
        Atomic::from("a-b-c")
    );
    assert_eq!(
        eval_atomic("<r/>", "substring('12345', 2, 3)"),
        Atomic::from("234")
    );
    assert_eq!(
        eval_atomic("<r/>", "matches('banana', '^b.*a$')"),
        Atomic::Boolean(true)
    );
}

#[test]
fn scenario_distinct_values_mixed_numbers() {
    let (forest, result) = eval("<r/>", "distinct-values((1, 2, 1.0, '1', 2))");
    // 1 and 1.0 collapse; the string '1' stays distinct
    assert_eq!(result.len(), 3);
    assert_eq!(result.string_join(&forest, ","), "1,2,1");
}
