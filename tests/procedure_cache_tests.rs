use querycore::catalog::{Procedure, ProcedureCache, ProcedureParam};
use querycore::DataType;

fn params(n: usize) -> Vec<ProcedureParam> {
    (0..n)
        .map(|i| ProcedureParam::new(format!("p{}", i), DataType::Int64))
        .collect()
}

fn foo_overloads(cache: &ProcedureCache) {
    cache.register("d", Procedure::new("foo", params(1), "BEGIN END"));
    cache.register("d", Procedure::new("foo", params(2), "BEGIN END"));
    cache.register("d", Procedure::new("foo", params(3), "BEGIN END"));

    let mut variadic = params(1);
    variadic.push(ProcedureParam::new("rest", DataType::Text).variadic());
    cache.register("d", Procedure::new("foo", variadic, "BEGIN END"));
}

#[test]
fn test_exact_arity_wins() {
    let cache = ProcedureCache::new();
    foo_overloads(&cache);

    let found = cache.get("d", "foo", 2).unwrap();
    assert_eq!(found.params.len(), 2);
    assert!(!found.has_variadic_parameter());
}

#[test]
fn test_fallback_prefers_variadic_and_ignores_case() {
    let cache = ProcedureCache::new();
    foo_overloads(&cache);

    let found = cache.get("D", "FOO", 5).unwrap();
    assert!(found.has_variadic_parameter());
}

#[test]
fn test_fallback_without_variadic_takes_most_params() {
    let cache = ProcedureCache::new();
    cache.register("d", Procedure::new("bar", params(1), "BEGIN END"));
    cache.register("d", Procedure::new("bar", params(4), "BEGIN END"));

    assert_eq!(cache.get("d", "bar", 0).unwrap().params.len(), 4);
    assert_eq!(cache.get("d", "bar", 9).unwrap().params.len(), 4);
}

#[test]
fn test_missing_lookups() {
    let cache = ProcedureCache::new();
    foo_overloads(&cache);

    assert!(cache.get("other", "foo", 1).is_none());
    assert!(cache.get("d", "baz", 1).is_none());
}

#[test]
fn test_register_same_arity_overwrites() {
    let cache = ProcedureCache::new();
    cache.register("d", Procedure::new("foo", params(1), "BEGIN SELECT 1; END"));
    cache.register("d", Procedure::new("FOO", params(1), "BEGIN SELECT 2; END"));

    assert_eq!(cache.len(), 1);
    assert_eq!(cache.get("d", "foo", 1).unwrap().body, "BEGIN SELECT 2; END");
}

#[test]
fn test_all_for_database_sorted() {
    let cache = ProcedureCache::new();
    cache.register("d", Procedure::new("zeta", params(0), "BEGIN END"));
    cache.register("d", Procedure::new("alpha", params(2), "BEGIN END"));
    cache.register("d", Procedure::new("alpha", params(1), "BEGIN END"));
    cache.register("e", Procedure::new("beta", params(0), "BEGIN END"));

    let listed: Vec<(String, usize)> = cache
        .all_for_database("D")
        .iter()
        .map(|p| (p.name.clone(), p.params.len()))
        .collect();
    assert_eq!(
        listed,
        vec![
            ("alpha".to_string(), 1),
            ("alpha".to_string(), 2),
            ("zeta".to_string(), 0)
        ]
    );
    assert!(cache.all_for_database("missing").is_empty());
}

#[test]
fn test_unregister_drops_every_overload() {
    let cache = ProcedureCache::new();
    foo_overloads(&cache);
    cache.register("d", Procedure::new("keep", params(0), "BEGIN END"));

    assert_eq!(cache.unregister("D", "Foo"), 4);
    assert!(cache.get("d", "foo", 1).is_none());
    assert_eq!(cache.len(), 1);
    assert_eq!(cache.unregister("d", "foo"), 0);
}

#[test]
fn test_concurrent_register_and_get() {
    use std::sync::Arc;
    use std::thread;

    let cache = Arc::new(ProcedureCache::new());
    let handles: Vec<_> = (0..8)
        .map(|i| {
            let cache = cache.clone();
            thread::spawn(move || {
                cache.register("d", Procedure::new(format!("p{}", i), params(i), "BEGIN END"));
                assert!(cache.get("d", &format!("p{}", i), i).is_some());
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(cache.all_for_database("d").len(), 8);
}
