use ::{
    itertools::Itertools,
    yieldlog_term::{compare, sort_unique, term_less_than, Atom, Term},
};

fn show(terms: &[Term]) -> String {
    terms.iter().map(|t| t.quoted().to_string()).join(", ")
}

#[test]
fn bindings_show_through_every_view() {
    let (x, y) = (Term::var(), Term::var());
    let pair = Term::functor2("pair", x.clone(), Term::list(vec![y.clone(), Term::int(2)]));
    assert!(!pair.ground());
    assert_eq!(pair.variables().len(), 2);

    y.as_var().unwrap().set_binding(x.clone());
    assert_eq!(pair.variables(), vec![x.as_var().unwrap()]);

    x.as_var().unwrap().set_binding(Term::atom("Hello"));
    assert!(pair.ground());
    assert_eq!(pair.to_string(), "pair(Hello, [Hello, 2])");
    assert_eq!(pair.quoted().to_string(), "pair('Hello', ['Hello', 2])");
    assert!(pair.term_equal(&pair.resolved()));

    x.as_var().unwrap().clear_binding();
    assert!(y.value().is_var());
    assert!(!pair.ground());
}

#[test]
fn standard_order_sorts_mixed_terms() {
    let v = Term::var();
    let mut terms = vec![
        Term::functor2("f", Term::int(1), Term::int(2)),
        Term::string("text"),
        Term::atom("b"),
        Term::float(1.5),
        Term::functor1("g", Term::int(9)),
        Term::int(1),
        v.clone(),
        Term::atom("a"),
        Term::int(1),
        Term::functor1("f", Term::int(3)),
    ];
    sort_unique(&mut terms);

    assert_eq!(terms[0], v);
    assert_eq!(
        show(&terms[1..]),
        "a, b, f(3), g(9), f(1, 2), 1, 1.5, \"text\""
    );
    for (a, b) in terms.iter().tuple_windows() {
        assert!(term_less_than(a, b));
        assert!(!term_less_than(b, a));
    }
}

#[test]
fn qualified_names_keep_their_module() {
    let module = Atom::a("lists");
    let last = Atom::with_module("last", &module);
    let goal = Term::functor2(last.clone(), Term::var(), Term::var());

    let (name, arity) = goal.name_arity().unwrap();
    assert_eq!(arity, 2);
    assert_eq!(name.module(), Some(module));
    assert!(goal.is_functor(&Atom::a("last"), 2));
    assert_eq!(compare(&Term::Atom(last), &Term::atom("last")), std::cmp::Ordering::Equal);
}

#[test]
fn partial_lists_are_not_lists() {
    let tail = Term::var();
    let partial = Term::list_with_tail(vec![Term::int(1)], tail.clone());
    assert_eq!(partial.list_items(), None);
    assert_eq!(partial.to_string(), format!("[1|{}]", tail));

    tail.as_var().unwrap().set_binding(Term::nil());
    assert_eq!(partial.list_items(), Some(vec![Term::int(1)]));
}
