use ::{
    itertools::Itertools,
    yieldlog::{prelude::*, OutputBuffer},
};

fn brother(a: Term, b: Term) -> Term {
    Term::functor2("brother", a, b)
}

fn family() -> Machine {
    let mut machine = Machine::new();
    for &(a, b) in &[("hillary", "hugh"), ("hillary", "tony")] {
        machine
            .database
            .assert(&brother(Term::atom(a), Term::atom(b)), Position::Last)
            .unwrap();
    }
    machine
}

fn show(terms: &[Term]) -> String {
    terms.iter().map(|t| t.to_string()).join(", ")
}

#[test]
fn asserted_facts_come_back_in_order() {
    let mut machine = family();
    let x = Term::var();
    let goal = brother(Term::atom("hillary"), x.clone());

    let mut session = machine.query(&goal);
    assert_eq!(session.resume().unwrap(), Yield::Solution);
    assert_eq!(x.value(), Term::atom("hugh"));
    assert_eq!(session.resume().unwrap(), Yield::Solution);
    assert_eq!(x.value(), Term::atom("tony"));
    assert_eq!(session.resume().unwrap(), Yield::NoMoreSolutions);
    assert!(x.is_var());
}

#[test]
fn findall_over_member() {
    let mut machine = Machine::new();
    let (x, l) = (Term::var(), Term::var());
    let numbers = Term::list(vec![Term::int(1), Term::int(2), Term::int(3)]);
    let goal = Term::functor3(
        "findall",
        x.clone(),
        Term::functor2("member", x, numbers.clone()),
        l.clone(),
    );

    let found = machine.find_all(&l, &goal).unwrap();
    assert_eq!(found, vec![numbers]);
    assert_eq!(show(&found), "[1, 2, 3]");
}

#[test]
fn negation_of_a_missing_fact_succeeds() {
    let mut machine = family();
    let goal = Term::functor1("\\+", brother(Term::atom("chelsea"), Term::var()));
    assert!(machine.succeeds(&goal).unwrap());

    let goal = Term::functor1("\\+", brother(Term::atom("hillary"), Term::var()));
    assert!(!machine.succeeds(&goal).unwrap());
}

#[test]
fn catch_unifies_the_ball() {
    let mut machine = Machine::new();
    let x = Term::var();
    let goal = Term::functor3(
        "catch",
        Term::functor1("throw", Term::functor1("my_error", Term::int(1))),
        Term::functor1("my_error", x.clone()),
        Term::atom("true"),
    );
    assert_eq!(machine.find_all(&x, &goal).unwrap(), vec![Term::int(1)]);
}

#[test]
fn retract_then_requery() {
    let mut machine = family();
    let retract = Term::functor1(
        "retract",
        brother(Term::atom("hillary"), Term::atom("hugh")),
    );
    assert!(machine.succeeds(&retract).unwrap());

    let x = Term::var();
    let goal = brother(Term::atom("hillary"), x.clone());
    assert_eq!(machine.find_all(&x, &goal).unwrap(), vec![Term::atom("tony")]);
}

#[test]
fn if_then_else_commits_to_then() {
    let mut machine = Machine::new();
    let (x, y) = (Term::var(), Term::var());
    let goal = Term::functor2(
        ";",
        Term::functor2(
            "->",
            Term::functor2("=", x.clone(), Term::int(1)),
            Term::functor2("=", y.clone(), Term::atom("a")),
        ),
        Term::functor2("=", y.clone(), Term::atom("b")),
    );
    assert_eq!(machine.find_all(&y, &goal).unwrap(), vec![Term::atom("a")]);
    assert!(x.is_var() && y.is_var());
}

#[test]
fn unknown_procedure_is_an_existence_error() {
    let mut machine = Machine::new();
    let error = machine
        .succeeds(&Term::functor1("no_such_thing", Term::int(1)))
        .unwrap_err();
    let info = error
        .exception()
        .and_then(|e| e.existence_error_info())
        .unwrap();
    assert_eq!(info.procedure(), Some((Atom::a("no_such_thing"), 1)));
}

#[test]
fn rules_and_facts_mix_in_one_predicate() {
    let mut machine = family();
    let (a, b, c) = (Term::var(), Term::var(), Term::var());
    let rule = Term::functor2(
        ":-",
        Term::functor2("sibling", a.clone(), b.clone()),
        Term::functor2(
            ",",
            brother(c.clone(), a),
            Term::functor2(",", brother(c, b.clone()), Term::atom("true")),
        ),
    );
    machine.database.assert(&rule, Position::Last).unwrap();
    machine
        .database
        .assert(
            &Term::functor2("sibling", Term::atom("bill"), Term::atom("roger")),
            Position::Last,
        )
        .unwrap();

    let (x, y) = (Term::var(), Term::var());
    let pair = Term::list(vec![x.clone(), y.clone()]);
    let found = machine
        .find_all(&pair, &Term::functor2("sibling", x, y))
        .unwrap();
    assert_eq!(
        show(&found),
        "[hugh, hugh], [hugh, tony], [tony, hugh], [tony, tony], [bill, roger]"
    );
}

#[test]
fn output_is_captured() {
    let buffer = OutputBuffer::new();
    let mut machine = Machine::with_output(Box::new(buffer.clone()));
    let x = Term::var();
    let goal = Term::functor2(
        ",",
        Term::functor2(
            "member",
            x.clone(),
            Term::list(vec![Term::atom("a"), Term::atom("b")]),
        ),
        Term::functor2(",", Term::functor1("write", x), Term::atom("fail")),
    );
    assert!(!machine.succeeds(&goal).unwrap());
    assert_eq!(buffer.contents(), "ab");
}
