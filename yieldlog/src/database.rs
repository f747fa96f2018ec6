//! The predicate registry: name/arity to an ordered list of clauses.
//!
//! Ground facts live in [`IndexedAnswers`] stores; anything else is kept as a
//! copied head and body. Clause lists are persistent vectors, so a caller that
//! takes a snapshot keeps iterating the clauses as they were, whatever gets
//! asserted or retracted in the meantime.

use crate::{
    copy::CopyStore,
    error::{PrologException, Result},
    flags::MAX_ARITY,
    indexed::{Answer, AnswerMatches, IndexedAnswers},
    session::builtins::is_system_predicate,
    trail::{Point, Trail},
};

use ::{
    derive_new::new,
    im::{HashMap as ImHashMap, Vector},
    std::{cell::RefCell, fmt, rc::Rc},
    yieldlog_term::{atom, Atom, Term},
};

/// `Name/Arity`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, new)]
pub struct PredicateKey {
    pub name: Atom,
    pub arity: usize,
}

impl PredicateKey {
    /// The key of a callable term.
    pub fn of(term: &Term) -> Option<Self> {
        term.name_arity().map(|(name, arity)| Self::new(name, arity))
    }

    pub fn indicator(&self) -> Term {
        Term::indicator(&self.name, self.arity)
    }
}

impl fmt::Display for PredicateKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}/{}", self.name.to_quoted_string(), self.arity)
    }
}

/// A clause with variables, stored as a private copy of its head and body.
#[derive(Debug)]
pub struct ClauseHeadAndBody {
    head: Term,
    body: Term,
}

impl ClauseHeadAndBody {
    pub fn new(head: &Term, body: &Term) -> Self {
        let mut store = CopyStore::new();
        Self {
            head: store.make_copy(head),
            body: store.make_copy(body),
        }
    }

    pub fn head(&self) -> &Term {
        &self.head
    }

    pub fn body(&self) -> &Term {
        &self.body
    }

    /// A fresh copy of the clause, renamed apart from every other use.
    pub fn renamed(&self) -> (Term, Term) {
        let mut store = CopyStore::new();
        (store.make_copy(&self.head), store.make_copy(&self.body))
    }
}

#[derive(Debug, Clone)]
pub enum Clause {
    Facts(Rc<RefCell<IndexedAnswers>>),
    Rule(Rc<ClauseHeadAndBody>),
}

#[derive(Debug, Clone)]
pub struct Predicate {
    clauses: Vector<Clause>,
    dynamic: bool,
}

impl Predicate {
    fn new(dynamic: bool) -> Self {
        Self {
            clauses: Vector::new(),
            dynamic,
        }
    }

    /// A snapshot of the clause list.
    pub fn clauses(&self) -> Vector<Clause> {
        self.clauses.clone()
    }

    pub fn is_dynamic(&self) -> bool {
        self.dynamic
    }
}

/// Whether an update adds to the front or the back of a predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    First,
    Last,
}

#[derive(Debug, Clone, Default)]
pub struct Database {
    predicates: ImHashMap<PredicateKey, Predicate>,
}

/// Split `Head :- Body` into its parts, with `true` as the body of anything
/// else.
fn head_and_body(term: &Term) -> (Term, Term) {
    if term.is_functor(&atom::NECK, 2) {
        let args = term.functor_args();
        (args[0].value(), args[1].value())
    } else {
        (term.value(), Term::Atom(atom::TRUE.clone()))
    }
}

fn callable_key(head: &Term, message: &str) -> Result<PredicateKey> {
    if head.is_var() {
        return Err(PrologException::instantiation_error("Head is an unbound variable").into());
    }
    PredicateKey::of(head)
        .ok_or_else(|| PrologException::type_error("callable", head, message).into())
}

fn check_body(body: &Term) -> Result<()> {
    if body.is_var() || body.is_callable() {
        Ok(())
    } else {
        Err(PrologException::type_error("callable", body, "Body is not callable").into())
    }
}

impl Database {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &PredicateKey) -> Option<&Predicate> {
        self.predicates.get(key)
    }

    pub fn contains(&self, key: &PredicateKey) -> bool {
        self.predicates.contains_key(key)
    }

    /// Every defined predicate, in no particular order.
    pub fn keys(&self) -> impl Iterator<Item = &PredicateKey> {
        self.predicates.keys()
    }

    /// The keys of dynamic predicates only, sorted.
    pub fn dynamic_keys(&self) -> Vec<PredicateKey> {
        let mut keys: Vec<_> = self
            .predicates
            .iter()
            .filter(|(_, predicate)| predicate.dynamic)
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort();
        keys
    }

    fn check_modifiable(&self, key: &PredicateKey, what: &str) -> Result<()> {
        let is_static = self.predicates.get(key).map_or(false, |p| !p.dynamic);
        if is_system_predicate(&key.name, key.arity) || is_static {
            return Err(PrologException::permission_error(
                "modify",
                "static_procedure",
                &key.indicator(),
                &format!("{} cannot modify static predicate {}", what, key),
            )
            .into());
        }
        Ok(())
    }

    fn entry(&mut self, key: &PredicateKey, dynamic: bool) -> &mut Predicate {
        self.predicates
            .entry(key.clone())
            .or_insert_with(|| Predicate::new(dynamic))
    }

    /// Mark a predicate as dynamic, defining it with no clauses if needed.
    pub fn declare_dynamic(&mut self, key: &PredicateKey) -> Result<()> {
        self.check_modifiable(key, "dynamic")?;
        self.entry(key, true);
        Ok(())
    }

    /// `asserta/1` and `assertz/1`.
    pub fn assert(&mut self, term: &Term, position: Position) -> Result<()> {
        if term.is_var() {
            return Err(
                PrologException::instantiation_error("Term to assert is an unbound variable")
                    .into(),
            );
        }

        let mut store = CopyStore::new();
        let copy = store.make_copy(term);
        let (head, body) = head_and_body(&copy);
        if body.is_var() {
            return Err(
                PrologException::instantiation_error("Body to assert is an unbound variable")
                    .into(),
            );
        }
        let key = callable_key(&head, "Term to assert is not callable")?;
        check_body(&body)?;
        self.check_modifiable(&key, "Assert")?;

        if store.n_unique_variables() == 0 && body.is_functor(&atom::TRUE, 0) {
            let args = head.functor_args();
            return match position {
                Position::First => self.prepend_fact(&key.name, &args),
                Position::Last => self.assert_fact(&key.name, &args),
            };
        }

        tracing::debug!(predicate = %key, ?position, "asserting clause");
        let clause = Clause::Rule(Rc::new(ClauseHeadAndBody::new(&head, &body)));
        let predicate = self.entry(&key, true);
        match position {
            Position::First => predicate.clauses.push_front(clause),
            Position::Last => predicate.clauses.push_back(clause),
        }
        Ok(())
    }

    /// Append a ground fact, reusing the last fact store of the predicate
    /// when it ends in one.
    pub fn assert_fact(&mut self, name: &Atom, values: &[Term]) -> Result<()> {
        let key = PredicateKey::new(name.clone(), values.len());
        tracing::debug!(predicate = %key, "asserting fact");
        let predicate = self.entry(&key, true);
        let store = match predicate.clauses.back() {
            Some(Clause::Facts(store)) => store.clone(),
            _ => {
                let store = Rc::new(RefCell::new(IndexedAnswers::new(values.len())));
                predicate.clauses.push_back(Clause::Facts(store.clone()));
                store
            }
        };
        let result = store.borrow_mut().add_answer(values);
        result
    }

    /// Prepend a ground fact, reusing the first fact store of the predicate
    /// when it starts with one.
    pub fn prepend_fact(&mut self, name: &Atom, values: &[Term]) -> Result<()> {
        let key = PredicateKey::new(name.clone(), values.len());
        tracing::debug!(predicate = %key, "prepending fact");
        let predicate = self.entry(&key, true);
        let store = match predicate.clauses.front() {
            Some(Clause::Facts(store)) => store.clone(),
            _ => {
                let store = Rc::new(RefCell::new(IndexedAnswers::new(values.len())));
                predicate.clauses.push_front(Clause::Facts(store.clone()));
                store
            }
        };
        let result = store.borrow_mut().prepend_answer(values);
        result
    }

    /// Add a clause to a static predicate. Used to load library code.
    pub fn add_static(&mut self, term: &Term) -> Result<()> {
        let (head, body) = head_and_body(term);
        let key = callable_key(&head, "Clause head is not callable")?;
        check_body(&body)?;
        let clause = Clause::Rule(Rc::new(ClauseHeadAndBody::new(&head, &body)));
        self.entry(&key, false).clauses.push_back(clause);
        Ok(())
    }

    /// Start `clause(Head, Body)`.
    pub fn clause(&self, head: &Term, body: &Term) -> Result<ClauseMatches> {
        let head = head.value();
        let key = callable_key(&head, "Head is not callable")?;
        let private = is_system_predicate(&key.name, key.arity)
            || self.predicates.get(&key).map_or(false, |p| !p.dynamic);
        if private {
            return Err(PrologException::permission_error(
                "access",
                "private_procedure",
                &key.indicator(),
                &format!("clause cannot access private predicate {}", key),
            )
            .into());
        }
        check_body(body)?;

        Ok(ClauseMatches::new(
            head,
            body.clone(),
            self.predicates
                .get(&key)
                .map(Predicate::clauses)
                .unwrap_or_default(),
        ))
    }

    /// Start `retract(Term)`. Each match must be passed back to
    /// [`Database::remove`] to take effect.
    pub fn retract(&self, term: &Term) -> Result<(PredicateKey, ClauseMatches)> {
        if term.is_var() {
            return Err(PrologException::instantiation_error(
                "Term to retract is an unbound variable",
            )
            .into());
        }

        let (head, body) = head_and_body(term);
        let key = callable_key(&head, "Head is not callable")?;
        self.check_modifiable(&key, "Retract")?;
        check_body(&body)?;

        let clauses = self
            .predicates
            .get(&key)
            .map(Predicate::clauses)
            .unwrap_or_default();
        Ok((key, ClauseMatches::new(head, body, clauses)))
    }

    /// Remove a clause found by [`Database::retract`].
    pub fn remove(&mut self, key: &PredicateKey, found: &ClauseMatch) {
        tracing::debug!(predicate = %key, "retracting clause");
        match found {
            ClauseMatch::Answer(store, answer) => {
                store.borrow_mut().remove(answer);
            }
            ClauseMatch::Rule(rule) => {
                if let Some(predicate) = self.predicates.get_mut(key) {
                    predicate.clauses.retain(|clause| match clause {
                        Clause::Rule(r) => !Rc::ptr_eq(r, rule),
                        Clause::Facts(_) => true,
                    });
                }
            }
        }
    }

    /// `retractall(Head)`. Only removing every clause is supported, so all of
    /// Head's arguments must be unbound. The predicate stays defined.
    pub fn retractall(&mut self, head: &Term) -> Result<()> {
        let head = head.value();
        let key = callable_key(&head, "Head is not callable")?;
        self.check_modifiable(&key, "Retractall")?;
        if head.functor_args().iter().any(|arg| !arg.is_var()) {
            return Err(PrologException::domain_error(
                "unbound_arguments",
                &head,
                "All arguments must be unbound to retract all clauses",
            )
            .into());
        }

        tracing::debug!(predicate = %key, "retracting all clauses");
        let mut predicate = Predicate::new(true);
        predicate
            .clauses
            .push_back(Clause::Facts(Rc::new(RefCell::new(IndexedAnswers::new(
                key.arity,
            )))));
        self.predicates.insert(key, predicate);
        Ok(())
    }

    /// `abolish(Name/Arity)`.
    pub fn abolish(&mut self, indicator: &Term) -> Result<()> {
        let key = predicate_indicator(indicator)?;
        if is_system_predicate(&key.name, key.arity)
            || self.predicates.get(&key).map_or(false, |p| !p.dynamic)
        {
            return Err(PrologException::permission_error(
                "modify",
                "static_procedure",
                &key.indicator(),
                &format!("Abolish cannot modify static predicate {}", key),
            )
            .into());
        }

        tracing::debug!(predicate = %key, "abolishing");
        self.predicates.remove(&key);
        Ok(())
    }
}

/// Decode a bound `Name/Arity` indicator.
pub fn predicate_indicator(indicator: &Term) -> Result<PredicateKey> {
    let indicator = indicator.value();
    if indicator.is_var() {
        return Err(
            PrologException::instantiation_error("Predicate indicator is an unbound variable")
                .into(),
        );
    }
    if !indicator.is_functor(&atom::SLASH, 2) {
        return Err(PrologException::type_error(
            "predicate_indicator",
            &indicator,
            "Must be a name/arity predicate indicator",
        )
        .into());
    }

    let args = indicator.functor_args();
    let (name, arity) = (args[0].value(), args[1].value());
    if name.is_var() || arity.is_var() {
        return Err(PrologException::instantiation_error(
            "Predicate indicator name or arity is an unbound variable",
        )
        .into());
    }
    let name = name.as_atom().ok_or_else(|| {
        PrologException::type_error("atom", &name, "Predicate indicator name must be an atom")
    })?;
    let arity_value = arity.as_int().ok_or_else(|| {
        PrologException::type_error("integer", &arity, "Predicate indicator arity must be an integer")
    })?;
    if arity_value < 0 {
        return Err(PrologException::domain_error(
            "not_less_than_zero",
            &arity,
            "Arity may not be less than zero",
        )
        .into());
    }
    if arity_value as usize > MAX_ARITY {
        return Err(PrologException::representation_error(
            "max_arity",
            &format!("Arity may not be greater than {}", MAX_ARITY),
        )
        .into());
    }

    Ok(PredicateKey::new(name, arity_value as usize))
}

/// One clause found by [`ClauseMatches`].
#[derive(Debug, Clone)]
pub enum ClauseMatch {
    Answer(Rc<RefCell<IndexedAnswers>>, Answer),
    Rule(Rc<ClauseHeadAndBody>),
}

/// A resumable walk over a snapshot of a predicate's clauses, unifying each
/// with a head and a body. Fact stores are scanned whole, with a body of
/// `true`.
#[derive(Debug)]
pub struct ClauseMatches {
    head: Term,
    body: Term,
    clauses: Vector<Clause>,
    next: usize,
    facts: Option<(Rc<RefCell<IndexedAnswers>>, AnswerMatches, Point)>,
    point: Option<Point>,
}

impl ClauseMatches {
    fn new(head: Term, body: Term, clauses: Vector<Clause>) -> Self {
        Self {
            head,
            body,
            clauses,
            next: 0,
            facts: None,
            point: None,
        }
    }

    /// Undo the previous match and find the next one.
    pub fn next(&mut self, trail: &mut Trail) -> Option<ClauseMatch> {
        if let Some(point) = self.point.take() {
            trail.unwind(point);
        }

        loop {
            if let Some((store, matches, point)) = &mut self.facts {
                // The caller may have unwound past the body binding since the
                // last answer, so it is made again each time.
                trail.unwind(*point);
                if trail.unify(&self.body, &Term::Atom(atom::TRUE.clone())) {
                    if let Some(answer) = matches.next_answer(trail) {
                        return Some(ClauseMatch::Answer(store.clone(), answer));
                    }
                }
                trail.unwind(*point);
                self.facts = None;
            }

            let clause = self.clauses.get(self.next)?.clone();
            self.next += 1;

            let point = trail.mark();
            match clause {
                Clause::Facts(store) => {
                    let matches = store.borrow().scan(&self.head.functor_args());
                    self.facts = Some((store, matches, point));
                }
                Clause::Rule(rule) => {
                    let (head, body) = rule.renamed();
                    if trail.unify(&self.head, &head) && trail.unify(&self.body, &body) {
                        self.point = Some(point);
                        return Some(ClauseMatch::Rule(rule));
                    }
                    trail.unwind(point);
                }
            }
        }
    }

    /// Undo any bindings still in effect and stop.
    pub fn close(&mut self, trail: &mut Trail) {
        if let Some((_, mut matches, point)) = self.facts.take() {
            matches.close(trail);
            trail.unwind(point);
        }
        if let Some(point) = self.point.take() {
            trail.unwind(point);
        }
        self.next = self.clauses.len();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn brother(a: &str, b: &str) -> Term {
        Term::functor2("brother", Term::atom(a), Term::atom(b))
    }

    fn kind_of(result: Result<()>) -> Term {
        result.unwrap_err().exception().unwrap().term().functor_args()[0].clone()
    }

    #[test]
    fn ground_facts_share_one_store() {
        let mut db = Database::new();
        db.assert(&brother("hillary", "hugh"), Position::Last).unwrap();
        db.assert(&brother("hillary", "tony"), Position::Last).unwrap();

        let key = PredicateKey::new(Atom::a("brother"), 2);
        let clauses = db.get(&key).unwrap().clauses();
        assert_eq!(clauses.len(), 1);
        match &clauses[0] {
            Clause::Facts(store) => assert_eq!(store.borrow().len(), 2),
            other => panic!("expected a fact store, got {:?}", other),
        }
        assert_eq!(db.dynamic_keys(), vec![key]);
    }

    #[test]
    fn rules_split_fact_stores() {
        let mut db = Database::new();
        let x = Term::var();
        db.assert(&brother("a", "b"), Position::Last).unwrap();
        db.assert(
            &Term::functor2(
                ":-",
                Term::functor2("brother", x.clone(), Term::atom("c")),
                Term::functor1("person", x.clone()),
            ),
            Position::Last,
        )
        .unwrap();
        db.assert(&brother("d", "e"), Position::Last).unwrap();
        db.assert(&brother("z", "z"), Position::First).unwrap();

        let key = PredicateKey::new(Atom::a("brother"), 2);
        let clauses = db.get(&key).unwrap().clauses();
        assert_eq!(clauses.len(), 3);
        assert!(matches!(clauses[1], Clause::Rule(_)));
    }

    #[test]
    fn clause_and_retract_walk_a_snapshot() {
        let mut db = Database::new();
        db.assert(&brother("hillary", "hugh"), Position::Last).unwrap();
        db.assert(&brother("hillary", "tony"), Position::Last).unwrap();

        let mut trail = Trail::new();
        let x = Term::var();
        let head = Term::functor2("brother", Term::atom("hillary"), x.clone());
        let (key, mut retraction) = db.retract(&head).unwrap();
        let found = retraction.next(&mut trail).unwrap();
        assert_eq!(x.value(), Term::atom("hugh"));
        db.remove(&key, &found);
        retraction.close(&mut trail);
        assert!(x.is_var());

        let body = Term::var();
        let mut clauses = db.clause(&head, &body).unwrap();
        assert!(clauses.next(&mut trail).is_some());
        assert_eq!(x.value(), Term::atom("tony"));
        assert_eq!(body.value(), Term::atom("true"));
        assert!(clauses.next(&mut trail).is_none());
        assert!(trail.is_empty());
    }

    #[test]
    fn retractall_requires_unbound_arguments() {
        let mut db = Database::new();
        db.assert(&brother("a", "b"), Position::Last).unwrap();
        assert_eq!(
            kind_of(db.retractall(&brother("a", "b"))),
            Term::functor2(
                "domain_error",
                Term::atom("unbound_arguments"),
                brother("a", "b")
            )
        );

        let head = Term::functor2("brother", Term::var(), Term::var());
        db.retractall(&head).unwrap();
        let key = PredicateKey::new(Atom::a("brother"), 2);
        assert!(db.contains(&key));
        db.retractall(&Term::functor1("unknown_yet", Term::var())).unwrap();
        assert!(db.contains(&PredicateKey::new(Atom::a("unknown_yet"), 1)));
    }

    #[test]
    fn system_predicates_are_protected() {
        let mut db = Database::new();
        let e = kind_of(db.assert(
            &Term::functor2("=", Term::atom("a"), Term::atom("a")),
            Position::Last,
        ));
        assert!(e.is_functor(&Atom::a("permission_error"), 3));

        assert!(db.clause(&Term::functor1("atom", Term::var()), &Term::var()).is_err());
        assert_eq!(
            kind_of(db.assert(&Term::int(3), Position::Last)),
            Term::functor2("type_error", Term::atom("callable"), Term::int(3))
        );
    }

    #[test]
    fn abolish_checks_its_indicator() {
        let mut db = Database::new();
        db.assert(&brother("a", "b"), Position::Last).unwrap();

        db.abolish(&Term::indicator(&Atom::a("brother"), 2)).unwrap();
        assert!(!db.contains(&PredicateKey::new(Atom::a("brother"), 2)));
        assert_eq!(
            kind_of(db.abolish(&Term::functor2("/", Term::atom("x"), Term::int(-1)))),
            Term::functor2("domain_error", Term::atom("not_less_than_zero"), Term::int(-1))
        );
        assert_eq!(
            kind_of(db.abolish(&Term::functor2("/", Term::atom("x"), Term::int(300)))),
            Term::functor1("representation_error", Term::atom("max_arity"))
        );
        assert_eq!(
            kind_of(db.abolish(&Term::atom("x"))),
            Term::functor2("type_error", Term::atom("predicate_indicator"), Term::atom("x"))
        );
    }
}
