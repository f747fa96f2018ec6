//! Accumulators for `findall/3`, `bagof/3` and `setof/3`. Each answer is
//! copied out of the live bindings when it is added, before backtracking
//! undoes them.

use crate::copy::CopyStore;

use ::{
    std::collections::HashMap,
    yieldlog_term::{atom, sort_unique, Term, Variable},
};

#[derive(Debug)]
pub struct FindallAnswers {
    template: Term,
    bag: Vec<Term>,
}

impl FindallAnswers {
    pub fn new(template: Term) -> Self {
        Self {
            template,
            bag: Vec::new(),
        }
    }

    /// Record a copy of the template as it is bound right now.
    pub fn add(&mut self) {
        self.bag.push(CopyStore::new().make_copy(&self.template));
    }

    pub fn len(&self) -> usize {
        self.bag.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bag.is_empty()
    }

    /// The answers as a Prolog list.
    pub fn result(self) -> Term {
        Term::list(self.bag)
    }

    pub fn into_vec(self) -> Vec<Term> {
        self.bag
    }
}

/// Strip `Var^Goal` qualifiers, returning the inner goal and the variables
/// the qualifiers named.
pub fn strip_existential(goal: &Term) -> (Term, Vec<Variable>) {
    let mut goal = goal.value();
    let mut bound = Vec::new();
    while goal.is_functor(&atom::HAT, 2) {
        let args = goal.functor_args();
        args[0].add_unique_variables(&mut bound);
        goal = args[1].value();
    }
    (goal, bound)
}

/// Answers of `bagof/3` grouped by the bindings of the goal's free
/// variables.
#[derive(Debug)]
pub struct BagofAnswers {
    template: Term,
    witness: Term,
    groups: Vec<(Term, Vec<Term>)>,
}

impl BagofAnswers {
    /// Set up for `bagof(Template, Goal, _)`. The free variables of `Goal` are
    /// those not in `Template` and not named by a `^` qualifier.
    pub fn new(template: Term, goal: &Term) -> Self {
        let (inner, mut excluded) = strip_existential(goal);
        template.add_unique_variables(&mut excluded);
        let free: Vec<Term> = inner
            .variables()
            .into_iter()
            .filter(|v| !excluded.contains(v))
            .map(Term::Var)
            .collect();

        Self {
            template,
            witness: Term::functor("$", free),
            groups: Vec::new(),
        }
    }

    /// The term bound to the free variables, to be unified with each group's
    /// key when the results are enumerated.
    pub fn witness(&self) -> &Term {
        &self.witness
    }

    pub fn add(&mut self) {
        let mut store = CopyStore::new();
        let witness = store.make_copy(&self.witness);
        let answer = store.make_copy(&self.template);

        match self
            .groups
            .iter_mut()
            .find(|(key, _)| is_variant(key, &witness))
        {
            Some((_, bag)) => bag.push(answer),
            None => self.groups.push((witness, vec![answer])),
        }
    }

    /// Each group as `(Witness, Bag)`, in order of first appearance. No
    /// answers means no groups, so `bagof/3` fails.
    pub fn result(self) -> Vec<(Term, Term)> {
        self.groups
            .into_iter()
            .map(|(witness, bag)| (witness, Term::list(bag)))
            .collect()
    }

    /// As [`BagofAnswers::result`], but with groups and bags sorted and
    /// free of duplicates, for `setof/3`.
    pub fn result_set(self) -> Vec<(Term, Term)> {
        let mut groups = self.groups;
        groups.sort_by(|(a, _), (b, _)| yieldlog_term::compare(a, b));
        groups
            .into_iter()
            .map(|(witness, mut bag)| {
                sort_unique(&mut bag);
                (witness, Term::list(bag))
            })
            .collect()
    }
}

/// True if the two terms are equal up to a consistent one-to-one renaming
/// of their variables.
pub fn is_variant(left: &Term, right: &Term) -> bool {
    let mut forward = HashMap::new();
    let mut backward = HashMap::new();
    variant(left, right, &mut forward, &mut backward)
}

fn variant(
    left: &Term,
    right: &Term,
    forward: &mut HashMap<u64, u64>,
    backward: &mut HashMap<u64, u64>,
) -> bool {
    match (left.value(), right.value()) {
        (Term::Var(a), Term::Var(b)) => {
            let f = *forward.entry(a.id()).or_insert_with(|| b.id());
            let g = *backward.entry(b.id()).or_insert_with(|| a.id());
            f == b.id() && g == a.id()
        }
        (Term::Compound(a), Term::Compound(b)) => {
            a.name() == b.name()
                && a.arity() == b.arity()
                && a.args()
                    .iter()
                    .zip(b.args().iter())
                    .all(|(x, y)| variant(x, y, forward, backward))
        }
        (l, r) => !l.is_var() && !r.is_var() && l.term_equal(&r),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trail::Trail;

    #[test]
    fn findall_copies_each_answer() {
        let mut trail = Trail::new();
        let x = Term::var();
        let mut answers = FindallAnswers::new(Term::functor1("f", x.clone()));
        for i in 1..=3 {
            let point = trail.mark();
            assert!(trail.unify(&x, &Term::int(i)));
            answers.add();
            trail.unwind(point);
        }

        assert_eq!(
            answers.result(),
            Term::list(vec![
                Term::functor1("f", Term::int(1)),
                Term::functor1("f", Term::int(2)),
                Term::functor1("f", Term::int(3)),
            ])
        );
    }

    #[test]
    fn variants() {
        let (x, y) = (Term::var(), Term::var());
        assert!(is_variant(
            &Term::functor2("f", x.clone(), y.clone()),
            &Term::functor2("f", y.clone(), x.clone())
        ));
        assert!(!is_variant(
            &Term::functor2("f", x.clone(), x.clone()),
            &Term::functor2("f", x.clone(), y.clone())
        ));
        assert!(!is_variant(&x, &Term::atom("a")));
    }

    #[test]
    fn bagof_groups_by_free_variables() {
        let mut trail = Trail::new();
        let (x, y) = (Term::var(), Term::var());
        let goal = Term::functor2("p", y.clone(), x.clone());
        let mut answers = BagofAnswers::new(x.clone(), &goal);
        assert_eq!(answers.witness(), &Term::functor1("$", y.clone()));

        for (k, v) in &[("b", 1), ("a", 2), ("b", 3), ("a", 2)] {
            let point = trail.mark();
            assert!(trail.unify(&y, &Term::atom(k)));
            assert!(trail.unify(&x, &Term::int(*v)));
            answers.add();
            trail.unwind(point);
        }

        let groups = BagofAnswers {
            template: answers.template.clone(),
            witness: answers.witness.clone(),
            groups: answers.groups.clone(),
        };
        assert_eq!(
            groups.result(),
            vec![
                (
                    Term::functor1("$", Term::atom("b")),
                    Term::list(vec![Term::int(1), Term::int(3)])
                ),
                (
                    Term::functor1("$", Term::atom("a")),
                    Term::list(vec![Term::int(2), Term::int(2)])
                ),
            ]
        );
        assert_eq!(
            answers.result_set(),
            vec![
                (
                    Term::functor1("$", Term::atom("a")),
                    Term::list(vec![Term::int(2)])
                ),
                (
                    Term::functor1("$", Term::atom("b")),
                    Term::list(vec![Term::int(1), Term::int(3)])
                ),
            ]
        );
    }

    #[test]
    fn existential_variables_are_not_free() {
        let (x, y) = (Term::var(), Term::var());
        let goal = Term::functor2("^", y.clone(), Term::functor2("p", y.clone(), x.clone()));
        let answers = BagofAnswers::new(x, &goal);
        assert_eq!(answers.witness(), &Term::atom("$"));
    }
}
