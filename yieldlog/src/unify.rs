use crate::trail::Trail;

use ::{smallvec::SmallVec, yieldlog_term::Term};

/// Pending pairs of terms still to be unified. Kept as an explicit stack so
/// deep terms don't recurse.
#[derive(Debug, Default)]
pub struct UnificationStack {
    stack: SmallVec<[(Term, Term); 16]>,
}

impl UnificationStack {
    pub fn new() -> Self {
        Self {
            stack: SmallVec::new(),
        }
    }

    #[inline]
    pub fn push(&mut self, l: Term, r: Term) {
        self.stack.push((l, r));
    }

    /// Unify every pending pair, binding through `trail`. Returns false on
    /// the first mismatch; the caller is responsible for unwinding.
    pub fn unify(&mut self, trail: &mut Trail) -> bool {
        while let Some((l, r)) = self.stack.pop() {
            let (l, r) = (l.value(), r.value());
            match (&l, &r) {
                (Term::Var(a), Term::Var(b)) => {
                    if a == b {
                        continue;
                    }
                    // Bind the younger variable to the older one.
                    if a.id() > b.id() {
                        trail.bind(a, r.clone());
                    } else {
                        trail.bind(b, l.clone());
                    }
                }
                (Term::Var(a), _) => trail.bind(a, r.clone()),
                (_, Term::Var(b)) => trail.bind(b, l.clone()),
                (Term::Compound(a), Term::Compound(b)) => {
                    if a.name() != b.name() || a.arity() != b.arity() {
                        self.stack.clear();
                        return false;
                    }
                    for (x, y) in a.args().iter().zip(b.args().iter()).rev() {
                        self.stack.push((x.clone(), y.clone()));
                    }
                }
                _ => {
                    if !l.term_equal(&r) {
                        self.stack.clear();
                        return false;
                    }
                }
            }
        }

        true
    }
}

impl Trail {
    /// Unify two terms. On success the bindings stay in effect until the
    /// trail is unwound past this call; on failure nothing stays bound.
    pub fn unify(&mut self, l: &Term, r: &Term) -> bool {
        let point = self.mark();
        let mut stack = UnificationStack::new();
        stack.push(l.clone(), r.clone());
        if stack.unify(self) {
            true
        } else {
            self.unwind(point);
            false
        }
    }

    /// Unify two argument lists pairwise, stopping at the first pair that
    /// fails. Lists of different length never unify.
    pub fn unify_arrays(&mut self, l: &[Term], r: &[Term]) -> bool {
        if l.len() != r.len() {
            return false;
        }

        let point = self.mark();
        let mut stack = UnificationStack::new();
        for (x, y) in l.iter().zip(r.iter()) {
            stack.push(x.clone(), y.clone());
            if !stack.unify(self) {
                self.unwind(point);
                return false;
            }
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn f(args: Vec<Term>) -> Term {
        Term::functor("f", args)
    }

    #[test]
    fn ground_terms_unify_with_themselves_only() {
        let mut trail = Trail::new();
        let t = f(vec![Term::atom("a"), Term::list(vec![Term::int(1), Term::float(2.0)])]);
        assert!(trail.unify(&t, &t.clone()));
        assert!(trail.is_empty());

        let u = f(vec![Term::atom("a"), Term::list(vec![Term::int(1), Term::int(2)])]);
        assert!(!trail.unify(&t, &u));
        assert!(!trail.unify(&Term::atom("a"), &Term::string("a")));
        assert!(!trail.unify(&f(vec![Term::int(1)]), &Term::functor("g", vec![Term::int(1)])));
        assert!(trail.is_empty());
    }

    #[test]
    fn undo_on_backtrack() {
        let mut trail = Trail::new();
        let x = Term::var();
        let point = trail.mark();
        assert!(trail.unify(&x, &Term::atom("a")));
        assert_eq!(x.value(), Term::atom("a"));
        trail.unwind(point);
        assert!(x.is_var());
    }

    #[test]
    fn self_unification_leaves_variable_unbound() {
        let mut trail = Trail::new();
        let x = Term::var();
        assert!(trail.unify(&x, &x.clone()));
        assert!(x.is_var());
        assert!(trail.is_empty());
    }

    #[test]
    fn failure_unwinds_partial_bindings() {
        let mut trail = Trail::new();
        let x = Term::var();
        let l = f(vec![x.clone(), Term::atom("b")]);
        let r = f(vec![Term::atom("a"), Term::atom("c")]);
        assert!(!trail.unify(&l, &r));
        assert!(x.is_var());
    }

    #[test]
    fn shared_variables() {
        let mut trail = Trail::new();
        let x = Term::var();
        let y = Term::var();
        let l = f(vec![x.clone(), x.clone()]);
        let r = f(vec![y.clone(), Term::int(3)]);
        assert!(trail.unify(&l, &r));
        assert_eq!(x.value(), Term::int(3));
        assert_eq!(y.value(), Term::int(3));
    }

    #[test]
    fn arrays_exit_on_first_failure() {
        let mut trail = Trail::new();
        let x = Term::var();
        let l = vec![x.clone(), Term::atom("b")];
        assert!(!trail.unify_arrays(&l, &[Term::atom("a"), Term::atom("c")]));
        assert!(x.is_var());
        assert!(trail.unify_arrays(&l, &[Term::atom("a"), Term::atom("b")]));
        assert_eq!(x.value(), Term::atom("a"));
        assert!(!trail.unify_arrays(&l, &[Term::atom("a")]));
    }
}
