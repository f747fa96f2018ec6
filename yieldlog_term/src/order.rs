//! The standard order of terms.
//!
//! Terms are ranked by type class first:
//!
//! ```text
//! Var < Atom < f(_) < f(_, _) < f(_, _, _) < f(_, ..) < Number < String
//! ```
//!
//! Unbound variables are ordered by creation id, atoms by name, and compounds
//! of the same class by name, then arity, then arguments from left to right.
//! Integers and floats compare by numeric value; on a tie the float comes first.

use crate::term::Term;

use ::std::cmp::Ordering;

fn type_class(term: &Term) -> u8 {
    match term {
        Term::Var(_) => 0,
        Term::Atom(_) => 1,
        Term::Compound(c) => match c.arity() {
            1 => 2,
            2 => 3,
            3 => 4,
            _ => 5,
        },
        Term::Int(_) | Term::Float(_) => 6,
        Term::Str(_) => 7,
    }
}

fn compare_numbers(l: &Term, r: &Term) -> Ordering {
    match (l, r) {
        (Term::Int(a), Term::Int(b)) => a.cmp(b),
        (Term::Float(a), Term::Float(b)) => a.cmp(b),
        (Term::Int(a), Term::Float(b)) => match (*a as f64).partial_cmp(&b.0) {
            Some(Ordering::Equal) | None => Ordering::Greater,
            Some(ord) => ord,
        },
        (Term::Float(a), Term::Int(b)) => match a.0.partial_cmp(&(*b as f64)) {
            Some(Ordering::Equal) | None => Ordering::Less,
            Some(ord) => ord,
        },
        _ => unreachable!("compare_numbers called on non-numbers"),
    }
}

/// Compare two terms in the standard order. Returns `Equal` exactly when the
/// terms are [`Term::term_equal`].
pub fn compare(left: &Term, right: &Term) -> Ordering {
    let mut pending = vec![(left.clone(), right.clone())];
    while let Some((left, right)) = pending.pop() {
        let ord = compare_node(&left, &right, &mut pending);
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

/// Compare the principal functors of two terms. Argument pairs still to be
/// compared are pushed onto `pending`, leftmost on top.
fn compare_node(left: &Term, right: &Term, pending: &mut Vec<(Term, Term)>) -> Ordering {
    let (l, r) = (left.value(), right.value());
    let (lc, rc) = (type_class(&l), type_class(&r));
    if lc != rc {
        return lc.cmp(&rc);
    }

    match (&l, &r) {
        (Term::Var(a), Term::Var(b)) => a.id().cmp(&b.id()),
        (Term::Atom(a), Term::Atom(b)) => a.cmp(b),
        (Term::Str(a), Term::Str(b)) => a.cmp(b),
        (Term::Compound(a), Term::Compound(b)) => {
            let ord = a
                .name()
                .cmp(b.name())
                .then_with(|| a.arity().cmp(&b.arity()));
            if ord == Ordering::Equal {
                pending.extend(
                    a.args()
                        .iter()
                        .cloned()
                        .zip(b.args().iter().cloned())
                        .rev(),
                );
            }
            ord
        }
        _ => compare_numbers(&l, &r),
    }
}

#[inline]
pub fn term_less_than(left: &Term, right: &Term) -> bool {
    compare(left, right) == Ordering::Less
}

/// Sort `terms` by the standard order and drop duplicates, as `sort/2` does.
pub fn sort_unique(terms: &mut Vec<Term>) {
    terms.sort_by(compare);
    terms.dedup_by(|a, b| compare(a, b) == Ordering::Equal);
}

impl PartialOrd for Term {
    fn partial_cmp(&self, other: &Term) -> Option<Ordering> {
        Some(compare(self, other))
    }
}

impl Ord for Term {
    fn cmp(&self, other: &Term) -> Ordering {
        compare(self, other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::term::Variable;

    fn mixed() -> Vec<Term> {
        vec![
            Term::string("str"),
            Term::int(3),
            Term::float(2.5),
            Term::functor("f", vec![Term::int(1), Term::int(2), Term::int(3), Term::int(4)]),
            Term::functor3("f", Term::int(1), Term::int(2), Term::int(3)),
            Term::functor2("g", Term::int(1), Term::int(2)),
            Term::functor2("f", Term::int(1), Term::int(2)),
            Term::functor1("z", Term::int(1)),
            Term::atom("b"),
            Term::atom("a"),
        ]
    }

    #[test]
    fn type_classes_rank_in_order() {
        let x = Term::var();
        let mut terms = mixed();
        terms.push(x.clone());
        terms.sort();

        assert_eq!(terms[0], x);
        assert_eq!(terms[1], Term::atom("a"));
        assert_eq!(terms[2], Term::atom("b"));
        assert_eq!(terms[3], Term::functor1("z", Term::int(1)));
        assert_eq!(terms[4], Term::functor2("f", Term::int(1), Term::int(2)));
        assert_eq!(terms[5], Term::functor2("g", Term::int(1), Term::int(2)));
        assert_eq!(terms[8], Term::float(2.5));
        assert_eq!(terms[9], Term::int(3));
        assert_eq!(terms[10], Term::string("str"));
    }

    #[test]
    fn irreflexive_and_transitive() {
        let terms = mixed();
        for a in &terms {
            assert!(!term_less_than(a, a));
            for b in &terms {
                for c in &terms {
                    if term_less_than(a, b) && term_less_than(b, c) {
                        assert!(term_less_than(a, c));
                    }
                }
            }
        }
    }

    #[test]
    fn variables_order_by_creation() {
        let first = Variable::new();
        let second = Variable::new();
        assert!(term_less_than(&Term::Var(first), &Term::Var(second)));
    }

    #[test]
    fn int_and_float_tie() {
        assert!(term_less_than(&Term::float(1.0), &Term::int(1)));
        assert!(term_less_than(&Term::int(1), &Term::float(1.5)));
    }

    #[test]
    fn sort_removes_duplicates() {
        let mut terms = vec![
            Term::atom("c"),
            Term::atom("a"),
            Term::atom("c"),
            Term::int(1),
            Term::atom("a"),
        ];
        sort_unique(&mut terms);
        assert_eq!(terms, vec![Term::atom("a"), Term::atom("c"), Term::int(1)]);
    }

    #[test]
    fn first_differing_argument_decides() {
        let long = |last: i64| {
            let mut items: Vec<Term> = (0..2000).map(Term::int).collect();
            items.push(Term::int(last));
            Term::list(items)
        };
        assert_eq!(compare(&long(1), &long(2)), Ordering::Less);
        assert_eq!(compare(&long(2), &long(2)), Ordering::Equal);
        assert_eq!(
            compare(
                &Term::functor2("f", Term::int(2), Term::int(0)),
                &Term::functor2("f", Term::int(1), Term::int(9)),
            ),
            Ordering::Greater
        );
    }
}
