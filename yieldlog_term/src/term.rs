use crate::atom::{self, Atom};

use ::{
    derive_more::From,
    ordered_float::OrderedFloat,
    smallvec::SmallVec,
    std::{
        cell::RefCell,
        collections::HashSet,
        fmt,
        hash::{Hash, Hasher},
        rc::Rc,
        sync::atomic::{AtomicU64, Ordering as AtomicOrdering},
    },
};

static NEXT_VARIABLE_ID: AtomicU64 = AtomicU64::new(1);

/// Argument storage for compound terms. Arity 1 to 3 compounds stay inline.
pub type Args = SmallVec<[Term; 3]>;

/// The shared binding cell behind a [`Variable`].
#[derive(Debug)]
pub struct VarCell {
    id: u64,
    binding: RefCell<Option<Term>>,
}

/// A logic variable: a mutable cell which is either unbound or bound to a
/// term (possibly another variable). Clones share the same cell.
#[derive(Clone)]
pub struct Variable(Rc<VarCell>);

impl Variable {
    pub fn new() -> Self {
        Variable(Rc::new(VarCell {
            id: NEXT_VARIABLE_ID.fetch_add(1, AtomicOrdering::Relaxed),
            binding: RefCell::new(None),
        }))
    }

    /// The creation id. Ids increase monotonically, so they give unbound
    /// variables a stable order.
    #[inline]
    pub fn id(&self) -> u64 {
        self.0.id
    }

    #[inline]
    pub fn is_bound(&self) -> bool {
        self.0.binding.borrow().is_some()
    }

    /// The term this variable is directly bound to, if any. This does not
    /// follow chains; use [`Term::value`] for that.
    pub fn binding(&self) -> Option<Term> {
        self.0.binding.borrow().clone()
    }

    /// Bind the cell. Callers outside the unifier are responsible for undoing
    /// the binding themselves; the runtime trail does this for you.
    pub fn set_binding(&self, value: Term) {
        *self.0.binding.borrow_mut() = Some(value);
    }

    pub fn clear_binding(&self) {
        *self.0.binding.borrow_mut() = None;
    }

    pub fn cell(&self) -> &Rc<VarCell> {
        &self.0
    }
}

impl Default for Variable {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for Variable {
    fn eq(&self, other: &Variable) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Variable {}

impl Hash for Variable {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.id.hash(state);
    }
}

impl fmt::Debug for Variable {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.binding() {
            Some(value) => write!(f, "_G{}={:?}", self.id(), value),
            None => write!(f, "_G{}", self.id()),
        }
    }
}

/// A named term with an ordered list of arguments.
#[derive(Clone)]
pub struct Compound {
    name: Atom,
    args: Args,
}

impl Compound {
    pub fn new(name: Atom, args: Args) -> Self {
        debug_assert!(!args.is_empty(), "compounds need at least one argument");
        Self { name, args }
    }

    #[inline]
    pub fn name(&self) -> &Atom {
        &self.name
    }

    #[inline]
    pub fn arity(&self) -> usize {
        self.args.len()
    }

    #[inline]
    pub fn args(&self) -> &[Term] {
        &self.args
    }

    /// True for the reserved `'.'/2` list-pair functor.
    pub fn is_list_pair(&self) -> bool {
        self.args.len() == 2 && self.name == *atom::DOT
    }
}

/// A Prolog term.
#[derive(Clone, From)]
pub enum Term {
    Var(Variable),
    Atom(Atom),
    Int(i64),
    #[from(ignore)]
    Float(OrderedFloat<f64>),
    #[from(ignore)]
    Str(Rc<str>),
    #[from(ignore)]
    Compound(Rc<Compound>),
}

impl From<f64> for Term {
    fn from(f: f64) -> Self {
        Term::Float(OrderedFloat(f))
    }
}

impl From<Compound> for Term {
    fn from(c: Compound) -> Self {
        Term::Compound(Rc::new(c))
    }
}

impl Term {
    /// A fresh unbound variable.
    pub fn var() -> Self {
        Term::Var(Variable::new())
    }

    pub fn atom(name: &str) -> Self {
        Term::Atom(Atom::a(name))
    }

    pub fn nil() -> Self {
        Term::Atom(atom::NIL.clone())
    }

    pub fn int(i: i64) -> Self {
        Term::Int(i)
    }

    pub fn float(f: f64) -> Self {
        Term::Float(OrderedFloat(f))
    }

    pub fn string(s: &str) -> Self {
        Term::Str(Rc::from(s))
    }

    /// Build `name(args...)`. With no arguments this is just the atom.
    pub fn functor<I>(name: impl Into<Atom>, args: I) -> Self
    where
        I: IntoIterator<Item = Term>,
    {
        let args: Args = args.into_iter().collect();
        let name = name.into();
        if args.is_empty() {
            Term::Atom(name)
        } else {
            Term::Compound(Rc::new(Compound::new(name, args)))
        }
    }

    pub fn functor1(name: impl Into<Atom>, a: Term) -> Self {
        Self::functor(name, Some(a))
    }

    pub fn functor2(name: impl Into<Atom>, a: Term, b: Term) -> Self {
        Self::functor(name, vec![a, b])
    }

    pub fn functor3(name: impl Into<Atom>, a: Term, b: Term, c: Term) -> Self {
        Self::functor(name, vec![a, b, c])
    }

    /// A list pair `[head|tail]`.
    pub fn cons(head: Term, tail: Term) -> Self {
        Self::functor2(atom::DOT.clone(), head, tail)
    }

    /// A proper list of `items`.
    pub fn list<I>(items: I) -> Self
    where
        I: IntoIterator<Item = Term>,
        I::IntoIter: DoubleEndedIterator,
    {
        Self::list_with_tail(items, Term::nil())
    }

    /// A list of `items` ending in `tail` instead of `[]`.
    pub fn list_with_tail<I>(items: I, tail: Term) -> Self
    where
        I: IntoIterator<Item = Term>,
        I::IntoIter: DoubleEndedIterator,
    {
        items
            .into_iter()
            .rev()
            .fold(tail, |acc, item| Term::cons(item, acc))
    }

    /// `Name/Arity`.
    pub fn indicator(name: &Atom, arity: usize) -> Self {
        Self::functor2(
            atom::SLASH.clone(),
            Term::Atom(name.clone()),
            Term::Int(arity as i64),
        )
    }

    /// Dereference: follow variable bindings until reaching an unbound
    /// variable or a non-variable term.
    pub fn value(&self) -> Term {
        let mut term = self.clone();
        loop {
            let bound = match &term {
                Term::Var(v) => v.binding(),
                _ => None,
            };
            match bound {
                Some(next) => term = next,
                None => return term,
            }
        }
    }

    /// The unbound variable this term dereferences to, if any.
    pub fn as_var(&self) -> Option<Variable> {
        match self.value() {
            Term::Var(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_atom(&self) -> Option<Atom> {
        match self.value() {
            Term::Atom(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self.value() {
            Term::Int(i) => Some(i),
            _ => None,
        }
    }

    pub fn as_compound(&self) -> Option<Rc<Compound>> {
        match self.value() {
            Term::Compound(c) => Some(c),
            _ => None,
        }
    }

    pub fn is_var(&self) -> bool {
        self.as_var().is_some()
    }

    pub fn is_atom(&self) -> bool {
        matches!(self.value(), Term::Atom(_))
    }

    pub fn is_number(&self) -> bool {
        matches!(self.value(), Term::Int(_) | Term::Float(_))
    }

    pub fn is_atomic(&self) -> bool {
        match self.value() {
            Term::Var(_) | Term::Compound(_) => false,
            _ => true,
        }
    }

    pub fn is_compound(&self) -> bool {
        matches!(self.value(), Term::Compound(_))
    }

    pub fn is_callable(&self) -> bool {
        matches!(self.value(), Term::Atom(_) | Term::Compound(_))
    }

    /// The functor name and arity of an atom (arity 0) or compound.
    pub fn name_arity(&self) -> Option<(Atom, usize)> {
        match self.value() {
            Term::Atom(a) => Some((a, 0)),
            Term::Compound(c) => Some((c.name.clone(), c.arity())),
            _ => None,
        }
    }

    /// The arguments of a compound, or nothing for any other term.
    pub fn functor_args(&self) -> Args {
        match self.value() {
            Term::Compound(c) => c.args.clone(),
            _ => Args::new(),
        }
    }

    /// True if the dereferenced term is `name/arity`.
    pub fn is_functor(&self, name: &Atom, arity: usize) -> bool {
        match self.value() {
            Term::Atom(a) => arity == 0 && a == *name,
            Term::Compound(c) => c.arity() == arity && c.name == *name,
            _ => false,
        }
    }

    /// Structural equality through dereferenced arguments. Unbound variables
    /// are only equal to themselves.
    pub fn term_equal(&self, other: &Term) -> bool {
        let mut pending = vec![(self.clone(), other.clone())];
        while let Some((left, right)) = pending.pop() {
            let equal = match (left.value(), right.value()) {
                (Term::Var(a), Term::Var(b)) => a == b,
                (Term::Atom(a), Term::Atom(b)) => a == b,
                (Term::Int(a), Term::Int(b)) => a == b,
                (Term::Float(a), Term::Float(b)) => a == b,
                (Term::Str(a), Term::Str(b)) => a == b,
                (Term::Compound(a), Term::Compound(b)) => {
                    if Rc::ptr_eq(&a, &b) {
                        true
                    } else if a.name == b.name && a.arity() == b.arity() {
                        pending.extend(a.args.iter().cloned().zip(b.args.iter().cloned()));
                        true
                    } else {
                        false
                    }
                }
                _ => false,
            };
            if !equal {
                return false;
            }
        }
        true
    }

    /// True if no unbound variable is reachable from this term.
    pub fn ground(&self) -> bool {
        let mut pending = vec![self.clone()];
        while let Some(term) = pending.pop() {
            match term.value() {
                Term::Var(_) => return false,
                Term::Compound(c) => pending.extend(c.args.iter().cloned()),
                _ => {}
            }
        }
        true
    }

    /// Append every distinct unbound variable reachable from this term to
    /// `variables`, in order of first occurrence. Variables already in
    /// `variables` are not added again.
    pub fn add_unique_variables(&self, variables: &mut Vec<Variable>) {
        let mut seen: HashSet<Variable> = variables.iter().cloned().collect();
        // Arguments go on in reverse so the leftmost is visited first.
        let mut pending = vec![self.clone()];
        while let Some(term) = pending.pop() {
            match term.value() {
                Term::Var(v) => {
                    if seen.insert(v.clone()) {
                        variables.push(v);
                    }
                }
                Term::Compound(c) => pending.extend(c.args.iter().rev().cloned()),
                _ => {}
            }
        }
    }

    /// The distinct unbound variables of this term in first-occurrence order.
    pub fn variables(&self) -> Vec<Variable> {
        let mut variables = Vec::new();
        self.add_unique_variables(&mut variables);
        variables
    }

    /// The elements of a proper list, or `None` if this is not one (including
    /// partial lists ending in an unbound variable).
    pub fn list_items(&self) -> Option<Vec<Term>> {
        let mut items = Vec::new();
        let mut list = self.value();
        loop {
            let tail = match &list {
                Term::Atom(a) if *a == *atom::NIL => return Some(items),
                Term::Compound(c) if c.is_list_pair() => {
                    items.push(c.args[0].clone());
                    c.args[1].value()
                }
                _ => return None,
            };
            list = tail;
        }
    }

    /// Rebuild this term with every bound variable replaced by its value.
    /// Unbound variables are kept as they are.
    pub fn resolved(&self) -> Term {
        match self.value() {
            Term::Compound(c) => Term::Compound(Rc::new(Compound::new(
                c.name.clone(),
                c.args.iter().map(Term::resolved).collect(),
            ))),
            other => other,
        }
    }
}

impl PartialEq for Term {
    fn eq(&self, other: &Term) -> bool {
        self.term_equal(other)
    }
}

impl Eq for Term {}
