use ::{
    by_address::ByAddress,
    std::{collections::HashMap, fmt, rc::Rc},
    yieldlog_term::{term::VarCell, Atom, Compound, Term, Variable},
};

/// Maps each distinct unbound variable met while copying to exactly one
/// fresh variable.
#[derive(Debug, Default)]
pub struct CopyStore {
    copies: HashMap<ByAddress<Rc<VarCell>>, Variable>,
}

impl CopyStore {
    pub fn new() -> Self {
        Self {
            copies: HashMap::new(),
        }
    }

    /// The fresh variable standing in for `var`, allocated on first request.
    pub fn get_copy(&mut self, var: &Variable) -> Variable {
        self.copies
            .entry(ByAddress(var.cell().clone()))
            .or_insert_with(Variable::new)
            .clone()
    }

    pub fn n_unique_variables(&self) -> usize {
        self.copies.len()
    }

    /// Copy `term`, replacing unbound variables through this store. Bound
    /// variables are replaced by copies of their values.
    pub fn make_copy(&mut self, term: &Term) -> Term {
        match term.value() {
            Term::Var(v) => Term::Var(self.get_copy(&v)),
            Term::Compound(c) => Term::from(Compound::new(
                c.name().clone(),
                c.args().iter().map(|arg| self.make_copy(arg)).collect(),
            )),
            other => other,
        }
    }
}

/// Copy a term with a fresh store, as `copy_term/2` does.
pub fn copy_term(term: &Term) -> Term {
    CopyStore::new().make_copy(term)
}

/// A term detached from every binding cell, so it survives unwinding of the
/// trail and outlives the bindings that produced it. Variables are numbered by
/// first occurrence.
#[derive(Clone, PartialEq)]
pub enum PortableTerm {
    Var(usize),
    Atom(Atom),
    Int(i64),
    Float(f64),
    Str(String),
    Compound(Atom, Vec<PortableTerm>),
}

impl PortableTerm {
    pub fn from_term(term: &Term) -> Self {
        let mut numbering = HashMap::new();
        Self::number(term, &mut numbering)
    }

    fn number(term: &Term, numbering: &mut HashMap<ByAddress<Rc<VarCell>>, usize>) -> Self {
        match term.value() {
            Term::Var(v) => {
                let next = numbering.len();
                PortableTerm::Var(*numbering.entry(ByAddress(v.cell().clone())).or_insert(next))
            }
            Term::Atom(a) => PortableTerm::Atom(a),
            Term::Int(i) => PortableTerm::Int(i),
            Term::Float(x) => PortableTerm::Float(x.0),
            Term::Str(s) => PortableTerm::Str(s.to_string()),
            Term::Compound(c) => PortableTerm::Compound(
                c.name().clone(),
                c.args().iter().map(|arg| Self::number(arg, numbering)).collect(),
            ),
        }
    }

    /// Rebuild a live term. Every call allocates a fresh set of variables.
    pub fn to_term(&self) -> Term {
        let mut vars = Vec::new();
        self.build(&mut vars)
    }

    fn build(&self, vars: &mut Vec<Variable>) -> Term {
        match self {
            PortableTerm::Var(i) => {
                while vars.len() <= *i {
                    vars.push(Variable::new());
                }
                Term::Var(vars[*i].clone())
            }
            PortableTerm::Atom(a) => Term::Atom(a.clone()),
            PortableTerm::Int(i) => Term::Int(*i),
            PortableTerm::Float(x) => Term::float(*x),
            PortableTerm::Str(s) => Term::string(s),
            PortableTerm::Compound(name, args) => {
                Term::functor(name.clone(), args.iter().map(|arg| arg.build(vars)))
            }
        }
    }
}

impl fmt::Display for PortableTerm {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PortableTerm::Var(i) => write!(f, "_{}", i),
            other => write!(f, "{}", other.to_term().quoted()),
        }
    }
}

impl fmt::Debug for PortableTerm {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}
