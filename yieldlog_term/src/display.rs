use crate::{atom, term::Term};

use ::std::fmt;

/// Display adapter printing a term the way `writeq/1` does.
pub struct Quoted<'a>(&'a Term);

impl Term {
    /// Print with atoms quoted where needed.
    pub fn quoted(&self) -> Quoted {
        Quoted(self)
    }
}

fn write_term(f: &mut fmt::Formatter, term: &Term, quoted: bool) -> fmt::Result {
    match term.value() {
        Term::Var(v) => write!(f, "_G{}", v.id()),
        Term::Atom(a) if quoted => f.write_str(&a.to_quoted_string()),
        Term::Atom(a) => write!(f, "{}", a),
        Term::Int(i) => write!(f, "{}", i),
        Term::Float(x) => write!(f, "{:?}", x.0),
        Term::Str(s) if quoted => write!(f, "{:?}", &*s),
        Term::Str(s) => f.write_str(&s),
        Term::Compound(c) if c.is_list_pair() => {
            f.write_str("[")?;
            write_term(f, &c.args()[0], quoted)?;
            let mut tail = c.args()[1].value();
            loop {
                let next = match &tail {
                    Term::Atom(a) if *a == *atom::NIL => break,
                    Term::Compound(pair) if pair.is_list_pair() => {
                        f.write_str(", ")?;
                        write_term(f, &pair.args()[0], quoted)?;
                        pair.args()[1].value()
                    }
                    other => {
                        f.write_str("|")?;
                        write_term(f, other, quoted)?;
                        break;
                    }
                };
                tail = next;
            }
            f.write_str("]")
        }
        Term::Compound(c) => {
            if quoted {
                f.write_str(&c.name().to_quoted_string())?;
            } else {
                write!(f, "{}", c.name())?;
            }
            f.write_str("(")?;
            for (i, arg) in c.args().iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write_term(f, arg, quoted)?;
            }
            f.write_str(")")
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write_term(f, self, false)
    }
}

impl<'a> fmt::Display for Quoted<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write_term(f, self.0, true)
    }
}

impl fmt::Debug for Term {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write_term(f, self, true)
    }
}
