use crate::{
    database::Database,
    error::Result,
    flags::PrologFlags,
    indexed::IndexedAnswers,
    ops,
    session::{Session, Yield},
    trail::Trail,
};

use ::{
    std::{
        cell::RefCell,
        fmt,
        io::{self, Write},
        rc::Rc,
    },
    yieldlog_term::{Atom, Term},
};

/// Library predicates every machine starts with, as `(Head, Body)`.
fn library() -> Vec<(Term, Term)> {
    let (x, xs, ys, zs, y) = (Term::var(), Term::var(), Term::var(), Term::var(), Term::var());
    vec![
        // member(X, [X|_]).
        (
            Term::functor2("member", x.clone(), Term::cons(x.clone(), Term::var())),
            Term::atom("true"),
        ),
        // member(X, [_|Xs]) :- member(X, Xs).
        (
            Term::functor2("member", y.clone(), Term::cons(Term::var(), xs.clone())),
            Term::functor2("member", y, xs.clone()),
        ),
        // append([], Ys, Ys).
        (
            Term::functor3("append", Term::nil(), ys.clone(), ys.clone()),
            Term::atom("true"),
        ),
        // append([X|Xs], Ys, [X|Zs]) :- append(Xs, Ys, Zs).
        (
            Term::functor3(
                "append",
                Term::cons(x.clone(), xs.clone()),
                ys.clone(),
                Term::cons(x, zs.clone()),
            ),
            Term::functor3("append", xs, ys, zs),
        ),
    ]
}

/// Everything a running program shares: the binding trail, the predicate
/// registry, the Prolog flags, the operator table and the output sink.
pub struct Machine {
    pub trail: Trail,
    pub database: Database,
    pub flags: PrologFlags,
    pub operators: IndexedAnswers,
    output: Box<dyn Write>,
}

impl fmt::Debug for Machine {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Machine")
            .field("trail", &self.trail.len())
            .field("database", &self.database)
            .field("flags", &self.flags)
            .finish()
    }
}

impl Default for Machine {
    fn default() -> Self {
        Self::new()
    }
}

impl Machine {
    /// A machine writing to stdout.
    pub fn new() -> Self {
        Self::with_output(Box::new(io::stdout()))
    }

    pub fn with_output(output: Box<dyn Write>) -> Self {
        let mut database = Database::new();
        for (head, body) in library() {
            let clause = Term::functor2(Atom::a(":-"), head, body);
            if let Err(error) = database.add_static(&clause) {
                tracing::error!(%error, "failed to load library clause");
            }
        }

        Self {
            trail: Trail::new(),
            database,
            flags: PrologFlags::new(),
            operators: ops::standard_operators(),
            output,
        }
    }

    pub fn output(&mut self) -> &mut dyn Write {
        &mut *self.output
    }

    /// Replace the output sink, returning the old one.
    pub fn set_output(&mut self, output: Box<dyn Write>) -> Box<dyn Write> {
        std::mem::replace(&mut self.output, output)
    }

    /// Start proving `goal`. Solutions are pulled with [`Session::resume`].
    pub fn query(&mut self, goal: &Term) -> Session {
        Session::new(self, goal)
    }

    /// Every instance of `template` for which `goal` succeeds, in order.
    pub fn find_all(&mut self, template: &Term, goal: &Term) -> Result<Vec<Term>> {
        let mut session = Session::new(self, goal);
        let mut found = Vec::new();
        while let Yield::Solution = session.resume()? {
            found.push(template.resolved());
        }
        Ok(found)
    }

    /// True if `goal` has at least one solution. Its bindings are undone.
    pub fn succeeds(&mut self, goal: &Term) -> Result<bool> {
        Ok(Session::new(self, goal).resume()?.is_solution())
    }
}

/// An output sink that keeps everything written to it, shared between its
/// clones.
#[derive(Debug, Clone, Default)]
pub struct OutputBuffer(Rc<RefCell<Vec<u8>>>);

impl OutputBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.borrow()).into_owned()
    }

    pub fn clear(&self) {
        self.0.borrow_mut().clear();
    }
}

impl Write for OutputBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn library_is_loaded_and_static() {
        let mut machine = Machine::new();
        let x = Term::var();
        let goal = Term::functor2(
            "member",
            x.clone(),
            Term::list(vec![Term::atom("a"), Term::atom("b")]),
        );
        assert_eq!(
            machine.find_all(&x, &goal).unwrap(),
            vec![Term::atom("a"), Term::atom("b")]
        );

        let assert = Term::functor1("assertz", Term::functor2("member", Term::int(1), Term::nil()));
        assert!(machine.succeeds(&assert).is_err());
    }

    #[test]
    fn output_buffer_is_shared() {
        let buffer = OutputBuffer::new();
        let mut machine = Machine::with_output(Box::new(buffer.clone()));
        write!(machine.output(), "hello").unwrap();
        assert_eq!(buffer.contents(), "hello");
    }
}
