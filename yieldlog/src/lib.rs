//! The `yieldlog` runtime: a binding trail with unification and undo, the
//! copy store, indexed fact storage, the dynamic predicate registry, and a
//! pull-based resolution [`Session`] which proves goals one solution at a
//! time.
//!
//! Everything a running program shares lives in a [`Machine`]:
//!
//! ```ignore
//! let mut machine = Machine::new();
//! machine.database.assert(&brother, Position::Last)?;
//! let mut session = machine.query(&goal);
//! while session.resume()?.is_solution() {
//!     // read bindings off the goal's variables
//! }
//! ```
//!
//! Bindings made while proving a goal are observable between a solution and
//! the next call to [`Session::resume`], and are all undone once the session
//! is exhausted or dropped.

pub mod answers;
pub mod arith;
pub mod copy;
pub mod database;
pub mod error;
pub mod flags;
pub mod indexed;
pub mod machine;
pub mod ops;
pub mod session;
pub mod trail;
pub mod unify;

pub use crate::{
    copy::{copy_term, CopyStore, PortableTerm},
    database::{Database, PredicateKey, Position},
    error::{PrologError, PrologException, Result},
    flags::PrologFlags,
    indexed::{Answer, AnswerMatches, IndexedAnswers},
    machine::{Machine, OutputBuffer},
    session::{Session, Yield},
    trail::{Point, Trail},
};

pub use yieldlog_term::{self as term, atom, Atom, Term, Variable};

pub mod prelude {
    pub use crate::{
        database::{Database, PredicateKey, Position},
        error::{PrologError, PrologException, Result},
        indexed::IndexedAnswers,
        machine::Machine,
        session::{Session, Yield},
        trail::Trail,
    };

    pub use yieldlog_term::{Atom, Term, Variable};
}
