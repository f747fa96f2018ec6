//! The term model shared by the `yieldlog` runtime and compiler: interned
//! atoms, logic variables with binding cells, compound terms with list-pair
//! sugar, the standard order of terms, and term printing.
//!
//! Terms are plain data. Nothing in this crate binds variables on its own
//! behalf; unification and the undo discipline live in the runtime.

pub mod atom;
pub mod display;
pub mod order;
pub mod term;

pub use crate::{
    atom::Atom,
    order::{compare, sort_unique, term_less_than},
    term::{Args, Compound, Term, Variable},
};
