//! Compiles Prolog predicates into a target-agnostic statement tree, one
//! function per predicate, shaped by each predicate's declared determinism.
//!
//! ```ignore
//! let functions = CompilerState::new().compile_program(&clauses)?;
//! let json = serde_json::to_string(&functions)?;
//! ```
//!
//! [`exec::Program`] runs the compiled functions directly against a runtime
//! `Machine`.

pub mod code;
pub mod compile;
pub mod exec;
pub mod state;

pub use crate::{
    code::{Determinism, Function, Statement},
    compile::SourceClause,
    exec::Program,
    state::{CompileError, CompilerState},
};

pub mod prelude {
    pub use crate::{
        code::*,
        compile::SourceClause,
        exec::Program,
        state::{CompileError, CompilerState},
    };
}
