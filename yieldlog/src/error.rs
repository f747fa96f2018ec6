use crate::copy::PortableTerm;

use ::{
    derive_more::From,
    failure::Fail,
    std::{fmt, io},
    yieldlog_term::{atom, Atom, Term},
};

pub type Result<T> = ::std::result::Result<T, PrologError>;

#[non_exhaustive]
#[derive(Debug, Fail, From)]
pub enum PrologError {
    /// A Prolog exception, catchable with `catch/3`.
    #[fail(display = "{}", _0)]
    Thrown(#[fail(cause)] PrologException),

    #[fail(display = "I/O error: `{}`", _0)]
    Io(#[fail(cause)] io::Error),
}

impl PrologError {
    pub fn exception(&self) -> Option<&PrologException> {
        match self {
            PrologError::Thrown(e) => Some(e),
            _ => None,
        }
    }
}

/// The exception carrier for a thrown Prolog term. The ball is detached from
/// the live bindings when the exception is built, so it survives any amount
/// of unwinding on its way to a handler.
#[derive(Clone)]
pub struct PrologException {
    ball: PortableTerm,
    message: String,
}

impl PrologException {
    /// Wrap `throw(Term)`.
    pub fn new(term: &Term) -> Self {
        Self {
            ball: PortableTerm::from_term(term),
            message: term.quoted().to_string(),
        }
    }

    /// Build the ISO form `error(Kind, Message)`.
    pub fn error(kind: Term, message: &str) -> Self {
        let ball = Term::functor2(atom::ERROR.clone(), kind, Term::atom(message));
        Self {
            ball: PortableTerm::from_term(&ball),
            message: message.to_owned(),
        }
    }

    pub fn instantiation_error(message: &str) -> Self {
        Self::error(Term::atom("instantiation_error"), message)
    }

    pub fn type_error(ty: &str, culprit: &Term, message: &str) -> Self {
        Self::error(
            Term::functor2("type_error", Term::atom(ty), culprit.clone()),
            message,
        )
    }

    pub fn domain_error(domain: &str, culprit: &Term, message: &str) -> Self {
        Self::error(
            Term::functor2("domain_error", Term::atom(domain), culprit.clone()),
            message,
        )
    }

    pub fn existence_error(kind: &str, culprit: &Term, message: &str) -> Self {
        Self::error(
            Term::functor2("existence_error", Term::atom(kind), culprit.clone()),
            message,
        )
    }

    /// `existence_error(procedure, Name/Arity)`.
    pub fn unknown_procedure(name: &Atom, arity: usize) -> Self {
        Self::existence_error(
            "procedure",
            &Term::indicator(name, arity),
            &format!("Undefined predicate: {}/{}", name, arity),
        )
    }

    pub fn permission_error(operation: &str, ty: &str, culprit: &Term, message: &str) -> Self {
        Self::error(
            Term::functor3(
                "permission_error",
                Term::atom(operation),
                Term::atom(ty),
                culprit.clone(),
            ),
            message,
        )
    }

    pub fn representation_error(limit: &str, message: &str) -> Self {
        Self::error(
            Term::functor1("representation_error", Term::atom(limit)),
            message,
        )
    }

    pub fn evaluation_error(error: &str, message: &str) -> Self {
        Self::error(
            Term::functor1("evaluation_error", Term::atom(error)),
            message,
        )
    }

    /// A fresh live copy of the thrown term.
    pub fn term(&self) -> Term {
        self.ball.to_term()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Decode `error(type_error(Type, Culprit), Message)`.
    pub fn type_error_info(&self) -> Option<TypeErrorInfo> {
        let (kind, message) = self.iso_error("type_error")?;
        Some(TypeErrorInfo {
            ty: kind.0,
            culprit: kind.1,
            message,
        })
    }

    /// Decode `error(existence_error(Type, Culprit), Message)`.
    pub fn existence_error_info(&self) -> Option<ExistenceErrorInfo> {
        let (kind, message) = self.iso_error("existence_error")?;
        Some(ExistenceErrorInfo {
            ty: kind.0,
            culprit: kind.1,
            message,
        })
    }

    fn iso_error(&self, name: &str) -> Option<((Atom, Term), Term)> {
        let term = self.term();
        if !term.is_functor(&atom::ERROR, 2) {
            return None;
        }

        let args = term.functor_args();
        let kind = &args[0];
        if !kind.is_functor(&Atom::a(name), 2) {
            return None;
        }

        let kind_args = kind.functor_args();
        let ty = kind_args[0].as_atom()?;
        Some(((ty, kind_args[1].clone()), args[1].clone()))
    }
}

impl fmt::Display for PrologException {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Debug for PrologException {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("PrologException")
            .field("ball", &self.ball)
            .field("message", &self.message)
            .finish()
    }
}

impl Fail for PrologException {}

/// The decoded parts of a `type_error`.
#[derive(Debug, Clone)]
pub struct TypeErrorInfo {
    pub ty: Atom,
    pub culprit: Term,
    pub message: Term,
}

/// The decoded parts of an `existence_error`.
#[derive(Debug, Clone)]
pub struct ExistenceErrorInfo {
    pub ty: Atom,
    pub culprit: Term,
    pub message: Term,
}

impl ExistenceErrorInfo {
    /// The missing procedure as `(Name, Arity)`, when the culprit is a
    /// `procedure` indicator.
    pub fn procedure(&self) -> Option<(Atom, i64)> {
        if self.ty.name() != "procedure" || !self.culprit.is_functor(&atom::SLASH, 2) {
            return None;
        }

        let args = self.culprit.functor_args();
        Some((args[0].as_atom()?, args[1].as_int()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_terms_take_iso_shape() {
        let e = PrologException::type_error("integer", &Term::atom("foo"), "not an integer");
        assert_eq!(
            e.term(),
            Term::functor2(
                "error",
                Term::functor2("type_error", Term::atom("integer"), Term::atom("foo")),
                Term::atom("not an integer")
            )
        );

        let info = e.type_error_info().unwrap();
        assert_eq!(info.ty, Atom::a("integer"));
        assert_eq!(info.culprit, Term::atom("foo"));
        assert!(e.existence_error_info().is_none());
    }

    #[test]
    fn existence_info_decodes_indicator() {
        let e = PrologException::unknown_procedure(&Atom::a("brother"), 2);
        let info = e.existence_error_info().unwrap();
        assert_eq!(info.procedure(), Some((Atom::a("brother"), 2)));
    }

    #[test]
    fn thrown_ball_survives_unbinding() {
        let mut trail = crate::trail::Trail::new();
        let x = Term::var();
        assert!(trail.unify(&x, &Term::int(1)));
        let e = PrologException::new(&Term::functor1("my_error", x.clone()));
        trail.clear();
        assert_eq!(e.term(), Term::functor1("my_error", Term::int(1)));
    }
}
