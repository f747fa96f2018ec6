use crate::error::{PrologException, Result};

use ::yieldlog_term::{Atom, Term};

/// The highest arity a compound term may have.
pub const MAX_ARITY: usize = 255;

/// What happens when a goal names a predicate nobody defined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unknown {
    Error,
    Fail,
    Warning,
}

impl Unknown {
    fn name(self) -> &'static str {
        match self {
            Unknown::Error => "error",
            Unknown::Fail => "fail",
            Unknown::Warning => "warning",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        match name {
            "error" => Some(Unknown::Error),
            "fail" => Some(Unknown::Fail),
            "warning" => Some(Unknown::Warning),
            _ => None,
        }
    }
}

/// How a double-quoted token is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DoubleQuotes {
    Codes,
    Chars,
    Atom,
}

impl DoubleQuotes {
    fn name(self) -> &'static str {
        match self {
            DoubleQuotes::Codes => "codes",
            DoubleQuotes::Chars => "chars",
            DoubleQuotes::Atom => "atom",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        match name {
            "codes" => Some(DoubleQuotes::Codes),
            "chars" => Some(DoubleQuotes::Chars),
            "atom" => Some(DoubleQuotes::Atom),
            _ => None,
        }
    }
}

/// The flag names in the order `current_prolog_flag/2` enumerates them.
pub const FLAG_NAMES: &[&str] = &[
    "bounded",
    "max_integer",
    "min_integer",
    "integer_rounding_function",
    "char_conversion",
    "debug",
    "max_arity",
    "unknown",
    "double_quotes",
];

/// The Prolog flags of one machine. `char_conversion` and `debug` accept
/// only their current value, since neither has an effect here.
#[derive(Debug, Clone)]
pub struct PrologFlags {
    pub unknown: Unknown,
    pub double_quotes: DoubleQuotes,
    char_conversion: bool,
    debug: bool,
}

impl Default for PrologFlags {
    fn default() -> Self {
        Self {
            unknown: Unknown::Error,
            double_quotes: DoubleQuotes::Codes,
            char_conversion: false,
            debug: false,
        }
    }
}

fn on_off(on: bool) -> Term {
    Term::atom(if on { "on" } else { "off" })
}

impl PrologFlags {
    pub fn new() -> Self {
        Self::default()
    }

    /// The current value of the named flag.
    pub fn get(&self, name: &str) -> Option<Term> {
        let value = match name {
            "bounded" => Term::atom("true"),
            "max_integer" => Term::int(i64::max_value()),
            "min_integer" => Term::int(i64::min_value()),
            "integer_rounding_function" => Term::atom("toward_zero"),
            "char_conversion" => on_off(self.char_conversion),
            "debug" => on_off(self.debug),
            "max_arity" => Term::int(MAX_ARITY as i64),
            "unknown" => Term::atom(self.unknown.name()),
            "double_quotes" => Term::atom(self.double_quotes.name()),
            _ => return None,
        };
        Some(value)
    }

    /// Every flag paired with its value.
    pub fn entries(&self) -> Vec<(Atom, Term)> {
        FLAG_NAMES
            .iter()
            .filter_map(|name| Some((Atom::a(name), self.get(name)?)))
            .collect()
    }

    /// Check `Flag` for `current_prolog_flag/2` when it is bound.
    pub fn lookup(&self, key: &Term) -> Result<Term> {
        let name = key.as_atom().ok_or_else(|| {
            PrologException::type_error("atom", key, "Arg 1 Key is not an atom")
        })?;
        self.get(name.name()).ok_or_else(|| {
            PrologException::domain_error("prolog_flag", key, "Arg 1 Key is not a recognized flag")
                .into()
        })
    }

    /// `set_prolog_flag(Key, Value)`.
    pub fn set(&mut self, key: &Term, value: &Term) -> Result<()> {
        let (key, value) = (key.value(), value.value());
        if key.is_var() {
            return Err(PrologException::instantiation_error("Arg 1 Key is an unbound variable").into());
        }
        if value.is_var() {
            return Err(PrologException::instantiation_error("Arg 2 Value is an unbound variable").into());
        }

        let name = key.as_atom().ok_or_else(|| {
            PrologException::type_error("atom", &key, "Arg 1 Key is not an atom")
        })?;
        let current = self.get(name.name()).ok_or_else(|| {
            PrologException::domain_error(
                "prolog_flag",
                &key,
                &format!("Arg 1 Key {} is not a recognized flag", name),
            )
        })?;

        let value_name = value.as_atom();
        let value_name = value_name.as_ref().map(Atom::name);
        let accepted = match name.name() {
            "char_conversion" | "debug" => value == current,
            "unknown" => match value_name.and_then(Unknown::from_name) {
                Some(unknown) => {
                    self.unknown = unknown;
                    true
                }
                None => false,
            },
            "double_quotes" => match value_name.and_then(DoubleQuotes::from_name) {
                Some(double_quotes) => {
                    self.double_quotes = double_quotes;
                    true
                }
                None => false,
            },
            _ => {
                return Err(PrologException::permission_error(
                    "modify",
                    "flag",
                    &key,
                    &format!("May not modify Prolog flag {}", name),
                )
                .into())
            }
        };

        if !accepted {
            return Err(PrologException::domain_error(
                "flag_value",
                &Term::functor2("+", key.clone(), value.clone()),
                &format!("May not set arg 1 Key {} to arg 2 Value {}", name, value),
            )
            .into());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn error_kind(result: Result<()>) -> Term {
        let e = result.unwrap_err();
        e.exception().unwrap().term().functor_args()[0].clone()
    }

    #[test]
    fn defaults() {
        let flags = PrologFlags::new();
        assert_eq!(flags.get("unknown"), Some(Term::atom("error")));
        assert_eq!(flags.get("max_arity"), Some(Term::int(255)));
        assert_eq!(flags.get("double_quotes"), Some(Term::atom("codes")));
        assert_eq!(flags.entries().len(), FLAG_NAMES.len());
        assert!(flags.get("nonsense").is_none());
    }

    #[test]
    fn set_validates() {
        let mut flags = PrologFlags::new();
        flags.set(&Term::atom("unknown"), &Term::atom("fail")).unwrap();
        assert_eq!(flags.unknown, Unknown::Fail);

        assert_eq!(
            error_kind(flags.set(&Term::var(), &Term::atom("fail"))),
            Term::atom("instantiation_error")
        );
        assert_eq!(
            error_kind(flags.set(&Term::atom("bounded"), &Term::atom("false"))),
            Term::functor3(
                "permission_error",
                Term::atom("modify"),
                Term::atom("flag"),
                Term::atom("bounded")
            )
        );
        assert_eq!(
            error_kind(flags.set(&Term::atom("unknown"), &Term::atom("loud"))),
            Term::functor2(
                "domain_error",
                Term::atom("flag_value"),
                Term::functor2("+", Term::atom("unknown"), Term::atom("loud"))
            )
        );
        assert_eq!(
            error_kind(flags.set(&Term::atom("colour"), &Term::atom("red"))),
            Term::functor2("domain_error", Term::atom("prolog_flag"), Term::atom("colour"))
        );

        flags.set(&Term::atom("debug"), &Term::atom("off")).unwrap();
        assert!(flags.set(&Term::atom("debug"), &Term::atom("on")).is_err());
    }
}
