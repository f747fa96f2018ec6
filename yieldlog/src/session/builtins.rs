//! Builtin predicates. Deterministic builtins succeed or fail outright;
//! nondeterministic ones return every argument vector they would yield, and
//! the session unifies the goal's arguments with each in turn.
//!
//! Control constructs and the builtins that keep a resumable walk over the
//! database (`repeat/0`, `retract/1`, `clause/2`, `current_op/3`) are handled
//! by the session itself.

use crate::{
    arith::{self, Number},
    database::{predicate_indicator, PredicateKey, Position},
    error::{PrologError, PrologException, Result},
    flags::MAX_ARITY,
    machine::Machine,
    ops::OPERATOR_SPECIFIERS,
};

use ::{
    lazy_static::lazy_static,
    std::{cmp::Ordering, collections::HashMap, convert::TryFrom, io::Write, iter},
    yieldlog_term::{atom, compare, sort_unique, Atom, Term},
};

pub type DetFn = fn(&mut Machine, &[Term]) -> Result<bool>;
pub type NondetFn = fn(&mut Machine, &[Term]) -> Result<Vec<Vec<Term>>>;

#[derive(Clone, Copy)]
pub enum Builtin {
    Det(DetFn),
    Nondet(NondetFn),
}

/// Goals the session resolves on its own, before consulting the builtin table.
const CONTROL_CONSTRUCTS: &[(&str, usize)] = &[
    (",", 2),
    (";", 2),
    ("->", 2),
    ("\\+", 1),
    ("!", 0),
    ("true", 0),
    ("fail", 0),
    ("false", 0),
    ("call", 1),
    ("call", 2),
    ("call", 3),
    ("call", 4),
    ("call", 5),
    ("call", 6),
    ("call", 7),
    ("call", 8),
    ("catch", 3),
    ("findall", 3),
    ("bagof", 3),
    ("setof", 3),
    ("once", 1),
    ("^", 2),
    ("repeat", 0),
    ("retract", 1),
    ("clause", 2),
    ("current_op", 3),
    (".", 2),
];

macro_rules! builtins {
    ($($kind:ident $name:expr, $arity:expr => $f:ident;)*) => {
        lazy_static! {
            static ref BUILTINS: HashMap<PredicateKey, Builtin> = {
                let mut table = HashMap::new();
                $(table.insert(PredicateKey::new(Atom::a($name), $arity), Builtin::$kind($f));)*
                table
            };
        }
    };
}

builtins! {
    Det "var", 1 => builtin_var;
    Det "nonvar", 1 => builtin_nonvar;
    Det "atom", 1 => builtin_atom;
    Det "integer", 1 => builtin_integer;
    Det "float", 1 => builtin_float;
    Det "number", 1 => builtin_number;
    Det "atomic", 1 => builtin_atomic;
    Det "compound", 1 => builtin_compound;
    Det "callable", 1 => builtin_callable;
    Det "is_list", 1 => builtin_is_list;
    Det "ground", 1 => builtin_ground;

    Det "=", 2 => builtin_unify;
    Det "\\=", 2 => builtin_not_unifiable;
    Det "==", 2 => builtin_identical;
    Det "\\==", 2 => builtin_not_identical;
    Det "@<", 2 => builtin_term_less;
    Det "@=<", 2 => builtin_term_less_or_equal;
    Det "@>", 2 => builtin_term_greater;
    Det "@>=", 2 => builtin_term_greater_or_equal;
    Det "compare", 3 => builtin_compare;

    Det "functor", 3 => builtin_functor;
    Det "arg", 3 => builtin_arg;
    Det "=..", 2 => builtin_univ;
    Det "copy_term", 2 => builtin_copy_term;

    Det "is", 2 => builtin_is;
    Det "=:=", 2 => builtin_arith_equal;
    Det "=\\=", 2 => builtin_arith_not_equal;
    Det "<", 2 => builtin_arith_less;
    Det ">", 2 => builtin_arith_greater;
    Det "=<", 2 => builtin_arith_less_or_equal;
    Det ">=", 2 => builtin_arith_greater_or_equal;

    Det "atom_length", 2 => builtin_atom_length;
    Nondet "atom_concat", 3 => builtin_atom_concat;
    Nondet "sub_atom", 5 => builtin_sub_atom;
    Det "atom_chars", 2 => builtin_atom_chars;
    Det "atom_codes", 2 => builtin_atom_codes;
    Det "char_code", 2 => builtin_char_code;
    Det "number_chars", 2 => builtin_number_chars;
    Det "number_codes", 2 => builtin_number_codes;
    Det "atom_number", 2 => builtin_atom_number;

    Det "length", 2 => builtin_length;
    Det "msort", 2 => builtin_msort;
    Det "sort", 2 => builtin_sort;

    Det "assert", 1 => builtin_assertz;
    Det "asserta", 1 => builtin_asserta;
    Det "assertz", 1 => builtin_assertz;
    Det "retractall", 1 => builtin_retractall;
    Det "abolish", 1 => builtin_abolish;
    Nondet "current_predicate", 1 => builtin_current_predicate;

    Det "throw", 1 => builtin_throw;

    Nondet "current_prolog_flag", 2 => builtin_current_prolog_flag;
    Det "set_prolog_flag", 2 => builtin_set_prolog_flag;

    Det "write", 1 => builtin_write;
    Det "print", 1 => builtin_write;
    Det "writeq", 1 => builtin_writeq;
    Det "nl", 0 => builtin_nl;
    Det "put_code", 1 => builtin_put_code;
    Det "tab", 1 => builtin_tab;
}

pub fn lookup(key: &PredicateKey) -> Option<Builtin> {
    BUILTINS.get(key).copied()
}

/// True for control constructs and builtins, which may not be asserted to,
/// retracted from, inspected with `clause/2` or abolished.
pub fn is_system_predicate(name: &Atom, arity: usize) -> bool {
    CONTROL_CONSTRUCTS
        .iter()
        .any(|&(n, a)| a == arity && n == name.name())
        || BUILTINS.contains_key(&PredicateKey::new(name.unqualified(), arity))
}

fn instantiation_error(message: &str) -> PrologError {
    PrologException::instantiation_error(message).into()
}

fn type_error(ty: &str, culprit: &Term, message: &str) -> PrologError {
    PrologException::type_error(ty, culprit, message).into()
}

fn domain_error(domain: &str, culprit: &Term, message: &str) -> PrologError {
    PrologException::domain_error(domain, culprit, message).into()
}

fn representation_error(limit: &str, message: &str) -> PrologError {
    PrologException::representation_error(limit, message).into()
}

/// An optional non-negative integer argument: unbound, or checked.
fn optional_count(term: &Term, what: &str) -> Result<Option<usize>> {
    let term = term.value();
    if term.is_var() {
        return Ok(None);
    }
    let n = term
        .as_int()
        .ok_or_else(|| type_error("integer", &term, &format!("{} must be var or integer", what)))?;
    if n < 0 {
        return Err(domain_error(
            "not_less_than_zero",
            &term,
            &format!("{} must not be less than zero", what),
        ));
    }
    Ok(Some(n as usize))
}

fn builtin_var(_: &mut Machine, args: &[Term]) -> Result<bool> {
    Ok(args[0].is_var())
}

fn builtin_nonvar(_: &mut Machine, args: &[Term]) -> Result<bool> {
    Ok(!args[0].is_var())
}

fn builtin_atom(_: &mut Machine, args: &[Term]) -> Result<bool> {
    Ok(args[0].is_atom())
}

fn builtin_integer(_: &mut Machine, args: &[Term]) -> Result<bool> {
    Ok(args[0].as_int().is_some())
}

fn builtin_float(_: &mut Machine, args: &[Term]) -> Result<bool> {
    Ok(matches!(args[0].value(), Term::Float(_)))
}

fn builtin_number(_: &mut Machine, args: &[Term]) -> Result<bool> {
    Ok(args[0].is_number())
}

fn builtin_atomic(_: &mut Machine, args: &[Term]) -> Result<bool> {
    Ok(args[0].is_atomic())
}

fn builtin_compound(_: &mut Machine, args: &[Term]) -> Result<bool> {
    Ok(args[0].is_compound())
}

fn builtin_callable(_: &mut Machine, args: &[Term]) -> Result<bool> {
    Ok(args[0].is_callable())
}

fn builtin_is_list(_: &mut Machine, args: &[Term]) -> Result<bool> {
    Ok(args[0].list_items().is_some())
}

fn builtin_ground(_: &mut Machine, args: &[Term]) -> Result<bool> {
    Ok(args[0].ground())
}

fn builtin_unify(m: &mut Machine, args: &[Term]) -> Result<bool> {
    Ok(m.trail.unify(&args[0], &args[1]))
}

fn builtin_not_unifiable(m: &mut Machine, args: &[Term]) -> Result<bool> {
    let mut scope = m.trail.scope();
    Ok(!scope.unify(&args[0], &args[1]))
}

fn builtin_identical(_: &mut Machine, args: &[Term]) -> Result<bool> {
    Ok(args[0].term_equal(&args[1]))
}

fn builtin_not_identical(_: &mut Machine, args: &[Term]) -> Result<bool> {
    Ok(!args[0].term_equal(&args[1]))
}

fn builtin_term_less(_: &mut Machine, args: &[Term]) -> Result<bool> {
    Ok(compare(&args[0], &args[1]) == Ordering::Less)
}

fn builtin_term_less_or_equal(_: &mut Machine, args: &[Term]) -> Result<bool> {
    Ok(compare(&args[0], &args[1]) != Ordering::Greater)
}

fn builtin_term_greater(_: &mut Machine, args: &[Term]) -> Result<bool> {
    Ok(compare(&args[0], &args[1]) == Ordering::Greater)
}

fn builtin_term_greater_or_equal(_: &mut Machine, args: &[Term]) -> Result<bool> {
    Ok(compare(&args[0], &args[1]) != Ordering::Less)
}

fn builtin_compare(m: &mut Machine, args: &[Term]) -> Result<bool> {
    let order = args[0].value();
    if !order.is_var() {
        let name = order
            .as_atom()
            .ok_or_else(|| type_error("atom", &order, "Arg 1 Order is not var or atom"))?;
        if !["<", "=", ">"].contains(&name.name()) {
            return Err(domain_error("order", &order, "Arg 1 Order is not <, = or >"));
        }
    }

    let symbol = match compare(&args[1], &args[2]) {
        Ordering::Less => "<",
        Ordering::Equal => "=",
        Ordering::Greater => ">",
    };
    Ok(m.trail.unify(&order, &Term::atom(symbol)))
}

fn builtin_functor(m: &mut Machine, args: &[Term]) -> Result<bool> {
    let term = args[0].value();
    if !term.is_var() {
        let (name, arity) = match term.name_arity() {
            Some((name, arity)) => (Term::Atom(name), arity),
            None => (term.clone(), 0),
        };
        return Ok(m
            .trail
            .unify_arrays(&args[1..], &[name, Term::int(arity as i64)]));
    }

    let (name, arity) = (args[1].value(), args[2].value());
    if name.is_var() {
        return Err(instantiation_error(
            "Arg 1 Term is an unbound variable, so arg 2 Name must be bound",
        ));
    }
    if arity.is_var() {
        return Err(instantiation_error(
            "Arg 1 Term is an unbound variable, so arg 3 Arity must be bound",
        ));
    }
    let n = arity
        .as_int()
        .ok_or_else(|| type_error("integer", &arity, "Arg 3 Arity is not an integer"))?;
    if !name.is_atomic() {
        return Err(type_error("atomic", &name, "Arg 2 Name is not atomic"));
    }
    if n < 0 {
        return Err(domain_error(
            "not_less_than_zero",
            &arity,
            "Arg 3 Arity may not be less than zero",
        ));
    }
    if n == 0 {
        return Ok(m.trail.unify(&term, &name));
    }
    if n as usize > MAX_ARITY {
        return Err(representation_error(
            "max_arity",
            &format!("Functor arity {} may not be greater than {}", n, MAX_ARITY),
        ));
    }
    let name = name.as_atom().ok_or_else(|| {
        type_error(
            "atom",
            &name,
            "Arity is greater than zero, so arg 2 Name must be an atom",
        )
    })?;

    let fresh = Term::functor(name, (0..n).map(|_| Term::var()));
    Ok(m.trail.unify(&term, &fresh))
}

fn builtin_arg(m: &mut Machine, args: &[Term]) -> Result<bool> {
    let n = args[0].value();
    if n.is_var() {
        return Err(instantiation_error("Arg 1 N is an unbound variable"));
    }
    let index = n
        .as_int()
        .ok_or_else(|| type_error("integer", &n, "Arg 1 N must be an integer"))?;
    if index < 0 {
        return Err(domain_error(
            "not_less_than_zero",
            &n,
            "Arg 1 N must not be less than zero",
        ));
    }

    let term = args[1].value();
    if term.is_var() {
        return Err(instantiation_error("Arg 2 Term is an unbound variable"));
    }
    if !term.is_compound() {
        return Err(type_error("compound", &term, "Arg 2 Term must be compound"));
    }

    let term_args = term.functor_args();
    match (index as usize).checked_sub(1).and_then(|i| term_args.get(i)) {
        Some(arg) => Ok(m.trail.unify(arg, &args[2])),
        None => Ok(false),
    }
}

fn builtin_univ(m: &mut Machine, args: &[Term]) -> Result<bool> {
    let term = args[0].value();
    if !term.is_var() {
        let list = match term.name_arity() {
            Some((name, _)) => Term::list(iter::once(Term::Atom(name)).chain(term.functor_args())),
            None => Term::list(vec![term.clone()]),
        };
        return Ok(m.trail.unify(&list, &args[1]));
    }

    let list = args[1].value();
    let items = match list.list_items() {
        Some(items) => items,
        None if list.is_var() => {
            return Err(instantiation_error(
                "Arg 1 Term and arg 2 List are both unbound variables",
            ))
        }
        None => return Err(type_error("list", &list, "Arg 2 List is not a list")),
    };

    let (head, rest) = match items.split_first() {
        Some(split) => split,
        None => {
            return Err(domain_error(
                "non_empty_list",
                &list,
                "Arg 2 List may not be empty",
            ))
        }
    };
    let head = head.value();
    if rest.is_empty() {
        return Ok(m.trail.unify(&term, &head));
    }
    if rest.len() > MAX_ARITY {
        return Err(representation_error(
            "max_arity",
            &format!("Functor arity {} may not be greater than {}", rest.len(), MAX_ARITY),
        ));
    }
    let name = head.as_atom().ok_or_else(|| {
        type_error(
            "atom",
            &head,
            "Arg 2 List has arguments, so its first element must be an atom",
        )
    })?;

    Ok(m.trail.unify(&term, &Term::functor(name, rest.iter().cloned())))
}

fn builtin_copy_term(m: &mut Machine, args: &[Term]) -> Result<bool> {
    let copy = crate::copy::copy_term(&args[0]);
    Ok(m.trail.unify(&copy, &args[1]))
}

fn builtin_is(m: &mut Machine, args: &[Term]) -> Result<bool> {
    let value = arith::eval(&args[1])?.to_term();
    Ok(m.trail.unify(&args[0], &value))
}

fn builtin_arith_equal(_: &mut Machine, args: &[Term]) -> Result<bool> {
    Ok(arith::compare(&args[0], &args[1])? == Ordering::Equal)
}

fn builtin_arith_not_equal(_: &mut Machine, args: &[Term]) -> Result<bool> {
    Ok(arith::compare(&args[0], &args[1])? != Ordering::Equal)
}

fn builtin_arith_less(_: &mut Machine, args: &[Term]) -> Result<bool> {
    Ok(arith::compare(&args[0], &args[1])? == Ordering::Less)
}

fn builtin_arith_greater(_: &mut Machine, args: &[Term]) -> Result<bool> {
    Ok(arith::compare(&args[0], &args[1])? == Ordering::Greater)
}

fn builtin_arith_less_or_equal(_: &mut Machine, args: &[Term]) -> Result<bool> {
    Ok(arith::compare(&args[0], &args[1])? != Ordering::Greater)
}

fn builtin_arith_greater_or_equal(_: &mut Machine, args: &[Term]) -> Result<bool> {
    Ok(arith::compare(&args[0], &args[1])? != Ordering::Less)
}

/// The atom an argument must be bound to.
fn bound_atom(term: &Term, what: &str) -> Result<Atom> {
    let term = term.value();
    if term.is_var() {
        return Err(instantiation_error(&format!("{} is an unbound variable", what)));
    }
    term.as_atom()
        .ok_or_else(|| type_error("atom", &term, &format!("{} is not an atom", what)))
}

/// The atom an argument may be bound to; unbound gives `None`.
fn optional_atom(term: &Term, what: &str) -> Result<Option<Atom>> {
    let term = term.value();
    if term.is_var() {
        return Ok(None);
    }
    term.as_atom()
        .map(Some)
        .ok_or_else(|| type_error("atom", &term, &format!("{} is not var or atom", what)))
}

fn builtin_atom_length(m: &mut Machine, args: &[Term]) -> Result<bool> {
    let atom = bound_atom(&args[0], "Arg 1 Atom")?;
    optional_count(&args[1], "Length")?;
    let length = atom.name().chars().count() as i64;
    Ok(m.trail.unify(&args[1], &Term::int(length)))
}

fn builtin_atom_concat(_: &mut Machine, args: &[Term]) -> Result<Vec<Vec<Term>>> {
    let whole = args[2].value();
    if whole.is_var() {
        if args[0].is_var() {
            return Err(instantiation_error(
                "Arg 1 Start and arg 3 Whole are both var",
            ));
        }
        if args[1].is_var() {
            return Err(instantiation_error("Arg 2 End and arg 3 Whole are both var"));
        }
        let start = bound_atom(&args[0], "Arg 1 Start")?;
        let end = bound_atom(&args[1], "Arg 2 End")?;
        let joined = Term::atom(&format!("{}{}", start.name(), end.name()));
        return Ok(vec![vec![Term::Atom(start), Term::Atom(end), joined]]);
    }

    let name = bound_atom(&whole, "Arg 3 Whole")?;
    let start_length = optional_atom(&args[0], "Arg 1 Start")?.map(|a| a.name().chars().count());
    let end_length = optional_atom(&args[1], "Arg 2 End")?.map(|a| a.name().chars().count());

    let chars: Vec<char> = name.name().chars().collect();
    Ok((0..=chars.len())
        .filter(|&i| start_length.map_or(true, |n| n == i))
        .filter(|&i| end_length.map_or(true, |n| n == chars.len() - i))
        .map(|i| {
            let start: String = chars[..i].iter().collect();
            let end: String = chars[i..].iter().collect();
            vec![Term::atom(&start), Term::atom(&end), whole.clone()]
        })
        .collect())
}

fn builtin_sub_atom(_: &mut Machine, args: &[Term]) -> Result<Vec<Vec<Term>>> {
    let atom = bound_atom(&args[0], "Arg 1 Atom")?;
    let sub = optional_atom(&args[4], "Sub_atom")?;
    let before = optional_count(&args[1], "Before")?;
    let length = optional_count(&args[2], "Length")?;
    let after = optional_count(&args[3], "After")?;

    let chars: Vec<char> = atom.name().chars().collect();
    let n = chars.len();
    let mut found = Vec::new();
    for b in 0..=n {
        if before.map_or(false, |x| x != b) {
            continue;
        }
        for l in 0..=(n - b) {
            if length.map_or(false, |x| x != l) || after.map_or(false, |x| x != n - b - l) {
                continue;
            }
            let text: String = chars[b..b + l].iter().collect();
            if sub.as_ref().map_or(false, |s| s.name() != text) {
                continue;
            }
            found.push(vec![
                Term::Atom(atom.clone()),
                Term::int(b as i64),
                Term::int(l as i64),
                Term::int((n - b - l) as i64),
                Term::atom(&text),
            ]);
        }
    }
    Ok(found)
}

fn chars_list(text: &str) -> Term {
    Term::list(text.chars().map(|c| Term::atom(c.encode_utf8(&mut [0; 4]))))
}

fn codes_list(text: &str) -> Term {
    Term::list(text.chars().map(|c| Term::int(c as i64)))
}

fn single_char(text: &str) -> Option<char> {
    let mut chars = text.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Some(c),
        _ => None,
    }
}

/// The text spelled by a list of one-character atoms.
fn text_from_chars(list: &Term) -> Result<String> {
    let items = list
        .list_items()
        .ok_or_else(|| type_error("list", list, "Arg 2 List is not a list"))?;
    let mut text = String::new();
    for item in items {
        let item = item.value();
        if item.is_var() {
            return Err(instantiation_error(
                "Arg 2 List has an element which is an unbound variable",
            ));
        }
        match item.as_atom().and_then(|a| single_char(a.name())) {
            Some(c) => text.push(c),
            None => {
                return Err(type_error(
                    "character",
                    &item,
                    "Arg 2 List has an element which is not a one character atom",
                ))
            }
        }
    }
    Ok(text)
}

fn char_of_code(code: &Term) -> Result<char> {
    let code = code.value();
    if code.is_var() {
        return Err(instantiation_error("A character code is an unbound variable"));
    }
    code.as_int()
        .and_then(|i| u32::try_from(i).ok())
        .and_then(std::char::from_u32)
        .ok_or_else(|| representation_error("character_code", "Not a character code"))
}

/// The text spelled by a list of character codes.
fn text_from_codes(list: &Term) -> Result<String> {
    let items = list
        .list_items()
        .ok_or_else(|| type_error("list", list, "Arg 2 List is not a list"))?;
    items.iter().map(char_of_code).collect()
}

/// Read a number the way `number_codes/2` does: `0'c` is a character code,
/// `0x` starts a hexadecimal integer, otherwise an integer or a float.
pub fn parse_number(text: &str) -> Result<Term> {
    let syntax_error = || -> PrologError {
        PrologException::error(
            Term::functor1(
                "syntax_error",
                Term::atom(&format!("number_format: {}", text)),
            ),
            "Text is not a number",
        )
        .into()
    };

    let trimmed = text.trim();
    if let Some(rest) = trimmed.strip_prefix("0'") {
        let mut chars = rest.chars();
        return match (chars.next(), chars.next()) {
            (Some(c), None) => Ok(Term::int(c as i64)),
            _ => Err(syntax_error()),
        };
    }
    if let Some(hex) = trimmed.strip_prefix("0x") {
        return i64::from_str_radix(hex, 16)
            .map(Term::int)
            .map_err(|_| syntax_error());
    }
    if let Ok(i) = trimmed.parse::<i64>() {
        return Ok(Term::int(i));
    }
    match trimmed.parse::<f64>() {
        Ok(f) if trimmed.chars().any(|c| c.is_ascii_digit()) => Ok(Term::float(f)),
        _ => Err(syntax_error()),
    }
}

fn builtin_atom_chars(m: &mut Machine, args: &[Term]) -> Result<bool> {
    let atom = args[0].value();
    if atom.is_var() {
        if args[1].is_var() {
            return Err(instantiation_error(
                "Arg 1 Atom and arg 2 List are both unbound variables",
            ));
        }
        let text = text_from_chars(&args[1].value())?;
        return Ok(m.trail.unify(&atom, &Term::atom(&text)));
    }

    let name = bound_atom(&atom, "Arg 1 Atom")?;
    Ok(m.trail.unify(&args[1], &chars_list(name.name())))
}

fn builtin_atom_codes(m: &mut Machine, args: &[Term]) -> Result<bool> {
    let atom = args[0].value();
    if atom.is_var() {
        if args[1].is_var() {
            return Err(instantiation_error(
                "Arg 1 Atom and arg 2 List are both unbound variables",
            ));
        }
        let text = text_from_codes(&args[1].value())?;
        return Ok(m.trail.unify(&atom, &Term::atom(&text)));
    }

    let name = bound_atom(&atom, "Arg 1 Atom")?;
    Ok(m.trail.unify(&args[1], &codes_list(name.name())))
}

fn builtin_char_code(m: &mut Machine, args: &[Term]) -> Result<bool> {
    let (ch, code) = (args[0].value(), args[1].value());
    if !code.is_var() && code.as_int().is_none() {
        return Err(type_error(
            "integer",
            &code,
            "Arg 2 Code is not var or a character code",
        ));
    }

    if ch.is_var() {
        if code.is_var() {
            return Err(instantiation_error(
                "Arg 1 Char and arg 2 Code are both unbound variables",
            ));
        }
        let c = char_of_code(&code)?;
        return Ok(m.trail.unify(&ch, &Term::atom(c.encode_utf8(&mut [0; 4]))));
    }

    match ch.as_atom().and_then(|a| single_char(a.name())) {
        Some(c) => Ok(m.trail.unify(&code, &Term::int(c as i64))),
        None => Err(type_error(
            "character",
            &ch,
            "Arg 1 Char is not var or one-character atom",
        )),
    }
}

fn builtin_number_chars(m: &mut Machine, args: &[Term]) -> Result<bool> {
    let number = args[0].value();
    if number.is_var() {
        if args[1].is_var() {
            return Err(instantiation_error(
                "Arg 1 Number and arg 2 List are both unbound variables",
            ));
        }
        let text = text_from_chars(&args[1].value())?;
        return Ok(m.trail.unify(&number, &parse_number(&text)?));
    }

    if !number.is_number() {
        return Err(type_error("number", &number, "Arg 1 Number is not var or number"));
    }
    Ok(m.trail.unify(&args[1], &chars_list(&number.to_string())))
}

fn builtin_number_codes(m: &mut Machine, args: &[Term]) -> Result<bool> {
    let number = args[0].value();
    if number.is_var() {
        if args[1].is_var() {
            return Err(instantiation_error(
                "Arg 1 Number and arg 2 List are both unbound variables",
            ));
        }
        let text = text_from_codes(&args[1].value())?;
        return Ok(m.trail.unify(&number, &parse_number(&text)?));
    }

    if !number.is_number() {
        return Err(type_error("number", &number, "Arg 1 Number is not var or number"));
    }
    Ok(m.trail.unify(&args[1], &codes_list(&number.to_string())))
}

/// `atom_number(Atom, Number)`. An atom that does not read as a number fails.
fn builtin_atom_number(m: &mut Machine, args: &[Term]) -> Result<bool> {
    let atom = args[0].value();
    if atom.is_var() {
        let number = args[1].value();
        if number.is_var() {
            return Err(instantiation_error(
                "Arg 1 Atom and arg 2 Number are both unbound variables",
            ));
        }
        if !number.is_number() {
            return Err(type_error("number", &number, "Arg 2 Number is not a number"));
        }
        return Ok(m.trail.unify(&atom, &Term::atom(&number.to_string())));
    }

    let name = bound_atom(&atom, "Arg 1 Atom")?;
    match parse_number(name.name()) {
        Ok(number) => Ok(m.trail.unify(&args[1], &number)),
        Err(_) => Ok(false),
    }
}

fn builtin_length(m: &mut Machine, args: &[Term]) -> Result<bool> {
    let length = optional_count(&args[1], "Length")?;

    let mut count = 0;
    let mut list = args[0].value();
    loop {
        let tail = match &list {
            Term::Atom(a) if *a == *atom::NIL => {
                return Ok(m.trail.unify(&args[1], &Term::int(count as i64)));
            }
            Term::Compound(c) if c.is_list_pair() => c.args()[1].value(),
            Term::Var(_) => break,
            _ => return Ok(false),
        };
        count += 1;
        list = tail;
    }

    match length {
        Some(n) if n >= count => {
            let fresh = Term::list((count..n).map(|_| Term::var()));
            Ok(m.trail.unify(&list, &fresh))
        }
        Some(_) => Ok(false),
        None => Err(instantiation_error(
            "Arg 1 List is a partial list, so arg 2 Length must be bound",
        )),
    }
}

fn builtin_msort(m: &mut Machine, args: &[Term]) -> Result<bool> {
    let mut items = match args[0].list_items() {
        Some(items) => items,
        None => return Ok(false),
    };
    items.sort_by(compare);
    Ok(m.trail.unify(&args[1], &Term::list(items)))
}

fn builtin_sort(m: &mut Machine, args: &[Term]) -> Result<bool> {
    let mut items = match args[0].list_items() {
        Some(items) => items,
        None => return Ok(false),
    };
    sort_unique(&mut items);
    Ok(m.trail.unify(&args[1], &Term::list(items)))
}

fn builtin_asserta(m: &mut Machine, args: &[Term]) -> Result<bool> {
    m.database.assert(&args[0], Position::First)?;
    Ok(true)
}

fn builtin_assertz(m: &mut Machine, args: &[Term]) -> Result<bool> {
    m.database.assert(&args[0], Position::Last)?;
    Ok(true)
}

fn builtin_retractall(m: &mut Machine, args: &[Term]) -> Result<bool> {
    m.database.retractall(&args[0])?;
    Ok(true)
}

fn builtin_abolish(m: &mut Machine, args: &[Term]) -> Result<bool> {
    m.database.abolish(&args[0])?;
    Ok(true)
}

/// `current_predicate(Name/Arity)`. A bound indicator is checked against
/// every defined predicate; otherwise the dynamic ones are enumerated.
fn builtin_current_predicate(m: &mut Machine, args: &[Term]) -> Result<Vec<Vec<Term>>> {
    let indicator = args[0].value();
    if indicator.ground() {
        let key = predicate_indicator(&indicator)?;
        return Ok(if m.database.contains(&key) {
            vec![vec![indicator]]
        } else {
            Vec::new()
        });
    }
    if !indicator.is_var() && !indicator.is_functor(&atom::SLASH, 2) {
        return Err(type_error(
            "predicate_indicator",
            &indicator,
            "Must be a name/arity predicate indicator",
        ));
    }

    Ok(m
        .database
        .dynamic_keys()
        .into_iter()
        .map(|key| vec![key.indicator()])
        .collect())
}

fn builtin_throw(_: &mut Machine, args: &[Term]) -> Result<bool> {
    let ball = args[0].value();
    if ball.is_var() {
        return Err(instantiation_error("Arg 1 of throw is an unbound variable"));
    }
    Err(PrologException::new(&ball).into())
}

fn builtin_current_prolog_flag(m: &mut Machine, args: &[Term]) -> Result<Vec<Vec<Term>>> {
    let key = args[0].value();
    if key.is_var() {
        return Ok(m
            .flags
            .entries()
            .into_iter()
            .map(|(name, value)| vec![Term::Atom(name), value])
            .collect());
    }

    let value = m.flags.lookup(&key)?;
    Ok(vec![vec![key, value]])
}

fn builtin_set_prolog_flag(m: &mut Machine, args: &[Term]) -> Result<bool> {
    m.flags.set(&args[0], &args[1])?;
    Ok(true)
}

fn builtin_write(m: &mut Machine, args: &[Term]) -> Result<bool> {
    write!(m.output(), "{}", args[0])?;
    Ok(true)
}

fn builtin_writeq(m: &mut Machine, args: &[Term]) -> Result<bool> {
    write!(m.output(), "{}", args[0].quoted())?;
    Ok(true)
}

fn builtin_nl(m: &mut Machine, _: &[Term]) -> Result<bool> {
    writeln!(m.output())?;
    Ok(true)
}

fn builtin_put_code(m: &mut Machine, args: &[Term]) -> Result<bool> {
    let code = args[0].value();
    if !code.is_var() && code.as_int().is_none() {
        return Err(type_error("integer", &code, "Arg 1 Code is not an integer"));
    }
    let c = char_of_code(&code)?;
    write!(m.output(), "{}", c)?;
    Ok(true)
}

fn builtin_tab(m: &mut Machine, args: &[Term]) -> Result<bool> {
    let n = match arith::eval(&args[0])? {
        Number::Int(n) => n,
        other => {
            return Err(type_error(
                "integer",
                &other.to_term(),
                "Arg 1 N must evaluate to an integer",
            ))
        }
    };
    for _ in 0..n.max(0) {
        m.output().write_all(b" ")?;
    }
    Ok(true)
}

/// Argument checks for `current_op(Priority, Specifier, Operator)`.
pub fn check_current_op(args: &[Term]) -> Result<()> {
    let priority = args[0].value();
    if !priority.is_var() {
        match priority.as_int() {
            Some(p) if (0..=1200).contains(&p) => {}
            _ => {
                return Err(domain_error(
                    "operator_priority",
                    &priority,
                    "Arg 1 Priority is not var or an operator priority",
                ))
            }
        }
    }

    let specifier = args[1].value();
    if !specifier.is_var() {
        match specifier.as_atom() {
            Some(s) if OPERATOR_SPECIFIERS.contains(&s.name()) => {}
            _ => {
                return Err(domain_error(
                    "operator_specifier",
                    &specifier,
                    "Arg 2 Specifier is not var or an operator specifier",
                ))
            }
        }
    }

    let operator = args[2].value();
    if !operator.is_var() && !operator.is_atom() {
        return Err(type_error("atom", &operator, "Arg 3 Operator is not var or atom"));
    }
    Ok(())
}
