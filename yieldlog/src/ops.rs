//! The standard operator table read by `current_op/3`.

use crate::indexed::IndexedAnswers;

use ::yieldlog_term::Term;

/// `(Priority, Specifier, Operator)` for every standard ISO operator.
pub const STANDARD_OPERATORS: &[(i64, &str, &str)] = &[
    (1200, "xfx", ":-"),
    (1200, "xfx", "-->"),
    (1200, "fx", ":-"),
    (1200, "fx", "?-"),
    (1100, "xfy", ";"),
    (1050, "xfy", "->"),
    (1000, "xfy", ","),
    (900, "fy", "\\+"),
    (700, "xfx", "="),
    (700, "xfx", "\\="),
    (700, "xfx", "=="),
    (700, "xfx", "\\=="),
    (700, "xfx", "@<"),
    (700, "xfx", "@=<"),
    (700, "xfx", "@>"),
    (700, "xfx", "@>="),
    (700, "xfx", "=.."),
    (700, "xfx", "is"),
    (700, "xfx", "=:="),
    (700, "xfx", "=\\="),
    (700, "xfx", "<"),
    (700, "xfx", "=<"),
    (700, "xfx", ">"),
    (700, "xfx", ">="),
    (600, "xfy", ":"),
    (500, "yfx", "+"),
    (500, "yfx", "-"),
    (500, "yfx", "/\\"),
    (500, "yfx", "\\/"),
    (400, "yfx", "*"),
    (400, "yfx", "/"),
    (400, "yfx", "//"),
    (400, "yfx", "rem"),
    (400, "yfx", "mod"),
    (400, "yfx", "<<"),
    (400, "yfx", ">>"),
    (200, "xfx", "**"),
    (200, "xfy", "^"),
    (200, "fy", "-"),
    (200, "fy", "\\"),
];

pub const OPERATOR_SPECIFIERS: &[&str] = &["xfx", "xfy", "yfx", "fy", "fx", "xf", "yf"];

/// A fresh store holding [`STANDARD_OPERATORS`].
pub fn standard_operators() -> IndexedAnswers {
    let mut operators = IndexedAnswers::new(3);
    for &(priority, specifier, name) in STANDARD_OPERATORS {
        let answer = [Term::int(priority), Term::atom(specifier), Term::atom(name)];
        if let Err(error) = operators.add_answer(&answer) {
            tracing::error!(%error, operator = name, "failed to load standard operator");
        }
    }
    operators
}
