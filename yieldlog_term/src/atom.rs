use ::{
    serde::{Serialize, Serializer},
    std::{
        cmp::Ordering,
        fmt,
        hash::{Hash, Hasher},
    },
    string_cache::DefaultAtom,
};

/// An interned symbolic constant.
///
/// Unqualified atoms are backed by the process-wide `string_cache` intern
/// table, so two of them with the same name are the same interned string and
/// compare by identity. A module-qualified atom keeps its module alongside the
/// name, but equality, ordering and hashing only ever look at the name.
#[derive(Clone)]
pub struct Atom {
    name: DefaultAtom,
    module: Option<DefaultAtom>,
}

impl Atom {
    /// Intern `name` as an unqualified atom.
    pub fn a(name: &str) -> Self {
        Self {
            name: DefaultAtom::from(name),
            module: None,
        }
    }

    /// Build an atom qualified by `module`. Qualifying by `[]` is the same as
    /// not qualifying at all.
    pub fn with_module(name: &str, module: &Atom) -> Self {
        if module.name == *NIL_NAME || module.name.is_empty() {
            Self::a(name)
        } else {
            Self {
                name: DefaultAtom::from(name),
                module: Some(module.name.clone()),
            }
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn module(&self) -> Option<Atom> {
        self.module.as_ref().map(|m| Atom::a(m))
    }

    pub fn is_qualified(&self) -> bool {
        self.module.is_some()
    }

    /// The same atom with its module qualifier dropped.
    pub fn unqualified(&self) -> Atom {
        Self {
            name: self.name.clone(),
            module: None,
        }
    }

    /// Write the atom the way `writeq` would: bare when it reads back as the
    /// same atom, single-quoted otherwise.
    pub fn to_quoted_string(&self) -> String {
        let name: &str = &self.name;
        if name.is_empty() {
            return "''".to_owned();
        }

        if is_solo(name) || is_letter_atom(name) || is_symbol_atom(name) {
            return name.to_owned();
        }

        let mut quoted = String::with_capacity(name.len() + 2);
        quoted.push('\'');
        for c in name.chars() {
            match c {
                '\'' => quoted.push_str("''"),
                '\\' => quoted.push_str("\\\\"),
                '\n' => quoted.push_str("\\n"),
                '\t' => quoted.push_str("\\t"),
                c => quoted.push(c),
            }
        }
        quoted.push('\'');
        quoted
    }
}

fn is_solo(name: &str) -> bool {
    matches!(name, "[]" | "!" | ";" | "{}" | ",")
}

fn is_letter_atom(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_lowercase() => {
            chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
        }
        _ => false,
    }
}

fn is_symbol_atom(name: &str) -> bool {
    name.chars().all(|c| "+-*/\\^<>=~:.?@#&$".contains(c))
}

lazy_static::lazy_static! {
    static ref NIL_NAME: DefaultAtom = DefaultAtom::from("[]");
}

impl PartialEq for Atom {
    #[inline]
    fn eq(&self, other: &Atom) -> bool {
        self.name == other.name
    }
}

impl Eq for Atom {}

impl Hash for Atom {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl PartialOrd for Atom {
    fn partial_cmp(&self, other: &Atom) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Atom {
    fn cmp(&self, other: &Atom) -> Ordering {
        if self.name == other.name {
            Ordering::Equal
        } else {
            self.name().cmp(other.name())
        }
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl fmt::Debug for Atom {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.module {
            Some(module) => write!(f, "{}:{}", module, self.to_quoted_string()),
            None => f.write_str(&self.to_quoted_string()),
        }
    }
}

impl<'a> From<&'a str> for Atom {
    fn from(name: &'a str) -> Self {
        Atom::a(name)
    }
}

impl Serialize for Atom {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.name)
    }
}

/// Declares the reserved atoms the rest of the system refers to by name.
macro_rules! reserved_atoms {
    ($($(#[$meta:meta])* $ident:ident => $name:expr,)*) => {
        lazy_static::lazy_static! {
            $($(#[$meta])* pub static ref $ident: Atom = Atom::a($name);)*
        }
    };
}

reserved_atoms! {
    /// The empty list.
    NIL => "[]",
    /// The list-pair functor.
    DOT => ".",
    TRUE => "true",
    FAIL => "fail",
    FALSE => "false",
    CUT => "!",
    COMMA => ",",
    SEMICOLON => ";",
    ARROW => "->",
    NECK => ":-",
    NOT => "\\+",
    HAT => "^",
    SLASH => "/",
    CALL => "call",
    ONCE => "once",
    ERROR => "error",
    MINUS => "-",
    PLUS => "+",
    EQUAL => "=",
    COLON => ":",
    DOUBLE_COLON => "::",
    CURLY => "{}",
    EMPTY => "",
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unqualified_atoms_are_interned() {
        let a = Atom::a("hillary");
        let b = Atom::a(&String::from("hillary"));
        assert_eq!(a, b);
        assert_eq!(a.name(), "hillary");
        assert_ne!(a, Atom::a("chelsea"));
    }

    #[test]
    fn qualified_atoms_compare_by_name() {
        let module = Atom::a("family");
        let qualified = Atom::with_module("brother", &module);
        assert!(qualified.is_qualified());
        assert_eq!(qualified, Atom::a("brother"));
        assert_eq!(qualified.module(), Some(module));
        assert!(!Atom::with_module("brother", &NIL).is_qualified());
    }

    #[test]
    fn quoting() {
        assert_eq!(Atom::a("foo_Bar1").to_quoted_string(), "foo_Bar1");
        assert_eq!(Atom::a("Foo").to_quoted_string(), "'Foo'");
        assert_eq!(Atom::a("it's").to_quoted_string(), "'it''s'");
        assert_eq!(Atom::a("").to_quoted_string(), "''");
        assert_eq!(NIL.to_quoted_string(), "[]");
        assert_eq!(Atom::a(":-").to_quoted_string(), ":-");
        assert_eq!(Atom::a("hello world").to_quoted_string(), "'hello world'");
    }
}
