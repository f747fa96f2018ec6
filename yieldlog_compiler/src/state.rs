use crate::code::Determinism;

use ::{
    derive_more::From,
    failure::Fail,
    std::collections::{HashMap, HashSet},
    yieldlog::{database::PredicateKey, IndexedAnswers, PrologError, Trail},
    yieldlog_term::{atom, Atom, Term, Variable},
};

pub type Result<T> = ::std::result::Result<T, CompileError>;

#[derive(Debug, Fail, From)]
pub enum CompileError {
    #[fail(display = "{}", _0)]
    Prolog(#[fail(cause)] PrologError),

    #[from(ignore)]
    #[fail(display = "malformed directive `{}`", _0)]
    BadDirective(String),

    #[from(ignore)]
    #[fail(display = "bad determinism declaration `{}`", _0)]
    BadPragma(String),

    #[from(ignore)]
    #[fail(display = "`{}` is not callable", _0)]
    NotCallable(String),
}

/// Builtins which never leave a choice point, taking inputs only.
const DET_BUILTINS: &[(&str, usize)] = &[
    ("nl", 0),
    ("write", 1),
    ("put_code", 1),
    ("throw", 1),
    ("abolish", 1),
    ("retractall", 1),
    ("set_prolog_flag", 2),
    ("tab", 1),
    ("writeq", 1),
    ("print", 1),
];

/// Builtin tests which succeed at most once and bind nothing.
const SEMIDET_BUILTINS: &[(&str, usize)] = &[
    ("var", 1),
    ("nonvar", 1),
    ("atom", 1),
    ("integer", 1),
    ("float", 1),
    ("number", 1),
    ("atomic", 1),
    ("compound", 1),
    ("ground", 1),
    ("==", 2),
    ("\\==", 2),
    ("@<", 2),
    ("@=<", 2),
    ("@>", 2),
    ("@>=", 2),
];

/// Display names which would shadow runtime type names.
const RESERVED_NAMES: &[&str] = &[
    "Atom",
    "Variable",
    "Functor",
    "Functor1",
    "Functor2",
    "Functor3",
    "ListPair",
];

/// `name(univ::in, ...)`.
fn input_modes(name: &str, arity: usize) -> Term {
    Term::functor(
        name,
        (0..arity).map(|_| Term::functor2(atom::DOUBLE_COLON.clone(), Term::atom("univ"), Term::atom("in"))),
    )
}

/// True unless some argument mode of the declared head is `out`, written
/// either `Type::out` or bare `out`.
fn is_none_out(pred: &Term) -> bool {
    let out = Atom::a("out");
    pred.functor_args().iter().all(|mode| {
        let mode = mode.value();
        if mode.is_functor(&atom::DOUBLE_COLON, 2) {
            !mode.functor_args()[1].is_functor(&out, 0)
        } else {
            !mode.is_functor(&out, 0)
        }
    })
}

/// Everything the compiler knows about the program being compiled, plus the
/// state of the function being assembled.
#[derive(Debug)]
pub struct CompilerState {
    trail: Trail,
    /// `[Name, Arity, Pred, Determinism]` for each `pred` declaration.
    pragmas: IndexedAnswers,
    /// The module which owns each name/arity. Predicates defined by the
    /// program being compiled map to the empty module.
    modules: HashMap<PredicateKey, Atom>,
    dynamic: HashSet<PredicateKey>,

    gensym_counter: usize,
    determinism: Determinism,
    uses_yield: bool,
    variable_names: Vec<(Variable, Atom)>,
}

impl Default for CompilerState {
    fn default() -> Self {
        Self::new()
    }
}

impl CompilerState {
    /// A fresh state which already knows the determinism of the runtime's
    /// det and semidet builtins.
    pub fn new() -> Self {
        let mut state = Self {
            trail: Trail::new(),
            pragmas: IndexedAnswers::new(4),
            modules: HashMap::new(),
            dynamic: HashSet::new(),
            gensym_counter: 0,
            determinism: Determinism::Nondet,
            uses_yield: false,
            variable_names: Vec::new(),
        };

        let builtins = DET_BUILTINS
            .iter()
            .map(|b| (b, Determinism::Det))
            .chain(SEMIDET_BUILTINS.iter().map(|b| (b, Determinism::Semidet)));
        for (&(name, arity), determinism) in builtins {
            if let Err(error) = state.assert_pred(&input_modes(name, arity), determinism) {
                tracing::error!(%error, name, arity, "failed to declare builtin");
            }
        }

        state
    }

    /// Record `:- pred(Pred is Determinism)`.
    pub fn assert_pred(&mut self, pred: &Term, determinism: Determinism) -> Result<()> {
        let (name, arity) = pred
            .name_arity()
            .ok_or_else(|| CompileError::BadPragma(pred.to_string()))?;
        self.pragmas.add_answer(&[
            Term::Atom(name),
            Term::int(arity as i64),
            pred.clone(),
            Term::atom(determinism.name()),
        ])?;
        Ok(())
    }

    /// Set the module owning `name/arity`, replacing any earlier entry.
    pub fn assert_module(&mut self, name: &Atom, arity: usize, module: &Atom) {
        self.modules
            .insert(PredicateKey::new(name.unqualified(), arity), module.clone());
    }

    pub fn module_for(&self, name: &Atom, arity: usize) -> Option<&Atom> {
        self.modules.get(&PredicateKey::new(name.unqualified(), arity))
    }

    /// True if the program being compiled defines `name/arity` itself.
    pub fn is_defined(&self, name: &Atom, arity: usize) -> bool {
        self.module_for(name, arity)
            .map_or(false, |module| module.name().is_empty())
    }

    pub fn declare_dynamic(&mut self, key: PredicateKey) {
        tracing::debug!(predicate = %key, "declared dynamic");
        self.dynamic.insert(key);
    }

    pub fn is_dynamic(&self, name: &Atom, arity: usize) -> bool {
        self.dynamic
            .contains(&PredicateKey::new(name.unqualified(), arity))
    }

    pub fn dynamic_keys(&self) -> impl Iterator<Item = &PredicateKey> {
        self.dynamic.iter()
    }

    /// Begin assembling the function for the predicate of `head`.
    pub fn start_function(&mut self, head: &Term) {
        self.gensym_counter = 0;
        self.uses_yield = false;
        self.determinism = self.declared_determinism(head);
        tracing::debug!(head = %head, determinism = self.determinism.name(), "starting function");
    }

    /// The determinism of the function being assembled.
    pub fn determinism(&self) -> Determinism {
        self.determinism
    }

    pub fn set_uses_yield(&mut self) {
        self.uses_yield = true;
    }

    pub fn uses_yield(&self) -> bool {
        self.uses_yield
    }

    /// How a call to `goal` behaves: det or semidet only if a matching
    /// declaration gives every argument an input mode.
    pub fn declared_determinism(&mut self, goal: &Term) -> Determinism {
        if self.is_det_none_out(goal) {
            Determinism::Det
        } else if self.is_semidet_none_out(goal) {
            Determinism::Semidet
        } else {
            Determinism::Nondet
        }
    }

    pub fn is_det_none_out(&mut self, goal: &Term) -> bool {
        self.has_none_out_pragma(goal, Determinism::Det)
    }

    pub fn is_semidet_none_out(&mut self, goal: &Term) -> bool {
        self.has_none_out_pragma(goal, Determinism::Semidet)
    }

    fn has_none_out_pragma(&mut self, goal: &Term, determinism: Determinism) -> bool {
        let (name, arity) = match goal.name_arity() {
            Some(name_arity) => name_arity,
            None => return false,
        };

        let mut matches = self.pragmas.matches(&[
            Term::Atom(name.unqualified()),
            Term::int(arity as i64),
            Term::var(),
            Term::atom(determinism.name()),
        ]);
        let mut found = false;
        while let Some(answer) = matches.next_answer(&mut self.trail) {
            if is_none_out(&answer[2]) {
                found = true;
                break;
            }
        }
        matches.close(&mut self.trail);
        found
    }

    /// Name every distinct variable of `rule`. A name the reader recorded is
    /// kept (with `_1` appended if it would shadow a runtime type name);
    /// anonymous variables get `x1`, `x2`, ... skipping names already used.
    pub fn new_variable_names(&mut self, rule: &Term, suggestions: &[(Atom, Variable)]) {
        self.variable_names.clear();
        let variables = rule.variables();

        let mut unnamed = Vec::new();
        for variable in variables {
            let suggestion = suggestions
                .iter()
                .find(|(_, v)| *v == variable)
                .map(|(name, _)| name);
            match suggestion {
                Some(name) if RESERVED_NAMES.contains(&name.name()) => {
                    let name = Atom::a(&format!("{}_1", name));
                    self.variable_names.push((variable, name));
                }
                Some(name) => self.variable_names.push((variable, name.clone())),
                None => unnamed.push(variable),
            }
        }

        for variable in unnamed {
            let name = self.fresh_variable_name();
            self.variable_names.push((variable, name));
        }
    }

    fn fresh_variable_name(&self) -> Atom {
        (1..)
            .map(|i| Atom::a(&format!("x{}", i)))
            .find(|name| self.variable_names.iter().all(|(_, used)| used != name))
            .unwrap_or_else(|| Atom::a("x"))
    }

    /// The display name of `variable`, naming it now if it was not seen by
    /// [`CompilerState::new_variable_names`].
    pub fn variable_name(&mut self, variable: &Variable) -> Atom {
        if let Some((_, name)) = self.variable_names.iter().find(|(v, _)| v == variable) {
            return name.clone();
        }

        let name = self.fresh_variable_name();
        self.variable_names.push((variable.clone(), name.clone()));
        name
    }

    /// The names given to the variables of the current rule, in
    /// first-occurrence order.
    pub fn variable_names(&self) -> &[(Variable, Atom)] {
        &self.variable_names
    }

    /// A label unique within the current function, such as `cutIf1`.
    pub fn gensym(&mut self, base: &str) -> Atom {
        self.gensym_counter += 1;
        Atom::a(&format!("{}{}", base, self.gensym_counter))
    }
}
