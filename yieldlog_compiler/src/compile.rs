//! Lowering of Prolog clauses into the statement tree of [`crate::code`].
//!
//! Bodies are lowered by rewriting: each control construct is either turned
//! directly into statements or rewritten into a simpler goal which is lowered
//! again. Conjunctions are lowered according to the declared determinism of
//! their first goal, so a det call becomes a plain statement, a semidet call
//! an `if`, and anything else a `foreach` over its solutions.

use crate::{
    code::{
        Call, Callee, Collect, Comparison, Condition, Declaration, Determinism, Expr, Function,
        Source, Statement,
    },
    state::{CompileError, CompilerState, Result},
};

use ::{
    itertools::Itertools,
    lazy_static::lazy_static,
    yieldlog::{
        arith::ArithOp,
        database::{self, PredicateKey},
        session::builtins,
        PrologError, PrologException,
    },
    yieldlog_term::{atom, Atom, Term, Variable},
};

lazy_static! {
    /// `'$CUTIF'(Label)`: leave the breakable block `Label`.
    static ref CUT_IF: Atom = Atom::a("$CUTIF");
    /// `'$ADD_ANSWER'(Collector)`: record an answer in a declared collector.
    static ref ADD_ANSWER: Atom = Atom::a("$ADD_ANSWER");
}

/// Library predicates the runtime provides as clauses rather than as
/// builtin functions.
const LIBRARY: &[(&str, usize)] = &[("member", 2), ("append", 3)];

/// A clause as read, with the names the reader gave its variables.
#[derive(Debug, Clone)]
pub struct SourceClause {
    pub term: Term,
    pub variable_names: Vec<(Atom, Variable)>,
}

impl SourceClause {
    pub fn new(term: Term) -> Self {
        Self {
            term,
            variable_names: Vec::new(),
        }
    }

    /// A clause whose variables were written with the given names. Entries
    /// which are not unbound variables are ignored.
    pub fn named<'a, I>(term: Term, names: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a Term)>,
    {
        let variable_names = names
            .into_iter()
            .filter_map(|(name, var)| var.as_var().map(|v| (Atom::a(name), v)))
            .collect();
        Self {
            term,
            variable_names,
        }
    }
}

impl From<Term> for SourceClause {
    fn from(term: Term) -> Self {
        Self::new(term)
    }
}

fn conj(a: Term, b: Term) -> Term {
    Term::functor2(atom::COMMA.clone(), a, b)
}

fn disj(a: Term, b: Term) -> Term {
    Term::functor2(atom::SEMICOLON.clone(), a, b)
}

fn if_then(condition: Term, then: Term) -> Term {
    Term::functor2(atom::ARROW.clone(), condition, then)
}

fn call(goal: Term) -> Term {
    Term::functor1(atom::CALL.clone(), goal)
}

fn truth() -> Term {
    Term::Atom(atom::TRUE.clone())
}

fn fail() -> Term {
    Term::Atom(atom::FAIL.clone())
}

fn not_callable(term: &Term) -> CompileError {
    CompileError::NotCallable(term.to_string())
}

fn not_evaluable(name: &Atom, arity: usize) -> CompileError {
    PrologError::from(PrologException::type_error(
        "evaluable",
        &Term::indicator(name, arity),
        "Not an expression function",
    ))
    .into()
}

pub(crate) fn is_directive(term: &Term) -> bool {
    term.is_functor(&atom::NECK, 1)
}

/// `(Head, Body)` of a rule; a fact has the body `true`.
fn split_clause(term: &Term) -> (Term, Term) {
    let term = term.value();
    if term.is_functor(&atom::NECK, 2) {
        let args = term.functor_args();
        (args[0].value(), args[1].clone())
    } else {
        (term, truth())
    }
}

fn clause_key(term: &Term) -> Option<PredicateKey> {
    PredicateKey::of(&split_clause(term).0)
}

fn arg_name(index: usize) -> Atom {
    Atom::a(&format!("arg{}", index + 1))
}

/// The position of `var` among `head_args`, if it is a direct argument there
/// exactly once.
fn direct_arg_index(var: &Variable, head_args: &[Term]) -> Option<usize> {
    let mut positions = head_args
        .iter()
        .positions(|arg| arg.as_var().as_ref() == Some(var));
    match (positions.next(), positions.next()) {
        (Some(i), None) => Some(i),
        _ => None,
    }
}

fn is_builtin(name: &Atom, arity: usize) -> bool {
    builtins::is_system_predicate(name, arity)
        || LIBRARY
            .iter()
            .any(|&(n, a)| a == arity && n == name.name())
}

/// Strip `Var^Goal` qualifiers. A variable goal is called.
fn unqualified_goal(goal: &Term) -> Term {
    let goal = goal.value();
    if goal.is_var() {
        call(goal)
    } else if goal.is_functor(&atom::HAT, 2) {
        unqualified_goal(&goal.functor_args()[1])
    } else {
        goal
    }
}

/// Add every predicate named by a `dynamic/1` argument: an indicator, or a
/// list or conjunction of them.
fn dynamic_keys(indicators: &Term, keys: &mut Vec<PredicateKey>) -> Result<()> {
    let indicators = indicators.value();
    if let Some(items) = indicators.list_items() {
        for item in &items {
            dynamic_keys(item, keys)?;
        }
    } else if indicators.is_functor(&atom::COMMA, 2) {
        for item in indicators.functor_args().iter() {
            dynamic_keys(item, keys)?;
        }
    } else {
        keys.push(database::predicate_indicator(&indicators)?);
    }
    Ok(())
}

struct CompiledClause {
    /// `(VariableName, ArgName)` for each head variable bound directly to a
    /// function argument.
    assignments: Vec<(Atom, Atom)>,
    code: Vec<Statement>,
    head_names: Vec<Atom>,
}

impl CompilerState {
    /// Compile a whole program: apply its directives, then lower each run of
    /// consecutive clauses with the same name and arity into one function.
    pub fn compile_program(&mut self, clauses: &[SourceClause]) -> Result<Vec<Function>> {
        for clause in clauses {
            if is_directive(&clause.term) {
                self.apply_directive(&clause.term.functor_args()[0])?;
            } else {
                let key = clause_key(&clause.term).ok_or_else(|| not_callable(&clause.term))?;
                self.assert_module(&key.name, key.arity, &atom::EMPTY);
            }
        }

        let groups = clauses
            .iter()
            .filter(|clause| !is_directive(&clause.term))
            .group_by(|clause| clause_key(&clause.term));

        let mut functions = Vec::new();
        for (_, group) in &groups {
            let group: Vec<&SourceClause> = group.collect();
            functions.push(self.compile_predicate(&group)?);
        }
        Ok(functions)
    }

    fn apply_directive(&mut self, directive: &Term) -> Result<()> {
        let directive = directive.value();
        let args = directive.functor_args();
        let name = match directive.name_arity() {
            Some((name, _)) => name,
            None => return Err(CompileError::BadDirective(directive.to_string())),
        };

        match (name.name(), args.len()) {
            ("pred", 1) => {
                let declaration = args[0].value();
                if !declaration.is_functor(&Atom::a("is"), 2) {
                    return Err(CompileError::BadDirective(directive.to_string()));
                }
                let parts = declaration.functor_args();
                let determinism = parts[1]
                    .as_atom()
                    .and_then(|d| Determinism::from_name(d.name()))
                    .ok_or_else(|| CompileError::BadPragma(declaration.to_string()))?;
                self.assert_pred(&parts[0].value(), determinism)
            }
            ("import", 2) => {
                let module = args[0]
                    .as_atom()
                    .ok_or_else(|| CompileError::BadDirective(directive.to_string()))?;
                let imports = args[1]
                    .list_items()
                    .ok_or_else(|| CompileError::BadDirective(directive.to_string()))?;
                for import in &imports {
                    if !import.is_functor(&atom::SLASH, 2) {
                        continue;
                    }
                    let indicator = import.functor_args();
                    if let (Some(name), Some(arity)) = (indicator[0].as_atom(), indicator[1].as_int()) {
                        self.assert_module(&name, arity as usize, &module);
                    }
                }
                Ok(())
            }
            ("dynamic", 1) => {
                let mut keys = Vec::new();
                dynamic_keys(&args[0], &mut keys)?;
                for key in keys {
                    self.declare_dynamic(key);
                }
                Ok(())
            }
            _ => {
                tracing::debug!(%directive, "ignoring directive");
                Ok(())
            }
        }
    }

    /// Lower the clauses of one predicate into a single function.
    pub fn compile_predicate(&mut self, clauses: &[&SourceClause]) -> Result<Function> {
        let first = clauses
            .first()
            .ok_or_else(|| CompileError::BadDirective("empty predicate".to_owned()))?;
        let (head, _) = split_clause(&first.term);
        let (name, arity) = head.name_arity().ok_or_else(|| not_callable(&head))?;

        self.start_function(&head);
        let compiled = clauses
            .iter()
            .map(|clause| self.compile_clause(clause))
            .collect::<Result<Vec<_>>>()?;

        // An argument is named after a head variable only if every clause
        // binds that same variable to it.
        let args: Vec<Atom> = (0..arity)
            .map(|i| {
                let arg = arg_name(i);
                let assigned = |clause: &CompiledClause| {
                    clause
                        .assignments
                        .iter()
                        .find(|(_, a)| *a == arg)
                        .map(|(variable, _)| variable.clone())
                };
                match compiled.first().and_then(assigned) {
                    Some(variable)
                        if compiled
                            .iter()
                            .all(|clause| assigned(clause).as_ref() == Some(&variable)) =>
                    {
                        variable
                    }
                    _ => arg,
                }
            })
            .collect();

        let mut variable_names = Vec::new();
        let mut body = Vec::with_capacity(compiled.len() + 1);
        for clause in compiled {
            let mut block: Vec<Statement> = clause
                .assignments
                .into_iter()
                .filter(|(variable, _)| !args.contains(variable))
                .map(|(variable, arg)| Statement::Declare {
                    name: variable,
                    value: Declaration::Arg(arg),
                })
                .collect();
            block.extend(clause.code);
            body.push(Statement::Block(block));

            for name in clause.head_names {
                if !variable_names.contains(&name) {
                    variable_names.push(name);
                }
            }
        }

        let determinism = self.determinism();
        match determinism {
            Determinism::Det => {}
            Determinism::Semidet => body.push(Statement::ReturnFalse),
            Determinism::Nondet if !self.uses_yield() => {
                body.push(Statement::Block(vec![Statement::Foreach {
                    source: Source::Call(Call {
                        callee: Callee::Builtin(atom::FAIL.clone()),
                        args: Vec::new(),
                    }),
                    body: vec![Statement::Yield],
                }]));
            }
            Determinism::Nondet => {}
        }

        tracing::debug!(
            function = %name,
            arity,
            determinism = determinism.name(),
            clauses = clauses.len(),
            "assembled function"
        );

        Ok(Function {
            name: name.unqualified(),
            determinism,
            return_type: determinism.return_type(),
            args,
            body,
            variable_names,
        })
    }

    fn compile_clause(&mut self, clause: &SourceClause) -> Result<CompiledClause> {
        let (head, body) = split_clause(&clause.term);
        self.new_variable_names(&clause.term, &clause.variable_names);

        let head_args = head.functor_args();
        let compiled_args: Vec<Expr> = head_args.iter().map(|arg| self.compile_term(arg)).collect();
        let mut code = self.compile_body(&body)?;

        // Arguments which are not a directly bound variable are unified with
        // their head pattern, outermost first.
        for (i, pattern) in compiled_args.into_iter().enumerate().rev() {
            let direct = head_args[i]
                .as_var()
                .and_then(|var| direct_arg_index(&var, &head_args))
                .is_some();
            if !direct {
                code = vec![Statement::Foreach {
                    source: Source::Unify(Expr::Var(arg_name(i)), pattern),
                    body: code,
                }];
            }
        }

        let mut assignments = Vec::new();
        let mut declarations = Vec::new();
        for (variable, name) in self.variable_names().to_vec() {
            match direct_arg_index(&variable, &head_args) {
                Some(i) => assignments.push((name, arg_name(i))),
                None => declarations.push(Statement::Declare {
                    name,
                    value: Declaration::Variable,
                }),
            }
        }
        declarations.extend(code);

        let head_names = head
            .variables()
            .iter()
            .map(|var| self.variable_name(var))
            .collect();

        Ok(CompiledClause {
            assignments,
            code: declarations,
            head_names,
        })
    }

    /// Lower a clause body in the context of the function being assembled.
    pub fn compile_body(&mut self, body: &Term) -> Result<Vec<Statement>> {
        let body = body.value();
        if body.is_var() {
            return self.compile_body(&conj(call(body), truth()));
        }

        let (name, arity) = body.name_arity().ok_or_else(|| not_callable(&body))?;
        let args = body.functor_args();
        match (name.name(), arity) {
            (",", 2) => self.compile_conjunction(&args[0], &args[1]),
            (";", 2) => self.compile_disjunction(&args[0], &args[1]),
            ("!", 0) => Ok(match self.determinism() {
                Determinism::Det => vec![Statement::Return],
                Determinism::Semidet => vec![Statement::ReturnTrue],
                Determinism::Nondet => {
                    self.set_uses_yield();
                    vec![Statement::Yield, Statement::YieldBreak]
                }
            }),
            ("$CUTIF", 1) => Ok(vec![Statement::BreakBlock(self.label(&args[0])?)]),
            ("true", 0) => Ok(match self.determinism() {
                Determinism::Det => vec![Statement::Return],
                Determinism::Semidet => vec![Statement::ReturnTrue],
                Determinism::Nondet => {
                    self.set_uses_yield();
                    vec![Statement::Yield]
                }
            }),
            _ => self.compile_body(&conj(body, truth())),
        }
    }

    fn label(&self, term: &Term) -> Result<Atom> {
        term.as_atom().ok_or_else(|| not_callable(term))
    }

    /// Lower `(A, B)`.
    fn compile_conjunction(&mut self, a: &Term, b: &Term) -> Result<Vec<Statement>> {
        let a = a.value();
        if a.is_var() {
            return self.compile_body(&conj(call(a), b.clone()));
        }

        let (name, arity) = a.name_arity().ok_or_else(|| not_callable(&a))?;
        let args = a.functor_args();
        match (name.name(), arity) {
            (";", 2) => {
                let (left, right) = (args[0].value(), args[1].clone());
                if left.is_functor(&atom::ARROW, 2) {
                    let branch = left.functor_args();
                    let then = conj(branch[1].clone(), b.clone());
                    self.compile_body(&disj(
                        if_then(branch[0].clone(), then),
                        conj(right, b.clone()),
                    ))
                } else {
                    self.compile_body(&disj(conj(left, b.clone()), conj(right, b.clone())))
                }
            }
            ("\\+", 1) => {
                let goal = args[0].value();
                let plain_call = goal
                    .name_arity()
                    .map_or(false, |(n, a)| self.is_plain_call(&n, a));
                if plain_call && self.is_semidet_none_out(&goal) {
                    let call = self.compile_call(&goal)?;
                    let body = self.compile_body(b)?;
                    Ok(vec![Statement::If {
                        condition: Condition::Not(call),
                        body,
                    }])
                } else {
                    let negation = disj(if_then(goal, fail()), truth());
                    self.compile_body(&conj(negation, b.clone()))
                }
            }
            ("once", 1) => {
                let once = disj(if_then(args[0].clone(), truth()), fail());
                self.compile_body(&conj(once, b.clone()))
            }
            ("->", 2) => {
                let branch = disj(a.clone(), fail());
                self.compile_body(&conj(branch, b.clone()))
            }
            ("\\=", 2) => {
                let unify = Term::functor2(atom::EQUAL.clone(), args[0].clone(), args[1].clone());
                let negation = Term::functor1(atom::NOT.clone(), unify);
                self.compile_body(&conj(negation, b.clone()))
            }
            ("!", 0) => {
                let mut code = self.compile_body(b)?;
                code.push(Statement::YieldBreak);
                Ok(code)
            }
            ("$CUTIF", 1) => {
                let label = self.label(&args[0])?;
                let mut code = self.compile_body(b)?;
                code.push(Statement::BreakBlock(label));
                Ok(code)
            }
            ("fail", 0) | ("false", 0) => Ok(Vec::new()),
            ("true", 0) => self.compile_body(b),
            ("is", 2) => {
                let left = self.compile_term(&args[0]);
                let right = self.compile_expression(&args[1])?;
                let body = self.compile_body(b)?;
                Ok(vec![Statement::Foreach {
                    source: Source::Unify(left, right),
                    body,
                }])
            }
            ("$ADD_ANSWER", 1) => {
                let mut code = vec![Statement::AddAnswer(self.label(&args[0])?)];
                code.extend(self.compile_body(b)?);
                Ok(code)
            }
            (op, 2) if Comparison::from_name(op).is_some() => {
                let op = Comparison::from_name(op).ok_or_else(|| not_callable(&a))?;
                let left = self.compile_expression(&args[0])?;
                let right = self.compile_expression(&args[1])?;
                let body = self.compile_body(b)?;
                Ok(vec![Statement::If {
                    condition: Condition::Compare { op, left, right },
                    body,
                }])
            }
            ("findall", 3) => {
                let template = self.compile_term(&args[0]);
                let collector = self.gensym("findallAnswers");
                let add = Term::functor1(ADD_ANSWER.clone(), Term::Atom(collector.clone()));
                let goal_and_add = conj(args[1].clone(), conj(add, fail()));

                let mut code = vec![Statement::Declare {
                    name: collector.clone(),
                    value: Declaration::FindallAnswers(template),
                }];
                code.extend(self.compile_body(&goal_and_add)?);
                let bag = self.compile_term(&args[2]);
                let body = self.compile_body(b)?;
                code.push(Statement::Foreach {
                    source: Source::Answers {
                        collector,
                        method: Collect::Findall,
                        bag,
                    },
                    body,
                });
                Ok(code)
            }
            ("bagof", 3) => self.compile_bagof(Collect::Bagof, &args, b),
            ("setof", 3) => self.compile_bagof(Collect::Setof, &args, b),
            ("call", n) if n >= 1 => {
                let goal = self.compile_term(&args[0]);
                let extra = args[1..].iter().map(|arg| self.compile_term(arg)).collect();
                let body = self.compile_body(b)?;
                Ok(vec![Statement::Foreach {
                    source: Source::Goal { goal, extra },
                    body,
                }])
            }
            ("asserta", 1) => {
                let mut code = vec![Statement::Asserta(self.compile_term(&args[0]))];
                code.extend(self.compile_body(b)?);
                Ok(code)
            }
            ("assertz", 1) | ("assert", 1) => {
                let mut code = vec![Statement::Assertz(self.compile_term(&args[0]))];
                code.extend(self.compile_body(b)?);
                Ok(code)
            }
            ("throw", 1) => Ok(vec![Statement::Throw(self.compile_term(&args[0]))]),
            ("catch", 3) => {
                let catch = self.gensym("catchGoal");
                let goal = self.compile_term(&args[0]);
                let catcher = self.compile_term(&args[1]);
                let body = self.compile_body(b)?;
                let handler = self.compile_body(&conj(args[2].clone(), b.clone()))?;
                Ok(vec![
                    Statement::Declare {
                        name: catch.clone(),
                        value: Declaration::Catch(goal),
                    },
                    Statement::Foreach {
                        source: Source::Catch(catch.clone()),
                        body,
                    },
                    Statement::Foreach {
                        source: Source::Recover { catch, catcher },
                        body: handler,
                    },
                ])
            }
            (",", 2) => {
                let rest = conj(args[1].clone(), b.clone());
                self.compile_body(&conj(args[0].clone(), rest))
            }
            _ => {
                let call = self.compile_call(&a)?;
                Ok(match self.declared_determinism(&a) {
                    Determinism::Det => {
                        let mut code = vec![Statement::Call(call)];
                        code.extend(self.compile_body(b)?);
                        code
                    }
                    Determinism::Semidet => vec![Statement::If {
                        condition: Condition::Call(call),
                        body: self.compile_body(b)?,
                    }],
                    Determinism::Nondet => vec![Statement::Foreach {
                        source: Source::Call(call),
                        body: self.compile_body(b)?,
                    }],
                })
            }
        }
    }

    fn compile_bagof(&mut self, method: Collect, args: &[Term], b: &Term) -> Result<Vec<Statement>> {
        let template = self.compile_term(&args[0]);
        let goal = self.compile_term(&args[1]);
        let unqualified = unqualified_goal(&args[1]);
        let collector = self.gensym("bagofAnswers");
        let add = Term::functor1(ADD_ANSWER.clone(), Term::Atom(collector.clone()));

        let mut code = vec![Statement::Declare {
            name: collector.clone(),
            value: Declaration::BagofAnswers { template, goal },
        }];
        code.extend(self.compile_body(&conj(unqualified, conj(add, fail())))?);
        let bag = self.compile_term(&args[2]);
        let body = self.compile_body(b)?;
        code.push(Statement::Foreach {
            source: Source::Answers {
                collector,
                method,
                bag,
            },
            body,
        });
        Ok(code)
    }

    /// Lower `(A ; B)`.
    fn compile_disjunction(&mut self, a: &Term, b: &Term) -> Result<Vec<Statement>> {
        let a = a.value();
        if a.is_var() {
            return self.compile_body(&disj(call(a), b.clone()));
        }

        if a.is_functor(&atom::ARROW, 2) {
            let branch = a.functor_args();
            let label = self.gensym("cutIf");
            let cut_if = Term::functor1(CUT_IF.clone(), Term::Atom(label.clone()));
            let committed = conj(branch[0].clone(), conj(cut_if, branch[1].clone()));
            let body = self.compile_body(&disj(committed, b.clone()))?;
            return Ok(vec![Statement::BreakableBlock { label, body }]);
        }

        if a.is_functor(&atom::CUT, 0) {
            return self.compile_body(&a);
        }

        let mut code = self.compile_body(&a)?;
        code.extend(self.compile_body(b)?);
        Ok(code)
    }

    /// True if a goal `name/arity` is compiled as a call rather than as a
    /// control construct.
    fn is_plain_call(&self, name: &Atom, arity: usize) -> bool {
        match (name.name(), arity) {
            ("!", 0) | ("fail", 0) | ("false", 0) | ("true", 0) => false,
            ("\\+", 1) | ("once", 1) | ("$CUTIF", 1) | ("$ADD_ANSWER", 1) | ("asserta", 1)
            | ("assertz", 1) | ("assert", 1) | ("throw", 1) => false,
            (";", 2) | (",", 2) | ("->", 2) | ("\\=", 2) | ("is", 2) => false,
            ("findall", 3) | ("bagof", 3) | ("setof", 3) | ("catch", 3) => false,
            ("call", n) if n >= 1 => false,
            (op, 2) => Comparison::from_name(op).is_none(),
            _ => true,
        }
    }

    /// Resolve who answers `goal` and compile its arguments.
    fn compile_call(&mut self, goal: &Term) -> Result<Call> {
        let (name, arity) = goal.name_arity().ok_or_else(|| not_callable(goal))?;
        let args = goal
            .functor_args()
            .iter()
            .map(|arg| self.compile_term(arg))
            .collect();

        let callee = if is_builtin(&name, arity) {
            Callee::Builtin(name.unqualified())
        } else if self.is_dynamic(&name, arity) {
            Callee::Dynamic(name.unqualified())
        } else if self.is_defined(&name, arity) {
            Callee::Local(name.unqualified())
        } else if let Some(module) = self
            .module_for(&name, arity)
            .cloned()
            .or_else(|| name.module())
        {
            Callee::Module {
                module,
                name: name.unqualified(),
            }
        } else {
            Callee::Dynamic(name.unqualified())
        };

        Ok(Call { callee, args })
    }

    /// The module an atom used as `name/arity` is qualified with, if any.
    fn atom_module(&self, name: &Atom, arity: usize) -> Option<Atom> {
        match self.module_for(name, arity) {
            Some(module) if !module.name().is_empty() => Some(module.clone()),
            _ => name.module(),
        }
    }

    /// Code which builds `term` at runtime.
    pub fn compile_term(&mut self, term: &Term) -> Expr {
        match term.value() {
            Term::Var(var) => Expr::Var(self.variable_name(&var)),
            Term::Atom(name) if name == *atom::NIL => Expr::Nil,
            Term::Atom(name) => Expr::Atom {
                module: self.atom_module(&name, 0),
                name: name.unqualified(),
            },
            Term::Int(i) => Expr::Int(i),
            Term::Float(f) => Expr::Float(f.0),
            Term::Str(s) => Expr::Str(s.to_string()),
            Term::Compound(c) if c.is_list_pair() => {
                let list = Term::Compound(c.clone());
                match list.list_items() {
                    Some(items) if items.len() >= 2 => {
                        Expr::List(items.iter().map(|item| self.compile_term(item)).collect())
                    }
                    _ => Expr::ListPair(
                        Box::new(self.compile_term(&c.args()[0])),
                        Box::new(self.compile_term(&c.args()[1])),
                    ),
                }
            }
            Term::Compound(c) => Expr::Functor {
                module: self.atom_module(c.name(), c.arity()),
                name: c.name().unqualified(),
                args: c.args().iter().map(|arg| self.compile_term(arg)).collect(),
            },
        }
    }

    /// Code which evaluates the arithmetic expression `term` at runtime.
    pub fn compile_expression(&mut self, term: &Term) -> Result<Expr> {
        let term = term.value();
        let (name, arity) = match &term {
            Term::Atom(name) => (name.clone(), 0),
            Term::Compound(c) => (c.name().clone(), c.arity()),
            _ => return Ok(self.compile_term(&term)),
        };

        if let Some(op) = ArithOp::from_functor(name.name(), arity) {
            let args = term
                .functor_args()
                .iter()
                .map(|arg| self.compile_expression(arg))
                .collect::<Result<Vec<_>>>()?;
            return Ok(Expr::Arith { op, args });
        }

        match term.list_items() {
            Some(ref items) if items.len() == 1 => Ok(self.compile_term(&term)),
            _ => Err(not_evaluable(&name, arity)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile(clauses: Vec<SourceClause>) -> Vec<Function> {
        CompilerState::new().compile_program(&clauses).unwrap()
    }

    fn fact(term: Term) -> SourceClause {
        SourceClause::new(term)
    }

    fn rule(head: Term, body: Term) -> SourceClause {
        SourceClause::new(Term::functor2(atom::NECK.clone(), head, body))
    }

    fn pred(head: Term, determinism: &str) -> SourceClause {
        let declaration = Term::functor2("is", head, Term::atom(determinism));
        SourceClause::new(Term::functor1(atom::NECK.clone(), Term::functor1("pred", declaration)))
    }

    fn input(name: &str) -> Term {
        Term::functor1(
            name,
            Term::functor2(atom::DOUBLE_COLON.clone(), Term::atom("univ"), Term::atom("in")),
        )
    }

    fn unify_arg1(value: &str, body: Vec<Statement>) -> Statement {
        Statement::Foreach {
            source: Source::Unify(
                Expr::Var(Atom::a("arg1")),
                Expr::Atom {
                    name: Atom::a(value),
                    module: None,
                },
            ),
            body,
        }
    }

    #[test]
    fn nondet_facts_yield() {
        let functions = compile(vec![
            fact(Term::functor1("p", Term::atom("a"))),
            fact(Term::functor1("p", Term::atom("b"))),
        ]);
        assert_eq!(functions.len(), 1);
        let p = &functions[0];
        assert_eq!(p.determinism, Determinism::Nondet);
        assert_eq!(p.args, vec![Atom::a("arg1")]);
        assert_eq!(
            p.body,
            vec![
                Statement::Block(vec![unify_arg1("a", vec![Statement::Yield])]),
                Statement::Block(vec![unify_arg1("b", vec![Statement::Yield])]),
            ]
        );
    }

    #[test]
    fn semidet_facts_return_a_flag() {
        let functions = compile(vec![
            pred(input("p"), "semidet"),
            fact(Term::functor1("p", Term::atom("a"))),
        ]);
        let p = &functions[0];
        assert_eq!(p.determinism, Determinism::Semidet);
        assert_eq!(
            p.body,
            vec![
                Statement::Block(vec![unify_arg1("a", vec![Statement::ReturnTrue])]),
                Statement::ReturnFalse,
            ]
        );
    }

    #[test]
    fn nondet_function_that_never_yields_gets_a_fail_loop() {
        let functions = compile(vec![rule(Term::atom("p"), fail())]);
        let p = &functions[0];
        assert_eq!(p.body.len(), 2);
        assert_eq!(p.body[0], Statement::Block(vec![]));
        match &p.body[1] {
            Statement::Block(loop_) => match &loop_[0] {
                Statement::Foreach { body, .. } => assert_eq!(body, &vec![Statement::Yield]),
                other => panic!("expected a loop, found {:?}", other),
            },
            other => panic!("expected a block, found {:?}", other),
        }
    }

    #[test]
    fn head_variables_become_argument_names() {
        let (x, y) = (Term::var(), Term::var());
        let clause = SourceClause::named(
            rule(
                Term::functor2("q", x.clone(), y.clone()),
                Term::functor2("r", x.clone(), y.clone()),
            )
            .term,
            vec![("X", &x), ("Y", &y)],
        );
        let functions = compile(vec![clause]);
        let q = &functions[0];
        assert_eq!(q.args, vec![Atom::a("X"), Atom::a("Y")]);
        assert_eq!(q.variable_names, vec![Atom::a("X"), Atom::a("Y")]);
        match &q.body[0] {
            Statement::Block(code) => match &code[0] {
                Statement::Foreach {
                    source: Source::Call(call),
                    ..
                } => {
                    assert_eq!(call.callee, Callee::Dynamic(Atom::a("r")));
                    assert_eq!(call.args, vec![Expr::Var(Atom::a("X")), Expr::Var(Atom::a("Y"))]);
                }
                other => panic!("expected a call, found {:?}", other),
            },
            other => panic!("expected a block, found {:?}", other),
        }
    }

    #[test]
    fn repeated_head_variable_is_unified() {
        let x = Term::var();
        let clause = SourceClause::named(
            Term::functor2("same", x.clone(), x.clone()),
            vec![("X", &x)],
        );
        let functions = compile(vec![clause]);
        let same = &functions[0];
        assert_eq!(same.args, vec![Atom::a("arg1"), Atom::a("arg2")]);
        match &same.body[0] {
            Statement::Block(code) => {
                assert_eq!(
                    code[0],
                    Statement::Declare {
                        name: Atom::a("X"),
                        value: Declaration::Variable,
                    }
                );
                match &code[1] {
                    Statement::Foreach {
                        source: Source::Unify(Expr::Var(arg), Expr::Var(var)),
                        ..
                    } => {
                        assert_eq!(arg, &Atom::a("arg1"));
                        assert_eq!(var, &Atom::a("X"));
                    }
                    other => panic!("expected a unification, found {:?}", other),
                }
            }
            other => panic!("expected a block, found {:?}", other),
        }
    }

    #[test]
    fn disagreeing_clauses_keep_positional_names() {
        let (x, y) = (Term::var(), Term::var());
        let functions = compile(vec![
            SourceClause::named(
                rule(Term::functor1("t", x.clone()), Term::functor1("a", x.clone())).term,
                vec![("X", &x)],
            ),
            SourceClause::named(
                rule(Term::functor1("t", y.clone()), Term::functor1("b", y.clone())).term,
                vec![("Y", &y)],
            ),
        ]);
        let t = &functions[0];
        assert_eq!(t.args, vec![Atom::a("arg1")]);
        match &t.body[1] {
            Statement::Block(code) => assert_eq!(
                code[0],
                Statement::Declare {
                    name: Atom::a("Y"),
                    value: Declaration::Arg(Atom::a("arg1")),
                }
            ),
            other => panic!("expected a block, found {:?}", other),
        }
    }

    #[test]
    fn if_then_else_uses_a_breakable_block() {
        let mut state = CompilerState::new();
        state.start_function(&Term::atom("p"));
        let x = Term::var();
        let goal = disj(
            if_then(
                Term::functor2("=", x.clone(), Term::int(1)),
                Term::functor1("write", x.clone()),
            ),
            Term::atom("nl"),
        );
        let code = state.compile_body(&goal).unwrap();
        match &code[..] {
            [Statement::BreakableBlock { label, body }] => {
                assert_eq!(label, &Atom::a("cutIf1"));
                match &body[0] {
                    Statement::Foreach { body, .. } => {
                        assert!(matches!(body[0], Statement::Call(_)));
                        assert!(body.contains(&Statement::BreakBlock(Atom::a("cutIf1"))));
                    }
                    other => panic!("expected a loop, found {:?}", other),
                }
                assert!(matches!(body[1], Statement::Call(_)));
            }
            other => panic!("unexpected code {:?}", other),
        }
    }

    #[test]
    fn semidet_builtin_is_a_condition() {
        let mut state = CompilerState::new();
        state.start_function(&Term::atom("p"));
        let x = Term::var();
        let code = state
            .compile_body(&conj(Term::functor1("var", x.clone()), Term::functor1("foo", x)))
            .unwrap();
        match &code[..] {
            [Statement::If {
                condition: Condition::Call(call),
                body,
            }] => {
                assert_eq!(call.callee, Callee::Builtin(Atom::a("var")));
                assert_eq!(body.len(), 1);
            }
            other => panic!("unexpected code {:?}", other),
        }

        let negated = state
            .compile_body(&Term::functor1(atom::NOT.clone(), Term::functor1("var", Term::var())))
            .unwrap();
        assert!(matches!(
            &negated[..],
            [Statement::If {
                condition: Condition::Not(_),
                ..
            }]
        ));
    }

    #[test]
    fn cut_in_each_determinism() {
        let mut state = CompilerState::new();
        state.start_function(&Term::atom("p"));
        assert_eq!(
            state.compile_body(&Term::atom("!")).unwrap(),
            vec![Statement::Yield, Statement::YieldBreak]
        );
        assert!(state.uses_yield());

        state.assert_pred(&Term::atom("d"), Determinism::Det).unwrap();
        state.start_function(&Term::atom("d"));
        assert_eq!(state.compile_body(&Term::atom("!")).unwrap(), vec![Statement::Return]);

        state.assert_pred(&Term::atom("s"), Determinism::Semidet).unwrap();
        state.start_function(&Term::atom("s"));
        assert_eq!(
            state.compile_body(&Term::atom("!")).unwrap(),
            vec![Statement::ReturnTrue]
        );
    }

    #[test]
    fn arithmetic_lowers_to_expressions() {
        let mut state = CompilerState::new();
        state.start_function(&Term::atom("p"));
        let x = Term::var();
        let sum = Term::functor2("+", Term::int(1), Term::functor1("-", Term::int(2)));
        let code = state
            .compile_body(&Term::functor2("is", x, sum))
            .unwrap();
        match &code[..] {
            [Statement::Foreach {
                source: Source::Unify(_, Expr::Arith { op, args }),
                ..
            }] => {
                assert_eq!(*op, ArithOp::Add);
                assert_eq!(
                    args[1],
                    Expr::Arith {
                        op: ArithOp::Negate,
                        args: vec![Expr::Int(2)],
                    }
                );
            }
            other => panic!("unexpected code {:?}", other),
        }

        let bad = Term::functor2("is", Term::var(), Term::functor1("foo", Term::int(1)));
        let error = state.compile_body(&bad).unwrap_err();
        match error {
            CompileError::Prolog(error) => {
                let info = error.exception().and_then(|e| e.type_error_info()).unwrap();
                assert_eq!(info.ty, Atom::a("evaluable"));
            }
            other => panic!("unexpected error {}", other),
        }
    }

    #[test]
    fn findall_declares_a_collector() {
        let mut state = CompilerState::new();
        state.start_function(&Term::atom("p"));
        let (x, l) = (Term::var(), Term::var());
        let goal = Term::functor3(
            "findall",
            x.clone(),
            Term::functor2("member", x, Term::list(vec![Term::int(1), Term::int(2)])),
            l,
        );
        let code = state.compile_body(&goal).unwrap();
        assert_eq!(code.len(), 3);
        assert!(matches!(
            &code[0],
            Statement::Declare {
                value: Declaration::FindallAnswers(_),
                ..
            }
        ));
        match &code[1] {
            Statement::Foreach {
                source: Source::Call(call),
                body,
            } => {
                assert_eq!(call.callee, Callee::Builtin(Atom::a("member")));
                assert_eq!(body, &vec![Statement::AddAnswer(Atom::a("findallAnswers1"))]);
            }
            other => panic!("unexpected code {:?}", other),
        }
        assert!(matches!(
            &code[2],
            Statement::Foreach {
                source: Source::Answers {
                    method: Collect::Findall,
                    ..
                },
                ..
            }
        ));
    }

    #[test]
    fn directives_set_up_the_state() {
        let mut state = CompilerState::new();
        let import = Term::functor2(
            "import",
            Term::atom("lists"),
            Term::list(vec![Term::indicator(&Atom::a("last"), 2)]),
        );
        let dynamic = Term::functor1("dynamic", Term::indicator(&Atom::a("counter"), 1));
        let clauses = vec![
            SourceClause::new(Term::functor1(atom::NECK.clone(), import)),
            SourceClause::new(Term::functor1(atom::NECK.clone(), dynamic)),
            rule(
                Term::atom("go"),
                conj(
                    Term::functor2("last", Term::var(), Term::var()),
                    Term::functor1("counter", Term::var()),
                ),
            ),
        ];
        let functions = state.compile_program(&clauses).unwrap();
        assert_eq!(functions.len(), 1);

        let mut callees = Vec::new();
        let mut statements = functions[0].body.clone();
        while let Some(statement) = statements.pop() {
            match statement {
                Statement::Foreach {
                    source: Source::Call(call),
                    body,
                } => {
                    callees.push(call.callee);
                    statements.extend(body);
                }
                Statement::Block(body) | Statement::Foreach { body, .. } => statements.extend(body),
                _ => {}
            }
        }
        assert!(callees.contains(&Callee::Module {
            module: Atom::a("lists"),
            name: Atom::a("last"),
        }));
        assert!(callees.contains(&Callee::Dynamic(Atom::a("counter"))));
    }

    #[test]
    fn bad_pragma_is_rejected() {
        let clauses = vec![pred(Term::atom("p"), "sometimes")];
        match CompilerState::new().compile_program(&clauses) {
            Err(CompileError::BadPragma(_)) => {}
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn non_callable_goal_is_rejected() {
        let mut state = CompilerState::new();
        state.start_function(&Term::atom("p"));
        assert!(matches!(
            state.compile_body(&conj(Term::int(1), truth())),
            Err(CompileError::NotCallable(_))
        ));
    }
}
