//! Running compiled functions against a [`Machine`].
//!
//! Nondet functions are driven by continuation: `yield` calls the rest of the
//! caller's code, which reports with a [`Flow`] whether the search goes on.
//! Calls to anything that is not a compiled function are handed to the
//! interpreter.

use crate::{
    code::{
        Call, Callee, Collect, Comparison, Condition, Declaration, Determinism, Expr, Function,
        Source, Statement,
    },
    compile::{is_directive, SourceClause},
    state::{self, CompilerState},
};

use ::{
    std::{cmp::Ordering, collections::HashMap},
    yieldlog::{
        answers::{BagofAnswers, FindallAnswers},
        arith, atom,
        database::{PredicateKey, Position},
        Atom, Machine, PrologError, PrologException, Result, Session, Term, Yield,
    },
};

/// What the statement just run asks of the enclosing code.
#[derive(Debug, Clone, PartialEq)]
enum Flow {
    /// Carry on with the next statement or solution.
    Next,
    /// Leave the breakable block with this label.
    Break(Atom),
    /// Leave the function.
    Return(bool),
    /// A flow raised by a continuation, belonging to an invocation further
    /// out than the one which yielded.
    Outer(Box<Flow>),
}

type Continuation<'k> = dyn FnMut(&mut Machine) -> Result<Flow> + 'k;

fn keep_going(_: &mut Machine) -> Result<Flow> {
    Ok(Flow::Next)
}

enum Slot {
    Term(Term),
    Findall(Option<FindallAnswers>),
    Bagof(Option<BagofAnswers>),
    Catch {
        goal: Term,
        exception: Option<PrologException>,
    },
}

/// The declared names of one function invocation.
#[derive(Default)]
struct Env {
    slots: HashMap<Atom, Slot>,
}

fn undeclared(name: &Atom) -> PrologError {
    PrologException::existence_error("variable", &Term::Atom(name.clone()), "Undeclared variable")
        .into()
}

fn wrong_slot(name: &Atom, expected: &str) -> PrologError {
    PrologException::type_error(expected, &Term::Atom(name.clone()), "Wrong kind of declaration")
        .into()
}

impl Env {
    fn declare(&mut self, name: &Atom, slot: Slot) {
        self.slots.insert(name.clone(), slot);
    }

    fn slot(&mut self, name: &Atom) -> Result<&mut Slot> {
        self.slots.get_mut(name).ok_or_else(|| undeclared(name))
    }

    fn term(&self, name: &Atom) -> Result<Term> {
        match self.slots.get(name) {
            Some(Slot::Term(term)) => Ok(term.clone()),
            Some(_) => Err(wrong_slot(name, "variable")),
            None => Err(undeclared(name)),
        }
    }

    fn build(&self, expr: &Expr) -> Result<Term> {
        Ok(match expr {
            Expr::Var(name) => self.term(name)?,
            Expr::Nil => Term::nil(),
            Expr::Atom { name, module } => Term::Atom(qualified(name, module)),
            Expr::Int(i) => Term::int(*i),
            Expr::Float(f) => Term::float(*f),
            Expr::Str(s) => Term::string(s),
            Expr::ListPair(head, tail) => Term::cons(self.build(head)?, self.build(tail)?),
            Expr::List(items) => Term::list(self.build_all(items)?),
            Expr::Functor { name, module, args } => {
                Term::functor(qualified(name, module), self.build_all(args)?)
            }
            Expr::Arith { op, args } => {
                let values = args
                    .iter()
                    .map(|arg| arith::eval(&self.build(arg)?))
                    .collect::<Result<Vec<_>>>()?;
                op.apply(&values)?.to_term()
            }
        })
    }

    fn build_all(&self, exprs: &[Expr]) -> Result<Vec<Term>> {
        exprs.iter().map(|expr| self.build(expr)).collect()
    }
}

fn qualified(name: &Atom, module: &Option<Atom>) -> Atom {
    match module {
        Some(module) => Atom::with_module(name.name(), module),
        None => name.clone(),
    }
}

fn holds(op: Comparison, ordering: Ordering) -> bool {
    match op {
        Comparison::Equal => ordering == Ordering::Equal,
        Comparison::NotEqual => ordering != Ordering::Equal,
        Comparison::Less => ordering == Ordering::Less,
        Comparison::Greater => ordering == Ordering::Greater,
        Comparison::LessOrEqual => ordering != Ordering::Greater,
        Comparison::GreaterOrEqual => ordering != Ordering::Less,
    }
}

/// A compiled program: its functions, and the clauses the interpreter needs
/// for goals only known at runtime.
#[derive(Debug, Clone, Default)]
pub struct Program {
    functions: HashMap<PredicateKey, Function>,
    clauses: Vec<Term>,
    dynamic: Vec<PredicateKey>,
}

impl Program {
    pub fn compile(clauses: &[SourceClause]) -> state::Result<Self> {
        let mut state = CompilerState::new();
        let functions = state
            .compile_program(clauses)?
            .into_iter()
            .map(|function| {
                let key = PredicateKey::new(function.name.clone(), function.arity());
                (key, function)
            })
            .collect();

        Ok(Self {
            functions,
            clauses: clauses
                .iter()
                .filter(|clause| !is_directive(&clause.term))
                .map(|clause| clause.term.clone())
                .collect(),
            dynamic: state.dynamic_keys().cloned().collect(),
        })
    }

    pub fn function(&self, name: &str, arity: usize) -> Option<&Function> {
        self.functions.get(&PredicateKey::new(Atom::a(name), arity))
    }

    pub fn functions(&self) -> impl Iterator<Item = &Function> {
        self.functions.values()
    }

    /// Install the program's clauses in `machine`, so goals the compiled code
    /// hands to the interpreter see the same predicates.
    pub fn load(&self, machine: &mut Machine) -> Result<()> {
        for key in &self.dynamic {
            machine.database.declare_dynamic(key)?;
        }

        for clause in &self.clauses {
            let head = match clause.value() {
                term if term.is_functor(&atom::NECK, 2) => term.functor_args()[0].clone(),
                term => term,
            };
            let dynamic = PredicateKey::of(&head.value())
                .map_or(false, |key| self.dynamic.contains(&key));
            if dynamic {
                machine.database.assert(clause, Position::Last)?;
            } else {
                machine.database.add_static(clause)?;
            }
        }

        tracing::debug!(
            functions = self.functions.len(),
            clauses = self.clauses.len(),
            "loaded program"
        );
        Ok(())
    }

    /// Run the function `name` on `args`, calling `on_solution` with the
    /// bindings of each solution in place. Returning false from
    /// `on_solution` stops the search.
    pub fn solve<F>(&self, machine: &mut Machine, name: &str, args: &[Term], mut on_solution: F) -> Result<()>
    where
        F: FnMut(&mut Machine) -> bool,
    {
        let function = self
            .function(name, args.len())
            .ok_or_else(|| PrologException::unknown_procedure(&Atom::a(name), args.len()))?;
        let mut each = |machine: &mut Machine| -> Result<Flow> {
            Ok(if on_solution(machine) {
                Flow::Next
            } else {
                Flow::Return(false)
            })
        };
        self.invoke(function, args, machine, &mut each)?;
        Ok(())
    }

    /// Every instance of `template` over the solutions of `name(args)`.
    pub fn find_all(&self, machine: &mut Machine, template: &Term, name: &str, args: &[Term]) -> Result<Vec<Term>> {
        let mut found = Vec::new();
        self.solve(machine, name, args, |_| {
            found.push(template.resolved());
            true
        })?;
        Ok(found)
    }

    fn invoke(
        &self,
        function: &Function,
        args: &[Term],
        machine: &mut Machine,
        k: &mut Continuation,
    ) -> Result<Flow> {
        tracing::trace!(function = %function.name, arity = args.len(), "invoking");

        let mut env = Env::default();
        for (name, value) in function.args.iter().zip(args) {
            env.declare(name, Slot::Term(value.clone()));
        }

        let mark = machine.trail.mark();
        let result = match function.determinism {
            Determinism::Nondet => self
                .run(&function.body, &mut env, machine, k)
                .map(|flow| match flow {
                    Flow::Outer(flow) => *flow,
                    _ => Flow::Next,
                }),
            Determinism::Det => self
                .run(&function.body, &mut env, machine, &mut keep_going)
                .and_then(|_| k(machine)),
            Determinism::Semidet => self
                .run(&function.body, &mut env, machine, &mut keep_going)
                .and_then(|flow| match flow {
                    Flow::Return(true) => k(machine),
                    _ => Ok(Flow::Next),
                }),
        };
        machine.trail.unwind(mark);
        result
    }

    fn local(&self, call: &Call) -> Option<&Function> {
        match &call.callee {
            Callee::Local(name) => self
                .functions
                .get(&PredicateKey::new(name.clone(), call.arity())),
            _ => None,
        }
    }

    /// Run `k` on each solution of `goal` found by the interpreter.
    fn interpret(&self, goal: &Term, machine: &mut Machine, k: &mut Continuation) -> Result<Flow> {
        let mut session = Session::new(machine, goal);
        while session.resume()?.is_solution() {
            match k(session.machine())? {
                Flow::Next => {}
                flow => return Ok(flow),
            }
        }
        Ok(Flow::Next)
    }

    /// True if `call` has a solution. Its bindings are undone.
    fn succeeds(&self, call: &Call, env: &Env, machine: &mut Machine) -> Result<bool> {
        let args = env.build_all(&call.args)?;
        match self.local(call) {
            Some(function) => {
                let mut found = false;
                self.invoke(function, &args, machine, &mut |_: &mut Machine| {
                    found = true;
                    Ok(Flow::Return(false))
                })?;
                Ok(found)
            }
            None => machine.succeeds(&Term::functor(call.name().clone(), args)),
        }
    }

    fn test(&self, condition: &Condition, env: &Env, machine: &mut Machine) -> Result<bool> {
        match condition {
            Condition::Call(call) => self.succeeds(call, env, machine),
            Condition::Not(call) => Ok(!self.succeeds(call, env, machine)?),
            Condition::Compare { op, left, right } => {
                let ordering = arith::compare(&env.build(left)?, &env.build(right)?)?;
                Ok(holds(*op, ordering))
            }
        }
    }

    fn run(
        &self,
        statements: &[Statement],
        env: &mut Env,
        machine: &mut Machine,
        k: &mut Continuation,
    ) -> Result<Flow> {
        for statement in statements {
            match self.execute(statement, env, machine, k)? {
                Flow::Next => {}
                flow => return Ok(flow),
            }
        }
        Ok(Flow::Next)
    }

    fn execute(
        &self,
        statement: &Statement,
        env: &mut Env,
        machine: &mut Machine,
        k: &mut Continuation,
    ) -> Result<Flow> {
        Ok(match statement {
            Statement::Call(call) => {
                self.succeeds(call, env, machine)?;
                Flow::Next
            }
            Statement::Declare { name, value } => {
                let slot = match value {
                    Declaration::Variable => Slot::Term(Term::var()),
                    Declaration::Arg(arg) => Slot::Term(env.term(arg)?),
                    Declaration::FindallAnswers(template) => {
                        Slot::Findall(Some(FindallAnswers::new(env.build(template)?)))
                    }
                    Declaration::BagofAnswers { template, goal } => Slot::Bagof(Some(
                        BagofAnswers::new(env.build(template)?, &env.build(goal)?),
                    )),
                    Declaration::Catch(goal) => Slot::Catch {
                        goal: env.build(goal)?,
                        exception: None,
                    },
                };
                env.declare(name, slot);
                Flow::Next
            }
            Statement::AddAnswer(name) => {
                match env.slot(name)? {
                    Slot::Findall(Some(answers)) => answers.add(),
                    Slot::Bagof(Some(answers)) => answers.add(),
                    _ => return Err(wrong_slot(name, "answers")),
                }
                Flow::Next
            }
            Statement::Asserta(clause) => {
                machine.database.assert(&env.build(clause)?, Position::First)?;
                Flow::Next
            }
            Statement::Assertz(clause) => {
                machine.database.assert(&env.build(clause)?, Position::Last)?;
                Flow::Next
            }
            Statement::If { condition, body } => {
                if self.test(condition, env, machine)? {
                    self.run(body, env, machine, k)?
                } else {
                    Flow::Next
                }
            }
            Statement::Foreach { source, body } => self.foreach(source, body, env, machine, k)?,
            Statement::Block(body) => self.run(body, env, machine, k)?,
            Statement::BreakableBlock { label, body } => match self.run(body, env, machine, k)? {
                Flow::Break(ref broken) if broken == label => Flow::Next,
                flow => flow,
            },
            Statement::BreakBlock(label) => Flow::Break(label.clone()),
            Statement::Return | Statement::ReturnTrue => Flow::Return(true),
            Statement::ReturnFalse | Statement::YieldBreak => Flow::Return(false),
            Statement::Yield => match k(machine)? {
                Flow::Next => Flow::Next,
                flow => Flow::Outer(Box::new(flow)),
            },
            Statement::Throw(ball) => return Err(PrologException::new(&env.build(ball)?).into()),
        })
    }

    fn foreach(
        &self,
        source: &Source,
        body: &[Statement],
        env: &mut Env,
        machine: &mut Machine,
        k: &mut Continuation,
    ) -> Result<Flow> {
        match source {
            Source::Call(call) => {
                let args = env.build_all(&call.args)?;
                let mut each = |machine: &mut Machine| self.run(body, &mut *env, machine, &mut *k);
                match self.local(call) {
                    Some(function) => self.invoke(function, &args, machine, &mut each),
                    None => {
                        let goal = Term::functor(call.name().clone(), args);
                        self.interpret(&goal, machine, &mut each)
                    }
                }
            }
            Source::Unify(left, right) => {
                let (left, right) = (env.build(left)?, env.build(right)?);
                let mark = machine.trail.mark();
                let result = if machine.trail.unify(&left, &right) {
                    self.run(body, env, machine, k)
                } else {
                    Ok(Flow::Next)
                };
                machine.trail.unwind(mark);
                result
            }
            Source::Goal { goal, extra } => {
                let mut args = vec![env.build(goal)?];
                args.extend(env.build_all(extra)?);
                let goal = Term::functor(atom::CALL.clone(), args);
                let mut each = |machine: &mut Machine| self.run(body, &mut *env, machine, &mut *k);
                self.interpret(&goal, machine, &mut each)
            }
            Source::Catch(name) => {
                let goal = match env.slot(name)? {
                    Slot::Catch { goal, .. } => goal.clone(),
                    _ => return Err(wrong_slot(name, "catch")),
                };

                let mut thrown = None;
                let flow = {
                    let mut session = Session::new(machine, &goal);
                    loop {
                        match session.resume() {
                            Ok(Yield::Solution) => match self.run(body, env, session.machine(), k)? {
                                Flow::Next => {}
                                flow => break flow,
                            },
                            Ok(Yield::NoMoreSolutions) => break Flow::Next,
                            Err(PrologError::Thrown(exception)) => {
                                thrown = Some(exception);
                                break Flow::Next;
                            }
                            Err(error) => return Err(error),
                        }
                    }
                };

                if let Some(caught) = thrown {
                    tracing::debug!(ball = %caught, "caught exception");
                    if let Slot::Catch { exception, .. } = env.slot(name)? {
                        *exception = Some(caught);
                    }
                }
                Ok(flow)
            }
            Source::Recover { catch, catcher } => {
                let exception = match env.slot(catch)? {
                    Slot::Catch { exception, .. } => exception.take(),
                    _ => return Err(wrong_slot(catch, "catch")),
                };
                let exception = match exception {
                    Some(exception) => exception,
                    None => return Ok(Flow::Next),
                };

                let catcher = env.build(catcher)?;
                let mark = machine.trail.mark();
                if !machine.trail.unify(&catcher, &exception.term()) {
                    machine.trail.unwind(mark);
                    return Err(exception.into());
                }
                let result = self.run(body, env, machine, k);
                machine.trail.unwind(mark);
                result
            }
            Source::Answers {
                collector,
                method,
                bag,
            } => {
                let bag = env.build(bag)?;
                let groups = match (env.slot(collector)?, method) {
                    (Slot::Findall(answers), Collect::Findall) => answers
                        .take()
                        .map(|answers| vec![(Term::nil(), Term::nil(), answers.result())]),
                    (Slot::Bagof(answers), Collect::Bagof) => answers.take().map(|answers| {
                        let witness = answers.witness().clone();
                        answers
                            .result()
                            .into_iter()
                            .map(|(key, group)| (witness.clone(), key, group))
                            .collect()
                    }),
                    (Slot::Bagof(answers), Collect::Setof) => answers.take().map(|answers| {
                        let witness = answers.witness().clone();
                        answers
                            .result_set()
                            .into_iter()
                            .map(|(key, group)| (witness.clone(), key, group))
                            .collect()
                    }),
                    _ => return Err(wrong_slot(collector, "answers")),
                };

                for (witness, key, group) in groups.unwrap_or_default() {
                    let mark = machine.trail.mark();
                    let result = if machine.trail.unify(&witness, &key) && machine.trail.unify(&bag, &group) {
                        self.run(body, env, machine, k)
                    } else {
                        Ok(Flow::Next)
                    };
                    machine.trail.unwind(mark);
                    match result? {
                        Flow::Next => {}
                        flow => return Ok(flow),
                    }
                }
                Ok(Flow::Next)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn neck(head: Term, body: Term) -> SourceClause {
        SourceClause::new(Term::functor2(atom::NECK.clone(), head, body))
    }

    fn program(clauses: Vec<SourceClause>) -> (Program, Machine) {
        let program = Program::compile(&clauses).unwrap();
        let mut machine = Machine::new();
        program.load(&mut machine).unwrap();
        (program, machine)
    }

    #[test]
    fn nondet_facts_enumerate_in_order() {
        let (program, mut machine) = program(vec![
            Term::functor1("colour", Term::atom("red")).into(),
            Term::functor1("colour", Term::atom("green")).into(),
            Term::functor1("colour", Term::atom("blue")).into(),
        ]);
        let x = Term::var();
        let found = program
            .find_all(&mut machine, &x, "colour", &[x.clone()])
            .unwrap();
        assert_eq!(
            found,
            vec![Term::atom("red"), Term::atom("green"), Term::atom("blue")]
        );
        assert!(machine.trail.is_empty());
    }

    #[test]
    fn stopping_early_leaves_no_bindings() {
        let (program, mut machine) = program(vec![
            Term::functor1("n", Term::int(1)).into(),
            Term::functor1("n", Term::int(2)).into(),
        ]);
        let x = Term::var();
        let mut seen = Vec::new();
        program
            .solve(&mut machine, "n", &[x.clone()], |_| {
                seen.push(x.resolved());
                false
            })
            .unwrap();
        assert_eq!(seen, vec![Term::int(1)]);
        assert!(x.value().is_var());
    }

    #[test]
    fn cut_commits_to_the_first_clause() {
        let x = Term::var();
        let (program, mut machine) = program(vec![
            neck(
                Term::functor1("first", x.clone()),
                Term::functor2(
                    atom::COMMA.clone(),
                    Term::functor2("member", x.clone(), Term::list(vec![Term::int(1), Term::int(2)])),
                    Term::atom("!"),
                ),
            ),
            Term::functor1("first", Term::int(3)).into(),
        ]);
        let y = Term::var();
        let found = program.find_all(&mut machine, &y, "first", &[y.clone()]).unwrap();
        assert_eq!(found, vec![Term::int(1)]);
    }

    #[test]
    fn recursion_through_local_functions() {
        let (n, m, r, s) = (Term::var(), Term::var(), Term::var(), Term::var());
        let (program, mut machine) = program(vec![
            Term::functor2("sum_to", Term::int(0), Term::int(0)).into(),
            neck(
                Term::functor2("sum_to", n.clone(), s.clone()),
                Term::functor2(
                    atom::COMMA.clone(),
                    Term::functor2(">", n.clone(), Term::int(0)),
                    Term::functor2(
                        atom::COMMA.clone(),
                        Term::functor2("is", m.clone(), Term::functor2("-", n.clone(), Term::int(1))),
                        Term::functor2(
                            atom::COMMA.clone(),
                            Term::functor2("sum_to", m.clone(), r.clone()),
                            Term::functor2("is", s, Term::functor2("+", r, n)),
                        ),
                    ),
                ),
            ),
        ]);
        let total = Term::var();
        let found = program
            .find_all(&mut machine, &total, "sum_to", &[Term::int(4), total.clone()])
            .unwrap();
        assert_eq!(found, vec![Term::int(10)]);
    }

    #[test]
    fn thrown_terms_reach_the_caller() {
        let (program, mut machine) = program(vec![neck(
            Term::atom("boom"),
            Term::functor1("throw", Term::atom("bang")),
        )]);
        let error = program.solve(&mut machine, "boom", &[], |_| true).unwrap_err();
        let exception = error.exception().unwrap();
        assert_eq!(exception.term(), Term::atom("bang"));
    }

    #[test]
    fn unknown_function_is_an_existence_error() {
        let (program, mut machine) = program(vec![Term::atom("here").into()]);
        let error = program.solve(&mut machine, "missing", &[], |_| true).unwrap_err();
        let info = error.exception().and_then(|e| e.existence_error_info()).unwrap();
        assert_eq!(info.procedure(), Some((Atom::a("missing"), 0)));
    }
}
