use crate::{
    answers::{strip_existential, BagofAnswers, FindallAnswers},
    database::{Clause, ClauseMatches, PredicateKey},
    error::{PrologError, PrologException, Result},
    flags::Unknown,
    indexed::AnswerMatches,
    machine::Machine,
    trail::Point,
};

use ::{
    im::Vector,
    smallvec::SmallVec,
    std::{fmt, mem, ops::Index, vec},
    yieldlog_term::{atom, Term},
};

pub mod builtins;

use builtins::Builtin;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GoalRef(usize);

#[derive(Debug, Clone)]
enum Step {
    Call(Term),
    /// Drop every frame above this height.
    CutTo(usize),
}

#[derive(Debug, Clone)]
struct Goal {
    next: Option<GoalRef>,
    step: Step,
    /// The frame height a `!` in this goal cuts back to.
    depth: usize,
    /// The frame index of the innermost `catch/3` this goal runs under.
    catch: Option<usize>,
}

/// Goal lists are linked through an arena, so a continuation shared by many
/// alternatives is stored once. Everything pushed after a frame is dropped
/// when that frame is retried.
#[derive(Debug, Default)]
struct Goals {
    goals: SmallVec<[Goal; 32]>,
}

impl Index<GoalRef> for Goals {
    type Output = Goal;

    fn index(&self, idx: GoalRef) -> &Goal {
        &self.goals[idx.0]
    }
}

impl Goals {
    #[inline]
    fn cons(
        &mut self,
        next: Option<GoalRef>,
        step: Step,
        depth: usize,
        catch: Option<usize>,
    ) -> GoalRef {
        let id = self.goals.len();
        self.goals.push(Goal {
            next,
            step,
            depth,
            catch,
        });
        GoalRef(id)
    }

    #[inline]
    fn len(&self) -> usize {
        self.goals.len()
    }

    #[inline]
    fn truncate(&mut self, len: usize) {
        self.goals.truncate(len);
    }

    fn clear(&mut self) {
        self.goals.clear();
    }
}

/// What a choice point still has left to try.
enum Alternatives {
    /// The remaining clauses of a predicate.
    Clauses {
        args: Vec<Term>,
        clauses: Vector<Clause>,
        position: usize,
        facts: Option<AnswerMatches>,
    },
    /// The other branch of a disjunction or an if-then-else.
    Goal(Term),
    /// Stored answers, as for `current_op/3`.
    Answers(AnswerMatches),
    /// Argument vectors a nondeterministic builtin produced up front.
    Unifiers {
        args: Vec<Term>,
        candidates: vec::IntoIter<Vec<Term>>,
    },
    Retract {
        key: PredicateKey,
        matches: ClauseMatches,
    },
    Clause(ClauseMatches),
    Repeat,
    /// An active `catch/3`. Retrying it just fails.
    Catch { catcher: Term, recovery: Term },
}

impl fmt::Debug for Alternatives {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Alternatives::Clauses { .. } => "Clauses",
            Alternatives::Goal(_) => "Goal",
            Alternatives::Answers(_) => "Answers",
            Alternatives::Unifiers { .. } => "Unifiers",
            Alternatives::Retract { .. } => "Retract",
            Alternatives::Clause(_) => "Clause",
            Alternatives::Repeat => "Repeat",
            Alternatives::Catch { .. } => "Catch",
        };
        f.write_str(name)
    }
}

/// A choice point.
#[derive(Debug)]
struct Frame {
    /// Unwinding here undoes everything done since the frame was pushed.
    point: Point,
    goals: usize,
    next: Option<GoalRef>,
    depth: usize,
    catch: Option<usize>,
    alternatives: Alternatives,
}

/// The result of a single search for a solution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Yield {
    Solution,
    NoMoreSolutions,
}

impl Yield {
    /// False if there are no more solutions, true otherwise.
    pub fn is_solution(&self) -> bool {
        match self {
            Yield::Solution => true,
            Yield::NoMoreSolutions => false,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub enum Unfolded {
    Succeed(Option<GoalRef>),
    Fail,
}

#[derive(Debug)]
enum Status {
    Ready(Option<GoalRef>),
    Suspended,
    Exhausted,
}

/// A resumable proof of one goal. Each call to [`Session::resume`] finds the
/// next solution, leaving its bindings in place until the following call.
/// Dropping the session undoes every binding it made.
#[derive(Debug)]
pub struct Session<'m> {
    machine: &'m mut Machine,
    goals: Goals,
    frames: SmallVec<[Frame; 8]>,
    start: Point,
    status: Status,
}

impl<'m> Drop for Session<'m> {
    fn drop(&mut self) {
        self.close();
    }
}

impl<'m> Session<'m> {
    pub fn new(machine: &'m mut Machine, goal: &Term) -> Self {
        let start = machine.trail.mark();
        let mut goals = Goals::default();
        let first = goals.cons(None, Step::Call(goal.clone()), 0, None);

        Self {
            machine,
            goals,
            frames: SmallVec::new(),
            start,
            status: Status::Ready(Some(first)),
        }
    }

    pub fn machine(&mut self) -> &mut Machine {
        &mut *self.machine
    }

    /// Undo every binding and stop. Later calls to [`Session::resume`] find
    /// no more solutions.
    pub fn close(&mut self) {
        self.frames.clear();
        self.goals.clear();
        self.machine.trail.unwind(self.start);
        self.status = Status::Exhausted;
    }

    /// Search for the next solution. An uncaught exception closes the session.
    pub fn resume(&mut self) -> Result<Yield> {
        let mut cursor = match mem::replace(&mut self.status, Status::Exhausted) {
            Status::Ready(goals) => Some(goals),
            Status::Suspended => None,
            Status::Exhausted => return Ok(Yield::NoMoreSolutions),
        };

        loop {
            let goals = match cursor.take() {
                Some(goals) => goals,
                None => match self.backtrack() {
                    Some(goals) => goals,
                    None => {
                        self.close();
                        return Ok(Yield::NoMoreSolutions);
                    }
                },
            };

            let goal = match goals {
                Some(goal) => goal,
                None => {
                    self.status = Status::Suspended;
                    return Ok(Yield::Solution);
                }
            };

            let catch = self.goals[goal].catch;
            cursor = match self.step(goal) {
                Ok(Unfolded::Succeed(next)) => Some(next),
                Ok(Unfolded::Fail) => None,
                Err(error) => match self.recover(error, catch) {
                    Ok(next) => Some(next),
                    Err(error) => {
                        self.close();
                        return Err(error);
                    }
                },
            };
        }
    }

    fn backtrack(&mut self) -> Option<Option<GoalRef>> {
        while !self.frames.is_empty() {
            if let Some(goals) = self.retry() {
                return Some(goals);
            }
        }
        None
    }

    fn retry_top(&mut self) -> Unfolded {
        match self.retry() {
            Some(goals) => Unfolded::Succeed(goals),
            None => Unfolded::Fail,
        }
    }

    fn push_frame(
        &mut self,
        next: Option<GoalRef>,
        depth: usize,
        catch: Option<usize>,
        alternatives: Alternatives,
    ) {
        self.frames.push(Frame {
            point: self.machine.trail.mark(),
            goals: self.goals.len(),
            next,
            depth,
            catch,
            alternatives,
        });
    }

    /// Undo everything done since the newest frame was pushed and take its
    /// next alternative. The frame stays only if it has more to try.
    fn retry(&mut self) -> Option<Option<GoalRef>> {
        let mut frame = self.frames.pop()?;
        let trail = &mut self.machine.trail;
        trail.unwind(frame.point);
        self.goals.truncate(frame.goals);

        let (next, depth, catch) = (frame.next, frame.depth, frame.catch);
        let (found, more) = match &mut frame.alternatives {
            Alternatives::Clauses {
                args,
                clauses,
                position,
                facts,
            } => {
                let found = loop {
                    if let Some(matches) = facts.as_mut() {
                        if matches.next(trail) {
                            break Some(next);
                        }
                        *facts = None;
                    }

                    let clause = match clauses.get(*position) {
                        Some(clause) => clause.clone(),
                        None => break None,
                    };
                    *position += 1;

                    match clause {
                        Clause::Facts(store) => *facts = Some(store.borrow_mut().matches(&args[..])),
                        Clause::Rule(rule) => {
                            let (head, body) = rule.renamed();
                            if trail.unify_arrays(&args[..], &head.functor_args()) {
                                break Some(Some(self.goals.cons(
                                    next,
                                    Step::Call(body),
                                    depth,
                                    catch,
                                )));
                            }
                        }
                    }
                };
                (found, facts.is_some() || *position < clauses.len())
            }
            Alternatives::Goal(goal) => {
                let goal = self.goals.cons(next, Step::Call(goal.clone()), depth, catch);
                (Some(Some(goal)), false)
            }
            Alternatives::Answers(matches) => {
                let found = matches.next(trail);
                (if found { Some(next) } else { None }, found)
            }
            Alternatives::Unifiers { args, candidates } => loop {
                match candidates.next() {
                    Some(candidate) => {
                        if trail.unify_arrays(&args[..], &candidate) {
                            break (Some(next), candidates.len() > 0);
                        }
                    }
                    None => break (None, false),
                }
            },
            Alternatives::Retract { key, matches } => match matches.next(trail) {
                Some(found) => {
                    self.machine.database.remove(key, &found);
                    (Some(next), true)
                }
                None => (None, false),
            },
            Alternatives::Clause(matches) => match matches.next(trail) {
                Some(_) => (Some(next), true),
                None => (None, false),
            },
            Alternatives::Repeat => (Some(next), true),
            Alternatives::Catch { .. } => (None, false),
        };

        if found.is_some() && more {
            self.frames.push(frame);
        }
        found
    }

    /// Hand a thrown ball to the innermost `catch/3` whose catcher unifies
    /// with it, discarding everything above that catch.
    fn recover(&mut self, error: PrologError, mut catch: Option<usize>) -> Result<Option<GoalRef>> {
        let exception = match error {
            PrologError::Thrown(exception) => exception,
            other => return Err(other),
        };

        while let Some(index) = catch {
            self.frames.truncate(index + 1);
            let frame = match self.frames.pop() {
                Some(frame) => frame,
                None => break,
            };
            self.machine.trail.unwind(frame.point);
            self.goals.truncate(frame.goals);
            catch = frame.catch;

            if let Alternatives::Catch { catcher, recovery } = frame.alternatives {
                let ball = exception.term();
                if self.machine.trail.unify(&catcher, &ball) {
                    tracing::debug!(ball = %ball, "caught exception");
                    let depth = self.frames.len();
                    let goal = self.goals.cons(frame.next, Step::Call(recovery), depth, catch);
                    return Ok(Some(goal));
                }
            }
        }

        Err(exception.into())
    }

    fn step(&mut self, goal: GoalRef) -> Result<Unfolded> {
        let Goal {
            next,
            step,
            depth,
            catch,
        } = self.goals[goal].clone();

        match step {
            Step::CutTo(height) => {
                self.frames.truncate(height);
                Ok(Unfolded::Succeed(next))
            }
            Step::Call(term) => self.call(term, next, depth, catch),
        }
    }

    fn call(
        &mut self,
        goal: Term,
        next: Option<GoalRef>,
        depth: usize,
        catch: Option<usize>,
    ) -> Result<Unfolded> {
        let goal = goal.value();
        let (name, arity) = match goal.name_arity() {
            Some(key) => key,
            None if goal.is_var() => {
                return Err(PrologException::instantiation_error("Goal is an unbound variable").into())
            }
            None => {
                return Err(PrologException::type_error("callable", &goal, "Goal is not callable").into())
            }
        };
        let args = goal.functor_args();
        let height = self.frames.len();
        tracing::trace!(goal = %goal, depth, "calling");

        let unfolded = match (name.name(), arity) {
            ("true", 0) => Unfolded::Succeed(next),
            ("fail", 0) | ("false", 0) => Unfolded::Fail,
            ("!", 0) => {
                self.frames.truncate(depth);
                Unfolded::Succeed(next)
            }
            (",", 2) => {
                let right = self.goals.cons(next, Step::Call(args[1].clone()), depth, catch);
                let left = self.goals.cons(Some(right), Step::Call(args[0].clone()), depth, catch);
                Unfolded::Succeed(Some(left))
            }
            (";", 2) => {
                let left = args[0].value();
                if left.is_functor(&atom::ARROW, 2) {
                    let branches = left.functor_args();
                    self.if_then_else(&branches[0], &branches[1], Some(&args[1]), next, depth, catch)
                } else {
                    self.push_frame(next, depth, catch, Alternatives::Goal(args[1].clone()));
                    Unfolded::Succeed(Some(self.goals.cons(next, Step::Call(left), depth, catch)))
                }
            }
            ("->", 2) => self.if_then_else(&args[0], &args[1], None, next, depth, catch),
            ("\\+", 1) => {
                let fail = Term::Atom(atom::FAIL.clone());
                let succeed = Term::Atom(atom::TRUE.clone());
                self.if_then_else(&args[0], &fail, Some(&succeed), next, depth, catch)
            }
            ("once", 1) => {
                let succeed = Term::Atom(atom::TRUE.clone());
                self.if_then_else(&args[0], &succeed, None, next, depth, catch)
            }
            ("call", n) if n >= 1 => {
                let goal = add_args(&args[0], &args[1..])?;
                Unfolded::Succeed(Some(self.goals.cons(next, Step::Call(goal), height, catch)))
            }
            ("^", 2) => {
                Unfolded::Succeed(Some(self.goals.cons(next, Step::Call(args[1].clone()), height, catch)))
            }
            ("catch", 3) => {
                self.push_frame(
                    next,
                    depth,
                    catch,
                    Alternatives::Catch {
                        catcher: args[1].clone(),
                        recovery: args[2].clone(),
                    },
                );
                let protected = Step::Call(args[0].clone());
                Unfolded::Succeed(Some(self.goals.cons(next, protected, height + 1, Some(height))))
            }
            ("findall", 3) => self.findall(&args, next)?,
            ("bagof", 3) => self.bagof(&args, next, depth, catch, false)?,
            ("setof", 3) => self.bagof(&args, next, depth, catch, true)?,
            ("repeat", 0) => {
                self.push_frame(next, depth, catch, Alternatives::Repeat);
                Unfolded::Succeed(next)
            }
            ("retract", 1) => {
                let (key, matches) = self.machine.database.retract(&args[0])?;
                self.push_frame(next, depth, catch, Alternatives::Retract { key, matches });
                self.retry_top()
            }
            ("clause", 2) => {
                let matches = self.machine.database.clause(&args[0], &args[1])?;
                self.push_frame(next, depth, catch, Alternatives::Clause(matches));
                self.retry_top()
            }
            ("current_op", 3) => {
                builtins::check_current_op(&args)?;
                let matches = self.machine.operators.matches(&args);
                self.push_frame(next, depth, catch, Alternatives::Answers(matches));
                self.retry_top()
            }
            _ => self.call_predicate(PredicateKey::new(name, arity), args.to_vec(), next, catch)?,
        };

        Ok(unfolded)
    }

    /// `(Cond -> Then ; Else)`. A frame for Else is pushed first, and a
    /// successful Cond cuts back to below it before running Then. A `!` in
    /// Cond is local to Cond.
    fn if_then_else(
        &mut self,
        cond: &Term,
        then: &Term,
        otherwise: Option<&Term>,
        next: Option<GoalRef>,
        depth: usize,
        catch: Option<usize>,
    ) -> Unfolded {
        let barrier = self.frames.len();
        if let Some(otherwise) = otherwise {
            self.push_frame(next, depth, catch, Alternatives::Goal(otherwise.clone()));
        }

        let then = self.goals.cons(next, Step::Call(then.clone()), depth, catch);
        let commit = self.goals.cons(Some(then), Step::CutTo(barrier), depth, catch);
        let cond = self.goals.cons(
            Some(commit),
            Step::Call(cond.clone()),
            self.frames.len(),
            catch,
        );
        Unfolded::Succeed(Some(cond))
    }

    fn unify_then(&mut self, l: &Term, r: &Term, next: Option<GoalRef>) -> Unfolded {
        if self.machine.trail.unify(l, r) {
            Unfolded::Succeed(next)
        } else {
            Unfolded::Fail
        }
    }

    /// Try each argument vector in turn against `args`.
    fn try_each(
        &mut self,
        args: Vec<Term>,
        candidates: Vec<Vec<Term>>,
        next: Option<GoalRef>,
        depth: usize,
        catch: Option<usize>,
    ) -> Unfolded {
        let alternatives = Alternatives::Unifiers {
            args,
            candidates: candidates.into_iter(),
        };
        self.push_frame(next, depth, catch, alternatives);
        self.retry_top()
    }

    /// Run `goal` to exhaustion in a nested session on the same machine,
    /// calling `each` at every solution.
    fn for_each_solution<F>(&mut self, goal: &Term, mut each: F) -> Result<()>
    where
        F: FnMut(),
    {
        let mut inner = Session::new(&mut *self.machine, goal);
        while inner.resume()?.is_solution() {
            each();
        }
        Ok(())
    }

    fn findall(&mut self, args: &[Term], next: Option<GoalRef>) -> Result<Unfolded> {
        let mut answers = FindallAnswers::new(args[0].clone());
        self.for_each_solution(&args[1], || answers.add())?;
        Ok(self.unify_then(&args[2], &answers.result(), next))
    }

    /// `bagof/3`, or `setof/3` when `set` is true. Each group of answers
    /// sharing the same bindings for the free variables is one solution.
    fn bagof(
        &mut self,
        args: &[Term],
        next: Option<GoalRef>,
        depth: usize,
        catch: Option<usize>,
        set: bool,
    ) -> Result<Unfolded> {
        let mut answers = BagofAnswers::new(args[0].clone(), &args[1]);
        let (goal, _) = strip_existential(&args[1]);
        self.for_each_solution(&goal, || answers.add())?;

        let pattern = vec![answers.witness().clone(), args[2].clone()];
        let groups = if set {
            answers.result_set()
        } else {
            answers.result()
        };
        if groups.is_empty() {
            return Ok(Unfolded::Fail);
        }

        let candidates = groups
            .into_iter()
            .map(|(witness, bag)| vec![witness, bag])
            .collect();
        Ok(self.try_each(pattern, candidates, next, depth, catch))
    }

    fn call_predicate(
        &mut self,
        key: PredicateKey,
        args: Vec<Term>,
        next: Option<GoalRef>,
        catch: Option<usize>,
    ) -> Result<Unfolded> {
        let height = self.frames.len();
        if let Some(builtin) = builtins::lookup(&key) {
            return Ok(match builtin {
                Builtin::Det(f) => {
                    if f(&mut *self.machine, &args)? {
                        Unfolded::Succeed(next)
                    } else {
                        Unfolded::Fail
                    }
                }
                Builtin::Nondet(f) => {
                    let candidates = f(&mut *self.machine, &args)?;
                    self.try_each(args, candidates, next, height, catch)
                }
            });
        }

        let clauses = match self.machine.database.get(&key) {
            Some(predicate) => predicate.clauses(),
            None => {
                return match self.machine.flags.unknown {
                    Unknown::Error => {
                        Err(PrologException::unknown_procedure(&key.name, key.arity).into())
                    }
                    Unknown::Warning => {
                        tracing::warn!(predicate = %key, "unknown procedure");
                        Ok(Unfolded::Fail)
                    }
                    Unknown::Fail => Ok(Unfolded::Fail),
                }
            }
        };

        let alternatives = Alternatives::Clauses {
            args,
            clauses,
            position: 0,
            facts: None,
        };
        self.push_frame(next, height, catch, alternatives);
        Ok(self.retry_top())
    }
}

/// `call/N`: add `extra` to the arguments of `goal`.
fn add_args(goal: &Term, extra: &[Term]) -> Result<Term> {
    let goal = goal.value();
    if extra.is_empty() {
        return Ok(goal);
    }

    match goal.name_arity() {
        Some((name, _)) => {
            let args = goal.functor_args().into_iter().chain(extra.iter().cloned());
            Ok(Term::functor(name, args))
        }
        None if goal.is_var() => {
            Err(PrologException::instantiation_error("Goal to call is an unbound variable").into())
        }
        None => Err(PrologException::type_error("callable", &goal, "Goal to call is not callable").into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::machine::OutputBuffer;

    fn solutions(machine: &mut Machine, template: &Term, goal: &Term) -> Vec<Term> {
        machine.find_all(template, goal).unwrap()
    }

    fn conj(l: Term, r: Term) -> Term {
        Term::functor2(",", l, r)
    }

    fn disj(l: Term, r: Term) -> Term {
        Term::functor2(";", l, r)
    }

    fn eq(l: Term, r: Term) -> Term {
        Term::functor2("=", l, r)
    }

    #[test]
    fn disjunction_tries_both_branches_in_order() {
        let mut machine = Machine::new();
        let x = Term::var();
        let goal = disj(eq(x.clone(), Term::int(1)), eq(x.clone(), Term::int(2)));
        assert_eq!(solutions(&mut machine, &x, &goal), vec![Term::int(1), Term::int(2)]);
        assert!(x.is_var());
    }

    #[test]
    fn cut_commits_to_the_first_clause() {
        let mut machine = Machine::new();
        let x = Term::var();
        for clause in vec![
            Term::functor2(":-", Term::functor1("p", Term::int(1)), Term::atom("!")),
            Term::functor1("p", Term::int(2)),
        ] {
            machine.database.add_static(&clause).unwrap();
        }

        let goal = Term::functor1("p", x.clone());
        assert_eq!(solutions(&mut machine, &x, &goal), vec![Term::int(1)]);

        // A cut inside call/1 only cuts the called goal.
        let y = Term::var();
        let goal = disj(
            Term::functor1("call", conj(eq(y.clone(), Term::int(1)), Term::atom("!"))),
            eq(y.clone(), Term::int(2)),
        );
        assert_eq!(solutions(&mut machine, &y, &goal), vec![Term::int(1), Term::int(2)]);
    }

    #[test]
    fn negation_leaves_no_bindings() {
        let mut machine = Machine::new();
        let x = Term::var();
        let goal = conj(
            Term::functor1("\\+", Term::functor1("\\+", eq(x.clone(), Term::int(1)))),
            Term::functor1("var", x.clone()),
        );
        assert!(machine.succeeds(&goal).unwrap());
    }

    #[test]
    fn if_then_without_else_fails_when_the_condition_does() {
        let mut machine = Machine::new();
        let goal = Term::functor2("->", Term::atom("fail"), Term::atom("true"));
        assert!(!machine.succeeds(&goal).unwrap());
    }

    #[test]
    fn uncaught_exceptions_reach_the_caller() {
        let mut machine = Machine::new();
        let x = Term::var();
        let goal = conj(
            eq(x.clone(), Term::int(1)),
            Term::functor1("throw", Term::functor1("oops", x.clone())),
        );
        let error = machine.succeeds(&goal).unwrap_err();
        assert_eq!(
            error.exception().unwrap().term(),
            Term::functor1("oops", Term::int(1))
        );
        assert!(x.is_var());
    }

    #[test]
    fn catch_rethrows_on_mismatch_and_runs_recovery_on_match() {
        let mut machine = Machine::new();
        let x = Term::var();
        let inner = Term::functor3(
            "catch",
            Term::functor1("throw", Term::atom("b")),
            Term::atom("a"),
            Term::atom("true"),
        );
        let goal = Term::functor3("catch", inner, x.clone(), Term::atom("true"));
        assert_eq!(solutions(&mut machine, &x, &goal), vec![Term::atom("b")]);
    }

    #[test]
    fn unknown_flag_controls_missing_predicates() {
        let mut machine = Machine::new();
        let goal = Term::functor1("nowhere", Term::int(1));
        let error = machine.succeeds(&goal).unwrap_err();
        let info = error.exception().unwrap().existence_error_info().unwrap();
        assert_eq!(info.procedure(), Some((yieldlog_term::Atom::a("nowhere"), 1)));

        machine.flags.unknown = Unknown::Fail;
        assert!(!machine.succeeds(&goal).unwrap());
        machine.flags.unknown = Unknown::Warning;
        assert!(!machine.succeeds(&goal).unwrap());
    }

    #[test]
    fn bagof_enumerates_groups_and_setof_sorts() {
        let mut machine = Machine::new();
        for (k, v) in &[("b", 3), ("a", 2), ("b", 1)] {
            let fact = Term::functor2("kv", Term::atom(k), Term::int(*v));
            machine.database.assert(&fact, crate::database::Position::Last).unwrap();
        }

        let (k, v, bag) = (Term::var(), Term::var(), Term::var());
        let template = Term::functor2("-", k.clone(), bag.clone());
        let goal = Term::functor3("bagof", v.clone(), Term::functor2("kv", k.clone(), v.clone()), bag.clone());
        assert_eq!(
            solutions(&mut machine, &template, &goal),
            vec![
                Term::functor2("-", Term::atom("b"), Term::list(vec![Term::int(3), Term::int(1)])),
                Term::functor2("-", Term::atom("a"), Term::list(vec![Term::int(2)])),
            ]
        );

        let goal = Term::functor3(
            "setof",
            v.clone(),
            Term::functor2("^", k.clone(), Term::functor2("kv", k.clone(), v.clone())),
            bag.clone(),
        );
        assert_eq!(
            solutions(&mut machine, &bag, &goal),
            vec![Term::list(vec![Term::int(1), Term::int(2), Term::int(3)])]
        );

        let goal = Term::functor3("bagof", v.clone(), Term::atom("fail"), bag);
        assert!(!machine.succeeds(&goal).unwrap());
    }

    #[test]
    fn repeat_runs_until_cut() {
        let buffer = OutputBuffer::new();
        let mut machine = Machine::with_output(Box::new(buffer.clone()));
        machine.database.declare_dynamic(&PredicateKey::new("counter".into(), 1)).unwrap();
        machine
            .database
            .assert(&Term::functor1("counter", Term::int(0)), crate::database::Position::Last)
            .unwrap();

        // repeat, retract(counter(N)), M is N + 1, assertz(counter(M)), write(M), M >= 3, !
        let (n, m) = (Term::var(), Term::var());
        let steps = vec![
            Term::atom("repeat"),
            Term::functor1("retract", Term::functor1("counter", n.clone())),
            Term::functor2("is", m.clone(), Term::functor2("+", n.clone(), Term::int(1))),
            Term::functor1("assertz", Term::functor1("counter", m.clone())),
            Term::functor1("write", m.clone()),
            Term::functor2(">=", m.clone(), Term::int(3)),
            Term::atom("!"),
        ];
        let goal = steps
            .into_iter()
            .rev()
            .fold(None, |acc: Option<Term>, step| {
                Some(match acc {
                    Some(rest) => conj(step, rest),
                    None => step,
                })
            })
            .unwrap();

        assert_eq!(solutions(&mut machine, &Term::atom("done"), &goal).len(), 1);
        assert_eq!(buffer.contents(), "123");
    }
}
