//! The intermediate statement tree a predicate is lowered into. The tree is
//! target-agnostic: determinism, cut placement and control shape are already
//! decided, so an emitter only has to print each node.

use ::{serde::Serialize, yieldlog::arith::ArithOp, yieldlog_term::Atom};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Determinism {
    /// Exactly one solution; never leaves a choice point.
    Det,
    /// Zero or one solution.
    Semidet,
    /// Any number of solutions.
    Nondet,
}

impl Determinism {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "det" => Some(Determinism::Det),
            "semidet" => Some(Determinism::Semidet),
            "nondet" => Some(Determinism::Nondet),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Determinism::Det => "det",
            Determinism::Semidet => "semidet",
            Determinism::Nondet => "nondet",
        }
    }

    pub fn return_type(self) -> ReturnType {
        match self {
            Determinism::Det => ReturnType::Void,
            Determinism::Semidet => ReturnType::Bool,
            Determinism::Nondet => ReturnType::Solutions,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnType {
    Void,
    Bool,
    /// A resumable sequence of solutions.
    Solutions,
}

/// Code that builds a term at runtime.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Expr {
    /// A declared variable or a function argument.
    Var(Atom),
    Nil,
    Atom {
        name: Atom,
        module: Option<Atom>,
    },
    Int(i64),
    Float(f64),
    Str(String),
    ListPair(Box<Expr>, Box<Expr>),
    /// A proper list of two or more elements.
    List(Vec<Expr>),
    Functor {
        name: Atom,
        module: Option<Atom>,
        args: Vec<Expr>,
    },
    /// An evaluated arithmetic function, from the right side of `is/2` or a
    /// comparison.
    Arith {
        op: ArithOp,
        args: Vec<Expr>,
    },
}

/// Who answers a call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Callee {
    /// A runtime builtin predicate.
    Builtin(Atom),
    /// A function compiled in the same program.
    Local(Atom),
    /// A function the program imports from another module.
    Module { module: Atom, name: Atom },
    /// A dynamic predicate, matched against the registry at runtime.
    Dynamic(Atom),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Call {
    pub callee: Callee,
    pub args: Vec<Expr>,
}

impl Call {
    pub fn name(&self) -> &Atom {
        match &self.callee {
            Callee::Builtin(name)
            | Callee::Local(name)
            | Callee::Dynamic(name)
            | Callee::Module { name, .. } => name,
        }
    }

    pub fn arity(&self) -> usize {
        self.args.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparison {
    Equal,
    NotEqual,
    Less,
    Greater,
    LessOrEqual,
    GreaterOrEqual,
}

impl Comparison {
    /// The arithmetic comparison written as `name/2`.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "=:=" => Some(Comparison::Equal),
            "=\\=" => Some(Comparison::NotEqual),
            "<" => Some(Comparison::Less),
            ">" => Some(Comparison::Greater),
            "=<" => Some(Comparison::LessOrEqual),
            ">=" => Some(Comparison::GreaterOrEqual),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Comparison::Equal => "=:=",
            Comparison::NotEqual => "=\\=",
            Comparison::Less => "<",
            Comparison::Greater => ">",
            Comparison::LessOrEqual => "=<",
            Comparison::GreaterOrEqual => ">=",
        }
    }
}

/// The test of an `if`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    /// A semidet call succeeds.
    Call(Call),
    /// A semidet call fails.
    Not(Call),
    Compare {
        op: Comparison,
        left: Expr,
        right: Expr,
    },
}

/// How a finished answer collector binds its bag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Collect {
    Findall,
    Bagof,
    Setof,
}

/// Something a `foreach` draws solutions from.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Call(Call),
    Unify(Expr, Expr),
    /// A goal only known at runtime, as in `call/N`.
    Goal { goal: Expr, extra: Vec<Expr> },
    /// Solutions of the goal of a declared catch. An exception raised by the
    /// goal ends the iteration and is kept for [`Source::Recover`].
    Catch(Atom),
    /// Once, if the declared catch holds an exception which unifies with
    /// `catcher`. An exception which does not unify is rethrown.
    Recover { catch: Atom, catcher: Expr },
    /// The results of a declared answer collector unified with `bag`.
    Answers {
        collector: Atom,
        method: Collect,
        bag: Expr,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Declaration {
    /// A fresh unbound variable.
    Variable,
    /// The value passed for a function argument.
    Arg(Atom),
    FindallAnswers(Expr),
    BagofAnswers { template: Expr, goal: Expr },
    Catch(Expr),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Statement {
    /// A det call run for its effect.
    Call(Call),
    Declare {
        name: Atom,
        value: Declaration,
    },
    /// Record the current instance of a collector's template.
    AddAnswer(Atom),
    Asserta(Expr),
    Assertz(Expr),
    If {
        condition: Condition,
        body: Vec<Statement>,
    },
    /// Run `body` once per solution of `source`.
    Foreach {
        source: Source,
        body: Vec<Statement>,
    },
    /// A nested scope for the declarations of one clause.
    Block(Vec<Statement>),
    BreakableBlock {
        label: Atom,
        body: Vec<Statement>,
    },
    BreakBlock(Atom),
    Return,
    ReturnTrue,
    ReturnFalse,
    /// Produce one solution of a nondet function.
    Yield,
    /// End a function with no further solutions.
    YieldBreak,
    Throw(Expr),
}

/// One compiled predicate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Function {
    pub name: Atom,
    pub determinism: Determinism,
    pub return_type: ReturnType,
    pub args: Vec<Atom>,
    pub body: Vec<Statement>,
    /// Display names of the head variables, in first-occurrence order.
    pub variable_names: Vec<Atom>,
}

impl Function {
    pub fn arity(&self) -> usize {
        self.args.len()
    }
}
