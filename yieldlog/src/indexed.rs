//! Ground fact tuples for one predicate, with indexes built on demand.
//!
//! Every query computes a signature: bit `i` is set when argument `i` is an
//! atom or a string after dereferencing. The first query with a given
//! signature scans every stored answer and files it under the values at the
//! signature's positions; later queries with the same signature go straight to
//! the matching positions. Appending an answer extends every index already
//! built. Prepending or removing one changes positions, so all indexes are
//! dropped and rebuilt lazily.

use crate::{
    copy::CopyStore,
    error::{PrologException, Result},
    trail::{Point, Trail},
};

use ::{
    roaring::RoaringBitmap,
    smallvec::SmallVec,
    std::{collections::HashMap, rc::Rc},
    yieldlog_term::{Atom, Term},
};

/// Argument positions past this one never take part in a signature.
pub const MAX_INDEX_ARGS: usize = 31;

/// One stored ground tuple.
pub type Answer = Rc<[Term]>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum IndexValue {
    Atom(Atom),
    Str(Rc<str>),
}

impl IndexValue {
    fn of(term: &Term) -> Option<Self> {
        match term.value() {
            Term::Atom(a) => Some(IndexValue::Atom(a)),
            Term::Str(s) => Some(IndexValue::Str(s)),
            _ => None,
        }
    }
}

/// One slot per argument. The signature is implicit in which slots are set.
type IndexKey = SmallVec<[Option<IndexValue>; 4]>;

#[derive(Debug)]
pub struct IndexedAnswers {
    arity: usize,
    all_answers: Vec<Answer>,
    indexes: HashMap<IndexKey, RoaringBitmap>,
    built_signatures: RoaringBitmap,
}

impl IndexedAnswers {
    pub fn new(arity: usize) -> Self {
        Self {
            arity,
            all_answers: Vec::new(),
            indexes: HashMap::new(),
            built_signatures: RoaringBitmap::new(),
        }
    }

    pub fn arity(&self) -> usize {
        self.arity
    }

    pub fn len(&self) -> usize {
        self.all_answers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.all_answers.is_empty()
    }

    /// The stored answers in order.
    pub fn answers(&self) -> impl Iterator<Item = &Answer> {
        self.all_answers.iter()
    }

    /// Append a copy of `answer`, extending every index built so far.
    pub fn add_answer(&mut self, answer: &[Term]) -> Result<()> {
        let answer = match self.ground_copy(answer)? {
            Some(answer) => answer,
            None => return Ok(()),
        };

        let position = self.all_answers.len() as u32;
        let signatures: Vec<u32> = self.built_signatures.iter().collect();
        for signature in signatures {
            self.index_answer(signature, position, &answer);
        }
        self.all_answers.push(answer);
        Ok(())
    }

    /// Prepend a copy of `answer`. This invalidates all indexes.
    pub fn prepend_answer(&mut self, answer: &[Term]) -> Result<()> {
        if let Some(answer) = self.ground_copy(answer)? {
            self.all_answers.insert(0, answer);
            self.clear_indexes();
        }
        Ok(())
    }

    /// Remove exactly this stored answer, if it is still present.
    pub fn remove(&mut self, answer: &Answer) -> bool {
        match self.all_answers.iter().position(|a| Rc::ptr_eq(a, answer)) {
            Some(i) => {
                self.all_answers.remove(i);
                self.clear_indexes();
                true
            }
            None => false,
        }
    }

    fn ground_copy(&self, answer: &[Term]) -> Result<Option<Answer>> {
        if answer.len() != self.arity {
            tracing::warn!(
                expected = self.arity,
                found = answer.len(),
                "ignoring answer of the wrong arity"
            );
            return Ok(None);
        }

        let mut store = CopyStore::new();
        let copy: Vec<Term> = answer.iter().map(|term| store.make_copy(term)).collect();
        if store.n_unique_variables() > 0 {
            return Err(PrologException::instantiation_error(&format!(
                "Elements of answer must be ground, but found {} unbound variables",
                store.n_unique_variables()
            ))
            .into());
        }

        Ok(Some(Rc::from(copy)))
    }

    fn clear_indexes(&mut self) {
        self.indexes.clear();
        self.built_signatures.clear();
    }

    fn index_answer(&mut self, signature: u32, position: u32, answer: &[Term]) {
        let mut key = IndexKey::new();
        for (i, term) in answer.iter().enumerate() {
            if i < MAX_INDEX_ARGS && signature & (1 << i) != 0 {
                match IndexValue::of(term) {
                    Some(value) => key.push(Some(value)),
                    // The signature wants a value here that this answer can't give.
                    None => return,
                }
            } else {
                key.push(None);
            }
        }

        self.indexes
            .entry(key)
            .or_insert_with(RoaringBitmap::new)
            .insert(position);
    }

    fn build_index(&mut self, signature: u32) {
        tracing::debug!(signature, answers = self.all_answers.len(), "building index");
        for position in 0..self.all_answers.len() {
            let answer = self.all_answers[position].clone();
            self.index_answer(signature, position as u32, &answer);
        }
        self.built_signatures.insert(signature);
    }

    /// Start matching `args` against the stored answers. The candidates are
    /// fixed at this call, so answers added while iterating are not seen.
    pub fn matches(&mut self, args: &[Term]) -> AnswerMatches {
        if args.len() != self.arity {
            return AnswerMatches::empty();
        }

        let mut key = IndexKey::new();
        let mut signature = 0u32;
        let mut got_all_index_args = true;
        for (i, arg) in args.iter().enumerate() {
            let value = if i < MAX_INDEX_ARGS {
                IndexValue::of(arg)
            } else {
                None
            };
            if value.is_some() {
                signature |= 1 << i;
            } else {
                got_all_index_args = false;
            }
            key.push(value);
        }

        let candidates = if signature == 0 {
            self.all_answers.clone()
        } else {
            if !self.built_signatures.contains(signature) {
                self.build_index(signature);
            }

            match self.indexes.get(&key) {
                Some(positions) if got_all_index_args => positions
                    .iter()
                    .take(1)
                    .map(|i| self.all_answers[i as usize].clone())
                    .collect(),
                Some(positions) => positions
                    .iter()
                    .map(|i| self.all_answers[i as usize].clone())
                    .collect(),
                None => Vec::new(),
            }
        };

        AnswerMatches {
            args: args.to_vec(),
            indexed: signature,
            candidates,
            next: 0,
            point: None,
        }
    }

    /// Match `args` against every stored answer without using the indexes,
    /// as `clause/2` and `retract/1` do.
    pub fn scan(&self, args: &[Term]) -> AnswerMatches {
        if args.len() != self.arity {
            return AnswerMatches::empty();
        }

        AnswerMatches {
            args: args.to_vec(),
            indexed: 0,
            candidates: self.all_answers.clone(),
            next: 0,
            point: None,
        }
    }
}

/// A resumable match over a snapshot of candidate answers. Each call to
/// [`AnswerMatches::next`] first undoes the bindings of the previous success.
#[derive(Debug)]
pub struct AnswerMatches {
    args: Vec<Term>,
    indexed: u32,
    candidates: Vec<Answer>,
    next: usize,
    point: Option<Point>,
}

impl AnswerMatches {
    pub fn empty() -> Self {
        Self {
            args: Vec::new(),
            indexed: 0,
            candidates: Vec::new(),
            next: 0,
            point: None,
        }
    }

    /// Advance to the next matching answer and return it, leaving its
    /// bindings in place.
    pub fn next_answer(&mut self, trail: &mut Trail) -> Option<Answer> {
        if let Some(point) = self.point.take() {
            trail.unwind(point);
        }

        while self.next < self.candidates.len() {
            let answer = self.candidates[self.next].clone();
            self.next += 1;

            let point = trail.mark();
            if self.unify_unindexed(trail, &answer) {
                self.point = Some(point);
                return Some(answer);
            }
            trail.unwind(point);
        }

        None
    }

    /// Advance to the next match. Returns false once exhausted, with every
    /// binding undone.
    pub fn next(&mut self, trail: &mut Trail) -> bool {
        self.next_answer(trail).is_some()
    }

    /// Undo the current bindings and drop the remaining candidates.
    pub fn close(&mut self, trail: &mut Trail) {
        if let Some(point) = self.point.take() {
            trail.unwind(point);
        }
        self.next = self.candidates.len();
    }

    fn unify_unindexed(&self, trail: &mut Trail, answer: &[Term]) -> bool {
        self.args.iter().zip(answer.iter()).enumerate().all(|(i, (arg, value))| {
            (i < MAX_INDEX_ARGS && self.indexed & (1 << i) != 0) || trail.unify(arg, value)
        })
    }
}
