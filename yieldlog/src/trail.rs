use ::{
    smallvec::SmallVec,
    std::ops::{Deref, DerefMut},
    yieldlog_term::{Term, Variable},
};

/// A point in the trail which can be unwound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Point(usize);

/// The record of every variable bound since some earlier point, so that the
/// bindings can be undone in reverse order on backtracking.
#[derive(Debug, Default)]
pub struct Trail {
    bound: SmallVec<[Variable; 64]>,
}

impl Trail {
    pub fn new() -> Self {
        Self {
            bound: SmallVec::new(),
        }
    }

    #[inline(always)]
    pub fn mark(&self) -> Point {
        Point(self.bound.len())
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bound.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bound.is_empty()
    }

    /// Bind `var` to `value` and remember it for unwinding.
    #[inline]
    pub fn bind(&mut self, var: &Variable, value: Term) {
        var.set_binding(value);
        self.bound.push(var.clone());
    }

    /// Unbind everything bound since `point`, newest first. Unwinding to a
    /// point at or past the end of the trail does nothing.
    #[inline]
    pub fn unwind(&mut self, point: Point) {
        while self.bound.len() > point.0 {
            if let Some(var) = self.bound.pop() {
                var.clear_binding();
            }
        }
    }

    pub fn clear(&mut self) {
        self.unwind(Point(0));
    }

    /// Open a scope whose bindings are undone when it is dropped. The scope
    /// derefs to the trail, so scopes nest.
    pub fn scope(&mut self) -> TrailScope {
        let point = self.mark();
        TrailScope { trail: self, point }
    }
}

/// Scope guard returned by [`Trail::scope`].
#[derive(Debug)]
pub struct TrailScope<'t> {
    trail: &'t mut Trail,
    point: Point,
}

impl<'t> TrailScope<'t> {
    pub fn point(&self) -> Point {
        self.point
    }

    /// Keep the bindings made in this scope: they become owned by the
    /// enclosing trail point instead of being undone on drop.
    pub fn commit(mut self) {
        self.point = Point(usize::max_value());
    }
}

impl<'t> Deref for TrailScope<'t> {
    type Target = Trail;

    fn deref(&self) -> &Trail {
        self.trail
    }
}

impl<'t> DerefMut for TrailScope<'t> {
    fn deref_mut(&mut self) -> &mut Trail {
        self.trail
    }
}

impl<'t> Drop for TrailScope<'t> {
    fn drop(&mut self) {
        self.trail.unwind(self.point);
    }
}
