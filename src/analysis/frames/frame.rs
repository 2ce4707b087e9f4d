//! Per-instruction abstract machine state.

use crate::analysis::frames::interpreter::Interpreter;

/// Local slots and operand stack before one instruction.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame<V> {
    locals: Vec<V>,
    stack: Vec<V>,
}

impl<V: Clone + PartialEq> Frame<V> {
    /// Creates a frame with the given locals and an empty stack.
    #[must_use]
    pub fn new(locals: Vec<V>) -> Self {
        Frame {
            locals,
            stack: Vec::new(),
        }
    }

    /// All local slots.
    #[must_use]
    pub fn locals(&self) -> &[V] {
        &self.locals
    }

    /// The operand stack, bottom first.
    #[must_use]
    pub fn stack(&self) -> &[V] {
        &self.stack
    }

    /// Value of a local slot.
    #[must_use]
    pub fn local(&self, slot: usize) -> Option<&V> {
        self.locals.get(slot)
    }

    /// Current operand stack depth.
    #[must_use]
    pub fn stack_size(&self) -> usize {
        self.stack.len()
    }

    /// The value on top of the stack.
    #[must_use]
    pub fn stack_top(&self) -> Option<&V> {
        self.stack.last()
    }

    pub(crate) fn push(&mut self, value: V) {
        self.stack.push(value);
    }

    pub(crate) fn pop(&mut self) -> Option<V> {
        self.stack.pop()
    }

    pub(crate) fn set_local(&mut self, slot: usize, value: V) -> bool {
        match self.locals.get_mut(slot) {
            Some(entry) => {
                *entry = value;
                true
            }
            None => false,
        }
    }

    pub(crate) fn clear_stack(&mut self) {
        self.stack.clear();
    }

    /// Joins `other` into this frame slot by slot.
    ///
    /// Returns whether any slot changed, or `Err` with the two stack heights if they differ.
    pub(crate) fn merge<I>(&mut self, other: &Frame<V>, interpreter: &mut I) -> Result<bool, (usize, usize)>
    where
        I: Interpreter<Value = V>,
    {
        if self.stack.len() != other.stack.len() {
            return Err((self.stack.len(), other.stack.len()));
        }

        let mut changed = false;
        for (old, new) in self
            .locals
            .iter_mut()
            .chain(self.stack.iter_mut())
            .zip(other.locals.iter().chain(other.stack.iter()))
        {
            let merged = interpreter.merge(old, new);
            if merged != *old {
                *old = merged;
                changed = true;
            }
        }
        Ok(changed)
    }
}

/// Frames computed for every instruction position of a method.
///
/// `None` marks code the analysis never reached.
#[derive(Debug, Clone)]
pub struct Frames<V> {
    frames: Vec<Option<Frame<V>>>,
    iterations: usize,
}

impl<V> Frames<V> {
    pub(crate) fn new(frames: Vec<Option<Frame<V>>>, iterations: usize) -> Self {
        Frames { frames, iterations }
    }

    /// The frame before the instruction at `position`.
    #[must_use]
    pub fn get(&self, position: usize) -> Option<&Frame<V>> {
        self.frames.get(position).and_then(Option::as_ref)
    }

    /// Returns `true` if the instruction at `position` is reachable.
    #[must_use]
    pub fn is_reachable(&self, position: usize) -> bool {
        self.get(position).is_some()
    }

    /// Number of instruction positions covered.
    #[must_use]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Returns `true` for an empty method.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Iterates over `(position, frame)` pairs of reachable instructions.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &Frame<V>)> + '_ {
        self.frames
            .iter()
            .enumerate()
            .filter_map(|(position, frame)| frame.as_ref().map(|frame| (position, frame)))
    }

    /// Number of worklist steps the analysis took to converge.
    #[must_use]
    pub const fn iterations(&self) -> usize {
        self.iterations
    }
}
