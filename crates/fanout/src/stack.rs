//! Pending input, consumed last-in-first-out.

/// The values a run has not dispatched yet.
///
/// Built by moving the caller's `Vec` in. Values come off the tail, so for
/// `[a, b, c]` the dispatch order is `c, b, a`.
#[derive(Debug, Clone, Default)]
pub struct PendingStack<T> {
    values: Vec<T>,
}

impl<T> PendingStack<T> {
    pub fn new(values: Vec<T>) -> Self {
        Self { values }
    }

    /// Take the most recently supplied value.
    pub fn pop(&mut self) -> Option<T> {
        self.values.pop()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Hand the undispatched values back, in their original order.
    pub fn into_remaining(self) -> Vec<T> {
        self.values
    }
}

impl<T> From<Vec<T>> for PendingStack<T> {
    fn from(values: Vec<T>) -> Self {
        Self::new(values)
    }
}

impl<T> FromIterator<T> for PendingStack<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pops_from_the_tail() {
        let mut stack = PendingStack::from(vec!["a", "b", "c"]);
        assert_eq!(stack.pop(), Some("c"));
        assert_eq!(stack.pop(), Some("b"));
        assert_eq!(stack.pop(), Some("a"));
        assert_eq!(stack.pop(), None);
        assert!(stack.is_empty());
    }

    #[test]
    fn remaining_keeps_insertion_order() {
        let mut stack: PendingStack<u32> = (1..=5).collect();
        stack.pop();
        stack.pop();
        assert_eq!(stack.len(), 3);
        assert_eq!(stack.into_remaining(), vec![1, 2, 3]);
    }
}
