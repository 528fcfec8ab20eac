use std::cell::RefCell;

/// A single-threaded memo cell with an in-progress marker.
///
/// Re-entrant reads (the initializer asking for the value it is computing)
/// observe `None` instead of deadlocking or recursing forever; constant
/// evaluation leans on this to turn cycles into "no constant value".
#[derive(Debug)]
pub struct Memo<T> {
    state: RefCell<MemoState<T>>,
}

#[derive(Debug)]
enum MemoState<T> {
    NotYet,
    InProgress,
    Done(T),
}

impl<T: Clone> Memo<T> {
    pub fn new() -> Self {
        Self {
            state: RefCell::new(MemoState::NotYet),
        }
    }

    /// The memoized value, computing it on first use. Returns `None` only
    /// for re-entrant calls while the initializer is running.
    pub fn get_or_init(&self, init: impl FnOnce() -> T) -> Option<T> {
        {
            let mut state = self.state.borrow_mut();
            match &*state {
                MemoState::Done(value) => return Some(value.clone()),
                MemoState::InProgress => return None,
                MemoState::NotYet => *state = MemoState::InProgress,
            }
        }
        // The borrow is released while the initializer runs, so it may
        // consult other memos (or re-enter this one and observe None).
        let value = init();
        *self.state.borrow_mut() = MemoState::Done(value.clone());
        Some(value)
    }
}

impl<T: Clone> Default for Memo<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn computes_once() {
        let memo = Memo::new();
        let mut calls = 0;
        assert_eq!(
            memo.get_or_init(|| {
                calls += 1;
                7
            }),
            Some(7)
        );
        assert_eq!(memo.get_or_init(|| unreachable!()), Some(7i32));
        assert_eq!(calls, 1);
    }

    #[test]
    fn reentrant_read_sees_none() {
        let memo = Memo::new();
        let result = memo.get_or_init(|| match memo.get_or_init(|| 1) {
            None => 2,
            Some(_) => 3,
        });
        assert_eq!(result, Some(2));
    }
}
