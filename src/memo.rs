//! Compute-once cell with sticky failures.
//!
//! A [`Memo`] starts out `NotComputed`. The first call to
//! [`Memo::get_or_compute`] runs the computation while concurrent callers
//! block; the outcome (value or error) is then fixed for the lifetime of the
//! cell and later reads never lock.

use std::sync::OnceLock;

use crate::error::{Result, ScanError};

pub struct Memo<T> {
    cell: OnceLock<Result<T>>,
}

/// Observable state of a [`Memo`].
#[derive(Debug)]
pub enum MemoState<'a, T> {
    NotComputed,
    Computed(&'a T),
    Failed(&'a ScanError),
}

impl<T> Memo<T> {
    pub const fn new() -> Self {
        Memo {
            cell: OnceLock::new(),
        }
    }

    /// Return the cached value, running `compute` if nothing is cached yet.
    ///
    /// A cached error is returned as-is on every call; `compute` never runs
    /// twice for the same cell.
    pub fn get_or_compute<F>(&self, compute: F) -> Result<&T>
    where
        F: FnOnce() -> Result<T>,
    {
        match self.cell.get_or_init(compute) {
            Ok(value) => Ok(value),
            Err(err) => Err(err.clone()),
        }
    }

    pub fn state(&self) -> MemoState<'_, T> {
        match self.cell.get() {
            None => MemoState::NotComputed,
            Some(Ok(value)) => MemoState::Computed(value),
            Some(Err(err)) => MemoState::Failed(err),
        }
    }

    pub fn is_computed(&self) -> bool {
        self.cell.get().is_some()
    }
}

impl<T> Default for Memo<T> {
    fn default() -> Self {
        Memo::new()
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Memo<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Memo").field(&self.state()).finish()
    }
}
