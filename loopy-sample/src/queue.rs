//! Deferred registration actions.

use std::collections::VecDeque;

use loopy_core::{LoopyError, Result};

type Action = Box<dyn FnOnce() -> Result<()>>;

/// An ordered list of labelled actions, executed first-in first-out.
#[derive(Default)]
pub struct ActionQueue {
    actions: VecDeque<(String, Action)>,
}

impl ActionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, label: impl Into<String>, action: impl FnOnce() -> Result<()> + 'static) {
        self.actions.push_back((label.into(), Box::new(action)));
    }

    /// Drop the most recently queued action, returning its label.
    pub fn pop(&mut self) -> Option<String> {
        self.actions.pop_back().map(|(label, _)| label)
    }

    /// Labels in execution order.
    pub fn labels(&self) -> Vec<&str> {
        self.actions.iter().map(|(l, _)| l.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Run every action in order.
    ///
    /// Stops at the first failure and returns it wrapped in
    /// [`LoopyError::Deferred`] with the action's label. Actions before it
    /// have taken effect; actions after it stay queued.
    pub fn run_all(&mut self) -> Result<()> {
        while let Some((label, action)) = self.actions.pop_front() {
            log::debug!("running queued action: {label}");
            action().map_err(|e| LoopyError::deferred(label, e))?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for ActionQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.labels()).finish()
    }
}
