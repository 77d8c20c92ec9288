use std::fmt;

use super::domain::StepDescriptor;

/// Callback invoked with `(next_index, previous_index)` after each effective move.
pub type StepChangeHook = Box<dyn FnMut(usize, usize) + Send>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SequencerOptions {
    pub initial_index: isize,
    pub wrap: bool,
}

/// Position over an ordered, fixed list of steps.
pub struct StepSequencer<S = StepDescriptor> {
    steps: Vec<S>,
    current: usize,
    wrap: bool,
    on_change: Option<StepChangeHook>,
}

impl<S: fmt::Debug> fmt::Debug for StepSequencer<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepSequencer")
            .field("steps", &self.steps)
            .field("current", &self.current)
            .field("wrap", &self.wrap)
            .field("on_change", &self.on_change.is_some())
            .finish()
    }
}

impl<S> StepSequencer<S> {
    pub fn new(steps: Vec<S>, options: SequencerOptions) -> Self {
        let current = clamp_index(options.initial_index, steps.len());
        Self {
            steps,
            current,
            wrap: options.wrap,
            on_change: None,
        }
    }

    pub fn with_hook(mut self, hook: impl FnMut(usize, usize) + Send + 'static) -> Self {
        self.on_change = Some(Box::new(hook));
        self
    }

    pub fn steps(&self) -> &[S] {
        &self.steps
    }

    pub fn total(&self) -> usize {
        self.steps.len()
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn current_step(&self) -> Option<&S> {
        self.steps.get(self.current)
    }

    pub fn is_first_step(&self) -> bool {
        self.current == 0
    }

    /// An empty sequence counts as already on its last step.
    pub fn is_last_step(&self) -> bool {
        self.total() == 0 || self.current + 1 == self.total()
    }

    pub fn progress(&self) -> u8 {
        let total = self.total();
        if total == 0 {
            return 0;
        }
        (((self.current + 1) as f64 / total as f64) * 100.0).round() as u8
    }

    /// Returns whether the position changed. Out-of-range targets wrap or clamp.
    pub fn go_to_step(&mut self, index: isize) -> bool {
        let total = self.total();
        if total == 0 {
            return false;
        }

        let next = if self.wrap {
            index.rem_euclid(total as isize) as usize
        } else {
            clamp_index(index, total)
        };
        if next == self.current {
            return false;
        }

        let previous = std::mem::replace(&mut self.current, next);
        if let Some(hook) = self.on_change.as_mut() {
            hook(next, previous);
        }
        true
    }

    pub fn next_step(&mut self) -> bool {
        self.go_to_step(self.current as isize + 1)
    }

    pub fn prev_step(&mut self) -> bool {
        self.go_to_step(self.current as isize - 1)
    }

    pub fn reset(&mut self) -> bool {
        self.go_to_step(0)
    }
}

fn clamp_index(index: isize, total: usize) -> usize {
    if total == 0 {
        return 0;
    }
    index.clamp(0, total as isize - 1) as usize
}
