//! Result type shared by the transition functions

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult<S, F> {
    pub new_state: S,
    pub effects: Vec<F>,
}

impl<S, F> TransitionResult<S, F> {
    pub fn new(state: S) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: F) -> Self {
        self.effects.push(effect);
        self
    }
}
