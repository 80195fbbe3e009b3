use std::marker::PhantomData;

use crate::saga::{BoxedStep, Saga};
use crate::step::SagaStep;

/// Marker type for a builder with no steps.
pub struct Empty;

/// Marker type for a builder with at least one step.
pub struct HasSteps;

/// Type-state builder for sagas.
///
/// Steps are numbered from 1 in the order they are added. An empty saga
/// cannot be built:
///
/// ```compile_fail
/// use provision_saga::SagaBuilder;
///
/// // `build()` is only available after `first_step()`
/// let saga = SagaBuilder::<(), (), String, _>::new().build();
/// ```
pub struct SagaBuilder<S, C, E, State> {
    steps: Vec<BoxedStep<S, C, E>>,
    _state: PhantomData<State>,
}

impl<S, C, E> SagaBuilder<S, C, E, Empty> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            steps: Vec::new(),
            _state: PhantomData,
        }
    }
}

impl<S, C, E> Default for SagaBuilder<S, C, E, Empty> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S, C, E> SagaBuilder<S, C, E, Empty> {
    /// Add step 1 to the saga.
    #[must_use]
    pub fn first_step<T>(self, step: T) -> SagaBuilder<S, C, E, HasSteps>
    where
        T: SagaStep<State = S, Context = C, Error = E> + 'static,
    {
        let mut steps = self.steps;
        steps.push(Box::new(step));
        SagaBuilder {
            steps,
            _state: PhantomData,
        }
    }
}

impl<S, C, E> SagaBuilder<S, C, E, HasSteps> {
    /// Add the next step to the saga.
    #[must_use]
    pub fn then<T>(mut self, step: T) -> Self
    where
        T: SagaStep<State = S, Context = C, Error = E> + 'static,
    {
        self.steps.push(Box::new(step));
        self
    }

    #[must_use]
    pub fn build(self) -> Saga<S, C, E> {
        Saga::from_steps(self.steps)
    }
}
