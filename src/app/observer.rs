// SPDX-License-Identifier: GPL-3.0-only

//! Presentation callbacks
//!
//! The controller reports results through a [`PipelineObserver`]. Callbacks
//! run on the task that drove the operation, after the state lock has been
//! released.

use super::state::Stage;
use crate::ai::IngredientList;
use crate::errors::ErrorKind;
use crate::recipes::{RecipeResult, RecipeStep};
use tokio::sync::mpsc;

/// Receiver of pipeline results; every method defaults to a no-op
pub trait PipelineObserver: Send + Sync {
    fn on_ingredients_ready(&self, _ingredients: &IngredientList) {}

    fn on_recipes_ready(&self, _recipes: &[RecipeResult]) {}

    fn on_steps_ready(&self, _steps: &[RecipeStep]) {}

    fn on_error(&self, _kind: ErrorKind, _message: &str) {}

    fn on_stage_changed(&self, _stage: Stage) {}

    /// `index` is 0-based; `step.index` is the display number
    fn on_step_changed(&self, _index: usize, _step: &RecipeStep) {}
}

/// Observer that ignores everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl PipelineObserver for NoopObserver {}

/// One observer callback, as a value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineEvent {
    IngredientsReady(IngredientList),
    RecipesReady(Vec<RecipeResult>),
    StepsReady(Vec<RecipeStep>),
    Error { kind: ErrorKind, message: String },
    StageChanged(Stage),
    StepChanged { index: usize, step: RecipeStep },
}

impl PipelineEvent {
    /// Invoke the matching callback on `observer`
    pub fn dispatch(&self, observer: &dyn PipelineObserver) {
        match self {
            PipelineEvent::IngredientsReady(list) => observer.on_ingredients_ready(list),
            PipelineEvent::RecipesReady(recipes) => observer.on_recipes_ready(recipes),
            PipelineEvent::StepsReady(steps) => observer.on_steps_ready(steps),
            PipelineEvent::Error { kind, message } => observer.on_error(*kind, message),
            PipelineEvent::StageChanged(stage) => observer.on_stage_changed(*stage),
            PipelineEvent::StepChanged { index, step } => observer.on_step_changed(*index, step),
        }
    }
}

/// Forwards every callback into an unbounded channel
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    tx: mpsc::UnboundedSender<PipelineEvent>,
}

impl ChannelObserver {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<PipelineEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn send(&self, event: PipelineEvent) {
        // A dropped receiver just means nobody is listening any more
        let _ = self.tx.send(event);
    }
}

impl PipelineObserver for ChannelObserver {
    fn on_ingredients_ready(&self, ingredients: &IngredientList) {
        self.send(PipelineEvent::IngredientsReady(ingredients.clone()));
    }

    fn on_recipes_ready(&self, recipes: &[RecipeResult]) {
        self.send(PipelineEvent::RecipesReady(recipes.to_vec()));
    }

    fn on_steps_ready(&self, steps: &[RecipeStep]) {
        self.send(PipelineEvent::StepsReady(steps.to_vec()));
    }

    fn on_error(&self, kind: ErrorKind, message: &str) {
        self.send(PipelineEvent::Error {
            kind,
            message: message.to_string(),
        });
    }

    fn on_stage_changed(&self, stage: Stage) {
        self.send(PipelineEvent::StageChanged(stage));
    }

    fn on_step_changed(&self, index: usize, step: &RecipeStep) {
        self.send(PipelineEvent::StepChanged {
            index,
            step: step.clone(),
        });
    }
}
