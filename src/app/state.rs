// SPDX-License-Identifier: GPL-3.0-only

//! Pipeline state

use crate::ai::IngredientList;
use crate::errors::Failure;
use crate::recipes::{RecipeResult, RecipeStep};
use crate::storage::ImageRef;
use std::fmt;

/// Where the user is in the capture-to-recipe flow
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Stage {
    #[default]
    Idle,
    /// Camera opening or frame being saved
    Capturing,
    Captured,
    Extracting,
    IngredientsReady,
    QueryingRecipes,
    RecipesReady,
    FetchingSteps,
    StepsReady,
    Error,
}

impl Stage {
    /// Stages with a remote or camera call outstanding
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            Stage::Capturing | Stage::Extracting | Stage::QueryingRecipes | Stage::FetchingSteps
        )
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Idle => "idle",
            Stage::Capturing => "capturing",
            Stage::Captured => "captured",
            Stage::Extracting => "extracting ingredients",
            Stage::IngredientsReady => "ingredients ready",
            Stage::QueryingRecipes => "querying recipes",
            Stage::RecipesReady => "recipes ready",
            Stage::FetchingSteps => "fetching steps",
            Stage::StepsReady => "steps ready",
            Stage::Error => "in error",
        };
        write!(f, "{}", name)
    }
}

/// Controller operations, used when reporting rejected transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Capture,
    Extract,
    Query,
    Select,
    Next,
    Prev,
    BackToRecipes,
    Retry,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Capture => "capture",
            Operation::Extract => "extract ingredients",
            Operation::Query => "query recipes",
            Operation::Select => "select a recipe",
            Operation::Next => "go to the next step",
            Operation::Prev => "go to the previous step",
            Operation::BackToRecipes => "go back to recipes",
            Operation::Retry => "retry",
        };
        write!(f, "{}", name)
    }
}

/// The single session object; replaced wholesale on restart
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineState {
    pub stage: Stage,
    pub image: Option<ImageRef>,
    pub ingredients: IngredientList,
    pub recipes: Vec<RecipeResult>,
    pub selected_recipe: Option<i64>,
    pub steps: Vec<RecipeStep>,
    pub step_index: usize,
    pub last_error: Option<Failure>,
}

impl PipelineState {
    /// Step at the current index, if steps are loaded
    pub fn current_step(&self) -> Option<&RecipeStep> {
        self.steps.get(self.step_index)
    }

    /// Move the step index by one, clamped to the step range
    ///
    /// Returns whether the index changed.
    pub fn move_step(&mut self, forward: bool) -> bool {
        if self.steps.is_empty() {
            return false;
        }
        let last = self.steps.len() - 1;
        let target = if forward {
            (self.step_index + 1).min(last)
        } else {
            self.step_index.saturating_sub(1)
        };
        let changed = target != self.step_index;
        self.step_index = target;
        changed
    }
}
