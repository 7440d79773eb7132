// SPDX-License-Identifier: GPL-3.0-only

//! Pipeline controller
//!
//! Sequences capture → extraction → recipe query → step fetch and owns the
//! single [`PipelineState`] of a user session.
//!
//! ```text
//! Idle ─capture─▶ Capturing ─▶ Captured ─extract─▶ Extracting ─▶ IngredientsReady
//!   ▲                              │                                   │ query
//!   │ restart (any stage)          │ capture (retake)                  ▼
//!   │                              ◀                           QueryingRecipes
//!   │                                                                  │
//!   │   StepsReady ◀─ FetchingSteps ◀─select─ RecipesReady ◀───────────┘
//!   │     │  ▲ next/prev                         ▲
//!   │     └──┴──────── back_to_recipes ──────────┘
//!   │
//!   └── any failure ─▶ Error ─retry─▶ stage before the failure
//! ```
//!
//! Every operation checks its source stage under the state lock, releases
//! the lock for the await, then re-checks the session epoch before
//! applying the result. `restart` bumps the epoch, so results of work that
//! was in flight are discarded as stale.
//!
//! The camera has a single owner at a time. A capture cut short by
//! `restart` releases its session before the next capture may open one.

pub mod observer;
pub mod state;

pub use observer::{ChannelObserver, NoopObserver, PipelineEvent, PipelineObserver};
pub use state::{Operation, PipelineState, Stage};

use crate::ai::{GeminiClient, IngredientExtractor, IngredientList};
use crate::backends::camera::{CameraBackend, CaptureSession, SessionState};
use crate::backends::camera::types::{CameraEye, CapturedImage};
use crate::config::{self, Config};
use crate::errors::{AppError, AppResult, ExtractionError, Failure, PipelineError};
use crate::pipelines::photo::PhotoPipeline;
use crate::recipes::{RecipeQueryService, RecipeResult, RecipeStep, RecipeStepService, SpoonacularClient};
use crate::storage::{ImageRef, ImageStore};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Services the controller drives, constructed by the session root
pub struct PipelineServices {
    pub camera: Arc<dyn CameraBackend>,
    pub photo: PhotoPipeline,
    pub extractor: IngredientExtractor,
    pub recipes: RecipeQueryService,
    pub steps: RecipeStepService,
    /// Bound on camera open and stream start
    pub stream_ready_timeout: Option<Duration>,
    pub preferred_eye: CameraEye,
    /// Prompt used when `extract` is called without one
    pub default_prompt: String,
}

impl PipelineServices {
    /// Build the production services from `config`
    ///
    /// API keys are read from the process environment.
    pub fn from_config(config: &Config, camera: Arc<dyn CameraBackend>) -> AppResult<Self> {
        let lookup = |key: &str| std::env::var(key).ok();
        let vision = GeminiClient::new(
            config::api_key(config::GEMINI_API_KEY_VAR, lookup)?,
            config.vision_base_url.clone(),
        )?;
        let recipes = Arc::new(SpoonacularClient::new(
            config::api_key(config::SPOONACULAR_API_KEY_VAR, lookup)?,
            config.recipe_base_url.clone(),
        )?);
        let store = ImageStore::new(config.capture_dir());

        Ok(Self {
            camera,
            photo: PhotoPipeline::new(store.clone(), config.settle_delay()),
            extractor: IngredientExtractor::new(Arc::new(vision), store, config.vision_model.clone())
                .with_timeout(config.extraction_timeout()),
            recipes: RecipeQueryService::new(recipes.clone())
                .with_options(config.query_options())
                .with_timeout(config.recipe_query_timeout()),
            steps: RecipeStepService::new(recipes).with_timeout(config.step_fetch_timeout()),
            stream_ready_timeout: config.stream_ready_timeout(),
            preferred_eye: config.preferred_eye,
            default_prompt: config.default_prompt.clone(),
        })
    }
}

/// A failed operation and the input needed to run it again
#[derive(Debug, Clone)]
enum PendingRetry {
    Capture,
    Extract { image: ImageRef, prompt: String },
    Query { ingredients: IngredientList },
    FetchSteps { recipe_id: i64 },
}

impl PendingRetry {
    /// Stage entered when the operation runs again
    fn busy_stage(&self) -> Stage {
        match self {
            PendingRetry::Capture => Stage::Capturing,
            PendingRetry::Extract { .. } => Stage::Extracting,
            PendingRetry::Query { .. } => Stage::QueryingRecipes,
            PendingRetry::FetchSteps { .. } => Stage::FetchingSteps,
        }
    }
}

struct Inner {
    state: PipelineState,
    /// Bumped by restart; results from an older epoch are stale
    epoch: u64,
    /// Open camera session, kept between captures. Taken out while a
    /// capture is running.
    session: Option<CaptureSession>,
    retry: Option<(Stage, PendingRetry)>,
}

struct Shared {
    services: PipelineServices,
    observer: Arc<dyn PipelineObserver>,
    inner: Mutex<Inner>,
    /// Held by whichever capture is using the camera, stale or not
    camera_owner: tokio::sync::Mutex<()>,
    /// Latest epoch, watched by captures so a restart interrupts them
    epochs: watch::Sender<u64>,
}

/// Drives one capture-to-recipe session
///
/// Cheap to clone; clones share the same session.
#[derive(Clone)]
pub struct PipelineController {
    shared: Arc<Shared>,
}

impl PipelineController {
    pub fn new(services: PipelineServices, observer: Arc<dyn PipelineObserver>) -> Self {
        Self {
            shared: Arc::new(Shared {
                services,
                observer,
                inner: Mutex::new(Inner {
                    state: PipelineState::default(),
                    epoch: 0,
                    session: None,
                    retry: None,
                }),
                camera_owner: tokio::sync::Mutex::new(()),
                epochs: watch::Sender::new(0),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // State is only written in short critical sections without panicking
        // calls, so a poisoned lock still holds a consistent state
        self.shared
            .inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn emit(&self, events: Vec<PipelineEvent>) {
        for event in &events {
            event.dispatch(self.shared.observer.as_ref());
        }
    }

    /// Read-only copy of the current state
    pub fn snapshot(&self) -> PipelineState {
        self.lock().state.clone()
    }

    pub fn stage(&self) -> Stage {
        self.lock().state.stage
    }

    /// Step at the current index while in `StepsReady`
    pub fn current_step(&self) -> Option<RecipeStep> {
        let inner = self.lock();
        if inner.state.stage != Stage::StepsReady {
            return None;
        }
        inner.state.current_step().cloned()
    }

    /// Whether a camera session is currently held open
    pub fn has_open_session(&self) -> bool {
        self.lock()
            .session
            .as_ref()
            .is_some_and(|s| s.state() == SessionState::Streaming)
    }

    /// Begin `operation`: verify the source stage and enter `busy`
    ///
    /// `prepare` collects the operation's input from the session; `None`
    /// rejects the operation with the state untouched. Returns the epoch
    /// the operation runs under together with that input.
    fn begin<T>(
        &self,
        operation: Operation,
        allowed: &[Stage],
        busy: Stage,
        prepare: impl FnOnce(&mut Inner) -> Option<T>,
    ) -> Result<(u64, T), PipelineError> {
        let mut events = Vec::new();
        let started = {
            let mut inner = self.lock();
            let stage = inner.state.stage;
            let input = if allowed.contains(&stage) {
                prepare(&mut *inner)
            } else {
                None
            };
            let Some(input) = input else {
                debug!(%operation, ?stage, "Rejected operation");
                return Err(PipelineError::InvalidTransition { operation, stage });
            };
            set_stage(&mut inner.state, busy, &mut events);
            (inner.epoch, input)
        };
        self.emit(events);
        Ok(started)
    }

    /// Apply the outcome of a stage, unless a restart made it stale
    ///
    /// `on_success` updates the state and returns the value handed back to
    /// the caller. On failure the controller enters `Error` and records
    /// `retry` with `resume` as the stage to return to.
    fn finish<T, R>(
        &self,
        operation: Operation,
        epoch: u64,
        result: Result<T, AppError>,
        resume: Stage,
        retry: PendingRetry,
        on_success: impl FnOnce(&mut PipelineState, T, &mut Vec<PipelineEvent>) -> R,
    ) -> Result<R, PipelineError> {
        let mut events = Vec::new();
        let outcome = {
            let mut inner = self.lock();
            if inner.epoch != epoch {
                info!(%operation, "Discarding result that completed after restart");
                return Err(PipelineError::Stale { operation });
            }

            match result {
                Ok(value) => {
                    inner.retry = None;
                    inner.state.last_error = None;
                    Ok(on_success(&mut inner.state, value, &mut events))
                }
                Err(err) => {
                    let failure = Failure::from(&err);
                    warn!(%operation, error = %failure, "Pipeline stage failed");
                    if matches!(err, AppError::Extraction(ExtractionError::MalformedModelReply { .. })) {
                        inner.state.ingredients = IngredientList::empty();
                    }
                    inner.state.last_error = Some(failure.clone());
                    inner.retry = Some((resume, retry));
                    events.push(PipelineEvent::Error {
                        kind: failure.kind,
                        message: failure.message.clone(),
                    });
                    set_stage(&mut inner.state, Stage::Error, &mut events);
                    Err(PipelineError::Failed(failure))
                }
            }
        };
        self.emit(events);
        outcome
    }

    /// Capture a photo and persist it to the capture slot
    ///
    /// Opens the camera on first use and keeps the stream for later
    /// captures. Accepted from `Idle` and from `Captured` (retake).
    pub async fn capture(&self) -> Result<ImageRef, PipelineError> {
        let (epoch, resume) = self.begin(
            Operation::Capture,
            &[Stage::Idle, Stage::Captured],
            Stage::Capturing,
            |inner| Some(inner.state.stage),
        )?;
        self.capture_from(epoch, resume).await
    }

    async fn capture_from(&self, epoch: u64, resume: Stage) -> Result<ImageRef, PipelineError> {
        let stale = PipelineError::Stale {
            operation: Operation::Capture,
        };
        let restarted = wait_for_restart(self.shared.epochs.subscribe(), epoch);

        // An interrupted capture may still be releasing the camera
        let camera = self.shared.camera_owner.lock().await;
        let mut session = {
            let mut inner = self.lock();
            if inner.epoch != epoch {
                return Err(stale);
            }
            inner.session.take()
        };

        let grabbed = tokio::select! {
            grabbed = self.grab_frame(&mut session) => Some(grabbed),
            () = restarted => None,
        };

        let current = {
            let mut inner = self.lock();
            if inner.epoch == epoch {
                inner.session = session.take();
                true
            } else {
                false
            }
        };
        if let Some(mut session) = session {
            debug!("Closing camera session of an interrupted capture");
            session.close();
        }
        drop(camera);

        let result = match grabbed {
            Some(Ok(frame)) if current => self.shared.services.photo.persist(&frame).await,
            Some(Err(e)) if current => Err(e),
            _ => {
                info!("Capture interrupted by restart");
                return Err(stale);
            }
        };

        self.finish(
            Operation::Capture,
            epoch,
            result,
            resume,
            PendingRetry::Capture,
            |state, image: ImageRef, events| {
                state.image = Some(image.clone());
                set_stage(state, Stage::Captured, events);
                image
            },
        )
    }

    /// Read one settled frame, opening the camera into `slot` if needed
    ///
    /// A session that failed to open is closed and removed from `slot`.
    async fn grab_frame(&self, slot: &mut Option<CaptureSession>) -> AppResult<CapturedImage> {
        let services = &self.shared.services;

        if slot
            .as_ref()
            .is_some_and(|s| s.state() != SessionState::Streaming)
        {
            if let Some(mut finished) = slot.take() {
                finished.close();
            }
        }
        let session = slot.get_or_insert_with(|| {
            CaptureSession::new(services.camera.clone(), services.stream_ready_timeout)
                .with_preferred_eye(services.preferred_eye)
        });

        let stream = match session.stream().copied() {
            Some(stream) => stream,
            None => match session.open_and_stream().await {
                Ok(stream) => stream,
                Err(e) => {
                    // Release whatever the failed attempt still holds
                    session.close();
                    *slot = None;
                    return Err(e.into());
                }
            },
        };

        services.photo.grab_frame(session, &stream).await
    }

    /// Send the captured image to the vision model
    ///
    /// `prompt` falls back to the configured default prompt.
    pub async fn extract(&self, prompt: Option<&str>) -> Result<IngredientList, PipelineError> {
        let prompt = prompt
            .map(str::to_string)
            .unwrap_or_else(|| self.shared.services.default_prompt.clone());

        let (epoch, image) = self.begin(
            Operation::Extract,
            &[Stage::Captured],
            Stage::Extracting,
            |inner| inner.state.image.clone(),
        )?;
        self.extract_from(epoch, image, prompt).await
    }

    async fn extract_from(
        &self,
        epoch: u64,
        image: ImageRef,
        prompt: String,
    ) -> Result<IngredientList, PipelineError> {
        let result = self
            .shared
            .services
            .extractor
            .extract(&image, &prompt)
            .await
            .map_err(AppError::from);

        self.finish(
            Operation::Extract,
            epoch,
            result,
            Stage::Captured,
            PendingRetry::Extract { image, prompt },
            |state, list: IngredientList, events| {
                state.ingredients = list.clone();
                events.push(PipelineEvent::IngredientsReady(list.clone()));
                set_stage(state, Stage::IngredientsReady, events);
                list
            },
        )
    }

    /// Look up recipes for the extracted ingredients
    pub async fn query(&self) -> Result<Vec<RecipeResult>, PipelineError> {
        let (epoch, ingredients) = self.begin(
            Operation::Query,
            &[Stage::IngredientsReady],
            Stage::QueryingRecipes,
            |inner| Some(inner.state.ingredients.clone()),
        )?;
        self.query_from(epoch, ingredients).await
    }

    async fn query_from(
        &self,
        epoch: u64,
        ingredients: IngredientList,
    ) -> Result<Vec<RecipeResult>, PipelineError> {
        let result = self
            .shared
            .services
            .recipes
            .find_by_ingredients(&ingredients)
            .await
            .map_err(AppError::from);

        self.finish(
            Operation::Query,
            epoch,
            result,
            Stage::IngredientsReady,
            PendingRetry::Query { ingredients },
            |state, recipes: Vec<RecipeResult>, events| {
                state.recipes = recipes.clone();
                events.push(PipelineEvent::RecipesReady(recipes.clone()));
                set_stage(state, Stage::RecipesReady, events);
                recipes
            },
        )
    }

    /// Fetch the steps of `recipe_id` and show the first one
    pub async fn select(&self, recipe_id: i64) -> Result<Vec<RecipeStep>, PipelineError> {
        let (epoch, ()) = self.begin(
            Operation::Select,
            &[Stage::RecipesReady],
            Stage::FetchingSteps,
            |inner| {
                inner.state.selected_recipe = Some(recipe_id);
                Some(())
            },
        )?;
        self.select_from(epoch, recipe_id).await
    }

    async fn select_from(
        &self,
        epoch: u64,
        recipe_id: i64,
    ) -> Result<Vec<RecipeStep>, PipelineError> {
        let result = self
            .shared
            .services
            .steps
            .get_steps(recipe_id)
            .await
            .map_err(AppError::from);

        self.finish(
            Operation::Select,
            epoch,
            result,
            Stage::RecipesReady,
            PendingRetry::FetchSteps { recipe_id },
            |state, steps: Vec<RecipeStep>, events| {
                state.steps = steps.clone();
                state.step_index = 0;
                events.push(PipelineEvent::StepsReady(steps.clone()));
                set_stage(state, Stage::StepsReady, events);
                if let Some(first) = steps.first() {
                    events.push(PipelineEvent::StepChanged {
                        index: 0,
                        step: first.clone(),
                    });
                }
                steps
            },
        )
    }

    /// Advance to the next step; stays on the last one
    pub fn next(&self) -> Result<RecipeStep, PipelineError> {
        self.move_step(Operation::Next, true)
    }

    /// Go back one step; stays on the first one
    pub fn prev(&self) -> Result<RecipeStep, PipelineError> {
        self.move_step(Operation::Prev, false)
    }

    fn move_step(&self, operation: Operation, forward: bool) -> Result<RecipeStep, PipelineError> {
        let mut events = Vec::new();
        let step = {
            let mut inner = self.lock();
            let stage = inner.state.stage;
            if stage != Stage::StepsReady || inner.state.steps.is_empty() {
                return Err(PipelineError::InvalidTransition { operation, stage });
            }

            let changed = inner.state.move_step(forward);
            let index = inner.state.step_index;
            let step = inner.state.steps[index].clone();
            if changed {
                events.push(PipelineEvent::StepChanged {
                    index,
                    step: step.clone(),
                });
            }
            step
        };
        self.emit(events);
        Ok(step)
    }

    /// Leave the steps and return to the recipe list
    pub fn back_to_recipes(&self) -> Result<(), PipelineError> {
        let mut events = Vec::new();
        {
            let mut inner = self.lock();
            let stage = inner.state.stage;
            if stage != Stage::StepsReady {
                return Err(PipelineError::InvalidTransition {
                    operation: Operation::BackToRecipes,
                    stage,
                });
            }
            inner.state.steps.clear();
            inner.state.step_index = 0;
            inner.state.selected_recipe = None;
            set_stage(&mut inner.state, Stage::RecipesReady, &mut events);
        }
        self.emit(events);
        Ok(())
    }

    /// Discard the whole session and release the camera
    ///
    /// Allowed from any stage. Work in flight completes as stale.
    pub fn restart(&self) {
        self.reset("Pipeline restarted");
    }

    /// Release the camera and return to `Idle` before the session ends
    pub fn shutdown(&self) {
        self.reset("Pipeline shut down");
    }

    fn reset(&self, reason: &'static str) {
        let mut events = Vec::new();
        let session = {
            let mut inner = self.lock();
            inner.epoch += 1;
            self.shared.epochs.send_replace(inner.epoch);
            inner.retry = None;
            let previous = inner.state.stage;
            if previous.is_busy() {
                debug!(stage = %previous, "Work in flight will be discarded");
            }
            inner.state = PipelineState::default();
            if previous != Stage::Idle {
                events.push(PipelineEvent::StageChanged(Stage::Idle));
            }
            inner.session.take()
        };

        if let Some(mut session) = session {
            session.close();
        }
        info!("{}", reason);
        self.emit(events);
    }

    /// Re-run the operation that put the controller into `Error`
    ///
    /// The stage before the failure is restored and the operation starts
    /// again with the input it had, in one step. Returns the stage reached.
    pub async fn retry(&self) -> Result<Stage, PipelineError> {
        let mut events = Vec::new();
        let (epoch, resume, pending) = {
            let mut inner = self.lock();
            let stage = inner.state.stage;
            let retry = match stage {
                Stage::Error => inner.retry.take(),
                _ => None,
            };
            let Some((resume, pending)) = retry else {
                return Err(PipelineError::InvalidTransition {
                    operation: Operation::Retry,
                    stage,
                });
            };

            match &pending {
                PendingRetry::Extract { image, .. } => inner.state.image = Some(image.clone()),
                PendingRetry::Query { ingredients } => {
                    inner.state.ingredients = ingredients.clone()
                }
                PendingRetry::FetchSteps { recipe_id } => {
                    inner.state.selected_recipe = Some(*recipe_id)
                }
                PendingRetry::Capture => {}
            }
            inner.state.last_error = None;
            set_stage(&mut inner.state, resume, &mut events);
            set_stage(&mut inner.state, pending.busy_stage(), &mut events);
            (inner.epoch, resume, pending)
        };
        self.emit(events);

        info!(operation = ?pending, "Retrying failed operation");
        match pending {
            PendingRetry::Capture => self.capture_from(epoch, resume).await.map(|_| ()),
            PendingRetry::Extract { image, prompt } => {
                self.extract_from(epoch, image, prompt).await.map(|_| ())
            }
            PendingRetry::Query { ingredients } => {
                self.query_from(epoch, ingredients).await.map(|_| ())
            }
            PendingRetry::FetchSteps { recipe_id } => {
                self.select_from(epoch, recipe_id).await.map(|_| ())
            }
        }?;
        Ok(self.stage())
    }
}

/// Resolves once the controller has moved past `epoch`
async fn wait_for_restart(mut epochs: watch::Receiver<u64>, epoch: u64) {
    if epochs.wait_for(|current| *current != epoch).await.is_err() {
        // Sender gone with the controller; nothing left to interrupt
        std::future::pending::<()>().await;
    }
}

fn set_stage(state: &mut PipelineState, stage: Stage, events: &mut Vec<PipelineEvent>) {
    if state.stage != stage {
        debug!(from = ?state.stage, to = ?stage, "Stage changed");
        state.stage = stage;
        events.push(PipelineEvent::StageChanged(stage));
    }
}
