mod admin;
mod conflicts;
mod matching;
mod mutate;
mod reliability;
mod suggestions;
mod types;
mod util;

pub use admin::{DashboardStats, ImportSummary, ReliabilityDistribution, StaffReliability};
pub use conflicts::find_conflicts;
pub use matching::score_candidate;
pub use reliability::{compute_reliability, compute_stats, persist_reliability};
pub use suggestions::suggest;
pub use types::{
    ConflictPolicy, ConflictReport, EngineOptions, ErrorKind, MatchBand, ReliabilityBand,
    ReliabilityStats, SchedError, SmartSuggestion, StaffMatchScore,
};
pub use util::{format_response_time, overlaps};

use crate::audit::{ActionType, AuditRecorder, NoopAuditLog};
use crate::model::{
    Actor, CallOutId, CallOutLog, Role, Shift, ShiftId, User, UserId, UserStatus,
};
use crate::notification::{
    Broadcaster, NoopBroadcaster, NotificationEvent, NotificationRenderer, TextNotification,
    Topic,
};
use crate::storage::Storage;
use anyhow::Context;
use chrono::{DateTime, Utc};
use parking_lot::{Condvar, Mutex};
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::sync::Arc;

/// Compteur des recalculs de fiabilité lancés en tâche de fond.
#[derive(Debug, Default)]
struct Background {
    pending: Mutex<usize>,
    idle: Condvar,
}

impl Background {
    fn begin(&self) {
        *self.pending.lock() += 1;
    }

    fn end(&self) {
        let mut pending = self.pending.lock();
        *pending = pending.saturating_sub(1);
        if *pending == 0 {
            self.idle.notify_all();
        }
    }

    fn wait(&self) {
        let mut pending = self.pending.lock();
        while *pending > 0 {
            self.idle.wait(&mut pending);
        }
    }
}

pub struct SchedulerBuilder {
    storage: Arc<dyn Storage>,
    broadcaster: Arc<dyn Broadcaster>,
    audit: Arc<dyn AuditRecorder>,
    renderer: Arc<dyn NotificationRenderer>,
    options: EngineOptions,
}

impl SchedulerBuilder {
    pub fn broadcaster(mut self, broadcaster: Arc<dyn Broadcaster>) -> Self {
        self.broadcaster = broadcaster;
        self
    }

    pub fn audit(mut self, audit: Arc<dyn AuditRecorder>) -> Self {
        self.audit = audit;
        self
    }

    pub fn renderer(mut self, renderer: Arc<dyn NotificationRenderer>) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn options(mut self, options: EngineOptions) -> Self {
        self.options = options;
        self
    }

    pub fn build(self) -> Result<Scheduler, SchedError> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(self.options.max_workers.max(1))
            .thread_name(|i| format!("shiftcover-worker-{i}"))
            .build()
            .context("building worker pool")?;
        Ok(Scheduler {
            storage: self.storage,
            broadcaster: self.broadcaster,
            audit: self.audit,
            renderer: self.renderer,
            options: self.options,
            pool: Arc::new(pool),
            background: Arc::new(Background::default()),
        })
    }
}

/// Scheduler : point d'entrée du cœur (call-outs, acceptation, suggestions, fiabilité).
///
/// Aucun état propre hors du stockage ; les collaborateurs sont injectés.
pub struct Scheduler {
    storage: Arc<dyn Storage>,
    broadcaster: Arc<dyn Broadcaster>,
    audit: Arc<dyn AuditRecorder>,
    renderer: Arc<dyn NotificationRenderer>,
    options: EngineOptions,
    pool: Arc<ThreadPool>,
    background: Arc<Background>,
}

impl Scheduler {
    pub fn builder(storage: Arc<dyn Storage>) -> SchedulerBuilder {
        SchedulerBuilder {
            storage,
            broadcaster: Arc::new(NoopBroadcaster),
            audit: Arc::new(NoopAuditLog),
            renderer: Arc::new(TextNotification),
            options: EngineOptions::default(),
        }
    }

    /// Scheduler sans diffusion ni audit, options par défaut.
    pub fn new(storage: Arc<dyn Storage>) -> Result<Self, SchedError> {
        Self::builder(storage).build()
    }

    pub fn storage(&self) -> &dyn Storage {
        self.storage.as_ref()
    }

    pub fn options(&self) -> EngineOptions {
        self.options
    }

    pub fn register_user(&self, email: &str, role: Role) -> Result<User, SchedError> {
        admin::register_user(self, email, role)
    }

    /// Enregistre un lot d'utilisateurs avec les mêmes contrôles que `register_user`.
    pub fn import_users(&self, users: Vec<User>) -> Result<ImportSummary, SchedError> {
        admin::import_users(self, users)
    }

    /// Signale une absence : crée le shift OPEN et son call-out.
    pub fn create_call_out(
        &self,
        staff: &UserId,
        required_skill: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        reason: Option<&str>,
    ) -> Result<Shift, SchedError> {
        mutate::create_call_out(self, staff, required_skill, start, end, reason, Utc::now())
    }

    pub fn accept_shift(&self, shift: &ShiftId, actor: &Actor) -> Result<(), SchedError> {
        self.accept_shift_at(shift, actor, Utc::now())
    }

    /// Comme `accept_shift`, avec une horloge explicite.
    pub fn accept_shift_at(
        &self,
        shift: &ShiftId,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> Result<(), SchedError> {
        mutate::accept_shift(self, shift, actor, now)
    }

    pub fn cancel_shift(&self, shift: &ShiftId, actor: &Actor) -> Result<Shift, SchedError> {
        mutate::cancel_shift(self, shift, actor)
    }

    pub fn cancel_call_out(
        &self,
        call_out: &CallOutId,
        actor: &Actor,
    ) -> Result<CallOutLog, SchedError> {
        mutate::cancel_call_out(self, call_out, actor)
    }

    pub fn get_reliability(&self, user: &UserId) -> Result<ReliabilityStats, SchedError> {
        if self.storage.find_user(user)?.is_none() {
            return Err(SchedError::UnknownUser(user.to_string()));
        }
        Ok(compute_reliability(self.storage.as_ref(), user)?)
    }

    pub fn find_conflicts(
        &self,
        staff: &UserId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<ConflictReport, SchedError> {
        conflicts::find_conflicts(
            self.storage.as_ref(),
            staff,
            start,
            end,
            self.options.conflict_policy,
        )
    }

    pub fn suggest_staff(
        &self,
        required_skill: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        exclude: Option<&UserId>,
    ) -> Result<SmartSuggestion, SchedError> {
        suggestions::suggest(
            self.storage.as_ref(),
            &self.pool,
            required_skill,
            start,
            end,
            exclude,
            self.options.conflict_policy,
        )
    }

    pub fn update_user_status(
        &self,
        actor: &Actor,
        user: &UserId,
        status: Option<UserStatus>,
        active: Option<bool>,
    ) -> Result<User, SchedError> {
        admin::update_user_status(self, actor, user, status, active)
    }

    pub fn open_shifts(&self) -> Result<Vec<Shift>, SchedError> {
        admin::open_shifts(self)
    }

    pub fn assigned_shifts(&self, user: &UserId) -> Result<Vec<Shift>, SchedError> {
        admin::assigned_shifts(self, user)
    }

    pub fn recent_call_outs(&self, limit: usize) -> Result<Vec<CallOutLog>, SchedError> {
        admin::recent_call_outs(self, limit)
    }

    pub fn staff_reliability(&self) -> Result<Vec<StaffReliability>, SchedError> {
        admin::staff_reliability(self)
    }

    pub fn dashboard_stats(&self) -> Result<DashboardStats, SchedError> {
        admin::dashboard_stats(self)
    }

    /// Bloque jusqu'à la fin des recalculs de fiabilité en cours.
    pub fn wait_for_background(&self) {
        self.background.wait();
    }

    /// Lance le recalcul sans attendre ; un échec est seulement journalisé.
    fn spawn_reliability_update(&self, user: UserId) {
        let storage = Arc::clone(&self.storage);
        let background = Arc::clone(&self.background);
        background.begin();
        self.pool.spawn(move || {
            if let Err(err) = persist_reliability(storage.as_ref(), &user) {
                tracing::warn!(user = %user, error = %err, "reliability update failed");
            }
            background.end();
        });
    }

    fn notify(&self, topic: Topic, event: &NotificationEvent) {
        if let Err(err) = self.broadcaster.publish(&topic, event) {
            tracing::warn!(topic = %topic, error = %err, "broadcast failed");
        }
    }

    fn record(&self, actor: &UserId, action: ActionType, detail: &str) {
        if let Err(err) = self.audit.record(actor, action, detail) {
            tracing::warn!(actor = %actor, action = action.label(), error = %err, "audit record failed");
        }
    }
}
