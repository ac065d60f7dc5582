#![allow(dead_code)]
use chrono::{DateTime, TimeZone, Utc};
use anyhow::bail;
use shiftcover::{
    ActionType, Actor, AuditRecorder, Broadcaster, CallOutId, CallOutLog, MemoryAuditLog,
    MemoryBroadcaster, MemoryStorage, NotificationEvent, Role, Scheduler, Shift, ShiftId,
    ShiftStatus, Storage, Topic, Transition, User, UserId,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub fn at(h: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 10, 1, h, 0, 0).unwrap()
}

pub struct Fixture {
    pub storage: Arc<MemoryStorage>,
    pub broadcaster: Arc<MemoryBroadcaster>,
    pub audit: Arc<MemoryAuditLog>,
    pub scheduler: Scheduler,
}

impl Fixture {
    pub fn new() -> Self {
        let storage = Arc::new(MemoryStorage::new());
        let broadcaster = Arc::new(MemoryBroadcaster::new());
        let audit = Arc::new(MemoryAuditLog::new());
        let scheduler = Scheduler::builder(storage.clone())
            .broadcaster(broadcaster.clone())
            .audit(audit.clone())
            .build()
            .unwrap();
        Self {
            storage,
            broadcaster,
            audit,
            scheduler,
        }
    }

    pub fn user(&self, email: &str, role: Role) -> User {
        self.scheduler.register_user(email, role).unwrap()
    }

    pub fn staff_with_score(&self, email: &str, score: f64) -> User {
        let user = self.user(email, Role::Staff);
        self.set_score(&user, score)
    }

    pub fn set_score(&self, user: &User, score: f64) -> User {
        self.storage
            .update_user_with(&user.id, &mut |u: &mut User| u.set_reliability_score(score))
            .unwrap()
            .unwrap()
    }

    /// Shift déjà pris par `staff` sur [start, end).
    pub fn busy(&self, staff: &User, start: u32, end: u32) {
        let caller = self.user(&format!("desk-{start}-{}", staff.email), Role::Manager);
        let shift = self
            .scheduler
            .create_call_out(&caller.id, "RN", at(start), at(end), None)
            .unwrap();
        self.scheduler
            .accept_shift_at(&shift.id, &Actor::from(staff), at(start))
            .unwrap();
        self.scheduler.wait_for_background();
    }
}

/// Stockage mémoire dont certaines lectures peuvent être mises en échec.
#[derive(Default)]
pub struct FlakyStorage {
    pub inner: MemoryStorage,
    pub fail_staff_pool: AtomicBool,
    pub fail_assignments: AtomicBool,
    pub fail_user_updates: AtomicBool,
}

impl FlakyStorage {
    pub fn break_staff_pool(&self) {
        self.fail_staff_pool.store(true, Ordering::SeqCst);
    }

    pub fn break_assignments(&self) {
        self.fail_assignments.store(true, Ordering::SeqCst);
    }

    pub fn break_user_updates(&self) {
        self.fail_user_updates.store(true, Ordering::SeqCst);
    }
}

impl Storage for FlakyStorage {
    fn insert_user(&self, user: User) -> anyhow::Result<()> {
        self.inner.insert_user(user)
    }
    fn find_user(&self, id: &UserId) -> anyhow::Result<Option<User>> {
        self.inner.find_user(id)
    }
    fn find_user_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        self.inner.find_user_by_email(email)
    }
    fn update_user_with(
        &self,
        id: &UserId,
        edit: &mut dyn FnMut(&mut User),
    ) -> anyhow::Result<Option<User>> {
        if self.fail_user_updates.load(Ordering::SeqCst) {
            bail!("write conflict");
        }
        self.inner.update_user_with(id, edit)
    }
    fn list_users(&self) -> anyhow::Result<Vec<User>> {
        self.inner.list_users()
    }
    fn users_by_role(&self, role: Role) -> anyhow::Result<Vec<User>> {
        if self.fail_staff_pool.load(Ordering::SeqCst) {
            bail!("connection reset");
        }
        self.inner.users_by_role(role)
    }
    fn find_shift(&self, id: &ShiftId) -> anyhow::Result<Option<Shift>> {
        self.inner.find_shift(id)
    }
    fn list_shifts(&self) -> anyhow::Result<Vec<Shift>> {
        self.inner.list_shifts()
    }
    fn shifts_assigned_to(
        &self,
        user: &UserId,
        statuses: &[ShiftStatus],
    ) -> anyhow::Result<Vec<Shift>> {
        if self.fail_assignments.load(Ordering::SeqCst) {
            bail!("query timeout");
        }
        self.inner.shifts_assigned_to(user, statuses)
    }
    fn insert_call_out(&self, shift: Shift, log: CallOutLog) -> anyhow::Result<()> {
        self.inner.insert_call_out(shift, log)
    }
    fn find_call_out(&self, id: &CallOutId) -> anyhow::Result<Option<CallOutLog>> {
        self.inner.find_call_out(id)
    }
    fn call_out_for_shift(&self, shift: &ShiftId) -> anyhow::Result<Option<CallOutLog>> {
        self.inner.call_out_for_shift(shift)
    }
    fn accepted_call_outs(&self, user: &UserId) -> anyhow::Result<Vec<CallOutLog>> {
        self.inner.accepted_call_outs(user)
    }
    fn list_call_outs(&self) -> anyhow::Result<Vec<CallOutLog>> {
        self.inner.list_call_outs()
    }
    fn update_call_out_with(
        &self,
        id: &CallOutId,
        edit: &mut dyn FnMut(&mut CallOutLog),
    ) -> anyhow::Result<Option<CallOutLog>> {
        self.inner.update_call_out_with(id, edit)
    }
    fn claim_shift(
        &self,
        id: &ShiftId,
        staff: &UserId,
        at: chrono::DateTime<chrono::Utc>,
    ) -> anyhow::Result<Transition> {
        self.inner.claim_shift(id, staff, at)
    }
    fn transition_shift(
        &self,
        id: &ShiftId,
        from: &[ShiftStatus],
        to: ShiftStatus,
    ) -> anyhow::Result<Transition> {
        self.inner.transition_shift(id, from, to)
    }
}

/// Diffuseur toujours en panne.
pub struct DownBroadcaster;

impl Broadcaster for DownBroadcaster {
    fn publish(&self, topic: &Topic, _event: &NotificationEvent) -> anyhow::Result<()> {
        bail!("socket closed for {topic}")
    }
}

/// Journal d'audit toujours en panne.
pub struct DownAuditLog;

impl AuditRecorder for DownAuditLog {
    fn record(&self, _actor: &UserId, action: ActionType, _detail: &str) -> anyhow::Result<()> {
        bail!("audit sink unavailable for {}", action.label())
    }
}
