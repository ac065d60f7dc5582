#![forbid(unsafe_code)]
//! Shiftcover : remplacement du personnel soignant après un call-out.
//!
//! - Détection de conflits de planning (intervalles semi-ouverts).
//! - Score de fiabilité calculé depuis l'historique d'acceptation.
//! - Classement des remplaçants et cycle de vie des shifts.
//! - Stockage, diffusion temps réel et audit injectés ; tout en UTC.

pub mod audit;
pub mod io;
pub mod model;
pub mod notification;
pub mod scheduler;
pub mod storage;

pub use audit::{ActionType, AuditEntry, AuditRecorder, JsonlAuditLog, MemoryAuditLog, NoopAuditLog};
pub use model::{
    Actor, CallOutId, CallOutLog, CallOutStatus, Registry, Role, Shift, ShiftId, ShiftStatus, User,
    UserId, UserStatus,
};
pub use notification::{
    Broadcaster, EventKind, LogBroadcaster, MemoryBroadcaster, NoopBroadcaster, NotificationEvent,
    NotificationRenderer, TextNotification, Topic,
};
pub use scheduler::{
    ConflictPolicy, ConflictReport, EngineOptions, ErrorKind, ReliabilityStats, SchedError,
    Scheduler, SmartSuggestion, StaffMatchScore,
};
pub use storage::{JsonStorage, MemoryStorage, Storage, Transition};
