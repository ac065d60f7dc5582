use crate::model::{Role, Shift, ShiftId, User, UserId};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::fmt;

/// Canal de diffusion : par rôle, par utilisateur, ou tout le monde.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Topic {
    Role(Role),
    User(UserId),
    All,
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Topic::Role(role) => write!(f, "role:{role}"),
            Topic::User(id) => write!(f, "user:{id}"),
            Topic::All => f.write_str("all"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    NewShift,
    ShiftAccepted,
    ShiftCancelled,
}

/// Événement abstrait ; le format de transport appartient au diffuseur.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotificationEvent {
    pub kind: EventKind,
    pub shift_id: ShiftId,
    pub required_skill: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accepted_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// Diffusion temps réel. Un échec n'annule jamais la transition qui l'a produit.
pub trait Broadcaster: Send + Sync {
    fn publish(&self, topic: &Topic, event: &NotificationEvent) -> anyhow::Result<()>;
}

/// Permet de customiser le texte du message.
pub trait NotificationRenderer: Send + Sync {
    fn render(&self, kind: EventKind, shift: &Shift, accepted_by: Option<&User>) -> String;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TextNotification;

impl NotificationRenderer for TextNotification {
    fn render(&self, kind: EventKind, shift: &Shift, accepted_by: Option<&User>) -> String {
        match kind {
            EventKind::NewShift => format!("New {} shift available", shift.required_skill),
            EventKind::ShiftAccepted => match accepted_by {
                Some(user) => format!("Shift accepted by {}", user.email),
                None => "Shift accepted".to_string(),
            },
            EventKind::ShiftCancelled => "Shift has been cancelled".to_string(),
        }
    }
}

impl NotificationEvent {
    pub fn build(
        renderer: &dyn NotificationRenderer,
        kind: EventKind,
        shift: &Shift,
        accepted_by: Option<&User>,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            kind,
            shift_id: shift.id.clone(),
            required_skill: shift.required_skill.clone(),
            start: shift.start,
            end: shift.end,
            accepted_by: accepted_by.map(|u| u.email.clone()),
            reason,
            message: renderer.render(kind, shift, accepted_by),
            timestamp: now,
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopBroadcaster;

impl Broadcaster for NoopBroadcaster {
    fn publish(&self, _topic: &Topic, _event: &NotificationEvent) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Trace chaque événement via `tracing` (utile en CLI).
#[derive(Debug, Default, Clone, Copy)]
pub struct LogBroadcaster;

impl Broadcaster for LogBroadcaster {
    fn publish(&self, topic: &Topic, event: &NotificationEvent) -> anyhow::Result<()> {
        let payload = serde_json::to_string(event)?;
        tracing::info!(topic = %topic, %payload, "notification");
        Ok(())
    }
}

/// Conserve les événements publiés, dans l'ordre.
#[derive(Debug, Default)]
pub struct MemoryBroadcaster {
    published: Mutex<Vec<(Topic, NotificationEvent)>>,
}

impl MemoryBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn published(&self) -> Vec<(Topic, NotificationEvent)> {
        self.published.lock().clone()
    }

    pub fn on_topic(&self, topic: &Topic) -> Vec<NotificationEvent> {
        self.published
            .lock()
            .iter()
            .filter(|(t, _)| t == topic)
            .map(|(_, e)| e.clone())
            .collect()
    }
}

impl Broadcaster for MemoryBroadcaster {
    fn publish(&self, topic: &Topic, event: &NotificationEvent) -> anyhow::Result<()> {
        self.published.lock().push((topic.clone(), event.clone()));
        Ok(())
    }
}
