use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! strong_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(String);

        impl $name {
            pub fn new<S: AsRef<str>>(s: S) -> Self {
                Self(s.as_ref().to_owned())
            }
            pub fn random() -> Self {
                Self(Uuid::new_v4().to_string())
            }
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

strong_id!(
    /// Identifiant fort pour User
    UserId
);
strong_id!(
    /// Identifiant fort pour Shift
    ShiftId
);
strong_id!(
    /// Identifiant fort pour CallOutLog
    CallOutId
);

/// Rôle applicatif. Seul `Staff` peut accepter un shift.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Staff,
    Manager,
    Admin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Staff => "STAFF",
            Role::Manager => "MANAGER",
            Role::Admin => "ADMIN",
        }
    }

    /// Manager ou admin : peut annuler shifts et call-outs.
    pub fn can_manage(self) -> bool {
        matches!(self, Role::Manager | Role::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "STAFF" => Ok(Role::Staff),
            "MANAGER" => Ok(Role::Manager),
            "ADMIN" => Ok(Role::Admin),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserStatus {
    #[default]
    Active,
    Inactive,
    Suspended,
}

impl UserStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            UserStatus::Active => "ACTIVE",
            UserStatus::Inactive => "INACTIVE",
            UserStatus::Suspended => "SUSPENDED",
        }
    }
}

impl std::str::FromStr for UserStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ACTIVE" => Ok(UserStatus::Active),
            "INACTIVE" => Ok(UserStatus::Inactive),
            "SUSPENDED" => Ok(UserStatus::Suspended),
            other => Err(format!("unknown status: {other}")),
        }
    }
}

/// Membre du personnel (ou encadrant).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub role: Role,
    #[serde(default)]
    pub status: UserStatus,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default = "default_score")]
    reliability_score: f64,
}

fn default_true() -> bool {
    true
}

fn default_score() -> f64 {
    1.0
}

impl User {
    /// Nouveau compte : actif, confiance maximale.
    pub fn new<E: Into<String>>(email: E, role: Role) -> Self {
        Self {
            id: UserId::random(),
            email: email.into(),
            role,
            status: UserStatus::Active,
            active: true,
            reliability_score: 1.0,
        }
    }

    pub fn reliability_score(&self) -> f64 {
        self.reliability_score
    }

    /// Le score reste toujours dans [0, 1].
    pub fn set_reliability_score(&mut self, score: f64) {
        self.reliability_score = if score.is_nan() { 0.0 } else { score.clamp(0.0, 1.0) };
    }

    pub fn with_reliability(mut self, score: f64) -> Self {
        self.set_reliability_score(score);
        self
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self.status = UserStatus::Inactive;
        self
    }
}

/// Cycle de vie d'un shift.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ShiftStatus {
    Open,
    Assigned,
    Completed,
    Missed,
    Cancelled,
}

impl ShiftStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ShiftStatus::Completed | ShiftStatus::Missed | ShiftStatus::Cancelled
        )
    }

    /// Transitions autorisées : OPEN → ASSIGNED → {COMPLETED, MISSED},
    /// OPEN|ASSIGNED → CANCELLED.
    pub fn can_transition_to(self, next: ShiftStatus) -> bool {
        use ShiftStatus::*;
        matches!(
            (self, next),
            (Open, Assigned)
                | (Assigned, Completed)
                | (Assigned, Missed)
                | (Open, Cancelled)
                | (Assigned, Cancelled)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ShiftStatus::Open => "OPEN",
            ShiftStatus::Assigned => "ASSIGNED",
            ShiftStatus::Completed => "COMPLETED",
            ShiftStatus::Missed => "MISSED",
            ShiftStatus::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for ShiftStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Créneau à couvrir (UTC)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shift {
    pub id: ShiftId,
    pub required_skill: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub status: ShiftStatus,
    pub assigned_to: Option<UserId>,
}

impl Shift {
    /// Crée un shift OPEN en validant que `end > start`.
    pub fn new<S: Into<String>>(
        required_skill: S,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Self, String> {
        if end <= start {
            return Err("end must be strictly after start".to_string());
        }
        Ok(Self {
            id: ShiftId::random(),
            required_skill: required_skill.into(),
            start,
            end,
            status: ShiftStatus::Open,
            assigned_to: None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CallOutStatus {
    #[default]
    Open,
    Cancelled,
}

/// Trace d'une absence signalée, liée 1:1 au shift créé pour la couvrir.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallOutLog {
    pub id: CallOutId,
    pub user_id: UserId,
    pub shift_id: ShiftId,
    #[serde(default)]
    pub reason: Option<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub accepted_by: Option<UserId>,
    #[serde(default)]
    pub filled_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub responded_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub missed: bool,
    #[serde(default)]
    pub status: CallOutStatus,
}

impl CallOutLog {
    /// Le call-out est horodaté au début du shift.
    pub fn for_shift(user_id: UserId, shift: &Shift, reason: Option<String>) -> Self {
        Self {
            id: CallOutId::random(),
            user_id,
            shift_id: shift.id.clone(),
            reason,
            timestamp: shift.start,
            accepted_by: None,
            filled_at: None,
            responded_at: None,
            missed: false,
            status: CallOutStatus::Open,
        }
    }

    /// Renseigne ensemble `accepted_by`, `filled_at` et `responded_at`.
    pub fn fill(&mut self, by: UserId, at: DateTime<Utc>) {
        self.accepted_by = Some(by);
        self.filled_at = Some(at);
        self.responded_at = Some(at);
    }
}

/// Identité déjà authentifiée transmise par la couche d'entrée.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub id: UserId,
    pub role: Role,
}

impl Actor {
    pub fn new(id: UserId, role: Role) -> Self {
        Self { id, role }
    }
}

impl From<&User> for Actor {
    fn from(user: &User) -> Self {
        Self::new(user.id.clone(), user.role)
    }
}

/// Jeu de données complet (utilisateurs, shifts, call-outs).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Registry {
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub shifts: Vec<Shift>,
    #[serde(default)]
    pub call_outs: Vec<CallOutLog>,
}

impl Registry {
    pub fn find_user(&self, id: &UserId) -> Option<&User> {
        self.users.iter().find(|u| &u.id == id)
    }
    pub fn find_user_by_email(&self, email: &str) -> Option<&User> {
        self.users.iter().find(|u| u.email.eq_ignore_ascii_case(email))
    }
    pub fn find_user_mut(&mut self, id: &UserId) -> Option<&mut User> {
        self.users.iter_mut().find(|u| &u.id == id)
    }
    pub fn find_shift(&self, id: &ShiftId) -> Option<&Shift> {
        self.shifts.iter().find(|s| &s.id == id)
    }
    pub fn find_shift_mut(&mut self, id: &ShiftId) -> Option<&mut Shift> {
        self.shifts.iter_mut().find(|s| &s.id == id)
    }
    pub fn find_call_out(&self, id: &CallOutId) -> Option<&CallOutLog> {
        self.call_outs.iter().find(|c| &c.id == id)
    }
    pub fn find_call_out_mut(&mut self, id: &CallOutId) -> Option<&mut CallOutLog> {
        self.call_outs.iter_mut().find(|c| &c.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn reliability_is_clamped() {
        let mut u = User::new("a@example.com", Role::Staff);
        u.set_reliability_score(1.7);
        assert_eq!(u.reliability_score(), 1.0);
        u.set_reliability_score(-0.2);
        assert_eq!(u.reliability_score(), 0.0);
        u.set_reliability_score(f64::NAN);
        assert_eq!(u.reliability_score(), 0.0);
    }

    #[test]
    fn shift_rejects_empty_range() {
        let t = Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap();
        assert!(Shift::new("RN", t, t).is_err());
    }

    #[test]
    fn terminal_states_have_no_exit() {
        use ShiftStatus::*;
        for from in [Completed, Missed, Cancelled] {
            for to in [Open, Assigned, Completed, Missed, Cancelled] {
                assert!(!from.can_transition_to(to));
            }
        }
        assert!(Open.can_transition_to(Assigned));
        assert!(!Open.can_transition_to(Completed));
    }

    #[test]
    fn fill_sets_all_three_fields() {
        let t = Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap();
        let shift = Shift::new("RN", t, t + chrono::Duration::hours(8)).unwrap();
        let mut log = CallOutLog::for_shift(UserId::new("u1"), &shift, None);
        assert_eq!(log.timestamp, shift.start);
        log.fill(UserId::new("u2"), t);
        assert_eq!(log.accepted_by, Some(UserId::new("u2")));
        assert_eq!(log.filled_at, Some(t));
        assert_eq!(log.responded_at, Some(t));
    }
}
