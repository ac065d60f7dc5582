use crate::model::{Shift, ShiftStatus, User};
use serde::Serialize;
use thiserror::Error;

/// Comportement du détecteur de conflits quand le stockage ne répond pas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConflictPolicy {
    /// Lecture en échec = conflit supposé : le candidat perd ses 30 points.
    #[default]
    FailClosed,
    /// Lecture en échec = aucun conflit.
    FailOpen,
}

/// Options du moteur
#[derive(Debug, Clone, Copy)]
pub struct EngineOptions {
    pub max_workers: usize,
    pub conflict_policy: ConflictPolicy,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            max_workers: 4,
            conflict_policy: ConflictPolicy::FailClosed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ConflictReport {
    pub has_conflict: bool,
    pub conflicting_shifts: Vec<Shift>,
    /// Vrai si la recherche a échoué et que la politique a tranché.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub degraded: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReliabilityStats {
    pub score: f64,
    pub total_shifts: usize,
    pub completed_shifts: usize,
    pub missed_shifts: usize,
    pub avg_response_time_minutes: f64,
    pub completion_rate: f64,
}

impl Default for ReliabilityStats {
    fn default() -> Self {
        Self {
            score: 1.0,
            total_shifts: 0,
            completed_shifts: 0,
            missed_shifts: 0,
            avg_response_time_minutes: 0.0,
            completion_rate: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StaffMatchScore {
    pub staff: User,
    pub score: u32,
    pub has_conflict: bool,
    pub reliability_score: f64,
    pub skill_match: bool,
    pub conflicting_shifts: Vec<Shift>,
    pub reasons: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct SmartSuggestion {
    pub recommended_staff: Vec<StaffMatchScore>,
    pub conflict_warnings: Vec<String>,
    pub total_available_staff: usize,
    pub best_match: Option<StaffMatchScore>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ReliabilityBand {
    Excellent,
    Good,
    Fair,
    NeedsImprovement,
}

impl ReliabilityBand {
    pub fn of(score: f64) -> Self {
        if score >= 0.9 {
            Self::Excellent
        } else if score >= 0.8 {
            Self::Good
        } else if score >= 0.6 {
            Self::Fair
        } else {
            Self::NeedsImprovement
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Excellent => "Excellent",
            Self::Good => "Good",
            Self::Fair => "Fair",
            Self::NeedsImprovement => "Needs Improvement",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MatchBand {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl MatchBand {
    pub fn of(score: u32) -> Self {
        match score {
            80.. => Self::Excellent,
            60..=79 => Self::Good,
            40..=59 => Self::Fair,
            _ => Self::Poor,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Excellent => "Excellent Match",
            Self::Good => "Good Match",
            Self::Fair => "Fair Match",
            Self::Poor => "Poor Match",
        }
    }
}

/// Famille d'erreur, pour que la couche appelante choisisse son message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Conflict,
    NotFound,
    Forbidden,
    Internal,
}

#[derive(Error, Debug)]
pub enum SchedError {
    #[error("invalid time range: end must be after start")]
    InvalidTimeRange,
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("unknown user: {0}")]
    UnknownUser(String),
    #[error("unknown shift: {0}")]
    UnknownShift(String),
    #[error("unknown call-out: {0}")]
    UnknownCallOut(String),
    #[error("shift {0} is already assigned")]
    AlreadyAssigned(String),
    #[error("shift {shift} is not open (status {status})")]
    NotOpen { shift: String, status: ShiftStatus },
    #[error("shift {shift} is already terminal (status {status})")]
    AlreadyTerminal { shift: String, status: ShiftStatus },
    #[error("forbidden: {0}")]
    Forbidden(&'static str),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SchedError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SchedError::InvalidTimeRange
            | SchedError::MissingField(_)
            | SchedError::InvalidInput(_) => ErrorKind::Validation,
            SchedError::UnknownUser(_)
            | SchedError::UnknownShift(_)
            | SchedError::UnknownCallOut(_) => ErrorKind::NotFound,
            SchedError::AlreadyAssigned(_)
            | SchedError::NotOpen { .. }
            | SchedError::AlreadyTerminal { .. } => ErrorKind::Conflict,
            SchedError::Forbidden(_) => ErrorKind::Forbidden,
            SchedError::Other(_) => ErrorKind::Internal,
        }
    }
}
