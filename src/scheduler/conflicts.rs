use super::{util, ConflictPolicy, ConflictReport, SchedError};
use crate::model::{ShiftStatus, UserId};
use crate::storage::Storage;
use chrono::{DateTime, Utc};

/// Seuls ces statuts occupent encore le planning d'une personne.
const BLOCKING: [ShiftStatus; 2] = [ShiftStatus::Open, ShiftStatus::Assigned];

/// Liste tous les shifts actifs de `staff` qui chevauchent `[start, end)`,
/// dans l'ordre renvoyé par le stockage.
pub fn find_conflicts(
    storage: &dyn Storage,
    staff: &UserId,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    policy: ConflictPolicy,
) -> Result<ConflictReport, SchedError> {
    if end <= start {
        return Err(SchedError::InvalidTimeRange);
    }

    let existing = match storage.shifts_assigned_to(staff, &BLOCKING) {
        Ok(shifts) => shifts,
        Err(err) => {
            tracing::warn!(staff = %staff, error = %err, ?policy, "conflict lookup failed");
            return Ok(ConflictReport {
                has_conflict: policy == ConflictPolicy::FailClosed,
                conflicting_shifts: Vec::new(),
                degraded: true,
            });
        }
    };

    let conflicting_shifts: Vec<_> = existing
        .into_iter()
        .filter(|s| util::overlaps(start, end, s.start, s.end))
        .collect();

    Ok(ConflictReport {
        has_conflict: !conflicting_shifts.is_empty(),
        conflicting_shifts,
        degraded: false,
    })
}
