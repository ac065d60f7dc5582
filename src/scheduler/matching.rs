use super::{conflicts, ConflictPolicy, ReliabilityBand, SchedError, StaffMatchScore};
use crate::model::{Role, User};
use crate::storage::Storage;
use chrono::{DateTime, Utc};

const RELIABILITY_POINTS: f64 = 40.0;
const ELIGIBILITY_POINTS: i64 = 30;
const NO_CONFLICT_POINTS: i64 = 30;
const ACTIVE_POINTS: i64 = 10;
const INACTIVE_PENALTY: i64 = 50;
const MAX_SCORE: i64 = 100;

/// Note un candidat sur 100 pour un créneau donné.
///
/// Raisons, dans l'ordre : fiabilité, éligibilité, conflits, statut du compte.
/// `_required_skill` n'entre pas dans le barème : l'éligibilité dépend du rôle.
pub fn score_candidate(
    storage: &dyn Storage,
    staff: &User,
    _required_skill: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    policy: ConflictPolicy,
) -> Result<StaffMatchScore, SchedError> {
    let report = conflicts::find_conflicts(storage, &staff.id, start, end, policy)?;

    let reliability = staff.reliability_score();
    let mut score = (reliability * RELIABILITY_POINTS).round() as i64;
    let mut reasons = Vec::with_capacity(4);

    reasons.push(match ReliabilityBand::of(reliability) {
        ReliabilityBand::Excellent => "Excellent reliability".to_string(),
        ReliabilityBand::Good => "Good reliability".to_string(),
        ReliabilityBand::Fair => "Fair reliability".to_string(),
        ReliabilityBand::NeedsImprovement => "Needs improvement in reliability".to_string(),
    });

    let skill_match = staff.role == Role::Staff;
    if skill_match {
        score += ELIGIBILITY_POINTS;
        reasons.push("Available for assignment".to_string());
    } else {
        reasons.push("Not available for shift assignment".to_string());
    }

    if !report.has_conflict {
        score += NO_CONFLICT_POINTS;
        reasons.push("No schedule conflicts".to_string());
    } else if report.degraded {
        reasons.push("Schedule could not be verified".to_string());
    } else {
        reasons.push(format!(
            "Has {} conflicting shift(s)",
            report.conflicting_shifts.len()
        ));
    }

    if staff.active {
        score += ACTIVE_POINTS;
        reasons.push("Active user".to_string());
    } else {
        reasons.push("Inactive user".to_string());
        score = (score - INACTIVE_PENALTY).max(0);
    }

    let score = score.min(MAX_SCORE) as u32;
    tracing::debug!(staff = %staff.id, score, "candidate scored");

    Ok(StaffMatchScore {
        staff: staff.clone(),
        score,
        has_conflict: report.has_conflict,
        reliability_score: reliability,
        skill_match,
        conflicting_shifts: report.conflicting_shifts,
        reasons,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CallOutLog, Shift, ShiftStatus};
    use crate::storage::MemoryStorage;
    use chrono::TimeZone;

    fn at(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, h, 0, 0).unwrap()
    }

    #[test]
    fn perfect_candidate_is_capped_at_100() {
        let store = MemoryStorage::new();
        let nurse = User::new("n@example.com", Role::Staff);
        let m = score_candidate(&store, &nurse, "RN", at(9), at(17), ConflictPolicy::FailOpen)
            .unwrap();
        // 40 + 30 + 30 + 10 = 110
        assert_eq!(m.score, 100);
        assert!(m.skill_match);
        insta::assert_debug_snapshot!(m.reasons, @r###"
        [
            "Excellent reliability",
            "Available for assignment",
            "No schedule conflicts",
            "Active user",
        ]
        "###);
    }

    #[test]
    fn conflicting_assignment_loses_thirty_points() {
        let store = MemoryStorage::new();
        let nurse = User::new("n@example.com", Role::Staff).with_reliability(0.5);
        let mut busy = Shift::new("RN", at(10), at(12)).unwrap();
        busy.status = ShiftStatus::Assigned;
        busy.assigned_to = Some(nurse.id.clone());
        let log = CallOutLog::for_shift(nurse.id.clone(), &busy, None);
        let busy_id = busy.id.clone();
        store.insert_call_out(busy, log).unwrap();

        let m = score_candidate(&store, &nurse, "RN", at(9), at(17), ConflictPolicy::FailOpen)
            .unwrap();
        // 20 + 30 + 0 + 10
        assert_eq!(m.score, 60);
        assert!(m.has_conflict);
        assert_eq!(m.conflicting_shifts[0].id, busy_id);
        assert_eq!(m.reasons[2], "Has 1 conflicting shift(s)");
    }

    #[test]
    fn inactive_is_floored_but_visible() {
        let store = MemoryStorage::new();
        let nurse = User::new("n@example.com", Role::Staff).with_reliability(0.1).inactive();
        let m = score_candidate(&store, &nurse, "RN", at(9), at(17), ConflictPolicy::FailOpen)
            .unwrap();
        // 4 + 30 + 30 - 50 = 14
        assert_eq!(m.score, 14);
        assert_eq!(m.reasons.last().map(String::as_str), Some("Inactive user"));

        let manager = User::new("m@example.com", Role::Manager).with_reliability(0.0).inactive();
        let m = score_candidate(&store, &manager, "RN", at(9), at(17), ConflictPolicy::FailOpen)
            .unwrap();
        // 0 + 0 + 30 - 50 -> 0
        assert_eq!(m.score, 0);
        assert!(!m.skill_match);
    }
}
