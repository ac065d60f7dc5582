use super::{matching, ConflictPolicy, SchedError, SmartSuggestion, StaffMatchScore};
use crate::model::{Role, UserId};
use crate::storage::Storage;
use chrono::{DateTime, Utc};
use rayon::prelude::*;
use rayon::ThreadPool;

/// Classe tout le personnel STAFF (hors `exclude`) pour le créneau demandé.
///
/// Les candidats sont notés en parallèle sur `pool`, puis triés de façon stable :
/// à score égal, l'ordre du stockage est conservé.
pub fn suggest(
    storage: &dyn Storage,
    pool: &ThreadPool,
    required_skill: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    exclude: Option<&UserId>,
    policy: ConflictPolicy,
) -> Result<SmartSuggestion, SchedError> {
    if end <= start {
        return Err(SchedError::InvalidTimeRange);
    }

    let candidates = match storage.users_by_role(Role::Staff) {
        Ok(users) => users,
        Err(err) => {
            tracing::warn!(error = %err, "cannot load staff pool");
            return Ok(SmartSuggestion {
                conflict_warnings: vec![format!("Error loading staff suggestions: {err}")],
                ..SmartSuggestion::default()
            });
        }
    };
    let candidates: Vec<_> = candidates
        .into_iter()
        .filter(|u| Some(&u.id) != exclude)
        .collect();

    let mut ranked: Vec<StaffMatchScore> = pool.install(|| {
        candidates
            .par_iter()
            .map(|staff| matching::score_candidate(storage, staff, required_skill, start, end, policy))
            .collect::<Result<Vec<_>, SchedError>>()
    })?;
    ranked.sort_by(|a, b| b.score.cmp(&a.score));

    let mut conflict_warnings = Vec::new();
    let with_conflicts = ranked.iter().filter(|m| m.has_conflict).count();
    if with_conflicts > 0 {
        conflict_warnings.push(format!(
            "{with_conflicts} staff member(s) have scheduling conflicts for this time slot"
        ));
    }
    let total_available_staff = ranked
        .iter()
        .filter(|m| !m.has_conflict && m.staff.active)
        .count();
    if total_available_staff == 0 {
        conflict_warnings
            .push("No staff members are available without conflicts for this time slot".to_string());
    }

    Ok(SmartSuggestion {
        best_match: ranked.first().cloned(),
        recommended_staff: ranked,
        conflict_warnings,
        total_available_staff,
    })
}
