use super::{util, ReliabilityStats};
use crate::model::{CallOutLog, User, UserId};
use crate::storage::Storage;
use anyhow::Context;

/// Temps de réponse neutre, en minutes.
const NEUTRAL_RESPONSE_MINUTES: f64 = 5.0;
/// Chaque tranche de 60 minutes au-delà du neutre coûte 1.0 au facteur.
const RESPONSE_DECAY_MINUTES: f64 = 60.0;
const RESPONSE_FACTOR_FLOOR: f64 = 0.1;

/// Calcule les statistiques de fiabilité à partir des call-outs acceptés.
///
/// Sans historique, le score vaut 1.0 : un nouvel arrivant part avec une confiance pleine.
/// `score` garde sa pleine précision ; seules les valeurs d'affichage sont arrondies.
pub fn compute_stats(accepted: &[CallOutLog]) -> ReliabilityStats {
    let total = accepted.len();
    if total == 0 {
        return ReliabilityStats::default();
    }

    let missed = accepted.iter().filter(|log| log.missed).count();
    let completed = total - missed;
    let completion_rate = completed as f64 / total as f64;

    let response_minutes: Vec<f64> = accepted
        .iter()
        .filter_map(|log| {
            log.responded_at
                .map(|at| (at - log.timestamp).num_milliseconds() as f64 / 60_000.0)
        })
        .collect();
    let avg_response = if response_minutes.is_empty() {
        0.0
    } else {
        response_minutes.iter().sum::<f64>() / response_minutes.len() as f64
    };

    let response_factor = (1.0 - (avg_response - NEUTRAL_RESPONSE_MINUTES) / RESPONSE_DECAY_MINUTES)
        .clamp(RESPONSE_FACTOR_FLOOR, 1.0);

    let mut score: f64 = 1.0;
    score *= 0.3 + 0.7 * completion_rate;
    score *= 0.7 + 0.3 * response_factor;
    let score = score.clamp(0.0, 1.0);

    ReliabilityStats {
        score,
        total_shifts: total,
        completed_shifts: completed,
        missed_shifts: missed,
        avg_response_time_minutes: util::round_to(avg_response, 1),
        completion_rate: util::round_to(completion_rate, 2),
    }
}

pub fn compute_reliability(storage: &dyn Storage, user: &UserId) -> anyhow::Result<ReliabilityStats> {
    let accepted = storage
        .accepted_call_outs(user)
        .with_context(|| format!("loading accepted call-outs for {user}"))?;
    Ok(compute_stats(&accepted))
}

/// Recalcule puis écrit le score sur l'utilisateur.
pub fn persist_reliability(storage: &dyn Storage, user: &UserId) -> anyhow::Result<ReliabilityStats> {
    let stats = compute_reliability(storage, user)?;
    storage
        .update_user_with(user, &mut |record: &mut User| record.set_reliability_score(stats.score))?
        .with_context(|| format!("unknown user: {user}"))?;
    tracing::debug!(user = %user, score = stats.score, "reliability updated");
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Shift, ShiftId};
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use proptest::prelude::*;

    fn log(response_minutes: Option<i64>, missed: bool) -> CallOutLog {
        let t0: DateTime<Utc> = Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap();
        let shift = Shift::new("RN", t0, t0 + Duration::hours(8)).unwrap();
        let mut log = CallOutLog::for_shift(UserId::new("caller"), &shift, None);
        log.shift_id = ShiftId::random();
        log.accepted_by = Some(UserId::new("s1"));
        if let Some(m) = response_minutes {
            let at = t0 + Duration::minutes(m);
            log.filled_at = Some(at);
            log.responded_at = Some(at);
        }
        log.missed = missed;
        log
    }

    #[test]
    fn empty_history_is_perfect() {
        let stats = compute_stats(&[]);
        assert_eq!(stats.score, 1.0);
        assert_eq!(stats.total_shifts, 0);
        assert_eq!(stats.completion_rate, 0.0);
    }

    #[test]
    fn ten_shifts_one_missed_fast_responder() {
        let mut logs: Vec<_> = (0..9).map(|_| log(Some(3), false)).collect();
        logs.push(log(Some(3), true));
        let stats = compute_stats(&logs);
        assert_eq!(stats.total_shifts, 10);
        assert_eq!(stats.missed_shifts, 1);
        assert_eq!(stats.completed_shifts, 9);
        assert_eq!(stats.completion_rate, 0.9);
        assert_eq!(stats.avg_response_time_minutes, 3.0);
        assert!((stats.score - 0.93).abs() < 1e-9);
    }

    #[test]
    fn slow_responses_hit_the_floor() {
        let logs = vec![log(Some(10_000), false)];
        let stats = compute_stats(&logs);
        // facteur plancher 0.1 : 1.0 * (0.7 + 0.03)
        assert!((stats.score - 0.73).abs() < 1e-9);
    }

    #[test]
    fn unanswered_logs_count_as_zero_average() {
        let logs = vec![log(None, false), log(None, false)];
        let stats = compute_stats(&logs);
        assert_eq!(stats.avg_response_time_minutes, 0.0);
        assert_eq!(stats.score, 1.0);
    }

    proptest! {
        #[test]
        fn score_stays_in_unit_interval(
            entries in prop::collection::vec((prop::option::of(-600i64..20_000), any::<bool>()), 0..40)
        ) {
            let logs: Vec<_> = entries.into_iter().map(|(m, missed)| log(m, missed)).collect();
            let stats = compute_stats(&logs);
            prop_assert!((0.0..=1.0).contains(&stats.score));
            prop_assert_eq!(stats.completed_shifts + stats.missed_shifts, stats.total_shifts);
        }
    }
}
