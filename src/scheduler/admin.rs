use super::{compute_reliability, ReliabilityBand, ReliabilityStats, SchedError, Scheduler};
use crate::audit::ActionType;
use crate::model::{Actor, CallOutLog, Role, Shift, ShiftStatus, User, UserId, UserStatus};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StaffReliability {
    pub user: User,
    pub stats: ReliabilityStats,
    pub band: ReliabilityBand,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ReliabilityDistribution {
    pub excellent: usize,
    pub good: usize,
    pub fair: usize,
    pub needs_improvement: usize,
}

/// Vue d'ensemble pour l'administration.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct DashboardStats {
    pub total_users: usize,
    pub active_users: usize,
    pub users_by_role: BTreeMap<Role, usize>,
    pub reliability_distribution: ReliabilityDistribution,
    pub call_outs_logged: usize,
    pub call_outs_filled: usize,
    pub call_outs_missed: usize,
    pub open_shifts: usize,
}

/// Bilan d'un import en masse : les emails déjà connus sont ignorés.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ImportSummary {
    pub imported: Vec<User>,
    pub skipped: Vec<String>,
}

fn check_email(scheduler: &Scheduler, email: &str) -> Result<(), SchedError> {
    if email.is_empty() {
        return Err(SchedError::MissingField("email"));
    }
    if scheduler.storage.find_user_by_email(email)?.is_some() {
        return Err(SchedError::InvalidInput(format!("email already registered: {email}")));
    }
    Ok(())
}

pub(super) fn register_user(
    scheduler: &Scheduler,
    email: &str,
    role: Role,
) -> Result<User, SchedError> {
    let email = email.trim();
    check_email(scheduler, email)?;
    let user = User::new(email, role);
    scheduler.storage.insert_user(user.clone())?;
    tracing::info!(user = %user.id, role = %role, "user registered");
    Ok(user)
}

pub(super) fn import_users(
    scheduler: &Scheduler,
    users: Vec<User>,
) -> Result<ImportSummary, SchedError> {
    let mut summary = ImportSummary::default();
    for mut user in users {
        user.email = user.email.trim().to_string();
        match check_email(scheduler, &user.email) {
            Ok(()) => {}
            Err(SchedError::InvalidInput(_)) => {
                tracing::warn!(email = %user.email, "import: email already registered, row skipped");
                summary.skipped.push(user.email);
                continue;
            }
            Err(err) => return Err(err),
        }
        scheduler.storage.insert_user(user.clone())?;
        summary.imported.push(user);
    }
    tracing::info!(
        imported = summary.imported.len(),
        skipped = summary.skipped.len(),
        "users imported"
    );
    Ok(summary)
}

pub(super) fn update_user_status(
    scheduler: &Scheduler,
    actor: &Actor,
    user_id: &UserId,
    status: Option<UserStatus>,
    active: Option<bool>,
) -> Result<User, SchedError> {
    if actor.role != Role::Admin {
        return Err(SchedError::Forbidden("only admins can change account status"));
    }
    if status.is_none() && active.is_none() {
        return Err(SchedError::InvalidInput(
            "either status or active must be provided".to_string(),
        ));
    }

    let user = scheduler
        .storage
        .update_user_with(user_id, &mut |user: &mut User| {
            if let Some(status) = status {
                user.status = status;
            }
            if let Some(active) = active {
                user.active = active;
            }
        })?
        .ok_or_else(|| SchedError::UnknownUser(user_id.to_string()))?;

    let (action, detail) = match (status, active) {
        (Some(status), _) => (
            match status {
                UserStatus::Active => ActionType::UserActivated,
                UserStatus::Suspended => ActionType::UserSuspended,
                UserStatus::Inactive => ActionType::UserDeactivated,
            },
            format!("Changed user {} status to {}", user.email, status.as_str()),
        ),
        (None, Some(true)) => (ActionType::UserActivated, format!("Activated user {}", user.email)),
        (None, _) => (
            ActionType::UserDeactivated,
            format!("Deactivated user {}", user.email),
        ),
    };
    tracing::info!(user = %user.id, action = action.label(), "account status changed");
    scheduler.record(&actor.id, action, &detail);
    Ok(user)
}

/// Shifts OPEN non assignés, du plus proche au plus lointain.
pub(super) fn open_shifts(scheduler: &Scheduler) -> Result<Vec<Shift>, SchedError> {
    let mut shifts: Vec<Shift> = scheduler
        .storage
        .list_shifts()?
        .into_iter()
        .filter(|s| s.status == ShiftStatus::Open && s.assigned_to.is_none())
        .collect();
    shifts.sort_by_key(|s| s.start);
    Ok(shifts)
}

pub(super) fn assigned_shifts(
    scheduler: &Scheduler,
    user: &UserId,
) -> Result<Vec<Shift>, SchedError> {
    let all = [
        ShiftStatus::Open,
        ShiftStatus::Assigned,
        ShiftStatus::Completed,
        ShiftStatus::Missed,
        ShiftStatus::Cancelled,
    ];
    let mut shifts = scheduler.storage.shifts_assigned_to(user, &all)?;
    shifts.sort_by_key(|s| s.start);
    Ok(shifts)
}

/// Derniers call-outs, le plus récent d'abord.
pub(super) fn recent_call_outs(
    scheduler: &Scheduler,
    limit: usize,
) -> Result<Vec<CallOutLog>, SchedError> {
    let mut logs = scheduler.storage.list_call_outs()?;
    logs.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    logs.truncate(limit);
    Ok(logs)
}

pub(super) fn staff_reliability(scheduler: &Scheduler) -> Result<Vec<StaffReliability>, SchedError> {
    scheduler
        .storage
        .users_by_role(Role::Staff)?
        .into_iter()
        .map(|user| -> Result<StaffReliability, SchedError> {
            let stats = compute_reliability(scheduler.storage.as_ref(), &user.id)?;
            Ok(StaffReliability {
                band: ReliabilityBand::of(stats.score),
                user,
                stats,
            })
        })
        .collect()
}

pub(super) fn dashboard_stats(scheduler: &Scheduler) -> Result<DashboardStats, SchedError> {
    let users = scheduler.storage.list_users()?;
    let call_outs = scheduler.storage.list_call_outs()?;
    let shifts = scheduler.storage.list_shifts()?;

    let mut stats = DashboardStats {
        total_users: users.len(),
        active_users: users.iter().filter(|u| u.active).count(),
        call_outs_logged: call_outs.len(),
        call_outs_filled: call_outs
            .iter()
            .filter(|c| c.accepted_by.is_some() && !c.missed)
            .count(),
        call_outs_missed: call_outs.iter().filter(|c| c.missed).count(),
        open_shifts: shifts.iter().filter(|s| s.status == ShiftStatus::Open).count(),
        ..DashboardStats::default()
    };

    for user in &users {
        *stats.users_by_role.entry(user.role).or_default() += 1;
        let dist = &mut stats.reliability_distribution;
        match ReliabilityBand::of(user.reliability_score()) {
            ReliabilityBand::Excellent => dist.excellent += 1,
            ReliabilityBand::Good => dist.good += 1,
            ReliabilityBand::Fair => dist.fair += 1,
            ReliabilityBand::NeedsImprovement => dist.needs_improvement += 1,
        }
    }
    Ok(stats)
}
