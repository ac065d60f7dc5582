use super::{SchedError, Scheduler};
use crate::audit::ActionType;
use crate::model::{
    Actor, CallOutId, CallOutLog, CallOutStatus, Role, Shift, ShiftId, ShiftStatus, UserId,
};
use crate::notification::{EventKind, NotificationEvent, Topic};
use crate::storage::Transition;
use chrono::{DateTime, Utc};

const DISPLAY_FORMAT: &str = "%Y-%m-%d %H:%M UTC";

pub(super) fn create_call_out(
    scheduler: &Scheduler,
    staff: &UserId,
    required_skill: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    reason: Option<&str>,
    now: DateTime<Utc>,
) -> Result<Shift, SchedError> {
    let required_skill = required_skill.trim();
    if required_skill.is_empty() {
        return Err(SchedError::MissingField("required_skill"));
    }
    if end <= start {
        return Err(SchedError::InvalidTimeRange);
    }

    let caller = scheduler
        .storage
        .find_user(staff)?
        .ok_or_else(|| SchedError::UnknownUser(staff.to_string()))?;

    let shift = Shift::new(required_skill, start, end).map_err(|_| SchedError::InvalidTimeRange)?;
    let reason = reason
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(str::to_string);
    let log = CallOutLog::for_shift(caller.id.clone(), &shift, reason.clone());
    scheduler.storage.insert_call_out(shift.clone(), log)?;

    tracing::info!(shift = %shift.id, caller = %caller.id, skill = required_skill, "call-out logged");

    let event = NotificationEvent::build(
        scheduler.renderer.as_ref(),
        EventKind::NewShift,
        &shift,
        None,
        reason.clone(),
        now,
    );
    scheduler.notify(Topic::Role(Role::Staff), &event);
    scheduler.record(
        &caller.id,
        ActionType::CalloutCreated,
        &format!(
            "Created call-out for {} shift on {}. Reason: {}",
            shift.required_skill,
            shift.start.format(DISPLAY_FORMAT),
            reason.as_deref().unwrap_or("No reason provided")
        ),
    );

    Ok(shift)
}

/// Un seul accept gagne : la transition passe par l'écriture conditionnelle du stockage.
pub(super) fn accept_shift(
    scheduler: &Scheduler,
    shift_id: &ShiftId,
    actor: &Actor,
    now: DateTime<Utc>,
) -> Result<(), SchedError> {
    if actor.role != Role::Staff {
        return Err(SchedError::Forbidden("only staff can accept shifts"));
    }
    let staff = scheduler
        .storage
        .find_user(&actor.id)?
        .ok_or_else(|| SchedError::UnknownUser(actor.id.to_string()))?;

    let shift = match scheduler.storage.claim_shift(shift_id, &staff.id, now)? {
        Transition::Applied(shift) => shift,
        Transition::Rejected(current) if current.status == ShiftStatus::Assigned => {
            return Err(SchedError::AlreadyAssigned(shift_id.to_string()));
        }
        Transition::Rejected(current) => {
            return Err(SchedError::NotOpen {
                shift: shift_id.to_string(),
                status: current.status,
            });
        }
        Transition::Missing => return Err(SchedError::UnknownShift(shift_id.to_string())),
    };

    tracing::info!(shift = %shift.id, staff = %staff.id, "shift accepted");

    scheduler.spawn_reliability_update(staff.id.clone());

    let event = NotificationEvent::build(
        scheduler.renderer.as_ref(),
        EventKind::ShiftAccepted,
        &shift,
        Some(&staff),
        None,
        now,
    );
    scheduler.notify(Topic::Role(Role::Manager), &event);
    scheduler.record(
        &staff.id,
        ActionType::ShiftAccepted,
        &format!(
            "Accepted {} shift on {}",
            shift.required_skill,
            shift.start.format(DISPLAY_FORMAT)
        ),
    );
    Ok(())
}

pub(super) fn cancel_shift(
    scheduler: &Scheduler,
    shift_id: &ShiftId,
    actor: &Actor,
) -> Result<Shift, SchedError> {
    if !actor.role.can_manage() {
        return Err(SchedError::Forbidden("only managers and admins can cancel shifts"));
    }

    let active = [ShiftStatus::Open, ShiftStatus::Assigned];
    let shift = match scheduler
        .storage
        .transition_shift(shift_id, &active, ShiftStatus::Cancelled)?
    {
        Transition::Applied(shift) => shift,
        Transition::Rejected(current) => {
            return Err(SchedError::AlreadyTerminal {
                shift: shift_id.to_string(),
                status: current.status,
            });
        }
        Transition::Missing => return Err(SchedError::UnknownShift(shift_id.to_string())),
    };

    tracing::info!(shift = %shift.id, actor = %actor.id, "shift cancelled");

    let event = NotificationEvent::build(
        scheduler.renderer.as_ref(),
        EventKind::ShiftCancelled,
        &shift,
        None,
        None,
        Utc::now(),
    );
    scheduler.notify(Topic::All, &event);

    let assignee = match &shift.assigned_to {
        Some(id) => {
            scheduler.notify(Topic::User(id.clone()), &event);
            scheduler.storage.find_user(id).ok().flatten()
        }
        None => None,
    };
    scheduler.record(
        &actor.id,
        ActionType::ShiftCancelled,
        &format!(
            "Cancelled shift for {} from {} to {}",
            assignee.as_ref().map_or("unassigned", |u| u.email.as_str()),
            shift.start.format(DISPLAY_FORMAT),
            shift.end.format(DISPLAY_FORMAT)
        ),
    );
    Ok(shift)
}

/// Annule le call-out sans toucher au shift. Annuler deux fois ne change rien.
pub(super) fn cancel_call_out(
    scheduler: &Scheduler,
    call_out_id: &CallOutId,
    actor: &Actor,
) -> Result<CallOutLog, SchedError> {
    if !actor.role.can_manage() {
        return Err(SchedError::Forbidden("only managers and admins can cancel call-outs"));
    }

    let mut changed = false;
    let log = scheduler
        .storage
        .update_call_out_with(call_out_id, &mut |log: &mut CallOutLog| {
            if log.status != CallOutStatus::Cancelled {
                log.status = CallOutStatus::Cancelled;
                changed = true;
            }
        })?
        .ok_or_else(|| SchedError::UnknownCallOut(call_out_id.to_string()))?;

    if changed {
        tracing::info!(call_out = %log.id, actor = %actor.id, "call-out cancelled");
        let caller = scheduler.storage.find_user(&log.user_id).ok().flatten();
        scheduler.record(
            &actor.id,
            ActionType::CalloutCancelled,
            &format!(
                "Cancelled call-out for {} from {}",
                caller.as_ref().map_or(log.user_id.as_str(), |u| u.email.as_str()),
                log.timestamp.format(DISPLAY_FORMAT)
            ),
        );
    }
    Ok(log)
}
