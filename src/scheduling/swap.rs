//! Swap request lifecycle: `pending -> approved | rejected`.

use super::guard;
use crate::db::Storage;
use crate::errors::{AppError, FieldError, FieldErrors};
use crate::models::{
    now_rfc3339, CreateSwapRequest, Notification, NotificationKind, ResolveSwapRequest,
    SwapRequest, SwapStatus,
};

/// Validate a state change. Resolved requests never change again.
pub fn transition(from: SwapStatus, to: SwapStatus) -> Result<SwapStatus, AppError> {
    if from.is_terminal() {
        return Err(AppError::InvalidTransition(format!(
            "Swap request is already {}",
            from.as_str()
        )));
    }
    if !to.is_terminal() {
        return Err(status_error());
    }
    Ok(to)
}

fn status_error() -> AppError {
    AppError::Validation(vec![FieldError {
        field: "status".to_string(),
        message: "status must be one of approved, rejected".to_string(),
    }])
}

/// Record a notification. The swap stands even when this write fails.
async fn notify(store: &dyn Storage, notification: Notification) {
    if let Err(e) = store.insert_notification(&notification).await {
        tracing::warn!(
            "Failed to notify volunteer {}: {:?}",
            notification.volunteer_id,
            e
        );
    }
}

/// Record a new pending swap for an assignment its requester holds.
///
/// The volunteer who created the schedule, when known, is notified.
pub async fn create_swap(
    store: &dyn Storage,
    request: CreateSwapRequest,
) -> Result<SwapRequest, AppError> {
    let swap = request.into_swap_request()?;

    let detail = store
        .get_schedule_detail(&swap.schedule_detail_id)
        .await?
        .ok_or_else(|| {
            AppError::NotFound(format!(
                "Schedule detail {} not found",
                swap.schedule_detail_id
            ))
        })?;
    if detail.volunteer_id.as_deref() != Some(swap.requester_id.as_str()) {
        let mut errors = FieldErrors::new();
        errors.push(
            "requesterId",
            "requester is not assigned to this schedule detail",
        );
        errors.into_result()?;
    }
    if let Some(replacement_id) = &swap.replacement_id {
        if store.get_volunteer(replacement_id).await?.is_none() {
            return Err(AppError::NotFound(format!(
                "Volunteer {} not found",
                replacement_id
            )));
        }
    }

    store.insert_swap_request(&swap).await?;
    tracing::info!(swap_id = %swap.id, detail_id = %swap.schedule_detail_id, "Swap requested");

    let creator = match store.get_schedule(&detail.schedule_id).await? {
        Some(schedule) => schedule.created_by,
        None => None,
    };
    if let Some(creator) = creator {
        if store.get_volunteer(&creator).await?.is_some() {
            let notification = Notification::new(
                &creator,
                NotificationKind::SwapRequest,
                "New swap request",
                Some(&swap.id),
            );
            notify(store, notification).await;
        }
    }
    Ok(swap)
}

/// Approve or reject a pending swap.
///
/// Approval moves the assignment to the replacement through the
/// double-booking guard, or empties the slot when no replacement was named.
/// It is refused when the requester no longer holds the slot. A refused
/// approval leaves both the swap and the assignment untouched. The requester
/// is notified of the outcome.
pub async fn resolve_swap(
    store: &dyn Storage,
    id: &str,
    request: ResolveSwapRequest,
    match_location: bool,
) -> Result<SwapRequest, AppError> {
    let swap = store
        .get_swap_request(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Swap request {} not found", id)))?;

    let target = SwapStatus::from_str(request.status.trim()).ok_or_else(status_error)?;
    let target = transition(swap.status, target)?;

    if target == SwapStatus::Approved {
        let mut detail = store
            .get_schedule_detail(&swap.schedule_detail_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "Schedule detail {} not found",
                    swap.schedule_detail_id
                ))
            })?;
        if detail.volunteer_id.as_deref() != Some(swap.requester_id.as_str()) {
            return Err(AppError::InvalidTransition(
                "Requester no longer holds this assignment".to_string(),
            ));
        }
        match &swap.replacement_id {
            Some(replacement_id) => {
                guard::assign_volunteer(store, &detail, replacement_id, match_location).await?;
            }
            None => {
                detail.volunteer_id = None;
                store.update_schedule_detail(&detail).await?;
            }
        }
    }

    let resolved_by = request
        .resolved_by
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty());
    let resolved = store
        .mark_swap_resolved(id, target, resolved_by.as_deref(), &now_rfc3339())
        .await?
        .ok_or_else(|| {
            AppError::InvalidTransition("Swap request was resolved concurrently".to_string())
        })?;

    tracing::info!(swap_id = %id, status = target.as_str(), "Swap resolved");

    let title = match target {
        SwapStatus::Approved => "Swap request approved",
        _ => "Swap request rejected",
    };
    let notification = Notification::new(
        &resolved.requester_id,
        NotificationKind::SwapRequestUpdate,
        title,
        Some(&resolved.id),
    );
    notify(store, notification).await;
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStorage;
    use crate::models::ScheduleFilter;
    use crate::scheduling::fixtures::{seed, Seed};

    fn approve() -> ResolveSwapRequest {
        ResolveSwapRequest {
            status: "approved".into(),
            resolved_by: Some("admin".into()),
        }
    }

    async fn pending_swap(
        store: &MemoryStorage,
        seed: &Seed,
        replacement: Option<&str>,
    ) -> SwapRequest {
        create_swap(
            store,
            CreateSwapRequest {
                requester_id: seed.alice.clone(),
                schedule_detail_id: seed.alice_at_first.clone(),
                replacement_id: replacement.map(str::to_string),
                reason: Some("Out of town".into()),
            },
        )
        .await
        .unwrap()
    }

    async fn slot_holder(store: &MemoryStorage, detail_id: &str) -> Option<String> {
        store
            .get_schedule_detail(detail_id)
            .await
            .unwrap()
            .unwrap()
            .volunteer_id
    }

    #[test]
    fn test_transition_rules() {
        assert_eq!(
            transition(SwapStatus::Pending, SwapStatus::Approved).unwrap(),
            SwapStatus::Approved
        );
        assert!(matches!(
            transition(SwapStatus::Pending, SwapStatus::Pending),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            transition(SwapStatus::Approved, SwapStatus::Rejected),
            Err(AppError::InvalidTransition(_))
        ));
        assert!(matches!(
            transition(SwapStatus::Rejected, SwapStatus::Approved),
            Err(AppError::InvalidTransition(_))
        ));
    }

    #[tokio::test]
    async fn test_approval_moves_assignment_once() {
        let store = MemoryStorage::new();
        let seed = seed(&store).await;
        let swap = pending_swap(&store, &seed, Some(seed.bob.as_str())).await;

        let resolved = resolve_swap(&store, &swap.id, approve(), false)
            .await
            .unwrap();
        assert_eq!(resolved.status, SwapStatus::Approved);
        assert_eq!(resolved.resolved_by.as_deref(), Some("admin"));
        assert_eq!(
            slot_holder(&store, &seed.alice_at_first).await,
            Some(seed.bob.clone())
        );

        let again = resolve_swap(&store, &swap.id, approve(), false).await;
        assert!(matches!(again, Err(AppError::InvalidTransition(_))));
    }

    #[tokio::test]
    async fn test_rejection_leaves_assignment() {
        let store = MemoryStorage::new();
        let seed = seed(&store).await;
        let swap = pending_swap(&store, &seed, Some(seed.bob.as_str())).await;

        let request = ResolveSwapRequest {
            status: "rejected".into(),
            resolved_by: None,
        };
        let resolved = resolve_swap(&store, &swap.id, request, false)
            .await
            .unwrap();
        assert_eq!(resolved.status, SwapStatus::Rejected);
        assert_eq!(
            slot_holder(&store, &seed.alice_at_first).await,
            Some(seed.alice.clone())
        );
    }

    #[tokio::test]
    async fn test_approval_without_replacement_empties_slot() {
        let store = MemoryStorage::new();
        let seed = seed(&store).await;
        let swap = pending_swap(&store, &seed, None).await;

        resolve_swap(&store, &swap.id, approve(), false)
            .await
            .unwrap();
        assert_eq!(slot_holder(&store, &seed.alice_at_first).await, None);
    }

    #[tokio::test]
    async fn test_conflicting_approval_changes_nothing() {
        let store = MemoryStorage::new();
        let seed = seed(&store).await;
        // Bob already serves at the second event, which starts at the same instant.
        let empty = store
            .get_schedule_detail(&seed.empty_at_second)
            .await
            .unwrap()
            .unwrap();
        guard::assign_volunteer(&store, &empty, &seed.bob, false)
            .await
            .unwrap();
        let swap = pending_swap(&store, &seed, Some(seed.bob.as_str())).await;

        let result = resolve_swap(&store, &swap.id, approve(), false).await;
        assert!(matches!(result, Err(AppError::ScheduleConflict(_))));

        let swap = store.get_swap_request(&swap.id).await.unwrap().unwrap();
        assert_eq!(swap.status, SwapStatus::Pending);
        assert_eq!(
            slot_holder(&store, &seed.alice_at_first).await,
            Some(seed.alice.clone())
        );
    }

    #[tokio::test]
    async fn test_approval_refused_after_reassignment() {
        let store = MemoryStorage::new();
        let seed = seed(&store).await;
        let swap = pending_swap(&store, &seed, None).await;

        // The slot moves to Bob after Alice filed her request.
        let mut detail = store
            .get_schedule_detail(&seed.alice_at_first)
            .await
            .unwrap()
            .unwrap();
        detail.volunteer_id = Some(seed.bob.clone());
        store.update_schedule_detail(&detail).await.unwrap();

        let result = resolve_swap(&store, &swap.id, approve(), false).await;
        assert!(matches!(result, Err(AppError::InvalidTransition(_))));
        assert_eq!(
            slot_holder(&store, &seed.alice_at_first).await,
            Some(seed.bob.clone())
        );
        let swap = store.get_swap_request(&swap.id).await.unwrap().unwrap();
        assert_eq!(swap.status, SwapStatus::Pending);
    }

    #[tokio::test]
    async fn test_swap_requires_current_holder() {
        let store = MemoryStorage::new();
        let seed = seed(&store).await;
        let result = create_swap(
            &store,
            CreateSwapRequest {
                requester_id: seed.bob.clone(),
                schedule_detail_id: seed.alice_at_first.clone(),
                replacement_id: None,
                reason: None,
            },
        )
        .await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_swap_lifecycle_notifies_creator_and_requester() {
        let store = MemoryStorage::new();
        let seed = seed(&store).await;
        let filter = ScheduleFilter {
            event_id: Some(seed.first_event.clone()),
            ..Default::default()
        };
        let mut schedule = store.list_schedules(&filter).await.unwrap().remove(0);
        schedule.created_by = Some(seed.bob.clone());
        store.update_schedule(&schedule).await.unwrap();

        let swap = pending_swap(&store, &seed, None).await;
        let inbox = store.list_notifications(&seed.bob, true).await.unwrap();
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].kind, NotificationKind::SwapRequest);
        assert_eq!(inbox[0].related_id.as_deref(), Some(swap.id.as_str()));

        resolve_swap(&store, &swap.id, approve(), false)
            .await
            .unwrap();
        let inbox = store.list_notifications(&seed.alice, false).await.unwrap();
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].kind, NotificationKind::SwapRequestUpdate);
        assert_eq!(inbox[0].title, "Swap request approved");
    }

    #[tokio::test]
    async fn test_schedule_without_creator_sends_no_request_notice() {
        let store = MemoryStorage::new();
        let seed = seed(&store).await;
        pending_swap(&store, &seed, None).await;
        assert!(store
            .list_notifications(&seed.bob, false)
            .await
            .unwrap()
            .is_empty());
    }
}
