use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::handlers::AppState;
use crate::models::*;
use crate::permissions::{require_permission, Permission};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

/// Rejects status moves the dispute lifecycle does not allow.
pub fn check_transition(current: DisputeStatus, next: DisputeStatus) -> Result<(), AppError> {
    if current.can_transition_to(next) {
        Ok(())
    } else {
        Err(AppError::BadRequest(format!(
            "Cannot move dispute from {:?} to {:?}",
            current, next
        )))
    }
}

/// POST /api/v1/disputes
///
/// A consumer disputes an item on their own file. When an account is named it must belong
/// to that consumer, and it is flagged as disputed until the dispute closes.
///
/// # Arguments
///
/// * `state` - The application state.
/// * `user` - The caller; needs `create:dispute`.
/// * `payload` - Consumer, optional account, reason and description.
///
/// # Returns
///
/// * `Result<(StatusCode, Json<ApiResponse<Dispute>>), AppError>` - 201 with the PENDING dispute.
pub async fn create_dispute(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Json(payload): Json<CreateDisputeRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Dispute>>), AppError> {
    tracing::info!("POST /disputes - consumer {}", payload.consumer_id);
    require_permission(&user, Permission::CreateDispute)?;

    if payload.description.trim().is_empty() {
        return Err(AppError::BadRequest("description is required".to_string()));
    }

    let storage = state.storage();
    let consumer = storage
        .find_consumer(payload.consumer_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Consumer not found".to_string()))?;
    if consumer.user_id != Some(user.id) {
        return Err(AppError::Forbidden(
            "Can only dispute your own credit file".to_string(),
        ));
    }

    if let Some(account_id) = payload.credit_account_id {
        let account = storage
            .find_credit_account(account_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Credit account not found".to_string()))?;
        if account.consumer_id != consumer.id {
            return Err(AppError::BadRequest(
                "Credit account does not belong to this consumer".to_string(),
            ));
        }
    }

    let dispute = storage.insert_dispute(&payload, user.id).await?;
    tracing::info!(
        dispute_id = %dispute.id,
        consumer_id = %consumer.id,
        account_id = ?dispute.credit_account_id,
        "Dispute opened"
    );
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(dispute).with_message("Dispute submitted successfully")),
    ))
}

/// GET /api/v1/disputes
pub async fn list_disputes(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Query(params): Query<DisputeQuery>,
) -> Result<Json<PaginatedResponse<Dispute>>, AppError> {
    tracing::info!("GET /disputes - params: {:?}", params);
    let storage = state.storage();

    let consumer_filter = if user.role == Role::Consumer {
        let own = storage
            .find_consumer_by_user(user.id)
            .await?
            .ok_or_else(|| AppError::NotFound("Consumer profile not found".to_string()))?;
        Some(own.id)
    } else {
        require_permission(&user, Permission::ReviewDispute)?;
        None
    };

    let page = params.page();
    let (disputes, total) = storage
        .list_disputes(consumer_filter, params.status, page)
        .await?;
    Ok(Json(PaginatedResponse::new(disputes, page, total)))
}

/// POST /api/v1/disputes/:id/resolve
pub async fn resolve_dispute(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<ResolveDisputeRequest>,
) -> Result<Json<ApiResponse<Dispute>>, AppError> {
    tracing::info!("POST /disputes/{}/resolve - {:?}", id, payload.status);
    require_permission(&user, Permission::ResolveDispute)?;

    let storage = state.storage();
    let dispute = storage
        .find_dispute(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Dispute not found".to_string()))?;
    check_transition(dispute.status, payload.status)?;

    let updated = storage
        .update_dispute_status(&dispute, payload.status, user.id, payload.resolution_notes.trim())
        .await?;

    tracing::info!(
        dispute_id = %updated.id,
        from = ?dispute.status,
        to = ?updated.status,
        "Dispute status changed"
    );
    Ok(Json(ApiResponse::ok(updated).with_message("Dispute updated successfully")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_transition() {
        assert!(check_transition(DisputeStatus::Pending, DisputeStatus::UnderReview).is_ok());
        assert!(check_transition(DisputeStatus::UnderReview, DisputeStatus::Rejected).is_ok());

        let err = check_transition(DisputeStatus::Resolved, DisputeStatus::Pending).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert!(check_transition(DisputeStatus::UnderReview, DisputeStatus::Pending).is_err());
    }
}
