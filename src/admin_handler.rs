//! Administrative endpoints: banks, users, API tokens and the audit trail.

use crate::auth::{forget_user, generate_bank_key, generate_token, sha256_hex, AuthUser};
use crate::errors::AppError;
use crate::handlers::AppState;
use crate::models::*;
use crate::permissions::{require_permission, Permission};
use crate::validation::{normalize_phone, require_valid_email};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

// ============ Banks ============

/// GET /api/v1/banks
pub async fn list_banks(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Query(params): Query<PageQuery>,
) -> Result<Json<PaginatedResponse<Bank>>, AppError> {
    tracing::info!("GET /banks - params: {:?}", params);
    require_permission(&user, Permission::ViewBank)?;

    let page = params.page();
    let (banks, total) = state.storage().list_banks(page).await?;
    Ok(Json(PaginatedResponse::new(banks, page, total)))
}

/// GET /api/v1/banks/:id
pub async fn get_bank(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Bank>>, AppError> {
    tracing::info!("GET /banks/{}", id);
    require_permission(&user, Permission::ViewBank)?;

    let bank = state
        .storage()
        .find_bank(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Bank not found".to_string()))?;
    Ok(Json(ApiResponse::ok(bank)))
}

/// POST /api/v1/banks
///
/// Registers a bank in the unapproved state and issues its API key.
///
/// # Arguments
///
/// * `state` - The application state.
/// * `user` - The caller; needs `create:bank`.
/// * `payload` - Bank details. `license_number` must be unique.
///
/// # Returns
///
/// * `Result<(StatusCode, Json<ApiResponse<CreatedBank>>), AppError>` - 201 with the bank and
///   its plaintext API key. Only the key's digest is stored.
pub async fn create_bank(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Json(mut payload): Json<CreateBankRequest>,
) -> Result<(StatusCode, Json<ApiResponse<CreatedBank>>), AppError> {
    tracing::info!("POST /banks - license {}", payload.license_number);
    require_permission(&user, Permission::CreateBank)?;

    if payload.name.trim().is_empty() || payload.license_number.trim().is_empty() {
        return Err(AppError::BadRequest(
            "name and license_number are required".to_string(),
        ));
    }
    require_valid_email(&payload.contact_email)?;
    payload.contact_phone = payload
        .contact_phone
        .as_deref()
        .map(normalize_phone)
        .transpose()?;

    let api_key = generate_bank_key();
    let bank = state
        .storage()
        .create_bank(&payload, &sha256_hex(&api_key))
        .await?;

    tracing::info!("Bank {} registered by {}", bank.id, user.id);
    Ok((
        StatusCode::CREATED,
        Json(
            ApiResponse::ok(CreatedBank { bank, api_key })
                .with_message("Bank created. Store the API key now; it will not be shown again"),
        ),
    ))
}

/// PUT /api/v1/banks/:id
pub async fn update_bank(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
    Json(mut payload): Json<UpdateBankRequest>,
) -> Result<Json<ApiResponse<Bank>>, AppError> {
    tracing::info!("PUT /banks/{}", id);
    require_permission(&user, Permission::UpdateBank)?;

    if let Some(email) = payload.contact_email.as_deref() {
        require_valid_email(email)?;
    }
    payload.contact_phone = payload
        .contact_phone
        .as_deref()
        .map(normalize_phone)
        .transpose()?;

    let bank = state
        .storage()
        .update_bank(id, &payload)
        .await?
        .ok_or_else(|| AppError::NotFound("Bank not found".to_string()))?;
    Ok(Json(ApiResponse::ok(bank).with_message("Bank updated successfully")))
}

/// POST /api/v1/banks/:id/approve
pub async fn approve_bank(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<BankApprovalRequest>,
) -> Result<Json<ApiResponse<Bank>>, AppError> {
    tracing::info!("POST /banks/{}/approve - is_approved={}", id, payload.is_approved);
    require_permission(&user, Permission::ApproveBank)?;

    let bank = state
        .storage()
        .set_bank_approval(id, payload.is_approved, user.id)
        .await?
        .ok_or_else(|| AppError::NotFound("Bank not found".to_string()))?;

    let message = if bank.is_approved {
        "Bank approved"
    } else {
        "Bank approval revoked"
    };
    Ok(Json(ApiResponse::ok(bank).with_message(message)))
}

// ============ Users ============

/// Bank managers only administer BANK_USER accounts of their own bank.
pub fn manages(actor: &User, target: &User) -> bool {
    match actor.role {
        Role::Admin => true,
        Role::BankManager => {
            actor.bank_id.is_some()
                && target.bank_id == actor.bank_id
                && target.role == Role::BankUser
        }
        _ => false,
    }
}

/// Resolves the bank a new account is attached to.
///
/// Bank managers can only create BANK_USER accounts in their own bank. Bank roles must
/// end up with a bank; other roles must not carry one.
pub fn bank_for_new_user(actor: &User, req: &CreateUserRequest) -> Result<Option<Uuid>, AppError> {
    let bank_id = if actor.role == Role::BankManager {
        if req.role != Role::BankUser {
            return Err(AppError::Forbidden(
                "Bank managers can only create bank users".to_string(),
            ));
        }
        match (actor.bank_id, req.bank_id) {
            (Some(own), Some(requested)) if own != requested => {
                return Err(AppError::Forbidden(
                    "Cannot create users for another bank".to_string(),
                ))
            }
            (Some(own), _) => Some(own),
            (None, _) => {
                return Err(AppError::Forbidden(
                    "Bank manager is not attached to a bank".to_string(),
                ))
            }
        }
    } else {
        req.bank_id
    };

    match (req.role.is_bank_scoped(), bank_id) {
        (true, None) => Err(AppError::BadRequest(
            "bank_id is required for bank roles".to_string(),
        )),
        (false, Some(_)) => Err(AppError::BadRequest(
            "bank_id is only allowed for bank roles".to_string(),
        )),
        _ => Ok(bank_id),
    }
}

async fn load_managed_user(
    state: &AppState,
    actor: &User,
    id: Uuid,
) -> Result<User, AppError> {
    let target = state
        .storage()
        .find_user(id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
    if !manages(actor, &target) {
        return Err(AppError::Forbidden("Access denied".to_string()));
    }
    Ok(target)
}

/// GET /api/v1/users
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Query(params): Query<PageQuery>,
) -> Result<Json<PaginatedResponse<User>>, AppError> {
    tracing::info!("GET /users - params: {:?}", params);
    require_permission(&user, Permission::ViewUser)?;

    let bank_filter = match user.role {
        Role::BankManager => Some(
            user.bank_id
                .ok_or_else(|| AppError::Forbidden("Bank manager is not attached to a bank".to_string()))?,
        ),
        _ => None,
    };

    let page = params.page();
    let (users, total) = state.storage().list_users(bank_filter, page).await?;
    Ok(Json(PaginatedResponse::new(users, page, total)))
}

/// GET /api/v1/users/:id
pub async fn get_user(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<User>>, AppError> {
    tracing::info!("GET /users/{}", id);
    require_permission(&user, Permission::ViewUser)?;

    let target = state
        .storage()
        .find_user(id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
    if user.role == Role::BankManager && target.bank_id != user.bank_id {
        return Err(AppError::Forbidden("Access denied".to_string()));
    }
    Ok(Json(ApiResponse::ok(target)))
}

/// POST /api/v1/users
pub async fn create_user(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Json(mut payload): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<ApiResponse<User>>), AppError> {
    tracing::info!("POST /users - role {:?}", payload.role);
    require_permission(&user, Permission::CreateUser)?;

    require_valid_email(&payload.email)?;
    if payload.full_name.trim().is_empty() {
        return Err(AppError::BadRequest("full_name is required".to_string()));
    }
    payload.bank_id = bank_for_new_user(&user, &payload)?;

    let storage = state.storage();
    if let Some(bank_id) = payload.bank_id {
        storage
            .find_bank(bank_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Bank not found".to_string()))?;
    }

    let created = storage.create_user(&payload).await?;
    tracing::info!("User {} created by {}", created.id, user.id);
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(created).with_message("User created successfully")),
    ))
}

/// PUT /api/v1/users/:id
pub async fn update_user(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateUserRequest>,
) -> Result<Json<ApiResponse<User>>, AppError> {
    tracing::info!("PUT /users/{}", id);
    require_permission(&user, Permission::UpdateUser)?;

    load_managed_user(&state, &user, id).await?;
    if user.role == Role::BankManager {
        if payload.role.is_some_and(|role| role != Role::BankUser) {
            return Err(AppError::Forbidden(
                "Bank managers can only assign the bank user role".to_string(),
            ));
        }
        if payload.bank_id.is_some_and(|bank| Some(bank) != user.bank_id) {
            return Err(AppError::Forbidden(
                "Cannot move users to another bank".to_string(),
            ));
        }
    }

    let updated = state
        .storage()
        .update_user(id, &payload)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
    forget_user(&state, updated.id).await;

    Ok(Json(ApiResponse::ok(updated).with_message("User updated successfully")))
}

/// DELETE /api/v1/users/:id
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<serde_json::Value>>, AppError> {
    tracing::info!("DELETE /users/{}", id);
    require_permission(&user, Permission::DeleteUser)?;

    if id == user.id {
        return Err(AppError::BadRequest("Cannot delete your own account".to_string()));
    }
    if !state.storage().delete_user(id).await? {
        return Err(AppError::NotFound("User not found".to_string()));
    }
    forget_user(&state, id).await;

    Ok(Json(
        ApiResponse::ok(json!({ "id": id })).with_message("User deleted successfully"),
    ))
}

/// POST /api/v1/users/:id/token
///
/// Rotates the user's API token. The previous token stops working immediately.
pub async fn issue_token(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<(StatusCode, Json<ApiResponse<IssuedToken>>), AppError> {
    tracing::info!("POST /users/{}/token", id);
    require_permission(&user, Permission::UpdateUser)?;

    let target = load_managed_user(&state, &user, id).await?;
    let token = generate_token();
    if !state
        .storage()
        .set_user_token_hash(target.id, &sha256_hex(&token))
        .await?
    {
        return Err(AppError::NotFound("User not found".to_string()));
    }
    forget_user(&state, target.id).await;

    tracing::info!("API token rotated for user {} by {}", target.id, user.id);
    Ok((
        StatusCode::CREATED,
        Json(
            ApiResponse::ok(IssuedToken {
                user_id: target.id,
                token,
            })
            .with_message("Store this token now; it will not be shown again"),
        ),
    ))
}

// ============ Audit logs ============

/// GET /api/v1/audit-logs
pub async fn list_audit_logs(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Query(params): Query<AuditLogQuery>,
) -> Result<Json<PaginatedResponse<AuditLog>>, AppError> {
    tracing::info!("GET /audit-logs - params: {:?}", params);
    require_permission(&user, Permission::ViewAuditLogs)?;

    let page = params.page();
    let (logs, total) = state
        .storage()
        .list_audit_logs(params.user_id, params.resource_type.as_deref(), page)
        .await?;
    Ok(Json(PaginatedResponse::new(logs, page, total)))
}
