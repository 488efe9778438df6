use crate::auth::{sha256_hex, AuthUser};
use crate::circuit_breaker::{create_db_circuit_breaker, DbCircuitBreaker};
use crate::config::Config;
use crate::consent;
use crate::db::ping;
use crate::db_storage::CreditStorage;
use crate::errors::AppError;
use crate::models::*;
use crate::permissions::{
    can_access_bank_data, can_access_consumer_data, permissions_for, require_permission,
    Permission,
};
use crate::rate_limit::{client_ip, RateLimiter};
use crate::report;
use crate::validation::{
    last_four, normalize_phone, require_valid_email, validate_account, validate_new_account,
    validate_new_consumer,
};
use axum::{
    extract::{FromRequestParts, Path, Query, State},
    http::{header, request::Parts, StatusCode},
    Json,
};
use chrono::Utc;
use moka::future::Cache;
use serde_json::json;
use sqlx::PgPool;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Shared application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub db: PgPool,
    /// Application configuration.
    pub config: Config,
    /// Authenticated users keyed by token digest (60 second TTL).
    pub user_cache: Cache<String, User>,
    /// Per-IP, per-path request counters.
    pub rate_limiter: RateLimiter,
    /// Guards background writes such as audit rows.
    pub db_breaker: DbCircuitBreaker,
}

impl AppState {
    pub fn new(db: PgPool, config: Config) -> Self {
        let user_cache = Cache::builder()
            .time_to_live(Duration::from_secs(60))
            .max_capacity(10_000)
            .support_invalidation_closures()
            .build();
        let rate_limiter =
            RateLimiter::new(config.rate_limit_per_minute, config.rate_limit_per_hour);

        Self {
            db,
            config,
            user_cache,
            rate_limiter,
            db_breaker: create_db_circuit_breaker(),
        }
    }

    pub fn storage(&self) -> CreditStorage {
        CreditStorage::new(self.db.clone())
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for ClientInfo
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(ClientInfo {
            ip_address: client_ip(&parts.extensions, &parts.headers),
            user_agent: parts
                .headers
                .get(header::USER_AGENT)
                .and_then(|v| v.to_str().ok())
                .map(String::from),
        })
    }
}

/// Health check endpoint.
///
/// Returns the service status, version, and database reachability.
///
/// # Returns
///
/// * `(StatusCode, Json<serde_json::Value>)` - HTTP 200 OK, or 503 when the database is down.
pub async fn health(State(state): State<Arc<AppState>>) -> (StatusCode, Json<serde_json::Value>) {
    let database_up = ping(&state.db).await;
    let status = if database_up {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (
        status,
        Json(json!({
            "status": if database_up { "healthy" } else { "degraded" },
            "service": "credit-bureau-api",
            "version": env!("CARGO_PKG_VERSION"),
            "database": if database_up { "up" } else { "down" },
        })),
    )
}

/// GET /api/v1/auth/me
///
/// Returns the authenticated caller and the permissions granted by their role.
pub async fn auth_me(AuthUser(user): AuthUser) -> Json<ApiResponse<CurrentUserResponse>> {
    let permissions = permissions_for(user.role)
        .iter()
        .map(|p| p.as_str())
        .collect();
    Json(ApiResponse::ok(CurrentUserResponse { user, permissions }))
}

// ============ Consumers ============

async fn load_consumer(storage: &CreditStorage, id: Uuid) -> Result<Consumer, AppError> {
    storage
        .find_consumer(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Consumer not found".to_string()))
}

/// POST /api/v1/consumers
///
/// Registers a consumer profile. The SSN is stored only as a fingerprint plus its last
/// four digits.
///
/// # Arguments
///
/// * `state` - The application state.
/// * `user` - The authenticated caller (any role except CONSUMER).
/// * `payload` - The consumer details.
///
/// # Returns
///
/// * `Result<(StatusCode, Json<ApiResponse<Consumer>>), AppError>` - 201 with the new consumer.
pub async fn create_consumer(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Json(payload): Json<CreateConsumerRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Consumer>>), AppError> {
    tracing::info!("POST /consumers - by user {}", user.id);

    if user.role == Role::Consumer {
        return Err(AppError::Forbidden(
            "Consumers cannot register consumer profiles".to_string(),
        ));
    }

    let (ssn, phone) = validate_new_consumer(&payload, Utc::now().date_naive())?;
    let consumer = state
        .storage()
        .create_consumer(&payload, &sha256_hex(&ssn), &last_four(&ssn), phone.as_deref())
        .await?;

    tracing::info!("Consumer {} created", consumer.id);
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(consumer).with_message("Consumer created successfully")),
    ))
}

/// GET /api/v1/consumers/:id
pub async fn get_consumer(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Consumer>>, AppError> {
    tracing::info!("GET /consumers/{}", id);

    let consumer = load_consumer(&state.storage(), id).await?;
    if !can_access_consumer_data(&user, &consumer) {
        return Err(AppError::Forbidden("Access denied".to_string()));
    }
    Ok(Json(ApiResponse::ok(consumer)))
}

/// PUT /api/v1/consumers/:id
///
/// Updates contact fields. Allowed for administrators, bank staff and the consumer.
pub async fn update_consumer(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
    Json(mut payload): Json<UpdateConsumerRequest>,
) -> Result<Json<ApiResponse<Consumer>>, AppError> {
    tracing::info!("PUT /consumers/{}", id);

    let storage = state.storage();
    let consumer = load_consumer(&storage, id).await?;
    let allowed = match user.role {
        Role::Admin | Role::BankManager | Role::BankUser => true,
        Role::Consumer => consumer.user_id == Some(user.id),
        Role::DataProvider | Role::Auditor => false,
    };
    if !allowed {
        return Err(AppError::Forbidden("Access denied".to_string()));
    }

    if let Some(email) = payload.email.as_deref() {
        require_valid_email(email)?;
    }
    payload.phone = payload.phone.as_deref().map(normalize_phone).transpose()?;

    let updated = storage
        .update_consumer(consumer.id, &payload)
        .await?
        .ok_or_else(|| AppError::NotFound("Consumer not found".to_string()))?;
    Ok(Json(ApiResponse::ok(updated).with_message("Consumer updated successfully")))
}

/// PUT /api/v1/consumers/:id/freeze
///
/// Freezes or unfreezes a consumer's credit. A frozen consumer gets no new reports.
pub async fn freeze_credit(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<FreezeRequest>,
) -> Result<Json<ApiResponse<Consumer>>, AppError> {
    tracing::info!("PUT /consumers/{}/freeze - is_frozen={}", id, payload.is_frozen);

    let storage = state.storage();
    let consumer = load_consumer(&storage, id).await?;
    match user.role {
        Role::Admin => {}
        Role::Consumer if consumer.user_id == Some(user.id) => {
            require_permission(&user, Permission::FreezeCredit)?;
        }
        _ => return Err(AppError::Forbidden("Access denied".to_string())),
    }

    let updated = storage
        .set_consumer_frozen(consumer.id, payload.is_frozen)
        .await?
        .ok_or_else(|| AppError::NotFound("Consumer not found".to_string()))?;

    let message = if updated.is_frozen {
        "Credit frozen successfully"
    } else {
        "Credit unfrozen successfully"
    };
    tracing::info!("Consumer {} is_frozen={}", updated.id, updated.is_frozen);
    Ok(Json(ApiResponse::ok(updated).with_message(message)))
}

/// GET /api/v1/consumers/me/credit-report
pub async fn get_own_credit_report(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> Result<Json<ApiResponse<CreditReport>>, AppError> {
    tracing::info!("GET /consumers/me/credit-report - user {}", user.id);
    let report = report::own_latest_report(&state.storage(), &user, Utc::now()).await?;
    Ok(Json(ApiResponse::ok(report)))
}

// ============ Consents ============

/// GET /api/v1/consumers/:id/consents
pub async fn list_consents(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(consumer_id): Path<Uuid>,
) -> Result<Json<ApiResponse<Vec<Consent>>>, AppError> {
    tracing::info!("GET /consumers/{}/consents", consumer_id);
    let consents = consent::list_consents(&state.storage(), &user, consumer_id).await?;
    Ok(Json(ApiResponse::ok(consents)))
}

/// POST /api/v1/consumers/:id/consents
pub async fn grant_consent(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    client: ClientInfo,
    Path(consumer_id): Path<Uuid>,
    Json(payload): Json<GrantConsentRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Consent>>), AppError> {
    tracing::info!("POST /consumers/{}/consents - {:?}", consumer_id, payload.consent_type);
    let granted = consent::grant_consent(
        &state.storage(),
        &user,
        consumer_id,
        &payload,
        &client,
        Utc::now(),
    )
    .await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(granted).with_message("Consent granted successfully")),
    ))
}

/// POST /api/v1/consents/:id/revoke
pub async fn revoke_consent(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Consent>>, AppError> {
    tracing::info!("POST /consents/{}/revoke", id);
    let revoked = consent::revoke_consent(&state.storage(), &user, id, Utc::now()).await?;
    Ok(Json(ApiResponse::ok(revoked).with_message("Consent revoked successfully")))
}

// ============ Credit data ============

/// POST /api/v1/credit-data
///
/// Submits a credit account on behalf of the caller's bank.
///
/// # Arguments
///
/// * `state` - The application state.
/// * `user` - The caller; needs `submit:credit_data`.
/// * `payload` - Account details. Administrators must name `bank_id`.
///
/// # Returns
///
/// * `Result<(StatusCode, Json<ApiResponse<CreditAccount>>), AppError>` - 201 with the stored account.
pub async fn submit_credit_data(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Json(payload): Json<SubmitCreditAccountRequest>,
) -> Result<(StatusCode, Json<ApiResponse<CreditAccount>>), AppError> {
    tracing::info!("POST /credit-data - consumer {}", payload.consumer_id);
    require_permission(&user, Permission::SubmitCreditData)?;

    let bank_id = match (user.bank_id, payload.bank_id) {
        (Some(own), Some(requested)) if own != requested => {
            return Err(AppError::Forbidden(
                "Cannot submit data for this bank".to_string(),
            ))
        }
        (Some(own), _) => own,
        (None, Some(requested)) if user.role == Role::Admin => requested,
        (None, _) => {
            return Err(AppError::BadRequest(
                "bank_id is required to submit credit data".to_string(),
            ))
        }
    };
    if user.role.is_bank_scoped() && !can_access_bank_data(&user, bank_id) {
        return Err(AppError::Forbidden(
            "Cannot submit data for this bank".to_string(),
        ));
    }

    validate_new_account(&payload, Utc::now().date_naive())?;

    let storage = state.storage();
    load_consumer(&storage, payload.consumer_id).await?;
    storage
        .find_bank(bank_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Bank not found".to_string()))?;

    let account_number = payload.account_number.trim();
    let account = storage
        .insert_credit_account(
            &payload,
            bank_id,
            &sha256_hex(account_number),
            &last_four(account_number),
        )
        .await?;

    tracing::info!("Credit account {} submitted by bank {}", account.id, bank_id);
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(account).with_message("Credit data submitted successfully")),
    ))
}

/// GET /api/v1/credit-data
pub async fn list_credit_data(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Query(params): Query<ConsumerFilterQuery>,
) -> Result<Json<PaginatedResponse<CreditAccount>>, AppError> {
    tracing::info!("GET /credit-data - params: {:?}", params);
    require_permission(&user, Permission::ViewCreditReport)?;

    let page = params.page();
    let bank_filter = if user.role != Role::Admin {
        user.bank_id
    } else {
        None
    };
    let (accounts, total) = state
        .storage()
        .list_credit_accounts(params.consumer_id, bank_filter, page)
        .await?;
    Ok(Json(PaginatedResponse::new(accounts, page, total)))
}

/// Applies the fields present in `update` to `account`.
pub fn merge_account_update(account: &mut CreditAccount, update: UpdateCreditAccountRequest) {
    if let Some(status) = update.account_status {
        account.account_status = status;
    }
    if let Some(status) = update.payment_status {
        account.payment_status = status;
    }
    if update.credit_limit.is_some() {
        account.credit_limit = update.credit_limit;
    }
    if let Some(balance) = update.current_balance {
        account.current_balance = balance;
    }
    if update.minimum_payment.is_some() {
        account.minimum_payment = update.minimum_payment;
    }
    if update.payment_due_date.is_some() {
        account.payment_due_date = update.payment_due_date;
    }
    if update.close_date.is_some() {
        account.close_date = update.close_date;
    }
    if update.last_payment_date.is_some() {
        account.last_payment_date = update.last_payment_date;
    }
    if update.last_payment_amount.is_some() {
        account.last_payment_amount = update.last_payment_amount;
    }
    if update.notes.is_some() {
        account.notes = update.notes;
    }
}

/// PUT /api/v1/credit-data/:id
pub async fn update_credit_data(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateCreditAccountRequest>,
) -> Result<Json<ApiResponse<CreditAccount>>, AppError> {
    tracing::info!("PUT /credit-data/{}", id);
    require_permission(&user, Permission::UpdateCreditData)?;

    let storage = state.storage();
    let mut account = storage
        .find_credit_account(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Credit account not found".to_string()))?;

    if !can_access_bank_data(&user, account.bank_id) {
        return Err(AppError::Forbidden(
            "Cannot update data for this bank".to_string(),
        ));
    }

    merge_account_update(&mut account, payload);
    validate_account(&account, Utc::now().date_naive())?;

    let saved = storage.save_credit_account(&account).await?;
    Ok(Json(ApiResponse::ok(saved).with_message("Credit data updated successfully")))
}

/// DELETE /api/v1/credit-data/:id
pub async fn delete_credit_data(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<serde_json::Value>>, AppError> {
    tracing::info!("DELETE /credit-data/{}", id);
    require_permission(&user, Permission::DeleteCreditData)?;

    if !state.storage().delete_credit_account(id).await? {
        return Err(AppError::NotFound("Credit account not found".to_string()));
    }
    Ok(Json(
        ApiResponse::ok(json!({ "id": id })).with_message("Credit account deleted successfully"),
    ))
}

// ============ Credit reports ============

/// POST /api/v1/credit-reports
///
/// Generates a report for a consumer: freeze and consent gates, account snapshot,
/// scoring, and persistence with an expiry.
pub async fn generate_credit_report(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Json(payload): Json<GenerateReportRequest>,
) -> Result<(StatusCode, Json<ApiResponse<CreditReport>>), AppError> {
    tracing::info!("POST /credit-reports - consumer {}", payload.consumer_id);

    let generated = report::generate_report(
        &state.db,
        &user,
        payload.consumer_id,
        Utc::now(),
        state.config.report_expiry_days,
    )
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(generated).with_message("Credit report generated successfully")),
    ))
}

/// GET /api/v1/credit-reports/:id
pub async fn get_credit_report(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<CreditReport>>, AppError> {
    tracing::info!("GET /credit-reports/{}", id);
    let found = report::get_report(&state.storage(), &user, id).await?;
    Ok(Json(ApiResponse::ok(found)))
}

// ============ Inquiries ============

/// POST /api/v1/inquiries
pub async fn create_inquiry(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    client: ClientInfo,
    Json(payload): Json<CreateInquiryRequest>,
) -> Result<(StatusCode, Json<ApiResponse<CreditInquiry>>), AppError> {
    tracing::info!("POST /inquiries - consumer {}", payload.consumer_id);
    let inquiry =
        consent::create_inquiry(&state.storage(), &user, &payload, &client, Utc::now()).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(inquiry).with_message("Credit inquiry created successfully")),
    ))
}

/// GET /api/v1/inquiries
pub async fn list_inquiries(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Query(params): Query<ConsumerFilterQuery>,
) -> Result<Json<PaginatedResponse<CreditInquiry>>, AppError> {
    tracing::info!("GET /inquiries - params: {:?}", params);
    let page = params.page();
    let (inquiries, total) =
        consent::list_inquiries(&state.storage(), &user, params.consumer_id, page).await?;
    Ok(Json(PaginatedResponse::new(inquiries, page, total)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bigdecimal::BigDecimal;
    use chrono::NaiveDate;
    use std::str::FromStr;

    fn account() -> CreditAccount {
        let now = Utc::now();
        CreditAccount {
            id: Uuid::new_v4(),
            consumer_id: Uuid::new_v4(),
            bank_id: Uuid::new_v4(),
            account_number_hash: String::new(),
            account_number_last4: "4321".to_string(),
            account_type: AccountType::AutoLoan,
            account_status: AccountStatus::Open,
            payment_status: PaymentStatus::Current,
            credit_limit: None,
            current_balance: BigDecimal::from_str("12000.00").unwrap(),
            minimum_payment: None,
            payment_due_date: None,
            open_date: NaiveDate::from_ymd_opt(2021, 5, 1).unwrap(),
            close_date: None,
            last_payment_date: None,
            last_payment_amount: None,
            notes: Some("original".to_string()),
            is_disputed: false,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_merge_account_update_only_touches_present_fields() {
        let mut acc = account();
        merge_account_update(
            &mut acc,
            UpdateCreditAccountRequest {
                payment_status: Some(PaymentStatus::Late30),
                current_balance: Some(BigDecimal::from_str("11500.00").unwrap()),
                ..Default::default()
            },
        );

        assert_eq!(acc.payment_status, PaymentStatus::Late30);
        assert_eq!(acc.current_balance, BigDecimal::from_str("11500.00").unwrap());
        assert_eq!(acc.account_status, AccountStatus::Open);
        assert_eq!(acc.notes.as_deref(), Some("original"));
    }

    #[test]
    fn test_merged_close_before_open_fails_validation() {
        let mut acc = account();
        merge_account_update(
            &mut acc,
            UpdateCreditAccountRequest {
                account_status: Some(AccountStatus::Closed),
                close_date: NaiveDate::from_ymd_opt(2020, 1, 1),
                ..Default::default()
            },
        );
        assert!(validate_account(&acc, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()).is_err());
    }
}
