//! Consent and inquiry ledger.
//!
//! A consent is a consumer's grant allowing one bank to pull their credit report. Report
//! generation and inquiry creation both consult it through [`find_effective_consent`].

use crate::db_storage::CreditStorage;
use crate::errors::AppError;
use crate::models::*;
use crate::permissions::{require_permission, Permission};
use chrono::{DateTime, Utc};
use uuid::Uuid;

impl Consent {
    /// GRANTED, issued to `bank_id`, and not past its expiry at `now`.
    pub fn is_effective_for(&self, bank_id: Uuid, now: DateTime<Utc>) -> bool {
        self.status == ConsentStatus::Granted
            && self.bank_id == Some(bank_id)
            && self.expires_at.map_or(true, |expires| expires > now)
    }
}

/// First consent in `consents` effective for the bank at `now`.
pub fn first_effective(consents: &[Consent], bank_id: Uuid, now: DateTime<Utc>) -> Option<&Consent> {
    consents.iter().find(|c| {
        c.consent_type == ConsentType::CreditReport && c.is_effective_for(bank_id, now)
    })
}

/// Looks up an effective CREDIT_REPORT consent for (consumer, bank).
pub async fn find_effective_consent(
    storage: &CreditStorage,
    consumer_id: Uuid,
    bank_id: Uuid,
    now: DateTime<Utc>,
) -> Result<Option<Consent>, AppError> {
    let candidates = storage
        .granted_credit_report_consents(consumer_id, bank_id)
        .await?;
    Ok(first_effective(&candidates, bank_id, now).cloned())
}

/// Fails with 403 `message` unless the caller's bank holds an effective consent.
pub async fn require_consent(
    storage: &CreditStorage,
    consumer_id: Uuid,
    bank_id: Option<Uuid>,
    now: DateTime<Utc>,
    message: &str,
) -> Result<Consent, AppError> {
    let found = match bank_id {
        Some(bank_id) => find_effective_consent(storage, consumer_id, bank_id, now).await?,
        None => None,
    };

    found.ok_or_else(|| {
        tracing::warn!(
            consumer_id = %consumer_id,
            bank_id = ?bank_id,
            "Missing consumer consent"
        );
        AppError::Forbidden(message.to_string())
    })
}

/// Administrators, or the consumer who owns the record and may manage consent.
pub fn can_manage_consents(user: &User, consumer: &Consumer) -> bool {
    match user.role {
        Role::Admin => true,
        Role::Consumer => consumer.user_id == Some(user.id),
        _ => false,
    }
}

async fn load_consumer(storage: &CreditStorage, consumer_id: Uuid) -> Result<Consumer, AppError> {
    storage
        .find_consumer(consumer_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Consumer not found".to_string()))
}

fn ensure_can_manage(user: &User, consumer: &Consumer) -> Result<(), AppError> {
    if user.role == Role::Consumer {
        require_permission(user, Permission::ManageConsent)?;
    }
    if can_manage_consents(user, consumer) {
        Ok(())
    } else {
        Err(AppError::Forbidden(
            "Not authorized to manage consents for this consumer".to_string(),
        ))
    }
}

pub async fn grant_consent(
    storage: &CreditStorage,
    user: &User,
    consumer_id: Uuid,
    req: &GrantConsentRequest,
    client: &ClientInfo,
    now: DateTime<Utc>,
) -> Result<Consent, AppError> {
    let consumer = load_consumer(storage, consumer_id).await?;
    ensure_can_manage(user, &consumer)?;

    if req.consent_type == ConsentType::CreditReport && req.bank_id.is_none() {
        return Err(AppError::BadRequest(
            "bank_id is required for credit report consent".to_string(),
        ));
    }
    if matches!(req.expires_at, Some(expires) if expires <= now) {
        return Err(AppError::BadRequest(
            "expires_at must be in the future".to_string(),
        ));
    }

    let consent = storage
        .insert_consent(
            consumer.id,
            req,
            client.ip_address.as_deref(),
            client.user_agent.as_deref(),
        )
        .await?;

    tracing::info!(
        consent_id = %consent.id,
        consumer_id = %consumer.id,
        bank_id = ?consent.bank_id,
        "Consent granted"
    );
    Ok(consent)
}

pub async fn revoke_consent(
    storage: &CreditStorage,
    user: &User,
    consent_id: Uuid,
    now: DateTime<Utc>,
) -> Result<Consent, AppError> {
    let consent = storage
        .find_consent(consent_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Consent not found".to_string()))?;
    let consumer = load_consumer(storage, consent.consumer_id).await?;
    ensure_can_manage(user, &consumer)?;

    if consent.status != ConsentStatus::Granted {
        return Err(AppError::BadRequest(
            "Only granted consents can be revoked".to_string(),
        ));
    }

    let revoked = storage.revoke_consent(consent.id, now).await?;
    tracing::info!(consent_id = %revoked.id, "Consent revoked");
    Ok(revoked)
}

/// Consents visible to the caller. Bank staff only see consents issued to their bank.
pub async fn list_consents(
    storage: &CreditStorage,
    user: &User,
    consumer_id: Uuid,
) -> Result<Vec<Consent>, AppError> {
    let consumer = load_consumer(storage, consumer_id).await?;
    let consents = storage.list_consents(consumer.id).await?;

    match user.role {
        Role::Admin | Role::Auditor => Ok(consents),
        Role::Consumer if consumer.user_id == Some(user.id) => Ok(consents),
        Role::BankManager | Role::BankUser => Ok(consents
            .into_iter()
            .filter(|c| c.bank_id.is_some() && c.bank_id == user.bank_id)
            .collect()),
        Role::Consumer | Role::DataProvider => Err(AppError::Forbidden(
            "Not authorized to view consents for this consumer".to_string(),
        )),
    }
}

/// Records a consented credit check by the caller's bank.
pub async fn create_inquiry(
    storage: &CreditStorage,
    user: &User,
    req: &CreateInquiryRequest,
    client: &ClientInfo,
    now: DateTime<Utc>,
) -> Result<CreditInquiry, AppError> {
    require_permission(user, Permission::GenerateCreditReport)?;
    let bank_id = match (user.role.is_bank_scoped(), user.bank_id) {
        (true, Some(bank_id)) => bank_id,
        _ => {
            return Err(AppError::Forbidden(
                "Credit inquiries must be made by bank staff".to_string(),
            ))
        }
    };

    let consumer = load_consumer(storage, req.consumer_id).await?;
    require_consent(
        storage,
        consumer.id,
        Some(bank_id),
        now,
        "Consumer consent required for credit inquiry",
    )
    .await?;

    let inquiry = storage
        .insert_inquiry(
            req,
            bank_id,
            user.id,
            now,
            client.ip_address.as_deref(),
            client.user_agent.as_deref(),
        )
        .await?;

    tracing::info!(
        inquiry_id = %inquiry.id,
        consumer_id = %consumer.id,
        bank_id = %bank_id,
        "Credit inquiry recorded"
    );
    Ok(inquiry)
}

/// Inquiries visible to the caller, newest first.
pub async fn list_inquiries(
    storage: &CreditStorage,
    user: &User,
    consumer_id: Option<Uuid>,
    page: Page,
) -> Result<(Vec<CreditInquiry>, i64), AppError> {
    let (consumer_filter, bank_filter) = match user.role {
        Role::Admin | Role::Auditor => (consumer_id, None),
        Role::BankManager | Role::BankUser => (consumer_id, user.bank_id),
        Role::Consumer => {
            let own = storage
                .find_consumer_by_user(user.id)
                .await?
                .ok_or_else(|| AppError::NotFound("Consumer profile not found".to_string()))?;
            if consumer_id.is_some_and(|requested| requested != own.id) {
                return Err(AppError::Forbidden(
                    "Not authorized to view these inquiries".to_string(),
                ));
            }
            (Some(own.id), None)
        }
        Role::DataProvider => {
            return Err(AppError::Forbidden(
                "Not authorized to view inquiries".to_string(),
            ))
        }
    };

    storage
        .list_inquiries(consumer_filter, bank_filter, page)
        .await
}
