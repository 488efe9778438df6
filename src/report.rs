//! Credit report generation and retrieval.

use crate::consent::require_consent;
use crate::db_storage::{self, CreditStorage, NewCreditReport};
use crate::errors::{AppError, ResultExt};
use crate::models::*;
use crate::permissions::{can_access_consumer_data, require_permission, Permission};
use crate::scoring::{compute_score, ScoreResult};
use chrono::{DateTime, Duration, Utc};
use serde_json::{json, Value};
use sqlx::PgPool;
use uuid::Uuid;

/// Assembles the persisted report document.
///
/// Amounts are rendered as decimal strings so no precision is lost in JSON.
pub fn build_report_document(
    consumer: &Consumer,
    accounts: &[CreditAccount],
    score: &ScoreResult,
    generated_at: DateTime<Utc>,
) -> Value {
    let accounts: Vec<Value> = accounts
        .iter()
        .map(|acc| {
            json!({
                "id": acc.id,
                "type": acc.account_type.as_str(),
                "status": acc.account_status.as_str(),
                "payment_status": acc.payment_status.as_str(),
                "balance": acc.current_balance.to_string(),
                "credit_limit": acc.credit_limit.as_ref().map(|limit| limit.to_string()),
                "open_date": acc.open_date.to_string(),
            })
        })
        .collect();

    json!({
        "consumer": {
            "id": consumer.id,
            "name": consumer.full_name(),
            "date_of_birth": consumer.date_of_birth.to_string(),
        },
        "credit_score": score.score,
        "score_factors": score.factors,
        "accounts": accounts,
        "generated_at": generated_at.to_rfc3339(),
    })
}

/// Refuses reports on a frozen credit file.
pub fn ensure_not_frozen(consumer: &Consumer) -> Result<(), AppError> {
    if consumer.is_frozen {
        tracing::warn!(consumer_id = %consumer.id, "Report refused: credit frozen");
        return Err(AppError::Forbidden("Consumer credit is frozen".to_string()));
    }
    Ok(())
}

/// Generates, scores and stores a fresh report for `consumer_id`.
///
/// The consumer row is read and share-locked inside the snapshot transaction, so a freeze
/// either lands before the check or waits for the report to commit.
///
/// # Arguments
///
/// * `pool` - Database pool; the account snapshot is read in a REPEATABLE READ transaction.
/// * `user` - The caller; needs `generate:credit_report`.
/// * `consumer_id` - Consumer to report on.
/// * `now` - Generation instant; its date is the scoring `as_of`.
/// * `expiry_days` - Lifetime of the stored report.
///
/// # Returns
///
/// * `Result<CreditReport, AppError>` - The stored report, or 403/404 when a gate fails.
pub async fn generate_report(
    pool: &PgPool,
    user: &User,
    consumer_id: Uuid,
    now: DateTime<Utc>,
    expiry_days: i64,
) -> Result<CreditReport, AppError> {
    require_permission(user, Permission::GenerateCreditReport)?;

    let storage = CreditStorage::new(pool.clone());
    let mut tx = pool.begin().await?;
    sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ")
        .execute(&mut *tx)
        .await?;

    let consumer = db_storage::consumer_for_share(&mut *tx, consumer_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Consumer not found".to_string()))?;
    ensure_not_frozen(&consumer)?;

    if !matches!(user.role, Role::Admin | Role::Consumer) {
        require_consent(
            &storage,
            consumer.id,
            user.bank_id,
            now,
            "Consumer consent required to generate credit report",
        )
        .await?;
    }

    let accounts = db_storage::accounts_for_consumer(&mut *tx, consumer.id)
        .await
        .context("loading account snapshot")?;
    let score = compute_score(&consumer, &accounts, now.date_naive());
    let document = build_report_document(&consumer, &accounts, &score, now);
    let factors = serde_json::to_value(&score.factors)
        .map_err(|e| AppError::InternalError(format!("Failed to encode score factors: {}", e)))?;

    let report = db_storage::insert_report(
        &mut *tx,
        &NewCreditReport {
            consumer_id: consumer.id,
            credit_score: score.score,
            score_factors: &factors,
            report_data: &document,
            generated_by: user.id,
            generated_at: now,
            expires_at: now + Duration::days(expiry_days),
        },
    )
    .await?;
    tx.commit().await?;

    tracing::info!(
        report_id = %report.id,
        consumer_id = %consumer.id,
        score = report.credit_score,
        accounts = accounts.len(),
        "Credit report generated"
    );
    Ok(report)
}

/// Fetches a report the caller may see.
pub async fn get_report(
    storage: &CreditStorage,
    user: &User,
    report_id: Uuid,
) -> Result<CreditReport, AppError> {
    require_permission(user, Permission::ViewCreditReport)?;

    let report = storage
        .find_report(report_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Credit report not found".to_string()))?;
    let consumer = storage
        .find_consumer(report.consumer_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Consumer not found".to_string()))?;

    if !can_access_consumer_data(user, &consumer) {
        return Err(AppError::Forbidden(
            "Access denied to this credit report".to_string(),
        ));
    }
    Ok(report)
}

/// The calling consumer's newest unexpired report.
pub async fn own_latest_report(
    storage: &CreditStorage,
    user: &User,
    now: DateTime<Utc>,
) -> Result<CreditReport, AppError> {
    require_permission(user, Permission::ViewOwnReport)?;

    let consumer = storage
        .find_consumer_by_user(user.id)
        .await?
        .ok_or_else(|| AppError::NotFound("Consumer profile not found".to_string()))?;

    storage
        .latest_report(consumer.id, now)
        .await?
        .ok_or_else(|| AppError::NotFound("No credit report available".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::ScoreFactors;
    use bigdecimal::BigDecimal;
    use chrono::{NaiveDate, TimeZone};
    use std::str::FromStr;

    fn consumer() -> Consumer {
        let now = Utc::now();
        Consumer {
            id: Uuid::new_v4(),
            ssn_hash: "hash".to_string(),
            ssn_last4: "6789".to_string(),
            first_name: "Kaleo".to_string(),
            last_name: "Jibas".to_string(),
            middle_name: None,
            date_of_birth: NaiveDate::from_ymd_opt(1985, 3, 14).unwrap(),
            email: None,
            phone: None,
            address: None,
            city: None,
            state: None,
            zip_code: None,
            country: "Marshall Islands".to_string(),
            is_frozen: false,
            user_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn card(consumer_id: Uuid) -> CreditAccount {
        let now = Utc::now();
        CreditAccount {
            id: Uuid::new_v4(),
            consumer_id,
            bank_id: Uuid::new_v4(),
            account_number_hash: "hash".to_string(),
            account_number_last4: "1111".to_string(),
            account_type: AccountType::CreditCard,
            account_status: AccountStatus::Open,
            payment_status: PaymentStatus::Current,
            credit_limit: Some(BigDecimal::from_str("10000.00").unwrap()),
            current_balance: BigDecimal::from_str("500.00").unwrap(),
            minimum_payment: None,
            payment_due_date: None,
            open_date: NaiveDate::from_ymd_opt(2010, 1, 1).unwrap(),
            close_date: None,
            last_payment_date: None,
            last_payment_amount: None,
            notes: None,
            is_disputed: false,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_report_document_shape() {
        let consumer = consumer();
        let accounts = vec![card(consumer.id)];
        let generated_at = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let score = compute_score(&consumer, &accounts, generated_at.date_naive());

        let doc = build_report_document(&consumer, &accounts, &score, generated_at);

        assert_eq!(doc["consumer"]["name"], "Kaleo Jibas");
        assert_eq!(doc["consumer"]["date_of_birth"], "1985-03-14");
        assert_eq!(doc["credit_score"], score.score);
        assert_eq!(doc["accounts"][0]["type"], "CREDIT_CARD");
        assert_eq!(doc["accounts"][0]["payment_status"], "CURRENT");
        assert_eq!(doc["accounts"][0]["balance"], "500.00");
        assert_eq!(doc["accounts"][0]["credit_limit"], "10000.00");
        assert_eq!(doc["accounts"][0]["open_date"], "2010-01-01");
        assert_eq!(doc["generated_at"], "2024-06-01T12:00:00+00:00");
        assert_eq!(doc["score_factors"]["payment_history"], "100.0%");
    }

    #[test]
    fn test_frozen_file_is_refused() {
        assert!(ensure_not_frozen(&consumer()).is_ok());

        let frozen = Consumer {
            is_frozen: true,
            ..consumer()
        };
        let err = ensure_not_frozen(&frozen).unwrap_err();
        assert!(matches!(err, AppError::Forbidden(ref msg) if msg == "Consumer credit is frozen"));
    }

    #[test]
    fn test_report_document_without_accounts() {
        let consumer = consumer();
        let score = compute_score(&consumer, &[], NaiveDate::from_ymd_opt(2024, 6, 1).unwrap());
        let doc = build_report_document(&consumer, &[], &score, Utc::now());

        assert_eq!(doc["credit_score"], 0);
        assert_eq!(doc["accounts"].as_array().map(Vec::len), Some(0));
        assert!(matches!(score.factors, ScoreFactors::Breakdown(_)));
        assert_eq!(doc["score_factors"]["new_credit"], "No credit history");
    }
}
