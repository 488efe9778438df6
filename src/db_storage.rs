use crate::errors::{AppError, ResultExt};
use crate::models::*;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

/// Postgres access for every credit-bureau table.
///
/// List queries take optional filters bound as `($n IS NULL OR column = $n)` so each
/// statement stays static.
pub struct CreditStorage {
    pool: PgPool,
}

impl CreditStorage {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // ============ Users ============

    pub async fn find_user_by_token_hash(&self, token_hash: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE api_token_hash = $1")
            .bind(token_hash)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    pub async fn touch_user(&self, user_id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE users SET last_seen_at = now() WHERE id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn find_user(&self, id: Uuid) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE lower(email) = lower($1)")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    pub async fn list_users(
        &self,
        bank_id: Option<Uuid>,
        page: Page,
    ) -> Result<(Vec<User>, i64), AppError> {
        let users = sqlx::query_as::<_, User>(
            "SELECT * FROM users WHERE ($1::uuid IS NULL OR bank_id = $1)
             ORDER BY created_at DESC OFFSET $2 LIMIT $3",
        )
        .bind(bank_id)
        .bind(page.skip)
        .bind(page.limit)
        .fetch_all(&self.pool)
        .await
        .context("listing users")?;

        let total = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM users WHERE ($1::uuid IS NULL OR bank_id = $1)",
        )
        .bind(bank_id)
        .fetch_one(&self.pool)
        .await?;

        Ok((users, total))
    }

    pub async fn create_user(&self, req: &CreateUserRequest) -> Result<User, AppError> {
        sqlx::query_as::<_, User>(
            "INSERT INTO users (email, full_name, role, bank_id)
             VALUES ($1, $2, $3, $4) RETURNING *",
        )
        .bind(req.email.trim().to_lowercase())
        .bind(req.full_name.trim())
        .bind(req.role)
        .bind(req.bank_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::from_unique_violation(e, "Email already registered"))
    }

    pub async fn update_user(&self, id: Uuid, req: &UpdateUserRequest) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(
            "UPDATE users SET
                full_name = COALESCE($2, full_name),
                role = COALESCE($3, role),
                bank_id = COALESCE($4, bank_id),
                is_active = COALESCE($5, is_active),
                updated_at = now()
             WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(req.full_name.as_deref())
        .bind(req.role)
        .bind(req.bank_id)
        .bind(req.is_active)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    /// Returns false when the user does not exist.
    pub async fn delete_user(&self, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| match &e {
                sqlx::Error::Database(db) if db.is_foreign_key_violation() => AppError::BadRequest(
                    "User is referenced by credit records and cannot be deleted; deactivate it instead"
                        .to_string(),
                ),
                _ => AppError::DatabaseError(e),
            })?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn set_user_token_hash(&self, id: Uuid, token_hash: &str) -> Result<bool, AppError> {
        let result = sqlx::query(
            "UPDATE users SET api_token_hash = $2, updated_at = now() WHERE id = $1",
        )
        .bind(id)
        .bind(token_hash)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    // ============ Banks ============

    pub async fn list_banks(&self, page: Page) -> Result<(Vec<Bank>, i64), AppError> {
        let banks = sqlx::query_as::<_, Bank>(
            "SELECT * FROM banks ORDER BY name ASC OFFSET $1 LIMIT $2",
        )
        .bind(page.skip)
        .bind(page.limit)
        .fetch_all(&self.pool)
        .await?;
        let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM banks")
            .fetch_one(&self.pool)
            .await?;
        Ok((banks, total))
    }

    pub async fn find_bank(&self, id: Uuid) -> Result<Option<Bank>, AppError> {
        let bank = sqlx::query_as::<_, Bank>("SELECT * FROM banks WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(bank)
    }

    pub async fn create_bank(&self, req: &CreateBankRequest, api_key_hash: &str) -> Result<Bank, AppError> {
        sqlx::query_as::<_, Bank>(
            "INSERT INTO banks (name, license_number, tax_id, contact_email, contact_phone, address, api_key_hash)
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING *",
        )
        .bind(req.name.trim())
        .bind(req.license_number.trim())
        .bind(req.tax_id.as_deref())
        .bind(&req.contact_email)
        .bind(req.contact_phone.as_deref())
        .bind(req.address.as_deref())
        .bind(api_key_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            AppError::from_unique_violation(e, "Bank with this license number or tax id already exists")
        })
    }

    pub async fn update_bank(&self, id: Uuid, req: &UpdateBankRequest) -> Result<Option<Bank>, AppError> {
        let bank = sqlx::query_as::<_, Bank>(
            "UPDATE banks SET
                name = COALESCE($2, name),
                contact_email = COALESCE($3, contact_email),
                contact_phone = COALESCE($4, contact_phone),
                address = COALESCE($5, address),
                is_active = COALESCE($6, is_active),
                updated_at = now()
             WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(req.name.as_deref())
        .bind(req.contact_email.as_deref())
        .bind(req.contact_phone.as_deref())
        .bind(req.address.as_deref())
        .bind(req.is_active)
        .fetch_optional(&self.pool)
        .await?;
        Ok(bank)
    }

    /// Approval stamps `approved_at`/`approved_by`; rejection clears them.
    pub async fn set_bank_approval(
        &self,
        id: Uuid,
        approved: bool,
        approver: Uuid,
    ) -> Result<Option<Bank>, AppError> {
        let bank = sqlx::query_as::<_, Bank>(
            "UPDATE banks SET
                is_approved = $2,
                approved_at = CASE WHEN $2 THEN now() ELSE NULL END,
                approved_by = CASE WHEN $2 THEN $3 ELSE NULL END,
                updated_at = now()
             WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(approved)
        .bind(approver)
        .fetch_optional(&self.pool)
        .await?;
        Ok(bank)
    }

    // ============ Consumers ============

    pub async fn create_consumer(
        &self,
        req: &CreateConsumerRequest,
        ssn_hash: &str,
        ssn_last4: &str,
        phone: Option<&str>,
    ) -> Result<Consumer, AppError> {
        sqlx::query_as::<_, Consumer>(
            "INSERT INTO consumers (
                ssn_hash, ssn_last4, first_name, last_name, middle_name, date_of_birth,
                email, phone, address, city, state, zip_code, country, user_id
             ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, COALESCE($13, 'Marshall Islands'), $14)
             RETURNING *",
        )
        .bind(ssn_hash)
        .bind(ssn_last4)
        .bind(req.first_name.trim())
        .bind(req.last_name.trim())
        .bind(req.middle_name.as_deref())
        .bind(req.date_of_birth)
        .bind(req.email.as_deref())
        .bind(phone)
        .bind(req.address.as_deref())
        .bind(req.city.as_deref())
        .bind(req.state.as_deref())
        .bind(req.zip_code.as_deref())
        .bind(req.country.as_deref())
        .bind(req.user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::from_unique_violation(e, "Consumer with this SSN already exists"))
    }

    pub async fn find_consumer(&self, id: Uuid) -> Result<Option<Consumer>, AppError> {
        let consumer = sqlx::query_as::<_, Consumer>("SELECT * FROM consumers WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(consumer)
    }

    pub async fn find_consumer_by_user(&self, user_id: Uuid) -> Result<Option<Consumer>, AppError> {
        let consumer = sqlx::query_as::<_, Consumer>("SELECT * FROM consumers WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(consumer)
    }

    /// `req.phone` must already be normalised.
    pub async fn update_consumer(
        &self,
        id: Uuid,
        req: &UpdateConsumerRequest,
    ) -> Result<Option<Consumer>, AppError> {
        sqlx::query_as::<_, Consumer>(
            "UPDATE consumers SET
                email = COALESCE($2, email),
                phone = COALESCE($3, phone),
                address = COALESCE($4, address),
                city = COALESCE($5, city),
                state = COALESCE($6, state),
                zip_code = COALESCE($7, zip_code),
                updated_at = now()
             WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(req.email.as_deref())
        .bind(req.phone.as_deref())
        .bind(req.address.as_deref())
        .bind(req.city.as_deref())
        .bind(req.state.as_deref())
        .bind(req.zip_code.as_deref())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::from_unique_violation(e, "Email already in use by another consumer"))
    }

    pub async fn set_consumer_frozen(&self, id: Uuid, frozen: bool) -> Result<Option<Consumer>, AppError> {
        let consumer = sqlx::query_as::<_, Consumer>(
            "UPDATE consumers SET is_frozen = $2, updated_at = now() WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(frozen)
        .fetch_optional(&self.pool)
        .await?;
        Ok(consumer)
    }

    // ============ Credit accounts ============

    pub async fn insert_credit_account(
        &self,
        req: &SubmitCreditAccountRequest,
        bank_id: Uuid,
        account_number_hash: &str,
        account_number_last4: &str,
    ) -> Result<CreditAccount, AppError> {
        sqlx::query_as::<_, CreditAccount>(
            "INSERT INTO credit_accounts (
                consumer_id, bank_id, account_number_hash, account_number_last4,
                account_type, account_status, payment_status, credit_limit, current_balance,
                minimum_payment, payment_due_date, open_date, close_date, last_payment_date,
                last_payment_amount, notes
             ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
             RETURNING *",
        )
        .bind(req.consumer_id)
        .bind(bank_id)
        .bind(account_number_hash)
        .bind(account_number_last4)
        .bind(req.account_type)
        .bind(req.account_status)
        .bind(req.payment_status)
        .bind(&req.credit_limit)
        .bind(&req.current_balance)
        .bind(&req.minimum_payment)
        .bind(req.payment_due_date)
        .bind(req.open_date)
        .bind(req.close_date)
        .bind(req.last_payment_date)
        .bind(&req.last_payment_amount)
        .bind(req.notes.as_deref())
        .fetch_one(&self.pool)
        .await
        .context("inserting credit account")
    }

    pub async fn list_credit_accounts(
        &self,
        consumer_id: Option<Uuid>,
        bank_id: Option<Uuid>,
        page: Page,
    ) -> Result<(Vec<CreditAccount>, i64), AppError> {
        let accounts = sqlx::query_as::<_, CreditAccount>(
            "SELECT * FROM credit_accounts
             WHERE ($1::uuid IS NULL OR consumer_id = $1) AND ($2::uuid IS NULL OR bank_id = $2)
             ORDER BY created_at DESC OFFSET $3 LIMIT $4",
        )
        .bind(consumer_id)
        .bind(bank_id)
        .bind(page.skip)
        .bind(page.limit)
        .fetch_all(&self.pool)
        .await?;

        let total = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM credit_accounts
             WHERE ($1::uuid IS NULL OR consumer_id = $1) AND ($2::uuid IS NULL OR bank_id = $2)",
        )
        .bind(consumer_id)
        .bind(bank_id)
        .fetch_one(&self.pool)
        .await?;

        Ok((accounts, total))
    }

    pub async fn find_credit_account(&self, id: Uuid) -> Result<Option<CreditAccount>, AppError> {
        let account = sqlx::query_as::<_, CreditAccount>("SELECT * FROM credit_accounts WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(account)
    }

    /// Persists the mutable fields of an already merged and validated account.
    pub async fn save_credit_account(&self, account: &CreditAccount) -> Result<CreditAccount, AppError> {
        sqlx::query_as::<_, CreditAccount>(
            "UPDATE credit_accounts SET
                account_status = $2, payment_status = $3, credit_limit = $4, current_balance = $5,
                minimum_payment = $6, payment_due_date = $7, close_date = $8,
                last_payment_date = $9, last_payment_amount = $10, notes = $11, updated_at = now()
             WHERE id = $1 RETURNING *",
        )
        .bind(account.id)
        .bind(account.account_status)
        .bind(account.payment_status)
        .bind(&account.credit_limit)
        .bind(&account.current_balance)
        .bind(&account.minimum_payment)
        .bind(account.payment_due_date)
        .bind(account.close_date)
        .bind(account.last_payment_date)
        .bind(&account.last_payment_amount)
        .bind(account.notes.as_deref())
        .fetch_one(&self.pool)
        .await
        .context("updating credit account")
    }

    pub async fn delete_credit_account(&self, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM credit_accounts WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| match &e {
                sqlx::Error::Database(db) if db.is_foreign_key_violation() => AppError::BadRequest(
                    "Credit account is referenced by a dispute and cannot be deleted".to_string(),
                ),
                _ => AppError::DatabaseError(e),
            })?;
        Ok(result.rows_affected() > 0)
    }

    // ============ Credit reports ============

    pub async fn find_report(&self, id: Uuid) -> Result<Option<CreditReport>, AppError> {
        let report = sqlx::query_as::<_, CreditReport>("SELECT * FROM credit_reports WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(report)
    }

    /// Newest report for the consumer that has not expired at `now`.
    pub async fn latest_report(
        &self,
        consumer_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<CreditReport>, AppError> {
        let report = sqlx::query_as::<_, CreditReport>(
            "SELECT * FROM credit_reports
             WHERE consumer_id = $1 AND (expires_at IS NULL OR expires_at > $2)
             ORDER BY generated_at DESC LIMIT 1",
        )
        .bind(consumer_id)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;
        Ok(report)
    }

    /// Deletes reports that expired before `cutoff`, detaching inquiries that point at them.
    pub async fn purge_expired_reports(&self, cutoff: DateTime<Utc>) -> Result<u64, AppError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "UPDATE credit_inquiries SET credit_report_id = NULL
             WHERE credit_report_id IN (SELECT id FROM credit_reports WHERE expires_at < $1)",
        )
        .bind(cutoff)
        .execute(&mut *tx)
        .await?;

        let result = sqlx::query("DELETE FROM credit_reports WHERE expires_at < $1")
            .bind(cutoff)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(result.rows_affected())
    }

    // ============ Consents ============

    pub async fn insert_consent(
        &self,
        consumer_id: Uuid,
        req: &GrantConsentRequest,
        ip_address: Option<&str>,
        user_agent: Option<&str>,
    ) -> Result<Consent, AppError> {
        sqlx::query_as::<_, Consent>(
            "INSERT INTO consents (consumer_id, consent_type, bank_id, purpose, expires_at, ip_address, user_agent)
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING *",
        )
        .bind(consumer_id)
        .bind(req.consent_type)
        .bind(req.bank_id)
        .bind(req.purpose.as_deref())
        .bind(req.expires_at)
        .bind(ip_address)
        .bind(user_agent)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
                AppError::BadRequest("Unknown bank for consent".to_string())
            }
            _ => AppError::DatabaseError(e),
        })
    }

    pub async fn find_consent(&self, id: Uuid) -> Result<Option<Consent>, AppError> {
        let consent = sqlx::query_as::<_, Consent>("SELECT * FROM consents WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(consent)
    }

    /// Revokes a consent that is still GRANTED; a consent revoked in the meantime is a 400.
    pub async fn revoke_consent(&self, id: Uuid, now: DateTime<Utc>) -> Result<Consent, AppError> {
        sqlx::query_as::<_, Consent>(
            "UPDATE consents SET status = 'REVOKED', revoked_at = $2
             WHERE id = $1 AND status = 'GRANTED' RETURNING *",
        )
        .bind(id)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .context("revoking consent")?
        .ok_or_else(|| AppError::BadRequest("Only granted consents can be revoked".to_string()))
    }

    pub async fn list_consents(&self, consumer_id: Uuid) -> Result<Vec<Consent>, AppError> {
        let consents = sqlx::query_as::<_, Consent>(
            "SELECT * FROM consents WHERE consumer_id = $1 ORDER BY granted_at DESC",
        )
        .bind(consumer_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(consents)
    }

    /// Candidate CREDIT_REPORT consents for a bank; callers confirm with
    /// `Consent::is_effective_for`.
    pub async fn granted_credit_report_consents(
        &self,
        consumer_id: Uuid,
        bank_id: Uuid,
    ) -> Result<Vec<Consent>, AppError> {
        let consents = sqlx::query_as::<_, Consent>(
            "SELECT * FROM consents
             WHERE consumer_id = $1 AND bank_id = $2
               AND consent_type = 'CREDIT_REPORT' AND status = 'GRANTED'
             ORDER BY granted_at DESC",
        )
        .bind(consumer_id)
        .bind(bank_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(consents)
    }

    // ============ Inquiries ============

    pub async fn insert_inquiry(
        &self,
        req: &CreateInquiryRequest,
        bank_id: Uuid,
        requested_by: Uuid,
        verified_at: DateTime<Utc>,
        ip_address: Option<&str>,
        user_agent: Option<&str>,
    ) -> Result<CreditInquiry, AppError> {
        sqlx::query_as::<_, CreditInquiry>(
            "INSERT INTO credit_inquiries (
                consumer_id, bank_id, requested_by, purpose, purpose_description,
                consent_given, consent_verified_at, status, ip_address, user_agent
             ) VALUES ($1, $2, $3, $4, $5, TRUE, $6, 'APPROVED', $7, $8)
             RETURNING *",
        )
        .bind(req.consumer_id)
        .bind(bank_id)
        .bind(requested_by)
        .bind(req.purpose)
        .bind(req.purpose_description.as_deref())
        .bind(verified_at)
        .bind(ip_address)
        .bind(user_agent)
        .fetch_one(&self.pool)
        .await
        .context("inserting credit inquiry")
    }

    pub async fn list_inquiries(
        &self,
        consumer_id: Option<Uuid>,
        bank_id: Option<Uuid>,
        page: Page,
    ) -> Result<(Vec<CreditInquiry>, i64), AppError> {
        let inquiries = sqlx::query_as::<_, CreditInquiry>(
            "SELECT * FROM credit_inquiries
             WHERE ($1::uuid IS NULL OR consumer_id = $1) AND ($2::uuid IS NULL OR bank_id = $2)
             ORDER BY created_at DESC OFFSET $3 LIMIT $4",
        )
        .bind(consumer_id)
        .bind(bank_id)
        .bind(page.skip)
        .bind(page.limit)
        .fetch_all(&self.pool)
        .await?;

        let total = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM credit_inquiries
             WHERE ($1::uuid IS NULL OR consumer_id = $1) AND ($2::uuid IS NULL OR bank_id = $2)",
        )
        .bind(consumer_id)
        .bind(bank_id)
        .fetch_one(&self.pool)
        .await?;

        Ok((inquiries, total))
    }

    // ============ Disputes ============

    /// Stores the dispute and flags the referenced account in one transaction.
    pub async fn insert_dispute(
        &self,
        req: &CreateDisputeRequest,
        submitted_by: Uuid,
    ) -> Result<Dispute, AppError> {
        let mut tx = self.pool.begin().await?;

        let dispute = sqlx::query_as::<_, Dispute>(
            "INSERT INTO disputes (consumer_id, credit_account_id, reason, description, submitted_by)
             VALUES ($1, $2, $3, $4, $5) RETURNING *",
        )
        .bind(req.consumer_id)
        .bind(req.credit_account_id)
        .bind(req.reason)
        .bind(req.description.trim())
        .bind(submitted_by)
        .fetch_one(&mut *tx)
        .await?;

        if let Some(account_id) = req.credit_account_id {
            sqlx::query("UPDATE credit_accounts SET is_disputed = TRUE, updated_at = now() WHERE id = $1")
                .bind(account_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(dispute)
    }

    pub async fn find_dispute(&self, id: Uuid) -> Result<Option<Dispute>, AppError> {
        let dispute = sqlx::query_as::<_, Dispute>("SELECT * FROM disputes WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(dispute)
    }

    pub async fn list_disputes(
        &self,
        consumer_id: Option<Uuid>,
        status: Option<DisputeStatus>,
        page: Page,
    ) -> Result<(Vec<Dispute>, i64), AppError> {
        let disputes = sqlx::query_as::<_, Dispute>(
            "SELECT * FROM disputes
             WHERE ($1::uuid IS NULL OR consumer_id = $1) AND ($2::dispute_status IS NULL OR status = $2)
             ORDER BY created_at DESC OFFSET $3 LIMIT $4",
        )
        .bind(consumer_id)
        .bind(status)
        .bind(page.skip)
        .bind(page.limit)
        .fetch_all(&self.pool)
        .await?;

        let total = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM disputes
             WHERE ($1::uuid IS NULL OR consumer_id = $1) AND ($2::dispute_status IS NULL OR status = $2)",
        )
        .bind(consumer_id)
        .bind(status)
        .fetch_one(&self.pool)
        .await?;

        Ok((disputes, total))
    }

    /// Moves a dispute to `status` if it is still in the status `dispute` was read with;
    /// otherwise 400. A terminal status stamps `resolved_at` and clears the account's
    /// dispute flag unless another open dispute still references it.
    pub async fn update_dispute_status(
        &self,
        dispute: &Dispute,
        status: DisputeStatus,
        reviewer: Uuid,
        resolution_notes: &str,
    ) -> Result<Dispute, AppError> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query_as::<_, Dispute>(
            "UPDATE disputes SET
                status = $2,
                reviewed_by = $3,
                resolution_notes = $4,
                resolved_at = CASE WHEN $5 THEN now() ELSE resolved_at END,
                updated_at = now()
             WHERE id = $1 AND status = $6 RETURNING *",
        )
        .bind(dispute.id)
        .bind(status)
        .bind(reviewer)
        .bind(resolution_notes)
        .bind(status.is_terminal())
        .bind(dispute.status)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| {
            AppError::BadRequest("Dispute was updated by another request".to_string())
        })?;

        if let (true, Some(account_id)) = (status.is_terminal(), dispute.credit_account_id) {
            sqlx::query(
                "UPDATE credit_accounts SET is_disputed = FALSE, updated_at = now()
                 WHERE id = $1 AND NOT EXISTS (
                    SELECT 1 FROM disputes
                    WHERE credit_account_id = $1 AND id <> $2
                      AND status IN ('PENDING', 'UNDER_REVIEW')
                 )",
            )
            .bind(account_id)
            .bind(dispute.id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(updated)
    }

    // ============ Audit logs ============

    pub async fn insert_audit_log(&self, entry: &NewAuditLog) -> Result<(), sqlx::Error> {
        insert_audit_log(&self.pool, entry).await
    }

    pub async fn list_audit_logs(
        &self,
        user_id: Option<Uuid>,
        resource_type: Option<&str>,
        page: Page,
    ) -> Result<(Vec<AuditLog>, i64), AppError> {
        let logs = sqlx::query_as::<_, AuditLog>(
            "SELECT * FROM audit_logs
             WHERE ($1::uuid IS NULL OR user_id = $1) AND ($2::text IS NULL OR resource_type = $2)
             ORDER BY created_at DESC OFFSET $3 LIMIT $4",
        )
        .bind(user_id)
        .bind(resource_type)
        .bind(page.skip)
        .bind(page.limit)
        .fetch_all(&self.pool)
        .await?;

        let total = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM audit_logs
             WHERE ($1::uuid IS NULL OR user_id = $1) AND ($2::text IS NULL OR resource_type = $2)",
        )
        .bind(user_id)
        .bind(resource_type)
        .fetch_one(&self.pool)
        .await?;

        Ok((logs, total))
    }
}

// ============ Executor-generic queries (used inside transactions) ============

/// Consumer row locked against concurrent updates until the transaction ends.
pub async fn consumer_for_share<'e, E>(executor: E, id: Uuid) -> Result<Option<Consumer>, AppError>
where
    E: PgExecutor<'e>,
{
    let consumer = sqlx::query_as::<_, Consumer>("SELECT * FROM consumers WHERE id = $1 FOR SHARE")
        .bind(id)
        .fetch_optional(executor)
        .await?;
    Ok(consumer)
}

/// Every account reported for the consumer, oldest first.
pub async fn accounts_for_consumer<'e, E>(executor: E, consumer_id: Uuid) -> Result<Vec<CreditAccount>, AppError>
where
    E: PgExecutor<'e>,
{
    let accounts = sqlx::query_as::<_, CreditAccount>(
        "SELECT * FROM credit_accounts WHERE consumer_id = $1 ORDER BY open_date ASC",
    )
    .bind(consumer_id)
    .fetch_all(executor)
    .await?;
    Ok(accounts)
}

/// Fields of a report row about to be written.
pub struct NewCreditReport<'a> {
    pub consumer_id: Uuid,
    pub credit_score: i32,
    pub score_factors: &'a Value,
    pub report_data: &'a Value,
    pub generated_by: Uuid,
    pub generated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

pub async fn insert_report<'e, E>(executor: E, report: &NewCreditReport<'_>) -> Result<CreditReport, AppError>
where
    E: PgExecutor<'e>,
{
    sqlx::query_as::<_, CreditReport>(
        "INSERT INTO credit_reports (consumer_id, credit_score, score_factors, report_data, generated_by, generated_at, expires_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING *",
    )
    .bind(report.consumer_id)
    .bind(report.credit_score)
    .bind(report.score_factors)
    .bind(report.report_data)
    .bind(report.generated_by)
    .bind(report.generated_at)
    .bind(report.expires_at)
    .fetch_one(executor)
    .await
    .context("inserting credit report")
}

pub async fn insert_audit_log<'e, E>(executor: E, entry: &NewAuditLog) -> Result<(), sqlx::Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query(
        "INSERT INTO audit_logs (
            user_id, action, resource_type, resource_id, ip_address, user_agent,
            request_method, request_path, request_body, response_status, metadata
         ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
    )
    .bind(entry.user_id)
    .bind(entry.action)
    .bind(&entry.resource_type)
    .bind(entry.resource_id)
    .bind(entry.ip_address.as_deref())
    .bind(entry.user_agent.as_deref())
    .bind(entry.request_method.as_deref())
    .bind(entry.request_path.as_deref())
    .bind(&entry.request_body)
    .bind(entry.response_status)
    .bind(&entry.metadata)
    .execute(executor)
    .await?;
    Ok(())
}
