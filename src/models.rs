use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

// ============ Enumerations ============

/// The six roles a platform user can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    BankManager,
    BankUser,
    DataProvider,
    Auditor,
    Consumer,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::BankManager => "BANK_MANAGER",
            Role::BankUser => "BANK_USER",
            Role::DataProvider => "DATA_PROVIDER",
            Role::Auditor => "AUDITOR",
            Role::Consumer => "CONSUMER",
        }
    }

    /// Roles whose data access is scoped to a single bank.
    pub fn is_bank_scoped(&self) -> bool {
        matches!(self, Role::BankManager | Role::BankUser)
    }
}

/// Kind of credit product an account represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "account_type", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountType {
    CreditCard,
    Mortgage,
    AutoLoan,
    PersonalLoan,
    StudentLoan,
    LineOfCredit,
    Other,
}

impl AccountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountType::CreditCard => "CREDIT_CARD",
            AccountType::Mortgage => "MORTGAGE",
            AccountType::AutoLoan => "AUTO_LOAN",
            AccountType::PersonalLoan => "PERSONAL_LOAN",
            AccountType::StudentLoan => "STUDENT_LOAN",
            AccountType::LineOfCredit => "LINE_OF_CREDIT",
            AccountType::Other => "OTHER",
        }
    }
}

/// Lifecycle status of a credit account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "account_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountStatus {
    Open,
    Closed,
    Delinquent,
    ChargeOff,
    Collection,
    Bankruptcy,
}

impl AccountStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountStatus::Open => "OPEN",
            AccountStatus::Closed => "CLOSED",
            AccountStatus::Delinquent => "DELINQUENT",
            AccountStatus::ChargeOff => "CHARGE_OFF",
            AccountStatus::Collection => "COLLECTION",
            AccountStatus::Bankruptcy => "BANKRUPTCY",
        }
    }
}

/// Most recent payment standing reported for an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "payment_status")]
pub enum PaymentStatus {
    #[sqlx(rename = "CURRENT")]
    #[serde(rename = "CURRENT")]
    Current,
    #[sqlx(rename = "LATE_30")]
    #[serde(rename = "LATE_30")]
    Late30,
    #[sqlx(rename = "LATE_60")]
    #[serde(rename = "LATE_60")]
    Late60,
    #[sqlx(rename = "LATE_90")]
    #[serde(rename = "LATE_90")]
    Late90,
    #[sqlx(rename = "LATE_120_PLUS")]
    #[serde(rename = "LATE_120_PLUS")]
    Late120Plus,
    #[sqlx(rename = "NO_PAYMENT")]
    #[serde(rename = "NO_PAYMENT")]
    NoPayment,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Current => "CURRENT",
            PaymentStatus::Late30 => "LATE_30",
            PaymentStatus::Late60 => "LATE_60",
            PaymentStatus::Late90 => "LATE_90",
            PaymentStatus::Late120Plus => "LATE_120_PLUS",
            PaymentStatus::NoPayment => "NO_PAYMENT",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "consent_type", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConsentType {
    CreditReport,
    DataSharing,
    Marketing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "consent_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConsentStatus {
    Granted,
    Revoked,
    Expired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "inquiry_purpose", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InquiryPurpose {
    LoanApplication,
    CreditCardApplication,
    Employment,
    RentalApplication,
    Insurance,
    AccountReview,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "inquiry_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InquiryStatus {
    Pending,
    Approved,
    Denied,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "dispute_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DisputeStatus {
    Pending,
    UnderReview,
    Resolved,
    Rejected,
    Withdrawn,
}

impl DisputeStatus {
    /// Whether a dispute in this status is closed for good.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DisputeStatus::Resolved | DisputeStatus::Rejected | DisputeStatus::Withdrawn
        )
    }

    /// Legal moves: PENDING may go anywhere else, UNDER_REVIEW only to a verdict.
    pub fn can_transition_to(&self, next: DisputeStatus) -> bool {
        match (self, next) {
            (DisputeStatus::Pending, DisputeStatus::Pending) => false,
            (DisputeStatus::Pending, _) => true,
            (DisputeStatus::UnderReview, DisputeStatus::Resolved)
            | (DisputeStatus::UnderReview, DisputeStatus::Rejected) => true,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "dispute_reason", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DisputeReason {
    IncorrectBalance,
    IncorrectPaymentHistory,
    AccountNotMine,
    DuplicateAccount,
    Fraud,
    IdentityTheft,
    Other,
}

/// Action recorded in the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "audit_action", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    Create,
    Read,
    Update,
    Delete,
    Login,
    Logout,
    LoginFailed,
    PermissionDenied,
    DataExport,
    PasswordChange,
    AccountLocked,
}

impl AuditAction {
    /// Maps an HTTP method to the action it represents.
    pub fn from_method(method: &str) -> Self {
        match method {
            "POST" => AuditAction::Create,
            "PUT" | "PATCH" => AuditAction::Update,
            "DELETE" => AuditAction::Delete,
            _ => AuditAction::Read,
        }
    }
}

// ============ Database Models ============

/// A platform user (staff, bank employee, auditor or consumer).
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct User {
    /// Unique identifier.
    pub id: Uuid,
    /// Login email, unique.
    pub email: String,
    /// Display name.
    pub full_name: String,
    /// Role driving the permission matrix.
    pub role: Role,
    /// Bank the user acts for (bank roles only).
    pub bank_id: Option<Uuid>,
    /// Inactive users are rejected at authentication.
    pub is_active: bool,
    /// SHA-256 digest of the user's API token.
    #[serde(skip_serializing, default)]
    pub api_token_hash: Option<String>,
    /// Last authenticated request.
    pub last_seen_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A bank or lender organisation that submits and consumes credit data.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Bank {
    pub id: Uuid,
    pub name: String,
    /// Regulator licence number, unique.
    pub license_number: String,
    pub tax_id: Option<String>,
    pub contact_email: String,
    pub contact_phone: Option<String>,
    pub address: Option<String>,
    #[serde(skip_serializing, default)]
    pub api_key_hash: Option<String>,
    pub is_active: bool,
    pub is_approved: bool,
    pub approved_at: Option<DateTime<Utc>>,
    pub approved_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A consumer credit profile.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Consumer {
    /// Unique identifier.
    pub id: Uuid,
    /// SHA-256 fingerprint of the normalised SSN, used for duplicate detection.
    #[serde(skip_serializing, default)]
    pub ssn_hash: String,
    /// Last four SSN digits for display.
    pub ssn_last4: String,
    pub first_name: String,
    pub last_name: String,
    pub middle_name: Option<String>,
    pub date_of_birth: NaiveDate,
    pub email: Option<String>,
    /// E.164 phone number.
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
    pub country: String,
    /// Credit freeze flag; a frozen consumer gets no new reports.
    pub is_frozen: bool,
    /// Linked CONSUMER user, if the consumer registered.
    pub user_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Consumer {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// A credit account reported by a bank for a consumer.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct CreditAccount {
    pub id: Uuid,
    pub consumer_id: Uuid,
    /// Reporting bank.
    pub bank_id: Uuid,
    #[serde(skip_serializing, default)]
    pub account_number_hash: String,
    pub account_number_last4: String,
    pub account_type: AccountType,
    pub account_status: AccountStatus,
    pub payment_status: PaymentStatus,
    /// Absent for installment products without a revolving limit.
    pub credit_limit: Option<BigDecimal>,
    pub current_balance: BigDecimal,
    pub minimum_payment: Option<BigDecimal>,
    pub payment_due_date: Option<NaiveDate>,
    pub open_date: NaiveDate,
    /// On or after `open_date` when present.
    pub close_date: Option<NaiveDate>,
    pub last_payment_date: Option<NaiveDate>,
    pub last_payment_amount: Option<BigDecimal>,
    pub notes: Option<String>,
    /// Set while an open dispute references this account.
    pub is_disputed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A generated credit report snapshot.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct CreditReport {
    pub id: Uuid,
    pub consumer_id: Uuid,
    /// 300-850, or 0 when the consumer has no usable history.
    pub credit_score: i32,
    pub score_factors: Option<Value>,
    /// Full report document.
    pub report_data: Value,
    pub version: i32,
    pub generated_by: Option<Uuid>,
    pub generated_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// A consumer's recorded consent.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Consent {
    pub id: Uuid,
    pub consumer_id: Uuid,
    pub consent_type: ConsentType,
    pub status: ConsentStatus,
    /// Bank the consent was granted to.
    pub bank_id: Option<Uuid>,
    pub purpose: Option<String>,
    pub granted_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A credit check requested by a bank.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct CreditInquiry {
    pub id: Uuid,
    pub consumer_id: Uuid,
    pub bank_id: Uuid,
    pub requested_by: Uuid,
    pub purpose: InquiryPurpose,
    pub purpose_description: Option<String>,
    pub consent_given: bool,
    pub consent_verified_at: Option<DateTime<Utc>>,
    pub status: InquiryStatus,
    pub credit_report_id: Option<Uuid>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A consumer dispute over reported data.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Dispute {
    pub id: Uuid,
    pub consumer_id: Uuid,
    pub credit_account_id: Option<Uuid>,
    pub reason: DisputeReason,
    pub description: String,
    pub status: DisputeStatus,
    pub submitted_by: Option<Uuid>,
    pub reviewed_by: Option<Uuid>,
    pub resolution_notes: Option<String>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One row of the audit trail.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct AuditLog {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub action: AuditAction,
    pub resource_type: String,
    pub resource_id: Option<Uuid>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub request_method: Option<String>,
    pub request_path: Option<String>,
    pub request_body: Option<Value>,
    pub response_status: Option<i32>,
    pub error_message: Option<String>,
    pub metadata: Option<Value>,
    pub created_at: DateTime<Utc>,
}

/// Audit row about to be written.
#[derive(Debug, Clone, Serialize)]
pub struct NewAuditLog {
    pub user_id: Option<Uuid>,
    pub action: AuditAction,
    pub resource_type: String,
    pub resource_id: Option<Uuid>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub request_method: Option<String>,
    pub request_path: Option<String>,
    pub request_body: Option<Value>,
    pub response_status: Option<i32>,
    pub metadata: Option<Value>,
}

/// Caller address and agent recorded alongside consents and inquiries.
#[derive(Debug, Clone, Default)]
pub struct ClientInfo {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

// ============ API Request Models ============

#[derive(Debug, Clone, Deserialize)]
pub struct CreateConsumerRequest {
    pub ssn: String,
    pub first_name: String,
    pub last_name: String,
    pub middle_name: Option<String>,
    pub date_of_birth: NaiveDate,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
    pub country: Option<String>,
    pub user_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateConsumerRequest {
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FreezeRequest {
    pub is_frozen: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubmitCreditAccountRequest {
    pub consumer_id: Uuid,
    /// Required for administrators; bank users always submit for their own bank.
    pub bank_id: Option<Uuid>,
    pub account_number: String,
    pub account_type: AccountType,
    pub account_status: AccountStatus,
    pub payment_status: PaymentStatus,
    pub credit_limit: Option<BigDecimal>,
    pub current_balance: BigDecimal,
    pub minimum_payment: Option<BigDecimal>,
    pub payment_due_date: Option<NaiveDate>,
    pub open_date: NaiveDate,
    pub close_date: Option<NaiveDate>,
    pub last_payment_date: Option<NaiveDate>,
    pub last_payment_amount: Option<BigDecimal>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateCreditAccountRequest {
    pub account_status: Option<AccountStatus>,
    pub payment_status: Option<PaymentStatus>,
    pub credit_limit: Option<BigDecimal>,
    pub current_balance: Option<BigDecimal>,
    pub minimum_payment: Option<BigDecimal>,
    pub payment_due_date: Option<NaiveDate>,
    pub close_date: Option<NaiveDate>,
    pub last_payment_date: Option<NaiveDate>,
    pub last_payment_amount: Option<BigDecimal>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenerateReportRequest {
    pub consumer_id: Uuid,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GrantConsentRequest {
    pub consent_type: ConsentType,
    pub bank_id: Option<Uuid>,
    pub purpose: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateInquiryRequest {
    pub consumer_id: Uuid,
    pub purpose: InquiryPurpose,
    pub purpose_description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateDisputeRequest {
    pub consumer_id: Uuid,
    pub credit_account_id: Option<Uuid>,
    pub reason: DisputeReason,
    pub description: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResolveDisputeRequest {
    pub status: DisputeStatus,
    pub resolution_notes: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateBankRequest {
    pub name: String,
    pub license_number: String,
    pub tax_id: Option<String>,
    pub contact_email: String,
    pub contact_phone: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateBankRequest {
    pub name: Option<String>,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
    pub address: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BankApprovalRequest {
    pub is_approved: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateUserRequest {
    pub email: String,
    pub full_name: String,
    pub role: Role,
    pub bank_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateUserRequest {
    pub full_name: Option<String>,
    pub role: Option<Role>,
    pub bank_id: Option<Uuid>,
    pub is_active: Option<bool>,
}

// ============ Query Parameters ============

/// Offset/limit window shared by list endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub skip: i64,
    pub limit: i64,
}

impl Page {
    pub const DEFAULT_LIMIT: i64 = 100;
    pub const MAX_LIMIT: i64 = 500;

    pub fn new(skip: Option<i64>, limit: Option<i64>) -> Self {
        Self {
            skip: skip.unwrap_or(0).max(0),
            limit: limit
                .unwrap_or(Self::DEFAULT_LIMIT)
                .clamp(1, Self::MAX_LIMIT),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PageQuery {
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

impl PageQuery {
    pub fn page(&self) -> Page {
        Page::new(self.skip, self.limit)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConsumerFilterQuery {
    pub skip: Option<i64>,
    pub limit: Option<i64>,
    pub consumer_id: Option<Uuid>,
}

impl ConsumerFilterQuery {
    pub fn page(&self) -> Page {
        Page::new(self.skip, self.limit)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DisputeQuery {
    pub skip: Option<i64>,
    pub limit: Option<i64>,
    pub status: Option<DisputeStatus>,
}

impl DisputeQuery {
    pub fn page(&self) -> Page {
        Page::new(self.skip, self.limit)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuditLogQuery {
    pub skip: Option<i64>,
    pub limit: Option<i64>,
    pub user_id: Option<Uuid>,
    pub resource_type: Option<String>,
}

impl AuditLogQuery {
    pub fn page(&self) -> Page {
        Page::new(self.skip, self.limit)
    }
}

// ============ API Response Models ============

/// Standard response envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            meta: None,
        }
    }

    pub fn with_message(self, message: impl Into<String>) -> Self {
        self.with_meta(serde_json::json!({ "message": message.into() }))
    }

    pub fn with_meta(mut self, meta: Value) -> Self {
        self.meta = Some(meta);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationMeta {
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    pub pages: i64,
}

impl PaginationMeta {
    pub fn new(page: Page, total: i64) -> Self {
        Self {
            page: page.skip / page.limit + 1,
            limit: page.limit,
            total,
            pages: (total + page.limit - 1) / page.limit,
        }
    }
}

/// Envelope for list endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginatedResponse<T> {
    pub success: bool,
    pub data: Vec<T>,
    pub meta: PaginationMeta,
}

impl<T> PaginatedResponse<T> {
    pub fn new(data: Vec<T>, page: Page, total: i64) -> Self {
        Self {
            success: true,
            data,
            meta: PaginationMeta::new(page, total),
        }
    }
}

/// The caller's own profile with the permissions their role grants.
#[derive(Debug, Clone, Serialize)]
pub struct CurrentUserResponse {
    #[serde(flatten)]
    pub user: User,
    pub permissions: Vec<&'static str>,
}

/// A newly registered bank with its API key. The key is never shown again.
#[derive(Debug, Clone, Serialize)]
pub struct CreatedBank {
    #[serde(flatten)]
    pub bank: Bank,
    pub api_key: String,
}

/// A freshly issued secret, shown exactly once.
#[derive(Debug, Clone, Serialize)]
pub struct IssuedToken {
    pub user_id: Uuid,
    pub token: String,
}
