//! Input checks applied before credit data or consumer records are written.

use crate::errors::AppError;
use crate::models::{CreateConsumerRequest, CreditAccount, SubmitCreditAccountRequest};
use bigdecimal::{BigDecimal, Zero};
use chrono::NaiveDate;
use phonenumber::country::Id as CountryId;
use phonenumber::Mode;
use regex::Regex;
use std::sync::OnceLock;

fn email_regex() -> Option<&'static Regex> {
    static EMAIL_RE: OnceLock<Option<Regex>> = OnceLock::new();
    EMAIL_RE
        .get_or_init(|| {
            // RFC 5322 simplified: local@domain.tld
            Regex::new(
                r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)+$",
            )
            .ok()
        })
        .as_ref()
}

/// Validate email address format.
pub fn is_valid_email(email: &str) -> bool {
    if email.len() < 5 || !email.contains('@') || !email.contains('.') {
        return false;
    }
    email_regex().map_or(false, |re| re.is_match(email))
}

pub fn require_valid_email(email: &str) -> Result<(), AppError> {
    if is_valid_email(email) {
        Ok(())
    } else {
        tracing::warn!("Invalid email format: {}", email);
        Err(AppError::BadRequest(format!("Invalid email address: {}", email)))
    }
}

/// Validate and normalize a phone number to E.164.
///
/// Numbers without a country prefix are parsed as Marshall Islands numbers.
///
/// # Returns
///
/// * `Ok(String)` - The E.164 form, e.g. `+6926253181`.
/// * `Err(AppError::BadRequest)` - Unparseable or invalid number.
pub fn normalize_phone(raw: &str) -> Result<String, AppError> {
    if raw.trim().len() < 7 {
        return Err(AppError::BadRequest("Phone number too short".to_string()));
    }

    match phonenumber::parse(Some(CountryId::MH), raw) {
        Ok(number) if phonenumber::is_valid(&number) => {
            let formatted = number.format().mode(Mode::E164).to_string();
            tracing::debug!("Valid phone: {} -> {}", raw, formatted);
            Ok(formatted)
        }
        Ok(_) => {
            tracing::warn!("Invalid phone number: {}", raw);
            Err(AppError::BadRequest(format!("Invalid phone number: {}", raw)))
        }
        Err(e) => {
            tracing::warn!("Failed to parse phone '{}': {:?}", raw, e);
            Err(AppError::BadRequest(format!("Invalid phone number: {}", raw)))
        }
    }
}

/// Strips separators from an SSN and checks it is exactly nine digits.
pub fn normalize_ssn(raw: &str) -> Result<String, AppError> {
    let digits: String = raw
        .chars()
        .filter(|c| !matches!(c, '-' | ' '))
        .collect();
    if digits.len() == 9 && digits.chars().all(|c| c.is_ascii_digit()) {
        Ok(digits)
    } else {
        Err(AppError::BadRequest("SSN must contain exactly 9 digits".to_string()))
    }
}

/// Last four characters, or the whole value when shorter.
pub fn last_four(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    let start = chars.len().saturating_sub(4);
    chars[start..].iter().collect()
}

fn non_negative(field: &str, amount: Option<&BigDecimal>) -> Result<(), AppError> {
    match amount {
        Some(value) if *value < BigDecimal::zero() => Err(AppError::BadRequest(format!(
            "{} must not be negative",
            field
        ))),
        _ => Ok(()),
    }
}

fn account_dates(
    open_date: NaiveDate,
    close_date: Option<NaiveDate>,
    today: NaiveDate,
) -> Result<(), AppError> {
    if open_date > today {
        return Err(AppError::BadRequest(
            "open_date cannot be in the future".to_string(),
        ));
    }
    if let Some(close) = close_date {
        if close < open_date {
            return Err(AppError::BadRequest(
                "close_date cannot be before open_date".to_string(),
            ));
        }
    }
    Ok(())
}

/// Checks a submitted account before it is stored.
pub fn validate_new_account(
    req: &SubmitCreditAccountRequest,
    today: NaiveDate,
) -> Result<(), AppError> {
    if req.account_number.trim().is_empty() {
        return Err(AppError::BadRequest("account_number is required".to_string()));
    }
    non_negative("credit_limit", req.credit_limit.as_ref())?;
    non_negative("current_balance", Some(&req.current_balance))?;
    non_negative("minimum_payment", req.minimum_payment.as_ref())?;
    non_negative("last_payment_amount", req.last_payment_amount.as_ref())?;
    account_dates(req.open_date, req.close_date, today)
}

/// Checks an account after a partial update has been merged into it.
pub fn validate_account(account: &CreditAccount, today: NaiveDate) -> Result<(), AppError> {
    non_negative("credit_limit", account.credit_limit.as_ref())?;
    non_negative("current_balance", Some(&account.current_balance))?;
    non_negative("minimum_payment", account.minimum_payment.as_ref())?;
    non_negative("last_payment_amount", account.last_payment_amount.as_ref())?;
    account_dates(account.open_date, account.close_date, today)
}

/// Checks a new consumer record and returns the normalised SSN and phone.
pub fn validate_new_consumer(
    req: &CreateConsumerRequest,
    today: NaiveDate,
) -> Result<(String, Option<String>), AppError> {
    if req.first_name.trim().is_empty() || req.last_name.trim().is_empty() {
        return Err(AppError::BadRequest(
            "first_name and last_name are required".to_string(),
        ));
    }
    if req.date_of_birth > today {
        return Err(AppError::BadRequest(
            "date_of_birth cannot be in the future".to_string(),
        ));
    }
    let ssn = normalize_ssn(&req.ssn)?;
    if let Some(email) = req.email.as_deref() {
        require_valid_email(email)?;
    }
    let phone = req.phone.as_deref().map(normalize_phone).transpose()?;
    Ok((ssn, phone))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_email_validation() {
        assert!(is_valid_email("jane.doe@bank.mh"));
        assert!(!is_valid_email("jane.doe@"));
        assert!(!is_valid_email("no-at-sign.example.com"));
        assert!(!is_valid_email("a@b"));
    }

    #[test]
    fn test_phone_normalization() {
        assert_eq!(normalize_phone("+1 202-456-1111").unwrap(), "+12024561111");
        assert!(normalize_phone("123").is_err());
        assert!(normalize_phone("not a phone").is_err());
    }

    #[test]
    fn test_ssn_normalization() {
        assert_eq!(normalize_ssn("123-45-6789").unwrap(), "123456789");
        assert_eq!(normalize_ssn("123 45 6789").unwrap(), "123456789");
        assert!(normalize_ssn("12-345-678").is_err());
        assert!(normalize_ssn("12345678a").is_err());
    }

    #[test]
    fn test_last_four() {
        assert_eq!(last_four("4111111111111111"), "1111");
        assert_eq!(last_four("12"), "12");
    }

    #[test]
    fn test_account_dates() {
        let today = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let open = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        assert!(account_dates(open, None, today).is_ok());
        assert!(account_dates(open, Some(open), today).is_ok());
        assert!(account_dates(open, NaiveDate::from_ymd_opt(2019, 12, 31), today).is_err());
        assert!(account_dates(NaiveDate::from_ymd_opt(2024, 6, 2).unwrap(), None, today).is_err());
    }

    #[test]
    fn test_negative_amount_rejected() {
        let negative = BigDecimal::from_str("-0.01").unwrap();
        assert!(non_negative("current_balance", Some(&negative)).is_err());
        assert!(non_negative("current_balance", Some(&BigDecimal::zero())).is_ok());
        assert!(non_negative("credit_limit", None).is_ok());
    }
}
