/// Property-based tests using proptest
/// Tests invariants and properties that should hold for all inputs
use bigdecimal::BigDecimal;
use chrono::{Duration, NaiveDate, Utc};
use credit_bureau_api::audit::{mask_sensitive, mask_value};
use credit_bureau_api::models::{AccountStatus, AccountType, Consumer, CreditAccount, PaymentStatus};
use credit_bureau_api::scoring::{compute_score, final_score, utilization_bucket, BASE_SCORE, MAX_SCORE};
use credit_bureau_api::validation::{is_valid_email, normalize_phone, normalize_ssn};
use proptest::prelude::*;
use uuid::Uuid;

fn as_of() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
}

fn consumer() -> Consumer {
    let now = Utc::now();
    Consumer {
        id: Uuid::nil(),
        ssn_hash: String::new(),
        ssn_last4: "0000".to_string(),
        first_name: "Prop".to_string(),
        last_name: "Test".to_string(),
        middle_name: None,
        date_of_birth: NaiveDate::from_ymd_opt(1990, 1, 1).unwrap(),
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

fn account_type() -> impl Strategy<Value = AccountType> {
    prop::sample::select(vec![
        AccountType::CreditCard,
        AccountType::Mortgage,
        AccountType::AutoLoan,
        AccountType::PersonalLoan,
        AccountType::StudentLoan,
        AccountType::LineOfCredit,
        AccountType::Other,
    ])
}

fn payment_status() -> impl Strategy<Value = PaymentStatus> {
    prop::sample::select(vec![
        PaymentStatus::Current,
        PaymentStatus::Late30,
        PaymentStatus::Late60,
        PaymentStatus::Late90,
        PaymentStatus::Late120Plus,
        PaymentStatus::NoPayment,
    ])
}

prop_compose! {
    fn arb_account()(
        account_type in account_type(),
        payment_status in payment_status(),
        closed in proptest::bool::ANY,
        age_days in 0i64..10_000,
        closed_days_ago in 0i64..5_000,
        limit_cents in proptest::option::of(0i64..10_000_000),
        balance_cents in 0i64..20_000_000,
    ) -> CreditAccount {
        let now = Utc::now();
        let open_date = as_of() - Duration::days(age_days);
        CreditAccount {
            id: Uuid::nil(),
            consumer_id: Uuid::nil(),
            bank_id: Uuid::nil(),
            account_number_hash: String::new(),
            account_number_last4: "0000".to_string(),
            account_type,
            account_status: if closed { AccountStatus::Closed } else { AccountStatus::Open },
            payment_status,
            credit_limit: limit_cents.map(|c| BigDecimal::new(c.into(), 2)),
            current_balance: BigDecimal::new(balance_cents.into(), 2),
            minimum_payment: None,
            payment_due_date: None,
            open_date,
            close_date: if closed { Some(as_of() - Duration::days(closed_days_ago)) } else { None },
            last_payment_date: None,
            last_payment_amount: None,
            notes: None,
            is_disputed: false,
            created_at: now,
            updated_at: now,
        }
    }
}

// Property: scores are 0 (no usable history) or inside [300, 850]
proptest! {
    #[test]
    fn score_is_zero_or_within_range(accounts in prop::collection::vec(arb_account(), 0..8)) {
        let result = compute_score(&consumer(), &accounts, as_of());
        prop_assert!(result.score == 0 || (BASE_SCORE..=MAX_SCORE).contains(&result.score));
    }

    #[test]
    fn scoring_is_idempotent(accounts in prop::collection::vec(arb_account(), 0..8)) {
        let consumer = consumer();
        let first = compute_score(&consumer, &accounts, as_of());
        let second = compute_score(&consumer, &accounts, as_of());
        prop_assert_eq!(first, second);
    }

    #[test]
    fn final_score_clamps_any_weighted_sum(sum in -1.0e6f64..1.0e6f64) {
        let score = final_score(sum);
        prop_assert!((BASE_SCORE..=MAX_SCORE).contains(&score));
    }
}

// Property: lower utilization never scores worse
proptest! {
    #[test]
    fn utilization_is_monotonic(a in 0i64..20_000, b in 0i64..20_000) {
        let (low, high) = if a <= b { (a, b) } else { (b, a) };
        let low_ratio = BigDecimal::new(low.into(), 4);
        let high_ratio = BigDecimal::new(high.into(), 4);
        prop_assert!(utilization_bucket(&low_ratio) >= utilization_bucket(&high_ratio));
    }
}

// Property: validation never panics
proptest! {
    #[test]
    fn email_validation_never_panics(email in "\\PC*") {
        let _ = is_valid_email(&email);
    }

    #[test]
    fn phone_normalization_never_panics(phone in "\\PC*") {
        let _ = normalize_phone(&phone);
    }

    #[test]
    fn normalized_phones_are_e164(phone in "\\PC*") {
        if let Ok(normalized) = normalize_phone(&phone) {
            prop_assert!(normalized.starts_with('+'));
            prop_assert!(normalized[1..].chars().all(|c| c.is_ascii_digit()));
        }
    }
}

// Property: SSN formatting is stripped, digits preserved
proptest! {
    #[test]
    fn ssn_separators_are_stripped(ssn in "[0-9]{9}") {
        let formatted = format!("{}-{}-{}", &ssn[0..3], &ssn[3..5], &ssn[5..9]);
        prop_assert_eq!(normalize_ssn(&formatted).unwrap(), ssn.clone());
        prop_assert_eq!(normalize_ssn(&format!(" {} ", ssn)).unwrap(), ssn);
    }

    #[test]
    fn wrong_length_ssns_rejected(ssn in "[0-9]{0,8}|[0-9]{10,12}") {
        prop_assert!(normalize_ssn(&ssn).is_err());
    }
}

// Property: masking keeps length and the last four characters
proptest! {
    #[test]
    fn masking_preserves_length_and_tail(value in "[a-zA-Z0-9]{5,40}") {
        let masked = mask_value(&value);
        prop_assert_eq!(masked.chars().count(), value.chars().count());
        prop_assert!(masked.ends_with(&value[value.len() - 4..]));
        prop_assert!(!masked[..masked.len() - 4].contains(|c: char| c != '*'));
    }

    #[test]
    fn non_sensitive_fields_untouched(key in "[a-z]{3,12}", value in "\\PC{0,30}") {
        prop_assume!(!["password", "ssn", "secret", "token"].contains(&key.as_str()));
        let mut body = serde_json::Map::new();
        body.insert(key.clone(), serde_json::Value::String(value.clone()));
        let masked = mask_sensitive(serde_json::Value::Object(body));
        prop_assert_eq!(&masked[key.as_str()], &serde_json::Value::String(value));
    }
}
