/// Scoring engine behaviour against hand-computed expectations.
use bigdecimal::BigDecimal;
use chrono::{Duration, NaiveDate, Utc};
use credit_bureau_api::models::{AccountStatus, AccountType, Consumer, CreditAccount, PaymentStatus};
use credit_bureau_api::scoring::{
    compute_score, ScoreFactors, NO_ACTIVE_CREDIT_HISTORY, NO_CREDIT_HISTORY,
};
use std::str::FromStr;
use uuid::Uuid;

fn as_of() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
}

fn consumer() -> Consumer {
    let now = Utc::now();
    Consumer {
        id: Uuid::new_v4(),
        ssn_hash: "fingerprint".to_string(),
        ssn_last4: "4321".to_string(),
        first_name: "Mele".to_string(),
        last_name: "Lakabung".to_string(),
        middle_name: None,
        date_of_birth: NaiveDate::from_ymd_opt(1980, 7, 4).unwrap(),
        email: None,
        phone: None,
        address: None,
        city: Some("Majuro".to_string()),
        state: None,
        zip_code: Some("96960".to_string()),
        country: "Marshall Islands".to_string(),
        is_frozen: false,
        user_id: None,
        created_at: now,
        updated_at: now,
    }
}

fn money(value: &str) -> BigDecimal {
    BigDecimal::from_str(value).unwrap()
}

fn account(account_type: AccountType, open_date: NaiveDate) -> CreditAccount {
    let now = Utc::now();
    CreditAccount {
        id: Uuid::new_v4(),
        consumer_id: Uuid::new_v4(),
        bank_id: Uuid::new_v4(),
        account_number_hash: "fingerprint".to_string(),
        account_number_last4: "0001".to_string(),
        account_type,
        account_status: AccountStatus::Open,
        payment_status: PaymentStatus::Current,
        credit_limit: None,
        current_balance: money("0"),
        minimum_payment: None,
        payment_due_date: None,
        open_date,
        close_date: None,
        last_payment_date: None,
        last_payment_amount: None,
        notes: None,
        is_disputed: false,
        created_at: now,
        updated_at: now,
    }
}

fn breakdown(factors: &ScoreFactors) -> &credit_bureau_api::scoring::FactorBreakdown {
    match factors {
        ScoreFactors::Breakdown(b) => b,
        other => panic!("expected a factor breakdown, got {:?}", other),
    }
}

#[test]
fn empty_history_scores_zero() {
    let result = compute_score(&consumer(), &[], as_of());

    assert_eq!(result.score, 0);
    let factors = breakdown(&result.factors);
    assert_eq!(factors.payment_history, NO_CREDIT_HISTORY);
    assert_eq!(factors.credit_utilization, NO_CREDIT_HISTORY);
    assert_eq!(factors.length_of_history, NO_CREDIT_HISTORY);
    assert_eq!(factors.credit_mix, NO_CREDIT_HISTORY);
    assert_eq!(factors.new_credit, NO_CREDIT_HISTORY);
}

#[test]
fn accounts_closed_over_seven_years_ago_are_ignored() {
    let mut old = account(AccountType::PersonalLoan, NaiveDate::from_ymd_opt(2000, 1, 1).unwrap());
    old.account_status = AccountStatus::Closed;
    old.close_date = NaiveDate::from_ymd_opt(2010, 1, 1);

    let result = compute_score(&consumer(), &[old], as_of());

    assert_eq!(result.score, 0);
    assert_eq!(
        result.factors,
        ScoreFactors::Message {
            message: NO_ACTIVE_CREDIT_HISTORY.to_string()
        }
    );
}

#[test]
fn recently_closed_account_still_counts() {
    let mut closed = account(AccountType::AutoLoan, NaiveDate::from_ymd_opt(2015, 1, 1).unwrap());
    closed.account_status = AccountStatus::Closed;
    closed.close_date = Some(as_of() - Duration::days(30));

    let result = compute_score(&consumer(), &[closed], as_of());
    assert!(result.has_score());
}

#[test]
fn single_ideal_card_scores_817() {
    let mut card = account(AccountType::CreditCard, as_of() - Duration::days(11 * 365 + 3));
    card.credit_limit = Some(money("1000"));

    let result = compute_score(&consumer(), &[card], as_of());

    assert_eq!(result.score, 817);
    let factors = breakdown(&result.factors);
    assert_eq!(factors.payment_history, "100.0%");
    assert_eq!(factors.credit_utilization, "100.0%");
    assert_eq!(factors.length_of_history, "100.0%");
    assert_eq!(factors.credit_mix, "40.0%");
    assert_eq!(factors.new_credit, "100.0%");
}

#[test]
fn two_new_accounts_of_different_types() {
    let accounts = vec![
        account(AccountType::CreditCard, as_of()),
        account(AccountType::Mortgage, as_of()),
    ];

    let result = compute_score(&consumer(), &accounts, as_of());

    let factors = breakdown(&result.factors);
    assert_eq!(factors.new_credit, "60.0%");
    assert_eq!(factors.credit_mix, "60.0%");
    assert!(result.score >= 300 && result.score <= 850);
}

#[test]
fn utilization_boundaries_fall_in_better_bucket() {
    let cases = [
        ("100", "100.0%"),
        ("300", "90.0%"),
        ("500", "70.0%"),
        ("700", "50.0%"),
        ("900", "30.0%"),
        ("900.01", "10.0%"),
    ];

    for (balance, expected) in cases {
        let mut card = account(AccountType::CreditCard, NaiveDate::from_ymd_opt(2012, 1, 1).unwrap());
        card.credit_limit = Some(money("1000"));
        card.current_balance = money(balance);

        let result = compute_score(&consumer(), &[card], as_of());
        assert_eq!(
            breakdown(&result.factors).credit_utilization,
            expected,
            "balance {}",
            balance
        );
    }
}

#[test]
fn accounts_without_limits_score_neutral_utilization() {
    let loan = account(AccountType::StudentLoan, NaiveDate::from_ymd_opt(2012, 1, 1).unwrap());
    let result = compute_score(&consumer(), &[loan], as_of());
    assert_eq!(breakdown(&result.factors).credit_utilization, "50.0%");
}

#[test]
fn payment_history_is_averaged() {
    let mut late = account(AccountType::CreditCard, NaiveDate::from_ymd_opt(2012, 1, 1).unwrap());
    late.payment_status = PaymentStatus::Late90;
    let current = account(AccountType::AutoLoan, NaiveDate::from_ymd_opt(2014, 1, 1).unwrap());

    let result = compute_score(&consumer(), &[late, current], as_of());
    assert_eq!(breakdown(&result.factors).payment_history, "65.0%");
}

#[test]
fn scoring_is_deterministic_for_a_fixed_date() {
    let mut card = account(AccountType::CreditCard, NaiveDate::from_ymd_opt(2019, 3, 1).unwrap());
    card.credit_limit = Some(money("5000"));
    card.current_balance = money("1234.56");
    let mut loan = account(AccountType::Mortgage, as_of() - Duration::days(90));
    loan.payment_status = PaymentStatus::Late30;
    let accounts = vec![card, loan];
    let consumer = consumer();

    let first = compute_score(&consumer, &accounts, as_of());
    let second = compute_score(&consumer, &accounts, as_of());
    assert_eq!(first, second);
}

#[test]
fn balances_without_limits_still_count_toward_utilization() {
    let mut mortgage = account(AccountType::Mortgage, NaiveDate::from_ymd_opt(2012, 1, 1).unwrap());
    mortgage.current_balance = money("200000");
    let mut card = account(AccountType::CreditCard, NaiveDate::from_ymd_opt(2012, 1, 1).unwrap());
    card.credit_limit = Some(money("1000"));

    let result = compute_score(&consumer(), &[mortgage, card], as_of());
    assert_eq!(breakdown(&result.factors).credit_utilization, "10.0%");
}

#[test]
fn zero_limits_are_excluded_from_the_limit_total() {
    let mut store_card = account(AccountType::CreditCard, NaiveDate::from_ymd_opt(2012, 1, 1).unwrap());
    store_card.credit_limit = Some(money("0"));
    store_card.current_balance = money("50");
    let mut card = account(AccountType::CreditCard, NaiveDate::from_ymd_opt(2012, 1, 1).unwrap());
    card.credit_limit = Some(money("1000"));
    card.current_balance = money("50");

    // (50 + 50) / 1000 sits exactly on the 10% bound.
    let result = compute_score(&consumer(), &[store_card, card], as_of());
    assert_eq!(breakdown(&result.factors).credit_utilization, "100.0%");
}

#[test]
fn closed_account_window_edge() {
    let closed_days_ago = |days: i64| {
        let mut acc = account(AccountType::PersonalLoan, NaiveDate::from_ymd_opt(2000, 1, 1).unwrap());
        acc.account_status = AccountStatus::Closed;
        acc.close_date = Some(as_of() - Duration::days(days));
        acc
    };

    let inside = compute_score(&consumer(), &[closed_days_ago(2554)], as_of());
    assert!(inside.has_score());

    let outside = compute_score(&consumer(), &[closed_days_ago(2555)], as_of());
    assert_eq!(outside.score, 0);
    assert_eq!(
        outside.factors,
        ScoreFactors::Message {
            message: NO_ACTIVE_CREDIT_HISTORY.to_string()
        }
    );
}

#[test]
fn closed_account_without_close_date_is_inactive() {
    let mut closed = account(AccountType::AutoLoan, NaiveDate::from_ymd_opt(2018, 1, 1).unwrap());
    closed.account_status = AccountStatus::Closed;

    let result = compute_score(&consumer(), &[closed], as_of());
    assert_eq!(result.score, 0);
    assert_eq!(
        result.factors,
        ScoreFactors::Message {
            message: NO_ACTIVE_CREDIT_HISTORY.to_string()
        }
    );
}

#[test]
fn new_credit_cutoff_is_inclusive() {
    let on_cutoff = account(AccountType::CreditCard, as_of() - Duration::days(180));
    let result = compute_score(&consumer(), &[on_cutoff], as_of());
    assert_eq!(breakdown(&result.factors).new_credit, "80.0%");

    let past_cutoff = account(AccountType::CreditCard, as_of() - Duration::days(181));
    let result = compute_score(&consumer(), &[past_cutoff], as_of());
    assert_eq!(breakdown(&result.factors).new_credit, "100.0%");
}

#[test]
fn missed_payments_and_many_new_accounts() {
    let accounts: Vec<CreditAccount> = [
        AccountType::CreditCard,
        AccountType::Mortgage,
        AccountType::AutoLoan,
        AccountType::StudentLoan,
    ]
    .into_iter()
    .map(|account_type| {
        let mut acc = account(account_type, as_of() - Duration::days(10));
        acc.payment_status = PaymentStatus::NoPayment;
        acc
    })
    .collect();

    let result = compute_score(&consumer(), &accounts, as_of());

    let factors = breakdown(&result.factors);
    assert_eq!(factors.payment_history, "0.0%");
    assert_eq!(factors.new_credit, "20.0%");
    assert_eq!(factors.credit_mix, "100.0%");
    assert_eq!(factors.length_of_history, "20.0%");
    // 0.30*0.5 + 0.15*0.2 + 0.10*1.0 + 0.10*0.2 = 0.30 -> 300 + 165
    assert_eq!(result.score, 465);
}
