//! Credit scoring engine.
//!
//! Turns a consumer's credit accounts into a 300-850 score using five weighted factors:
//!
//! | Factor             | Weight |
//! |--------------------|--------|
//! | Payment history    | 0.35   |
//! | Credit utilization | 0.30   |
//! | Length of history  | 0.15   |
//! | Credit mix         | 0.10   |
//! | New credit         | 0.10   |
//!
//! Each factor is bucketed onto a 0-100 scale, the weighted sum is spread over the
//! 550-point range above the 300 base, and the result is clamped to [300, 850].
//!
//! The engine is a pure function of `(consumer, accounts, as_of)`. It never reads the
//! clock: every date window is measured against the single `as_of` date passed in.

use crate::models::{AccountStatus, AccountType, Consumer, CreditAccount, PaymentStatus};
use bigdecimal::{BigDecimal, Zero};
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub const BASE_SCORE: i32 = 300;
pub const MAX_SCORE: i32 = 850;
const SCORE_RANGE: f64 = 550.0;

/// Closed accounts stay on file for seven years.
pub const ACTIVE_WINDOW_DAYS: i64 = 2555;
/// Accounts opened within this many days count as new credit.
pub const NEW_CREDIT_WINDOW_DAYS: i64 = 180;
const DAYS_PER_YEAR: f64 = 365.25;

pub const NO_CREDIT_HISTORY: &str = "No credit history";
pub const NO_ACTIVE_CREDIT_HISTORY: &str = "No active credit history";

/// Used when no account carries a credit limit.
const UNKNOWN_UTILIZATION_SCORE: f64 = 50.0;

/// Utilization buckets as (ratio upper bound in percent, score). Ratios above the
/// last bound score 10.
const UTILIZATION_BUCKETS: [(i64, f64); 5] =
    [(10, 100.0), (30, 90.0), (50, 70.0), (70, 50.0), (90, 30.0)];

/// History length buckets as (minimum years, score). Shorter histories score 20.
const HISTORY_BUCKETS: [(f64, f64); 5] =
    [(10.0, 100.0), (7.0, 85.0), (5.0, 70.0), (3.0, 55.0), (1.0, 40.0)];

/// One of the five named score contributors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Factor {
    PaymentHistory,
    CreditUtilization,
    LengthOfHistory,
    CreditMix,
    NewCredit,
}

impl Factor {
    pub const ALL: [Factor; 5] = [
        Factor::PaymentHistory,
        Factor::CreditUtilization,
        Factor::LengthOfHistory,
        Factor::CreditMix,
        Factor::NewCredit,
    ];

    /// Key used in the report's factor map.
    pub fn name(&self) -> &'static str {
        match self {
            Factor::PaymentHistory => "payment_history",
            Factor::CreditUtilization => "credit_utilization",
            Factor::LengthOfHistory => "length_of_history",
            Factor::CreditMix => "credit_mix",
            Factor::NewCredit => "new_credit",
        }
    }

    pub fn weight(&self) -> f64 {
        match self {
            Factor::PaymentHistory => 0.35,
            Factor::CreditUtilization => 0.30,
            Factor::LengthOfHistory => 0.15,
            Factor::CreditMix => 0.10,
            Factor::NewCredit => 0.10,
        }
    }
}

/// Raw factor scores on a 0-100 scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FactorScores {
    pub payment_history: f64,
    pub credit_utilization: f64,
    pub length_of_history: f64,
    pub credit_mix: f64,
    pub new_credit: f64,
}

impl FactorScores {
    pub fn get(&self, factor: Factor) -> f64 {
        match factor {
            Factor::PaymentHistory => self.payment_history,
            Factor::CreditUtilization => self.credit_utilization,
            Factor::LengthOfHistory => self.length_of_history,
            Factor::CreditMix => self.credit_mix,
            Factor::NewCredit => self.new_credit,
        }
    }

    /// Weighted sum on a 0-1 scale.
    pub fn weighted_sum(&self) -> f64 {
        Factor::ALL
            .iter()
            .map(|factor| factor.weight() * self.get(*factor) / 100.0)
            .sum()
    }

    fn breakdown(&self) -> FactorBreakdown {
        FactorBreakdown {
            payment_history: format_percent(self.payment_history),
            credit_utilization: format_percent(self.credit_utilization),
            length_of_history: format_percent(self.length_of_history),
            credit_mix: format_percent(self.credit_mix),
            new_credit: format_percent(self.new_credit),
        }
    }
}

/// Human-readable value for each of the five factors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactorBreakdown {
    pub payment_history: String,
    pub credit_utilization: String,
    pub length_of_history: String,
    pub credit_mix: String,
    pub new_credit: String,
}

impl FactorBreakdown {
    fn uniform(text: &str) -> Self {
        Self {
            payment_history: text.to_string(),
            credit_utilization: text.to_string(),
            length_of_history: text.to_string(),
            credit_mix: text.to_string(),
            new_credit: text.to_string(),
        }
    }

    pub fn get(&self, factor: Factor) -> &str {
        match factor {
            Factor::PaymentHistory => &self.payment_history,
            Factor::CreditUtilization => &self.credit_utilization,
            Factor::LengthOfHistory => &self.length_of_history,
            Factor::CreditMix => &self.credit_mix,
            Factor::NewCredit => &self.new_credit,
        }
    }
}

/// Factor section of a score: either the five-factor breakdown or a single message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScoreFactors {
    Breakdown(FactorBreakdown),
    Message { message: String },
}

/// Output of [`compute_score`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreResult {
    /// 300-850, or 0 when there is no usable history.
    pub score: i32,
    pub factors: ScoreFactors,
    /// Raw 0-100 factor scores; absent when no account was scored.
    #[serde(skip)]
    pub components: Option<FactorScores>,
}

impl ScoreResult {
    fn no_history() -> Self {
        Self {
            score: 0,
            factors: ScoreFactors::Breakdown(FactorBreakdown::uniform(NO_CREDIT_HISTORY)),
            components: None,
        }
    }

    fn no_active_history() -> Self {
        Self {
            score: 0,
            factors: ScoreFactors::Message {
                message: NO_ACTIVE_CREDIT_HISTORY.to_string(),
            },
            components: None,
        }
    }

    pub fn has_score(&self) -> bool {
        self.score >= BASE_SCORE
    }
}

/// Computes the credit score for `consumer` from `accounts` as of `as_of`.
///
/// Never fails: missing data yields a zero score with an explanatory factor section.
/// Inputs are assumed to be validated at data entry; inconsistent values still produce a
/// best-effort number.
pub fn compute_score(
    consumer: &Consumer,
    accounts: &[CreditAccount],
    as_of: NaiveDate,
) -> ScoreResult {
    if accounts.is_empty() {
        tracing::debug!(consumer_id = %consumer.id, "No credit accounts to score");
        return ScoreResult::no_history();
    }

    let active = active_accounts(accounts, as_of);
    if active.is_empty() {
        tracing::debug!(
            consumer_id = %consumer.id,
            total = accounts.len(),
            "No active credit accounts to score"
        );
        return ScoreResult::no_active_history();
    }

    let components = FactorScores {
        payment_history: payment_history_score(&active),
        credit_utilization: utilization_score(&active),
        length_of_history: history_length_score(&active, as_of),
        credit_mix: credit_mix_score(&active),
        new_credit: new_credit_score(&active, as_of),
    };
    let score = final_score(components.weighted_sum());

    tracing::debug!(
        consumer_id = %consumer.id,
        active = active.len(),
        score,
        "Credit score computed"
    );

    ScoreResult {
        score,
        factors: ScoreFactors::Breakdown(components.breakdown()),
        components: Some(components),
    }
}

/// Maps a 0-1 weighted sum onto the score range.
pub fn final_score(weighted_sum: f64) -> i32 {
    let points = (weighted_sum * SCORE_RANGE).round();
    BASE_SCORE
        .saturating_add(points as i32)
        .clamp(BASE_SCORE, MAX_SCORE)
}

/// Open accounts, plus closed ones whose close date is inside the seven-year window.
pub fn is_active(account: &CreditAccount, as_of: NaiveDate) -> bool {
    if account.account_status != AccountStatus::Closed {
        return true;
    }
    account
        .close_date
        .map(|closed| (as_of - closed).num_days() < ACTIVE_WINDOW_DAYS)
        .unwrap_or(false)
}

fn active_accounts(accounts: &[CreditAccount], as_of: NaiveDate) -> Vec<&CreditAccount> {
    accounts
        .iter()
        .filter(|account| is_active(account, as_of))
        .collect()
}

pub fn payment_status_score(status: PaymentStatus) -> f64 {
    match status {
        PaymentStatus::Current => 100.0,
        PaymentStatus::Late30 => 70.0,
        PaymentStatus::Late60 => 50.0,
        PaymentStatus::Late90 => 30.0,
        PaymentStatus::Late120Plus => 10.0,
        PaymentStatus::NoPayment => 0.0,
    }
}

fn payment_history_score(accounts: &[&CreditAccount]) -> f64 {
    let total: f64 = accounts
        .iter()
        .map(|account| payment_status_score(account.payment_status))
        .sum();
    total / accounts.len() as f64
}

/// Balances count for every active account; limits only where one is set.
fn utilization_score(accounts: &[&CreditAccount]) -> f64 {
    let total_balance = accounts
        .iter()
        .fold(BigDecimal::zero(), |sum, account| sum + &account.current_balance);
    let total_limit = accounts
        .iter()
        .filter_map(|account| account.credit_limit.as_ref())
        .filter(|limit| !limit.is_zero())
        .fold(BigDecimal::zero(), |sum, limit| sum + limit);

    if total_limit.is_zero() {
        return UNKNOWN_UTILIZATION_SCORE;
    }

    utilization_bucket(&(total_balance / total_limit))
}

/// Scores a utilization ratio; lower is better. Boundaries are inclusive and compared
/// exactly.
pub fn utilization_bucket(ratio: &BigDecimal) -> f64 {
    let hundred = BigDecimal::from(100);
    for (percent, score) in UTILIZATION_BUCKETS {
        if *ratio <= BigDecimal::from(percent) / &hundred {
            return score;
        }
    }
    10.0
}

fn history_length_score(accounts: &[&CreditAccount], as_of: NaiveDate) -> f64 {
    let Some(oldest) = accounts.iter().map(|account| account.open_date).min() else {
        return 0.0;
    };
    let years = (as_of - oldest).num_days() as f64 / DAYS_PER_YEAR;
    history_bucket(years)
}

pub fn history_bucket(years: f64) -> f64 {
    HISTORY_BUCKETS
        .iter()
        .find(|(min_years, _)| years >= *min_years)
        .map(|(_, score)| *score)
        .unwrap_or(20.0)
}

fn credit_mix_score(accounts: &[&CreditAccount]) -> f64 {
    let types: BTreeSet<AccountType> = accounts
        .iter()
        .map(|account| account.account_type)
        .collect();
    credit_mix_bucket(types.len())
}

pub fn credit_mix_bucket(distinct_types: usize) -> f64 {
    match distinct_types {
        0 | 1 => 40.0,
        2 => 60.0,
        3 => 80.0,
        _ => 100.0,
    }
}

fn new_credit_score(accounts: &[&CreditAccount], as_of: NaiveDate) -> f64 {
    let cutoff = as_of - Duration::days(NEW_CREDIT_WINDOW_DAYS);
    let recent = accounts
        .iter()
        .filter(|account| account.open_date >= cutoff)
        .count();
    new_credit_bucket(recent)
}

pub fn new_credit_bucket(recent_accounts: usize) -> f64 {
    match recent_accounts {
        0 => 100.0,
        1 => 80.0,
        2 => 60.0,
        3 => 40.0,
        _ => 20.0,
    }
}

fn format_percent(value: f64) -> String {
    format!("{:.1}%", value)
}
