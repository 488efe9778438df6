//! Credit Bureau API Library
//!
//! This library provides the core functionality of the credit bureau service: the
//! credit scoring engine, the role-based permission matrix, the consent and inquiry
//! ledger, report generation, and the HTTP layer that exposes them over axum.
//!
//! # Modules
//!
//! - `api`: API-layer namespace (handlers and router).
//! - `core`: Domain-layer namespace (scoring, permissions, reports).
//! - `admin_handler`: Bank, user and audit-log administration endpoints.
//! - `audit`: Audit-trail middleware and sensitive-field masking.
//! - `auth`: Bearer-token authentication.
//! - `circuit_breaker`: Circuit breaker guarding background database writes.
//! - `config`: Configuration management.
//! - `consent`: Consent and inquiry ledger.
//! - `db`: Database connection and pool management.
//! - `db_storage`: Database storage operations.
//! - `dispute_handler`: Dispute endpoints.
//! - `errors`: Error handling types.
//! - `handlers`: Application state and core HTTP request handlers.
//! - `models`: Core data models.
//! - `permissions`: Role to permission mapping and access rules.
//! - `rate_limit`: Per-client request throttling.
//! - `report`: Credit report generation.
//! - `routes`: Router assembly.
//! - `scoring`: The credit scoring engine.
//! - `validation`: Data-entry validation.

pub mod api;
pub mod core;

pub mod admin_handler;
pub mod audit;
pub mod auth;
pub mod circuit_breaker;
pub mod config;
pub mod consent;
pub mod db;
pub mod db_storage;
pub mod dispute_handler;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod permissions;
pub mod rate_limit;
pub mod report;
pub mod routes;
pub mod scoring;
pub mod validation;
