//! Payroll database diagnostics and schema repair.
//!
//! This library provides the connection setup, schema catalog and drift/repair
//! logic behind the `payroll-db` command line tool.
//!
//! # Modules
//!
//! - `config`: `DB_*` environment configuration.
//! - `db`: Single-connection database handle.
//! - `errors`: Error types and MySQL error-code classification.
//! - `schema`: The canonical table catalog and DDL rendering.
//! - `inspect`: `information_schema` introspection (tables, columns, indexes, FKs, counts).
//! - `query`: Guarded ad-hoc read-only SQL.
//! - `drift`: Live schema vs. catalog comparison.
//! - `repair`: Additive repair planning and execution.
//! - `seed`: Reference data (default subscription plans).
//! - `report`: Console rendering.

pub mod config;
pub mod db;
pub mod drift;
pub mod errors;
pub mod inspect;
pub mod query;
pub mod repair;
pub mod report;
pub mod schema;
pub mod seed;
