//! Verband Service - Association membership lifecycle and billing
//!
//! This crate implements memberships of dojos and individuals in the
//! Verband: sequential membership numbers, invoices with VAT in integer
//! cents, SEPA direct debit mandates and an append-only audit trail,
//! exposed as a REST API.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
