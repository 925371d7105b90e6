//! Core Kernel - Foundational types for the loan servicing system
//!
//! This crate provides the building blocks used across all domain modules:
//! - Money with precise decimal arithmetic
//! - Strongly-typed identifiers
//! - Caller identity and role-based authorization

pub mod access;
pub mod error;
pub mod identifiers;
pub mod money;

pub use access::{authorize, AccessError, CallerIdentity, ProtectedOp, Role};
pub use error::CoreError;
pub use identifiers::{BounceCaseId, InstallmentId, LoanId, PaymentId};
pub use money::{Money, MoneyError};
