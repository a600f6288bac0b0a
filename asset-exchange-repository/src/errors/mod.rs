//! Error types for the exchange handlers.
//!
//! This module provides the single error type returned by every exchange
//! handler and collaborator operation.

mod exchange_error;

pub use exchange_error::{ErrorKind, ExchangeError, Result};
