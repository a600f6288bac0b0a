//! This module defines the data structures shared across the exchange
//! handlers, grouped by element family.

pub mod connection;
pub mod correlation;
pub mod element;
pub mod external_reference;
pub mod process;
