//! Exchange handlers.
//!
//! One handler per element family. Every operation validates its
//! parameters before any collaborator is called, resolves who owns the
//! element from the caller's correlation properties, delegates to the
//! metadata repository and returns the result with correlation headers
//! attached.

mod connection;
mod external_reference;
mod process;
mod support;

pub use connection::ConnectionExchangeHandler;
pub use external_reference::ExternalReferenceExchangeHandler;
pub use process::ProcessExchangeHandler;
