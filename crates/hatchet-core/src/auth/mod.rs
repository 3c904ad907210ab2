//! Credential management for the Hatchet service.
//!
//! This module provides:
//! - `Token`: One credential with an expiry, checked against wall-clock time
//! - `CredentialManager`: The refresh -> bearer -> access chain, acquired lazily
//!
//! Only password login can fail permanently; every other step can be retried
//! by calling `ensure_access_token` again.

pub mod manager;
pub mod token;

pub use manager::{ChainState, CredentialManager};
pub use token::{Expiry, Token};
