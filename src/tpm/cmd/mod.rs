//! Command handlers, grouped by the part of the TPM they operate on.
//!
//! Every handler walks the same phases: parse the inputs, digest them, check
//! the TPM state and the request tag, authorize, then execute. Emitting the
//! response, the response authorization and the audit entry is left to the
//! dispatcher.

mod admin;
mod audit;
mod capability;
mod hash;
mod session;
mod startup;
mod transport;
