//! REST client for the Statcheck backend deployment.
//!
//! One client implements all three backend seams the identity core and the
//! list model are written against: credential validation
//! ([`statcheck_auth::CredentialValidator`]), the canonical user directory
//! ([`statcheck_auth::UserDirectory`]), and list persistence
//! ([`statcheck_lists::ListStore`]).

mod client;

pub use client::BackendClient;
