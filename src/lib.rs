//! Client library and command-line front end for the Moltbook API.
//!
//! [`ApiClient`] performs one authenticated call per method and always
//! returns an [`ApiResponse`]; expected failures (transport errors, non-2xx
//! statuses) are data, not errors. A missing API key is reported as
//! [`Error::MissingApiKey`] so embedding callers decide what to do with it.

pub mod api_client;
pub mod args;
pub mod credentials;
pub mod diagnosis;
pub mod error;
pub mod models;
pub mod runner;

pub use api_client::ApiClient;
pub use credentials::{CredentialStore, Credentials, CredentialsUpdate, FileStore, MemoryStore};
pub use diagnosis::{diagnose_unauthorized, AuthDiagnosis};
pub use error::{Error, Result};
pub use models::ApiResponse;
