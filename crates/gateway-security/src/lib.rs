//! # Gateway Security
//!
//! Component K: authentication plumbing and API-key validation for the LLM
//! Inference Gateway.
//!
//! - **Input validation**: request/body size limits, JSON depth/size
//!   limits, and the key-format check/mask pair provider adapters use on
//!   construction.
//! - **Secrets management**: an in-memory secret store with expiry and
//!   rotation, for credentials loaded from the environment.
//! - **Principal**: re-exported from `gateway-core`; `IdentityProvider` is
//!   the (currently unimplemented) seam for an external SAML/OIDC/LDAP
//!   identity source.
//!
//! ## Example
//!
//! ```rust,no_run
//! use gateway_security::validation::{mask_api_key, validate_api_key_format};
//!
//! let key = "sk-abcdef0123456789abcdef0123456789";
//! validate_api_key_format(key).expect("well-formed key");
//! assert_eq!(mask_api_key(key), "sk-a***6789");
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod secrets;
pub mod validation;

pub use config::{SecretsConfig, ValidationConfig};
pub use error::{Result, SecurityError};
pub use secrets::{SecretStore, SecretStoreBuilder, SecretValue};
pub use validation::{has_permission, IdentityProvider, InputValidator, Principal, ValidationResult};
