//! External identity provider federation.
//!
//! This module provides the round trips to the external provider:
//!
//! - Authorization code exchange
//! - Identity lookup from a provider token
//! - Delegated directory group lookup

pub mod directory;
pub mod error;
pub mod provider;
pub mod resolver;

pub use directory::{DirectoryClient, ServiceAccountKey};
pub use error::IdpError;
pub use provider::{OAuthIdentityResolver, TokenResponse, authorization_url};
pub use resolver::{IdentityResolver, ProviderIdentity, ResolvedIdentity};
