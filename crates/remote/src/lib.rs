//! Outbound side of pickroute: the remote catalog client and the
//! credential cache that supplies its bearer tokens.
//!
//! `CatalogClient` implements `pickroute_core::CatalogApi`;
//! `OAuthRefresher` implements `pickroute_core::TokenRefresher`.

pub mod catalog;
pub mod credentials;

pub use catalog::CatalogClient;
pub use credentials::{CredentialCache, OAuthRefresher};
