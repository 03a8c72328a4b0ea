//! Provider resolution: turn a capp `name:tag` into a ranked list of hub
//! candidates.
//!
//! Providers are independent discovery services. Each configured endpoint is
//! queried in configuration order; one that is unreachable, times out, or
//! answers with undecodable JSON is skipped with a warning, never fatal on
//! its own. An empty aggregate (every provider down or empty-handed) falls
//! back to the default hub when one is configured, and is
//! [`ResolveError::NoProvidersAvailable`] otherwise.

mod candidate;
mod error;
mod resolver;
mod transport;

pub use candidate::Candidate;
pub use error::ResolveError;
pub use resolver::Resolver;
pub use transport::ProviderClient;

#[cfg(feature = "reqwest")]
pub use transport::ReqwestProviderClient;
