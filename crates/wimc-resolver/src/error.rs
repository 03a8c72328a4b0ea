use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResolveError {
    /// Every configured provider was unreachable or returned no candidates.
    #[error("no providers available for {name}:{tag}")]
    NoProvidersAvailable { name: String, tag: String },
}
