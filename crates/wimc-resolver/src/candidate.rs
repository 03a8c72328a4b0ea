use url::Url;

/// A resolved hub service URL with its failover position.
///
/// Candidates live only for the resolution call that produced them; they are
/// never persisted on the task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Base URL of the hub service to try.
    pub url: Url,
    /// Index of the provider (in configuration order) that returned this
    /// candidate. Lower wins.
    pub provider_index: usize,
    /// Rank within the provider's response. Providers that rank explicitly
    /// are honored; unranked entries keep response order after the ranked
    /// ones.
    pub rank: u32,
}
