use serde::Deserialize;
use url::Url;

use crate::{Candidate, ProviderClient, ResolveError};

/// Wire shape of a provider discovery response.
#[derive(Debug, Deserialize)]
struct DiscoveryResponse {
    candidates: Vec<CandidateEntry>,
}

#[derive(Debug, Deserialize)]
struct CandidateEntry {
    url: Url,
    rank: Option<u32>,
}

/// Queries configured providers and aggregates their candidates into one
/// ordered failover list.
pub struct Resolver<C: ProviderClient> {
    providers: Vec<Url>,
    fallback: Option<Url>,
    client: C,
}

impl<C: ProviderClient> Resolver<C> {
    pub fn new(providers: Vec<Url>, client: C) -> Self {
        Self {
            providers,
            fallback: None,
            client,
        }
    }

    /// Configure a default hub consulted only when no provider yields a
    /// candidate.
    pub fn with_fallback(mut self, hub: Option<Url>) -> Self {
        self.fallback = hub;
        self
    }

    /// Resolve `name:tag` to an ordered candidate list.
    ///
    /// Ordering: provider configuration order first, then within one
    /// provider explicitly ranked entries ascending, then unranked entries
    /// in response order.
    pub async fn resolve(&self, name: &str, tag: &str) -> Result<Vec<Candidate>, ResolveError> {
        let mut candidates = Vec::new();

        for (index, endpoint) in self.providers.iter().enumerate() {
            let body = match self.client.discover(endpoint, name, tag).await {
                Ok(body) => body,
                Err(e) => {
                    tracing::warn!(provider = %endpoint, error = %e, "provider unreachable, skipping");
                    continue;
                }
            };
            let response: DiscoveryResponse = match serde_json::from_str(&body) {
                Ok(response) => response,
                Err(e) => {
                    tracing::warn!(provider = %endpoint, error = %e, "malformed provider response, skipping");
                    continue;
                }
            };
            candidates.extend(order_within_provider(index, response.candidates));
        }

        if candidates.is_empty() {
            if let Some(hub) = &self.fallback {
                tracing::warn!(name, tag, hub = %hub, "no provider yielded candidates, using default hub");
                return Ok(vec![Candidate {
                    url: hub.clone(),
                    provider_index: self.providers.len(),
                    rank: 0,
                }]);
            }
            tracing::warn!(name, tag, "no provider yielded candidates");
            return Err(ResolveError::NoProvidersAvailable {
                name: name.to_string(),
                tag: tag.to_string(),
            });
        }

        candidates.sort_by_key(|c| (c.provider_index, c.rank));
        tracing::debug!(name, tag, count = candidates.len(), "resolved candidates");
        Ok(candidates)
    }
}

/// Assign effective ranks inside one provider's response: explicit ranks
/// keep their value, unranked entries follow in response order.
fn order_within_provider(provider_index: usize, entries: Vec<CandidateEntry>) -> Vec<Candidate> {
    let max_explicit = entries.iter().filter_map(|e| e.rank).max();
    let mut next_implicit = max_explicit.map_or(0, |r| r.saturating_add(1));

    entries
        .into_iter()
        .map(|entry| {
            let rank = match entry.rank {
                Some(rank) => rank,
                None => {
                    let rank = next_implicit;
                    next_implicit = next_implicit.saturating_add(1);
                    rank
                }
            };
            Candidate {
                url: entry.url,
                provider_index,
                rank,
            }
        })
        .collect()
}
