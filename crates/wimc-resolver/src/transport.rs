use std::future::Future;

use url::Url;

/// Transport used to query a provider's discovery endpoint.
///
/// Returns the raw response body; JSON decoding happens in the resolver so
/// that malformed data is handled the same way as an unreachable provider
/// (skip and continue). Implementations handle their own timeouts.
///
/// [`ReqwestProviderClient`] is the production implementation; tests use
/// in-memory mocks.
///
/// [`ReqwestProviderClient`]: crate::ReqwestProviderClient
pub trait ProviderClient: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Query one provider for candidates serving `name:tag`.
    fn discover(
        &self,
        endpoint: &Url,
        name: &str,
        tag: &str,
    ) -> impl Future<Output = Result<String, Self::Error>> + Send;
}

#[cfg(feature = "reqwest")]
mod reqwest_impl {
    use std::time::Duration;

    use super::*;

    /// Production provider transport using reqwest.
    pub struct ReqwestProviderClient {
        client: reqwest::Client,
    }

    impl ReqwestProviderClient {
        /// Build a client whose requests carry `deadline` end to end.
        pub fn new(deadline: Duration) -> Result<Self, reqwest::Error> {
            let client = reqwest::Client::builder().timeout(deadline).build()?;
            Ok(Self { client })
        }
    }

    impl ProviderClient for ReqwestProviderClient {
        type Error = reqwest::Error;

        async fn discover(
            &self,
            endpoint: &Url,
            name: &str,
            tag: &str,
        ) -> Result<String, Self::Error> {
            let url = format!("{}/capps", endpoint.as_str().trim_end_matches('/'));
            let response = self
                .client
                .get(url)
                .query(&[("name", name), ("tag", tag)])
                .send()
                .await?
                .error_for_status()?;
            response.text().await
        }
    }
}

#[cfg(feature = "reqwest")]
pub use reqwest_impl::ReqwestProviderClient;
