use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;
use futures_util::Stream;
use url::Url;

/// A boxed stream of response-body chunks.
pub type BoxStream<'a, T> = Pin<Box<dyn Stream<Item = T> + Send + 'a>>;

/// Transport abstraction over the hub's HTTP surface.
///
/// Implementations own connection handling and timeouts for the request
/// setup; the [`HubClient`](crate::HubClient) layers status interpretation,
/// JSON decoding, and per-chunk read deadlines on top.
pub trait HubTransport: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// GET a text body, returning the HTTP status alongside it so the
    /// caller can distinguish 404 from other failures.
    fn get_text(
        &self,
        url: &Url,
    ) -> impl Future<Output = Result<(u16, String), Self::Error>> + Send;

    /// Open a streaming GET of the payload body.
    fn stream(
        &self,
        url: &Url,
    ) -> impl Future<Output = Result<BoxStream<'static, Result<Bytes, Self::Error>>, Self::Error>> + Send;
}

#[cfg(feature = "reqwest")]
mod reqwest_impl {
    use std::time::Duration;

    use super::*;

    /// Production hub transport using reqwest.
    ///
    /// `deadline` bounds the metadata request end to end and the connection
    /// setup of payload streams; chunk-level deadlines for long payload
    /// bodies are enforced by the client above this layer.
    pub struct ReqwestTransport {
        client: reqwest::Client,
        deadline: Duration,
    }

    impl ReqwestTransport {
        pub fn new(deadline: Duration) -> Result<Self, reqwest::Error> {
            let client = reqwest::Client::builder()
                .connect_timeout(deadline)
                .build()?;
            Ok(Self { client, deadline })
        }
    }

    impl HubTransport for ReqwestTransport {
        type Error = reqwest::Error;

        async fn get_text(&self, url: &Url) -> Result<(u16, String), Self::Error> {
            let response = self
                .client
                .get(url.clone())
                .timeout(self.deadline)
                .send()
                .await?;
            let status = response.status().as_u16();
            let body = response.text().await?;
            Ok((status, body))
        }

        async fn stream(
            &self,
            url: &Url,
        ) -> Result<BoxStream<'static, Result<Bytes, Self::Error>>, Self::Error> {
            let response = self
                .client
                .get(url.clone())
                .send()
                .await?
                .error_for_status()?;
            Ok(Box::pin(response.bytes_stream()))
        }
    }
}

#[cfg(feature = "reqwest")]
pub use reqwest_impl::ReqwestTransport;
