//! Upstream 401 interception.
//!
//! Handlers that call other services can run each upstream response through
//! [`process_unauthorized_response`]. A 401 is turned into a failure carrying
//! an `unauthorized` envelope, so `?` short-circuits the handler and the
//! wrapper passes that envelope to the caller unchanged.

use async_trait::async_trait;
use bytes::Bytes;

use crate::classify::CaughtError;
use crate::factory::ResponseFactory;
use crate::response::HttpResponse;

/// An upstream response with a status and a text body.
#[async_trait]
pub trait UpstreamResponse: Send {
    /// Numeric HTTP status.
    fn status(&self) -> u16;

    /// Read the whole body as text.
    async fn text(self) -> anyhow::Result<String>
    where
        Self: Sized;
}

#[async_trait]
impl<T> UpstreamResponse for http::Response<T>
where
    T: Into<Bytes> + Send,
{
    fn status(&self) -> u16 {
        http::Response::status(self).as_u16()
    }

    async fn text(self) -> anyhow::Result<String> {
        let body: Bytes = self.into_body().into();
        Ok(String::from_utf8_lossy(&body).into_owned())
    }
}

#[cfg(feature = "reqwest")]
#[async_trait]
impl UpstreamResponse for reqwest::Response {
    fn status(&self) -> u16 {
        reqwest::Response::status(self).as_u16()
    }

    async fn text(self) -> anyhow::Result<String> {
        Ok(reqwest::Response::text(self).await?)
    }
}

/// Failure signalled by the interceptor.
#[derive(Debug, thiserror::Error)]
pub enum InterceptError {
    /// The upstream answered 401; carries the envelope to return.
    #[error("upstream responded with 401 Unauthorized")]
    Unauthorized(HttpResponse),

    /// The body of a 401 response could not be read.
    #[error("failed to read upstream response body: {0}")]
    Body(anyhow::Error),
}

impl From<InterceptError> for CaughtError {
    fn from(err: InterceptError) -> Self {
        match err {
            InterceptError::Unauthorized(response) => Self::Response(response),
            InterceptError::Body(source) => Self::from(source),
        }
    }
}

/// Fail with an `unauthorized` envelope on 401, pass anything else through.
pub async fn process_unauthorized_response<R: UpstreamResponse>(
    response: R,
) -> Result<R, InterceptError> {
    process_unauthorized_response_with(ResponseFactory::standard(), response).await
}

/// [`process_unauthorized_response`] with an explicit factory.
pub async fn process_unauthorized_response_with<R: UpstreamResponse>(
    factory: &ResponseFactory,
    response: R,
) -> Result<R, InterceptError> {
    if response.status() != http::StatusCode::UNAUTHORIZED.as_u16() {
        return Ok(response);
    }

    let body = response.text().await.map_err(InterceptError::Body)?;
    tracing::debug!(body_len = body.len(), "upstream responded 401, short-circuiting");
    Err(InterceptError::Unauthorized(factory.unauthorized(body)))
}
