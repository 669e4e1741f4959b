use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use thiserror::Error;

use crate::Result;
use crate::http::request::Request;
use crate::http::response::Response;

/// 传输层错误，评测时统一降级为 `RequestFailed`
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("connection failed: {0}")]
    Connection(String),
}

/// HTTP 传输抽象，评测引擎只依赖这个接口
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: Request) -> std::result::Result<Response, TransportError>;
}

/// 基于 reqwest 的默认实现
#[derive(Clone)]
pub struct Client {
    inner: reqwest::Client,
    timeout: Duration,
}

impl Client {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

    pub fn new(timeout: Duration) -> Result<Self> {
        Ok(Self {
            inner: reqwest::Client::builder().timeout(timeout).build()?,
            timeout,
        })
    }

    fn build_headers(
        headers: &[(String, String)],
    ) -> std::result::Result<HeaderMap, TransportError> {
        let mut map = HeaderMap::new();
        for (key, value) in headers {
            let name = HeaderName::from_bytes(key.as_bytes()).map_err(|e| {
                TransportError::InvalidRequest(format!("header name '{}': {}", key, e))
            })?;
            let value = HeaderValue::from_str(value).map_err(|e| {
                TransportError::InvalidRequest(format!("header value for '{}': {}", key, e))
            })?;
            map.append(name, value);
        }
        Ok(map)
    }
}

#[async_trait]
impl Transport for Client {
    async fn execute(&self, request: Request) -> std::result::Result<Response, TransportError> {
        let url = reqwest::Url::parse(&request.url).map_err(|e| {
            TransportError::InvalidRequest(format!("url '{}': {}", request.url, e))
        })?;
        let headers = Self::build_headers(&request.headers)?;
        let timeout = request.timeout.unwrap_or(self.timeout);

        let mut req = self
            .inner
            .request(request.method.into(), url)
            .headers(headers)
            .timeout(timeout);

        if let Some(body) = request.body {
            req = req.body(body);
        }

        let start = Instant::now();
        let response = req
            .send()
            .await
            .map_err(|e| classify(e, timeout))?;

        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response.text().await.map_err(|e| classify(e, timeout))?;
        let duration = start.elapsed();

        Ok(Response::new(status, headers, body, duration))
    }
}

fn classify(err: reqwest::Error, timeout: Duration) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout(timeout)
    } else {
        TransportError::Connection(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_headers_keeps_duplicates() {
        let headers = vec![
            ("Accept".to_string(), "application/json".to_string()),
            ("X-Tag".to_string(), "a".to_string()),
            ("X-Tag".to_string(), "b".to_string()),
        ];
        let map = Client::build_headers(&headers).unwrap();
        assert_eq!(map.get("accept").unwrap(), "application/json");
        assert_eq!(map.get_all("x-tag").iter().count(), 2);
    }

    #[test]
    fn test_build_headers_rejects_invalid_name() {
        let headers = vec![("Bad Header".to_string(), "x".to_string())];
        let err = Client::build_headers(&headers).unwrap_err();
        assert!(matches!(err, TransportError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_execute_rejects_unparseable_url() {
        let client = Client::new(Client::DEFAULT_TIMEOUT).unwrap();
        let request = Request::new(crate::http::Method::Get, "{{base}}/ping");
        let err = client.execute(request).await.unwrap_err();
        assert!(matches!(err, TransportError::InvalidRequest(_)));
    }
}
