use crate::http::types::Status;
use reqwest::header::HeaderMap as Headers;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Response {
    pub status: Status,
    pub headers: Headers,
    pub body: String,
    pub duration: Duration,
}

impl Response {
    pub fn new(status: u16, headers: Headers, body: String, duration: Duration) -> Self {
        Self {
            status: Status::new(status),
            headers,
            body,
            duration,
        }
    }

    /// 同名 header 的所有值，非 UTF-8 的值被忽略
    pub fn header_values(&self, name: &str) -> Vec<&str> {
        self.headers
            .get_all(name)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect()
    }
}
