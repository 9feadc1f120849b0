//! Self-describing serialization of a [`crate::Response`] for the cache
//! layer: a plain mapping of strings/numbers, not a bincode-style byte dump,
//! so cached entries are readable across backends.

use std::time::Duration;

use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Version};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::{RequestInfo, Response, ResponseBuilder};

#[derive(Debug, thiserror::Error)]
pub enum ResponseError {
    #[error("invalid URL in serialized response: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("invalid status code in serialized response: {0}")]
    InvalidStatus(#[from] http::status::InvalidStatusCode),
    #[error("invalid method in serialized response: {0}")]
    InvalidMethod(#[from] http::method::InvalidMethod),
    #[error("invalid header name: {0}")]
    InvalidHeaderName(#[from] http::header::InvalidHeaderName),
    #[error("invalid header value: {0}")]
    InvalidHeaderValue(#[from] http::header::InvalidHeaderValue),
    #[error("malformed HTTP version string: {0}")]
    InvalidVersion(String),
}

#[derive(Serialize, Deserialize)]
struct SerializedRequest {
    url: String,
    method: String,
    headers: Vec<(String, String)>,
}

#[derive(Serialize, Deserialize)]
struct SerializedResponse {
    version: String,
    status: u16,
    reason: String,
    method: String,
    url: String,
    real_url: String,
    content: String,
    charset: Option<String>,
    cookies: Vec<(String, String)>,
    headers: Vec<(String, String)>,
    history: Vec<String>,
    request: SerializedRequest,
    elapsed: f64,
    error: Option<String>,
}

fn version_to_string(version: Version) -> String {
    match version {
        Version::HTTP_09 => "0.9".to_string(),
        Version::HTTP_10 => "1.0".to_string(),
        Version::HTTP_11 => "1.1".to_string(),
        Version::HTTP_2 => "2".to_string(),
        Version::HTTP_3 => "3".to_string(),
        _ => "1.1".to_string(),
    }
}

fn version_from_str(s: &str) -> Result<Version, ResponseError> {
    Ok(match s {
        "0.9" => Version::HTTP_09,
        "1.0" => Version::HTTP_10,
        "1.1" => Version::HTTP_11,
        "2" => Version::HTTP_2,
        "3" => Version::HTTP_3,
        other => return Err(ResponseError::InvalidVersion(other.to_string())),
    })
}

fn headers_to_pairs(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or_default().to_string()))
        .collect()
}

fn headers_from_pairs(pairs: &[(String, String)]) -> Result<HeaderMap, ResponseError> {
    let mut headers = HeaderMap::new();
    for (k, v) in pairs {
        headers.insert(HeaderName::try_from(k.as_str())?, HeaderValue::try_from(v.as_str())?);
    }
    Ok(headers)
}

impl Response {
    /// Produces a self-describing JSON mapping: strings for URLs, seconds
    /// for elapsed, body decoded as UTF-8 (lossily, since a cached body is
    /// assumed to be textual or already-decoded).
    pub fn serialize(&self) -> serde_json::Value {
        let serialized = SerializedResponse {
            version: version_to_string(self.version),
            status: self.status.as_u16(),
            reason: self.reason.clone(),
            method: self.method.to_string(),
            url: self.url.to_string(),
            real_url: self.real_url.to_string(),
            content: String::from_utf8_lossy(&self.content).into_owned(),
            charset: self.charset.clone(),
            cookies: self.cookies.clone(),
            headers: headers_to_pairs(&self.headers),
            history: self.history.iter().map(|u| u.to_string()).collect(),
            request: SerializedRequest {
                url: self.request.url.to_string(),
                method: self.request.method.to_string(),
                headers: headers_to_pairs(&self.request.headers),
            },
            elapsed: self.elapsed.as_secs_f64(),
            error: self.error.clone(),
        };
        serde_json::to_value(serialized).expect("Response serializes to a JSON object")
    }

    /// Reconstructs a [`Response`] from [`Response::serialize`]'s output,
    /// always marked `is_cached = true`.
    pub fn deserialize(value: serde_json::Value) -> Result<Response, ResponseError> {
        let s: SerializedResponse = serde_json::from_value(value)
            .map_err(|e| ResponseError::InvalidVersion(e.to_string()))?;

        let request = RequestInfo {
            url: Url::parse(&s.request.url)?,
            method: Method::try_from(s.request.method.as_str())?,
            headers: headers_from_pairs(&s.request.headers)?,
        };

        let mut response = ResponseBuilder::new(
            StatusCode::from_u16(s.status)?,
            Method::try_from(s.method.as_str())?,
            Url::parse(&s.url)?,
        )
        .version(version_from_str(&s.version)?)
        .reason(s.reason)
        .real_url(Url::parse(&s.real_url)?)
        .content(Bytes::from(s.content.into_bytes()))
        .cookies(s.cookies)
        .headers(headers_from_pairs(&s.headers)?)
        .history(
            s.history
                .iter()
                .map(|u| Url::parse(u))
                .collect::<Result<Vec<_>, _>>()?,
        )
        .request(request)
        .elapsed(Duration::from_secs_f64(s.elapsed));

        response = match s.charset {
            Some(charset) => response.charset(charset),
            None => response,
        };
        response = match s.error {
            Some(error) => response.error(error),
            None => response,
        };

        let mut built = response.build();
        built.set_is_cached(true);
        Ok(built)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ResponseBuilder;

    fn sample() -> Response {
        ResponseBuilder::new(
            StatusCode::OK,
            Method::GET,
            Url::parse("https://example.com/x").unwrap(),
        )
        .content(Bytes::from_static(b"hello world"))
        .elapsed(Duration::from_millis(250))
        .build()
    }

    #[test]
    fn round_trip_preserves_fields_and_marks_cached() {
        let original = sample();
        let value = original.serialize();
        let restored = Response::deserialize(value).unwrap();

        assert_eq!(restored.status, original.status);
        assert_eq!(restored.url, original.url);
        assert_eq!(restored.content, original.content);
        assert!(restored.is_cached);
        assert!(!original.is_cached);
    }

    #[test]
    fn round_trip_preserves_elapsed_within_float_precision() {
        let original = sample();
        let restored = Response::deserialize(original.serialize()).unwrap();
        let diff = (restored.elapsed.as_secs_f64() - original.elapsed.as_secs_f64()).abs();
        assert!(diff < 1e-6);
    }
}
