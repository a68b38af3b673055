//! Request / Response - 라우터 입출력

use graft_foundation::{Error, IdentityMode, InterceptConfig, Result};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

// ============================================================================
// Request
// ============================================================================

/// 인바운드 요청 (메서드, 경로, 쿼리, 헤더)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Request {
    method: String,
    path: String,
    query: Option<String>,
    /// 소문자 키
    headers: HashMap<String, String>,
    body: String,
}

impl Request {
    /// `METHOD uri` 로 요청 생성 (`/a/b?x=1`)
    pub fn new(method: &str, uri: &str) -> Result<Self> {
        if !uri.starts_with('/') {
            return Err(Error::InvalidInput(format!(
                "request uri must start with '/': {}",
                uri
            )));
        }
        let (path, query) = match uri.split_once('?') {
            Some((path, query)) => (path, Some(query.to_string())),
            None => (uri, None),
        };
        Ok(Self {
            method: method.to_ascii_uppercase(),
            path: path.to_string(),
            query,
            headers: HashMap::new(),
            body: String::new(),
        })
    }

    pub fn get(uri: &str) -> Result<Self> {
        Self::new("GET", uri)
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    /// 헤더 (대소문자 무시)
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// 디코딩된 쿼리 파라미터 (첫 번째 값)
    pub fn query_param(&self, name: &str) -> Option<String> {
        let query = self.query.as_deref()?;
        url::form_urlencoded::parse(query.as_bytes())
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.into_owned())
    }

    /// 첫 번째 path segment (디코딩, `/`는 None)
    pub fn first_segment(&self) -> Option<String> {
        let segment = self.path.trim_start_matches('/').split('/').next()?;
        if segment.is_empty() {
            return None;
        }
        urlencoding::decode(segment).ok().map(|s| s.into_owned())
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.query {
            Some(query) => write!(f, "{} {}?{}", self.method, self.path, query),
            None => write!(f, "{} {}", self.method, self.path),
        }
    }
}

// ============================================================================
// IdentityExtractor
// ============================================================================

/// 설정된 방식으로 요청에서 모듈 identity 토큰 추출
#[derive(Debug, Clone, PartialEq)]
pub struct IdentityExtractor {
    mode: IdentityMode,
    key: String,
}

impl IdentityExtractor {
    pub fn new(mode: IdentityMode, key: impl Into<String>) -> Self {
        Self {
            mode,
            key: key.into(),
        }
    }

    pub fn from_config(config: &InterceptConfig) -> Self {
        Self::new(config.identity_mode, config.identity_key.clone())
    }

    pub fn mode(&self) -> IdentityMode {
        self.mode
    }

    pub fn extract(&self, request: &Request) -> Option<String> {
        let token = match self.mode {
            IdentityMode::Header => request.header(&self.key).map(str::to_string),
            IdentityMode::Parameter => request.query_param(&self.key),
            IdentityMode::Url => request.first_segment(),
        }?;
        let token = token.trim();
        (!token.is_empty()).then(|| token.to_string())
    }
}

// ============================================================================
// Response
// ============================================================================

/// 응답
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

impl Response {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: BTreeMap::new(),
            body: body.into(),
        }
    }

    pub fn ok(body: impl Into<String>) -> Self {
        Self::new(200, body)
    }

    pub fn not_found(path: &str) -> Self {
        Self::new(404, format!("no handler for {}", path))
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_mode_takes_first_segment() {
        let extractor = IdentityExtractor::new(IdentityMode::Url, "Plugin-Meta");
        let request = Request::get("/pluginA/list").unwrap();
        assert_eq!(extractor.extract(&request).as_deref(), Some("pluginA"));
        assert_eq!(extractor.extract(&Request::get("/").unwrap()), None);
        assert_eq!(
            extractor.extract(&Request::get("/my%20mod/x?y=1").unwrap()).as_deref(),
            Some("my mod")
        );
    }

    #[test]
    fn test_header_mode_is_case_insensitive() {
        let extractor = IdentityExtractor::new(IdentityMode::Header, "Plugin-Meta");
        let request = Request::get("/list")
            .unwrap()
            .with_header("plugin-meta", "pluginB");
        assert_eq!(extractor.extract(&request).as_deref(), Some("pluginB"));
        assert_eq!(extractor.extract(&Request::get("/list").unwrap()), None);
    }

    #[test]
    fn test_parameter_mode_decodes_value() {
        let extractor = IdentityExtractor::new(IdentityMode::Parameter, "module");
        let request = Request::get("/list?x=1&module=plugin%2DC").unwrap();
        assert_eq!(extractor.extract(&request).as_deref(), Some("plugin-C"));
        let blank = Request::get("/list?module=").unwrap();
        assert_eq!(extractor.extract(&blank), None);
    }

    #[test]
    fn test_request_requires_absolute_uri() {
        assert!(matches!(Request::get("list"), Err(Error::InvalidInput(_))));
        let request = Request::new("post", "/a?b=c").unwrap();
        assert_eq!(request.method(), "POST");
        assert_eq!(request.to_string(), "POST /a?b=c");
    }
}
