//! Cross-module bridge - 모듈 간 호출 계약
//!
//! 모듈 사이에는 타입 동일성이 공유되지 않으므로, 다른 모듈의 객체는
//! 이름 있는 `ModuleService`와 JSON 값만으로 호출한다.

use crate::module::ModuleScope;
use async_trait::async_trait;
use graft_foundation::Result;
use serde_json::Value;

/// 모듈이 외부에 노출하는 서비스
#[async_trait]
pub trait ModuleService: Send + Sync {
    /// 지원하는 연산 이름
    fn operations(&self) -> Vec<String>;

    /// 연산 실행 (`scope`는 서비스를 소유한 모듈의 스코프)
    async fn invoke(&self, operation: &str, payload: Value, scope: &ModuleScope) -> Result<Value>;
}

/// 호출 요청
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceCall {
    /// 대상 모듈 identity
    pub identity: String,
    /// 서비스 컴포넌트 이름 (정규 이름 또는 단순 이름)
    pub service: String,
    pub operation: String,
    pub payload: Value,
}

impl ServiceCall {
    pub fn new(
        identity: impl Into<String>,
        service: impl Into<String>,
        operation: impl Into<String>,
    ) -> Self {
        Self {
            identity: identity.into(),
            service: service.into(),
            operation: operation.into(),
            payload: Value::Null,
        }
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }
}
