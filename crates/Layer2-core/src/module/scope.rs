//! Module Scope - 명시적으로 전달되는 모듈 해석 컨텍스트
//!
//! 시작 훅, 정리, 요청 처리 등 모듈 범위 해석이 필요한 모든 작업은
//! 스레드 로컬 대신 이 값을 인자로 받는다.

use super::properties::ModuleProperties;
use crate::namespace::{NamespaceResolver, ResolvedUnit};
use graft_foundation::Result;
use std::fmt;
use std::sync::Arc;

#[derive(Clone)]
pub struct ModuleScope {
    identity: String,
    generation: String,
    resolver: Arc<NamespaceResolver>,
    properties: Arc<ModuleProperties>,
}

impl ModuleScope {
    pub fn new(
        identity: impl Into<String>,
        resolver: Arc<NamespaceResolver>,
        properties: ModuleProperties,
    ) -> Self {
        Self {
            identity: identity.into(),
            generation: resolver.generation().to_string(),
            resolver,
            properties: Arc::new(properties),
        }
    }

    /// 논리 identity (루트 이름)
    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn generation(&self) -> &str {
        &self.generation
    }

    pub fn resolver(&self) -> &Arc<NamespaceResolver> {
        &self.resolver
    }

    pub fn properties(&self) -> &ModuleProperties {
        &self.properties
    }

    /// 이 모듈의 리졸버로 유닛 해석
    pub fn resolve_unit(&self, name: &str) -> Result<Arc<ResolvedUnit>> {
        self.resolver.resolve_unit(name)
    }

    /// 이 모듈의 리졸버로 리소스 조회
    pub fn resource(&self, path: &str) -> Result<Vec<u8>> {
        self.resolver.resource(path)
    }
}

impl fmt::Debug for ModuleScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleScope")
            .field("identity", &self.identity)
            .field("generation", &self.generation)
            .finish()
    }
}
