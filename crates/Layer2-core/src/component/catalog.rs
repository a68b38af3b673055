//! Type Catalog - 유닛 `type` 키 → 컴포넌트 팩토리

use super::Component;
use crate::module::ModuleScope;
use crate::namespace::ResolvedUnit;
use graft_foundation::Result;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// 컴포넌트 팩토리
pub trait ComponentFactory: Send + Sync {
    fn create(&self, unit: &ResolvedUnit, scope: &ModuleScope) -> Result<Arc<dyn Component>>;
}

impl<F> ComponentFactory for F
where
    F: Fn(&ResolvedUnit, &ModuleScope) -> Result<Arc<dyn Component>> + Send + Sync,
{
    fn create(&self, unit: &ResolvedUnit, scope: &ModuleScope) -> Result<Arc<dyn Component>> {
        self(unit, scope)
    }
}

/// 호스트에 링크된 구현 목록
pub struct TypeCatalog {
    factories: RwLock<HashMap<String, Arc<dyn ComponentFactory>>>,
}

impl TypeCatalog {
    /// 빈 카탈로그
    pub fn new() -> Self {
        Self {
            factories: RwLock::new(HashMap::new()),
        }
    }

    /// 기본 타입이 등록된 카탈로그
    pub fn with_builtins() -> Self {
        let catalog = Self::new();
        super::builtin::register_builtins(&catalog);
        catalog
    }

    /// 구현 등록 (같은 키는 교체)
    pub fn register(&self, key: impl Into<String>, factory: Arc<dyn ComponentFactory>) {
        let key = key.into();
        if self.factories.write().insert(key.clone(), factory).is_some() {
            warn!("Replaced component factory for type {}", key);
        } else {
            debug!("Registered component type {}", key);
        }
    }

    /// 클로저로 구현 등록
    pub fn register_fn<F>(&self, key: impl Into<String>, factory: F)
    where
        F: Fn(&ResolvedUnit, &ModuleScope) -> Result<Arc<dyn Component>> + Send + Sync + 'static,
    {
        self.register(key, Arc::new(factory));
    }

    pub fn get(&self, key: &str) -> Option<Arc<dyn ComponentFactory>> {
        self.factories.read().get(key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.factories.read().contains_key(key)
    }

    pub fn unregister(&self, key: &str) -> bool {
        self.factories.write().remove(key).is_some()
    }

    /// 등록된 키 (정렬)
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<_> = self.factories.read().keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.factories.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.read().is_empty()
    }
}

impl Default for TypeCatalog {
    fn default() -> Self {
        Self::new()
    }
}
