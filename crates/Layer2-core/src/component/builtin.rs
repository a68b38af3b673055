//! Builtin component types
//!
//! | 타입 키 | 역할 |
//! |---------|------|
//! | `graft.Entry` | `type`이 없는 엔트리 유닛 |
//! | `graft.StaticRoutes` | `[properties.routes]` 고정 응답 라우트 |
//! | `graft.PropertyService` | 모듈 속성 조회 서비스 |

use super::{Component, TypeCatalog};
use crate::bridge::ModuleService;
use crate::module::ModuleScope;
use crate::namespace::{ResolvedUnit, DEFAULT_ENTRY_TYPE};
use crate::router::{FnHandler, Handler, HandlerMapping, Request, RouteTable, ANY_METHOD};
use async_trait::async_trait;
use graft_foundation::{Error, Result};
use serde_json::{json, Value};
use std::sync::Arc;

pub const STATIC_ROUTES_TYPE: &str = "graft.StaticRoutes";
pub const PROPERTY_SERVICE_TYPE: &str = "graft.PropertyService";

/// 기본 타입 등록
pub fn register_builtins(catalog: &TypeCatalog) {
    catalog.register_fn(DEFAULT_ENTRY_TYPE, |unit, scope| {
        Ok(Arc::new(EntryComponent::new(unit, scope)) as Arc<dyn Component>)
    });
    catalog.register_fn(STATIC_ROUTES_TYPE, |unit, scope| {
        Ok(Arc::new(StaticRoutes::from_unit(unit, scope)?) as Arc<dyn Component>)
    });
    catalog.register_fn(PROPERTY_SERVICE_TYPE, |_unit, _scope| {
        Ok(Arc::new(PropertyService) as Arc<dyn Component>)
    });
}

// ============================================================================
// EntryComponent
// ============================================================================

/// 역할 없는 엔트리
#[derive(Debug, Clone)]
pub struct EntryComponent {
    name: String,
    generation: String,
}

impl EntryComponent {
    fn new(unit: &ResolvedUnit, scope: &ModuleScope) -> Self {
        Self {
            name: unit.name().to_string(),
            generation: scope.generation().to_string(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn generation(&self) -> &str {
        &self.generation
    }
}

impl Component for EntryComponent {}

// ============================================================================
// StaticRoutes
// ============================================================================

/// 유닛 속성으로 선언하는 고정 응답 라우트
///
/// ```toml
/// type = "graft.StaticRoutes"
///
/// [properties.routes]
/// "/foo/hello" = "hello from {generation}"
/// "POST /foo/echo" = "posted"
/// ```
///
/// 키에 메서드가 없으면 모든 메서드에 매칭된다. 본문의 `{identity}`,
/// `{generation}`은 생성 시점 값으로 치환된다.
pub struct StaticRoutes {
    table: RouteTable,
}

impl StaticRoutes {
    fn from_unit(unit: &ResolvedUnit, scope: &ModuleScope) -> Result<Self> {
        let mut table = RouteTable::new(unit.name());
        let Some(routes) = unit.unit().properties.get("routes") else {
            return Ok(Self { table });
        };
        let routes = routes.as_table().ok_or_else(|| {
            Error::Component(format!("{}: properties.routes must be a table", unit.name()))
        })?;

        for (key, body) in routes {
            let body = body.as_str().ok_or_else(|| {
                Error::Component(format!("{}: route '{}' body must be a string", unit.name(), key))
            })?;
            let (method, path) = match key.split_once(' ') {
                Some((method, path)) => (method.trim(), path.trim()),
                None => (ANY_METHOD, key.trim()),
            };
            if !path.starts_with('/') {
                return Err(Error::Component(format!(
                    "{}: route path '{}' must start with '/'",
                    unit.name(),
                    path
                )));
            }
            let body = body
                .replace("{identity}", scope.identity())
                .replace("{generation}", scope.generation());
            table.insert(method, path, FnHandler::text(body));
        }
        Ok(Self { table })
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

impl HandlerMapping for StaticRoutes {
    fn name(&self) -> &str {
        self.table.name()
    }

    fn lookup(&self, request: &Request) -> Option<Handler> {
        self.table.lookup(request)
    }
}

impl Component for StaticRoutes {
    fn handler_mapping(self: Arc<Self>) -> Option<Arc<dyn HandlerMapping>> {
        Some(self)
    }
}

// ============================================================================
// PropertyService
// ============================================================================

/// 소유 모듈의 속성 조회
///
/// - `get` `{"key": "..."}` → 값 (없으면 null)
/// - `keys` → 키 목록
#[derive(Debug, Default, Clone, Copy)]
pub struct PropertyService;

#[async_trait]
impl ModuleService for PropertyService {
    fn operations(&self) -> Vec<String> {
        vec!["get".to_string(), "keys".to_string()]
    }

    async fn invoke(&self, operation: &str, payload: Value, scope: &ModuleScope) -> Result<Value> {
        match operation {
            "get" => {
                let key = payload
                    .get("key")
                    .and_then(Value::as_str)
                    .or_else(|| payload.as_str())
                    .ok_or_else(|| Error::InvalidInput("get requires a 'key'".to_string()))?;
                Ok(scope.properties().get(key).cloned().unwrap_or(Value::Null))
            }
            "keys" => Ok(json!(scope.properties().keys().collect::<Vec<_>>())),
            other => Err(Error::NotFound(format!(
                "operation {} on {}",
                other,
                scope.identity()
            ))),
        }
    }
}

impl Component for PropertyService {
    fn module_service(self: Arc<Self>) -> Option<Arc<dyn ModuleService>> {
        Some(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::ModuleProperties;
    use crate::namespace::{NamespaceResolver, Unit};
    use crate::router::{FnHandlerAdapter, HandlerAdapter};

    fn scope(properties: ModuleProperties) -> ModuleScope {
        let resolver = Arc::new(NamespaceResolver::new("foo~1", None));
        ModuleScope::new("foo", resolver, properties)
    }

    fn unit(name: &str, toml: &str) -> ResolvedUnit {
        ResolvedUnit::new(name, "foo~1", Unit::parse(name, toml.as_bytes()).unwrap())
    }

    #[test]
    fn test_builtins_registered() {
        let catalog = TypeCatalog::with_builtins();
        assert!(catalog.contains(DEFAULT_ENTRY_TYPE));
        assert!(catalog.contains(STATIC_ROUTES_TYPE));
        assert!(catalog.contains(PROPERTY_SERVICE_TYPE));
    }

    #[tokio::test]
    async fn test_static_routes_substitute_generation() {
        let scope = scope(ModuleProperties::empty());
        let routes = StaticRoutes::from_unit(
            &unit(
                "foo.web.Routes",
                "type = \"graft.StaticRoutes\"\n[properties.routes]\n\"/foo/hello\" = \"hello from {generation}\"\n\"POST /foo/echo\" = \"{identity}\"",
            ),
            &scope,
        )
        .unwrap();
        assert_eq!(routes.len(), 2);

        let request = Request::get("/foo/hello").unwrap();
        let handler = routes.lookup(&request).unwrap();
        let response = FnHandlerAdapter
            .handle(request, &handler, Some(&scope))
            .await
            .unwrap();
        assert_eq!(response.body, "hello from foo~1");

        assert!(routes.lookup(&Request::get("/foo/echo").unwrap()).is_none());
        assert!(routes
            .lookup(&Request::new("POST", "/foo/echo").unwrap())
            .is_some());
    }

    #[test]
    fn test_static_routes_rejects_relative_path() {
        let scope = scope(ModuleProperties::empty());
        let result = StaticRoutes::from_unit(
            &unit("foo.web.Routes", "[properties.routes]\n\"hello\" = \"x\""),
            &scope,
        );
        assert!(matches!(result, Err(Error::Component(_))));
    }

    #[tokio::test]
    async fn test_property_service() {
        let properties =
            ModuleProperties::parse("plugin-foo.yml", b"greeting:\n  text: hi\n").unwrap();
        let scope = scope(properties);

        let value = PropertyService
            .invoke("get", json!({"key": "greeting.text"}), &scope)
            .await
            .unwrap();
        assert_eq!(value, json!("hi"));

        let missing = PropertyService
            .invoke("get", json!({"key": "nope"}), &scope)
            .await
            .unwrap();
        assert!(missing.is_null());

        let err = PropertyService
            .invoke("delete", Value::Null, &scope)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }
}
