//! Request Router - 요청을 모듈 핸들러 또는 호스트로 분배
//!
//! 1. 설정된 방식(Header / Parameter / Url)으로 identity 토큰 추출
//! 2. 화이트리스트가 아니고 활성 컨텍스트가 있으면 세대별 핸들러 셋 조회
//!    (지연 생성, 컨텍스트 종료 시 제거)
//! 3. 인터셉터 → 매핑 → 어댑터 → 핸들러 (모듈 스코프 전달)
//! 4. 모듈이 없거나 매칭 실패 시 호스트 라우팅, 그것도 없으면 404

mod handler;
mod request;

pub use handler::{
    FnHandler, FnHandlerAdapter, Handler, HandlerAdapter, HandlerInterceptor, HandlerMapping,
    RouteTable, ANY_METHOD,
};
pub use request::{IdentityExtractor, Request, Response};

use crate::module::{ModuleContext, ModuleContextManager};
use graft_foundation::{Error, InterceptConfig, Result};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use tracing::{debug, warn};

/// 핸들러 캐시 종료 리스너 키
const CACHE_LISTENER_KEY: &str = "router.handlers";

// ============================================================================
// HostRouting
// ============================================================================

/// 호스트 자체 라우팅
#[derive(Clone)]
pub struct HostRouting {
    mappings: Vec<Arc<dyn HandlerMapping>>,
    adapters: Vec<Arc<dyn HandlerAdapter>>,
}

impl HostRouting {
    /// `FnHandler` 어댑터만 가진 빈 라우팅
    pub fn new() -> Self {
        Self {
            mappings: Vec::new(),
            adapters: vec![Arc::new(FnHandlerAdapter)],
        }
    }

    pub fn with_mapping(mut self, mapping: Arc<dyn HandlerMapping>) -> Self {
        self.mappings.push(mapping);
        self
    }

    pub fn with_adapter(mut self, adapter: Arc<dyn HandlerAdapter>) -> Self {
        self.adapters.push(adapter);
        self
    }

    fn lookup(&self, request: &Request) -> Option<Handler> {
        self.mappings.iter().find_map(|m| m.lookup(request))
    }

    fn adapter_for(&self, handler: &Handler) -> Option<Arc<dyn HandlerAdapter>> {
        self.adapters.iter().find(|a| a.supports(handler)).cloned()
    }
}

impl Default for HostRouting {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// RequestRouter
// ============================================================================

/// 세대별 핸들러 셋 (레지스트리에서 한 번 수집)
struct HandlerSet {
    mappings: Vec<Arc<dyn HandlerMapping>>,
    adapters: Vec<Arc<dyn HandlerAdapter>>,
    interceptors: Vec<Arc<dyn HandlerInterceptor>>,
}

type HandlerCache = RwLock<HashMap<String, Arc<HandlerSet>>>;

/// 요청 라우터
pub struct RequestRouter {
    manager: Arc<ModuleContextManager>,
    extractor: IdentityExtractor,
    intercept: InterceptConfig,
    host: HostRouting,
    cache: Arc<HandlerCache>,
    populate: Mutex<()>,
}

impl RequestRouter {
    /// 매니저 설정의 intercept 섹션으로 생성
    pub fn new(manager: Arc<ModuleContextManager>) -> Self {
        let intercept = manager.config().intercept.clone();
        Self {
            extractor: IdentityExtractor::from_config(&intercept),
            intercept,
            manager,
            host: HostRouting::new(),
            cache: Arc::new(RwLock::new(HashMap::new())),
            populate: Mutex::new(()),
        }
    }

    pub fn with_host_routing(mut self, host: HostRouting) -> Self {
        self.host = host;
        self
    }

    pub fn with_intercept(mut self, intercept: InterceptConfig) -> Self {
        self.extractor = IdentityExtractor::from_config(&intercept);
        self.intercept = intercept;
        self
    }

    pub fn extractor(&self) -> &IdentityExtractor {
        &self.extractor
    }

    /// 요청 처리
    pub async fn dispatch(&self, request: Request) -> Result<Response> {
        if let Some(context) = self.module_for(&request)? {
            if let Some(response) = self.dispatch_module(&context, &request).await? {
                return Ok(response);
            }
            debug!(
                "No handler in {} for {}, falling back to host",
                context.generation(),
                request
            );
        }
        self.dispatch_host(request).await
    }

    /// 요청을 처리할 활성 모듈 컨텍스트 (없으면 호스트)
    pub fn module_for(&self, request: &Request) -> Result<Option<Arc<ModuleContext>>> {
        let Some(token) = self.extractor.extract(request) else {
            return Ok(None);
        };
        if self.intercept.is_whitelisted(&token) {
            debug!("Identity {} is whitelisted, routing to host", token);
            return Ok(None);
        }
        match self.manager.get_context(&token) {
            Ok(context) => Ok(Some(context)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn dispatch_module(
        &self,
        context: &ModuleContext,
        request: &Request,
    ) -> Result<Option<Response>> {
        let handlers = self.handler_set(context)?;
        let scope = context.scope();

        for interceptor in &handlers.interceptors {
            if let Some(response) = interceptor.pre_handle(request, scope)? {
                debug!("Interceptor short-circuited {} in {}", request, scope.generation());
                return Ok(Some(response));
            }
        }

        let Some(handler) = handlers.mappings.iter().find_map(|m| m.lookup(request)) else {
            return Ok(None);
        };

        let adapter = handlers
            .adapters
            .iter()
            .find(|a| a.supports(&handler))
            .cloned()
            .or_else(|| self.host.adapter_for(&handler))
            .ok_or_else(|| {
                Error::State(format!("no adapter supports handler {}", handler.name()))
            })?;

        debug!("Dispatching {} to {} ({})", request, handler.name(), scope.generation());
        let mut response = adapter.handle(request.clone(), &handler, Some(scope)).await?;

        for interceptor in handlers.interceptors.iter().rev() {
            interceptor.post_handle(request, &mut response, scope);
        }
        Ok(Some(response))
    }

    async fn dispatch_host(&self, request: Request) -> Result<Response> {
        let Some(handler) = self.host.lookup(&request) else {
            debug!("No host handler for {}", request);
            return Ok(Response::not_found(request.path()));
        };
        let adapter = self.host.adapter_for(&handler).ok_or_else(|| {
            Error::State(format!("no host adapter supports handler {}", handler.name()))
        })?;
        adapter.handle(request, &handler, None).await
    }

    /// 세대별 핸들러 셋 조회/생성
    fn handler_set(&self, context: &ModuleContext) -> Result<Arc<HandlerSet>> {
        let generation = context.generation();
        if let Some(set) = self.cache.read().get(generation) {
            return Ok(set.clone());
        }

        let _guard = self.populate.lock();
        if let Some(set) = self.cache.read().get(generation) {
            return Ok(set.clone());
        }

        let registry = context
            .registry()
            .ok_or_else(|| Error::State(format!("{} has no registry", generation)))?;
        let set = Arc::new(HandlerSet {
            mappings: registry.handler_mappings(),
            adapters: registry.handler_adapters(),
            interceptors: registry.interceptors(),
        });
        if set.mappings.is_empty() {
            warn!("Module {} exposes no handler mappings", generation);
        }
        self.cache
            .write()
            .insert(generation.to_string(), set.clone());
        debug!(
            "Cached {} mappings for {}",
            set.mappings.len(),
            generation
        );

        let cache: Weak<HandlerCache> = Arc::downgrade(&self.cache);
        context.on_close(CACHE_LISTENER_KEY, move |generation| {
            if let Some(cache) = cache.upgrade() {
                if cache.write().remove(generation).is_some() {
                    debug!("Evicted handlers of {}", generation);
                }
            }
        });
        Ok(set)
    }

    /// 캐시된 세대 (정렬)
    pub fn cached_generations(&self) -> Vec<String> {
        let mut generations: Vec<_> = self.cache.read().keys().cloned().collect();
        generations.sort();
        generations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::TypeCatalog;
    use graft_foundation::{GraftConfig, IdentityMode};

    fn router(config: GraftConfig) -> RequestRouter {
        let manager =
            ModuleContextManager::new(config, Arc::new(TypeCatalog::with_builtins())).unwrap();
        let host = HostRouting::new().with_mapping(Arc::new(
            RouteTable::new("host").route(ANY_METHOD, "/health", FnHandler::text("host ok")),
        ));
        RequestRouter::new(manager).with_host_routing(host)
    }

    #[tokio::test]
    async fn test_host_fallback_and_404() {
        let work = tempfile::tempdir().unwrap();
        let router = router(GraftConfig::default().with_load_path(work.path()));

        let response = router.dispatch(Request::get("/health").unwrap()).await.unwrap();
        assert_eq!(response.body, "host ok");

        let response = router.dispatch(Request::get("/pluginA/list").unwrap()).await.unwrap();
        assert_eq!(response.status, 404);
        assert!(router.cached_generations().is_empty());
    }

    #[tokio::test]
    async fn test_header_mode_without_header_routes_to_host() {
        let work = tempfile::tempdir().unwrap();
        let config = GraftConfig::default()
            .with_load_path(work.path())
            .with_identity_mode(IdentityMode::Header);
        let router = router(config);

        let request = Request::get("/health").unwrap();
        assert!(router.module_for(&request).unwrap().is_none());
        let request = request.with_header("Plugin-Meta", "pluginB");
        assert_eq!(
            router.extractor().extract(&request).as_deref(),
            Some("pluginB")
        );
        assert_eq!(router.dispatch(request).await.unwrap().body, "host ok");
    }
}
