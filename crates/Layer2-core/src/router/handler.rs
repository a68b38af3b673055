//! Handler 추상화 - 매핑 / 어댑터 / 인터셉터

use super::request::{Request, Response};
use crate::module::ModuleScope;
use async_trait::async_trait;
use futures::future::BoxFuture;
use graft_foundation::{Error, Result};
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

// ============================================================================
// Handler
// ============================================================================

/// 매핑이 찾아낸 핸들러 (타입은 어댑터의 `supports`가 판단)
#[derive(Clone)]
pub struct Handler {
    name: String,
    target: Arc<dyn Any + Send + Sync>,
}

impl Handler {
    pub fn new<T: Any + Send + Sync>(name: impl Into<String>, target: Arc<T>) -> Self {
        Self {
            name: name.into(),
            target,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn target<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.target.downcast_ref::<T>()
    }

    pub fn is<T: Any + Send + Sync>(&self) -> bool {
        self.target.is::<T>()
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler").field("name", &self.name).finish()
    }
}

/// 클로저 기반 핸들러
pub struct FnHandler {
    func: Box<dyn Fn(Request, Option<ModuleScope>) -> BoxFuture<'static, Result<Response>> + Send + Sync>,
}

impl FnHandler {
    pub fn new<F, Fut>(func: F) -> Self
    where
        F: Fn(Request, Option<ModuleScope>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Response>> + Send + 'static,
    {
        Self {
            func: Box::new(move |request, scope| Box::pin(func(request, scope))),
        }
    }

    /// 고정 본문 응답 핸들러
    pub fn text(body: impl Into<String>) -> Self {
        let body = body.into();
        Self::new(move |_, _| {
            let body = body.clone();
            async move { Ok(Response::ok(body)) }
        })
    }

    pub fn call(&self, request: Request, scope: Option<ModuleScope>) -> BoxFuture<'static, Result<Response>> {
        (self.func)(request, scope)
    }
}

// ============================================================================
// Traits
// ============================================================================

/// 요청 → 핸들러 매핑
pub trait HandlerMapping: Send + Sync {
    fn name(&self) -> &str;

    fn lookup(&self, request: &Request) -> Option<Handler>;
}

/// 핸들러 실행 어댑터
#[async_trait]
pub trait HandlerAdapter: Send + Sync {
    fn supports(&self, handler: &Handler) -> bool;

    async fn handle(
        &self,
        request: Request,
        handler: &Handler,
        scope: Option<&ModuleScope>,
    ) -> Result<Response>;
}

/// 모듈 핸들러 전후 처리
pub trait HandlerInterceptor: Send + Sync {
    /// 응답을 반환하면 핸들러를 건너뛴다
    fn pre_handle(&self, _request: &Request, _scope: &ModuleScope) -> Result<Option<Response>> {
        Ok(None)
    }

    fn post_handle(&self, _request: &Request, _response: &mut Response, _scope: &ModuleScope) {}
}

// ============================================================================
// 기본 구현
// ============================================================================

/// `FnHandler` 실행 어댑터
#[derive(Debug, Default, Clone, Copy)]
pub struct FnHandlerAdapter;

#[async_trait]
impl HandlerAdapter for FnHandlerAdapter {
    fn supports(&self, handler: &Handler) -> bool {
        handler.is::<FnHandler>()
    }

    async fn handle(
        &self,
        request: Request,
        handler: &Handler,
        scope: Option<&ModuleScope>,
    ) -> Result<Response> {
        let func = handler.target::<FnHandler>().ok_or_else(|| {
            Error::InvalidInput(format!("{} is not a function handler", handler.name()))
        })?;
        func.call(request, scope.cloned()).await
    }
}

/// (메서드, 경로) 정확 일치 라우트 테이블
pub struct RouteTable {
    name: String,
    routes: HashMap<(String, String), Handler>,
}

/// 모든 메서드에 매칭
pub const ANY_METHOD: &str = "*";

impl RouteTable {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            routes: HashMap::new(),
        }
    }

    pub fn route(mut self, method: &str, path: &str, handler: FnHandler) -> Self {
        self.insert(method, path, handler);
        self
    }

    pub fn insert(&mut self, method: &str, path: &str, handler: FnHandler) {
        let key = (method.to_ascii_uppercase(), path.to_string());
        let name = format!("{} {} {}", self.name, key.0, key.1);
        self.routes.insert(key, Handler::new(name, Arc::new(handler)));
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl HandlerMapping for RouteTable {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookup(&self, request: &Request) -> Option<Handler> {
        let path = request.path().to_string();
        self.routes
            .get(&(request.method().to_string(), path.clone()))
            .or_else(|| self.routes.get(&(ANY_METHOD.to_string(), path)))
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_route_table_with_fn_adapter() {
        let table = RouteTable::new("host")
            .route("GET", "/health", FnHandler::text("up"))
            .route(ANY_METHOD, "/echo", FnHandler::new(|req: Request, _| async move {
                Ok(Response::ok(req.body().to_string()))
            }));

        let handler = table.lookup(&Request::get("/health").unwrap()).unwrap();
        assert!(FnHandlerAdapter.supports(&handler));
        let response = FnHandlerAdapter
            .handle(Request::get("/health").unwrap(), &handler, None)
            .await
            .unwrap();
        assert_eq!(response.body, "up");

        let echo = Request::new("POST", "/echo").unwrap().with_body("ping");
        let handler = table.lookup(&echo).unwrap();
        let response = FnHandlerAdapter.handle(echo, &handler, None).await.unwrap();
        assert_eq!(response.body, "ping");

        assert!(table.lookup(&Request::new("POST", "/health").unwrap()).is_none());
    }

    #[test]
    fn test_adapter_rejects_foreign_handler() {
        let handler = Handler::new("raw", Arc::new(42u32));
        assert!(!FnHandlerAdapter.supports(&handler));
        assert_eq!(handler.target::<u32>(), Some(&42));
    }
}
