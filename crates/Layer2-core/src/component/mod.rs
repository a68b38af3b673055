//! Component - 모듈 레지스트리가 관리하는 객체
//!
//! - `catalog`: 호스트에 링크된 구현 (유닛 `type` → 팩토리)
//! - `registry`: 세대별 컴포넌트 레지스트리 (발견, 정렬, 시작 훅, 정리)
//! - `builtin`: 호스트 코드 없이 쓸 수 있는 기본 타입

pub mod builtin;
mod catalog;
mod registry;

pub use catalog::{ComponentFactory, TypeCatalog};
pub use registry::{ComponentDefinition, ComponentRegistry};

use crate::bridge::ModuleService;
use crate::module::ModuleScope;
use crate::router::{HandlerAdapter, HandlerInterceptor, HandlerMapping};
use crate::support::{DataManager, DependencyControl};
use graft_foundation::Result;
use std::any::Any;
use std::sync::Arc;

/// 다운캐스트 보조 트레이트
pub trait AsAny: Any + Send + Sync {
    fn into_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<T: Any + Send + Sync> AsAny for T {
    fn into_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// 레지스트리 컴포넌트
///
/// 역할 메서드는 해당 역할을 가진 컴포넌트만 `Some(self)`를 돌려준다.
pub trait Component: AsAny {
    fn handler_mapping(self: Arc<Self>) -> Option<Arc<dyn HandlerMapping>> {
        None
    }

    fn handler_adapter(self: Arc<Self>) -> Option<Arc<dyn HandlerAdapter>> {
        None
    }

    fn interceptor(self: Arc<Self>) -> Option<Arc<dyn HandlerInterceptor>> {
        None
    }

    fn startup_hook(self: Arc<Self>) -> Option<Arc<dyn StartupHook>> {
        None
    }

    fn module_service(self: Arc<Self>) -> Option<Arc<dyn ModuleService>> {
        None
    }

    fn data_manager(self: Arc<Self>) -> Option<Arc<dyn DataManager>> {
        None
    }

    fn dependency_control(self: Arc<Self>) -> Option<Arc<dyn DependencyControl>> {
        None
    }

    /// 정리 (의존 역순으로 호출)
    fn destroy(&self, _scope: &ModuleScope) -> Result<()> {
        Ok(())
    }
}

/// 레지스트리 빌드 후 실행되는 시작 훅
pub trait StartupHook: Send + Sync {
    fn run(&self, scope: &ModuleScope, registry: &ComponentRegistry) -> Result<()>;
}
