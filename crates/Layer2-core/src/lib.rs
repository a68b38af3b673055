//! graft-core: Core Runtime for graft
//!
//! Layer2 - 모듈 격리 / 라이프사이클 / 요청 라우팅
//!
//! # 주요 모듈
//!
//! - `identity`: 논리 이름 → 세대 이름 간접 참조 테이블
//! - `namespace`: 세대별 격리 리졸버 (디렉토리/아카이브 루트)
//! - `patch`: 엔트리 유닛 부트스트랩 패치
//! - `component`: 컴포넌트 카탈로그와 세대별 레지스트리
//! - `module`: 모듈 컨텍스트와 매니저 (load / unload / reload)
//! - `router`: identity 추출 기반 요청 분배
//! - `management`: 운영자용 메시지 인터페이스
//!
//! # 사용 예시
//!
//! ```ignore
//! use graft_core::{EntryDescriptor, ModuleContextManager, Request, RequestRouter, TypeCatalog};
//!
//! let manager = ModuleContextManager::new(config, Arc::new(TypeCatalog::with_builtins()))?;
//! manager.load("foo", EntryDescriptor::archive("foo.zip")).await?;
//!
//! let router = RequestRouter::new(manager.clone());
//! let response = router.dispatch(Request::get("/foo/hello")?).await?;
//! ```

pub mod bridge;
pub mod component;
pub mod identity;
pub mod management;
pub mod module;
pub mod namespace;
pub mod patch;
pub mod router;
pub mod support;

// Re-exports: Identity
pub use identity::{logical_name, IdentityTable, ResetHook, GENERATION_SEPARATOR};

// Re-exports: Namespace
pub use namespace::{
    artifact_roots, NamespaceResolver, ResolvedUnit, ResolverFactory, ResourceRoot, Unit,
    UnitKind, DEFAULT_ENTRY_TYPE, HOST_GENERATION,
};

// Re-exports: Patch
pub use patch::{BootstrapDirectives, PatchStep, UnitEdit, SCAN_MARKER};

// Re-exports: Component
pub use component::{
    Component, ComponentDefinition, ComponentFactory, ComponentRegistry, StartupHook, TypeCatalog,
};

// Re-exports: Module
pub use module::{
    ArtifactSource, EntryDescriptor, ModuleContext, ModuleContextManager, ModuleProperties,
    ModuleScope, ModuleState,
};

// Re-exports: Router
pub use router::{
    FnHandler, FnHandlerAdapter, Handler, HandlerAdapter, HandlerInterceptor, HandlerMapping,
    HostRouting, IdentityExtractor, Request, RequestRouter, Response, RouteTable,
};

// Re-exports: Bridge / Support
pub use bridge::{ModuleService, ServiceCall};
pub use support::{DataManager, DependencyControl, NoopDataManager, NoopDependencyControl};

// Re-exports: Management
pub use management::{ModuleManagement, ModuleSummary};
