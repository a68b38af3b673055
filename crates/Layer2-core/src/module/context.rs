//! Module Context - 활성 세대 하나의 상태
//!
//! ```text
//! New → Loading → Active → Unloading → Closed
//!          └──────────────────────────→ Closed (로드 실패)
//! ```

use super::scope::ModuleScope;
use crate::component::ComponentRegistry;
use crate::patch::BootstrapDirectives;
use chrono::{DateTime, Utc};
use graft_foundation::{Error, Result};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// 컨텍스트 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleState {
    New,
    Loading,
    Active,
    Unloading,
    Closed,
}

impl ModuleState {
    pub fn can_transition_to(self, next: ModuleState) -> bool {
        use ModuleState::*;
        matches!(
            (self, next),
            (New, Loading) | (Loading, Active) | (Loading, Closed) | (Active, Unloading) | (Unloading, Closed)
        )
    }
}

impl fmt::Display for ModuleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::New => write!(f, "new"),
            Self::Loading => write!(f, "loading"),
            Self::Active => write!(f, "active"),
            Self::Unloading => write!(f, "unloading"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

type CloseListener = Box<dyn FnOnce(&str) + Send>;

/// 세대별 모듈 컨텍스트
pub struct ModuleContext {
    scope: ModuleScope,
    directives: BootstrapDirectives,
    state: RwLock<ModuleState>,
    registry: RwLock<Option<Arc<ComponentRegistry>>>,
    /// (키, 리스너). 같은 키는 한 번만 등록
    listeners: Mutex<Vec<(String, CloseListener)>>,
    created_at: DateTime<Utc>,
    activated_at: RwLock<Option<DateTime<Utc>>>,
}

impl ModuleContext {
    pub fn new(scope: ModuleScope, directives: BootstrapDirectives) -> Self {
        Self {
            scope,
            directives,
            state: RwLock::new(ModuleState::New),
            registry: RwLock::new(None),
            listeners: Mutex::new(Vec::new()),
            created_at: Utc::now(),
            activated_at: RwLock::new(None),
        }
    }

    pub fn identity(&self) -> &str {
        self.scope.identity()
    }

    pub fn generation(&self) -> &str {
        self.scope.generation()
    }

    pub fn scope(&self) -> &ModuleScope {
        &self.scope
    }

    pub fn directives(&self) -> &BootstrapDirectives {
        &self.directives
    }

    pub fn state(&self) -> ModuleState {
        *self.state.read()
    }

    pub fn is_active(&self) -> bool {
        self.state() == ModuleState::Active
    }

    pub fn is_closed(&self) -> bool {
        self.state() == ModuleState::Closed
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn activated_at(&self) -> Option<DateTime<Utc>> {
        *self.activated_at.read()
    }

    /// 상태 전이 (허용되지 않으면 State 에러)
    pub fn transition(&self, next: ModuleState) -> Result<()> {
        let mut state = self.state.write();
        if !state.can_transition_to(next) {
            return Err(Error::State(format!(
                "{}: cannot move from {} to {}",
                self.generation(),
                *state,
                next
            )));
        }
        debug!("Context {}: {} -> {}", self.generation(), *state, next);
        *state = next;
        if next == ModuleState::Active {
            *self.activated_at.write() = Some(Utc::now());
        }
        Ok(())
    }

    pub fn attach(&self, registry: Arc<ComponentRegistry>) {
        *self.registry.write() = Some(registry);
    }

    pub fn registry(&self) -> Option<Arc<ComponentRegistry>> {
        self.registry.read().clone()
    }

    /// 종료 리스너 등록. 이미 닫혔으면 즉시 실행
    pub fn on_close<F>(&self, key: impl Into<String>, listener: F)
    where
        F: FnOnce(&str) + Send + 'static,
    {
        let key = key.into();
        {
            let mut listeners = self.listeners.lock();
            if !self.is_closed() {
                if !listeners.iter().any(|(k, _)| *k == key) {
                    listeners.push((key, Box::new(listener)));
                }
                return;
            }
        }
        listener(self.generation());
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }

    /// 레지스트리 정리 (의존 역순, 스코프 명시 전달)
    pub fn teardown_registry(&self) -> Result<usize> {
        match self.registry() {
            Some(registry) => registry.teardown(&self.scope),
            None => Ok(0),
        }
    }

    /// Closed로 표시하고 종료 리스너 실행. 실행한 리스너 수 반환
    pub fn finish(&self) -> usize {
        let listeners = {
            let mut listeners = self.listeners.lock();
            *self.state.write() = ModuleState::Closed;
            std::mem::take(&mut *listeners)
        };
        let count = listeners.len();
        for (key, listener) in listeners {
            debug!("Running close listener {} for {}", key, self.generation());
            listener(self.generation());
        }
        count
    }
}

impl fmt::Debug for ModuleContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleContext")
            .field("identity", &self.identity())
            .field("generation", &self.generation())
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::ModuleProperties;
    use crate::namespace::NamespaceResolver;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn context() -> ModuleContext {
        let resolver = Arc::new(NamespaceResolver::new("foo", None));
        let scope = ModuleScope::new("foo", resolver, ModuleProperties::empty());
        let directives = BootstrapDirectives {
            entry: "foo.Main".into(),
            suppressed: vec![],
            features: Default::default(),
            scan_packages: vec!["foo".into()],
        };
        ModuleContext::new(scope, directives)
    }

    #[test]
    fn test_state_machine() {
        let ctx = context();
        assert!(ctx.transition(ModuleState::Active).is_err());
        ctx.transition(ModuleState::Loading).unwrap();
        ctx.transition(ModuleState::Active).unwrap();
        assert!(ctx.activated_at().is_some());
        assert!(matches!(
            ctx.transition(ModuleState::Loading),
            Err(Error::State(_))
        ));
        ctx.transition(ModuleState::Unloading).unwrap();
        ctx.transition(ModuleState::Closed).unwrap();
    }

    #[test]
    fn test_close_listeners_dedupe_and_run_once() {
        let ctx = context();
        let calls = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            let calls = calls.clone();
            ctx.on_close("router", move |generation| {
                assert_eq!(generation, "foo");
                calls.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert_eq!(ctx.listener_count(), 1);
        assert_eq!(ctx.finish(), 1);
        assert_eq!(ctx.finish(), 0);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // 닫힌 뒤 등록하면 즉시 실행
        let late = calls.clone();
        ctx.on_close("late", move |_| {
            late.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_teardown_without_registry() {
        let ctx = context();
        assert_eq!(ctx.teardown_registry().unwrap(), 0);
        assert!(ctx.registry().is_none());
    }
}
