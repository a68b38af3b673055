//! Module Context Manager - 모듈 라이프사이클
//!
//! 논리 identity별 비동기 락으로 load / unload / reload를 직렬화한다.
//! 세대 레코드는 identity 테이블이, 리졸버는 팩토리가, 활성 컨텍스트는
//! 세대 이름을 키로 하는 맵이 소유한다.
//!
//! 락 순서: identity 락(async) → 내부 맵 락(sync, await 구간에서 보유하지 않음)

use super::context::{ModuleContext, ModuleState};
use super::descriptor::EntryDescriptor;
use super::properties::ModuleProperties;
use super::scope::ModuleScope;
use crate::bridge::ServiceCall;
use crate::component::{ComponentRegistry, TypeCatalog};
use crate::identity::{logical_name, IdentityTable, GENERATION_SEPARATOR};
use crate::namespace::{artifact_roots, NamespaceResolver, ResolverFactory};
use crate::patch::PatchStep;
use crate::support::{DataManager, DependencyControl, NoopDataManager, NoopDependencyControl};
use graft_foundation::{Error, EventBus, GraftConfig, ModuleEvent, ModuleEventKind, Result};
use parking_lot::{Mutex, RwLock};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use tracing::{debug, error, info, warn};

/// 모듈 컨텍스트 매니저
pub struct ModuleContextManager {
    config: GraftConfig,
    identities: IdentityTable,
    resolvers: ResolverFactory,
    catalog: Arc<TypeCatalog>,
    patch: PatchStep,
    /// 세대 이름 → 활성 컨텍스트
    contexts: RwLock<HashMap<String, Arc<ModuleContext>>>,
    /// 논리 identity → 마지막 로드 기술자 (reload용)
    descriptors: RwLock<HashMap<String, EntryDescriptor>>,
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    events: Arc<EventBus>,
}

impl ModuleContextManager {
    /// 매니저 생성 (호스트 루트가 있으면 부모 리졸버로 사용)
    pub fn new(config: GraftConfig, catalog: Arc<TypeCatalog>) -> Result<Arc<Self>> {
        Self::with_event_bus(config, catalog, Arc::new(EventBus::new()))
    }

    pub fn with_event_bus(
        config: GraftConfig,
        catalog: Arc<TypeCatalog>,
        events: Arc<EventBus>,
    ) -> Result<Arc<Self>> {
        config.validate()?;
        let host = if config.host_roots.is_empty() {
            None
        } else {
            Some(NamespaceResolver::host(&config.host_roots)?)
        };

        let manager = Arc::new_cyclic(|weak: &Weak<Self>| {
            let identities = IdentityTable::new();
            let weak = weak.clone();
            identities.set_reset_hook(Arc::new(move |released: &str| {
                if let Some(manager) = weak.upgrade() {
                    manager.release_generation(released);
                }
            }));

            Self {
                patch: PatchStep::new(config.suppressed_markers.clone()),
                config,
                identities,
                resolvers: ResolverFactory::new(host),
                catalog,
                contexts: RwLock::new(HashMap::new()),
                descriptors: RwLock::new(HashMap::new()),
                locks: Mutex::new(HashMap::new()),
                events,
            }
        });
        info!(
            "Module manager ready (load path: {})",
            manager.config.load_path.display()
        );
        Ok(manager)
    }

    pub fn config(&self) -> &GraftConfig {
        &self.config
    }

    pub fn catalog(&self) -> &Arc<TypeCatalog> {
        &self.catalog
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.events
    }

    pub fn identity_table(&self) -> &IdentityTable {
        &self.identities
    }

    fn lifecycle_lock(&self, identity: &str) -> Arc<tokio::sync::Mutex<()>> {
        self.locks
            .lock()
            .entry(identity.to_string())
            .or_default()
            .clone()
    }

    // ========================================================================
    // Load
    // ========================================================================

    /// 모듈 로드. 이미 활성 상태면 기존 컨텍스트를 돌려준다
    pub async fn load(
        &self,
        identity: &str,
        descriptor: EntryDescriptor,
    ) -> Result<Arc<ModuleContext>> {
        validate_identity(identity)?;
        let _guard = self.lifecycle_lock(identity).lock_owned().await;
        self.load_locked(identity, descriptor).await
    }

    async fn load_locked(
        &self,
        identity: &str,
        descriptor: EntryDescriptor,
    ) -> Result<Arc<ModuleContext>> {
        if let Ok(context) = self.get_context(identity) {
            debug!("Module {} already active as {}", identity, context.generation());
            return Ok(context);
        }

        let generation = self.identities.resolve(identity);
        let root = self.identities.root_name(identity);
        self.descriptors
            .write()
            .insert(identity.to_string(), descriptor.clone());
        info!("Loading module {} as {} from {}", identity, generation, descriptor.source);

        match self.activate(&root, &generation, &descriptor).await {
            Ok(context) => {
                let components = context.registry().map_or(0, |r| r.len());
                self.contexts
                    .write()
                    .insert(generation.clone(), context.clone());
                info!(
                    "Module {} active as {} ({} components)",
                    identity, generation, components
                );
                self.events.publish(
                    ModuleEvent::new(ModuleEventKind::Loaded, identity, &generation)
                        .with_detail(json!({ "components": components })),
                );
                Ok(context)
            }
            Err(e) => {
                error!("Failed to load module {} ({}): {}", identity, generation, e);
                if let Some(resolver) = self.resolvers.remove(&generation) {
                    resolver.close();
                }
                let dir = self.config.generation_dir(&generation);
                if tokio::fs::try_exists(&dir).await.unwrap_or(false) {
                    if let Err(cleanup) = tokio::fs::remove_dir_all(&dir).await {
                        warn!("Cannot delete staged {}: {}", dir.display(), cleanup);
                    }
                }
                self.events.publish(ModuleEvent::failure(
                    ModuleEventKind::LoadFailed,
                    identity,
                    &generation,
                    &e,
                ));
                Err(e)
            }
        }
    }

    /// 스테이징 → 리졸버 → 패치 → 레지스트리 → 시작 훅
    async fn activate(
        &self,
        root: &str,
        generation: &str,
        descriptor: &EntryDescriptor,
    ) -> Result<Arc<ModuleContext>> {
        let dir = self.config.generation_dir(generation);
        descriptor.stage(&dir).await?;

        let resolver = self
            .resolvers
            .get_or_create(generation, || artifact_roots(&dir))?;
        let properties = ModuleProperties::locate(&resolver, &self.config.config, root);
        let scope = ModuleScope::new(root, resolver.clone(), properties);

        let entry = descriptor
            .entry_type
            .clone()
            .unwrap_or_else(|| format!("{}.{}", root, self.config.entry_name));
        let (patched, directives) = self.patch.apply(&resolver, &entry, root)?;

        let context = Arc::new(ModuleContext::new(scope, directives));
        context.transition(ModuleState::Loading)?;

        let built = ComponentRegistry::build(
            context.scope(),
            &patched,
            context.directives(),
            &self.catalog,
        )
        .map(Arc::new)
        .and_then(|registry| {
            context.attach(registry.clone());
            registry.run_startup_hooks(context.scope())
        });

        match built.and_then(|hooks| {
            debug!("Ran {} startup hooks for {}", hooks, generation);
            context.transition(ModuleState::Active)
        }) {
            Ok(()) => Ok(context),
            Err(e) => {
                if let Err(cleanup) = context.teardown_registry() {
                    warn!("Partial registry teardown for {}: {}", generation, cleanup);
                }
                if let Err(state) = context.transition(ModuleState::Closed) {
                    debug!("{}", state);
                }
                context.finish();
                Err(e)
            }
        }
    }

    // ========================================================================
    // Unload / Reload
    // ========================================================================

    /// 현재 세대 언로드. 어떤 단계라도 실패하면 Teardown 에러
    pub async fn unload(&self, identity: &str) -> Result<()> {
        validate_identity(identity)?;
        let _guard = self.lifecycle_lock(identity).lock_owned().await;
        self.unload_locked(identity).await
    }

    async fn unload_locked(&self, identity: &str) -> Result<()> {
        let generation = self
            .identities
            .current(identity)
            .ok_or_else(|| Error::NotFound(format!("module {}", identity)))?;
        info!("Unloading module {} ({})", identity, generation);

        let mut failures = Vec::new();
        let context = self.contexts.write().remove(&generation);

        if let Some(context) = &context {
            if let Err(e) = context.transition(ModuleState::Unloading) {
                failures.push(e.to_string());
            }
            match context.teardown_registry() {
                Ok(destroyed) => debug!("Destroyed {} components of {}", destroyed, generation),
                Err(e) => {
                    error!("Registry teardown failed for {}: {}", generation, e);
                    failures.push(e.to_string());
                }
            }
        } else {
            debug!("No active context for {}, cleaning artifacts only", generation);
        }

        if let Some(resolver) = self.resolvers.remove(&generation) {
            resolver.close();
        }

        if let Some(context) = &context {
            if let Err(e) = context.transition(ModuleState::Closed) {
                debug!("{}", e);
            }
            context.finish();
        }

        let dir = self.config.generation_dir(&generation);
        if let Err(e) = tokio::fs::remove_dir_all(&dir).await {
            error!("Failed to delete {}: {}", dir.display(), e);
            failures.push(format!("delete {}: {}", dir.display(), e));
        }

        if failures.is_empty() {
            info!("Module {} unloaded ({})", identity, generation);
            self.events.publish(ModuleEvent::new(
                ModuleEventKind::Unloaded,
                identity,
                &generation,
            ));
            Ok(())
        } else {
            let err = Error::Teardown(format!("{}: {}", generation, failures.join("; ")));
            self.events.publish(ModuleEvent::failure(
                ModuleEventKind::UnloadFailed,
                identity,
                &generation,
                &err,
            ));
            Err(err)
        }
    }

    /// 언로드 후 기억된 기술자로 다시 로드 (하나의 락 구간)
    pub async fn reload(&self, identity: &str) -> Result<Arc<ModuleContext>> {
        validate_identity(identity)?;
        let _guard = self.lifecycle_lock(identity).lock_owned().await;

        let descriptor = self
            .descriptors
            .read()
            .get(identity)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("no load descriptor for module {}", identity)))?;

        if self.has_context(identity) {
            self.unload_locked(identity).await?;
        }
        self.load_locked(identity, descriptor).await
    }

    /// 새 기술자로 교체: 활성 세대를 언로드하고 같은 락 구간에서 다시 로드
    pub async fn replace(
        &self,
        identity: &str,
        descriptor: EntryDescriptor,
    ) -> Result<Arc<ModuleContext>> {
        validate_identity(identity)?;
        let _guard = self.lifecycle_lock(identity).lock_owned().await;

        if self.has_context(identity) {
            info!("Replacing module {} with {}", identity, descriptor.source);
            self.unload_locked(identity).await?;
        }
        self.load_locked(identity, descriptor).await
    }

    /// 모든 활성 모듈 언로드. 실패한 (identity, 에러) 목록 반환
    pub async fn unload_all(&self) -> Vec<(String, Error)> {
        let mut failures = Vec::new();
        for identity in self.active_identities() {
            if let Err(e) = self.unload(&identity).await {
                failures.push((identity, e));
            }
        }
        failures
    }

    /// 압축으로 해제된 세대 정리 (identity 테이블 훅, 동기)
    fn release_generation(&self, generation: &str) {
        let identity = logical_name(generation).to_string();
        let context = self.contexts.write().remove(generation);
        if let Some(context) = &context {
            warn!("Released generation {} still had a context", generation);
            if let Err(e) = context.transition(ModuleState::Unloading) {
                debug!("{}", e);
            }
            if let Err(e) = context.teardown_registry() {
                warn!("Teardown of released {} failed: {}", generation, e);
            }
        }
        if let Some(resolver) = self.resolvers.remove(generation) {
            resolver.close();
        }
        if let Some(context) = context {
            if let Err(e) = context.transition(ModuleState::Closed) {
                debug!("{}", e);
            }
            context.finish();
        }

        let dir = self.config.generation_dir(generation);
        if dir.exists() {
            if let Err(e) = std::fs::remove_dir_all(&dir) {
                warn!("Cannot delete released {}: {}", dir.display(), e);
            }
        }
        debug!("Released generation {}", generation);
        self.events.publish(ModuleEvent::new(
            ModuleEventKind::GenerationReleased,
            identity,
            generation,
        ));
    }

    // ========================================================================
    // 조회
    // ========================================================================

    /// 현재 세대의 활성 컨텍스트. 세대 이름(`foo~1`)은 identity가 아니다
    pub fn get_context(&self, identity: &str) -> Result<Arc<ModuleContext>> {
        validate_identity(identity)
            .ok()
            .and_then(|_| self.identities.current(identity))
            .and_then(|generation| self.contexts.read().get(&generation).cloned())
            .filter(|context| context.is_active())
            .ok_or_else(|| Error::NotFound(format!("no active context for module {}", identity)))
    }

    pub fn has_context(&self, identity: &str) -> bool {
        self.get_context(identity).is_ok()
    }

    /// 활성 모듈 identity (정렬)
    pub fn active_identities(&self) -> Vec<String> {
        let mut identities: Vec<_> = self
            .contexts
            .read()
            .values()
            .filter(|context| context.is_active())
            .map(|context| context.identity().to_string())
            .collect();
        identities.sort();
        identities.dedup();
        identities
    }

    /// 활성 컨텍스트 (identity 순)
    pub fn contexts(&self) -> Vec<Arc<ModuleContext>> {
        let mut contexts: Vec<_> = self
            .contexts
            .read()
            .values()
            .filter(|context| context.is_active())
            .cloned()
            .collect();
        contexts.sort_by(|a, b| a.identity().cmp(b.identity()));
        contexts
    }

    /// 한 번이라도 등록된 identity
    pub fn identities(&self) -> Vec<String> {
        self.identities.identities()
    }

    /// 현재 세대 리졸버
    pub fn resolver(&self, identity: &str) -> Option<Arc<NamespaceResolver>> {
        let generation = self.identities.current(identity)?;
        self.resolvers.get(&generation)
    }

    pub fn resolver_count(&self) -> usize {
        self.resolvers.len()
    }

    // ========================================================================
    // 모듈 부가 역할
    // ========================================================================

    /// 다른 모듈의 서비스 호출
    pub async fn invoke(&self, call: ServiceCall) -> Result<Value> {
        let context = self.get_context(&call.identity)?;
        let registry = context
            .registry()
            .ok_or_else(|| Error::State(format!("{} has no registry", context.generation())))?;
        let service = registry.module_service(&call.service).ok_or_else(|| {
            Error::NotFound(format!("service {} in module {}", call.service, call.identity))
        })?;
        debug!(
            "Invoking {}::{}.{}",
            call.identity, call.service, call.operation
        );
        service
            .invoke(&call.operation, call.payload, context.scope())
            .await
    }

    /// 모듈의 DataManager (없으면 no-op)
    pub fn data_manager(&self, identity: &str) -> Result<Arc<dyn DataManager>> {
        let context = self.get_context(identity)?;
        Ok(context
            .registry()
            .and_then(|registry| registry.data_manager())
            .unwrap_or_else(|| {
                debug!("Module {} uses no-op data manager", identity);
                Arc::new(NoopDataManager)
            }))
    }

    /// 모듈의 DependencyControl (없으면 no-op)
    pub fn dependency_control(&self, identity: &str) -> Result<Arc<dyn DependencyControl>> {
        let context = self.get_context(identity)?;
        Ok(context
            .registry()
            .and_then(|registry| registry.dependency_control())
            .unwrap_or_else(|| {
                debug!("Module {} uses no-op dependency control", identity);
                Arc::new(NoopDependencyControl)
            }))
    }
}

impl std::fmt::Debug for ModuleContextManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleContextManager")
            .field("load_path", &self.config.load_path)
            .field("active", &self.active_identities())
            .finish()
    }
}

/// 논리 identity 검증
pub fn validate_identity(identity: &str) -> Result<()> {
    if identity.trim().is_empty() {
        return Err(Error::InvalidInput("module identity is empty".to_string()));
    }
    if identity.contains(['/', '\\', GENERATION_SEPARATOR]) {
        return Err(Error::InvalidInput(format!(
            "module identity '{}' contains '/', '\\' or '{}'",
            identity, GENERATION_SEPARATOR
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::namespace::unit_path;

    fn write_artifact(dir: &std::path::Path, units: &[(&str, &str)]) {
        for (name, content) in units {
            let path = dir.join("classes").join(unit_path(name));
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, content).unwrap();
        }
    }

    fn manager(load_path: &std::path::Path) -> Arc<ModuleContextManager> {
        let config = GraftConfig::default().with_load_path(load_path);
        ModuleContextManager::new(config, Arc::new(TypeCatalog::with_builtins())).unwrap()
    }

    #[test]
    fn test_validate_identity() {
        assert!(validate_identity("foo").is_ok());
        assert!(validate_identity("").is_err());
        assert!(validate_identity("a/b").is_err());
        assert!(validate_identity("a\\b").is_err());
        assert!(validate_identity("foo~1").is_err());
    }

    #[tokio::test]
    async fn test_load_unload_cycle() {
        let src = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        write_artifact(src.path(), &[("foo.Main", "kind = \"entry\"")]);
        let manager = manager(work.path());

        let context = manager
            .load("foo", EntryDescriptor::directory(src.path()))
            .await
            .unwrap();
        assert_eq!(context.generation(), "foo");
        assert!(context.is_active());
        assert!(work.path().join("foo/classes/foo/Main.unit").exists());
        assert_eq!(manager.active_identities(), vec!["foo"]);

        manager.unload("foo").await.unwrap();
        assert!(context.is_closed());
        assert!(manager.get_context("foo").unwrap_err().is_not_found());
        assert!(!work.path().join("foo").exists());
        assert_eq!(manager.resolver_count(), 0);
    }

    #[tokio::test]
    async fn test_failed_load_publishes_nothing() {
        let src = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        write_artifact(src.path(), &[("foo.Other", "kind = \"entry\"")]);
        let manager = manager(work.path());
        let mut events = manager.event_bus().subscribe();

        let err = manager
            .load("foo", EntryDescriptor::directory(src.path()))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert!(!manager.has_context("foo"));
        assert_eq!(manager.resolver_count(), 0);
        assert_eq!(events.recv().await.unwrap().kind, ModuleEventKind::LoadFailed);
    }

    #[tokio::test]
    async fn test_unload_unknown_identity() {
        let work = tempfile::tempdir().unwrap();
        let manager = manager(work.path());
        assert!(manager.unload("ghost").await.unwrap_err().is_not_found());
        assert!(manager.reload("ghost").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_noop_fallbacks() {
        let src = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        write_artifact(src.path(), &[("foo.Main", "kind = \"entry\"")]);
        let manager = manager(work.path());
        let context = manager
            .load("foo", EntryDescriptor::directory(src.path()))
            .await
            .unwrap();

        manager.data_manager("foo").unwrap().init(context.scope()).await.unwrap();
        manager
            .dependency_control("foo")
            .unwrap()
            .control(context.scope())
            .await
            .unwrap();
        assert!(manager.data_manager("bar").is_err());
    }
}
