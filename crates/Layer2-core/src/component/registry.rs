//! Component Registry - 세대별 컴포넌트 레지스트리
//!
//! 빌드 순서:
//! 1. 패치된 엔트리 컴포넌트 등록
//! 2. 스캔 지시가 있으면 선언 패키지의 컴포넌트 유닛 발견
//! 3. `depends_on` 충족 (발견되지 않은 의존은 리졸버로 해석)
//! 4. 의존 순서 계산 (누락/순환은 에러)
//!
//! 시작 훅은 (priority, 발견 순서)로, 정리는 의존 역순으로 실행된다.

use super::{Component, TypeCatalog};
use crate::bridge::ModuleService;
use crate::module::ModuleScope;
use crate::namespace::ResolvedUnit;
use crate::patch::BootstrapDirectives;
use crate::router::{HandlerAdapter, HandlerInterceptor, HandlerMapping};
use crate::support::{DataManager, DependencyControl};
use graft_foundation::{Error, Result};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// 등록된 컴포넌트 정의
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentDefinition {
    /// 정규 이름
    pub name: String,
    /// 구현 키
    pub implementation: String,
    /// 정의한 세대
    pub generation: String,
    pub depends_on: Vec<String>,
    pub priority: i32,
    /// 발견 순서 (엔트리 = 0)
    pub discovery: usize,
}

impl ComponentDefinition {
    fn from_unit(unit: &ResolvedUnit, discovery: usize) -> Self {
        Self {
            name: unit.name().to_string(),
            implementation: unit.implementation().to_string(),
            generation: unit.generation().to_string(),
            depends_on: unit.unit().depends_on.clone(),
            priority: unit.unit().priority,
            discovery,
        }
    }
}

struct Registered {
    definition: ComponentDefinition,
    instance: Arc<dyn Component>,
}

/// 모듈 한 세대의 컴포넌트 레지스트리
pub struct ComponentRegistry {
    generation: String,
    entry: String,
    components: Vec<Registered>,
    index: HashMap<String, usize>,
    init_order: Vec<usize>,
    closed: AtomicBool,
}

impl ComponentRegistry {
    // ========================================================================
    // 빌드
    // ========================================================================

    /// 패치된 엔트리를 루트로 레지스트리 빌드
    pub fn build(
        scope: &ModuleScope,
        entry: &Arc<ResolvedUnit>,
        directives: &BootstrapDirectives,
        catalog: &TypeCatalog,
    ) -> Result<Self> {
        let units = discover(scope, entry, directives)?;
        let definitions: Vec<_> = units
            .iter()
            .enumerate()
            .map(|(discovery, unit)| ComponentDefinition::from_unit(unit, discovery))
            .collect();
        let init_order = dependency_order(&definitions)?;

        let instances = instantiate(scope, &units, catalog)?;
        let mut index = HashMap::with_capacity(units.len());
        let components: Vec<_> = definitions
            .into_iter()
            .zip(instances)
            .enumerate()
            .map(|(i, (definition, instance))| {
                index.insert(definition.name.clone(), i);
                Registered {
                    definition,
                    instance,
                }
            })
            .collect();

        // 활성화된 유닛은 이후 재정의 불가
        for unit in units.iter().filter(|u| u.generation() == scope.generation()) {
            scope.resolver().freeze(unit.name())?;
        }

        info!(
            "Built registry for {} with {} components",
            scope.generation(),
            components.len()
        );
        Ok(Self {
            generation: scope.generation().to_string(),
            entry: entry.name().to_string(),
            components,
            index,
            init_order,
            closed: AtomicBool::new(false),
        })
    }

    /// 시작 훅 실행 (priority → 발견 순서). 실행한 훅 수 반환
    pub fn run_startup_hooks(&self, scope: &ModuleScope) -> Result<usize> {
        let mut hooks: Vec<_> = self
            .components
            .iter()
            .filter_map(|c| {
                c.instance
                    .clone()
                    .startup_hook()
                    .map(|hook| (&c.definition, hook))
            })
            .collect();
        hooks.sort_by_key(|(def, _)| (def.priority, def.discovery));

        for (definition, hook) in &hooks {
            debug!("Running startup hook {}", definition.name);
            hook.run(scope, self).map_err(|e| {
                Error::Component(format!("startup hook {} failed: {}", definition.name, e))
            })?;
        }
        Ok(hooks.len())
    }

    // ========================================================================
    // 조회
    // ========================================================================

    pub fn generation(&self) -> &str {
        &self.generation
    }

    /// 엔트리 정규 이름
    pub fn entry(&self) -> &str {
        &self.entry
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Component>> {
        self.index
            .get(name)
            .map(|&i| self.components[i].instance.clone())
    }

    /// 구체 타입으로 조회
    pub fn get_as<T: Component>(&self, name: &str) -> Option<Arc<T>> {
        self.get(name)?.into_any_arc().downcast::<T>().ok()
    }

    /// 구체 타입의 모든 컴포넌트 (발견 순서)
    pub fn components_of<T: Component>(&self) -> Vec<Arc<T>> {
        self.components
            .iter()
            .filter_map(|c| c.instance.clone().into_any_arc().downcast::<T>().ok())
            .collect()
    }

    pub fn definition(&self, name: &str) -> Option<&ComponentDefinition> {
        self.index.get(name).map(|&i| &self.components[i].definition)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// 발견 순서 이름
    pub fn names(&self) -> Vec<&str> {
        self.components
            .iter()
            .map(|c| c.definition.name.as_str())
            .collect()
    }

    /// 초기화(의존) 순서 이름
    pub fn init_order(&self) -> Vec<&str> {
        self.init_order
            .iter()
            .map(|&i| self.components[i].definition.name.as_str())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    // ========================================================================
    // 역할별 조회
    // ========================================================================

    fn ordered(&self) -> Vec<&Registered> {
        let mut ordered: Vec<_> = self.components.iter().collect();
        ordered.sort_by_key(|c| (c.definition.priority, c.definition.discovery));
        ordered
    }

    /// 핸들러 매핑 (priority → 발견 순서)
    pub fn handler_mappings(&self) -> Vec<Arc<dyn HandlerMapping>> {
        self.ordered()
            .into_iter()
            .filter_map(|c| c.instance.clone().handler_mapping())
            .collect()
    }

    /// 핸들러 어댑터
    pub fn handler_adapters(&self) -> Vec<Arc<dyn HandlerAdapter>> {
        self.components
            .iter()
            .filter_map(|c| c.instance.clone().handler_adapter())
            .collect()
    }

    /// 인터셉터 (priority → 발견 순서)
    pub fn interceptors(&self) -> Vec<Arc<dyn HandlerInterceptor>> {
        self.ordered()
            .into_iter()
            .filter_map(|c| c.instance.clone().interceptor())
            .collect()
    }

    /// 이름(정규 또는 단순)으로 모듈 서비스 조회
    pub fn module_service(&self, name: &str) -> Option<Arc<dyn ModuleService>> {
        let by_name = self.index.get(name).copied().or_else(|| {
            self.components.iter().position(|c| {
                c.definition
                    .name
                    .rsplit('.')
                    .next()
                    .map_or(false, |simple| simple == name)
            })
        })?;
        self.components[by_name].instance.clone().module_service()
    }

    pub fn data_manager(&self) -> Option<Arc<dyn DataManager>> {
        self.components
            .iter()
            .find_map(|c| c.instance.clone().data_manager())
    }

    pub fn dependency_control(&self) -> Option<Arc<dyn DependencyControl>> {
        self.components
            .iter()
            .find_map(|c| c.instance.clone().dependency_control())
    }

    // ========================================================================
    // 정리
    // ========================================================================

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// 의존 역순으로 정리 (멱등). 실패해도 나머지는 계속 정리한다
    pub fn teardown(&self, scope: &ModuleScope) -> Result<usize> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(0);
        }

        let mut failures = Vec::new();
        let mut destroyed = 0;
        for &i in self.init_order.iter().rev() {
            let component = &self.components[i];
            match component.instance.destroy(scope) {
                Ok(()) => destroyed += 1,
                Err(e) => {
                    error!(
                        "Failed to destroy {} in {}: {}",
                        component.definition.name, self.generation, e
                    );
                    failures.push(format!("{}: {}", component.definition.name, e));
                }
            }
        }

        info!(
            "Tore down registry {} ({} destroyed, {} failed)",
            self.generation,
            destroyed,
            failures.len()
        );
        if failures.is_empty() {
            Ok(destroyed)
        } else {
            Err(Error::Teardown(failures.join("; ")))
        }
    }
}

impl std::fmt::Debug for ComponentRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentRegistry")
            .field("generation", &self.generation)
            .field("components", &self.names())
            .field("closed", &self.is_closed())
            .finish()
    }
}

// ============================================================================
// 발견 / 정렬
// ============================================================================

fn discover(
    scope: &ModuleScope,
    entry: &Arc<ResolvedUnit>,
    directives: &BootstrapDirectives,
) -> Result<Vec<Arc<ResolvedUnit>>> {
    let mut units = vec![entry.clone()];
    let mut seen: HashSet<String> = HashSet::from([entry.name().to_string()]);

    if directives.scans_components() {
        for package in &directives.scan_packages {
            for name in scope.resolver().scan(package)? {
                if seen.contains(&name) {
                    continue;
                }
                let unit = scope.resolve_unit(&name)?;
                if unit.is_entry() {
                    debug!("Skipping foreign entry {} during scan", name);
                    continue;
                }
                seen.insert(name);
                units.push(unit);
            }
        }
    }

    // 스캔 밖의 의존 (부모 리졸버의 공유 유닛 포함)
    let mut pending: VecDeque<String> = units
        .iter()
        .flat_map(|u| u.unit().depends_on.clone())
        .collect();
    while let Some(name) = pending.pop_front() {
        if seen.contains(&name) {
            continue;
        }
        let unit = scope.resolve_unit(&name).map_err(|e| {
            Error::Component(format!("unsatisfied dependency {}: {}", name, e))
        })?;
        if unit.is_entry() {
            return Err(Error::Component(format!(
                "dependency {} is an entry unit",
                name
            )));
        }
        pending.extend(unit.unit().depends_on.iter().cloned());
        seen.insert(name);
        units.push(unit);
    }

    Ok(units)
}

/// 발견 순서대로 인스턴스 생성. 실패 시 이미 만든 것은 역순으로 정리
fn instantiate(
    scope: &ModuleScope,
    units: &[Arc<ResolvedUnit>],
    catalog: &TypeCatalog,
) -> Result<Vec<Arc<dyn Component>>> {
    let mut created: Vec<Arc<dyn Component>> = Vec::with_capacity(units.len());
    for unit in units {
        let result = catalog
            .get(unit.implementation())
            .ok_or_else(|| {
                Error::Component(format!(
                    "no implementation linked for type {} (unit {})",
                    unit.implementation(),
                    unit.name()
                ))
            })
            .and_then(|factory| {
                factory.create(unit, scope).map_err(|e| {
                    Error::Component(format!("failed to create {}: {}", unit.name(), e))
                })
            });
        match result {
            Ok(instance) => created.push(instance),
            Err(e) => {
                for instance in created.iter().rev() {
                    if let Err(cleanup) = instance.destroy(scope) {
                        warn!("Cleanup after failed build: {}", cleanup);
                    }
                }
                return Err(e);
            }
        }
    }
    Ok(created)
}

/// 의존 순서 (동률은 발견 순서)
fn dependency_order(definitions: &[ComponentDefinition]) -> Result<Vec<usize>> {
    let index: HashMap<&str, usize> = definitions
        .iter()
        .enumerate()
        .map(|(i, d)| (d.name.as_str(), i))
        .collect();

    let mut indegree = vec![0usize; definitions.len()];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); definitions.len()];
    for (i, definition) in definitions.iter().enumerate() {
        for dependency in &definition.depends_on {
            let &d = index.get(dependency.as_str()).ok_or_else(|| {
                Error::Component(format!(
                    "{} depends on unknown component {}",
                    definition.name, dependency
                ))
            })?;
            indegree[i] += 1;
            dependents[d].push(i);
        }
    }

    let mut ready: Vec<usize> = (0..definitions.len()).filter(|&i| indegree[i] == 0).collect();
    let mut order = Vec::with_capacity(definitions.len());
    while !ready.is_empty() {
        // 가장 먼저 발견된 것부터
        ready.sort_unstable_by(|a, b| b.cmp(a));
        let Some(next) = ready.pop() else { break };
        order.push(next);
        for &dependent in &dependents[next] {
            indegree[dependent] -= 1;
            if indegree[dependent] == 0 {
                ready.push(dependent);
            }
        }
    }

    if order.len() != definitions.len() {
        let cyclic: Vec<_> = (0..definitions.len())
            .filter(|i| !order.contains(i))
            .map(|i| definitions[i].name.clone())
            .collect();
        return Err(Error::Component(format!(
            "dependency cycle among {}",
            cyclic.join(", ")
        )));
    }
    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::StartupHook;
    use crate::module::ModuleProperties;
    use crate::namespace::{unit_path, NamespaceResolver};
    use crate::patch::PatchStep;
    use parking_lot::Mutex;

    struct Recorder {
        name: String,
        log: Arc<Mutex<Vec<String>>>,
        fail_destroy: bool,
        hook: bool,
    }

    impl Component for Recorder {
        fn startup_hook(self: Arc<Self>) -> Option<Arc<dyn StartupHook>> {
            if self.hook {
                Some(self)
            } else {
                None
            }
        }

        fn destroy(&self, scope: &ModuleScope) -> Result<()> {
            self.log
                .lock()
                .push(format!("destroy {} in {}", self.name, scope.generation()));
            if self.fail_destroy {
                Err(Error::Internal("boom".into()))
            } else {
                Ok(())
            }
        }
    }

    impl StartupHook for Recorder {
        fn run(&self, _scope: &ModuleScope, registry: &ComponentRegistry) -> Result<()> {
            assert!(registry.contains(&self.name));
            self.log.lock().push(format!("start {}", self.name));
            Ok(())
        }
    }

    struct Fixture {
        _dir: tempfile::TempDir,
        scope: ModuleScope,
        catalog: TypeCatalog,
        log: Arc<Mutex<Vec<String>>>,
    }

    fn fixture(units: &[(&str, &str)]) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        for (name, content) in units {
            let path = dir.path().join(unit_path(name));
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, content).unwrap();
        }
        let resolver = Arc::new(NamespaceResolver::new("foo", None));
        resolver.add_root_path(dir.path()).unwrap();
        let scope = ModuleScope::new("foo", resolver, ModuleProperties::empty());

        let log = Arc::new(Mutex::new(Vec::new()));
        let catalog = TypeCatalog::new();
        let sink = log.clone();
        catalog.register_fn("test.Recorder", move |unit, _scope| {
            let props = &unit.unit().properties;
            Ok(Arc::new(Recorder {
                name: unit.name().to_string(),
                log: sink.clone(),
                fail_destroy: props.get("fail").and_then(|v| v.as_bool()).unwrap_or(false),
                hook: props.get("hook").and_then(|v| v.as_bool()).unwrap_or(false),
            }) as Arc<dyn Component>)
        });
        Fixture {
            _dir: dir,
            scope,
            catalog,
            log,
        }
    }

    fn build(f: &Fixture) -> Result<ComponentRegistry> {
        let (entry, directives) = PatchStep::default().apply(f.scope.resolver(), "foo.Main", "foo")?;
        ComponentRegistry::build(&f.scope, &entry, &directives, &f.catalog)
    }

    const ENTRY: &str = "kind = \"entry\"\ntype = \"test.Recorder\"";

    #[test]
    fn test_build_discovers_and_orders() {
        let f = fixture(&[
            ("foo.Main", ENTRY),
            ("foo.web.Controller", "type = \"test.Recorder\"\ndepends_on = [\"foo.data.Repo\"]"),
            ("foo.data.Repo", "type = \"test.Recorder\""),
        ]);
        let registry = build(&f).unwrap();

        assert_eq!(registry.len(), 3);
        assert_eq!(registry.entry(), "foo.Main");
        assert_eq!(registry.names()[0], "foo.Main");
        let order = registry.init_order();
        let repo = order.iter().position(|n| *n == "foo.data.Repo").unwrap();
        let controller = order.iter().position(|n| *n == "foo.web.Controller").unwrap();
        assert!(repo < controller);
        assert!(f.scope.resolver().is_frozen("foo.Main"));
        assert!(registry.get_as::<Recorder>("foo.data.Repo").is_some());
        assert_eq!(registry.components_of::<Recorder>().len(), 3);
    }

    #[test]
    fn test_teardown_reverse_dependency_order_and_continues() {
        let f = fixture(&[
            ("foo.Main", ENTRY),
            ("foo.a.First", "type = \"test.Recorder\"\n[properties]\nfail = true"),
            ("foo.b.Second", "type = \"test.Recorder\"\ndepends_on = [\"foo.a.First\"]"),
        ]);
        let registry = build(&f).unwrap();

        let err = registry.teardown(&f.scope).unwrap_err();
        assert!(matches!(err, Error::Teardown(_)));
        let log = f.log.lock().clone();
        let second = log.iter().position(|l| l.starts_with("destroy foo.b.Second")).unwrap();
        let first = log.iter().position(|l| l.starts_with("destroy foo.a.First")).unwrap();
        assert!(second < first);
        assert_eq!(log.iter().filter(|l| l.starts_with("destroy")).count(), 3);

        // 두 번째 정리는 아무것도 하지 않는다
        assert_eq!(registry.teardown(&f.scope).unwrap(), 0);
        assert!(registry.is_closed());
    }

    #[test]
    fn test_startup_hooks_priority_then_discovery() {
        let f = fixture(&[
            ("foo.Main", "kind = \"entry\"\ntype = \"test.Recorder\"\npriority = 5\n[properties]\nhook = true"),
            ("foo.a.Late", "type = \"test.Recorder\"\npriority = 10\n[properties]\nhook = true"),
            ("foo.b.Early", "type = \"test.Recorder\"\npriority = -1\n[properties]\nhook = true"),
            ("foo.c.Tie", "type = \"test.Recorder\"\npriority = 5\n[properties]\nhook = true"),
        ]);
        let registry = build(&f).unwrap();
        assert_eq!(registry.run_startup_hooks(&f.scope).unwrap(), 4);

        let starts: Vec<_> = f
            .log
            .lock()
            .iter()
            .filter_map(|l| l.strip_prefix("start ").map(str::to_string))
            .collect();
        assert_eq!(starts, vec!["foo.b.Early", "foo.Main", "foo.c.Tie", "foo.a.Late"]);
    }

    #[test]
    fn test_missing_dependency_fails() {
        let f = fixture(&[
            ("foo.Main", "kind = \"entry\"\ntype = \"test.Recorder\"\ndepends_on = [\"foo.Ghost\"]"),
        ]);
        assert!(matches!(build(&f), Err(Error::Component(_))));
    }

    #[test]
    fn test_cycle_fails() {
        let f = fixture(&[
            ("foo.Main", ENTRY),
            ("foo.x.A", "type = \"test.Recorder\"\ndepends_on = [\"foo.x.B\"]"),
            ("foo.x.B", "type = \"test.Recorder\"\ndepends_on = [\"foo.x.A\"]"),
        ]);
        let err = build(&f).unwrap_err();
        assert!(err.to_string().contains("cycle"));
    }

    #[test]
    fn test_unlinked_type_fails() {
        let f = fixture(&[("foo.Main", ENTRY), ("foo.x.Unknown", "")]);
        let err = build(&f).unwrap_err();
        assert!(err.to_string().contains("no implementation linked"));
        // 이미 생성된 엔트리는 정리된다
        assert_eq!(*f.log.lock(), vec!["destroy foo.Main in foo".to_string()]);
    }

    #[test]
    fn test_scan_skipped_without_marker() {
        let f = fixture(&[("foo.Main", ENTRY), ("foo.x.Extra", "type = \"test.Recorder\"")]);
        let entry = f.scope.resolve_unit("foo.Main").unwrap();
        let directives = BootstrapDirectives {
            entry: "foo.Main".into(),
            suppressed: vec![],
            features: Default::default(),
            scan_packages: vec!["foo".into()],
        };
        let registry = ComponentRegistry::build(&f.scope, &entry, &directives, &f.catalog).unwrap();
        assert_eq!(registry.names(), vec!["foo.Main"]);
    }
}
