//! Namespace Resolver - 세대별 격리 리소스/유닛 리졸버
//!
//! 조회 순서: (1) 해석된 유닛 캐시 → (2) 소유 루트 (등록 순서) → (3) 부모 리졸버.
//! 부모 → 자식 방향의 위임은 없다.

use super::root::ResourceRoot;
use super::unit::{package_path, qualified_name, unit_path, ResolvedUnit, Unit};
use graft_foundation::{Error, Result};
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, info};

/// 호스트(부모) 리졸버의 세대 이름
pub const HOST_GENERATION: &str = "#host";

/// 한 세대의 격리된 리졸버
pub struct NamespaceResolver {
    generation: String,
    roots: RwLock<Vec<Arc<ResourceRoot>>>,
    cache: RwLock<HashMap<String, Arc<ResolvedUnit>>>,
    frozen: RwLock<HashSet<String>>,
    parent: Option<Arc<NamespaceResolver>>,
    successor: Mutex<Option<Weak<NamespaceResolver>>>,
    closed: AtomicBool,
}

impl NamespaceResolver {
    /// 빈 리졸버 생성
    pub fn new(generation: impl Into<String>, parent: Option<Arc<NamespaceResolver>>) -> Self {
        Self {
            generation: generation.into(),
            roots: RwLock::new(Vec::new()),
            cache: RwLock::new(HashMap::new()),
            frozen: RwLock::new(HashSet::new()),
            parent,
            successor: Mutex::new(None),
            closed: AtomicBool::new(false),
        }
    }

    /// 호스트 리졸버 (부모 없음)
    pub fn host(roots: &[PathBuf]) -> Result<Arc<Self>> {
        let resolver = Self::new(HOST_GENERATION, None);
        for root in roots {
            resolver.add_root(ResourceRoot::open(root)?)?;
        }
        Ok(Arc::new(resolver))
    }

    pub fn generation(&self) -> &str {
        &self.generation
    }

    pub fn parent(&self) -> Option<&Arc<NamespaceResolver>> {
        self.parent.as_ref()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(Error::State(format!(
                "resolver for {} is closed",
                self.generation
            )));
        }
        Ok(())
    }

    // ========================================================================
    // 루트 관리
    // ========================================================================

    /// 루트 추가 (생성 이후에도 가능)
    pub fn add_root(&self, root: ResourceRoot) -> Result<()> {
        self.ensure_open()?;
        debug!(
            "Adding {} root {} to {}",
            root.kind(),
            root.location().display(),
            self.generation
        );
        self.roots.write().push(Arc::new(root));
        Ok(())
    }

    /// 경로로 루트 열어서 추가 (열기 실패는 즉시 에러)
    pub fn add_root_path(&self, path: impl Into<PathBuf>) -> Result<()> {
        self.add_root(ResourceRoot::open(path.into())?)
    }

    pub fn root_locations(&self) -> Vec<PathBuf> {
        self.roots
            .read()
            .iter()
            .map(|r| r.location().to_path_buf())
            .collect()
    }

    pub fn root_count(&self) -> usize {
        self.roots.read().len()
    }

    // ========================================================================
    // 조회
    // ========================================================================

    /// 유닛 해석
    pub fn resolve_unit(&self, name: &str) -> Result<Arc<ResolvedUnit>> {
        self.ensure_open()?;

        if let Some(unit) = self.cache.read().get(name) {
            return Ok(unit.clone());
        }

        if let Some(unit) = self.find_own(name)? {
            // 동시 정의 시 먼저 들어간 정의로 수렴
            let mut cache = self.cache.write();
            let unit = cache
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(unit))
                .clone();
            return Ok(unit);
        }

        match &self.parent {
            Some(parent) => parent.resolve_unit(name),
            None => Err(Error::NotFound(format!(
                "unit {} is not visible from {}",
                name, self.generation
            ))),
        }
    }

    /// 이 리졸버(부모 제외)가 정의할 수 있는 유닛인지
    pub fn defines(&self, name: &str) -> Result<bool> {
        self.ensure_open()?;
        if self.cache.read().contains_key(name) {
            return Ok(true);
        }
        let path = unit_path(name);
        for root in self.roots.read().iter() {
            if root.read(&path)?.is_some() {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn find_own(&self, name: &str) -> Result<Option<ResolvedUnit>> {
        let path = unit_path(name);
        for root in self.roots.read().iter() {
            if let Some(bytes) = root.read(&path)? {
                let unit = Unit::parse(name, &bytes)?;
                debug!("Defined {} in {} from {}", name, self.generation, root.location().display());
                return Ok(Some(ResolvedUnit::new(name, self.generation.as_str(), unit)));
            }
        }
        Ok(None)
    }

    /// 원시 리소스
    pub fn resource(&self, path: &str) -> Result<Vec<u8>> {
        self.find_resource(path)?.ok_or_else(|| {
            Error::NotFound(format!(
                "resource {} is not visible from {}",
                path, self.generation
            ))
        })
    }

    /// 원시 리소스 (없으면 None)
    pub fn find_resource(&self, path: &str) -> Result<Option<Vec<u8>>> {
        self.ensure_open()?;
        for root in self.roots.read().iter() {
            if let Some(bytes) = root.read(path)? {
                return Ok(Some(bytes));
            }
        }
        match &self.parent {
            Some(parent) => parent.find_resource(path),
            None => Ok(None),
        }
    }

    /// 패키지 아래 유닛 이름 (소유 루트만, 중복 시 앞 루트 우선)
    pub fn scan(&self, package: &str) -> Result<Vec<String>> {
        self.ensure_open()?;
        let mut seen = HashSet::new();
        let mut names = Vec::new();
        let prefix = package_path(package);
        for root in self.roots.read().iter() {
            for path in root.list(&prefix)? {
                if let Some(name) = qualified_name(&path) {
                    if seen.insert(name.clone()) {
                        names.push(name);
                    }
                }
            }
        }
        Ok(names)
    }

    // ========================================================================
    // 재정의 / 동결
    // ========================================================================

    /// 편집된 유닛 표현을 다시 적용
    pub fn redefine(&self, name: &str, unit: Unit) -> Result<Arc<ResolvedUnit>> {
        if self.is_closed() {
            return Err(Error::patch(name, "resolver is closed"));
        }
        if self.frozen.read().contains(name) {
            return Err(Error::patch(name, "unit is frozen"));
        }
        unit.validate().map_err(|reason| Error::patch(name, reason))?;

        let mut cache = self.cache.write();
        let current = cache.get(name).ok_or_else(|| {
            Error::patch(
                name,
                format!("not defined by generation {}", self.generation),
            )
        })?;
        if current.unit().kind != unit.kind {
            return Err(Error::patch(name, "unit kind cannot change"));
        }
        let next = Arc::new(current.redefined(unit));
        cache.insert(name.to_string(), next.clone());
        debug!("Redefined {} in {} (rev {})", name, self.generation, next.revision());
        Ok(next)
    }

    /// 활성화된 유닛 동결 (이후 재정의 불가)
    pub fn freeze(&self, name: &str) -> Result<()> {
        if !self.cache.read().contains_key(name) {
            return Err(Error::State(format!(
                "cannot freeze {}: not defined by {}",
                name, self.generation
            )));
        }
        self.frozen.write().insert(name.to_string());
        Ok(())
    }

    pub fn is_frozen(&self, name: &str) -> bool {
        self.frozen.read().contains(name)
    }

    /// 캐시된 유닛 수
    pub fn defined_count(&self) -> usize {
        self.cache.read().len()
    }

    // ========================================================================
    // 종료
    // ========================================================================

    /// 후속 세대 리졸버 연결
    pub(crate) fn link_successor(&self, successor: &Arc<NamespaceResolver>) {
        *self.successor.lock() = Some(Arc::downgrade(successor));
    }

    /// 모든 루트 핸들 해제 (멱등). 이번 호출에서 해제한 핸들 수 반환
    ///
    /// 이미 다음 세대로 대체된 리졸버를 닫으면 후속 리졸버도 함께 닫힌다.
    pub fn close(&self) -> usize {
        if self.closed.swap(true, Ordering::AcqRel) {
            return 0;
        }

        let roots = std::mem::take(&mut *self.roots.write());
        let mut released = roots.iter().filter(|root| root.close()).count();
        self.cache.write().clear();
        self.frozen.write().clear();

        let successor = self.successor.lock().take().and_then(|w| w.upgrade());
        if let Some(successor) = successor {
            released += successor.close();
        }

        info!(
            "Closed resolver {} ({} handles released)",
            self.generation, released
        );
        released
    }
}

impl std::fmt::Debug for NamespaceResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NamespaceResolver")
            .field("generation", &self.generation)
            .field("roots", &self.root_locations())
            .field("closed", &self.is_closed())
            .finish()
    }
}
