//! Resolver Factory - 세대별 리졸버 단일 생성
//!
//! 핫패스는 읽기 락만 잡고 조회하며, 없을 때만 생성 락 아래에서 재확인 후
//! 한 번 생성한다 (double-checked locking).

use super::resolver::NamespaceResolver;
use super::root::{is_archive, ResourceRoot};
use crate::identity::logical_name;
use graft_foundation::{Error, Result};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// 컴파일된 유닛 디렉토리
pub const CLASSES_DIR: &str = "classes";

/// 중첩 의존성 아카이브 디렉토리
pub const LIB_DIR: &str = "lib";

/// 세대 디렉토리의 루트 구성
///
/// `classes/` → `lib/*.{zip,jar}` → 최상위 아카이브 → 디렉토리 자체 순서.
pub fn artifact_roots(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(Error::resource(dir.display(), "module directory does not exist"));
    }

    let mut roots = Vec::new();
    let classes = dir.join(CLASSES_DIR);
    if classes.is_dir() {
        roots.push(classes);
    }
    let lib = dir.join(LIB_DIR);
    if lib.is_dir() {
        roots.extend(archives_in(&lib)?);
    }
    roots.extend(archives_in(dir)?);
    roots.push(dir.to_path_buf());
    Ok(roots)
}

fn archives_in(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir).map_err(|e| Error::resource(dir.display(), e))?;
    let mut archives = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| Error::resource(dir.display(), e))?.path();
        if path.is_file() && is_archive(&path) {
            archives.push(path);
        }
    }
    archives.sort();
    Ok(archives)
}

/// 세대 이름 → 리졸버
pub struct ResolverFactory {
    resolvers: RwLock<HashMap<String, Arc<NamespaceResolver>>>,
    /// 논리 이름 → 마지막으로 생성한 세대
    latest: RwLock<HashMap<String, String>>,
    build_lock: Mutex<()>,
    parent: Option<Arc<NamespaceResolver>>,
}

impl ResolverFactory {
    pub fn new(parent: Option<Arc<NamespaceResolver>>) -> Self {
        Self {
            resolvers: RwLock::new(HashMap::new()),
            latest: RwLock::new(HashMap::new()),
            build_lock: Mutex::new(()),
            parent,
        }
    }

    pub fn parent(&self) -> Option<&Arc<NamespaceResolver>> {
        self.parent.as_ref()
    }

    pub fn get(&self, generation: &str) -> Option<Arc<NamespaceResolver>> {
        self.resolvers.read().get(generation).cloned()
    }

    /// 조회 또는 생성. `roots`는 실제로 생성할 때만 호출된다
    pub fn get_or_create<F>(&self, generation: &str, roots: F) -> Result<Arc<NamespaceResolver>>
    where
        F: FnOnce() -> Result<Vec<PathBuf>>,
    {
        if let Some(resolver) = self.get(generation) {
            return Ok(resolver);
        }

        let _guard = self.build_lock.lock();
        if let Some(resolver) = self.get(generation) {
            return Ok(resolver);
        }

        let resolver = NamespaceResolver::new(generation, self.parent.clone());
        for path in roots()? {
            let added = ResourceRoot::open(&path).and_then(|root| resolver.add_root(root));
            if let Err(e) = added {
                resolver.close();
                return Err(e);
            }
        }
        let resolver = Arc::new(resolver);

        let logical = logical_name(generation).to_string();
        let previous = self.latest.write().insert(logical, generation.to_string());
        if let Some(previous) = previous.filter(|p| p != generation) {
            if let Some(predecessor) = self.get(&previous) {
                debug!("Linking resolver {} -> {}", previous, generation);
                predecessor.link_successor(&resolver);
            }
        }

        self.resolvers
            .write()
            .insert(generation.to_string(), resolver.clone());
        info!(
            "Created resolver {} with {} roots",
            generation,
            resolver.root_count()
        );
        Ok(resolver)
    }

    /// 등록 해제 (닫지는 않음)
    pub fn remove(&self, generation: &str) -> Option<Arc<NamespaceResolver>> {
        self.resolvers.write().remove(generation)
    }

    pub fn generations(&self) -> Vec<String> {
        let mut names: Vec<_> = self.resolvers.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.resolvers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.resolvers.read().is_empty()
    }
}

impl Default for ResolverFactory {
    fn default() -> Self {
        Self::new(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_artifact_roots_layout() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("classes")).unwrap();
        std::fs::create_dir_all(dir.path().join("lib")).unwrap();
        for name in ["lib/b.jar", "lib/a.zip", "lib/notes.txt", "top.zip"] {
            let file = std::fs::File::create(dir.path().join(name)).unwrap();
            zip::ZipWriter::new(file).finish().unwrap();
        }

        let roots = artifact_roots(dir.path()).unwrap();
        let rel: Vec<_> = roots
            .iter()
            .map(|p| p.strip_prefix(dir.path()).unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(rel, vec!["classes", "lib/a.zip", "lib/b.jar", "top.zip", ""]);
    }

    #[test]
    fn test_missing_module_dir_is_resource_error() {
        let err = artifact_roots(Path::new("/no/such/module")).unwrap_err();
        assert!(matches!(err, Error::Resource(_)));
    }

    #[test]
    fn test_concurrent_get_or_create_builds_once() {
        let dir = tempfile::tempdir().unwrap();
        let factory = Arc::new(ResolverFactory::default());
        let builds = Arc::new(AtomicUsize::new(0));
        let path = dir.path().to_path_buf();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let (factory, builds, path) = (factory.clone(), builds.clone(), path.clone());
                std::thread::spawn(move || {
                    factory
                        .get_or_create("race", || {
                            builds.fetch_add(1, Ordering::SeqCst);
                            Ok(vec![path])
                        })
                        .unwrap()
                })
            })
            .collect();
        let resolvers: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(builds.load(Ordering::SeqCst), 1);
        assert!(resolvers.iter().all(|r| Arc::ptr_eq(r, &resolvers[0])));
        assert_eq!(factory.len(), 1);
    }

    #[test]
    fn test_failed_root_registers_nothing() {
        let factory = ResolverFactory::default();
        let err = factory
            .get_or_create("foo", || Ok(vec![PathBuf::from("/no/such/root")]))
            .unwrap_err();
        assert!(matches!(err, Error::Resource(_)));
        assert!(factory.get("foo").is_none());
    }

    #[test]
    fn test_new_generation_links_predecessor() {
        let dir = tempfile::tempdir().unwrap();
        let factory = ResolverFactory::default();
        let roots = || Ok(vec![dir.path().to_path_buf()]);
        let first = factory.get_or_create("foo", roots).unwrap();
        let second = factory.get_or_create("foo~1", roots).unwrap();

        first.close();
        assert!(second.is_closed());
    }
}
