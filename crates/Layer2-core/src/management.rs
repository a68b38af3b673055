//! Module Management - 운영자용 load / unload / reload
//!
//! 내부 에러는 이 경계를 넘지 않고 사람이 읽는 메시지로 바뀐다.

use crate::module::{EntryDescriptor, ModuleContextManager};
use crate::namespace::is_archive;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// 활성 모듈 요약
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModuleSummary {
    pub identity: String,
    pub generation: String,
    pub state: String,
    pub components: usize,
    pub activated_at: Option<String>,
}

/// 관리 인터페이스
pub struct ModuleManagement {
    manager: Arc<ModuleContextManager>,
}

impl ModuleManagement {
    pub fn new(manager: Arc<ModuleContextManager>) -> Self {
        Self { manager }
    }

    pub fn manager(&self) -> &Arc<ModuleContextManager> {
        &self.manager
    }

    /// 아카이브 로드. 이미 활성이면 같은 락 구간에서 새 아카이브로 교체
    pub async fn load_module(&self, archive: &Path) -> String {
        let Some(identity) = identity_of(archive) else {
            return format!("load module fail: {}, invalid file name", archive.display());
        };
        if !archive.is_file() {
            return format!("load module fail: {}, file not found", identity);
        }
        if !is_archive(archive) {
            return format!("load module fail: {}, not a zip or jar archive", identity);
        }

        match self
            .manager
            .replace(&identity, EntryDescriptor::archive(archive))
            .await
        {
            Ok(context) => {
                info!("Loaded {} as {}", identity, context.generation());
                format!("load module success: {}", identity)
            }
            Err(e) => {
                warn!("Load of {} failed: {}", identity, e);
                format!("load module fail: {}, {}", identity, e)
            }
        }
    }

    pub async fn unload_module(&self, identity: &str) -> String {
        match self.manager.unload(identity).await {
            Ok(()) => format!("unload module success: {}", identity),
            Err(e) => {
                warn!("Unload of {} failed: {}", identity, e);
                format!("unload module fail: {}, {}", identity, e)
            }
        }
    }

    pub async fn reload_module(&self, identity: &str) -> String {
        match self.manager.reload(identity).await {
            Ok(context) => format!(
                "reload module success: {} ({})",
                identity,
                context.generation()
            ),
            Err(e) => {
                warn!("Reload of {} failed: {}", identity, e);
                format!("reload module fail: {}, {}", identity, e)
            }
        }
    }

    /// 활성 모듈 목록
    pub fn list_modules(&self) -> Vec<ModuleSummary> {
        self.manager
            .contexts()
            .into_iter()
            .map(|context| ModuleSummary {
                identity: context.identity().to_string(),
                generation: context.generation().to_string(),
                state: context.state().to_string(),
                components: context.registry().map_or(0, |r| r.len()),
                activated_at: context.activated_at().map(|t| t.to_rfc3339()),
            })
            .collect()
    }
}

/// 파일 이름의 첫 `.` 앞부분 (`foo.1.0.zip` → `foo`)
fn identity_of(archive: &Path) -> Option<String> {
    let name = archive.file_name()?.to_str()?;
    let identity = name.split('.').next()?.trim();
    (!identity.is_empty()).then(|| identity.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::TypeCatalog;
    use graft_foundation::GraftConfig;
    use std::io::Write;

    fn management(load_path: &Path) -> ModuleManagement {
        let config = GraftConfig::default().with_load_path(load_path);
        let manager =
            ModuleContextManager::new(config, Arc::new(TypeCatalog::with_builtins())).unwrap();
        ModuleManagement::new(manager)
    }

    fn write_zip(path: &Path, entries: &[(&str, &str)]) {
        let file = std::fs::File::create(path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        for (name, content) in entries {
            zip.start_file(*name, zip::write::SimpleFileOptions::default())
                .unwrap();
            zip.write_all(content.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
    }

    #[test]
    fn test_identity_of() {
        assert_eq!(identity_of(Path::new("/x/foo.zip")).as_deref(), Some("foo"));
        assert_eq!(identity_of(Path::new("foo.1.0.jar")).as_deref(), Some("foo"));
        assert_eq!(identity_of(Path::new(".zip")), None);
    }

    #[tokio::test]
    async fn test_load_module_messages() {
        let work = tempfile::tempdir().unwrap();
        let mgmt = management(&work.path().join("plugin"));

        let archive = work.path().join("foo.zip");
        write_zip(&archive, &[("classes/foo/Main.unit", "kind = \"entry\"")]);
        assert_eq!(mgmt.load_module(&archive).await, "load module success: foo");
        assert_eq!(mgmt.list_modules().len(), 1);

        // 다시 로드하면 새 세대
        assert_eq!(mgmt.load_module(&archive).await, "load module success: foo");
        assert_eq!(mgmt.list_modules()[0].generation, "foo~1");

        assert_eq!(mgmt.unload_module("foo").await, "unload module success: foo");
        assert!(mgmt.list_modules().is_empty());
    }

    #[tokio::test]
    async fn test_load_module_rejects_bad_input() {
        let work = tempfile::tempdir().unwrap();
        let mgmt = management(&work.path().join("plugin"));

        let text = work.path().join("foo.txt");
        std::fs::write(&text, "x").unwrap();
        assert!(mgmt.load_module(&text).await.contains("not a zip or jar"));
        assert!(mgmt
            .load_module(&work.path().join("bar.zip"))
            .await
            .contains("file not found"));

        let broken = work.path().join("baz.zip");
        write_zip(&broken, &[("classes/baz/Other.unit", "kind = \"entry\"")]);
        let message = mgmt.load_module(&broken).await;
        assert!(message.starts_with("load module fail: baz"));
        assert!(!mgmt.manager().has_context("baz"));
        assert!(!work.path().join("plugin/baz").exists());
    }

    #[tokio::test]
    async fn test_load_module_replaces_active_artifact() {
        let work = tempfile::tempdir().unwrap();
        let mgmt = management(&work.path().join("plugin"));

        let first = work.path().join("foo.1.zip");
        write_zip(&first, &[("classes/foo/Main.unit", "kind = \"entry\"")]);
        assert_eq!(mgmt.load_module(&first).await, "load module success: foo");

        let second = work.path().join("foo.2.zip");
        write_zip(
            &second,
            &[
                ("classes/foo/Main.unit", "kind = \"entry\""),
                ("classes/foo/Props.unit", "type = \"graft.PropertyService\""),
            ],
        );
        assert_eq!(mgmt.load_module(&second).await, "load module success: foo");

        let context = mgmt.manager().get_context("foo").unwrap();
        assert_eq!(context.generation(), "foo~1");
        assert!(context.registry().unwrap().contains("foo.Props"));
        assert!(!work.path().join("plugin/foo").exists());

        // reload는 교체된 아카이브를 사용
        let reloaded = mgmt.manager().reload("foo").await.unwrap();
        assert!(reloaded.registry().unwrap().contains("foo.Props"));
    }
}
