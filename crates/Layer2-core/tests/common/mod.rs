//! 통합 테스트 공용 픽스처

#![allow(dead_code)]

use graft_core::namespace::unit_path;
use graft_core::{ModuleContextManager, TypeCatalog};
use graft_foundation::GraftConfig;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// 디렉토리 아티팩트 작성기 (`classes/` 아래 유닛)
pub struct Artifact {
    root: PathBuf,
}

impl Artifact {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        std::fs::create_dir_all(root.join("classes")).unwrap();
        Self { root }
    }

    pub fn unit(self, name: &str, content: &str) -> Self {
        let path = self.root.join("classes").join(unit_path(name));
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
        self
    }

    /// `classes/` 기준 리소스 파일
    pub fn resource(self, relative: &str, content: &str) -> Self {
        let path = self.root.join("classes").join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
        self
    }

    /// `lib/` 아래 중첩 아카이브
    pub fn library(self, file_name: &str, entries: &[(&str, &str)]) -> Self {
        let lib = self.root.join("lib");
        std::fs::create_dir_all(&lib).unwrap();
        std::fs::write(lib.join(file_name), zip_bytes(entries)).unwrap();
        self
    }

    pub fn path(&self) -> &Path {
        &self.root
    }
}

/// 메모리에서 zip 생성
pub fn zip_bytes(entries: &[(&str, &str)]) -> Vec<u8> {
    let mut zip = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    for (name, content) in entries {
        zip.start_file(*name, zip::write::SimpleFileOptions::default())
            .unwrap();
        zip.write_all(content.as_bytes()).unwrap();
    }
    zip.finish().unwrap().into_inner()
}

/// 디렉토리를 zip 아카이브로 묶기
pub fn zip_dir(dir: &Path, target: &Path) {
    let mut entries = Vec::new();
    collect(dir, dir, &mut entries);
    let file = std::fs::File::create(target).unwrap();
    let mut zip = zip::ZipWriter::new(file);
    for (name, bytes) in &entries {
        zip.start_file(name.as_str(), zip::write::SimpleFileOptions::default())
            .unwrap();
        zip.write_all(bytes).unwrap();
    }
    zip.finish().unwrap();
}

fn collect(base: &Path, dir: &Path, out: &mut Vec<(String, Vec<u8>)>) {
    for entry in std::fs::read_dir(dir).unwrap() {
        let path = entry.unwrap().path();
        if path.is_dir() {
            collect(base, &path, out);
        } else {
            let name = path
                .strip_prefix(base)
                .unwrap()
                .to_string_lossy()
                .replace('\\', "/");
            out.push((name, std::fs::read(&path).unwrap()));
        }
    }
}

pub fn manager_with(config: GraftConfig, catalog: TypeCatalog) -> Arc<ModuleContextManager> {
    ModuleContextManager::new(config, Arc::new(catalog)).unwrap()
}

pub fn manager(load_path: &Path) -> Arc<ModuleContextManager> {
    manager_with(
        GraftConfig::default().with_load_path(load_path),
        TypeCatalog::with_builtins(),
    )
}

/// 엔트리 + 고정 응답 라우트를 가진 모듈
pub fn routed_module(dir: &Path, identity: &str, path: &str, body: &str) -> Artifact {
    Artifact::new(dir)
        .unit(
            &format!("{}.Main", identity),
            "kind = \"entry\"\nmarkers = [\"host.EnableWebServer\"]",
        )
        .unit(
            &format!("{}.web.Routes", identity),
            &format!(
                "type = \"graft.StaticRoutes\"\n[properties.routes]\n\"{}\" = \"{}\"",
                path, body
            ),
        )
}
