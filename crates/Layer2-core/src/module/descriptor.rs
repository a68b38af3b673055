//! Entry Descriptor - 배포 아티팩트와 엔트리 지정
//!
//! 로드 시 아티팩트는 `<load_path>/<generation>` 으로 스테이징된다.
//! 디렉토리는 복사, 아카이브(zip/jar)는 압축 해제.

use crate::namespace::is_archive;
use graft_foundation::{Error, Result};
use std::fmt;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

/// 아티팩트 출처
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactSource {
    /// 풀어진 디렉토리
    Directory(PathBuf),
    /// zip/jar 아카이브
    Archive(PathBuf),
}

impl ArtifactSource {
    pub fn path(&self) -> &Path {
        match self {
            Self::Directory(path) | Self::Archive(path) => path,
        }
    }
}

impl fmt::Display for ArtifactSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Directory(path) => write!(f, "directory {}", path.display()),
            Self::Archive(path) => write!(f, "archive {}", path.display()),
        }
    }
}

/// 로드 요청 기술자
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryDescriptor {
    pub source: ArtifactSource,
    /// 엔트리 유닛 정규 이름 (없으면 `<root>.<entry_name>`)
    pub entry_type: Option<String>,
}

impl EntryDescriptor {
    pub fn directory(path: impl Into<PathBuf>) -> Self {
        Self {
            source: ArtifactSource::Directory(path.into()),
            entry_type: None,
        }
    }

    pub fn archive(path: impl Into<PathBuf>) -> Self {
        Self {
            source: ArtifactSource::Archive(path.into()),
            entry_type: None,
        }
    }

    /// 확장자로 종류 판별
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        if is_archive(&path) {
            Self::archive(path)
        } else {
            Self::directory(path)
        }
    }

    pub fn with_entry_type(mut self, entry_type: impl Into<String>) -> Self {
        self.entry_type = Some(entry_type.into());
        self
    }

    /// 아티팩트를 대상 디렉토리로 스테이징 (기존 내용은 제거)
    pub async fn stage(&self, target: &Path) -> Result<()> {
        let source = self.source.path();
        if !source.exists() {
            return Err(Error::resource(&self.source, "not found"));
        }

        if target.exists() {
            debug!("Removing stale staging dir {}", target.display());
            fs::remove_dir_all(target)
                .await
                .map_err(|e| Error::resource(target.display(), e))?;
        }

        match &self.source {
            ArtifactSource::Directory(path) => copy_dir_recursive(path, target)
                .await
                .map_err(|e| Error::resource(&self.source, e))?,
            ArtifactSource::Archive(path) => extract_archive(path.clone(), target.to_path_buf())
                .await
                .map_err(|e| Error::resource(&self.source, e))?,
        }

        info!("Staged {} into {}", self.source, target.display());
        Ok(())
    }
}

/// 디렉토리 재귀 복사
async fn copy_dir_recursive(src: &Path, dest: &Path) -> Result<()> {
    if !dest.exists() {
        fs::create_dir_all(dest).await?;
    }

    let mut entries = fs::read_dir(src).await?;

    while let Some(entry) = entries.next_entry().await? {
        let src_path = entry.path();
        let dest_path = dest.join(entry.file_name());

        if src_path.is_dir() {
            Box::pin(copy_dir_recursive(&src_path, &dest_path)).await?;
        } else {
            fs::copy(&src_path, &dest_path).await?;
        }
    }

    Ok(())
}

async fn extract_archive(archive: PathBuf, dest: PathBuf) -> Result<()> {
    tokio::task::spawn_blocking(move || -> Result<()> {
        let file = std::fs::File::open(&archive)?;
        let mut zip = zip::ZipArchive::new(file)
            .map_err(|e| Error::resource(archive.display(), e))?;
        std::fs::create_dir_all(&dest)?;
        zip.extract(&dest)
            .map_err(|e| Error::resource(archive.display(), e))?;
        Ok(())
    })
    .await
    .map_err(|e| Error::Internal(format!("extract task failed: {}", e)))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn test_stage_directory_replaces_stale_content() {
        let src = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(src.path().join("classes/foo")).unwrap();
        std::fs::write(src.path().join("classes/foo/Main.unit"), "kind = \"entry\"").unwrap();

        let work = tempfile::tempdir().unwrap();
        let target = work.path().join("foo");
        std::fs::create_dir_all(&target).unwrap();
        std::fs::write(target.join("stale.txt"), "old").unwrap();

        EntryDescriptor::directory(src.path())
            .stage(&target)
            .await
            .unwrap();
        assert!(target.join("classes/foo/Main.unit").exists());
        assert!(!target.join("stale.txt").exists());
    }

    #[tokio::test]
    async fn test_stage_archive() {
        let work = tempfile::tempdir().unwrap();
        let archive = work.path().join("foo.zip");
        {
            let file = std::fs::File::create(&archive).unwrap();
            let mut zip = zip::ZipWriter::new(file);
            zip.start_file("foo/Main.unit", zip::write::SimpleFileOptions::default())
                .unwrap();
            zip.write_all(b"kind = \"entry\"").unwrap();
            zip.finish().unwrap();
        }

        let descriptor = EntryDescriptor::from_path(&archive);
        assert!(matches!(descriptor.source, ArtifactSource::Archive(_)));

        let target = work.path().join("plugin/foo");
        descriptor.stage(&target).await.unwrap();
        assert!(target.join("foo/Main.unit").exists());
    }

    #[tokio::test]
    async fn test_stage_missing_source() {
        let work = tempfile::tempdir().unwrap();
        let err = EntryDescriptor::directory(work.path().join("missing"))
            .stage(&work.path().join("out"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Resource(_)));
    }
}
