//! Resource Root - 디렉토리/아카이브 리소스 루트

use graft_foundation::{Error, Result};
use parking_lot::Mutex;
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::{Component, Path, PathBuf};
use tracing::debug;
use zip::ZipArchive;

/// 아카이브로 취급하는 확장자
pub const ARCHIVE_EXTENSIONS: &[&str] = &["zip", "jar"];

/// 아카이브 확장자 여부
pub fn is_archive(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| ARCHIVE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RootKind {
    Directory,
    Archive,
}

impl fmt::Display for RootKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Directory => write!(f, "directory"),
            Self::Archive => write!(f, "archive"),
        }
    }
}

enum Handle {
    Directory(PathBuf),
    Archive(ZipArchive<File>),
}

/// 열린 리소스 루트
///
/// 핸들은 `close()`에서 정확히 한 번 해제된다.
pub struct ResourceRoot {
    location: PathBuf,
    kind: RootKind,
    handle: Mutex<Option<Handle>>,
}

impl ResourceRoot {
    /// 경로 종류에 따라 열기
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.is_dir() {
            Self::directory(path)
        } else if is_archive(path) {
            Self::archive(path)
        } else {
            Err(Error::resource(
                path.display(),
                "not a directory or a supported archive",
            ))
        }
    }

    /// 디렉토리 루트
    pub fn directory(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        std::fs::read_dir(path).map_err(|e| Error::resource(path.display(), e))?;
        Ok(Self {
            location: path.to_path_buf(),
            kind: RootKind::Directory,
            handle: Mutex::new(Some(Handle::Directory(path.to_path_buf()))),
        })
    }

    /// 아카이브 루트 (zip/jar)
    pub fn archive(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| Error::resource(path.display(), e))?;
        let archive = ZipArchive::new(file).map_err(|e| Error::resource(path.display(), e))?;
        debug!("Opened archive root {} ({} entries)", path.display(), archive.len());
        Ok(Self {
            location: path.to_path_buf(),
            kind: RootKind::Archive,
            handle: Mutex::new(Some(Handle::Archive(archive))),
        })
    }

    pub fn location(&self) -> &Path {
        &self.location
    }

    pub fn kind(&self) -> RootKind {
        self.kind
    }

    pub fn is_closed(&self) -> bool {
        self.handle.lock().is_none()
    }

    /// 루트 내부 경로의 내용 (없으면 None)
    pub fn read(&self, relative: &str) -> Result<Option<Vec<u8>>> {
        let relative = normalize(relative)?;
        let mut handle = self.handle.lock();
        match handle.as_mut() {
            None => Err(Error::State(format!(
                "resource root {} is closed",
                self.location.display()
            ))),
            Some(Handle::Directory(base)) => {
                let path = base.join(&relative);
                if !path.is_file() {
                    return Ok(None);
                }
                std::fs::read(&path)
                    .map(Some)
                    .map_err(|e| Error::resource(path.display(), e))
            }
            Some(Handle::Archive(archive)) => {
                let mut entry = match archive.by_name(&relative) {
                    Ok(entry) => entry,
                    Err(zip::result::ZipError::FileNotFound) => return Ok(None),
                    Err(e) => return Err(Error::resource(self.location.display(), e)),
                };
                if entry.is_dir() {
                    return Ok(None);
                }
                let mut buf = Vec::with_capacity(entry.size() as usize);
                entry
                    .read_to_end(&mut buf)
                    .map_err(|e| Error::resource(self.location.display(), e))?;
                Ok(Some(buf))
            }
        }
    }

    /// prefix 디렉토리 아래 모든 파일 (루트 기준 상대 경로, 정렬)
    pub fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let prefix = normalize(prefix)?;
        let handle = self.handle.lock();
        let mut files = match handle.as_ref() {
            None => {
                return Err(Error::State(format!(
                    "resource root {} is closed",
                    self.location.display()
                )))
            }
            Some(Handle::Directory(base)) => {
                let mut files = Vec::new();
                let start = if prefix.is_empty() {
                    base.clone()
                } else {
                    base.join(&prefix)
                };
                if start.is_dir() {
                    walk(base, &start, &mut files)?;
                }
                files
            }
            Some(Handle::Archive(archive)) => {
                let dir_prefix = if prefix.is_empty() {
                    String::new()
                } else {
                    format!("{}/", prefix)
                };
                archive
                    .file_names()
                    .filter(|name| !name.ends_with('/') && name.starts_with(&dir_prefix))
                    .map(str::to_string)
                    .collect()
            }
        };
        files.sort();
        Ok(files)
    }

    /// 핸들 해제. 이번 호출에서 해제했으면 true
    pub fn close(&self) -> bool {
        let released = self.handle.lock().take();
        if released.is_some() {
            debug!("Released {} root {}", self.kind, self.location.display());
        }
        released.is_some()
    }
}

impl fmt::Debug for ResourceRoot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceRoot")
            .field("location", &self.location)
            .field("kind", &self.kind)
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// 루트 상대 경로 정규화 (`/` 구분, 상위 이동 금지)
fn normalize(relative: &str) -> Result<String> {
    let mut parts = Vec::new();
    for component in Path::new(relative.trim_start_matches('/')).components() {
        match component {
            Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
            Component::CurDir => {}
            _ => {
                return Err(Error::InvalidInput(format!(
                    "resource path escapes its root: {}",
                    relative
                )))
            }
        }
    }
    Ok(parts.join("/"))
}

fn walk(base: &Path, dir: &Path, out: &mut Vec<String>) -> Result<()> {
    let entries = std::fs::read_dir(dir).map_err(|e| Error::resource(dir.display(), e))?;
    for entry in entries {
        let path = entry.map_err(|e| Error::resource(dir.display(), e))?.path();
        if path.is_dir() {
            walk(base, &path, out)?;
        } else if let Ok(relative) = path.strip_prefix(base) {
            let parts: Vec<_> = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect();
            out.push(parts.join("/"));
        }
    }
    Ok(())
}
