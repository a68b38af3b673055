//! Graft Config - 호스트 설정
//!
//! 모듈 로드 경로, 엔트리 규칙, 요청 라우팅(intercept), 모듈별 설정 파일 규칙

use super::store::ConfigStore;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// 설정 파일명
pub const GRAFT_CONFIG_FILE: &str = "config.json";

/// 기본 identity 헤더/파라미터 이름
pub const DEFAULT_IDENTITY_KEY: &str = "Plugin-Meta";

// ============================================================================
// Identity Mode
// ============================================================================

/// 요청에서 모듈 identity를 추출하는 방식
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum IdentityMode {
    /// 지정 헤더 값
    Header,
    /// 지정 쿼리 파라미터 값
    Parameter,
    /// URI 첫 번째 path segment
    #[default]
    Url,
}

impl fmt::Display for IdentityMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Header => write!(f, "HEADER"),
            Self::Parameter => write!(f, "PARAMETER"),
            Self::Url => write!(f, "URL"),
        }
    }
}

impl FromStr for IdentityMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "header" => Ok(Self::Header),
            "parameter" | "param" => Ok(Self::Parameter),
            "url" => Ok(Self::Url),
            other => Err(Error::Config(format!("Unknown identity mode: {}", other))),
        }
    }
}

// ============================================================================
// Intercept Config
// ============================================================================

/// 요청 라우팅 설정
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InterceptConfig {
    /// identity 헤더/파라미터 이름
    pub identity_key: String,

    /// 추출 방식
    pub identity_mode: IdentityMode,

    /// 격리 대상에서 제외되는 identity (항상 호스트가 처리)
    pub white_list: Vec<String>,
}

impl Default for InterceptConfig {
    fn default() -> Self {
        Self {
            identity_key: DEFAULT_IDENTITY_KEY.to_string(),
            identity_mode: IdentityMode::default(),
            white_list: Vec::new(),
        }
    }
}

impl InterceptConfig {
    pub fn is_whitelisted(&self, identity: &str) -> bool {
        self.white_list.iter().any(|w| w == identity)
    }
}

// ============================================================================
// Module Property Files
// ============================================================================

/// 모듈별 설정 파일 규칙 (`<prefix><root>.<ext>`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PropertyFileConfig {
    pub enable: bool,
    pub prefix: String,
    pub file_extension: String,
}

impl Default for PropertyFileConfig {
    fn default() -> Self {
        Self {
            enable: true,
            prefix: "plugin-".to_string(),
            file_extension: "yml".to_string(),
        }
    }
}

impl PropertyFileConfig {
    /// 모듈 루트 이름에 대한 설정 파일명
    pub fn file_name(&self, root: &str) -> String {
        format!("{}{}.{}", self.prefix, root, self.file_extension)
    }
}

// ============================================================================
// Graft Config (통합)
// ============================================================================

/// graft 호스트 통합 설정
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GraftConfig {
    /// 호스트 이름 (로그용)
    pub name: String,

    /// 모듈 아티팩트가 풀리는 루트 디렉토리
    pub load_path: PathBuf,

    /// 엔트리 유닛의 관례 이름 (`<root>.<entry_name>`)
    pub entry_name: String,

    /// 패치 단계에서 엔트리에서 제거할 호스트 트리거 마커
    pub suppressed_markers: Vec<String>,

    /// 호스트(부모) 리졸버 루트
    pub host_roots: Vec<PathBuf>,

    /// 모듈별 설정 파일
    pub config: PropertyFileConfig,

    /// 요청 라우팅
    pub intercept: InterceptConfig,
}

impl Default for GraftConfig {
    fn default() -> Self {
        Self {
            name: "graft".to_string(),
            load_path: PathBuf::from("./plugin"),
            entry_name: "Main".to_string(),
            suppressed_markers: vec![
                "host.EnableWebServer".to_string(),
                "host.EnableScheduling".to_string(),
            ],
            host_roots: Vec::new(),
            config: PropertyFileConfig::default(),
            intercept: InterceptConfig::default(),
        }
    }
}

impl GraftConfig {
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Load / Save
    // ========================================================================

    /// 글로벌 + 프로젝트 병합 로드
    pub fn load() -> Result<Self> {
        Self::load_from(&ConfigStore::standard())
    }

    /// 지정 저장소에서 로드
    pub fn load_from(store: &ConfigStore) -> Result<Self> {
        let config: Self = store.load_merged(GRAFT_CONFIG_FILE)?;
        config.validate()?;
        Ok(config)
    }

    /// 단일 파일에서 로드 (기본값 위에 병합)
    pub fn load_file(path: &Path) -> Result<Self> {
        let dir = path
            .parent()
            .ok_or_else(|| Error::Config(format!("Invalid config path: {}", path.display())))?;
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| Error::Config(format!("Invalid config path: {}", path.display())))?;
        let config: Self = ConfigStore::new().with_layer(dir).load_merged(filename)?;
        config.validate()?;
        Ok(config)
    }

    /// 지정 디렉토리에 저장
    pub fn save_to(&self, dir: &Path) -> Result<()> {
        ConfigStore::new().save(dir, GRAFT_CONFIG_FILE, self)
    }

    /// 값 검증
    pub fn validate(&self) -> Result<()> {
        if self.entry_name.trim().is_empty() {
            return Err(Error::Config("entryName must not be empty".to_string()));
        }
        if self.intercept.identity_key.trim().is_empty() {
            return Err(Error::Config(
                "intercept.identityKey must not be empty".to_string(),
            ));
        }
        if self.config.file_extension.trim().is_empty() {
            return Err(Error::Config(
                "config.fileExtension must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    // ========================================================================
    // Builder
    // ========================================================================

    pub fn with_load_path(mut self, load_path: impl Into<PathBuf>) -> Self {
        self.load_path = load_path.into();
        self
    }

    pub fn with_identity_mode(mut self, mode: IdentityMode) -> Self {
        self.intercept.identity_mode = mode;
        self
    }

    pub fn with_identity_key(mut self, key: impl Into<String>) -> Self {
        self.intercept.identity_key = key.into();
        self
    }

    pub fn with_white_list(mut self, white_list: Vec<String>) -> Self {
        self.intercept.white_list = white_list;
        self
    }

    pub fn with_host_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.host_roots.push(root.into());
        self
    }

    pub fn with_suppressed_markers(mut self, markers: Vec<String>) -> Self {
        self.suppressed_markers = markers;
        self
    }

    /// 세대별 아티팩트 디렉토리
    pub fn generation_dir(&self, generation: &str) -> PathBuf {
        self.load_path.join(generation)
    }
}
