//! Unit - 모듈이 제공하는 타입 기술자
//!
//! 리소스 루트 안의 `<package path>/<Name>.unit` (TOML) 파일 하나가 유닛 하나.
//!
//! ```toml
//! kind = "entry"
//! markers = ["host.EnableWebServer"]
//! packages = ["shared"]
//!
//! [fields.repository]
//! markers = ["graft.Inject"]
//! ```

use graft_foundation::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// 유닛 파일 확장자
pub const UNIT_EXTENSION: &str = "unit";

/// `type`이 생략된 엔트리 유닛의 구현 키
pub const DEFAULT_ENTRY_TYPE: &str = "graft.Entry";

/// 유닛 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitKind {
    /// 모듈 부트스트랩 진입점
    Entry,
    /// 스캔 대상 컴포넌트
    #[default]
    Component,
}

impl fmt::Display for UnitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Entry => write!(f, "entry"),
            Self::Component => write!(f, "component"),
        }
    }
}

/// 필드 메타데이터
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldMeta {
    pub markers: BTreeSet<String>,
}

/// 유닛 표현 (편집 가능한 메타데이터)
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Unit {
    pub kind: UnitKind,

    /// 호스트에 링크된 구현 키
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub implementation: Option<String>,

    pub markers: BTreeSet<String>,

    /// 추가로 선언한 스캔 패키지
    pub packages: Vec<String>,

    /// 먼저 초기화되어야 하는 컴포넌트 (정규 이름)
    pub depends_on: Vec<String>,

    /// 시작 훅/핸들러 매핑 정렬 순서 (작을수록 먼저)
    pub priority: i32,

    pub fields: BTreeMap<String, FieldMeta>,

    pub properties: toml::Table,
}

impl Unit {
    /// TOML 바이트 파싱
    pub fn parse(name: &str, bytes: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| Error::resource(format!("unit {}", name), e))?;
        let unit: Self =
            toml::from_str(text).map_err(|e| Error::resource(format!("unit {}", name), e))?;
        unit.validate()
            .map_err(|reason| Error::resource(format!("unit {}", name), reason))?;
        Ok(unit)
    }

    /// TOML 직렬화
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string(self).map_err(|e| Error::Internal(format!("unit serialization: {}", e)))
    }

    pub fn has_marker(&self, marker: &str) -> bool {
        self.markers.contains(marker)
    }

    pub fn field_has_marker(&self, field: &str, marker: &str) -> bool {
        self.fields
            .get(field)
            .map_or(false, |meta| meta.markers.contains(marker))
    }

    /// 표현 검증 (마커 이름 규칙)
    pub fn validate(&self) -> std::result::Result<(), String> {
        let field_markers = self.fields.values().flat_map(|f| f.markers.iter());
        for marker in self.markers.iter().chain(field_markers) {
            if !is_valid_marker(marker) {
                return Err(format!("invalid marker name '{}'", marker));
            }
        }
        if let Some(field) = self.fields.keys().find(|f| f.trim().is_empty()) {
            return Err(format!("invalid field name '{}'", field));
        }
        for package in &self.packages {
            if !is_valid_qualified(package) {
                return Err(format!("invalid package '{}'", package));
            }
        }
        Ok(())
    }
}

fn is_valid_marker(marker: &str) -> bool {
    !marker.is_empty() && !marker.chars().any(char::is_whitespace)
}

/// 점 구분 이름 검증 (`foo.web.Hello`)
pub fn is_valid_qualified(name: &str) -> bool {
    !name.is_empty()
        && name.split('.').all(|segment| {
            !segment.is_empty()
                && segment
                    .chars()
                    .all(|c| c.is_alphanumeric() || c == '_' || c == '-' || c == '$')
        })
}

/// 정규 이름 → 루트 상대 경로 (`foo.web.Hello` → `foo/web/Hello.unit`)
pub fn unit_path(qualified: &str) -> String {
    format!("{}.{}", qualified.replace('.', "/"), UNIT_EXTENSION)
}

/// 패키지 → 디렉토리 경로
pub fn package_path(package: &str) -> String {
    package.replace('.', "/")
}

/// 루트 상대 경로 → 정규 이름 (유닛 파일이 아니면 None)
pub fn qualified_name(path: &str) -> Option<String> {
    let stem = path.strip_suffix(UNIT_EXTENSION)?.strip_suffix('.')?;
    let name = stem.trim_start_matches('/').replace('/', ".");
    is_valid_qualified(&name).then_some(name)
}

// ============================================================================
// ResolvedUnit
// ============================================================================

/// 특정 세대의 리졸버가 정의한 유닛
///
/// 동일성은 (세대, 정규 이름) 쌍이며 세대가 다르면 항상 다른 유닛이다.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedUnit {
    name: String,
    generation: String,
    unit: Unit,
    revision: u32,
}

impl ResolvedUnit {
    pub fn new(name: impl Into<String>, generation: impl Into<String>, unit: Unit) -> Self {
        Self {
            name: name.into(),
            generation: generation.into(),
            unit,
            revision: 0,
        }
    }

    /// 재정의된 다음 리비전
    pub(crate) fn redefined(&self, unit: Unit) -> Self {
        Self {
            name: self.name.clone(),
            generation: self.generation.clone(),
            unit,
            revision: self.revision + 1,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn generation(&self) -> &str {
        &self.generation
    }

    pub fn unit(&self) -> &Unit {
        &self.unit
    }

    /// 재정의 횟수
    pub fn revision(&self) -> u32 {
        self.revision
    }

    /// 단순 이름 (`foo.web.Hello` → `Hello`)
    pub fn simple_name(&self) -> &str {
        self.name.rsplit('.').next().unwrap_or(&self.name)
    }

    /// 소속 패키지 (`foo.web.Hello` → `foo.web`)
    pub fn package(&self) -> &str {
        self.name.rsplit_once('.').map(|(p, _)| p).unwrap_or("")
    }

    pub fn is_entry(&self) -> bool {
        self.unit.kind == UnitKind::Entry
    }

    /// 구현 키 (`type` 생략 시 엔트리는 기본 엔트리, 컴포넌트는 정규 이름)
    pub fn implementation(&self) -> &str {
        match (&self.unit.implementation, self.unit.kind) {
            (Some(key), _) => key,
            (None, UnitKind::Entry) => DEFAULT_ENTRY_TYPE,
            (None, UnitKind::Component) => &self.name,
        }
    }
}
