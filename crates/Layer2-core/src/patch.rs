//! Bootstrap Patch - 엔트리 유닛 일회성 편집
//!
//! 레지스트리 빌드 전에 엔트리 유닛에서 호스트 트리거 마커를 제거하고
//! 모듈 자체 패키지 스캔 마커를 하나 추가한다. 편집 결과는 리졸버에
//! 재정의되고, 레지스트리 빌드에는 `BootstrapDirectives`로 전달된다.

use crate::namespace::{NamespaceResolver, ResolvedUnit, Unit};
use graft_foundation::{Error, Result};
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info};

/// 모듈 자체 패키지 스캔 지시 마커
pub const SCAN_MARKER: &str = "graft.ComponentScan";

// ============================================================================
// UnitEdit - read-modify-write-reapply
// ============================================================================

/// 유닛 편집기
pub struct UnitEdit<'r> {
    resolver: &'r NamespaceResolver,
    original: Arc<ResolvedUnit>,
    staged: Unit,
}

impl<'r> UnitEdit<'r> {
    /// 리졸버를 통해 유닛을 읽어 편집 시작
    pub fn read(resolver: &'r NamespaceResolver, name: &str) -> Result<Self> {
        let original = resolver.resolve_unit(name)?;
        if original.generation() != resolver.generation() {
            return Err(Error::patch(
                name,
                format!(
                    "defined by {}, not by {}",
                    original.generation(),
                    resolver.generation()
                ),
            ));
        }
        Ok(Self {
            resolver,
            staged: original.unit().clone(),
            original,
        })
    }

    pub fn original(&self) -> &ResolvedUnit {
        &self.original
    }

    pub fn staged(&self) -> &Unit {
        &self.staged
    }

    /// 마커 제거. 실제로 제거했으면 true
    pub fn remove_marker(&mut self, marker: &str) -> bool {
        self.staged.markers.remove(marker)
    }

    /// 마커 추가. 새로 추가했으면 true
    pub fn add_marker(&mut self, marker: impl Into<String>) -> bool {
        self.staged.markers.insert(marker.into())
    }

    /// 필드 마커 추가
    pub fn add_field_marker(&mut self, field: &str, marker: impl Into<String>) -> Result<bool> {
        let name = self.original.name().to_string();
        let meta = self
            .staged
            .fields
            .get_mut(field)
            .ok_or_else(|| Error::patch(&name, format!("no field named '{}'", field)))?;
        Ok(meta.markers.insert(marker.into()))
    }

    /// 필드 마커 제거
    pub fn remove_field_marker(&mut self, field: &str, marker: &str) -> Result<bool> {
        let name = self.original.name().to_string();
        let meta = self
            .staged
            .fields
            .get_mut(field)
            .ok_or_else(|| Error::patch(&name, format!("no field named '{}'", field)))?;
        Ok(meta.markers.remove(marker))
    }

    /// 변경 여부
    pub fn is_dirty(&self) -> bool {
        &self.staged != self.original.unit()
    }

    /// 편집 결과를 리졸버에 재정의
    pub fn reapply(self) -> Result<Arc<ResolvedUnit>> {
        let name = self.original.name().to_string();
        self.resolver.redefine(&name, self.staged)
    }
}

// ============================================================================
// BootstrapDirectives
// ============================================================================

/// 레지스트리 빌드에 전달되는 부트스트랩 지시
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BootstrapDirectives {
    /// 엔트리 정규 이름
    pub entry: String,

    /// 실제로 제거된 호스트 트리거 마커
    pub suppressed: Vec<String>,

    /// 패치 후 엔트리에 남은 마커
    pub features: BTreeSet<String>,

    /// 스캔 대상 패키지 (모듈 루트 이름 + 선언 패키지)
    pub scan_packages: Vec<String>,
}

impl BootstrapDirectives {
    pub fn scans_components(&self) -> bool {
        self.features.contains(SCAN_MARKER)
    }

    pub fn has_feature(&self, marker: &str) -> bool {
        self.features.contains(marker)
    }
}

// ============================================================================
// PatchStep
// ============================================================================

/// 세대마다 한 번 실행되는 엔트리 패치
#[derive(Debug, Clone, Default)]
pub struct PatchStep {
    suppress: Vec<String>,
}

impl PatchStep {
    /// 제거할 호스트 트리거 마커 목록으로 생성
    pub fn new(suppress: Vec<String>) -> Self {
        Self { suppress }
    }

    pub fn suppressed_markers(&self) -> &[String] {
        &self.suppress
    }

    /// 엔트리 패치 실행
    pub fn apply(
        &self,
        resolver: &NamespaceResolver,
        entry: &str,
        root_name: &str,
    ) -> Result<(Arc<ResolvedUnit>, BootstrapDirectives)> {
        let mut edit = UnitEdit::read(resolver, entry)?;
        if !edit.original().is_entry() {
            return Err(Error::patch(entry, "not an entry unit"));
        }
        if resolver.is_frozen(entry) {
            return Err(Error::patch(entry, "entry already activated for this generation"));
        }

        let suppressed: Vec<String> = self
            .suppress
            .iter()
            .filter(|marker| edit.remove_marker(marker))
            .cloned()
            .collect();
        edit.add_marker(SCAN_MARKER);

        let patched = edit.reapply()?;
        debug!(
            "Patched {} in {}: suppressed {:?}",
            entry,
            resolver.generation(),
            suppressed
        );

        let mut scan_packages = vec![root_name.to_string()];
        for package in &patched.unit().packages {
            if !scan_packages.contains(package) {
                scan_packages.push(package.clone());
            }
        }

        let directives = BootstrapDirectives {
            entry: entry.to_string(),
            suppressed,
            features: patched.unit().markers.clone(),
            scan_packages,
        };
        info!(
            "Bootstrap directives for {}: scan {:?}",
            resolver.generation(),
            directives.scan_packages
        );
        Ok((patched, directives))
    }
}
