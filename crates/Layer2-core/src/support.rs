//! 모듈 부가 역할 - 데이터 관리 / 의존성 제어
//!
//! 모듈은 컴포넌트로 구현을 제공할 수 있고, 없으면 매니저가 로그를 남긴 뒤
//! 아무것도 하지 않는 기본 구현을 돌려준다.

use crate::module::ModuleScope;
use async_trait::async_trait;
use graft_foundation::Result;
use std::path::{Path, PathBuf};
use tracing::warn;

/// 모듈 데이터 관리
#[async_trait]
pub trait DataManager: Send + Sync {
    /// 최초 데이터 준비
    async fn init(&self, scope: &ModuleScope) -> Result<()>;

    /// 데이터 내보내기. 생성된 파일 경로 반환
    async fn export(&self, scope: &ModuleScope, target: &Path) -> Result<Option<PathBuf>>;

    /// 데이터 가져오기
    async fn import(&self, scope: &ModuleScope, source: &Path) -> Result<()>;

    /// 모듈 데이터 삭제
    async fn destroy(&self, scope: &ModuleScope) -> Result<()>;
}

/// 모듈 의존성 제어
#[async_trait]
pub trait DependencyControl: Send + Sync {
    /// 의존 대상 상태 점검/조정
    async fn control(&self, scope: &ModuleScope) -> Result<()>;

    /// 의존 대상 업그레이드
    async fn upgrade(&self, scope: &ModuleScope) -> Result<()>;
}

/// 구현이 없는 모듈용 DataManager
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopDataManager;

#[async_trait]
impl DataManager for NoopDataManager {
    async fn init(&self, scope: &ModuleScope) -> Result<()> {
        warn!("Module {} has no data manager, skipping init", scope.identity());
        Ok(())
    }

    async fn export(&self, scope: &ModuleScope, _target: &Path) -> Result<Option<PathBuf>> {
        warn!("Module {} has no data manager, nothing to export", scope.identity());
        Ok(None)
    }

    async fn import(&self, scope: &ModuleScope, _source: &Path) -> Result<()> {
        warn!("Module {} has no data manager, skipping import", scope.identity());
        Ok(())
    }

    async fn destroy(&self, scope: &ModuleScope) -> Result<()> {
        warn!("Module {} has no data manager, skipping destroy", scope.identity());
        Ok(())
    }
}

/// 구현이 없는 모듈용 DependencyControl
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopDependencyControl;

#[async_trait]
impl DependencyControl for NoopDependencyControl {
    async fn control(&self, scope: &ModuleScope) -> Result<()> {
        warn!("Module {} has no dependency control", scope.identity());
        Ok(())
    }

    async fn upgrade(&self, scope: &ModuleScope) -> Result<()> {
        warn!("Module {} has no dependency control", scope.identity());
        Ok(())
    }
}
