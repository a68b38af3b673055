//! Error types for graft
//!
//! 호스트/모듈 라이프사이클 전반의 에러를 중앙에서 관리

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// graft 에러 타입
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // 설정 관련
    // ========================================================================
    #[error("Configuration error: {0}")]
    Config(String),

    // ========================================================================
    // 리소스 관련 (루트/아티팩트 읽기 실패)
    // ========================================================================
    #[error("Resource error: {0}")]
    Resource(String),

    // ========================================================================
    // 라이프사이클 관련
    // ========================================================================
    /// 활성 세대가 없는 identity 조회
    #[error("Not found: {0}")]
    NotFound(String),

    /// 요구 상태가 아닌 컨텍스트에 대한 작업
    #[error("Invalid state: {0}")]
    State(String),

    /// 유닛 편집/재정의 실패
    #[error("Patch failed: {0}")]
    Patch(String),

    /// 부분 정리 실패
    #[error("Teardown failed: {0}")]
    Teardown(String),

    // ========================================================================
    // 컴포넌트 관련
    // ========================================================================
    #[error("Component error: {0}")]
    Component(String),

    // ========================================================================
    // 일반
    // ========================================================================
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // ========================================================================
    // 외부 에러 변환
    // ========================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // ========================================================================
    // 기타
    // ========================================================================
    #[error("Internal error: {0}")]
    Internal(String),
}

/// 에러 분류 (로그/메시지용)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Config,
    Resource,
    NotFound,
    State,
    Patch,
    Teardown,
    Component,
    InvalidInput,
    Internal,
}

impl Error {
    /// 분류 조회
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Config(_) => ErrorKind::Config,
            Error::Resource(_) | Error::Io(_) => ErrorKind::Resource,
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::State(_) => ErrorKind::State,
            Error::Patch(_) => ErrorKind::Patch,
            Error::Teardown(_) => ErrorKind::Teardown,
            Error::Component(_) => ErrorKind::Component,
            Error::InvalidInput(_) => ErrorKind::InvalidInput,
            Error::Json(_) | Error::Internal(_) => ErrorKind::Internal,
        }
    }

    /// 활성 세대 없음 여부 (라우터의 호스트 fallback 판단용)
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }

    /// 사용자에게 보여줄 수 있는 에러인지 확인
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            Error::NotFound(_) | Error::InvalidInput(_) | Error::Config(_)
        )
    }

    /// 리소스 에러 생성 헬퍼
    pub fn resource(target: impl std::fmt::Display, cause: impl std::fmt::Display) -> Self {
        Error::Resource(format!("{}: {}", target, cause))
    }

    /// 패치 에러 생성 헬퍼
    pub fn patch(unit: impl std::fmt::Display, reason: impl std::fmt::Display) -> Self {
        Error::Patch(format!("{}: {}", unit, reason))
    }
}

// ============================================================================
// From 구현 (추가 변환)
// ============================================================================

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Internal(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Internal(s.to_string())
    }
}
