//! Module Event Types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

// ============================================================================
// ModuleEventKind
// ============================================================================

/// 모듈 라이프사이클 이벤트 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleEventKind {
    /// ACTIVE 전환 완료
    Loaded,
    /// 로드 중단 (부분 상태는 정리됨)
    LoadFailed,
    /// 언로드 완료
    Unloaded,
    /// 언로드 중 일부 단계 실패
    UnloadFailed,
    /// identity 체인 압축으로 세대가 해제됨
    GenerationReleased,
}

impl fmt::Display for ModuleEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Loaded => write!(f, "loaded"),
            Self::LoadFailed => write!(f, "load_failed"),
            Self::Unloaded => write!(f, "unloaded"),
            Self::UnloadFailed => write!(f, "unload_failed"),
            Self::GenerationReleased => write!(f, "generation_released"),
        }
    }
}

impl ModuleEventKind {
    /// 실패 이벤트 여부
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::LoadFailed | Self::UnloadFailed)
    }
}

// ============================================================================
// ModuleEvent
// ============================================================================

/// 모듈 이벤트
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleEvent {
    pub kind: ModuleEventKind,

    /// 논리 identity (루트 이름)
    pub identity: String,

    /// 세대 이름
    pub generation: String,

    /// 부가 정보
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub detail: Value,

    pub timestamp: DateTime<Utc>,
}

impl ModuleEvent {
    pub fn new(
        kind: ModuleEventKind,
        identity: impl Into<String>,
        generation: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            identity: identity.into(),
            generation: generation.into(),
            detail: Value::Null,
            timestamp: Utc::now(),
        }
    }

    pub fn with_detail(mut self, detail: Value) -> Self {
        self.detail = detail;
        self
    }

    /// 실패 원인을 detail에 담은 이벤트
    pub fn failure(
        kind: ModuleEventKind,
        identity: impl Into<String>,
        generation: impl Into<String>,
        reason: impl fmt::Display,
    ) -> Self {
        Self::new(kind, identity, generation)
            .with_detail(serde_json::json!({ "reason": reason.to_string() }))
    }
}

impl fmt::Display for ModuleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} ({})", self.kind, self.identity, self.generation)
    }
}
