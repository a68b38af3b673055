//! # graft-foundation
//!
//! Foundation layer for graft:
//! - Error: 에러 분류 (Resource / NotFound / State / Patch / Teardown ...)
//! - Config: 호스트 설정 (GraftConfig, 계층형 JSON 저장소)
//! - Event: 모듈 라이프사이클 이벤트 버스

pub mod config;
pub mod error;
pub mod event;

// ============================================================================
// Error
// ============================================================================
pub use error::{Error, ErrorKind, Result};

// ============================================================================
// Config (설정)
// ============================================================================
pub use config::{
    ConfigStore, GraftConfig, IdentityMode, InterceptConfig, PropertyFileConfig,
    DEFAULT_IDENTITY_KEY, GRAFT_CONFIG_FILE,
};

// ============================================================================
// Event (이벤트 시스템)
// ============================================================================
pub use event::{EventBus, ModuleEvent, ModuleEventKind};
