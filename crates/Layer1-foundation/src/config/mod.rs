//! Config - 호스트 설정
//!
//! - `graft`: 통합 설정 (GraftConfig)
//! - `store`: 계층형 JSON 저장소 (글로벌 → 프로젝트)

mod graft;
mod store;

pub use graft::{
    GraftConfig, IdentityMode, InterceptConfig, PropertyFileConfig, DEFAULT_IDENTITY_KEY,
    GRAFT_CONFIG_FILE,
};
pub use store::{merge_values, ConfigStore};
