//! Module - 모듈 세대의 라이프사이클
//!
//! - `descriptor`: 배포 아티팩트 기술자와 스테이징
//! - `properties`: 모듈별 설정 파일
//! - `scope`: 명시적 해석 컨텍스트
//! - `context`: 세대별 컨텍스트와 상태 머신
//! - `manager`: load / unload / reload

mod context;
mod descriptor;
mod manager;
mod properties;
mod scope;

pub use context::{ModuleContext, ModuleState};
pub use descriptor::{ArtifactSource, EntryDescriptor};
pub use manager::{validate_identity, ModuleContextManager};
pub use properties::ModuleProperties;
pub use scope::ModuleScope;
