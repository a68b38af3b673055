//! Namespace - 세대별 격리 리졸버
//!
//! - `root`: 디렉토리/아카이브 리소스 루트
//! - `unit`: 유닛(타입) 기술자와 이름 규칙
//! - `resolver`: 캐시 → 소유 루트 → 부모 순서의 리졸버
//! - `factory`: 세대별 단일 생성 + 아티팩트 레이아웃

mod factory;
mod resolver;
mod root;
mod unit;

pub use factory::{artifact_roots, ResolverFactory, CLASSES_DIR, LIB_DIR};
pub use resolver::{NamespaceResolver, HOST_GENERATION};
pub use root::{is_archive, ResourceRoot, RootKind, ARCHIVE_EXTENSIONS};
pub use unit::{
    is_valid_qualified, package_path, qualified_name, unit_path, FieldMeta, ResolvedUnit, Unit,
    UnitKind, DEFAULT_ENTRY_TYPE, UNIT_EXTENSION,
};
