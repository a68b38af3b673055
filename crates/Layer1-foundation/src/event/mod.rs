//! Event System - 모듈 라이프사이클 이벤트
//!
//! 매니저가 로드/언로드/세대 해제 시점에 `ModuleEvent`를 발행하고,
//! broadcast 구독자가 수신하고 최근 이벤트는 히스토리에 남는다.
//!
//! ```ignore
//! let bus = Arc::new(EventBus::new());
//! let mut rx = bus.subscribe();
//! bus.publish(ModuleEvent::new(ModuleEventKind::Loaded, "foo", "foo"));
//! ```

pub mod bus;
pub mod types;

pub use bus::EventBus;
pub use types::{ModuleEvent, ModuleEventKind};
