//! Event Bus - 모듈 이벤트 발행/구독

use super::types::ModuleEvent;
use parking_lot::Mutex;
use std::collections::VecDeque;
use tokio::sync::broadcast;
use tracing::debug;

// ============================================================================
// EventBus
// ============================================================================

/// 이벤트 버스 - 히스토리 + 브로드캐스트
pub struct EventBus {
    sender: broadcast::Sender<ModuleEvent>,
    history: Mutex<VecDeque<ModuleEvent>>,
    history_size: usize,
}

impl EventBus {
    /// 새 이벤트 버스 생성
    pub fn new() -> Self {
        Self::with_capacity(256, 100)
    }

    /// 용량 지정하여 생성
    pub fn with_capacity(channel_capacity: usize, history_size: usize) -> Self {
        let (sender, _) = broadcast::channel(channel_capacity.max(1));
        Self {
            sender,
            history: Mutex::new(VecDeque::with_capacity(history_size)),
            history_size,
        }
    }

    /// 이벤트 발행: 히스토리 기록 후 구독자에게 브로드캐스트.
    /// 동기 함수라 identity 테이블 리셋 훅 안에서도 호출된다
    pub fn publish(&self, event: ModuleEvent) {
        debug!("Module event: {}", event);
        {
            let mut history = self.history.lock();
            if self.history_size > 0 {
                if history.len() >= self.history_size {
                    history.pop_front();
                }
                history.push_back(event.clone());
            }
        }
        // 구독자가 없어도 OK
        let _ = self.sender.send(event);
    }

    /// 이벤트 구독
    pub fn subscribe(&self) -> broadcast::Receiver<ModuleEvent> {
        self.sender.subscribe()
    }

    /// 이벤트 히스토리 조회
    pub fn history(&self) -> Vec<ModuleEvent> {
        self.history.lock().iter().cloned().collect()
    }

    /// 특정 identity의 히스토리
    pub fn history_for(&self, identity: &str) -> Vec<ModuleEvent> {
        self.history
            .lock()
            .iter()
            .filter(|e| e.identity == identity)
            .cloned()
            .collect()
    }

    pub fn clear_history(&self) {
        self.history.lock().clear();
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
