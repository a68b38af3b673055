//! Identity Table - 논리 모듈 이름 → 세대 이름 간접 참조
//!
//! 논리 이름(`foo`)마다 세대 체인 하나를 arena에 보관한다.
//! 체인은 `head`(현재 세대)와 선택적인 `next`(예약된 후속 세대)만 가지며,
//! `resolve` 때마다 압축되므로 리로드 횟수와 관계없이 레코드 수는 2개 이하.
//!
//! ```text
//! resolve("foo")  → "foo"       (미등록: 루트 등록)
//! resolve("foo")  → "foo~1"     (후속 세대 예약)
//! resolve("foo")  → "foo~2"     ("foo" 해제 → head = "foo~1" → 재예약)
//! ```

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// 세대 이름 구분자 (`root~N`)
pub const GENERATION_SEPARATOR: char = '~';

// ============================================================================
// ResetHook
// ============================================================================

/// 체인 압축으로 해제되는 세대에 대한 콜백
///
/// 테이블 락이 풀린 뒤 호출되므로 훅 안에서 테이블을 다시 조회해도 된다.
pub trait ResetHook: Send + Sync {
    fn reset(&self, released: &str);
}

impl<F> ResetHook for F
where
    F: Fn(&str) + Send + Sync,
{
    fn reset(&self, released: &str) {
        self(released)
    }
}

// ============================================================================
// GenerationChain
// ============================================================================

#[derive(Debug, Clone)]
struct GenerationChain {
    /// 최초 등록 이름 (불변)
    root: String,
    /// 현재 세대
    head: String,
    /// 예약된 후속 세대
    next: Option<String>,
    /// 마지막으로 발급한 세대 번호
    issued: u64,
}

impl GenerationChain {
    fn new(root: &str) -> Self {
        Self {
            root: root.to_string(),
            head: root.to_string(),
            next: None,
            issued: 0,
        }
    }

    fn reserve(&mut self) -> String {
        self.issued += 1;
        let name = format!("{}{}{}", self.root, GENERATION_SEPARATOR, self.issued);
        self.next = Some(name.clone());
        name
    }

    fn current(&self) -> &str {
        self.next.as_deref().unwrap_or(&self.head)
    }
}

/// 세대 접미사(`~N`)를 제거한 논리 이름
pub fn logical_name(name: &str) -> &str {
    match name.rsplit_once(GENERATION_SEPARATOR) {
        Some((root, suffix))
            if !root.is_empty()
                && !suffix.is_empty()
                && suffix.chars().all(|c| c.is_ascii_digit()) =>
        {
            root
        }
        _ => name,
    }
}

// ============================================================================
// IdentityTable
// ============================================================================

/// 논리 이름 → 세대 체인 테이블
pub struct IdentityTable {
    chains: RwLock<HashMap<String, GenerationChain>>,
    hook: RwLock<Option<Arc<dyn ResetHook>>>,
}

impl IdentityTable {
    /// 새 테이블 생성
    pub fn new() -> Self {
        Self {
            chains: RwLock::new(HashMap::new()),
            hook: RwLock::new(None),
        }
    }

    /// 해제 훅 설정
    pub fn with_reset_hook(self, hook: Arc<dyn ResetHook>) -> Self {
        self.set_reset_hook(hook);
        self
    }

    pub fn set_reset_hook(&self, hook: Arc<dyn ResetHook>) {
        *self.hook.write() = Some(hook);
    }

    /// 정규 세대 이름 조회 (필요 시 체인 전진/압축)
    pub fn resolve(&self, name: &str) -> String {
        let logical = logical_name(name);
        let mut released = Vec::new();

        let resolved = {
            let mut chains = self.chains.write();
            match chains.get_mut(logical) {
                None => {
                    chains.insert(logical.to_string(), GenerationChain::new(logical));
                    debug!("Registered module identity: {}", logical);
                    logical.to_string()
                }
                Some(chain) => {
                    if let Some(next) = chain.next.take() {
                        let superseded = std::mem::replace(&mut chain.head, next);
                        debug!(
                            "Compacted identity chain {}: {} -> {}",
                            chain.root, superseded, chain.head
                        );
                        released.push(superseded);
                    }
                    chain.reserve()
                }
            }
        };

        if !released.is_empty() {
            let hook = self.hook.read().clone();
            if let Some(hook) = hook {
                for generation in &released {
                    hook.reset(generation);
                }
            }
        }

        resolved
    }

    /// 최신 세대 (체인을 전진시키지 않음)
    pub fn current(&self, name: &str) -> Option<String> {
        self.chains
            .read()
            .get(logical_name(name))
            .map(|chain| chain.current().to_string())
    }

    /// 최초 등록 이름 (세대와 무관)
    pub fn root_name(&self, name: &str) -> String {
        let logical = logical_name(name);
        self.chains
            .read()
            .get(logical)
            .map(|chain| chain.root.clone())
            .unwrap_or_else(|| logical.to_string())
    }

    /// 살아있는 세대 레코드 (head, next 순)
    pub fn generations(&self, name: &str) -> Vec<String> {
        self.chains
            .read()
            .get(logical_name(name))
            .map(|chain| {
                std::iter::once(chain.head.clone())
                    .chain(chain.next.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.chains.read().contains_key(logical_name(name))
    }

    /// 등록된 논리 이름 목록 (정렬)
    pub fn identities(&self) -> Vec<String> {
        let mut names: Vec<_> = self.chains.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.chains.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.chains.read().is_empty()
    }
}

impl Default for IdentityTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn test_unseen_name_resolves_to_itself() {
        let table = IdentityTable::new();
        assert_eq!(table.resolve("a"), "a");
        assert_eq!(table.root_name("a"), "a");
        assert_eq!(table.current("a").as_deref(), Some("a"));
    }

    #[test]
    fn test_root_name_for_unknown_identity() {
        let table = IdentityTable::new();
        assert_eq!(table.root_name("ghost"), "ghost");
        assert_eq!(table.root_name("ghost~3"), "ghost");
        assert!(table.current("ghost").is_none());
    }

    #[test]
    fn test_reload_cycle_advances_generation() {
        let table = IdentityTable::new();
        table.resolve("a");
        let second = table.resolve("a");
        assert_ne!(second, "a");
        assert_eq!(second, "a~1");
        assert_eq!(table.root_name(&second), "a");
        assert_eq!(table.root_name("a"), "a");
        assert_eq!(table.current("a").as_deref(), Some("a~1"));
    }

    #[test]
    fn test_compaction_releases_superseded_head() {
        let released = Arc::new(Mutex::new(Vec::new()));
        let sink = released.clone();
        let table = IdentityTable::new()
            .with_reset_hook(Arc::new(move |name: &str| sink.lock().push(name.to_string())));

        for _ in 0..5 {
            table.resolve("a");
        }

        assert_eq!(*released.lock(), vec!["a", "a~1", "a~2"]);
        assert_eq!(table.generations("a"), vec!["a~3", "a~4"]);
        assert_eq!(table.root_name("a~4"), "a");
    }

    #[test]
    fn test_generation_chain_is_monotonic() {
        let table = IdentityTable::new();
        let mut last = 0u64;
        table.resolve("m");
        for _ in 0..20 {
            let generation = table.resolve("m");
            let (_, n) = generation.rsplit_once(GENERATION_SEPARATOR).unwrap();
            let n: u64 = n.parse().unwrap();
            assert!(n > last);
            last = n;
        }
        assert!(table.generations("m").len() <= 2);
    }

    #[test]
    fn test_generation_name_resolves_through_logical_name() {
        let table = IdentityTable::new();
        table.resolve("a");
        table.resolve("a");
        assert_eq!(table.current("a~1").as_deref(), Some("a~1"));
        assert_eq!(table.resolve("a~1"), "a~2");
    }

    #[test]
    fn test_hook_may_reenter_table() {
        let table = Arc::new(IdentityTable::new());
        let observed = Arc::new(Mutex::new(None));
        let (weak, sink) = (Arc::downgrade(&table), observed.clone());
        table.set_reset_hook(Arc::new(move |_: &str| {
            if let Some(table) = weak.upgrade() {
                *sink.lock() = table.current("a");
            }
        }));

        table.resolve("a");
        table.resolve("a");
        table.resolve("a");
        assert_eq!(observed.lock().as_deref(), Some("a~2"));
    }

    #[test]
    fn test_logical_name() {
        assert_eq!(logical_name("foo"), "foo");
        assert_eq!(logical_name("foo~12"), "foo");
        assert_eq!(logical_name("foo~bar"), "foo~bar");
        assert_eq!(logical_name("~1"), "~1");
    }

    #[test]
    fn test_concurrent_first_registration_converges() {
        let table = Arc::new(IdentityTable::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let table = table.clone();
                std::thread::spawn(move || table.resolve("race"))
            })
            .collect();
        let mut results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        results.sort();

        assert_eq!(table.len(), 1);
        assert_eq!(results.iter().filter(|r| r.as_str() == "race").count(), 1);
        assert_eq!(table.root_name("race"), "race");
    }
}
