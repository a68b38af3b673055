//! 계층형 JSON 설정 저장소
//!
//! 글로벌(~/.config/graft/) → 프로젝트(.graft/) 순서로 레이어를 쌓고,
//! 뒤 레이어의 키가 앞 레이어를 덮어쓴다 (객체는 재귀 병합).

use crate::{Error, Result};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::debug;

/// 글로벌 설정 디렉토리 이름
const GLOBAL_DIR: &str = "graft";

/// 프로젝트 설정 디렉토리 이름
const PROJECT_DIR: &str = ".graft";

/// 계층형 설정 저장소
#[derive(Debug, Clone, Default)]
pub struct ConfigStore {
    layers: Vec<PathBuf>,
}

impl ConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 글로벌 + 현재 디렉토리 프로젝트 레이어
    pub fn standard() -> Self {
        let mut store = Self::new();
        if let Some(dir) = dirs::config_dir() {
            store = store.with_layer(dir.join(GLOBAL_DIR));
        }
        if let Ok(cwd) = std::env::current_dir() {
            store = store.with_layer(cwd.join(PROJECT_DIR));
        }
        store
    }

    /// 레이어 추가 (나중에 추가된 레이어가 우선)
    pub fn with_layer(mut self, dir: impl Into<PathBuf>) -> Self {
        self.layers.push(dir.into());
        self
    }

    pub fn layers(&self) -> &[PathBuf] {
        &self.layers
    }

    /// 단일 레이어의 파일 읽기 (없으면 None)
    pub fn read_layer(&self, dir: &Path, filename: &str) -> Result<Option<Value>> {
        let path = dir.join(filename);
        if !path.is_file() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&path)
            .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))?;
        let value = serde_json::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))?;
        debug!("Loaded config layer {}", path.display());
        Ok(Some(value))
    }

    /// 모든 레이어를 병합한 뒤 역직렬화
    pub fn load_merged<T: DeserializeOwned>(&self, filename: &str) -> Result<T> {
        let mut merged = Value::Object(Default::default());
        for dir in &self.layers {
            if let Some(layer) = self.read_layer(dir, filename)? {
                merge_values(&mut merged, layer);
            }
        }
        serde_json::from_value(merged)
            .map_err(|e| Error::Config(format!("Invalid {}: {}", filename, e)))
    }

    /// 지정 레이어에 저장
    pub fn save<T: Serialize>(&self, dir: &Path, filename: &str, data: &T) -> Result<()> {
        std::fs::create_dir_all(dir)
            .map_err(|e| Error::Config(format!("Failed to create directory: {}", e)))?;
        let path = dir.join(filename);
        let content = serde_json::to_string_pretty(data)
            .map_err(|e| Error::Config(format!("Failed to serialize: {}", e)))?;
        std::fs::write(&path, content)
            .map_err(|e| Error::Config(format!("Failed to write {}: {}", path.display(), e)))
    }
}

/// overlay의 키로 base를 덮어쓰기 (객체는 재귀)
pub fn merge_values(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_merge_values_recursive() {
        let mut base = json!({"a": 1, "nested": {"x": true, "y": "keep"}});
        merge_values(&mut base, json!({"a": 2, "nested": {"x": false}}));
        assert_eq!(base, json!({"a": 2, "nested": {"x": false, "y": "keep"}}));
    }

    #[test]
    fn test_layers_override_in_order() {
        let global = tempfile::tempdir().unwrap();
        let project = tempfile::tempdir().unwrap();
        std::fs::write(global.path().join("c.json"), r#"{"a": 1, "b": 1}"#).unwrap();
        std::fs::write(project.path().join("c.json"), r#"{"b": 2}"#).unwrap();

        let store = ConfigStore::new()
            .with_layer(global.path())
            .with_layer(project.path());
        let value: Value = store.load_merged("c.json").unwrap();
        assert_eq!(value, json!({"a": 1, "b": 2}));
    }

    #[test]
    fn test_missing_layers_yield_empty_object() {
        let store = ConfigStore::new().with_layer("/definitely/not/here");
        let value: Value = store.load_merged("c.json").unwrap();
        assert_eq!(value, json!({}));
    }

    #[test]
    fn test_malformed_layer_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("c.json"), "{not json").unwrap();
        let store = ConfigStore::new().with_layer(dir.path());
        let err = store.load_merged::<Value>("c.json").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
