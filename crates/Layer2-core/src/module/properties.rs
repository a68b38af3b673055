//! Module Properties - 모듈별 설정 파일 (`plugin-<root>.yml` 등)
//!
//! 모듈 리졸버를 통해 파일을 찾고 점 구분 키로 평탄화한다.
//! 파일이 없거나 파싱에 실패하면 빈 속성으로 계속 진행한다.

use crate::namespace::NamespaceResolver;
use graft_foundation::{Error, PropertyFileConfig, Result};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// 평탄화된 모듈 속성
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModuleProperties {
    source: Option<String>,
    values: BTreeMap<String, Value>,
}

impl ModuleProperties {
    pub fn empty() -> Self {
        Self::default()
    }

    /// 리졸버에서 `<prefix><root>.<ext>` 탐색
    pub fn locate(resolver: &NamespaceResolver, config: &PropertyFileConfig, root: &str) -> Self {
        if !config.enable {
            return Self::empty();
        }
        let file_name = config.file_name(root);
        let bytes = match resolver.find_resource(&file_name) {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                debug!("No module config {} for {}", file_name, root);
                return Self::empty();
            }
            Err(e) => {
                warn!("Cannot read module config {}: {}", file_name, e);
                return Self::empty();
            }
        };
        match Self::parse(&file_name, &bytes) {
            Ok(properties) => {
                info!(
                    "Loaded module config {} ({} keys)",
                    file_name,
                    properties.len()
                );
                properties
            }
            Err(e) => {
                warn!("Can not load module config {}: {}", file_name, e);
                Self::empty()
            }
        }
    }

    /// 확장자에 맞춰 파싱 (yml/yaml, json, toml)
    pub fn parse(file_name: &str, bytes: &[u8]) -> Result<Self> {
        let extension = file_name.rsplit_once('.').map(|(_, e)| e).unwrap_or("");
        let tree: Value = match extension.to_ascii_lowercase().as_str() {
            "yml" | "yaml" => serde_yaml::from_slice(bytes)
                .map_err(|e| Error::Config(format!("{}: {}", file_name, e)))?,
            "json" => serde_json::from_slice(bytes)?,
            "toml" => {
                let text = std::str::from_utf8(bytes)
                    .map_err(|e| Error::Config(format!("{}: {}", file_name, e)))?;
                toml::from_str(text).map_err(|e| Error::Config(format!("{}: {}", file_name, e)))?
            }
            other => {
                return Err(Error::Config(format!(
                    "unsupported module config format '{}'",
                    other
                )))
            }
        };

        let mut values = BTreeMap::new();
        flatten("", tree, &mut values);
        Ok(Self {
            source: Some(file_name.to_string()),
            values,
        })
    }

    /// 출처 파일명
    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(Value::as_str)
    }

    pub fn get_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.get_str(key).unwrap_or(default)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

fn flatten(prefix: &str, value: Value, out: &mut BTreeMap<String, Value>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                let key = if prefix.is_empty() {
                    key
                } else {
                    format!("{}.{}", prefix, key)
                };
                flatten(&key, child, out);
            }
        }
        Value::Null if prefix.is_empty() => {}
        other => {
            out.insert(prefix.to_string(), other);
        }
    }
}
