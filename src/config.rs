//! 配置模块，负责加载JSON配置文件

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::parser::ParseLimits;

/// 配置加载错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("配置文件不存在: {0}")]
    NotFound(String),

    #[error("无法读取配置文件 {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("无法解析JSON配置文件 {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// 查询配置结构
///
/// ```json
/// {
///   "tables": { "User": "users" },
///   "max_filter_length": 4096,
///   "max_depth": 32
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// 实体名到数据库表名的映射
    pub tables: HashMap<String, String>,
    /// 过滤字符串的最大字节数
    pub max_filter_length: usize,
    /// 过滤表达式的最大嵌套层数
    pub max_depth: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        let limits = ParseLimits::default();
        Self {
            tables: HashMap::new(),
            max_filter_length: limits.max_length,
            max_depth: limits.max_depth,
        }
    }
}

impl QueryConfig {
    /// 从JSON文件加载查询配置
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();
        let path_str = path_ref.display().to_string();

        // 检查文件是否存在
        if !path_ref.exists() {
            return Err(ConfigError::NotFound(path_str));
        }

        // 读取文件内容
        let content = fs::read_to_string(path_ref).map_err(|source| ConfigError::Read {
            path: path_str.clone(),
            source,
        })?;

        // 解析JSON
        let config = serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path_str.clone(),
            source,
        })?;

        tracing::debug!(path = %path_str, "配置加载完成");
        Ok(config)
    }

    /// 获取实体对应的表名，如果不存在则返回小写的实体名
    pub fn table_name(&self, entity: &str) -> String {
        self.tables
            .get(entity)
            .cloned()
            .unwrap_or_else(|| entity.to_lowercase())
    }

    /// 解析器限制
    pub fn parse_limits(&self) -> ParseLimits {
        ParseLimits {
            max_length: self.max_filter_length,
            max_depth: self.max_depth,
        }
    }
}
