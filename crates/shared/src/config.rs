//! 配置管理模块
//!
//! 支持多格式配置文件加载，环境变量覆盖，以及类型安全的配置访问。

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;

use crate::observability::ObservabilityConfig;

/// 环境变量前缀，如 ACCESS_ENGINE__CLIENT_CONTEXT -> engine.client_context
const ENV_PREFIX: &str = "ACCESS";

/// 规则引擎配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// 是否运行在客户端上下文
    ///
    /// 服务端上下文中 `is_ready()` 始终报告未就绪，与客户端首次渲染保持一致；
    /// dehydrate 和异步等待仍然使用内部就绪状态。
    pub client_context: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            client_context: true,
        }
    }
}

impl EngineConfig {
    /// 客户端上下文配置
    pub fn client() -> Self {
        Self {
            client_context: true,
        }
    }

    /// 服务端上下文配置（每个请求一个实例）
    pub fn server() -> Self {
        Self {
            client_context: false,
        }
    }
}

/// 应用配置
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub service_name: String,
    pub environment: String,
    pub engine: EngineConfig,
    pub observability: ObservabilityConfig,
}

impl AppConfig {
    /// 从配置文件和环境变量加载配置
    ///
    /// 加载顺序（后加载的会覆盖先加载的同名配置项）：
    /// 1. config/default.toml（默认配置）
    /// 2. config/{environment}.toml（环境特定配置）
    /// 3. config/{service_name}.toml（服务特定配置）
    /// 4. 环境变量（ACCESS_ 前缀，层级用双下划线分隔）
    pub fn load(service_name: &str) -> Result<Self, ConfigError> {
        let env = std::env::var("ACCESS_ENV").unwrap_or_else(|_| "development".to_string());
        let config_dir = std::env::var("CONFIG_DIR").unwrap_or_else(|_| "config".to_string());

        Self::load_from(Path::new(&config_dir), &env, service_name)
    }

    /// 从指定目录加载配置，不读取 ACCESS_ENV / CONFIG_DIR
    pub fn load_from(
        config_dir: &Path,
        environment: &str,
        service_name: &str,
    ) -> Result<Self, ConfigError> {
        let builder = Config::builder()
            .set_default("service_name", service_name)?
            .set_default("environment", environment)?
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            .add_source(
                File::from(config_dir.join(format!("{}.toml", environment))).required(false),
            )
            .add_source(
                File::from(config_dir.join(format!("{}.toml", service_name))).required(false),
            )
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );

        let mut config: Self = builder.build()?.try_deserialize()?;
        config.observability.service_name = config.service_name.clone();

        Ok(config)
    }

    /// 是否为生产环境
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}
