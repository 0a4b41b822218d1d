//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `SURVEY__*` 覆盖（双下划线表示嵌套，如 `SURVEY__LLM__PROVIDER=openai`）。

use std::path::PathBuf;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    #[serde(default)]
    pub app: AppSection,
    #[serde(default)]
    pub data: DataSection,
    #[serde(default)]
    pub context: ContextSection,
    #[serde(default)]
    pub llm: LlmSection,
    #[serde(default)]
    pub query: QuerySection,
    #[serde(default)]
    pub web: WebSection,
}

/// [app] 段
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppSection {
    pub name: Option<String>,
}

/// [data] 段：Parquet 数据目录与合并视图名
#[derive(Debug, Clone, Deserialize)]
pub struct DataSection {
    #[serde(default = "default_data_dir")]
    pub dir: PathBuf,
    /// 覆盖全部文件的合并视图
    #[serde(default = "default_combined_view")]
    pub combined_view: String,
    #[serde(default = "default_file_extension")]
    pub file_extension: String,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_combined_view() -> String {
    "all_responses".to_string()
}

fn default_file_extension() -> String {
    ".parquet".to_string()
}

impl Default for DataSection {
    fn default() -> Self {
        Self {
            dir: default_data_dir(),
            combined_view: default_combined_view(),
            file_extension: default_file_extension(),
        }
    }
}

/// [context] 段：会话上下文存储
#[derive(Debug, Clone, Deserialize)]
pub struct ContextSection {
    /// SQLite 文件路径
    #[serde(default = "default_db_path")]
    pub db_path: Option<PathBuf>,
    /// 显式使用内存存储（进程退出即丢失，用于测试与临时运行）
    #[serde(default)]
    pub in_memory: bool,
    /// 注入提示词的最近提问条数
    #[serde(default = "default_history_in_prompt")]
    pub history_in_prompt: usize,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_db_path() -> Option<PathBuf> {
    Some(PathBuf::from("data/context/context.db"))
}

fn default_history_in_prompt() -> usize {
    5
}

fn default_max_connections() -> u32 {
    5
}

impl Default for ContextSection {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            in_memory: false,
            history_in_prompt: default_history_in_prompt(),
            max_connections: default_max_connections(),
        }
    }
}

/// [llm] 段：后端选择与超时
#[derive(Debug, Clone, Deserialize)]
pub struct LlmSection {
    /// 后端：deepseek / openai / mock；优先级由 API Key 与 provider 共同决定
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    pub base_url: Option<String>,
    #[serde(default)]
    pub deepseek: LlmDeepSeekSection,
    #[serde(default)]
    pub openai: LlmOpenAiSection,
    #[serde(default)]
    pub timeouts: LlmTimeoutsSection,
}

fn default_provider() -> String {
    "openai".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            base_url: None,
            deepseek: LlmDeepSeekSection::default(),
            openai: LlmOpenAiSection::default(),
            timeouts: LlmTimeoutsSection::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct LlmDeepSeekSection {
    pub model: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct LlmOpenAiSection {
    pub model: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmTimeoutsSection {
    /// 单次补全请求超时（秒）
    #[serde(default = "default_request_timeout")]
    pub request: u64,
}

fn default_request_timeout() -> u64 {
    60
}

impl Default for LlmTimeoutsSection {
    fn default() -> Self {
        Self {
            request: default_request_timeout(),
        }
    }
}

/// [query] 段：SQL 执行超时与返回行数上限
#[derive(Debug, Clone, Deserialize)]
pub struct QuerySection {
    #[serde(default = "default_query_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_rows")]
    pub max_rows: usize,
}

fn default_query_timeout_secs() -> u64 {
    30
}

fn default_max_rows() -> usize {
    1000
}

impl Default for QuerySection {
    fn default() -> Self {
        Self {
            timeout_secs: default_query_timeout_secs(),
            max_rows: default_max_rows(),
        }
    }
}

/// [web] 段
#[derive(Debug, Clone, Deserialize)]
pub struct WebSection {
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_port() -> u16 {
    8000
}

impl Default for WebSection {
    fn default() -> Self {
        Self {
            port: default_port(),
        }
    }
}

/// 从 config 目录加载配置，环境变量 SURVEY__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 SURVEY__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("SURVEY")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}
