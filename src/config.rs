//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `QUINT__*` 覆盖（双下划线表示嵌套，如 `QUINT__SERVER__PORT=8080`）。

use std::path::PathBuf;

use serde::Deserialize;

use crate::core::QuintError;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub llm: LlmSection,
    #[serde(default)]
    pub relay: RelaySection,
    #[serde(default)]
    pub ui: UiSection,
}

/// [server] 段：代理监听地址
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

/// [llm] 段：后端选择、模型、API Key 所在环境变量、超时
#[derive(Debug, Clone, Deserialize)]
pub struct LlmSection {
    /// 后端：openrouter / openai / mock
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// 未设置时按 provider 取默认端点
    pub base_url: Option<String>,
    /// 从哪个环境变量读取 API Key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default)]
    pub timeouts: LlmTimeoutsSection,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            base_url: None,
            api_key_env: default_api_key_env(),
            max_tokens: default_max_tokens(),
            timeouts: LlmTimeoutsSection::default(),
        }
    }
}

fn default_provider() -> String {
    "openrouter".to_string()
}

fn default_model() -> String {
    "nex-agi/deepseek-v3.1-nex-n1:free".to_string()
}

fn default_api_key_env() -> String {
    "OPENROUTER_API_KEY".to_string()
}

fn default_max_tokens() -> u32 {
    500
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmTimeoutsSection {
    /// 建立流（首包前）的超时，秒
    #[serde(default = "default_request_timeout")]
    pub request: u64,
    /// 整个流的超时，秒
    #[serde(default = "default_stream_timeout")]
    pub stream: u64,
}

impl Default for LlmTimeoutsSection {
    fn default() -> Self {
        Self {
            request: default_request_timeout(),
            stream: default_stream_timeout(),
        }
    }
}

fn default_request_timeout() -> u64 {
    60
}

fn default_stream_timeout() -> u64 {
    120
}

/// [relay] 段：系统提示覆盖、是否丢弃 assistant 消息
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RelaySection {
    /// 不设置时使用内置的 Quint 协议说明
    pub system_prompt: Option<String>,
    /// 部分 OpenAI 兼容端点不接受 assistant 输入；开启后只转发 user / system
    #[serde(default)]
    pub drop_assistant_messages: bool,
}

/// [ui] 段：终端宿主
#[derive(Debug, Clone, Deserialize)]
pub struct UiSection {
    /// 启动时载入的演示：quiz / tutoring / roleplay / none
    #[serde(default = "default_demo")]
    pub demo: String,
    /// TUI 运行时日志写入文件（避免破坏全屏界面）
    #[serde(default = "default_log_file")]
    pub log_file: PathBuf,
    /// 对话历史保留轮数
    #[serde(default = "default_max_context_turns")]
    pub max_context_turns: usize,
}

impl Default for UiSection {
    fn default() -> Self {
        Self {
            demo: default_demo(),
            log_file: default_log_file(),
            max_context_turns: default_max_context_turns(),
        }
    }
}

fn default_demo() -> String {
    "quiz".to_string()
}

fn default_log_file() -> PathBuf {
    PathBuf::from("quint.log")
}

fn default_max_context_turns() -> usize {
    20
}

/// 从 config 目录加载配置，环境变量 QUINT__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 QUINT__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, QuintError> {
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
        config::Environment::with_prefix("QUINT")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    Ok(c.try_deserialize()?)
}
