//! Quint - 聊天界面中的「选择 + 揭示」交互块
//!
//! 模块划分：
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 数据模型、渲染状态（RenderState）、激活协调器、错误类型
//! - **demos**: 内置演示块（选择题 / 分步辅导 / 角色扮演）
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / OpenRouter / Mock）
//! - **observability**: tracing 日志初始化
//! - **protocol**: ⟪QUINT⟫ … ⟫QUINT⟫ 定界符协议
//! - **relay**: 消息规范化与系统提示注入
//! - **server**: HTTP 转发代理（feature = "server"）
//! - **ui**: Ratatui 终端宿主

pub mod config;
pub mod core;
pub mod demos;
pub mod llm;
pub mod observability;
pub mod protocol;
pub mod relay;
#[cfg(feature = "server")]
pub mod server;
pub mod ui;

pub use crate::core::{Block, Choice, Coordinator, Directionality, RenderItem, RenderState, Reveal, RevealId};
