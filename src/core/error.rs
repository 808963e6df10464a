//! 统一错误处理模块
//!
//! 桥接层的错误类型定义
//!
//! ## 错误类型分层
//!
//! - **编组错误** (`MarshalError`): 值无法跨越边界（类型不支持、缓冲区损坏、引用失效）
//! - **脚本错误** (`ScriptException`): 引擎内抛出的异常，携带合并后的调用栈
//! - **宿主错误** (`HostException`): 宿主回调中产生的错误，携带双方调用栈
//!
//! `BridgeError` 是 `Clone` 的：同一个错误对象可以穿过引擎再原样返回宿主。

use std::fmt;
use std::panic::Location;
use thiserror::Error;

use crate::config::ConfigError;
use crate::host::WrapperId;

/// 桥接层核心错误类型
#[derive(Error, Debug, Clone)]
pub enum BridgeError {
    #[error("Marshalling error: {0}")]
    Marshalling(#[from] MarshalError),

    #[error("Script error: {0}")]
    Script(ScriptException),

    #[error("Host error: {0}")]
    Host(HostException),

    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),

    #[error("Bridge context is closed")]
    ContextClosed,

    #[error("Bridge context is busy: {0}")]
    ContextBusy(&'static str),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl BridgeError {
    /// 错误的纯消息文本（不含分类前缀），用于构造引擎端的 Error 对象
    pub fn message(&self) -> String {
        match self {
            BridgeError::Script(e) => e.message.clone(),
            BridgeError::Host(e) => e.message.clone(),
            other => other.to_string(),
        }
    }

    /// 宿主端调用栈帧
    pub fn host_frames(&self) -> &[String] {
        match self {
            BridgeError::Host(e) => &e.host_frames,
            _ => &[],
        }
    }

    /// 追加一次跨越带回的引擎端栈帧；同一段栈帧只合并一次
    pub(crate) fn absorb_script_frames(mut self, frames: Vec<String>) -> Self {
        match &mut self {
            BridgeError::Script(e) => {
                merge_hop(&mut e.frames, frames);
            }
            BridgeError::Host(e) => {
                merge_hop(&mut e.script_frames, frames);
            }
            _ => {}
        }
        self
    }

    pub fn is_resource_exhausted(&self) -> bool {
        matches!(self, BridgeError::ResourceExhausted(_))
    }
}

impl From<ScriptException> for BridgeError {
    fn from(e: ScriptException) -> Self {
        BridgeError::Script(e)
    }
}

impl From<HostException> for BridgeError {
    fn from(e: HostException) -> Self {
        BridgeError::Host(e)
    }
}

impl From<ConfigError> for BridgeError {
    fn from(e: ConfigError) -> Self {
        BridgeError::Config(e.to_string())
    }
}

/// 编组错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MarshalError {
    #[error("unsupported {0} value")]
    Unsupported(&'static str),

    #[error("stale reference to script object {0}")]
    StaleReference(WrapperId),

    #[error("broken buffer: {0}")]
    BrokenBuffer(String),

    #[error("expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: String,
    },

    #[error("invalid JSON: {0}")]
    InvalidJson(String),
}

/// 引擎内抛出的异常
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptException {
    message: String,
    frames: Vec<String>,
    source: Option<String>,
}

impl ScriptException {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            frames: Vec::new(),
            source: None,
        }
    }

    pub(crate) fn with_frames(mut self, frames: Vec<String>) -> Self {
        self.frames = frames;
        self
    }

    /// 记录触发异常的脚本文件名；已有来源时保持不变
    pub(crate) fn with_source(mut self, source: &str) -> Self {
        if self.source.is_none() {
            self.source = Some(source.to_string());
        }
        self
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn frames(&self) -> &[String] {
        &self.frames
    }

    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    /// 完整的调用栈文本
    pub fn stack_trace(&self) -> String {
        render_stack(&self.message, [self.frames.as_slice()])
    }
}

impl fmt::Display for ScriptException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            Some(source) => write!(f, "{} ({})", self.message, source),
            None => f.write_str(&self.message),
        }
    }
}

/// 宿主回调中产生的错误
///
/// 创建时记录调用位置作为宿主栈帧；穿过引擎后会追加引擎端的栈帧。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostException {
    message: String,
    host_frames: Vec<String>,
    script_frames: Vec<String>,
}

impl HostException {
    #[track_caller]
    pub fn new(message: impl Into<String>) -> Self {
        let caller = Location::caller();
        Self {
            message: message.into(),
            host_frames: vec![format!(
                "{}:{}:{}",
                caller.file(),
                caller.line(),
                caller.column()
            )],
            script_frames: Vec::new(),
        }
    }

    #[track_caller]
    pub fn from_error<E: std::error::Error + ?Sized>(err: &E) -> Self {
        Self::new(err.to_string())
    }

    pub fn with_frame(mut self, frame: impl Into<String>) -> Self {
        self.host_frames.push(frame.into());
        self
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn host_frames(&self) -> &[String] {
        &self.host_frames
    }

    pub fn script_frames(&self) -> &[String] {
        &self.script_frames
    }

    /// 合并后的调用栈：先引擎端，再宿主端
    pub fn stack_trace(&self) -> String {
        let host: Vec<String> = self
            .host_frames
            .iter()
            .map(|frame| format!("[host] {}", frame))
            .collect();
        render_stack(&self.message, [self.script_frames.as_slice(), host.as_slice()])
    }
}

impl fmt::Display for HostException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// 按跨越合并栈帧：整段追加，或者在这段栈帧已作为连续片段出现时整段跳过。
/// 单段内部的重复帧（递归调用）原样保留。
pub(crate) fn merge_hop(target: &mut Vec<String>, frames: Vec<String>) -> bool {
    if frames.is_empty() || contains_run(target, &frames) {
        return false;
    }
    target.extend(frames);
    true
}

fn contains_run(haystack: &[String], run: &[String]) -> bool {
    run.len() <= haystack.len() && haystack.windows(run.len()).any(|window| window == run)
}

fn render_stack<'a>(message: &str, sections: impl IntoIterator<Item = &'a [String]>) -> String {
    let mut out = String::from(message);
    for frame in sections.into_iter().flatten() {
        out.push_str("\n    at ");
        out.push_str(frame);
    }
    out
}

/// 桥接层结果类型
pub type BridgeResult<T> = Result<T, BridgeError>;
