//! 异常桥接
//!
//! 引擎异常转换为宿主错误，宿主错误转换为引擎异常，两侧调用栈合并。
//! 宿主错误抛入引擎时，原始错误以代理的形式挂在新 Error 对象的隐藏符号属性上；
//! 异常再次回到宿主时取回原始错误，只追加尚未出现的引擎栈帧。

use std::rc::Rc;

use rquickjs::{IntoJs, Value};

use super::bootstrap::{Helpers, BOOTSTRAP_MODULE};
use super::codec::engine_failure;
use super::reference::{HostTarget, Resolved};
use super::Scope;
use crate::core::{BridgeError, BridgeResult, ScriptException};

const HOST_FRAME_TAG: &str = "[host] ";
const LOG_TARGET: &str = "script_bridge::exception";

/// 从引擎栈文本中取出栈帧，跳过宿主端栈帧和辅助模块的栈帧
pub(crate) fn parse_frames(stack: &str) -> Vec<String> {
    stack
        .lines()
        .map(str::trim)
        .map(|line| line.strip_prefix("at ").unwrap_or(line))
        .filter(|frame| !frame.is_empty() && !frame.starts_with(HOST_FRAME_TAG))
        .filter(|frame| !is_helper_frame(frame))
        .map(str::to_string)
        .collect()
}

fn is_helper_frame(frame: &str) -> bool {
    frame
        .split_once('(')
        .map_or(false, |(_, location)| location.starts_with(BOOTSTRAP_MODULE))
}

fn is_out_of_memory(message: &str) -> bool {
    message.contains("out of memory")
}

impl<'js> Scope<'js> {
    /// 把 rquickjs 调用失败转换为桥接错误，挂起的异常会被取出
    pub(crate) fn engine_error(&self, err: rquickjs::Error) -> BridgeError {
        if !err.is_exception() {
            return engine_failure(err);
        }
        let thrown = self.ctx().catch();
        self.error_from_thrown(thrown)
    }

    pub(crate) fn error_from_thrown(&self, thrown: Value<'js>) -> BridgeError {
        let helpers = match self.helpers() {
            Ok(helpers) => helpers,
            Err(err) => return err,
        };
        let (message, stack) = helpers.describe(&thrown).unwrap_or_else(|_| {
            let _ = self.ctx().catch();
            ("unprintable exception".to_string(), String::new())
        });
        let frames = parse_frames(&stack);

        if let Some(original) = self.host_origin(&helpers, &thrown) {
            tracing::debug!(target: LOG_TARGET, frames = frames.len(), "Host error returned from engine");
            return original.absorb_script_frames(frames);
        }

        if is_out_of_memory(&message) {
            tracing::error!(target: LOG_TARGET, "Engine ran out of memory");
            return BridgeError::ResourceExhausted(message);
        }
        ScriptException::new(message).with_frames(frames).into()
    }

    fn host_origin(&self, helpers: &Helpers<'js>, thrown: &Value<'js>) -> Option<BridgeError> {
        let cause = match helpers.host_cause(thrown) {
            Ok(cause) => cause,
            Err(_) => {
                let _ = self.ctx().catch();
                return None;
            }
        };
        let slot = helpers.payload(&cause).ok().flatten()?;
        match self.resolve_slot(slot) {
            Resolved::Target(HostTarget::Error(error)) => Some((*error).clone()),
            _ => None,
        }
    }

    /// 把宿主错误设置为引擎的挂起异常，返回给 rquickjs 的错误值
    pub(crate) fn throw_host(&self, err: BridgeError) -> rquickjs::Error {
        let message = err.message();
        match self.host_error_value(err) {
            Ok(value) => self.ctx().throw(value),
            Err(_) => match message.into_js(self.ctx()) {
                Ok(value) => self.ctx().throw(value),
                Err(fallback) => fallback,
            },
        }
    }

    fn host_error_value(&self, err: BridgeError) -> BridgeResult<Value<'js>> {
        let helpers = self.helpers()?;
        let message = err.message();

        let engine_stack = helpers.engine_stack().map_err(|e| self.engine_error(e))?;
        let mut merged = String::new();
        for frame in parse_frames(&engine_stack) {
            merged.push_str("    at ");
            merged.push_str(&frame);
            merged.push('\n');
        }
        for frame in err.host_frames() {
            merged.push_str("    at ");
            merged.push_str(HOST_FRAME_TAG);
            merged.push_str(frame);
            merged.push('\n');
        }

        let cause = self.proxy(HostTarget::Error(Rc::new(err)))?;
        helpers
            .raise(&message, &merged, cause)
            .map_err(|e| self.engine_error(e))
    }
}
