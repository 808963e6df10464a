//! 公共调用接口
//!
//! [`CallFacade`] 是外层 API 使用的唯一接口：顶层的 [`Bridge`] 和回调中拿到的 [`Scope`]
//! 都实现它。每个操作先编组输入，调用引擎，把异常交给异常桥接，再编组结果。

use rquickjs::Value;

use super::{Bridge, Scope};
use crate::core::{BridgeError, BridgeResult, MarshalError};
use crate::host::{HostValue, PropertyKey, ScriptObject, WrapperId};

const LOG_TARGET: &str = "script_bridge::bridge";

/// 桥接操作接口
pub trait CallFacade {
    /// 求值脚本，`filename` 用于错误报告
    fn evaluate(&self, source: &str, filename: &str) -> BridgeResult<HostValue>;

    /// 编译函数表达式，返回可调用的脚本对象
    fn compile(&self, source: &str, filename: &str) -> BridgeResult<ScriptObject>;

    /// 以全局对象为 `this` 调用函数
    fn call(&self, func: &ScriptObject, args: &[HostValue]) -> BridgeResult<HostValue>;

    fn call_method(
        &self,
        func: &ScriptObject,
        this: &HostValue,
        args: &[HostValue],
    ) -> BridgeResult<HostValue>;

    fn call_property(
        &self,
        object: &ScriptObject,
        property: &HostValue,
        args: &[HostValue],
    ) -> BridgeResult<HostValue>;

    fn call_constructor(&self, func: &ScriptObject, args: &[HostValue]) -> BridgeResult<HostValue>;

    fn get_key(&self, object: &ScriptObject, key: PropertyKey) -> BridgeResult<HostValue>;

    fn set_key(&self, object: &ScriptObject, key: PropertyKey, value: &HostValue) -> BridgeResult<bool>;

    /// `JSON.stringify`，无法序列化时退回 `String(value)`
    fn stringify(&self, value: &HostValue) -> BridgeResult<String>;

    /// 执行挂起的任务直到队列为空，返回执行的数量
    fn run_pending_jobs(&self) -> BridgeResult<usize>;

    /// 宿主包装已终结；重复通知是无操作
    fn notify_host_wrapper_finalized(&self, id: WrapperId);
}

/// 调试器钩子，桥接只负责转发
pub trait DebugHook {
    fn attach(&self, connection: &str) -> BridgeResult<()>;

    fn cooperate(&self);

    fn is_attached(&self) -> bool;

    fn notify(&self, args: &[HostValue]);
}

impl<'js> Scope<'js> {
    /// 其他桥接的对象交给其所属桥接处理
    fn foreign<R>(
        &self,
        object: &ScriptObject,
        f: impl for<'a> FnOnce(&Scope<'a>) -> BridgeResult<R>,
    ) -> Option<BridgeResult<R>> {
        if object.bridge_id() == self.bridge_id() {
            return None;
        }
        Some(object.owner().and_then(|owner| super::enter_nested(&owner, f)))
    }

    fn run<R>(&self, result: rquickjs::Result<R>) -> BridgeResult<R> {
        result.map_err(|e| self.engine_error(e))
    }

    fn eval_source(&self, source: &str, filename: &str) -> BridgeResult<Value<'js>> {
        let _span = tracing::debug_span!(target: LOG_TARGET, "evaluate", filename).entered();
        self.ctx().eval(source).map_err(|e| match self.engine_error(e) {
            BridgeError::Script(exception) => BridgeError::Script(exception.with_source(filename)),
            other => other,
        })
    }

    pub fn has_key(&self, object: &ScriptObject, key: PropertyKey) -> BridgeResult<bool> {
        if let Some(result) = self.foreign(object, |s| s.has_key(object, key.clone())) {
            return result;
        }
        let target = self.pinned(object)?;
        let key = self.key_value(&key)?;
        self.run(self.helpers()?.has(target, key))
    }

    pub fn global(&self) -> BridgeResult<ScriptObject> {
        match self.to_host(self.ctx().globals().into_value())? {
            HostValue::Script(global) => Ok(global),
            other => Err(MarshalError::TypeMismatch {
                expected: "object",
                found: other.kind().to_string(),
            }
            .into()),
        }
    }

    pub fn set_global_property(&self, name: &str, value: &HostValue) -> BridgeResult<()> {
        let value = self.to_engine(value)?;
        self.run(self.ctx().globals().set(name, value))
    }

    pub fn type_of(&self, value: &HostValue) -> BridgeResult<String> {
        let value = self.to_engine(value)?;
        self.run(self.helpers()?.type_of(value))
    }
}

impl<'js> CallFacade for Scope<'js> {
    fn evaluate(&self, source: &str, filename: &str) -> BridgeResult<HostValue> {
        let value = self.eval_source(source, filename)?;
        self.to_host(value)
    }

    fn compile(&self, source: &str, filename: &str) -> BridgeResult<ScriptObject> {
        let value = self.eval_source(&format!("({})", source), filename)?;
        let found = if value.is_function() {
            match self.to_host(value)? {
                HostValue::Script(func) => return Ok(func),
                other => other.kind().to_string(),
            }
        } else {
            format!("{:?}", value.type_of())
        };
        Err(MarshalError::TypeMismatch {
            expected: "function",
            found,
        }
        .into())
    }

    fn call(&self, func: &ScriptObject, args: &[HostValue]) -> BridgeResult<HostValue> {
        if let Some(result) = self.foreign(func, |s| s.call(func, args)) {
            return result;
        }
        let target = self.pinned(func)?;
        let args = self.engine_args(args)?;
        let this = self.ctx().globals().into_value();
        let result = self.run(self.helpers()?.apply(target, this, args))?;
        self.to_host(result)
    }

    fn call_method(
        &self,
        func: &ScriptObject,
        this: &HostValue,
        args: &[HostValue],
    ) -> BridgeResult<HostValue> {
        if let Some(result) = self.foreign(func, |s| s.call_method(func, this, args)) {
            return result;
        }
        let target = self.pinned(func)?;
        let this = self.to_engine(this)?;
        let args = self.engine_args(args)?;
        let result = self.run(self.helpers()?.apply(target, this, args))?;
        self.to_host(result)
    }

    fn call_property(
        &self,
        object: &ScriptObject,
        property: &HostValue,
        args: &[HostValue],
    ) -> BridgeResult<HostValue> {
        if let Some(result) = self.foreign(object, |s| s.call_property(object, property, args)) {
            return result;
        }
        let target = self.pinned(object)?;
        let key = self.to_engine(property)?;
        let args = self.engine_args(args)?;
        let result = self.run(self.helpers()?.invoke(target, key, args))?;
        self.to_host(result)
    }

    fn call_constructor(&self, func: &ScriptObject, args: &[HostValue]) -> BridgeResult<HostValue> {
        if let Some(result) = self.foreign(func, |s| s.call_constructor(func, args)) {
            return result;
        }
        let target = self.pinned(func)?;
        let args = self.engine_args(args)?;
        let result = self.run(self.helpers()?.construct(target, args))?;
        self.to_host(result)
    }

    fn get_key(&self, object: &ScriptObject, key: PropertyKey) -> BridgeResult<HostValue> {
        if let Some(result) = self.foreign(object, |s| s.get_key(object, key.clone())) {
            return result;
        }
        let target = self.pinned(object)?;
        let key = self.key_value(&key)?;
        let value = self.run(self.helpers()?.get(target, key))?;
        self.to_host(value)
    }

    fn set_key(&self, object: &ScriptObject, key: PropertyKey, value: &HostValue) -> BridgeResult<bool> {
        if let Some(result) = self.foreign(object, |s| s.set_key(object, key.clone(), value)) {
            return result;
        }
        let target = self.pinned(object)?;
        let key = self.key_value(&key)?;
        let value = self.to_engine(value)?;
        self.run(self.helpers()?.set(target, key, value))
    }

    fn stringify(&self, value: &HostValue) -> BridgeResult<String> {
        if let HostValue::Script(object) = value {
            if let Some(result) = self.foreign(object, |s| s.stringify(value)) {
                return result;
            }
        }
        let value = self.to_engine(value)?;
        self.run(self.helpers()?.stringify(value))
    }

    fn run_pending_jobs(&self) -> BridgeResult<usize> {
        Err(BridgeError::ContextBusy(
            "pending jobs can only be drained from the top level",
        ))
    }

    fn notify_host_wrapper_finalized(&self, id: WrapperId) {
        self.evict_wrapper(id);
    }
}

impl CallFacade for Bridge {
    fn evaluate(&self, source: &str, filename: &str) -> BridgeResult<HostValue> {
        self.enter(|scope| scope.evaluate(source, filename))
    }

    fn compile(&self, source: &str, filename: &str) -> BridgeResult<ScriptObject> {
        self.enter(|scope| scope.compile(source, filename))
    }

    fn call(&self, func: &ScriptObject, args: &[HostValue]) -> BridgeResult<HostValue> {
        self.enter(|scope| scope.call(func, args))
    }

    fn call_method(
        &self,
        func: &ScriptObject,
        this: &HostValue,
        args: &[HostValue],
    ) -> BridgeResult<HostValue> {
        self.enter(|scope| scope.call_method(func, this, args))
    }

    fn call_property(
        &self,
        object: &ScriptObject,
        property: &HostValue,
        args: &[HostValue],
    ) -> BridgeResult<HostValue> {
        self.enter(|scope| scope.call_property(object, property, args))
    }

    fn call_constructor(&self, func: &ScriptObject, args: &[HostValue]) -> BridgeResult<HostValue> {
        self.enter(|scope| scope.call_constructor(func, args))
    }

    fn get_key(&self, object: &ScriptObject, key: PropertyKey) -> BridgeResult<HostValue> {
        self.enter(|scope| scope.get_key(object, key))
    }

    fn set_key(&self, object: &ScriptObject, key: PropertyKey, value: &HostValue) -> BridgeResult<bool> {
        self.enter(|scope| scope.set_key(object, key, value))
    }

    fn stringify(&self, value: &HostValue) -> BridgeResult<String> {
        self.enter(|scope| scope.stringify(value))
    }

    fn run_pending_jobs(&self) -> BridgeResult<usize> {
        self.drain_jobs()
    }

    fn notify_host_wrapper_finalized(&self, id: WrapperId) {
        self.queue_finalized(id);
    }
}
