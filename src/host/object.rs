//! 宿主对象能力接口
//!
//! 引擎端的代理对象把 has/get/set/apply/construct 转发给实现了 [`HostObject`] 的宿主对象。
//! 每个方法都会拿到当前的 [`Scope`]，可以用它回调引擎（`Scope` 实现了 `CallFacade`）。

use std::any::Any;
use std::fmt;
use std::rc::Rc;

use super::value::HostValue;
use crate::bridge::Scope;
use crate::core::{BridgeResult, HostException};

/// 宿主对象能力集合
///
/// 键是引擎传来的属性名（`HostValue::String`）或数组下标（`HostValue::Int`）。
/// 返回 `Err` 时错误会转换为引擎异常抛给脚本。
/// `get` 默认返回 `Undefined`，脚本读取未知属性得到 `undefined`；返回 `Null` 则脚本看到 `null`。
pub trait HostObject: AsAny {
    fn has(&self, scope: &Scope<'_>, key: &HostValue) -> BridgeResult<bool> {
        Ok(!self.get(scope, key)?.is_null())
    }

    fn get(&self, _scope: &Scope<'_>, _key: &HostValue) -> BridgeResult<HostValue> {
        Ok(HostValue::Undefined)
    }

    fn set(&self, _scope: &Scope<'_>, _key: &HostValue, _value: HostValue) -> BridgeResult<bool> {
        Ok(false)
    }

    fn call(
        &self,
        _scope: &Scope<'_>,
        _this: HostValue,
        _args: Vec<HostValue>,
    ) -> BridgeResult<HostValue> {
        Err(HostException::new("host object is not callable").into())
    }

    fn construct(&self, _scope: &Scope<'_>, _args: Vec<HostValue>) -> BridgeResult<HostValue> {
        Err(HostException::new("host object is not a constructor").into())
    }
}

pub type HostObjectRef = Rc<dyn HostObject>;

/// 取回具体类型，按类型注册的转换钩子用它识别宿主对象
pub trait AsAny {
    fn as_any(&self) -> &dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

type FunctionBody = dyn Fn(&Scope<'_>, HostValue, Vec<HostValue>) -> BridgeResult<HostValue>;

/// 由闭包实现的宿主函数
///
/// 作为构造函数调用时 `this` 为 `Null`。
pub struct HostFunction {
    name: String,
    body: Box<FunctionBody>,
}

impl HostFunction {
    pub fn new<F>(name: &str, body: F) -> Self
    where
        F: Fn(&Scope<'_>, HostValue, Vec<HostValue>) -> BridgeResult<HostValue> + 'static,
    {
        Self {
            name: name.to_string(),
            body: Box::new(body),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for HostFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostFunction").field("name", &self.name).finish()
    }
}

impl HostObject for HostFunction {
    fn has(&self, _scope: &Scope<'_>, key: &HostValue) -> BridgeResult<bool> {
        Ok(key.as_str() == Some("name"))
    }

    fn get(&self, _scope: &Scope<'_>, key: &HostValue) -> BridgeResult<HostValue> {
        match key.as_str() {
            Some("name") => Ok(HostValue::String(self.name.clone())),
            _ => Ok(HostValue::Undefined),
        }
    }

    fn call(&self, scope: &Scope<'_>, this: HostValue, args: Vec<HostValue>) -> BridgeResult<HostValue> {
        (self.body)(scope, this, args)
    }

    fn construct(&self, scope: &Scope<'_>, args: Vec<HostValue>) -> BridgeResult<HostValue> {
        (self.body)(scope, HostValue::Null, args)
    }
}
