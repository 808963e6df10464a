//! 引擎端辅助函数
//!
//! 每个上下文只求值一次 `bootstrap.js`，得到的辅助对象用 `Persistent` 保存。
//! 代理创建、身份关联、错误构造这类依赖引擎内建对象的操作都通过它完成。
//! 脚本作为具名模块求值，其栈帧可以按模块名从合并栈中剔除。

use rquickjs::{Array, Ctx, Function, Module, Object, Persistent, Value};

const BOOTSTRAP: &str = include_str!("bootstrap.js");

/// 辅助模块名，出现在引擎栈帧的位置部分
pub(crate) const BOOTSTRAP_MODULE: &str = "script_bridge:bootstrap";

pub(crate) const OP_HAS: i32 = 0;
pub(crate) const OP_GET: i32 = 1;
pub(crate) const OP_SET: i32 = 2;
pub(crate) const OP_APPLY: i32 = 3;
pub(crate) const OP_CONSTRUCT: i32 = 4;
pub(crate) const OP_PAYLOAD: i32 = 5;

pub(crate) fn install(ctx: &Ctx<'_>) -> rquickjs::Result<Persistent<Object<'static>>> {
    let module = Module::evaluate(ctx.clone(), BOOTSTRAP_MODULE, BOOTSTRAP)?;
    let helpers: Object = module.get("default")?;
    Ok(Persistent::save(ctx, helpers))
}

pub(crate) struct Helpers<'js> {
    object: Object<'js>,
}

impl<'js> Helpers<'js> {
    pub fn new(object: Object<'js>) -> Self {
        Self { object }
    }

    fn func(&self, name: &str) -> rquickjs::Result<Function<'js>> {
        self.object.get(name)
    }

    pub fn proxy(&self, dispatch: Function<'js>) -> rquickjs::Result<Value<'js>> {
        self.func("proxy")?.call((dispatch,))
    }

    pub fn payload(&self, value: &Value<'js>) -> rquickjs::Result<Option<u64>> {
        let slot: Option<f64> = self.func("payload")?.call((value.clone(),))?;
        Ok(slot.map(|slot| slot as u64))
    }

    pub fn identity(&self, value: &Value<'js>) -> rquickjs::Result<Option<u64>> {
        let key: Option<f64> = self.func("identity")?.call((value.clone(),))?;
        Ok(key.map(|key| key as u64))
    }

    pub fn link(&self, value: &Value<'js>, key: u64) -> rquickjs::Result<()> {
        self.func("link")?.call((value.clone(), key as f64))
    }

    pub fn unlink(&self, value: &Value<'js>, key: u64) -> rquickjs::Result<()> {
        self.func("unlink")?.call((value.clone(), key as f64))
    }

    /// `Uint8Array`/`ArrayBuffer` 返回字节视图
    pub fn bytes(&self, value: &Value<'js>) -> rquickjs::Result<Option<Value<'js>>> {
        let view: Value<'js> = self.func("bytes")?.call((value.clone(),))?;
        Ok(if view.is_undefined() { None } else { Some(view) })
    }

    pub fn parse(&self, text: &str) -> rquickjs::Result<Value<'js>> {
        self.func("parse")?.call((text,))
    }

    pub fn stringify(&self, value: Value<'js>) -> rquickjs::Result<String> {
        self.func("stringify")?.call((value,))
    }

    /// 原型上 `constructor` 的名字；取不到时为 `None`
    pub fn constructor_name(&self, value: &Value<'js>) -> rquickjs::Result<Option<String>> {
        self.func("constructorName")?.call((value.clone(),))
    }

    pub fn type_of(&self, value: Value<'js>) -> rquickjs::Result<String> {
        self.func("typeOf")?.call((value,))
    }

    pub fn get(&self, target: Value<'js>, key: Value<'js>) -> rquickjs::Result<Value<'js>> {
        self.func("get")?.call((target, key))
    }

    pub fn set(&self, target: Value<'js>, key: Value<'js>, value: Value<'js>) -> rquickjs::Result<bool> {
        self.func("set")?.call((target, key, value))
    }

    pub fn has(&self, target: Value<'js>, key: Value<'js>) -> rquickjs::Result<bool> {
        self.func("has")?.call((target, key))
    }

    pub fn apply(&self, func: Value<'js>, this: Value<'js>, args: Array<'js>) -> rquickjs::Result<Value<'js>> {
        self.func("apply")?.call((func, this, args))
    }

    pub fn construct(&self, func: Value<'js>, args: Array<'js>) -> rquickjs::Result<Value<'js>> {
        self.func("construct")?.call((func, args))
    }

    pub fn invoke(&self, target: Value<'js>, key: Value<'js>, args: Array<'js>) -> rquickjs::Result<Value<'js>> {
        self.func("invoke")?.call((target, key, args))
    }

    pub fn engine_stack(&self) -> rquickjs::Result<String> {
        self.func("engineStack")?.call(())
    }

    pub fn raise(&self, message: &str, stack: &str, cause: Value<'js>) -> rquickjs::Result<Value<'js>> {
        self.func("raise")?.call((message, stack, cause))
    }

    pub fn host_cause(&self, error: &Value<'js>) -> rquickjs::Result<Value<'js>> {
        self.func("hostCause")?.call((error.clone(),))
    }

    /// 返回 (message, stack)
    pub fn describe(&self, error: &Value<'js>) -> rquickjs::Result<(String, String)> {
        let description: Object<'js> = self.func("describe")?.call((error.clone(),))?;
        Ok((description.get("message")?, description.get("stack")?))
    }
}
