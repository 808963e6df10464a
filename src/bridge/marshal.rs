//! 对象编组
//!
//! `to_engine` / `to_host` 决定每个跨越边界的值是原始值、本桥接已有的包装、
//! 本桥接的宿主代理，还是需要新建固定表条目或代理的对象。

use std::rc::Rc;

use rquickjs::{Array, Object, Persistent, Value};

use super::bootstrap::Helpers;
use super::codec;
use super::reference::{HostRef, HostTarget, Resolved};
use super::stash::StashEntry;
use super::Scope;
use crate::core::{BridgeError, BridgeResult, MarshalError};
use crate::host::{HostValue, PropertyKey, ScriptObject, WrapperId};

const LOG_TARGET: &str = "script_bridge::stash";

impl<'js> Scope<'js> {
    /// 宿主值转换为引擎值
    ///
    /// 宿主对象先查按类型注册的转换。
    pub fn to_engine(&self, value: &HostValue) -> BridgeResult<Value<'js>> {
        if let HostValue::Object(object) = value {
            if let Some(coerced) = self.coerce_host(&**object)? {
                return self.encode_value(&coerced);
            }
        }
        self.encode_value(value)
    }

    fn encode_value(&self, value: &HostValue) -> BridgeResult<Value<'js>> {
        if let Some(encoded) = codec::encode(self.ctx(), value) {
            return encoded;
        }
        match value {
            HostValue::Json(text) => self
                .helpers()?
                .parse(text)
                .map_err(|e| match self.engine_error(e) {
                    BridgeError::Script(s) => MarshalError::InvalidJson(s.message().to_string()).into(),
                    other => other,
                }),
            HostValue::Script(object) if object.bridge_id() == self.bridge_id() => {
                self.pinned(object)
            }
            // 其他桥接的对象不能直接解包，作为宿主对象代理
            HostValue::Script(object) => self.proxy(HostTarget::Object {
                value: value.clone(),
                capability: Rc::new(object.clone()),
            }),
            HostValue::Record(record) => self.proxy(HostTarget::Object {
                value: value.clone(),
                capability: Rc::new(record.adapter()),
            }),
            HostValue::Object(object) => self.proxy(HostTarget::Object {
                value: value.clone(),
                capability: object.clone(),
            }),
            other => Err(MarshalError::Unsupported(other.kind()).into()),
        }
    }

    /// 引擎值转换为宿主值
    ///
    /// 对象先包装，再按构造函数名查找转换。
    pub fn to_host(&self, value: Value<'js>) -> BridgeResult<HostValue> {
        if let Some(primitive) = codec::decode(&value)? {
            return Ok(primitive);
        }
        let Some(object) = value.as_object().cloned() else {
            return Err(MarshalError::Unsupported("engine").into());
        };
        let helpers = self.helpers()?;
        let engine = |e| self.engine_error(e);

        if let Some(slot) = helpers.payload(&value).map_err(engine)? {
            return match self.resolve_slot(slot) {
                Resolved::Target(target) => Ok(target.value()),
                _ => Err(MarshalError::Unsupported("released host object").into()),
            };
        }

        let coercion = if self.has_script_coercions() {
            helpers
                .constructor_name(&value)
                .map_err(engine)?
                .and_then(|name| self.script_coercion(&name))
        } else {
            None
        };
        let wrapped = self.wrap_object(&helpers, value, object)?;
        match (coercion, wrapped) {
            (Some(coerce), HostValue::Script(wrapper)) => coerce(self, wrapper),
            (_, wrapped) => Ok(wrapped),
        }
    }

    fn wrap_object(
        &self,
        helpers: &Helpers<'js>,
        value: Value<'js>,
        object: Object<'js>,
    ) -> BridgeResult<HostValue> {
        let engine = |e| self.engine_error(e);

        if let Some(key) = helpers.identity(&value).map_err(engine)? {
            let id = WrapperId(key);
            match self.resolve_wrapper(id) {
                Resolved::Wrapper(wrapper) => return Ok(HostValue::Script(wrapper)),
                _ => {
                    tracing::debug!(target: LOG_TARGET, id = key, "Dead wrapper link, re-creating");
                    self.evict_wrapper(id);
                }
            }
        }

        if let Some(view) = helpers.bytes(&value).map_err(engine)? {
            return codec::decode_bytes(&view).map(HostValue::Buffer);
        }

        let wrapper = {
            let mut state = self.shared().state.borrow_mut();
            let id = state.stash.next_key();
            let wrapper = ScriptObject::new(id, self.shared());
            let pinned = Persistent::save(self.ctx(), object);
            state.stash.intern(id, StashEntry::new(pinned, HostRef::weak(&wrapper)));
            wrapper
        };
        helpers.link(&value, wrapper.id().0).map_err(engine)?;
        tracing::trace!(target: LOG_TARGET, id = wrapper.id().0, "Interned engine object");
        Ok(HostValue::Script(wrapper))
    }

    /// 本桥接包装对应的引擎对象
    pub(crate) fn pinned(&self, object: &ScriptObject) -> BridgeResult<Value<'js>> {
        let saved = self
            .shared()
            .state
            .borrow()
            .stash
            .lookup(object.id())
            .map(|entry| entry.value.clone());
        match saved {
            Some(saved) => saved
                .restore(self.ctx())
                .map(|object| object.into_value())
                .map_err(|e| self.engine_error(e)),
            None => Err(MarshalError::StaleReference(object.id()).into()),
        }
    }

    fn resolve_wrapper(&self, id: WrapperId) -> Resolved {
        match self.shared().state.borrow().stash.lookup(id) {
            Some(entry) => entry.host.resolve(),
            None => Resolved::Dead,
        }
    }

    /// 移除固定表条目并解除身份关联；条目不存在时是无操作
    pub(crate) fn evict_wrapper(&self, id: WrapperId) {
        let entry = self.shared().state.borrow_mut().stash.evict(id);
        let Some(entry) = entry else {
            return;
        };
        if let Ok(helpers) = self.helpers() {
            let unlinked = entry
                .value
                .clone()
                .restore(self.ctx())
                .and_then(|object| helpers.unlink(&object.into_value(), id.0));
            if unlinked.is_err() {
                let _ = self.ctx().catch();
            }
        }
        tracing::trace!(target: LOG_TARGET, id = id.0, "Evicted stash entry");
    }

    /// 处理终结队列：已释放的代理槽位和已释放的包装
    pub(crate) fn reap(&self) {
        let shared = self.shared();
        let released: Vec<_> = shared.released_queue().try_iter().collect();
        if !released.is_empty() {
            let dropped: Vec<_> = {
                let mut state = shared.state.borrow_mut();
                released
                    .into_iter()
                    .filter_map(|slot| state.refs.release(slot))
                    .collect()
            };
            tracing::trace!(target: LOG_TARGET, count = dropped.len(), "Released host slots");
            drop(dropped);
        }
        let finalized: Vec<_> = shared.finalized_queue().try_iter().collect();
        for id in finalized {
            self.evict_wrapper(id);
        }
    }

    pub(crate) fn key_value(&self, key: &PropertyKey) -> BridgeResult<Value<'js>> {
        match key {
            PropertyKey::Name(name) => self.to_engine(&HostValue::String(name.clone())),
            PropertyKey::Index(index) => match i32::try_from(*index) {
                Ok(index) => Ok(Value::new_int(self.ctx().clone(), index)),
                Err(_) => Ok(Value::new_float(self.ctx().clone(), *index as f64)),
            },
            PropertyKey::Value(value) => self.to_engine(value),
        }
    }

    pub(crate) fn engine_args(&self, args: &[HostValue]) -> BridgeResult<Array<'js>> {
        let array = Array::new(self.ctx().clone()).map_err(|e| self.engine_error(e))?;
        for (index, arg) in args.iter().enumerate() {
            let value = self.to_engine(arg)?;
            array.set(index, value).map_err(|e| self.engine_error(e))?;
        }
        Ok(array)
    }
}
