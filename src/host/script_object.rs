//! 引擎对象在宿主端的包装
//!
//! `ScriptObject` 的克隆共享同一个内部记录；最后一个克隆被释放时，`Drop` 把标识发送到
//! 所属桥接的终结队列，引擎端的固定引用在下一次进入上下文时释放。

use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::{Rc, Weak};

use crossbeam_channel::Sender;
use serde::Serialize;

use super::object::HostObject;
use super::value::{HostValue, PropertyKey};
use crate::bridge::{self, BridgeId, BridgeShared, CallFacade, Scope};
use crate::core::{BridgeError, BridgeResult};

/// 包装对象标识，同时是固定表中的键
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct WrapperId(pub(crate) u64);

impl WrapperId {
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for WrapperId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

pub(crate) struct WrapperInner {
    id: WrapperId,
    bridge_id: BridgeId,
    bridge: Weak<BridgeShared>,
    finalized: Sender<WrapperId>,
}

impl Drop for WrapperInner {
    fn drop(&mut self) {
        // 桥接已关闭时接收端不存在，发送失败可以忽略
        let _ = self.finalized.send(self.id);
    }
}

/// 引擎对象的宿主端包装
#[derive(Clone)]
pub struct ScriptObject {
    inner: Rc<WrapperInner>,
}

impl ScriptObject {
    pub(crate) fn new(id: WrapperId, shared: &Rc<BridgeShared>) -> Self {
        Self {
            inner: Rc::new(WrapperInner {
                id,
                bridge_id: shared.id(),
                bridge: Rc::downgrade(shared),
                finalized: shared.finalized_sender(),
            }),
        }
    }

    pub(crate) fn from_inner(inner: Rc<WrapperInner>) -> Self {
        Self { inner }
    }

    pub(crate) fn downgrade(&self) -> Weak<WrapperInner> {
        Rc::downgrade(&self.inner)
    }

    pub fn id(&self) -> WrapperId {
        self.inner.id
    }

    pub fn bridge_id(&self) -> BridgeId {
        self.inner.bridge_id
    }

    /// 所属桥接仍然存活且未关闭
    pub fn is_attached(&self) -> bool {
        self.inner
            .bridge
            .upgrade()
            .map(|shared| !shared.is_closed())
            .unwrap_or(false)
    }

    pub(crate) fn owner(&self) -> BridgeResult<Rc<BridgeShared>> {
        match self.inner.bridge.upgrade() {
            Some(shared) if !shared.is_closed() => Ok(shared),
            _ => Err(BridgeError::ContextClosed),
        }
    }

    pub fn get(&self, facade: &dyn CallFacade, key: impl Into<PropertyKey>) -> BridgeResult<HostValue> {
        facade.get_key(self, key.into())
    }

    pub fn set(
        &self,
        facade: &dyn CallFacade,
        key: impl Into<PropertyKey>,
        value: impl Into<HostValue>,
    ) -> BridgeResult<bool> {
        facade.set_key(self, key.into(), &value.into())
    }

    pub fn call(&self, facade: &dyn CallFacade, args: &[HostValue]) -> BridgeResult<HostValue> {
        facade.call(self, args)
    }

    /// 在所属桥接中执行；当前作用域属于同一桥接时直接复用
    fn with_owner<R>(
        &self,
        scope: &Scope<'_>,
        f: impl for<'a> FnOnce(&Scope<'a>) -> BridgeResult<R>,
    ) -> BridgeResult<R> {
        if scope.bridge_id() == self.bridge_id() {
            return f(scope);
        }
        let owner = self.owner()?;
        bridge::enter_nested(&owner, f)
    }
}

impl PartialEq for ScriptObject {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for ScriptObject {}

impl Hash for ScriptObject {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::ptr::hash(Rc::as_ptr(&self.inner), state)
    }
}

impl fmt::Debug for ScriptObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptObject")
            .field("id", &self.inner.id)
            .field("bridge", &self.inner.bridge_id)
            .finish()
    }
}

/// 其他桥接中的脚本对象以宿主对象的身份被代理
impl HostObject for ScriptObject {
    fn has(&self, scope: &Scope<'_>, key: &HostValue) -> BridgeResult<bool> {
        self.with_owner(scope, |owner| owner.has_key(self, PropertyKey::from(key.clone())))
    }

    fn get(&self, scope: &Scope<'_>, key: &HostValue) -> BridgeResult<HostValue> {
        self.with_owner(scope, |owner| owner.get_key(self, PropertyKey::from(key.clone())))
    }

    fn set(&self, scope: &Scope<'_>, key: &HostValue, value: HostValue) -> BridgeResult<bool> {
        self.with_owner(scope, |owner| {
            owner.set_key(self, PropertyKey::from(key.clone()), &value)
        })
    }

    fn call(&self, scope: &Scope<'_>, this: HostValue, args: Vec<HostValue>) -> BridgeResult<HostValue> {
        self.with_owner(scope, |owner| owner.call_method(self, &this, &args))
    }

    fn construct(&self, scope: &Scope<'_>, args: Vec<HostValue>) -> BridgeResult<HostValue> {
        self.with_owner(scope, |owner| owner.call_constructor(self, &args))
    }
}
