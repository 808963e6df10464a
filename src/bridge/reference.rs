//! 宿主对象引用
//!
//! 强引用槽位保存代理给引擎的宿主对象，生命周期由引擎端决定；弱引用指向引擎对象的宿主包装，
//! 生命周期由宿主端决定。每次使用都重新检查弱引用是否存活。

use std::collections::HashMap;
use std::rc::{Rc, Weak};

use crossbeam_channel::Sender;

use super::{BridgeShared, Scope};
use crate::core::{BridgeError, BridgeResult};
use crate::host::script_object::WrapperInner;
use crate::host::{HostObject, HostObjectRef, HostValue, ScriptObject};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct SlotId(pub u64);

/// 代理的目标
#[derive(Clone)]
pub(crate) enum HostTarget {
    Object {
        value: HostValue,
        capability: HostObjectRef,
    },
    /// 抛入引擎的宿主错误，挂在引擎 Error 的隐藏属性上
    Error(Rc<BridgeError>),
}

impl HostTarget {
    pub fn capability(&self) -> HostObjectRef {
        match self {
            HostTarget::Object { capability, .. } => capability.clone(),
            HostTarget::Error(error) => Rc::new(ErrorView(error.clone())),
        }
    }

    pub fn value(&self) -> HostValue {
        match self {
            HostTarget::Object { value, .. } => value.clone(),
            HostTarget::Error(error) => HostValue::Object(Rc::new(ErrorView(error.clone()))),
        }
    }
}

struct ErrorView(Rc<BridgeError>);

impl HostObject for ErrorView {
    fn get(&self, _scope: &Scope<'_>, key: &HostValue) -> BridgeResult<HostValue> {
        match key.as_str() {
            Some("message") => Ok(HostValue::String(self.0.message())),
            _ => Ok(HostValue::Undefined),
        }
    }
}

pub(crate) enum HostRef {
    Strong(HostTarget),
    Weak(Weak<WrapperInner>),
}

pub(crate) enum Resolved {
    Target(HostTarget),
    Wrapper(ScriptObject),
    Dead,
}

impl HostRef {
    pub fn weak(wrapper: &ScriptObject) -> Self {
        HostRef::Weak(wrapper.downgrade())
    }

    #[cfg(test)]
    pub fn dead() -> Self {
        HostRef::Weak(Weak::new())
    }

    /// 返回新的强引用，只在当前操作期间持有
    pub fn resolve(&self) -> Resolved {
        match self {
            HostRef::Strong(target) => Resolved::Target(target.clone()),
            HostRef::Weak(weak) => match weak.upgrade() {
                Some(inner) => Resolved::Wrapper(ScriptObject::from_inner(inner)),
                None => Resolved::Dead,
            },
        }
    }
}

/// 强引用槽位表
#[derive(Default)]
pub(crate) struct ReferenceTable {
    slots: HashMap<SlotId, HostRef>,
    next_id: u64,
}

impl ReferenceTable {
    pub fn wrap_host_strong(&mut self, target: HostTarget) -> SlotId {
        self.next_id += 1;
        let id = SlotId(self.next_id);
        self.slots.insert(id, HostRef::Strong(target));
        id
    }

    pub fn resolve(&self, id: SlotId) -> Resolved {
        self.slots
            .get(&id)
            .map(HostRef::resolve)
            .unwrap_or(Resolved::Dead)
    }

    /// 重复释放是无操作
    pub fn release(&mut self, id: SlotId) -> Option<HostRef> {
        self.slots.remove(&id)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn clear(&mut self) -> Vec<HostRef> {
        self.slots.drain().map(|(_, slot)| slot).collect()
    }
}

/// 代理函数持有的载荷
///
/// 引擎回收代理时释放闭包，`Drop` 把槽位标识放入释放队列，真正的释放在下一次进入上下文时进行。
pub(crate) struct ProxyPayload {
    pub slot: SlotId,
    pub shared: Weak<BridgeShared>,
    released: Sender<SlotId>,
}

impl ProxyPayload {
    pub fn new(slot: SlotId, shared: &Rc<BridgeShared>) -> Self {
        Self {
            slot,
            shared: Rc::downgrade(shared),
            released: shared.released_sender(),
        }
    }
}

impl Drop for ProxyPayload {
    fn drop(&mut self) {
        tracing::trace!(target: "script_bridge::proxy", slot = self.slot.0, "Proxy finalized");
        let _ = self.released.send(self.slot);
    }
}
