//! 宿主对象代理
//!
//! 引擎端对象是一个 `Proxy`，处理器把每个陷阱转发给同一个 Rust 分发函数。分发函数拥有
//! [`ProxyPayload`]，每次调用时重新解析槽位，得到的强引用只在本次陷阱调用期间持有。

use rquickjs::function::Rest;
use rquickjs::{Array, Ctx, Function, IntoJs, Value};

use super::bootstrap::{OP_APPLY, OP_CONSTRUCT, OP_GET, OP_HAS, OP_PAYLOAD, OP_SET};
use super::reference::{HostTarget, ProxyPayload, Resolved, SlotId};
use super::Scope;
use crate::core::{BridgeResult, HostException};
use crate::host::{HostObject, HostValue};

const LOG_TARGET: &str = "script_bridge::proxy";

impl<'js> Scope<'js> {
    /// 为宿主目标创建引擎代理，目标以强引用保存在槽位表中
    pub(crate) fn proxy(&self, target: HostTarget) -> BridgeResult<Value<'js>> {
        let slot = self.shared().state.borrow_mut().refs.wrap_host_strong(target);
        let payload = ProxyPayload::new(slot, self.shared());
        tracing::trace!(target: LOG_TARGET, slot = slot.0, "Proxy created");

        let handler = Function::new(
            self.ctx().clone(),
            move |ctx: Ctx<'js>, op: i32, args: Rest<Value<'js>>| dispatch(ctx, &payload, op, args.0),
        )
        .map_err(|e| self.engine_error(e))?;

        self.helpers()?
            .proxy(handler)
            .map_err(|e| self.engine_error(e))
    }

    pub(crate) fn resolve_slot(&self, slot: u64) -> Resolved {
        self.shared().state.borrow().refs.resolve(SlotId(slot))
    }

    fn trap(&self, op: i32, capability: &dyn HostObject, args: Vec<Value<'js>>) -> BridgeResult<Value<'js>> {
        let mut args = args.into_iter();
        let mut next = || {
            args.next()
                .unwrap_or_else(|| Value::new_undefined(self.ctx().clone()))
        };

        match op {
            OP_HAS => {
                let key = self.to_host(next())?;
                let found = capability.has(self, &key)?;
                Ok(Value::new_bool(self.ctx().clone(), found))
            }
            OP_GET => {
                let key = self.to_host(next())?;
                let value = capability.get(self, &key)?;
                self.to_engine(&value)
            }
            OP_SET => {
                let key = self.to_host(next())?;
                let value = self.to_host(next())?;
                let accepted = capability.set(self, &key, value)?;
                Ok(Value::new_bool(self.ctx().clone(), accepted))
            }
            OP_APPLY => {
                let this = self.to_host(next())?;
                let args = self.host_args(next())?;
                let result = capability.call(self, this, args)?;
                self.to_engine(&result)
            }
            OP_CONSTRUCT => {
                let args = self.host_args(next())?;
                let result = capability.construct(self, args)?;
                self.to_engine(&result)
            }
            other => Err(HostException::new(format!("unknown proxy operation {}", other)).into()),
        }
    }

    fn host_args(&self, list: Value<'js>) -> BridgeResult<Vec<HostValue>> {
        let array: Array<'js> = list.get().map_err(|e| self.engine_error(e))?;
        array
            .iter::<Value<'js>>()
            .map(|item| {
                item.map_err(|e| self.engine_error(e))
                    .and_then(|value| self.to_host(value))
            })
            .collect()
    }
}

fn dispatch<'js>(
    ctx: Ctx<'js>,
    payload: &ProxyPayload,
    op: i32,
    args: Vec<Value<'js>>,
) -> rquickjs::Result<Value<'js>> {
    let shared = match payload.shared.upgrade() {
        Some(shared) if !shared.is_closed() => shared,
        _ => {
            return Err(match "script bridge is closed".into_js(&ctx) {
                Ok(message) => ctx.throw(message),
                Err(err) => err,
            })
        }
    };
    if op == OP_PAYLOAD {
        return Ok(Value::new_float(ctx, payload.slot.0 as f64));
    }

    let scope = Scope::new(ctx, shared);
    tracing::trace!(target: LOG_TARGET, op, slot = payload.slot.0, "Proxy trap");

    // 在使用点重新解析，强引用在本次调用结束时释放
    let target = match scope.resolve_slot(payload.slot.0) {
        Resolved::Target(target) => target,
        _ => {
            let err = HostException::new("host object has been released").into();
            return Err(scope.throw_host(err));
        }
    };
    let capability = target.capability();
    scope
        .trap(op, capability.as_ref(), args)
        .map_err(|err| scope.throw_host(err))
}
