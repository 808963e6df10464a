//! 跨运行时引用桥接
//!
//! 一个 [`Bridge`] 绑定一个 QuickJS 运行时和上下文。宿主端通过 [`CallFacade`] 调用引擎，
//! 引擎端通过代理对象回调宿主对象；回调拿到的 [`Scope`] 同样实现 `CallFacade`，
//! 用于嵌套调用。
//!
//! 所有权规则：
//! - 引擎对象被宿主包装期间由固定表中的 `Persistent` 固定
//! - 宿主对象被代理期间由槽位表中的强引用保持
//! - 两侧的终结都只向队列发送标识，真正的清理在下一次进入上下文时进行

use std::cell::{Cell, RefCell};
use std::ptr::NonNull;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};
use rquickjs::{qjs, Context, Ctx, Object, Persistent, Runtime};
use serde::Serialize;

pub mod codec;
mod bootstrap;
mod coercion;
mod exception;
pub mod facade;
mod marshal;
mod proxy;
mod reference;
mod stash;

pub use facade::{CallFacade, DebugHook};

use crate::config::{BridgeConfig, EngineKind};
use crate::core::{BridgeError, BridgeResult};
use crate::host::{HostObject, HostValue, ScriptObject, WrapperId};
use bootstrap::Helpers;
use coercion::Coercions;
use reference::{ReferenceTable, SlotId};
use stash::IdentityTable;

const LOG_TARGET: &str = "script_bridge::bridge";
const JOBS_TARGET: &str = "script_bridge::jobs";

static NEXT_BRIDGE_ID: AtomicU64 = AtomicU64::new(1);

/// 桥接实例标识；身份按实例隔离
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct BridgeId(u64);

impl BridgeId {
    fn next() -> Self {
        BridgeId(NEXT_BRIDGE_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

/// 桥接运行统计
#[derive(Debug, Clone, Serialize)]
pub struct BridgeStats {
    /// 固定表中的引擎对象数
    pub stashed_objects: usize,
    /// 被代理的宿主对象数
    pub host_references: usize,
    /// 尚未处理的终结通知
    pub pending_finalizations: usize,
    /// 累计脚本执行时间
    pub script_time: Duration,
    /// 引擎堆已用字节
    pub heap_size: i64,
}

#[derive(Default)]
pub(crate) struct EngineState {
    helpers: Option<Persistent<Object<'static>>>,
    pub(crate) stash: IdentityTable,
    pub(crate) refs: ReferenceTable,
}

/// 桥接共享状态
///
/// 字段按释放顺序排列：引擎状态中的 `Persistent` 先于上下文，上下文先于运行时。
pub(crate) struct BridgeShared {
    pub(crate) state: RefCell<EngineState>,
    id: BridgeId,
    config: BridgeConfig,
    finalized_tx: Sender<WrapperId>,
    finalized_rx: Receiver<WrapperId>,
    released_tx: Sender<SlotId>,
    released_rx: Receiver<SlotId>,
    depth: Cell<u32>,
    /// 运行中的上下文，只在 `depth > 0` 期间有值
    active: Cell<Option<NonNull<qjs::JSContext>>>,
    closed: Cell<bool>,
    torn_down: Cell<bool>,
    script_time: Cell<Duration>,
    coercions: RefCell<Coercions>,
    debug_hook: RefCell<Option<Box<dyn DebugHook>>>,
    context: Context,
    runtime: Runtime,
}

impl BridgeShared {
    pub(crate) fn id(&self) -> BridgeId {
        self.id
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.get()
    }

    pub(crate) fn finalized_sender(&self) -> Sender<WrapperId> {
        self.finalized_tx.clone()
    }

    pub(crate) fn released_sender(&self) -> Sender<SlotId> {
        self.released_tx.clone()
    }

    pub(crate) fn finalized_queue(&self) -> &Receiver<WrapperId> {
        &self.finalized_rx
    }

    pub(crate) fn released_queue(&self) -> &Receiver<SlotId> {
        &self.released_rx
    }

    fn begin(&self, operation: &'static str) -> BridgeResult<EntryGuard<'_>> {
        if self.closed.get() {
            return Err(BridgeError::ContextClosed);
        }
        if self.depth.get() > 0 {
            tracing::warn!(target: LOG_TARGET, operation, "Re-entrant bridge call rejected");
            return Err(BridgeError::ContextBusy(
                "bridge is already running; use the scope passed to the host callback",
            ));
        }
        self.depth.set(self.depth.get() + 1);
        Ok(EntryGuard {
            shared: self,
            started: Instant::now(),
        })
    }

    /// 释放所有固定的引擎对象和宿主引用；只执行一次
    fn teardown(&self) {
        if self.torn_down.replace(true) {
            return;
        }
        let (helpers, stash, refs) = {
            let mut state = self.state.borrow_mut();
            (state.helpers.take(), state.stash.clear(), state.refs.clear())
        };
        tracing::info!(
            target: LOG_TARGET,
            bridge = self.id.0,
            stashed = stash.len(),
            host_references = refs.len(),
            "Bridge context closed"
        );
        drop(helpers);
        drop(stash);
        drop(refs);
        self.debug_hook.borrow_mut().take();
        self.finalized_rx.try_iter().for_each(drop);
        self.released_rx.try_iter().for_each(drop);
    }
}

struct EntryGuard<'a> {
    shared: &'a BridgeShared,
    started: Instant,
}

impl Drop for EntryGuard<'_> {
    fn drop(&mut self) {
        let shared = self.shared;
        shared.depth.set(shared.depth.get() - 1);
        shared
            .script_time
            .set(shared.script_time.get() + self.started.elapsed());
        // 运行期间请求的关闭在最外层调用结束后执行
        if shared.depth.get() == 0 && shared.closed.get() {
            shared.teardown();
        }
    }
}

/// 记录运行中的上下文，离开时恢复
struct ActiveContext<'a> {
    shared: &'a BridgeShared,
    previous: Option<NonNull<qjs::JSContext>>,
}

impl<'a> ActiveContext<'a> {
    fn set(shared: &'a BridgeShared, ctx: &Ctx<'_>) -> Self {
        let previous = shared.active.replace(Some(ctx.as_raw()));
        Self { shared, previous }
    }
}

impl Drop for ActiveContext<'_> {
    fn drop(&mut self) {
        self.shared.active.set(self.previous);
    }
}

/// 进入上下文执行 `f`；进入时先处理终结队列
pub(crate) fn enter<R>(
    shared: &Rc<BridgeShared>,
    f: impl for<'js> FnOnce(&Scope<'js>) -> BridgeResult<R>,
) -> BridgeResult<R> {
    let _guard = shared.begin("enter")?;
    shared.context.with(|ctx| {
        let _active = ActiveContext::set(shared, &ctx);
        let scope = Scope::new(ctx, shared.clone());
        scope.reap();
        f(&scope)
    })
}

/// 其他桥接代为访问本桥接的对象
///
/// 本桥接正在运行时（调用链经过另一个桥接又回到这里），复用运行中的上下文；
/// 否则正常进入。
pub(crate) fn enter_nested<R>(
    shared: &Rc<BridgeShared>,
    f: impl for<'js> FnOnce(&Scope<'js>) -> BridgeResult<R>,
) -> BridgeResult<R> {
    let Some(raw) = shared.active.get() else {
        return enter(shared, f);
    };
    if shared.is_closed() {
        return Err(BridgeError::ContextClosed);
    }
    // SAFETY: `active` 只在外层 `context.with` 持有运行时锁期间有值，桥接不能跨线程，
    // 所以指针有效且锁仍被同一线程持有。`Ctx` 的生命周期受 `f` 的高阶约束，不会逃出本次调用。
    let ctx = unsafe { Ctx::from_raw(raw) };
    let scope = Scope::new(ctx, shared.clone());
    f(&scope)
}

/// 一次上下文进入期间的操作句柄
///
/// 宿主回调通过它读写引擎值或发起嵌套调用。句柄只在回调期间有效。
pub struct Scope<'js> {
    ctx: Ctx<'js>,
    shared: Rc<BridgeShared>,
}

impl<'js> Scope<'js> {
    pub(crate) fn new(ctx: Ctx<'js>, shared: Rc<BridgeShared>) -> Self {
        Self { ctx, shared }
    }

    pub fn bridge_id(&self) -> BridgeId {
        self.shared.id
    }

    pub(crate) fn ctx(&self) -> &Ctx<'js> {
        &self.ctx
    }

    pub(crate) fn shared(&self) -> &Rc<BridgeShared> {
        &self.shared
    }

    pub(crate) fn helpers(&self) -> BridgeResult<Helpers<'js>> {
        let saved = self
            .shared
            .state
            .borrow()
            .helpers
            .clone()
            .ok_or(BridgeError::ContextClosed)?;
        saved
            .restore(&self.ctx)
            .map(Helpers::new)
            .map_err(codec::engine_failure)
    }
}

/// 按配置选择引擎实现
pub fn open(config: BridgeConfig) -> BridgeResult<Box<dyn CallFacade>> {
    match config.engine {
        EngineKind::QuickJs => Ok(Box::new(Bridge::new(config)?)),
    }
}

/// QuickJS 桥接
///
/// 不能跨线程使用。释放时关闭上下文；仍然存活的 [`ScriptObject`] 随之失效。
pub struct Bridge {
    shared: Rc<BridgeShared>,
}

impl Bridge {
    pub fn new(config: BridgeConfig) -> BridgeResult<Self> {
        config.validate()?;

        let runtime = Runtime::new().map_err(|e| BridgeError::ResourceExhausted(e.to_string()))?;
        if let Some(limit) = config.runtime.memory_limit {
            runtime.set_memory_limit(limit);
        }
        runtime.set_max_stack_size(config.runtime.max_stack_size);
        if let Some(threshold) = config.runtime.gc_threshold {
            runtime.set_gc_threshold(threshold);
        }
        let context =
            Context::full(&runtime).map_err(|e| BridgeError::ResourceExhausted(e.to_string()))?;
        let helpers = context
            .with(|ctx| bootstrap::install(&ctx))
            .map_err(codec::engine_failure)?;

        let (finalized_tx, finalized_rx) = crossbeam_channel::unbounded();
        let (released_tx, released_rx) = crossbeam_channel::unbounded();
        let shared = Rc::new(BridgeShared {
            state: RefCell::new(EngineState {
                helpers: Some(helpers),
                ..Default::default()
            }),
            id: BridgeId::next(),
            config,
            finalized_tx,
            finalized_rx,
            released_tx,
            released_rx,
            depth: Cell::new(0),
            active: Cell::new(None),
            closed: Cell::new(false),
            torn_down: Cell::new(false),
            script_time: Cell::new(Duration::ZERO),
            coercions: RefCell::new(Coercions::default()),
            debug_hook: RefCell::new(None),
            context,
            runtime,
        });

        tracing::info!(target: LOG_TARGET, bridge = shared.id.0, "Bridge context created");
        Ok(Self { shared })
    }

    pub fn with_defaults() -> BridgeResult<Self> {
        Self::new(BridgeConfig::default())
    }

    pub fn id(&self) -> BridgeId {
        self.shared.id
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.shared.config
    }

    /// 进入上下文执行一组操作
    pub fn enter<R>(&self, f: impl for<'js> FnOnce(&Scope<'js>) -> BridgeResult<R>) -> BridgeResult<R> {
        enter(&self.shared, f)
    }

    pub fn global(&self) -> BridgeResult<ScriptObject> {
        self.enter(|scope| scope.global())
    }

    pub fn set_global_property(&self, name: &str, value: impl Into<HostValue>) -> BridgeResult<()> {
        let value = value.into();
        self.enter(|scope| scope.set_global_property(name, &value))
    }

    pub fn type_of(&self, value: &HostValue) -> BridgeResult<String> {
        self.enter(|scope| scope.type_of(value))
    }

    /// 引擎堆已用字节；上下文运行中或已关闭时返回 0
    pub fn heap_size(&self) -> i64 {
        if self.shared.depth.get() > 0 || self.shared.is_closed() {
            return 0;
        }
        self.shared.runtime.memory_usage().memory_used_size
    }

    /// 运行引擎 GC，然后处理由此产生的终结通知
    pub fn gc(&self) -> BridgeResult<()> {
        {
            let _guard = self.shared.begin("gc")?;
            self.shared.runtime.run_gc();
        }
        self.enter(|_| Ok(()))
    }

    pub fn has_pending_jobs(&self) -> bool {
        self.shared.depth.get() == 0
            && !self.shared.is_closed()
            && self.shared.runtime.is_job_pending()
    }

    pub fn stats(&self) -> BridgeStats {
        let state = self.shared.state.borrow();
        BridgeStats {
            stashed_objects: state.stash.len(),
            host_references: state.refs.len(),
            pending_finalizations: self.shared.finalized_rx.len() + self.shared.released_rx.len(),
            script_time: self.shared.script_time.get(),
            heap_size: self.heap_size(),
        }
    }

    pub fn reset_script_time(&self) {
        self.shared.script_time.set(Duration::ZERO);
    }

    fn drain_jobs(&self) -> BridgeResult<usize> {
        let shared = &self.shared;
        let _guard = shared.begin("run_pending_jobs")?;
        let budget = shared.config.jobs.max_jobs_per_drain;
        let mut executed = 0;

        while budget.map_or(true, |limit| executed < limit) {
            match shared.runtime.execute_pending_job() {
                Ok(true) => executed += 1,
                Ok(false) => break,
                Err(_) => {
                    executed += 1;
                    shared.context.with(|ctx| {
                        let scope = Scope::new(ctx, shared.clone());
                        let thrown = scope.ctx.catch();
                        let err = scope.error_from_thrown(thrown);
                        tracing::warn!(target: JOBS_TARGET, error = %err, "Pending job failed");
                    });
                }
            }
        }

        shared.context.with(|ctx| Scope::new(ctx, shared.clone()).reap());
        tracing::debug!(target: JOBS_TARGET, executed, "Drained pending jobs");
        Ok(executed)
    }

    // ========================================================================
    // 值转换
    // ========================================================================

    /// 注册宿主类型 `T` 进入引擎前的转换；同一类型再次注册会替换
    ///
    /// 转换结果按普通宿主值编组，不会再次转换。
    pub fn register_host_coercion<T, F>(&self, coerce: F)
    where
        T: HostObject + 'static,
        F: Fn(&T) -> BridgeResult<HostValue> + 'static,
    {
        let mut coercions = self.shared.coercions.borrow_mut();
        coercions.put_host::<T, F>(coerce);
        tracing::debug!(
            target: LOG_TARGET,
            host_type = std::any::type_name::<T>(),
            registered = coercions.len(),
            "Host coercion registered"
        );
    }

    /// 注册构造函数名为 `constructor` 的引擎对象回到宿主时的转换
    ///
    /// 钩子收到对象的包装，可以用 `Scope` 继续调用引擎。
    pub fn register_script_coercion<F>(&self, constructor: &str, coerce: F)
    where
        F: Fn(&Scope<'_>, ScriptObject) -> BridgeResult<HostValue> + 'static,
    {
        let mut coercions = self.shared.coercions.borrow_mut();
        coercions.put_script(constructor, coerce);
        tracing::debug!(target: LOG_TARGET, constructor, registered = coercions.len(), "Script coercion registered");
    }

    fn queue_finalized(&self, id: WrapperId) {
        let _ = self.shared.finalized_tx.send(id);
        if self.shared.depth.get() == 0 && !self.shared.is_closed() {
            let _ = self.enter(|_| Ok(()));
        }
    }

    // ========================================================================
    // 调试器
    // ========================================================================

    pub fn set_debug_hook(&self, hook: Box<dyn DebugHook>) {
        *self.shared.debug_hook.borrow_mut() = Some(hook);
    }

    pub fn wait_for_debugger(&self, connection: &str) -> BridgeResult<()> {
        match self.shared.debug_hook.borrow().as_ref() {
            Some(hook) => hook.attach(connection),
            None => {
                tracing::warn!(target: LOG_TARGET, connection, "No debugger hook installed");
                Ok(())
            }
        }
    }

    pub fn cooperate_debugger(&self) {
        if let Some(hook) = self.shared.debug_hook.borrow().as_ref() {
            hook.cooperate();
        }
    }

    pub fn is_debugging(&self) -> bool {
        self.shared
            .debug_hook
            .borrow()
            .as_ref()
            .map(|hook| hook.is_attached())
            .unwrap_or(false)
    }

    pub fn debugger_notify(&self, args: &[HostValue]) {
        if let Some(hook) = self.shared.debug_hook.borrow().as_ref() {
            hook.notify(args);
        }
    }

    // ========================================================================
    // 关闭
    // ========================================================================

    pub fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }

    /// 关闭上下文，释放所有固定的引擎对象和宿主引用；重复调用是无操作
    ///
    /// 在回调中调用时，释放推迟到最外层调用结束。
    pub fn close(&self) {
        let shared = &self.shared;
        if shared.closed.replace(true) {
            return;
        }
        if shared.depth.get() > 0 {
            tracing::warn!(target: LOG_TARGET, bridge = shared.id.0, "Bridge closed while running, release deferred");
            return;
        }
        shared.teardown();
    }
}

impl Drop for Bridge {
    fn drop(&mut self) {
        self.close();
    }
}
