//! 宿主端对象模型
//!
//! - [`HostValue`]: 跨越边界的值
//! - [`HostObject`]: 代理给引擎的宿主对象能力接口
//! - [`Record`]: 以反射适配器暴露给脚本的纯数据记录
//! - [`ScriptObject`]: 引擎对象在宿主端的包装

pub mod object;
pub mod record;
pub mod script_object;
pub mod value;

pub use object::{AsAny, HostFunction, HostObject, HostObjectRef};
pub use record::Record;
pub use script_object::{ScriptObject, WrapperId};
pub use value::{FromHost, HostValue, PropertyKey};
