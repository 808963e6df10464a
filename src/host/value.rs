//! 宿主端值模型

use std::fmt;
use std::rc::Rc;

use super::object::{HostFunction, HostObject, HostObjectRef};
use super::record::Record;
use super::script_object::ScriptObject;
use crate::bridge::Scope;
use crate::core::{BridgeError, BridgeResult, MarshalError};

/// 跨越边界的宿主端值
///
/// 原始值按值复制；`Object` 与 `Record` 以共享引用传递，代理给引擎时保持强引用；
/// `Script` 是引擎对象在宿主端的包装。
///
/// `Null` 与 `Undefined` 进入引擎时分别是 `null` 和 `undefined`；比较时两者相等。
#[derive(Clone)]
pub enum HostValue {
    Null,
    Undefined,
    Bool(bool),
    Int(i32),
    Long(i64),
    Double(f64),
    String(String),
    /// 字节缓冲区，跨越边界时深拷贝
    Buffer(Vec<u8>),
    /// JSON 文本，进入引擎时按 `JSON.parse` 解析
    Json(String),
    Record(Record),
    Object(HostObjectRef),
    Script(ScriptObject),
}

impl HostValue {
    pub fn object<T: HostObject + 'static>(object: T) -> Self {
        HostValue::Object(Rc::new(object))
    }

    pub fn function<F>(name: &str, body: F) -> Self
    where
        F: Fn(&Scope<'_>, HostValue, Vec<HostValue>) -> BridgeResult<HostValue> + 'static,
    {
        HostValue::Object(Rc::new(HostFunction::new(name, body)))
    }

    pub fn json(text: impl Into<String>) -> Self {
        HostValue::Json(text.into())
    }

    pub fn kind(&self) -> &'static str {
        match self {
            HostValue::Null => "null",
            HostValue::Undefined => "undefined",
            HostValue::Bool(_) => "bool",
            HostValue::Int(_) => "int",
            HostValue::Long(_) => "long",
            HostValue::Double(_) => "double",
            HostValue::String(_) => "string",
            HostValue::Buffer(_) => "buffer",
            HostValue::Json(_) => "json",
            HostValue::Record(_) => "record",
            HostValue::Object(_) => "object",
            HostValue::Script(_) => "script object",
        }
    }

    /// `null` 或 `undefined`
    pub fn is_null(&self) -> bool {
        matches!(self, HostValue::Null | HostValue::Undefined)
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, HostValue::Undefined)
    }

    pub fn is_primitive(&self) -> bool {
        matches!(
            self,
            HostValue::Null
                | HostValue::Undefined
                | HostValue::Bool(_)
                | HostValue::Int(_)
                | HostValue::Long(_)
                | HostValue::Double(_)
                | HostValue::String(_)
                | HostValue::Buffer(_)
        )
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            HostValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            HostValue::Int(i) => Some(*i),
            HostValue::Long(l) => i32::try_from(*l).ok(),
            HostValue::Double(d) if d.fract() == 0.0 && *d >= i32::MIN as f64 && *d <= i32::MAX as f64 => {
                Some(*d as i32)
            }
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            HostValue::Int(i) => Some(*i as f64),
            HostValue::Long(l) => Some(*l as f64),
            HostValue::Double(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            HostValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            HostValue::Buffer(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_script(&self) -> Option<&ScriptObject> {
        match self {
            HostValue::Script(s) => Some(s),
            _ => None,
        }
    }

    /// 按目标类型转换，见 [`FromHost`]
    pub fn coerce<T: FromHost>(self) -> BridgeResult<T> {
        T::from_host(self)
    }

    fn mismatch(&self, expected: &'static str) -> BridgeError {
        MarshalError::TypeMismatch {
            expected,
            found: self.kind().to_string(),
        }
        .into()
    }
}

impl PartialEq for HostValue {
    fn eq(&self, other: &Self) -> bool {
        use HostValue::*;
        match (self, other) {
            (Null | Undefined, Null | Undefined) => true,
            (Bool(a), Bool(b)) => a == b,
            (String(a), String(b)) => a == b,
            (Buffer(a), Buffer(b)) => a == b,
            (Json(a), Json(b)) => a == b,
            (Record(a), Record(b)) => a.ptr_eq(b),
            (Object(a), Object(b)) => Rc::as_ptr(a) as *const () == Rc::as_ptr(b) as *const (),
            (Script(a), Script(b)) => a == b,
            (Int(a), Int(b)) => a == b,
            (Long(a), Long(b)) => a == b,
            // 引擎把整数值的浮点数规范为整数，数值比较跨越表示形式
            _ => match (self.as_f64(), other.as_f64()) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            },
        }
    }
}

impl fmt::Debug for HostValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostValue::Null => f.write_str("Null"),
            HostValue::Undefined => f.write_str("Undefined"),
            HostValue::Bool(b) => write!(f, "Bool({})", b),
            HostValue::Int(i) => write!(f, "Int({})", i),
            HostValue::Long(l) => write!(f, "Long({})", l),
            HostValue::Double(d) => write!(f, "Double({})", d),
            HostValue::String(s) => write!(f, "String({:?})", s),
            HostValue::Buffer(b) => write!(f, "Buffer({} bytes)", b.len()),
            HostValue::Json(s) => write!(f, "Json({})", s),
            HostValue::Record(r) => write!(f, "Record({})", r.to_value()),
            HostValue::Object(_) => f.write_str("Object(..)"),
            HostValue::Script(s) => write!(f, "{:?}", s),
        }
    }
}

impl From<bool> for HostValue {
    fn from(v: bool) -> Self {
        HostValue::Bool(v)
    }
}

impl From<i32> for HostValue {
    fn from(v: i32) -> Self {
        HostValue::Int(v)
    }
}

impl From<i64> for HostValue {
    fn from(v: i64) -> Self {
        HostValue::Long(v)
    }
}

impl From<f64> for HostValue {
    fn from(v: f64) -> Self {
        HostValue::Double(v)
    }
}

impl From<&str> for HostValue {
    fn from(v: &str) -> Self {
        HostValue::String(v.to_string())
    }
}

impl From<String> for HostValue {
    fn from(v: String) -> Self {
        HostValue::String(v)
    }
}

impl From<Vec<u8>> for HostValue {
    fn from(v: Vec<u8>) -> Self {
        HostValue::Buffer(v)
    }
}

impl From<ScriptObject> for HostValue {
    fn from(v: ScriptObject) -> Self {
        HostValue::Script(v)
    }
}

impl From<Record> for HostValue {
    fn from(v: Record) -> Self {
        HostValue::Record(v)
    }
}

impl<T: Into<HostValue>> From<Option<T>> for HostValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(HostValue::Null)
    }
}

/// 属性键：名称、数组下标或任意值
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyKey {
    Name(String),
    Index(u32),
    Value(HostValue),
}

impl From<&str> for PropertyKey {
    fn from(v: &str) -> Self {
        PropertyKey::Name(v.to_string())
    }
}

impl From<String> for PropertyKey {
    fn from(v: String) -> Self {
        PropertyKey::Name(v)
    }
}

impl From<u32> for PropertyKey {
    fn from(v: u32) -> Self {
        PropertyKey::Index(v)
    }
}

impl From<HostValue> for PropertyKey {
    fn from(v: HostValue) -> Self {
        match v {
            HostValue::String(s) => PropertyKey::Name(s),
            HostValue::Int(i) if i >= 0 => PropertyKey::Index(i as u32),
            other => PropertyKey::Value(other),
        }
    }
}

// ============================================================================
// 类型转换
// ============================================================================

/// 从 [`HostValue`] 转换为具体类型
///
/// 数值类型接受可解析的数字字符串；`String` 接受任意原始值。
pub trait FromHost: Sized {
    fn from_host(value: HostValue) -> BridgeResult<Self>;
}

impl FromHost for HostValue {
    fn from_host(value: HostValue) -> BridgeResult<Self> {
        Ok(value)
    }
}

impl FromHost for bool {
    fn from_host(value: HostValue) -> BridgeResult<Self> {
        value.as_bool().ok_or_else(|| value.mismatch("bool"))
    }
}

impl FromHost for i32 {
    fn from_host(value: HostValue) -> BridgeResult<Self> {
        if let HostValue::String(s) = &value {
            if let Ok(parsed) = s.trim().parse() {
                return Ok(parsed);
            }
        }
        value.as_i32().ok_or_else(|| value.mismatch("i32"))
    }
}

impl FromHost for i64 {
    fn from_host(value: HostValue) -> BridgeResult<Self> {
        match &value {
            HostValue::Int(i) => Ok(*i as i64),
            HostValue::Long(l) => Ok(*l),
            HostValue::Double(d) if d.fract() == 0.0 && d.abs() <= 9_007_199_254_740_992.0 => {
                Ok(*d as i64)
            }
            HostValue::String(s) => s.trim().parse().map_err(|_| value.mismatch("i64")),
            _ => Err(value.mismatch("i64")),
        }
    }
}

impl FromHost for f64 {
    fn from_host(value: HostValue) -> BridgeResult<Self> {
        if let HostValue::String(s) = &value {
            if let Ok(parsed) = s.trim().parse() {
                return Ok(parsed);
            }
        }
        value.as_f64().ok_or_else(|| value.mismatch("f64"))
    }
}

impl FromHost for String {
    fn from_host(value: HostValue) -> BridgeResult<Self> {
        match value {
            HostValue::String(s) | HostValue::Json(s) => Ok(s),
            HostValue::Bool(b) => Ok(b.to_string()),
            HostValue::Int(i) => Ok(i.to_string()),
            HostValue::Long(l) => Ok(l.to_string()),
            HostValue::Double(d) => Ok(d.to_string()),
            other => Err(other.mismatch("string")),
        }
    }
}

impl FromHost for Vec<u8> {
    fn from_host(value: HostValue) -> BridgeResult<Self> {
        match value {
            HostValue::Buffer(b) => Ok(b),
            other => Err(other.mismatch("buffer")),
        }
    }
}

impl FromHost for ScriptObject {
    fn from_host(value: HostValue) -> BridgeResult<Self> {
        match value {
            HostValue::Script(s) => Ok(s),
            other => Err(other.mismatch("script object")),
        }
    }
}

impl<T: FromHost> FromHost for Option<T> {
    fn from_host(value: HostValue) -> BridgeResult<Self> {
        match value {
            HostValue::Null | HostValue::Undefined => Ok(None),
            other => T::from_host(other).map(Some),
        }
    }
}
