//! 纯数据记录
//!
//! `Record` 是共享的 `serde_json::Value`。进入引擎时包装为按路径反射字段的适配器，
//! 脚本对字段的写入直接写回记录。

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Number, Value};

use super::object::HostObject;
use super::value::HostValue;
use crate::bridge::Scope;
use crate::core::{BridgeResult, HostException, MarshalError};

/// 共享的 JSON 数据记录
#[derive(Clone, Default)]
pub struct Record(Rc<RefCell<Value>>);

impl Record {
    pub fn new(value: Value) -> Self {
        Record(Rc::new(RefCell::new(value)))
    }

    pub fn from_serialize<T: Serialize>(value: &T) -> BridgeResult<Self> {
        let value =
            serde_json::to_value(value).map_err(|e| MarshalError::InvalidJson(e.to_string()))?;
        Ok(Self::new(value))
    }

    /// 当前内容的副本
    pub fn to_value(&self) -> Value {
        self.0.borrow().clone()
    }

    pub fn deserialize<T: DeserializeOwned>(&self) -> BridgeResult<T> {
        T::deserialize(&*self.0.borrow())
            .map_err(|e| MarshalError::InvalidJson(e.to_string()).into())
    }

    pub fn ptr_eq(&self, other: &Record) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn adapter(&self) -> RecordObject {
        RecordObject {
            root: self.clone(),
            path: Vec::new(),
        }
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Record({})", self.0.borrow())
    }
}

#[derive(Debug, Clone)]
enum Segment {
    Field(String),
    Index(usize),
}

/// 记录中某个节点的反射适配器
pub(crate) struct RecordObject {
    root: Record,
    path: Vec<Segment>,
}

impl RecordObject {
    fn child(&self, segment: Segment) -> RecordObject {
        let mut path = self.path.clone();
        path.push(segment);
        RecordObject {
            root: self.root.clone(),
            path,
        }
    }

    fn segment_for(node: &Value, key: &HostValue) -> Option<Segment> {
        match (node, key) {
            (Value::Object(_), HostValue::String(s)) => Some(Segment::Field(s.clone())),
            (Value::Object(_), HostValue::Int(i)) => Some(Segment::Field(i.to_string())),
            (Value::Array(_), HostValue::Int(i)) => usize::try_from(*i).ok().map(Segment::Index),
            (Value::Array(_), HostValue::String(s)) => s.parse().ok().map(Segment::Index),
            _ => None,
        }
    }

    fn leaf(&self, segment: Segment, value: &Value) -> HostValue {
        match value {
            Value::Null => HostValue::Null,
            Value::Bool(b) => HostValue::Bool(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => i32::try_from(i)
                    .map(HostValue::Int)
                    .unwrap_or(HostValue::Long(i)),
                None => HostValue::Double(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => HostValue::String(s.clone()),
            Value::Array(_) | Value::Object(_) => HostValue::object(self.child(segment)),
        }
    }
}

fn resolve<'a>(mut node: &'a Value, path: &[Segment]) -> Option<&'a Value> {
    for segment in path {
        node = match segment {
            Segment::Field(name) => node.get(name.as_str())?,
            Segment::Index(index) => node.get(*index)?,
        };
    }
    Some(node)
}

fn resolve_mut<'a>(mut node: &'a mut Value, path: &[Segment]) -> Option<&'a mut Value> {
    for segment in path {
        node = match segment {
            Segment::Field(name) => node.get_mut(name.as_str())?,
            Segment::Index(index) => node.get_mut(*index)?,
        };
    }
    Some(node)
}

fn is_length(key: &HostValue) -> bool {
    key.as_str() == Some("length")
}

/// 宿主值转换为 JSON；宿主对象与脚本对象不能放入记录
pub(crate) fn json_from_host(value: HostValue) -> BridgeResult<Value> {
    Ok(match value {
        HostValue::Null | HostValue::Undefined => Value::Null,
        HostValue::Bool(b) => Value::Bool(b),
        HostValue::Int(i) => Value::from(i),
        HostValue::Long(l) => Value::from(l),
        HostValue::Double(d) => Number::from_f64(d).map(Value::Number).unwrap_or(Value::Null),
        HostValue::String(s) => Value::String(s),
        HostValue::Buffer(bytes) => Value::Array(bytes.into_iter().map(Value::from).collect()),
        HostValue::Json(text) => serde_json::from_str(&text)
            .map_err(|e| MarshalError::InvalidJson(e.to_string()))?,
        HostValue::Record(record) => record.to_value(),
        other => return Err(MarshalError::Unsupported(other.kind()).into()),
    })
}

impl HostObject for RecordObject {
    fn has(&self, _scope: &Scope<'_>, key: &HostValue) -> BridgeResult<bool> {
        let root = self.root.0.borrow();
        let Some(node) = resolve(&root, &self.path) else {
            return Ok(false);
        };
        if node.is_array() && is_length(key) {
            return Ok(true);
        }
        Ok(match Self::segment_for(node, key) {
            Some(segment) => resolve(node, std::slice::from_ref(&segment)).is_some(),
            None => false,
        })
    }

    fn get(&self, _scope: &Scope<'_>, key: &HostValue) -> BridgeResult<HostValue> {
        let root = self.root.0.borrow();
        let Some(node) = resolve(&root, &self.path) else {
            return Ok(HostValue::Undefined);
        };
        if let (Value::Array(items), true) = (node, is_length(key)) {
            return Ok(HostValue::Int(items.len() as i32));
        }
        let Some(segment) = Self::segment_for(node, key) else {
            return Ok(HostValue::Undefined);
        };
        Ok(match resolve(node, std::slice::from_ref(&segment)) {
            Some(child) => self.leaf(segment, child),
            None => HostValue::Undefined,
        })
    }

    fn set(&self, _scope: &Scope<'_>, key: &HostValue, value: HostValue) -> BridgeResult<bool> {
        let mut root = self.root.0.borrow_mut();
        let Some(node) = resolve_mut(&mut root, &self.path) else {
            return Ok(false);
        };
        if let (Value::Array(items), true) = (&mut *node, is_length(key)) {
            let len = value
                .as_i32()
                .and_then(|n| usize::try_from(n).ok())
                .ok_or_else(|| HostException::new("invalid array length"))?;
            items.resize(len, Value::Null);
            return Ok(true);
        }
        let Some(segment) = Self::segment_for(node, key) else {
            return Ok(false);
        };
        let value = json_from_host(value)?;
        match (node, segment) {
            (Value::Object(fields), Segment::Field(name)) => {
                fields.insert(name, value);
            }
            (Value::Array(items), Segment::Index(index)) => {
                if index < items.len() {
                    items[index] = value;
                } else if index == items.len() {
                    items.push(value);
                } else {
                    return Err(HostException::new(format!(
                        "index {} out of range for array of length {}",
                        index,
                        items.len()
                    ))
                    .into());
                }
            }
            _ => return Ok(false),
        }
        Ok(true)
    }
}

impl From<Map<String, Value>> for Record {
    fn from(map: Map<String, Value>) -> Self {
        Record::new(Value::Object(map))
    }
}
