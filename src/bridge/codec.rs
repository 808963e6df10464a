//! 原始值编解码
//!
//! 布尔、整数、浮点数、字符串和字节缓冲区在两个堆之间按值转换。缓冲区总是深拷贝：
//! 引擎端的 `Uint8Array` 与宿主端的 `Vec<u8>` 不共享可变内存。

use rquickjs::{Ctx, TypedArray, Type, Value};

use crate::core::{BridgeError, BridgeResult, MarshalError};
use crate::host::HostValue;

/// 引擎数值能精确表示的最大整数 (2^53)
pub const MAX_SAFE_INTEGER: u64 = 1 << 53;

/// 编码原始宿主值；非原始值返回 `None`
pub(crate) fn encode<'js>(ctx: &Ctx<'js>, value: &HostValue) -> Option<BridgeResult<Value<'js>>> {
    let encoded = match value {
        HostValue::Null => Ok(Value::new_null(ctx.clone())),
        HostValue::Undefined => Ok(Value::new_undefined(ctx.clone())),
        HostValue::Bool(b) => Ok(Value::new_bool(ctx.clone(), *b)),
        HostValue::Int(i) => Ok(Value::new_int(ctx.clone(), *i)),
        HostValue::Long(l) => encode_long(ctx, *l),
        HostValue::Double(d) => Ok(Value::new_float(ctx.clone(), *d)),
        HostValue::String(s) => encode_str(ctx, s),
        HostValue::Buffer(bytes) => encode_bytes(ctx, bytes),
        _ => return None,
    };
    Some(encoded)
}

/// 超出 2^53 的整数以十进制字符串表示，避免静默截断
fn encode_long<'js>(ctx: &Ctx<'js>, value: i64) -> BridgeResult<Value<'js>> {
    if let Ok(small) = i32::try_from(value) {
        return Ok(Value::new_int(ctx.clone(), small));
    }
    if value.unsigned_abs() <= MAX_SAFE_INTEGER {
        return Ok(Value::new_float(ctx.clone(), value as f64));
    }
    encode_str(ctx, &value.to_string())
}

fn encode_str<'js>(ctx: &Ctx<'js>, value: &str) -> BridgeResult<Value<'js>> {
    rquickjs::String::from_str(ctx.clone(), value)
        .map(|s| s.into_value())
        .map_err(engine_failure)
}

fn encode_bytes<'js>(ctx: &Ctx<'js>, bytes: &[u8]) -> BridgeResult<Value<'js>> {
    TypedArray::<u8>::new_copy(ctx.clone(), bytes)
        .map(|array| array.into_value())
        .map_err(engine_failure)
}

/// 解码原始引擎值；对象返回 `Ok(None)`
pub(crate) fn decode(value: &Value<'_>) -> BridgeResult<Option<HostValue>> {
    if value.is_undefined() {
        return Ok(Some(HostValue::Undefined));
    }
    if value.is_null() {
        return Ok(Some(HostValue::Null));
    }
    let decoded = match value.type_of() {
        Type::Bool => value.as_bool().map(HostValue::Bool),
        Type::Int => value.as_int().map(HostValue::Int),
        Type::Float => value.as_float().map(HostValue::Double),
        Type::String => match value.as_string() {
            Some(s) => Some(HostValue::String(s.to_string().map_err(engine_failure)?)),
            None => None,
        },
        Type::Symbol => return Err(MarshalError::Unsupported("symbol").into()),
        Type::BigInt => return Err(MarshalError::Unsupported("bigint").into()),
        _ => None,
    };
    Ok(decoded)
}

/// 复制 `Uint8Array` 视图的内容
pub(crate) fn decode_bytes(view: &Value<'_>) -> BridgeResult<Vec<u8>> {
    let array: TypedArray<'_, u8> = view
        .get()
        .map_err(|e| MarshalError::BrokenBuffer(e.to_string()))?;
    array
        .as_bytes()
        .map(<[u8]>::to_vec)
        .ok_or_else(|| MarshalError::BrokenBuffer("buffer is detached".to_string()).into())
}

/// 非异常类的引擎失败
pub(crate) fn engine_failure(err: rquickjs::Error) -> BridgeError {
    match err {
        rquickjs::Error::Allocation => {
            BridgeError::ResourceExhausted("engine allocation failed".to_string())
        }
        rquickjs::Error::FromJs { from, to, .. } => MarshalError::TypeMismatch {
            expected: to,
            found: from.to_string(),
        }
        .into(),
        rquickjs::Error::IntoJs { from, to, .. } => MarshalError::TypeMismatch {
            expected: to,
            found: from.to_string(),
        }
        .into(),
        other => {
            tracing::warn!(target: "script_bridge::bridge", error = %other, "Unexpected engine failure");
            MarshalError::Unsupported("engine operation").into()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rquickjs::{Context, Runtime};

    fn with_ctx<R>(f: impl for<'js> FnOnce(Ctx<'js>) -> R) -> R {
        let runtime = Runtime::new().unwrap();
        let context = Context::full(&runtime).unwrap();
        context.with(f)
    }

    fn round_trip(value: &HostValue) -> HostValue {
        with_ctx(|ctx| {
            let encoded = encode(&ctx, value).unwrap().unwrap();
            match decode(&encoded).unwrap() {
                Some(v) => v,
                None => HostValue::Buffer(decode_bytes(&encoded).unwrap()),
            }
        })
    }

    #[test]
    fn test_long_encoding() {
        assert_eq!(round_trip(&HostValue::Long(7)), HostValue::Int(7));
        assert_eq!(
            round_trip(&HostValue::Long(1 << 40)),
            HostValue::Double((1u64 << 40) as f64)
        );
        assert_eq!(
            round_trip(&HostValue::Long(i64::MAX)),
            HostValue::String(i64::MAX.to_string())
        );
    }

    #[test]
    fn test_non_primitives_are_not_encoded() {
        with_ctx(|ctx| {
            assert!(encode(&ctx, &HostValue::json("{}")).is_none());
            let object: Value = ctx.eval("({})").unwrap();
            assert!(decode(&object).unwrap().is_none());
        });
    }

    #[test]
    fn test_symbol_is_rejected() {
        with_ctx(|ctx| {
            let symbol: Value = ctx.eval("Symbol('s')").unwrap();
            assert!(matches!(
                decode(&symbol),
                Err(BridgeError::Marshalling(MarshalError::Unsupported("symbol")))
            ));
        });
    }

    #[test]
    fn test_undefined_stays_undefined() {
        with_ctx(|ctx| {
            let undefined = Value::new_undefined(ctx.clone());
            let decoded = decode(&undefined).unwrap().unwrap();
            assert!(decoded.is_undefined());
            assert!(decode(&Value::new_null(ctx.clone())).unwrap().unwrap().is_null());
            let encoded = encode(&ctx, &HostValue::Undefined).unwrap().unwrap();
            assert!(encoded.is_undefined());
        });
    }

    #[test]
    fn test_buffer_is_copied() {
        with_ctx(|ctx| {
            let bytes = vec![1u8, 2, 3];
            let encoded = encode(&ctx, &HostValue::Buffer(bytes.clone()))
                .unwrap()
                .unwrap();
            ctx.globals().set("buf", encoded.clone()).unwrap();
            let _: Value = ctx.eval("buf[0] = 9").unwrap();
            assert_eq!(bytes, vec![1, 2, 3]);
            assert_eq!(decode_bytes(&encoded).unwrap(), vec![9, 2, 3]);
        });
    }

    proptest! {
        #[test]
        fn primitives_round_trip(value in prop_oneof![
            any::<bool>().prop_map(HostValue::Bool),
            any::<i32>().prop_map(HostValue::Int),
            (-(MAX_SAFE_INTEGER as i64)..=(MAX_SAFE_INTEGER as i64)).prop_map(HostValue::Long),
            any::<f64>().prop_filter("NaN never compares equal", |d| !d.is_nan()).prop_map(HostValue::Double),
            ".*".prop_map(HostValue::String),
            proptest::collection::vec(any::<u8>(), 0..64).prop_map(HostValue::Buffer),
        ]) {
            prop_assert_eq!(round_trip(&value), value);
        }
    }
}
