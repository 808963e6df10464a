//! 值转换钩子
//!
//! 宿主对象可以按具体类型注册转换，进入引擎前先变成另一个宿主值（例如 JSON），
//! 不再以代理形式出现。引擎对象按构造函数名注册转换，回到宿主时直接得到转换结果。
//! 转换结果不再参与转换。

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::rc::Rc;

use super::Scope;
use crate::core::BridgeResult;
use crate::host::{HostObject, HostValue, ScriptObject};

pub(crate) type HostCoercion = Rc<dyn Fn(&dyn HostObject) -> BridgeResult<Option<HostValue>>>;
pub(crate) type ScriptCoercion = Rc<dyn Fn(&Scope<'_>, ScriptObject) -> BridgeResult<HostValue>>;

#[derive(Default)]
pub(crate) struct Coercions {
    host: HashMap<TypeId, HostCoercion>,
    script: HashMap<String, ScriptCoercion>,
}

impl Coercions {
    pub fn put_host<T, F>(&mut self, coerce: F)
    where
        T: HostObject + 'static,
        F: Fn(&T) -> BridgeResult<HostValue> + 'static,
    {
        let hook: HostCoercion = Rc::new(move |object: &dyn HostObject| {
            match object.as_any().downcast_ref::<T>() {
                Some(concrete) => coerce(concrete).map(Some),
                None => Ok(None),
            }
        });
        self.host.insert(TypeId::of::<T>(), hook);
    }

    pub fn put_script<F>(&mut self, constructor: &str, coerce: F)
    where
        F: Fn(&Scope<'_>, ScriptObject) -> BridgeResult<HostValue> + 'static,
    {
        self.script.insert(constructor.to_string(), Rc::new(coerce));
    }

    pub fn host_for(&self, object: &dyn HostObject) -> Option<HostCoercion> {
        self.host.get(&Any::type_id(object.as_any())).cloned()
    }

    pub fn script_for(&self, constructor: &str) -> Option<ScriptCoercion> {
        self.script.get(constructor).cloned()
    }

    pub fn has_script(&self) -> bool {
        !self.script.is_empty()
    }

    pub fn len(&self) -> usize {
        self.host.len() + self.script.len()
    }
}

impl<'js> Scope<'js> {
    /// 按宿主对象的具体类型查找转换并执行
    pub(crate) fn coerce_host(&self, object: &dyn HostObject) -> BridgeResult<Option<HostValue>> {
        // 先取出钩子再调用，钩子内部可以继续注册或编组
        let hook = self.shared().coercions.borrow().host_for(object);
        match hook {
            Some(hook) => hook(object),
            None => Ok(None),
        }
    }

    pub(crate) fn script_coercion(&self, constructor: &str) -> Option<ScriptCoercion> {
        self.shared().coercions.borrow().script_for(constructor)
    }

    pub(crate) fn has_script_coercions(&self) -> bool {
        self.shared().coercions.borrow().has_script()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Celsius(f64);

    impl HostObject for Celsius {}

    struct Plain;

    impl HostObject for Plain {}

    #[test]
    fn test_host_coercion_matches_concrete_type() {
        let mut coercions = Coercions::default();
        coercions.put_host::<Celsius, _>(|c| Ok(HostValue::Double(c.0)));

        let celsius: Rc<dyn HostObject> = Rc::new(Celsius(21.5));
        let hook = coercions.host_for(&*celsius).unwrap();
        assert_eq!(hook(&*celsius).unwrap(), Some(HostValue::Double(21.5)));

        let plain: Rc<dyn HostObject> = Rc::new(Plain);
        assert!(coercions.host_for(&*plain).is_none());
    }

    #[test]
    fn test_registration_replaces_previous() {
        let mut coercions = Coercions::default();
        coercions.put_script("Date", |_, _| Ok(HostValue::Int(1)));
        coercions.put_script("Date", |_, _| Ok(HostValue::Int(2)));
        assert_eq!(coercions.len(), 1);
        assert!(coercions.has_script());
        assert!(coercions.script_for("Map").is_none());
    }
}
