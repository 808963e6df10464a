//! 核心宏定义

/// 为配置结构体实现Default trait的宏
///
/// 使用示例:
/// ```rust
/// use script_bridge::impl_default;
///
/// struct Limits {
///     depth: u32,
///     label: String,
/// }
///
/// impl_default!(Limits {
///     depth: 8,
///     label: String::from("main"),
/// });
///
/// assert_eq!(Limits::default().depth, 8);
/// ```
#[macro_export]
macro_rules! impl_default {
    ($struct_name:ident {
        $($field:ident: $value:expr),* $(,)?
    }) => {
        impl Default for $struct_name {
            fn default() -> Self {
                Self {
                    $($field: $value),*
                }
            }
        }
    };
}
