use crate::proto::{typed_value, Path, TypedValue};
use std::fmt::Write as _;

/// 把 gNMI 路径渲染成 /a/b[k=v]/c 形式，key 按名称排序
pub fn path_to_string(path: &Path) -> String {
    let mut out = String::new();
    for elem in &path.elem {
        out.push('/');
        out.push_str(&elem.name);
        if !elem.key.is_empty() {
            let mut keys: Vec<_> = elem.key.iter().collect();
            keys.sort_by(|a, b| a.0.cmp(b.0));
            for (k, v) in keys {
                let _ = write!(out, "[{}={}]", k, v);
            }
        }
    }
    out
}

/// 取字符串型叶子值；其它类型返回 None
pub fn string_value(value: &TypedValue) -> Option<&str> {
    match value.value.as_ref()? {
        typed_value::Value::StringVal(s) => Some(s.as_str()),
        _ => None,
    }
}

/// 把任意类型的叶子值序列化成可读形式（用于日志与健康记录）
pub fn typed_value_to_string(value: &TypedValue) -> String {
    let Some(inner) = value.value.as_ref() else {
        return String::new();
    };
    match inner {
        typed_value::Value::StringVal(s) => s.clone(),
        typed_value::Value::IntVal(v) => v.to_string(),
        typed_value::Value::UintVal(v) => v.to_string(),
        typed_value::Value::BoolVal(v) => v.to_string(),
        typed_value::Value::BytesVal(v) => String::from_utf8_lossy(v).into_owned(),
        typed_value::Value::FloatVal(v) => format!("{:.6}", v),
        typed_value::Value::DoubleVal(v) => format!("{:.6}", v),
        typed_value::Value::DecimalVal(d) => d.digits.to_string(),
        typed_value::Value::LeaflistVal(list) => {
            let parts: Vec<String> = list.element.iter().map(typed_value_to_string).collect();
            parts.join(",")
        }
        typed_value::Value::JsonVal(v) => String::from_utf8_lossy(v).into_owned(),
        typed_value::Value::JsonIetfVal(v) => String::from_utf8_lossy(v).into_owned(),
        typed_value::Value::AsciiVal(s) => s.clone(),
        typed_value::Value::ProtoBytes(v) => format!("<{} proto bytes>", v.len()),
    }
}
