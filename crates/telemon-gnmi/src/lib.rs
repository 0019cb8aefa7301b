//! gNMI 协议层：报文子集、客户端与路径工具
//!
//! 报文按上游 gnmi.proto 的字段编号手写成 prost 结构，
//! 客户端按 tonic 生成代码的形状手写，构建期不依赖 protoc。

pub mod client;
pub mod path;
pub mod proto;

pub use client::GnmiClient;
pub use path::{path_to_string, typed_value_to_string};
pub use proto::*;
