//! 面向用户的通知消息
//!
//! 由同步引擎产生，交给外部展示层渲染 (toast / banner)。
//! Delivery is fire-and-forget; no acknowledgement flows back.

pub mod payload;
pub use payload::*;
