//! 原始读数规范化：有序值处理链与 Point 构建。
//!
//! ```text
//! (table, device, {tag -> raw}) ──► MetadataRegistry ──► DeviceInfo
//!                                          │
//!                      每个字段 ──► HandlerChain（按优先级升序）
//!                                          │  单位换算 → 取整缩放 → 量程校验
//!                                          ▼
//!                                        Point
//! ```
//!
//! 处理链只在这里执行一次，发送后端不会重复处理。

mod chain;
mod handler;
mod point;
mod range;
mod round;
mod unit;

pub use chain::{HandlerChain, HandlerChainBuilder};
pub use handler::{HandlerError, ValueHandler};
pub use point::{BuildError, PointBuilder, PointRequest};
pub use range::{RangeAction, RangeHandler};
pub use round::{RoundScaleHandler, round_half_up};
pub use unit::UnitConversionHandler;
