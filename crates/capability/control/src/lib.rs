//! 控制通道命令分发与驱动契约。
//!
//! ```text
//! platform ──(ControlTransport)──> CommandDispatcher ──> Driver (user code)
//!                                      │                     │
//!                                      ▼                     ▼
//!                               MetadataRegistry       DriverContext
//!                                                  (registry / points / sender)
//! ```

mod dispatcher;
mod driver;
mod envelope;
mod error;
mod mqtt;
mod transport;

pub use dispatcher::{CommandDispatcher, DispatcherOptions, DispatcherState};
pub use driver::{Driver, DriverContext};
pub use envelope::{ControlEnvelope, ControlReply, ControlRequest, ReplyKind};
pub use error::{ControlError, DriverError};
pub use mqtt::{MqttControlConfig, MqttControlTransport};
pub use transport::{ControlSession, ControlTransport, LoopbackPeer, LoopbackTransport};
