pub mod frame;
pub mod runtime_error;
pub mod telemetry;
pub mod vm;

pub use frame::{Frame, FrameKind};
pub use runtime_error::{RuntimeError, RuntimeErrorKind};
pub use telemetry::{NoTelemetry, OpCounter, Telemetry};
pub use vm::{Vm, VmConfig};
