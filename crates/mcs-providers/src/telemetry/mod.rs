//! Telemetry Sink Implementations
//!
//! | Sink | Destination | Use |
//! |------|-------------|-----|
//! | StdoutTelemetrySink | Structured log stream | Default |
//! | FileTelemetrySink | JSON-lines file | Local collection |
//! | NullTelemetrySink | Nowhere | Disabled telemetry |

pub mod file;
pub mod null;
pub mod stdout;

pub use file::FileTelemetrySink;
pub use null::NullTelemetrySink;
pub use stdout::StdoutTelemetrySink;
