pub mod config;
pub mod error;
pub mod policy;

pub use config::AppConfig;
pub use error::{GatewardenError, GatewardenResult};
pub use policy::{MatchCriteria, Policy, RequestDescriptor, Span, SpanLimits};
