//! Multi-span sliding-window rate limiting.
//!
//! Every client identity owns one [`WindowCounter`](window::WindowCounter)
//! per time span (second, minute, hour, day). A request is admitted only if
//! every span has room, and an admitted request is counted against all four
//! windows at once. Quotas for distinct clients live in a sharded map so
//! checks for different clients never contend, while same-client checks
//! serialise their read-modify-write.

pub mod limiter;
pub mod quota;
pub mod window;

pub use limiter::{LimitDecision, RateLimiter, SpanOccupancy};
pub use quota::ClientQuota;
pub use window::WindowCounter;
