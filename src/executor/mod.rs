//! The cancellable concurrent executor (§4.8, §5): a bounded worker pool
//! plus the cancellation registry and background sweeper that let an
//! in-flight chart request be cancelled by request id or page id.

pub mod cancellation;
pub mod pool;

pub use cancellation::CancellationRegistry;
pub use pool::{spawn_sweeper, Executor};
