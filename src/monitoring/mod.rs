/*!
 * Monitoring
 * Structured tracing setup and per-item work spans
 */

mod tracer;

pub use tracer::{init_tracing, WorkSpan};
