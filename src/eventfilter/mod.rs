pub mod filter;
pub mod kmsg;

pub use filter::{EventFilter, MAX_DETAIL_LINES};
pub use kmsg::{strip_envelope, KmsgReader, LineHandler};
