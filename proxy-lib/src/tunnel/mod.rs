pub mod counters;
pub mod handler;
pub mod target;

pub use counters::{ByteCounter, CountingReader, CountingWriter};
pub use handler::run_tunnel;
pub use target::{parse_host_port, resolve_and_connect};
