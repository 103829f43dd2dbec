mod acceptor;

pub use acceptor::{build_admin_acceptor, build_proxy_acceptor};
