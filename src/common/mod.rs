pub mod remote;

pub use remote::{RemoteEndpoint, bypass_tunnel_warning};
