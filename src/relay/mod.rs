pub mod fetcher;
pub mod server;

pub use fetcher::{ImageRelay, RelayedImage, relay_url};
pub use server::router;
