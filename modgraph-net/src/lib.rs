// modgraph-net/src/lib.rs
pub mod cache;
pub mod escape;
pub mod lookup;
pub mod modfile;
pub mod proxy;
pub mod registry;
pub mod validation;

pub use cache::CachedRegistry;
pub use lookup::RetryPolicy;
pub use proxy::ProxyClient;
pub use registry::RegistrySource;
