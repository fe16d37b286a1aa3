// rcp-net/src/lib.rs
pub mod http;

pub use http::{build_http_client, fetch};
pub use rcp_common::{
    cache::Cache,
    error::{FetchError, RcpError, Result},
    model::{ChecksumStatus, LocalArchivePath},
    ValidRecipe,
};
