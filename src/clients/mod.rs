pub mod cli_client;
pub mod job_service;
pub mod metadata_source;
pub mod rpc_client;

pub use cli_client::CliJobService;
pub use job_service::{JobService, JobSpec};
pub use metadata_source::{MetadataSource, ProjectDirMetadata};
pub use rpc_client::RpcJobService;
