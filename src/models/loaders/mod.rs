pub mod job_json_loader;

pub use job_json_loader::{job_json_path, load_job_metadata};
