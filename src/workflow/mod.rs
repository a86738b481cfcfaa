pub mod run_ctx;
pub mod selection_flow;

pub use run_ctx::RunCtx;
pub use selection_flow::SelectionFlow;
