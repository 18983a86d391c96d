//! Command handlers for the spanfuse CLI

pub mod infer;
pub mod run;
pub mod stages;
pub mod strip;

pub use infer::handle_infer;
pub use run::handle_run;
pub use stages::{
    handle_combine_ensembles, handle_combine_peers, handle_combine_recall_precision, handle_rules,
    handle_threshold,
};
pub use strip::handle_strip;
