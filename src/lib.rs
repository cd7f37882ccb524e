pub mod cli;
pub mod config;
pub mod credentials;
pub mod output;
pub mod pipeline;
pub mod request;
pub mod session;
pub mod store;
pub mod sts;
