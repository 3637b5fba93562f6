mod client;
mod types;

pub use client::ReportsClient;
pub use types::{Report, ReportPage};
