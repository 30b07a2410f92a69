pub mod client;
pub mod result;
pub mod settle;

pub use client::{AnalysisClient, AnalysisService};
pub use result::{AnalysisResult, Formations};
pub use settle::SettleStrategy;
