pub mod client;
pub mod latency;
pub mod session;

pub use client::TransportClient;
pub use latency::LatencyStats;
