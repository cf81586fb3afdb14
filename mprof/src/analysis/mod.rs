//! Analysis of recorded profiles
//!
//! Pure functions over [`ProfileData`](crate::recording::ProfileData),
//! separated from the plot and CLI presentation layers.

pub mod peak;

pub use peak::{find_peak, peak, summarize_spans, Peak, SpanSummary};
