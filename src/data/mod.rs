/// Data layer: metrics bundles, loading, and region masks.
///
/// Architecture:
/// ```text
///  .npz / .json / .csv / .parquet
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  parse file → MetricsBundle
///   └──────────┘
///        │
///        ▼
///   ┌──────────────┐
///   │ EvalMetrics   │  centers + optional fid / ls / entropy
///   └──────────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  filter   │  ID / OOD interval masks → region summaries
///   └──────────┘
/// ```

pub mod loader;
pub mod model;
pub mod filter;
pub mod stats;
