/// Data layer: core types, loading, filtering and statistics.
///
/// Architecture:
/// ```text
///  .csv / .json / .parquet
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  parse file → Dataset (types inferred per column)
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  derive   │  Average_Grade = round((G1+G2+G3)/3, 2)
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  filter   │  FilterSpec → FilteredView (row indices, order kept)
///   └──────────┘
///        │
///        ▼
///   ┌───────────────────────────────┐
///   │  stats / normalize / insights  │  aggregates over the view
///   └───────────────────────────────┘
/// ```

pub mod derive;
pub mod filter;
pub mod insights;
pub mod loader;
pub mod model;
pub mod normalize;
pub mod stats;
