//! Data loading for the cost graph.
//!
//! A data directory holds one file per source (`items`, `fluids`, `recipes`,
//! `resources`, `techs`, `machines`, `base_costs`, `categories`, `precalc`,
//! `config`), each in RON, TOML or JSON. [`load_cost_graph`] reads them all
//! and returns a graph ready for evaluation together with its technology
//! table.

pub mod config;
pub mod loader;
pub mod precalc;
pub mod resolve;
pub mod schema;

pub use config::CostConfig;
pub use loader::DataLoadError;
pub use precalc::{PrecalcEntry, PrecalcTable, apply_precalc, precompute};
pub use resolve::{LoadOptions, LoadedData, load_cost_graph, load_cost_graph_with};
