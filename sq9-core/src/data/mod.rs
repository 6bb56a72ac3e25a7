//! Market data: provider trait, Yahoo/CSV/synthetic sources, request gate.

pub mod csv_provider;
pub mod gate;
pub mod provider;
pub mod synthetic;
pub mod yahoo;

pub use csv_provider::CsvProvider;
pub use gate::RequestGate;
pub use provider::{
    BarRange, BarRequest, DataError, DataProvider, DataSource, FetchResult, Interval, Period,
};
pub use synthetic::{generate_synthetic_bars, SyntheticProvider};
pub use yahoo::YahooProvider;
