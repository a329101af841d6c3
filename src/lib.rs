//! Cotas - Brazilian investment fund comparison
//!
//! This library downloads the public fund registry and daily quota reports
//! published by CVM, joins them, fetches benchmark series (CDI, IMA-B,
//! IBOV) and computes risk/return and rolling-window comparisons, with
//! terminal tables and SVG charts for the results.

pub mod charts;
pub mod cnpj;
pub mod config;
pub mod display;
pub mod error;
pub mod http;
pub mod importers;
pub mod merge;
pub mod panel;
pub mod pricing;
pub mod reports;
pub mod utils;

pub use cnpj::{canonicalize, Cnpj};
pub use config::{DisplayConfig, FundsConfig, ProxyConfig};
pub use error::{FundsError, Result, TransportError};
pub use http::{HttpTransport, MemoryTransport, Transport};
pub use merge::{merge, MergedFundSeries, MergedRow};
pub use panel::Panel;
pub use pricing::{Benchmark, BenchmarkSeries, CdiMethod};
