pub mod error;
pub mod oracle;

pub use error::{OracleError, Result};
pub use oracle::{
    OracleConfig, PriceOracle, INCREASE_RATE, MAX_CONSIDERED_EXTRA_REDUNDANCY, PRICE_BASE,
    TARGET_REDUNDANCY,
};
