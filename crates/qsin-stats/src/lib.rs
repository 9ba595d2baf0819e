//! Numeric building blocks for the Quick-SIN analysis tools.
//!
//! - **Descriptive statistics** ([`descriptive`]): mean, median, population variance and
//!   standard deviation
//! - **Percentiles** ([`percentiles`]): interpolated percentiles and quartiles
//! - **Logistic regression** ([`logistic`]): deterministic maximum-likelihood fitting of a
//!   one-dimensional logistic curve to grouped binary outcomes
//!
//! # Examples
//!
//! ```
//! use qsin_stats::{descriptive::DescriptiveStats, percentiles::Quartiles};
//!
//! let values = [1.0, 2.0, 3.0, 4.0, 5.0];
//! let stats = DescriptiveStats::new(values).unwrap();
//! assert_eq!(stats.mean, 3.0);
//!
//! let quartiles = Quartiles::new(&values).unwrap();
//! assert_eq!(quartiles.iqr(), 2.0);
//! ```

pub mod descriptive;
pub mod logistic;
pub mod percentiles;
