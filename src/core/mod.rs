pub mod error;
pub mod types;
pub mod value;

pub use error::{ModelError, Result};
pub use types::{ConfigurationSource, Row, ValueGeneration};
pub use value::Value;
