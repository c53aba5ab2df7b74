pub mod error;
pub mod types;
pub mod value;

pub use error::{Result, StoreError};
pub use types::{Expr, Item, Key, key};
pub use value::Value;
