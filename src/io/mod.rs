//! Response parsing and normalization.
//!
//! - CSV body -> header + rows (`table`)
//! - cell cleaning, canonical keys, field aliases (`fields`)
//! - rows -> `StockRecord`s, projection (`records`)

pub mod fields;
pub mod records;
pub mod table;

pub use fields::*;
pub use records::*;
pub use table::*;
