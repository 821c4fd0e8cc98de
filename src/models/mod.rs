// Re-export model modules
mod rates;
mod selection;

pub use rates::*;
pub use selection::*;
