pub mod directory;
pub mod error;
pub mod symbols;
pub mod traits;
pub mod types;

pub use error::*;
pub use symbols::{canonicalize, detect_market, to_provider_format, Currency, Market, MarketInfo, ProviderFormat};
pub use traits::*;
pub use types::*;
