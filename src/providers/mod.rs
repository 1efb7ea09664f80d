pub mod cnb;
pub mod mtgox;
pub mod util;

pub use cnb::CnbProvider;
pub use mtgox::MtGoxProvider;
