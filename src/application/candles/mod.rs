mod builder;

pub use builder::{CandleBuilder, CandleDefect};
