pub mod broker_client;
pub mod bus;
pub mod circuit_breaker;
pub mod http;
pub mod market_data;
pub mod persistence;
