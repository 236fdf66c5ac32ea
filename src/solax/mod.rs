pub mod frame;
pub mod live_data;
pub mod query;
pub mod transport;
