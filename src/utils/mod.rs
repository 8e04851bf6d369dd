pub mod dates;
pub mod money;
pub mod period;
pub mod request_dedup;
