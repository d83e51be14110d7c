pub mod backoff;
pub mod currency;
pub mod slot_key;
