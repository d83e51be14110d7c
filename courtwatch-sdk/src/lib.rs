//! Wire objects exchanged between Courtwatch and its collaborators.
//!
//! * [`objects::scraping`]: tasks pushed to scrapers and the result documents
//!   they write back.
//! * [`objects::availability`]: availability events published by the change
//!   detector.
//! * [`objects::notification`]: the payload delivered to notification relays.
//! * [`signature`]: HMAC signing for relay payloads.

pub mod formats;
pub mod objects;
pub mod signature;
