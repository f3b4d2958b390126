// # Address Cache
//
// Durable record of the last addresses pushed for each fully-qualified host.
// A fresh cache lets a pass skip every provider call for domains whose hosts
// already point at the current public address.

pub mod file;

pub use file::{AddressCache, CacheEntry};
