//! Typed records and the JSON stores they are loaded from

pub mod records;
pub mod store;

pub use records::{JobOffer, JobSeeker, MatchRecord};
pub use store::{JsonStore, Loaded};
