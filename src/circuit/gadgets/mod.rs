pub mod constraints;
pub mod hashes;
