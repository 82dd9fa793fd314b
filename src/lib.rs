#![doc = include_str!("../README.md")]
#![deny(unreachable_pub)]

pub mod circuit;
pub mod config;
pub mod error;
pub mod field;
pub mod hash;
pub mod proof;
pub mod trie;

pub use trie::{InsertProof, LookupProof, Trie};
