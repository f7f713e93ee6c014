//! Recursive Length Prefix codec used for every canonical node encoding in the trie.
pub mod constants;
pub mod decode;
pub mod encode;
pub mod error;
pub mod structs;
