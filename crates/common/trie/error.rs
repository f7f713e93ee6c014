use ethereum_types::H256;
use gmpt_rlp::error::RLPDecodeError;
use thiserror::Error;

use crate::Nibbles;

#[derive(Debug, Error)]
pub enum TrieError {
    #[error(transparent)]
    RLPDecode(#[from] RLPDecodeError),
    #[error("Malformed compact path: {0}")]
    MalformedCompactPath(&'static str),
    #[error("Inconsistent internal tree structure")]
    InconsistentTree,
    #[error("Node {hash:#x} at path {path:?} not found in the database")]
    MissingNode { path: Nibbles, hash: H256 },
    #[error("Lock Error: Panicked when trying to acquire a lock")]
    LockError,
    #[error("Database error: {0}")]
    DbError(anyhow::Error),
    #[error("Invalid trie input: {0}")]
    InvalidInput(&'static str),
    #[error("A worker thread panicked")]
    WorkerPanicked,
}
