//! SETL2 Runtime: the value model and hashed-tree containers
//!
//! This crate carries the "runtime" third of the design spec's dependency
//! table: the tagged [`Specifier`](specifier::Specifier) value, the
//! hash-partitioned trie containers that back sets, maps and tuples, and the
//! generalized suffix tree used for exact multi-pattern matching. The
//! compiler crate uses the same containers for its literal table; the
//! interpreter (out of scope here, see spec §1) would use them unmodified at
//! run time.
//!
//! # Modules
//!
//! - `specifier`: the tagged `Specifier` value and its `mark`/`unmark`/
//!   `hash_code`/`equal` contract
//! - `numeric`: boxed `Long` (multi-precision-capable integer) and `Real`
//!   handles
//! - `strings`: the runtime string handle and its byte-mixing hash
//! - `container`: the shared trie constants plus `Set`, `Map` and `Tuple`
//! - `suffix`: the generalized Ukkonen suffix tree and its C-callable API
//! - `error`: container and suffix-tree error types

pub mod container;
pub mod error;
pub mod numeric;
pub mod specifier;
pub mod strings;
pub mod suffix;

pub use error::{ContainerError, SuffixTreeError};
pub use specifier::Specifier;
