//! Integration tests for Layer 0: Foundation
//!
//! Tests for identifiers, errors, and the persistent slot trie.

mod errors;
