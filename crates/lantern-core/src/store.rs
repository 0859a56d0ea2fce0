//! Persisted identity
//!
//! Only the local node's own nickname is persisted; learned peer names are
//! rebuilt from the mesh after a reboot.

use async_trait::async_trait;

/// Maximum alias length in bytes, including none of the terminators the
/// wire format does not carry.
pub const MAX_ALIAS_LEN: usize = 16;

/// Backend for the local node's persisted nickname
#[async_trait]
pub trait AliasStore: Send + Sync {
    /// Load the stored alias, `None` when nothing was saved yet
    async fn load_alias(&self) -> Option<String>;

    /// Persist the alias, returns false when the store rejected it.
    ///
    /// Storing a value identical to the current one is a successful no-op.
    async fn save_alias(&self, alias: &str) -> bool;
}

/// Clamp an alias to [`MAX_ALIAS_LEN`] bytes on a character boundary.
pub fn clamp_alias(alias: &str) -> &str {
    if alias.len() <= MAX_ALIAS_LEN {
        return alias;
    }
    let mut end = MAX_ALIAS_LEN;
    while !alias.is_char_boundary(end) {
        end -= 1;
    }
    &alias[..end]
}
