//! Remote key derivation

/// Derives store keys from session ids.
///
/// The prefix is concatenated verbatim: no delimiter or escaping is inserted,
/// so `("pfx:", "abc")` and `(none, "pfx:abc")` produce the same key.
#[derive(Debug, Clone, Default)]
pub struct KeyBuilder {
    prefix: Option<String>,
}

impl KeyBuilder {
    pub fn new(prefix: Option<String>) -> Self {
        Self { prefix }
    }

    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    /// UTF-8 bytes of `prefix + session_id`
    pub fn build(&self, session_id: &str) -> Vec<u8> {
        match &self.prefix {
            Some(prefix) => {
                let mut key = Vec::with_capacity(prefix.len() + session_id.len());
                key.extend_from_slice(prefix.as_bytes());
                key.extend_from_slice(session_id.as_bytes());
                key
            }
            None => session_id.as_bytes().to_vec(),
        }
    }
}
