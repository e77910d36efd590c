//! Common types used throughout Keyward.

use std::fmt;
use zeroize::Zeroize;

/// Sensitive data wrapper that zeroizes on drop.
///
/// Used for every transient plaintext that held key material. Zeroing is
/// best-effort: copies made by the allocator on reallocation, swapped pages,
/// and core dumps are out of reach.
#[derive(Clone, Zeroize)]
#[zeroize(drop)]
pub struct SensitiveBytes(Vec<u8>);

impl SensitiveBytes {
    /// Create new sensitive bytes.
    pub fn new(data: Vec<u8>) -> Self {
        Self(data)
    }

    /// Get a reference to the inner bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Copy into a fixed-size array if the length matches exactly.
    ///
    /// The caller owns the copy and is responsible for wiping it.
    pub fn to_array<const N: usize>(&self) -> Option<[u8; N]> {
        if self.0.len() != N {
            return None;
        }
        let mut out = [0u8; N];
        out.copy_from_slice(&self.0);
        Some(out)
    }

    /// Get the length.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl AsRef<[u8]> for SensitiveBytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for SensitiveBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SensitiveBytes([REDACTED; {} bytes])", self.0.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_is_redacted() {
        let bytes = SensitiveBytes::new(b"hunter2".to_vec());
        let debug = format!("{:?}", bytes);
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("7 bytes"));
    }

    #[test]
    fn test_to_array_checks_length() {
        let bytes = SensitiveBytes::new(vec![7u8; 32]);
        assert_eq!(bytes.to_array::<32>(), Some([7u8; 32]));
        assert_eq!(bytes.to_array::<16>(), None);
    }

    #[test]
    fn test_zeroize_clears_contents() {
        let mut bytes = SensitiveBytes::new(vec![0xAA; 4]);
        bytes.zeroize();
        assert!(bytes.is_empty());
    }
}
