use bytes::Bytes;

/// Outcome of a raw lookup: an owned value, or nothing stored under the key.
///
/// Absence is a valid result, distinct from failure (which is reported
/// through [`StoreError`](crate::StoreError)).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StoreResult {
    value: Option<Vec<u8>>,
}

impl StoreResult {
    /// A result holding `value`.
    pub fn present(value: Vec<u8>) -> Self {
        Self { value: Some(value) }
    }

    /// A result for a key with no value.
    pub fn absent() -> Self {
        Self { value: None }
    }

    /// Returns `true` if a value was found.
    pub fn is_present(&self) -> bool {
        self.value.is_some()
    }

    /// Borrow the value, if present.
    pub fn bytes(&self) -> Option<&[u8]> {
        self.value.as_deref()
    }

    /// Take the value, if present.
    pub fn into_bytes(self) -> Option<Vec<u8>> {
        self.value
    }

    /// Move the value into a shareable [`Bytes`] without copying it.
    ///
    /// Decoders slice the returned buffer, so decoded objects keep the
    /// allocation alive on their own.
    pub fn into_shared(self) -> Option<Bytes> {
        self.value.map(Bytes::from)
    }
}

impl From<Option<Vec<u8>>> for StoreResult {
    fn from(value: Option<Vec<u8>>) -> Self {
        Self { value }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_is_default() {
        let result = StoreResult::default();
        assert!(!result.is_present());
        assert_eq!(result, StoreResult::absent());
        assert!(result.bytes().is_none());
        assert!(result.into_shared().is_none());
    }

    #[test]
    fn present_exposes_value() {
        let result = StoreResult::from(Some(b"value".to_vec()));
        assert!(result.is_present());
        assert_eq!(result.bytes(), Some(&b"value"[..]));
        assert_eq!(result.into_bytes(), Some(b"value".to_vec()));
    }

    #[test]
    fn into_shared_keeps_allocation() {
        let value = b"shared".to_vec();
        let ptr = value.as_ptr();
        let shared = StoreResult::present(value).into_shared().unwrap();
        assert_eq!(shared.as_ptr(), ptr);
    }
}
