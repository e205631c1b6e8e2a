/// Rows per chunk when the caller gives no usable batch size
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Largest accepted batch size, keeps one chunk under the placeholder limits of common databases
pub const MAX_BATCH_SIZE: usize = 1000;

/// Resolve the requested batch size, out of range values fall back to the default
pub(crate) fn effective_batch_size(requested: Option<usize>) -> usize {
    match requested {
        Some(size) if (1..=MAX_BATCH_SIZE).contains(&size) => size,
        Some(size) => {
            log::warn!(
                "Batch size {} out of range [1, {}], use {}",
                size,
                MAX_BATCH_SIZE,
                DEFAULT_BATCH_SIZE
            );
            DEFAULT_BATCH_SIZE
        }
        None => DEFAULT_BATCH_SIZE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_range() {
        assert_eq!(effective_batch_size(Some(1)), 1);
        assert_eq!(effective_batch_size(Some(250)), 250);
        assert_eq!(effective_batch_size(Some(1000)), 1000);
    }

    #[test]
    fn test_fallback() {
        assert_eq!(effective_batch_size(None), DEFAULT_BATCH_SIZE);
        assert_eq!(effective_batch_size(Some(0)), DEFAULT_BATCH_SIZE);
        assert_eq!(effective_batch_size(Some(1001)), DEFAULT_BATCH_SIZE);
        assert_eq!(effective_batch_size(Some(5000)), DEFAULT_BATCH_SIZE);
    }
}
