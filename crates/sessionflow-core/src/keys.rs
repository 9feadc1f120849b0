//! Shared key-joining helper for the cache and rate-limiter namespaces.
//!
//! Both layers build their backend keys the same way: colon-join a handful
//! of optional components and end with a fixed suffix that marks which
//! namespace the key belongs to (`"cache"` or `"ratelimit"`). Keeping this in
//! one place guarantees the two namespaces can never collide.

/// Joins `components` (skipping empty strings) with `:` and appends `suffix`.
///
/// # Examples
///
/// ```
/// use sessionflow_core::keys::join_key;
///
/// assert_eq!(join_key(&["ns", "https://example.com/x"], "cache"), "ns:https://example.com/x:cache");
/// assert_eq!(join_key(&["", "ns"], "cache"), "ns:cache");
/// ```
pub fn join_key(components: &[&str], suffix: &str) -> String {
    let mut parts: Vec<&str> = components.iter().copied().filter(|s| !s.is_empty()).collect();
    parts.push(suffix);
    parts.join(":")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skips_empty_components() {
        assert_eq!(join_key(&["a", "", "b"], "cache"), "a:b:cache");
    }

    #[test]
    fn empty_components_yields_bare_suffix() {
        assert_eq!(join_key(&["", ""], "ratelimit"), "ratelimit");
    }
}
