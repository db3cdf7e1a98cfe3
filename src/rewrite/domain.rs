//! Backend hostname replacement.
//!
//! Literal, case-sensitive, all-occurrences replacement over the decoded
//! body. Matching resumes after each replacement, so inserted text is never
//! re-scanned. A client hostname that itself contains the backend hostname is
//! therefore substituted once, not iteratively.

/// Replace every occurrence of `backend_host` in `body` with `client_host`.
///
/// Operates on raw bytes so bodies that are not valid UTF-8 pass through
/// with only the matched spans touched.
pub fn rewrite(body: &[u8], backend_host: &str, client_host: &str) -> Vec<u8> {
    let needle = backend_host.as_bytes();
    let replacement = client_host.as_bytes();

    if needle.is_empty() || body.len() < needle.len() {
        return body.to_vec();
    }

    let mut out = Vec::with_capacity(body.len());
    let mut rest = body;
    while let Some(pos) = find(rest, needle) {
        out.extend_from_slice(&rest[..pos]);
        out.extend_from_slice(replacement);
        rest = &rest[pos + needle.len()..];
    }
    out.extend_from_slice(rest);
    out
}

/// Count occurrences the same way `rewrite` consumes them.
pub fn count_matches(body: &[u8], backend_host: &str) -> usize {
    let needle = backend_host.as_bytes();
    if needle.is_empty() {
        return 0;
    }
    let mut count = 0;
    let mut rest = body;
    while let Some(pos) = find(rest, needle) {
        count += 1;
        rest = &rest[pos + needle.len()..];
    }
    count
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
