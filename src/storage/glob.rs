//! Glob matching for the KEYS command.
//!
//! Supported syntax:
//! - `*` matches any run of bytes, including none
//! - `?` matches exactly one byte
//! - `[abc]`, `[a-z]`, `[^a]` match one byte from (or not from) a class
//! - `\x` matches `x` literally

/// Returns true if `text` matches the glob `pattern`.
///
/// Matching works on raw bytes so binary keys are handled too. A single
/// backtracking point is kept for the most recent `*`, which keeps the
/// matcher linear in practice.
pub fn glob_match(pattern: &[u8], text: &[u8]) -> bool {
    let (mut p, mut t) = (0usize, 0usize);
    let mut star: Option<(usize, usize)> = None;

    while t < text.len() {
        if p < pattern.len() {
            match pattern[p] {
                b'*' => {
                    star = Some((p, t));
                    p += 1;
                    continue;
                }
                b'?' => {
                    p += 1;
                    t += 1;
                    continue;
                }
                b'[' => {
                    if let Some((matched, next)) = match_class(pattern, p, text[t]) {
                        if matched {
                            p = next;
                            t += 1;
                            continue;
                        }
                    }
                }
                b'\\' if p + 1 < pattern.len() => {
                    if pattern[p + 1] == text[t] {
                        p += 2;
                        t += 1;
                        continue;
                    }
                }
                c => {
                    if c == text[t] {
                        p += 1;
                        t += 1;
                        continue;
                    }
                }
            }
        }

        // Mismatch: let the last star swallow one more byte.
        match star {
            Some((sp, st)) => {
                p = sp + 1;
                t = st + 1;
                star = Some((sp, st + 1));
            }
            None => return false,
        }
    }

    pattern[p..].iter().all(|&c| c == b'*')
}

/// Matches one byte against the class starting at `pattern[start] == b'['`.
///
/// Returns whether the byte matched and the index just past the closing
/// bracket, or None for an unterminated class.
fn match_class(pattern: &[u8], start: usize, byte: u8) -> Option<(bool, usize)> {
    let mut i = start + 1;
    let negate = pattern.get(i) == Some(&b'^');
    if negate {
        i += 1;
    }

    let mut matched = false;
    while i < pattern.len() && pattern[i] != b']' {
        if pattern[i] == b'\\' && i + 1 < pattern.len() {
            matched |= pattern[i + 1] == byte;
            i += 2;
            continue;
        }
        if i + 2 < pattern.len() && pattern[i + 1] == b'-' && pattern[i + 2] != b']' {
            let (lo, hi) = if pattern[i] <= pattern[i + 2] {
                (pattern[i], pattern[i + 2])
            } else {
                (pattern[i + 2], pattern[i])
            };
            matched |= (lo..=hi).contains(&byte);
            i += 3;
            continue;
        }
        matched |= pattern[i] == byte;
        i += 1;
    }

    if i >= pattern.len() {
        return None;
    }
    Some((matched != negate, i + 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn m(p: &str, t: &str) -> bool {
        glob_match(p.as_bytes(), t.as_bytes())
    }

    #[test]
    fn test_star() {
        assert!(m("*", ""));
        assert!(m("*", "anything"));
        assert!(m("h*llo", "hello"));
        assert!(m("h*llo", "hllo"));
        assert!(m("h*llo", "heeeello"));
        assert!(!m("h*llo", "help"));
        assert!(m("user:*", "user:42"));
        assert!(!m("user:*", "session:42"));
    }

    #[test]
    fn test_question_mark() {
        assert!(m("h?llo", "hello"));
        assert!(m("h?llo", "hallo"));
        assert!(!m("h?llo", "hllo"));
    }

    #[test]
    fn test_classes() {
        assert!(m("h[ae]llo", "hello"));
        assert!(m("h[ae]llo", "hallo"));
        assert!(!m("h[ae]llo", "hillo"));
        assert!(m("h[^e]llo", "hallo"));
        assert!(!m("h[^e]llo", "hello"));
        assert!(m("key[0-9]", "key7"));
        assert!(!m("key[0-9]", "keyx"));
        assert!(!m("h[ae", "he"));
    }

    #[test]
    fn test_escape() {
        assert!(m("a\\*b", "a*b"));
        assert!(!m("a\\*b", "axb"));
    }
}
