//! Image reference rewriting: `bitnami/` → `bitnamilegacy/`.
//!
//! Pure string logic, no I/O. A reference needs rewriting when a path
//! segment is exactly `bitnami` (case-insensitive) and it doesn't already
//! point at `bitnamilegacy/`. Everything else in the reference (registry
//! host, path depth, tag, digest) is preserved byte for byte.

use std::sync::LazyLock;

use regex::Regex;

/// The segment written in place of the deprecated one.
pub const LEGACY_SEGMENT: &str = "bitnamilegacy/";

/// `bitnami/` at the start of the reference or right after a `/`.
static DEPRECATED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(?:^|/)(bitnami/)").expect("static pattern compiles"));

static MIGRATED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)bitnamilegacy/").expect("static pattern compiles"));

/// Whether `image` still references the deprecated path.
pub fn needs_rewrite(image: &str) -> bool {
    DEPRECATED.is_match(image) && !MIGRATED.is_match(image)
}

/// Rewrite the first deprecated segment of `image`.
///
/// Returns `image` unchanged when [`needs_rewrite`] is false, so rewriting
/// is idempotent.
pub fn rewrite(image: &str) -> String {
    if !needs_rewrite(image) {
        return image.to_string();
    }
    let Some(segment) = DEPRECATED.captures(image).and_then(|c| c.get(1)) else {
        return image.to_string();
    };
    let mut out = String::with_capacity(image.len() + LEGACY_SEGMENT.len() - segment.len());
    out.push_str(&image[..segment.start()]);
    out.push_str(LEGACY_SEGMENT);
    out.push_str(&image[segment.end()..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_bitnami_reference() {
        assert!(needs_rewrite("bitnami/redis:7.0"));
        assert_eq!(rewrite("bitnami/redis:7.0"), "bitnamilegacy/redis:7.0");
    }

    #[test]
    fn registry_prefix_is_preserved() {
        let image = "docker.io/bitnami/redis:7.0";
        assert!(needs_rewrite(image));
        assert_eq!(rewrite(image), "docker.io/bitnamilegacy/redis:7.0");
    }

    #[test]
    fn deep_path_tag_and_digest_are_preserved() {
        let image = "registry.example.com:5000/mirror/bitnami/postgresql:16.2.0@sha256:abc123";
        assert_eq!(
            rewrite(image),
            "registry.example.com:5000/mirror/bitnamilegacy/postgresql:16.2.0@sha256:abc123"
        );
    }

    #[test]
    fn match_is_case_insensitive() {
        assert!(needs_rewrite("docker.io/Bitnami/redis:7.0"));
        assert_eq!(rewrite("docker.io/BITNAMI/redis:7.0"), "docker.io/bitnamilegacy/redis:7.0");
    }

    #[test]
    fn already_migrated_is_left_alone() {
        for image in [
            "bitnamilegacy/redis:7.0",
            "docker.io/bitnamilegacy/redis:7.0",
            "docker.io/BitnamiLegacy/redis:7.0",
        ] {
            assert!(!needs_rewrite(image), "{image}");
            assert_eq!(rewrite(image), image);
        }
    }

    #[test]
    fn segment_must_start_at_a_boundary() {
        for image in ["myorg/not-bitnami/foo:1", "mybitnami/foo:1", "nginx:1.25", "bitnami:latest"] {
            assert!(!needs_rewrite(image), "{image}");
            assert_eq!(rewrite(image), image);
        }
    }

    #[test]
    fn rewrite_is_idempotent() {
        let once = rewrite("quay.io/bitnami/kafka:3.6");
        assert!(!needs_rewrite(&once));
        assert_eq!(rewrite(&once), once);
    }

    #[test]
    fn only_first_segment_is_rewritten() {
        assert_eq!(rewrite("bitnami/bitnami/x:1"), "bitnamilegacy/bitnami/x:1");
    }
}
