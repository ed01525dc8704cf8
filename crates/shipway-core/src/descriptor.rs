//! Deployment descriptor rewriting.
//!
//! A descriptor is a persisted text file naming the image reference an
//! environment should run. Exactly one concern of it is mutable from this
//! core: the `image:` line. The rewrite is computed fully in memory before
//! any persistence happens, so a failed run never leaves a half-written
//! descriptor behind.

use regex::Regex;
use std::sync::OnceLock;

use crate::domain::{PromotionError, Result};

/// Matches an `image:` line, keeping indentation (and a YAML list dash)
/// intact so the surrounding structure survives the rewrite.
fn image_line_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)^(?P<prefix>[ \t]*(?:-[ \t]+)?)image:[ \t]*.*$").expect("static pattern")
    })
}

/// Replace every `image:` line in `content` with `image: <image_reference>`.
///
/// Pure and idempotent: `rewrite(rewrite(c, r), r) == rewrite(c, r)`. Fails
/// with `DescriptorMalformed` when no line matches, which protects against
/// silently no-op-ing against a renamed or restructured descriptor.
pub fn rewrite_image(content: &str, image_reference: &str) -> Result<String> {
    let re = image_line_re();

    if re.find(content).is_none() {
        return Err(PromotionError::DescriptorMalformed(
            "no 'image:' line found to rewrite".to_string(),
        ));
    }

    // Closure replacement sidesteps `$` capture expansion in the reference.
    let rewritten = re.replace_all(content, |caps: &regex::Captures<'_>| {
        format!("{}image: {}", &caps["prefix"], image_reference)
    });

    Ok(rewritten.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    const DESCRIPTOR: &str = "\
apiVersion: apps/v1
kind: Deployment
metadata:
  name: app
spec:
  template:
    spec:
      containers:
        - name: app
          image: registry.example.com/app:dev-6
          ports:
            - containerPort: 8080
";

    #[test]
    fn test_rewrite_replaces_image_line() {
        let out = rewrite_image(DESCRIPTOR, "registry.example.com/app:dev-7").expect("rewrite");
        assert!(out.contains("image: registry.example.com/app:dev-7"));
        assert!(!out.contains("dev-6"));
    }

    #[test]
    fn test_rewrite_preserves_surrounding_structure() {
        let out = rewrite_image(DESCRIPTOR, "r/app:v2").expect("rewrite");
        assert!(out.contains("kind: Deployment"));
        assert!(out.contains("containerPort: 8080"));
        assert!(out.contains("          image: r/app:v2"), "indentation kept");
    }

    #[test]
    fn test_rewrite_is_idempotent() {
        let once = rewrite_image(DESCRIPTOR, "r/app:hotfix-urgent-fix-13").expect("rewrite");
        let twice = rewrite_image(&once, "r/app:hotfix-urgent-fix-13").expect("rewrite");
        assert_eq!(once, twice);
    }

    #[test]
    fn test_zero_image_lines_is_malformed() {
        let content = "apiVersion: v1\nkind: Service\n";
        let err = rewrite_image(content, "r/app:v1").unwrap_err();
        assert!(matches!(err, PromotionError::DescriptorMalformed(_)));
    }

    #[test]
    fn test_every_image_line_rewritten() {
        let content = "image: old/app:1\nother: value\n  image: old/sidecar:1\n";
        let out = rewrite_image(content, "new/app:2").expect("rewrite");
        assert_eq!(out.matches("new/app:2").count(), 2);
        assert!(!out.contains("old/"));
    }

    #[test]
    fn test_list_item_image_line_keeps_dash() {
        let content = "containers:\n  - image: old/app:1\n";
        let out = rewrite_image(content, "new/app:2").expect("rewrite");
        assert!(out.contains("  - image: new/app:2"));
    }

    #[test]
    fn test_reference_with_dollar_sign_is_literal() {
        let out = rewrite_image("image: old\n", "r/app:$weird").expect("rewrite");
        assert!(out.contains("image: r/app:$weird"));
    }
}
