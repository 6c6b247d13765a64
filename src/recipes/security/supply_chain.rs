//! What a workflow pulls in, and whether a reference can move under it.

use super::events;
use crate::core::document::{for_each_entry, get_str};
use crate::recipes::actions::ActionRef;
use crate::recipes::{Recipe, RecipeInfo, VisitContext};
use regex::Regex;
use serde::Deserialize;
use serde_yaml_ng::Value;
use std::sync::LazyLock;

// ============================================================================
// unpinned-docker-images
// ============================================================================

pub static UNPINNED_DOCKER_IMAGES: RecipeInfo = RecipeInfo {
    name: "unpinned-docker-images",
    display_name: "Pin Docker images to digests",
    description: "Report container and service `image:` references not pinned to a \
                  `sha256` digest. Tags can be repointed by the image author; digests cannot.",
    options: &[],
};

static SHA256_DIGEST: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^sha256:[a-f0-9]{64}$").expect("digest regex is valid"));

pub fn is_unpinned_image(image: &str) -> bool {
    let image = image.strip_prefix("docker://").unwrap_or(image);
    match image.split_once('@') {
        Some((_, digest)) => !SHA256_DIGEST.is_match(digest),
        None => true,
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UnpinnedDockerImages {}

impl Recipe for UnpinnedDockerImages {
    fn info(&self) -> &'static RecipeInfo {
        &UNPINNED_DOCKER_IMAGES
    }

    fn visit(&self, doc: &mut Value, ctx: &mut VisitContext) {
        for_each_entry(doc, &mut |path, key, value| {
            let Some(image) = value.as_str().filter(|_| key == "image") else {
                return;
            };
            if is_unpinned_image(image) {
                ctx.found(
                    path,
                    format!(
                        "Docker image '{}' is not pinned to a digest. Consider pinning to a \
                         specific digest for security and reproducibility.",
                        image
                    ),
                );
            }
        });
    }
}

// ============================================================================
// forbidden-uses
// ============================================================================

pub static FORBIDDEN_USES: RecipeInfo = RecipeInfo {
    name: "forbidden-uses",
    display_name: "Find forbidden action usage",
    description: "Report actions with known vulnerabilities, names matching suspicious \
                  patterns, or single-character owners.",
    options: &[
        "additional-dangerous-actions: extra `owner/repo@ref` values to flag",
        "additional-suspicious-patterns: extra substrings to flag",
    ],
};

const KNOWN_DANGEROUS_ACTIONS: &[&str] = &[
    "actions/checkout@v1",
    "actions/checkout@v2",
    "actions/setup-node@v1",
    "actions/setup-node@v2",
    "actions/cache@v1",
    "actions/cache@v2",
];

const SUSPICIOUS_PATTERNS: &[&str] = &[
    "run",
    "exec",
    "eval",
    "malicious-org/",
    "download-and-run",
    "execute-script",
];

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ForbiddenUses {
    #[serde(default)]
    pub additional_dangerous_actions: Vec<String>,

    #[serde(default)]
    pub additional_suspicious_patterns: Vec<String>,
}

impl ForbiddenUses {
    pub fn violation(&self, uses: &str) -> Option<String> {
        let action = ActionRef::parse(uses);
        if action.is_local() || action.is_docker() {
            return None;
        }

        let dangerous = KNOWN_DANGEROUS_ACTIONS.contains(&uses)
            || self.additional_dangerous_actions.iter().any(|d| d == uses);
        if dangerous {
            return Some(format!(
                "Action '{}' is known to have security vulnerabilities. Consider upgrading to a \
                 more recent version or using an alternative.",
                uses
            ));
        }

        let lower = uses.to_lowercase();
        let longest = SUSPICIOUS_PATTERNS
            .iter()
            .copied()
            .chain(self.additional_suspicious_patterns.iter().map(String::as_str))
            .filter(|pattern| lower.contains(&pattern.to_lowercase()))
            .max_by_key(|pattern| pattern.len());
        if let Some(pattern) = longest {
            return Some(format!(
                "Action '{}' contains suspicious pattern '{}'. Review this action carefully for \
                 potential security risks.",
                uses, pattern
            ));
        }

        let owner = action.owner().filter(|_| !uses.starts_with("actions/"))?;
        (owner.chars().count() == 1).then(|| {
            format!(
                "Action '{}' is from a single-character organization '{}' which may be \
                 suspicious. Verify the action's authenticity.",
                uses, owner
            )
        })
    }
}

impl Recipe for ForbiddenUses {
    fn info(&self) -> &'static RecipeInfo {
        &FORBIDDEN_USES
    }

    fn validate(&self) -> Vec<String> {
        // An empty pattern matches every action.
        if self.additional_suspicious_patterns.iter().any(|p| p.trim().is_empty()) {
            return vec!["additional-suspicious-patterns must not contain empty patterns".to_string()];
        }
        Vec::new()
    }

    fn visit(&self, doc: &mut Value, ctx: &mut VisitContext) {
        for_each_entry(doc, &mut |path, key, value| {
            let Some(uses) = value.as_str().filter(|_| key == "uses") else {
                return;
            };
            if let Some(message) = self.violation(uses) {
                ctx.found(path, message);
            }
        });
    }
}

// ============================================================================
// ref-version-mismatch
// ============================================================================

pub static REF_VERSION_MISMATCH: RecipeInfo = RecipeInfo {
    name: "ref-version-mismatch",
    display_name: "Find commit SHAs with potentially mismatched version comments",
    description: "Report actions pinned to a commit SHA that carry a version comment, so the \
                  comment can be checked against what the SHA really is.",
    options: &[],
};

static FULL_SHA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-f0-9]{40}$").expect("sha regex is valid"));

static VERSION_COMMENTS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"#\s*tag\s*=\s*[vV]?\d+(\.\d+)*",
        r"#\s*v?\d+(\.\d+)*\s*$",
        r"#\s*(version|ver)\s*[:=]\s*v?\d+(\.\d+)*",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("version comment regex is valid"))
    .collect()
});

fn is_version_comment(line: &str) -> bool {
    VERSION_COMMENTS.iter().any(|re| re.is_match(line))
}

/// True when a line referencing `uses` carries a version comment, either
/// trailing on the same line or on the comment lines right above it.
fn has_version_comment(text: &str, uses: &str) -> bool {
    let lines: Vec<&str> = text.lines().collect();
    lines.iter().enumerate().any(|(i, line)| {
        let Some(at) = line.find(uses) else {
            return false;
        };
        if is_version_comment(&line[at + uses.len()..]) {
            return true;
        }
        lines[..i]
            .iter()
            .rev()
            .take_while(|above| above.trim_start().starts_with('#'))
            .any(|above| is_version_comment(above))
    })
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RefVersionMismatch {}

impl Recipe for RefVersionMismatch {
    fn info(&self) -> &'static RecipeInfo {
        &REF_VERSION_MISMATCH
    }

    fn visit(&self, doc: &mut Value, ctx: &mut VisitContext) {
        let text = ctx.text;
        for_each_entry(doc, &mut |path, key, value| {
            let Some(uses) = value.as_str().filter(|_| key == "uses") else {
                return;
            };
            let action = ActionRef::parse(uses);
            if action.is_local() || action.is_docker() {
                return;
            }
            if !action.version.is_some_and(|v| FULL_SHA.is_match(v)) {
                return;
            }
            if has_version_comment(text, uses) {
                ctx.found(
                    path,
                    "Action is pinned to a commit SHA but has a version comment that may not \
                     match. Verify the comment reflects the actual pinned version.",
                );
            }
        });
    }
}

// ============================================================================
// cache-poisoning
// ============================================================================

pub static CACHE_POISONING: RecipeInfo = RecipeInfo {
    name: "cache-poisoning",
    display_name: "Find cache poisoning vulnerabilities",
    description: "Report caching actions in workflows that publish artifacts, where a \
                  poisoned cache could end up in a release.",
    options: &[],
};

const CACHE_AWARE_ACTIONS: &[&str] = &[
    "actions/cache",
    "actions/setup-java",
    "actions/setup-go",
    "actions/setup-node",
    "actions/setup-python",
    "actions/setup-dotnet",
    "astral-sh/setup-uv",
    "Swatinem/rust-cache",
    "ruby/setup-ruby",
    "PyO3/maturin-action",
    "mlugg/setup-zig",
    "oven-sh/setup-bun",
    "DeterminateSystems/magic-nix-cache-action",
    "graalvm/setup-graalvm",
    "gradle/actions/setup-gradle",
    "docker/setup-buildx-action",
    "actions-rust-lang/setup-rust-toolchain",
    "Mozilla-Actions/sccache-action",
    "nix-community/cache-nix-action",
    "jdx/mise-action",
];

const PUBLISHER_ACTIONS: &[&str] = &[
    "pypa/gh-action-pypi-publish",
    "rubygems/release-gem",
    "jreleaser/release-action",
    "goreleaser/goreleaser-action",
    "softprops/action-gh-release",
    "release-drafter/release-drafter",
    "googleapis/release-please-action",
    "docker/build-push-action",
    "redhat-actions/push-to-registry",
];

/// A push that builds tags or release branches.
fn is_release_push(push: &Value) -> bool {
    let Some(push) = push.as_mapping() else {
        return false;
    };
    for (key, value) in push {
        match key.as_str() {
            Some("tags") => return true,
            Some("branches") => {
                return value.as_sequence().is_some_and(|branches| {
                    branches
                        .iter()
                        .filter_map(Value::as_str)
                        .any(|b| b.to_lowercase().contains("release"))
                })
            }
            _ => {}
        }
    }
    false
}

fn publishes_on_trigger(doc: &Value) -> bool {
    if events(doc).contains(&"release") {
        return true;
    }
    doc.get("on")
        .and_then(|on| on.get("push"))
        .is_some_and(is_release_push)
}

/// True when any job step uses a publisher action.
fn has_publisher_step(doc: &Value) -> bool {
    let Some(jobs) = doc.get("jobs").and_then(Value::as_mapping) else {
        return false;
    };
    jobs.values().any(|job| {
        job.get("steps")
            .and_then(Value::as_sequence)
            .is_some_and(|steps| {
                steps
                    .iter()
                    .filter_map(Value::as_mapping)
                    .filter_map(|step| get_str(step, "uses"))
                    .any(|uses| PUBLISHER_ACTIONS.contains(&ActionRef::parse(uses).name))
            })
    })
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CachePoisoning {}

impl Recipe for CachePoisoning {
    fn info(&self) -> &'static RecipeInfo {
        &CACHE_POISONING
    }

    fn visit(&self, doc: &mut Value, ctx: &mut VisitContext) {
        if !publishes_on_trigger(doc) && !has_publisher_step(doc) {
            return;
        }
        for_each_entry(doc, &mut |path, key, value| {
            let Some(uses) = value.as_str().filter(|_| key == "uses") else {
                return;
            };
            let name = ActionRef::parse(uses).name;
            if CACHE_AWARE_ACTIONS.contains(&name) {
                ctx.found(
                    path,
                    format!(
                        "Action '{}' uses caching in a workflow that publishes artifacts. This \
                         could lead to cache poisoning where malicious content gets cached and \
                         included in published artifacts. Consider disabling caching for this \
                         step or using read-only cache mode.",
                        name
                    ),
                );
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recipes::testing::{run, CI};

    const SHA: &str = "8ade135a41bc03ea155e62e844d188df1ea18608";

    fn locations(out: &crate::recipes::testing::Outcome) -> Vec<&str> {
        out.findings.iter().map(|f| f.location.as_str()).collect()
    }

    #[test]
    fn test_unpinned_images() {
        assert!(is_unpinned_image("node:18"));
        assert!(is_unpinned_image("docker://alpine:latest"));
        assert!(is_unpinned_image("redis@sha256:short"));
        assert!(!is_unpinned_image(&format!("redis@sha256:{}", "a".repeat(64))));
    }

    #[test]
    fn test_unpinned_docker_images_recipe() {
        let yaml = format!(
            r#"
jobs:
  test:
    container:
      image: node:18
    services:
      db:
        image: postgres@sha256:{}
"#,
            "0".repeat(64)
        );
        let out = run(&UnpinnedDockerImages {}, CI, &yaml);
        assert_eq!(locations(&out), vec!["$.jobs.test.container.image"]);
        assert!(out.findings[0].message.starts_with("Docker image 'node:18'"));
    }

    #[test]
    fn test_forbidden_uses() {
        let recipe = ForbiddenUses::default();
        assert!(recipe
            .violation("actions/checkout@v2")
            .is_some_and(|m| m.contains("known to have security vulnerabilities")));
        assert!(recipe
            .violation("someone/download-and-run@v1")
            .is_some_and(|m| m.contains("suspicious pattern 'download-and-run'")));
        assert!(recipe
            .violation("x/toolkit@v1")
            .is_some_and(|m| m.contains("single-character organization 'x'")));
        assert!(recipe.violation("actions/checkout@v4").is_none());
        assert!(recipe.violation("./local/exec").is_none());
    }

    #[test]
    fn test_forbidden_uses_additions() {
        let recipe: ForbiddenUses = serde_yaml_ng::from_str(
            "additional-dangerous-actions: [acme/deploy@v1]\nadditional-suspicious-patterns: [miner]\n",
        )
        .unwrap();
        let yaml = r#"
jobs:
  a:
    steps:
      - uses: acme/deploy@v1
      - uses: acme/crypto-miner@v2
      - uses: acme/deploy@v2
"#;
        let out = run(&recipe, CI, yaml);
        assert_eq!(
            locations(&out),
            vec!["$.jobs.a.steps[0].uses", "$.jobs.a.steps[1].uses"]
        );
    }

    #[test]
    fn test_forbidden_uses_rejects_empty_pattern() {
        let recipe = ForbiddenUses {
            additional_suspicious_patterns: vec![" ".to_string()],
            ..Default::default()
        };
        assert_eq!(recipe.validate().len(), 1);
    }

    #[test]
    fn test_ref_version_mismatch() {
        let yaml = format!(
            r#"
jobs:
  test:
    steps:
      # tag=v3
      - uses: actions/checkout@{sha}
      - uses: actions/setup-node@b39b52d1213e96004bfcb1c61a8a6fa8ab84f3e8 # v4.0.2
      - uses: actions/cache@26f96dfa697d77e81fd5907df203aa23a56210a8
      - uses: actions/upload-artifact@v4 # v4
"#,
            sha = SHA
        );
        let out = run(&RefVersionMismatch {}, CI, &yaml);
        assert_eq!(
            locations(&out),
            vec!["$.jobs.test.steps[0].uses", "$.jobs.test.steps[1].uses"]
        );
    }

    #[test]
    fn test_version_comment_shapes() {
        assert!(is_version_comment("# version: v2.8.0"));
        assert!(is_version_comment("  # v4"));
        assert!(is_version_comment("# tag=V1"));
        assert!(!is_version_comment("# pinned for reproducibility"));
    }

    #[test]
    fn test_cache_poisoning_on_release() {
        let yaml = r#"
on:
  release:
    types: [published]
jobs:
  build:
    steps:
      - uses: actions/checkout@v4
      - uses: actions/setup-java@v4
      - uses: Swatinem/rust-cache@v2
"#;
        let out = run(&CachePoisoning {}, CI, yaml);
        assert_eq!(
            locations(&out),
            vec!["$.jobs.build.steps[1].uses", "$.jobs.build.steps[2].uses"]
        );
        assert!(out.findings[0].message.starts_with("Action 'actions/setup-java'"));
    }

    #[test]
    fn test_cache_poisoning_publisher_step_or_release_branch() {
        let publisher = r#"
on: push
jobs:
  publish:
    steps:
      - uses: actions/setup-python@v5
      - uses: pypa/gh-action-pypi-publish@release/v1
"#;
        assert_eq!(run(&CachePoisoning {}, CI, publisher).findings.len(), 1);

        let branches = "on:\n  push:\n    branches: [Release-1.x]\njobs:\n  b:\n    steps:\n      - uses: actions/cache@v4\n";
        assert_eq!(run(&CachePoisoning {}, CI, branches).findings.len(), 1);

        let plain = "on:\n  push:\n    branches: [main]\njobs:\n  b:\n    steps:\n      - uses: actions/cache@v4\n";
        assert!(run(&CachePoisoning {}, CI, plain).findings.is_empty());
    }
}
