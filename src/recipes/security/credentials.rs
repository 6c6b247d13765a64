//! Credentials that end up somewhere they should not.

use crate::core::document::{for_each_entry, for_each_step_mut, get_str, scalar_text};
use crate::recipes::{Recipe, RecipeInfo, VisitContext};
use regex::Regex;
use serde::Deserialize;
use serde_yaml_ng::{Mapping, Value};
use std::sync::LazyLock;

// ============================================================================
// hardcoded-credentials
// ============================================================================

pub static HARDCODED_CREDENTIALS: RecipeInfo = RecipeInfo {
    name: "hardcoded-credentials",
    display_name: "Find hardcoded container credentials",
    description: "Report registry `password:` values written inline instead of read from \
                  `${{ secrets.* }}`.",
    options: &[],
};

static GITHUB_EXPRESSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{\{.*?\}\}").expect("expression regex is valid"));

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HardcodedCredentials {}

impl Recipe for HardcodedCredentials {
    fn info(&self) -> &'static RecipeInfo {
        &HARDCODED_CREDENTIALS
    }

    fn visit(&self, doc: &mut Value, ctx: &mut VisitContext) {
        for_each_entry(doc, &mut |path, key, value| {
            if key != "password" {
                return;
            }
            let Some(password) = scalar_text(value) else {
                return;
            };
            if !GITHUB_EXPRESSION.is_match(&password) {
                ctx.found(
                    path,
                    format!(
                        "Container registry password '{}' appears to be hardcoded. Use secrets \
                         (e.g., ${{{{ secrets.REGISTRY_PASSWORD }}}}) instead.",
                        password
                    ),
                );
            }
        });
    }
}

// ============================================================================
// artifact-security
// ============================================================================

pub static ARTIFACT_SECURITY: RecipeInfo = RecipeInfo {
    name: "artifact-security",
    display_name: "Find credential persistence through GitHub Actions artifacts",
    description: "Report checkouts that keep the git credential in a workflow that uploads \
                  artifacts, and uploads of paths likely to hold credentials.",
    options: &[],
};

const CHECKOUT: &str = "actions/checkout";
const UPLOAD_ARTIFACT: &str = "actions/upload-artifact";

const SENSITIVE_PATHS: &[&str] = &[
    ".ssh",
    ".aws",
    ".docker",
    ".kube",
    "~/.config",
    ".gitconfig",
    ".npmrc",
    ".pypirc",
    "/etc/passwd",
    "/etc/shadow",
    "/etc/hosts",
    "/var/log",
    "/tmp",
    "/root",
    ".bash_history",
    ".zsh_history",
    "/home",
];

const SENSITIVE_NAMES: &[&str] = &[
    "config.json",
    "credentials",
    "token",
    "secret",
    "key",
    "password",
    "passwd",
];

/// True when an upload `path` may sweep up credentials.
pub fn is_sensitive_artifact_path(path: &str) -> bool {
    if SENSITIVE_PATHS.iter().any(|p| path.contains(p)) {
        return true;
    }
    let lower = path.to_lowercase();
    if SENSITIVE_NAMES.iter().any(|n| lower.contains(n)) {
        return true;
    }
    matches!(path.trim(), "." | "~" | "/")
}

fn with_text(step: &Mapping, key: &str) -> Option<String> {
    step.get("with")
        .and_then(|with| with.get(key))
        .and_then(scalar_text)
}

fn uses_starts_with(step: &Mapping, prefix: &str) -> bool {
    get_str(step, "uses").is_some_and(|uses| uses.starts_with(prefix))
}

fn uploads_artifacts(doc: &Value) -> bool {
    let mut found = false;
    for_each_entry(doc, &mut |_, key, value| {
        if key == "uses" && value.as_str().is_some_and(|u| u.starts_with(UPLOAD_ARTIFACT)) {
            found = true;
        }
    });
    found
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ArtifactSecurity {}

impl Recipe for ArtifactSecurity {
    fn info(&self) -> &'static RecipeInfo {
        &ARTIFACT_SECURITY
    }

    fn visit(&self, doc: &mut Value, ctx: &mut VisitContext) {
        let uploads = uploads_artifacts(doc);
        for_each_step_mut(doc, &mut |path, step| {
            if uses_starts_with(step, CHECKOUT) && uploads {
                let message = match with_text(step, "persist-credentials").as_deref() {
                    None => "Checkout step does not disable credential persistence, which may \
                             expose credentials in artifacts.",
                    Some("true") => "Checkout step explicitly enables credential persistence, \
                                     which may expose credentials in artifacts.",
                    Some(_) => return,
                };
                ctx.found(&path.key("uses"), message);
            } else if uses_starts_with(step, UPLOAD_ARTIFACT)
                && with_text(step, "path").is_some_and(|p| is_sensitive_artifact_path(&p))
            {
                ctx.found(
                    &path.key("uses"),
                    "Uploading potentially sensitive paths that may contain credentials or \
                     configuration files.",
                );
            }
        });
    }
}

// ============================================================================
// trusted-publishing
// ============================================================================

pub static TRUSTED_PUBLISHING: RecipeInfo = RecipeInfo {
    name: "trusted-publishing",
    display_name: "Find manual credentials instead of trusted publishing",
    description: "Report publishing steps and commands that use long-lived registry tokens \
                  where the registry supports OIDC trusted publishing.",
    options: &[],
};

const PYPI_REGISTRIES: &[&str] = &["https://upload.pypi.org/legacy/", "https://test.pypi.org/legacy/"];
const RUBYGEMS_REGISTRIES: &[&str] = &["https://rubygems.org"];
const NPM_REGISTRIES: &[&str] = &["https://registry.npmjs.org"];

const PYPI_PUBLISH: &str = "pypa/gh-action-pypi-publish";
const RUBYGEMS_RELEASE: &str = "rubygems/release-gem";
const RUBYGEMS_CREDENTIALS: &str = "rubygems/configure-rubygems-credentials";
const SETUP_NODE: &str = "actions/setup-node";

const MANUAL_CREDENTIALS: &str = "Uses manual credentials instead of trusted publishing. Consider \
                                  using OIDC trusted publishing for better security.";

static MANUAL_PUBLISH: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?s)twine\s+(.+\s+)?upload",
        r"cargo\s+publish",
        r"npm\s+publish",
        r"(?s)yarn\s+(.+\s+)?npm\s+publish",
        r"pnpm\s+publish",
        r"gem\s+push",
        r"uv\s+publish",
        r"hatch\s+publish",
        r"pdm\s+publish",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("publish regex is valid"))
    .collect()
});

/// Whether the step's publishing action is configured with manual credentials.
fn uses_manual_credentials(uses: &str, with: &Mapping) -> bool {
    let text = |key: &str| with.get(key).and_then(scalar_text);
    let is_one_of = |key: &str, registries: &[&str]| {
        text(key).is_some_and(|url| registries.contains(&url.as_str()))
    };
    if uses.starts_with(PYPI_PUBLISH) {
        with.contains_key("password")
            && (is_one_of("repository-url", PYPI_REGISTRIES)
                || is_one_of("repository_url", PYPI_REGISTRIES))
    } else if uses.starts_with(RUBYGEMS_RELEASE) {
        text("setup-trusted-publisher").as_deref() == Some("false")
    } else if uses.starts_with(RUBYGEMS_CREDENTIALS) {
        with.contains_key("api-token") && is_one_of("gem-server", RUBYGEMS_REGISTRIES)
    } else if uses.starts_with(SETUP_NODE) {
        is_one_of("registry-url", NPM_REGISTRIES) && text("always-auth").as_deref() == Some("true")
    } else {
        false
    }
}

/// `with` keys of a publishing action that hold or enable a manual credential.
fn manual_credential_inputs(with: &Mapping) -> Vec<String> {
    with.iter()
        .filter_map(|(key, value)| {
            let key = key.as_str()?;
            let value = scalar_text(value)?;
            let manual = match key {
                "password" | "api-token" => true,
                "setup-trusted-publisher" => value == "false",
                "always-auth" => value == "true",
                _ => false,
            };
            manual.then(|| key.to_string())
        })
        .collect()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TrustedPublishing {}

impl Recipe for TrustedPublishing {
    fn info(&self) -> &'static RecipeInfo {
        &TRUSTED_PUBLISHING
    }

    fn visit(&self, doc: &mut Value, ctx: &mut VisitContext) {
        for_each_step_mut(doc, &mut |path, step| {
            if let Some(run) = get_str(step, "run") {
                if MANUAL_PUBLISH.iter().any(|re| re.is_match(run)) {
                    ctx.found(
                        &path.key("run"),
                        "Manual publishing command detected. Consider using trusted publishing \
                         actions instead.",
                    );
                }
            }

            let Some(uses) = get_str(step, "uses") else {
                return;
            };
            let publisher = [PYPI_PUBLISH, RUBYGEMS_RELEASE, RUBYGEMS_CREDENTIALS, SETUP_NODE]
                .iter()
                .any(|action| uses.starts_with(action));
            if !publisher {
                return;
            }
            let Some(with) = step.get("with").and_then(Value::as_mapping) else {
                return;
            };
            if uses_manual_credentials(uses, with) {
                ctx.found(&path.key("uses"), MANUAL_CREDENTIALS);
            }
            for key in manual_credential_inputs(with) {
                ctx.found(&path.key("with").key(&key), "Manual credential used here");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recipes::testing::{run, CI};

    fn locations(out: &crate::recipes::testing::Outcome) -> Vec<&str> {
        out.findings.iter().map(|f| f.location.as_str()).collect()
    }

    #[test]
    fn test_hardcoded_credentials() {
        let yaml = r#"
jobs:
  test:
    container:
      image: ghcr.io/org/image:1
      credentials:
        username: bot
        password: hunter2
    services:
      db:
        image: ghcr.io/org/db:1
        credentials:
          username: bot
          password: ${{ secrets.GHCR_TOKEN }}
"#;
        let out = run(&HardcodedCredentials {}, CI, yaml);
        assert_eq!(locations(&out), vec!["$.jobs.test.container.credentials.password"]);
        assert_eq!(
            out.findings[0].message,
            "Container registry password 'hunter2' appears to be hardcoded. Use secrets \
             (e.g., ${{ secrets.REGISTRY_PASSWORD }}) instead."
        );
    }

    #[test]
    fn test_sensitive_artifact_paths() {
        assert!(is_sensitive_artifact_path("~/.ssh/id_rsa"));
        assert!(is_sensitive_artifact_path("build/API_TOKEN.txt"));
        assert!(is_sensitive_artifact_path("."));
        assert!(!is_sensitive_artifact_path("dist/"));
        assert!(!is_sensitive_artifact_path("target/site"));
    }

    #[test]
    fn test_artifact_security() {
        let yaml = r#"
jobs:
  build:
    steps:
      - uses: actions/checkout@v4
      - uses: actions/checkout@v4
        with:
          persist-credentials: true
      - uses: actions/checkout@v4
        with:
          persist-credentials: false
      - uses: actions/upload-artifact@v4
        with:
          path: .
      - uses: actions/upload-artifact@v4
        with:
          path: dist/
"#;
        let out = run(&ArtifactSecurity {}, CI, yaml);
        assert_eq!(
            locations(&out),
            vec![
                "$.jobs.build.steps[0].uses",
                "$.jobs.build.steps[1].uses",
                "$.jobs.build.steps[3].uses"
            ]
        );
        assert!(out.findings[0].message.contains("does not disable"));
        assert!(out.findings[1].message.contains("explicitly enables"));
    }

    #[test]
    fn test_checkout_without_upload_is_fine() {
        let out = run(
            &ArtifactSecurity {},
            CI,
            "jobs:\n  b:\n    steps:\n      - uses: actions/checkout@v4\n",
        );
        assert!(out.findings.is_empty());
    }

    #[test]
    fn test_trusted_publishing_actions() {
        let yaml = r#"
jobs:
  release:
    steps:
      - uses: pypa/gh-action-pypi-publish@release/v1
        with:
          password: ${{ secrets.PYPI_TOKEN }}
          repository-url: https://upload.pypi.org/legacy/
      - uses: actions/setup-node@v4
        with:
          registry-url: https://registry.npmjs.org
          always-auth: true
      - uses: rubygems/release-gem@v1
        with:
          setup-trusted-publisher: false
      - uses: pypa/gh-action-pypi-publish@release/v1
"#;
        let out = run(&TrustedPublishing {}, CI, yaml);
        assert_eq!(
            locations(&out),
            vec![
                "$.jobs.release.steps[0].uses",
                "$.jobs.release.steps[0].with.password",
                "$.jobs.release.steps[1].uses",
                "$.jobs.release.steps[1].with.always-auth",
                "$.jobs.release.steps[2].uses",
                "$.jobs.release.steps[2].with.setup-trusted-publisher"
            ]
        );
        assert_eq!(out.findings[0].message, MANUAL_CREDENTIALS);
        assert!(out.edits.is_empty());
    }

    #[test]
    fn test_trusted_publishing_commands() {
        let yaml = r#"
jobs:
  release:
    steps:
      - run: twine upload dist/*
      - run: cargo publish --token ${{ secrets.CRATES_TOKEN }}
      - run: cargo build --release
"#;
        let out = run(&TrustedPublishing {}, CI, yaml);
        assert_eq!(
            locations(&out),
            vec!["$.jobs.release.steps[0].run", "$.jobs.release.steps[1].run"]
        );
    }
}
