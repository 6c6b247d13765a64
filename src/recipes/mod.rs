//! Recipes: small named rules that match and rewrite workflow and Dependabot
//! YAML.
//!
//! Each recipe is a serde struct (its options, straight from `ghrewrite.yaml`)
//! plus a [`Recipe`] impl that visits one parsed document. Recipes never fail:
//! shapes they do not recognize are left alone.

pub mod actions;
pub mod cancel;
pub mod cron;
pub mod dependabot;
pub mod gradle;
pub mod inputs;
pub mod runners;
pub mod search;
pub mod secrets;
pub mod security;
pub mod setup_java;
pub mod setup_node;
pub mod setup_python;
pub mod slack;
pub mod triggers;

use crate::core::document::YamlPath;
use crate::core::error::{Error, Result};
use crate::core::source;
use crate::core::types::{Edit, Finding};
use serde::Deserialize;
use serde_yaml_ng::{Mapping, Value};
use std::path::Path;

/// Static description of a recipe, used by `ghrewrite recipes`.
#[derive(Debug)]
pub struct RecipeInfo {
    /// Tag used in `recipe:` fields
    pub name: &'static str,
    pub display_name: &'static str,
    pub description: &'static str,
    /// Options as `name: meaning` lines
    pub options: &'static [&'static str],
}

/// A rule applied to every document of every matching file.
pub trait Recipe: std::fmt::Debug {
    fn info(&self) -> &'static RecipeInfo;

    /// Whether the file at `path` (repository-relative) is a target.
    fn applies_to(&self, path: &Path) -> bool {
        source::is_workflow(path)
    }

    /// Parameter problems, one message each. Empty means valid.
    fn validate(&self) -> Vec<String> {
        Vec::new()
    }

    /// Rewrite `doc` in place, recording edits and findings on `ctx`.
    fn visit(&self, doc: &mut Value, ctx: &mut VisitContext);
}

/// Per-file state handed to recipes.
#[derive(Debug)]
pub struct VisitContext<'a> {
    /// Repository root on disk
    pub root: &'a Path,
    /// File being visited, relative to `root`
    pub path: &'a Path,
    /// File text as read, for checks that need comments
    pub text: &'a str,
    recipe: &'static str,
    pub edits: Vec<Edit>,
    pub findings: Vec<Finding>,
}

impl<'a> VisitContext<'a> {
    pub fn new(root: &'a Path, path: &'a Path) -> Self {
        Self {
            root,
            path,
            text: "",
            recipe: "",
            edits: Vec::new(),
            findings: Vec::new(),
        }
    }

    pub fn with_text(mut self, text: &'a str) -> Self {
        self.text = text;
        self
    }

    /// Set the recipe that subsequent edits and findings are attributed to.
    pub fn enter(&mut self, recipe: &'static str) {
        self.recipe = recipe;
    }

    pub fn edited(&mut self, location: &YamlPath, detail: impl Into<String>) {
        let detail = detail.into();
        tracing::debug!(
            recipe = self.recipe,
            file = %self.path.display(),
            %location,
            "{}",
            detail
        );
        self.edits.push(Edit {
            recipe: self.recipe.to_string(),
            location: location.to_string(),
            detail,
        });
    }

    pub fn found(&mut self, location: &YamlPath, message: impl Into<String>) {
        self.findings.push(Finding {
            recipe: self.recipe.to_string(),
            location: location.to_string(),
            message: message.into(),
        });
    }
}

/// One recipe invocation from `ghrewrite.yaml`, tagged by `recipe:`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "recipe", rename_all = "kebab-case")]
pub enum RecipeSpec {
    SetupJavaAdoptOpenjdkToTemurin(setup_java::AdoptOpenJdkToTemurin),
    SetupJavaAdoptOpenj9ToSemeru(setup_java::AdoptOpenJ9ToSemeru),
    PreferTemurinDistributions(setup_java::PreferTemurinDistributions),
    ReplaceSetupJavaDistribution(setup_java::ReplaceDistribution),
    SetupJavaUpgradeJavaVersion(setup_java::UpgradeJavaVersion),
    SetupJavaCaching(setup_java::SetupJavaCaching),
    SetupNodeUpgradeNodeVersion(setup_node::UpgradeNodeVersion),
    AddCronTrigger(triggers::AddCronTrigger),
    RemoveAllCronTriggers(triggers::RemoveAllCronTriggers),
    AddManualTrigger(triggers::AddManualTrigger),
    AutoCancelInProgressWorkflow(cancel::AutoCancelInProgressWorkflow),
    ChangeDependabotScheduleInterval(dependabot::ChangeScheduleInterval),
    AddDependabotCooldown(dependabot::AddCooldown),
    ReplaceRunners(runners::ReplaceRunners),
    ChangeAction(actions::ChangeAction),
    ChangeActionVersion(actions::ChangeActionVersion),
    ReplaceSecrets(secrets::ReplaceSecrets),
    ReplaceSecretKeys(secrets::ReplaceSecretKeys),
    PreferSecretsInheritWorkflow(secrets::PreferSecretsInherit),
    RemoveWorkflowInputArgument(inputs::RemoveWorkflowInputArgument),
    RemoveUnusedWorkflowDispatchInputs(inputs::RemoveUnusedDispatchInputs),
    UseGradleWrapper(gradle::UseGradleWrapper),
    UpgradeSlackNotificationVersion2(slack::UpgradeSlackNotification),
    FindMissingTimeout(search::FindMissingTimeout),
    FindUnpinnedActions(search::FindUnpinnedActions),
    SetupPythonToUv(setup_python::SetupPythonToUv),
    TemplateInjection(security::injection::TemplateInjection),
    GithubEnv(security::injection::GithubEnv),
    InsecureCommands(security::injection::InsecureCommands),
    Obfuscation(security::injection::Obfuscation),
    ExcessivePermissions(security::access::ExcessivePermissions),
    DangerousTriggers(security::access::DangerousTriggers),
    SecretsInherit(security::access::SecretsInherit),
    SelfHostedRunner(security::access::SelfHostedRunner),
    BotConditions(security::access::BotConditions),
    AnonymousJobs(security::access::AnonymousJobs),
    UnpinnedDockerImages(security::supply_chain::UnpinnedDockerImages),
    ForbiddenUses(security::supply_chain::ForbiddenUses),
    RefVersionMismatch(security::supply_chain::RefVersionMismatch),
    CachePoisoning(security::supply_chain::CachePoisoning),
    HardcodedCredentials(security::credentials::HardcodedCredentials),
    ArtifactSecurity(security::credentials::ArtifactSecurity),
    TrustedPublishing(security::credentials::TrustedPublishing),
}

impl RecipeSpec {
    pub fn recipe(&self) -> &dyn Recipe {
        match self {
            Self::SetupJavaAdoptOpenjdkToTemurin(r) => r,
            Self::SetupJavaAdoptOpenj9ToSemeru(r) => r,
            Self::PreferTemurinDistributions(r) => r,
            Self::ReplaceSetupJavaDistribution(r) => r,
            Self::SetupJavaUpgradeJavaVersion(r) => r,
            Self::SetupJavaCaching(r) => r,
            Self::SetupNodeUpgradeNodeVersion(r) => r,
            Self::AddCronTrigger(r) => r,
            Self::RemoveAllCronTriggers(r) => r,
            Self::AddManualTrigger(r) => r,
            Self::AutoCancelInProgressWorkflow(r) => r,
            Self::ChangeDependabotScheduleInterval(r) => r,
            Self::AddDependabotCooldown(r) => r,
            Self::ReplaceRunners(r) => r,
            Self::ChangeAction(r) => r,
            Self::ChangeActionVersion(r) => r,
            Self::ReplaceSecrets(r) => r,
            Self::ReplaceSecretKeys(r) => r,
            Self::PreferSecretsInheritWorkflow(r) => r,
            Self::RemoveWorkflowInputArgument(r) => r,
            Self::RemoveUnusedWorkflowDispatchInputs(r) => r,
            Self::UseGradleWrapper(r) => r,
            Self::UpgradeSlackNotificationVersion2(r) => r,
            Self::FindMissingTimeout(r) => r,
            Self::FindUnpinnedActions(r) => r,
            Self::SetupPythonToUv(r) => r,
            Self::TemplateInjection(r) => r,
            Self::GithubEnv(r) => r,
            Self::InsecureCommands(r) => r,
            Self::Obfuscation(r) => r,
            Self::ExcessivePermissions(r) => r,
            Self::DangerousTriggers(r) => r,
            Self::SecretsInherit(r) => r,
            Self::SelfHostedRunner(r) => r,
            Self::BotConditions(r) => r,
            Self::AnonymousJobs(r) => r,
            Self::UnpinnedDockerImages(r) => r,
            Self::ForbiddenUses(r) => r,
            Self::RefVersionMismatch(r) => r,
            Self::CachePoisoning(r) => r,
            Self::HardcodedCredentials(r) => r,
            Self::ArtifactSecurity(r) => r,
            Self::TrustedPublishing(r) => r,
        }
    }

    pub fn name(&self) -> &'static str {
        self.recipe().info().name
    }
}

/// Every known recipe, in the order `ghrewrite recipes` lists them.
pub fn catalog() -> Vec<&'static RecipeInfo> {
    vec![
        &setup_java::ADOPT_TO_TEMURIN,
        &setup_java::ADOPT_OPENJ9_TO_SEMERU,
        &setup_java::PREFER_TEMURIN,
        &setup_java::REPLACE_DISTRIBUTION,
        &setup_java::UPGRADE_JAVA_VERSION,
        &setup_java::CACHING,
        &setup_node::UPGRADE_NODE_VERSION,
        &triggers::ADD_CRON_TRIGGER,
        &triggers::REMOVE_ALL_CRON_TRIGGERS,
        &triggers::ADD_MANUAL_TRIGGER,
        &cancel::AUTO_CANCEL,
        &dependabot::CHANGE_SCHEDULE_INTERVAL,
        &dependabot::ADD_COOLDOWN,
        &runners::REPLACE_RUNNERS,
        &actions::CHANGE_ACTION,
        &actions::CHANGE_ACTION_VERSION,
        &secrets::REPLACE_SECRETS,
        &secrets::REPLACE_SECRET_KEYS,
        &secrets::PREFER_SECRETS_INHERIT,
        &inputs::REMOVE_WORKFLOW_INPUT_ARGUMENT,
        &inputs::REMOVE_UNUSED_DISPATCH_INPUTS,
        &gradle::USE_GRADLE_WRAPPER,
        &slack::UPGRADE_SLACK_NOTIFICATION,
        &search::FIND_MISSING_TIMEOUT,
        &search::FIND_UNPINNED_ACTIONS,
        &setup_python::SETUP_PYTHON_TO_UV,
        &security::injection::TEMPLATE_INJECTION,
        &security::injection::GITHUB_ENV,
        &security::injection::INSECURE_COMMANDS,
        &security::injection::OBFUSCATION,
        &security::access::EXCESSIVE_PERMISSIONS,
        &security::access::DANGEROUS_TRIGGERS,
        &security::access::SECRETS_INHERIT,
        &security::access::SELF_HOSTED_RUNNER,
        &security::access::BOT_CONDITIONS,
        &security::access::ANONYMOUS_JOBS,
        &security::supply_chain::UNPINNED_DOCKER_IMAGES,
        &security::supply_chain::FORBIDDEN_USES,
        &security::supply_chain::REF_VERSION_MISMATCH,
        &security::supply_chain::CACHE_POISONING,
        &security::credentials::HARDCODED_CREDENTIALS,
        &security::credentials::ARTIFACT_SECURITY,
        &security::credentials::TRUSTED_PUBLISHING,
    ]
}

/// Build a recipe from a name and `key=value` options, as given on the
/// command line. Values are parsed as YAML scalars or flow collections, so
/// `runners=[a, b]` and `minimum-java-major-version=17` both work.
pub fn from_options(name: &str, options: &[String]) -> Result<RecipeSpec> {
    if !catalog().iter().any(|info| info.name == name) {
        return Err(Error::UnknownRecipe(name.to_string()));
    }

    let mut mapping = Mapping::new();
    mapping.insert("recipe".into(), name.into());
    for option in options {
        let (key, raw) = option
            .split_once('=')
            .ok_or_else(|| Error::InvalidOption(option.clone()))?;
        let value = serde_yaml_ng::from_str::<Value>(raw)
            .unwrap_or_else(|_| Value::String(raw.to_string()));
        mapping.insert(key.trim().into(), value);
    }

    serde_yaml_ng::from_value(Value::Mapping(mapping)).map_err(Error::ConfigParse)
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_names_unique() {
        let mut names: Vec<_> = catalog().iter().map(|i| i.name).collect();
        let total = names.len();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), total);
        assert_eq!(total, 43);
    }

    #[test]
    fn test_spec_from_yaml_tag() {
        let spec: RecipeSpec = serde_yaml_ng::from_str(
            "recipe: setup-java-upgrade-java-version\nminimum-java-major-version: 17\n",
        )
        .unwrap();
        assert_eq!(spec.name(), "setup-java-upgrade-java-version");
    }

    #[test]
    fn test_every_catalog_name_resolves_to_its_spec() {
        // Recipes with required options are built with placeholder values.
        let required: &[(&str, &[&str])] = &[
            ("replace-setup-java-distribution", &["from=[adopt]", "to=temurin"]),
            ("add-cron-trigger", &["cron=0 18 * * *"]),
            (
                "change-dependabot-schedule-interval",
                &["package-ecosystem=maven", "interval=weekly"],
            ),
            ("replace-runners", &["job-name=build", "runners=[ubuntu-latest]"]),
            ("change-action", &["old-action=a/b", "new-action=c/d", "new-version=v1"]),
            ("change-action-version", &["action=a/b", "version=v2"]),
            ("replace-secrets", &["old-secret-name=A", "new-secret-name=B"]),
            ("replace-secret-keys", &["old-key-name=a", "new-key-name=b"]),
            (
                "remove-workflow-input-argument",
                &["workflow-reference=o/r/.github/workflows/w.yml", "version=v1", "input-argument-name=x"],
            ),
        ];
        for info in catalog() {
            let opts: Vec<String> = required
                .iter()
                .find(|(n, _)| *n == info.name)
                .map(|(_, o)| o.iter().map(|s| s.to_string()).collect())
                .unwrap_or_default();
            let spec = from_options(info.name, &opts)
                .unwrap_or_else(|e| panic!("{}: {}", info.name, e));
            assert_eq!(spec.name(), info.name);
        }
    }

    #[test]
    fn test_from_options_unknown_recipe() {
        let err = from_options("no-such-recipe", &[]).unwrap_err();
        assert!(matches!(err, Error::UnknownRecipe(_)));
    }

    #[test]
    fn test_from_options_bad_pair() {
        let err = from_options("add-cron-trigger", &["cron".to_string()]).unwrap_err();
        assert!(matches!(err, Error::InvalidOption(_)));
    }

    #[test]
    fn test_from_options_unknown_field_rejected() {
        let err = from_options("remove-all-cron-triggers", &["bogus=1".to_string()]);
        assert!(err.is_err());
    }

    #[test]
    fn test_context_attributes_edits() {
        let mut ctx = VisitContext::new(Path::new("."), Path::new(testing::CI));
        ctx.enter("replace-runners");
        ctx.edited(&YamlPath::root().key("jobs"), "x");
        ctx.found(&YamlPath::root(), "y");
        assert_eq!(ctx.edits[0].recipe, "replace-runners");
        assert_eq!(ctx.edits[0].location, "$.jobs");
        assert_eq!(ctx.findings[0].message, "y");
    }
}
