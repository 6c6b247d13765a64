//! `actions/setup-node` version upgrade.

use super::setup_java::upgrade_tool_version;
use super::{Recipe, RecipeInfo, VisitContext};
use serde::Deserialize;
use serde_yaml_ng::Value;

pub static UPGRADE_NODE_VERSION: RecipeInfo = RecipeInfo {
    name: "setup-node-upgrade-node-version",
    display_name: "Upgrade `actions/setup-node` `node-version`",
    description: "Raise `with.node-version` of setup-node steps to at least the given major.",
    options: &["minimum-node-major-version: lowest acceptable major (default 24)"],
};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct UpgradeNodeVersion {
    #[serde(default = "default_node_major")]
    pub minimum_node_major_version: u32,
}

fn default_node_major() -> u32 {
    24
}

impl Recipe for UpgradeNodeVersion {
    fn info(&self) -> &'static RecipeInfo {
        &UPGRADE_NODE_VERSION
    }

    fn validate(&self) -> Vec<String> {
        if self.minimum_node_major_version == 0 {
            return vec!["minimum-node-major-version must be positive".to_string()];
        }
        Vec::new()
    }

    fn visit(&self, doc: &mut Value, ctx: &mut VisitContext) {
        upgrade_tool_version(
            doc,
            ctx,
            "actions/setup-node",
            "node-version",
            self.minimum_node_major_version,
        );
    }
}
