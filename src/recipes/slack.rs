//! Migrate `slackapi/slack-github-action` v1 steps to the v2 input format.

use super::{Recipe, RecipeInfo, VisitContext};
use crate::core::document::{for_each_step_mut, get_str, scalar_text};
use serde::Deserialize;
use serde_yaml_ng::{Mapping, Value};

pub const SLACK_V2: &str = "slackapi/slack-github-action@v2.0.0";
const SLACK_V1_PREFIX: &str = "slackapi/slack-github-action@v1";

pub static UPGRADE_SLACK_NOTIFICATION: RecipeInfo = RecipeInfo {
    name: "upgrade-slack-notification-version2",
    display_name: "Upgrade `slackapi/slack-github-action`",
    description: "Update the Slack GitHub Action to version 2.0, moving the channel and message \
                  into a chat.postMessage payload.",
    options: &[],
};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpgradeSlackNotification {}

/// Inputs a v1 step needs for the rewrite.
struct V1Inputs {
    token: String,
    channel: String,
    message: String,
}

impl V1Inputs {
    fn read(step: &Mapping) -> Option<Self> {
        let text = |section: &str, key: &str| {
            step.get(section)
                .and_then(|s| s.get(key))
                .and_then(scalar_text)
        };
        Some(Self {
            token: text("env", "SLACK_BOT_TOKEN")?,
            channel: text("with", "channel-id")?,
            message: text("with", "slack-message")?,
        })
    }

    /// Payload block, with both values as double-quoted YAML strings.
    fn payload(&self) -> String {
        format!(
            "channel: {}\ntext: {}\n",
            quoted(&self.channel),
            quoted(&self.message)
        )
    }
}

/// JSON string literals are valid double-quoted YAML scalars.
fn quoted(text: &str) -> String {
    serde_json::to_string(text).unwrap_or_else(|_| format!("\"{}\"", text))
}

impl Recipe for UpgradeSlackNotification {
    fn info(&self) -> &'static RecipeInfo {
        &UPGRADE_SLACK_NOTIFICATION
    }

    fn visit(&self, doc: &mut Value, ctx: &mut VisitContext) {
        for_each_step_mut(doc, &mut |path, step| {
            if !get_str(step, "uses").is_some_and(|u| u.starts_with(SLACK_V1_PREFIX)) {
                return;
            }
            let Some(inputs) = V1Inputs::read(step) else {
                return;
            };

            let env_emptied = match step.get_mut("env").and_then(Value::as_mapping_mut) {
                Some(env) => {
                    env.shift_remove("SLACK_BOT_TOKEN");
                    env.is_empty()
                }
                None => false,
            };
            if env_emptied {
                step.shift_remove("env");
            }
            if let Some(with) = step.get_mut("with").and_then(Value::as_mapping_mut) {
                with.shift_remove("channel-id");
                with.shift_remove("slack-message");
                with.insert("method".into(), "chat.postMessage".into());
                with.insert("token".into(), Value::String(inputs.token.clone()));
                with.insert("payload".into(), Value::String(inputs.payload()));
            }
            step.insert("uses".into(), SLACK_V2.into());
            ctx.edited(path, format!("migrated to {}", SLACK_V2));
        });
    }
}
