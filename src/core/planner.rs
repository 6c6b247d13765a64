//! Plan generation: run recipes over discovered files without touching disk.

use super::document::{parse_documents, render_documents};
use super::error::{Error, Result};
use super::source;
use super::types::*;
use crate::recipes::{Recipe, RecipeSpec, VisitContext};
use std::io::ErrorKind;
use std::path::Path;

/// Generate a plan for every file under `<root>/.github`.
pub fn plan(config: &RewriteConfig, root: &Path) -> Result<RunPlan> {
    plan_recipes(&config.name, &config.recipes, root)
}

/// Generate a plan for an explicit recipe list.
pub fn plan_recipes(name: &str, specs: &[RecipeSpec], root: &Path) -> Result<RunPlan> {
    let recipes: Vec<&dyn Recipe> = specs.iter().map(RecipeSpec::recipe).collect();
    let mut files = Vec::new();

    for rel in source::discover(root)? {
        if !recipes.iter().any(|r| r.applies_to(&rel)) {
            files.push(untouched(&rel, PlanAction::NoOp));
            continue;
        }
        let abs = root.join(&rel);
        let original = match std::fs::read_to_string(&abs) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::InvalidData => {
                tracing::warn!(file = %rel.display(), "skipping file that is not UTF-8: {}", e);
                files.push(untouched(&rel, PlanAction::Skip));
                continue;
            }
            Err(source) => return Err(Error::Read { path: abs, source }),
        };
        files.push(plan_file(&recipes, root, &rel, original)?);
    }

    tracing::info!(
        plan = name,
        files = files.len(),
        recipes = recipes.len(),
        "planned"
    );
    Ok(RunPlan {
        name: name.to_string(),
        files,
    })
}

/// Plan entry for a file that is never read.
fn untouched(rel: &Path, action: PlanAction) -> FilePlan {
    FilePlan {
        path: rel.to_path_buf(),
        action,
        edits: Vec::new(),
        findings: Vec::new(),
        original: String::new(),
        rendered: None,
    }
}

/// Apply `recipes` in order to one file's text.
pub fn plan_file(
    recipes: &[&dyn Recipe],
    root: &Path,
    rel: &Path,
    original: String,
) -> Result<FilePlan> {
    let applicable: Vec<&dyn Recipe> = recipes
        .iter()
        .copied()
        .filter(|r| r.applies_to(rel))
        .collect();

    let mut file = FilePlan {
        path: rel.to_path_buf(),
        action: PlanAction::NoOp,
        edits: Vec::new(),
        findings: Vec::new(),
        original,
        rendered: None,
    };
    if applicable.is_empty() {
        return Ok(file);
    }

    let before = match parse_documents(&file.original) {
        Ok(docs) => docs,
        Err(e) => {
            tracing::warn!(file = %rel.display(), "skipping unparseable YAML: {}", e);
            file.action = PlanAction::Skip;
            return Ok(file);
        }
    };

    let mut docs = before.clone();
    let mut ctx = VisitContext::new(root, rel).with_text(&file.original);
    for recipe in &applicable {
        ctx.enter(recipe.info().name);
        for doc in docs.iter_mut() {
            recipe.visit(doc, &mut ctx);
        }
    }
    file.edits = ctx.edits;
    file.findings = ctx.findings;

    if docs != before {
        let rendered = render_documents(&docs).map_err(|source| Error::Render {
            path: rel.to_path_buf(),
            source,
        })?;
        file.action = PlanAction::Modify;
        file.rendered = Some(rendered);
    }
    Ok(file)
}
