//! CLI subcommands: init, validate, recipes, plan, apply, run, completions.

use crate::core::error::{Error, Result};
use crate::core::types::{FilePlan, PlanAction, Policy, RunPlan};
use crate::core::{executor, parser, planner, source};
use crate::recipes;
use clap::{ArgAction, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(
    name = "ghrewrite",
    version,
    about = "Rule-based rewrites for GitHub Actions workflows and Dependabot config"
)]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug). RUST_LOG overrides.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write a starter ghrewrite.yaml
    Init {
        /// Directory to initialize (default: current)
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// Validate ghrewrite.yaml without touching any workflow
    Validate {
        /// Path to ghrewrite.yaml
        #[arg(short, long, default_value = "ghrewrite.yaml")]
        file: PathBuf,
    },

    /// List available recipes and their options
    Recipes,

    /// Show which files the recipes would rewrite
    Plan {
        /// Path to ghrewrite.yaml
        #[arg(short, long, default_value = "ghrewrite.yaml")]
        file: PathBuf,

        /// Repository root
        #[arg(long, default_value = ".")]
        root: PathBuf,

        /// Print a unified diff for each modified file
        #[arg(long)]
        diff: bool,
    },

    /// Rewrite files in place
    Apply {
        /// Path to ghrewrite.yaml
        #[arg(short, long, default_value = "ghrewrite.yaml")]
        file: PathBuf,

        /// Repository root
        #[arg(long, default_value = ".")]
        root: PathBuf,

        /// Show what would be rewritten without writing
        #[arg(long)]
        dry_run: bool,

        /// Exit non-zero if any file would be rewritten (for CI)
        #[arg(long, conflicts_with = "dry_run")]
        check: bool,
    },

    /// Apply a single recipe without a config file
    Run {
        /// Recipe name, e.g. setup-java-upgrade-java-version
        recipe: String,

        /// Repository root
        #[arg(long, default_value = ".")]
        root: PathBuf,

        /// Recipe option as key=value (repeatable)
        #[arg(short, long = "set", value_name = "KEY=VALUE")]
        set: Vec<String>,

        /// Show what would be rewritten without writing
        #[arg(long)]
        dry_run: bool,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Dispatch a CLI command.
pub fn dispatch(cmd: Commands) -> Result<()> {
    match cmd {
        Commands::Init { path } => cmd_init(&path),
        Commands::Validate { file } => cmd_validate(&file),
        Commands::Recipes => {
            cmd_recipes();
            Ok(())
        }
        Commands::Plan { file, root, diff } => cmd_plan(&file, &root, diff),
        Commands::Apply {
            file,
            root,
            dry_run,
            check,
        } => cmd_apply(&file, &root, dry_run, check),
        Commands::Run {
            recipe,
            root,
            set,
            dry_run,
        } => cmd_run(&recipe, &set, &root, dry_run),
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "ghrewrite", &mut std::io::stdout());
            Ok(())
        }
    }
}

const TEMPLATE: &str = r#"version: "1.0"
name: modernize-ci
description: "Managed by ghrewrite"

policy:
  fail_on_findings: false
  event_log: .ghrewrite/events.jsonl

recipes:
  - recipe: setup-java-adopt-openjdk-to-temurin
  - recipe: setup-java-upgrade-java-version
    minimum-java-major-version: 21
  - recipe: find-missing-timeout
"#;

fn cmd_init(path: &Path) -> Result<()> {
    let config_path = path.join("ghrewrite.yaml");
    if config_path.exists() {
        return Err(Error::Write {
            path: config_path,
            source: std::io::Error::new(std::io::ErrorKind::AlreadyExists, "already exists"),
        });
    }

    std::fs::create_dir_all(path).map_err(|source| Error::Write {
        path: path.to_path_buf(),
        source,
    })?;
    std::fs::write(&config_path, TEMPLATE).map_err(|source| Error::Write {
        path: config_path.clone(),
        source,
    })?;

    println!("Initialized ghrewrite at {}", path.display());
    println!("  Created: {}", config_path.display());
    Ok(())
}

fn cmd_validate(file: &Path) -> Result<()> {
    let config = parser::parse_config_file(file)?;
    let errors = parser::validate_config(&config);

    if errors.is_empty() {
        println!("OK: {} ({} recipes)", config.name, config.recipes.len());
        Ok(())
    } else {
        for e in &errors {
            eprintln!("  ERROR: {}", e);
        }
        Err(Error::Validation(errors.len()))
    }
}

fn cmd_recipes() {
    for info in recipes::catalog() {
        println!("{}", info.name);
        println!("  {}", info.display_name);
        println!("  {}", info.description);
        for option in info.options {
            println!("    - {}", option);
        }
        println!();
    }
}

fn cmd_plan(file: &Path, root: &Path, diff: bool) -> Result<()> {
    let config = parser::load_config(file)?;
    let plan = planner::plan(&config, root)?;
    print_plan(&plan, diff);
    Ok(())
}

/// Display a plan to stdout.
fn print_plan(plan: &RunPlan, diff: bool) {
    println!("Planning: {} ({} files)", plan.name, plan.files.len());
    println!();

    for file in &plan.files {
        let symbol = match file.action {
            PlanAction::Modify => "~",
            PlanAction::NoOp if file.findings.is_empty() => continue,
            PlanAction::NoOp => " ",
            PlanAction::Skip => "!",
        };
        println!("  {} {} [{}]", symbol, source::normalize(&file.path), file.action);
        for edit in &file.edits {
            println!("      {} {}: {}", edit.recipe, edit.location, edit.detail);
        }
        for finding in &file.findings {
            println!(
                "      FOUND {} {}: {}",
                finding.recipe, finding.location, finding.message
            );
        }
        if diff {
            print_diff(file);
        }
    }

    println!();
    println!(
        "Plan: {} to rewrite, {} unchanged, {} skipped, {} finding(s).",
        plan.to_modify(),
        plan.unchanged(),
        plan.skipped(),
        plan.findings().count()
    );
}

fn print_diff(file: &FilePlan) {
    let Some(rendered) = &file.rendered else {
        return;
    };
    let patch = diffy::create_patch(&file.original, rendered);
    print!("{}", patch);
}

fn cmd_apply(file: &Path, root: &Path, dry_run: bool, check: bool) -> Result<()> {
    let config = parser::load_config(file)?;
    let mut cfg = executor::ApplyConfig::from_config(&config, root);
    cfg.dry_run = dry_run;
    cfg.check = check;
    report_apply(&cfg)
}

fn cmd_run(recipe: &str, options: &[String], root: &Path, dry_run: bool) -> Result<()> {
    let spec = recipes::from_options(recipe, options)?;
    let problems = spec.recipe().validate();
    if !problems.is_empty() {
        for p in &problems {
            eprintln!("  ERROR: {}", p);
        }
        return Err(Error::Validation(problems.len()));
    }

    let specs = [spec];
    let policy = Policy::default();
    let cfg = executor::ApplyConfig {
        name: recipe,
        recipes: &specs,
        policy: &policy,
        root,
        dry_run,
        check: false,
    };
    report_apply(&cfg)
}

fn report_apply(cfg: &executor::ApplyConfig) -> Result<()> {
    let result = executor::apply(cfg)?;

    if cfg.dry_run || cfg.check {
        print_plan(&result.plan, false);
        if cfg.dry_run {
            println!("Dry run: no files written.");
        }
        return Ok(());
    }

    for file in result.plan.files.iter().filter(|f| f.action == PlanAction::Modify) {
        println!(
            "  rewrote {} ({} edit(s))",
            source::normalize(&file.path),
            file.edits.len()
        );
    }
    for (path, finding) in result.plan.findings() {
        println!(
            "  FOUND {} {} {}: {}",
            source::normalize(path),
            finding.recipe,
            finding.location,
            finding.message
        );
    }
    println!(
        "Apply complete: {} rewritten, {} unchanged ({:.1}s, run {}).",
        result.files_rewritten,
        result.plan.unchanged(),
        result.total_duration.as_secs_f64(),
        result.run_id
    );
    Ok(())
}
