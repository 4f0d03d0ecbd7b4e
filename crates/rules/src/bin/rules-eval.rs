//! rules-eval — offline rule checking and snapshot evaluation.
//!
//! - `check` compiles every rule definition in the rules directory and
//!   reports the ones that fail.
//! - `evaluate --snapshot <json>` runs the engine over a case snapshot,
//!   prints the resulting report as JSON, and verifies the audit trail.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use tracing::{info, warn};

use custos_audit::{AuditLogger, InMemoryAuditStore};
use custos_core::config::load_dotenv;
use custos_core::{CaseSnapshot, Config, EvidenceSnapshot};
use custos_rules::store::LoadStatus;
use custos_rules::{
    AlertService, ChainOfCustodyAnalyzer, FsRuleStore, InMemoryAlertStore,
    InMemoryEvidenceSource, RuleCompiler, RuleEngine,
};

// ── CLI ─────────────────────────────────────────────────────────────

/// Evidence rule engine: check rule files or evaluate a case snapshot.
#[derive(Parser, Debug)]
#[command(name = "rules-eval", version, about)]
struct Cli {
    /// Rules directory (overrides RULES_DIR from the environment).
    #[arg(long, global = true)]
    rules_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compile every rule definition and report failures.
    Check,
    /// Evaluate all evidence of a case snapshot against the active rules.
    Evaluate {
        /// JSON file: `{"case": {...}, "evidence": [{...}, ...]}`.
        #[arg(long)]
        snapshot: PathBuf,
    },
}

#[derive(Debug, Deserialize)]
struct Snapshot {
    case: CaseSnapshot,
    #[serde(default)]
    evidence: Vec<EvidenceSnapshot>,
}

// ── Commands ────────────────────────────────────────────────────────

fn check(rules_dir: &Path) -> anyhow::Result<()> {
    let store = FsRuleStore::new(rules_dir);
    let results = store
        .load_all()
        .with_context(|| format!("failed to scan {}", rules_dir.display()))?;

    let mut failures = results.iter().filter(|r| r.status.is_failed()).count();
    for result in &results {
        match &result.status {
            LoadStatus::Loaded { rule_id } => {
                let definition = store.load_file(&result.path)?;
                match RuleCompiler::compile(&definition) {
                    Ok(rule) => println!(
                        "ok       {} ({} conditions, {} actions){}",
                        rule_id,
                        rule.conditions.len(),
                        rule.actions.len(),
                        if definition.active { "" } else { " [inactive]" }
                    ),
                    Err(e) => {
                        failures += 1;
                        println!("invalid  {}: {}", rule_id, e);
                    }
                }
            }
            LoadStatus::Skipped { reason } => {
                println!("skipped  {} ({})", result.path.display(), reason)
            }
            LoadStatus::Failed { error } => {
                println!("failed   {}: {}", result.path.display(), error);
            }
        }
    }

    if failures > 0 {
        bail!("{} rule definition(s) failed", failures);
    }
    info!(rules = results.len(), "all rule definitions compile");
    Ok(())
}

async fn evaluate(config: &Config, rules_dir: &Path, snapshot_path: &Path) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(snapshot_path)
        .with_context(|| format!("failed to read {}", snapshot_path.display()))?;
    let snapshot: Snapshot = serde_json::from_str(&raw)
        .with_context(|| format!("invalid snapshot {}", snapshot_path.display()))?;

    let source = InMemoryEvidenceSource::new();
    let case_id = snapshot.case.id.clone();
    source.put_case(snapshot.case);
    for item in snapshot.evidence {
        source.put_evidence(item);
    }

    let mut audit = AuditLogger::new(Arc::new(InMemoryAuditStore::new()));
    if let Some(key) = &config.audit.signing_key {
        audit = audit.with_signing_key(key);
    }
    let audit = Arc::new(audit);
    let alerts = Arc::new(
        AlertService::new(Arc::new(InMemoryAlertStore::new()), Arc::clone(&audit))
            .with_dedup(config.alerts.dedup),
    );
    let engine = RuleEngine::new(
        Arc::new(FsRuleStore::new(rules_dir)),
        Arc::new(source),
        alerts,
    )
    .with_custody_analyzer(ChainOfCustodyAnalyzer::new(
        config.rules.custody_gap_threshold_hours,
    ));

    let summary = engine.reload_rules().await?;
    for skipped in &summary.skipped {
        warn!(rule_id = %skipped.rule_id, error = %skipped.error, "rule skipped");
    }

    let report = engine.on_case_changed(&case_id).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    let verification = audit.verify_all().await?;
    if !verification.is_intact() {
        bail!("audit entries failed verification: {:?}", verification.corrupted);
    }
    info!(
        case_id = %case_id,
        alerts = report.alerts().count(),
        audit_entries = verification.checked,
        "evaluation complete, audit trail verified"
    );
    Ok(())
}

// ── main ────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    load_dotenv();
    let cli = Cli::parse();
    let config = Config::from_env();
    config.log_summary();

    let rules_dir = cli
        .rules_dir
        .clone()
        .unwrap_or_else(|| config.rules.rules_dir.clone());

    match cli.command {
        Command::Check => check(&rules_dir),
        Command::Evaluate { snapshot } => evaluate(&config, &rules_dir, &snapshot).await,
    }
}
