use crate::infra::engine_for_cli;
use chrono::Local;
use clap::Args;
use metro2_audit::audit::{AuditEngine, AuditReport, SAMPLE_REPORT_HTML};
use metro2_audit::error::AppError;
use std::fs;
use std::path::PathBuf;

#[derive(Args, Debug, Default)]
pub(crate) struct RulesArgs {
    /// Directory with rule document overrides (defaults to METRO2_RULES_DIR, then the built-in rules)
    #[arg(long)]
    pub(crate) rules_dir: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub(crate) struct AuditArgs {
    /// HTML credit report to audit
    #[arg(long)]
    pub(crate) report: PathBuf,
    #[command(flatten)]
    pub(crate) rules: RulesArgs,
    /// Print single-line JSON instead of pretty output
    #[arg(long)]
    pub(crate) compact: bool,
}

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    #[command(flatten)]
    pub(crate) rules: RulesArgs,
    /// Also list the extracted fields for every bureau column
    #[arg(long)]
    pub(crate) show_fields: bool,
}

pub(crate) fn run_audit(args: AuditArgs) -> Result<(), AppError> {
    let AuditArgs {
        report,
        rules,
        compact,
    } = args;

    let engine = engine_for_cli(rules.rules_dir)?;
    let document = fs::read_to_string(&report)?;
    let audit = engine.audit(&document);

    let output = if compact {
        serde_json::to_string(&audit)?
    } else {
        serde_json::to_string_pretty(&audit)?
    };
    println!("{output}");
    Ok(())
}

pub(crate) fn run_check_rules(args: RulesArgs) -> Result<(), AppError> {
    let engine = engine_for_cli(args.rules_dir)?;
    println!("Rule base loaded");
    print_rule_counts(&engine);
    Ok(())
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let engine = engine_for_cli(args.rules.rules_dir)?;
    let report = engine.audit(SAMPLE_REPORT_HTML);

    println!(
        "Metro-2 audit demo ({})",
        Local::now().date_naive().format("%Y-%m-%d")
    );
    print_rule_counts(&engine);
    render_report(&report, args.show_fields);
    Ok(())
}

fn print_rule_counts(engine: &AuditEngine) {
    println!("- {} field rules", engine.field_rules().len());
    println!("- {} ontologies", engine.ontologies().len());
    println!(
        "- {} compiled knowledge-graph rules",
        engine.compiled_rules().len()
    );
    println!("- {} violation codes with metadata", engine.catalog().len());
}

fn render_report(report: &AuditReport, show_fields: bool) {
    let summary = report.summary();
    println!(
        "\n{} tradelines | {} violations | {} unmodeled",
        summary.tradelines, summary.violations, summary.unmodeled
    );
    for (bureau, count) in &summary.by_bureau {
        println!("  - {bureau}: {count}");
    }

    for (index, tradeline) in report.tradelines.iter().enumerate() {
        println!(
            "\nTradeline {}: {}",
            index + 1,
            tradeline.creditor().unwrap_or("(unnamed)")
        );

        if show_fields {
            for (bureau, fields) in tradeline.per_bureau().iter() {
                println!("  {bureau}:");
                for (key, entry) in fields.iter() {
                    println!("    {key} = {:?} (raw {:?})", entry.value, entry.raw);
                }
            }
        }

        if tradeline.violations().is_empty() {
            println!("  No violations found");
            continue;
        }
        for violation in tradeline.violations() {
            let severity = violation
                .severity
                .map(|level| format!("severity {level}"))
                .unwrap_or_else(|| "unmodeled".to_string());
            println!(
                "  - [{}] {} ({}): {}",
                violation.bureau.as_deref().unwrap_or("-"),
                violation.code,
                severity,
                violation.violation
            );
            if let Some(section) = violation.fcra_section.as_deref() {
                println!("      FCRA {section}");
            }
        }
    }
}
