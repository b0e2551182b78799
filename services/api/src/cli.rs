use crate::commands::{run_audit, run_check_rules, run_demo, AuditArgs, DemoArgs, RulesArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use metro2_audit::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "metro2-audit",
    about = "Extract tradelines from consumer credit reports and flag Metro-2 reporting violations",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Audit one HTML credit report and print the result as JSON
    Audit(AuditArgs),
    /// Load and compile the rule base, then report what it contains
    CheckRules(RulesArgs),
    /// Audit the bundled sample report and print a readable summary
    Demo(DemoArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Audit(args) => run_audit(args),
        Command::CheckRules(args) => run_check_rules(args),
        Command::Demo(args) => run_demo(args),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_audit_arguments() {
        let cli = Cli::try_parse_from([
            "metro2-audit",
            "audit",
            "--report",
            "report.html",
            "--rules-dir",
            "rules",
            "--compact",
        ])
        .expect("arguments parse");

        match cli.command {
            Some(Command::Audit(args)) => {
                assert_eq!(args.report.to_str(), Some("report.html"));
                assert_eq!(
                    args.rules.rules_dir.as_deref().and_then(|dir| dir.to_str()),
                    Some("rules")
                );
                assert!(args.compact);
            }
            other => panic!("expected audit command, got {other:?}"),
        }
    }

    #[test]
    fn serve_is_the_default_command() {
        let cli = Cli::try_parse_from(["metro2-audit"]).expect("no arguments parse");
        assert!(cli.command.is_none());
    }
}
