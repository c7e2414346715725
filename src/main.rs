use std::{io::stdin, path::PathBuf, process::exit};

use clap::Parser;
use tracing_subscriber::EnvFilter;

use tallyup::{errors::Error, folder::StatementFolder, io::PromptSelector, types::Roster};

/// Works out who owes whom from a folder of bank statements.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Folder holding the statement CSV files, named like `jans_statement.csv`.
    #[arg(long, short)]
    folder: PathBuf,

    /// Everybody sharing expenses, separated by spaces, e.g. "Jan Sophie".
    #[arg(long, short, value_parser = parse_roster)]
    names: Roster,

    /// Name of the totals file kept in the folder.
    #[arg(long, short, default_value = "totals")]
    totals: String,
}

fn parse_roster(names: &str) -> Result<Roster, String> {
    let roster = Roster::parse(names);
    if roster.is_empty() {
        return Err("at least one name is needed".to_owned());
    }
    Ok(roster)
}

fn main() {
    setup_logging();

    let args = Args::parse();
    if let Err(err) = run(args) {
        eprintln!("{}", describe(&err));
        exit(1);
    }
}

fn setup_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn run(args: Args) -> Result<(), Error> {
    let roster = args.names;
    let folder = StatementFolder::new(args.folder, &args.totals);
    folder.ensure_totals_file()?;
    let statements = folder.statements(&roster)?;
    if statements.is_empty() {
        tracing::warn!("No statements found in {}", folder.dir().display());
    }

    let stdout = std::io::stdout();
    for statement in statements {
        tracing::info!(
            "Reading {} as {}'s statement",
            statement.path.display(),
            statement.owner
        );
        let mut selector = PromptSelector::new(stdin().lock(), stdout.lock(), roster.clone());
        folder.process_statement(&statement.path, &statement.owner, &roster, &mut selector)?;
    }
    Ok(())
}

/// Renders an error with everything that caused it, e.g.
/// `In statement jans.csv, transaction at line 4: Michael is not in the list of known names`.
fn describe(err: &Error) -> String {
    let mut message = err.to_string();
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = std::error::Error::source(cause);
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_are_required_to_be_non_empty() {
        let args = Args::try_parse_from([
            "tallyup",
            "--folder",
            "statements",
            "--names",
            "Jan Sophie",
        ])
        .unwrap();
        assert_eq!(args.names, Roster::parse("Jan Sophie"));
        assert_eq!(args.totals, "totals");

        let err = Args::try_parse_from(["tallyup", "--folder", "statements", "--names", "  "])
            .unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }
}
