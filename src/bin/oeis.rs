use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use oeis_client::client::{OeisClient, OeisHttpClient};
use oeis_client::config::ConfigLoader;
use oeis_client::domain::SequenceKey;
use oeis_client::error::OeisError;
use oeis_client::factory::{LoadOptions, SequenceFactory};
use oeis_client::output::{BFileSummary, JsonOutput, SearchSummary, SequenceSummary};

#[derive(Parser)]
#[command(name = "oeis")]
#[command(about = "Look up sequences in the On-Line Encyclopedia of Integer Sequences")]
#[command(version, author)]
struct Cli {
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    #[command(about = "Show one sequence")]
    Show(ShowArgs),
    #[command(about = "Search the OEIS")]
    Search(SearchArgs),
    #[command(about = "Print the b-file of a sequence")]
    Bfile(BfileArgs),
}

#[derive(Args)]
struct ShowArgs {
    id: String,

    #[arg(long)]
    bfile: bool,

    #[arg(long, default_value_t = 20)]
    terms: usize,
}

#[derive(Args)]
struct SearchArgs {
    #[arg(required = true)]
    terms: Vec<String>,
}

#[derive(Args)]
struct BfileArgs {
    id: String,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(error) = report.downcast_ref::<OeisError>() {
            return ExitCode::from(map_exit_code(error));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &OeisError) -> u8 {
    match error {
        OeisError::InvalidIdentifier(_)
        | OeisError::MissingIdentifier(_)
        | OeisError::EmptySearchTerm => 2,
        OeisError::Http(_) | OeisError::Status { .. } | OeisError::Decode(_) => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = ConfigLoader::resolve(cli.config.as_deref())?;
    let client = OeisHttpClient::with_config(config)?;

    match cli.command {
        Command::Show(args) => {
            let mut factory = SequenceFactory::new(client);
            let options = LoadOptions::default().with_bfile(args.bfile);
            let sequence = factory.load_with(args.id.as_str(), options)?;
            let summary = SequenceSummary::from_sequence(&sequence, args.terms)?;
            JsonOutput::print_sequence(&summary).into_diagnostic()
        }
        Command::Search(args) => {
            let factory = SequenceFactory::new(client);
            let results = factory.search_terms(&args.terms)?;
            JsonOutput::print_search(&SearchSummary::from(&results)).into_diagnostic()
        }
        Command::Bfile(args) => {
            let id = args.id.as_str().sequence_id()?;
            let bfile = client.fetch_bfile(&id)?;
            JsonOutput::print_bfile(&BFileSummary::new(id.name(), bfile.as_ref())).into_diagnostic()
        }
    }
}

#[cfg(test)]
mod tests {
    use oeis_client::client::join_terms;

    use super::*;

    #[test]
    fn search_terms_are_comma_joined() {
        let cli = Cli::try_parse_from(["oeis", "search", "1", "2", "3", "5"]).unwrap();
        let Command::Search(args) = cli.command else {
            panic!("expected the search command");
        };
        assert_eq!(join_terms(&args.terms), "1,2,3,5");
    }

    #[test]
    fn exit_codes_by_error_kind() {
        assert_eq!(map_exit_code(&OeisError::EmptySearchTerm), 2);
        assert_eq!(map_exit_code(&OeisError::Http("down".to_string())), 3);
        assert_eq!(map_exit_code(&OeisError::ConfigParse("bad".to_string())), 1);
    }
}
