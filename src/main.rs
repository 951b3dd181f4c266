use std::io::{self, IsTerminal};
use std::process;

use chainpipe::LONG_VERSION;
use chainpipe::commands::api::{self, ApiArgs};
use chainpipe::commands::ask::{self, AskArgs};
use chainpipe::commands::config::{self, ConfigArgs};
use chainpipe::commands::pdf::{self, PdfArgs};
use chainpipe::commands::wiki::{self, WikiArgs};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{generate, shells};
use owo_colors::OwoColorize;

const ROOT_HELP_EXAMPLES: &str = "Examples:\n  chainpipe ask \"What is a monad?\"\n  chainpipe pdf report.pdf \"What are the key findings?\"\n  chainpipe wiki \"Alan Turing\" \"Where was he born?\"\n  chainpipe api \"Tell me a fact about the number 42\"\n  chainpipe api --docs nyt \"What are today's top technology stories?\"\n  chainpipe completion bash > ~/.local/share/bash-completion/completions/chainpipe";

const ASK_HELP_EXAMPLES: &str = "Examples:\n  chainpipe ask --model gpt-4o-mini \"2+2?\"\n  echo \"2+2?\" | chainpipe ask\n  chainpipe ask --dry-run --json \"Explain retries\"";

const PDF_HELP_EXAMPLES: &str = "Examples:\n  chainpipe pdf paper.pdf \"Summarize the abstract\"\n  echo \"Who are the authors?\" | chainpipe pdf paper.pdf --show-sources";

const WIKI_HELP_EXAMPLES: &str = "Examples:\n  chainpipe wiki \"Ada Lovelace\" \"What did she write about the Analytical Engine?\"\n  chainpipe wiki --lang de --max-docs 3 Rhein \"Wie lang ist der Rhein?\"";

const API_HELP_EXAMPLES: &str = "Examples:\n  chainpipe api \"What is a math fact about 1729?\"\n  chainpipe api --docs nyt \"Find recent articles about Mars rovers\"\n  chainpipe api --docs-url https://example.org/openapi.json --allow-domain api.example.org \"...\"";

#[derive(Debug, Parser)]
#[command(
    name = "chainpipe",
    about = "OpenAI chat, document question answering and API chains",
    version = LONG_VERSION,
    propagate_version = true,
    after_help = ROOT_HELP_EXAMPLES
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "Send a prompt to the chat model", after_help = ASK_HELP_EXAMPLES)]
    Ask(AskArgs),
    #[command(about = "Answer a question about a PDF", after_help = PDF_HELP_EXAMPLES)]
    Pdf(PdfArgs),
    #[command(about = "Answer a question from Wikipedia search results", after_help = WIKI_HELP_EXAMPLES)]
    Wiki(WikiArgs),
    #[command(about = "Answer a question by calling a documented HTTP API", after_help = API_HELP_EXAMPLES)]
    Api(ApiArgs),
    #[command(about = "Manage local config")]
    Config(ConfigArgs),
    #[command(about = "Generate shell completion script")]
    Completion {
        #[arg(value_enum)]
        shell: CompletionShell,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}

fn print_completion(shell: CompletionShell) {
    let mut cmd = Cli::command();
    match shell {
        CompletionShell::Bash => generate(shells::Bash, &mut cmd, "chainpipe", &mut io::stdout()),
        CompletionShell::Zsh => generate(shells::Zsh, &mut cmd, "chainpipe", &mut io::stdout()),
        CompletionShell::Fish => generate(shells::Fish, &mut cmd, "chainpipe", &mut io::stdout()),
    }
}

/// A missing .env is fine; real environment variables win over its entries.
fn load_dotenv() {
    match dotenvy::dotenv() {
        Ok(_) => {}
        Err(err) if err.not_found() => {}
        // The parse error text carries the raw line, which may hold a key.
        Err(dotenvy::Error::LineParse(_, index)) => {
            eprintln!("warning: ignoring .env: parse error at character {index} of a line");
        }
        Err(err) => eprintln!("warning: ignoring .env: {err}"),
    }
}

#[tokio::main]
async fn main() {
    load_dotenv();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Ask(args) => ask::run(args).await,
        Commands::Pdf(args) => pdf::run(args).await,
        Commands::Wiki(args) => wiki::run(args).await,
        Commands::Api(args) => api::run(args).await,
        Commands::Config(args) => config::run(args),
        Commands::Completion { shell } => {
            print_completion(shell);
            Ok(())
        }
    };

    if let Err(err) = result {
        if io::stderr().is_terminal() {
            eprintln!("{} {err}", "error:".red().bold());
        } else {
            eprintln!("error: {err}");
        }
        process::exit(1);
    }
}
