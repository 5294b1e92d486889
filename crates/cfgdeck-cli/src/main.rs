// cfgdeck CLI entry point

use clap::Parser;

use cfgdeck_cli::{commands, logging, output, Cli, Commands, OutputStyle};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose, cli.quiet);

    let style = OutputStyle::default();
    match commands::execute(&cli, &style).await {
        Ok(text) => {
            // Quiet still prints values asked for with `get`
            let wanted = !cli.quiet || matches!(cli.command, Commands::Get { .. });
            if wanted && !text.is_empty() {
                println!("{}", text);
            }
        }
        Err(e) => {
            output::print_error(&e.user_message());
            if cli.verbose {
                eprintln!("{}", e.technical_details());
            }
            std::process::exit(1);
        }
    }
}
