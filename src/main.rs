use clap::Parser;
use std::process;
use tokio::task;
use zipmerge::{
    Cli, OutputFormatter, OutputMode, UserFriendlyError, ZipMerge, ZipMergeError,
    CANCELLED_EXIT_CODE,
};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    setup_logging(&cli);

    let exit_code = run(cli).await;
    process::exit(exit_code);
}

async fn run(cli: Cli) -> i32 {
    // Handle special commands first
    if cli.generate_config {
        return handle_generate_config(&cli);
    }

    let Some(destination) = cli.destination.clone() else {
        eprintln!("A destination folder is required");
        return 1;
    };
    let containers = cli.containers.clone();

    let zipmerge = match ZipMerge::from_cli(&cli) {
        Ok(zipmerge) => zipmerge,
        Err(e) => {
            print_startup_error(&e);
            return 1;
        }
    };

    // Extraction is blocking file I/O on scoped worker threads
    let outcome = task::spawn_blocking(move || {
        let result = zipmerge.run(&destination, &containers);
        if let Err(ref e) = result {
            zipmerge.handle_error(e);
        }
        result
    })
    .await;

    match outcome {
        Ok(Ok(report)) => report.exit_code(),
        Ok(Err(ZipMergeError::Cancelled)) => CANCELLED_EXIT_CODE,
        Ok(Err(_)) => 1,
        Err(e) => {
            eprintln!("Extraction task failed: {}", e);
            1
        }
    }
}

fn handle_generate_config(cli: &Cli) -> i32 {
    let config_path = cli.config_output_path();

    match ZipMerge::generate_sample_config(&config_path) {
        Ok(()) => {
            println!(
                "Generated sample configuration file: {}",
                config_path.display()
            );
            println!("\nTo use this configuration:");
            println!(
                "  zipmerge <destination> <zip>... --config {}",
                config_path.display()
            );
            println!("\nEdit the file to customize settings for your needs.");
            0
        }
        Err(e) => {
            eprintln!(
                "Failed to generate configuration file: {}",
                e.user_message()
            );
            if let Some(suggestion) = e.suggestion() {
                eprintln!("Suggestion: {}", suggestion);
            }
            1
        }
    }
}

fn print_startup_error(error: &ZipMergeError) {
    // Create a basic formatter for startup errors
    let formatter = OutputFormatter::new(OutputMode::Human, 0, false);
    formatter.print_user_friendly_error(error);
}

fn setup_logging(cli: &Cli) {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(cli.log_filter()))
        .format_timestamp(None)
        .init();
}
