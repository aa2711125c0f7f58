use std::env;

#[tokio::main]
async fn main() -> folio::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().filter_or("FOLIO_LOG", "info"))
        .init();

    let args: Vec<String> = env::args().skip(1).collect();

    #[cfg(feature = "cli")]
    {
        let args = match folio::cli::CliArgs::parse(&args) {
            Ok(args) => args,
            Err(message) => {
                eprintln!("Error: {message}");
                eprintln!();
                folio::cli::print_usage();
                std::process::exit(1);
            }
        };
        folio::cli::run(args).await
    }
    #[cfg(not(feature = "cli"))]
    {
        let _ = args;
        eprintln!("CLI support not compiled in");
        std::process::exit(1);
    }
}
