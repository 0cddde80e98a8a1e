mod app;
mod cli;

fn main() {
    let cli = cli::parse();
    ffmerge::logging::init(cli.verbose, cli.quiet);

    // Ctrl-C reaches ffmpeg directly; we only need to stop retrying and clean up
    if let Err(e) = ffmerge::engine::runner::install_interrupt_handler() {
        tracing::warn!("Could not install Ctrl-C handler: {}", e);
    }

    std::process::exit(app::run(cli));
}
