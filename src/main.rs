use babygen::cli::CommandLineInterface;

fn main() -> anyhow::Result<()> {
    let command_line_interface = CommandLineInterface::load();
    tracing_subscriber::fmt()
        .with_max_level(command_line_interface.log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
    command_line_interface.run()
}
