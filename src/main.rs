use std::process::ExitCode;

use schema2model::cli::CommandLineInterface;

fn main() -> anyhow::Result<ExitCode> {
    let command_line_interface = CommandLineInterface::load();
    command_line_interface.init_tracing();
    command_line_interface.run()
}
