use colored::Colorize;
use siteaudit::handlers::{Stage, exit_code, init_tracing, run_stage};
use siteaudit::command_argument_builder;
use siteaudit_core::print_banner;

#[tokio::main]
async fn main() {
    let cmd = command_argument_builder();
    let chosen_command = cmd.get_matches();
    let quiet = chosen_command.get_flag("quiet");
    init_tracing(chosen_command.get_count("verbose"));

    // Show banner unless --quiet flag is set
    if !quiet {
        print_banner();
    }

    let Some((name, stage_args)) = chosen_command.subcommand() else {
        // No subcommand provided, just show the banner
        return;
    };

    let Some(stage) = Stage::from_name(name) else {
        unreachable!("clap should ensure we don't get here")
    };

    if let Err(e) = run_stage(stage, stage_args, quiet).await {
        eprintln!("{} {}", "[x]".red().bold(), e);
        std::process::exit(exit_code(&e));
    }
}
