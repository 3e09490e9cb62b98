//! proc-ctl - spawn, watch and signal child processes from a JSON-lines stream

mod cli;
mod logging;
mod protocol;

use clap::Parser;
use cli::Cli;
use console::style;
use log::info;
use proc_runner::Runtime;

fn main() {
    let cli = Cli::parse();

    logging::init_logger(cli.verbose);

    let runtime = match Runtime::builder()
        .kill_on_shutdown(cli.kill_on_exit)
        .shutdown_signal(cli.signal)
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("{} {}", style("error:").red().bold(), e);
            std::process::exit(1);
        }
    };

    if cli.list_ops {
        for name in runtime.dispatcher().registry().names() {
            println!("{}", name);
        }
        return;
    }

    let stdin = std::io::stdin();
    let served = protocol::serve(runtime.dispatcher(), stdin.lock(), std::io::stdout());

    let report = runtime.shutdown();
    info!(
        "released {} processes ({} signaled), closed {} pipes",
        report.processes_released, report.processes_signaled, report.pipes_closed
    );

    if let Err(e) = served {
        eprintln!("{} {}", style("error:").red().bold(), e);
        std::process::exit(1);
    }
}
