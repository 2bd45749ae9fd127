//! Docker Registry Resolver - command line entry point

use docker_registry_resolver::cli::{Args, Runner};
use docker_registry_resolver::logging::init_tracing;

#[tokio::main]
async fn main() {
    let args = Args::parse_args();
    init_tracing(args.verbose);

    let runner = Runner::new(args);
    if let Err(e) = runner.run().await {
        runner.logger().error(&e.to_string());
        std::process::exit(e.exit_code());
    }
}
