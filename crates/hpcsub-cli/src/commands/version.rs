//! Version command implementation.

use console::style;

/// Execute the version command.
pub fn execute() {
    let version = env!("CARGO_PKG_VERSION");

    println!(
        "{} {} - batch job submission for HPC schedulers",
        style("hpcsub").cyan().bold(),
        style(format!("v{version}")).yellow()
    );
    println!();
    println!("Schedulers:");
    println!("  grid-engine (abci)  qsub, qstat, qdel");
    println!("  pjm (ofp)           pjsub, pjstat, pjdel");
    println!();
    println!("License:    {}", style("Apache-2.0").dim());
}
