use clap::Parser;
use std::process::ExitCode;
use tracing::error;

/// Sidecar hook that rewrites a domain definition to boot from the OVMF
/// images bundled with this binary.
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct CommandLine {
    /// VMI to change in JSON format
    #[clap(long, default_value = "")]
    vmi: String,

    /// Domain spec in XML format
    #[clap(long, default_value = "")]
    domain: String,
}

pub fn main() -> ExitCode {
    let command_line = CommandLine::parse();

    // Stdout carries only the rewritten domain XML, so all diagnostics go
    // to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    if command_line.vmi.is_empty() || command_line.domain.is_empty() {
        error!(
            vmi = command_line.vmi.len(),
            domain = command_line.domain.len(),
            "Bad input"
        );
        return ExitCode::from(1);
    }

    if let Err(err) = roms_sidecar::firmware::stage() {
        error!(error = ?err, "Failed to stage OVMF images");
        return ExitCode::from(2);
    }

    // A VMI or domain the management layer cannot serialize correctly is an
    // environment bug, not an operating condition; abort rather than exit
    // cleanly.
    let domain_xml =
        roms_sidecar::hook::on_define_domain(&command_line.vmi, &command_line.domain)
            .expect("onDefineDomain failed");

    println!("{domain_xml}");
    ExitCode::SUCCESS
}
