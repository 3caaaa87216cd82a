//! hnswrap-ipam CNI plugin entry point.
//!
//! stdout carries the CNI result or error object; logs go to stderr.

use std::io::{Read, Write};
use std::process::ExitCode;

use clap::Parser;
use color_eyre::eyre::Result;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use hnswrap_common::HnswrapConfig;
use hnswrap_common::config::CONFIG_PATH;
use hnswrap_ipam::result::DEFAULT_CNI_VERSION;
use hnswrap_ipam::{CmdArgs, CniError, CnsClient, IpamError, IpamPlugin, IpamResult, NetConf};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<ExitCode> {
    color_eyre::install()?;

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(true))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let parsed = match CmdArgs::try_parse() {
        // --help and --version
        Err(err) if !err.use_stderr() => err.exit(),
        parsed => parsed,
    };

    let mut stdin = Vec::new();
    std::io::stdin().read_to_end(&mut stdin)?;
    let cni_version = NetConf::parse(&stdin)
        .map_or_else(|_| DEFAULT_CNI_VERSION.to_string(), |conf| conf.cni_version);

    // A bad CNI_COMMAND is still reported as a CNI error object.
    let mut output = Vec::new();
    let outcome = match parsed {
        Ok(args) => run(&args, &stdin, &mut output).await,
        Err(err) => Err(IpamError::from(err)),
    };

    let code = match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, code = err.cni_code(), "CNI command failed");
            output.clear();
            serde_json::to_writer(&mut output, &CniError::from_error(&cni_version, &err))?;
            output.push(b'\n');
            ExitCode::FAILURE
        }
    };

    let mut stdout = std::io::stdout().lock();
    stdout.write_all(&output)?;
    stdout.flush()?;
    Ok(code)
}

async fn run(args: &CmdArgs, stdin: &[u8], out: &mut Vec<u8>) -> IpamResult<()> {
    let path = args.config.clone().unwrap_or_else(|| CONFIG_PATH.clone());
    let config = HnswrapConfig::load(&path)?;

    let plugin = IpamPlugin::new(CnsClient::from_config(&config.cns)?);
    plugin.run(args, stdin, out).await
}
