//! Scans a few sample files concurrently against a running daemon.
//!
//! This example shows how to:
//! - Configure a client from command-line flags
//! - Run independent scans in parallel, one client per task
//! - Query the daemon's version information
//!
//! Run with: cargo run --example scan -- --host 127.0.0.1 --port 10200

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use fprot::prelude::*;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "scan", about = "Scan sample files with an fpscand daemon")]
struct Args {
    /// Daemon host to connect to
    #[arg(short = 'H', long, default_value = "192.168.1.126")]
    host: String,

    /// Daemon port
    #[arg(short, long, default_value_t = 10200)]
    port: u16,

    /// Directory uploaded with a streamed directory scan
    #[arg(long, default_value = "demos/data")]
    data: PathBuf,
}

fn print_responses(label: &str, result: fprot::Result<Vec<Response>>) {
    let responses = match result {
        Ok(responses) => responses,
        Err(FprotError::ScanFailed { status, responses, .. }) => {
            eprintln!("{label}: ERROR: {status}");
            responses
        }
        Err(e) => {
            eprintln!("{label}: {e}");
            return;
        }
    };

    for r in responses {
        println!("Scan:\t\t{}", r.filename.as_deref().unwrap_or(""));
        println!("aname\t\t=>\t{}", r.archive_item.as_deref().unwrap_or(""));
        println!("status\t\t=>\t{}", r.status);
        println!("statuscode\t=>\t{}", r.status_code);
        println!("signature\t=>\t{}", r.signature());
        println!("infected\t=>\t{}", r.infected);
    }
}

async fn run(address: &str, label: &'static str, data: PathBuf) -> fprot::Result<()> {
    let mut client = Client::new(address)?;
    client.set_conn_timeout(Duration::from_secs(5));

    let result = match label {
        "file" => client.scan_file("/var/spool/testfiles/install.log").await,
        "files" => {
            client
                .scan_files(&[
                    "/var/spool/testfiles/install.log",
                    "/var/spool/testfiles/eicar.tar.bz2",
                ])
                .await
        }
        "stream" => client.scan_stream(&[data.join("clean.txt")]).await,
        _ => client.scan_dir_stream(&data).await,
    };
    print_responses(label, result);

    client.close().await
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();
    let address = format!("{}:{}", args.host, args.port);

    let scans = ["file", "files", "dir_stream", "stream"]
        .into_iter()
        .map(|label| run(&address, label, args.data.clone()));
    for result in futures::future::join_all(scans).await {
        if let Err(e) = result {
            eprintln!("{e}");
        }
    }

    let client = Client::new(&address)?;
    let info = client.info().await?;
    println!(
        "INFO: Version => {} Engine => {} Protocol => {} Signature => {} Uptime => {}",
        info.version, info.engine, info.protocol, info.signature, info.uptime
    );
    client.close().await?;

    println!("Done");
    Ok(())
}
