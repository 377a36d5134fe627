use clap::{Parser, Subcommand};
use log::{warn, LevelFilter};
use std::{path::PathBuf, process::ExitCode};

use dfs_client::{ConfigLocation, DfsClient, Outcome};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory holding core-site.xml and hdfs-site.xml
    #[arg(long, env = "HADOOP_CONF_DIR")]
    conf_dir: PathBuf,

    /// Log more (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Copy a local file into a remote directory
    Add {
        local_path: String,
        remote_path: String,
    },
    /// Copy a remote file into the current directory
    Read { remote_path: String },
    /// Delete a remote path and everything beneath it
    Delete { remote_path: String },
    /// Create a remote directory and its missing parents
    Mkdir { remote_path: String },
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

async fn run(client: &DfsClient, command: Command) -> dfs_client::Result<Outcome> {
    match command {
        Command::Add {
            local_path,
            remote_path,
        } => client.upload(&local_path, &remote_path).await,
        Command::Read { remote_path } => client.download(&remote_path).await,
        Command::Delete { remote_path } => client.delete(&remote_path).await,
        Command::Mkdir { remote_path } => client.make_directory(&remote_path).await,
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    let location = match ConfigLocation::resolve(&args.conf_dir) {
        Ok(location) => location,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::FAILURE;
        }
    };

    let client = match DfsClient::new(&location).await {
        Ok(client) => client,
        Err(err) => {
            eprintln!("Unable to connect: {err}");
            return ExitCode::FAILURE;
        }
    };

    let result = run(&client, args.command).await;

    if let Err(err) = client.close().await {
        warn!("{err}");
    }

    match result {
        Ok(outcome) => {
            println!("{outcome}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}
