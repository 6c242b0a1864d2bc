use clap::Parser;
use k_vault::backup::result_error::error::Error;
use k_vault::backup::result_error::AddMsg;
use k_vault::backup::upload_config::VaultUploadConfig;
use std::fs::File;
use std::path::PathBuf;
use std::process::exit;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use validator::Validate;

/// Upload archive files to a cold storage vault
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Location of config file
    #[arg(short, long)]
    config: PathBuf,
    /// Archives to upload, in order
    #[arg(required = true)]
    archives: Vec<PathBuf>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    let args = Args::parse();

    let res = File::open(&args.config)
        .map_err(Error::from)
        .add_msg(format!("Open config failed: {:?}", &args.config))
        .and_then(|f| {
            serde_yml::from_reader::<_, VaultUploadConfig>(f)
                .map_err(Error::from)
                .add_msg(format!("Parse YAML config failed: {:?}", &args.config))
        })
        .and_then(|vc| {
            vc.validate()
                .map_err(Error::from)
                .map(|_| vc)
                .add_msg(format!("Config validation failed: {:?}", &args.config))
        })
        .and_then(|vc| vc.run(&args.archives));

    match res {
        Ok(_) => info!("Uploaded {} archive(s)", args.archives.len()),
        Err(e) => {
            error!("{e}");
            exit(1);
        }
    }
}
