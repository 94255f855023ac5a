use anyhow::{anyhow, bail, Error};
use clap::Parser;
use ftail::Ftail;
use log::{error, info};

use consistasr::reconcile::run;

mod cli;
use crate::cli::{Cli, Config, ConfigBuilder};

type Result<T> = std::result::Result<T, Error>;

fn main() -> Result<()> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(error) if !error.use_stderr() => error.exit(),
        Err(error) => {
            bail!("Unable to parse command line arguments: \n {}", error)
        }
    };
    let cfg_build: ConfigBuilder = cli.into();
    let cfg = cfg_build.setup()?;
    init_logging(&cfg)?;

    info!("ConsistASR run started.");
    info!("{}", cfg);

    match run(&cfg.reconcile) {
        Ok(summary) => {
            info!(
                "Wrote {} indel-aware ancestral sequences to {}",
                summary.merged,
                cfg.reconcile.out_dir.display()
            );
            Ok(())
        }
        Err(e) => {
            error!("Run failed: {}", e);
            Err(e)
        }
    }
}

fn init_logging(cfg: &Config) -> Result<()> {
    let mut logger = Ftail::new().console(cfg.log_level);
    if let Some(log_file) = &cfg.log_file {
        logger = logger.single_file(&log_file.to_string_lossy(), true, cfg.log_level);
    }
    logger
        .init()
        .map_err(|e| anyhow!("Unable to initialise logging: {:?}", e))
}
