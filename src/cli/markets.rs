//! Markets command implementation

use clap::Parser;

use super::CliError;
use crate::storage::FileManager;

/// List known markets from the data directory
#[derive(Parser, Debug)]
pub struct MarketsCommand {
    /// Print one market per line without decoration
    #[arg(long, default_value_t = false)]
    pub plain: bool,
}

impl MarketsCommand {
    /// Execute the markets command.
    pub async fn execute(
        &self,
        data_dir: &std::path::Path,
        specs_dir: &std::path::Path,
    ) -> Result<(), CliError> {
        let files = FileManager::new(data_dir, specs_dir)?;
        let markets = files.load_markets().await?;

        if markets.is_empty() {
            println!("No markets known. Add a markets.json under {}", data_dir.display());
            return Ok(());
        }

        if self.plain {
            for market in &markets {
                println!("{market}");
            }
        } else {
            println!("{} known markets:", markets.len());
            for market in &markets {
                println!("  {market}");
            }
        }
        Ok(())
    }
}
