// crates.io
use clap::Parser;
// self
use scry_cli::Args;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;
	let args = Args::parse();
	scry_cli::run(args).await
}
