use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = passage_api::Args::parse();

	passage_api::run(args).await
}
