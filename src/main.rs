use anyhow::Result;
use concert_signup::settings::Settings;
use concert_signup::{cli, logging};

#[actix_web::main]
async fn main() {
    concert_signup::try_or_exit(run()).await;
}

async fn run() -> Result<()> {
    let args = cli::parse_args();

    logging::setup(&args)?;

    let settings = Settings::load(&args.config.to_string_lossy())?;

    log::info!("Starting Concert Signup Controller");

    concert_signup::run(settings).await
}
