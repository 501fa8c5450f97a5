use clap::Parser;
use spinframe::fetch::AssetSource;
use tokio::runtime::Runtime;
use turntable::app::App;
use turntable::config;
use turntable::sys::runtime;

#[derive(Parser, Debug)]
#[command(name = "turntable", version, about = "360° product spin viewer daemon", long_about = None)]
struct Cli {
    /// Write the default product registry to the config directory and exit
    #[arg(long)]
    init: bool,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    if cli.init {
        let path = config::write_default_config()?;
        println!("{}", path.display());
        return Ok(());
    }

    let config = config::load_or_default();
    for (product, e) in config.invalid_products() {
        log::error!("Product {} is invalid: {}", product.name, e);
    }
    let source = AssetSource::from_origin(&config.origin)?;
    let socket_path = config.socket_path.clone();
    log::info!(
        "Serving {} products from {}",
        config.products.len(),
        config.origin
    );

    let (tx, rx) = async_channel::bounded(32);

    let rt = Runtime::new()?;
    rt.block_on(async {
        // Start Background Services
        runtime::start_background_services(&config, tx);
        App::new(config, source).run(rx).await;
    });

    let _ = fs_err::remove_file(&socket_path);
    Ok(())
}
