mod batch;
mod config;
mod error;
mod server;

use std::{path::PathBuf, time::Duration};

use argh::FromArgs;
use colorize::dnn::{load_model_handle, ModelHandle};
use colorize::io::ImageFormat;
use colorize::pipeline::{ImageStore, Ledger, Pipeline};

use crate::config::ServiceConfig;

#[derive(FromArgs, Debug)]
/// Grayscale image colorization service.
struct Args {
    /// path to a JSON configuration file
    #[argh(option, short = 'c')]
    config: Option<PathBuf>,

    /// path to the ONNX model, overrides the configuration
    #[argh(option, short = 'm')]
    model_path: Option<PathBuf>,

    /// path to the AB bin table (.npy or .json), overrides the configuration
    #[argh(option)]
    bins_path: Option<PathBuf>,

    /// number of intra-op threads, overrides the configuration
    #[argh(option, short = 'n')]
    num_threads: Option<usize>,

    #[argh(subcommand)]
    command: Command,
}

#[derive(FromArgs, Debug)]
#[argh(subcommand)]
enum Command {
    Serve(ServeArgs),
    InitDb(InitDbArgs),
    Colorize(ColorizeArgs),
    Batch(BatchArgs),
}

#[derive(FromArgs, Debug)]
/// Run the HTTP server.
#[argh(subcommand, name = "serve")]
struct ServeArgs {
    /// address to listen on, e.g. 0.0.0.0:3000
    #[argh(option, short = 'b')]
    bind: Option<String>,

    /// root directory of stored images
    #[argh(option)]
    storage_root: Option<PathBuf>,

    /// path to the SQLite database
    #[argh(option)]
    database_path: Option<PathBuf>,

    /// maximum upload size in bytes
    #[argh(option)]
    max_upload_bytes: Option<u64>,

    /// request timeout in seconds
    #[argh(option)]
    timeout_secs: Option<u64>,
}

#[derive(FromArgs, Debug)]
/// Create the database schema and the storage root.
#[argh(subcommand, name = "init-db")]
struct InitDbArgs {
    /// path to the SQLite database
    #[argh(option)]
    database_path: Option<PathBuf>,
}

#[derive(FromArgs, Debug)]
/// Colorize a single image file.
#[argh(subcommand, name = "colorize")]
struct ColorizeArgs {
    /// path to the input image
    #[argh(positional)]
    input: PathBuf,

    /// path to the output image, its extension selects the format
    #[argh(positional)]
    output: PathBuf,
}

#[derive(FromArgs, Debug)]
/// Colorize every image of a directory tree.
#[argh(subcommand, name = "batch")]
struct BatchArgs {
    /// directory containing the images
    #[argh(positional)]
    input_dir: PathBuf,

    /// directory receiving the colorized images
    #[argh(positional)]
    output_dir: PathBuf,

    /// output format, png or jpeg
    #[argh(option, short = 'f')]
    format: Option<ImageFormat>,

    /// number of images processed in parallel
    #[argh(option, short = 'j', default = "4")]
    jobs: usize,
}

fn load_model(config: &ServiceConfig) -> ModelHandle {
    load_model_handle(
        &config.model_path,
        config.bins_path.as_deref(),
        config.num_threads,
        config.preprocess_config(),
    )
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let args: Args = argh::from_env();

    let mut config = ServiceConfig::load(args.config.as_deref())?;
    if let Some(model_path) = args.model_path {
        config.model_path = model_path;
    }
    if let Some(bins_path) = args.bins_path {
        config.bins_path = Some(bins_path);
    }
    if let Some(num_threads) = args.num_threads {
        config.num_threads = num_threads;
    }

    match args.command {
        Command::Serve(serve) => {
            if let Some(bind) = serve.bind {
                config.bind_address = bind;
            }
            if let Some(root) = serve.storage_root {
                config.storage_root = root;
            }
            if let Some(path) = serve.database_path {
                config.database_path = path;
            }
            if let Some(max) = serve.max_upload_bytes {
                config.max_upload_bytes = max;
            }
            if let Some(secs) = serve.timeout_secs {
                config.request_timeout_secs = secs;
            }
            config.validate()?;

            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()?;
            runtime.block_on(serve_forever(config))
        }
        Command::InitDb(init) => {
            if let Some(path) = init.database_path {
                config.database_path = path;
            }
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()?;
            runtime.block_on(async {
                ImageStore::new(&config.storage_root)?;
                let ledger = Ledger::open(&config.database_path).await?;
                ledger.close().await;
                log::info!("initialized {}", config.database_path.display());
                Ok::<_, Box<dyn std::error::Error>>(())
            })
        }
        Command::Colorize(colorize) => {
            config.validate()?;
            let model = load_model(&config);
            batch::colorize_file(&model, &colorize.input, &colorize.output, config.jpeg_quality)
                .map_err(|e| e as Box<dyn std::error::Error>)?;
            log::info!("colorized {}", colorize.output.display());
            Ok(())
        }
        Command::Batch(batch) => {
            if let Some(format) = batch.format {
                config.output_format = format;
            }
            config.validate()?;
            let model = load_model(&config);
            let (done, failed) = batch::colorize_dir(
                &model,
                &batch.input_dir,
                &batch.output_dir,
                config.output_format,
                config.jpeg_quality,
                batch.jobs.max(1),
            )?;
            println!("🔥 colorized {done} images, {failed} failed");
            Ok(())
        }
    }
}

async fn serve_forever(config: ServiceConfig) -> Result<(), Box<dyn std::error::Error>> {
    log::info!("🚀 Starting the server");

    let model = {
        let config = config.clone();
        tokio::task::spawn_blocking(move || load_model(&config)).await?
    };
    if !model.is_available() {
        log::warn!("serving without a model: {}", model.describe());
    }

    let store = ImageStore::new(&config.storage_root)?;
    let ledger = Ledger::open(&config.database_path).await?;
    let pipeline = Pipeline::new(store, ledger.clone(), model, config.pipeline_settings());

    let app = server::router(server::AppState {
        pipeline,
        request_timeout: Duration::from_secs(config.request_timeout_secs),
    });

    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    log::info!("🔥 Listening on: http://{}", config.bind_address);
    log::info!("🔧 Press Ctrl+C to stop the server");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                log::error!("failed to listen for Ctrl+C: {e}");
            }
        })
        .await?;

    ledger.close().await;
    log::info!("server stopped");
    Ok(())
}
