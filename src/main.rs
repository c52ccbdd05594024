use clap::{Parser, Subcommand};
use env_logger::fmt::Formatter;
use log::{info, Record};
use mlserve::config::{parse_origins, ServeConfig};
use mlserve::model::backends::onnx::sklearn_onnx;
use mlserve::serve::run_server;
use std::io::Write;
use std::path::PathBuf;

/// Serve a pre-trained model for inference over HTTP
#[derive(Parser, Debug)]
#[command(
    name = "mlserve",
    version,
    about = "Serve a pre-trained ONNX model for single-sample inference",
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// serve the model over a JSON web API
    Serve {
        /// host to listen to. Defaults to $MLSERVE_HOST or 0.0.0.0
        #[arg(short('H'), long)]
        host: Option<String>,

        /// port to listen to. Defaults to $MLSERVE_PORT or 8000
        #[arg(short, long)]
        port: Option<u16>,

        /// model artifact to load. Defaults to $MODEL_PATH or ./models/model.onnx
        #[arg(short, long)]
        model_path: Option<PathBuf>,

        /// comma-separated allowed CORS origins. Defaults to $CORS_ORIGINS
        #[arg(long)]
        cors_origins: Option<String>,
    },

    /// load a model artifact and print its signature
    Inspect {
        /// model artifact to inspect. Defaults to $MODEL_PATH or ./models/model.onnx
        #[arg(short, long)]
        model_path: Option<PathBuf>,
    },
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    env_logger::builder()
        .format(|buf: &mut Formatter, record: &Record| {
            writeln!(
                buf,
                "[{} {}] {}",
                chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
                record.level(),
                record.args()
            )
        })
        .filter_module("ort::execution_providers", log::LevelFilter::Error)
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    let cli = Cli::parse();
    let mut config = ServeConfig::from_env();

    match cli.command {
        Commands::Serve {
            host,
            port,
            model_path,
            cors_origins,
        } => {
            if let Some(host) = host {
                config.host = host;
            }
            if let Some(port) = port {
                config.port = port;
            }
            if let Some(model_path) = model_path {
                config.model_path = model_path;
            }
            if let Some(cors_origins) = cors_origins {
                config.cors_origins = parse_origins(&cors_origins);
            }
            run_server(config).await?;
        }

        Commands::Inspect { model_path } => {
            let path = model_path.unwrap_or(config.model_path);
            let description = sklearn_onnx::inspect(&path)?;
            info!("Model at {} loaded", path.display());
            println!("{}", serde_json::to_string_pretty(&description)?);
        }
    }

    Ok(())
}
