use std::{env, fs, io::ErrorKind, path::Path, process::ExitCode, sync::Arc};

use config::MineginxConfig;
use log::{error, info};
use simple_logger::SimpleLogger;
use tokio::net::TcpListener;

mod config;
mod error;
mod resolve;
mod session;
mod stream;

const CONFIG_FILE: &str = "./config/mineginx.yaml";

fn read_config() -> Result<MineginxConfig, String> {
    let config = fs::read(CONFIG_FILE);

    let config: MineginxConfig = match config {
        Ok(v) => serde_yaml::from_slice(&v)
            .map_err(|e| format!("failed to parse config file: '{CONFIG_FILE}': {e}"))?,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            generate_config().map_err(|e| format!("config not found. failed to generate new one: {e}"))?
        }
        Err(e) => return Err(format!("failed to read config file: '{CONFIG_FILE}', error: {e}")),
    };

    config.validate().map_err(|e| e.to_string())?;
    Ok(config)
}

fn generate_config() -> Result<MineginxConfig, String> {
    info!("generate new configuration file");
    let config = MineginxConfig {
        listen_addr: "0.0.0.0".to_string(),
        listen_port: 25565,
        primary_host: "127.0.0.1".to_string(),
        primary_port: 25566,
        sidecar_host: String::new(),
        sidecar_port: 0,
        server_domain: String::new(),
        mode: config::ProxyMode::PassThroughDedicated,
        sync_motd: true,
        motd_default: "A Minecraft Server".to_string(),
        handshake_timeout_ms: Some(30_000),
        idle_timeout_ms: Some(60_000),
    };
    let yaml = match serde_yaml::to_string(&config) {
        Ok(x) => x,
        Err(err) => return Err(format!("failed to serialize default configuration: {}", err)),
    };

    if !Path::new("./config").exists() {
        if let Err(err) = fs::create_dir("./config") {
            return Err(format!("failed to create config directory: {}", err));
        }
    }
    if let Err(err) = fs::write("./config/mineginx.yaml", yaml) {
        return Err(format!("failed to save default configuration: {}", err));
    }

    Ok(config)
}

async fn check_config() -> Option<()> {
    info!("trying to parse config and exit");
    match read_config() {
        Ok(_) => {
            info!("it's fine! let's try to run");
            Some(())
        }
        Err(e) => {
            error!("there are some errors: {e}");
            None
        }
    }
}

async fn accept_loop(listener: TcpListener, config: Arc<MineginxConfig>) {
    loop {
        let (socket, _address) = match listener.accept().await {
            Ok(x) => x,
            Err(e) => {
                error!("failed to accept client: {e}");
                continue;
            }
        };
        let conf = config.clone();
        tokio::spawn(async move {
            session::handle_client(socket, conf).await;
        });
    }
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
    SimpleLogger::new().init().unwrap();

    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("PANIC: {}", panic_info);
        log::error!("panic occurred: {}", panic_info);
    }));

    let mut args = env::args();
    if args.any(|x| &x == "-t") {
        return match check_config().await {
            Some(_) => ExitCode::from(0),
            None => ExitCode::from(1),
        };
    }

    info!(
        "mineginx version: {} ({})",
        env!("MINEGINX_VERSION"),
        env!("MINEGINX_HASH")
    );

    let config: Arc<MineginxConfig> = match read_config() {
        Ok(x) => Arc::new(x),
        Err(e) => {
            error!("failed to read config: {e}");
            return ExitCode::from(2);
        }
    };

    let listen = format!("{}:{}", config.listen_addr, config.listen_port);
    info!("listening {}", &listen);
    let listener = match TcpListener::bind(&listen).await {
        Ok(l) => l,
        Err(e) => {
            error!("failed to bind {}: {e}", &listen);
            return ExitCode::from(3);
        }
    };

    let conf = config.clone();
    tokio::spawn(async move {
        accept_loop(listener, conf).await;
    });

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("failed to listen for ctrl_c signal: {e}");
    }
    info!("shutdown");
    ExitCode::from(0)
}
