use exam_timetabler::config::AppConfig;
use exam_timetabler::server;
use log::error;

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = server::run_server(config).await {
        error!("Server error: {}", e);
        std::process::exit(1);
    }
}
