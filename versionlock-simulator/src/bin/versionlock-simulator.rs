use envconfig::Envconfig;

use versionlock_simulator::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::init_from_env()?;

    env_logger::builder().filter_level(config.log_level).init();

    versionlock_simulator::run(config).await
}
