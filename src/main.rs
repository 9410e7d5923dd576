use env_logger::Env;
use log::error;

use softwaretest::startup;

#[actix_web::main]
async fn main() {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    if let Err(err) = startup::launch().await {
        error!("{}", err);
        std::process::exit(1);
    }
}
