use std::sync::Arc;

use gallery_shared::{AppConfig, AppState};
use lambda_http::{run, service_fn, tracing, Error};

mod http_handler;
use http_handler::function_handler;

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing::init_default_subscriber();

    let config = AppConfig::from_env()?;
    let state = Arc::new(AppState::from_env(config).await);

    run(service_fn(move |event| {
        let state = state.clone();
        async move { function_handler(event, state).await }
    }))
    .await
}
