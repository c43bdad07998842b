use std::thread;
use std::time::Duration;

use anyhow::Result;
use tokio::io::{stdin, stdout};
use tower_lsp::{LspService, Server};

use crate::lsp::backend::Backend;
use crate::lsp::handlers::RECONCILE_REQUEST_METHOD;
use crate::Config;

/// Start the LSP server
pub async fn serve() -> Result<()> {
    let config = Config::from_args_and_env()?;

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&config.log_level))
        .target(env_logger::Target::Stderr)
        .init();

    // Under the smoke test, exit shortly so the test can read stdout to EOF
    if std::env::var("POM_LS_TEST_EXIT").as_deref() == Ok("1") {
        thread::spawn(|| {
            thread::sleep(Duration::from_secs(1));
            std::process::exit(0);
        });
    }

    for path in &config.settings_files {
        log::info!("Loaded settings from {}", path.display());
    }
    log::info!(
        "Serving '{}' descriptors under {}",
        config.descriptor,
        config.root.display()
    );

    let (service, socket) = LspService::build(move |client| Backend::new(client, config.clone()))
        .custom_method(RECONCILE_REQUEST_METHOD, Backend::reconcile_request)
        .finish();

    Server::new(stdin(), stdout(), socket).serve(service).await;

    Ok(())
}
