use anyhow::Result;
use dotenvy::dotenv;
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::update_listeners::webhooks;
use tokio::time::sleep;

use prepmitra::cli::{Cli, Commands};
use prepmitra::maintenance;
use prepmitra::telegram::{create_bot, schema, setup_bot_commands, HandlerDeps, PendingActions};
use prepmitra_core::logging::init_logger;
use prepmitra_core::{config, create_pool, SessionRegistry};

/// Main entry point for the Telegram bot
///
/// Parses CLI arguments and dispatches to appropriate subcommand.
///
/// # Errors
/// Returns an error if initialization fails (logging, database, bot creation).
#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse_args();

    // Set up global panic handler to catch panics in dispatcher
    // This allows us to log the panic and continue working instead of terminating
    std::panic::set_hook(Box::new(|panic_info| {
        log::error!("Panic caught: {:?}", panic_info);
        if let Some(location) = panic_info.location() {
            log::error!("Panic at {}:{}:{}", location.file(), location.line(), location.column());
        }
        if let Some(msg) = panic_info.payload().downcast_ref::<&str>() {
            log::error!("Panic message: {}", msg);
        }
    }));

    // Initialize logger (console + file)
    init_logger(&config::LOG_FILE_PATH)?;

    // Load environment variables from .env if present
    let _ = dotenv();

    // Dispatch to appropriate command
    match cli.command {
        Some(Commands::Run { webhook }) => {
            log::info!("Running bot in normal mode (webhook: {})", webhook);
            run_bot(webhook).await
        }
        Some(Commands::Maintenance { dry_run }) => {
            log::info!("Running one-shot maintenance (dry_run: {})", dry_run);
            run_maintenance(dry_run)
        }
        None => {
            // No command specified - default to running the bot
            log::info!("No command specified, running bot in default mode");
            run_bot(false).await
        }
    }
}

/// Bind address for the webhook HTTP listener
fn webhook_listen_addr() -> std::net::SocketAddr {
    std::net::SocketAddr::from(([0, 0, 0, 0], *config::WEBHOOK_PORT))
}

/// Run the retention sweep once, without notifications
fn run_maintenance(dry_run: bool) -> Result<()> {
    let db_pool = Arc::new(
        create_pool(&config::DATABASE_PATH).map_err(|e| anyhow::anyhow!("Failed to create database pool: {}", e))?,
    );

    let (questions, attempts) = maintenance::run_purge(&db_pool, dry_run)?;
    if dry_run {
        log::info!("Would purge {} question(s), {} attempt(s)", questions, attempts);
    } else {
        log::info!("Purged {} question(s), {} attempt(s)", questions, attempts);
    }
    Ok(())
}

/// Run the main bot
async fn run_bot(use_webhook: bool) -> Result<()> {
    let bot_init_start = std::time::Instant::now();
    log::info!("Starting bot...");

    // Create bot instance
    let bot = create_bot()?;

    // Get bot information; retry while the Bot API is still waking up
    let bot_info = {
        let startup_max_retries = 12;
        let mut startup_retry = 0;
        loop {
            match bot.get_me().await {
                Ok(info) => break info,
                Err(e) => {
                    let err_str = e.to_string();
                    let is_retryable = err_str.contains("network")
                        || err_str.contains("connection")
                        || err_str.contains("timed out")
                        || err_str.contains("Connection refused");

                    startup_retry += 1;
                    if startup_retry >= startup_max_retries || !is_retryable {
                        return Err(anyhow::anyhow!(
                            "Failed to connect to Bot API after {} retries: {}",
                            startup_retry,
                            e
                        ));
                    }

                    log::warn!(
                        "Bot API not ready (attempt {}/{}): {}. Retrying in 5 seconds...",
                        startup_retry,
                        startup_max_retries,
                        err_str
                    );
                    sleep(std::time::Duration::from_secs(5)).await;
                }
            }
        }
    };
    log::info!("Bot username: {:?}, Bot ID: {}", bot_info.username, bot_info.id);

    // Set up the command menu in the Telegram UI
    setup_bot_commands(&bot).await?;

    // Create database connection pool
    let db_pool = Arc::new(
        create_pool(&config::DATABASE_PATH).map_err(|e| anyhow::anyhow!("Failed to create database pool: {}", e))?,
    );

    if config::FORCE_CHANNEL.is_empty() {
        log::warn!("FORCE_CHANNEL not set - membership gate is open");
    }
    if *config::OWNER_ID == 0 {
        log::warn!("OWNER_ID not set - /addquestions uploads are disabled");
    }

    // Start the midnight sweep (retention purge + daily broadcast)
    let _sweep_handle = maintenance::spawn_daily_sweep(bot.clone(), Arc::clone(&db_pool));

    // Create handler dependencies for the modular schema
    let handler_deps = HandlerDeps::new(
        Arc::clone(&db_pool),
        Arc::new(SessionRegistry::new()),
        Arc::new(PendingActions::new()),
    );

    // Create the dispatcher handler tree using the modular schema
    let handler = schema(handler_deps);

    // Check if webhook mode is enabled
    let webhook_url = if use_webhook { config::WEBHOOK_URL.clone() } else { None };

    if let Some(url) = webhook_url {
        // Webhook mode: the listener registers the URL with Telegram
        // and serves the update endpoint itself
        let addr = webhook_listen_addr();
        log::info!("Starting bot in webhook mode at {} (listening on {})", url, addr);

        let options = webhooks::Options::new(addr, url::Url::parse(&url)?);
        let listener = webhooks::axum(bot.clone(), options)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to start webhook listener: {}", e))?;

        Dispatcher::builder(bot, handler)
            .dependencies(DependencyMap::new())
            .enable_ctrlc_handler()
            .build()
            .dispatch_with_listener(
                listener,
                LoggingErrorHandler::with_custom_text("An error from the update listener"),
            )
            .await;

        log::info!("Webhook dispatcher shutdown gracefully");
        return Ok(());
    }

    // Long polling mode (default)
    let init_elapsed = bot_init_start.elapsed();
    log::info!("Starting bot in long polling mode");
    log::info!("Bot initialization complete in {:.2}s, ready to receive updates", init_elapsed.as_secs_f64());

    // Run the dispatcher with retry logic
    let mut retry_count = 0;
    let max_retries = config::retry::MAX_DISPATCHER_RETRIES;

    loop {
        let bot_clone = bot.clone();
        let handler_clone = handler.clone();

        // Create a new dispatcher in a separate task to isolate panics;
        // they are caught via the JoinHandle
        let handle = tokio::spawn(async move {
            use teloxide::update_listeners::Polling;

            // Create polling listener that drops pending updates on start
            let listener = Polling::builder(bot_clone.clone()).drop_pending_updates().build();

            Dispatcher::builder(bot_clone, handler_clone)
                .dependencies(DependencyMap::new())
                .enable_ctrlc_handler()
                .build()
                .dispatch_with_listener(
                    listener,
                    LoggingErrorHandler::with_custom_text("An error from the update listener"),
                )
                .await
        });

        match handle.await {
            Ok(()) => {
                // Dispatcher finished normally
                log::info!("Dispatcher shutdown gracefully");
                break;
            }
            Err(join_err) => {
                if join_err.is_panic() {
                    log::error!("Dispatcher panicked: {}", join_err);

                    if retry_count < max_retries {
                        retry_count += 1;
                        log::info!(
                            "Retrying dispatcher connection after panic (attempt {}/{})...",
                            retry_count,
                            max_retries
                        );
                        sleep(config::retry::dispatcher_delay(retry_count)).await;
                    } else {
                        log::error!("Max retries reached after panic. Exiting...");
                        break;
                    }
                } else {
                    log::warn!("Dispatcher task was cancelled: {}", join_err);
                    break;
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn webhook_listener_binds_all_interfaces() {
        let addr = webhook_listen_addr();
        assert!(addr.ip().is_unspecified());
        assert_eq!(addr.port(), *config::WEBHOOK_PORT);
    }
}
