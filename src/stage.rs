use crate::config::Config;
use crate::error::app_error::AppError;
use crate::hub::Hub;
use crate::store::credentials::CredentialStore;
use crate::store::files::FileStore;
use crate::store::sessions::SessionStore;
use rocket::fairing::AdHoc;
use std::sync::Arc;
use std::time::Duration;

async fn init_hub(config: &Config) -> Result<Hub, AppError> {
    let devices = config.devices.clone();
    // Plaintext passwords in the allow-list are hashed here, off the runtime.
    let credentials = tokio::task::spawn_blocking(move || CredentialStore::from_config(&devices)).await??;
    if credentials.device_ids().is_empty() {
        tracing::warn!("No devices configured; every device handshake will be rejected");
    }

    let files = FileStore::new(config.storage.qr_root.clone(), config.storage.photo_root.clone());
    files.prepare().await?;

    let hub = Hub::new(&config.relay, config.photo.clone(), Arc::new(credentials), files);
    let restored = hub.restore_ledgers().await?;
    tracing::info!(restored, "PDF history loaded from disk");
    Ok(hub)
}

pub fn stage_relay(config: Config) -> AdHoc {
    AdHoc::try_on_ignite("Relay State", |rocket| async move {
        match init_hub(&config).await {
            Ok(hub) => {
                let sessions = Arc::new(SessionStore::new(
                    config.session.ttl(),
                    Duration::from_secs(config.session.cleanup_interval_seconds),
                ));
                Arc::clone(&sessions).spawn_cleanup_task();

                tracing::info!(devices = hub.credentials().device_ids().len(), "Relay state initialized successfully");
                Ok(rocket.manage(Arc::new(hub)).manage(sessions))
            }
            Err(e) => {
                tracing::error!("Failed to initialize relay state: {:?}", e);
                Err(rocket)
            }
        }
    })
}
