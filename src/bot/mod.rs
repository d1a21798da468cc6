pub mod commands;

pub use commands::{Command, CommandService};

use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::telegram::{TelegramClient, Update};

const RETRY_DELAY: Duration = Duration::from_secs(3);

/// Long-polls Telegram for commands and answers them.
pub struct CommandBot {
    client: TelegramClient,
    service: CommandService,
    poll_timeout: u64,
}

impl CommandBot {
    pub fn new(client: TelegramClient, service: CommandService, poll_timeout: u64) -> Self {
        Self {
            client,
            service,
            poll_timeout,
        }
    }

    pub async fn run(&self, shutdown: CancellationToken) {
        tracing::info!("Command bot started");
        let mut offset = 0;

        loop {
            let updates = tokio::select! {
                _ = shutdown.cancelled() => break,
                updates = self.client.get_updates(offset, self.poll_timeout) => updates,
            };

            match updates {
                Ok(updates) => {
                    for update in updates {
                        offset = offset.max(update.update_id + 1);
                        self.handle_update(update).await;
                    }
                }
                Err(e) => {
                    tracing::warn!("Polling for updates failed: {}", e);
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(RETRY_DELAY) => {}
                    }
                }
            }
        }

        tracing::info!("Command bot stopped");
    }

    async fn handle_update(&self, update: Update) {
        let Some(message) = update.message else { return };
        let Some(user) = message.from else { return };
        let Some(command) = message.text.as_deref().and_then(Command::parse) else {
            return;
        };

        tracing::debug!(user_id = user.id, ?command, "Command received");
        let reply = self.service.handle(user.id, command).await;

        if let Err(e) = self.client.send_message(message.chat.id, &reply).await {
            tracing::warn!(user_id = user.id, "Reply not delivered: {}", e);
        }
    }
}
