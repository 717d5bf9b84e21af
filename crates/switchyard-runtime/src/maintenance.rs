//! Operational surface: webhook status, registration and command menus.

use std::sync::Arc;

use serde::Serialize;
use switchyard_core::{BotApi, BotCommand, CommandScope, WebhookInfo};
use switchyard_framework::CommandMeta;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{RuntimeError, RuntimeResult};
use crate::registry::BotRegistry;
use crate::webhook::WebhookRoutes;

/// Status of one bot as reported by the platform.
#[derive(Debug, Clone, Serialize)]
pub struct BotStatus {
    pub id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub webhook: Option<WebhookInfo>,
    /// Set when the platform could not be queried.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Administrative operations over every registered bot.
#[derive(Debug)]
pub struct Maintenance {
    registry: Arc<BotRegistry>,
    routes: Arc<WebhookRoutes>,
}

impl Maintenance {
    pub fn new(registry: Arc<BotRegistry>, routes: Arc<WebhookRoutes>) -> Self {
        Self { registry, routes }
    }

    /// Queries identity and webhook state of every bot.
    ///
    /// Failures are reported per bot rather than aborting the report.
    pub async fn status(&self, cancel: &CancellationToken) -> Vec<BotStatus> {
        let mut report = Vec::with_capacity(self.registry.len());

        for bot in self.registry.all() {
            let id = bot.id();
            let status = match bot.get_me(cancel).await {
                Ok(me) => match bot.get_webhook_info(cancel).await {
                    Ok(info) => BotStatus {
                        id,
                        username: me.username,
                        webhook: Some(info),
                        error: None,
                    },
                    Err(err) => BotStatus {
                        id,
                        username: me.username,
                        webhook: None,
                        error: Some(err.to_string()),
                    },
                },
                Err(err) => BotStatus {
                    id,
                    username: None,
                    webhook: None,
                    error: Some(err.to_string()),
                },
            };

            if let Some(error) = &status.error {
                warn!(bot_id = id, %error, "Bot status unavailable");
            }
            report.push(status);
        }

        report
    }

    /// Points every bot's webhook at its current guarded route.
    ///
    /// Returns the `(bot id, url)` pairs that were registered.
    pub async fn refresh(&self, cancel: &CancellationToken) -> RuntimeResult<Vec<(i64, String)>> {
        let mut registered = Vec::new();

        for bot in self.registry.all() {
            let id = bot.id();
            let url = self
                .routes
                .webhook_url(id)
                .ok_or(RuntimeError::MissingBaseUrl)?;

            bot.set_webhook(&url, cancel)
                .await
                .map_err(|err| RuntimeError::api(id, err))?;
            info!(bot_id = id, "Webhook registered");
            registered.push((id, url));
        }

        Ok(registered)
    }

    /// Removes every webhook and drops updates queued on the platform.
    pub async fn clear(&self, cancel: &CancellationToken) -> RuntimeResult<()> {
        for bot in self.registry.all() {
            let id = bot.id();
            bot.set_webhook("", cancel)
                .await
                .map_err(|err| RuntimeError::api(id, err))?;
            // Offset -1 confirms everything up to the last queued update.
            bot.get_updates(-1, 1, cancel)
                .await
                .map_err(|err| RuntimeError::api(id, err))?;
            info!(bot_id = id, "Webhook cleared");
        }
        Ok(())
    }

    /// Publishes command menus for every supported scope.
    ///
    /// Scopes no command declares are cleared so stale menus disappear.
    pub async fn publish_commands(
        &self,
        commands: &[Arc<CommandMeta>],
        cancel: &CancellationToken,
    ) -> RuntimeResult<()> {
        let menus = command_menus(commands);

        for bot in self.registry.all() {
            let id = bot.id();
            for (scope, menu) in &menus {
                let result = if menu.is_empty() {
                    bot.delete_my_commands(*scope, cancel).await
                } else {
                    bot.set_my_commands(menu, *scope, cancel).await
                };
                result.map_err(|err| RuntimeError::api(id, err))?;
                debug!(bot_id = id, ?scope, commands = menu.len(), "Command menu published");
            }
        }
        Ok(())
    }
}

/// Groups commands by the supported scopes they declare.
fn command_menus(commands: &[Arc<CommandMeta>]) -> Vec<(CommandScope, Vec<BotCommand>)> {
    CommandScope::SUPPORTED
        .iter()
        .map(|scope| {
            let menu = commands
                .iter()
                .filter(|meta| meta.scopes().contains(scope))
                .map(|meta| meta.command().clone())
                .collect();
            (*scope, menu)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockBot;
    use switchyard_core::{ApiError, BoxedBot};

    fn setup(bots: &[Arc<MockBot>], base_url: Option<&str>) -> Maintenance {
        let registry = Arc::new(BotRegistry::new());
        for bot in bots {
            registry.register(Arc::clone(bot) as BoxedBot).unwrap();
        }
        let mut routes = WebhookRoutes::new("/update");
        if let Some(url) = base_url {
            routes = routes.with_base_url(url);
        }
        Maintenance::new(registry, Arc::new(routes))
    }

    #[tokio::test]
    async fn test_status_reports_each_bot() {
        let ok = Arc::new(MockBot::new(1));
        let broken = Arc::new(MockBot::new(2));
        broken.fail_next(ApiError::Transport("connection refused".into()));
        let maintenance = setup(&[ok, broken], None);

        let report = maintenance.status(&CancellationToken::new()).await;

        assert_eq!(report.len(), 2);
        assert_eq!(report[0].username.as_deref(), Some("bot1"));
        assert_eq!(report[0].webhook.as_ref().unwrap().pending_update_count, 2);
        assert!(report[1].error.as_deref().unwrap().contains("connection refused"));

        let json = serde_json::to_value(&report[1]).unwrap();
        assert!(json.get("webhook").is_none());
    }

    #[tokio::test]
    async fn test_refresh_sets_guarded_urls() {
        let bot = Arc::new(MockBot::new(7));
        let maintenance = setup(&[Arc::clone(&bot)], Some("https://bots.example.com"));

        let registered = maintenance.refresh(&CancellationToken::new()).await.unwrap();

        let expected = maintenance.routes.webhook_url(7).unwrap();
        assert_eq!(registered, vec![(7, expected.clone())]);
        assert_eq!(bot.calls_to("setWebhook")[0].params["url"], expected);
    }

    #[tokio::test]
    async fn test_refresh_needs_base_url() {
        let maintenance = setup(&[Arc::new(MockBot::new(7))], None);
        let err = maintenance.refresh(&CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, RuntimeError::MissingBaseUrl));
    }

    #[tokio::test]
    async fn test_clear_drops_pending_updates() {
        let bot = Arc::new(MockBot::new(7));
        let maintenance = setup(&[Arc::clone(&bot)], None);

        maintenance.clear(&CancellationToken::new()).await.unwrap();

        assert_eq!(bot.methods(), vec!["setWebhook", "getUpdates"]);
        assert_eq!(bot.calls_to("setWebhook")[0].params["url"], "");
        let drain = &bot.calls_to("getUpdates")[0].params;
        assert_eq!(drain["offset"], -1);
        assert_eq!(drain["limit"], 1);
    }

    #[tokio::test]
    async fn test_publish_commands_per_scope() {
        let bot = Arc::new(MockBot::new(7));
        let maintenance = setup(&[Arc::clone(&bot)], None);
        let commands = vec![
            Arc::new(CommandMeta::new("start", "Start over")),
            Arc::new(
                CommandMeta::new("help", "Show help")
                    .scope(CommandScope::AllPrivateChats)
                    .scope(CommandScope::AllGroupChats),
            ),
            Arc::new(CommandMeta::new("pin", "Pin").scope(CommandScope::Chat { chat_id: 3 })),
        ];

        maintenance
            .publish_commands(&commands, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(
            bot.methods(),
            vec!["setMyCommands", "setMyCommands", "setMyCommands", "deleteMyCommands"]
        );
        let set = bot.calls_to("setMyCommands");
        assert_eq!(set[0].params["scope"]["type"], "default");
        assert_eq!(set[0].params["commands"][0]["command"], "start");
        assert_eq!(set[1].params["scope"]["type"], "all_private_chats");
        assert_eq!(set[1].params["commands"][0]["command"], "help");
        assert_eq!(set[2].params["scope"]["type"], "all_group_chats");
        assert_eq!(
            bot.calls_to("deleteMyCommands")[0].params["scope"]["type"],
            "all_chat_administrators"
        );
    }
}
