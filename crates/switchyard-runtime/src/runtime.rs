//! Assembly of the runtime from configuration.
//!
//! [`Switchyard`] owns the pieces a host needs: the bot registry, the
//! webhook routes, the outbound pipeline, the inbound [`Endpoint`] and the
//! [`Maintenance`] surface. Bots registered through it are wrapped in the
//! resilience pipeline before handlers ever see them.
//!
//! ```rust,ignore
//! let switchyard = Switchyard::builder()
//!     .config_file("config/switchyard.toml")
//!     .profile("production")
//!     .build(handlers)?;
//!
//! switchyard.register_bot(client)?;
//! let outcome = switchyard.endpoint().receive(token, &body, &cancel).await;
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use switchyard_core::{Bot, BoxedBot};
use switchyard_framework::UpdateHandlers;
use tracing::{info, warn};

use crate::config::{ConfigLoader, SwitchyardConfig};
use crate::endpoint::Endpoint;
use crate::error::RuntimeResult;
use crate::logging;
use crate::maintenance::Maintenance;
use crate::pipeline::{OutboundPipeline, ResilientBot};
use crate::registry::BotRegistry;
use crate::webhook::{SaltProvider, WebhookRoutes};

/// The assembled runtime.
pub struct Switchyard {
    config: SwitchyardConfig,
    registry: Arc<BotRegistry>,
    routes: Arc<WebhookRoutes>,
    pipeline: Arc<OutboundPipeline>,
    endpoint: Endpoint,
    maintenance: Maintenance,
}

impl Switchyard {
    pub fn builder() -> SwitchyardBuilder {
        SwitchyardBuilder::new()
    }

    /// Assembles a runtime from `config`, dispatching into `handlers`.
    ///
    /// Logging is initialized from `config.logging` unless a subscriber is
    /// already installed.
    pub fn from_config(config: &SwitchyardConfig, handlers: UpdateHandlers) -> Self {
        logging::init_from_config(&config.logging);
        Self::assemble(config, handlers, None)
    }

    fn assemble(
        config: &SwitchyardConfig,
        handlers: UpdateHandlers,
        salts: Option<Arc<dyn SaltProvider>>,
    ) -> Self {
        let registry = Arc::new(BotRegistry::new());

        let mut routes = WebhookRoutes::from_config(&config.webhook);
        if let Some(salts) = salts {
            routes = routes.with_salts(salts);
        }
        let routes = Arc::new(routes);

        let pipeline = Arc::new(OutboundPipeline::new(config.resilience.clone()));
        let endpoint = Endpoint::new(
            Arc::clone(&registry),
            Arc::clone(&routes),
            Arc::new(handlers),
        )
        .with_handler_timeout(config.dispatch.handler_timeout())
        .with_cancel_grace(config.dispatch.cancel_grace());
        let maintenance = Maintenance::new(Arc::clone(&registry), Arc::clone(&routes));

        info!(
            handlers = endpoint.handler_count(),
            bots = config.bots.len(),
            webhook_path = %config.webhook.path,
            "Runtime assembled"
        );

        Self {
            config: config.clone(),
            registry,
            routes,
            pipeline,
            endpoint,
            maintenance,
        }
    }

    /// Registers `bot` behind the outbound pipeline.
    ///
    /// Returns the wrapped bot, which is what handlers receive.
    pub fn register_bot(&self, bot: impl Bot) -> RuntimeResult<BoxedBot> {
        let id = bot.id();
        if !self.config.bots.is_empty() && !self.config.bots.iter().any(|b| b.id == id) {
            warn!(bot_id = id, "Registering a bot that is not listed in the configuration");
        }

        let wrapped: BoxedBot = Arc::new(ResilientBot::new(bot, Arc::clone(&self.pipeline)));
        self.registry.register(Arc::clone(&wrapped))?;
        Ok(wrapped)
    }

    pub fn config(&self) -> &SwitchyardConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<BotRegistry> {
        &self.registry
    }

    pub fn routes(&self) -> &Arc<WebhookRoutes> {
        &self.routes
    }

    pub fn pipeline(&self) -> &Arc<OutboundPipeline> {
        &self.pipeline
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn maintenance(&self) -> &Maintenance {
        &self.maintenance
    }
}

/// Builder loading configuration before assembling a [`Switchyard`].
pub struct SwitchyardBuilder {
    config_file: Option<PathBuf>,
    profile: Option<String>,
    config: Option<SwitchyardConfig>,
    salts: Option<Arc<dyn SaltProvider>>,
    init_logging: bool,
}

impl Default for SwitchyardBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SwitchyardBuilder {
    pub fn new() -> Self {
        Self {
            config_file: None,
            profile: None,
            config: None,
            salts: None,
            init_logging: true,
        }
    }

    /// Loads this file instead of searching the default locations.
    pub fn config_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_file = Some(path.into());
        self
    }

    pub fn profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = Some(profile.into());
        self
    }

    /// Uses `config` as-is and skips loading.
    pub fn config(mut self, config: SwitchyardConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Salts webhook routes through `salts`.
    pub fn salts(mut self, salts: Arc<dyn SaltProvider>) -> Self {
        self.salts = Some(salts);
        self
    }

    /// Leaves the tracing subscriber to the host.
    pub fn without_logging(mut self) -> Self {
        self.init_logging = false;
        self
    }

    pub fn build(self, handlers: UpdateHandlers) -> RuntimeResult<Switchyard> {
        let config = match self.config {
            Some(config) => config,
            None => {
                let mut loader = ConfigLoader::new();
                if let Some(profile) = &self.profile {
                    loader = loader.profile(profile);
                }
                loader = match &self.config_file {
                    Some(path) => loader.file(path),
                    None => loader.with_current_dir().with_user_config_dir(),
                };
                loader.load()?
            }
        };

        if self.init_logging {
            logging::init_from_config(&config.logging);
        }
        Ok(Switchyard::assemble(&config, handlers, self.salts))
    }
}
