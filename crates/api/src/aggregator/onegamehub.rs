//! OneGameHub adapters.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use domain::{Game, Platform, Session};

use super::{
    AdapterError, AggregatorAdapters, FreespinAdapter, FreespinGrant, GameSyncAdapter,
    LaunchUrlAdapter,
};

pub const AGGREGATOR: &str = "onegamehub";

/// OneGameHub settings.
#[derive(Debug, Clone)]
pub struct OneGameHubConfig {
    pub launch_url: String,
    pub operator_id: String,
    /// Games offered through OneGameHub.
    pub games: Vec<Game>,
}

impl Default for OneGameHubConfig {
    fn default() -> Self {
        Self {
            launch_url: "https://play.onegamehub.com/launch".to_string(),
            operator_id: "operator".to_string(),
            games: vec![
                Game::new("ogh-fruit-party", "Fruit Party", AGGREGATOR).with_bonus_bets(true),
                Game::new("ogh-book-of-gold", "Book of Gold", AGGREGATOR),
            ],
        }
    }
}

/// Builds the registry factory for OneGameHub.
///
/// Free-round grants are shared by every adapter set the factory produces.
pub fn factory(config: OneGameHubConfig) -> impl Fn() -> AggregatorAdapters + Send + Sync + 'static {
    let config = Arc::new(config);
    let freespins = OneGameHubFreespins::default();
    move || AggregatorAdapters {
        launch: Arc::new(OneGameHubLaunch {
            config: config.clone(),
        }),
        freespins: Arc::new(freespins.clone()),
        games: Arc::new(OneGameHubGames {
            config: config.clone(),
        }),
    }
}

struct OneGameHubLaunch {
    config: Arc<OneGameHubConfig>,
}

impl LaunchUrlAdapter for OneGameHubLaunch {
    fn launch_url(&self, session: &Session, game: &Game) -> Result<String, AdapterError> {
        let platform = match session.platform {
            Platform::Desktop => "desktop",
            Platform::Mobile => "mobile",
        };
        Ok(format!(
            "{}?operator_id={}&game_id={}&token={}&currency={}&lang={}&platform={}",
            self.config.launch_url,
            self.config.operator_id,
            game.id,
            session.token,
            session.currency.as_str(),
            session.locale,
            platform
        ))
    }
}

/// Records free-round grants; the id is echoed back as `freerounds_id` on spins.
#[derive(Debug, Clone, Default)]
pub struct OneGameHubFreespins {
    grants: Arc<RwLock<HashMap<String, FreespinGrant>>>,
}

impl OneGameHubFreespins {
    pub fn grant_count(&self) -> usize {
        self.grants
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[async_trait]
impl FreespinAdapter for OneGameHubFreespins {
    async fn grant(&self, grant: FreespinGrant) -> Result<String, AdapterError> {
        if grant.rounds == 0 {
            return Err(AdapterError::InvalidGrant("rounds must be positive".into()));
        }
        if !grant.bet.is_positive() {
            return Err(AdapterError::InvalidGrant("bet must be positive".into()));
        }

        let id = format!("fr-{}", uuid::Uuid::new_v4().simple());
        tracing::info!(
            freerounds_id = %id,
            player_id = %grant.player_id,
            game_id = %grant.game_id,
            rounds = grant.rounds,
            "free rounds granted"
        );
        self.grants
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.clone(), grant);
        Ok(id)
    }
}

struct OneGameHubGames {
    config: Arc<OneGameHubConfig>,
}

#[async_trait]
impl GameSyncAdapter for OneGameHubGames {
    async fn fetch_games(&self) -> Result<Vec<Game>, AdapterError> {
        Ok(self.config.games.clone())
    }
}
