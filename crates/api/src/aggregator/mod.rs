//! Aggregator adapters and the registry that selects them by tag.
//!
//! The sagas never see an aggregator: adapters only build launch URLs, grant
//! free rounds and supply the game list synced into the catalog.

pub mod onegamehub;

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::PlayerId;
use domain::{Game, GameId, Money, Session};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Supported aggregators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregatorTag {
    OneGameHub,
}

impl AggregatorTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            AggregatorTag::OneGameHub => "onegamehub",
        }
    }
}

impl fmt::Display for AggregatorTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AggregatorTag {
    type Err = AdapterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "onegamehub" => Ok(AggregatorTag::OneGameHub),
            other => Err(AdapterError::UnknownAggregator(other.to_string())),
        }
    }
}

/// Errors raised by aggregator adapters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdapterError {
    #[error("Unknown aggregator: {0}")]
    UnknownAggregator(String),

    #[error("Invalid free rounds grant: {0}")]
    InvalidGrant(String),

    #[error("Aggregator request failed: {0}")]
    Upstream(String),
}

/// A free-rounds grant for one player and game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FreespinGrant {
    pub player_id: PlayerId,
    pub game_id: GameId,
    pub rounds: u32,
    /// Stake of each free round, in minor units.
    pub bet: Money,
    pub expires_at: DateTime<Utc>,
}

/// Builds the URL that starts a game for a session.
pub trait LaunchUrlAdapter: Send + Sync {
    fn launch_url(&self, session: &Session, game: &Game) -> Result<String, AdapterError>;
}

/// Grants free rounds. Returns the aggregator's `freerounds_id`.
#[async_trait]
pub trait FreespinAdapter: Send + Sync {
    async fn grant(&self, grant: FreespinGrant) -> Result<String, AdapterError>;
}

/// Lists the aggregator's games for catalog synchronization.
#[async_trait]
pub trait GameSyncAdapter: Send + Sync {
    async fn fetch_games(&self) -> Result<Vec<Game>, AdapterError>;
}

/// The capabilities one aggregator provides.
#[derive(Clone)]
pub struct AggregatorAdapters {
    pub launch: Arc<dyn LaunchUrlAdapter>,
    pub freespins: Arc<dyn FreespinAdapter>,
    pub games: Arc<dyn GameSyncAdapter>,
}

type AdapterFactory = Box<dyn Fn() -> AggregatorAdapters + Send + Sync>;

/// Maps aggregator tags to adapter factories.
#[derive(Default)]
pub struct AdapterRegistry {
    factories: HashMap<AggregatorTag, AdapterFactory>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) the factory of an aggregator.
    pub fn register<F>(&mut self, tag: AggregatorTag, factory: F)
    where
        F: Fn() -> AggregatorAdapters + Send + Sync + 'static,
    {
        self.factories.insert(tag, Box::new(factory));
    }

    /// Builds the adapters of an aggregator.
    pub fn adapters(&self, tag: AggregatorTag) -> Result<AggregatorAdapters, AdapterError> {
        self.factories
            .get(&tag)
            .map(|factory| factory())
            .ok_or_else(|| AdapterError::UnknownAggregator(tag.to_string()))
    }

    /// Resolves a tag from a path segment and checks it is registered.
    pub fn resolve(&self, name: &str) -> Result<AggregatorTag, AdapterError> {
        let tag: AggregatorTag = name.parse()?;
        if self.factories.contains_key(&tag) {
            Ok(tag)
        } else {
            Err(AdapterError::UnknownAggregator(name.to_string()))
        }
    }

    pub fn tags(&self) -> Vec<AggregatorTag> {
        self.factories.keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::onegamehub::{self, OneGameHubConfig};

    #[test]
    fn test_tag_parsing() {
        assert_eq!(
            "OneGameHub".parse::<AggregatorTag>().unwrap(),
            AggregatorTag::OneGameHub
        );
        assert!(matches!(
            "acme".parse::<AggregatorTag>(),
            Err(AdapterError::UnknownAggregator(_))
        ));
    }

    #[test]
    fn test_unregistered_tag_is_rejected() {
        let registry = AdapterRegistry::new();
        assert!(registry.resolve("onegamehub").is_err());
        assert!(registry.adapters(AggregatorTag::OneGameHub).is_err());
    }

    #[tokio::test]
    async fn test_registered_factory_builds_adapters() {
        let mut registry = AdapterRegistry::new();
        registry.register(
            AggregatorTag::OneGameHub,
            onegamehub::factory(OneGameHubConfig::default()),
        );

        let tag = registry.resolve("onegamehub").unwrap();
        let adapters = registry.adapters(tag).unwrap();
        let games = adapters.games.fetch_games().await.unwrap();

        assert!(!games.is_empty());
        assert_eq!(registry.tags(), vec![AggregatorTag::OneGameHub]);
    }
}
