//! # tourney-engine
//!
//! The stateful side of a tournament: registration, the tournament state machine, the match
//! lifecycle and round advancement. Pairings and standings are computed by the pure generators
//! of [`tourney_core`].
//!
//! All operations go through [`Engine`], a cheaply cloneable handle that can be shared between
//! threads. Every mutation takes the calling [`Actor`] and checks it against the configured
//! [`Permissions`].
//!
//! Operations on different matches run in parallel. Concurrent operations on the same match
//! fail with [`Error::ConcurrentModification`] for everyone but the first caller, round
//! advancement is serialized per tournament.
pub mod clock;
pub mod config;
pub mod error;
pub mod event_log;
pub mod id;
pub mod model;
pub mod permissions;
pub mod views;

mod coordinator;
mod lifecycle;
mod registration;
mod status;
mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use coordinator::{Advance, RoundSummary};
pub use error::{Conflict, Entity, Error, Result};
pub use event_log::{Change, Event, LogEntry};
pub use id::{LogEntryId, MatchId, RegistrationId, TournamentId, UserId};
pub use lifecycle::ResetOutcome;
pub use model::{
    Actor, Match, MatchStatus, NewTournament, Organizer, OrganizerRole, Registration,
    RegistrationStatus, ScoreReport, SystemRole, Tournament, TournamentStatus,
};
pub use permissions::{Permissions, RolePermissions};
pub use status::Transition;
pub use views::{BracketView, MatchFilter, Progress, RoundView, TournamentSnapshot};

use std::ops::Deref;
use std::sync::Arc;

use crate::store::Store;

#[derive(Clone, Debug)]
pub struct Engine(Arc<EngineInner>);

impl Engine {
    /// Creates a new `Engine` using the system clock and [`RolePermissions`].
    pub fn new(config: Config) -> Self {
        Self::with_collaborators(config, Arc::new(SystemClock), Arc::new(RolePermissions))
    }

    pub fn with_collaborators(
        config: Config,
        clock: Arc<dyn Clock>,
        permissions: Arc<dyn Permissions>,
    ) -> Self {
        log::debug!("Creating new Engine with {:?}", config);

        Self(Arc::new(EngineInner {
            config,
            clock,
            permissions,
            store: Store::default(),
        }))
    }

    fn forbidden(actor: &Actor, action: &'static str, entity: Entity) -> Error {
        log::debug!("Denied {} on {} for user {}", action, entity, actor.user);

        Error::Forbidden {
            user: actor.user,
            action,
            entity,
        }
    }
}

impl Deref for Engine {
    type Target = EngineInner;

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[derive(Debug)]
pub struct EngineInner {
    pub config: Config,
    pub clock: Arc<dyn Clock>,
    pub permissions: Arc<dyn Permissions>,
    store: Store,
}
