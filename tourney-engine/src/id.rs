use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use snowflaked::sync::Generator;
use tourney_core::ParticipantId;

const INSTANCE: u16 = 0;

static TOURNAMENT: Generator = Generator::new_unchecked(INSTANCE);
static MATCH: Generator = Generator::new_unchecked(INSTANCE);
static REGISTRATION: Generator = Generator::new_unchecked(INSTANCE);
static LOG_ENTRY: Generator = Generator::new_unchecked(INSTANCE);

macro_rules! id {
    ($name:ident, $id:ty) => {
        #[derive(
            Copy,
            Clone,
            Debug,
            Default,
            PartialEq,
            Eq,
            PartialOrd,
            Ord,
            Hash,
            Serialize,
            Deserialize,
        )]
        #[repr(transparent)]
        #[serde(transparent)]
        pub struct $name(pub $id);

        impl Display for $name {
            #[inline]
            fn fmt(&self, f: &mut Formatter) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl From<$id> for $name {
            #[inline]
            fn from(id: $id) -> Self {
                Self(id)
            }
        }

        impl FromStr for $name {
            type Err = <$id as FromStr>::Err;

            #[inline]
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(s.parse::<$id>()?))
            }
        }
    };
    ($name:ident, $id:ty, $generator:ident) => {
        id!($name, $id);

        impl $name {
            /// Returns a new unique id.
            #[inline]
            pub(crate) fn generate() -> Self {
                Self($generator.generate())
            }
        }
    };
}

id!(TournamentId, u64, TOURNAMENT);
id!(MatchId, u64, MATCH);
id!(RegistrationId, u64, REGISTRATION);
id!(LogEntryId, u64, LOG_ENTRY);
id!(UserId, u64);

impl UserId {
    /// The author of changes the engine applies on its own, e.g. closing registration at the
    /// deadline.
    pub const SYSTEM: Self = Self(0);
}

/// Users participate under their own id.
impl From<UserId> for ParticipantId {
    #[inline]
    fn from(id: UserId) -> Self {
        Self(id.0)
    }
}

impl PartialEq<ParticipantId> for UserId {
    #[inline]
    fn eq(&self, other: &ParticipantId) -> bool {
        self.0 == other.0
    }
}
