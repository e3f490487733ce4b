use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

macro_rules! snowflake_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub u64);

        impl $name {
            pub fn get(self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = ParseIntError;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                value.trim().parse::<u64>().map(Self)
            }
        }
    };
}

snowflake_id!(
    /// A platform user, independent of any guild.
    UserId
);
snowflake_id!(
    /// A guild (the top-level community container).
    GuildId
);
snowflake_id!(ChannelId);
snowflake_id!(RoleId);

impl GuildId {
    /// The implicit `@everyone` role shares its id with the guild.
    pub fn everyone_role(self) -> RoleId {
        RoleId(self.0)
    }
}
