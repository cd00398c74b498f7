use std::fmt;

use anyhow::Result;
use serde::{Deserialize, Serialize};

// GTFS identifiers are opaque strings. Wrapping each kind keeps a stop ID from being passed where a
// trip ID is expected.
macro_rules! string_id {
    ($name:ident) => {
        #[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(String);

        impl $name {
            pub fn new<S: Into<String>>(id: S) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self::new(id)
            }
        }
    };
}

string_id!(StopID);
string_id!(TripID);
string_id!(RouteID);
string_id!(ShapeID);
string_id!(ServiceID);

/// The optional binary `direction_id` of a trip. 0 and 1 are arbitrary labels for the two
/// directions of a route.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DirectionID(u8);

impl DirectionID {
    pub fn new(raw: u8) -> Result<Self> {
        if raw > 1 {
            bail!("Unknown direction_id {raw}");
        }
        Ok(Self(raw))
    }

    pub fn inner(self) -> u8 {
        self.0
    }
}

impl fmt::Display for DirectionID {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
