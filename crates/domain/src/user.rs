use crate::shared::entity::{Entity, ID};

/// A `User` owns `Schedule`s. It exists so that quota checks and cascade
/// deletes have something to hang off of, authentication happens outside
/// the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: ID,
    pub created_at: i64,
}

impl User {
    pub fn new(now: i64) -> Self {
        Self {
            id: Default::default(),
            created_at: now,
        }
    }
}

impl Entity for User {
    fn id(&self) -> &ID {
        &self.id
    }
}
