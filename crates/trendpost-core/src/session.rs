//! Session: one generation run with its log and the posts it produced.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::context::{PostId, Provenance, RefinablePostContext};
use crate::log::SharedLog;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        SessionId(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for SessionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(SessionId)
    }
}

/// Owns the run's log; posts keep registration order.
#[derive(Debug)]
pub struct Session {
    id: SessionId,
    created_at: DateTime<Utc>,
    log: SharedLog,
    posts: Vec<RefinablePostContext>,
}

impl Session {
    pub fn new() -> Self {
        Self {
            id: SessionId::new(),
            created_at: Utc::now(),
            log: SharedLog::new(),
            posts: Vec::new(),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn log(&self) -> &SharedLog {
        &self.log
    }

    /// Create a context for a generated post, bound to this session's log.
    pub fn register_post(&mut self, provenance: Provenance) -> PostId {
        let context = RefinablePostContext::from_provenance(provenance, self.log.clone());
        let id = context.id();
        self.posts.push(context);
        id
    }

    pub fn post(&self, id: PostId) -> Option<&RefinablePostContext> {
        self.posts.iter().find(|p| p.id() == id)
    }

    pub fn post_mut(&mut self, id: PostId) -> Option<&mut RefinablePostContext> {
        self.posts.iter_mut().find(|p| p.id() == id)
    }

    pub fn posts(&self) -> &[RefinablePostContext] {
        &self.posts
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
