use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Authenticated caller attached to a request by an auth operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: String,
    #[serde(default)]
    pub roles: Vec<String>,
}

impl Identity {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            roles: Vec::new(),
        }
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.roles.push(role.into());
        self
    }
}

/// Request-scoped state threaded through a pipeline.
///
/// Operators never mutate the context they receive; they derive a new one
/// with the `with_*` methods and hand it back in their output. The
/// request id, deadline and cancellation token are fixed for the lifetime
/// of a request. `user` and `token` are the well-known keys that operators
/// may set and that [`RequestContext::merge_siblings`] combines.
#[derive(Debug, Clone)]
pub struct RequestContext {
    request_id: Uuid,
    user: Option<Identity>,
    token: Option<String>,
    deadline: Option<Instant>,
    cancellation: CancellationToken,
}

impl RequestContext {
    pub fn new() -> Self {
        Self {
            request_id: Uuid::new_v4(),
            user: None,
            token: None,
            deadline: None,
            cancellation: CancellationToken::new(),
        }
    }

    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    pub fn user(&self) -> Option<&Identity> {
        self.user.as_ref()
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    pub fn with_user(&self, user: Identity) -> Self {
        Self {
            user: Some(user),
            ..self.clone()
        }
    }

    pub fn without_user(&self) -> Self {
        Self {
            user: None,
            ..self.clone()
        }
    }

    pub fn with_token(&self, token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
            ..self.clone()
        }
    }

    /// Attach a deadline. An earlier existing deadline is kept.
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let deadline = match self.deadline {
            Some(existing) if existing < deadline => existing,
            _ => deadline,
        };
        Self {
            deadline: Some(deadline),
            ..self.clone()
        }
    }

    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Replace the cancellation token, typically with a child of the current one.
    pub fn with_cancellation(&self, cancellation: CancellationToken) -> Self {
        Self {
            cancellation,
            ..self.clone()
        }
    }

    /// Combine the contexts produced by sibling operators of one level.
    ///
    /// Last writer wins per well-known key: siblings are visited in the
    /// order given and the last one holding a value for a key supplies it.
    /// A key no sibling holds is absent from the result. Request-scoped
    /// fields (id, deadline, cancellation) come from `self`, the context
    /// the level started with. This is not a conflict-free merge; two
    /// siblings setting the same key race, and whichever sits later in the
    /// level order wins.
    pub fn merge_siblings(&self, siblings: &[RequestContext]) -> RequestContext {
        if siblings.is_empty() {
            return self.clone();
        }

        let mut merged = Self {
            user: None,
            token: None,
            ..self.clone()
        };
        for sibling in siblings {
            if let Some(user) = &sibling.user {
                merged.user = Some(user.clone());
            }
            if let Some(token) = &sibling.token {
                merged.token = Some(token.clone());
            }
        }
        merged
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_leaves_original_untouched() {
        let base = RequestContext::new();
        let derived = base.with_user(Identity::new("ada"));

        assert!(base.user().is_none());
        assert_eq!(derived.user().map(|u| u.user_id.as_str()), Some("ada"));
        assert_eq!(base.request_id(), derived.request_id());
    }

    #[test]
    fn merge_takes_last_sibling_per_key() {
        let base = RequestContext::new();
        let a = base.with_user(Identity::new("A")).with_token("t-a");
        let b = base.with_user(Identity::new("B"));

        let merged = base.merge_siblings(&[a, b]);

        assert_eq!(merged.user().map(|u| u.user_id.as_str()), Some("B"));
        assert_eq!(merged.token(), Some("t-a"));
        assert_eq!(merged.request_id(), base.request_id());
    }

    #[test]
    fn merge_drops_keys_absent_in_all_siblings() {
        let base = RequestContext::new().with_token("stale");
        let a = base.without_user().with_token("fresh");
        let b = RequestContext::new();

        let merged = base.merge_siblings(&[b.clone(), b]);
        assert!(merged.token().is_none());

        let merged = base.merge_siblings(&[a]);
        assert_eq!(merged.token(), Some("fresh"));
    }

    #[test]
    fn earlier_deadline_is_kept() {
        let now = Instant::now();
        let ctx = RequestContext::new().with_deadline(now + Duration::from_secs(1));
        let later = ctx.with_deadline(now + Duration::from_secs(10));

        assert_eq!(later.deadline(), Some(now + Duration::from_secs(1)));
    }
}
