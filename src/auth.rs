// Identity and subscription state
//
// The signed-in user is held in an explicit `UserSession` that is passed
// to the components that need it. It is hydrated on load and cleared on
// sign-out; there is no ambient global.

use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

/// Subscription level gating feature access
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionTier {
    #[default]
    Free,
    Standard,
    Pro,
}

/// Features gated by subscription tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    BasicPractice,
    Community,
    AdvancedFeedback,
    OfflineMode,
    Coaching,
    UnlimitedSessions,
}

/// Per-tier limits; `None` means unlimited
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierLimits {
    pub max_practice_sessions: Option<u32>,
    pub max_accents: Option<u32>,
}

impl SubscriptionTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionTier::Free => "free",
            SubscriptionTier::Standard => "standard",
            SubscriptionTier::Pro => "pro",
        }
    }

    /// Features unlocked by this tier
    pub fn features(&self) -> &'static [Feature] {
        match self {
            SubscriptionTier::Free => &[Feature::BasicPractice, Feature::Community],
            SubscriptionTier::Standard => &[
                Feature::BasicPractice,
                Feature::Community,
                Feature::AdvancedFeedback,
                Feature::OfflineMode,
            ],
            SubscriptionTier::Pro => &[
                Feature::BasicPractice,
                Feature::Community,
                Feature::AdvancedFeedback,
                Feature::OfflineMode,
                Feature::Coaching,
                Feature::UnlimitedSessions,
            ],
        }
    }

    pub fn allows(&self, feature: Feature) -> bool {
        self.features().contains(&feature)
    }

    pub fn limits(&self) -> TierLimits {
        match self {
            SubscriptionTier::Free => TierLimits {
                max_practice_sessions: Some(5),
                max_accents: Some(1),
            },
            SubscriptionTier::Standard => TierLimits {
                max_practice_sessions: Some(50),
                max_accents: Some(3),
            },
            SubscriptionTier::Pro => TierLimits {
                max_practice_sessions: None,
                max_accents: None,
            },
        }
    }
}

/// Authenticated user as seen by the practice core
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUser {
    pub id: String,
    pub email: String,
    pub tier: SubscriptionTier,
}

impl CurrentUser {
    pub fn new(id: impl Into<String>, email: impl Into<String>, tier: SubscriptionTier) -> Self {
        Self {
            id: id.into(),
            email: email.into(),
            tier,
        }
    }
}

/// Source of the signed-in user
pub trait IdentityProvider: Send + Sync {
    fn current_user(&self) -> Option<CurrentUser>;
}

/// Explicit, shareable session object for the signed-in user
#[derive(Clone, Default)]
pub struct UserSession {
    user: Arc<RwLock<Option<CurrentUser>>>,
}

impl UserSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Session already hydrated with `user`
    pub fn signed_in(user: CurrentUser) -> Self {
        let session = Self::new();
        session.hydrate(user);
        session
    }

    /// Install the user returned by the identity provider on load
    pub fn hydrate(&self, user: CurrentUser) {
        log::info!("[UserSession] Hydrated user {} ({})", user.id, user.tier.as_str());
        if let Ok(mut guard) = self.user.write() {
            *guard = Some(user);
        }
    }

    pub fn sign_out(&self) {
        if let Ok(mut guard) = self.user.write() {
            if let Some(user) = guard.take() {
                log::info!("[UserSession] Signed out user {}", user.id);
            }
        }
    }

    /// Apply a tier change confirmed by the payment flow
    ///
    /// Returns false when no user is signed in.
    pub fn set_subscription_tier(&self, tier: SubscriptionTier) -> bool {
        match self.user.write() {
            Ok(mut guard) => match guard.as_mut() {
                Some(user) => {
                    log::info!(
                        "[UserSession] Tier for {} changed {} -> {}",
                        user.id,
                        user.tier.as_str(),
                        tier.as_str()
                    );
                    user.tier = tier;
                    true
                }
                None => false,
            },
            Err(_) => false,
        }
    }

    pub fn is_signed_in(&self) -> bool {
        self.current_user().is_some()
    }
}

impl IdentityProvider for UserSession {
    fn current_user(&self) -> Option<CurrentUser> {
        self.user.read().ok().and_then(|guard| guard.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_feature_table() {
        assert!(SubscriptionTier::Free.allows(Feature::BasicPractice));
        assert!(!SubscriptionTier::Free.allows(Feature::AdvancedFeedback));
        assert!(SubscriptionTier::Standard.allows(Feature::AdvancedFeedback));
        assert!(!SubscriptionTier::Standard.allows(Feature::Coaching));
        assert!(SubscriptionTier::Pro.allows(Feature::UnlimitedSessions));
    }

    #[test]
    fn test_tier_limits() {
        assert_eq!(SubscriptionTier::Free.limits().max_practice_sessions, Some(5));
        assert_eq!(SubscriptionTier::Standard.limits().max_accents, Some(3));
        assert_eq!(SubscriptionTier::Pro.limits().max_accents, None);
    }

    #[test]
    fn test_tier_serde_lowercase() {
        let json = serde_json::to_string(&SubscriptionTier::Standard).unwrap();
        assert_eq!(json, "\"standard\"");
        let tier: SubscriptionTier = serde_json::from_str("\"pro\"").unwrap();
        assert_eq!(tier, SubscriptionTier::Pro);
    }

    #[test]
    fn test_session_lifecycle() {
        let session = UserSession::new();
        assert!(session.current_user().is_none());
        assert!(!session.set_subscription_tier(SubscriptionTier::Pro));

        session.hydrate(CurrentUser::new("u1", "u1@example.com", SubscriptionTier::Free));
        assert!(session.is_signed_in());

        let shared = session.clone();
        assert!(shared.set_subscription_tier(SubscriptionTier::Standard));
        assert_eq!(
            session.current_user().map(|u| u.tier),
            Some(SubscriptionTier::Standard)
        );

        session.sign_out();
        assert!(shared.current_user().is_none());
    }
}
