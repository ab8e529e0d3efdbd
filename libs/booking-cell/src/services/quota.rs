// libs/booking-cell/src/services/quota.rs
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, error, warn};
use uuid::Uuid;

use shared_database::SupabaseClient;
use shared_models::SubscriptionStatus;

use crate::models::BookingError;
use crate::services::repository::BookingRepository;

/// Subscription lookup for a professional, answered by the hosted subscription check.
#[async_trait]
pub trait SubscriptionProvider: Send + Sync {
    async fn subscription_status(&self, professional_id: Uuid) -> Result<SubscriptionStatus, BookingError>;
}

pub struct SupabaseSubscriptionProvider {
    supabase: Arc<SupabaseClient>,
    auth_token: Option<String>,
}

impl SupabaseSubscriptionProvider {
    pub fn new(supabase: Arc<SupabaseClient>, auth_token: Option<String>) -> Self {
        Self { supabase, auth_token }
    }
}

#[async_trait]
impl SubscriptionProvider for SupabaseSubscriptionProvider {
    async fn subscription_status(&self, professional_id: Uuid) -> Result<SubscriptionStatus, BookingError> {
        self.supabase
            .invoke_function(
                "check-subscription",
                self.auth_token.as_deref(),
                json!({ "professional_id": professional_id }),
            )
            .await
            .map_err(|e| BookingError::ExternalServiceError(e.to_string()))
    }
}

/// Billing and insurance capacity checks.
///
/// The free tier fails closed on lookup errors, the plan-wide insurance limit fails open.
pub struct QuotaGuard {
    repository: Arc<dyn BookingRepository>,
    subscriptions: Arc<dyn SubscriptionProvider>,
}

impl QuotaGuard {
    pub fn new(repository: Arc<dyn BookingRepository>, subscriptions: Arc<dyn SubscriptionProvider>) -> Self {
        Self { repository, subscriptions }
    }

    pub async fn is_within_free_limit(&self, professional_id: Uuid) -> bool {
        match self.subscriptions.subscription_status(professional_id).await {
            Ok(status) => {
                let allowed = status.allows_booking();
                debug!("Professional {} premium={} monthly={} allowed={}",
                       professional_id, status.is_premium, status.monthly_appointments, allowed);
                allowed
            }
            Err(e) => {
                error!("Subscription check failed for professional {}, blocking booking: {}", professional_id, e);
                false
            }
        }
    }

    pub async fn check_insurance_plan_limit(&self, plan_id: Uuid) -> bool {
        match self.repository.get_insurance_plan(plan_id).await {
            Ok(Some(plan)) => {
                let has_capacity = plan.has_capacity();
                if !has_capacity {
                    warn!("Insurance plan {} is at its limit ({}/{:?})",
                          plan_id, plan.current_appointments, plan.limit_per_plan);
                }
                has_capacity
            }
            Ok(None) => {
                warn!("Insurance plan {} not found, allowing booking", plan_id);
                true
            }
            Err(e) => {
                warn!("Insurance plan lookup failed for {}, allowing booking: {}", plan_id, e);
                true
            }
        }
    }

    /// Requires an explicit association; when present both the member and plan-wide quotas must pass.
    pub async fn check_team_member_insurance_limit(&self, team_member_id: Uuid, plan_id: Uuid) -> bool {
        self.ensure_team_member_can_bill(team_member_id, plan_id).await.is_ok()
    }

    /// Same check as [`Self::check_team_member_insurance_limit`], naming the reason for a denial.
    pub async fn ensure_team_member_can_bill(&self, team_member_id: Uuid, plan_id: Uuid) -> Result<(), BookingError> {
        let not_accepted = BookingError::InsuranceNotAccepted { plan_id, team_member_id };

        let association = match self
            .repository
            .get_team_member_insurance_plan(team_member_id, plan_id)
            .await
        {
            Ok(Some(association)) => association,
            Ok(None) => {
                debug!("Team member {} does not accept insurance plan {}", team_member_id, plan_id);
                return Err(not_accepted);
            }
            Err(e) => {
                warn!("Association lookup failed for team member {} and plan {}: {}",
                      team_member_id, plan_id, e);
                return Err(not_accepted);
            }
        };

        if !association.has_capacity() {
            warn!("Team member {} is at the limit for insurance plan {}", team_member_id, plan_id);
            return Err(BookingError::InsuranceLimitReached { plan_id });
        }

        if !self.check_insurance_plan_limit(plan_id).await {
            return Err(BookingError::InsuranceLimitReached { plan_id });
        }
        Ok(())
    }
}
