//! Lead creation.
//!
//! Authenticated leads are inserted first and then offered to distribution;
//! a failed distribution leaves the lead queued but never fails creation.
//! Anonymous leads are inserted and distributed by a single backend call.

use std::sync::Arc;

use database::validation::{validate_anonymous_lead, validate_lead_data};
use database::{
    AnonymousLeadRequest, LeadInput, LeadStatus, LeadValidation, NewLead, Submitter,
    LEAD_TYPE_USER,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::backend::LeadBackend;
use crate::context::AuthContext;
use crate::error::ApiError;
use crate::notifier::{Notifier, Toast};

const MODULE: &str = "lead_creation";

/// Where a lead stands right after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LeadCreationStatus {
    /// Assigned to a company immediately.
    Distributed {
        company_id: String,
        assignment_cost_cents: Option<i64>,
    },
    /// Stored; waiting for the distribution queue.
    Queued,
    /// Stored by the anonymous path, which reports no distribution detail.
    Created,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadCreation {
    pub lead_id: String,
    #[serde(flatten)]
    pub status: LeadCreationStatus,
}

/// Creates leads and manages their status.
#[derive(Clone)]
pub struct LeadService {
    backend: Arc<dyn LeadBackend>,
    notifier: Arc<dyn Notifier>,
}

impl LeadService {
    pub fn new(backend: Arc<dyn LeadBackend>, notifier: Arc<dyn Notifier>) -> Self {
        Self { backend, notifier }
    }

    /// Submit a lead as the signed-in user and try to distribute it.
    ///
    /// Invalid input is rejected before anything is stored. Identical
    /// submissions create distinct leads.
    pub async fn create_lead(
        &self,
        auth: &AuthContext,
        input: LeadInput,
    ) -> Result<LeadCreation, ApiError> {
        let Some(user_id) = auth.user_id.clone() else {
            self.notifier.notify(Toast::error(
                "Ikke innlogget",
                "Du må være logget inn for å sende en forespørsel.",
            ));
            return Err(ApiError::Unauthenticated);
        };

        let validation = validate_lead_data(&input);
        if !validation.is_valid {
            return Err(self.reject(validation));
        }

        let new_lead = NewLead {
            title: input.title,
            description: input.description,
            category: input.category,
            lead_type: LEAD_TYPE_USER.to_string(),
            submitter: Submitter::User(user_id),
            metadata: input.metadata,
        };

        let lead = match self.backend.insert_lead(&new_lead).await {
            Ok(lead) => lead,
            Err(e) => {
                self.notifier.notify(Toast::error(
                    "Kunne ikke opprette forespørsel",
                    "Noe gikk galt. Prøv igjen senere.",
                ));
                return Err(ApiError::backend(MODULE, "create_lead", e));
            }
        };

        let status = match self.backend.distribute_new_lead_v3(&lead.id).await {
            Ok(rows) => match rows.into_iter().find(|row| row.success) {
                Some(row) => match row.company_id {
                    Some(company_id) => LeadCreationStatus::Distributed {
                        company_id,
                        assignment_cost_cents: row.assignment_cost,
                    },
                    None => LeadCreationStatus::Queued,
                },
                None => LeadCreationStatus::Queued,
            },
            Err(e) => {
                warn!(
                    module = MODULE,
                    operation = "distribute_new_lead_v3",
                    lead_id = %lead.id,
                    error = %e,
                    "Distribution failed, lead queued"
                );
                LeadCreationStatus::Queued
            }
        };

        let description = match status {
            LeadCreationStatus::Distributed { .. } => "Forespørselen er sendt til en leverandør.",
            _ => "Forespørselen er mottatt og blir behandlet snart.",
        };
        self.notifier.notify(Toast::success("Forespørsel sendt", description));

        info!(lead_id = %lead.id, status = ?status, "Created lead");

        Ok(LeadCreation {
            lead_id: lead.id,
            status,
        })
    }

    fn reject(&self, validation: LeadValidation) -> ApiError {
        let message = validation
            .errors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        self.notifier.notify(Toast::error("Ugyldig forespørsel", message));
        ApiError::Validation(validation.errors)
    }

    /// Submit a lead without signing in.
    ///
    /// The email is required, the description is not. A session id is
    /// generated when the caller has none.
    pub async fn create_anonymous_lead(
        &self,
        input: LeadInput,
        email: &str,
        session_id: Option<String>,
    ) -> Result<LeadCreation, ApiError> {
        let validation = validate_anonymous_lead(&input, email);
        if !validation.is_valid {
            return Err(self.reject(validation));
        }

        let request = AnonymousLeadRequest {
            title: input.title,
            description: input.description,
            category: input.category,
            metadata: input.metadata,
            anonymous_email: email.trim().to_string(),
            session_id: session_id.unwrap_or_else(|| Uuid::new_v4().to_string()),
        };

        match self.backend.create_anonymous_lead_and_distribute(&request).await {
            Ok(lead_id) => {
                self.notifier.notify(Toast::success(
                    "Forespørsel sendt",
                    "Vi har mottatt forespørselen din.",
                ));
                info!(lead_id = %lead_id, session_id = %request.session_id, "Created anonymous lead");
                Ok(LeadCreation {
                    lead_id,
                    status: LeadCreationStatus::Created,
                })
            }
            Err(e) => {
                self.notifier.notify(Toast::error(
                    "Kunne ikke opprette forespørsel",
                    "Noe gikk galt. Prøv igjen senere.",
                ));
                Err(ApiError::backend(MODULE, "create_anonymous_lead_and_distribute", e))
            }
        }
    }

    /// Move a lead to another status.
    pub async fn update_lead_status(&self, lead_id: &str, status: LeadStatus) -> Result<(), ApiError> {
        match self.backend.update_lead_status(lead_id, status).await {
            Ok(()) => {
                self.notifier.notify(Toast::success(
                    "Status oppdatert",
                    format!("Forespørselen er nå «{}».", format_lead_status(status.as_str())),
                ));
                Ok(())
            }
            Err(e) => {
                self.notifier.notify(Toast::error(
                    "Kunne ikke oppdatere status",
                    "Noe gikk galt. Prøv igjen senere.",
                ));
                Err(ApiError::backend(MODULE, "update_lead_status", e))
            }
        }
    }

    /// Record that the submitter's confirmation email went out.
    pub async fn mark_confirmation_sent(&self, lead_id: &str) -> Result<(), ApiError> {
        self.backend
            .mark_confirmation_sent(lead_id)
            .await
            .map_err(|e| ApiError::backend(MODULE, "mark_confirmation_sent", e))
    }
}

/// Norwegian label for a lead status; unknown values are returned unchanged.
pub fn format_lead_status(status: &str) -> String {
    let label = match status.parse::<LeadStatus>() {
        Ok(LeadStatus::New) => "Ny",
        Ok(LeadStatus::Qualified) => "Kvalifisert",
        Ok(LeadStatus::Contacted) => "Kontaktet",
        Ok(LeadStatus::Negotiating) => "Forhandling",
        Ok(LeadStatus::Converted) => "Konvertert",
        Ok(LeadStatus::Lost) => "Tapt",
        Ok(LeadStatus::Paused) => "Pauset",
        Err(_) => return status.to_string(),
    };
    label.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_lead_status() {
        assert_eq!(format_lead_status("new"), "Ny");
        assert_eq!(format_lead_status("negotiating"), "Forhandling");
        assert_eq!(format_lead_status("paused"), "Pauset");
        assert_eq!(format_lead_status("archived"), "archived");
        assert_eq!(format_lead_status(""), "");
    }

    #[test]
    fn test_creation_serializes_flat() {
        let creation = LeadCreation {
            lead_id: "l1".to_string(),
            status: LeadCreationStatus::Distributed {
                company_id: "c1".to_string(),
                assignment_cost_cents: Some(25_000),
            },
        };
        let json = serde_json::to_value(&creation).unwrap();
        assert_eq!(json["status"], "distributed");
        assert_eq!(json["company_id"], "c1");
        assert_eq!(json["lead_id"], "l1");
    }
}
