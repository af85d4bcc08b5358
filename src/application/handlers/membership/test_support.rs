//! Fixture shared by the handler tests.

use std::sync::Arc;

use crate::adapters::memory::{InMemorySettings, InMemoryVerbandStore};
use crate::application::{AuditPolicy, AuditTrail};
use crate::domain::foundation::Actor;
use crate::domain::membership::{
    Consent, Contact, Membership, MembershipStatus, Party, PaymentMethod, Registration,
};

use super::{RegisterMembershipCommand, RegisterMembershipHandler};

pub(crate) struct Fixture {
    pub store: Arc<InMemoryVerbandStore>,
    pub settings: Arc<InMemorySettings>,
    pub audit: Arc<AuditTrail>,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_policy(AuditPolicy::Transactional)
    }

    pub fn with_policy(policy: AuditPolicy) -> Self {
        let store = Arc::new(InMemoryVerbandStore::new());
        Self {
            audit: Arc::new(AuditTrail::new(store.clone(), policy)),
            settings: Arc::new(InMemorySettings::with_defaults()),
            store,
        }
    }

    pub fn register_handler(&self) -> RegisterMembershipHandler {
        RegisterMembershipHandler::new(self.store.clone(), self.settings.clone(), self.audit.clone())
    }

    /// Registers a German dojo paying by invoice.
    pub async fn register_dojo(&self) -> Membership {
        self.register_handler()
            .handle(RegisterMembershipCommand {
                registration: dojo_registration(),
                sepa: None,
                actor: admin(),
            })
            .await
            .unwrap()
            .membership
    }

    /// Registers a dojo and forces it to `aktiv`.
    pub async fn active_dojo(&self) -> Membership {
        let mut membership = self.register_dojo().await;
        membership.status = MembershipStatus::Active;
        self.store.put_membership(membership.clone()).await;
        membership
    }
}

pub(crate) fn admin() -> Actor {
    Actor::new("Kim Admin", Some("10.0.0.1".to_string()))
}

pub(crate) fn dojo_registration() -> Registration {
    Registration {
        party: Party::Dojo {
            dojo_id: None,
            dojo_name: "Dojo Nord".to_string(),
            dojo_inhaber: Some("Kim Sato".to_string()),
        },
        contact: Contact {
            email: "info@dojo-nord.de".to_string(),
            land: Some("Deutschland".to_string()),
            ..Default::default()
        },
        zahlungsart: PaymentMethod::Rechnung,
        consent: Consent::new(true, true),
        unterschrift: None,
        notizen: None,
    }
}

pub(crate) fn person_registration() -> Registration {
    Registration {
        party: Party::Einzelperson {
            vorname: "Mia".to_string(),
            nachname: "Wolf".to_string(),
            geburtsdatum: None,
        },
        contact: Contact {
            email: "mia.wolf@example.at".to_string(),
            land: Some("Österreich".to_string()),
            ..Default::default()
        },
        ..dojo_registration()
    }
}
