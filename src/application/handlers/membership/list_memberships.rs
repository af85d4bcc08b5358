//! ListMembershipsHandler - Query handler for the admin membership list.

use std::sync::Arc;

use crate::domain::membership::{Membership, MembershipError};
use crate::ports::{MembershipFilter, MembershipReader};

#[derive(Debug, Clone, Default)]
pub struct ListMembershipsQuery {
    pub filter: MembershipFilter,
}

pub struct ListMembershipsHandler {
    reader: Arc<dyn MembershipReader>,
}

impl ListMembershipsHandler {
    pub fn new(reader: Arc<dyn MembershipReader>) -> Self {
        Self { reader }
    }

    /// Newest first, at most `filter.limit` entries.
    pub async fn handle(&self, query: ListMembershipsQuery) -> Result<Vec<Membership>, MembershipError> {
        Ok(self.reader.list(&query.filter).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::handlers::membership::test_support::{admin, person_registration, Fixture};
    use crate::application::handlers::membership::RegisterMembershipCommand;
    use crate::domain::membership::{MembershipKind, MembershipStatus};

    #[tokio::test]
    async fn filters_by_kind_and_status() {
        let fx = Fixture::new();
        fx.register_dojo().await;
        fx.active_dojo().await;
        fx.register_handler()
            .handle(RegisterMembershipCommand {
                registration: person_registration(),
                sepa: None,
                actor: admin(),
            })
            .await
            .unwrap();
        let handler = ListMembershipsHandler::new(fx.store.clone());

        let all = handler.handle(ListMembershipsQuery::default()).await.unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].kind(), MembershipKind::Einzelperson);

        let dojos = handler
            .handle(ListMembershipsQuery {
                filter: MembershipFilter::new(Some(MembershipKind::Dojo), None, None).unwrap(),
            })
            .await
            .unwrap();
        assert_eq!(dojos.len(), 2);

        let active_dojos = handler
            .handle(ListMembershipsQuery {
                filter: MembershipFilter::new(
                    Some(MembershipKind::Dojo),
                    Some(MembershipStatus::Active),
                    None,
                )
                .unwrap(),
            })
            .await
            .unwrap();
        assert_eq!(active_dojos.len(), 1);
    }

    #[tokio::test]
    async fn respects_limit() {
        let fx = Fixture::new();
        for _ in 0..3 {
            fx.register_dojo().await;
        }
        let handler = ListMembershipsHandler::new(fx.store.clone());

        let limited = handler
            .handle(ListMembershipsQuery {
                filter: MembershipFilter::new(None, None, Some(2)).unwrap(),
            })
            .await
            .unwrap();
        assert_eq!(limited.len(), 2);
        assert_eq!(limited[0].mitgliedsnummer.as_str(), "TDA-DE-D-0003");
    }
}
