use crate::model::Resource;
use crate::model::types::{CopyState, Loan, LoanCreationOrder};
use crate::store::errors::StoreError;
use crate::store::resource::{ResourceStore, UpdateOutcome};
use chrono::{Local, NaiveDateTime};
use log::warn;

pub type LoanStore = ResourceStore<Loan>;

impl LoanStore {
    /// Lends a copy to a member. The server resolves both ids and returns the full loan.
    /// # Errors
    /// Returns the failure after recording it, e.g. a validation failure when the copy is
    /// already lent out
    #[allow(clippy::missing_inline_in_public_items, reason = "Large async function")]
    pub async fn create_loan(
        &self,
        member_id: &str,
        book_copy_id: &str,
        loan_date_time: NaiveDateTime,
    ) -> Result<Loan, StoreError> {
        let order =
            LoanCreationOrder::new(member_id.to_owned(), book_copy_id.to_owned(), loan_date_time);
        self.create_from(Loan::COLLECTION.to_owned(), &order).await
    }

    /// Closes a cached loan now, recording the state the copy came back in
    /// # Errors
    /// `NotFound` when the loan is not cached, otherwise see [`Self::return_loan_at`]
    #[inline]
    pub async fn return_loan(
        &self,
        loan_id: &str,
        return_state: CopyState,
    ) -> Result<Loan, StoreError> {
        self.return_loan_at(loan_id, return_state, Local::now().naive_local())
            .await
    }

    /// Closes a cached loan at `returned_at`
    /// # Errors
    /// `NotFound` when the loan is not cached, or the update failure after recording it
    #[allow(clippy::missing_inline_in_public_items, reason = "Large async function")]
    pub async fn return_loan_at(
        &self,
        loan_id: &str,
        return_state: CopyState,
        returned_at: NaiveDateTime,
    ) -> Result<Loan, StoreError> {
        let Some(mut loan) = self.get(loan_id).await else {
            warn!("Loan {loan_id} is not in the local cache, it cannot be returned");
            return Err(StoreError::NotFound {
                collection: Loan::COLLECTION,
                id: loan_id.to_owned(),
            });
        };
        loan.return_date_time = Some(returned_at);
        loan.return_state = Some(return_state);
        self.update(loan_id, loan).await.map(UpdateOutcome::into_inner)
    }

    /// Cached loans whose copy has not come back yet
    #[inline]
    pub async fn active_loans(&self) -> Vec<Loan> {
        self.state
            .read()
            .await
            .items
            .iter()
            .filter(|loan| loan.is_active())
            .cloned()
            .collect()
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::indexing_slicing,
    reason = "Tests are predefined and guaranteed to be Some/Ok"
)]
mod tests {
    use super::*;
    use crate::api::errors::ErrorKind;
    use crate::api::fake::FakeTransport;
    use crate::api::request::Transport;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;
    use reqwest::Method;
    use serde_json::{Value, json};
    use std::sync::Arc;

    fn at(day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn loan_json(id: &str, returned: Option<&str>) -> Value {
        json!({
            "id": id,
            "bookCopy": { "id": format!("copy-{id}"), "state": "Bon", "available": false, "removed": false },
            "loanDateTime": "2024-03-01T10:00:00",
            "returnDateTime": returned,
            "initialState": "Bon"
        })
    }

    async fn seeded() -> (Arc<FakeTransport>, LoanStore) {
        let fake = Arc::new(FakeTransport::new());
        let transport: Arc<dyn Transport> = fake.clone();
        let store = LoanStore::new(transport);
        fake.respond(
            Method::GET,
            "loans",
            json!([loan_json("l1", None), loan_json("l2", Some("2024-03-05T16:30:00"))]),
        );
        store.fetch_all().await;
        (fake, store)
    }

    #[tokio::test]
    async fn active_loans_skip_returned_ones() {
        let (_fake, store) = seeded().await;

        let active = store.active_loans().await;
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id.as_deref(), Some("l1"));
    }

    #[tokio::test]
    async fn create_loan_posts_a_creation_order() {
        let (fake, store) = seeded().await;
        fake.respond(Method::POST, "loans", loan_json("l3", None));

        let loan = store.create_loan("m1", "copy-l3", at(1, 10)).await.unwrap();

        assert_eq!(loan.id.as_deref(), Some("l3"));
        assert_eq!(store.len().await, 3);
        assert_eq!(
            fake.requests().pop().unwrap().body,
            Some(json!({
                "memberId": "m1",
                "bookCopyId": "copy-l3",
                "loanDateTime": "2024-03-01T10:00:00"
            }))
        );
    }

    #[tokio::test]
    async fn returning_a_loan_sends_the_closed_record() {
        let (fake, store) = seeded().await;
        fake.respond(
            Method::PUT,
            "loans/l1",
            json!({
                "id": "l1",
                "loanDateTime": "2024-03-01T10:00:00",
                "returnDateTime": "2024-03-08T09:00:00",
                "initialState": "Bon",
                "returnState": "Usé"
            }),
        );

        let returned = store
            .return_loan_at("l1", CopyState::Used, at(8, 9))
            .await
            .unwrap();

        assert_eq!(returned.return_state, Some(CopyState::Used));
        assert!(store.active_loans().await.is_empty());

        let body = fake.requests().pop().unwrap().body.unwrap();
        assert_eq!(body["returnDateTime"], json!("2024-03-08T09:00:00"));
        assert_eq!(body["returnState"], json!("USED"));
        assert_eq!(body["bookCopy"]["id"], json!("copy-l1"));
    }

    #[tokio::test]
    async fn returned_loan_keeps_the_server_state_spelling() {
        let fake = Arc::new(FakeTransport::new());
        let transport: Arc<dyn Transport> = fake.clone();
        let store = LoanStore::new(transport);
        fake.respond(
            Method::GET,
            "loans",
            json!([{
                "id": "l1",
                "bookCopy": { "id": "x1", "state": "GOOD", "available": false, "removed": false },
                "loanDateTime": "2024-03-01T10:00:00",
                "initialState": "GOOD"
            }]),
        );
        store.fetch_all().await;
        fake.respond(
            Method::PUT,
            "loans/l1",
            json!({
                "id": "l1",
                "loanDateTime": "2024-03-01T10:00:00",
                "returnDateTime": "2024-03-08T09:00:00",
                "initialState": "GOOD",
                "returnState": "USED"
            }),
        );

        store
            .return_loan_at("l1", CopyState::Used, at(8, 9))
            .await
            .unwrap();

        let body = fake.requests().pop().unwrap().body.unwrap();
        assert_eq!(body["initialState"], json!("GOOD"));
        assert_eq!(body["bookCopy"]["state"], json!("GOOD"));
        assert_eq!(body["returnState"], json!("USED"));
    }

    #[tokio::test]
    async fn returning_an_unknown_loan_is_not_found() {
        let (fake, store) = seeded().await;

        let error = store.return_loan("l9", CopyState::Good).await.unwrap_err();

        assert_eq!(error.kind(), ErrorKind::NotFound);
        // nothing went over the wire besides the initial listing
        assert_eq!(fake.requests().len(), 1);
    }
}
