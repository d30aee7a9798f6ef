//! Endpoint table for the counters API.

use serde::Deserialize;
use serde_json::{json, Value};

use super::{ApiClient, ApiError, ApiRequest};
use crate::auth::CredentialStore;
use crate::models::{Counter, Mutation, MutationCommand};

pub const IDEMPOTENCY_HEADER: &str = "X-Idempotency-Key";

#[derive(Debug, Default, Deserialize)]
struct CounterData {
    #[serde(default)]
    counter: Option<Counter>,
    #[serde(default)]
    counters: Option<Vec<Counter>>,
}

/// Map a queued command onto its request; the command id travels as the
/// idempotency key
pub fn counter_route(command: &MutationCommand) -> Result<ApiRequest, ApiError> {
    let id = urlencoding::encode(command.entity_id.as_str());
    let request = match &command.mutation {
        Mutation::Create(payload) => ApiRequest::post("/counters").json(to_json(payload)?),
        Mutation::Update(patch) => {
            ApiRequest::put(format!("/counters/update/{id}")).json(to_json(patch)?)
        }
        Mutation::Increment(payload) => {
            ApiRequest::put(format!("/counters/increment/{id}")).json(to_json(payload)?)
        }
        Mutation::Delete => ApiRequest::delete(format!("/counters/{id}")),
        Mutation::Remove => ApiRequest::put(format!("/counters/remove-shared/{id}")),
    };
    Ok(request.header(IDEMPOTENCY_HEADER, command.id.as_str()))
}

fn to_json(payload: &impl serde::Serialize) -> Result<Value, ApiError> {
    serde_json::to_value(payload)
        .map_err(|error| ApiError::Transport(format!("Failed to encode payload: {error}")))
}

impl<C: CredentialStore> ApiClient<C> {
    /// Every counter visible to the signed-in user
    pub async fn fetch_counters(&self) -> Result<Vec<Counter>, ApiError> {
        let data: Option<CounterData> = self.request_data(&ApiRequest::get("/counters")).await?;
        Ok(data.and_then(|data| data.counters).unwrap_or_default())
    }

    /// Join a shared counter by invite code. Live only; never queued.
    pub async fn join_counter(&self, invite_code: &str) -> Result<Counter, ApiError> {
        let request = ApiRequest::post("/counters/join").json(json!({ "inviteCode": invite_code }));
        let data: Option<CounterData> = self.request_data(&request).await?;
        data.and_then(|data| data.counter).ok_or_else(|| ApiError::Http {
            status: 200,
            message: "Join response did not include a counter".to_string(),
            raw_body: Value::Null,
        })
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use reqwest::Method;

    use super::*;
    use crate::auth::MemoryCredentialStore;
    use crate::config::ClientConfig;
    use crate::http::RequestBody;
    use crate::models::{CounterId, CounterPatch, IncrementPayload};
    use crate::testing::{Reply, TestServer};

    fn route(entity: &str, mutation: Mutation) -> (MutationCommand, ApiRequest) {
        let command = MutationCommand::new(CounterId::from(entity), mutation);
        let request = counter_route(&command).unwrap();
        (command, request)
    }

    #[test]
    fn routes_match_command_types() {
        let counter = Counter::new("Coffee", None, "user-1").unwrap();
        let create = MutationCommand::create(&counter);
        let request = counter_route(&create).unwrap();
        assert_eq!(request.method, Method::POST);
        assert_eq!(request.endpoint, "/counters");

        let (_, request) = route(
            "c-1",
            Mutation::Update(CounterPatch {
                title: Some("Tea".into()),
                color: None,
            }),
        );
        assert_eq!(request.method, Method::PUT);
        assert_eq!(request.endpoint, "/counters/update/c-1");
        assert_eq!(request.body, RequestBody::Json(json!({ "title": "Tea" })));

        let (_, request) = route("c-1", Mutation::Increment(IncrementPayload { amount: -1 }));
        assert_eq!(request.endpoint, "/counters/increment/c-1");
        assert_eq!(request.body, RequestBody::Json(json!({ "amount": -1 })));

        let (_, request) = route("c-1", Mutation::Delete);
        assert_eq!(request.method, Method::DELETE);
        assert_eq!(request.endpoint, "/counters/c-1");
        assert_eq!(request.body, RequestBody::Empty);

        let (_, request) = route("c-1", Mutation::Remove);
        assert_eq!(request.method, Method::PUT);
        assert_eq!(request.endpoint, "/counters/remove-shared/c-1");
    }

    #[test]
    fn route_carries_idempotency_key_and_escapes_ids() {
        let (command, request) = route("a b/c", Mutation::Delete);
        assert_eq!(request.endpoint, "/counters/a%20b%2Fc");
        assert_eq!(
            request.headers,
            vec![(IDEMPOTENCY_HEADER.to_string(), command.id.as_str())]
        );
    }

    #[tokio::test]
    async fn fetch_counters_reads_envelope() {
        let server = TestServer::spawn(|_| {
            Reply::json(
                200,
                &json!({
                    "success": true,
                    "data": { "counters": [{
                        "id": "c-1", "title": "Water", "color": "#00AAFF", "count": 4,
                        "ownerId": "user-1", "type": "SHARED", "inviteCode": "ABC123"
                    }] }
                }),
            )
        })
        .await;
        let client = ApiClient::new(
            ClientConfig::new(&server.base_url).unwrap(),
            MemoryCredentialStore::new(),
        )
        .unwrap();

        let counters = client.fetch_counters().await.unwrap();

        assert_eq!(counters.len(), 1);
        assert_eq!(counters[0].count, 4);
        assert_eq!(counters[0].invite_code.as_deref(), Some("ABC123"));
    }

    #[tokio::test]
    async fn join_counter_posts_invite_code() {
        let server = TestServer::spawn(|_| {
            Reply::json(
                200,
                &json!({
                    "success": true,
                    "data": { "counter": {
                        "id": "c-7", "title": "Team laps", "color": "#FF0000", "count": 12,
                        "ownerId": "user-2", "type": "SHARED"
                    } }
                }),
            )
        })
        .await;
        let client = ApiClient::new(
            ClientConfig::new(&server.base_url).unwrap(),
            MemoryCredentialStore::new(),
        )
        .unwrap();

        let counter = client.join_counter("XYZ789").await.unwrap();

        assert_eq!(counter.id, CounterId::from("c-7"));
        let requests = server.requests();
        assert_eq!(requests[0].path, "/counters/join");
        assert_eq!(requests[0].json(), json!({ "inviteCode": "XYZ789" }));
    }
}
