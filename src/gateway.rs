use serde_json::Value;
use tracing::instrument;

use crate::client::{ApiClient, ApiResult, HttpApiClient};
use crate::models::leaderboard::{LeaderboardResponse, TimeFrame};

pub const LEADERBOARD_PATH: &str = "/api/leaderboard";
pub const TIME_FRAME_PARAM: &str = "timeFrame";

/// Fetches leaderboard snapshots from the backend.
///
/// Every call issues exactly one request. Nothing is cached, retried or deduplicated, and
/// failures from the client come back untouched. The only thing handled here is a successful
/// response without a payload, which becomes [`LeaderboardResponse::empty`] so callers never deal
/// with a missing leaderboard.
#[derive(Debug, Clone)]
pub struct LeaderboardGateway<C = HttpApiClient> {
    client: C,
}

impl<C: ApiClient> LeaderboardGateway<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    #[instrument(skip(self, time_frame), fields(time_frame = %time_frame))]
    pub async fn fetch_leaderboard(
        &self,
        time_frame: &TimeFrame,
    ) -> ApiResult<LeaderboardResponse> {
        let payload = self
            .client
            .get_json(LEADERBOARD_PATH, &[(TIME_FRAME_PARAM, time_frame.as_str())])
            .await?;

        match payload {
            None | Some(Value::Null) => Ok(LeaderboardResponse::empty()),
            Some(body) => Ok(serde_json::from_value(body)?),
        }
    }
}

#[cfg(test)]
mod test {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use futures::future::join_all;
    use http::StatusCode;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::client::ApiErr;
    use crate::client::test::closed_port_uri;
    use crate::models::leaderboard::LeaderboardEntry;

    /// Records every request and answers with a canned payload.
    struct StubClient {
        reply: fn() -> ApiResult<Option<Value>>,
        calls: Mutex<Vec<(String, Vec<(String, String)>)>>,
    }

    impl StubClient {
        fn new(reply: fn() -> ApiResult<Option<Value>>) -> Self {
            Self {
                reply,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<(String, Vec<(String, String)>)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ApiClient for StubClient {
        async fn get_json(&self, path: &str, query: &[(&str, &str)]) -> ApiResult<Option<Value>> {
            let query = query
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect();
            self.calls.lock().unwrap().push((path.to_string(), query));

            tokio::task::yield_now().await;
            (self.reply)()
        }
    }

    fn ana_body() -> Value {
        json!({
            "entries": [{
                "rank": 1,
                "name": "Ana",
                "avatar": "a.png",
                "totalXp": 500,
                "currentStreak": 3,
                "longestStreak": 10,
                "level": 5,
                "change": 1
            }],
            "currentUserEntry": null
        })
    }

    fn ana() -> LeaderboardEntry {
        LeaderboardEntry {
            rank: 1,
            name: "Ana".to_string(),
            avatar: "a.png".to_string(),
            total_xp: 500,
            current_streak: 3,
            longest_streak: 10,
            level: 5,
            change: 1,
        }
    }

    async fn mock_leaderboard(server: &MockServer, time_frame: &str, template: ResponseTemplate) {
        Mock::given(method("GET"))
            .and(path(LEADERBOARD_PATH))
            .and(query_param(TIME_FRAME_PARAM, time_frame))
            .respond_with(template)
            .expect(1)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_time_frame_sent_as_query_param() {
        let stub = Arc::new(StubClient::new(|| Ok(None)));
        let gateway = LeaderboardGateway::new(stub.clone());

        let mut frames = TimeFrame::known().to_vec();
        frames.push(TimeFrame::Other("fortnightly".to_string()));

        for tf in &frames {
            gateway.fetch_leaderboard(tf).await.unwrap();
        }

        let calls = stub.calls();
        assert_eq!(calls.len(), frames.len());
        for ((path, query), tf) in calls.iter().zip(&frames) {
            assert_eq!(path, LEADERBOARD_PATH);
            assert_eq!(
                query,
                &vec![(TIME_FRAME_PARAM.to_string(), tf.as_str().to_string())]
            );
        }
    }

    #[tokio::test]
    async fn test_weekly_returns_response_unchanged() {
        let server = MockServer::start().await;
        mock_leaderboard(
            &server,
            "weekly",
            ResponseTemplate::new(200).set_body_json(ana_body()),
        )
        .await;

        let gateway = LeaderboardGateway::new(HttpApiClient::new(&server.uri()).unwrap());
        let res = gateway.fetch_leaderboard(&TimeFrame::Weekly).await.unwrap();

        assert_eq!(res.entries, vec![ana()]);
        assert_eq!(res.current_user_entry, None);
        assert!(res.validate().is_ok());
    }

    #[tokio::test]
    async fn test_order_and_current_user_preserved() {
        let body = json!({
            "entries": [
                { "rank": 1, "name": "Ana", "avatar": "a.png", "totalXp": 900,
                  "currentStreak": 3, "longestStreak": 10, "level": 7, "change": 0 },
                { "rank": 2, "name": "Bo", "avatar": "b.png", "totalXp": 850,
                  "currentStreak": 0, "longestStreak": 4, "level": 6, "change": -1 },
                { "rank": 3, "name": "Cy", "avatar": "c.png", "totalXp": 800,
                  "currentStreak": 5, "longestStreak": 5, "level": 6, "change": 2 }
            ],
            "currentUserEntry": { "rank": 57, "name": "Me", "avatar": "me.png",
                "totalXp": 40, "currentStreak": 1, "longestStreak": 2, "level": 1, "change": 0 }
        });

        let server = MockServer::start().await;
        mock_leaderboard(
            &server,
            "all-time",
            ResponseTemplate::new(200).set_body_json(body.clone()),
        )
        .await;

        let gateway = LeaderboardGateway::new(HttpApiClient::new(&server.uri()).unwrap());
        let res = gateway.fetch_leaderboard(&TimeFrame::AllTime).await.unwrap();

        assert_eq!(serde_json::to_value(&res).unwrap(), body);
        let names: Vec<_> = res.entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["Ana", "Bo", "Cy"]);
        assert_eq!(res.current_user_entry.map(|e| e.rank), Some(57));
    }

    #[tokio::test]
    async fn test_empty_body_yields_empty_leaderboard() {
        let server = MockServer::start().await;
        mock_leaderboard(&server, "daily", ResponseTemplate::new(200)).await;

        let gateway = LeaderboardGateway::new(HttpApiClient::new(&server.uri()).unwrap());
        let res = gateway.fetch_leaderboard(&TimeFrame::Daily).await.unwrap();

        assert_eq!(res, LeaderboardResponse::empty());
        assert!(res.entries.is_empty());
        assert!(res.current_user_entry.is_none());
    }

    #[tokio::test]
    async fn test_whitespace_body_yields_empty_leaderboard() {
        let server = MockServer::start().await;
        mock_leaderboard(
            &server,
            "weekly",
            ResponseTemplate::new(200).set_body_raw(" \n\t\r\n", "application/json"),
        )
        .await;

        let gateway = LeaderboardGateway::new(HttpApiClient::new(&server.uri()).unwrap());
        let res = gateway.fetch_leaderboard(&TimeFrame::Weekly).await.unwrap();

        assert_eq!(res, LeaderboardResponse::empty());
    }

    #[tokio::test]
    async fn test_null_body_yields_empty_leaderboard() {
        let server = MockServer::start().await;
        mock_leaderboard(
            &server,
            "monthly",
            ResponseTemplate::new(200).set_body_raw("null", "application/json"),
        )
        .await;

        let gateway = LeaderboardGateway::new(HttpApiClient::new(&server.uri()).unwrap());
        let res = gateway.fetch_leaderboard(&TimeFrame::Monthly).await.unwrap();

        assert_eq!(res, LeaderboardResponse::empty());
    }

    #[tokio::test]
    async fn test_server_error_fails() {
        let server = MockServer::start().await;
        mock_leaderboard(&server, "weekly", ResponseTemplate::new(500)).await;

        let gateway = LeaderboardGateway::new(HttpApiClient::new(&server.uri()).unwrap());
        let res = gateway.fetch_leaderboard(&TimeFrame::Weekly).await;

        match res {
            Err(ApiErr::Status { status, .. }) => {
                assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR)
            }
            other => panic!("expected a status error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_network_error_fails() {
        let gateway = LeaderboardGateway::new(HttpApiClient::new(&closed_port_uri()).unwrap());
        let res = gateway.fetch_leaderboard(&TimeFrame::Weekly).await;

        assert!(matches!(res, Err(ApiErr::Transport(_))));
    }

    #[tokio::test]
    async fn test_malformed_payload_fails() {
        let server = MockServer::start().await;
        mock_leaderboard(
            &server,
            "weekly",
            ResponseTemplate::new(200).set_body_json(json!({ "rows": [] })),
        )
        .await;

        let gateway = LeaderboardGateway::new(HttpApiClient::new(&server.uri()).unwrap());
        let res = gateway.fetch_leaderboard(&TimeFrame::Weekly).await;

        assert!(matches!(res, Err(ApiErr::Decode(_))));
    }

    #[tokio::test]
    async fn test_client_error_passed_through() {
        let stub = StubClient::new(|| {
            Err(ApiErr::Status {
                status: StatusCode::BAD_GATEWAY,
                body: Some(json!({ "message": "upstream down" })),
            })
        });

        let gateway = LeaderboardGateway::new(stub);
        let err = gateway.fetch_leaderboard(&TimeFrame::Weekly).await.unwrap_err();

        assert!(matches!(
            err,
            ApiErr::Status { status, body: Some(_) } if status == StatusCode::BAD_GATEWAY
        ));
        assert_eq!(gateway.client().calls().len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_calls_are_independent() {
        let stub = Arc::new(StubClient::new(|| Ok(Some(ana_body()))));
        let gateway = LeaderboardGateway::new(stub.clone());

        let frames = [TimeFrame::Weekly, TimeFrame::Weekly, TimeFrame::Daily];
        let results = join_all(frames.iter().map(|tf| gateway.fetch_leaderboard(tf))).await;

        assert_eq!(stub.calls().len(), frames.len());
        for res in results {
            assert_eq!(res.unwrap().entries, vec![ana()]);
        }
    }
}
