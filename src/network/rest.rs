use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use reqwest::{Response, Url};
use serde::de::DeserializeOwned;

use crate::common::{ChatMessage, Room};
use crate::config::AppConfig;
use crate::error::{ChatError, Result};

/// REST client for the backend's room endpoints.
#[derive(Debug, Clone)]
pub struct RoomService {
    http: reqwest::Client,
    api_root: Url,
}

impl RoomService {
    pub fn new(config: &AppConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()?;
        Ok(Self {
            http,
            api_root: config.api_root()?,
        })
    }

    fn rooms_url(&self, segments: &[&str]) -> Url {
        let mut url = self.api_root.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().push("rooms").extend(segments);
        }
        url
    }

    /// `POST /rooms` with the room id as a plain-text body.
    pub async fn create_room(&self, room_id: &str) -> Result<Room> {
        log::debug!("Creating room {room_id}");
        let response = self
            .http
            .post(self.rooms_url(&[]))
            .header(CONTENT_TYPE, "text/plain")
            .body(room_id.to_string())
            .send()
            .await?;
        read_json(response).await
    }

    pub async fn join_room(&self, room_id: &str) -> Result<Room> {
        log::debug!("Joining room {room_id}");
        let response = self.http.get(self.rooms_url(&[room_id])).send().await?;
        read_json(response).await
    }

    /// One page of a room's history, oldest first as the backend returns it.
    pub async fn fetch_messages(
        &self,
        room_id: &str,
        size: u32,
        page: u32,
    ) -> Result<Vec<ChatMessage>> {
        let response = self
            .http
            .get(self.rooms_url(&[room_id, "messages"]))
            .query(&[("size", size), ("page", page)])
            .send()
            .await?;

        let mut messages: Vec<ChatMessage> = read_json(response).await?;
        for message in messages.iter_mut().filter(|message| message.room_id.is_empty()) {
            message.room_id = room_id.to_string();
        }
        Ok(messages)
    }
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ChatError::Api {
            status: status.as_u16(),
            body,
        });
    }
    Ok(response.json::<T>().await?)
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{body_string, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    async fn service_for(server: &MockServer) -> RoomService {
        let config = AppConfig {
            api_base_url: server.uri(),
            ..AppConfig::default()
        };
        RoomService::new(&config).unwrap()
    }

    #[tokio::test]
    async fn create_room_posts_plain_text_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/rooms"))
            .and(header("content-type", "text/plain"))
            .and(body_string("R1"))
            .respond_with(
                ResponseTemplate::new(201)
                    .set_body_json(serde_json::json!({"id": "x1", "roomId": "R1", "messages": []})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let room = service_for(&server).await.create_room("R1").await.unwrap();
        assert_eq!(room.room_id, "R1");
    }

    #[tokio::test]
    async fn create_existing_room_surfaces_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/rooms"))
            .respond_with(ResponseTemplate::new(400).set_body_string("Room already exists!"))
            .mount(&server)
            .await;

        let err = service_for(&server).await.create_room("R1").await.unwrap_err();
        assert_eq!(err.status(), Some(400));
        assert!(matches!(err, ChatError::Api { ref body, .. } if body == "Room already exists!"));
    }

    #[tokio::test]
    async fn join_room_encodes_path_segment() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/rooms/team%20a"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"roomId": "team a"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let room = service_for(&server).await.join_room("team a").await.unwrap();
        assert_eq!(room.room_id, "team a");
    }

    #[tokio::test]
    async fn fetch_messages_requests_first_page_and_stamps_room() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/rooms/R1/messages"))
            .and(query_param("size", "50"))
            .and(query_param("page", "0"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"sender": "bob", "content": "first", "timeStamp": "2025-01-01T09:00:00"},
                {"sender": "alice", "content": "second", "timeStamp": "2025-01-01T09:01:00"}
            ])))
            .mount(&server)
            .await;

        let messages = service_for(&server)
            .await
            .fetch_messages("R1", 50, 0)
            .await
            .unwrap();
        let contents: Vec<_> = messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, ["first", "second"]);
        assert!(messages.iter().all(|m| m.room_id == "R1"));
    }

    #[tokio::test]
    async fn unreachable_backend_is_http_error() {
        let config = AppConfig {
            api_base_url: "http://127.0.0.1:1".into(),
            connect_timeout_secs: 1,
            ..AppConfig::default()
        };
        let err = RoomService::new(&config)
            .unwrap()
            .join_room("R1")
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::Http(_)));
    }
}
