//! Hosted progress table: PostgREST for reads and writes, the realtime
//! websocket for update events.

use crate::backend::{ProgressBackend, UpdateStream};
use crate::config::SupabaseConfig;
use crate::errors::BackendError;
use crate::models::{Category, FieldUpdate, ProgressRecord};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt, stream};
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{MissedTickBehavior, interval};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(25);
const UPDATE_BUFFER: usize = 64;

pub struct SupabaseBackend {
    client: Client,
    config: SupabaseConfig,
    rest_url: Url,
    realtime_url: Url,
}

impl SupabaseBackend {
    pub fn new(config: SupabaseConfig) -> Result<Self, BackendError> {
        let base = parse_url(&config.url)?;
        let rest_url = rest_url(&base, &config.table)?;
        let realtime_url = realtime_url(&base, &config.api_key)?;

        Ok(Self {
            client: Client::new(),
            config,
            rest_url,
            realtime_url,
        })
    }

    fn topic(&self) -> String {
        format!("realtime:{}", self.config.table)
    }
}

#[async_trait]
impl ProgressBackend for SupabaseBackend {
    async fn select_all(&self) -> Result<Vec<ProgressRecord>, BackendError> {
        let rows = self
            .client
            .get(self.rest_url.clone())
            .query(&[("select", "*"), ("order", "id.asc")])
            .header("apikey", &self.config.api_key)
            .bearer_auth(&self.config.api_key)
            .send()
            .await?
            .error_for_status()?
            .json::<Vec<Value>>()
            .await?;
        rows.into_iter()
            .map(|row| decode_row(row, &self.config.match_sets_column).map_err(BackendError::from))
            .collect()
    }

    async fn update_field(&self, update: &FieldUpdate) -> Result<(), BackendError> {
        self.client
            .patch(self.rest_url.clone())
            .query(&[("person", format!("eq.{}", update.person))])
            .header("apikey", &self.config.api_key)
            .header("Prefer", "return=minimal")
            .bearer_auth(&self.config.api_key)
            .json(&update_body(update, &self.config.match_sets_column))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn subscribe(&self) -> Result<UpdateStream, BackendError> {
        let (socket, _) = connect_async(self.realtime_url.to_string()).await?;
        let (mut sink, mut source) = socket.split();

        let topic = self.topic();
        let join = join_frame(&topic, &self.config.schema, &self.config.table, &self.config.api_key);
        sink.send(Message::Text(serde_json::to_string(&join)?)).await?;
        info!(%topic, "joined realtime channel");

        let column = self.config.match_sets_column.clone();
        let (sender, receiver) = mpsc::channel(UPDATE_BUFFER);
        tokio::spawn(async move {
            let mut heartbeat = interval(HEARTBEAT_INTERVAL);
            heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
            heartbeat.tick().await;
            let mut next_ref: u64 = 2;

            loop {
                tokio::select! {
                    _ = sender.closed() => {
                        let leave = Frame::new(&topic, "phx_leave", json!({}), next_ref);
                        if let Ok(text) = serde_json::to_string(&leave) {
                            let _ = sink.send(Message::Text(text)).await;
                        }
                        break;
                    }
                    _ = heartbeat.tick() => {
                        let beat = Frame::new("phoenix", "heartbeat", json!({}), next_ref);
                        next_ref += 1;
                        let Ok(text) = serde_json::to_string(&beat) else { continue };
                        if let Err(err) = sink.send(Message::Text(text)).await {
                            warn!("realtime heartbeat failed: {err}");
                            break;
                        }
                    }
                    message = source.next() => match message {
                        Some(Ok(Message::Text(text))) => {
                            if let Some(record) = parse_update(&text, &column) {
                                if sender.send(record).await.is_err() {
                                    break;
                                }
                            }
                        }
                        Some(Ok(Message::Close(frame))) => {
                            debug!(?frame, "realtime socket closed by server");
                            break;
                        }
                        Some(Ok(_)) => {}
                        Some(Err(err)) => {
                            warn!("realtime socket error: {err}");
                            break;
                        }
                        None => break,
                    },
                }
            }

            let _ = sink.close().await;
            info!(%topic, "left realtime channel");
        });

        let updates = stream::unfold(receiver, |mut receiver| async move {
            receiver.recv().await.map(|record| (record, receiver))
        });
        Ok(updates.boxed())
    }
}

/// Phoenix channel frame as spoken by the realtime endpoint.
#[derive(Debug, Serialize, Deserialize)]
struct Frame {
    topic: String,
    event: String,
    payload: Value,
    #[serde(rename = "ref", default)]
    reference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    join_ref: Option<String>,
}

impl Frame {
    fn new(topic: &str, event: &str, payload: Value, reference: u64) -> Self {
        Self {
            topic: topic.to_string(),
            event: event.to_string(),
            payload,
            reference: Some(reference.to_string()),
            join_ref: None,
        }
    }
}

fn join_frame(topic: &str, schema: &str, table: &str, access_token: &str) -> Frame {
    let payload = json!({
        "config": {
            "broadcast": { "self": false },
            "presence": { "key": "" },
            "postgres_changes": [
                { "event": "UPDATE", "schema": schema, "table": table }
            ]
        },
        "access_token": access_token,
    });
    let mut frame = Frame::new(topic, "phx_join", payload, 1);
    frame.join_ref = Some("1".to_string());
    frame
}

/// Extracts the new row image from a `postgres_changes` UPDATE frame.
fn parse_update(text: &str, match_sets_column: &str) -> Option<ProgressRecord> {
    let frame: Frame = match serde_json::from_str(text) {
        Ok(frame) => frame,
        Err(err) => {
            warn!("unreadable realtime frame: {err}");
            return None;
        }
    };
    if frame.event != "postgres_changes" {
        if frame.event == "phx_reply" && frame.payload["status"] != "ok" {
            warn!(payload = %frame.payload, "realtime channel replied with an error");
        }
        return None;
    }

    let data = &frame.payload["data"];
    if data["type"] != "UPDATE" {
        return None;
    }
    match decode_row(data["record"].clone(), match_sets_column) {
        Ok(record) => Some(record),
        Err(err) => {
            warn!("update event carried an unreadable record: {err}");
            None
        }
    }
}

/// Table column backing `category`; only the match sets column is named
/// per table.
fn column_name<'a>(category: Category, match_sets_column: &'a str) -> &'a str {
    match category {
        Category::MatchSets => match_sets_column,
        other => other.column(),
    }
}

fn update_body(update: &FieldUpdate, match_sets_column: &str) -> Value {
    let mut body = serde_json::Map::new();
    body.insert(
        column_name(update.category, match_sets_column).to_string(),
        json!(update.value),
    );
    Value::Object(body)
}

fn decode_row(mut row: Value, match_sets_column: &str) -> Result<ProgressRecord, serde_json::Error> {
    if let Value::Object(fields) = &mut row {
        if let Some(value) = fields.remove(match_sets_column) {
            fields.insert(Category::MatchSets.column().to_string(), value);
        }
    }
    serde_json::from_value(row)
}

fn parse_url(raw: &str) -> Result<Url, BackendError> {
    Url::parse(raw).map_err(|err| BackendError::InvalidUrl {
        url: raw.to_string(),
        reason: err.to_string(),
    })
}

fn rest_url(base: &Url, table: &str) -> Result<Url, BackendError> {
    base.join(&format!("rest/v1/{table}"))
        .map_err(|err| BackendError::InvalidUrl {
            url: base.to_string(),
            reason: err.to_string(),
        })
}

fn realtime_url(base: &Url, api_key: &str) -> Result<Url, BackendError> {
    let mut url = base.clone();
    let scheme = match base.scheme() {
        "https" => "wss",
        "http" => "ws",
        other => {
            return Err(BackendError::InvalidUrl {
                url: base.to_string(),
                reason: format!("unsupported scheme '{other}'"),
            });
        }
    };
    if url.set_scheme(scheme).is_err() {
        return Err(BackendError::InvalidUrl {
            url: base.to_string(),
            reason: format!("cannot switch to {scheme}"),
        });
    }
    url.set_path("/realtime/v1/websocket");
    url.query_pairs_mut()
        .clear()
        .append_pair("apikey", api_key)
        .append_pair("vsn", "1.0.0");
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(url: &str) -> SupabaseConfig {
        SupabaseConfig {
            url: url.to_string(),
            api_key: "anon-key".to_string(),
            schema: "public".to_string(),
            table: "progress".to_string(),
            match_sets_column: "smash_sets".to_string(),
        }
    }

    #[test]
    fn builds_rest_and_realtime_urls() {
        let backend = SupabaseBackend::new(config("https://demo.supabase.co")).unwrap();
        assert_eq!(backend.rest_url.as_str(), "https://demo.supabase.co/rest/v1/progress");
        assert_eq!(
            backend.realtime_url.as_str(),
            "wss://demo.supabase.co/realtime/v1/websocket?apikey=anon-key&vsn=1.0.0"
        );
        assert_eq!(backend.topic(), "realtime:progress");
    }

    #[test]
    fn local_http_url_maps_to_ws() {
        let backend = SupabaseBackend::new(config("http://127.0.0.1:54321")).unwrap();
        assert_eq!(backend.realtime_url.scheme(), "ws");
        assert_eq!(backend.realtime_url.port(), Some(54321));
    }

    #[test]
    fn rejects_unusable_urls() {
        assert!(matches!(
            SupabaseBackend::new(config("not a url")),
            Err(BackendError::InvalidUrl { .. })
        ));
        assert!(matches!(
            SupabaseBackend::new(config("ftp://demo.supabase.co")),
            Err(BackendError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn join_frame_requests_update_events() {
        let frame = join_frame("realtime:progress", "public", "progress", "token");
        let encoded = serde_json::to_value(&frame).unwrap();
        assert_eq!(encoded["event"], "phx_join");
        assert_eq!(encoded["ref"], "1");
        assert_eq!(encoded["join_ref"], "1");
        assert_eq!(encoded["payload"]["access_token"], "token");
        let change = &encoded["payload"]["config"]["postgres_changes"][0];
        assert_eq!(change["event"], "UPDATE");
        assert_eq!(change["table"], "progress");
    }

    #[test]
    fn parses_update_record() {
        let text = r#"{
            "topic": "realtime:progress",
            "event": "postgres_changes",
            "ref": null,
            "payload": {
                "ids": [12],
                "data": {
                    "type": "UPDATE",
                    "schema": "public",
                    "table": "progress",
                    "commit_timestamp": "2026-01-02T10:00:00Z",
                    "record": {"id": 2, "person": "B", "movies": 4, "workouts": 1, "smash_sets": 7},
                    "old_record": {"id": 2}
                }
            }
        }"#;

        let record = parse_update(text, "smash_sets").unwrap();
        assert_eq!(record.id, 2);
        assert_eq!(record.person, "B");
        assert_eq!(record.match_sets, 7);
    }

    #[test]
    fn ignores_non_update_frames() {
        let reply = r#"{"topic":"realtime:progress","event":"phx_reply","ref":"1","payload":{"status":"ok","response":{}}}"#;
        assert!(parse_update(reply, "smash_sets").is_none());

        let insert = r#"{"topic":"realtime:progress","event":"postgres_changes","ref":null,
            "payload":{"data":{"type":"INSERT","record":{"id":3,"person":"C"}}}}"#;
        assert!(parse_update(insert, "smash_sets").is_none());

        assert!(parse_update("garbage", "smash_sets").is_none());
    }

    #[test]
    fn match_sets_write_uses_table_column() {
        let update = FieldUpdate {
            person: "Emil".to_string(),
            category: Category::MatchSets,
            value: 1,
        };
        assert_eq!(update_body(&update, "smash_sets"), json!({ "smash_sets": 1 }));
        assert_eq!(update_body(&update, "sets_played"), json!({ "sets_played": 1 }));
    }

    #[test]
    fn other_writes_keep_their_column() {
        let update = FieldUpdate {
            person: "Emil".to_string(),
            category: Category::Workouts,
            value: 3,
        };
        assert_eq!(update_body(&update, "smash_sets"), json!({ "workouts": 3 }));
    }

    #[test]
    fn rows_read_back_through_custom_column() {
        let row = json!({ "id": 1, "person": "A", "movies": 2, "workouts": 0, "sets_played": 9 });
        let record = decode_row(row, "sets_played").unwrap();
        assert_eq!(record.match_sets, 9);
        assert_eq!(record.movies, 2);
    }
}
