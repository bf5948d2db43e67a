//! HTTP implementation of the remote catalog API.
//!
//! Every request carries `Authorization: Bearer {token}` from the
//! [`CredentialCache`]. Non-2xx responses, transport failures and
//! undecodable bodies become [`RemoteError`]s; the two datasets a sync
//! cannot run without (item configs, unassigned items) also fail on an
//! empty payload.

use async_trait::async_trait;
use pickroute_core::catalog::{CatalogApi, PickingArea, payload_is_empty};
use pickroute_core::error::RemoteError;
use pickroute_core::venue::VenueSettings;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::credentials::CredentialCache;

/// Catalog client backed by `reqwest`.
pub struct CatalogClient {
    client: reqwest::Client,
    credentials: Arc<CredentialCache>,
}

impl CatalogClient {
    pub fn new(credentials: Arc<CredentialCache>, timeout: Duration) -> Result<Self, RemoteError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RemoteError::Network {
                endpoint: "client".into(),
                reason: format!("Failed to create HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            credentials,
        })
    }

    async fn get_json(&self, endpoint: &str, url: &str) -> Result<Value, RemoteError> {
        let token = self.credentials.access_token().await?;
        debug!(endpoint, url, "GET");

        let response = self
            .client
            .get(url)
            .header("Authorization", format!("Bearer {token}"))
            .header("Content-Type", "application/json")
            .send()
            .await
            .map_err(|e| RemoteError::Network {
                endpoint: endpoint.into(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(endpoint, status = status.as_u16(), "Catalog returned error");
            return Err(RemoteError::Status {
                endpoint: endpoint.into(),
                status_code: status.as_u16(),
                message: body,
            });
        }

        response.json().await.map_err(|e| RemoteError::Decode {
            endpoint: endpoint.into(),
            reason: e.to_string(),
        })
    }

    async fn get_non_empty(&self, endpoint: &str, url: &str) -> Result<Value, RemoteError> {
        let payload = self.get_json(endpoint, url).await?;
        if payload_is_empty(&payload) {
            return Err(RemoteError::EmptyPayload {
                endpoint: endpoint.into(),
            });
        }
        Ok(payload)
    }
}

#[async_trait]
impl CatalogApi for CatalogClient {
    fn name(&self) -> &str {
        "http"
    }

    async fn fetch_unassigned_items(&self, venue: &VenueSettings) -> Result<Value, RemoteError> {
        self.get_non_empty("unassigned-items", &venue.endpoints.unassigned_items_url())
            .await
    }

    async fn fetch_item_configs(&self, venue: &VenueSettings) -> Result<Value, RemoteError> {
        self.get_non_empty("item-configs", &venue.endpoints.item_configs_url())
            .await
    }

    async fn fetch_all_items(&self, venue: &VenueSettings) -> Result<Value, RemoteError> {
        self.get_non_empty("all-items", &venue.endpoints.all_items_url())
            .await
    }

    async fn fetch_picking_areas(
        &self,
        venue: &VenueSettings,
    ) -> Result<Vec<PickingArea>, RemoteError> {
        let payload = self
            .get_json("picking-areas", &venue.endpoints.picking_areas_url())
            .await?;

        PickingArea::list_from_payload(payload).map_err(|reason| RemoteError::Decode {
            endpoint: "picking-areas".into(),
            reason,
        })
    }

    async fn attach_items(
        &self,
        venue: &VenueSettings,
        picking_area_id: &str,
        item_ids: &[String],
    ) -> Result<(), RemoteError> {
        let token = self.credentials.access_token().await?;
        let url = venue.endpoints.attach_items_url(picking_area_id);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {token}"))
            .json(&json!({ "data": item_ids }))
            .send()
            .await
            .map_err(|e| RemoteError::Network {
                endpoint: "attach-items".into(),
                reason: e.to_string(),
            })?;

        // 200 and 207 (partial) are both reported as success by the catalog
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RemoteError::Status {
                endpoint: "attach-items".into(),
                status_code: status.as_u16(),
                message: body,
            });
        }

        debug!(picking_area_id, items = item_ids.len(), status = status.as_u16(), "Items attached");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use pickroute_core::error::AuthError;
    use pickroute_core::store::DocumentStoreExt;
    use pickroute_core::token::{TokenRecord, TokenRefresher};
    use pickroute_core::venue::Endpoints;
    use pickroute_store::InMemoryStore;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct RejectingRefresher;

    #[async_trait]
    impl TokenRefresher for RejectingRefresher {
        async fn refresh(&self, _refresh_token: &str) -> Result<TokenRecord, AuthError> {
            Err(AuthError::RefreshRejected {
                status_code: 400,
                message: "invalid_grant".into(),
            })
        }
    }

    async fn client_with_token(token: Option<&str>) -> CatalogClient {
        let store = Arc::new(InMemoryStore::new());
        if let Some(token) = token {
            store
                .save_token_record(&TokenRecord::issued(token, "r-1", 3600, Utc::now()))
                .await
                .unwrap();
        }
        let credentials = Arc::new(CredentialCache::new(store, Arc::new(RejectingRefresher)));
        CatalogClient::new(credentials, Duration::from_secs(5)).unwrap()
    }

    fn venue(base: &str) -> VenueSettings {
        VenueSettings {
            venue_id: "cafe1".into(),
            venue_name: None,
            endpoints: Endpoints {
                base_url: base.into(),
                unassigned_items_endpoint: "/v1/items/unassigned".into(),
                item_config_endpoint: "/v1/item-configs".into(),
                menu_id: "menu-7".into(),
                all_items_information_endpoint: format!("{base}/v1/items/all"),
                venue_id: "remote-42".into(),
            },
            bin_mappings: vec![],
            location_transformations: vec![],
            overflow_locations: vec![],
            schedule: Default::default(),
            venue_message: None,
        }
    }

    #[tokio::test]
    async fn item_configs_sends_bearer_and_menu_id() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/item-configs"))
            .and(query_param("menuId", "menu-7"))
            .and(header("Authorization", "Bearer tok-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"itemId": "i1", "storageLocation": "A-1"}
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_with_token(Some("tok-1")).await;
        let payload = client.fetch_item_configs(&venue(&server.uri())).await.unwrap();
        assert_eq!(payload[0]["itemId"], "i1");
    }

    #[tokio::test]
    async fn non_success_status_is_remote_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/items/unassigned"))
            .respond_with(ResponseTemplate::new(503).set_body_string("down"))
            .mount(&server)
            .await;

        let client = client_with_token(Some("tok-1")).await;
        match client.fetch_unassigned_items(&venue(&server.uri())).await {
            Err(RemoteError::Status {
                status_code,
                endpoint,
                ..
            }) => {
                assert_eq!(status_code, 503);
                assert_eq!(endpoint, "unassigned-items");
            }
            other => panic!("expected status error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_unassigned_payload_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/items/unassigned"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
            .mount(&server)
            .await;

        let client = client_with_token(Some("tok-1")).await;
        let err = client
            .fetch_unassigned_items(&venue(&server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(err, RemoteError::EmptyPayload { .. }));
    }

    #[tokio::test]
    async fn empty_full_catalog_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/items/all"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
            .mount(&server)
            .await;

        let client = client_with_token(Some("tok-1")).await;
        let err = client
            .fetch_all_items(&venue(&server.uri()))
            .await
            .unwrap_err();
        match err {
            RemoteError::EmptyPayload { endpoint } => assert_eq!(endpoint, "all-items"),
            other => panic!("expected empty payload error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn picking_areas_use_remote_venue_id_and_strip_volatile_fields() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/venues/remote-42/picking-areas"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [
                    {"id": "pa-1", "name": "Bar", "order": 1, "itemsCount": 12, "color": "red"}
                ]
            })))
            .mount(&server)
            .await;

        let client = client_with_token(Some("tok-1")).await;
        let areas = client
            .fetch_picking_areas(&venue(&format!("{}/", server.uri())))
            .await
            .unwrap();
        assert_eq!(areas.len(), 1);
        assert_eq!(areas[0].name, "Bar");
        assert!(!areas[0].extra.contains_key("order"));
        assert!(!areas[0].extra.contains_key("itemsCount"));
        assert_eq!(areas[0].extra["color"], "red");
    }

    #[tokio::test]
    async fn attach_posts_item_ids_and_accepts_multi_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/venues/remote-42/picking-areas/pa-1/items"))
            .and(body_json(json!({"data": ["i1"]})))
            .respond_with(ResponseTemplate::new(207))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_with_token(Some("tok-1")).await;
        client
            .attach_items(&venue(&server.uri()), "pa-1", &["i1".to_string()])
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn missing_credentials_surface_as_auth_error() {
        let server = MockServer::start().await;
        let client = client_with_token(None).await;
        let err = client
            .fetch_all_items(&venue(&server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(err, RemoteError::Auth(AuthError::NoRefreshToken)));
    }
}
