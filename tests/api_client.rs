// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! HTTP-level tests for the myUplink client against a mock server.

use serde_json::json;
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use myuplink2mqtt::api::{MyUplinkClient, ParameterValue, PointSource};
use myuplink2mqtt::auth::{ClientCredentials, OAuthSession, OAuthToken};
use myuplink2mqtt::error::{Error, ProtocolError};

fn credentials() -> ClientCredentials {
    ClientCredentials {
        client_id: "client-1".to_string(),
        client_secret: "secret-1".to_string(),
    }
}

fn token(access: &str) -> OAuthToken {
    OAuthToken {
        access_token: access.to_string(),
        refresh_token: Some("refresh-1".to_string()),
        token_type: Some("bearer".to_string()),
        expires_in: None,
        expires_at: None,
    }
}

fn client(server: &MockServer, access: &str) -> MyUplinkClient {
    let session = OAuthSession::with_token(
        credentials(),
        token(access),
        format!("{}/oauth/token", server.uri()),
    );
    MyUplinkClient::with_base_url(session, server.uri())
}

#[tokio::test]
async fn systems_request_carries_bearer_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/systems/me"))
        .and(header("authorization", "Bearer abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "systems": [{
                "systemId": "sys-1",
                "name": "Villa",
                "devices": [{"id": "dev-1"}]
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let systems = client(&server, "abc").get_systems().await.unwrap();
    assert_eq!(systems.len(), 1);
    assert_eq!(systems[0].system_id, "sys-1");
    assert_eq!(systems[0].devices[0].id, "dev-1");
}

#[tokio::test]
async fn unauthorized_triggers_refresh_and_retry() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v2/systems/me"))
        .and(header("authorization", "Bearer stale"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=refresh-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "fresh",
            "refresh_token": "refresh-2",
            "token_type": "bearer",
            "expires_in": 3600
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v2/systems/me"))
        .and(header("authorization", "Bearer fresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"systems": []})))
        .expect(1)
        .mount(&server)
        .await;

    let systems = client(&server, "stale").get_systems().await.unwrap();
    assert!(systems.is_empty());
}

#[tokio::test]
async fn points_request_defaults_the_language() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/devices/dev-1/points"))
        .and(query_param("language", "en-US"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "parameterId": 40004,
            "parameterName": "Actual room temperature",
            "parameterUnit": "°C",
            "value": 21.5
        }])))
        .expect(1)
        .mount(&server)
        .await;

    let points = client(&server, "abc")
        .get_device_points("dev-1", None, None)
        .await
        .unwrap();
    assert_eq!(points.len(), 1);
    assert_eq!(points[0].id, "40004");
    assert_eq!(points[0].value, ParameterValue::Float(21.5));
}

#[tokio::test]
async fn points_request_passes_parameter_filter() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/devices/dev-1/points"))
        .and(query_param("parameters", "40004,43161"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let ids = vec!["40004".to_string(), "43161".to_string()];
    let points = client(&server, "abc")
        .get_device_points("dev-1", Some(&ids), None)
        .await
        .unwrap();
    assert!(points.is_empty());
}

#[tokio::test]
async fn server_error_surfaces_status_and_url() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/devices/dev-1"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = client(&server, "abc")
        .get_device_details("dev-1")
        .await
        .unwrap_err();
    match err {
        Error::Protocol(ProtocolError::Status { status, url }) => {
            assert_eq!(status, 503);
            assert!(url.ends_with("/v2/devices/dev-1"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn device_details_deserialize() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/devices/dev-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "product": {"name": "Nibe F1155"},
            "serialNumber": "06666666666666",
            "connectionState": "Connected",
            "currentFwVersion": "9.1.0"
        })))
        .mount(&server)
        .await;

    let details = client(&server, "abc")
        .get_device_details("dev-1")
        .await
        .unwrap();
    assert_eq!(details.product.name, "Nibe F1155");
    assert_eq!(details.connection_state, "Connected");
}
