//! Shared wiremock setup: one server plays both the token endpoint and the
//! entity API gateway.

#![allow(dead_code)]

use psdns_api_dns::DnsClient;
use psdns_core::config::{ApiConfig, Credentials};
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Start a server with a token endpoint and connect a client to it
pub async fn connected_client() -> (MockServer, DnsClient) {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "tok-1",
            "token_type": "Bearer",
            "expires_in": 3600,
        })))
        .mount(&server)
        .await;

    let config = ApiConfig::new(Credentials {
        client_id: "psdns-client".to_string(),
        client_secret: "client-secret".to_string(),
        username: "operator".to_string(),
        password: "hunter2".to_string(),
        token_url: format!("{}/token", server.uri()),
    })
    .with_base_url(server.uri());

    let client = DnsClient::connect(&config, &CancellationToken::new())
        .await
        .unwrap();
    (server, client)
}

/// A domain as the API serializes it
pub fn wire_domain(id: u64, name: &str) -> Value {
    json!({
        "companyId": "",
        "contractId": "",
        "createDateTime": "2021-03-04T05:06:07Z",
        "dnsDomainId": id,
        "dnsNameserverPairName": "ns1.plusserver.com",
        "name": name,
        "protected": false,
        "replicationMasterIpAddressList": [],
        "replicationType": "None",
        "unicodeName": name,
    })
}

/// A record as the API serializes it
pub fn wire_record(id: &str, domain_id: u64, name: &str, content: &str) -> Value {
    json!({
        "content": content,
        "dnsDomainId": domain_id,
        "dnsResourceRecordId": id,
        "name": name,
        "ttl": 300,
        "type": "A",
    })
}

/// Empty acknowledgement body
pub fn acknowledgement() -> Value {
    json!({"resultSetProperties": {}})
}
