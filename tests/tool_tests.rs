//! End-to-end tool behaviour against mocked remote services

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use k256::elliptic_curve::sec1::ToEncodedPoint;
use mockito::{Matcher, Server};
use secrecy::SecretString;
use serde_json::{json, Value};
use tempfile::tempdir;

use decom_trading_tools::{
    config::{Config, KeyStoreFormat},
    mcp::{
        handler::handle_mcp_request,
        protocol::{error_codes, Request},
    },
    tools::build_registry,
    ToolError, ToolRegistry,
};

// BIP-340 test vector key and its x-only public key
const KEY: &str = "b7e151628aed2a6abf7158809cf4f3c762e7160f38b4da56a784d9045190cfef";
const PUBKEY: &str = "dff1d77f2a671c5f36183726db2341be58feae1da2deced843240f7b502ba659";

// Well-known development wallet (anvil account 0)
const DEV_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
const DEV_ADDRESS: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";
const USER_ADDRESS: &str = "0x70997970C51812dc3A010C7d01b50e0d17dc79C8";

fn config_for(url: &str, key: Option<&str>) -> Config {
    Config {
        base_url: url.to_string(),
        trading_bot_url: url.to_string(),
        backtest_engine_url: url.to_string(),
        wallet_agent_url: url.to_string(),
        settlement_engine_url: url.to_string(),
        nostr_private_key: key.map(|k| Arc::new(SecretString::new(k.to_string()))),
        ..Config::default()
    }
}

fn registry_for(url: &str) -> ToolRegistry {
    build_registry(config_for(url, Some(KEY)))
}

async fn call_json(registry: &ToolRegistry, name: &str, args: Value) -> Result<Value, ToolError> {
    let output = registry.call("test", name, args).await?;
    Ok(serde_json::from_str(output.text()).unwrap())
}

fn custody_public_key() -> String {
    let secret = k256::SecretKey::from_slice(&[7u8; 32]).unwrap();
    hex::encode(secret.public_key().to_encoded_point(true).as_bytes())
}

fn signature_matcher() -> Matcher {
    Matcher::Regex("^[0-9a-f]{128}$".to_string())
}

#[tokio::test]
async fn get_ohlc_sends_only_supplied_query_fields() {
    let mut server = Server::new_async().await;
    let body = json!({"candles": [{"t": 1, "o": 1.0, "h": 2.0, "l": 0.5, "c": 1.5}]});
    let mock = server
        .mock("GET", "/api/ohlc")
        .match_query(Matcher::Exact("symbol=BTC%2FUSDC&resolution=15".to_string()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(body.to_string())
        .expect(1)
        .create_async()
        .await;

    let registry = build_registry(config_for(&server.url(), None));
    let result = call_json(
        &registry,
        "get_ohlc",
        json!({"symbol": "BTC/USDC", "resolution": "15"}),
    )
    .await
    .unwrap();

    mock.assert_async().await;
    assert_eq!(result, body);
}

#[tokio::test]
async fn get_ohlc_accepts_fractional_timestamps() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/api/ohlc")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("symbol".into(), "BTC/USDC".into()),
            Matcher::UrlEncoded("from".into(), "1700000000".into()),
            Matcher::UrlEncoded("to".into(), "1700003600.5".into()),
        ]))
        .with_status(200)
        .with_body(r#"{"candles":[]}"#)
        .expect(1)
        .create_async()
        .await;

    let result = call_json(
        &registry_for(&server.url()),
        "get_ohlc",
        json!({"symbol": "BTC/USDC", "from": 1700000000.0, "to": 1700003600.5}),
    )
    .await
    .unwrap();

    mock.assert_async().await;
    assert_eq!(result, json!({"candles": []}));
}

#[tokio::test]
async fn get_ohlc_rejects_unknown_resolution_without_calling_out() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let err = registry_for(&server.url())
        .call("t", "get_ohlc", json!({"symbol": "BTC/USDC", "resolution": "2h"}))
        .await
        .unwrap_err();

    mock.assert_async().await;
    assert!(matches!(err, ToolError::InvalidParams(_)));
}

#[tokio::test]
async fn create_agent_without_key_fails_before_any_request() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/api/agents")
        .expect(0)
        .create_async()
        .await;

    let registry = build_registry(config_for(&server.url(), None));
    let err = registry
        .call(
            "t",
            "create_agent",
            json!({"name": "A", "initialCapital": 100, "mode": "paper"}),
        )
        .await
        .unwrap_err();

    mock.assert_async().await;
    assert!(matches!(err, ToolError::MissingCredential));
}

#[tokio::test]
async fn create_agent_signs_declared_fields() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/api/agents")
        .match_header("x-public-key", PUBKEY)
        .match_header("x-signature", signature_matcher())
        .match_body(Matcher::PartialJson(json!({
            "name": "A",
            "initial_capital": 100.0,
            "mode": "paper",
            "pubkey": PUBKEY
        })))
        .with_status(201)
        .with_body(r#"{"id": 12, "name": "A"}"#)
        .expect(1)
        .create_async()
        .await;

    let result = call_json(
        &registry_for(&server.url()),
        "create_agent",
        json!({"name": "A", "initialCapital": 100.0, "mode": "paper"}),
    )
    .await
    .unwrap();

    mock.assert_async().await;
    assert_eq!(result["id"], 12);
}

#[tokio::test]
async fn list_agents_uses_bearer_challenge() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/api/agents")
        .match_query(Matcher::UrlEncoded("pubkey".into(), PUBKEY.into()))
        .match_header(
            "authorization",
            Matcher::Regex(format!("^Bearer {}:[0-9a-f]{{128}}$", PUBKEY)),
        )
        .with_status(200)
        .with_body("[]")
        .expect(1)
        .create_async()
        .await;

    let result = call_json(&registry_for(&server.url()), "list_agents", json!({}))
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(result, json!([]));
}

#[tokio::test]
async fn register_wallet_twice_creates_once() {
    let mut server = Server::new_async().await;
    let created = Arc::new(AtomicBool::new(false));

    let listing_state = Arc::clone(&created);
    let listing = server
        .mock("GET", "/api/wallets")
        .match_query(Matcher::UrlEncoded("pubkey".into(), PUBKEY.into()))
        .with_status(200)
        .with_body_from_request(move |_| {
            if listing_state.load(Ordering::SeqCst) {
                json!([{"id": 42, "address": DEV_ADDRESS, "label": "agent-wallet"}])
                    .to_string()
                    .into_bytes()
            } else {
                b"[]".to_vec()
            }
        })
        .expect(2)
        .create_async()
        .await;

    let create_state = Arc::clone(&created);
    let create = server
        .mock("POST", "/api/wallets")
        .match_header("x-public-key", PUBKEY)
        .match_header("x-signature", signature_matcher())
        .with_status(201)
        .with_body_from_request(move |_| {
            create_state.store(true, Ordering::SeqCst);
            json!({"id": 42, "address": DEV_ADDRESS}).to_string().into_bytes()
        })
        .expect(1)
        .create_async()
        .await;

    let registry = registry_for(&server.url());
    let args = json!({"agentWalletAddress": DEV_ADDRESS});
    let first = call_json(&registry, "register_wallet", args.clone()).await.unwrap();
    let second = call_json(&registry, "register_wallet", args).await.unwrap();

    listing.assert_async().await;
    create.assert_async().await;
    assert_eq!(first, json!({"walletId": 42, "walletAddress": DEV_ADDRESS}));
    assert_eq!(first, second);
}

#[tokio::test]
async fn register_wallet_checks_again_after_server_error() {
    let mut server = Server::new_async().await;
    let attempted = Arc::new(AtomicBool::new(false));

    let listing_state = Arc::clone(&attempted);
    let _listing = server
        .mock("GET", "/api/wallets")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body_from_request(move |_| {
            if listing_state.load(Ordering::SeqCst) {
                json!({"wallets": [{"walletId": "w-9", "walletAddress": DEV_ADDRESS}]})
                    .to_string()
                    .into_bytes()
            } else {
                json!({"wallets": []}).to_string().into_bytes()
            }
        })
        .create_async()
        .await;

    let create_state = Arc::clone(&attempted);
    let create = server
        .mock("POST", "/api/wallets")
        .with_status(502)
        .with_body_from_request(move |_| {
            create_state.store(true, Ordering::SeqCst);
            b"bad gateway".to_vec()
        })
        .expect(1)
        .create_async()
        .await;

    let result = call_json(
        &registry_for(&server.url()),
        "register_wallet",
        json!({"agentWalletAddress": DEV_ADDRESS}),
    )
    .await
    .unwrap();

    create.assert_async().await;
    assert_eq!(result, json!({"walletId": "w-9", "walletAddress": DEV_ADDRESS}));
}

#[tokio::test]
async fn register_wallet_surfaces_client_errors() {
    let mut server = Server::new_async().await;
    let _listing = server
        .mock("GET", "/api/wallets")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body("[]")
        .create_async()
        .await;
    let _create = server
        .mock("POST", "/api/wallets")
        .with_status(400)
        .with_body(r#"{"error":"label too long"}"#)
        .create_async()
        .await;

    let err = registry_for(&server.url())
        .call("t", "register_wallet", json!({"agentWalletAddress": DEV_ADDRESS}))
        .await
        .unwrap_err();

    assert_eq!(
        err.to_string(),
        r#"create wallet failed: HTTP 400 Bad Request: {"error":"label too long"}"#
    );
}

#[tokio::test]
async fn store_tee_wallet_takes_address_from_conflict_error() {
    let mut server = Server::new_async().await;
    let existing = "0x1111111111111111111111111111111111111111";

    let _key = server
        .mock("GET", "/api/public-key")
        .with_status(200)
        .with_body(json!({"publicKey": custody_public_key()}).to_string())
        .create_async()
        .await;
    let store = server
        .mock("POST", "/api/wallets")
        .match_header("x-public-key", PUBKEY)
        .match_header("x-signature", signature_matcher())
        .with_status(409)
        .with_body(
            json!({"error": "WALLET_EXISTS", "message": format!("wallet {} already stored", existing)})
                .to_string(),
        )
        .expect(1)
        .create_async()
        .await;
    let listing = server
        .mock("GET", "/api/wallets")
        .match_query(Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let result = call_json(
        &registry_for(&server.url()),
        "store_tee_wallet",
        json!({"privateKey": DEV_KEY}),
    )
    .await
    .unwrap();

    store.assert_async().await;
    listing.assert_async().await;
    assert_eq!(result["walletAddress"], existing);
    assert_eq!(result["derivedAddress"], DEV_ADDRESS);
    assert_eq!(result["resolution"], "existing_from_error");
}

#[tokio::test]
async fn store_tee_wallet_reads_address_followed_by_more_hex() {
    let mut server = Server::new_async().await;
    let address = format!("0x{}", "a".repeat(40));

    let _key = server
        .mock("GET", "/api/public-key")
        .with_status(200)
        .with_body(json!({"publicKey": custody_public_key()}).to_string())
        .create_async()
        .await;
    let _store = server
        .mock("POST", "/api/wallets")
        .with_status(409)
        .with_body(format!("WALLET_EXISTS: wallet={}b", address))
        .create_async()
        .await;
    let listing = server
        .mock("GET", "/api/wallets")
        .match_query(Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let result = call_json(
        &registry_for(&server.url()),
        "store_tee_wallet",
        json!({"privateKey": DEV_KEY}),
    )
    .await
    .unwrap();

    listing.assert_async().await;
    assert_eq!(result["walletAddress"], address);
    assert_eq!(result["resolution"], "existing_from_error");
}

#[tokio::test]
async fn store_tee_wallet_falls_back_to_last_listed_wallet() {
    let mut server = Server::new_async().await;
    let older = "0x2222222222222222222222222222222222222222";
    let newest = "0x3333333333333333333333333333333333333333";

    let _key = server
        .mock("GET", "/api/public-key")
        .with_status(200)
        .with_body(json!({"public_key": custody_public_key()}).to_string())
        .create_async()
        .await;
    let _store = server
        .mock("POST", "/api/wallets")
        .with_status(409)
        .with_body(r#"{"code":"WALLET_EXISTS"}"#)
        .create_async()
        .await;
    let listing = server
        .mock("GET", "/api/wallets")
        .match_query(Matcher::UrlEncoded("pubkey".into(), PUBKEY.into()))
        .with_status(200)
        .with_body(json!({"wallets": [{"address": older}, {"address": newest}]}).to_string())
        .expect(1)
        .create_async()
        .await;

    let result = call_json(
        &registry_for(&server.url()),
        "store_tee_wallet",
        json!({"privateKey": DEV_KEY}),
    )
    .await
    .unwrap();

    listing.assert_async().await;
    assert_eq!(result["walletAddress"], newest);
    assert_eq!(result["resolution"], "existing_from_listing");
}

#[tokio::test]
async fn store_tee_wallet_conflict_with_empty_listing_is_reported() {
    let mut server = Server::new_async().await;
    let _key = server
        .mock("GET", "/api/public-key")
        .with_status(200)
        .with_body(json!({"pubkey": custody_public_key()}).to_string())
        .create_async()
        .await;
    let _store = server
        .mock("POST", "/api/wallets")
        .with_status(409)
        .with_body("WALLET_EXISTS")
        .create_async()
        .await;
    let _listing = server
        .mock("GET", "/api/wallets")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body("[]")
        .create_async()
        .await;

    let err = registry_for(&server.url())
        .call("t", "store_tee_wallet", json!({"privateKey": DEV_KEY}))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), "resource_conflict");
}

#[tokio::test]
async fn onboarding_chains_custody_backend_and_settlement() {
    let mut custody = Server::new_async().await;
    let mut backend = Server::new_async().await;

    let _key = custody
        .mock("GET", "/api/public-key")
        .with_status(200)
        .with_body(json!({"publicKey": custody_public_key()}).to_string())
        .create_async()
        .await;
    let stored = custody
        .mock("POST", "/api/wallets")
        .match_body(Matcher::PartialJson(json!({"address": DEV_ADDRESS, "agent_id": 5})))
        .with_status(201)
        .with_body(json!({"wallet": {"address": DEV_ADDRESS}}).to_string())
        .expect(1)
        .create_async()
        .await;
    let _listing = backend
        .mock("GET", "/api/wallets")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body("[]")
        .create_async()
        .await;
    let registered = backend
        .mock("POST", "/api/wallets")
        .match_body(Matcher::PartialJson(json!({"wallet_address": DEV_ADDRESS})))
        .with_status(201)
        .with_body(json!({"id": 7, "address": DEV_ADDRESS}).to_string())
        .expect(1)
        .create_async()
        .await;
    let trader = backend
        .mock("POST", "/api/traders")
        .match_header("x-public-key", PUBKEY)
        .match_header("x-signature", signature_matcher())
        .match_body(Matcher::PartialJson(json!({
            "agent_id": 5,
            "agent_wallet_address": DEV_ADDRESS,
            "user_wallet_address": USER_ADDRESS,
            "chain_id": 8453,
            "buy_limit_usd": 2500.0
        })))
        .with_status(201)
        .with_body(r#"{"traderId": "t-1"}"#)
        .expect(1)
        .create_async()
        .await;

    let config = Config {
        wallet_agent_url: custody.url(),
        ..config_for(&backend.url(), Some(KEY))
    };
    let result = call_json(
        &build_registry(config),
        "onboard_agent_wallet",
        json!({
            "agentId": 5,
            "agentWalletPrivateKey": DEV_KEY,
            "userWalletAddress": USER_ADDRESS,
            "symbol": "ETH/USDC",
            "chainId": 8453,
            "initialCapital": 1000,
            "leverage": 2.5
        }),
    )
    .await
    .unwrap();

    stored.assert_async().await;
    registered.assert_async().await;
    trader.assert_async().await;
    assert_eq!(result["custodyWallet"]["walletAddress"], DEV_ADDRESS);
    assert_eq!(result["wallet"]["walletId"], 7);
    assert_eq!(result["trader"]["traderId"], "t-1");
    assert_eq!(result["buyLimitUsd"], 2500.0);
}

#[tokio::test]
async fn onboarding_failure_names_the_step() {
    let mut custody = Server::new_async().await;
    let mut backend = Server::new_async().await;

    let _key = custody
        .mock("GET", "/api/public-key")
        .with_status(200)
        .with_body(json!({"publicKey": custody_public_key()}).to_string())
        .create_async()
        .await;
    let _stored = custody
        .mock("POST", "/api/wallets")
        .with_status(201)
        .with_body(json!({"address": DEV_ADDRESS}).to_string())
        .create_async()
        .await;
    let _listing = backend
        .mock("GET", "/api/wallets")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(json!([{"id": 3, "address": DEV_ADDRESS}]).to_string())
        .create_async()
        .await;
    let create = backend
        .mock("POST", "/api/wallets")
        .expect(0)
        .create_async()
        .await;
    let _trader = backend
        .mock("POST", "/api/traders")
        .with_status(500)
        .with_body("settlement offline")
        .create_async()
        .await;

    let config = Config {
        wallet_agent_url: custody.url(),
        ..config_for(&backend.url(), Some(KEY))
    };
    let registry = build_registry(config);
    let req = Request {
        jsonrpc: "2.0".into(),
        id: json!(9),
        method: "onboard_agent_wallet".into(),
        params: Some(json!({
            "agentId": 5,
            "agentWalletPrivateKey": DEV_KEY,
            "userWalletAddress": USER_ADDRESS,
            "symbol": "ETH/USDC",
            "chainId": 1,
            "initialCapital": 100,
            "leverage": 1
        })),
    };
    let resp = handle_mcp_request(req, &registry).await.unwrap();

    create.assert_async().await;
    let err = resp.error.unwrap();
    assert!(err
        .message
        .starts_with("onboard_agent_wallet: step 3 (register trader) failed: register trader failed: HTTP 500"));
    let data = err.data.unwrap();
    assert_eq!(data["step"], 3);
    assert_eq!(data["cause"]["status"], 500);
    assert_eq!(data["completed"]["wallet"]["walletId"], 3);
}

#[tokio::test]
async fn remote_failure_reaches_caller_with_tool_operation_status_and_body() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("GET", "/api/token-prices")
        .with_status(500)
        .with_body("prices unavailable")
        .create_async()
        .await;

    let registry = registry_for(&server.url());
    let req = Request {
        jsonrpc: "2.0".into(),
        id: json!("abc"),
        method: "tools/call".into(),
        params: Some(json!({"name": "get_token_prices", "arguments": {}})),
    };
    let resp = handle_mcp_request(req, &registry).await.unwrap();

    let err = resp.error.unwrap();
    assert_eq!(err.code, error_codes::INTERNAL_ERROR);
    assert_eq!(
        err.message,
        "get_token_prices: token-prices failed: HTTP 500 Internal Server Error: prices unavailable"
    );
    assert_eq!(err.data.unwrap()["status"], 500);
}

#[tokio::test]
async fn generate_key_persists_once() {
    let dir = tempdir().unwrap();
    let config = Config {
        key_store_path: dir.path().join("config.json"),
        key_store_format: KeyStoreFormat::JsonConfig,
        ..config_for("http://127.0.0.1:9", None)
    };
    let registry = build_registry(config);

    let first = call_json(&registry, "generate_key", json!({})).await.unwrap();
    let second = call_json(&registry, "generate_key", json!({})).await.unwrap();

    assert_eq!(first["persisted"], true);
    assert_eq!(first["source"], "generated");
    assert_eq!(second["persisted"], false);
    assert_eq!(second["source"], "stored");
    assert_eq!(first["publicKey"], second["publicKey"]);
    assert!(second["npub"].as_str().unwrap().starts_with("npub1"));
    assert!(first.get("privateKey").is_none());
}

#[tokio::test]
async fn generate_key_returns_configured_identity() {
    let dir = tempdir().unwrap();
    let config = Config {
        key_store_path: dir.path().join(".env"),
        key_store_format: KeyStoreFormat::EnvFile,
        ..config_for("http://127.0.0.1:9", Some(KEY))
    };
    let registry = build_registry(config);

    let result = call_json(&registry, "generate_key", json!({})).await.unwrap();

    assert_eq!(result["publicKey"], PUBKEY);
    assert_eq!(result["source"], "configured");
    assert_eq!(result["persisted"], false);
    assert!(!dir.path().join(".env").exists());
}

#[tokio::test]
async fn live_mode_is_rejected_when_live_trading_is_off() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/api/agents")
        .expect(0)
        .create_async()
        .await;

    let mut config = config_for(&server.url(), Some(KEY));
    config.capabilities.live_trading = false;
    let err = build_registry(config)
        .call(
            "t",
            "create_agent",
            json!({"name": "A", "initialCapital": 100, "mode": "live"}),
        )
        .await
        .unwrap_err();

    mock.assert_async().await;
    assert!(matches!(err, ToolError::InvalidParams(_)));
}
