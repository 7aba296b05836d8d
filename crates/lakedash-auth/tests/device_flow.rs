//! End-to-end device-code flow against a local stub provider.

#![allow(clippy::unwrap_used, clippy::panic)]

use lakedash_auth::{AuthError, Authority, DEFAULT_PUBLIC_CLIENT_ID, DeviceCodeFlow};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Serve one canned JSON body per incoming connection, in order.
async fn serve_responses(listener: TcpListener, bodies: Vec<String>) {
    for body in bodies {
        let Ok((mut stream, _)) = listener.accept().await else {
            return;
        };
        // Drain the request (headers plus form body) before answering.
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let Ok(n) = stream.read(&mut chunk).await else {
                return;
            };
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
            if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                let headers = String::from_utf8_lossy(&buf[..pos]).to_lowercase();
                let content_length = headers
                    .lines()
                    .find_map(|l| l.strip_prefix("content-length:"))
                    .and_then(|v| v.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if buf.len() >= pos + 4 + content_length {
                    break;
                }
            }
        }
        let response = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            body.len(),
            body
        );
        let _ = stream.write_all(response.as_bytes()).await;
        let _ = stream.shutdown().await;
    }
}

#[tokio::test]
async fn device_flow_surfaces_prompt_then_yields_token() {
    let listener = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());

    let device_body = r#"{
        "user_code": "CODE1234",
        "device_code": "dev-code-opaque",
        "verification_uri": "https://microsoft.com/devicelogin",
        "expires_in": 900,
        "interval": 0
    }"#
    .to_string();
    let token_body =
        r#"{"token_type":"Bearer","expires_in":3599,"access_token":"stub-jwt"}"#.to_string();
    let server = tokio::spawn(serve_responses(listener, vec![device_body, token_body]));

    let authority = Authority::with_base(&base, "stub-tenant").unwrap();
    let flow = DeviceCodeFlow::new(authority, DEFAULT_PUBLIC_CLIENT_ID);

    let pending = flow.begin().await.unwrap();
    assert_eq!(pending.prompt().user_code, "CODE1234");
    assert_eq!(
        pending.prompt().verification_uri,
        "https://microsoft.com/devicelogin"
    );

    let token = pending.wait().await.unwrap();
    assert_eq!(token.secret(), "stub-jwt");
    server.await.unwrap();
}

#[tokio::test]
async fn device_flow_fails_fast_without_user_code() {
    let listener = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());

    let error_body =
        r#"{"error":"invalid_scope","error_description":"AADSTS70011"}"#.to_string();
    let server = tokio::spawn(serve_responses(listener, vec![error_body]));

    let authority = Authority::with_base(&base, "stub-tenant").unwrap();
    let flow = DeviceCodeFlow::new(authority, DEFAULT_PUBLIC_CLIENT_ID);

    match flow.begin().await {
        Err(AuthError::ProviderResponse { raw }) => assert!(raw.contains("AADSTS70011")),
        other => panic!("expected immediate provider error, got {other:?}"),
    }
    server.await.unwrap();
}
