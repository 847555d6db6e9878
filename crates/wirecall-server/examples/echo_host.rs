//! Minimal host + client wired over an in-memory stream pair.
//!
//! Run with: cargo run --example echo_host

use serde_json::{json, Value};
use tokio::io::{duplex, split};
use wirecall_client::{ClientOptions, RpcClient};
use wirecall_server::prelude::*;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let (client_stream, host_stream) = duplex(64 * 1024);

    let echo = ServiceDescriptor::new("echo-service").method(
        MethodSignature::new("echo").required("text", ParamKind::String),
        |_, call| Box::pin(async move { Ok(call.args.into_iter().next().unwrap_or(Value::Null)) }),
    );

    let (host_rx, host_tx) = split(host_stream);
    let host = RpcHostBuilder::new()
        .register(echo)
        .session(Session::new(String::from("demo")))
        .build(host_rx, host_tx)?;

    let (client_rx, client_tx) = split(client_stream);
    let client = RpcClient::connect(client_rx, client_tx, ClientOptions::default());

    let result = client
        .send_request("echo", Some(RequestParams::Array(vec![json!("hello, wire")])))
        .await?;
    println!("echo returned: {result}");

    client.shutdown().await;
    host.stop().await;
    Ok(())
}
