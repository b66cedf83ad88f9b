use anyhow::Result;
use modelctl_core::Config;
use serde::Deserialize;
use serde_json::json;

use crate::client::DaemonClient;

#[derive(Deserialize)]
struct ActionResponse {
    message: String,
}

pub async fn load(model: &str) -> Result<()> {
    let client = DaemonClient::from_config(&Config::load()?)?;

    println!("Loading model: {}", model);
    let response: ActionResponse = client
        .post("/models/load", &json!({ "model_id": model }))
        .await?;
    println!("{}", response.message);

    Ok(())
}

pub async fn unload(model: &str) -> Result<()> {
    let client = DaemonClient::from_config(&Config::load()?)?;

    let response: ActionResponse = client
        .post("/models/unload", &json!({ "model_id": model }))
        .await?;
    println!("{}", response.message);

    Ok(())
}
