//! Thin HTTP client for CLI commands that talk to a running daemon.

use serde_json::Value;

use bc_domain::config::Config;

pub struct DaemonClient {
    base_url: String,
    http: reqwest::Client,
}

impl DaemonClient {
    pub fn from_config(config: &Config) -> Self {
        let base_url = config
            .daemon
            .attach_url
            .clone()
            .unwrap_or_else(|| format!("http://{}:{}", config.daemon.host, config.daemon.port));
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        }
    }

    /// Send a prompt, creating a session first when none is given. Prints
    /// the assistant output.
    pub async fn run(
        &self,
        prompt: &str,
        session: Option<String>,
        model: Option<String>,
    ) -> anyhow::Result<()> {
        let session_id = match session {
            Some(id) => id,
            None => {
                let created = self.post("/v1/sessions", serde_json::json!({})).await?;
                created["sessionId"]
                    .as_str()
                    .ok_or_else(|| anyhow::anyhow!("daemon returned no session id"))?
                    .to_string()
            }
        };

        let mut body = serde_json::json!({ "prompt": prompt });
        if let Some(model) = model {
            body["modelId"] = Value::String(model);
        }

        let response = self
            .post(&format!("/v1/sessions/{session_id}/prompt"), body)
            .await?;
        println!("{}", response["output"].as_str().unwrap_or_default());
        Ok(())
    }

    /// Print a session's event log, one event per line.
    pub async fn events(&self, session_id: &str) -> anyhow::Result<()> {
        let events = self.get(&format!("/v1/sessions/{session_id}/events")).await?;
        for event in events.as_array().into_iter().flatten() {
            println!(
                "{} {:<20} {}",
                event["createdAt"],
                event["kind"].as_str().unwrap_or("?"),
                event["payload"]
            );
        }
        Ok(())
    }

    pub async fn status(&self) -> anyhow::Result<()> {
        let status = self.get("/v1/status").await?;
        println!("{}", serde_json::to_string_pretty(&status)?);
        Ok(())
    }

    pub async fn logs(&self, lines: usize) -> anyhow::Result<()> {
        let logs = self.get(&format!("/v1/logs?lines={lines}")).await?;
        for line in logs["lines"].as_array().into_iter().flatten() {
            println!("{}", line.as_str().unwrap_or_default());
        }
        Ok(())
    }

    pub async fn sessions(&self) -> anyhow::Result<()> {
        let listing = self.get("/v1/sessions").await?;
        for session in listing["sessions"].as_array().into_iter().flatten() {
            println!(
                "{}  events={:<5} name={}",
                session["id"].as_str().unwrap_or("?"),
                session["eventCount"],
                session["name"].as_str().unwrap_or("-"),
            );
        }
        Ok(())
    }

    async fn get(&self, path: &str) -> anyhow::Result<Value> {
        let response = self
            .http
            .get(format!("{}{path}", self.base_url))
            .send()
            .await
            .map_err(connection_hint)?;
        Self::decode(response).await
    }

    async fn post(&self, path: &str, body: Value) -> anyhow::Result<Value> {
        let response = self
            .http
            .post(format!("{}{path}", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(connection_hint)?;
        Self::decode(response).await
    }

    async fn decode(response: reqwest::Response) -> anyhow::Result<Value> {
        let status = response.status();
        let value: Value = response.json().await.unwrap_or(Value::Null);
        if !status.is_success() {
            let message = value["error"].as_str().unwrap_or("request failed");
            anyhow::bail!("daemon returned {status}: {message}");
        }
        Ok(value)
    }
}

fn connection_hint(e: reqwest::Error) -> anyhow::Error {
    anyhow::anyhow!("{e}; is the daemon running? start it with `blah-code serve`")
}
