//! Guard-tier webhook notifier
//!
//! Membership purchases can trigger an outbound HTTP POST per tier, for
//! operators who wire celebrations into external automation. Each tier has
//! its own optional URL; an unconfigured tier is skipped. Delivery is
//! best-effort: failures are logged, never retried, and never surface to
//! the dispatch loop.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use castlink_common::config::WebhooksConfig;
use castlink_common::model::GuardTier;

pub struct WebhookNotifier {
    urls: WebhooksConfig,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct MembershipNotification<'a> {
    tier: &'a str,
    sender_id: &'a str,
    periods: u32,
    value: f64,
    timestamp: DateTime<Utc>,
}

impl WebhookNotifier {
    pub fn new(config: &WebhooksConfig) -> Self {
        Self {
            urls: config.clone(),
            client: reqwest::Client::new(),
        }
    }

    fn url_for(&self, tier: GuardTier) -> Option<&str> {
        match tier {
            GuardTier::Captain => self.urls.captain.as_deref(),
            GuardTier::Admiral => self.urls.admiral.as_deref(),
            GuardTier::Governor => self.urls.governor.as_deref(),
        }
    }

    /// Post a membership notification to the tier's URL, if one is
    /// configured. Returns whether a request was attempted.
    pub async fn notify_membership(
        &self,
        tier: GuardTier,
        sender_id: &str,
        periods: u32,
        value: f64,
        timestamp: DateTime<Utc>,
    ) -> bool {
        let url = match self.url_for(tier) {
            Some(url) => url,
            None => {
                debug!("no webhook configured for tier {tier}, skipping");
                return false;
            }
        };

        let body = MembershipNotification {
            tier: tier.as_str(),
            sender_id,
            periods,
            value,
            timestamp,
        };
        match self.client.post(url).json(&body).send().await {
            Ok(response) => {
                if let Err(e) = response.error_for_status() {
                    warn!("webhook for tier {tier} rejected: {e}");
                }
            }
            Err(e) => {
                warn!("webhook for tier {tier} failed: {e}");
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::{Json, Router};
    use std::time::Duration;
    use tokio::sync::mpsc;
    use tokio::time::timeout;

    async fn capture_server() -> (std::net::SocketAddr, mpsc::Receiver<serde_json::Value>) {
        let (tx, rx) = mpsc::channel(8);
        let app = Router::new().route(
            "/hook",
            post(move |Json(body): Json<serde_json::Value>| {
                let tx = tx.clone();
                async move {
                    let _ = tx.send(body).await;
                    StatusCode::OK
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (addr, rx)
    }

    #[tokio::test]
    async fn test_membership_posts_to_tier_url() {
        let (addr, mut rx) = capture_server().await;
        let notifier = WebhookNotifier::new(&WebhooksConfig {
            captain: Some(format!("http://{addr}/hook")),
            ..WebhooksConfig::default()
        });

        let sent = notifier
            .notify_membership(GuardTier::Captain, "大哥", 1, 138.0, Utc::now())
            .await;
        assert!(sent);

        let body = timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("webhook never arrived")
            .unwrap();
        assert_eq!(body["tier"], "captain");
        assert_eq!(body["sender_id"], "大哥");
        assert_eq!(body["periods"], 1);
        assert_eq!(body["value"], 138.0);
    }

    #[tokio::test]
    async fn test_unconfigured_tier_is_skipped() {
        let (addr, mut rx) = capture_server().await;
        let notifier = WebhookNotifier::new(&WebhooksConfig {
            captain: Some(format!("http://{addr}/hook")),
            ..WebhooksConfig::default()
        });

        let sent = notifier
            .notify_membership(GuardTier::Governor, "大哥", 1, 19998.0, Utc::now())
            .await;
        assert!(!sent);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_unreachable_url_does_not_error() {
        // delivery is best-effort; a dead endpoint only logs
        let notifier = WebhookNotifier::new(&WebhooksConfig {
            admiral: Some("http://127.0.0.1:1/hook".to_string()),
            ..WebhooksConfig::default()
        });
        let sent = notifier
            .notify_membership(GuardTier::Admiral, "bob", 1, 1998.0, Utc::now())
            .await;
        assert!(sent);
    }
}
