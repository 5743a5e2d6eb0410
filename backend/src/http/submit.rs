//! Posting form records to the VOC application.

use reqwest::Client;
use serde::Serialize;

use super::auth::snippet;
use crate::api::logs::{log_error, log_info, log_success, log_warning};
use crate::models::FormRecord;

/// One record the application did not accept.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionFailure {
    /// 1-based position in the submitted list.
    pub record: usize,
    pub requester: String,
    pub status: Option<u16>,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionReport {
    pub total: usize,
    pub succeeded: usize,
    pub failures: Vec<SubmissionFailure>,
}

impl SubmissionReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty() && self.succeeded == self.total
    }
}

/// Post every record once, in order. Failures are collected, never retried.
pub async fn submit_all(client: &Client, url: &str, records: &[FormRecord]) -> SubmissionReport {
    let url = url.trim();
    let mut report = SubmissionReport {
        total: records.len(),
        ..Default::default()
    };

    if records.is_empty() {
        log_warning("No VOC records to submit");
        return report;
    }

    log_info(format!("Submitting {} VOC records to {}", records.len(), url));

    for (i, record) in records.iter().enumerate() {
        let n = i + 1;
        let failure = |status: Option<u16>, message: String| SubmissionFailure {
            record: n,
            requester: record.request_empnm.clone(),
            status,
            message,
        };

        match client.post(url).form(record).send().await {
            Ok(response) if response.status().is_success() => {
                log_success(format!("record {}/{} accepted ({})", n, records.len(), response.status()));
                report.succeeded += 1;
            }
            Ok(response) => {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                log_error(format!("record {}/{} rejected with {}", n, records.len(), status));
                report.failures.push(failure(Some(status.as_u16()), snippet(&body)));
            }
            Err(e) => {
                log_error(format!("record {}/{} not sent: {}", n, records.len(), e));
                report.failures.push(failure(None, e.to_string()));
            }
        }
    }

    if report.failures.is_empty() {
        log_success(format!("All {} VOC records submitted", report.total));
    } else {
        log_warning(format!(
            "{} of {} VOC records submitted, {} failed",
            report.succeeded,
            report.total,
            report.failures.len()
        ));
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::{Form, State};
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::Router;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    type Received = Arc<Mutex<Vec<HashMap<String, String>>>>;

    async fn insert(State(received): State<Received>, Form(form): Form<HashMap<String, String>>) -> StatusCode {
        let rejected = form.get("request_empnm").map(String::as_str) == Some("Lee");
        received.lock().unwrap().push(form);
        if rejected {
            StatusCode::INTERNAL_SERVER_ERROR
        } else {
            StatusCode::OK
        }
    }

    async fn serve(received: Received) -> String {
        let router = Router::new().route("/insert", post(insert)).with_state(received);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}/insert", addr)
    }

    fn record(name: &str) -> FormRecord {
        FormRecord {
            request_empnm: name.into(),
            voc_cd: "30".into(),
            voc_contents: "<p>x</p>".into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_failures_do_not_stop_the_batch() {
        let received: Received = Arc::default();
        let url = serve(received.clone()).await;

        let records = vec![record("Kim"), record("Lee"), record("Park")];
        let report = submit_all(&Client::new(), &format!(" {} ", url), &records).await;

        assert_eq!(report.total, 3);
        assert_eq!(report.succeeded, 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].record, 2);
        assert_eq!(report.failures[0].status, Some(500));
        assert!(!report.is_complete());

        let forms = received.lock().unwrap();
        assert_eq!(forms.len(), 3);
        assert_eq!(forms[0]["voc_cd"], "30");
        assert_eq!(forms[0]["voc_contents"], "<p>x</p>");
        assert_eq!(forms[2]["request_empnm"], "Park");
    }

    #[tokio::test]
    async fn test_unreachable_server_is_reported() {
        let report = submit_all(&Client::new(), "http://127.0.0.1:1/insert", &[record("Kim")]).await;

        assert_eq!(report.succeeded, 0);
        assert_eq!(report.failures[0].status, None);
    }

    #[tokio::test]
    async fn test_nothing_to_submit() {
        let report = submit_all(&Client::new(), "http://127.0.0.1:1/insert", &[]).await;
        assert!(report.is_complete());
    }
}
