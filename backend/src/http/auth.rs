//! Operator authorization and login to the VOC application.

use reqwest::Client;

use crate::api::logs::{log_info, log_success, log_warning};
use crate::config::RemoteSettings;
use crate::directory::{find_operator, AuthMember};
use crate::error::{HttpError, HttpResult};

/// Text that only appears on the login page.
pub const LOGIN_MARKER: &str = "로그인";

const SNIPPET_CHARS: usize = 200;

/// Make sure `login_id` may register VOCs.
///
/// An empty member list means the source cannot tell, so the check is
/// skipped with a warning.
pub fn check_operator(login_id: &str, members: &[AuthMember]) -> HttpResult<()> {
    if members.is_empty() {
        log_warning("No authorized member list available, skipping operator check");
        return Ok(());
    }

    match find_operator(login_id, members) {
        Some(member) => {
            log_success(format!("Operator {} authorized ({})", member.member_id, member.auth));
            Ok(())
        }
        None => Err(HttpError::Unauthorized(login_id.to_string())),
    }
}

/// Logs in with a session client and opens the VOC page.
pub struct AuthService<'a> {
    client: &'a Client,
    remote: &'a RemoteSettings,
}

impl<'a> AuthService<'a> {
    pub fn new(client: &'a Client, remote: &'a RemoteSettings) -> Self {
        Self { client, remote }
    }

    /// Post the login form, then load the VOC page with the same cookies.
    pub async fn login_and_fetch_voc_page(&self) -> HttpResult<()> {
        log_info(format!("Logging in at {}", self.remote.login_url));
        let form = [
            ("swpid", self.remote.login_id.as_str()),
            ("password", self.remote.login_password.as_str()),
            ("loginType", self.remote.login_type.as_str()),
        ];
        let response = self.client.post(&self.remote.login_url).form(&form).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() || body.contains(LOGIN_MARKER) {
            return Err(HttpError::LoginRejected {
                status: status.as_u16(),
                snippet: snippet(&body),
            });
        }
        log_success("Logged in");

        let response = self.client.get(&self.remote.voc_url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(HttpError::PageUnavailable {
                status: status.as_u16(),
                snippet: snippet(&body),
            });
        }
        log_success("VOC page loaded");
        Ok(())
    }
}

pub(crate) fn snippet(body: &str) -> String {
    body.chars().take(SNIPPET_CHARS).collect()
}
