//! HTML pages served by the relay.
//!
//! All interpolated values are HTML-escaped to prevent XSS.

use std::fmt::Write as _;

use crate::error::{RelayError, RenderError};
use crate::provider::TokenExchangeResult;
use crate::state::RequesterMeta;

const STYLE: &str = r#"body { font-family: -apple-system, BlinkMacSystemFont, "Segoe UI", Roboto, sans-serif; background: #f5f5f5; margin: 0; display: flex; justify-content: center; align-items: center; min-height: 100vh; }
.card { background: #fff; border-radius: 8px; box-shadow: 0 2px 8px rgba(0,0,0,0.1); padding: 32px; max-width: 520px; width: 100%; }
h1 { font-size: 20px; margin: 0 0 8px; color: #333; }
.subtitle { color: #666; font-size: 14px; margin: 0 0 24px; }
label { display: block; font-size: 14px; font-weight: 500; margin: 12px 0 6px; color: #333; }
input[type="text"] { width: 100%; padding: 10px; border: 1px solid #ddd; border-radius: 4px; font-size: 14px; box-sizing: border-box; }
button { width: 100%; padding: 10px; background: #4a154b; color: #fff; border: none; border-radius: 4px; font-size: 14px; font-weight: 500; cursor: pointer; margin-top: 16px; }
button:hover { background: #611f69; }
.token { font-family: ui-monospace, Menlo, monospace; background: #f0f0f0; border-radius: 4px; padding: 12px; word-break: break-all; }
.warning { background: #fff8e1; border: 1px solid #f0c36d; color: #6b4e00; padding: 10px; border-radius: 4px; margin: 16px 0; font-size: 13px; }
.error { background: #fee; border: 1px solid #c00; color: #c00; padding: 10px; border-radius: 4px; margin-bottom: 16px; }
dl { font-size: 14px; } dt { font-weight: 500; color: #333; } dd { margin: 0 0 8px; color: #555; }"#;

fn page(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width,initial-scale=1">
<meta name="referrer" content="no-referrer">
<title>{title} - Slack Token Relay</title>
<style>
{STYLE}
</style>
</head>
<body>
<div class="card">
{body}
</div>
</body>
</html>"#,
        title = html_escape(title),
    )
}

/// Render the form that starts a flow.
///
/// `action` is the start endpoint path, which carries the `/api` prefix when
/// the form itself was served under it.
#[must_use]
pub fn render_start_page(action: &str) -> String {
    let body = format!(
        r#"<h1>Slack Token Relay</h1>
<p class="subtitle">Authorize with Slack to receive a user token. The token is shown once and never stored.</p>
<form method="GET" action="{action}">
<label for="user_id">Your ID (optional)</label>
<input type="text" id="user_id" name="user_id" maxlength="100">
<label for="user_name">Your name (optional)</label>
<input type="text" id="user_name" name="user_name" maxlength="100">
<button type="submit">Continue with Slack</button>
</form>"#,
        action = html_escape(action),
    );
    page("Start", &body)
}

/// Render the one-time token page.
pub fn render_token_page(
    result: &TokenExchangeResult,
    requester: &RequesterMeta,
) -> Result<String, RenderError> {
    let mut body = String::new();
    writeln!(body, "<h1>Authorization complete</h1>")?;
    if !requester.requester_name.is_empty() {
        writeln!(
            body,
            r#"<p class="subtitle">Requested by {}</p>"#,
            html_escape(&requester.requester_name)
        )?;
    }
    writeln!(
        body,
        r#"<div class="warning">Copy this token now. It is not stored and cannot be shown again.</div>"#
    )?;
    writeln!(
        body,
        r#"<div class="token" id="token">{}</div>"#,
        html_escape(result.access_token.expose())
    )?;
    writeln!(body, r#"<button type="button" id="copy">Copy token</button>"#)?;
    writeln!(body, "<dl>")?;
    writeln!(body, "<dt>User</dt><dd>{} ({})</dd>", html_escape(&result.owner_name), html_escape(&result.owner_id))?;
    writeln!(body, "<dt>Workspace</dt><dd>{}</dd>", html_escape(&result.team_name))?;
    let scopes: Vec<&str> = result.granted_scopes.iter().map(String::as_str).collect();
    writeln!(body, "<dt>Scopes</dt><dd>{}</dd>", html_escape(&scopes.join(", ")))?;
    if !requester.requester_id.is_empty() {
        writeln!(body, "<dt>Request ID</dt><dd>{}</dd>", html_escape(&requester.requester_id))?;
    }
    writeln!(body, "</dl>")?;

    let token_json = script_json(result.access_token.expose())?;
    write!(
        body,
        r#"<script>
document.getElementById("copy").addEventListener("click", function () {{
  navigator.clipboard.writeText({token_json}).then(function () {{
    document.getElementById("copy").textContent = "Copied";
  }});
}});
</script>"#
    )?;

    Ok(page("Token", &body))
}

/// Minimal plain-text disclosure used when the styled page cannot be built.
#[must_use]
pub fn render_plain_token(result: &TokenExchangeResult) -> String {
    let scopes: Vec<&str> = result.granted_scopes.iter().map(String::as_str).collect();
    format!(
        "Slack authorization succeeded.\n\
         Access token: {}\n\
         User: {} ({})\n\
         Workspace: {}\n\
         Scopes: {}\n\
         This token is not stored. Copy it now.\n",
        result.access_token.expose(),
        result.owner_name,
        result.owner_id,
        result.team_name,
        scopes.join(","),
    )
}

/// Render an error page for a failed step.
#[must_use]
pub fn render_error_page(err: &RelayError) -> String {
    let body = format!(
        r#"<h1>{title}</h1>
<div class="error">{message}</div>
<p class="subtitle">Error code: {kind}</p>
<p><a href="/">Start over</a></p>"#,
        title = html_escape(err.title()),
        message = html_escape(&err.to_user_message()),
        kind = err.kind(),
    );
    page(err.title(), &body)
}

/// Encode a string as a JS literal that cannot close its `<script>` element.
fn script_json(value: &str) -> Result<String, RenderError> {
    Ok(serde_json::to_string(value)?.replace('<', "\\u003c").replace('>', "\\u003e"))
}

/// Escape HTML special characters.
fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::error::ExchangeError;
    use crate::provider::AccessToken;

    fn sample_result() -> TokenExchangeResult {
        TokenExchangeResult {
            access_token: AccessToken::new("xoxp-1-2-3"),
            owner_id: "U1".to_string(),
            owner_name: "Test".to_string(),
            team_name: "T".to_string(),
            granted_scopes: BTreeSet::from(["b".to_string(), "a".to_string()]),
        }
    }

    #[test]
    fn test_html_escape() {
        assert_eq!(
            html_escape(r#"<script>alert("xss")</script>"#),
            "&lt;script&gt;alert(&quot;xss&quot;)&lt;/script&gt;"
        );
    }

    #[test]
    fn test_start_page_uses_action() {
        let html = render_start_page("/api/auth/start");
        assert!(html.contains(r#"action="/api/auth/start""#));
        assert!(html.contains(r#"name="user_id""#));
        assert!(html.contains(r#"name="user_name""#));
    }

    #[test]
    fn test_token_page_contents() {
        let requester = RequesterMeta {
            requester_id: "req-9".to_string(),
            requester_name: "Ada".to_string(),
        };
        let html = render_token_page(&sample_result(), &requester).unwrap();
        assert!(html.contains("xoxp-1-2-3"));
        assert!(html.contains("Requested by Ada"));
        assert!(html.contains("a, b"));
        assert!(html.contains("req-9"));
    }

    #[test]
    fn test_script_json_cannot_close_tag() {
        let encoded = script_json("</script><b>").unwrap();
        assert!(!encoded.contains('<'));
        assert!(encoded.starts_with('"'));
    }

    #[test]
    fn test_plain_token_fallback() {
        insta::assert_snapshot!(render_plain_token(&sample_result()), @r"
        Slack authorization succeeded.
        Access token: xoxp-1-2-3
        User: Test (U1)
        Workspace: T
        Scopes: a,b
        This token is not stored. Copy it now.
        ");
    }

    #[test]
    fn test_error_page_escapes_provider_code() {
        let err = RelayError::from(ExchangeError::provider("<bad>"));
        let html = render_error_page(&err);
        assert!(html.contains("&lt;bad&gt;"));
        assert!(html.contains("exchange_error"));
    }
}
