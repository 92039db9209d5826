//! Parameter extraction for the session-import flow.
//!
//! The account page embeds its OAuth bootstrap state as a JSON blob in an
//! inline script, with hidden form inputs as a legacy fallback. This is
//! scraping against an external vendor page: the patterns here mirror the
//! page shape as of the last time it was checked, nothing more.

use regex::Regex;
use crate::error::ImportError;

#[derive(Debug, Clone, PartialEq)]
pub struct OauthParams {
    pub code: String,
    pub tenant_url: Option<String>,
}

/// Markers that the upstream served its login form instead of the account
/// page, i.e. the supplied cookie is no longer authenticated.
pub fn looks_like_login_page(html: &str) -> bool {
    html.contains(r#"action="/login""#) || html.contains(r#"name="login-form""#)
}

pub fn extract_oauth_params(html: &str) -> Result<OauthParams, ImportError> {
    let code = extract_code(html).ok_or(ImportError::ParamsMissing("code"))?;
    let tenant_url = extract_tenant_url(html);

    Ok(OauthParams { code, tenant_url })
}

fn extract_code(html: &str) -> Option<String> {
    // Primary: the bootstrap state blob.
    let state_re = Regex::new(r#""code"\s*:\s*"([A-Za-z0-9._~-]+)""#).unwrap();
    if let Some(caps) = state_re.captures(html) {
        return Some(caps[1].to_string());
    }

    // Fallback: hidden form input.
    let input_re =
        Regex::new(r#"<input[^>]*name="code"[^>]*value="([A-Za-z0-9._~-]+)""#).unwrap();
    input_re.captures(html).map(|caps| caps[1].to_string())
}

fn extract_tenant_url(html: &str) -> Option<String> {
    let state_re = Regex::new(r#""tenant_url"\s*:\s*"(https:[^"]+)""#).unwrap();
    if let Some(caps) = state_re.captures(html) {
        return Some(caps[1].to_string());
    }

    let attr_re = Regex::new(r#"data-tenant-url="(https:[^"]+)""#).unwrap();
    attr_re.captures(html).map(|caps| caps[1].to_string())
}

/// Cookie header candidates for the metadata fetch, tried in order. Browsers
/// hand users the session value in several shapes (bare value, full
/// `name=value` pair, percent-encoded copy), and the portal only accepts a
/// well-formed pair.
pub fn cookie_candidates(raw: &str) -> Vec<String> {
    let raw = raw.trim();
    let mut candidates = vec![raw.to_string()];

    if !raw.contains('=') {
        candidates.push(format!("_session={}", raw));

        if raw.contains('%') {
            if let Some(decoded) = urlencoding::decode(raw).ok().map(|cow| cow.into_owned()) {
                if decoded != raw {
                    candidates.push(format!("_session={}", decoded));
                }
            }
        }
    }

    candidates
}
