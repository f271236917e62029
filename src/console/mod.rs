// AWS Console federation sign-in URLs
use crate::error::{Result, SsoError};
use crate::models::RoleCredentials;
use serde::Deserialize;
use serde_json::json;

const FEDERATION_URL: &str = "https://signin.aws.amazon.com/federation";
const DEFAULT_CONSOLE_REGION: &str = "us-east-1";
/// Maximum console session for federated users
const SESSION_DURATION_SECS: u32 = 43200;

#[derive(Deserialize)]
struct SigninTokenResponse {
    #[serde(rename = "SigninToken")]
    signin_token: String,
}

fn signin_token_url(creds: &RoleCredentials) -> String {
    let session = json!({
        "sessionId": creds.access_key_id,
        "sessionKey": creds.secret_access_key,
        "sessionToken": creds.session_token,
    })
    .to_string();

    format!(
        "{}?Action=getSigninToken&SessionDuration={}&Session={}",
        FEDERATION_URL,
        SESSION_DURATION_SECS,
        urlencoding::encode(&session)
    )
}

fn login_url(signin_token: &str, region: Option<&str>, issuer: &str) -> String {
    let destination = format!(
        "https://console.aws.amazon.com/console/home?region={}",
        region.unwrap_or(DEFAULT_CONSOLE_REGION)
    );
    format!(
        "{}?Action=login&Issuer={}&Destination={}&SigninToken={}",
        FEDERATION_URL,
        urlencoding::encode(issuer),
        urlencoding::encode(&destination),
        urlencoding::encode(signin_token)
    )
}

/// Exchange temporary credentials for a console sign-in URL
pub async fn generate_console_url(
    creds: &RoleCredentials,
    region: Option<&str>,
    issuer: &str,
) -> Result<String> {
    tracing::debug!("Requesting sign-in token from AWS federation endpoint");
    let response = reqwest::get(signin_token_url(creds))
        .await
        .map_err(|e| SsoError::AwsSdk(format!("Failed to get sign-in token: {}", e)))?
        .error_for_status()
        .map_err(|e| SsoError::AwsSdk(format!("Federation endpoint refused: {}", e)))?;

    let token: SigninTokenResponse = response
        .json()
        .await
        .map_err(|e| SsoError::AwsSdk(format!("Failed to parse token response: {}", e)))?;

    Ok(login_url(&token.signin_token, region, issuer))
}
