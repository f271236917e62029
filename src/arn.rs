// IAM role ARN and account id codec
use crate::error::{Result, SsoError};

/// Parse a role ARN in long (`arn:aws:iam::<id>:role/<name>`) or
/// short (`<id>:<name>`) form into its account id and role name
pub fn parse_role_arn(arn: &str) -> Result<(u64, String)> {
    let parts: Vec<&str> = arn.split(':').collect();

    let (account, role) = match parts.len() {
        2 => (parts[0], parts[1]),
        6 => {
            let path: Vec<&str> = parts[5].split('/').collect();
            if path.len() != 2 || path[0] != "role" {
                return Err(SsoError::MalformedIdentifier(format!(
                    "Unable to parse ARN: {}",
                    arn
                )));
            }
            (parts[4], path[1])
        }
        _ => {
            return Err(SsoError::MalformedIdentifier(format!(
                "Unable to parse ARN: {}",
                arn
            )))
        }
    };

    if role.is_empty() || role.contains('/') {
        return Err(SsoError::MalformedIdentifier(format!(
            "Invalid role name in ARN: {}",
            arn
        )));
    }

    let account_id = parse_account_id(account)?;
    Ok((account_id, role.to_string()))
}

/// Build the canonical long-form role ARN
pub fn make_role_arn(account_id: u64, role_name: &str) -> String {
    format!(
        "arn:aws:iam::{}:role/{}",
        account_id_to_string(account_id),
        role_name
    )
}

/// AWS account ids are always rendered as 12 zero-padded digits
pub fn account_id_to_string(account_id: u64) -> String {
    format!("{:012}", account_id)
}

/// Parse a base-10 account id, rejecting signs and non-digits
pub fn parse_account_id(account_id: &str) -> Result<u64> {
    if account_id.is_empty() || !account_id.bytes().all(|b| b.is_ascii_digit()) {
        return Err(SsoError::MalformedIdentifier(format!(
            "Invalid AWS AccountId: {}",
            account_id
        )));
    }

    account_id.parse::<u64>().map_err(|e| {
        SsoError::MalformedIdentifier(format!("Invalid AWS AccountId {}: {}", account_id, e))
    })
}
