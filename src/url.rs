// Ways of handing a URL to the user
use crate::error::{Result, SsoError};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::process::{Command, Stdio};

/// How to open a URL (AWS console sign-in links)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase", try_from = "RawUrlAction")]
pub enum UrlAction {
    /// Copy to the clipboard
    Clip,
    /// Open in the default browser
    #[default]
    Open,
    /// Open with a specific browser binary
    Browser { path: String },
    /// Run a command; every `%s` argument is replaced with the URL
    Exec { command: Vec<String> },
    /// Print to stderr
    Print,
}

#[derive(Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
enum RawUrlAction {
    Clip,
    Open,
    Browser { path: String },
    Exec { command: Vec<String> },
    Print,
}

impl TryFrom<RawUrlAction> for UrlAction {
    type Error = SsoError;

    fn try_from(raw: RawUrlAction) -> Result<Self> {
        match raw {
            RawUrlAction::Clip => Ok(UrlAction::Clip),
            RawUrlAction::Open => Ok(UrlAction::Open),
            RawUrlAction::Print => Ok(UrlAction::Print),
            RawUrlAction::Browser { path } => {
                if path.trim().is_empty() {
                    return Err(SsoError::UrlAction(
                        "browser action needs a non-empty path".to_string(),
                    ));
                }
                Ok(UrlAction::Browser { path })
            }
            RawUrlAction::Exec { command } => {
                match command.first() {
                    Some(program) if !program.trim().is_empty() => {}
                    _ => {
                        return Err(SsoError::UrlAction(
                            "exec action needs a command with a program".to_string(),
                        ))
                    }
                }
                Ok(UrlAction::Exec { command })
            }
        }
    }
}

/// Build the program and arguments for an exec template
fn exec_args(command: &[String], url: &str) -> Option<(String, Vec<String>)> {
    let mut parts = command.iter().map(|part| part.replace("%s", url));
    let program = parts.next()?;
    Some((program, parts.collect()))
}

fn default_clipboard_command() -> Vec<String> {
    if cfg!(target_os = "macos") {
        vec!["pbcopy".to_string()]
    } else if cfg!(windows) {
        vec!["clip".to_string()]
    } else {
        vec![
            "xclip".to_string(),
            "-selection".to_string(),
            "clipboard".to_string(),
        ]
    }
}

impl UrlAction {
    pub fn open(&self, url: &str, clipboard_command: Option<&[String]>) -> Result<()> {
        match self {
            UrlAction::Clip => {
                let command = clipboard_command
                    .map(<[String]>::to_vec)
                    .unwrap_or_else(default_clipboard_command);
                let (program, args) = exec_args(&command, url).ok_or_else(|| {
                    SsoError::UrlAction("clipboard command is empty".to_string())
                })?;

                let mut child = Command::new(&program)
                    .args(&args)
                    .stdin(Stdio::piped())
                    .spawn()
                    .map_err(|e| {
                        SsoError::UrlAction(format!("Unable to run {}: {}", program, e))
                    })?;
                if let Some(mut stdin) = child.stdin.take() {
                    stdin.write_all(url.as_bytes())?;
                }
                child.wait()?;
                tracing::info!("Please open URL copied to clipboard");
            }
            UrlAction::Open => {
                webbrowser::open(url)
                    .map_err(|e| SsoError::BrowserLaunchFailed(format!("{}", e)))?;
                tracing::info!("Opening URL in default browser");
            }
            UrlAction::Browser { path } => {
                Command::new(path)
                    .arg(url)
                    .spawn()
                    .map_err(|e| SsoError::BrowserLaunchFailed(format!("{}: {}", path, e)))?;
                tracing::info!("Opening URL in {}", path);
            }
            UrlAction::Exec { command } => {
                let (program, args) = exec_args(command, url)
                    .ok_or_else(|| SsoError::UrlAction("exec command is empty".to_string()))?;
                tracing::debug!("exec command as array: {} {}", program, args.join(" "));
                Command::new(&program).args(&args).spawn().map_err(|e| {
                    SsoError::UrlAction(format!("Unable to exec `{}`: {}", program, e))
                })?;
            }
            UrlAction::Print => {
                eprintln!("{}", url);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize)]
    struct Wrapper {
        url_action: UrlAction,
    }

    fn parse(s: &str) -> std::result::Result<UrlAction, toml::de::Error> {
        toml::from_str::<Wrapper>(s).map(|w| w.url_action)
    }

    #[test]
    fn test_parse_variants() {
        assert_eq!(parse("url_action = { action = \"clip\" }").unwrap(), UrlAction::Clip);
        assert_eq!(parse("url_action = { action = \"print\" }").unwrap(), UrlAction::Print);
        assert_eq!(
            parse("url_action = { action = \"browser\", path = \"/usr/bin/firefox\" }").unwrap(),
            UrlAction::Browser {
                path: "/usr/bin/firefox".to_string()
            }
        );
        assert!(matches!(
            parse("url_action = { action = \"exec\", command = [\"open\", \"-a\", \"Safari\", \"%s\"] }")
                .unwrap(),
            UrlAction::Exec { .. }
        ));
    }

    #[test]
    fn test_rejects_bad_shapes() {
        assert!(parse("url_action = { action = \"exec\", command = [] }").is_err());
        assert!(parse("url_action = { action = \"browser\", path = \" \" }").is_err());
        assert!(parse("url_action = { action = \"teleport\" }").is_err());
        assert!(parse("url_action = [\"firefox\", \"%s\"]").is_err());
    }

    #[test]
    fn test_exec_args_substitutes_url() {
        let command = vec![
            "firefox".to_string(),
            "--new-tab".to_string(),
            "ext+container:url=%s".to_string(),
        ];
        let (program, args) = exec_args(&command, "https://example.com").unwrap();
        assert_eq!(program, "firefox");
        assert_eq!(args, vec!["--new-tab", "ext+container:url=https://example.com"]);
        assert!(exec_args(&[], "https://example.com").is_none());
    }
}
