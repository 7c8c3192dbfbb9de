use std::path::Path;

use anyhow::Result;
use calcagent_core::config::{api_key_from_env, find_dotenv, load_dotenv, API_KEY_VARS};

/// `--check-key`: locate `.env`, then describe the API key without printing it.
pub fn check_key() -> Result<()> {
    let dotenv = find_dotenv(&std::env::current_dir()?);
    if let Some(path) = &dotenv {
        load_dotenv(path);
    }

    for line in key_report(dotenv.as_deref(), api_key_from_env().as_deref()) {
        println!("{line}");
    }
    Ok(())
}

fn key_report(dotenv: Option<&Path>, key: Option<&str>) -> Vec<String> {
    let mut out = vec!["--- API key check ---".to_string()];

    match dotenv {
        Some(p) => out.push(format!("✅ .env found: {}", p.display())),
        None => out.push("❌ .env not found (cwd or any parent)".to_string()),
    }

    match key {
        None => out.push(format!(
            "❌ {} is empty or unset ({} also checked)",
            API_KEY_VARS[0], API_KEY_VARS[1]
        )),
        Some(key) => {
            let chars = key.chars().collect::<Vec<_>>();
            out.push(format!("✅ Key read, length {} characters", chars.len()));
            if chars.len() > 8 {
                let head = chars[..4].iter().collect::<String>();
                let tail = chars[chars.len() - 4..].iter().collect::<String>();
                out.push(format!("👀 Starts with: {head}****"));
                out.push(format!("👀 Ends with: ****{tail}"));
            }
            if key.chars().any(char::is_whitespace) {
                out.push("⚠️ The key contains whitespace; remove it".to_string());
            } else {
                out.push("✅ No whitespace in the key".to_string());
            }
        }
    }

    out.push("---------------------".to_string());
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_missing_key_and_dotenv() {
        let report = key_report(None, None);
        assert!(report.iter().any(|l| l.contains(".env not found")));
        assert!(report.iter().any(|l| l.contains("GOOGLE_API_KEY is empty")));
    }

    #[test]
    fn masks_key_and_flags_whitespace() {
        let report = key_report(Some(Path::new("/srv/app/.env")), Some("AIzaSy123 456789xyz"));
        let text = report.join("\n");
        assert!(text.contains("/srv/app/.env"));
        assert!(text.contains("length 19"));
        assert!(text.contains("AIza****"));
        assert!(text.contains("****9xyz"));
        assert!(text.contains("contains whitespace"));
        assert!(!text.contains("AIzaSy123"));
    }
}
