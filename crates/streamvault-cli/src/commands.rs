use std::io::{self, Write};
use std::path::Path;

use anyhow::{bail, Context, Result};
use streamvault_core::{ApiRequest, Config, FileUpload, Keychain, SessionClient};
use tracing::warn;

/// Interactive login, reusing the remembered username and password when
/// the keychain has them.
pub async fn login(client: &SessionClient, config: &mut Config, args: &[String]) -> Result<()> {
    let remember = args.iter().any(|a| a == "--remember");
    let named = args.iter().find(|a| !a.starts_with("--")).cloned();

    let username = match named {
        Some(username) => username,
        None => match config.last_username.clone() {
            Some(last_user) => {
                let input = prompt(&format!("Username [{}]: ", last_user))?;
                if input.is_empty() {
                    last_user
                } else {
                    input
                }
            }
            None => prompt("Username: ")?,
        },
    };
    if username.is_empty() {
        bail!("Username required");
    }

    let password = if Keychain::has_password(&username) {
        let input = prompt("Use stored password? [Y/n]: ")?;
        if input.to_lowercase() != "n" {
            Keychain::get_password(&username)?
        } else {
            prompt_password()?
        }
    } else {
        prompt_password()?
    };

    let user = client.store().login(&username, &password).await?;

    if remember {
        if let Err(e) = Keychain::store(&username, &password) {
            warn!(error = %e, "Failed to remember password");
        }
    }
    config.last_username = Some(username);
    config.save()?;

    println!("Signed in as {}", user.display_name());
    Ok(())
}

pub async fn signup(client: &SessionClient, args: &[String]) -> Result<()> {
    let [username, email] = args else {
        bail!("Usage: streamvault signup <username> <email>");
    };
    let password = prompt_password()?;
    let confirm = rpassword::prompt_password("Confirm password: ")?;
    if password != confirm {
        bail!("Passwords do not match");
    }
    client.store().sign_up(username, email, &password).await?;
    Ok(())
}

pub async fn logout(client: &SessionClient, config: &Config, args: &[String]) -> Result<()> {
    if args.iter().any(|a| a == "--forget") {
        if let Some(ref username) = config.last_username {
            Keychain::forget(username)?;
        }
    }
    client.store().logout().await?;
    println!("Signed out");
    Ok(())
}

pub async fn whoami(client: &SessionClient) -> Result<()> {
    match client.store().check_auth().await {
        Some(user) => println!("{}", serde_json::to_string_pretty(&user)?),
        None => println!("Not signed in"),
    }
    Ok(())
}

pub async fn admin(client: &SessionClient) -> Result<()> {
    client.store().check_auth().await;
    if client.store().is_admin().await {
        println!("yes");
    } else {
        println!("no");
    }
    Ok(())
}

pub async fn refresh(client: &SessionClient) -> Result<()> {
    client.store().refresh_token().await?;
    println!("Token refreshed");
    Ok(())
}

pub async fn get(client: &SessionClient, args: &[String]) -> Result<()> {
    let [path] = args else {
        bail!("Usage: streamvault get <path>");
    };
    let response = client.send(ApiRequest::get(path.as_str())).await?;
    print_body(&response.body)
}

pub async fn post(client: &SessionClient, args: &[String]) -> Result<()> {
    let (path, body) = match args {
        [path] => (path, serde_json::json!({})),
        [path, json] => (
            path,
            serde_json::from_str(json).context("Request body is not valid JSON")?,
        ),
        _ => bail!("Usage: streamvault post <path> [json]"),
    };
    let response = client.send(ApiRequest::post(path.as_str()).json(&body)?).await?;
    print_body(&response.body)
}

pub async fn avatar(client: &SessionClient, args: &[String]) -> Result<()> {
    let [url] = args else {
        bail!("Usage: streamvault avatar <url>");
    };
    client.update_avatar_url(url).await?;
    Ok(())
}

/// Upload an avatar image, then show the avatar the backend now reports.
pub async fn profile(client: &SessionClient, args: &[String]) -> Result<()> {
    let [file] = args else {
        bail!("Usage: streamvault profile <image-file>");
    };
    let path = Path::new(file);
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read {}", file))?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "avatar".to_string());

    client
        .update_profile(FileUpload {
            field: "file".to_string(),
            mime_type: image_mime_type(path).map(str::to_string),
            file_name,
            bytes,
        })
        .await?;

    let id = client.store().current_user().await.and_then(|u| u.id);
    if let Some(id) = id {
        let user = client.fetch_user(id).await?;
        if let Some(avatar_url) = user.avatar_url {
            println!("{}", avatar_url);
        }
    }
    Ok(())
}

fn image_mime_type(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}

fn print_body(body: &str) -> Result<()> {
    if body.trim().is_empty() {
        return Ok(());
    }
    match serde_json::from_str::<serde_json::Value>(body) {
        Ok(value) => println!("{}", serde_json::to_string_pretty(&value)?),
        Err(_) => println!("{}", body),
    }
    Ok(())
}

fn prompt(label: &str) -> Result<String> {
    print!("{}", label);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}

fn prompt_password() -> Result<String> {
    let password = rpassword::prompt_password("Password: ")?;
    Ok(password)
}
