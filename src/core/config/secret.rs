use std::path::{Path, PathBuf};
use std::{fs, io};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;

/// Fallback for when SECRET_KEY is not set: a key persisted next to the
/// manifest, minted on first use. Losing it only invalidates issued
/// tokens.
pub(super) fn load_or_create_secret_key() -> String {
    let path = secret_file_path();

    if let Some(existing) = read_key_file(&path) {
        return existing;
    }

    let new_key = generate_secret_key();

    if let Some(parent) = path.parent() {
        if let Err(err) = fs::create_dir_all(parent) {
            tracing::warn!(error = %err, path = %parent.display(), "Cannot create secret key directory");
        }
    }

    match write_key_file(&path, &new_key) {
        Ok(()) => new_key,
        // Lost a race with another process; take whatever it wrote.
        Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
            read_key_file(&path).unwrap_or(new_key)
        }
        Err(err) => {
            tracing::warn!(error = %err, path = %path.display(), "Cannot persist secret key");
            new_key
        }
    }
}

fn read_key_file(path: &Path) -> Option<String> {
    let value = fs::read_to_string(path).ok()?;
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn write_key_file(path: &Path, key: &str) -> io::Result<()> {
    let mut file = fs::OpenOptions::new().write(true).create_new(true).open(path)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;

        if let Err(err) = file.set_permissions(fs::Permissions::from_mode(0o600)) {
            tracing::warn!(error = %err, path = %path.display(), "Cannot restrict secret key permissions");
        }
    }

    io::Write::write_all(&mut file, key.as_bytes())
}

fn generate_secret_key() -> String {
    let mut bytes = [0u8; 64];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

fn secret_file_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join(".secret_key")
}
