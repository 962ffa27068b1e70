//! OS keyring storage for the movie database API key.

use keyring::Entry;

const API_KEY_SERVICE_NAME: &str = "reelshelf.metadata.api_key";
pub const DEFAULT_KEYRING_USER: &str = "default";

fn api_key_entry(user: &str) -> Result<Entry, String> {
    Entry::new(API_KEY_SERVICE_NAME, user)
        .map_err(|err| format!("failed to create keyring entry: {err}"))
}

/// Saves the API key for `user` into the OS keyring.
pub fn set_api_key(user: &str, api_key: &str) -> Result<(), String> {
    let entry = api_key_entry(user)?;
    entry
        .set_password(api_key)
        .map_err(|err| format!("failed to set keyring password: {err}"))
}

/// Loads the API key for `user`; `None` when nothing is stored.
pub fn get_api_key(user: &str) -> Result<Option<String>, String> {
    let entry = api_key_entry(user)?;
    match entry.get_password() {
        Ok(api_key) => Ok(Some(api_key)),
        Err(keyring::Error::NoEntry) => Ok(None),
        Err(err) => Err(format!("failed to get keyring password: {err}")),
    }
}
